//! Lexical path helpers. None of these touch the filesystem.

use std::path::{Component, Path, PathBuf};

/// Lexically clean a path: drop `.` components and fold `name/..` pairs.
/// An empty result becomes `.`.
#[must_use]
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // "/.." is "/"
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        PathBuf::from(".")
    } else {
        out.iter().collect()
    }
}

/// Path of `target` relative to `base`, computed lexically.
///
/// Returns `None` when one path is absolute and the other is not, or when
/// `base` climbs above its common prefix with `target` (the answer would
/// depend on the filesystem).
#[must_use]
pub fn relative_path(base: &Path, target: &Path) -> Option<PathBuf> {
    let base = clean_path(base);
    let target = clean_path(target);
    if base.is_absolute() != target.is_absolute() {
        return None;
    }

    let base: Vec<Component<'_>> = base.components().filter(|c| *c != Component::CurDir).collect();
    let target: Vec<Component<'_>> = target.components().filter(|c| *c != Component::CurDir).collect();

    let common = base.iter().zip(&target).take_while(|(b, t)| b == t).count();
    if base[common..].contains(&Component::ParentDir) {
        return None;
    }

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    Some(relative)
}
