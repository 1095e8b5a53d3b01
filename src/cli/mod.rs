//! Command-line interface module.
//!
//! This module defines the CLI structure using Clap, including
//! all commands, arguments, and options.
//!
//! # Commands
//!
//! - `resolve`: Resolve the module calls of a project against its manifest
//! - `manifest`: Print a project's module manifest
//! - `init`: Create an example configuration file
//! - `validate`: Validate a configuration file
//!
//! # Example Usage
//!
//! ```bash
//! # Resolve the root module calls of a project
//! tfmodcache resolve ./infra
//!
//! # Use a shared download root and write a JSON report
//! tfmodcache resolve ./infra --cache-path /work/.tfmodcache --format json --output report.json
//!
//! # Print the manifest with rewritten directories
//! tfmodcache manifest ./infra
//!
//! # Initialize configuration
//! tfmodcache init
//!
//! # Validate configuration
//! tfmodcache validate tfmodcache.yaml
//! ```

use crate::types::ReportFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// tfmodcache - Terraform/OpenTofu module resolution and caching.
#[derive(Parser, Debug)]
#[command(
    name = "tfmodcache",
    author,
    version,
    about = "Terraform/OpenTofu module resolution and caching",
    long_about = "tfmodcache reads a project's module manifest, parses its module calls and \
                  decides which installed modules can be reused and which must be fetched."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "TFMODCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the module calls of a project
    #[command(visible_alias = "r")]
    Resolve(ResolveArgs),

    /// Print a project's module manifest as JSON
    #[command(visible_alias = "m")]
    Manifest(ManifestArgs),

    /// Create an example configuration file
    Init(InitArgs),

    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Arguments for the resolve command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Project directory (root module)
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text", value_enum)]
    pub format: ReportFormat,

    /// Output file path (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Shared download root (overrides configuration)
    #[arg(long, value_name = "DIR")]
    pub cache_path: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// Arguments for the manifest command.
#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Project directory
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Shared download root (overrides configuration)
    #[arg(long, value_name = "DIR")]
    pub cache_path: Option<PathBuf>,
}

/// Arguments for the init command.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the configuration file
    #[arg(value_name = "FILE", default_value = "tfmodcache.yaml")]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(value_name = "FILE", default_value = "tfmodcache.yaml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_command() {
        let cli = Cli::parse_from(["tfmodcache", "resolve", "./infra"]);
        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.path, PathBuf::from("./infra"));
                assert_eq!(args.format, ReportFormat::Text);
                assert!(args.cache_path.is_none());
            }
            _ => panic!("Expected Resolve command"),
        }
    }

    #[test]
    fn test_resolve_with_options() {
        let cli = Cli::parse_from([
            "tfmodcache",
            "resolve",
            "./infra",
            "--format",
            "json",
            "--output",
            "report.json",
            "--cache-path",
            "/work/cache",
            "--no-color",
        ]);
        match cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.format, ReportFormat::Json);
                assert_eq!(args.output, Some(PathBuf::from("report.json")));
                assert_eq!(args.cache_path, Some(PathBuf::from("/work/cache")));
                assert!(args.no_color);
            }
            _ => panic!("Expected Resolve command"),
        }
    }

    #[test]
    fn test_resolve_defaults_to_current_dir() {
        let cli = Cli::parse_from(["tfmodcache", "r"]);
        match cli.command {
            Commands::Resolve(args) => assert_eq!(args.path, PathBuf::from(".")),
            _ => panic!("Expected Resolve command"),
        }
    }

    #[test]
    fn test_manifest_command() {
        let cli = Cli::parse_from(["tfmodcache", "manifest", "./infra", "--cache-path", "/c"]);
        match cli.command {
            Commands::Manifest(args) => {
                assert_eq!(args.path, PathBuf::from("./infra"));
                assert_eq!(args.cache_path, Some(PathBuf::from("/c")));
            }
            _ => panic!("Expected Manifest command"),
        }
    }

    #[test]
    fn test_init_command() {
        let cli = Cli::parse_from(["tfmodcache", "init"]);
        match cli.command {
            Commands::Init(args) => {
                assert_eq!(args.path, PathBuf::from("tfmodcache.yaml"));
                assert!(!args.force);
            }
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["tfmodcache", "validate", "custom.yaml"]);
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.config, PathBuf::from("custom.yaml"));
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::parse_from([
            "tfmodcache",
            "-vvv",
            "--config",
            "custom.yaml",
            "resolve",
            "./infra",
        ]);
        assert_eq!(cli.verbose, 3);
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    }
}
