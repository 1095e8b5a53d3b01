//! tfmodcache CLI entry point.
//!
//! This binary provides the command-line interface for tfmodcache.

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tfmodcache::cli::{Cli, Commands};
use tfmodcache::config::DEFAULT_CONFIG_FILES;
use tfmodcache::modules::ModuleLoader;
use tfmodcache::reporter::Reporter;
use tfmodcache::{Config, Resolver, SharedHclParser, TfModCacheError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");

            eprintln!("Error: {e}");

            // Print error chain (cause chain)
            let mut source = e.source();
            if source.is_some() {
                eprintln!("\nCaused by:");
                let mut i = 0;
                while let Some(cause) = source {
                    eprintln!("  {i}: {cause}");
                    source = cause.source();
                    i += 1;
                }
            }

            let backtrace = e.backtrace();
            if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
                eprintln!("\nStack backtrace:\n{backtrace}");
            }

            let code = e
                .downcast_ref::<TfModCacheError>()
                .map_or(1, TfModCacheError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        // RUST_LOG wins over -v
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let base_level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            EnvFilter::new(format!("warn,tfmodcache={base_level}"))
        })
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Resolve(args) => {
            let mut config = load_config(cli.config.as_deref())?;
            config.merge_cli_args(args.cache_path.as_deref(), args.no_color);

            let resolver = Resolver::new(config.clone());
            let report = resolver.resolve_path(&args.path).await?;

            let rendered = Reporter::new(&config).generate(&report, args.format)?;
            if let Some(output_path) = args.output {
                std::fs::write(&output_path, &rendered)?;
                tracing::info!(path = %output_path.display(), "Report written");
            } else if !cli.quiet {
                println!("{rendered}");
            }

            Ok(ExitCode::from(if report.has_errors() { 2 } else { 0 }))
        }

        Commands::Manifest(args) => {
            let mut config = load_config(cli.config.as_deref())?;
            config.merge_cli_args(args.cache_path.as_deref(), false);

            let hcl_parser = Arc::new(SharedHclParser::new());
            let loader = ModuleLoader::new(config.loader_options(hcl_parser));
            let manifest = loader.load(&args.path);
            let json = if config.output.pretty {
                serde_json::to_string_pretty(&manifest)?
            } else {
                serde_json::to_string(&manifest)?
            };
            println!("{json}");
            Ok(ExitCode::from(0))
        }

        Commands::Init(args) => {
            if args.path.exists() && !args.force {
                anyhow::bail!("Configuration file already exists: {}", args.path.display());
            }

            std::fs::write(&args.path, Config::example_yaml())?;
            println!("Created example configuration: {}", args.path.display());
            Ok(ExitCode::from(0))
        }

        Commands::Validate(args) => {
            let result = Config::from_file(&args.config).and_then(|config| config.validate());
            match result {
                Ok(()) => {
                    println!("Configuration is valid: {}", args.config.display());
                    Ok(ExitCode::from(0))
                }
                Err(e) => {
                    eprintln!("Configuration error: {e}");
                    Ok(ExitCode::from(1))
                }
            }
        }
    }
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    tracing::debug!("Loading configuration");
    let mut config = if let Some(config_path) = explicit {
        tracing::debug!(path = %config_path.display(), "Loading configuration from explicit path");
        Config::from_file(config_path)?
    } else if let Some(path) = DEFAULT_CONFIG_FILES.iter().map(Path::new).find(|p| p.exists()) {
        tracing::debug!(path = %path.display(), "Found configuration file");
        Config::from_file(path)?
    } else {
        tracing::debug!("No configuration file found, using default configuration");
        Config::default()
    };

    config.apply_env_overrides();
    Ok(config)
}
