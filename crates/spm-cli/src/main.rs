#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]

mod commands;
mod logging;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use spm_core::Config;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spm")]
#[command(author, version, about = "Install packages from an spm registry", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Install packages and their dependencies
    Install {
        /// Packages to install (`name` or `name@version`); defaults to the
        /// dependencies listed in package.json
        identifiers: Vec<String>,

        /// Reinstall even if already installed, ignoring cached archives
        #[arg(short, long)]
        force: bool,

        /// Record installed packages under spm.dependencies
        #[arg(long)]
        save: bool,

        /// Record installed packages under spm.devDependencies
        #[arg(long)]
        save_dev: bool,

        /// Install destination directory
        #[arg(long, value_name = "DIR")]
        destination: Option<PathBuf>,

        /// Registry URL
        #[arg(long, value_name = "URL")]
        registry: Option<String>,

        /// Archive cache directory
        #[arg(long, value_name = "DIR")]
        cache: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(),
        Some(Commands::Install {
            identifiers,
            force,
            save,
            save_dev,
            destination,
            registry,
            cache,
        }) => {
            let mut config = Config::load(cwd).into_diagnostic()?;
            if let Some(registry) = registry {
                config = config.with_registry(registry);
            }
            if let Some(destination) = destination {
                config = config.with_destination(destination);
            }
            if let Some(cache) = cache {
                config = config.with_cache_dir(cache);
            }

            commands::install::run(
                &config,
                commands::install::InstallArgs {
                    identifiers,
                    force,
                    save,
                    save_dev,
                },
                cli.json,
            )
        }
    }
}
