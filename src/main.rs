//! apispec-from-source - Command-line tool inferring an API specification from source.
//!
//! Walks an Express or Django repository, discovers its route declarations and
//! prints one specification record per route.
//!
//! # Usage
//!
//! ```bash
//! apispec-from-source [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Extract an Express service, auto-detecting the framework:
//! ```bash
//! apispec-from-source ./my-service -o api_specs.json
//! ```
//!
//! Extract a Django project as YAML:
//! ```bash
//! apispec-from-source ./my-site -w django -f yaml
//! ```

use anyhow::Result;
use apispec_from_source::cli;
use clap::Parser;
use log::info;

fn main() -> Result<()> {
    // Parse once up front so the verbose flag can configure the logger
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("apispec-from-source starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("API specification extraction completed successfully");

    Ok(())
}
