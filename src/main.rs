//! routedoc - Command-line front end for the handler analysis engine.
//!
//! Scans a Rust project, analyzes every directory containing source files,
//! and prints the derived handler metadata as YAML or JSON.
//!
//! # Usage
//!
//! ```bash
//! routedoc [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Report on a context-style project:
//! ```bash
//! routedoc ./my-api-project -o handlers.yaml
//! ```
//!
//! Match writer/request-style handlers and emit JSON:
//! ```bash
//! routedoc ./my-api-project -p writer-request -f json
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use routedoc::cli;

fn main() -> Result<()> {
    // Parse args first so the verbose flag can pick the logger level.
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("routedoc starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;
    cli::run(args)?;

    info!("Analysis completed successfully");

    Ok(())
}
