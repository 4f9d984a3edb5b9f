use anyhow::{Context as _, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::framework::FrameworkCaps;
use crate::metadata::HandlerRecord;
use crate::scanner::FileScanner;
use crate::store::HandlerMetadataStore;

/// routedoc - Derive API documentation metadata from request-handler source code
#[derive(Parser, Debug)]
#[command(name = "routedoc")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Handler signature profile to match against
    #[arg(short = 'p', long = "profile", value_enum, default_value = "context")]
    pub profile: Profile,

    /// Request-context type name for the context profile
    #[arg(long = "context-type", default_value = "Context")]
    pub context_type: String,

    /// Response-sink type name for the writer-request profile
    #[arg(long = "writer-type", default_value = "ResponseWriter")]
    pub writer_type: String,

    /// Request-object type name for the writer-request profile
    #[arg(long = "request-type", default_value = "Request")]
    pub request_type: String,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// The two built-in handler signature profiles
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum Profile {
    /// Handlers take a single request-context parameter
    Context,
    /// Handlers take a response sink and a request reference
    #[value(name = "writer-request")]
    WriterRequest,
}

/// One analyzed directory in the report
#[derive(Debug, Serialize)]
pub struct DirectoryReport {
    pub directory: PathBuf,
    pub handlers: Vec<HandlerRecord>,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }
    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    info!("Profile: {:?}", args.profile);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }

    Ok(args)
}

/// Builds the capability descriptor the arguments describe.
pub fn caps_from_args(args: &CliArgs) -> FrameworkCaps {
    match args.profile {
        Profile::Context => FrameworkCaps::context_style(&args.context_type),
        Profile::WriterRequest => {
            FrameworkCaps::writer_request_style(&args.writer_type, &args.request_type)
        }
    }
}

/// Run the main workflow: scan the tree, analyze each directory containing
/// Rust sources, and emit the discovered handler metadata.
pub fn run(args: CliArgs) -> Result<()> {
    info!("Scanning project directory...");
    let scanner = FileScanner::new(args.project_path.clone());
    let directories = scanner.scan_directories()?;

    if directories.is_empty() {
        anyhow::bail!("No Rust files found in the project directory");
    }
    info!("Found {} directories with Rust sources", directories.len());

    let store = HandlerMetadataStore::new(caps_from_args(&args));

    let mut report = Vec::new();
    for directory in directories {
        debug!("Analyzing directory: {}", directory.display());
        let analysis = match store.package_analysis(&directory) {
            Some(analysis) => analysis,
            None => continue,
        };

        let mut handlers: Vec<HandlerRecord> = analysis
            .handlers
            .values()
            .flat_map(|records| records.iter().cloned())
            .collect();
        if handlers.is_empty() {
            continue;
        }
        handlers.sort_by(|a, b| {
            (&a.file_path, a.start_line).cmp(&(&b.file_path, b.start_line))
        });

        report.push(DirectoryReport {
            directory,
            handlers,
        });
    }

    let handler_total: usize = report.iter().map(|d| d.handlers.len()).sum();
    info!(
        "Discovered {} handlers across {} directories",
        handler_total,
        report.len()
    );

    let content = match args.output_format {
        OutputFormat::Yaml => {
            serde_yaml::to_string(&report).context("Failed to serialize report to YAML")?
        }
        OutputFormat::Json => serde_json::to_string_pretty(&report)
            .context("Failed to serialize report to JSON")?,
    };

    if let Some(output_path) = &args.output_path {
        fs::write(output_path, &content)
            .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
        info!("Wrote report to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    Ok(())
}
