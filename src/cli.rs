use crate::detector::{Framework, FrameworkDetector};
use crate::serializer::{serialize_json, serialize_yaml, write_to_file};
use crate::source::FsSourceReader;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::PathBuf;

/// API spec from source - Infer an API specification from a web service's source tree
#[derive(Parser, Debug)]
#[command(name = "apispec-from-source")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the repository directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (json or yaml)
    #[arg(short = 'f', long = "format", value_enum, default_value = "json")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Framework family to extract (if not specified, auto-detect)
    #[arg(short = 'w', long = "framework", value_enum, ignore_case = true)]
    pub framework: Option<Framework>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// JSON format
    Json,
    /// YAML format
    Yaml,
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
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    if let Some(ref framework) = args.framework {
        info!("Framework: {}", framework);
    } else {
        info!("Framework: auto-detect");
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting API specification extraction...");

    // Step 1: Pick the framework families
    let frameworks = if let Some(framework) = args.framework {
        info!("Using user-specified framework: {}", framework);
        vec![framework]
    } else {
        info!("Detecting web frameworks...");
        let detection = FrameworkDetector::detect(&args.project_path);

        if detection.frameworks.is_empty() {
            anyhow::bail!(
                "No supported web framework detected. Please specify a framework using --framework option.\n\
                 Supported frameworks: node, django"
            );
        }

        info!("Detected frameworks: {:?}", detection.frameworks);
        detection.frameworks
    };

    // Step 2: Extract records
    let extraction = crate::extract_all(&args.project_path, &frameworks, &FsSourceReader)?;
    for warning in &extraction.warnings {
        warn!("{}", warning);
    }
    if extraction.document.is_empty() {
        warn!("No routes found in the project");
    }

    // Step 3: Serialize to requested format
    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Json => serialize_json(&extraction.document)?,
        OutputFormat::Yaml => serialize_yaml(&extraction.document)?,
    };

    // Step 4: Output to file or stdout
    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
        info!("Successfully wrote API specification to {}", output_path.display());
    } else {
        println!("{}", content);
    }

    let summary = extraction.document.summary(extraction.files_processed);
    info!("Extraction complete!");
    info!("Summary:");
    info!("  - Files processed: {}", summary.files_processed);
    info!("  - Routes found: {}", summary.routes);
    info!("  - Unresolved handlers: {}", summary.unresolved_handlers);
    info!("  - Auth-protected routes: {}", summary.auth_protected);
    info!("  - Frameworks: {:?}", frameworks);

    Ok(())
}
