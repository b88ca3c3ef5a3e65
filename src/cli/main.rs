//! Scene compositor CLI tool
//!
//! Runs one request per invocation and prints exactly one JSON response on
//! stdout. Logs go to stderr.

use super::config::CliConfigBuilder;
use crate::{
    inference::ModelRegistry,
    processor::CompositeProcessor,
    protocol::{self, Request, Response},
    tracing_config::spans,
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Scene-aware product compositing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "scene-compositor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Segmentation model (ONNX); the classical extractor is used without one
    #[arg(long, global = true, value_name = "PATH")]
    pub segmentation_model: Option<PathBuf>,

    /// Depth model (ONNX); a gradient proxy is used without one
    #[arg(long, global = true, value_name = "PATH")]
    pub depth_model: Option<PathBuf>,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long, global = true, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Strategy selection for segmentation and depth
    #[arg(long, global = true, value_enum, default_value_t = CliPolicy::Auto)]
    pub policy: CliPolicy,

    /// Product placement
    #[arg(long, global = true, value_enum, default_value_t = CliPlacement::Fixed)]
    pub placement: CliPlacement,

    /// Blending of the product into the scene
    #[arg(long, global = true, value_enum, default_value_t = CliBlend::Alpha)]
    pub blend: CliBlend,

    /// JPEG quality (0-100)
    #[arg(long, global = true, default_value_t = 90)]
    pub jpeg_quality: u8,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long, global = true, default_value_t = 0)]
    pub threads: usize,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Composite a product photo into a generated scene
    Process {
        /// Generated scene image
        generated: PathBuf,
        /// Product photo
        product: PathBuf,
        /// Output image; the format follows the extension
        output: PathBuf,
        /// Style guide JSON; extracted from the scene when omitted
        style_guide: Option<String>,
    },
    /// Extract a style guide from an image
    Analyze {
        image: PathBuf,
    },
    /// Show execution provider diagnostics
    Providers,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliPolicy {
    Auto,
    Neural,
    Classical,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliPlacement {
    Fixed,
    Heatmap,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliBlend {
    Alpha,
    Seamless,
}

/// Entry point of the `scene-compositor` binary
#[must_use]
pub fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage text goes to stderr, help and version to stdout
            let _ = e.print();
            return match parse_failure(&e) {
                Some(response) => emit(&response),
                None => ExitCode::SUCCESS,
            };
        },
    };

    let session_id = uuid::Uuid::new_v4().to_string();
    if let Err(e) = init_tracing(cli.verbose, &session_id) {
        eprintln!("Failed to initialize tracing: {e:#}");
    }

    let request = match &cli.command {
        Command::Providers => {
            show_provider_diagnostics();
            return ExitCode::SUCCESS;
        },
        Command::Process {
            generated,
            product,
            output,
            style_guide,
        } => Request::Process {
            generated: generated.clone(),
            product: product.clone(),
            output: output.clone(),
            style_guide: style_guide.clone(),
        },
        Command::Analyze { image } => Request::Analyze {
            image: image.clone(),
        },
    };

    let command = match request {
        Request::Process { .. } => "process",
        Request::Analyze { .. } => "analyze",
    };
    let response = {
        let _span = spans::session(&session_id, command).entered();
        run(&cli, &request).unwrap_or_else(|e| {
            error!("{e:#}");
            Response::Failed {
                error: format!("{e:#}"),
            }
        })
    };

    emit(&response)
}

/// Failed response for a rejected command line; `None` for help and version
fn parse_failure(error: &clap::Error) -> Option<Response> {
    if !error.use_stderr() {
        return None;
    }

    let rendered = error.render().to_string();
    let message = rendered
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .trim();
    Some(Response::Failed {
        error: format!("Invalid arguments: {message}"),
    })
}

/// Build the processor from the flags and run one request
fn run(cli: &Cli, request: &Request) -> Result<Response> {
    let config = CliConfigBuilder::from_cli(cli)?;
    let models = CliConfigBuilder::models_from_cli(cli)?;

    info!(
        "Backend: {:?}, Provider: {:?}",
        models.backend_type, models.inference.execution_provider
    );

    let registry = ModelRegistry::from_config(&models).context("Failed to load models")?;
    let processor =
        CompositeProcessor::new(config, registry).context("Failed to create processor")?;

    Ok(protocol::handle(&processor, request))
}

/// Print the response as the single stdout document
fn emit(response: &Response) -> ExitCode {
    let json = response.to_json().unwrap_or_else(|e| {
        serde_json::json!({ "success": false, "error": e.to_string() }).to_string()
    });

    let mut stdout = std::io::stdout().lock();
    if writeln!(stdout, "{json}").and_then(|()| stdout.flush()).is_err() {
        return ExitCode::FAILURE;
    }

    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Initialize tracing based on verbosity level
fn init_tracing(verbose_count: u8, session_id: &str) -> Result<()> {
    use crate::tracing_config::{TracingConfig, TracingFormat};

    TracingConfig::new()
        .with_verbosity(verbose_count)
        .with_format(TracingFormat::Console)
        .with_session_id(session_id)
        .init()
        .context("Failed to initialize tracing subscriber")
}

/// Display execution provider diagnostics using core utilities
fn show_provider_diagnostics() {
    println!("Backend and Execution Provider Diagnostics");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected");

    println!("\nExecution Providers:");
    for provider_info in ExecutionProviderManager::list_all_providers() {
        let status = if provider_info.available {
            "available"
        } else {
            "not available"
        };
        println!(
            "  {}: {} - {}",
            provider_info.name, status, provider_info.description
        );
    }

    println!("\nUsage Examples:");
    println!("  --execution-provider onnx:auto    # Auto-select best ONNX provider (default)");
    println!("  --execution-provider onnx:cuda    # Use NVIDIA CUDA");
    println!("  --execution-provider tract:cpu    # Use pure Rust Tract backend");
}
