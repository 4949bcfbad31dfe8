//! graphite: render an image file as a pencil sketch.
//!
//! Decodes the input, runs grayscale -> invert -> blur -> dodge, and writes
//! the sketch as JPEG or PNG. Optionally dumps every intermediate stage,
//! prints the sketch as a base64 data URI, and reports per-stage timing.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin graphite -- [OPTIONS] <INPUT>
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `graphite=info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use graphite_codec::{CodecError, OutputFormat};
use graphite_pipeline::diagnostics::{self, Clock};
use graphite_pipeline::{PipelineConfig, PipelineError, Raster, StageId};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Render an image as a pencil sketch.
///
/// Converts the input to grayscale, blurs its inversion, and color-dodges
/// the two back together.
#[derive(Parser)]
#[command(name = "graphite", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    input: PathBuf,

    /// Output path. Defaults to `<input-stem>-sketch.<ext>` next to the input.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Gaussian blur radius in pixels.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_BLUR_RADIUS, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..=u64::from(PipelineConfig::MAX_BLUR_RADIUS)))]
    radius: u32,

    /// Gaussian blur sigma. Derived from the radius when omitted.
    #[arg(long)]
    sigma: Option<f32>,

    /// Output format. Inferred from the output extension when omitted,
    /// falling back to JPEG.
    #[arg(long, value_enum)]
    format: Option<Format>,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = OutputFormat::DEFAULT_JPEG_QUALITY, value_parser = clap::builder::RangedU64ValueParser::<u8>::new().range(1..=100))]
    quality: u8,

    /// Print the sketch as a base64 data URI on stdout.
    #[arg(long)]
    data_uri: bool,

    /// Write every intermediate stage as PNG into this directory.
    #[arg(long)]
    stages_dir: Option<PathBuf>,

    /// Print per-stage timing and metrics.
    #[arg(long)]
    diagnostics: bool,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long, requires = "diagnostics")]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, `--radius` and `--sigma` are ignored. The JSON must
    /// be a valid `PipelineConfig` serialization; missing fields take
    /// their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Output format selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Baseline JPEG.
    Jpeg,
    /// Lossless PNG.
    Png,
}

/// Everything that can stop a run.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("error parsing --config-json: {0}")]
    ConfigJson(#[source] serde_json::Error),

    #[error("error reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("error serializing diagnostics: {0}")]
    Diagnostics(#[source] serde_json::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, CliError> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(CliError::ConfigJson);
    }

    Ok(PipelineConfig {
        blur_radius: cli.radius,
        blur_sigma: cli.sigma,
    })
}

/// Resolve the output format: explicit flag, then output extension, then JPEG.
fn output_format(cli: &Cli) -> OutputFormat {
    let jpeg = OutputFormat::Jpeg {
        quality: cli.quality,
    };
    match cli.format {
        Some(Format::Jpeg) => jpeg,
        Some(Format::Png) => OutputFormat::Png,
        None => match cli.output.as_deref().and_then(OutputFormat::from_path) {
            Some(OutputFormat::Png) => OutputFormat::Png,
            Some(OutputFormat::Jpeg { .. }) | None => jpeg,
        },
    }
}

/// `<dir>/<stem>-sketch.<ext>` for an input at `<dir>/<stem>.<anything>`.
fn default_output_path(input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    input.with_file_name(format!("{stem}-sketch.{}", format.extension()))
}

/// `<dir>/<index>-<slug>.png` for one stage's output.
fn stage_path(dir: &Path, index: usize, stage: StageId) -> PathBuf {
    dir.join(format!("{}-{}.png", index + 1, stage.slug()))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, bytes).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = config_from_cli(cli)?;
    config.validate()?;
    let format = output_format(cli);
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input, format));
    debug!(?config, %format, output = %output.display(), "resolved options");

    let bytes = std::fs::read(&cli.input).map_err(|source| CliError::Read {
        path: cli.input.clone(),
        source,
    })?;
    let source = graphite_codec::decode(&bytes)?;
    info!(
        input = %cli.input.display(),
        dimensions = %source.dimensions(),
        "decoded input"
    );

    let sketch: Raster = if cli.diagnostics || cli.stages_dir.is_some() {
        let (staged, diagnostics) =
            diagnostics::process_staged_with_diagnostics(source, &config, &StdClock)?;

        if let Some(ref dir) = cli.stages_dir {
            std::fs::create_dir_all(dir).map_err(|source| CliError::Write {
                path: dir.clone(),
                source,
            })?;
            for (index, stage) in StageId::ALL.into_iter().enumerate() {
                let png = graphite_codec::encode(staged.artifact(stage.output()), OutputFormat::Png)?;
                write_file(&stage_path(dir, index, stage), &png)?;
            }
        }

        if cli.diagnostics {
            if cli.json {
                let json =
                    serde_json::to_string_pretty(&diagnostics).map_err(CliError::Diagnostics)?;
                println!("{json}");
            } else {
                println!("{}", diagnostics.report());
            }
        }

        staged.sketch
    } else {
        graphite_pipeline::process(&source, &config)?
    };

    let encoded = graphite_codec::encode(&sketch, format)?;
    write_file(&output, &encoded)?;

    if cli.data_uri {
        println!("{}", graphite_codec::data_uri_from_bytes(&encoded, format));
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "graphite=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
