//! Pipeline diagnostics: timing and per-stage metrics.
//!
//! Timestamps come from a caller-supplied [`Clock`] so this crate stays
//! free of platform time APIs. Durations are serialized as fractional
//! seconds (`f64`), since `std::time::Duration` has no serde impls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::pipeline::{Advance, Pipeline, STAGE_COUNT, Stage};
use crate::stage::StageId;
use crate::types::{PipelineConfig, PipelineError, Raster, StagedResult};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// One entry per executed stage, in execution order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the run.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Which stage this entry describes.
    pub stage: StageId,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Luminance conversion.
    Grayscale {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Mean luminance over all pixels.
        mean_luminance: f64,
    },
    /// Tonal inversion.
    Invert {
        /// Mean value of the inverted raster.
        mean_level: f64,
    },
    /// Gaussian blur.
    Blur {
        /// Kernel radius in pixels.
        radius: u32,
        /// Kernel sigma.
        sigma: f32,
        /// Number of taps per 1D pass.
        kernel_len: usize,
    },
    /// Dodge-blend composite.
    DodgeBlend {
        /// Output channels that ended at 255.
        saturated_channels: u64,
        /// Total output channels (`pixels * 3`).
        total_channels: u64,
    },
}

/// High-level summary of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image width in pixels.
    pub image_width: u32,
    /// Image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Mean value of the final sketch.
    pub sketch_mean: f64,
}

/// Run the full pipeline, timing each stage with `clock`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid. No
/// stage runs in that case.
#[instrument(skip_all, fields(dimensions = %source.dimensions(), radius = config.blur_radius))]
pub fn process_staged_with_diagnostics<C: Clock>(
    source: Raster,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();
    let mut stage: Stage = Pipeline::new(source, config.clone())?.into();
    let mut stages = Vec::with_capacity(STAGE_COUNT - 1);

    loop {
        let start = clock.now();
        match stage.advance() {
            Advance::Next(next) => {
                let duration = clock.elapsed(&start);
                if let (Some(id), Some(metrics)) = (next.stage_id(), next.metrics()) {
                    debug!(stage = %id, ?duration, "stage timed");
                    stages.push(StageDiagnostics {
                        stage: id,
                        duration,
                        metrics,
                    });
                }
                stage = next;
            }
            Advance::Complete(done) => {
                stage = done;
                break;
            }
        }
    }

    let result = stage.complete();
    let total_duration = clock.elapsed(&total_start);
    let summary = PipelineSummary {
        image_width: result.dimensions.width,
        image_height: result.dimensions.height,
        pixel_count: result.dimensions.pixel_count(),
        sketch_mean: mean_level(&result.sketch),
    };

    Ok((
        result,
        PipelineDiagnostics {
            stages,
            total_duration,
            summary,
        },
    ))
}

impl PipelineDiagnostics {
    /// Diagnostics for one stage, if it ran.
    #[must_use]
    pub fn stage(&self, id: StageId) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.stage == id)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let name = diag.stage.label();
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("Sketch mean level: {:.1}", self.summary.sketch_mean));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Grayscale {
            width,
            height,
            mean_luminance,
        } => format!("{width}x{height} mean={mean_luminance:.1}"),
        StageMetrics::Invert { mean_level } => format!("mean={mean_level:.1}"),
        StageMetrics::Blur {
            radius,
            sigma,
            kernel_len,
        } => format!("r={radius} sigma={sigma:.2} taps={kernel_len}"),
        StageMetrics::DodgeBlend {
            saturated_channels,
            total_channels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let pct = if *total_channels > 0 {
                *saturated_channels as f64 / *total_channels as f64 * 100.0
            } else {
                0.0
            };
            format!("white={saturated_channels}/{total_channels} ({pct:.1}%)")
        }
    }
}

/// Mean channel value over every pixel and channel.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean_level(image: &Raster) -> f64 {
    let sum: u64 = image
        .pixels()
        .iter()
        .flat_map(|p| p.iter())
        .map(|&c| u64::from(c))
        .sum();
    sum as f64 / (image.pixels().len() * 3) as f64
}

/// Count channels equal to 255.
pub(crate) fn count_saturated_channels(image: &Raster) -> u64 {
    image
        .pixels()
        .iter()
        .flat_map(|p| p.iter())
        .map(|&c| u64::from(c == 255))
        .sum()
}
