//! graphite-pipeline: Pure pencil-sketch image pipeline (sans-IO).
//!
//! Turns an RGB raster into a pencil-sketch rendition through:
//! grayscale -> invert -> Gaussian blur -> color dodge, where the dodge
//! blends the grayscale raster with its blurred inversion.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! [`Raster`] values; decoding and encoding live in `graphite-codec`.

pub mod blur;
pub mod diagnostics;
pub mod dodge;
pub mod grayscale;
pub mod invert;
pub mod pipeline;
pub mod stage;
pub mod types;

use tracing::{debug, instrument};

pub use blur::{GaussianKernel, blur_with_kernel, default_sigma, gaussian_blur};
pub use diagnostics::{Clock, PipelineDiagnostics, StageDiagnostics, StageMetrics};
pub use dodge::{dodge_blend, dodge_channel};
pub use grayscale::{luminance, to_grayscale};
pub use invert::invert;
pub use pipeline::{Advance, Pipeline, PipelineStage, Stage, StageOutput};
pub use stage::{Artifact, StageId};
pub use types::{Dimensions, PipelineConfig, PipelineError, Raster, Rgb, StagedResult};

/// Render `source` as a pencil sketch.
///
/// Intermediates are dropped as soon as the next stage no longer needs
/// them. Use [`process_staged`] to keep them.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`PipelineConfig::validate`].
#[instrument(skip_all, fields(dimensions = %source.dimensions(), radius = config.blur_radius))]
pub fn process(source: &Raster, config: &PipelineConfig) -> Result<Raster, PipelineError> {
    let kernel = config.blur_kernel()?;

    let gray = to_grayscale(source);
    let blurred = {
        let inverted = invert(&gray);
        blur_with_kernel(&inverted, &kernel)
    };
    let sketch = dodge::blend_same_size(&gray, &blurred);

    debug!(sigma = kernel.sigma(), "sketch rendered");
    Ok(sketch)
}

/// Render `source` as a pencil sketch and keep every intermediate.
///
/// The returned [`StagedResult::sketch`] is identical to what
/// [`process`] returns for the same input.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`PipelineConfig::validate`].
#[instrument(skip_all, fields(dimensions = %source.dimensions(), radius = config.blur_radius))]
pub fn process_staged(
    source: Raster,
    config: &PipelineConfig,
) -> Result<StagedResult, PipelineError> {
    Ok(Pipeline::new(source, config.clone())?
        .grayscale()
        .invert()
        .blur()
        .dodge()
        .into_result())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn radius(r: u32) -> PipelineConfig {
        PipelineConfig {
            blur_radius: r,
            ..PipelineConfig::default()
        }
    }

    /// A small portrait-ish scene: dark disc on a light gradient.
    fn scene() -> Raster {
        Raster::from_fn(24, 18, |x, y| {
            let (dx, dy) = (i64::from(x) - 12, i64::from(y) - 9);
            if dx * dx + dy * dy < 25 {
                [40, 30, 20]
            } else {
                [200, (150 + x * 2) as u8, (100 + y * 3) as u8]
            }
        })
        .unwrap()
    }

    #[test]
    fn uniform_white_stays_white() {
        let img = Raster::filled(8, 8, [255; 3]).unwrap();
        let sketch = process(&img, &PipelineConfig::default()).unwrap();
        assert!(sketch.pixels().iter().all(|&p| p == [255; 3]));
    }

    #[test]
    fn uniform_black_becomes_white() {
        // gray 0, inverted 255, blurred 255, dodge guard -> 255.
        let img = Raster::filled(8, 8, [0; 3]).unwrap();
        let sketch = process(&img, &PipelineConfig::default()).unwrap();
        assert!(sketch.pixels().iter().all(|&p| p == [255; 3]));
    }

    #[test]
    fn single_pixel_extremes_become_white() {
        for v in [0, 255] {
            let img = Raster::filled(1, 1, [v; 3]).unwrap();
            let sketch = process(&img, &PipelineConfig::default()).unwrap();
            assert_eq!(sketch.pixels(), &[[255; 3]], "value {v}");
        }
    }

    #[test]
    fn uniform_mid_gray_becomes_white() {
        // Any flat tone washes out: base * 255 / (255 - (255 - base)) = 255.
        for v in [1, 64, 128, 200] {
            let img = Raster::filled(5, 5, [v; 3]).unwrap();
            let sketch = process(&img, &radius(2)).unwrap();
            assert!(sketch.pixels().iter().all(|&p| p == [255; 3]), "value {v}");
        }
    }

    #[test]
    fn checkerboard_yields_gray_sketch_within_range() {
        let img = Raster::from_fn(2, 2, |x, y| {
            if (x + y) % 2 == 0 { [255; 3] } else { [0; 3] }
        })
        .unwrap();
        let staged = process_staged(img, &radius(1)).unwrap();

        assert_eq!(staged.sketch.dimensions(), Dimensions { width: 2, height: 2 });
        assert!(staged.sketch.is_grayscale());
        // Black cells have base 0, so they stay black unless the blend is 255.
        for (g, s) in staged.grayscale.pixels().iter().zip(staged.sketch.pixels()) {
            if g[0] == 0 {
                assert!(s[0] == 0 || s[0] == 255);
            }
        }
    }

    #[test]
    fn dimensions_are_preserved() {
        for (w, h) in [(1, 1), (1, 9), (9, 1), (31, 17)] {
            let img = Raster::filled(w, h, [10, 120, 250]).unwrap();
            let sketch = process(&img, &PipelineConfig::default()).unwrap();
            assert_eq!(sketch.dimensions(), img.dimensions());
        }
    }

    #[test]
    fn output_is_grayscale() {
        let sketch = process(&scene(), &PipelineConfig::default()).unwrap();
        assert!(sketch.is_grayscale());
    }

    #[test]
    fn process_matches_staged_sketch() {
        for r in [1, 3, 4, 8] {
            let direct = process(&scene(), &radius(r)).unwrap();
            let staged = process_staged(scene(), &radius(r)).unwrap();
            assert_eq!(direct, staged.sketch, "radius {r}");
        }
    }

    #[test]
    fn staged_intermediates_follow_the_stage_functions() {
        let staged = process_staged(scene(), &PipelineConfig::default()).unwrap();
        assert_eq!(staged.original, scene());
        assert_eq!(staged.grayscale, to_grayscale(&scene()));
        assert_eq!(staged.inverted, invert(&staged.grayscale));
        assert_eq!(
            staged.blurred,
            gaussian_blur(&staged.inverted, PipelineConfig::DEFAULT_BLUR_RADIUS).unwrap(),
        );
        assert_eq!(
            staged.sketch,
            dodge_blend(&staged.grayscale, &staged.blurred).unwrap(),
        );
    }

    #[test]
    fn artifacts_resolve_to_stage_outputs() {
        let staged = process_staged(scene(), &PipelineConfig::default()).unwrap();
        assert_eq!(staged.artifact(Artifact::Source), &staged.original);
        assert_eq!(staged.artifact(StageId::Invert.output()), &staged.inverted);
        assert_eq!(staged.artifact(StageId::DodgeBlend.output()), &staged.sketch);
        for id in StageId::ALL {
            assert_eq!(staged.artifact(id.output()).dimensions(), staged.dimensions);
        }
    }

    #[test]
    fn edges_keep_dark_strokes() {
        let sketch = process(&scene(), &PipelineConfig::default()).unwrap();
        // The middle of the flat disc washes out, its inner rim stays darker.
        let centre = sketch.get(12, 9).unwrap()[0];
        let rim = sketch.get(12, 5).unwrap()[0];
        assert!(rim < centre, "rim {rim} should be darker than centre {centre}");
    }

    #[test]
    fn process_is_deterministic() {
        let a = process(&scene(), &PipelineConfig::default()).unwrap();
        let b = process(&scene(), &PipelineConfig::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_blur_parameters_fail_instead_of_degrading() {
        let img = Raster::filled(1, 1, [200; 3]).unwrap();
        let tiny_sigma = PipelineConfig {
            blur_radius: 2,
            blur_sigma: Some(1e-30),
        };
        assert!(matches!(
            process(&img, &tiny_sigma),
            Err(PipelineError::InvalidConfig(_))
        ));
        assert!(process_staged(img.clone(), &tiny_sigma).is_err());
        assert!(matches!(
            process(&img, &radius(u32::MAX)),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected_before_work() {
        let err = process(&scene(), &radius(0)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
        assert!(process_staged(scene(), &radius(0)).is_err());
    }
}
