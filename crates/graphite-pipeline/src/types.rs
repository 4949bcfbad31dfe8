//! Shared types for the graphite sketch pipeline.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::blur::GaussianKernel;
use crate::stage::Artifact;

/// One pixel: ordered `[R, G, B]` channel values.
pub type Rgb = [u8; 3];

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Total number of pixels (`width * height`).
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An owned, row-major RGB raster with 8 bits per channel.
///
/// A `Raster` is never empty: every constructor rejects zero width or
/// height, and the pixel buffer always holds exactly `width * height`
/// entries. Pipeline stages read a `&Raster` and allocate a fresh output,
/// so an input can safely feed more than one downstream stage.
///
/// Grayscale rasters use the same representation with `R == G == B`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl Raster {
    /// Build a raster from a row-major pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if either dimension is zero.
    /// Returns [`PipelineError::BufferSizeMismatch`] if `pixels.len()` is
    /// not `width * height`.
    pub fn new(width: u32, height: u32, pixels: Vec<Rgb>) -> Result<Self, PipelineError> {
        let expected = checked_pixel_count(width, height)?;
        if pixels.len() != expected {
            return Err(PipelineError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a raster from a flat `RGBRGB...` byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if either dimension is zero.
    /// Returns [`PipelineError::BufferSizeMismatch`] if `bytes.len()` is
    /// not `width * height * 3`. The reported sizes count bytes.
    pub fn from_raw(width: u32, height: u32, bytes: &[u8]) -> Result<Self, PipelineError> {
        let expected = checked_pixel_count(width, height)? * 3;
        if bytes.len() != expected {
            return Err(PipelineError::BufferSizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        let pixels = bytes
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a raster by evaluating `f(x, y)` for every pixel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if either dimension is zero.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> Rgb,
    ) -> Result<Self, PipelineError> {
        let count = checked_pixel_count(width, height)?;
        let mut pixels = Vec::with_capacity(count);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a raster where every pixel has the same value.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] if either dimension is zero.
    pub fn filled(width: u32, height: u32, pixel: Rgb) -> Result<Self, PipelineError> {
        let count = checked_pixel_count(width, height)?;
        Ok(Self {
            width,
            height,
            pixels: vec![pixel; count],
        })
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Width and height as a [`Dimensions`] value.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// The pixel at `(x, y)`, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// All pixels in row-major order.
    #[must_use]
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// Whether every pixel has `R == G == B`.
    #[must_use]
    pub fn is_grayscale(&self) -> bool {
        self.pixels.iter().all(|&[r, g, b]| r == g && g == b)
    }

    /// Consume the raster and return its flat `RGBRGB...` bytes.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.pixels.into_flattened()
    }

    /// Convert into an [`image::RgbImage`] for encoding.
    #[must_use]
    pub fn to_rgb_image(&self) -> image::RgbImage {
        image::RgbImage::from_fn(self.width, self.height, |x, y| {
            image::Rgb(self.pixels[y as usize * self.width as usize + x as usize])
        })
    }

    /// A same-sized raster holding `pixels`.
    ///
    /// Only for stage outputs, which produce exactly one pixel per input
    /// pixel.
    pub(crate) fn with_pixels(&self, pixels: Vec<Rgb>) -> Self {
        debug_assert_eq!(pixels.len(), self.pixels.len(), "stage changed pixel count");
        Self {
            width: self.width,
            height: self.height,
            pixels,
        }
    }

    /// Apply a per-pixel transform in parallel, producing a new raster.
    pub(crate) fn map_pixels(&self, f: impl Fn(Rgb) -> Rgb + Sync + Send) -> Self {
        let pixels = self.pixels.par_iter().map(|&p| f(p)).collect();
        self.with_pixels(pixels)
    }
}

impl TryFrom<image::RgbImage> for Raster {
    type Error = PipelineError;

    fn try_from(image: image::RgbImage) -> Result<Self, Self::Error> {
        let (width, height) = image.dimensions();
        Self::from_raw(width, height, image.as_raw())
    }
}

impl From<&Raster> for image::RgbImage {
    fn from(raster: &Raster) -> Self {
        raster.to_rgb_image()
    }
}

/// `width * height`, rejecting empty rasters.
fn checked_pixel_count(width: u32, height: u32) -> Result<usize, PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyInput);
    }
    Ok(width as usize * height as usize)
}

/// Serde-compatible proxy for [`Raster`]: `(width, height, raw_bytes)`.
#[derive(Serialize, Deserialize)]
struct RasterProxy(u32, u32, Vec<u8>);

impl Serialize for Raster {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RasterProxy(self.width, self.height, self.pixels.as_flattened().to_vec())
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Raster {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let RasterProxy(width, height, bytes) = RasterProxy::deserialize(deserializer)?;
        Self::from_raw(width, height, &bytes).map_err(serde::de::Error::custom)
    }
}

/// Configuration for the sketch pipeline.
///
/// # Sigma convention
///
/// When `blur_sigma` is `None` the Gaussian standard deviation is derived
/// from the radius as `max(radius / 2, 0.5)`, so the kernel window covers
/// about two standard deviations on each side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Blur neighborhood radius in pixels, `1..=MAX_BLUR_RADIUS`.
    pub blur_radius: u32,

    /// Explicit Gaussian sigma. Must be finite and at least
    /// [`Self::MIN_BLUR_SIGMA`] when set.
    pub blur_sigma: Option<f32>,
}

impl PipelineConfig {
    /// Default blur radius in pixels.
    pub const DEFAULT_BLUR_RADIUS: u32 = 4;

    /// Largest accepted blur radius in pixels.
    pub const MAX_BLUR_RADIUS: u32 = crate::blur::MAX_RADIUS;

    /// Smallest accepted explicit sigma.
    pub const MIN_BLUR_SIGMA: f32 = crate::blur::MIN_SIGMA;

    /// Check every parameter, naming the first offending one.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a radius outside
    /// `1..=MAX_BLUR_RADIUS`, or a sigma that is not finite or is below
    /// [`MIN_BLUR_SIGMA`](Self::MIN_BLUR_SIGMA).
    pub fn validate(&self) -> Result<(), PipelineError> {
        crate::blur::check_radius(self.blur_radius)?;
        if let Some(sigma) = self.blur_sigma {
            crate::blur::check_sigma(sigma)?;
        }
        Ok(())
    }

    /// The sigma actually used: the explicit value, or one derived from
    /// the radius.
    #[must_use]
    pub fn effective_sigma(&self) -> f32 {
        self.blur_sigma
            .unwrap_or_else(|| crate::blur::default_sigma(self.blur_radius))
    }

    /// Validate the config and build the blur kernel it describes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] as [`validate`](Self::validate)
    /// does.
    pub fn blur_kernel(&self) -> Result<GaussianKernel, PipelineError> {
        self.validate()?;
        GaussianKernel::new(self.blur_radius, self.effective_sigma())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blur_radius: Self::DEFAULT_BLUR_RADIUS,
            blur_sigma: None,
        }
    }
}

/// Result of running the pipeline with every intermediate raster kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedResult {
    /// The caller's source raster.
    pub original: Raster,
    /// Stage 1: luminance raster.
    pub grayscale: Raster,
    /// Stage 2: tonally inverted grayscale.
    pub inverted: Raster,
    /// Stage 3: Gaussian-blurred inversion.
    pub blurred: Raster,
    /// Stage 4: dodge blend of grayscale and blurred, the final sketch.
    pub sketch: Raster,
    /// Dimensions shared by every raster above.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// The raster stored for `artifact`.
    #[must_use]
    pub const fn artifact(&self, artifact: Artifact) -> &Raster {
        match artifact {
            Artifact::Source => &self.original,
            Artifact::Grayscale => &self.grayscale,
            Artifact::Inverted => &self.inverted,
            Artifact::Blurred => &self.blurred,
            Artifact::Sketch => &self.sketch,
        }
    }
}

/// Errors that can occur during pipeline processing.
///
/// Every variant is a precondition failure; nothing here is transient
/// or worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The raster has zero width or height.
    #[error("input raster is empty")]
    EmptyInput,

    /// The pixel buffer does not match the declared dimensions.
    #[error("pixel buffer holds {actual} entries, expected {expected}")]
    BufferSizeMismatch {
        /// Length implied by the dimensions.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The dodge-blend inputs differ in size.
    #[error("dodge blend inputs differ in size: base {base}, blend {blend}")]
    DimensionMismatch {
        /// Dimensions of the base (grayscale) raster.
        base: Dimensions,
        /// Dimensions of the blend (blurred) raster.
        blend: Dimensions,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Raster construction ---

    #[test]
    fn new_rejects_zero_width() {
        let result = Raster::new(0, 4, Vec::new());
        assert_eq!(result, Err(PipelineError::EmptyInput));
    }

    #[test]
    fn new_rejects_zero_height() {
        let result = Raster::filled(4, 0, [1, 2, 3]);
        assert_eq!(result, Err(PipelineError::EmptyInput));
    }

    #[test]
    fn new_rejects_short_buffer() {
        let result = Raster::new(2, 2, vec![[0, 0, 0]; 3]);
        assert_eq!(
            result,
            Err(PipelineError::BufferSizeMismatch {
                expected: 4,
                actual: 3
            }),
        );
    }

    #[test]
    fn from_raw_counts_bytes() {
        let result = Raster::from_raw(2, 1, &[1, 2, 3, 4, 5]);
        assert_eq!(
            result,
            Err(PipelineError::BufferSizeMismatch {
                expected: 6,
                actual: 5
            }),
        );
    }

    #[test]
    fn from_fn_is_row_major() {
        let raster = Raster::from_fn(3, 2, |x, y| [x as u8, y as u8, 0]).unwrap();
        assert_eq!(raster.pixels()[4], [1, 1, 0]);
        assert_eq!(raster.get(2, 1), Some([2, 1, 0]));
        assert_eq!(raster.get(3, 0), None);
        assert_eq!(raster.get(0, 2), None);
    }

    #[test]
    fn into_raw_flattens_channels() {
        let raster = Raster::new(2, 1, vec![[1, 2, 3], [4, 5, 6]]).unwrap();
        assert_eq!(raster.into_raw(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn is_grayscale_detects_uniform_channels() {
        let gray = Raster::filled(2, 2, [9, 9, 9]).unwrap();
        let color = Raster::new(2, 1, vec![[9, 9, 9], [9, 8, 9]]).unwrap();
        assert!(gray.is_grayscale());
        assert!(!color.is_grayscale());
    }

    #[test]
    fn rgb_image_round_trip_preserves_pixels() {
        let raster = Raster::from_fn(5, 3, |x, y| [x as u8 * 40, y as u8 * 80, 7]).unwrap();
        let image = raster.to_rgb_image();
        assert_eq!(image.dimensions(), (5, 3));
        assert_eq!(image.get_pixel(4, 2).0, [160, 160, 7]);
        let back = Raster::try_from(image).unwrap();
        assert_eq!(back, raster);
    }

    #[test]
    fn dimensions_display_and_count() {
        let dims = Dimensions {
            width: 640,
            height: 480,
        };
        assert_eq!(dims.to_string(), "640x480");
        assert_eq!(dims.pixel_count(), 307_200);
    }

    // --- PipelineConfig ---

    #[test]
    fn pipeline_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.blur_radius, 4);
        assert_eq!(config.blur_sigma, None);
        assert!((config.effective_sigma() - 2.0).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_radius_is_invalid() {
        let config = PipelineConfig {
            blur_radius: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(ref msg)) if msg.contains("blur_radius"),
        ));
    }

    #[test]
    fn radius_above_maximum_is_invalid() {
        for blur_radius in [PipelineConfig::MAX_BLUR_RADIUS + 1, u32::MAX] {
            let config = PipelineConfig {
                blur_radius,
                ..PipelineConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(PipelineError::InvalidConfig(ref msg)) if msg.contains("at most"),
            ));
        }
        let max = PipelineConfig {
            blur_radius: PipelineConfig::MAX_BLUR_RADIUS,
            ..PipelineConfig::default()
        };
        assert!(max.validate().is_ok());
    }

    #[test]
    fn bad_sigma_is_invalid() {
        for sigma in [0.0, -1.0, f32::NAN, f32::INFINITY, 1e-30] {
            let config = PipelineConfig {
                blur_sigma: Some(sigma),
                ..PipelineConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(PipelineError::InvalidConfig(_))),
                "sigma {sigma} should be rejected",
            );
        }
    }

    #[test]
    fn explicit_sigma_overrides_derived() {
        let config = PipelineConfig {
            blur_radius: 4,
            blur_sigma: Some(3.5),
        };
        assert!((config.effective_sigma() - 3.5).abs() < f32::EPSILON);
    }

    #[test]
    fn blur_kernel_uses_effective_sigma() {
        let kernel = PipelineConfig::default().blur_kernel().unwrap();
        assert_eq!(kernel.radius(), 4);
        assert_eq!(kernel.weights().len(), 9);
        assert!((kernel.sigma() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn config_deserializes_with_missing_fields() {
        let config: PipelineConfig = serde_json::from_str(r#"{"blur_radius": 7}"#).unwrap();
        assert_eq!(config.blur_radius, 7);
        assert_eq!(config.blur_sigma, None);
    }

    // --- PipelineError ---

    #[test]
    fn error_empty_input_display() {
        assert_eq!(PipelineError::EmptyInput.to_string(), "input raster is empty");
    }

    #[test]
    fn error_dimension_mismatch_display() {
        let err = PipelineError::DimensionMismatch {
            base: Dimensions {
                width: 2,
                height: 2,
            },
            blend: Dimensions {
                width: 3,
                height: 2,
            },
        };
        assert_eq!(
            err.to_string(),
            "dodge blend inputs differ in size: base 2x2, blend 3x2",
        );
    }

    // --- Serde ---

    #[test]
    fn raster_serializes_as_dimension_tuple() {
        let raster = Raster::new(1, 1, vec![[1, 2, 3]]).unwrap();
        let json = serde_json::to_string(&raster).unwrap();
        assert_eq!(json, "[1,1,[1,2,3]]");
        let back: Raster = serde_json::from_str(&json).unwrap();
        assert_eq!(back, raster);
    }

    #[test]
    fn raster_deserialize_rejects_bad_buffer() {
        let result: Result<Raster, _> = serde_json::from_str("[2,2,[1,2,3]]");
        assert!(result.is_err());
        let result: Result<Raster, _> = serde_json::from_str("[0,0,[]]");
        assert!(result.is_err());
    }

    #[test]
    fn error_serde_round_trip() {
        let err = PipelineError::InvalidConfig("bad value".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
