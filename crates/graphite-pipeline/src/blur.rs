//! Separable Gaussian blur.
//!
//! The 2D Gaussian is the outer product of two 1D kernels, so the blur runs
//! as a horizontal pass followed by a vertical pass, costing
//! `O(width * height * radius)` instead of `O(width * height * radius²)`.
//!
//! Both passes accumulate in `f32`; the intermediate buffer is never
//! quantized, and the final value is rounded and clamped once. Because the
//! kernel is normalized, a uniform raster comes back unchanged.
//!
//! Pixels outside the raster are taken from the nearest edge pixel
//! (clamp-to-edge).

use rayon::prelude::*;

use crate::types::{PipelineError, Raster, Rgb};

/// Largest accepted kernel radius in pixels.
pub const MAX_RADIUS: u32 = 512;

/// Smallest accepted sigma. Anything narrower already behaves as an
/// identity kernel, and far smaller values underflow the exponent's
/// denominator to zero.
pub const MIN_SIGMA: f32 = 0.01;

/// The sigma used when none is configured: `max(radius / 2, 0.5)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn default_sigma(radius: u32) -> f32 {
    (radius as f32 / 2.0).max(0.5)
}

/// A normalized, symmetric 1D Gaussian kernel of length `2 * radius + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKernel {
    radius: u32,
    sigma: f32,
    weights: Vec<f32>,
}

impl GaussianKernel {
    /// Build a kernel with an explicit sigma.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `radius` is outside
    /// `1..=MAX_RADIUS` or `sigma` is not finite and at least
    /// [`MIN_SIGMA`].
    #[allow(clippy::cast_precision_loss)]
    pub fn new(radius: u32, sigma: f32) -> Result<Self, PipelineError> {
        check_radius(radius)?;
        check_sigma(sigma)?;

        let r = i64::from(radius);
        let denom = 2.0 * sigma * sigma;
        let mut weights: Vec<f32> = (-r..=r)
            .map(|i| {
                let x = i as f32;
                (-x * x / denom).exp()
            })
            .collect();
        let sum: f32 = weights.iter().sum();
        if !(sum.is_finite() && sum > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "blur kernel for radius {radius}, sigma {sigma} cannot be normalized"
            )));
        }
        for w in &mut weights {
            *w /= sum;
        }

        Ok(Self {
            radius,
            sigma,
            weights,
        })
    }

    /// Build a kernel whose sigma is derived from the radius
    /// (see [`default_sigma`]).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `radius` is outside
    /// `1..=MAX_RADIUS`.
    pub fn from_radius(radius: u32) -> Result<Self, PipelineError> {
        Self::new(radius, default_sigma(radius))
    }

    /// Neighborhood radius in pixels.
    #[must_use]
    pub const fn radius(&self) -> u32 {
        self.radius
    }

    /// Standard deviation of the Gaussian.
    #[must_use]
    pub const fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Kernel weights, centre at index `radius`. They sum to 1.
    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }
}

/// Reject a radius outside `1..=MAX_RADIUS`.
pub(crate) fn check_radius(radius: u32) -> Result<(), PipelineError> {
    if radius == 0 {
        return Err(PipelineError::InvalidConfig(
            "blur_radius must be at least 1".to_string(),
        ));
    }
    if radius > MAX_RADIUS {
        return Err(PipelineError::InvalidConfig(format!(
            "blur_radius must be at most {MAX_RADIUS}, got {radius}"
        )));
    }
    Ok(())
}

/// Reject a sigma that is not finite or below [`MIN_SIGMA`].
pub(crate) fn check_sigma(sigma: f32) -> Result<(), PipelineError> {
    if !(sigma.is_finite() && sigma >= MIN_SIGMA) {
        return Err(PipelineError::InvalidConfig(format!(
            "blur_sigma must be finite and at least {MIN_SIGMA}, got {sigma}"
        )));
    }
    Ok(())
}

/// Blur a raster with a Gaussian of the given radius and the default
/// sigma for that radius.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `radius` is outside
/// `1..=MAX_RADIUS`.
pub fn gaussian_blur(image: &Raster, radius: u32) -> Result<Raster, PipelineError> {
    let kernel = GaussianKernel::from_radius(radius)?;
    Ok(blur_with_kernel(image, &kernel))
}

/// Blur every channel of a raster with a prepared kernel.
#[must_use = "returns the blurred raster"]
pub fn blur_with_kernel(image: &Raster, kernel: &GaussianKernel) -> Raster {
    let horizontal = horizontal_pass(image, kernel);
    let pixels = vertical_pass(&horizontal, image.width() as usize, kernel);
    image.with_pixels(pixels)
}

/// Blur along rows. Output stays in `f32`.
fn horizontal_pass(image: &Raster, kernel: &GaussianKernel) -> Vec<[f32; 3]> {
    let width = image.width() as usize;
    let radius = kernel.radius() as usize;
    let weights = kernel.weights();

    let mut out = vec![[0.0f32; 3]; image.pixels().len()];
    out.par_chunks_mut(width)
        .zip(image.pixels().par_chunks(width))
        .for_each(|(dst_row, src_row)| {
            for (x, dst) in dst_row.iter_mut().enumerate() {
                let mut acc = [0.0f32; 3];
                for (k, &w) in weights.iter().enumerate() {
                    let src = src_row[clamp_to_edge(x + k, radius, width)];
                    accumulate(&mut acc, w, src.map(f32::from));
                }
                *dst = acc;
            }
        });
    out
}

/// Blur along columns and quantize back to 8-bit.
fn vertical_pass(horizontal: &[[f32; 3]], width: usize, kernel: &GaussianKernel) -> Vec<Rgb> {
    let height = horizontal.len() / width;
    let radius = kernel.radius() as usize;
    let weights = kernel.weights();

    let mut out = vec![[0u8; 3]; horizontal.len()];
    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, dst_row)| {
            for (x, dst) in dst_row.iter_mut().enumerate() {
                let mut acc = [0.0f32; 3];
                for (k, &w) in weights.iter().enumerate() {
                    let sy = clamp_to_edge(y + k, radius, height);
                    accumulate(&mut acc, w, horizontal[sy * width + x]);
                }
                *dst = acc.map(quantize);
            }
        });
    out
}

/// Index of tap `k` around position `pos`, given as `pos + k`, replicated
/// from the nearest edge when it falls outside `[0, len)`.
const fn clamp_to_edge(pos_plus_k: usize, radius: usize, len: usize) -> usize {
    let i = pos_plus_k.saturating_sub(radius);
    if i >= len { len - 1 } else { i }
}

fn accumulate(acc: &mut [f32; 3], weight: f32, sample: [f32; 3]) {
    for (a, s) in acc.iter_mut().zip(sample) {
        *a = weight.mul_add(s, *a);
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
