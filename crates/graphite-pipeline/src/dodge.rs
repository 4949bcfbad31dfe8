//! Color-dodge composite.
//!
//! Brightens `base` by the inverse of `blend`:
//!
//! ```text
//! blend == 255  ->  255
//! otherwise     ->  min(255, floor(base * 255 / (255 - blend)))
//! ```
//!
//! With the grayscale image as `base` and its blurred inversion as
//! `blend`, flat regions wash out to white and edges keep dark strokes,
//! which reads as pencil shading. The arithmetic is integer-only, so the
//! division truncates exactly.

use rayon::prelude::*;

use crate::types::{PipelineError, Raster};

/// Dodge one channel value. The `blend == 255` guard runs before the
/// division.
#[must_use]
pub fn dodge_channel(base: u8, blend: u8) -> u8 {
    if blend == 255 {
        return 255;
    }
    let quotient = u32::from(base) * 255 / (255 - u32::from(blend));
    u8::try_from(quotient.min(255)).unwrap_or(u8::MAX)
}

/// Dodge-blend two same-size rasters, channel by channel.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if `base` and `blend`
/// differ in width or height.
pub fn dodge_blend(base: &Raster, blend: &Raster) -> Result<Raster, PipelineError> {
    if base.dimensions() != blend.dimensions() {
        return Err(PipelineError::DimensionMismatch {
            base: base.dimensions(),
            blend: blend.dimensions(),
        });
    }
    Ok(blend_same_size(base, blend))
}

/// Dodge-blend without the size check. Callers guarantee equal dimensions.
pub(crate) fn blend_same_size(base: &Raster, blend: &Raster) -> Raster {
    let pixels = base
        .pixels()
        .par_iter()
        .zip(blend.pixels().par_iter())
        .map(|(b, l)| std::array::from_fn(|c| dodge_channel(b[c], l[c])))
        .collect();
    base.with_pixels(pixels)
}
