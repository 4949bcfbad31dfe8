//! Luminance conversion.
//!
//! First stage of the pipeline: an RGB raster in, a raster with the same
//! luminance value replicated across all three channels out. Weights are
//! the ITU-R BT.709 luma coefficients.

use crate::types::{Raster, Rgb};

/// Red weight in the luminance sum, in ten-thousandths.
pub const LUMA_R: u32 = 2125;
/// Green weight in the luminance sum, in ten-thousandths.
pub const LUMA_G: u32 = 7154;
/// Blue weight in the luminance sum, in ten-thousandths.
pub const LUMA_B: u32 = 721;

const LUMA_SCALE: u32 = LUMA_R + LUMA_G + LUMA_B;

/// Luminance of one pixel: `round(0.2125*R + 0.7154*G + 0.0721*B)`,
/// with exact halves rounded up.
///
/// Evaluated in integers, so the result is exact for every input.
#[must_use]
pub fn luminance([r, g, b]: Rgb) -> u8 {
    let weighted = LUMA_R * u32::from(r) + LUMA_G * u32::from(g) + LUMA_B * u32::from(b);
    let rounded = (weighted + LUMA_SCALE / 2) / LUMA_SCALE;
    u8::try_from(rounded).unwrap_or(u8::MAX)
}

/// Convert a raster to grayscale.
///
/// Each output pixel is `[L, L, L]` where `L` is the [`luminance`] of
/// the corresponding input pixel. Applying this to a raster that is
/// already grayscale returns an identical raster.
#[must_use = "returns the grayscale raster"]
pub fn to_grayscale(image: &Raster) -> Raster {
    image.map_pixels(|p| {
        let l = luminance(p);
        [l, l, l]
    })
}
