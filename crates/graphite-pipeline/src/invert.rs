//! Tonal inversion of a grayscale raster.

use crate::types::Raster;

/// Invert a grayscale raster: each pixel's value `v` becomes `255 - v`.
///
/// Only the first channel is read, since grayscale pixels carry the same
/// value in all three; the result is written to every channel. The
/// operation is its own inverse.
#[must_use = "returns the inverted raster"]
pub fn invert(image: &Raster) -> Raster {
    image.map_pixels(|[v, _, _]| {
        let inv = 255 - v;
        [inv, inv, inv]
    })
}
