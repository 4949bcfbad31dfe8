//! Decoding uploaded bytes into a [`Raster`].

use graphite_pipeline::Raster;
use tracing::{debug, instrument};

use crate::CodecError;

/// Decode raw image bytes into an RGB raster.
///
/// Supports PNG, JPEG, BMP, and WebP (whatever the `image` crate is built
/// with). Alpha is discarded; palette and grayscale inputs are expanded
/// to three channels.
///
/// # Errors
///
/// Returns [`CodecError::EmptyInput`] if `bytes` is empty.
/// Returns [`CodecError::Decode`] if the format is unrecognized or the
/// data is corrupt.
/// Returns [`CodecError::Raster`] if the decoded image has a zero
/// dimension.
#[instrument(skip_all, fields(len = bytes.len()))]
pub fn decode(bytes: &[u8]) -> Result<Raster, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::EmptyInput);
    }

    let format = image::guess_format(bytes).map_err(CodecError::Decode)?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(CodecError::Decode)?;
    let raster = Raster::try_from(img.to_rgb8())?;
    debug!(?format, dimensions = %raster.dimensions(), "decoded image");
    Ok(raster)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{ImageEncoder, Rgba, RgbaImage};

    use super::*;

    fn png_bytes(img: &RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        encoder
            .write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                image::ExtendedColorType::Rgba8,
            )
            .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode(&[]), Err(CodecError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn truncated_png_returns_decode_error() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let bytes = png_bytes(&img);
        let result = decode(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn decodes_png_and_drops_alpha() {
        let img = RgbaImage::from_fn(3, 2, |x, y| {
            Rgba([(x * 80) as u8, (y * 100) as u8, 7, (x * 50) as u8])
        });
        let raster = decode(&png_bytes(&img)).unwrap();
        assert_eq!(raster.width(), 3);
        assert_eq!(raster.height(), 2);
        assert_eq!(raster.get(2, 1), Some([160, 100, 7]));
        assert_eq!(raster.get(0, 0), Some([0, 0, 7]));
    }

    #[test]
    fn decodes_grayscale_png_as_equal_channels() {
        let gray = image::GrayImage::from_fn(5, 5, |x, _| image::Luma([(x * 50) as u8]));
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(gray.as_raw(), 5, 5, image::ExtendedColorType::L8)
            .unwrap();
        let raster = decode(&buf).unwrap();
        assert!(raster.is_grayscale());
        assert_eq!(raster.get(4, 0), Some([200, 200, 200]));
    }
}
