//! Encoding rasters for storage and transport.

use std::fmt;
use std::path::Path;

use base64::Engine;
use graphite_pipeline::Raster;
use image::ImageEncoder;
use tracing::{debug, instrument};

use crate::CodecError;

/// Output container for an encoded sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Baseline JPEG at the given quality (`1..=100`).
    Jpeg {
        /// Encoder quality.
        quality: u8,
    },
    /// Lossless PNG.
    Png,
}

impl OutputFormat {
    /// Default JPEG quality.
    pub const DEFAULT_JPEG_QUALITY: u8 = 90;

    /// JPEG at [`Self::DEFAULT_JPEG_QUALITY`].
    pub const JPEG: Self = Self::Jpeg {
        quality: Self::DEFAULT_JPEG_QUALITY,
    };

    /// Infer the format from a file extension (case-insensitive).
    ///
    /// Returns `None` for unknown or missing extensions.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(Self::JPEG),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    /// MIME type, as used in `data:` URIs.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Conventional file extension without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "JPEG",
            Self::Png => "PNG",
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::JPEG
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg { quality } => write!(f, "JPEG (quality {quality})"),
            Self::Png => f.write_str("PNG"),
        }
    }
}

/// Encode a raster as JPEG or PNG bytes.
///
/// # Errors
///
/// Returns [`CodecError::InvalidQuality`] if a JPEG quality is outside
/// `1..=100`.
/// Returns [`CodecError::Encode`] if the encoder fails.
#[instrument(skip_all, fields(dimensions = %raster.dimensions(), %format))]
pub fn encode(raster: &Raster, format: OutputFormat) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    let (width, height) = (raster.width(), raster.height());
    let raw = raster.to_rgb_image();

    let written = match format {
        OutputFormat::Jpeg { quality } => {
            if !(1..=100).contains(&quality) {
                return Err(CodecError::InvalidQuality(quality));
            }
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality).write_image(
                raw.as_raw(),
                width,
                height,
                image::ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::Png => image::codecs::png::PngEncoder::new(&mut buf).write_image(
            raw.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        ),
    };
    written.map_err(|source| CodecError::Encode {
        format: format.name(),
        source,
    })?;

    debug!(bytes = buf.len(), "encoded image");
    Ok(buf)
}

/// Encode a raster and wrap it in a base64 `data:` URI, e.g.
/// `data:image/jpeg;base64,/9j/4AAQ...`.
///
/// # Errors
///
/// Same as [`encode`].
pub fn to_data_uri(raster: &Raster, format: OutputFormat) -> Result<String, CodecError> {
    let bytes = encode(raster, format)?;
    Ok(data_uri_from_bytes(&bytes, format))
}

/// Wrap bytes already encoded as `format` in a base64 `data:` URI.
#[must_use]
pub fn data_uri_from_bytes(bytes: &[u8], format: OutputFormat) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{payload}", format.mime_type())
}
