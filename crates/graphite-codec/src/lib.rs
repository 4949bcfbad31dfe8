//! graphite-codec: Image decoding and encoding around the sketch pipeline.
//!
//! Turns uploaded image bytes into a [`Raster`] and a finished sketch back
//! into JPEG or PNG bytes, optionally wrapped in a base64 `data:` URI for
//! transports that carry images as text.

pub mod decode;
pub mod encode;

pub use decode::decode;
pub use encode::{OutputFormat, data_uri_from_bytes, encode, to_data_uri};

use graphite_pipeline::PipelineError;

/// Errors from decoding or encoding images.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The input byte slice was empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The bytes could not be decoded as a supported image format.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// The encoder rejected the raster.
    #[error("failed to encode {format} image: {source}")]
    Encode {
        /// Target format name.
        format: &'static str,
        /// Underlying encoder error.
        #[source]
        source: image::ImageError,
    },

    /// JPEG quality outside `1..=100`.
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    InvalidQuality(u8),

    /// The decoded image could not become a raster.
    #[error(transparent)]
    Raster(#[from] PipelineError),
}
