//! Image normalization error types.

use thiserror::Error;

/// Why normalization produced no artifact.
///
/// None of these are fatal to an upload: the caller falls back to storing the
/// original bytes unchanged.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Input is not a raster image we can decode.
    #[error("not a supported image")]
    NotAnImage,

    /// Input file could not be opened or read.
    #[error("input unreadable: {0}")]
    Unreadable(#[source] std::io::Error),

    /// Decoding or encoding failed inside the codec.
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    /// libwebp rejected the pixel buffer.
    #[error("webp encode error: {0}")]
    WebP(String),

    /// Temp artifact could not be created or written.
    #[error("temp file error: {0}")]
    TempFile(#[source] std::io::Error),

    /// The blocking codec task did not complete.
    #[error("image task failed: {0}")]
    Task(String),
}

impl NormalizeError {
    /// Whether the input simply was not an image, as opposed to a failure
    /// while handling one.
    #[must_use]
    pub fn is_not_an_image(&self) -> bool {
        matches!(self, Self::NotAnImage)
    }
}
