//! Image normalization: downsize to a maximum width and re-encode.
//!
//! Failures here never fail an upload. Anything that is not a decodable
//! JPEG/PNG/GIF/WebP, or that breaks inside the codec, yields an error the
//! upload pipeline turns into "store the original bytes".

mod codec;
mod error;
mod normalizer;

pub use codec::{DecodedImage, ImageCodec, JPEG_QUALITY, OutputFormat, RasterCodec, TargetFormat};
pub use error::NormalizeError;
pub use normalizer::{DEFAULT_MAX_WIDTH, ImageNormalizer, NormalizedImage, target_dimensions};
