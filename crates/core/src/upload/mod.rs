//! Upload orchestration.
//!
//! One request flows linearly through:
//! - Size ceiling check while the payload streams into a temp file
//! - Image normalization (pass-through on any failure)
//! - Extension resolution and key generation
//! - Store upload
//! - Temp file cleanup on every exit path

mod error;
mod service;
mod types;

pub use error::UploadError;
pub use service::UploadService;
pub use types::{
    FALLBACK_EXTENSION, IncomingFile, InputSink, StoredUpload, UploadPolicy,
    extension_for_content_type,
};
