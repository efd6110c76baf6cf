//! Upload policy and data structures.

use std::path::{Path, PathBuf};

use central_shared::{ImageSettings, UploadSettings};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use super::error::UploadError;
use crate::media::{DEFAULT_MAX_WIDTH, TargetFormat};
use crate::storage::UploadOptions;

/// Extension used when neither content nor filename yields one.
pub const FALLBACK_EXTENSION: &str = "bin";

/// Temp file prefix for received payloads.
const INPUT_PREFIX: &str = "up_";

/// Map a detected content type to the extension used in object keys.
#[must_use]
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/webp" => Some("webp"),
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "application/pdf" => Some("pdf"),
        _ => None,
    }
}

/// Immutable per-process upload settings.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Maximum accepted payload size in bytes.
    pub max_upload_bytes: u64,
    /// Prefix for generated keys.
    pub key_prefix: String,
    /// Object metadata applied on upload.
    pub options: UploadOptions,
    /// Maximum image width.
    pub max_width: u32,
    /// Preferred image encoding.
    pub target_format: TargetFormat,
    /// Directory for request temp files.
    pub temp_dir: PathBuf,
}

impl UploadPolicy {
    /// Default ceiling: 50MB.
    pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
    /// Default key prefix.
    pub const DEFAULT_KEY_PREFIX: &'static str = "uploads";

    /// Create a policy with default settings writing temp files to `temp_dir`.
    #[must_use]
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_upload_bytes: Self::DEFAULT_MAX_UPLOAD_BYTES,
            key_prefix: Self::DEFAULT_KEY_PREFIX.to_string(),
            options: UploadOptions::default(),
            max_width: DEFAULT_MAX_WIDTH,
            target_format: TargetFormat::default(),
            temp_dir: temp_dir.into(),
        }
    }

    /// Build a policy from loaded settings.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown image format.
    pub fn from_settings(
        upload: &UploadSettings,
        image: &ImageSettings,
    ) -> Result<Self, UploadError> {
        let target_format = image
            .desired_format
            .parse::<TargetFormat>()
            .map_err(UploadError::Configuration)?;
        let temp_dir = upload.temp_dir.clone().unwrap_or_else(std::env::temp_dir);

        Ok(Self::new(temp_dir)
            .with_max_upload_bytes(upload.max_upload_bytes)
            .with_key_prefix(upload.key_prefix.clone())
            .with_options(UploadOptions::new(
                upload.acl.clone(),
                upload.cache_control.clone(),
            ))
            .with_max_width(image.max_width)
            .with_target_format(target_format))
    }

    /// Set the payload ceiling.
    #[must_use]
    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set object metadata options.
    #[must_use]
    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the maximum image width.
    #[must_use]
    pub fn with_max_width(mut self, width: u32) -> Self {
        self.max_width = width;
        self
    }

    /// Set the preferred image encoding.
    #[must_use]
    pub fn with_target_format(mut self, format: TargetFormat) -> Self {
        self.target_format = format;
        self
    }

    /// Check a payload size against the ceiling.
    ///
    /// # Errors
    ///
    /// [`UploadError::EmptyInput`] for zero bytes,
    /// [`UploadError::FileTooLarge`] above the ceiling.
    pub fn check_size(&self, size: u64) -> Result<(), UploadError> {
        if size == 0 {
            return Err(UploadError::EmptyInput);
        }
        if size > self.max_upload_bytes {
            return Err(UploadError::file_too_large(size, self.max_upload_bytes));
        }
        Ok(())
    }
}

/// A received payload sitting in a request-owned temp file.
///
/// The temp file is deleted when this value is dropped.
#[derive(Debug)]
pub struct IncomingFile {
    /// Temp file holding the payload.
    pub file: NamedTempFile,
    /// Original filename hint.
    pub filename: Option<String>,
    /// Payload size in bytes.
    pub size: u64,
}

impl IncomingFile {
    /// Path of the payload on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Streams request bytes into a temp file, enforcing the size ceiling as it
/// goes.
///
/// Dropping the sink at any point removes the temp file.
#[derive(Debug)]
pub struct InputSink {
    temp: NamedTempFile,
    file: tokio::fs::File,
    written: u64,
    limit: u64,
}

impl InputSink {
    /// Create a sink with a fresh temp file in `dir`.
    ///
    /// # Errors
    ///
    /// Returns a temp file error if the file cannot be created.
    pub fn create(dir: &Path, limit: u64) -> Result<Self, UploadError> {
        let temp = tempfile::Builder::new()
            .prefix(INPUT_PREFIX)
            .tempfile_in(dir)
            .map_err(UploadError::TempFile)?;
        let file = temp.as_file().try_clone().map_err(UploadError::TempFile)?;

        Ok(Self {
            temp,
            file: tokio::fs::File::from_std(file),
            written: 0,
            limit,
        })
    }

    /// Bytes written so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk.
    ///
    /// # Errors
    ///
    /// [`UploadError::FileTooLarge`] as soon as the running total exceeds the
    /// limit; nothing past the limit is written.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        let total = self.written + chunk.len() as u64;
        if total > self.limit {
            return Err(UploadError::file_too_large(total, self.limit));
        }

        self.file
            .write_all(chunk)
            .await
            .map_err(UploadError::TempFile)?;
        self.written = total;
        Ok(())
    }

    /// Flush and hand over the payload.
    ///
    /// # Errors
    ///
    /// [`UploadError::EmptyInput`] if nothing was written.
    pub async fn finish(mut self, filename: Option<String>) -> Result<IncomingFile, UploadError> {
        self.file.flush().await.map_err(UploadError::TempFile)?;
        if self.written == 0 {
            return Err(UploadError::EmptyInput);
        }

        Ok(IncomingFile {
            file: self.temp,
            filename: filename.filter(|name| !name.trim().is_empty()),
            size: self.written,
        })
    }
}

/// Result of a stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Object key.
    pub key: String,
    /// Public URL.
    pub url: String,
    /// Detected content type of the stored bytes.
    pub content_type: String,
    /// Stored size in bytes.
    pub size: u64,
    /// Whether a normalized image was stored instead of the original.
    pub normalized: bool,
}
