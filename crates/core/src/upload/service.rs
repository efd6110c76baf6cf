//! Upload pipeline: normalize, name, store, clean up.

use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::error::UploadError;
use super::types::{
    FALLBACK_EXTENSION, IncomingFile, InputSink, StoredUpload, UploadPolicy,
    extension_for_content_type,
};
use crate::keygen::{extension_of, generate_key};
use crate::media::{ImageNormalizer, NormalizeError, NormalizedImage};
use crate::storage::ObjectStore;

/// Orchestrates a single upload from received bytes to public URL.
#[derive(Clone)]
pub struct UploadService {
    store: Arc<ObjectStore>,
    normalizer: ImageNormalizer,
    policy: UploadPolicy,
}

impl UploadService {
    /// Create an upload service using the `image`-crate codec.
    #[must_use]
    pub fn new(store: Arc<ObjectStore>, policy: UploadPolicy) -> Self {
        let normalizer = ImageNormalizer::with_raster_codec(policy.temp_dir.clone());
        Self::with_normalizer(store, normalizer, policy)
    }

    /// Create an upload service with an explicit normalizer.
    #[must_use]
    pub fn with_normalizer(
        store: Arc<ObjectStore>,
        normalizer: ImageNormalizer,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            normalizer,
            policy,
        }
    }

    /// Get the upload policy.
    #[must_use]
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Get the object store.
    #[must_use]
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Open a sink for an incoming payload, bounded by the policy ceiling.
    ///
    /// # Errors
    ///
    /// Returns a temp file error if the sink cannot be created.
    pub fn begin(&self) -> Result<InputSink, UploadError> {
        InputSink::create(&self.policy.temp_dir, self.policy.max_upload_bytes)
    }

    /// Store a received payload.
    ///
    /// Images are normalized first; if that yields nothing the original bytes
    /// are stored. The key is `prefix/YYYY/MM/token.ext` where `ext` comes
    /// from the stored content type, then the filename hint, then `bin`.
    /// Both temp files are removed before this returns, on every path.
    ///
    /// # Errors
    ///
    /// Size violations are rejected before any processing. Store failures
    /// surface as [`UploadError::Storage`] without retry.
    pub async fn process(&self, input: IncomingFile) -> Result<StoredUpload, UploadError> {
        self.policy.check_size(input.size)?;

        let normalized = self.normalize(input.path()).await;
        let upload_path = normalized
            .as_ref()
            .map_or_else(|| input.path(), NormalizedImage::path);
        let ext = resolve_extension(
            normalized.as_ref().map(NormalizedImage::path),
            input.filename.as_deref(),
        );
        let key = generate_key(&self.policy.key_prefix, &format!("file.{ext}"));

        let outcome = self
            .store
            .upload_file(upload_path, &key, &self.policy.options)
            .await;

        let is_normalized = normalized.is_some();
        if let Some(image) = normalized {
            release(image.file);
        }
        release(input.file);

        let result = outcome?;
        info!(
            key = %result.key,
            size = result.size,
            content_type = %result.content_type,
            normalized = is_normalized,
            "Upload stored"
        );

        Ok(StoredUpload {
            key: result.key,
            url: result.url,
            content_type: result.content_type,
            size: result.size,
            normalized: is_normalized,
        })
    }

    /// Run the normalizer on the blocking pool. `None` means "store the
    /// original".
    async fn normalize(&self, input: &Path) -> Option<NormalizedImage> {
        let normalizer = self.normalizer.clone();
        let path = input.to_path_buf();
        let (max_width, target) = (self.policy.max_width, self.policy.target_format);

        let outcome = tokio::task::spawn_blocking(move || {
            normalizer.normalize(&path, max_width, target)
        })
        .await
        .unwrap_or_else(|e| Err(NormalizeError::Task(e.to_string())));

        match outcome {
            Ok(image) => {
                debug!(
                    width = image.width,
                    height = image.height,
                    resized = image.resized,
                    format = image.format.extension(),
                    "Image normalized"
                );
                Some(image)
            }
            Err(e) if e.is_not_an_image() => {
                debug!("Input is not an image, storing original bytes");
                None
            }
            Err(e) => {
                warn!(error = %e, "Image processing failed, storing original bytes");
                None
            }
        }
    }
}

/// Pick the key extension: sniffed type of the normalized artifact, then the
/// filename hint, then [`FALLBACK_EXTENSION`].
fn resolve_extension(normalized: Option<&Path>, filename: Option<&str>) -> String {
    let sniffed = normalized
        .and_then(|path| infer::get_from_path(path).ok().flatten())
        .and_then(|kind| extension_for_content_type(kind.mime_type()))
        .map(str::to_string);

    sniffed
        .or_else(|| filename.and_then(extension_of))
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Delete a request temp file, logging instead of failing.
fn release(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        warn!(path = %path.display(), error = %e, "Failed to remove temp file");
    }
}
