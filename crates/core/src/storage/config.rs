//! Storage configuration types.

use std::path::PathBuf;

use central_shared::StorageSettings;

use super::error::StorageError;

/// Storage provider configuration.
#[derive(Debug, Clone)]
pub enum StorageProvider {
    /// S3-compatible storage: Hetzner Object Storage, Cloudflare R2, AWS S3
    S3 {
        /// S3 endpoint URL, without trailing slash.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Region.
        region: String,
        /// Path-style (`endpoint/bucket/key`) instead of virtual-host addressing.
        path_style: bool,
    },
    /// Local filesystem (development only)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
}

impl StorageProvider {
    /// Create an S3-compatible provider with path-style addressing.
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
            path_style: true,
        }
    }

    /// Create local filesystem provider (development only).
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Switch an S3 provider to virtual-host addressing. No-op for other providers.
    #[must_use]
    pub fn with_path_style(mut self, enabled: bool) -> Self {
        if let Self::S3 { path_style, .. } = &mut self {
            *path_style = enabled;
        }
        self
    }

    /// Get the provider name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::LocalFs { .. } => "local",
        }
    }

    /// Get the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } => bucket,
            Self::LocalFs { root } => root.to_str().unwrap_or("local"),
        }
    }

    /// Check that every required field is present.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing field.
    pub fn validate(&self) -> Result<(), StorageError> {
        match self {
            Self::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                ..
            } => {
                let required = [
                    ("access_key_id", access_key_id),
                    ("secret_access_key", secret_access_key),
                    ("endpoint", endpoint),
                    ("bucket", bucket),
                ];
                match required.iter().find(|(_, v)| v.trim().is_empty()) {
                    Some((field, _)) => Err(StorageError::configuration(format!(
                        "S3 configuration missing ({field})"
                    ))),
                    None => Ok(()),
                }
            }
            Self::LocalFs { root } => {
                if root.as_os_str().is_empty() {
                    Err(StorageError::configuration("local storage root is empty"))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Object store configuration. Immutable once the store is built.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Public CDN domain used for URLs instead of the provider endpoint.
    pub cdn_domain: Option<String>,
}

impl StoreConfig {
    /// Create a store config without a CDN domain.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            cdn_domain: None,
        }
    }

    /// Set the CDN domain. Blank values are treated as unset.
    #[must_use]
    pub fn with_cdn_domain(mut self, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        self.cdn_domain = (!domain.trim().is_empty()).then_some(domain);
        self
    }
}

impl From<&StorageSettings> for StoreConfig {
    fn from(settings: &StorageSettings) -> Self {
        let provider = StorageProvider::s3(
            settings.endpoint.clone(),
            settings.bucket.clone(),
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            settings.region.clone(),
        )
        .with_path_style(settings.path_style);

        let config = Self::new(provider);
        match &settings.cdn_domain {
            Some(domain) => config.with_cdn_domain(domain.clone()),
            None => config,
        }
    }
}

/// Per-object metadata applied on upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Canned ACL, e.g. `public-read`.
    pub acl: String,
    /// Cache-Control header value.
    pub cache_control: String,
}

impl UploadOptions {
    /// Default canned ACL.
    pub const DEFAULT_ACL: &'static str = "public-read";
    /// Default Cache-Control: one year, public.
    pub const DEFAULT_CACHE_CONTROL: &'static str = "max-age=31536000, public";

    /// Create upload options.
    #[must_use]
    pub fn new(acl: impl Into<String>, cache_control: impl Into<String>) -> Self {
        Self {
            acl: acl.into(),
            cache_control: cache_control.into(),
        }
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ACL, Self::DEFAULT_CACHE_CONTROL)
    }
}
