//! Object store implementation.
//!
//! S3-compatible buckets go through `aws-sdk-s3`, which carries the canned
//! ACL on every put. The local filesystem provider goes through Apache
//! OpenDAL.

use std::path::Path;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use opendal::{Operator, services};
use tracing::{debug, error, info};

use super::config::{StorageProvider, StoreConfig, UploadOptions};
use super::error::StorageError;

/// Fallback content type when the bytes match no known signature.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// Object key the file was stored under.
    pub key: String,
    /// Public URL of the object.
    pub url: String,
    /// Content type detected from the file bytes.
    pub content_type: String,
    /// Uploaded size in bytes.
    pub size: u64,
}

#[derive(Debug)]
enum Backend {
    S3 {
        client: aws_sdk_s3::Client,
        bucket: String,
    },
    Fs(Operator),
}

/// Object store for uploaded files.
///
/// Cheap to share behind an `Arc`; nothing is mutated after construction.
#[derive(Debug)]
pub struct ObjectStore {
    backend: Backend,
    config: StoreConfig,
}

impl ObjectStore {
    /// Create a new object store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if required settings are missing or the provider
    /// cannot be initialized.
    pub fn from_config(config: StoreConfig) -> Result<Self, StorageError> {
        config.provider.validate()?;
        let backend = Self::create_backend(&config.provider)?;
        Ok(Self { backend, config })
    }

    fn create_backend(provider: &StorageProvider) -> Result<Backend, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
                path_style,
            } => {
                let config = s3_config(
                    endpoint,
                    access_key_id,
                    secret_access_key,
                    region,
                    *path_style,
                );
                let client = aws_sdk_s3::Client::from_conf(config.build());
                Ok(Backend::S3 {
                    client,
                    bucket: bucket.clone(),
                })
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Ok(Backend::Fs(
                    Operator::new(builder)
                        .map_err(|e| StorageError::configuration(e.to_string()))?
                        .finish(),
                ))
            }
        }
    }

    /// Upload a local file under `key`.
    ///
    /// The content type is sniffed from the file bytes, never from the name.
    /// S3 puts carry content type, cache-control and the canned ACL from
    /// `options`; blank options are left off the request. The local
    /// filesystem stores bytes only.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Input`] if the file cannot be read (no network
    /// call is made), or an operation error if the transport fails. There is
    /// no retry.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> Result<UploadResult, StorageError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| StorageError::input(local_path, e))?;
        let content_type = detect_content_type(&bytes).to_string();
        let size = bytes.len() as u64;

        debug!(key = %key, acl = %options.acl, content_type = %content_type, "Uploading object");
        if let Err(e) = self.put(key, bytes, &content_type, options).await {
            error!(key = %key, error = %e, "Object upload failed");
            return Err(e);
        }

        let url = self.build_url(key);
        info!(key = %key, size, content_type = %content_type, "Object uploaded");

        Ok(UploadResult {
            key: key.to_string(),
            url,
            content_type,
            size,
        })
    }

    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        match &self.backend {
            Backend::S3 { client, bucket } => {
                let mut request = client
                    .put_object()
                    .bucket(bucket)
                    .key(key)
                    .body(ByteStream::from(bytes))
                    .content_type(content_type);
                if !options.cache_control.is_empty() {
                    request = request.cache_control(&options.cache_control);
                }
                if !options.acl.is_empty() {
                    request = request.acl(ObjectCannedAcl::from(options.acl.as_str()));
                }

                request
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| StorageError::operation(DisplayErrorContext(&e).to_string()))
            }
            // No ACL on a local filesystem
            Backend::Fs(operator) => {
                let capability = operator.info().full_capability();
                let mut write = operator.write_with(key, bytes);
                if capability.write_with_content_type {
                    write = write.content_type(content_type);
                }
                if capability.write_with_cache_control {
                    write = write.cache_control(&options.cache_control);
                }
                write.await.map(|_| ()).map_err(StorageError::from)
            }
        }
    }

    /// Build the public URL for `key`. Pure string work, no existence check.
    ///
    /// - CDN configured: `cdn/key`
    /// - S3 path-style: `endpoint/bucket/key`
    /// - S3 virtual-host: `scheme://bucket.host/key`
    /// - Local filesystem: `file://root/key`
    #[must_use]
    pub fn build_url(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');

        if let Some(cdn) = &self.config.cdn_domain {
            return format!("{}/{key}", cdn.trim_end_matches('/'));
        }

        match &self.config.provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                path_style: true,
                ..
            } => format!("{endpoint}/{bucket}/{key}"),
            StorageProvider::S3 {
                endpoint, bucket, ..
            } => match endpoint.split_once("://") {
                Some((scheme, host)) => format!("{scheme}://{bucket}.{host}/{key}"),
                None => format!("{bucket}.{endpoint}/{key}"),
            },
            StorageProvider::LocalFs { root } => {
                let root = root.display().to_string();
                format!("file://{}/{key}", root.trim_end_matches('/'))
            }
        }
    }

    /// Delete an object. Best-effort: failures are logged and reported as
    /// `false`, never raised.
    pub async fn delete_object(&self, key: &str) -> bool {
        let outcome = match &self.backend {
            Backend::S3 { client, bucket } => client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map(|_| ())
                .map_err(|e| DisplayErrorContext(&e).to_string()),
            Backend::Fs(operator) => operator.delete(key).await.map_err(|e| e.to_string()),
        };

        match outcome {
            Ok(()) => {
                info!(key = %key, "Object deleted");
                true
            }
            Err(e) => {
                error!(key = %key, error = %e, "Object delete failed");
                false
            }
        }
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }

    /// Get the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.config.provider.bucket()
    }
}

/// Client configuration for an S3-compatible endpoint.
///
/// Only the explicit settings count: no ~/.aws profile, env credentials or
/// instance metadata.
fn s3_config(
    endpoint: &str,
    access_key_id: &str,
    secret_access_key: &str,
    region: &str,
    path_style: bool,
) -> aws_sdk_s3::config::Builder {
    aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "central-config",
        ))
        .region(Region::new(region.to_string()))
        .endpoint_url(endpoint)
        .force_path_style(path_style)
}

/// Detect a MIME type from magic bytes.
#[must_use]
pub fn detect_content_type(bytes: &[u8]) -> &'static str {
    infer::get(bytes).map_or(DEFAULT_CONTENT_TYPE, |kind| kind.mime_type())
}
