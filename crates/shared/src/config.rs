//! Application configuration management.

use std::path::PathBuf;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Object store configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Upload handling configuration.
    #[serde(default)]
    pub upload: UploadSettings,
    /// Image normalization configuration.
    #[serde(default)]
    pub image: ImageSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// S3-compatible object store settings.
///
/// Credentials, endpoint and bucket are required; they are left blank here and
/// rejected when the store is constructed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// Access key ID.
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key.
    #[serde(default)]
    pub secret_access_key: String,
    /// Endpoint URL, e.g. `https://fsn1.your-objectstorage.com`.
    #[serde(default)]
    pub endpoint: String,
    /// Bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Region.
    #[serde(default = "default_region")]
    pub region: String,
    /// Public CDN domain used instead of the endpoint when building URLs.
    #[serde(default)]
    pub cdn_domain: Option<String>,
    /// Use path-style addressing (`endpoint/bucket/key`).
    #[serde(default = "default_path_style")]
    pub path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_path_style() -> bool {
    true
}

/// Upload handling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    /// Maximum accepted payload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Prefix for generated object keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Canned ACL requested for uploaded objects.
    #[serde(default = "default_acl")]
    pub acl: String,
    /// Cache-Control header stored with uploaded objects.
    #[serde(default = "default_cache_control")]
    pub cache_control: String,
    /// Directory for request temp files (OS temp dir when unset).
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            key_prefix: default_key_prefix(),
            acl: default_acl(),
            cache_control: default_cache_control(),
            temp_dir: None,
        }
    }
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_key_prefix() -> String {
    "uploads".to_string()
}

fn default_acl() -> String {
    "public-read".to_string()
}

fn default_cache_control() -> String {
    "max-age=31536000, public".to_string()
}

/// Image normalization settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageSettings {
    /// Preferred output format: `webp`, `jpg`, `png`, or `original`.
    #[serde(default = "default_desired_format")]
    pub desired_format: String,
    /// Maximum output width in pixels.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            desired_format: default_desired_format(),
            max_width: default_max_width(),
        }
    }
}

fn default_desired_format() -> String {
    "webp".to_string()
}

fn default_max_width() -> u32 {
    1200
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Environment variables use the `CENTRAL` prefix and `__` as the section
    /// separator, e.g. `CENTRAL__STORAGE__BUCKET`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CENTRAL").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_environment() {
        let config = temp_env::with_vars_unset(
            [
                "CENTRAL__STORAGE__BUCKET",
                "CENTRAL__UPLOAD__MAX_UPLOAD_BYTES",
                "CENTRAL__IMAGE__DESIRED_FORMAT",
            ],
            AppConfig::load,
        )
        .expect("config should load");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.region, "us-east-1");
        assert!(config.storage.path_style);
        assert!(config.storage.cdn_domain.is_none());
        assert_eq!(config.upload.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.upload.key_prefix, "uploads");
        assert_eq!(config.upload.acl, "public-read");
        assert_eq!(config.upload.cache_control, "max-age=31536000, public");
        assert_eq!(config.image.desired_format, "webp");
        assert_eq!(config.image.max_width, 1200);
    }

    #[test]
    fn test_environment_overrides() {
        let config = temp_env::with_vars(
            [
                ("CENTRAL__STORAGE__BUCKET", Some("media")),
                ("CENTRAL__STORAGE__ENDPOINT", Some("https://s3.example.com")),
                ("CENTRAL__STORAGE__CDN_DOMAIN", Some("https://cdn.example.com")),
                ("CENTRAL__STORAGE__PATH_STYLE", Some("false")),
                ("CENTRAL__UPLOAD__MAX_UPLOAD_BYTES", Some("1024")),
                ("CENTRAL__IMAGE__DESIRED_FORMAT", Some("png")),
                ("CENTRAL__IMAGE__MAX_WIDTH", Some("800")),
            ],
            AppConfig::load,
        )
        .expect("config should load");

        assert_eq!(config.storage.bucket, "media");
        assert_eq!(config.storage.endpoint, "https://s3.example.com");
        assert_eq!(
            config.storage.cdn_domain.as_deref(),
            Some("https://cdn.example.com")
        );
        assert!(!config.storage.path_style);
        assert_eq!(config.upload.max_upload_bytes, 1024);
        assert_eq!(config.image.desired_format, "png");
        assert_eq!(config.image.max_width, 800);
    }
}
