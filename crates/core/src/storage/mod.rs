//! Object storage for uploaded files using Apache OpenDAL.
//!
//! Supports S3-compatible stores (Hetzner Object Storage, Cloudflare R2,
//! AWS S3) and a local filesystem backend for development.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         ObjectStore                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ upload_file(path, key, opts) -> op.write_with(key, bytes)       │
//! │ delete_object(key)           -> op.delete(key)                  │
//! │ build_url(key)               -> cdn/key | endpoint/bucket/key   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod service;

pub use config::{StorageProvider, StoreConfig, UploadOptions};
pub use error::StorageError;
pub use service::{DEFAULT_CONTENT_TYPE, ObjectStore, UploadResult, detect_content_type};
