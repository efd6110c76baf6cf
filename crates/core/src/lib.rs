//! Upload pipeline for the central storage service.
//!
//! This crate contains the storage logic with ZERO web dependencies.
//!
//! # Modules
//!
//! - `keygen` - Object key generation (`prefix/YYYY/MM/token.ext`)
//! - `media` - Image resize and re-encode with pass-through fallback
//! - `storage` - S3-compatible object store and public URL construction
//! - `upload` - Per-request orchestration and temp file lifecycle

pub mod keygen;
pub mod media;
pub mod storage;
pub mod upload;
