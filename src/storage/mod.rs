//! Object storage access.
//!
//! The [`ObjectStore`] trait is the only thing the orchestrators see. Two
//! backends implement it:
//!
//! - [`S3Store`]: any S3-compatible service (path-style addressing, explicit
//!   credentials, custom endpoint).
//! - [`LocalStore`]: a directory tree laid out as `{root}/{bucket}/{key}`,
//!   used offline and in tests.
//!
//! All calls are blocking. Writes never overwrite: a key that already holds
//! an object makes `put_file` fail with [`StorageError::AlreadyExists`], and
//! both backends enforce that at write time rather than relying on a prior
//! existence probe.

pub mod local;
pub mod s3;

use crate::config::{Config, StorageConfig};
use std::path::Path;
use thiserror::Error;

pub use local::LocalStore;
pub use s3::S3Store;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Blocking access to keyed objects grouped in buckets.
pub trait ObjectStore {
    /// Short backend name for logs and the menu header.
    fn backend_name(&self) -> &'static str;

    /// Existence probe (`HEAD`). A missing object is `Ok(false)`, not an error.
    fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Store the contents of `source` under `bucket/key`, tagged with
    /// `content_type`. Returns the number of bytes written.
    ///
    /// Fails with `AlreadyExists` if the key is taken when the write lands.
    fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> StorageResult<u64>;

    /// Stream the object at `bucket/key` into `destination`, creating or
    /// truncating it. Returns the number of bytes written.
    fn get_to_file(&self, bucket: &str, key: &str, destination: &Path) -> StorageResult<u64>;

    /// All keys in a bucket, in the backend's listing order.
    fn list(&self, bucket: &str) -> StorageResult<Vec<String>>;
}

/// Build the store selected by the configuration.
pub fn create_store(config: &Config) -> StorageResult<Box<dyn ObjectStore>> {
    match &config.storage {
        StorageConfig::S3 {
            endpoint,
            region,
            access_key,
            secret_key,
        } => {
            let store = S3Store::new(
                endpoint.clone(),
                region.clone(),
                access_key.clone(),
                secret_key.clone(),
                config.multipart_threshold,
                config.request_timeout,
            )?;
            Ok(Box::new(store))
        }
        StorageConfig::Local { root } => Ok(Box::new(LocalStore::new(root.clone())?)),
    }
}
