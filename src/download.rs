//! Download orchestration: resolve a file name to its storage key through
//! the platform listing, then stream the object to disk.

use crate::api::{FileRecord, PlatformClient};
use crate::error::{Error, Result};
use crate::outcome::{Outcome, TransferOutcome};
use crate::storage::{ObjectStore, StorageError};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

pub struct Downloader<'a> {
    platform: &'a PlatformClient,
    store: &'a dyn ObjectStore,
}

impl<'a> Downloader<'a> {
    pub fn new(platform: &'a PlatformClient, store: &'a dyn ObjectStore) -> Self {
        Downloader { platform, store }
    }

    /// Download the project file called `file_name` to `destination`.
    /// Returns the number of bytes written.
    ///
    /// Nothing is created locally unless the record, its key and the remote
    /// object all exist.
    pub fn download(
        &self,
        project_id: i64,
        bucket: &str,
        file_name: &str,
        destination: &Path,
    ) -> Result<u64> {
        let record = self.platform.find_file(project_id, file_name)?;
        fetch_record(self.store, &record, bucket, destination)
    }

    /// Download every file of a project into `dest_dir`, one at a time in
    /// listing order. Files already present locally are skipped untouched;
    /// a failure is recorded and the batch moves on.
    pub fn download_all(
        &self,
        project_id: i64,
        bucket: &str,
        dest_dir: &Path,
    ) -> Result<Vec<TransferOutcome>> {
        let files = self.platform.list_files(project_id)?;
        Ok(fetch_all(self.store, &files, bucket, dest_dir))
    }
}

/// Local path for a platform file name inside `dir`. Only a single plain
/// path component is accepted, so a listing cannot place files outside `dir`.
pub fn destination_in(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(name)),
        _ => Err(Error::Transfer(format!(
            "refusing to write file named {:?} outside {}",
            name,
            dir.display()
        ))),
    }
}

/// Sibling of `destination` the bytes are streamed into before the rename.
fn partial_path(destination: &Path) -> Result<PathBuf> {
    let name = destination.file_name().ok_or_else(|| {
        Error::Transfer(format!("{} is not a file path", destination.display()))
    })?;
    let mut partial = name.to_os_string();
    partial.push(".part");
    Ok(destination.with_file_name(partial))
}

/// Stream one record's object to `destination`.
///
/// The record's own `bucket` wins over `bucket` when the platform sets it.
/// Bytes land in `<destination>.part` first and replace `destination` only
/// once fully written; a failure leaves `destination` as it was.
pub fn fetch_record(
    store: &dyn ObjectStore,
    record: &FileRecord,
    bucket: &str,
    destination: &Path,
) -> Result<u64> {
    let key = record
        .storage_key
        .as_deref()
        .ok_or_else(|| Error::NotFound(format!("{} has no storage key", record.name)))?;
    let bucket = record.bucket.as_deref().unwrap_or(bucket);
    let partial = partial_path(destination)?;

    match store.exists(bucket, key) {
        Ok(true) => {}
        Ok(false) => return Err(Error::NotFound(format!("{}/{}", bucket, key))),
        Err(e) => return Err(Error::Transfer(e.to_string())),
    }

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Transfer(format!("creating {}: {}", parent.display(), e))
            })?;
        }
    }

    let fetched = store.get_to_file(bucket, key, &partial).and_then(|bytes| {
        fs::rename(&partial, destination)?;
        Ok(bytes)
    });
    match fetched {
        Ok(bytes) => {
            tracing::info!(bucket = %bucket, key = %key, size_bytes = bytes, path = %destination.display(), "Downloaded");
            Ok(bytes)
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(&partial) {
                if rm.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(path = %partial.display(), error = %rm, "Could not remove partial download");
                }
            }
            Err(match e {
                StorageError::NotFound(what) => Error::NotFound(what),
                other => Error::Transfer(other.to_string()),
            })
        }
    }
}

/// Batch body of [`Downloader::download_all`], separated from the listing
/// call.
pub fn fetch_all(
    store: &dyn ObjectStore,
    files: &[FileRecord],
    bucket: &str,
    dest_dir: &Path,
) -> Vec<TransferOutcome> {
    files
        .iter()
        .map(|record| {
            let result = destination_in(dest_dir, &record.name).and_then(|destination| {
                if destination.exists() {
                    tracing::debug!(path = %destination.display(), "Already downloaded, skipping");
                    Ok(None)
                } else {
                    fetch_record(store, record, bucket, &destination).map(Some)
                }
            });
            let outcome = match result {
                Ok(Some(bytes)) => Outcome::Transferred(bytes),
                Ok(None) => Outcome::Skipped,
                Err(e) => {
                    tracing::warn!(name = %record.name, error = %e, "Download failed, continuing");
                    Outcome::Failed(e)
                }
            };
            TransferOutcome::new(record.name.clone(), outcome)
        })
        .collect()
}
