//! Upload orchestration.
//!
//! Two interchangeable protocols sit behind [`UploadProtocol`]:
//!
//! - [`DirectUpload`] writes straight to the project bucket. It refuses to
//!   overwrite: an existing key is reported as `AlreadyExists`, first by a
//!   `HEAD` probe and again by the store's conditional write.
//! - [`ApiMediatedUpload`] lets the platform record the file first:
//!   initiate, obtain a signed URL, PUT the bytes, finalize. The steps run
//!   in that order and the first failure ends the attempt; a session that
//!   never reaches finalize stays `pending` on the platform.

use crate::api::{PlatformClient, UploadSession};
use crate::config::ProtocolKind;
use crate::error::{Error, Result};
use crate::media::content_type_for;
use crate::outcome::{Outcome, TransferOutcome};
use crate::storage::ObjectStore;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where an upload should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub project_id: i64,
    pub bucket: String,
    pub key: String,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub bytes: u64,
    /// Finalized platform session, for API-mediated uploads.
    pub session: Option<UploadSession>,
}

pub trait UploadProtocol {
    fn name(&self) -> &'static str;

    fn upload(&self, source: &Path, target: &UploadTarget) -> Result<UploadReceipt>;
}

/// Select the configured protocol.
pub fn protocol_for<'a>(
    kind: ProtocolKind,
    store: &'a dyn ObjectStore,
    platform: &'a PlatformClient,
) -> Box<dyn UploadProtocol + 'a> {
    match kind {
        ProtocolKind::Direct => Box::new(DirectUpload::new(store)),
        ProtocolKind::ApiMediated => Box::new(ApiMediatedUpload::new(platform)),
    }
}

/// Size of a local regular file, or `NotFound`.
fn local_file_size(source: &Path) -> Result<u64> {
    match fs::metadata(source) {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Err(Error::NotFound(format!("{} is not a file", source.display()))),
        Err(e) => Err(Error::NotFound(format!("{}: {}", source.display(), e))),
    }
}

pub struct DirectUpload<'a> {
    store: &'a dyn ObjectStore,
}

impl<'a> DirectUpload<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        DirectUpload { store }
    }
}

impl UploadProtocol for DirectUpload<'_> {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn upload(&self, source: &Path, target: &UploadTarget) -> Result<UploadReceipt> {
        local_file_size(source)?;

        if self.store.exists(&target.bucket, &target.key)? {
            return Err(Error::AlreadyExists(format!(
                "{}/{}",
                target.bucket, target.key
            )));
        }

        let content_type = content_type_for(source);
        let bytes = self
            .store
            .put_file(&target.bucket, &target.key, source, content_type)?;
        Ok(UploadReceipt {
            bytes,
            session: None,
        })
    }
}

pub struct ApiMediatedUpload<'a> {
    platform: &'a PlatformClient,
}

impl<'a> ApiMediatedUpload<'a> {
    pub fn new(platform: &'a PlatformClient) -> Self {
        ApiMediatedUpload { platform }
    }
}

impl UploadProtocol for ApiMediatedUpload<'_> {
    fn name(&self) -> &'static str {
        "api-mediated"
    }

    fn upload(&self, source: &Path, target: &UploadTarget) -> Result<UploadReceipt> {
        let size = local_file_size(source)?;
        let content_type = content_type_for(source);

        let session =
            self.platform
                .initiate_upload(target.project_id, &target.key, size, content_type)?;
        tracing::debug!(session_id = session.id, key = %target.key, "Upload session opened");

        let abandon = |err: Error| {
            tracing::warn!(
                session_id = session.id,
                error = %err,
                "Upload session left pending"
            );
            err
        };

        let url = self.platform.transfer_target(session.id).map_err(abandon)?;
        let bytes = self
            .platform
            .put_signed(&url, source, content_type)
            .map_err(abandon)?;
        let session = self.platform.finalize_upload(session.id).map_err(abandon)?;

        tracing::info!(session_id = session.id, size_bytes = bytes, key = %target.key, "Upload finalized");
        Ok(UploadReceipt {
            bytes,
            session: Some(session),
        })
    }
}

/// Key of `path` relative to `root`, joined with `/`.
fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every file under `dir` in name order, keyed by its path relative to
/// `dir`. Entries whose name starts with `.` are skipped along with their
/// contents. Symlinks to files are included; linked directories are not
/// descended. An entry the walk cannot read comes back as an error under
/// its own key.
pub fn collect_files(dir: &Path) -> Vec<(String, Result<PathBuf>)> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|entry| match entry {
            Ok(entry) => {
                let is_file = entry.file_type().is_file()
                    || (entry.path_is_symlink() && entry.path().is_file());
                is_file.then(|| (relative_key(dir, entry.path()), Ok(entry.into_path())))
            }
            Err(e) => {
                let key = e
                    .path()
                    .map(|p| relative_key(dir, p))
                    .unwrap_or_else(|| dir.display().to_string());
                let err = Error::Transfer(format!("reading {}: {}", key, e));
                Some((key, Err(err)))
            }
        })
        .collect()
}

/// Upload every file of a directory tree to `bucket`, one at a time.
/// A failed file is recorded and the walk continues.
pub fn upload_directory(
    protocol: &dyn UploadProtocol,
    project_id: i64,
    bucket: &str,
    dir: &Path,
) -> Result<Vec<TransferOutcome>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("directory {}", dir.display())));
    }

    let outcomes = collect_files(dir)
        .into_iter()
        .map(|(key, file)| {
            let target = UploadTarget {
                project_id,
                bucket: bucket.to_string(),
                key: key.clone(),
            };
            let outcome = match file.and_then(|path| protocol.upload(&path, &target)) {
                Ok(receipt) => Outcome::Transferred(receipt.bytes),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Upload failed, continuing");
                    Outcome::Failed(e)
                }
            };
            TransferOutcome::new(key, outcome)
        })
        .collect();
    Ok(outcomes)
}
