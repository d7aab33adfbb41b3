use super::{ObjectStore, StorageError, StorageResult};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

/// Local filesystem storage implementation: `{root}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(LocalStore { root })
    }

    fn bucket_path(&self, bucket: &str) -> StorageResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.contains("..") {
            return Err(StorageError::InvalidKey(format!("bad bucket name {:?}", bucket)));
        }
        Ok(self.root.join(bucket))
    }

    /// Resolve a key to a path inside its bucket directory. Keys must be
    /// relative and must not climb out with `..`.
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|segment| segment == ".." || segment.is_empty())
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.bucket_path(bucket)?.join(key))
    }
}

impl ObjectStore for LocalStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self.object_path(bucket, key)?.is_file())
    }

    fn put_file(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        _content_type: &str,
    ) -> StorageResult<u64> {
        let path = self.object_path(bucket, key)?;
        let start = Instant::now();

        let mut input = File::open(source)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // create_new makes the no-overwrite rule hold even against a writer
        // that slipped in after the existence probe.
        let mut output = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(format!("{}/{}", bucket, key)));
            }
            Err(e) => return Err(e.into()),
        };

        let copied = io::copy(&mut input, &mut output).and_then(|n| {
            output.flush()?;
            output.sync_all()?;
            Ok(n)
        });
        let size = match copied {
            Ok(n) => n,
            Err(e) => {
                drop(output);
                let _ = fs::remove_file(&path);
                return Err(StorageError::UploadFailed(format!(
                    "Failed to write {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );
        Ok(size)
    }

    fn get_to_file(&self, bucket: &str, key: &str, destination: &Path) -> StorageResult<u64> {
        let path = self.object_path(bucket, key)?;
        let start = Instant::now();

        let mut input = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
            }
            Err(e) => return Err(e.into()),
        };
        let mut output = File::create(destination)?;
        let size = io::copy(&mut input, &mut output).map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;
        output.flush()?;

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );
        Ok(size)
    }

    fn list(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let dir = self.bucket_path(bucket)?;
        if !dir.is_dir() {
            return Err(StorageError::NotFound(format!("bucket {}", bucket)));
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(&dir).unwrap_or(entry.path());
            let key: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect();
            keys.push(key.join("/"));
        }
        Ok(keys)
    }
}
