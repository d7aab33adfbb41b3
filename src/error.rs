// Error taxonomy shared by the orchestrators. Every lower-level failure
// (HTTP, S3, local I/O) is converted into one of these kinds before it
// reaches the menu layer, which only prints the message.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors reported by the client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Local file missing, remote file or storage key missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The destination object is already present; uploads never overwrite.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Login rejected by the platform.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Any network or storage failure not covered above.
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// A required startup setting is absent or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short label used by the menu when listing batch outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not found",
            Error::AlreadyExists(_) => "already exists",
            Error::Authentication(_) => "authentication",
            Error::Transfer(_) => "transfer",
            Error::Configuration(_) => "configuration",
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Error::NotFound(what),
            StorageError::AlreadyExists(what) => Error::AlreadyExists(what),
            StorageError::ConfigError(msg) => Error::Configuration(msg),
            other => Error::Transfer(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transfer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_keep_their_kind() {
        let err: Error = StorageError::NotFound("b/k".into()).into();
        assert!(matches!(err, Error::NotFound(_)));

        let err: Error = StorageError::AlreadyExists("b/k".into()).into();
        assert!(matches!(err, Error::AlreadyExists(_)));

        let err: Error = StorageError::UploadFailed("boom".into()).into();
        assert!(matches!(err, Error::Transfer(_)));
        assert_eq!(err.kind(), "transfer");
    }

    #[test]
    fn io_errors_become_transfer_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err: Error = StorageError::from(io).into();
        assert!(matches!(err, Error::Transfer(_)));
    }
}
