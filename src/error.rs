//! Error types for the publisher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a publisher run, or a single suite's Release.
#[derive(Error, Debug)]
pub enum PublisherError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Moving a temporary file into place failed.
    #[error("Failed to persist temporary file: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// Reading or writing APT metadata failed.
    #[error("APT metadata error: {0}")]
    Metadata(#[from] apt_repository::AptRepositoryError),

    /// Serialising a record for storage failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A record refers to a series the distribution does not have.
    #[error("Unknown series: {0}")]
    UnknownSeries(String),

    /// A version string could not be parsed.
    #[error("Invalid version {version} for {package}")]
    InvalidVersion {
        /// Package the version belongs to.
        package: String,
        /// The offending version string.
        version: String,
    },

    /// The registry has a row for a by-hash file but no content for it.
    #[error("No content recorded for archive file {id} ({path})")]
    MissingArchiveFileContent {
        /// Registry row id.
        id: i64,
        /// Path relative to the suite directory.
        path: String,
    },

    /// GPG operation failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// A protected suite reached the write stages marked dirty. This means
    /// an earlier stage marked it without going through the legality check.
    #[error("Suite {suite} is marked dirty but may not be modified")]
    ProtectedSuiteTainted {
        /// Name of the suite, e.g. `focal`.
        suite: String,
    },
}

/// Result type for publisher operations.
pub type PublisherResult<T> = Result<T, PublisherError>;

/// Errors from placing files into the package pool.
#[derive(Error, Debug)]
pub enum PoolError {
    /// A different file already lives at the target pool path.
    #[error("Pool file {path} exists with sha256 {found}, expected {expected}")]
    Conflict {
        /// Absolute pool path.
        path: PathBuf,
        /// Digest of the file being published.
        expected: String,
        /// Digest of the file already in the pool.
        found: String,
    },

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Moving the staged copy into the pool failed.
    #[error("Failed to persist pool file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl From<PoolError> for PublisherError {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::Io(e) => PublisherError::Io(e),
            PoolError::Persist(e) => PublisherError::Persist(e),
            conflict @ PoolError::Conflict { .. } => {
                PublisherError::Io(std::io::Error::new(std::io::ErrorKind::AlreadyExists, conflict))
            }
        }
    }
}
