//! The package pool publications are copied into.

use apt_repository::hash_reader;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::PoolError;
use crate::model::{pool_path, PoolFile};

/// Result of publishing a file into the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolOutcome {
    /// The file was copied in.
    Added,
    /// An identical file was already there.
    AlreadyPresent,
}

pub trait DiskPool {
    /// Place a publication's file at its pool path.
    fn publish(
        &self,
        component: &str,
        source_name: &str,
        file: &PoolFile,
    ) -> Result<PoolOutcome, PoolError>;
}

/// A pool on the local filesystem, rooted at the archive root.
#[derive(Debug, Clone)]
pub struct FilesystemPool {
    root: PathBuf,
}

impl FilesystemPool {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Absolute path of a file in the pool.
    pub fn path_for(&self, component: &str, source_name: &str, filename: &str) -> PathBuf {
        self.root.join(pool_path(component, source_name, filename))
    }
}

impl DiskPool for FilesystemPool {
    fn publish(
        &self,
        component: &str,
        source_name: &str,
        file: &PoolFile,
    ) -> Result<PoolOutcome, PoolError> {
        let target = self.path_for(component, source_name, &file.filename);

        match File::open(&target) {
            Ok(existing) => {
                let (_, digests) = hash_reader(existing).map_err(io_error)?;
                if digests.sha256 == file.sha256 {
                    return Ok(PoolOutcome::AlreadyPresent);
                }
                return Err(PoolError::Conflict {
                    path: target,
                    expected: file.sha256.clone(),
                    found: digests.sha256,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let parent = target
            .parent()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "pool path has no parent"))?;
        fs::create_dir_all(parent)?;
        let tmp = NamedTempFile::new_in(parent)?;
        fs::copy(&file.staged_path, tmp.path())?;
        tmp.persist(&target)?;
        debug!("Added {} to the pool", target.display());
        Ok(PoolOutcome::Added)
    }
}

fn io_error(e: apt_repository::AptRepositoryError) -> PoolError {
    match e {
        apt_repository::AptRepositoryError::Io(e) => PoolError::Io(e),
        other => PoolError::Io(io::Error::new(io::ErrorKind::Other, other.to_string())),
    }
}
