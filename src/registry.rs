//! Bookkeeping of files published into by-hash trees.

use apt_repository::{hash_data, ContentDigests};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

use crate::error::{PublisherError, PublisherResult};

/// A file the archive has published into a by-hash tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFile {
    pub id: i64,
    pub archive_id: i64,
    /// Namespace of the file, `release:<suite>` for suite indices.
    pub container: String,
    /// Path relative to the suite directory.
    pub path: String,
    pub size: u64,
    pub digests: ContentDigests,
    /// When set, the file is no longer current and will be reaped once
    /// this passes.
    pub scheduled_deletion_date: Option<DateTime<Utc>>,
}

/// Container name for a suite's Release-listed files.
pub fn release_container(suite_name: &str) -> String {
    format!("release:{}", suite_name)
}

/// Storage for [`ArchiveFile`] rows and their content.
pub trait ArchiveFileRegistry {
    /// All files of a container, in id order.
    fn get_by_archive(&self, archive_id: i64, container: &str) -> PublisherResult<Vec<ArchiveFile>>;

    /// Record a new file, storing its content.
    fn new_from_file(
        &self,
        archive_id: i64,
        container: &str,
        path: &str,
        content: &[u8],
    ) -> PublisherResult<ArchiveFile>;

    /// Condemn files, to be reaped at `when`.
    fn schedule_deletion(&self, ids: &[i64], when: DateTime<Utc>) -> PublisherResult<()>;

    /// Make condemned files current again.
    fn unschedule_deletion(&self, ids: &[i64]) -> PublisherResult<()>;

    /// Delete rows whose scheduled deletion date is before `now`, returning
    /// them.
    fn reap(
        &self,
        archive_id: i64,
        container: &str,
        now: DateTime<Utc>,
    ) -> PublisherResult<Vec<ArchiveFile>>;

    /// Stored content of a file.
    fn read_content(&self, file: &ArchiveFile) -> PublisherResult<Vec<u8>>;
}

/// In-memory registry, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryArchiveFileRegistry {
    files: RefCell<Vec<(ArchiveFile, Vec<u8>)>>,
    next_id: Cell<i64>,
}

impl MemoryArchiveFileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row of every container.
    pub fn all(&self) -> Vec<ArchiveFile> {
        self.files.borrow().iter().map(|(f, _)| f.clone()).collect()
    }
}

impl ArchiveFileRegistry for MemoryArchiveFileRegistry {
    fn get_by_archive(&self, archive_id: i64, container: &str) -> PublisherResult<Vec<ArchiveFile>> {
        Ok(self
            .files
            .borrow()
            .iter()
            .filter(|(f, _)| f.archive_id == archive_id && f.container == container)
            .map(|(f, _)| f.clone())
            .collect())
    }

    fn new_from_file(
        &self,
        archive_id: i64,
        container: &str,
        path: &str,
        content: &[u8],
    ) -> PublisherResult<ArchiveFile> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        let (size, digests) = hash_data(content);
        let file = ArchiveFile {
            id,
            archive_id,
            container: container.to_string(),
            path: path.to_string(),
            size,
            digests,
            scheduled_deletion_date: None,
        };
        self.files.borrow_mut().push((file.clone(), content.to_vec()));
        Ok(file)
    }

    fn schedule_deletion(&self, ids: &[i64], when: DateTime<Utc>) -> PublisherResult<()> {
        for (file, _) in self.files.borrow_mut().iter_mut() {
            if ids.contains(&file.id) {
                file.scheduled_deletion_date = Some(when);
            }
        }
        Ok(())
    }

    fn unschedule_deletion(&self, ids: &[i64]) -> PublisherResult<()> {
        for (file, _) in self.files.borrow_mut().iter_mut() {
            if ids.contains(&file.id) {
                file.scheduled_deletion_date = None;
            }
        }
        Ok(())
    }

    fn reap(
        &self,
        archive_id: i64,
        container: &str,
        now: DateTime<Utc>,
    ) -> PublisherResult<Vec<ArchiveFile>> {
        let mut reaped = Vec::new();
        self.files.borrow_mut().retain(|(file, _)| {
            let due = file.archive_id == archive_id
                && file.container == container
                && file.scheduled_deletion_date.map_or(false, |d| d < now);
            if due {
                reaped.push(file.clone());
            }
            !due
        });
        Ok(reaped)
    }

    fn read_content(&self, file: &ArchiveFile) -> PublisherResult<Vec<u8>> {
        self.files
            .borrow()
            .iter()
            .find(|(f, _)| f.id == file.id)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| PublisherError::MissingArchiveFileContent {
                id: file.id,
                path: file.path.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_schedule_and_reap() {
        let registry = MemoryArchiveFileRegistry::new();
        let container = release_container("focal");
        let now = Utc::now();
        let a = registry
            .new_from_file(1, &container, "main/source/Sources", b"a")
            .unwrap();
        let b = registry
            .new_from_file(1, &container, "main/source/Sources.gz", b"b")
            .unwrap();
        registry.new_from_file(1, "release:jammy", "Sources", b"c").unwrap();

        assert_eq!(registry.get_by_archive(1, &container).unwrap().len(), 2);
        assert_eq!(a.digests, hash_data(b"a").1);

        registry
            .schedule_deletion(&[a.id, b.id], now + Duration::days(1))
            .unwrap();
        registry.unschedule_deletion(&[b.id]).unwrap();
        assert!(registry.reap(1, &container, now).unwrap().is_empty());

        let reaped = registry
            .reap(1, &container, now + Duration::days(1) + Duration::seconds(1))
            .unwrap();
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].id, a.id);
        assert_eq!(registry.read_content(&b).unwrap(), b"b");
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn test_read_content_of_reaped_file() {
        let registry = MemoryArchiveFileRegistry::new();
        let container = release_container("focal");
        let now = Utc::now();
        let a = registry
            .new_from_file(1, &container, "main/source/Sources", b"a")
            .unwrap();
        registry.schedule_deletion(&[a.id], now).unwrap();
        registry.reap(1, &container, now + Duration::seconds(1)).unwrap();

        assert!(matches!(
            registry.read_content(&a),
            Err(PublisherError::MissingArchiveFileContent { id, .. }) if id == a.id
        ));
    }
}
