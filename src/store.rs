//! Access to source and binary publication records.

use chrono::{DateTime, Utc};
use std::cell::{Cell, RefCell};

use crate::error::PublisherResult;
use crate::model::{BinaryPublication, PublishingStatus, SourcePublication, SuiteKey};

/// Which publications to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationFilter {
    pub archive_id: i64,
    /// Statuses to include; empty means any.
    pub statuses: Vec<PublishingStatus>,
    /// Restrict to one suite.
    pub suite: Option<SuiteKey>,
    /// Only records with neither `scheduled_deletion_date` nor
    /// `date_removed` set.
    pub awaiting_removal: bool,
}

impl PublicationFilter {
    pub fn new(archive_id: i64) -> Self {
        Self {
            archive_id,
            statuses: Vec::new(),
            suite: None,
            awaiting_removal: false,
        }
    }

    pub fn with_statuses(mut self, statuses: &[PublishingStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn in_suite(mut self, suite: &SuiteKey) -> Self {
        self.suite = Some(suite.clone());
        self
    }

    pub fn awaiting_removal(mut self) -> Self {
        self.awaiting_removal = true;
        self
    }

    fn matches(
        &self,
        archive_id: i64,
        suite: &SuiteKey,
        status: PublishingStatus,
        scheduled_deletion_date: Option<DateTime<Utc>>,
        date_removed: Option<DateTime<Utc>>,
    ) -> bool {
        archive_id == self.archive_id
            && (self.statuses.is_empty() || self.statuses.contains(&status))
            && self.suite.as_ref().map_or(true, |s| s == suite)
            && (!self.awaiting_removal
                || (scheduled_deletion_date.is_none() && date_removed.is_none()))
    }

    pub fn matches_source(&self, publication: &SourcePublication) -> bool {
        self.matches(
            publication.archive_id,
            &publication.suite,
            publication.status,
            publication.scheduled_deletion_date,
            publication.date_removed,
        )
    }

    pub fn matches_binary(&self, publication: &BinaryPublication) -> bool {
        self.matches(
            publication.archive_id,
            &publication.suite,
            publication.status,
            publication.scheduled_deletion_date,
            publication.date_removed,
        )
    }
}

/// Storage of publication records.
///
/// Records come back in ascending id order; callers impose their own
/// grouping.
pub trait PublicationStore {
    fn get_sources(&self, filter: &PublicationFilter) -> PublisherResult<Vec<SourcePublication>>;

    fn get_binaries(&self, filter: &PublicationFilter) -> PublisherResult<Vec<BinaryPublication>>;

    fn set_source_status(
        &self,
        id: i64,
        status: PublishingStatus,
        scheduled_deletion_date: Option<DateTime<Utc>>,
    ) -> PublisherResult<()>;

    fn set_binary_status(
        &self,
        id: i64,
        status: PublishingStatus,
        scheduled_deletion_date: Option<DateTime<Utc>>,
    ) -> PublisherResult<()>;
}

/// In-memory publication store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryPublicationStore {
    sources: RefCell<Vec<SourcePublication>>,
    binaries: RefCell<Vec<BinaryPublication>>,
    next_id: Cell<i64>,
}

impl MemoryPublicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    /// Add a source publication, assigning it a fresh id.
    pub fn add_source(&self, mut publication: SourcePublication) -> i64 {
        publication.id = self.allocate_id();
        let id = publication.id;
        self.sources.borrow_mut().push(publication);
        id
    }

    /// Add a binary publication, assigning it a fresh id.
    pub fn add_binary(&self, mut publication: BinaryPublication) -> i64 {
        publication.id = self.allocate_id();
        let id = publication.id;
        self.binaries.borrow_mut().push(publication);
        id
    }

    pub fn source(&self, id: i64) -> Option<SourcePublication> {
        self.sources.borrow().iter().find(|p| p.id == id).cloned()
    }

    pub fn binary(&self, id: i64) -> Option<BinaryPublication> {
        self.binaries.borrow().iter().find(|p| p.id == id).cloned()
    }

    /// Mark a binary removed from the archive, as death-row processing
    /// would.
    pub fn set_binary_removed(&self, id: i64, date_removed: DateTime<Utc>) {
        if let Some(p) = self.binaries.borrow_mut().iter_mut().find(|p| p.id == id) {
            p.date_removed = Some(date_removed);
        }
    }
}

impl PublicationStore for MemoryPublicationStore {
    fn get_sources(&self, filter: &PublicationFilter) -> PublisherResult<Vec<SourcePublication>> {
        Ok(self
            .sources
            .borrow()
            .iter()
            .filter(|p| filter.matches_source(p))
            .cloned()
            .collect())
    }

    fn get_binaries(&self, filter: &PublicationFilter) -> PublisherResult<Vec<BinaryPublication>> {
        Ok(self
            .binaries
            .borrow()
            .iter()
            .filter(|p| filter.matches_binary(p))
            .cloned()
            .collect())
    }

    fn set_source_status(
        &self,
        id: i64,
        status: PublishingStatus,
        scheduled_deletion_date: Option<DateTime<Utc>>,
    ) -> PublisherResult<()> {
        if let Some(p) = self.sources.borrow_mut().iter_mut().find(|p| p.id == id) {
            p.status = status;
            p.scheduled_deletion_date = scheduled_deletion_date;
        }
        Ok(())
    }

    fn set_binary_status(
        &self,
        id: i64,
        status: PublishingStatus,
        scheduled_deletion_date: Option<DateTime<Utc>>,
    ) -> PublisherResult<()> {
        if let Some(p) = self.binaries.borrow_mut().iter_mut().find(|p| p.id == id) {
            p.status = status;
            p.scheduled_deletion_date = scheduled_deletion_date;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Pocket, PoolFile};
    use apt_repository::Source;
    use std::path::PathBuf;

    fn source(suite: SuiteKey, status: PublishingStatus) -> SourcePublication {
        SourcePublication {
            id: 0,
            archive_id: 1,
            suite,
            component: "main".to_string(),
            status,
            scheduled_deletion_date: None,
            date_removed: None,
            stanza: Source::new("hello", "1.0", "any", ""),
            files: vec![PoolFile {
                filename: "hello_1.0.dsc".to_string(),
                size: 1,
                sha256: String::new(),
                staged_path: PathBuf::from("/nonexistent"),
            }],
        }
    }

    #[test]
    fn test_filters() {
        let store = MemoryPublicationStore::new();
        let focal = SuiteKey::new("focal", Pocket::Release);
        let updates = SuiteKey::new("focal", Pocket::Updates);
        let pending = store.add_source(source(focal.clone(), PublishingStatus::Pending));
        store.add_source(source(updates.clone(), PublishingStatus::Pending));
        let deleted = store.add_source(source(focal.clone(), PublishingStatus::Deleted));

        let filter = PublicationFilter::new(1).with_statuses(&[PublishingStatus::Pending]);
        assert_eq!(store.get_sources(&filter).unwrap().len(), 2);

        let filter = filter.in_suite(&focal);
        let found = store.get_sources(&filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, pending);

        let awaiting = PublicationFilter::new(1)
            .with_statuses(&[PublishingStatus::Deleted])
            .awaiting_removal();
        assert_eq!(store.get_sources(&awaiting).unwrap()[0].id, deleted);
        store
            .set_source_status(deleted, PublishingStatus::Deleted, Some(Utc::now()))
            .unwrap();
        assert!(store.get_sources(&awaiting).unwrap().is_empty());

        assert!(store.get_sources(&PublicationFilter::new(2)).unwrap().is_empty());
    }
}
