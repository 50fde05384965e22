//! Superseding publications that newer versions have replaced.

use chrono::{DateTime, Utc};
use debversion::Version;
use std::collections::HashMap;
use tracing::debug;

use crate::error::{PublisherError, PublisherResult};
use crate::model::{Archive, PublishingStatus, SuiteKey};
use crate::store::{PublicationFilter, PublicationStore};

pub trait Dominator {
    /// Supersede obsolete publications in one suite, returning how many
    /// records were superseded.
    fn judge_and_dominate(
        &self,
        store: &dyn PublicationStore,
        archive: &Archive,
        suite: &SuiteKey,
        now: DateTime<Utc>,
    ) -> PublisherResult<usize>;
}

/// Keeps the highest version of every source package, and of every binary
/// package per architecture.
#[derive(Debug, Default, Clone, Copy)]
pub struct VersionDominator;

fn parse_version(package: &str, version: &str) -> PublisherResult<Version> {
    version
        .parse::<Version>()
        .map_err(|_| PublisherError::InvalidVersion {
            package: package.to_string(),
            version: version.to_string(),
        })
}

/// Ids of the records that lose to a higher version under the same key.
fn losers<K, I>(records: I) -> PublisherResult<Vec<i64>>
where
    K: std::hash::Hash + Eq,
    I: IntoIterator<Item = (K, i64, String, String)>,
{
    let mut best: HashMap<K, (Version, i64)> = HashMap::new();
    let mut losers = Vec::new();
    for (key, id, package, version) in records {
        let version = parse_version(&package, &version)?;
        match best.get_mut(&key) {
            Some((best_version, best_id)) => {
                if version > *best_version {
                    losers.push(*best_id);
                    *best_version = version;
                    *best_id = id;
                } else {
                    losers.push(id);
                }
            }
            None => {
                best.insert(key, (version, id));
            }
        }
    }
    Ok(losers)
}

impl Dominator for VersionDominator {
    fn judge_and_dominate(
        &self,
        store: &dyn PublicationStore,
        archive: &Archive,
        suite: &SuiteKey,
        now: DateTime<Utc>,
    ) -> PublisherResult<usize> {
        let published = PublicationFilter::new(archive.id)
            .in_suite(suite)
            .with_statuses(&[PublishingStatus::Published]);

        let sources = store.get_sources(&published)?;
        let source_losers = losers(sources.iter().map(|p| {
            (
                p.name().to_string(),
                p.id,
                p.name().to_string(),
                p.version().to_string(),
            )
        }))?;
        for id in &source_losers {
            store.set_source_status(*id, PublishingStatus::Superseded, Some(now))?;
        }

        let binaries = store.get_binaries(&published)?;
        let binary_losers = losers(binaries.iter().map(|p| {
            (
                (p.name().to_string(), p.architecture.clone()),
                p.id,
                p.name().to_string(),
                p.version().to_string(),
            )
        }))?;
        for id in &binary_losers {
            store.set_binary_status(*id, PublishingStatus::Superseded, Some(now))?;
        }

        // Deleted records are no longer indexed once this run rewrites the
        // suite, so their files can be condemned.
        let deleted = PublicationFilter::new(archive.id)
            .in_suite(suite)
            .with_statuses(&[PublishingStatus::Deleted])
            .awaiting_removal();
        for p in store.get_sources(&deleted)? {
            store.set_source_status(p.id, PublishingStatus::Deleted, Some(now))?;
        }
        for p in store.get_binaries(&deleted)? {
            store.set_binary_status(p.id, PublishingStatus::Deleted, Some(now))?;
        }

        let superseded = source_losers.len() + binary_losers.len();
        debug!("Superseded {} publications in {}", superseded, suite);
        Ok(superseded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_losers_by_version() {
        let records = vec![
            ("hello", 1, "hello".to_string(), "1.0-1".to_string()),
            ("hello", 2, "hello".to_string(), "1.0-10".to_string()),
            ("hello", 3, "hello".to_string(), "1.0-2".to_string()),
            ("other", 4, "other".to_string(), "1:0.1".to_string()),
        ];
        let mut ids = losers(records).unwrap();
        ids.sort();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_epoch_wins() {
        let records = vec![
            ("a", 1, "a".to_string(), "1:0.1".to_string()),
            ("a", 2, "a".to_string(), "9.9".to_string()),
        ];
        assert_eq!(losers(records).unwrap(), vec![2]);
    }
}
