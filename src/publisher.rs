//! The publishing pipeline for one archive.
//!
//! A run goes through five stages in order:
//!
//! 1. publish pending records into the pool,
//! 2. mark suites with pending deletions dirty,
//! 3. dominate,
//! 4. write indices for dirty suites,
//! 5. write Release files.
//!
//! Which suites each stage touches is decided by [`plan_suite`] from a
//! [`SuiteState`], so the skip rules can be tested without a disk tree.

use chrono::Duration;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::dominator::Dominator;
use crate::error::{PoolError, PublisherError, PublisherResult};
use crate::index_writer::IndexWriter;
use crate::model::{
    Archive, BinaryPublication, Distribution, DistroSeries, PoolFile, PublishingStatus,
    SourcePublication, SuiteKey,
};
use crate::pool::{DiskPool, PoolOutcome};
use crate::registry::ArchiveFileRegistry;
use crate::release_writer::{ReleaseFileBuilder, BY_HASH_STAY_OF_EXECUTION_HOURS};
use crate::signing::SigningService;
use crate::store::{PublicationFilter, PublicationStore};

/// Per-stage careful flags. A careful stage processes every suite instead
/// of only the dirty ones.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CarefulFlags {
    pub publishing: bool,
    pub domination: bool,
    pub apt: bool,
    pub release: bool,
}

impl CarefulFlags {
    /// Every stage set to `careful`.
    pub fn all(careful: bool) -> Self {
        Self {
            publishing: careful,
            domination: careful,
            apt: careful,
            release: careful,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Publish,
    MarkDeletionsDirty,
    Dominate,
    WriteIndexes,
    WriteReleaseFiles,
}

impl Stage {
    pub fn first() -> Stage {
        Stage::Publish
    }

    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Publish => Some(Stage::MarkDeletionsDirty),
            Stage::MarkDeletionsDirty => Some(Stage::Dominate),
            Stage::Dominate => Some(Stage::WriteIndexes),
            Stage::WriteIndexes => Some(Stage::WriteReleaseFiles),
            Stage::WriteReleaseFiles => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Publish => "A: publishing",
            Stage::MarkDeletionsDirty => "A2: marking pockets with deletions dirty",
            Stage::Dominate => "B: dominating",
            Stage::WriteIndexes => "C: writing indexes",
            Stage::WriteReleaseFiles => "D: writing Release files",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Suites touched so far in a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineContext {
    /// Suites whose content changed and need new indices.
    pub dirty_suites: BTreeSet<SuiteKey>,
    /// Suites whose Release needs rewriting.
    pub release_files_needed: BTreeSet<SuiteKey>,
}

/// What the pipeline knows about a suite when a stage reaches it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SuiteState {
    /// Not excluded by a suite restriction.
    pub allowed: bool,
    /// The archive publishes this series.
    pub considered: bool,
    /// The archive may not modify this suite.
    pub protected: bool,
    pub dirty: bool,
    pub release_needed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAllowed,
    NotConsidered,
    Protected,
    NotDirty,
    AlreadyDirty,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::NotAllowed => "not selected for this run",
            SkipReason::NotConsidered => "in a series this archive does not publish",
            SkipReason::Protected => "not modifiable",
            SkipReason::NotDirty => "unchanged",
            SkipReason::AlreadyDirty => "already dirty",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteDecision {
    Process,
    Skip(SkipReason),
    /// The suite is protected yet marked dirty.
    Tainted,
}

/// Decide what `stage` does with a suite.
pub fn plan_suite(stage: Stage, state: &SuiteState, careful: bool) -> SuiteDecision {
    use SuiteDecision::*;

    if !state.allowed {
        return Skip(SkipReason::NotAllowed);
    }
    if !state.considered {
        return Skip(SkipReason::NotConsidered);
    }
    match stage {
        Stage::Publish => {
            if state.protected && !careful {
                Skip(SkipReason::Protected)
            } else {
                Process
            }
        }
        Stage::MarkDeletionsDirty => {
            if state.dirty {
                Skip(SkipReason::AlreadyDirty)
            } else if state.protected {
                Skip(SkipReason::Protected)
            } else {
                Process
            }
        }
        Stage::Dominate => {
            if careful {
                Process
            } else if state.protected {
                Skip(SkipReason::Protected)
            } else if !state.dirty {
                Skip(SkipReason::NotDirty)
            } else {
                Process
            }
        }
        Stage::WriteIndexes => {
            if state.protected {
                if state.dirty && !careful {
                    Tainted
                } else {
                    Skip(SkipReason::Protected)
                }
            } else if !careful && !state.dirty {
                Skip(SkipReason::NotDirty)
            } else {
                Process
            }
        }
        Stage::WriteReleaseFiles => {
            if state.protected {
                Skip(SkipReason::Protected)
            } else if !careful && !state.release_needed {
                Skip(SkipReason::NotDirty)
            } else {
                Process
            }
        }
    }
}

/// Counts of what a run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub sources_published: usize,
    pub binaries_published: usize,
    /// Records rejected or left for a later run.
    pub records_skipped: usize,
    /// Suites marked dirty because of pending deletions.
    pub deletion_suites: usize,
    pub superseded: usize,
    /// Suites whose indices were written.
    pub suites_indexed: usize,
    /// Index files whose content changed.
    pub index_files_changed: usize,
    pub release_files_written: usize,
    /// Suites that ended the run dirty.
    pub dirty_suites: Vec<String>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "published {} sources and {} binaries ({} skipped), {} superseded, \
             indexed {} suites ({} files changed), wrote {} Release files; dirty: [{}]",
            self.sources_published,
            self.binaries_published,
            self.records_skipped,
            self.superseded,
            self.suites_indexed,
            self.index_files_changed,
            self.release_files_written,
            self.dirty_suites.join(", ")
        )
    }
}

pub struct Publisher<'a> {
    archive: &'a Archive,
    distribution: &'a Distribution,
    store: &'a dyn PublicationStore,
    registry: &'a dyn ArchiveFileRegistry,
    pool: &'a dyn DiskPool,
    dominator: &'a dyn Dominator,
    signer: Option<&'a dyn SigningService>,
    clock: &'a dyn Clock,
    allowed_suites: Option<BTreeSet<SuiteKey>>,
    careful: CarefulFlags,
    stay_of_execution: Duration,
}

impl<'a> Publisher<'a> {
    pub fn new(
        archive: &'a Archive,
        distribution: &'a Distribution,
        store: &'a dyn PublicationStore,
        registry: &'a dyn ArchiveFileRegistry,
        pool: &'a dyn DiskPool,
        dominator: &'a dyn Dominator,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            archive,
            distribution,
            store,
            registry,
            pool,
            dominator,
            signer: None,
            clock,
            allowed_suites: None,
            careful: CarefulFlags::default(),
            stay_of_execution: Duration::hours(BY_HASH_STAY_OF_EXECUTION_HOURS),
        }
    }

    pub fn with_signer(mut self, signer: Option<&'a dyn SigningService>) -> Self {
        self.signer = signer;
        self
    }

    /// Restrict the run to these suites. An empty list means no
    /// restriction.
    pub fn with_allowed_suites(mut self, suites: Vec<SuiteKey>) -> Self {
        self.allowed_suites = if suites.is_empty() {
            None
        } else {
            Some(suites.into_iter().collect())
        };
        self
    }

    pub fn with_careful(mut self, careful: CarefulFlags) -> Self {
        self.careful = careful;
        self
    }

    pub fn with_stay_of_execution(mut self, stay_of_execution: Duration) -> Self {
        self.stay_of_execution = stay_of_execution;
        self
    }

    pub fn is_allowed(&self, suite: &SuiteKey) -> bool {
        self.allowed_suites
            .as_ref()
            .map_or(true, |allowed| allowed.contains(suite))
    }

    /// Whether records may be published into this suite.
    pub fn check_legal_pocket(&self, series: &DistroSeries, suite: &SuiteKey, careful: bool) -> bool {
        self.archive.consider_series(series)
            && (careful || !self.archive.cannot_modify_suite(series, suite.pocket))
    }

    pub fn mark_pocket_dirty(&self, ctx: &mut PipelineContext, suite: &SuiteKey) {
        if self.is_allowed(suite) && ctx.dirty_suites.insert(suite.clone()) {
            debug!("Marked {} dirty", suite);
        }
    }

    fn suite_state(&self, ctx: &PipelineContext, suite: &SuiteKey, series: &DistroSeries) -> SuiteState {
        SuiteState {
            allowed: self.is_allowed(suite),
            considered: self.archive.consider_series(series),
            protected: self.archive.cannot_modify_suite(series, suite.pocket),
            dirty: ctx.dirty_suites.contains(suite),
            release_needed: ctx.release_files_needed.contains(suite),
        }
    }

    /// Fail if a suite the archive may not modify has been marked dirty.
    pub fn check_dirty_suite_before_publishing(
        &self,
        ctx: &PipelineContext,
        suite: &SuiteKey,
    ) -> PublisherResult<()> {
        let series = self.series(suite)?;
        if ctx.dirty_suites.contains(suite) && self.archive.cannot_modify_suite(series, suite.pocket)
        {
            error!(
                "{} in {} is marked dirty but may not be modified",
                suite, self.archive.name
            );
            return Err(PublisherError::ProtectedSuiteTainted {
                suite: suite.suite_name(),
            });
        }
        Ok(())
    }

    fn series(&self, suite: &SuiteKey) -> PublisherResult<&'a DistroSeries> {
        self.distribution
            .get_series(&suite.series)
            .ok_or_else(|| PublisherError::UnknownSeries(suite.series.clone()))
    }

    fn sort_key(&self, suite: &SuiteKey, id: i64) -> (Option<i64>, SuiteKey, std::cmp::Reverse<i64>) {
        let series_id = self.distribution.get_series(&suite.series).map(|s| s.id);
        (series_id, suite.clone(), std::cmp::Reverse(id))
    }

    /// Decide whether a record may be written to the pool, returning
    /// whether its suite should be marked dirty.
    fn admit(
        &self,
        ctx: &PipelineContext,
        summary: &mut RunSummary,
        suite: &SuiteKey,
        status: PublishingStatus,
        what: &str,
    ) -> PublisherResult<Option<bool>> {
        let careful = self.careful.publishing;
        let Some(series) = self.distribution.get_series(&suite.series) else {
            error!("{} refers to unknown series {}, skipping", what, suite.series);
            summary.records_skipped += 1;
            return Ok(None);
        };
        let state = self.suite_state(ctx, suite, series);
        if !state.allowed {
            return Ok(None);
        }
        if !self.check_legal_pocket(series, suite, careful) {
            let reason = if state.considered {
                SkipReason::Protected
            } else {
                SkipReason::NotConsidered
            };
            error!(
                "Tried to publish {} ({:?}) into {}, which is {}; skipping",
                what, status, suite, reason
            );
            summary.records_skipped += 1;
            return Ok(None);
        }
        // Careful publishing into a protected suite leaves it clean.
        Ok(Some(!state.protected))
    }

    /// Copy a record's files into the pool. A conflicting file skips the
    /// record.
    fn publish_files(
        &self,
        component: &str,
        source_name: &str,
        files: &[&PoolFile],
        what: &str,
    ) -> PublisherResult<bool> {
        for file in files {
            match self.pool.publish(component, source_name, file) {
                Ok(PoolOutcome::Added) => debug!("Added {} for {}", file.filename, what),
                Ok(PoolOutcome::AlreadyPresent) => {}
                Err(PoolError::Conflict {
                    path,
                    expected,
                    found,
                }) => {
                    error!(
                        "Not publishing {}: {} exists with sha256 {}, expected {}",
                        what,
                        path.display(),
                        found,
                        expected
                    );
                    return Ok(false);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }

    fn publishable_statuses(&self) -> &'static [PublishingStatus] {
        if self.careful.publishing {
            &[PublishingStatus::Pending, PublishingStatus::Published]
        } else {
            &[PublishingStatus::Pending]
        }
    }

    pub fn find_and_publish_sources(
        &self,
        ctx: &mut PipelineContext,
        summary: &mut RunSummary,
    ) -> PublisherResult<()> {
        let filter = PublicationFilter::new(self.archive.id).with_statuses(self.publishable_statuses());
        let mut records: Vec<SourcePublication> = self.store.get_sources(&filter)?;
        records.sort_by_cached_key(|p| self.sort_key(&p.suite, p.id));

        for p in &records {
            let what = format!("source {} {}", p.name(), p.version());
            let Some(mark_dirty) = self.admit(ctx, summary, &p.suite, p.status, &what)? else {
                continue;
            };
            let files: Vec<&PoolFile> = p.files.iter().collect();
            if !self.publish_files(&p.component, p.name(), &files, &what)? {
                summary.records_skipped += 1;
                continue;
            }
            if p.status == PublishingStatus::Pending {
                self.store
                    .set_source_status(p.id, PublishingStatus::Published, None)?;
                summary.sources_published += 1;
            }
            if mark_dirty {
                self.mark_pocket_dirty(ctx, &p.suite);
            }
        }
        Ok(())
    }

    pub fn find_and_publish_binaries(
        &self,
        ctx: &mut PipelineContext,
        summary: &mut RunSummary,
    ) -> PublisherResult<()> {
        let filter = PublicationFilter::new(self.archive.id).with_statuses(self.publishable_statuses());
        let mut records: Vec<BinaryPublication> = self.store.get_binaries(&filter)?;
        records.sort_by_cached_key(|p| self.sort_key(&p.suite, p.id));

        for p in &records {
            let what = format!("binary {} {} ({})", p.name(), p.version(), p.architecture);
            let Some(mark_dirty) = self.admit(ctx, summary, &p.suite, p.status, &what)? else {
                continue;
            };
            if !self.publish_files(&p.component, &p.source_name, &[&p.file], &what)? {
                summary.records_skipped += 1;
                continue;
            }
            if p.status == PublishingStatus::Pending {
                self.store
                    .set_binary_status(p.id, PublishingStatus::Published, None)?;
                summary.binaries_published += 1;
            }
            if mark_dirty {
                self.mark_pocket_dirty(ctx, &p.suite);
            }
        }
        Ok(())
    }

    pub fn a_publish(&self, ctx: &mut PipelineContext, summary: &mut RunSummary) -> PublisherResult<()> {
        self.find_and_publish_sources(ctx, summary)?;
        self.find_and_publish_binaries(ctx, summary)
    }

    /// Mark suites dirty that have deleted records still waiting to be
    /// removed from their indices.
    pub fn a2_mark_pockets_with_deletions_dirty(
        &self,
        ctx: &mut PipelineContext,
    ) -> PublisherResult<usize> {
        let filter = PublicationFilter::new(self.archive.id)
            .with_statuses(&[PublishingStatus::Deleted])
            .awaiting_removal();
        let mut suites: BTreeSet<SuiteKey> = self
            .store
            .get_sources(&filter)?
            .into_iter()
            .map(|p| p.suite)
            .collect();
        suites.extend(self.store.get_binaries(&filter)?.into_iter().map(|p| p.suite));

        let mut marked = 0;
        for suite in suites {
            let Some(series) = self.distribution.get_series(&suite.series) else {
                debug!("Deletions in unknown series {}, ignoring", suite.series);
                continue;
            };
            let state = self.suite_state(ctx, &suite, series);
            match plan_suite(Stage::MarkDeletionsDirty, &state, false) {
                SuiteDecision::Process => {
                    self.mark_pocket_dirty(ctx, &suite);
                    marked += 1;
                }
                SuiteDecision::Skip(reason) => {
                    debug!("Not marking {} dirty for deletions: {}", suite, reason)
                }
                SuiteDecision::Tainted => self.check_dirty_suite_before_publishing(ctx, &suite)?,
            }
        }
        Ok(marked)
    }

    pub fn b_dominate(&self, ctx: &mut PipelineContext, summary: &mut RunSummary) -> PublisherResult<()> {
        let careful = self.careful.domination;
        for suite in self.distribution.suites() {
            let series = self.series(&suite)?;
            let state = self.suite_state(ctx, &suite, series);
            match plan_suite(Stage::Dominate, &state, careful) {
                SuiteDecision::Process => {}
                SuiteDecision::Skip(reason) => {
                    debug!("Skipping domination of {}: {}", suite, reason);
                    continue;
                }
                SuiteDecision::Tainted => {
                    self.check_dirty_suite_before_publishing(ctx, &suite)?;
                    continue;
                }
            }

            let superseded = self.dominator.judge_and_dominate(
                self.store,
                self.archive,
                &suite,
                self.clock.now(),
            )?;
            summary.superseded += superseded;
            if superseded > 0 && !state.protected {
                self.mark_pocket_dirty(ctx, &suite);
            }
        }
        Ok(())
    }

    pub fn c_write_indexes(&self, ctx: &mut PipelineContext, summary: &mut RunSummary) -> PublisherResult<()> {
        let careful = self.careful.apt;
        for suite in self.distribution.suites() {
            let series = self.series(&suite)?;
            let state = self.suite_state(ctx, &suite, series);
            match plan_suite(Stage::WriteIndexes, &state, careful) {
                SuiteDecision::Process => {}
                SuiteDecision::Skip(reason) => {
                    debug!("Not writing indexes for {}: {}", suite, reason);
                    continue;
                }
                SuiteDecision::Tainted => {
                    self.check_dirty_suite_before_publishing(ctx, &suite)?;
                    continue;
                }
            }

            info!("Writing indexes for {}", suite);
            ctx.release_files_needed.insert(suite.clone());

            let filter = PublicationFilter::new(self.archive.id)
                .in_suite(&suite)
                .with_statuses(&[PublishingStatus::Published]);
            let sources = self.store.get_sources(&filter)?;
            let binaries = self.store.get_binaries(&filter)?;
            let writer = IndexWriter::new(self.archive, series);

            for component in series.ordered_components() {
                let component_sources: Vec<SourcePublication> = sources
                    .iter()
                    .filter(|p| p.component == component)
                    .cloned()
                    .collect();
                let component_binaries: Vec<BinaryPublication> = binaries
                    .iter()
                    .filter(|p| p.component == component)
                    .cloned()
                    .collect();
                let written = writer.write_component_indexes(
                    &suite,
                    &component,
                    &component_sources,
                    &component_binaries,
                )?;
                summary.index_files_changed += written.changed;
            }
            summary.suites_indexed += 1;
        }
        Ok(())
    }

    pub fn d_write_release_files(
        &self,
        ctx: &mut PipelineContext,
        summary: &mut RunSummary,
    ) -> PublisherResult<()> {
        let careful = self.careful.release;
        for suite in self.distribution.suites() {
            let series = self.series(&suite)?;
            let state = self.suite_state(ctx, &suite, series);
            match plan_suite(Stage::WriteReleaseFiles, &state, careful) {
                SuiteDecision::Process => {}
                SuiteDecision::Skip(reason) => {
                    debug!("Not writing Release for {}: {}", suite, reason);
                    continue;
                }
                SuiteDecision::Tainted => {
                    self.check_dirty_suite_before_publishing(ctx, &suite)?;
                    continue;
                }
            }

            ReleaseFileBuilder::new(
                self.archive,
                self.distribution,
                series,
                self.registry,
                self.clock,
            )
            .with_signer(self.signer)
            .with_stay_of_execution(self.stay_of_execution)
            .write_release_file(&suite)?;
            summary.release_files_written += 1;
        }
        Ok(())
    }

    /// Run every stage in order.
    pub fn run(&self) -> PublisherResult<RunSummary> {
        let mut ctx = PipelineContext::default();
        let mut summary = RunSummary::default();

        let mut stage = Some(Stage::first());
        while let Some(current) = stage {
            info!("{} for {}", current, self.archive.name);
            match current {
                Stage::Publish => self.a_publish(&mut ctx, &mut summary)?,
                Stage::MarkDeletionsDirty => {
                    summary.deletion_suites = self.a2_mark_pockets_with_deletions_dirty(&mut ctx)?
                }
                Stage::Dominate => self.b_dominate(&mut ctx, &mut summary)?,
                Stage::WriteIndexes => self.c_write_indexes(&mut ctx, &mut summary)?,
                Stage::WriteReleaseFiles => self.d_write_release_files(&mut ctx, &mut summary)?,
            }
            stage = current.next();
        }

        summary.dirty_suites = ctx.dirty_suites.iter().map(|s| s.suite_name()).collect();
        info!("Finished publishing {}: {}", self.archive.name, summary);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SuiteState {
        SuiteState {
            allowed: true,
            considered: true,
            protected: false,
            dirty: false,
            release_needed: false,
        }
    }

    #[test]
    fn test_stage_order() {
        let mut stages = vec![Stage::first()];
        while let Some(next) = stages.last().and_then(|s| s.next()) {
            stages.push(next);
        }
        assert_eq!(
            stages,
            vec![
                Stage::Publish,
                Stage::MarkDeletionsDirty,
                Stage::Dominate,
                Stage::WriteIndexes,
                Stage::WriteReleaseFiles,
            ]
        );
    }

    #[test]
    fn test_restricted_suites_are_never_processed() {
        let s = SuiteState {
            allowed: false,
            dirty: true,
            ..state()
        };
        let mut stage = Some(Stage::first());
        while let Some(current) = stage {
            assert_eq!(
                plan_suite(current, &s, true),
                SuiteDecision::Skip(SkipReason::NotAllowed)
            );
            stage = current.next();
        }
    }

    #[test]
    fn test_clean_suite_skipped_unless_careful() {
        let s = state();
        assert_eq!(
            plan_suite(Stage::Dominate, &s, false),
            SuiteDecision::Skip(SkipReason::NotDirty)
        );
        assert_eq!(
            plan_suite(Stage::WriteIndexes, &s, false),
            SuiteDecision::Skip(SkipReason::NotDirty)
        );
        assert_eq!(
            plan_suite(Stage::WriteReleaseFiles, &s, false),
            SuiteDecision::Skip(SkipReason::NotDirty)
        );
        assert_eq!(plan_suite(Stage::WriteIndexes, &s, true), SuiteDecision::Process);
        assert_eq!(plan_suite(Stage::WriteReleaseFiles, &s, true), SuiteDecision::Process);
    }

    #[test]
    fn test_protected_suite() {
        let s = SuiteState {
            protected: true,
            ..state()
        };
        assert_eq!(
            plan_suite(Stage::Publish, &s, false),
            SuiteDecision::Skip(SkipReason::Protected)
        );
        assert_eq!(plan_suite(Stage::Publish, &s, true), SuiteDecision::Process);
        assert_eq!(
            plan_suite(Stage::MarkDeletionsDirty, &s, false),
            SuiteDecision::Skip(SkipReason::Protected)
        );
        assert_eq!(
            plan_suite(Stage::Dominate, &s, false),
            SuiteDecision::Skip(SkipReason::Protected)
        );
        assert_eq!(plan_suite(Stage::Dominate, &s, true), SuiteDecision::Process);
        for careful in [false, true] {
            assert_eq!(
                plan_suite(Stage::WriteIndexes, &s, careful),
                SuiteDecision::Skip(SkipReason::Protected)
            );
            assert_eq!(
                plan_suite(Stage::WriteReleaseFiles, &s, careful),
                SuiteDecision::Skip(SkipReason::Protected)
            );
        }

        let dirty = SuiteState { dirty: true, ..s };
        assert_eq!(plan_suite(Stage::WriteIndexes, &dirty, false), SuiteDecision::Tainted);
    }

    #[test]
    fn test_deletions_skip_dirty_suites() {
        let s = SuiteState {
            dirty: true,
            ..state()
        };
        assert_eq!(
            plan_suite(Stage::MarkDeletionsDirty, &s, false),
            SuiteDecision::Skip(SkipReason::AlreadyDirty)
        );
        assert_eq!(plan_suite(Stage::MarkDeletionsDirty, &state(), false), SuiteDecision::Process);
    }

    #[test]
    fn test_unconsidered_series() {
        let s = SuiteState {
            considered: false,
            dirty: true,
            ..state()
        };
        assert_eq!(
            plan_suite(Stage::WriteIndexes, &s, true),
            SuiteDecision::Skip(SkipReason::NotConsidered)
        );
    }

    #[test]
    fn test_release_follows_indexes() {
        let s = SuiteState {
            release_needed: true,
            ..state()
        };
        assert_eq!(plan_suite(Stage::WriteReleaseFiles, &s, false), SuiteDecision::Process);
    }

    #[test]
    fn test_careful_flags() {
        let flags = CarefulFlags::all(true);
        assert!(flags.publishing && flags.domination && flags.apt && flags.release);
        assert_eq!(CarefulFlags::all(false), CarefulFlags::default());
    }
}
