//! Writing a suite's Release file and reconciling its by-hash trees.

use apt_repository::{
    hash_reader, ChecksumEntry, ComponentRelease, Compression, ContentDigests, I18nIndex,
    IndexFile, Release,
};
use chrono::Duration;
use filetime::FileTime;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::by_hash::ByHashes;
use crate::clock::Clock;
use crate::error::PublisherResult;
use crate::model::{Archive, Distribution, DistroSeries, Pocket, SuiteKey};
use crate::registry::{release_container, ArchiveFileRegistry};
use crate::signing::SigningService;

/// Default grace period before superseded by-hash files are removed.
pub const BY_HASH_STAY_OF_EXECUTION_HOURS: i64 = 24;

fn open_optional(path: &Path) -> PublisherResult<Option<File>> {
    match File::open(path) {
        Ok(f) => Ok(Some(f)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Find the first variant of `name` below `suite_dir`, trying the plain
/// file then each compressed one, and return a reader over its
/// decompressed content.
fn open_index(suite_dir: &Path, name: &str) -> PublisherResult<Option<Box<dyn Read>>> {
    for compression in Compression::probe_order() {
        let path = suite_dir.join(format!("{}{}", name, compression.extension()));
        if let Some(file) = open_optional(&path)? {
            return Ok(Some(compression.reader(BufReader::new(file))));
        }
    }
    Ok(None)
}

/// Size and digests of an index, or `None` if no variant exists.
pub fn read_index_hashes(
    suite_dir: &Path,
    name: &str,
) -> PublisherResult<Option<(u64, ContentDigests)>> {
    match open_index(suite_dir, name)? {
        Some(reader) => Ok(Some(hash_reader(reader)?)),
        None => Ok(None),
    }
}

/// Decompressed content of an index, or `None` if no variant exists.
pub fn read_index_content(suite_dir: &Path, name: &str) -> PublisherResult<Option<Vec<u8>>> {
    match open_index(suite_dir, name)? {
        Some(mut reader) => {
            let mut content = Vec::new();
            reader.read_to_end(&mut content)?;
            Ok(Some(content))
        }
        None => Ok(None),
    }
}

/// Set the mtime of every existing path to the newest among them.
pub fn sync_timestamps(paths: &[PathBuf]) -> PublisherResult<()> {
    let mut existing = Vec::new();
    let mut latest: Option<FileTime> = None;
    for path in paths {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        let mtime = FileTime::from_last_modification_time(&metadata);
        latest = Some(latest.map_or(mtime, |l| l.max(mtime)));
        existing.push((path, mtime));
    }
    if let Some(latest) = latest {
        for (path, mtime) in existing {
            if mtime != latest {
                filetime::set_file_mtime(path, latest)?;
            }
        }
    }
    Ok(())
}

/// What reconciling a suite's by-hash trees did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ByHashReport {
    /// Rows whose grace period had elapsed.
    pub reaped: usize,
    /// Rows newly scheduled for deletion.
    pub condemned: usize,
    /// Condemned rows that became current again.
    pub restored: usize,
    /// New rows for files not yet recorded.
    pub added: usize,
}

/// What writing a suite's Release produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseOutcome {
    /// Number of files listed in each checksum field.
    pub listed: usize,
    pub signed: bool,
    pub by_hash: Option<ByHashReport>,
}

pub struct ReleaseFileBuilder<'a> {
    archive: &'a Archive,
    distribution: &'a Distribution,
    series: &'a DistroSeries,
    registry: &'a dyn ArchiveFileRegistry,
    signer: Option<&'a dyn SigningService>,
    clock: &'a dyn Clock,
    stay_of_execution: Duration,
}

impl<'a> ReleaseFileBuilder<'a> {
    pub fn new(
        archive: &'a Archive,
        distribution: &'a Distribution,
        series: &'a DistroSeries,
        registry: &'a dyn ArchiveFileRegistry,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            archive,
            distribution,
            series,
            registry,
            signer: None,
            clock,
            stay_of_execution: Duration::hours(BY_HASH_STAY_OF_EXECUTION_HOURS),
        }
    }

    pub fn with_signer(mut self, signer: Option<&'a dyn SigningService>) -> Self {
        self.signer = signer;
        self
    }

    pub fn with_stay_of_execution(mut self, stay_of_execution: Duration) -> Self {
        self.stay_of_execution = stay_of_execution;
        self
    }

    /// Directories holding `Sources` or `Packages`, relative to the suite,
    /// with the basename of their index and the `Architecture` of their
    /// component Release.
    fn index_dirs(&self, component: &str) -> Vec<(String, &'static str, String)> {
        let mut dirs = vec![(
            format!("{}/source", component),
            "Sources",
            "source".to_string(),
        )];
        for arch in self.series.sorted_architectures() {
            dirs.push((
                format!("{}/binary-{}", component, arch),
                "Packages",
                arch.clone(),
            ));
            for subcomponent in self.archive.subcomponents() {
                dirs.push((
                    format!("{}/{}/binary-{}", component, subcomponent, arch),
                    "Packages",
                    arch.clone(),
                ));
            }
        }
        dirs
    }

    fn write_component_release(
        &self,
        suite: &SuiteKey,
        dir: &Path,
        component: &str,
        architecture: &str,
    ) -> PublisherResult<()> {
        let release = ComponentRelease {
            archive: suite.suite_name(),
            version: self.series.version.clone(),
            component: component.to_string(),
            origin: self.archive.origin(self.distribution),
            label: self.archive.label(self.distribution),
            architecture: architecture.to_string(),
        };
        let mut file = IndexFile::create(dir, "Release", &[Compression::None])?;
        file.write_all(release.to_text().as_bytes())?;
        file.close()?;
        Ok(())
    }

    /// Write `<component>/i18n/Index`, returning the names listed in it.
    fn write_i18n_index(&self, i18n_dir: &Path) -> PublisherResult<Vec<String>> {
        let entries = match fs::read_dir(i18n_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No i18n directory at {}", i18n_dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if name.starts_with("Translation-") {
                names.push(name);
            }
        }
        names.sort();

        let mut index = I18nIndex::default();
        for name in &names {
            let (size, digests) = hash_reader(File::open(i18n_dir.join(name))?)?;
            index.files.push(ChecksumEntry {
                name: name.clone(),
                size,
                digests,
            });
        }

        let mut file = IndexFile::create(i18n_dir, "Index", &[Compression::None])?;
        file.write_all(index.to_text().as_bytes())?;
        file.close()?;
        Ok(names)
    }

    /// Names, relative to the suite directory, that may appear in the
    /// Release file. Writes the component Release files and i18n Index
    /// files on the way.
    fn core_files(&self, suite: &SuiteKey, suite_dir: &Path) -> PublisherResult<Vec<String>> {
        let mut names = Vec::new();
        for component in self.series.ordered_components() {
            for (dir, basename, architecture) in self.index_dirs(&component) {
                self.write_component_release(suite, &suite_dir.join(&dir), &component, &architecture)?;
                names.push(format!("{}/{}", dir, basename));
                for compression in &self.series.index_compressors {
                    if *compression != Compression::None {
                        names.push(format!("{}/{}{}", dir, basename, compression.extension()));
                    }
                }
                names.push(format!("{}/Release", dir));
            }

            let i18n_dir = suite_dir.join(&component).join("i18n");
            let translations = self.write_i18n_index(&i18n_dir)?;
            if !translations.is_empty() {
                for name in translations {
                    names.push(format!("{}/i18n/{}", component, name));
                }
                names.push(format!("{}/i18n/Index", component));
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Write Release (and signatures) for one suite.
    pub fn write_release_file(&self, suite: &SuiteKey) -> PublisherResult<ReleaseOutcome> {
        let suite_name = suite.suite_name();
        let suite_dir = self.archive.suite_dir(suite);
        fs::create_dir_all(&suite_dir)?;

        let mut files = Vec::new();
        for name in self.core_files(suite, &suite_dir)? {
            match read_index_hashes(&suite_dir, &name)? {
                Some((size, digests)) => files.push(ChecksumEntry {
                    name,
                    size,
                    digests,
                }),
                None => debug!("{} has no {}, not listing it", suite_name, name),
            }
        }

        let backports_not_automatic =
            suite.pocket == Pocket::Backports && self.series.backports_not_automatic;
        let release = Release {
            origin: self.archive.origin(self.distribution),
            label: self.archive.label(self.distribution),
            suite: suite_name.clone(),
            version: self.series.version.clone(),
            codename: self.series.name.clone(),
            date: self.clock.now(),
            architectures: self.series.sorted_architectures(),
            components: self.series.ordered_components(),
            description: Some(self.archive.description(
                self.distribution,
                self.series,
                suite.pocket,
            )),
            not_automatic: backports_not_automatic,
            but_automatic_upgrades: backports_not_automatic,
            acquire_by_hash: self.series.advertise_by_hash,
            files,
        };

        let release_path = suite_dir.join("Release");
        let release_new = suite_dir.join("Release.new");
        fs::write(&release_new, release.to_text())?;

        let by_hash = if self.series.publish_by_hash {
            Some(self.update_by_hash(&suite_name, &suite_dir, &release.files)?)
        } else {
            None
        };

        let detached = suite_dir.join("Release.gpg");
        let inline = suite_dir.join("InRelease");
        let signed = self.sign(&suite_name, &release_new, &detached, &inline)?;

        fs::rename(&release_new, &release_path)?;
        if signed {
            fs::rename(with_new_suffix(&detached), &detached)?;
            fs::rename(with_new_suffix(&inline), &inline)?;
        } else {
            for stale in [&detached, &inline] {
                match fs::remove_file(stale) {
                    Ok(()) => info!("Removed stale {}", stale.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let mut core_paths: Vec<PathBuf> =
            release.files.iter().map(|f| suite_dir.join(&f.name)).collect();
        core_paths.extend([release_path, detached, inline]);
        sync_timestamps(&core_paths)?;

        info!(
            "Wrote Release for {} listing {} files",
            suite_name,
            release.files.len()
        );
        Ok(ReleaseOutcome {
            listed: release.files.len(),
            signed,
            by_hash,
        })
    }

    /// Sign `Release.new` into `Release.gpg.new` and `InRelease.new`.
    fn sign(
        &self,
        suite_name: &str,
        release_new: &Path,
        detached: &Path,
        inline: &Path,
    ) -> PublisherResult<bool> {
        let Some(key_id) = self.archive.signing_key.as_deref() else {
            debug!("No signing key for {}, publishing {} unsigned", self.archive.name, suite_name);
            return Ok(false);
        };
        let Some(signer) = self.signer else {
            warn!(
                "Archive {} has signing key {} but no signer is configured",
                self.archive.name, key_id
            );
            return Ok(false);
        };

        let detached_new = with_new_suffix(detached);
        let inline_new = with_new_suffix(inline);
        if let Err(e) = signer.sign_repository(key_id, release_new, &detached_new, &inline_new) {
            for leftover in [release_new, detached_new.as_path(), inline_new.as_path()] {
                match fs::remove_file(leftover) {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(err) => warn!("Failed to remove {}: {}", leftover.display(), err),
                }
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Reconcile by-hash trees and their registry rows with the files the
    /// new Release lists.
    fn update_by_hash(
        &self,
        suite_name: &str,
        suite_dir: &Path,
        active: &[ChecksumEntry],
    ) -> PublisherResult<ByHashReport> {
        let container = release_container(suite_name);
        let now = self.clock.now();
        let mut report = ByHashReport::default();
        let mut by_hashes = ByHashes::new(suite_dir);

        let reaped = self.registry.reap(self.archive.id, &container, now)?;
        report.reaped = reaped.len();
        for file in &reaped {
            by_hashes.register_path(&file.path);
        }

        let files = self.registry.get_by_archive(self.archive.id, &container)?;
        for file in &files {
            by_hashes.add(&file.path, &file.digests, || self.registry.read_content(file))?;
        }

        let active_sha256: HashMap<&str, &str> = active
            .iter()
            .map(|e| (e.name.as_str(), e.digests.sha256.as_str()))
            .collect();
        let is_active =
            |path: &str, sha256: &str| active_sha256.get(path).map_or(false, |s| *s == sha256);

        let mut represented: HashSet<(&str, &str)> = HashSet::new();
        let mut condemn = Vec::new();
        for file in files.iter().filter(|f| f.scheduled_deletion_date.is_none()) {
            if is_active(&file.path, &file.digests.sha256) {
                represented.insert((file.path.as_str(), file.digests.sha256.as_str()));
            } else {
                condemn.push(file.id);
            }
        }

        let mut restore = Vec::new();
        for file in files.iter().filter(|f| f.scheduled_deletion_date.is_some()) {
            let key = (file.path.as_str(), file.digests.sha256.as_str());
            if is_active(key.0, key.1) && represented.insert(key) {
                restore.push(file.id);
            }
        }

        if !condemn.is_empty() {
            self.registry
                .schedule_deletion(&condemn, now + self.stay_of_execution)?;
        }
        if !restore.is_empty() {
            self.registry.unschedule_deletion(&restore)?;
        }
        report.condemned = condemn.len();
        report.restored = restore.len();

        for entry in active {
            by_hashes.register_path(&entry.name);
            if represented.contains(&(entry.name.as_str(), entry.digests.sha256.as_str())) {
                continue;
            }
            let Some(content) = read_index_content(suite_dir, &entry.name)? else {
                debug!("{} vanished before it could be added to by-hash", entry.name);
                continue;
            };
            let file = self
                .registry
                .new_from_file(self.archive.id, &container, &entry.name, &content)?;
            by_hashes.add(&entry.name, &file.digests, move || Ok(content))?;
            report.added += 1;
        }

        by_hashes.prune()?;
        debug!(
            "by-hash for {}: {} added, {} condemned, {} restored, {} reaped",
            suite_name, report.added, report.condemned, report.restored, report.reaped
        );
        Ok(report)
    }
}

fn with_new_suffix(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".new");
    PathBuf::from(name)
}
