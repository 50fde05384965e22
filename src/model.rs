//! Distribution, archive and publication records the publisher works on.

use apt_repository::{Compression, Package, Source, DEFAULT_COMPRESSIONS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PublisherError;

/// Components listed first, in this order, in every Release file.
pub const COMPONENT_PRECEDENCE: &[&str] = &["main", "restricted", "universe", "multiverse"];

/// A publishing channel within a series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Pocket {
    Release,
    Security,
    Updates,
    Proposed,
    Backports,
}

impl Pocket {
    /// All pockets, in publishing order.
    pub fn all() -> &'static [Pocket] {
        &[
            Pocket::Release,
            Pocket::Security,
            Pocket::Updates,
            Pocket::Proposed,
            Pocket::Backports,
        ]
    }

    /// Suffix appended to the series name to form the suite name.
    pub fn suffix(&self) -> &'static str {
        match self {
            Pocket::Release => "",
            Pocket::Security => "-security",
            Pocket::Updates => "-updates",
            Pocket::Proposed => "-proposed",
            Pocket::Backports => "-backports",
        }
    }

    /// Lower-case name, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pocket::Release => "release",
            Pocket::Security => "security",
            Pocket::Updates => "updates",
            Pocket::Proposed => "proposed",
            Pocket::Backports => "backports",
        }
    }

    /// Capitalised name, as used in Release descriptions.
    pub fn title(&self) -> &'static str {
        match self {
            Pocket::Release => "Release",
            Pocket::Security => "Security",
            Pocket::Updates => "Updates",
            Pocket::Proposed => "Proposed",
            Pocket::Backports => "Backports",
        }
    }
}

impl fmt::Display for Pocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pocket {
    type Err = PublisherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pocket::all()
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PublisherError::Configuration(format!("Unknown pocket: {}", s)))
    }
}

/// A `(series, pocket)` pair identifying a publishable suite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SuiteKey {
    /// Series name, e.g. `focal`.
    pub series: String,
    /// Pocket within the series.
    pub pocket: Pocket,
}

impl SuiteKey {
    pub fn new(series: impl Into<String>, pocket: Pocket) -> Self {
        Self {
            series: series.into(),
            pocket,
        }
    }

    /// Suite name, e.g. `focal-updates`.
    pub fn suite_name(&self) -> String {
        format!("{}{}", self.series, self.pocket.suffix())
    }

    /// Split a suite name into series and pocket, given the known series.
    pub fn parse_suite<S: AsRef<str>>(name: &str, series: &[S]) -> Option<SuiteKey> {
        for pocket in Pocket::all().iter().rev() {
            let Some(series_name) = name.strip_suffix(pocket.suffix()) else {
                continue;
            };
            if series.iter().any(|s| s.as_ref() == series_name) {
                return Some(SuiteKey::new(series_name, *pocket));
            }
        }
        None
    }
}

impl fmt::Display for SuiteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.series, self.pocket.suffix())
    }
}

/// Lifecycle of a publication record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishingStatus {
    Pending,
    Published,
    Superseded,
    Deleted,
    Obsolete,
}

impl PublishingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishingStatus::Pending => "pending",
            PublishingStatus::Published => "published",
            PublishingStatus::Superseded => "superseded",
            PublishingStatus::Deleted => "deleted",
            PublishingStatus::Obsolete => "obsolete",
        }
    }
}

impl FromStr for PublishingStatus {
    type Err = PublisherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PublishingStatus::Pending),
            "published" => Ok(PublishingStatus::Published),
            "superseded" => Ok(PublishingStatus::Superseded),
            "deleted" => Ok(PublishingStatus::Deleted),
            "obsolete" => Ok(PublishingStatus::Obsolete),
            _ => Err(PublisherError::Configuration(format!(
                "Unknown publishing status: {}",
                s
            ))),
        }
    }
}

/// Development status of a distribution series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    Experimental,
    Development,
    Frozen,
    Current,
    Supported,
    Obsolete,
    Future,
}

impl SeriesStatus {
    /// Whether the RELEASE pocket of a series in this state still accepts
    /// changes.
    pub fn is_unstable(&self) -> bool {
        matches!(
            self,
            SeriesStatus::Experimental | SeriesStatus::Development | SeriesStatus::Frozen
        )
    }
}

/// What an archive is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchivePurpose {
    Primary,
    Partner,
    Ppa,
    Copy,
}

impl ArchivePurpose {
    /// Whether the RELEASE pocket of stable series may be modified.
    pub fn allows_release_updates(&self) -> bool {
        matches!(self, ArchivePurpose::Ppa | ArchivePurpose::Copy)
    }
}

/// Package format of a binary publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryFormat {
    Deb,
    Udeb,
    Ddeb,
}

impl BinaryFormat {
    /// The subcomponent whose indices carry this format, if any.
    pub fn subcomponent(&self) -> Option<&'static str> {
        match self {
            BinaryFormat::Deb => None,
            BinaryFormat::Udeb => Some("debian-installer"),
            BinaryFormat::Ddeb => Some("debug"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryFormat::Deb => "deb",
            BinaryFormat::Udeb => "udeb",
            BinaryFormat::Ddeb => "ddeb",
        }
    }
}

impl FromStr for BinaryFormat {
    type Err = PublisherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deb" => Ok(BinaryFormat::Deb),
            "udeb" => Ok(BinaryFormat::Udeb),
            "ddeb" => Ok(BinaryFormat::Ddeb),
            _ => Err(PublisherError::Configuration(format!(
                "Unknown binary format: {}",
                s
            ))),
        }
    }
}

fn default_compressors() -> Vec<Compression> {
    DEFAULT_COMPRESSIONS.to_vec()
}

fn default_true() -> bool {
    true
}

/// A release of the distribution, e.g. `focal`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistroSeries {
    /// Numeric identifier; publications are grouped by it.
    pub id: i64,
    /// Codename.
    pub name: String,
    /// Human readable name, e.g. `Focal`.
    pub display_name: String,
    /// Version, e.g. `20.04`.
    #[serde(default)]
    pub version: Option<String>,
    pub status: SeriesStatus,
    /// Enabled architecture tags.
    pub architectures: Vec<String>,
    /// Components, in any order.
    pub components: Vec<String>,
    /// Compressors used for Sources/Packages/Translation indices.
    #[serde(default = "default_compressors")]
    pub index_compressors: Vec<Compression>,
    /// Maintain `by-hash` trees next to the indices.
    #[serde(default)]
    pub publish_by_hash: bool,
    /// Emit `Acquire-By-Hash: yes`.
    #[serde(default)]
    pub advertise_by_hash: bool,
    /// Keep long descriptions in `Packages` instead of `Translation-en`.
    #[serde(default = "default_true")]
    pub include_long_descriptions: bool,
    /// Mark the BACKPORTS pocket `NotAutomatic`.
    #[serde(default)]
    pub backports_not_automatic: bool,
}

impl DistroSeries {
    /// Components in Release order: the fixed precedence list first, then
    /// the rest as configured.
    pub fn ordered_components(&self) -> Vec<String> {
        let mut ordered: Vec<String> = COMPONENT_PRECEDENCE
            .iter()
            .filter(|c| self.components.iter().any(|own| own == *c))
            .map(|c| c.to_string())
            .collect();
        for component in &self.components {
            if !ordered.contains(component) {
                ordered.push(component.clone());
            }
        }
        ordered
    }

    /// Architectures, sorted.
    pub fn sorted_architectures(&self) -> Vec<String> {
        let mut architectures = self.architectures.clone();
        architectures.sort();
        architectures.dedup();
        architectures
    }
}

/// The distribution whose series an archive publishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub name: String,
    pub display_name: String,
    pub series: Vec<DistroSeries>,
}

impl Distribution {
    pub fn get_series(&self, name: &str) -> Option<&DistroSeries> {
        self.series.iter().find(|s| s.name == name)
    }

    /// Every suite of every series.
    pub fn suites(&self) -> Vec<SuiteKey> {
        self.series
            .iter()
            .flat_map(|series| {
                Pocket::all()
                    .iter()
                    .map(move |pocket| SuiteKey::new(series.name.clone(), *pocket))
            })
            .collect()
    }
}

/// A repository instance with its on-disk roots.
#[derive(Debug, Clone)]
pub struct Archive {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub purpose: ArchivePurpose,
    /// Owner name, used for PPA origins.
    pub owner: Option<String>,
    /// Archive root; the pool lives under `<root>/pool`.
    pub root: PathBuf,
    /// Where `dists/` content is written.
    pub dists_root: PathBuf,
    /// GPG key ID; absent means Release files are not signed.
    pub signing_key: Option<String>,
    pub private: bool,
    pub publish_debug_symbols: bool,
    /// Overrides the purpose's default for stable RELEASE pockets.
    pub allow_release_pocket_updates: Option<bool>,
}

impl Archive {
    /// Whether updates to stable RELEASE pockets are allowed.
    pub fn allows_release_updates(&self) -> bool {
        self.allow_release_pocket_updates
            .unwrap_or_else(|| self.purpose.allows_release_updates())
    }

    /// Whether the archive must leave this suite alone.
    pub fn cannot_modify_suite(&self, series: &DistroSeries, pocket: Pocket) -> bool {
        !series.status.is_unstable()
            && pocket == Pocket::Release
            && !self.allows_release_updates()
    }

    /// Whether the archive publishes this series at all.
    pub fn consider_series(&self, series: &DistroSeries) -> bool {
        match self.purpose {
            ArchivePurpose::Primary | ArchivePurpose::Partner => !matches!(
                series.status,
                SeriesStatus::Obsolete | SeriesStatus::Future
            ),
            ArchivePurpose::Ppa | ArchivePurpose::Copy => series.status != SeriesStatus::Future,
        }
    }

    /// Optional subcomponents this archive publishes.
    pub fn subcomponents(&self) -> Vec<&'static str> {
        let mut subcomponents = Vec::new();
        if self.purpose != ArchivePurpose::Partner {
            subcomponents.push("debian-installer");
        }
        if self.publish_debug_symbols {
            subcomponents.push("debug");
        }
        subcomponents
    }

    /// Release `Origin`.
    pub fn origin(&self, distribution: &Distribution) -> String {
        match self.purpose {
            ArchivePurpose::Partner => "Canonical".to_string(),
            ArchivePurpose::Ppa => {
                let owner = self.owner.as_deref().unwrap_or("unknown");
                if self.name == "ppa" {
                    format!("LP-PPA-{}", owner)
                } else {
                    format!("LP-PPA-{}-{}", owner, self.name)
                }
            }
            _ => distribution.display_name.clone(),
        }
    }

    /// Release `Label`.
    pub fn label(&self, distribution: &Distribution) -> String {
        match self.purpose {
            ArchivePurpose::Partner => "Partner archive".to_string(),
            ArchivePurpose::Ppa => self.display_name.clone(),
            _ => distribution.display_name.clone(),
        }
    }

    /// Release `Description` for a suite.
    pub fn description(
        &self,
        distribution: &Distribution,
        series: &DistroSeries,
        pocket: Pocket,
    ) -> String {
        if self.purpose == ArchivePurpose::Ppa {
            return self.display_name.clone();
        }
        let mut description = format!("{} {} ", distribution.display_name, series.display_name);
        if pocket == Pocket::Release {
            description.push_str(series.version.as_deref().unwrap_or_default());
        } else {
            description.push_str(pocket.title());
        }
        description
    }

    /// Directory holding a suite's indices.
    pub fn suite_dir(&self, suite: &SuiteKey) -> PathBuf {
        self.dists_root.join(suite.suite_name())
    }
}

/// Directory prefix of a source package in the pool: `libf` for `libfoo`,
/// `h` for `hello`.
pub fn pool_prefix(source: &str) -> &str {
    if source.starts_with("lib") && source.len() > 3 {
        source.get(..4).unwrap_or(source)
    } else {
        source.get(..1).unwrap_or(source)
    }
}

/// Directory of a source package in the pool, relative to the archive
/// root.
pub fn pool_dir(component: &str, source: &str) -> String {
    format!("pool/{}/{}/{}", component, pool_prefix(source), source)
}

/// Path of a file in the pool, relative to the archive root.
pub fn pool_path(component: &str, source: &str, filename: &str) -> String {
    format!("{}/{}", pool_dir(component, source), filename)
}

/// A file belonging to a publication, staged by upload processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolFile {
    /// Basename in the pool.
    pub filename: String,
    pub size: u64,
    pub sha256: String,
    /// Where upload processing left the file.
    pub staged_path: PathBuf,
}

/// A source package published in one suite and component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePublication {
    pub id: i64,
    pub archive_id: i64,
    pub suite: SuiteKey,
    pub component: String,
    pub status: PublishingStatus,
    pub scheduled_deletion_date: Option<DateTime<Utc>>,
    pub date_removed: Option<DateTime<Utc>>,
    /// The `Sources` stanza; `Directory` is filled in from the pool layout.
    pub stanza: Source,
    pub files: Vec<PoolFile>,
}

impl SourcePublication {
    pub fn name(&self) -> &str {
        &self.stanza.package
    }

    pub fn version(&self) -> &str {
        &self.stanza.version
    }
}

/// A binary package published in one suite, component and architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryPublication {
    pub id: i64,
    pub archive_id: i64,
    pub suite: SuiteKey,
    pub component: String,
    /// Architecture whose indices list this record; `all` packages have
    /// one record per architecture.
    pub architecture: String,
    pub format: BinaryFormat,
    /// Source package name, which decides the pool directory.
    pub source_name: String,
    pub status: PublishingStatus,
    pub scheduled_deletion_date: Option<DateTime<Utc>>,
    pub date_removed: Option<DateTime<Utc>>,
    /// The `Packages` stanza; `Filename` is filled in from the pool layout.
    pub stanza: Package,
    pub file: PoolFile,
}

impl BinaryPublication {
    pub fn name(&self) -> &str {
        &self.stanza.package
    }

    pub fn version(&self) -> &str {
        &self.stanza.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(status: SeriesStatus) -> DistroSeries {
        DistroSeries {
            id: 1,
            name: "focal".to_string(),
            display_name: "Focal".to_string(),
            version: Some("20.04".to_string()),
            status,
            architectures: vec!["i386".to_string(), "amd64".to_string()],
            components: vec!["universe".to_string(), "extra".to_string(), "main".to_string()],
            index_compressors: vec![Compression::Gzip],
            publish_by_hash: true,
            advertise_by_hash: true,
            include_long_descriptions: true,
            backports_not_automatic: false,
        }
    }

    fn archive(purpose: ArchivePurpose) -> Archive {
        Archive {
            id: 1,
            name: "ppa".to_string(),
            display_name: "PPA for Jane".to_string(),
            purpose,
            owner: Some("jane".to_string()),
            root: PathBuf::from("/srv/archive"),
            dists_root: PathBuf::from("/srv/archive/dists"),
            signing_key: None,
            private: false,
            publish_debug_symbols: false,
            allow_release_pocket_updates: None,
        }
    }

    fn distribution() -> Distribution {
        Distribution {
            name: "ubuntu".to_string(),
            display_name: "Ubuntu".to_string(),
            series: vec![series(SeriesStatus::Current)],
        }
    }

    #[test]
    fn test_suite_names() {
        assert_eq!(SuiteKey::new("focal", Pocket::Release).suite_name(), "focal");
        assert_eq!(
            SuiteKey::new("focal", Pocket::Backports).to_string(),
            "focal-backports"
        );
        let series = ["focal", "jammy"];
        assert_eq!(
            SuiteKey::parse_suite("jammy-updates", &series),
            Some(SuiteKey::new("jammy", Pocket::Updates))
        );
        assert_eq!(
            SuiteKey::parse_suite("focal", &series),
            Some(SuiteKey::new("focal", Pocket::Release))
        );
        assert_eq!(SuiteKey::parse_suite("bionic-updates", &series), None);
    }

    #[test]
    fn test_cannot_modify_suite() {
        let stable = series(SeriesStatus::Current);
        let devel = series(SeriesStatus::Development);
        let primary = archive(ArchivePurpose::Primary);
        assert!(primary.cannot_modify_suite(&stable, Pocket::Release));
        assert!(!primary.cannot_modify_suite(&stable, Pocket::Updates));
        assert!(!primary.cannot_modify_suite(&devel, Pocket::Release));
        assert!(!archive(ArchivePurpose::Ppa).cannot_modify_suite(&stable, Pocket::Release));

        let mut overridden = primary.clone();
        overridden.allow_release_pocket_updates = Some(true);
        assert!(!overridden.cannot_modify_suite(&stable, Pocket::Release));
    }

    #[test]
    fn test_consider_series() {
        let obsolete = series(SeriesStatus::Obsolete);
        let future = series(SeriesStatus::Future);
        assert!(!archive(ArchivePurpose::Primary).consider_series(&obsolete));
        assert!(archive(ArchivePurpose::Ppa).consider_series(&obsolete));
        assert!(!archive(ArchivePurpose::Ppa).consider_series(&future));
    }

    #[test]
    fn test_subcomponents() {
        let mut primary = archive(ArchivePurpose::Primary);
        assert_eq!(primary.subcomponents(), vec!["debian-installer"]);
        primary.publish_debug_symbols = true;
        assert_eq!(primary.subcomponents(), vec!["debian-installer", "debug"]);
        assert!(archive(ArchivePurpose::Partner).subcomponents().is_empty());
    }

    #[test]
    fn test_origin_label_description() {
        let distribution = distribution();
        let focal = series(SeriesStatus::Current);
        let primary = archive(ArchivePurpose::Primary);
        assert_eq!(primary.origin(&distribution), "Ubuntu");
        assert_eq!(
            primary.description(&distribution, &focal, Pocket::Release),
            "Ubuntu Focal 20.04"
        );
        assert_eq!(
            primary.description(&distribution, &focal, Pocket::Updates),
            "Ubuntu Focal Updates"
        );

        let ppa = archive(ArchivePurpose::Ppa);
        assert_eq!(ppa.origin(&distribution), "LP-PPA-jane");
        assert_eq!(ppa.label(&distribution), "PPA for Jane");
        let mut named = ppa.clone();
        named.name = "tools".to_string();
        assert_eq!(named.origin(&distribution), "LP-PPA-jane-tools");

        let partner = archive(ArchivePurpose::Partner);
        assert_eq!(partner.origin(&distribution), "Canonical");
        assert_eq!(partner.label(&distribution), "Partner archive");
    }

    #[test]
    fn test_component_order() {
        assert_eq!(
            series(SeriesStatus::Current).ordered_components(),
            vec!["main", "universe", "extra"]
        );
        assert_eq!(
            series(SeriesStatus::Current).sorted_architectures(),
            vec!["amd64", "i386"]
        );
    }

    #[test]
    fn test_pool_paths() {
        assert_eq!(pool_prefix("hello"), "h");
        assert_eq!(pool_prefix("libfoo"), "libf");
        assert_eq!(pool_prefix("lib"), "l");
        assert_eq!(
            pool_path("main", "libfoo", "libfoo_1.0.dsc"),
            "pool/main/libf/libfoo/libfoo_1.0.dsc"
        );
    }
}
