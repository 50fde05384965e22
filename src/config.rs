//! Configuration management for the publisher.
//!
//! The configuration describes the distribution being published, the
//! archives carrying it, and where the publication records live.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{PublisherError, PublisherResult};
use crate::model::{Archive, ArchivePurpose, Distribution, DistroSeries};

/// Series are configured directly as [`DistroSeries`] values.
pub type SeriesConfig = DistroSeries;

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in pool.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/archive".to_string(),
            max_connections: 4,
        }
    }
}

/// The distribution and its series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// Distribution name, e.g. `ubuntu`.
    pub name: String,
    /// Human readable name, used for `Origin` and `Label`.
    pub display_name: String,
    /// Series, in any order.
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

impl DistributionConfig {
    /// Build the runtime distribution.
    pub fn to_distribution(&self) -> Distribution {
        Distribution {
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            series: self.series.clone(),
        }
    }
}

/// One archive publishing the distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Numeric identifier used by publication records.
    pub id: i64,
    /// Archive name, e.g. `primary` or `ppa`.
    pub name: String,
    /// Human readable name.
    pub display_name: String,
    pub purpose: ArchivePurpose,
    /// Owner of a PPA.
    #[serde(default)]
    pub owner: Option<String>,
    /// Archive root holding `pool/`.
    pub root: PathBuf,
    /// Where `dists/` lives, if not under the root.
    #[serde(default)]
    pub dists_root: Option<PathBuf>,
    /// GPG key used to sign Release files.
    #[serde(default)]
    pub signing_key: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub publish_debug_symbols: bool,
    /// Overrides whether stable RELEASE pockets may be modified.
    #[serde(default)]
    pub allow_release_pocket_updates: Option<bool>,
}

impl ArchiveConfig {
    /// Build the runtime archive.
    pub fn to_archive(&self) -> Archive {
        Archive {
            id: self.id,
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            purpose: self.purpose,
            owner: self.owner.clone(),
            root: self.root.clone(),
            dists_root: self
                .dists_root
                .clone()
                .unwrap_or_else(|| self.root.join("dists")),
            signing_key: self.signing_key.clone(),
            private: self.private,
            publish_debug_symbols: self.publish_debug_symbols,
            allow_release_pocket_updates: self.allow_release_pocket_updates,
        }
    }

    /// Validate the archive configuration.
    pub fn validate(&self) -> PublisherResult<()> {
        if self.name.is_empty() {
            return Err(PublisherError::Configuration(
                "Archive name cannot be empty".to_string(),
            ));
        }
        if self.purpose == ArchivePurpose::Ppa && self.owner.is_none() {
            return Err(PublisherError::Configuration(format!(
                "PPA '{}' needs an owner",
                self.name
            )));
        }
        if let Some(key) = &self.signing_key {
            if key.is_empty() {
                return Err(PublisherError::Configuration(
                    "GPG key ID cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn default_stay_of_execution_hours() -> i64 {
    24
}

/// Publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Distribution being published.
    pub distribution: DistributionConfig,
    /// Archives to publish.
    #[serde(default)]
    pub archives: Vec<ArchiveConfig>,
    /// How long superseded by-hash files stay available.
    #[serde(default = "default_stay_of_execution_hours")]
    pub by_hash_stay_of_execution_hours: i64,
    /// GPG home directory for signing.
    #[serde(default)]
    pub gpg_home: Option<PathBuf>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            distribution: DistributionConfig::default(),
            archives: Vec::new(),
            by_hash_stay_of_execution_hours: default_stay_of_execution_hours(),
            gpg_home: None,
        }
    }
}

impl PublisherConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> PublisherResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PublisherError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: PublisherConfig = serde_json::from_str(&content).map_err(|e| {
            PublisherError::Configuration(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn to_file(&self, path: &Path) -> PublisherResult<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            PublisherError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content).map_err(|e| {
            PublisherError::Configuration(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Validate the entire configuration.
    pub fn validate(&self) -> PublisherResult<()> {
        let mut names = HashSet::new();
        let mut ids = HashSet::new();
        for series in &self.distribution.series {
            validate_series(series)?;
            if !names.insert(series.name.as_str()) || !ids.insert(series.id) {
                return Err(PublisherError::Configuration(format!(
                    "Series '{}' is defined more than once",
                    series.name
                )));
            }
        }

        let mut archive_names = HashSet::new();
        for archive in &self.archives {
            archive.validate()?;
            if !archive_names.insert(archive.name.as_str()) {
                return Err(PublisherError::Configuration(format!(
                    "Archive '{}' is defined more than once",
                    archive.name
                )));
            }
        }

        if self.by_hash_stay_of_execution_hours < 0 {
            return Err(PublisherError::Configuration(
                "by_hash_stay_of_execution_hours cannot be negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Get archive configuration by name.
    pub fn get_archive(&self, name: &str) -> Option<&ArchiveConfig> {
        self.archives.iter().find(|a| a.name == name)
    }

    /// The archive used when none is named: the primary one, else the
    /// first configured.
    pub fn default_archive(&self) -> Option<&ArchiveConfig> {
        self.archives
            .iter()
            .find(|a| a.purpose == ArchivePurpose::Primary)
            .or_else(|| self.archives.first())
    }

    /// Grace period for superseded by-hash files.
    pub fn stay_of_execution(&self) -> chrono::Duration {
        chrono::Duration::hours(self.by_hash_stay_of_execution_hours)
    }
}

fn validate_series(series: &SeriesConfig) -> PublisherResult<()> {
    if series.name.is_empty() {
        return Err(PublisherError::Configuration(
            "Series name cannot be empty".to_string(),
        ));
    }

    if series.architectures.is_empty() {
        return Err(PublisherError::Configuration(format!(
            "Series '{}': at least one architecture must be specified",
            series.name
        )));
    }

    if series.components.is_empty() {
        return Err(PublisherError::Configuration(format!(
            "Series '{}': at least one component must be specified",
            series.name
        )));
    }

    if series.index_compressors.is_empty() {
        return Err(PublisherError::Configuration(format!(
            "Series '{}': at least one index compressor must be specified",
            series.name
        )));
    }

    if series.advertise_by_hash && !series.publish_by_hash {
        return Err(PublisherError::Configuration(format!(
            "Series '{}': advertise_by_hash requires publish_by_hash",
            series.name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SeriesStatus;
    use apt_repository::Compression;
    use tempfile::TempDir;

    fn focal() -> SeriesConfig {
        SeriesConfig {
            id: 1,
            name: "focal".to_string(),
            display_name: "Focal".to_string(),
            version: Some("20.04".to_string()),
            status: SeriesStatus::Current,
            architectures: vec!["amd64".to_string()],
            components: vec!["main".to_string()],
            index_compressors: vec![Compression::Gzip],
            publish_by_hash: true,
            advertise_by_hash: true,
            include_long_descriptions: true,
            backports_not_automatic: false,
        }
    }

    fn config(root: &Path) -> PublisherConfig {
        PublisherConfig {
            distribution: DistributionConfig {
                name: "ubuntu".to_string(),
                display_name: "Ubuntu".to_string(),
                series: vec![focal()],
            },
            archives: vec![ArchiveConfig {
                id: 1,
                name: "primary".to_string(),
                display_name: "Primary Archive".to_string(),
                purpose: ArchivePurpose::Primary,
                owner: None,
                root: root.to_path_buf(),
                dists_root: None,
                signing_key: None,
                private: false,
                publish_debug_symbols: false,
                allow_release_pocket_updates: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_config_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("publisher.json");
        let config = config(temp_dir.path());
        config.to_file(&path).unwrap();

        let loaded = PublisherConfig::from_file(&path).unwrap();
        assert_eq!(loaded.by_hash_stay_of_execution_hours, 24);
        assert_eq!(loaded.distribution.series[0].name, "focal");
        let archive = loaded.default_archive().unwrap().to_archive();
        assert_eq!(archive.dists_root, temp_dir.path().join("dists"));
    }

    #[test]
    fn test_minimal_series_defaults() {
        let json = r#"{
            "distribution": {
                "name": "ubuntu",
                "display_name": "Ubuntu",
                "series": [{
                    "id": 7,
                    "name": "jammy",
                    "display_name": "Jammy",
                    "status": "development",
                    "architectures": ["amd64"],
                    "components": ["main"]
                }]
            }
        }"#;
        let config: PublisherConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        let series = &config.distribution.series[0];
        assert_eq!(
            series.index_compressors,
            vec![Compression::Gzip, Compression::Xz]
        );
        assert!(series.include_long_descriptions);
        assert!(!series.publish_by_hash);
        assert!(config.archives.is_empty());
    }

    #[test]
    fn test_validation() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config(temp_dir.path());
        assert!(config.validate().is_ok());

        config.distribution.series[0].publish_by_hash = false;
        assert!(config.validate().is_err());
        config.distribution.series[0].publish_by_hash = true;

        config.distribution.series.push(focal());
        assert!(config.validate().is_err());
        config.distribution.series.pop();

        config.archives[0].purpose = ArchivePurpose::Ppa;
        assert!(config.validate().is_err());
    }
}
