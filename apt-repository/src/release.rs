//! Release file generation for APT repositories.

use crate::control;
use crate::{AptRepositoryError, ContentDigests, HashAlgorithm, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `strftime` format of the Release `Date` field.
pub const RELEASE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S UTC";

/// Format a timestamp the way Release files carry it.
pub fn format_release_date(date: &DateTime<Utc>) -> String {
    date.format(RELEASE_DATE_FORMAT).to_string()
}

fn parse_release_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, RELEASE_DATE_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AptRepositoryError::invalid_field("Date", value))
}

/// One file listed in the checksum fields of a Release or i18n Index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumEntry {
    /// Path relative to the directory holding the Release file.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Digests of the content.
    pub digests: ContentDigests,
}

/// Append a multivalued checksum field, right-aligning sizes to the widest
/// one so the columns line up.
fn format_checksum_field(
    out: &mut String,
    algorithm: HashAlgorithm,
    entries: &[ChecksumEntry],
) {
    if entries.is_empty() {
        return;
    }
    let width = entries
        .iter()
        .map(|e| e.size.to_string().len())
        .max()
        .unwrap_or(0);
    out.push_str(algorithm.apt_name());
    out.push_str(":\n");
    for entry in entries {
        out.push_str(&format!(
            " {} {:>width$} {}\n",
            entry.digests.get(algorithm),
            entry.size,
            entry.name,
            width = width
        ));
    }
}

/// Parse the lines of one checksum field into `(digest, size, name)`.
fn parse_checksum_lines(value: &str) -> Result<Vec<(String, u64, String)>> {
    let mut rows = Vec::new();
    for line in value.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(AptRepositoryError::invalid_metadata(format!(
                "Invalid file list line: {}",
                line
            )));
        }
        let size = parts[1]
            .parse::<u64>()
            .map_err(|_| AptRepositoryError::invalid_field("size", parts[1]))?;
        rows.push((parts[0].to_string(), size, parts[2].to_string()));
    }
    Ok(rows)
}

/// A suite-level Release file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Origin of the repository.
    pub origin: String,
    /// Label for the repository.
    pub label: String,
    /// Suite name, e.g. `focal-updates`.
    pub suite: String,
    /// Series version.
    pub version: Option<String>,
    /// Series codename.
    pub codename: String,
    /// Date of generation.
    pub date: DateTime<Utc>,
    /// Architectures, already sorted.
    pub architectures: Vec<String>,
    /// Components, already in presentation order.
    pub components: Vec<String>,
    /// Description.
    pub description: Option<String>,
    /// Whether APT should not install from this suite automatically.
    pub not_automatic: bool,
    /// Whether upgrades of already-installed packages are automatic.
    pub but_automatic_upgrades: bool,
    /// Whether clients may fetch indices by hash.
    pub acquire_by_hash: bool,
    /// Files with their hashes, in listing order.
    pub files: Vec<ChecksumEntry>,
}

impl Release {
    /// Convert the Release to its deb822 text.
    pub fn to_text(&self) -> String {
        let mut content = String::new();

        content.push_str(&format!("Origin: {}\n", self.origin));
        content.push_str(&format!("Label: {}\n", self.label));
        content.push_str(&format!("Suite: {}\n", self.suite));
        if let Some(ref version) = self.version {
            content.push_str(&format!("Version: {}\n", version));
        }
        content.push_str(&format!("Codename: {}\n", self.codename));
        content.push_str(&format!("Date: {}\n", format_release_date(&self.date)));
        content.push_str(&format!("Architectures: {}\n", self.architectures.join(" ")));
        content.push_str(&format!("Components: {}\n", self.components.join(" ")));
        if let Some(ref description) = self.description {
            content.push_str(&format!("Description: {}\n", description));
        }
        if self.not_automatic {
            content.push_str("NotAutomatic: yes\n");
        }
        if self.but_automatic_upgrades {
            content.push_str("ButAutomaticUpgrades: yes\n");
        }
        if self.acquire_by_hash {
            content.push_str("Acquire-By-Hash: yes\n");
        }

        for algorithm in HashAlgorithm::all() {
            format_checksum_field(&mut content, *algorithm, &self.files);
        }

        content
    }

    /// Parse a Release file.
    pub fn parse(content: &str) -> Result<Self> {
        let fields = control::parse_paragraph(content)?;
        let required = |name: &str| {
            control::field(&fields, name)
                .map(str::to_string)
                .ok_or_else(|| AptRepositoryError::missing_field(name))
        };
        let flag = |name: &str| control::field(&fields, name).map_or(false, |v| v == "yes");
        let words = |name: &str| {
            control::field(&fields, name)
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default()
        };

        let mut files: Vec<ChecksumEntry> = Vec::new();
        for algorithm in HashAlgorithm::all() {
            let Some(value) = control::field(&fields, algorithm.apt_name()) else {
                continue;
            };
            for (digest, size, name) in parse_checksum_lines(value)? {
                let index = match files.iter().position(|f| f.name == name) {
                    Some(index) => index,
                    None => {
                        files.push(ChecksumEntry {
                            name: name.clone(),
                            size,
                            digests: ContentDigests {
                                md5: String::new(),
                                sha1: String::new(),
                                sha256: String::new(),
                            },
                        });
                        files.len() - 1
                    }
                };
                let digests = &mut files[index].digests;
                match algorithm {
                    HashAlgorithm::Md5 => digests.md5 = digest,
                    HashAlgorithm::Sha1 => digests.sha1 = digest,
                    HashAlgorithm::Sha256 => digests.sha256 = digest,
                }
            }
        }

        Ok(Self {
            origin: required("Origin")?,
            label: required("Label")?,
            suite: required("Suite")?,
            version: control::field(&fields, "Version").map(str::to_string),
            codename: required("Codename")?,
            date: parse_release_date(&required("Date")?)?,
            architectures: words("Architectures"),
            components: words("Components"),
            description: control::field(&fields, "Description").map(str::to_string),
            not_automatic: flag("NotAutomatic"),
            but_automatic_upgrades: flag("ButAutomaticUpgrades"),
            acquire_by_hash: flag("Acquire-By-Hash"),
            files,
        })
    }

    /// Find a listed file by name.
    pub fn file(&self, name: &str) -> Option<&ChecksumEntry> {
        self.files.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// The small Release file each `source` and `binary-<arch>` directory
/// carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRelease {
    /// Suite name.
    pub archive: String,
    /// Series version.
    pub version: Option<String>,
    /// Component name.
    pub component: String,
    /// Origin of the repository.
    pub origin: String,
    /// Label for the repository.
    pub label: String,
    /// Architecture tag, or `source`.
    pub architecture: String,
}

impl ComponentRelease {
    /// Render the stanza.
    pub fn to_text(&self) -> String {
        let mut content = format!("Archive: {}\n", self.archive);
        if let Some(ref version) = self.version {
            content.push_str(&format!("Version: {}\n", version));
        }
        content.push_str(&format!("Component: {}\n", self.component));
        content.push_str(&format!("Origin: {}\n", self.origin));
        content.push_str(&format!("Label: {}\n", self.label));
        content.push_str(&format!("Architecture: {}\n", self.architecture));
        content
    }
}

/// The `i18n/Index` file listing translation files by SHA1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct I18nIndex {
    /// Translation files, in listing order.
    pub files: Vec<ChecksumEntry>,
}

impl I18nIndex {
    /// Render the index.
    pub fn to_text(&self) -> String {
        let mut content = String::new();
        format_checksum_field(&mut content, HashAlgorithm::Sha1, &self.files);
        content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_data;

    fn entry(name: &str, data: &[u8]) -> ChecksumEntry {
        let (size, digests) = hash_data(data);
        ChecksumEntry {
            name: name.to_string(),
            size,
            digests,
        }
    }

    fn release() -> Release {
        Release {
            origin: "Ubuntu".to_string(),
            label: "Ubuntu".to_string(),
            suite: "focal-backports".to_string(),
            version: Some("20.04".to_string()),
            codename: "focal".to_string(),
            date: Utc.with_ymd_and_hms(2020, 4, 23, 17, 33, 17).unwrap(),
            architectures: vec!["amd64".to_string(), "i386".to_string()],
            components: vec!["main".to_string(), "universe".to_string()],
            description: Some("Ubuntu Focal Backports".to_string()),
            not_automatic: true,
            but_automatic_upgrades: true,
            acquire_by_hash: true,
            files: vec![
                entry("main/binary-amd64/Packages", &[b'x'; 12345]),
                entry("main/binary-amd64/Release", b"Archive: focal\n"),
            ],
        }
    }

    #[test]
    fn test_release_field_order() {
        let text = release().to_text();
        let keys: Vec<&str> = text
            .lines()
            .filter(|l| !l.starts_with(' '))
            .filter_map(|l| l.split(':').next())
            .collect();
        assert_eq!(
            keys,
            vec![
                "Origin", "Label", "Suite", "Version", "Codename", "Date", "Architectures",
                "Components", "Description", "NotAutomatic", "ButAutomaticUpgrades",
                "Acquire-By-Hash", "MD5Sum", "SHA1", "SHA256",
            ]
        );
        assert!(text.contains("Date: Thu, 23 Apr 2020 17:33:17 UTC\n"));
    }

    #[test]
    fn test_sizes_right_aligned() {
        let release = release();
        let text = release.to_text();
        let sha256 = &release.files[1].digests.sha256;
        assert!(text.contains(&format!(" {}    15 main/binary-amd64/Release\n", sha256)));
    }

    #[test]
    fn test_parse_reads_back_checksums() {
        let original = release();
        let parsed = Release::parse(&original.to_text()).unwrap();
        assert_eq!(parsed, original);
        let packages = parsed.file("main/binary-amd64/Packages").unwrap();
        assert_eq!(packages.size, 12345);
    }

    #[test]
    fn test_optional_flags_omitted() {
        let mut release = release();
        release.not_automatic = false;
        release.but_automatic_upgrades = false;
        release.acquire_by_hash = false;
        let text = release.to_text();
        assert!(!text.contains("NotAutomatic"));
        assert!(!text.contains("Acquire-By-Hash"));
    }

    #[test]
    fn test_component_release() {
        let release = ComponentRelease {
            archive: "focal".to_string(),
            version: Some("20.04".to_string()),
            component: "main".to_string(),
            origin: "Ubuntu".to_string(),
            label: "Ubuntu".to_string(),
            architecture: "source".to_string(),
        };
        assert_eq!(
            release.to_text(),
            "Archive: focal\nVersion: 20.04\nComponent: main\nOrigin: Ubuntu\nLabel: Ubuntu\nArchitecture: source\n"
        );
    }

    #[test]
    fn test_i18n_index_alignment() {
        let index = I18nIndex {
            files: vec![
                entry("Translation-en", &[b'a'; 1000]),
                entry("Translation-en.bz2", &[b'b'; 10]),
            ],
        };
        let text = index.to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "SHA1:");
        assert!(lines[1].ends_with(" 1000 Translation-en"));
        assert!(lines[2].ends_with("   10 Translation-en.bz2"));
    }
}
