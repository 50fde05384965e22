//! Source package stanzas for `Sources` indices.

use crate::control;
use crate::{AptRepositoryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Debian source package entry in a Sources file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Package name.
    pub package: String,
    /// Binary package names produced by this source, comma separated.
    pub binary: Option<String>,
    /// Package version.
    pub version: String,
    /// Maintainer.
    pub maintainer: Option<String>,
    /// Uploaders.
    pub uploaders: Option<String>,
    /// Build dependencies.
    pub build_depends: Option<String>,
    /// Build dependencies (architecture-independent).
    pub build_depends_indep: Option<String>,
    /// Build conflicts.
    pub build_conflicts: Option<String>,
    /// Build conflicts (architecture-independent).
    pub build_conflicts_indep: Option<String>,
    /// Architecture list.
    pub architecture: String,
    /// Standards version.
    pub standards_version: Option<String>,
    /// Format version.
    pub format: Option<String>,
    /// Directory (relative to the archive root).
    pub directory: String,
    /// Files that make up this source package, with MD5 digests.
    pub files: Vec<SourceFileEntry>,
    /// The same files with SHA1 digests.
    pub checksums_sha1: Vec<SourceFileEntry>,
    /// The same files with SHA256 digests.
    pub checksums_sha256: Vec<SourceFileEntry>,
    /// Package homepage.
    pub homepage: Option<String>,
    /// VCS browser URL.
    pub vcs_browser: Option<String>,
    /// VCS Git repository.
    pub vcs_git: Option<String>,
    /// Package section.
    pub section: Option<String>,
    /// Package priority.
    pub priority: Option<String>,
    /// Additional fields, emitted in order after the standard ones.
    pub additional_fields: Vec<(String, String)>,
}

/// A file entry in a source package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFileEntry {
    /// Hash value.
    pub hash: String,
    /// File size in bytes.
    pub size: u64,
    /// Filename.
    pub name: String,
}

impl SourceFileEntry {
    /// Create a new source file entry.
    pub fn new<S: Into<String>>(hash: S, size: u64, name: S) -> Self {
        Self {
            hash: hash.into(),
            size,
            name: name.into(),
        }
    }

    /// Parse a file entry from a checksum line.
    pub fn from_checksum_line(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(AptRepositoryError::invalid_metadata(format!(
                "Invalid checksum line format: {}",
                line
            )));
        }

        let size = parts[1]
            .parse::<u64>()
            .map_err(|_| AptRepositoryError::invalid_field("size", parts[1]))?;

        Ok(Self {
            hash: parts[0].to_string(),
            size,
            name: parts[2].to_string(),
        })
    }

    /// Convert to a checksum line format.
    pub fn to_checksum_line(&self) -> String {
        format!(" {} {} {}", self.hash, self.size, self.name)
    }
}

impl Source {
    /// Create a new source package with required fields.
    pub fn new<S: Into<String>>(package: S, version: S, architecture: S, directory: S) -> Self {
        Self {
            package: package.into(),
            binary: None,
            version: version.into(),
            maintainer: None,
            uploaders: None,
            build_depends: None,
            build_depends_indep: None,
            build_conflicts: None,
            build_conflicts_indep: None,
            architecture: architecture.into(),
            standards_version: None,
            format: None,
            directory: directory.into(),
            files: Vec::new(),
            checksums_sha1: Vec::new(),
            checksums_sha256: Vec::new(),
            homepage: None,
            vcs_browser: None,
            vcs_git: None,
            section: None,
            priority: None,
            additional_fields: Vec::new(),
        }
    }

    fn format_file_list(name: &str, entries: &[SourceFileEntry], out: &mut String) {
        if entries.is_empty() {
            return;
        }
        out.push_str(name);
        out.push_str(":\n");
        for entry in entries {
            out.push_str(&entry.to_checksum_line());
            out.push('\n');
        }
    }

    fn parse_file_list(content: Option<&str>) -> Result<Vec<SourceFileEntry>> {
        content
            .unwrap_or_default()
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(SourceFileEntry::from_checksum_line)
            .collect()
    }

    /// Convert the source package to a control file paragraph.
    pub fn to_paragraph(&self) -> String {
        let mut paragraph = String::new();

        paragraph.push_str(&format!("Package: {}\n", self.package));
        if let Some(ref binary) = self.binary {
            paragraph.push_str(&format!("Binary: {}\n", binary));
        }
        paragraph.push_str(&format!("Version: {}\n", self.version));
        if let Some(ref maintainer) = self.maintainer {
            paragraph.push_str(&format!("Maintainer: {}\n", maintainer));
        }
        if let Some(ref uploaders) = self.uploaders {
            paragraph.push_str(&format!("Uploaders: {}\n", uploaders));
        }

        let relations = [
            ("Build-Depends", &self.build_depends),
            ("Build-Depends-Indep", &self.build_depends_indep),
            ("Build-Conflicts", &self.build_conflicts),
            ("Build-Conflicts-Indep", &self.build_conflicts_indep),
        ];
        for (name, value) in relations {
            if let Some(value) = value {
                paragraph.push_str(&format!("{}: {}\n", name, value));
            }
        }

        paragraph.push_str(&format!("Architecture: {}\n", self.architecture));
        if let Some(ref standards_version) = self.standards_version {
            paragraph.push_str(&format!("Standards-Version: {}\n", standards_version));
        }
        if let Some(ref format) = self.format {
            paragraph.push_str(&format!("Format: {}\n", format));
        }
        paragraph.push_str(&format!("Directory: {}\n", self.directory));

        Self::format_file_list("Files", &self.files, &mut paragraph);
        Self::format_file_list("Checksums-Sha1", &self.checksums_sha1, &mut paragraph);
        Self::format_file_list("Checksums-Sha256", &self.checksums_sha256, &mut paragraph);

        if let Some(ref homepage) = self.homepage {
            paragraph.push_str(&format!("Homepage: {}\n", homepage));
        }
        if let Some(ref vcs_browser) = self.vcs_browser {
            paragraph.push_str(&format!("Vcs-Browser: {}\n", vcs_browser));
        }
        if let Some(ref vcs_git) = self.vcs_git {
            paragraph.push_str(&format!("Vcs-Git: {}\n", vcs_git));
        }
        if let Some(ref section) = self.section {
            paragraph.push_str(&format!("Section: {}\n", section));
        }
        if let Some(ref priority) = self.priority {
            paragraph.push_str(&format!("Priority: {}\n", priority));
        }

        for (key, value) in &self.additional_fields {
            paragraph.push_str(&format!("{}: {}\n", key, value));
        }

        paragraph
    }

    /// Parse a source package from a control file paragraph.
    pub fn from_paragraph(paragraph: &str) -> Result<Self> {
        let fields = control::parse_paragraph(paragraph)?;
        let required = |name: &str| {
            control::field(&fields, name)
                .map(str::to_string)
                .ok_or_else(|| AptRepositoryError::missing_field(name))
        };
        let optional = |name: &str| control::field(&fields, name).map(str::to_string);

        Ok(Self {
            package: required("Package")?,
            binary: optional("Binary"),
            version: required("Version")?,
            maintainer: optional("Maintainer"),
            uploaders: optional("Uploaders"),
            build_depends: optional("Build-Depends"),
            build_depends_indep: optional("Build-Depends-Indep"),
            build_conflicts: optional("Build-Conflicts"),
            build_conflicts_indep: optional("Build-Conflicts-Indep"),
            architecture: required("Architecture")?,
            standards_version: optional("Standards-Version"),
            format: optional("Format"),
            directory: required("Directory")?,
            files: Self::parse_file_list(control::field(&fields, "Files"))?,
            checksums_sha1: Self::parse_file_list(control::field(&fields, "Checksums-Sha1"))?,
            checksums_sha256: Self::parse_file_list(control::field(&fields, "Checksums-Sha256"))?,
            homepage: optional("Homepage"),
            vcs_browser: optional("Vcs-Browser"),
            vcs_git: optional("Vcs-Git"),
            section: optional("Section"),
            priority: optional("Priority"),
            additional_fields: Vec::new(),
        })
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_paragraph())
    }
}

/// Parse every paragraph of a Sources file.
pub fn parse_sources(content: &str) -> Result<Vec<Source>> {
    control::parse_paragraphs(content)?
        .iter()
        .map(|fields| {
            let text: String = fields
                .iter()
                .map(|(k, v)| format!("{}: {}\n", k, v))
                .collect();
            Source::from_paragraph(&text)
        })
        .collect()
}
