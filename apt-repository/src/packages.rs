//! Binary package stanzas for `Packages` indices.

use crate::control::{self, format_description_field, format_long_description};
use crate::{AptRepositoryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Debian binary package entry in a Packages file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name.
    pub package: String,
    /// Source package, when its name or version differs from the binary's.
    pub source: Option<String>,
    /// Package version.
    pub version: String,
    /// Architecture.
    pub architecture: String,
    /// Whether the package is marked essential.
    pub essential: bool,
    /// Package priority.
    pub priority: Option<String>,
    /// Package section.
    pub section: Option<String>,
    /// Maintainer.
    pub maintainer: Option<String>,
    /// Installed size in kilobytes.
    pub installed_size: Option<u64>,
    /// Package dependencies.
    pub depends: Option<String>,
    /// Package pre-dependencies.
    pub pre_depends: Option<String>,
    /// Package recommendations.
    pub recommends: Option<String>,
    /// Package suggestions.
    pub suggests: Option<String>,
    /// Package conflicts.
    pub conflicts: Option<String>,
    /// Package breaks.
    pub breaks: Option<String>,
    /// Package replaces.
    pub replaces: Option<String>,
    /// Package provides.
    pub provides: Option<String>,
    /// Package homepage.
    pub homepage: Option<String>,
    /// Filename (relative to the archive root).
    pub filename: String,
    /// File size in bytes.
    pub size: u64,
    /// MD5 hash of the .deb.
    pub md5sum: String,
    /// SHA1 hash of the .deb.
    pub sha1: String,
    /// SHA256 hash of the .deb.
    pub sha256: String,
    /// One-line summary.
    pub summary: String,
    /// Long description body, unindented.
    pub description: Option<String>,
    /// Additional fields, emitted in order after the standard ones.
    pub additional_fields: Vec<(String, String)>,
}

impl Package {
    /// Create a new package with required fields.
    pub fn new<S: Into<String>>(
        package: S,
        version: S,
        architecture: S,
        filename: S,
        size: u64,
    ) -> Self {
        Self {
            package: package.into(),
            source: None,
            version: version.into(),
            architecture: architecture.into(),
            essential: false,
            priority: None,
            section: None,
            maintainer: None,
            installed_size: None,
            depends: None,
            pre_depends: None,
            recommends: None,
            suggests: None,
            conflicts: None,
            breaks: None,
            replaces: None,
            provides: None,
            homepage: None,
            filename: filename.into(),
            size,
            md5sum: String::new(),
            sha1: String::new(),
            sha256: String::new(),
            summary: String::new(),
            description: None,
            additional_fields: Vec::new(),
        }
    }

    /// The full description as it appears in a control file: summary line,
    /// then the indented long description.
    pub fn full_description(&self) -> String {
        match self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(long) => format!("{}\n{}", self.summary, format_long_description(long)),
            None => self.summary.clone(),
        }
    }

    /// MD5 of the full description plus a trailing newline, as used by
    /// `Description-md5`.
    pub fn description_md5(&self) -> String {
        let mut text = self.full_description();
        text.push('\n');
        format!("{:x}", md5::compute(text.as_bytes()))
    }

    /// Convert the package to a control file paragraph with the long
    /// description inline.
    pub fn to_paragraph(&self) -> String {
        self.render(false)
    }

    /// Convert the package to a paragraph whose long description lives in
    /// a separate `Translation-en` index.
    pub fn to_paragraph_with_separate_description(&self) -> String {
        self.render(true)
    }

    fn render(&self, separate_description: bool) -> String {
        let mut paragraph = String::new();

        paragraph.push_str(&format!("Package: {}\n", self.package));
        if let Some(ref source) = self.source {
            paragraph.push_str(&format!("Source: {}\n", source));
        }
        if self.essential {
            paragraph.push_str("Essential: yes\n");
        }
        if let Some(ref priority) = self.priority {
            paragraph.push_str(&format!("Priority: {}\n", priority));
        }
        if let Some(ref section) = self.section {
            paragraph.push_str(&format!("Section: {}\n", section));
        }
        if let Some(installed_size) = self.installed_size {
            paragraph.push_str(&format!("Installed-Size: {}\n", installed_size));
        }
        if let Some(ref maintainer) = self.maintainer {
            paragraph.push_str(&format!("Maintainer: {}\n", maintainer));
        }
        paragraph.push_str(&format!("Architecture: {}\n", self.architecture));
        paragraph.push_str(&format!("Version: {}\n", self.version));

        let relations = [
            ("Replaces", &self.replaces),
            ("Provides", &self.provides),
            ("Depends", &self.depends),
            ("Pre-Depends", &self.pre_depends),
            ("Recommends", &self.recommends),
            ("Suggests", &self.suggests),
            ("Conflicts", &self.conflicts),
            ("Breaks", &self.breaks),
        ];
        for (name, value) in relations {
            if let Some(value) = value {
                paragraph.push_str(&format!("{}: {}\n", name, value));
            }
        }

        paragraph.push_str(&format!("Filename: {}\n", self.filename));
        paragraph.push_str(&format!("Size: {}\n", self.size));
        paragraph.push_str(&format!("MD5sum: {}\n", self.md5sum));
        paragraph.push_str(&format!("SHA1: {}\n", self.sha1));
        paragraph.push_str(&format!("SHA256: {}\n", self.sha256));

        if let Some(ref homepage) = self.homepage {
            paragraph.push_str(&format!("Homepage: {}\n", homepage));
        }

        if separate_description {
            paragraph.push_str(&format!("Description: {}\n", self.summary));
            paragraph.push_str(&format!("Description-md5: {}\n", self.description_md5()));
        } else {
            paragraph.push_str(&format_description_field(
                "Description",
                &self.summary,
                self.description.as_deref(),
            ));
        }

        for (key, value) in &self.additional_fields {
            paragraph.push_str(&format!("{}: {}\n", key, value));
        }

        paragraph
    }

    /// Parse a package from a control file paragraph.
    pub fn from_paragraph(paragraph: &str) -> Result<Self> {
        let fields = control::parse_paragraph(paragraph)?;
        let required = |name: &str| {
            control::field(&fields, name)
                .map(str::to_string)
                .ok_or_else(|| AptRepositoryError::missing_field(name))
        };
        let optional = |name: &str| control::field(&fields, name).map(str::to_string);

        let size_str = required("Size")?;
        let size = size_str
            .parse::<u64>()
            .map_err(|_| AptRepositoryError::invalid_field("Size", size_str.as_str()))?;

        let (summary, description) = match control::field(&fields, "Description") {
            Some(desc) => match desc.split_once('\n') {
                Some((short, long)) => (short.to_string(), Some(unindent_description(long))),
                None => (desc.to_string(), None),
            },
            None => (String::new(), None),
        };

        const KNOWN: &[&str] = &[
            "Package", "Source", "Essential", "Priority", "Section", "Installed-Size",
            "Maintainer", "Architecture", "Version", "Replaces", "Provides", "Depends",
            "Pre-Depends", "Recommends", "Suggests", "Conflicts", "Breaks", "Filename",
            "Size", "MD5sum", "SHA1", "SHA256", "Homepage", "Description",
        ];

        Ok(Self {
            package: required("Package")?,
            source: optional("Source"),
            version: required("Version")?,
            architecture: required("Architecture")?,
            essential: optional("Essential").map_or(false, |v| v == "yes"),
            priority: optional("Priority"),
            section: optional("Section"),
            maintainer: optional("Maintainer"),
            installed_size: optional("Installed-Size").and_then(|s| s.parse().ok()),
            depends: optional("Depends"),
            pre_depends: optional("Pre-Depends"),
            recommends: optional("Recommends"),
            suggests: optional("Suggests"),
            conflicts: optional("Conflicts"),
            breaks: optional("Breaks"),
            replaces: optional("Replaces"),
            provides: optional("Provides"),
            homepage: optional("Homepage"),
            filename: required("Filename")?,
            size,
            md5sum: optional("MD5sum").unwrap_or_default(),
            sha1: optional("SHA1").unwrap_or_default(),
            sha256: optional("SHA256").unwrap_or_default(),
            summary,
            description,
            additional_fields: fields
                .iter()
                .filter(|(k, _)| !KNOWN.iter().any(|known| known.eq_ignore_ascii_case(k)))
                .cloned()
                .collect(),
        })
    }
}

/// Undo [`format_long_description`]: strip one leading space and turn
/// ` .` back into an empty line.
fn unindent_description(long: &str) -> String {
    long.lines()
        .map(|line| {
            let line = line.strip_prefix(' ').unwrap_or(line);
            if line == "." {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_paragraph())
    }
}

/// Parse every paragraph of a Packages file.
pub fn parse_packages(content: &str) -> Result<Vec<Package>> {
    let mut packages = Vec::new();
    for part in content.split("\n\n").filter(|p| !p.trim().is_empty()) {
        packages.push(Package::from_paragraph(part)?);
    }
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Package {
        let mut package = Package::new(
            "hello",
            "2.10-2",
            "amd64",
            "pool/main/h/hello/hello_2.10-2_amd64.deb",
            56132,
        );
        package.maintainer = Some("Test Maintainer <test@example.com>".to_string());
        package.section = Some("devel".to_string());
        package.priority = Some("optional".to_string());
        package.summary = "example package based on GNU hello".to_string();
        package.description = Some("The GNU hello program.\n\nIt greets.".to_string());
        package.md5sum = "abc".to_string();
        package
    }

    #[test]
    fn test_inline_description() {
        let paragraph = sample().to_paragraph();
        assert!(paragraph.contains(
            "Description: example package based on GNU hello\n The GNU hello program.\n .\n It greets.\n"
        ));
        assert!(!paragraph.contains("Description-md5"));
    }

    #[test]
    fn test_separate_description() {
        let package = sample();
        let paragraph = package.to_paragraph_with_separate_description();
        assert!(paragraph.contains("Description: example package based on GNU hello\n"));
        assert!(paragraph.contains(&format!("Description-md5: {}\n", package.description_md5())));
        assert!(!paragraph.contains("It greets."));
    }

    #[test]
    fn test_description_md5_covers_long_text() {
        let package = sample();
        let expected = format!(
            "{:x}",
            md5::compute(
                b"example package based on GNU hello\n The GNU hello program.\n .\n It greets.\n"
            )
        );
        assert_eq!(package.description_md5(), expected);

        let mut other = package.clone();
        other.description = Some("Different.".to_string());
        assert_ne!(other.description_md5(), package.description_md5());
    }

    #[test]
    fn test_parse_rendered_paragraph() {
        let package = sample();
        let parsed = Package::from_paragraph(&package.to_paragraph()).unwrap();
        assert_eq!(parsed.package, "hello");
        assert_eq!(parsed.summary, package.summary);
        assert_eq!(parsed.description, package.description);
        assert_eq!(parsed.size, 56132);
        assert!(parsed.additional_fields.is_empty());
    }

    #[test]
    fn test_missing_filename_is_an_error() {
        let result = Package::from_paragraph("Package: a\nVersion: 1\nArchitecture: all\nSize: 1\n");
        assert!(matches!(result, Err(AptRepositoryError::MissingField(f)) if f == "Filename"));
    }
}
