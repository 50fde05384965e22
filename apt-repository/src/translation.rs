//! `Translation-en` entries for long descriptions split out of `Packages`.

use crate::control::format_description_field;
use crate::Package;
use std::collections::HashSet;

/// One stanza of a `Translation-en` index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationEntry {
    /// Binary package name.
    pub package: String,
    /// MD5 of the full description, matching the `Packages` stanza.
    pub description_md5: String,
    /// One-line summary.
    pub summary: String,
    /// Long description body, unindented.
    pub description: Option<String>,
}

impl TranslationEntry {
    /// Build the entry for a binary package.
    pub fn for_package(package: &Package) -> Self {
        Self {
            package: package.package.clone(),
            description_md5: package.description_md5(),
            summary: package.summary.clone(),
            description: package.description.clone(),
        }
    }

    /// Render the stanza.
    pub fn to_paragraph(&self) -> String {
        let mut paragraph = format!(
            "Package: {}\nDescription-md5: {}\n",
            self.package, self.description_md5
        );
        paragraph.push_str(&format_description_field(
            "Description-en",
            &self.summary,
            self.description.as_deref(),
        ));
        paragraph
    }
}

/// Tracks which `(package, description-md5)` pairs have been emitted so
/// identical descriptions shared by several architectures appear once.
#[derive(Debug, Default)]
pub struct TranslationIndex {
    seen: HashSet<(String, String)>,
}

impl TranslationIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry; returns the rendered stanza if it was not already
    /// present.
    pub fn insert(&mut self, entry: &TranslationEntry) -> Option<String> {
        let key = (entry.package.clone(), entry.description_md5.clone());
        if self.seen.insert(key) {
            Some(entry.to_paragraph())
        } else {
            None
        }
    }

    /// Number of distinct entries recorded.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
