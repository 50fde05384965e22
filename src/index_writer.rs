//! Writing the Sources, Packages and Translation-en indices of a component.

use apt_repository::{IndexFile, TranslationEntry, TranslationIndex, WrittenIndex};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PublisherResult;
use crate::model::{
    pool_dir, pool_path, Archive, BinaryPublication, DistroSeries, SourcePublication, SuiteKey,
};

/// What writing one component produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ComponentIndexes {
    /// Every index file written, changed or not.
    pub written: Vec<PathBuf>,
    /// How many of them changed on disk.
    pub changed: usize,
    /// Binaries not indexed because their subcomponent or architecture is
    /// not published.
    pub skipped_binaries: usize,
}

impl ComponentIndexes {
    fn record(&mut self, written: Vec<WrittenIndex>) {
        for w in written {
            if w.changed {
                self.changed += 1;
            }
            self.written.push(w.path);
        }
    }
}

pub struct IndexWriter<'a> {
    archive: &'a Archive,
    series: &'a DistroSeries,
}

impl<'a> IndexWriter<'a> {
    pub fn new(archive: &'a Archive, series: &'a DistroSeries) -> Self {
        Self { archive, series }
    }

    /// Write every index of `component` in `suite` from its current
    /// publications.
    pub fn write_component_indexes(
        &self,
        suite: &SuiteKey,
        component: &str,
        sources: &[SourcePublication],
        binaries: &[BinaryPublication],
    ) -> PublisherResult<ComponentIndexes> {
        let component_dir = self.archive.suite_dir(suite).join(component);
        let mut result = ComponentIndexes::default();

        result.record(self.write_sources(&component_dir, component, sources)?);

        let separate_descriptions = !self.series.include_long_descriptions;
        let mut translations = TranslationIndex::new();
        let mut translation_text = String::new();
        let subcomponents = self.archive.subcomponents();
        let architectures = self.series.sorted_architectures();

        for binary in binaries {
            let subcomponent_ok = binary
                .format
                .subcomponent()
                .map_or(true, |s| subcomponents.contains(&s));
            if !subcomponent_ok || !architectures.contains(&binary.architecture) {
                debug!(
                    "Not indexing {} {} ({}, {}) in {}/{}",
                    binary.name(),
                    binary.version(),
                    binary.format.as_str(),
                    binary.architecture,
                    suite,
                    component
                );
                result.skipped_binaries += 1;
            }
        }

        for arch in &architectures {
            let variants = std::iter::once(None).chain(subcomponents.iter().copied().map(Some));
            for subcomponent in variants {
                let mut selected: Vec<&BinaryPublication> = binaries
                    .iter()
                    .filter(|b| &b.architecture == arch && b.format.subcomponent() == subcomponent)
                    .collect();
                selected.sort_by(|a, b| {
                    (a.name(), a.version(), a.id).cmp(&(b.name(), b.version(), b.id))
                });

                let mut dir = component_dir.clone();
                if let Some(subcomponent) = subcomponent {
                    dir.push(subcomponent);
                }
                dir.push(format!("binary-{}", arch));

                let mut index = IndexFile::create(&dir, "Packages", &self.series.index_compressors)?;
                for binary in selected {
                    let mut stanza = binary.stanza.clone();
                    stanza.filename = pool_path(component, &binary.source_name, &binary.file.filename);
                    if separate_descriptions && subcomponent.is_none() {
                        writeln!(index, "{}", stanza.to_paragraph_with_separate_description())?;
                        if let Some(entry) = translations.insert(&TranslationEntry::for_package(&stanza)) {
                            translation_text.push_str(&entry);
                            translation_text.push('\n');
                        }
                    } else {
                        writeln!(index, "{}", stanza.to_paragraph())?;
                    }
                }
                result.record(index.close()?);
            }
        }

        if separate_descriptions {
            let mut index = IndexFile::create(
                &component_dir.join("i18n"),
                "Translation-en",
                &self.series.index_compressors,
            )?;
            index.write_all(translation_text.as_bytes())?;
            result.record(index.close()?);
            debug!(
                "{} distinct descriptions in {}/{}",
                translations.len(),
                suite,
                component
            );
        }

        Ok(result)
    }

    fn write_sources(
        &self,
        component_dir: &Path,
        component: &str,
        sources: &[SourcePublication],
    ) -> PublisherResult<Vec<WrittenIndex>> {
        let mut sorted: Vec<&SourcePublication> = sources.iter().collect();
        sorted.sort_by(|a, b| (a.name(), a.version(), a.id).cmp(&(b.name(), b.version(), b.id)));

        let mut index = IndexFile::create(
            &component_dir.join("source"),
            "Sources",
            &self.series.index_compressors,
        )?;
        for source in sorted {
            let mut stanza = source.stanza.clone();
            stanza.directory = pool_dir(component, source.name());
            writeln!(index, "{}", stanza.to_paragraph())?;
        }
        Ok(index.close()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ArchivePurpose, BinaryFormat, Pocket, PoolFile, PublishingStatus, SeriesStatus,
    };
    use apt_repository::{packages::parse_packages, Compression, Package, Source};
    use std::fs;
    use tempfile::TempDir;

    fn series() -> DistroSeries {
        DistroSeries {
            id: 1,
            name: "jammy".to_string(),
            display_name: "Jammy".to_string(),
            version: Some("22.04".to_string()),
            status: SeriesStatus::Development,
            architectures: vec!["amd64".to_string()],
            components: vec!["main".to_string()],
            index_compressors: vec![Compression::None, Compression::Gzip],
            publish_by_hash: false,
            advertise_by_hash: false,
            include_long_descriptions: false,
            backports_not_automatic: false,
        }
    }

    fn archive(root: &Path) -> Archive {
        Archive {
            id: 1,
            name: "primary".to_string(),
            display_name: "Primary".to_string(),
            purpose: ArchivePurpose::Primary,
            owner: None,
            root: root.to_path_buf(),
            dists_root: root.join("dists"),
            signing_key: None,
            private: false,
            publish_debug_symbols: false,
            allow_release_pocket_updates: None,
        }
    }

    fn binary(id: i64, name: &str, arch: &str, format: BinaryFormat) -> BinaryPublication {
        let mut stanza = Package::new(name, "1.0", arch, "", 10);
        stanza.summary = "a tool".to_string();
        stanza.description = Some("Does things.".to_string());
        BinaryPublication {
            id,
            archive_id: 1,
            suite: SuiteKey::new("jammy", Pocket::Release),
            component: "main".to_string(),
            architecture: arch.to_string(),
            format,
            source_name: "tools".to_string(),
            status: PublishingStatus::Published,
            scheduled_deletion_date: None,
            date_removed: None,
            stanza,
            file: PoolFile {
                filename: format!("{}_1.0_{}.{}", name, arch, format.as_str()),
                size: 10,
                sha256: String::new(),
                staged_path: PathBuf::new(),
            },
        }
    }

    #[test]
    fn test_component_layout() {
        let root = TempDir::new().unwrap();
        let archive = archive(root.path());
        let series = series();
        let suite = SuiteKey::new("jammy", Pocket::Release);
        let source = SourcePublication {
            id: 1,
            archive_id: 1,
            suite: suite.clone(),
            component: "main".to_string(),
            status: PublishingStatus::Published,
            scheduled_deletion_date: None,
            date_removed: None,
            stanza: Source::new("tools", "1.0", "any", ""),
            files: Vec::new(),
        };
        let binaries = vec![
            binary(2, "tool-b", "amd64", BinaryFormat::Deb),
            binary(3, "tool-a", "amd64", BinaryFormat::Deb),
            binary(4, "tool-udeb", "amd64", BinaryFormat::Udeb),
            binary(5, "tool-dbgsym", "amd64", BinaryFormat::Ddeb),
        ];

        let result = IndexWriter::new(&archive, &series)
            .write_component_indexes(&suite, "main", &[source], &binaries)
            .unwrap();
        assert_eq!(result.skipped_binaries, 1);

        let main = root.path().join("dists/jammy/main");
        let sources = fs::read_to_string(main.join("source/Sources")).unwrap();
        assert!(sources.contains("Directory: pool/main/t/tools\n"));
        assert!(main.join("source/Sources.gz").exists());

        let packages =
            parse_packages(&fs::read_to_string(main.join("binary-amd64/Packages")).unwrap()).unwrap();
        let names: Vec<&str> = packages.iter().map(|p| p.package.as_str()).collect();
        assert_eq!(names, vec!["tool-a", "tool-b"]);
        assert_eq!(packages[0].filename, "pool/main/t/tools/tool-a_1.0_amd64.deb");
        assert!(packages[0].description.is_none());

        let udebs = fs::read_to_string(main.join("debian-installer/binary-amd64/Packages")).unwrap();
        assert!(udebs.contains("Package: tool-udeb\n"));
        assert!(udebs.contains(" Does things.\n"));
        assert!(!main.join("debug").exists());

        let translation = fs::read_to_string(main.join("i18n/Translation-en")).unwrap();
        assert_eq!(translation.matches("Package: ").count(), 2);

        let again = IndexWriter::new(&archive, &series)
            .write_component_indexes(&suite, "main", &[], &binaries)
            .unwrap();
        assert!(again.changed > 0);
        let same = IndexWriter::new(&archive, &series)
            .write_component_indexes(&suite, "main", &[], &binaries)
            .unwrap();
        assert_eq!(same.changed, 0);
    }
}
