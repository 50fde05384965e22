use apt_repository::*;
use chrono::{TimeZone, Utc};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn hello(arch: &str) -> Package {
    let mut package = Package::new(
        "hello",
        "2.10-2",
        arch,
        format!("pool/main/h/hello/hello_2.10-2_{}.deb", arch).as_str(),
        56132,
    );
    package.source = Some("hello".to_string());
    package.section = Some("devel".to_string());
    package.priority = Some("optional".to_string());
    package.summary = "example package based on GNU hello".to_string();
    package.description = Some("The GNU hello program produces a familiar greeting.".to_string());
    package
}

fn checksum_entry(root: &Path, name: &str) -> ChecksumEntry {
    let data = fs::read(root.join(name)).unwrap();
    let (size, digests) = hash_data(&data);
    ChecksumEntry {
        name: name.to_string(),
        size,
        digests,
    }
}

#[test]
fn test_suite_with_split_translations() {
    let temp_dir = TempDir::new().unwrap();
    let suite_dir = temp_dir.path();
    let compressors = [Compression::None, Compression::Gzip, Compression::Xz];

    let mut translations = TranslationIndex::new();
    let mut translation_text = String::new();
    for arch in ["amd64", "i386"] {
        let arch_dir = suite_dir.join("main").join(format!("binary-{}", arch));
        let mut packages = IndexFile::create(&arch_dir, "Packages", &compressors).unwrap();
        let package = hello(arch);
        writeln!(packages, "{}", package.to_paragraph_with_separate_description()).unwrap();
        packages.close().unwrap();

        if let Some(stanza) = translations.insert(&TranslationEntry::for_package(&package)) {
            translation_text.push_str(&stanza);
            translation_text.push('\n');
        }
    }
    assert_eq!(translations.len(), 1);

    let i18n_dir = suite_dir.join("main/i18n");
    let mut translation =
        IndexFile::create(&i18n_dir, "Translation-en", &[Compression::Bzip2]).unwrap();
    translation.write_all(translation_text.as_bytes()).unwrap();
    translation.close().unwrap();

    let names = [
        "main/binary-amd64/Packages",
        "main/binary-amd64/Packages.gz",
        "main/binary-amd64/Packages.xz",
        "main/binary-i386/Packages",
        "main/binary-i386/Packages.gz",
        "main/binary-i386/Packages.xz",
        "main/i18n/Translation-en.bz2",
    ];
    let release = Release {
        origin: "Ubuntu".to_string(),
        label: "Ubuntu".to_string(),
        suite: "focal".to_string(),
        version: Some("20.04".to_string()),
        codename: "focal".to_string(),
        date: Utc.with_ymd_and_hms(2020, 4, 23, 17, 33, 17).unwrap(),
        architectures: vec!["amd64".to_string(), "i386".to_string()],
        components: vec!["main".to_string()],
        description: Some("Ubuntu Focal 20.04".to_string()),
        not_automatic: false,
        but_automatic_upgrades: false,
        acquire_by_hash: true,
        files: names.iter().map(|n| checksum_entry(suite_dir, n)).collect(),
    };
    fs::write(suite_dir.join("Release"), release.to_text()).unwrap();

    let parsed = Release::parse(&fs::read_to_string(suite_dir.join("Release")).unwrap()).unwrap();
    for name in names {
        let listed = parsed.file(name).unwrap();
        let data = fs::read(suite_dir.join(name)).unwrap();
        assert_eq!(listed.size, data.len() as u64);
        assert_eq!(listed.digests, hash_data(&data).1);
    }

    let packages =
        packages::parse_packages(&fs::read_to_string(suite_dir.join(names[0])).unwrap()).unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0].summary, "example package based on GNU hello");
    assert!(packages[0].description.is_none());

    let compressed = fs::read(suite_dir.join("main/i18n/Translation-en.bz2")).unwrap();
    let text = String::from_utf8(Compression::Bzip2.decompress(&compressed).unwrap()).unwrap();
    assert!(text.starts_with("Package: hello\nDescription-md5: "));
    assert!(text.contains(" The GNU hello program produces a familiar greeting.\n"));
}

#[test]
fn test_sources_index_reads_back() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("main/source");

    let mut source = Source::new("hello", "2.10-2", "any", "pool/main/h/hello");
    source.binary = Some("hello".to_string());
    source.format = Some("3.0 (quilt)".to_string());
    source
        .files
        .push(SourceFileEntry::new("5d41402abc4b2a76b9719d911017c592", 1234, "hello_2.10-2.dsc"));

    let mut index = IndexFile::create(&dir, "Sources", &[Compression::Gzip]).unwrap();
    writeln!(index, "{}", source.to_paragraph()).unwrap();
    let written = index.close().unwrap();
    assert_eq!(written.len(), 1);
    assert!(!dir.join("Sources").exists());

    let data = fs::read(dir.join("Sources.gz")).unwrap();
    let text = String::from_utf8(Compression::Gzip.decompress(&data).unwrap()).unwrap();
    let sources = sources::parse_sources(&text).unwrap();
    assert_eq!(sources, vec![source]);
}

#[test]
fn test_component_release_and_i18n_index() {
    let component = ComponentRelease {
        archive: "focal-updates".to_string(),
        version: Some("20.04".to_string()),
        component: "universe".to_string(),
        origin: "Ubuntu".to_string(),
        label: "Ubuntu".to_string(),
        architecture: "amd64".to_string(),
    };
    let text = component.to_text();
    assert!(text.starts_with("Archive: focal-updates\n"));
    assert!(text.ends_with("Architecture: amd64\n"));

    let (size, digests) = hash_data(b"Package: hello\n");
    let index = I18nIndex {
        files: vec![ChecksumEntry {
            name: "Translation-en".to_string(),
            size,
            digests: digests.clone(),
        }],
    };
    assert_eq!(
        index.to_text(),
        format!("SHA1:\n {} 15 Translation-en\n", digests.sha1)
    );
}
