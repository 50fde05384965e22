//! Content-addressed `by-hash` trees next to published indices.
//!
//! Each index directory gets `by-hash/{MD5Sum,SHA1,SHA256}/<digest>` copies
//! of its files. Digests added during a run are "known"; [`ByHash::prune`]
//! removes everything else.

use apt_repository::{ContentDigests, HashAlgorithm};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::PublisherResult;

/// One `by-hash` directory.
#[derive(Debug)]
pub struct ByHash {
    path: PathBuf,
    known: BTreeMap<HashAlgorithm, HashSet<String>>,
}

impl ByHash {
    /// Manage `<root>/<key>/by-hash`, where `key` is a directory relative
    /// to `root`.
    pub fn new(root: &Path, key: &str) -> Self {
        let dir = if key.is_empty() {
            root.to_path_buf()
        } else {
            root.join(key)
        };
        Self {
            path: dir.join("by-hash"),
            known: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make sure a copy of some content exists under each digest, and mark
    /// the digests as known.
    ///
    /// `content` is only called when at least one copy is missing, and at
    /// most once.
    pub fn add<F>(&mut self, digests: &ContentDigests, content: F) -> PublisherResult<()>
    where
        F: FnOnce() -> PublisherResult<Vec<u8>>,
    {
        let mut content = Some(content);
        let mut loaded: Option<Vec<u8>> = None;
        for (algorithm, digest) in digests.iter() {
            let algorithm_dir = self.path.join(algorithm.apt_name());
            let target = algorithm_dir.join(digest);
            if !target.exists() {
                if loaded.is_none() {
                    if let Some(load) = content.take() {
                        loaded = Some(load()?);
                    }
                }
                let data = loaded.as_deref().unwrap_or_default();
                fs::create_dir_all(&algorithm_dir)?;
                let mut tmp = NamedTempFile::new_in(&algorithm_dir)?;
                tmp.write_all(data)?;
                tmp.persist(&target)?;
                debug!("Added {}", target.display());
            }
            self.known
                .entry(algorithm)
                .or_default()
                .insert(digest.to_string());
        }
        Ok(())
    }

    /// Whether a digest has been added during this run.
    pub fn exists(&self, algorithm: HashAlgorithm, digest: &str) -> bool {
        self.known
            .get(&algorithm)
            .map_or(false, |known| known.contains(digest))
    }

    /// Remove entries that were not added during this run.
    ///
    /// If nothing at all was added, the whole `by-hash` directory goes.
    pub fn prune(&mut self) -> PublisherResult<()> {
        if self.known.values().all(|known| known.is_empty()) {
            match fs::remove_dir_all(&self.path) {
                Ok(()) => debug!("Removed {}", self.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        for (algorithm, known) in &self.known {
            if known.is_empty() {
                continue;
            }
            let algorithm_dir = self.path.join(algorithm.apt_name());
            let entries = match fs::read_dir(&algorithm_dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let entry = entry?;
                let name = entry.file_name();
                if !known.contains(name.to_string_lossy().as_ref()) {
                    debug!("Pruning {}", entry.path().display());
                    fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(())
    }
}

/// The `by-hash` directories of one suite, created on demand.
#[derive(Debug)]
pub struct ByHashes {
    root: PathBuf,
    children: BTreeMap<String, ByHash>,
}

fn dirname(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

impl ByHashes {
    /// Manage the `by-hash` directories below a suite directory.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            children: BTreeMap::new(),
        }
    }

    fn child(&mut self, path: &str) -> &mut ByHash {
        let key = dirname(path);
        let root = &self.root;
        self.children
            .entry(key.to_string())
            .or_insert_with(|| ByHash::new(root, key))
    }

    /// Register a directory so that [`ByHashes::prune`] visits it even if
    /// nothing is added to it.
    pub fn register_path(&mut self, path: &str) {
        self.child(path);
    }

    /// Add content for a file at `path`, relative to the suite directory.
    pub fn add<F>(&mut self, path: &str, digests: &ContentDigests, content: F) -> PublisherResult<()>
    where
        F: FnOnce() -> PublisherResult<Vec<u8>>,
    {
        self.child(path).add(digests, content)
    }

    pub fn exists(&self, path: &str, algorithm: HashAlgorithm, digest: &str) -> bool {
        self.children
            .get(dirname(path))
            .map_or(false, |child| child.exists(algorithm, digest))
    }

    /// Prune every directory seen.
    pub fn prune(&mut self) -> PublisherResult<()> {
        for child in self.children.values_mut() {
            child.prune()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apt_repository::hash_data;
    use tempfile::TempDir;

    fn digests(data: &[u8]) -> ContentDigests {
        hash_data(data).1
    }

    #[test]
    fn test_add_writes_every_algorithm() {
        let dir = TempDir::new().unwrap();
        let mut by_hash = ByHash::new(dir.path(), "main/source");
        let d = digests(b"abc");
        by_hash.add(&d, || Ok(b"abc".to_vec())).unwrap();

        for (algorithm, digest) in d.iter() {
            let path = dir
                .path()
                .join("main/source/by-hash")
                .join(algorithm.apt_name())
                .join(digest);
            assert_eq!(fs::read(path).unwrap(), b"abc");
            assert!(by_hash.exists(algorithm, digest));
        }
        assert!(!by_hash.exists(HashAlgorithm::Sha256, "0000"));
    }

    #[test]
    fn test_add_existing_does_not_load_content() {
        let dir = TempDir::new().unwrap();
        let d = digests(b"abc");
        ByHash::new(dir.path(), "main")
            .add(&d, || Ok(b"abc".to_vec()))
            .unwrap();

        let mut fresh = ByHash::new(dir.path(), "main");
        fresh
            .add(&d, || panic!("content should not be needed"))
            .unwrap();
        assert!(fresh.exists(HashAlgorithm::Md5, &d.md5));
    }

    #[test]
    fn test_prune_removes_unknown() {
        let dir = TempDir::new().unwrap();
        let old = digests(b"old");
        let new = digests(b"new");
        ByHash::new(dir.path(), "main")
            .add(&old, || Ok(b"old".to_vec()))
            .unwrap();

        let mut by_hash = ByHash::new(dir.path(), "main");
        by_hash.add(&new, || Ok(b"new".to_vec())).unwrap();
        by_hash.prune().unwrap();

        let sha256_dir = dir.path().join("main/by-hash/SHA256");
        assert!(sha256_dir.join(&new.sha256).exists());
        assert!(!sha256_dir.join(&old.sha256).exists());
        assert!(!dir.path().join("main/by-hash/MD5Sum").join(&old.md5).exists());
    }

    #[test]
    fn test_prune_without_known_removes_tree() {
        let dir = TempDir::new().unwrap();
        ByHash::new(dir.path(), "main")
            .add(&digests(b"x"), || Ok(b"x".to_vec()))
            .unwrap();
        assert!(dir.path().join("main/by-hash").exists());

        ByHash::new(dir.path(), "main").prune().unwrap();
        assert!(!dir.path().join("main/by-hash").exists());
        // Pruning a directory that is already gone is fine.
        ByHash::new(dir.path(), "main").prune().unwrap();
    }

    #[test]
    fn test_by_hashes_keys_by_directory() {
        let dir = TempDir::new().unwrap();
        let mut by_hashes = ByHashes::new(dir.path());
        let packages = digests(b"packages");
        by_hashes
            .add("main/binary-amd64/Packages.gz", &packages, || Ok(b"packages".to_vec()))
            .unwrap();
        by_hashes.register_path("main/source/Sources.gz");

        assert!(by_hashes.exists(
            "main/binary-amd64/Packages",
            HashAlgorithm::Sha1,
            &packages.sha1
        ));
        assert!(!by_hashes.exists("main/source/Sources", HashAlgorithm::Sha1, &packages.sha1));

        fs::create_dir_all(dir.path().join("main/source/by-hash/SHA256")).unwrap();
        by_hashes.prune().unwrap();
        assert!(!dir.path().join("main/source/by-hash").exists());
        assert!(dir
            .path()
            .join("main/binary-amd64/by-hash/SHA256")
            .join(&packages.sha256)
            .exists());
    }
}
