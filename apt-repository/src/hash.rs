//! Cryptographic hashing support for APT repositories.

use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::fmt;
use std::io::{Read, Write};

/// Size of the chunks fed through the hashers when streaming a file.
pub const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Hash algorithms used in Release files and by-hash trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// MD5 hash algorithm.
    Md5,
    /// SHA-1 hash algorithm.
    Sha1,
    /// SHA-256 hash algorithm.
    Sha256,
}

impl HashAlgorithm {
    /// The name APT uses, both as a Release field and a by-hash directory.
    pub fn apt_name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5Sum",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Sha256 => "SHA256",
        }
    }

    /// Get all supported hash algorithms, weakest first.
    pub fn all() -> &'static [HashAlgorithm] {
        &[HashAlgorithm::Md5, HashAlgorithm::Sha1, HashAlgorithm::Sha256]
    }

    /// Look up an algorithm by its APT name.
    pub fn from_apt_name(name: &str) -> Option<HashAlgorithm> {
        Self::all()
            .iter()
            .copied()
            .find(|a| a.apt_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.apt_name())
    }
}

/// The MD5, SHA1 and SHA256 digests of a single piece of content, as
/// lower-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigests {
    /// MD5 digest.
    pub md5: String,
    /// SHA-1 digest.
    pub sha1: String,
    /// SHA-256 digest.
    pub sha256: String,
}

impl ContentDigests {
    /// Get a digest by algorithm.
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
        }
    }

    /// Iterate over `(algorithm, digest)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (HashAlgorithm, &str)> {
        HashAlgorithm::all().iter().map(move |a| (*a, self.get(*a)))
    }
}

/// Computes MD5, SHA1 and SHA256 over the same stream in one pass.
pub struct MultiHasher {
    md5: md5::Context,
    sha1: sha1::Sha1,
    sha256: sha2::Sha256,
    size: u64,
}

impl MultiHasher {
    /// Create a new multi-hasher.
    pub fn new() -> Self {
        Self {
            md5: md5::Context::new(),
            sha1: sha1::Sha1::new(),
            sha256: sha2::Sha256::new(),
            size: 0,
        }
    }

    /// Update the hashes with the given data.
    pub fn update(&mut self, data: &[u8]) {
        self.size += data.len() as u64;
        self.md5.consume(data);
        self.sha1.update(data);
        self.sha256.update(data);
    }

    /// Finalize the hashes and return the size and digests.
    pub fn finalize(self) -> (u64, ContentDigests) {
        let digests = ContentDigests {
            md5: format!("{:x}", self.md5.compute()),
            sha1: hex::encode(self.sha1.finalize()),
            sha256: hex::encode(self.sha256.finalize()),
        };
        (self.size, digests)
    }

    /// Get the number of bytes hashed so far.
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Default for MultiHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for MultiHasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Hash a reader, streaming it in fixed-size chunks.
pub fn hash_reader<R: Read>(mut reader: R) -> Result<(u64, ContentDigests)> {
    let mut hasher = MultiHasher::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

/// Hash in-memory data.
pub fn hash_data(data: &[u8]) -> (u64, ContentDigests) {
    let mut hasher = MultiHasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_algorithm_names() {
        assert_eq!(HashAlgorithm::Md5.apt_name(), "MD5Sum");
        assert_eq!(HashAlgorithm::Sha1.apt_name(), "SHA1");
        assert_eq!(HashAlgorithm::Sha256.apt_name(), "SHA256");
        assert_eq!(HashAlgorithm::from_apt_name("md5sum"), Some(HashAlgorithm::Md5));
        assert_eq!(HashAlgorithm::from_apt_name("SHA512"), None);
    }

    #[test]
    fn test_hash_data_known_values() {
        let (size, digests) = hash_data(b"hello world");
        assert_eq!(size, 11);
        assert_eq!(digests.md5, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(digests.sha1, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        assert_eq!(
            digests.sha256,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_hash_reader_matches_hash_data_across_chunks() {
        let data: Vec<u8> = (0..(HASH_CHUNK_SIZE * 2 + 17))
            .map(|i| (i % 251) as u8)
            .collect();
        let (size, streamed) = hash_reader(&data[..]).unwrap();
        assert_eq!(size, data.len() as u64);
        assert_eq!(streamed, hash_data(&data).1);
    }

    #[test]
    fn test_digests_iter_order() {
        let (_, digests) = hash_data(b"");
        let algos: Vec<_> = digests.iter().map(|(a, _)| a).collect();
        assert_eq!(algos, HashAlgorithm::all());
    }
}
