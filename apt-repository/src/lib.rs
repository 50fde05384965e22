//! # APT Repository Library
//!
//! Formats that make up the metadata of an APT archive: `Packages`,
//! `Sources` and `Translation-*` indices, suite and component `Release`
//! files, the i18n `Index`, plus the hashing and compression used to list
//! them.
//!
//! ## Example
//!
//! ```rust
//! use apt_repository::{Compression, IndexFile, Package};
//! use std::io::Write;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempfile::tempdir()?;
//! let mut package = Package::new("hello", "1.0", "amd64", "pool/main/h/hello/hello_1.0_amd64.deb", 1024);
//! package.summary = "say hello".to_string();
//!
//! let mut index = IndexFile::create(dir.path(), "Packages", &[Compression::None, Compression::Gzip])?;
//! writeln!(index, "{}", package.to_paragraph())?;
//! index.close()?;
//! # Ok(())
//! # }
//! ```

pub mod compression;
pub mod control;
pub mod error;
pub mod hash;
pub mod index_file;
pub mod packages;
pub mod release;
pub mod sources;
pub mod translation;

pub use compression::Compression;
pub use error::{AptRepositoryError, Result};
pub use hash::{hash_data, hash_reader, ContentDigests, HashAlgorithm, MultiHasher};
pub use index_file::{IndexFile, WrittenIndex};
pub use packages::Package;
pub use release::{format_release_date, ChecksumEntry, ComponentRelease, I18nIndex, Release};
pub use sources::{Source, SourceFileEntry};
pub use translation::{TranslationEntry, TranslationIndex};

/// Compressors used for indices when a series does not say otherwise.
pub const DEFAULT_COMPRESSIONS: &[Compression] = &[Compression::Gzip, Compression::Xz];
