//! Writing one logical index to several compressed files at once.

use crate::compression::{Compression, Encoder};
use crate::hash::hash_reader;
use crate::Result;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

struct Variant {
    compression: Compression,
    path: PathBuf,
    encoder: Encoder<NamedTempFile>,
}

/// What happened to one compressed variant when an [`IndexFile`] closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenIndex {
    /// Compression used for this variant.
    pub compression: Compression,
    /// Final path of the variant.
    pub path: PathBuf,
    /// Whether the file on disk changed; identical content is left alone.
    pub changed: bool,
}

/// A writer that fans every byte out to one temporary file per compressor
/// and moves them into place on [`IndexFile::close`].
///
/// Until `close` succeeds nothing at the destination is touched, so a
/// failure part way through leaves the previous index intact.
pub struct IndexFile {
    variants: Vec<Variant>,
}

impl IndexFile {
    /// Start writing `dir/basename` plus one variant per compressor.
    pub fn create(dir: &Path, basename: &str, compressors: &[Compression]) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let mut variants = Vec::with_capacity(compressors.len());
        for &compression in compressors {
            if variants.iter().any(|v: &Variant| v.compression == compression) {
                continue;
            }
            let tmp = NamedTempFile::new_in(dir)?;
            variants.push(Variant {
                compression,
                path: dir.join(format!("{}{}", basename, compression.extension())),
                encoder: compression.encoder(tmp),
            });
        }
        Ok(Self { variants })
    }

    /// Finish all encoders and move the results into place.
    pub fn close(self) -> Result<Vec<WrittenIndex>> {
        let mut written = Vec::with_capacity(self.variants.len());
        for variant in self.variants {
            let mut tmp = variant.encoder.finish()?;
            tmp.flush()?;
            let changed = !same_content(tmp.path(), &variant.path)?;
            if changed {
                set_world_readable(tmp.path())?;
                tmp.persist(&variant.path)?;
            }
            written.push(WrittenIndex {
                compression: variant.compression,
                path: variant.path,
                changed,
            });
        }
        Ok(written)
    }
}

impl Write for IndexFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for variant in &mut self.variants {
            variant.encoder.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        for variant in &mut self.variants {
            variant.encoder.flush()?;
        }
        Ok(())
    }
}

fn same_content(new: &Path, existing: &Path) -> Result<bool> {
    let existing_file = match File::open(existing) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    if fs::metadata(new)?.len() != existing_file.metadata()?.len() {
        return Ok(false);
    }
    let (_, new_digests) = hash_reader(File::open(new)?)?;
    let (_, old_digests) = hash_reader(existing_file)?;
    Ok(new_digests.sha256 == old_digests.sha256)
}

#[cfg(unix)]
fn set_world_readable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_world_readable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const ALL: &[Compression] = &[
        Compression::None,
        Compression::Gzip,
        Compression::Bzip2,
        Compression::Xz,
    ];

    fn write_index(dir: &Path, content: &[u8]) -> Vec<WrittenIndex> {
        let mut index = IndexFile::create(dir, "Packages", ALL).unwrap();
        index.write_all(content).unwrap();
        index.close().unwrap()
    }

    #[test]
    fn test_writes_every_variant() {
        let dir = TempDir::new().unwrap();
        let written = write_index(dir.path(), b"Package: hello\n");
        assert_eq!(written.len(), 4);
        assert!(written.iter().all(|w| w.changed));

        for w in &written {
            let data = fs::read(&w.path).unwrap();
            assert_eq!(w.compression.decompress(&data).unwrap(), b"Package: hello\n");
        }
        assert!(dir.path().join("Packages.xz").exists());
        // Only the four outputs remain; temporaries were moved or removed.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn test_identical_content_left_alone() {
        let dir = TempDir::new().unwrap();
        write_index(dir.path(), b"Package: hello\n");
        let written = write_index(dir.path(), b"Package: hello\n");
        assert!(written.iter().all(|w| !w.changed));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);

        let written = write_index(dir.path(), b"Package: hello2\n");
        assert!(written.iter().all(|w| w.changed));
    }

    #[test]
    fn test_nothing_published_until_close() {
        let dir = TempDir::new().unwrap();
        let mut index = IndexFile::create(dir.path(), "Sources", &[Compression::Gzip]).unwrap();
        index.write_all(b"Package: hello\n").unwrap();
        assert!(!dir.path().join("Sources.gz").exists());
        drop(index);
        assert!(!dir.path().join("Sources.gz").exists());
    }
}
