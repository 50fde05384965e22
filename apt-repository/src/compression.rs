//! Compression support for APT repository files.

use crate::{AptRepositoryError, Result};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::str::FromStr;

/// Supported compression formats for APT repository files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression.
    None,
    /// Gzip compression.
    Gzip,
    /// Bzip2 compression.
    Bzip2,
    /// XZ compression.
    Xz,
}

impl Compression {
    /// Get the file extension for this compression format.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::None => "",
            Compression::Gzip => ".gz",
            Compression::Bzip2 => ".bz2",
            Compression::Xz => ".xz",
        }
    }

    /// Name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Bzip2 => "bzip2",
            Compression::Xz => "xz",
        }
    }

    /// Order in which variants of an index are probed when hashing it.
    pub fn probe_order() -> &'static [Compression] {
        &[
            Compression::None,
            Compression::Gzip,
            Compression::Bzip2,
            Compression::Xz,
        ]
    }

    /// Wrap a writer in an encoder for this format.
    pub fn encoder<W: Write>(self, writer: W) -> Encoder<W> {
        match self {
            Compression::None => Encoder::Plain(writer),
            // GzEncoder::new writes a zero mtime, so output is reproducible.
            Compression::Gzip => Encoder::Gzip(flate2::write::GzEncoder::new(
                writer,
                flate2::Compression::best(),
            )),
            Compression::Bzip2 => Encoder::Bzip2(bzip2::write::BzEncoder::new(
                writer,
                bzip2::Compression::best(),
            )),
            Compression::Xz => Encoder::Xz(xz2::write::XzEncoder::new(writer, 6)),
        }
    }

    /// Create a decompressor that implements Read.
    pub fn reader<'a, R: Read + 'a>(self, reader: R) -> Box<dyn Read + 'a> {
        match self {
            Compression::None => Box::new(reader),
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
        }
    }

    /// Compress data using this compression format.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = self.encoder(Vec::new());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    /// Decompress data using this compression format.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decompressed = Vec::new();
        self.reader(data).read_to_end(&mut decompressed)?;
        Ok(decompressed)
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Compression {
    type Err = AptRepositoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" | "uncompressed" => Ok(Compression::None),
            "gzip" | "gz" => Ok(Compression::Gzip),
            "bzip2" | "bz2" => Ok(Compression::Bzip2),
            "xz" => Ok(Compression::Xz),
            other => Err(AptRepositoryError::UnknownCompression(other.to_string())),
        }
    }
}

/// An encoder for one of the supported formats.
///
/// Unlike a boxed `dyn Write`, this can be finished explicitly so that
/// trailer errors are reported instead of being lost on drop.
pub enum Encoder<W: Write> {
    /// Pass-through.
    Plain(W),
    /// Gzip stream.
    Gzip(flate2::write::GzEncoder<W>),
    /// Bzip2 stream.
    Bzip2(bzip2::write::BzEncoder<W>),
    /// XZ stream.
    Xz(xz2::write::XzEncoder<W>),
}

impl<W: Write> Encoder<W> {
    /// Flush any trailer and return the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        match self {
            Encoder::Plain(mut w) => {
                w.flush()?;
                Ok(w)
            }
            Encoder::Gzip(e) => e.finish(),
            Encoder::Bzip2(e) => e.finish(),
            Encoder::Xz(e) => e.finish(),
        }
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Encoder::Plain(w) => w.write(buf),
            Encoder::Gzip(e) => e.write(buf),
            Encoder::Bzip2(e) => e.write(buf),
            Encoder::Xz(e) => e.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Encoder::Plain(w) => w.flush(),
            Encoder::Gzip(e) => e.flush(),
            Encoder::Bzip2(e) => e.flush(),
            Encoder::Xz(e) => e.flush(),
        }
    }
}
