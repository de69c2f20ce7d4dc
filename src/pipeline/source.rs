//! Opening and fingerprinting flat-file sources.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use xxhash_rust::xxh64::Xxh64;

use crate::error::IngestError;

/// Open a source file, transparently decompressing `.gz`.
///
/// The returned reader owns the file handle, so it is closed when the reader
/// is dropped on any exit path.
pub fn open_source(path: &Path) -> Result<Box<dyn Read + Send>, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::SourceNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    let reader: Box<dyn Read + Send> = if path.extension().map_or(false, |e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(reader)
}

/// xxh64 of a source's decoded bytes.
pub fn checksum_path(path: &Path) -> Result<u64, IngestError> {
    let mut reader = ChecksumReader::new(open_source(path)?);
    io::copy(&mut reader, &mut io::sink()).map_err(|e| IngestError::Read(e.into()))?;
    Ok(reader.checksum())
}

/// Pass-through reader that hashes everything read through it.
pub struct ChecksumReader<R> {
    inner: R,
    hasher: Xxh64,
}

impl<R: Read> ChecksumReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Xxh64::new(0),
        }
    }

    pub fn checksum(&self) -> u64 {
        self.hasher.digest()
    }
}

impl<R: Read> Read for ChecksumReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
