use crate::error::Result;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a reader takes its bytes from.
#[derive(Clone, Debug)]
pub enum Input {
    /// A file on the local file system.
    File(PathBuf),
    /// Bytes already in memory, shared between probes and the opened reader.
    Memory(Arc<[u8]>),
}

impl Input {
    pub fn file(path: impl AsRef<Path>) -> Input {
        Input::File(path.as_ref().to_path_buf())
    }

    pub fn memory(bytes: impl Into<Vec<u8>>) -> Input {
        Input::Memory(Arc::from(bytes.into()))
    }

    /// Opens a fresh reader positioned at the first byte.
    pub fn reader(&self) -> Result<SourceReader> {
        Ok(match self {
            Input::File(path) => SourceReader::Local(BufReader::new(File::open(path)?)),
            Input::Memory(bytes) => SourceReader::Memory(Cursor::new(Arc::clone(bytes))),
        })
    }

    /// Total size in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(match self {
            Input::File(path) => std::fs::metadata(path)?.len(),
            Input::Memory(bytes) => bytes.len() as u64,
        })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads up to `limit` bytes from the start, for cheap format probes.
    pub(crate) fn head(&self, limit: usize) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(limit.min(64 * 1024));
        self.reader()?.take(limit as u64).read_to_end(&mut buffer)?;
        Ok(buffer)
    }
}

impl From<&Path> for Input {
    fn from(path: &Path) -> Self {
        Input::file(path)
    }
}

impl From<PathBuf> for Input {
    fn from(path: PathBuf) -> Self {
        Input::File(path)
    }
}

impl From<Vec<u8>> for Input {
    fn from(bytes: Vec<u8>) -> Self {
        Input::memory(bytes)
    }
}

/// A buffered, seekable reader over either input kind.
pub enum SourceReader {
    Local(BufReader<File>),
    Memory(Cursor<Arc<[u8]>>),
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            SourceReader::Local(reader) => reader.read(buf),
            SourceReader::Memory(reader) => reader.read(buf),
        }
    }
}

impl BufRead for SourceReader {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match self {
            SourceReader::Local(reader) => reader.fill_buf(),
            SourceReader::Memory(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amount: usize) {
        match self {
            SourceReader::Local(reader) => reader.consume(amount),
            SourceReader::Memory(reader) => reader.consume(amount),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
        match self {
            SourceReader::Local(reader) => reader.seek(pos),
            SourceReader::Memory(reader) => reader.seek(pos),
        }
    }
}
