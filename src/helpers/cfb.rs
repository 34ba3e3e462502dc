//! Reader for OLE compound files, the container of legacy `.xls` workbooks.

use crate::error::Result;
use crate::helpers::bytes::sector_ids;
use crate::helpers::bytes::u16_at;
use crate::helpers::bytes::u32_at;
use crate::helpers::bytes::u64_at;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const HEADER_SIZE: usize = 512;
const HEADER_DIFAT_ENTRIES: usize = 109;
/// Ids above this value mark free sectors or chain ends.
const MAX_REGULAR_SECTOR: u32 = 0xFFFF_FFFA;
const MINI_STREAM_CUTOFF: u64 = 4096;
const MINI_SECTOR_SIZE: usize = 64;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const ROOT_ENTRY: u8 = 5;

#[derive(Error, Debug)]
pub enum CfbError {
    #[error("Not an OLE compound file")]
    SignatureError,

    #[error("Invalid sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("Corrupted compound file: {0}")]
    CorruptedError(&'static str),
}

/// One stream in the directory.
#[derive(Debug)]
struct Entry {
    kind: u8,
    start: u32,
    size: u64,
}

/// An OLE compound file loaded into memory, with its streams addressable by name.
pub(crate) struct CompoundFile {
    data: Vec<u8>,
    sector_size: usize,
    fat: Vec<u32>,
    mini_fat: Vec<u32>,
    mini_stream: Vec<u8>,
    entries: HashMap<String, Entry>,
}

impl CompoundFile {
    /// True when `head` starts with the compound file signature.
    pub(crate) fn has_signature(head: &[u8]) -> bool {
        head.starts_with(&SIGNATURE)
    }

    pub(crate) fn open<R: Read + Seek>(reader: &mut R) -> Result<CompoundFile> {
        let size = reader.seek(SeekFrom::End(0))? as usize;
        if size < HEADER_SIZE {
            Err(CfbError::SignatureError)?
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data = vec![0u8; size];
        reader.read_exact(&mut data)?;
        if !Self::has_signature(&data) {
            Err(CfbError::SignatureError)?
        }

        let header = |offset| u32_at(&data, offset).ok_or(CfbError::CorruptedError("header"));
        let major_version = u16_at(&data, 26).unwrap_or_default();
        let sector_shift = u16_at(&data, 30).unwrap_or_default();
        let sector_size = match (major_version, sector_shift) {
            (3, 9) => 512,
            (4, 12) => 4096,
            _ => Err(CfbError::SectorSizeError(major_version, sector_shift))?,
        };
        let directory_start = header(48)?;
        let mini_fat_start = header(60)?;
        let mini_fat_count = header(64)?;
        let difat_start = header(68)?;

        let mut file = CompoundFile {
            data,
            sector_size,
            fat: Vec::new(),
            mini_fat: Vec::new(),
            mini_stream: Vec::new(),
            entries: HashMap::new(),
        };
        file.fat = file.load_fat(difat_start)?;
        file.entries = file.load_directory(directory_start)?;
        if mini_fat_count > 0 {
            file.mini_fat = sector_ids(&file.chain(mini_fat_start)?).collect();
        }
        if let Some(root) = file.entries.values().find(|entry| entry.kind == ROOT_ENTRY) {
            let mut stream = file.chain(root.start)?;
            stream.truncate(root.size as usize);
            file.mini_stream = stream;
        }
        Ok(file)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Reads a whole stream, `None` when no stream has that name.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(entry) = self.entries.get(name) else {
            return Ok(None);
        };
        let mut bytes = if entry.size < MINI_STREAM_CUTOFF {
            self.mini_chain(entry.start)?
        } else {
            self.chain(entry.start)?
        };
        bytes.truncate(entry.size as usize);
        Ok(Some(bytes))
    }

    fn sector(&self, id: u32) -> Result<&[u8]> {
        let lower = (id as usize + 1) * self.sector_size;
        let upper = self.data.len().min(lower + self.sector_size);
        self.data
            .get(lower..upper)
            .ok_or_else(|| CfbError::CorruptedError("sector out of range").into())
    }

    /// Header DIFAT entries first, then the chain of DIFAT sectors.
    fn load_fat(&self, difat_start: u32) -> Result<Vec<u32>> {
        let mut difat: Vec<u32> = sector_ids(&self.data[76..76 + HEADER_DIFAT_ENTRIES * 4]).collect();
        let mut next = difat_start;
        let mut visited = 0usize;
        while next <= MAX_REGULAR_SECTOR {
            let mut ids: Vec<u32> = sector_ids(self.sector(next)?).collect();
            next = ids.pop().ok_or(CfbError::CorruptedError("empty DIFAT sector"))?;
            difat.extend(ids);
            visited += 1;
            if visited > self.sector_count() {
                Err(CfbError::CorruptedError("DIFAT chain loops"))?
            }
        }

        let mut fat = Vec::new();
        for id in difat.into_iter().filter(|id| *id <= MAX_REGULAR_SECTOR) {
            fat.extend(sector_ids(self.sector(id)?));
        }
        Ok(fat)
    }

    fn load_directory(&self, start: u32) -> Result<HashMap<String, Entry>> {
        let bytes = self.chain(start)?;
        let entries: HashMap<String, Entry> = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .filter_map(|chunk| {
                let kind = chunk[66];
                let length = (u16_at(chunk, 64)? as usize).min(64);
                if kind == 0 || length < 2 {
                    return None;
                }
                let (name, _, _) = UTF_16LE.decode(&chunk[..length - 2]);
                let start = u32_at(chunk, 116)?;
                let size = u64_at(chunk, 120)?;
                Some((name.into_owned(), Entry { kind, start, size }))
            })
            .collect();
        if entries.is_empty() {
            Err(CfbError::CorruptedError("empty directory"))?
        }
        Ok(entries)
    }

    fn sector_count(&self) -> usize {
        self.data.len() / self.sector_size
    }

    /// Concatenates the regular sectors of a chain.
    fn chain(&self, start: u32) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        let mut id = start;
        let mut visited = 0usize;
        while id <= MAX_REGULAR_SECTOR {
            content.extend_from_slice(self.sector(id)?);
            id = *self.fat.get(id as usize).ok_or(CfbError::CorruptedError("FAT entry out of range"))?;
            visited += 1;
            if visited > self.sector_count() {
                Err(CfbError::CorruptedError("sector chain loops"))?
            }
        }
        Ok(content)
    }

    /// Concatenates the mini sectors of a chain.
    fn mini_chain(&self, start: u32) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        let mut id = start;
        let limit = self.mini_stream.len() / MINI_SECTOR_SIZE + 1;
        let mut visited = 0usize;
        while id <= MAX_REGULAR_SECTOR {
            let lower = id as usize * MINI_SECTOR_SIZE;
            let upper = self.mini_stream.len().min(lower + MINI_SECTOR_SIZE);
            let sector = self
                .mini_stream
                .get(lower..upper)
                .ok_or(CfbError::CorruptedError("mini sector out of range"))?;
            content.extend_from_slice(sector);
            id = *self.mini_fat.get(id as usize).ok_or(CfbError::CorruptedError("mini FAT entry out of range"))?;
            visited += 1;
            if visited > limit {
                Err(CfbError::CorruptedError("mini sector chain loops"))?
            }
        }
        Ok(content)
    }
}
