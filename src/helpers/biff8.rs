//! Record stream of the BIFF8 format used inside legacy `.xls` workbooks.
//!
//! Each record is a 4-byte header (kind, size) followed by its payload. Payloads
//! longer than 8224 bytes continue in CONTINUE records; [`BiffStream`] merges
//! those into one [`Record`] and remembers where each part began, since a string
//! split across parts restarts with a fresh option byte.

use crate::error::Result;
use crate::helpers::bytes::u16_at;
use crate::helpers::bytes::u32_at;
use crate::helpers::bytes::u64_at;
use encoding_rs::Encoding;
use thiserror::Error;

const CONTINUE: u16 = 0x003C;

#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Record 0x{0:04X} ends before {1} more byte(s)")]
    TruncatedRecord(u16, usize),

    #[error("Record 0x{0:04X} declares {1} byte(s) past the end of the stream")]
    TruncatedStream(u16, usize),
}

/// Walks the records of one workbook stream.
pub(crate) struct BiffStream {
    data: Vec<u8>,
    position: usize,
    /// Decodes 8-bit ("compressed") strings.
    pub(crate) encoding: &'static Encoding,
}

impl BiffStream {
    pub(crate) fn new(data: Vec<u8>) -> BiffStream {
        BiffStream { data, position: 0, encoding: encoding_rs::WINDOWS_1252 }
    }

    /// Moves to an absolute stream offset, such as a sheet's BOF.
    pub(crate) fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// The next record with its CONTINUE parts merged, `None` at the end of the stream.
    pub(crate) fn next_record(&mut self) -> Result<Option<Record>> {
        let encoding = self.encoding;
        let Some((kind, payload)) = self.read_part()? else {
            return Ok(None);
        };
        let mut record = Record::new(kind, payload.to_vec(), encoding);
        while self.peek_kind() == Some(CONTINUE) {
            if let Some((_, payload)) = self.read_part()? {
                record.boundaries.push(record.data.len());
                record.data.extend_from_slice(payload);
            }
        }
        Ok(Some(record))
    }

    fn peek_kind(&self) -> Option<u16> {
        u16_at(&self.data, self.position)
    }

    fn read_part(&mut self) -> Result<Option<(u16, &[u8])>> {
        let (Some(kind), Some(size)) = (u16_at(&self.data, self.position), u16_at(&self.data, self.position + 2)) else {
            return Ok(None);
        };
        let start = self.position + 4;
        let end = start + size as usize;
        if end > self.data.len() {
            Err(Biff8Error::TruncatedStream(kind, end - self.data.len()))?
        }
        self.position = end;
        Ok(Some((kind, &self.data[start..end])))
    }
}

/// One logical record and a read cursor over its payload.
pub(crate) struct Record {
    pub(crate) kind: u16,
    data: Vec<u8>,
    /// Payload offsets where CONTINUE parts start.
    boundaries: Vec<usize>,
    cursor: usize,
    encoding: &'static Encoding,
}

impl Record {
    pub(crate) fn new(kind: u16, data: Vec<u8>, encoding: &'static Encoding) -> Record {
        Record { kind, data, boundaries: Vec::new(), cursor: 0, encoding }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor)
    }

    fn take(&mut self, length: usize) -> Result<&[u8]> {
        let end = self.cursor + length;
        if end > self.data.len() {
            Err(Biff8Error::TruncatedRecord(self.kind, end - self.data.len()))?
        }
        let bytes = &self.data[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    pub(crate) fn skip(&mut self, length: usize) -> Result<()> {
        self.take(length).map(|_| ())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16> {
        let kind = self.kind;
        u16_at(self.take(2)?, 0).ok_or_else(|| Biff8Error::TruncatedRecord(kind, 2).into())
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let kind = self.kind;
        u32_at(self.take(4)?, 0).ok_or_else(|| Biff8Error::TruncatedRecord(kind, 4).into())
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        let kind = self.kind;
        u64_at(self.take(8)?, 0).ok_or_else(|| Biff8Error::TruncatedRecord(kind, 8).into())
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64> {
        self.read_u64().map(f64::from_bits)
    }

    /// An RK value: a 30-bit integer or the high bits of a double, optionally divided by 100.
    pub(crate) fn read_rk(&mut self) -> Result<f64> {
        let raw = self.read_u32()?;
        let mut number = if raw & 0x02 != 0 {
            ((raw as i32) >> 2) as f64
        } else {
            f64::from_bits(((raw & 0xFFFF_FFFC) as u64) << 32)
        };
        if raw & 0x01 != 0 {
            number /= 100.0;
        }
        Ok(number)
    }

    /// ShortXLUnicodeString: 8-bit character count.
    pub(crate) fn read_short_string(&mut self) -> Result<String> {
        let count = self.read_u8()? as usize;
        self.read_plain_string(count)
    }

    /// XLUnicodeString: 16-bit character count.
    pub(crate) fn read_string(&mut self) -> Result<String> {
        let count = self.read_u16()? as usize;
        self.read_plain_string(count)
    }

    fn read_plain_string(&mut self, count: usize) -> Result<String> {
        let flags = self.read_u8()?;
        let mut string = String::with_capacity(count);
        self.read_characters(count, flags & 0x01 != 0, &mut string)?;
        Ok(string)
    }

    /// XLUnicodeRichExtendedString, as stored in the shared string table.
    /// Formatting runs and phonetic data are skipped.
    pub(crate) fn read_rich_string(&mut self) -> Result<String> {
        let count = self.read_u16()? as usize;
        let flags = self.read_u8()?;
        let runs = if flags & 0x08 != 0 { self.read_u16()? as usize } else { 0 };
        let phonetic = if flags & 0x04 != 0 { self.read_u32()? as usize } else { 0 };
        let mut string = String::with_capacity(count);
        self.read_characters(count, flags & 0x01 != 0, &mut string)?;
        self.skip(4 * runs)?;
        self.skip(phonetic)?;
        Ok(string)
    }

    fn read_characters(&mut self, mut count: usize, mut wide: bool, string: &mut String) -> Result<()> {
        while count > 0 {
            let end = self.next_boundary();
            let width = if wide { 2 } else { 1 };
            let taken = count.min((end - self.cursor) / width);
            let encoding = self.encoding;
            let bytes = self.take(taken * width)?;
            if wide {
                let units: Vec<u16> = bytes.chunks_exact(2).map(|pair| u16::from_le_bytes([pair[0], pair[1]])).collect();
                string.push_str(&String::from_utf16_lossy(&units));
            } else {
                decode_narrow(bytes, encoding, string);
            }
            count -= taken;
            if count == 0 {
                break;
            }
            if self.cursor != end || end == self.data.len() {
                Err(Biff8Error::TruncatedRecord(self.kind, count * width))?
            }
            // The continuation restates the character width.
            wide = self.read_u8()? & 0x01 != 0;
        }
        Ok(())
    }

    fn next_boundary(&self) -> usize {
        self.boundaries
            .iter()
            .copied()
            .find(|boundary| *boundary > self.cursor)
            .unwrap_or(self.data.len())
    }
}

/// 8-bit strings hold the low byte of each UTF-16 unit unless the workbook names an ANSI code page.
fn decode_narrow(bytes: &[u8], encoding: &'static Encoding, string: &mut String) {
    if encoding == encoding_rs::UTF_16LE || encoding == encoding_rs::UTF_16BE {
        string.extend(bytes.iter().map(|byte| *byte as char));
    } else {
        string.push_str(&encoding.decode_without_bom_handling(bytes).0);
    }
}
