//! Entry lookup in the zip containers of XLSX and ODS documents.

use crate::error::Result;
use crate::helpers::reader::Input;
use crate::helpers::reader::SourceReader;
use crate::helpers::xml::XmlReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use zip::result::ZipError;
use zip::ZipArchive;

pub(crate) type PartReader = XmlReader<Cursor<Vec<u8>>>;

/// Opens `input` as a zip archive.
pub(crate) fn open_archive(input: &Input) -> Result<ZipArchive<SourceReader>> {
    Ok(ZipArchive::new(input.reader()?)?)
}

/// Whether `input` is a zip archive holding entry `name`. Never fails.
pub(crate) fn archive_contains(input: &Input, name: &str) -> bool {
    open_archive(input)
        .map(|archive| archive.entry_name(name).is_some())
        .unwrap_or(false)
}

pub(crate) trait ZipLookup {
    /// The stored name matching `name`, ignoring ASCII case and separator style.
    fn entry_name(&self, name: &str) -> Option<String>;

    /// The decompressed bytes of entry `name`.
    fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>>;

    /// An XML reader over entry `name`, fully decompressed in memory.
    fn xml_entry(&mut self, name: &str) -> Result<Option<PartReader>> {
        Ok(self.read_entry(name)?.map(|bytes| XmlReader::new(Cursor::new(bytes))))
    }
}

impl<R: Read + Seek> ZipLookup for ZipArchive<R> {
    fn entry_name(&self, name: &str) -> Option<String> {
        let wanted = name.replace('\\', "/");
        let wanted = wanted.trim_start_matches('/');
        self.file_names()
            .find(|stored| stored.replace('\\', "/").eq_ignore_ascii_case(wanted))
            .map(str::to_owned)
    }

    fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(stored) = self.entry_name(name) else {
            return Ok(None);
        };
        let mut entry = match self.by_name(&stored) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(error) => Err(error)?,
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive() -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("xl/Workbook.xml", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"<workbook/>").unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn lookup_ignores_case_and_separators() {
        let input = Input::memory(archive());
        let mut archive = open_archive(&input).unwrap();
        assert_eq!(archive.entry_name("XL\\workbook.xml").as_deref(), Some("xl/Workbook.xml"));
        assert_eq!(archive.read_entry("/xl/workbook.xml").unwrap().unwrap(), b"<workbook/>");
        assert!(archive.read_entry("xl/styles.xml").unwrap().is_none());
    }

    #[test]
    fn probe_rejects_non_archives() {
        assert!(archive_contains(&Input::memory(archive()), "xl/workbook.xml"));
        assert!(!archive_contains(&Input::memory(b"a,b\n1,2\n".to_vec()), "xl/workbook.xml"));
    }
}
