//! Line-oriented reading of text inputs.

use crate::error::Result;
use crate::helpers::reader::Input;
use crate::helpers::reader::SourceReader;
use encoding_rs::Encoding;
use encoding_rs::UTF_8;
use std::io::BufRead;

/// How much of an input is inspected when deciding whether it is text.
const PROBE_SIZE: usize = 8 * 1024;
/// Lines read by [`has_text_content`] before giving up.
const PROBE_LINES: usize = 10;

/// Reads physical lines, decoding them and stripping `\n` or `\r\n`.
pub(crate) struct LineReader {
    reader: SourceReader,
    encoding: &'static Encoding,
    buffer: Vec<u8>,
    first: bool,
    /// Number of lines and bytes consumed so far.
    pub(crate) lines: u64,
    pub(crate) bytes: u64,
}

impl LineReader {
    pub(crate) fn open(input: &Input) -> Result<LineReader> {
        Ok(LineReader {
            reader: input.reader()?,
            encoding: UTF_8,
            buffer: Vec::with_capacity(1024),
            first: true,
            lines: 0,
            bytes: 0,
        })
    }

    /// The next line without its terminator, or `None` at end of input.
    pub(crate) fn next_line(&mut self) -> Result<Option<String>> {
        self.buffer.clear();
        let size = self.reader.read_until(b'\n', &mut self.buffer)?;
        if size == 0 {
            return Ok(None);
        }
        self.lines += 1;
        self.bytes += size as u64;

        let mut bytes = self.buffer.as_slice();
        if let Some(stripped) = bytes.strip_suffix(b"\n") {
            bytes = stripped;
        }
        if let Some(stripped) = bytes.strip_suffix(b"\r") {
            bytes = stripped;
        }
        if std::mem::take(&mut self.first) {
            if let Some((encoding, length)) = Encoding::for_bom(bytes) {
                if encoding == UTF_8 {
                    bytes = &bytes[length..];
                }
            }
        }
        let (line, _) = self.encoding.decode_without_bom_handling(bytes);
        Ok(Some(line.into_owned()))
    }

    /// Average physical line length so far, terminators included.
    pub(crate) fn average_line_length(&self) -> Option<u64> {
        (self.lines > 0).then(|| (self.bytes / self.lines).max(1))
    }
}

/// A cheap probe: the start of the input holds no NUL byte and decodes to lines.
pub(crate) fn has_text_content(input: &Input) -> bool {
    let Ok(head) = input.head(PROBE_SIZE) else {
        return false;
    };
    if head.contains(&0) {
        return false;
    }
    if head.is_empty() {
        return true;
    }
    let Ok(mut reader) = LineReader::open(input) else {
        return false;
    };
    for _ in 0..PROBE_LINES {
        match reader.next_line() {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(_) => return false,
        }
    }
    true
}

/// The first line that is not blank, lower-cased with every space removed.
pub(crate) fn first_non_blank_line(input: &Input) -> Option<String> {
    let mut reader = LineReader::open(input).ok()?;
    for _ in 0..PROBE_LINES {
        let line = reader.next_line().ok()??;
        let squeezed: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        if !squeezed.is_empty() {
            return Some(squeezed.to_lowercase());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_strip_terminators_and_bom() {
        let input = Input::memory(b"\xEF\xBB\xBFa,b\r\n1,2\n\nlast".to_vec());
        let mut reader = LineReader::open(&input).unwrap();
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("a,b"));
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("1,2"));
        assert_eq!(reader.next_line().unwrap().as_deref(), Some(""));
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("last"));
        assert_eq!(reader.next_line().unwrap(), None);
        assert_eq!(reader.lines, 4);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let input = Input::memory(b"caf\xE9\n".to_vec());
        let mut reader = LineReader::open(&input).unwrap();
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("caf\u{FFFD}"));
    }

    #[test]
    fn text_probe() {
        assert!(has_text_content(&Input::memory(b"id,name\n".to_vec())));
        assert!(!has_text_content(&Input::memory(b"PK\x03\x04\x00\x00".to_vec())));
    }

    #[test]
    fn first_line_probe() {
        let input = Input::memory(b"\n   \n<!DOCTYPE html>\n<html>".to_vec());
        assert_eq!(first_non_blank_line(&input).as_deref(), Some("<!doctypehtml>"));
    }
}
