//! Character-delimited text: CSV, TSV and their relatives.

use crate::adapter::columns_of;
use crate::adapter::convert_cell;
use crate::adapter::FormatAdapter;
use crate::adapter::RawRow;
use crate::convert::Converter;
use crate::error::Result;
use crate::format::column::Column;
use crate::format::Format;
use crate::format::DEFAULT_QUOTE;
use crate::format::DEFAULT_SEPARATORS;
use crate::helpers::reader::Input;
use crate::helpers::text::has_text_content;
use crate::helpers::text::LineReader;
use crate::value::Row;
use crate::value::Value;
use log::debug;
use std::collections::HashMap;

/// Picks the candidate that occurs first in `line`; ties go to the earlier candidate.
pub(crate) fn choose_separator(line: &str, candidates: &[char]) -> Option<char> {
    candidates
        .iter()
        .filter_map(|candidate| line.find(*candidate).map(|position| (position, *candidate)))
        .min_by_key(|(position, _)| *position)
        .map(|(_, separator)| separator)
}

/// Splits one line into fields.
///
/// A quote opens a quoted field only while the field holds nothing but blanks;
/// anywhere else it is kept as a literal. A trailing empty field is not produced.
pub(crate) fn tokenize(line: &str, separator: Option<char>, quote: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    for character in line.chars() {
        if character == quote {
            if quoted {
                quoted = false;
            } else if field.trim().is_empty() {
                quoted = true;
            } else {
                field.push(character);
            }
        } else if Some(character) == separator {
            if quoted {
                field.push(character);
            } else {
                fields.push(std::mem::take(&mut field));
            }
        } else {
            field.push(character);
        }
    }
    if !field.is_empty() {
        fields.push(field);
    }
    fields
}

/// Reads delimited text one line per raw row, keyed by 1-based field ordinal.
#[derive(Default)]
pub struct DelimitedAdapter {
    lines: Option<LineReader>,
    candidates: Vec<char>,
    quote: char,
    separator: Option<char>,
    columns: HashMap<String, Column>,
    length: u64,
    finished: bool,
}

impl DelimitedAdapter {
    pub fn new() -> DelimitedAdapter {
        DelimitedAdapter::default()
    }

    /// The separator in use, once the first line has been read.
    pub fn separator(&self) -> Option<char> {
        self.separator
    }
}

impl FormatAdapter for DelimitedAdapter {
    fn name(&self) -> &'static str {
        "delimited"
    }

    fn supports(&self, input: &Input, _name: &str, format: Option<&Format>) -> bool {
        format.map(|format| !format.column_separator_chars().is_empty()).unwrap_or(true)
            && has_text_content(input)
    }

    fn open(&mut self, input: &Input, _name: &str, format: Option<&Format>) -> Result<()> {
        self.close();
        self.lines = Some(LineReader::open(input)?);
        self.candidates = format
            .map(|format| format.column_separator_chars().to_vec())
            .unwrap_or_else(|| DEFAULT_SEPARATORS.to_vec());
        self.quote = format.map(Format::column_quote_char).unwrap_or(DEFAULT_QUOTE);
        self.separator = None;
        self.columns = columns_of(format);
        self.length = input.len()?;
        self.finished = false;
        Ok(())
    }

    fn next_raw_row(&mut self, converter: Option<&dyn Converter>) -> Result<RawRow> {
        if self.finished {
            return Ok(RawRow::EndOfInput);
        }
        let Some(line) = self.lines.as_mut().map(LineReader::next_line).transpose()?.flatten() else {
            self.finished = true;
            return Ok(RawRow::EndOfInput);
        };
        if self.separator.is_none() {
            self.separator = choose_separator(&line, &self.candidates);
            if let Some(separator) = self.separator {
                debug!("Using {:?} as column separator", separator);
            }
        }

        let fields = tokenize(&line, self.separator, self.quote);
        let mut row = Row::with_capacity(fields.len());
        for (index, field) in fields.into_iter().enumerate() {
            let key = (index + 1).to_string();
            let value = convert_cell(Value::Text(field), &key, &self.columns, converter);
            row.insert(key, value);
        }
        Ok(RawRow::Row(row))
    }

    fn estimate_total_rows(&self) -> Option<u64> {
        let average = self.lines.as_ref()?.average_line_length()?;
        Some(self.length / average)
    }

    fn close(&mut self) {
        self.lines = None;
        self.finished = true;
    }
}
