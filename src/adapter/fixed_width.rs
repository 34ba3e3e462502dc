//! Fixed-width text, sliced by character ranges.

use crate::adapter::columns_of;
use crate::adapter::convert_cell;
use crate::adapter::FormatAdapter;
use crate::adapter::RawRow;
use crate::convert::Converter;
use crate::error::Result;
use crate::format::column::Column;
use crate::format::location::Location;
use crate::format::Format;
use crate::helpers::reader::Input;
use crate::helpers::text::has_text_content;
use crate::helpers::text::LineReader;
use crate::value::Row;
use crate::value::Value;
use std::collections::HashMap;

/// Slices each line by the range locations of the format's columns.
#[derive(Default)]
pub struct FixedWidthAdapter {
    lines: Option<LineReader>,
    /// Range locations with their row keys, sorted by start.
    locations: Vec<(Location, String)>,
    columns: HashMap<String, Column>,
    length: u64,
    first_line_length: Option<u64>,
    finished: bool,
}

impl FixedWidthAdapter {
    pub fn new() -> FixedWidthAdapter {
        FixedWidthAdapter::default()
    }
}

/// Every range location in the format, ordered by start column.
fn range_locations(format: &Format) -> Vec<(Location, String)> {
    let mut locations: Vec<(Location, String)> = format
        .columns()
        .iter()
        .filter_map(|column| column.location.clone())
        .filter(Location::is_range)
        .map(|location| {
            let key = location.key();
            (location, key)
        })
        .collect();
    locations.sort_by_key(|(location, _)| match location {
        Location::Range { start, .. } => *start,
        _ => usize::MAX,
    });
    locations
}

/// Slices one line; ranges starting past the end of the line are left out.
pub(crate) fn slice_line<'a>(line: &'a str, locations: &'a [(Location, String)]) -> impl Iterator<Item = (&'a str, &'a str)> {
    let length = line.chars().count();
    locations
        .iter()
        .filter_map(move |(location, key)| location.slice(line, length).map(|slice| (key.as_str(), slice)))
}

impl FormatAdapter for FixedWidthAdapter {
    fn name(&self) -> &'static str {
        "fixed-width"
    }

    fn supports(&self, input: &Input, _name: &str, format: Option<&Format>) -> bool {
        format
            .map(|format| format.columns().iter().any(|column| column.location.as_ref().is_some_and(Location::is_range)))
            .unwrap_or(false)
            && has_text_content(input)
    }

    fn open(&mut self, input: &Input, _name: &str, format: Option<&Format>) -> Result<()> {
        self.close();
        self.lines = Some(LineReader::open(input)?);
        self.locations = format.map(range_locations).unwrap_or_default();
        self.columns = columns_of(format);
        self.length = input.len()?;
        self.first_line_length = None;
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
        if self.first_line_length.is_none() {
            self.first_line_length = Some(line.len().max(1) as u64);
        }

        let mut row = Row::with_capacity(self.locations.len());
        for (key, slice) in slice_line(&line, &self.locations) {
            let value = convert_cell(Value::from(slice), key, &self.columns, converter);
            row.insert(key, value);
        }
        Ok(RawRow::Row(row))
    }

    fn estimate_total_rows(&self) -> Option<u64> {
        self.first_line_length.map(|length| self.length / length)
    }

    fn close(&mut self) {
        self.lines = None;
        self.finished = true;
    }
}
