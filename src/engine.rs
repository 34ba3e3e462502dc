//! The row engine: turns an adapter's raw rows into clean data rows.
//!
//! Per section, the engine drops the first `header_lines` rows and the last
//! `footer_lines` rows, skips blank rows when asked to and fills column defaults.
//! Footer rows can only be recognised once the end of their section is seen, so
//! rows are held back in a bounded lookahead buffer until enough follow them.

use crate::adapter::FormatAdapter;
use crate::adapter::RawRow;
use crate::convert::Converter;
use crate::convert::StandardConverter;
use crate::error::Error;
use crate::error::Result;
use crate::error::ResultMessage;
use crate::format::column::Column;
use crate::format::Format;
use crate::helpers::reader::Input;
use crate::value::Row;
use log::warn;
use std::collections::HashMap;
use std::collections::VecDeque;

/// Smallest lookahead buffer, whatever the footer size.
const MIN_BUFFERED_ROWS: usize = 10;

/// Where the engine stands in the adapter's stream.
#[derive(Copy, Clone, Debug, PartialEq)]
enum SourceState {
    /// Rows of the current section may still follow.
    Open,
    /// A section boundary was read; the buffer drains before the next section starts.
    SectionEnded,
    /// The adapter reported end of input; it is never pulled again.
    Finished,
}

/// Outcome of one pass of the fill loop.
#[derive(Copy, Clone, Debug, PartialEq)]
enum Fill {
    HaveRows,
    NeedMoreSections,
    Exhausted,
}

pub struct RowEngine {
    adapter: Box<dyn FormatAdapter>,
    converter: Box<dyn Converter>,
    name: String,
    format: Format,
    column_by_location: HashMap<String, Column>,
    /// Keys and defaults of the columns that have one.
    defaults: Vec<(String, Column)>,
    header_lines_read: usize,
    buffer: VecDeque<Row>,
    capacity: usize,
    /// A raw row drawn during construction, replayed before the adapter is pulled again.
    replay: Option<RawRow>,
    source: SourceState,
    closed: bool,
}

impl RowEngine {
    /// Opens `adapter` on `input`, coercing cells with the [`StandardConverter`].
    ///
    /// Without a format, one is derived from the first row (see [`RowEngine::open_with_converter`]).
    pub fn open(adapter: Box<dyn FormatAdapter>, input: &Input, name: &str, format: Option<Format>) -> Result<RowEngine> {
        Self::open_with_converter(adapter, input, name, format, Box::new(StandardConverter))
    }

    /// Opens `adapter` on `input` with a custom converter.
    ///
    /// When `format` is `None` one raw row is drawn and its values name the columns,
    /// all textual, with one header line. That row is replayed into the stream so the
    /// header rule consumes it. A blank first row names nothing and the default format
    /// is used instead.
    pub fn open_with_converter(
        mut adapter: Box<dyn FormatAdapter>,
        input: &Input,
        name: &str,
        format: Option<Format>,
        converter: Box<dyn Converter>,
    ) -> Result<RowEngine> {
        adapter.open(input, name, format.as_ref()).with_prefix(name)?;

        let (format, replay) = match format {
            Some(format) => (format, None),
            None => {
                let raw = adapter.next_raw_row(None).with_prefix(name)?;
                let derived = match &raw {
                    RawRow::Row(row) => {
                        let derived = Format::from_header(row);
                        if derived.is_none() {
                            warn!("First row of '{}' is blank, no column names derived", name);
                        }
                        derived
                    }
                    _ => None,
                };
                (derived.unwrap_or_default(), Some(raw))
            }
        };

        let column_by_location = format.columns_by_key();
        let defaults = format
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, column)| column.default_value.is_some())
            .map(|(index, column)| (column.key(index + 1), column.clone()))
            .collect();
        let capacity = (2 * format.footer_lines() + 1).max(MIN_BUFFERED_ROWS);

        Ok(RowEngine {
            adapter,
            converter,
            name: name.to_owned(),
            format,
            column_by_location,
            defaults,
            header_lines_read: 0,
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            replay,
            source: SourceState::Open,
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The format in use, derived or given.
    pub fn format(&self) -> &Format {
        &self.format
    }

    /// The column whose location resolves to `key`.
    pub fn column(&self, key: &str) -> Option<&Column> {
        self.column_by_location.get(key)
    }

    pub fn estimate_total_rows(&self) -> Option<u64> {
        self.adapter.estimate_total_rows()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether another row is available. Repeated calls do not advance the stream.
    pub fn has_more(&mut self) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        loop {
            match self.fill()? {
                Fill::HaveRows => return Ok(true),
                Fill::NeedMoreSections => continue,
                Fill::Exhausted => {
                    self.close();
                    return Ok(false);
                }
            }
        }
    }

    /// The next row, or [`Error::Exhausted`] when none is left.
    pub fn take_next(&mut self) -> Result<Row> {
        if !self.has_more()? {
            return Err(Error::Exhausted);
        }
        self.buffer.pop_front().ok_or(Error::Exhausted)
    }

    /// Rows cannot be taken back out of a source.
    pub fn remove(&mut self) -> Result<()> {
        Err(Error::Unsupported("remove"))
    }

    /// Stops reading and releases the adapter. Later pulls report exhaustion.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.buffer.clear();
            self.replay = None;
            self.adapter.close();
        }
    }

    /// One pass: skip headers at a section start, then top up the lookahead buffer.
    fn fill(&mut self) -> Result<Fill> {
        match self.source {
            SourceState::SectionEnded | SourceState::Finished if !self.buffer.is_empty() => {
                return Ok(Fill::HaveRows);
            }
            SourceState::Finished => return Ok(Fill::Exhausted),
            SourceState::SectionEnded => {
                self.source = SourceState::Open;
                self.header_lines_read = 0;
            }
            SourceState::Open => (),
        }

        while self.header_lines_read < self.format.header_lines() {
            match self.read_raw()? {
                RawRow::Row(_) => self.header_lines_read += 1,
                RawRow::SectionBoundary => self.header_lines_read = 0,
                RawRow::EndOfInput => {
                    self.source = SourceState::Finished;
                    return Ok(Fill::Exhausted);
                }
            }
        }

        while self.buffer.len() < self.capacity {
            match self.read_raw()? {
                RawRow::Row(row) => self.buffer.push_back(row),
                RawRow::SectionBoundary => {
                    self.drop_footer();
                    self.source = SourceState::SectionEnded;
                    break;
                }
                RawRow::EndOfInput => {
                    self.drop_footer();
                    self.source = SourceState::Finished;
                    break;
                }
            }
        }

        // An open section always leaves the buffer full here, longer than the footer.
        if !self.buffer.is_empty() {
            Ok(Fill::HaveRows)
        } else if self.source == SourceState::Finished {
            Ok(Fill::Exhausted)
        } else {
            Ok(Fill::NeedMoreSections)
        }
    }

    /// Drops the footer rows of the section that just ended.
    fn drop_footer(&mut self) {
        let footer = self.format.footer_lines().min(self.buffer.len());
        self.buffer.truncate(self.buffer.len() - footer);
    }

    /// Pulls one raw row, filling defaults and skipping blank rows when configured.
    fn read_raw(&mut self) -> Result<RawRow> {
        loop {
            let raw = match self.replay.take() {
                Some(raw) => raw,
                None => {
                    let converter = if self.format.convert_types() {
                        Some(self.converter.as_ref())
                    } else {
                        None
                    };
                    self.adapter.next_raw_row(converter).with_prefix(&self.name)?
                }
            };
            let RawRow::Row(mut row) = raw else {
                return Ok(raw);
            };
            self.fill_defaults(&mut row);
            if self.format.ignore_blank_lines() && row.is_blank() {
                continue;
            }
            return Ok(RawRow::Row(row));
        }
    }

    fn fill_defaults(&self, row: &mut Row) {
        for (key, column) in &self.defaults {
            let Some(default) = &column.default_value else {
                continue;
            };
            match row.get_mut(key) {
                Some(value) if value.is_blank() => *value = default.clone(),
                Some(_) => (),
                None => {
                    row.insert(key.to_owned(), default.clone());
                }
            }
        }
    }
}

impl Iterator for RowEngine {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_more() {
            Ok(true) => Some(self.take_next()),
            Ok(false) => None,
            Err(error) => {
                self.close();
                Some(Err(error))
            }
        }
    }
}

impl Drop for RowEngine {
    fn drop(&mut self) {
        self.close();
    }
}
