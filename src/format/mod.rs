//! Immutable description of a source: how many header and footer lines to drop,
//! how to split text lines, which section to read and the columns it contains.

pub mod column;
pub mod location;

use crate::format::column::Column;
use crate::value::Row;
use regex::Regex;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W").expect("Hardcode regex pattern"));

pub const DEFAULT_SEPARATORS: [char; 2] = ['\t', ','];
pub const DEFAULT_QUOTE: char = '"';

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Invalid column location '{0}'")]
    LocationError(String),

    #[error("Column name must not be empty")]
    ColumnNameError,

    #[error("Columns share the location '{0}'")]
    DuplicateLocation(String),

    #[error("Duplicate column name '{0}'")]
    DuplicateName(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Format {
    header_lines: usize,
    footer_lines: usize,
    ignore_blank_lines: bool,
    column_separator_chars: Vec<char>,
    column_quote_char: char,
    apply_source_formatting: bool,
    section_selector: i32,
    convert_types: bool,
    columns: Vec<Column>,
}

impl Default for Format {
    fn default() -> Self {
        Format {
            header_lines: 1,
            footer_lines: 0,
            ignore_blank_lines: true,
            column_separator_chars: DEFAULT_SEPARATORS.to_vec(),
            column_quote_char: DEFAULT_QUOTE,
            apply_source_formatting: false,
            section_selector: 1,
            convert_types: true,
            columns: Vec::new(),
        }
    }
}

impl Format {
    pub fn builder() -> FormatBuilder {
        FormatBuilder { format: Format::default() }
    }

    /// Tab-only separators, everything else default.
    pub fn tab_separated() -> Format {
        Format { column_separator_chars: vec!['\t'], ..Format::default() }
    }

    /// Names columns after the values of a header row.
    ///
    /// Returns `None` for a blank row: there is nothing to name columns after.
    pub(crate) fn from_header(row: &Row) -> Option<Format> {
        if row.is_blank() {
            return None;
        }
        let mut names = HashSet::new();
        let columns = row
            .values()
            .enumerate()
            .map(|(index, value)| {
                let text = value.to_string();
                let mut name = NON_WORD.replace_all(text.trim(), "_").to_lowercase();
                if name.is_empty() {
                    name = format!("column_{}", index + 1);
                }
                let mut unique = name.clone();
                let mut suffix = 2;
                while !names.insert(unique.clone()) {
                    unique = format!("{}_{}", name, suffix);
                    suffix += 1;
                }
                Column::new(unique)
            })
            .collect();
        Some(Format { columns, ..Format::default() })
    }

    pub fn header_lines(&self) -> usize {
        self.header_lines
    }

    pub fn footer_lines(&self) -> usize {
        self.footer_lines
    }

    pub fn ignore_blank_lines(&self) -> bool {
        self.ignore_blank_lines
    }

    pub fn column_separator_chars(&self) -> &[char] {
        &self.column_separator_chars
    }

    pub fn column_quote_char(&self) -> char {
        self.column_quote_char
    }

    pub fn apply_source_formatting(&self) -> bool {
        self.apply_source_formatting
    }

    /// 1-based section to read; zero or negative reads every section.
    pub fn section_selector(&self) -> i32 {
        self.section_selector
    }

    pub fn reads_all_sections(&self) -> bool {
        self.section_selector <= 0
    }

    pub fn convert_types(&self) -> bool {
        self.convert_types
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Columns keyed by the row key they resolve to.
    pub fn columns_by_key(&self) -> HashMap<String, Column> {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, column)| (column.key(index + 1), column.clone()))
            .collect()
    }
}

pub struct FormatBuilder {
    format: Format,
}

impl FormatBuilder {
    pub fn header_lines(mut self, lines: usize) -> Self {
        self.format.header_lines = lines;
        self
    }

    pub fn footer_lines(mut self, lines: usize) -> Self {
        self.format.footer_lines = lines;
        self
    }

    pub fn ignore_blank_lines(mut self, ignore: bool) -> Self {
        self.format.ignore_blank_lines = ignore;
        self
    }

    /// Candidate separators in priority order; duplicates are dropped.
    pub fn column_separator_chars(mut self, separators: impl IntoIterator<Item = char>) -> Self {
        let mut chars: Vec<char> = Vec::new();
        for separator in separators {
            if !chars.contains(&separator) {
                chars.push(separator);
            }
        }
        self.format.column_separator_chars = chars;
        self
    }

    pub fn column_quote_char(mut self, quote: char) -> Self {
        self.format.column_quote_char = quote;
        self
    }

    pub fn apply_source_formatting(mut self, apply: bool) -> Self {
        self.format.apply_source_formatting = apply;
        self
    }

    pub fn section_selector(mut self, section: i32) -> Self {
        self.format.section_selector = section;
        self
    }

    pub fn all_sections(self) -> Self {
        self.section_selector(0)
    }

    pub fn convert_types(mut self, convert: bool) -> Self {
        self.format.convert_types = convert;
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.format.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.format.columns.extend(columns);
        self
    }

    /// Checks that column names and resolved locations are unique.
    pub fn build(self) -> Result<Format, FormatError> {
        let mut names = HashSet::new();
        let mut keys = HashSet::new();
        for (index, column) in self.format.columns.iter().enumerate() {
            if !names.insert(column.name.as_str()) {
                Err(FormatError::DuplicateName(column.name.to_owned()))?
            }
            let key = column.key(index + 1);
            if !keys.insert(key.clone()) {
                Err(FormatError::DuplicateLocation(key))?
            }
        }
        Ok(self.format)
    }
}
