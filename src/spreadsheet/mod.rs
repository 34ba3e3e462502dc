//! Workbook adapters: XLSX, XLS and ODS sheets read as sections of rows.
//!
//! Each container format implements [`Spreadsheet`], which yields the stored cells
//! of one sheet row at a time. [`SpreadsheetAdapter`] turns those into rows keyed by
//! column ordinal, selects sheets and separates them with section boundaries.

pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod ods;
pub(crate) mod reference;
pub(crate) mod xls;
pub(crate) mod xlsx;

use crate::adapter::convert_cell;
use crate::adapter::columns_of;
use crate::adapter::FormatAdapter;
use crate::adapter::RawRow;
use crate::convert::Converter;
use crate::error::Error;
use crate::error::Result;
use crate::format::column::Column;
use crate::format::Format;
use crate::helpers::reader::Input;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::DateSystem;
use crate::spreadsheet::cell::ValueOptions;
use crate::value::Row;
use crate::value::Value;
use log::debug;
use std::collections::HashMap;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("No sheet data found")]
    NoSheets,

    #[error("Workbook is password protected")]
    PasswordProtected,

    #[error("Missing workbook part '{0}'")]
    MissingPart(String),

    #[error("Unexpected mimetype '{0}'")]
    MimeType(String),

    #[error("Invalid code page '{0}'")]
    CodePage(u16),

    #[error("Invalid formula value 0x{0:016X}")]
    FormulaValue(u64),

    #[error("Shared string {0} out of range")]
    SharedString(usize),

    #[error("Invalid cell reference '{0}'")]
    CellReference(String),
}

/// A workbook whose sheets can be read row by row.
pub(crate) trait Spreadsheet {
    /// Worksheet names in workbook order.
    fn sheet_names(&self) -> &[String];

    fn date_system(&self) -> DateSystem;

    /// Starts reading sheet `index`. Sheets are opened in increasing order.
    fn open_sheet(&mut self, index: usize) -> Result<()>;

    /// Stored cells of the next physical row of the open sheet, `None` after its last row.
    fn next_row(&mut self) -> Result<Option<Vec<Cell>>>;

    /// Row count the container declares for sheet `index`.
    fn sheet_rows(&mut self, index: usize) -> Result<Option<u64>>;
}

/// The workbook containers this crate reads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WorkbookKind {
    Xlsx,
    Xls,
    Ods,
}

impl WorkbookKind {
    pub fn name(self) -> &'static str {
        match self {
            WorkbookKind::Xlsx => "xlsx",
            WorkbookKind::Xls => "xls",
            WorkbookKind::Ods => "ods",
        }
    }

    fn probe(self, input: &Input) -> bool {
        match self {
            WorkbookKind::Xlsx => xlsx::probe(input),
            WorkbookKind::Xls => xls::probe(input),
            WorkbookKind::Ods => ods::probe(input),
        }
    }

    fn load(self, input: &Input) -> Result<Box<dyn Spreadsheet>> {
        Ok(match self {
            WorkbookKind::Xlsx => Box::new(xlsx::XlsxWorkbook::load(input)?),
            WorkbookKind::Xls => Box::new(xls::XlsWorkbook::load(input)?),
            WorkbookKind::Ods => Box::new(ods::OdsWorkbook::load(input)?),
        })
    }
}

/// Reads the selected sheets of a workbook as consecutive sections.
pub struct SpreadsheetAdapter {
    kind: WorkbookKind,
    book: Option<Box<dyn Spreadsheet>>,
    /// Indexes of the selected sheets, in reading order.
    sheets: Vec<usize>,
    position: usize,
    sheet_open: bool,
    ended: bool,
    columns: HashMap<String, Column>,
    /// Keys of the columns whose numbers are serial dates.
    date_keys: HashSet<String>,
    options: ValueOptions,
    estimate: Option<u64>,
}

impl SpreadsheetAdapter {
    pub fn new(kind: WorkbookKind) -> SpreadsheetAdapter {
        SpreadsheetAdapter {
            kind,
            book: None,
            sheets: Vec::new(),
            position: 0,
            sheet_open: false,
            ended: false,
            columns: HashMap::new(),
            date_keys: HashSet::new(),
            options: ValueOptions::default(),
            estimate: None,
        }
    }

    pub fn kind(&self) -> WorkbookKind {
        self.kind
    }

    fn build_row(&self, cells: Vec<Cell>, converter: Option<&dyn Converter>) -> Row {
        let width = cells.iter().map(|cell| cell.col + 1).max().unwrap_or(0);
        let mut values = vec![Value::Null; width];
        for cell in cells {
            let as_date = self.date_keys.contains(&(cell.col + 1).to_string());
            values[cell.col] = cell.to_value(self.options, as_date);
        }
        values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let key = (index + 1).to_string();
                let value = convert_cell(value, &key, &self.columns, converter);
                (key, value)
            })
            .collect()
    }
}

/// Sheet indexes picked by `selector`: all when `<= 0`, else the n-th.
fn select_sheets(selector: i32, available: usize) -> Result<Vec<usize>> {
    if selector <= 0 {
        Ok((0..available).collect())
    } else if selector as usize <= available {
        Ok(vec![selector as usize - 1])
    } else {
        Err(Error::SectionNotFound { requested: selector, available })
    }
}

impl FormatAdapter for SpreadsheetAdapter {
    fn name(&self) -> &'static str {
        self.kind.name()
    }

    fn supports(&self, input: &Input, _name: &str, _format: Option<&Format>) -> bool {
        self.kind.probe(input)
    }

    fn open(&mut self, input: &Input, name: &str, format: Option<&Format>) -> Result<()> {
        self.close();
        let mut book = self.kind.load(input)?;
        let available = book.sheet_names().len();
        if available == 0 {
            Err(SpreadsheetError::NoSheets)?
        }
        let sheets = select_sheets(format.map(Format::section_selector).unwrap_or(1), available)?;

        let mut estimate = Some(0u64);
        for index in &sheets {
            estimate = match (estimate, book.sheet_rows(*index)?) {
                (Some(total), Some(rows)) => Some(total + rows),
                _ => None,
            };
        }
        debug!(
            "Reading {} of {} sheet(s) of '{}' as {}",
            sheets.len(),
            available,
            name,
            self.kind.name()
        );

        self.columns = columns_of(format);
        self.date_keys = self
            .columns
            .iter()
            .filter(|(_, column)| column.type_tag.to_ascii_lowercase().contains("date"))
            .map(|(key, _)| key.clone())
            .collect();
        self.options = ValueOptions {
            date_system: book.date_system(),
            formatted: format.map(Format::apply_source_formatting).unwrap_or(false),
        };
        self.sheets = sheets;
        self.estimate = estimate;
        self.book = Some(book);
        Ok(())
    }

    fn next_raw_row(&mut self, converter: Option<&dyn Converter>) -> Result<RawRow> {
        if self.ended {
            return Ok(RawRow::EndOfInput);
        }
        let (Some(book), Some(sheet)) = (self.book.as_mut(), self.sheets.get(self.position)) else {
            self.ended = true;
            return Ok(RawRow::EndOfInput);
        };
        if !self.sheet_open {
            book.open_sheet(*sheet)?;
            self.sheet_open = true;
        }
        match book.next_row()? {
            Some(cells) => Ok(RawRow::Row(self.build_row(cells, converter))),
            None => {
                self.sheet_open = false;
                self.position += 1;
                if self.position < self.sheets.len() {
                    Ok(RawRow::SectionBoundary)
                } else {
                    self.ended = true;
                    Ok(RawRow::EndOfInput)
                }
            }
        }
    }

    fn estimate_total_rows(&self) -> Option<u64> {
        self.estimate
    }

    fn close(&mut self) {
        self.book = None;
        self.sheets.clear();
        self.position = 0;
        self.sheet_open = false;
        self.ended = false;
        self.estimate = None;
    }
}
