//! Excel 97-2003 workbooks (`.xls`): BIFF8 records inside a compound file.

use crate::error::Result;
use crate::error::ResultOptionChain;
use crate::helpers::biff8::BiffStream;
use crate::helpers::biff8::Record;
use crate::helpers::cfb::CompoundFile;
use crate::helpers::reader::Input;
use crate::spreadsheet::cell::error_code;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::DateSystem;
use crate::spreadsheet::excel::load_number_formats;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use either::Either;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;

const FORMULA: u16 = 0x0006;
const EOF: u16 = 0x000A;
const DATE1904: u16 = 0x0022;
const FILE_PASS: u16 = 0x002F;
const CODE_PAGE: u16 = 0x0042;
const BOUND_SHEET8: u16 = 0x0085;
const MUL_RK: u16 = 0x00BD;
const XF: u16 = 0x00E0;
const SST: u16 = 0x00FC;
const LABEL_SST: u16 = 0x00FD;
const DIMENSIONS: u16 = 0x0200;
const NUMBER: u16 = 0x0203;
const LABEL: u16 = 0x0204;
const BOOL_ERR: u16 = 0x0205;
const STRING: u16 = 0x0207;
const RK: u16 = 0x027E;
const FORMAT: u16 = 0x041E;
const BOF: u16 = 0x0809;

/// A cell's type, either fixed by its record or looked up through its style.
type CellKind = Either<CellType, usize>;

pub(crate) fn probe(input: &Input) -> bool {
    let is_compound = input
        .head(8)
        .map(|head| CompoundFile::has_signature(&head))
        .unwrap_or(false);
    is_compound
        && input
            .reader()
            .and_then(|mut reader| CompoundFile::open(&mut reader))
            .map(|file| file.contains("Workbook") || file.contains("Book"))
            .unwrap_or(false)
}

pub(crate) struct XlsWorkbook {
    stream: BiffStream,
    names: Vec<String>,
    /// Stream offset of each worksheet's BOF record.
    offsets: Vec<usize>,
    date_system: DateSystem,
    cell_types: Vec<CellType>,
    shared_strings: Vec<String>,
    /// Rows of the open sheet, decoded when it is opened.
    rows: VecDeque<Vec<Cell>>,
}

impl XlsWorkbook {
    pub(crate) fn load(input: &Input) -> Result<XlsWorkbook> {
        let file = CompoundFile::open(&mut input.reader()?)?;
        let data = file
            .read("Workbook")
            .ok_none_else(|| file.read("Book"))?
            .ok_or_else(|| SpreadsheetError::MissingPart("Workbook".to_owned()))?;
        let mut stream = BiffStream::new(data);

        let mut is_1904 = false;
        let mut custom_formats = HashMap::new();
        let mut format_ids = Vec::new();
        let mut shared_strings = Vec::new();
        let mut names = Vec::new();
        let mut offsets = Vec::new();
        while let Some(mut record) = stream.next_record()? {
            match record.kind {
                EOF => break,
                FILE_PASS => Err(SpreadsheetError::PasswordProtected)?,
                DATE1904 => is_1904 = record.read_u16()? == 1,
                CODE_PAGE => {
                    let code_page = record.read_u16()?;
                    stream.encoding = codepage::to_encoding(code_page).ok_or(SpreadsheetError::CodePage(code_page))?;
                }
                FORMAT => {
                    let id = record.read_u16()?;
                    let code = record.read_string()?;
                    custom_formats.insert(id, CellType::from_custom_format(&code));
                }
                XF => {
                    record.skip(2)?;
                    format_ids.push(record.read_u16()?);
                }
                SST => shared_strings = load_shared_strings(&mut record)?,
                BOUND_SHEET8 => {
                    let offset = record.read_u32()? as usize;
                    record.skip(1)?;
                    let sheet_type = record.read_u8()?;
                    let name = record.read_short_string()?;
                    if sheet_type == 0 {
                        names.push(name);
                        offsets.push(offset);
                    }
                }
                _ => (),
            }
        }

        Ok(XlsWorkbook {
            stream,
            names,
            offsets,
            date_system: DateSystem::from_flag(is_1904),
            cell_types: load_number_formats(&format_ids, &custom_formats),
            shared_strings,
            rows: VecDeque::new(),
        })
    }

    fn cell_type(&self, kind: CellKind) -> CellType {
        match kind {
            Either::Left(kind) => kind,
            Either::Right(style) => self.cell_types.get(style).copied().unwrap_or(CellType::Number),
        }
    }

    /// Moves to the records following sheet `index`'s BOF.
    fn seek_sheet(&mut self, index: usize) -> Result<()> {
        self.stream.seek(self.offsets[index]);
        match self.stream.next_record()? {
            Some(record) if record.kind == BOF => Ok(()),
            _ => Err(SpreadsheetError::MissingPart(self.names[index].clone()))?,
        }
    }
}

impl Spreadsheet for XlsWorkbook {
    fn sheet_names(&self) -> &[String] {
        &self.names
    }

    fn date_system(&self) -> DateSystem {
        self.date_system
    }

    fn open_sheet(&mut self, index: usize) -> Result<()> {
        self.seek_sheet(index)?;
        let mut sheet = SheetCells::new();
        // A string formula's result follows in a STRING record.
        let mut pending_string = None::<(u16, u16)>;
        while let Some(mut record) = self.stream.next_record()? {
            match record.kind {
                BOF | EOF => break,
                STRING => {
                    if let Some((row, col)) = pending_string.take() {
                        store(&mut sheet, row, col, CellType::Text, record.read_string()?);
                    }
                }
                MUL_RK => {
                    let row = record.read_u16()?;
                    let first = record.read_u16()?;
                    let count = record.remaining().saturating_sub(2) / 6;
                    for col in first..first + count as u16 {
                        let style = record.read_u16()? as usize;
                        let number = record.read_rk()?;
                        store(&mut sheet, row, col, self.cell_type(Either::Right(style)), number.to_string());
                    }
                }
                NUMBER | RK | LABEL | LABEL_SST | BOOL_ERR | FORMULA => {
                    let row = record.read_u16()?;
                    let col = record.read_u16()?;
                    let style = record.read_u16()? as usize;
                    let (kind, value) = match record.kind {
                        NUMBER => (Either::Right(style), record.read_f64()?.to_string()),
                        RK => (Either::Right(style), record.read_rk()?.to_string()),
                        LABEL => (Either::Left(CellType::Text), record.read_string()?),
                        LABEL_SST => {
                            let index = record.read_u32()? as usize;
                            let string = self.shared_strings.get(index).ok_or(SpreadsheetError::SharedString(index))?;
                            (Either::Left(CellType::Text), string.clone())
                        }
                        BOOL_ERR => read_bool_or_error(&mut record)?,
                        _ => match read_formula_result(&mut record, style)? {
                            Some(result) => result,
                            None => {
                                pending_string = Some((row, col));
                                continue;
                            }
                        },
                    };
                    store(&mut sheet, row, col, self.cell_type(kind), value);
                }
                _ => (),
            }
        }
        self.rows = sheet.into_values().map(|cells| cells.into_values().collect()).collect();
        Ok(())
    }

    fn next_row(&mut self) -> Result<Option<Vec<Cell>>> {
        Ok(self.rows.pop_front())
    }

    fn sheet_rows(&mut self, index: usize) -> Result<Option<u64>> {
        self.seek_sheet(index)?;
        while let Some(mut record) = self.stream.next_record()? {
            match record.kind {
                DIMENSIONS => {
                    let first = record.read_u32()?;
                    let last = record.read_u32()?;
                    return Ok(Some(last.saturating_sub(first) as u64));
                }
                BOF | EOF => break,
                _ => (),
            }
        }
        Ok(None)
    }
}

type SheetCells = BTreeMap<u16, BTreeMap<u16, Cell>>;

/// Keeps non-empty values; a later record for the same cell wins.
fn store(sheet: &mut SheetCells, row: u16, col: u16, kind: CellType, value: String) {
    if !value.is_empty() {
        sheet.entry(row).or_default().insert(col, Cell::new(col as usize, kind, value));
    }
}

fn load_shared_strings(record: &mut Record) -> Result<Vec<String>> {
    record.skip(4)?;
    let count = record.read_u32()? as usize;
    let mut strings = Vec::with_capacity(count.min(record.remaining()));
    for _ in 0..count {
        strings.push(record.read_rich_string()?);
    }
    Ok(strings)
}

fn read_bool_or_error(record: &mut Record) -> Result<(CellKind, String)> {
    let value = record.read_u8()?;
    let is_error = record.read_u8()? != 0;
    Ok(if is_error {
        (Either::Left(CellType::Error), error_code(value).to_owned())
    } else {
        (Either::Left(CellType::Boolean), value.to_string())
    })
}

/// The cached result of a FORMULA record, `None` when it is a string held in the next STRING record.
fn read_formula_result(record: &mut Record, style: usize) -> Result<Option<(CellKind, String)>> {
    let raw = record.read_u64()?;
    if raw >> 48 != 0xFFFF {
        return Ok(Some((Either::Right(style), f64::from_bits(raw).to_string())));
    }
    let result = match raw & 0xFF {
        0 => None,
        1 => Some((Either::Left(CellType::Boolean), ((raw >> 16) & 0xFF).to_string())),
        2 => Some((Either::Left(CellType::Error), error_code(((raw >> 16) & 0xFF) as u8).to_owned())),
        3 => Some((Either::Left(CellType::Text), String::new())),
        _ => Err(SpreadsheetError::FormulaValue(raw))?,
    };
    Ok(result)
}
