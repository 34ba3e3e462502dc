//! Office Open XML workbooks (`.xlsx`, `.xlsm`).

use crate::error::Result;
use crate::for_each_xml_event;
use crate::helpers::reader::Input;
use crate::helpers::reader::SourceReader;
use crate::helpers::xml::AttributeLookup;
use crate::helpers::xml::TextSink;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::archive_contains;
use crate::helpers::zip::open_archive;
use crate::helpers::zip::PartReader;
use crate::helpers::zip::ZipLookup;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::DateSystem;
use crate::spreadsheet::excel::load_number_formats;
use crate::spreadsheet::excel::load_relationships;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::rows_in_range;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::collections::HashMap;
use std::io::BufRead;
use zip::ZipArchive;

const WORKBOOK_PATH: &str = "xl/workbook.xml";

const TAG_CUSTOM_FORMATS: QName = QName(b"numFmts");
const TAG_CUSTOM_FORMAT: QName = QName(b"numFmt");
const TAG_CELL_FORMATS: QName = QName(b"cellXfs");
const TAG_CELL_FORMAT: QName = QName(b"xf");
const TAG_SHARED_STRING_ITEM: QName = QName(b"si");
const TAG_PHONETIC_RUN: QName = QName(b"rPh");
const TAG_TEXT: QName = QName(b"t");
const TAG_WORKBOOK_PROPERTIES: QName = QName(b"workbookPr");
const TAG_SHEET: QName = QName(b"sheet");
const TAG_DIMENSION: QName = QName(b"dimension");
const TAG_SHEET_DATA: QName = QName(b"sheetData");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

pub(crate) fn probe(input: &Input) -> bool {
    archive_contains(input, WORKBOOK_PATH)
}

pub(crate) struct XlsxWorkbook {
    zip: ZipArchive<SourceReader>,
    names: Vec<String>,
    /// Zip path of each worksheet part.
    paths: Vec<String>,
    date_system: DateSystem,
    /// Cell type of each cell style.
    cell_types: Vec<CellType>,
    shared_strings: Vec<String>,
    /// Reader over the open sheet.
    reader: Option<PartReader>,
}

/// Attributes of a `<c>` element, kept until its end tag.
struct CellStart {
    col: usize,
    kind: Option<String>,
    style: Option<usize>,
}

impl XlsxWorkbook {
    pub(crate) fn load(input: &Input) -> Result<XlsxWorkbook> {
        let mut zip = open_archive(input)?;
        let relationships = load_relationships(&mut zip, "xl/_rels/workbook.xml.rels")?;
        let (sheets, is_1904) = load_workbook(&mut zip, &relationships)?;
        let cell_types = load_styles(&mut zip)?;
        let shared_strings = load_shared_strings(&mut zip)?;
        let (names, paths) = sheets.into_iter().unzip();
        Ok(XlsxWorkbook {
            zip,
            names,
            paths,
            date_system: DateSystem::from_flag(is_1904),
            cell_types,
            shared_strings,
            reader: None,
        })
    }
}

impl Spreadsheet for XlsxWorkbook {
    fn sheet_names(&self) -> &[String] {
        &self.names
    }

    fn date_system(&self) -> DateSystem {
        self.date_system
    }

    fn open_sheet(&mut self, index: usize) -> Result<()> {
        let path = &self.paths[index];
        let reader = self
            .zip
            .xml_entry(path)?
            .ok_or_else(|| SpreadsheetError::MissingPart(path.to_owned()))?;
        self.reader = Some(reader);
        Ok(())
    }

    fn next_row(&mut self) -> Result<Option<Vec<Cell>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        let mut cells = Vec::new();
        let mut in_row = false;
        let mut next_col = 0usize;
        let mut current = None::<CellStart>;
        let mut value = String::new();
        for_each_xml_event!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => in_row = true,
            Event::End(event) if event.name() == TAG_ROW => return Ok(Some(cells)),
            Event::Start(event) if in_row && event.name() == TAG_CELL => {
                let col = cell_column(event.attribute("r")?, next_col)?;
                next_col = col + 1;
                current = Some(CellStart {
                    col,
                    kind: event.attribute("t")?,
                    style: event.parse_attribute("s")?,
                });
                value.clear();
            }
            Event::Start(event) if current.is_some() && event.name() == TAG_VALUE => {
                value = read_string_value(reader, TAG_VALUE, true)?;
            }
            Event::Start(event) if current.is_some() && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(reader, TAG_INLINE_STRING, false)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if let Some(start) = current.take() {
                    let value = std::mem::take(&mut value);
                    if let Some(cell) = to_cell(start, value, &self.shared_strings, &self.cell_types)? {
                        cells.push(cell);
                    }
                }
            }
            Event::End(event) if event.name() == TAG_SHEET_DATA => break,
        });
        self.reader = None;
        Ok(None)
    }

    fn sheet_rows(&mut self, index: usize) -> Result<Option<u64>> {
        let Some(mut reader) = self.zip.xml_entry(&self.paths[index])? else {
            return Ok(None);
        };
        for_each_xml_event!(reader => {
            Event::Start(event) if event.name() == TAG_DIMENSION => {
                return Ok(event.attribute("ref")?.and_then(|range| rows_in_range(&range)));
            }
            Event::Start(event) if event.name() == TAG_SHEET_DATA => break,
        });
        Ok(None)
    }
}

/// Column of a `<c>` element: from its reference, else the one after the previous cell.
fn cell_column(reference: Option<String>, next_col: usize) -> Result<usize> {
    match reference {
        Some(reference) => reference_to_index(&reference)
            .map(|(_, col)| col)
            .ok_or_else(|| SpreadsheetError::CellReference(reference).into()),
        None if next_col < MAX_COLUMNS => Ok(next_col),
        None => Err(SpreadsheetError::CellReference(format!("column {}", next_col + 1)).into()),
    }
}

fn to_cell(start: CellStart, value: String, shared_strings: &[String], cell_types: &[CellType]) -> Result<Option<Cell>> {
    if value.is_empty() {
        return Ok(None);
    }
    let (kind, value) = match start.kind.as_deref() {
        Some("s") => {
            let index = value.trim().parse::<usize>()?;
            let string = shared_strings.get(index).ok_or(SpreadsheetError::SharedString(index))?;
            (CellType::Text, string.clone())
        }
        Some("inlineStr") | Some("str") => (CellType::Text, value),
        Some("b") => (CellType::Boolean, value),
        Some("e") => (CellType::Error, value),
        Some("d") => (CellType::IsoDateTime, value),
        _ => {
            let kind = start
                .style
                .and_then(|style| cell_types.get(style))
                .copied()
                .unwrap_or(CellType::Number);
            (kind, value)
        }
    };
    Ok(Some(Cell::new(start.col, kind, value)))
}

/// Worksheets as (name, zip path) in workbook order, and whether dates count from 1904.
fn load_workbook(
    zip: &mut ZipArchive<SourceReader>,
    relationships: &HashMap<String, String>,
) -> Result<(Vec<(String, String)>, bool)> {
    let mut reader = zip
        .xml_entry(WORKBOOK_PATH)?
        .ok_or_else(|| SpreadsheetError::MissingPart(WORKBOOK_PATH.to_owned()))?;
    let mut sheets = Vec::new();
    let mut is_1904 = false;
    for_each_xml_event!(reader => {
        Event::Start(event) if event.name() == TAG_SHEET => {
            let mut name = None;
            let mut id = None;
            for attribute in event.attributes() {
                let attribute = attribute?;
                match attribute.key.local_name().as_ref() {
                    b"name" => name = Some(attribute.unescape_value()?.into_owned()),
                    b"id" => id = Some(attribute.unescape_value()?.into_owned()),
                    _ => (),
                }
            }
            if let Some((name, id)) = name.zip(id) {
                if let Some(path) = relationships.get(&id) {
                    sheets.push((name, path.to_owned()));
                }
            }
        }
        Event::Start(event) if event.name() == TAG_WORKBOOK_PROPERTIES => {
            is_1904 = event
                .attribute("date1904")?
                .map(|flag| flag == "1" || flag.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
        }
    });
    Ok((sheets, is_1904))
}

/// Cell type of each entry of `cellXfs`.
fn load_styles(zip: &mut ZipArchive<SourceReader>) -> Result<Vec<CellType>> {
    let Some(mut reader) = zip.xml_entry("xl/styles.xml")? else {
        return Ok(Vec::new());
    };
    let mut in_custom_formats = false;
    let mut in_cell_formats = false;
    let mut custom_formats = HashMap::new();
    let mut format_ids = Vec::new();
    for_each_xml_event!(reader => {
        Event::Start(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = true,
        Event::End(event) if event.name() == TAG_CUSTOM_FORMATS => in_custom_formats = false,
        Event::Start(event) if in_custom_formats && event.name() == TAG_CUSTOM_FORMAT => {
            let id = event.parse_attribute::<u16>("numFmtId")?;
            let code = event.attribute("formatCode")?;
            if let Some((id, code)) = id.zip(code) {
                custom_formats.insert(id, CellType::from_custom_format(&code));
            }
        }
        Event::Start(event) if event.name() == TAG_CELL_FORMATS => in_cell_formats = true,
        Event::End(event) if event.name() == TAG_CELL_FORMATS => in_cell_formats = false,
        Event::Start(event) if in_cell_formats && event.name() == TAG_CELL_FORMAT => {
            format_ids.push(event.parse_attribute::<u16>("numFmtId")?.unwrap_or_default());
        }
    });
    Ok(load_number_formats(&format_ids, &custom_formats))
}

fn load_shared_strings(zip: &mut ZipArchive<SourceReader>) -> Result<Vec<String>> {
    let mut shared_strings = Vec::new();
    let Some(mut reader) = zip.xml_entry("xl/sharedStrings.xml")? else {
        return Ok(shared_strings);
    };
    for_each_xml_event!(reader => {
        Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
            shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
        }
    });
    Ok(shared_strings)
}

/// Text up to `end_tag`: the whole content for `<v>`, else the `<t>` runs outside phonetic runs.
fn read_string_value<R: BufRead>(reader: &mut XmlReader<R>, end_tag: QName, is_text: bool) -> Result<String> {
    let mut in_phonetic = false;
    let mut in_text = is_text;
    let mut text = String::new();
    for_each_xml_event!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_RUN => in_phonetic = true,
        Event::End(event) if event.name() == TAG_PHONETIC_RUN => in_phonetic = false,
        Event::Start(event) if !in_phonetic && event.name() == TAG_TEXT => in_text = true,
        Event::End(event) if event.name() == TAG_TEXT => in_text = is_text,
        Event::Text(event) if in_text => text.push_text(&event)?,
        Event::CData(event) if in_text => text.push_str(&String::from_utf8_lossy(&event)),
        Event::GeneralRef(event) if in_text => text.push_reference(&event)?,
    });
    Ok(text)
}
