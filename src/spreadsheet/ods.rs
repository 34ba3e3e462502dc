//! OpenDocument spreadsheets (`.ods`).

use crate::error::Result;
use crate::for_each_xml_event;
use crate::helpers::reader::Input;
use crate::helpers::xml::AttributeLookup;
use crate::helpers::xml::TextSink;
use crate::helpers::xml::XmlReader;
use crate::helpers::zip::open_archive;
use crate::helpers::zip::PartReader;
use crate::helpers::zip::ZipLookup;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::cell::DateSystem;
use crate::spreadsheet::reference::MAX_COLUMNS;
use crate::spreadsheet::reference::MAX_ROWS;
use crate::spreadsheet::Spreadsheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::io::Cursor;

/// Content of the `mimetype` entry of an ODS package
const MIME_TYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";
/// Package entry holding the tables
const CONTENT_PATH: &str = "content.xml";

/// XML element name for table (one per sheet)
const TABLE: QName = QName(b"table:table");
/// XML element name for table row
const TABLE_ROW: QName = QName(b"table:table-row");
/// XML element name for table cell
const TABLE_CELL: QName = QName(b"table:table-cell");
/// XML element name for cell hidden under a merged cell
const TABLE_COVERED_CELL: QName = QName(b"table:covered-table-cell");
/// XML element name for cell comment
const ANNOTATION: QName = QName(b"office:annotation");
/// XML element name for text paragraph
const PARAGRAPH: QName = QName(b"text:p");
/// XML element name for run of spaces
const SPACES: QName = QName(b"text:s");
/// XML element name for tab character
const TAB: QName = QName(b"text:tab");
/// XML element name for line break
const LINE_BREAK: QName = QName(b"text:line-break");
/// XML element name for manifest file entry
const FILE_ENTRY: QName = QName(b"manifest:file-entry");
/// XML element name for manifest encryption data
const ENCRYPTION_DATA: QName = QName(b"manifest:encryption-data");

pub(crate) fn probe(input: &Input) -> bool {
    open_archive(input)
        .and_then(|mut zip| zip.read_entry("mimetype"))
        .map(|mimetype| mimetype.is_some_and(|bytes| bytes.trim_ascii() == MIME_TYPE))
        .unwrap_or(false)
}

pub(crate) struct OdsWorkbook {
    names: Vec<String>,
    reader: PartReader,
    tables_seen: usize,
    in_table: bool,
    /// Rows of the open table so far, repeats included.
    rows_seen: usize,
    /// Blank rows seen since the last stored one, dropped if the table ends first.
    blank_rows: usize,
    /// Blank rows still to hand out before `repeated`.
    queued_blank_rows: usize,
    /// A stored row and how many more copies of it are due.
    repeated: Option<(Vec<Cell>, usize)>,
}

impl OdsWorkbook {
    pub(crate) fn load(input: &Input) -> Result<OdsWorkbook> {
        let mut zip = open_archive(input)?;
        if let Some(mimetype) = zip.read_entry("mimetype")? {
            if mimetype.trim_ascii() != MIME_TYPE {
                Err(SpreadsheetError::MimeType(String::from_utf8_lossy(&mimetype).into_owned()))?
            }
        }
        if is_password_protected(&mut zip)? {
            Err(SpreadsheetError::PasswordProtected)?
        }
        let content = zip
            .read_entry(CONTENT_PATH)?
            .ok_or_else(|| SpreadsheetError::MissingPart(CONTENT_PATH.to_owned()))?;
        let names = load_table_names(&content)?;
        Ok(OdsWorkbook {
            names,
            reader: XmlReader::new(Cursor::new(content)),
            tables_seen: 0,
            in_table: false,
            rows_seen: 0,
            blank_rows: 0,
            queued_blank_rows: 0,
            repeated: None,
        })
    }
}

impl Spreadsheet for OdsWorkbook {
    fn sheet_names(&self) -> &[String] {
        &self.names
    }

    fn date_system(&self) -> DateSystem {
        DateSystem::V1900
    }

    fn open_sheet(&mut self, index: usize) -> Result<()> {
        self.rows_seen = 0;
        self.blank_rows = 0;
        self.queued_blank_rows = 0;
        self.repeated = None;
        let reader = &mut self.reader;
        for_each_xml_event!(reader => {
            Event::Start(event) if event.name() == TABLE => {
                self.tables_seen += 1;
                if self.tables_seen == index + 1 {
                    self.in_table = true;
                    return Ok(());
                }
                reader.skip_element(TABLE)?;
            }
        });
        Err(SpreadsheetError::MissingPart(format!("table {}", index + 1)).into())
    }

    fn next_row(&mut self) -> Result<Option<Vec<Cell>>> {
        if let Some(row) = take_queued(&mut self.queued_blank_rows, &mut self.repeated) {
            return Ok(Some(row));
        }
        if !self.in_table {
            return Ok(None);
        }
        let reader = &mut self.reader;
        for_each_xml_event!(reader => {
            Event::Start(event) if event.name() == TABLE_ROW => {
                let repeat = event
                    .parse_attribute::<usize>("table:number-rows-repeated")?
                    .unwrap_or(1)
                    .min(MAX_ROWS - self.rows_seen);
                self.rows_seen += repeat;
                let cells = read_row(reader)?;
                if cells.is_empty() {
                    self.blank_rows += repeat;
                    continue;
                }
                if repeat == 0 {
                    continue;
                }
                self.queued_blank_rows = std::mem::take(&mut self.blank_rows);
                self.repeated = Some((cells, repeat));
                return Ok(take_queued(&mut self.queued_blank_rows, &mut self.repeated));
            }
            Event::End(event) if event.name() == TABLE => break,
        });
        self.in_table = false;
        Ok(None)
    }

    fn sheet_rows(&mut self, _index: usize) -> Result<Option<u64>> {
        Ok(None)
    }
}

/// The next row owed by an earlier `<table:table-row>`: blank rows first, then copies of a repeated row.
fn take_queued(blank_rows: &mut usize, repeated: &mut Option<(Vec<Cell>, usize)>) -> Option<Vec<Cell>> {
    if *blank_rows > 0 {
        *blank_rows -= 1;
        return Some(Vec::new());
    }
    match repeated.take() {
        Some((cells, remaining)) if remaining > 1 => {
            let row = cells.clone();
            *repeated = Some((cells, remaining - 1));
            Some(row)
        }
        Some((cells, 1)) => Some(cells),
        _ => None,
    }
}

fn is_password_protected(zip: &mut impl ZipLookup) -> Result<bool> {
    let Some(mut reader) = zip.xml_entry("META-INF/manifest.xml")? else {
        return Ok(false);
    };
    let mut in_file_entry = false;
    for_each_xml_event!(reader => {
        Event::Start(event) if event.name() == FILE_ENTRY => in_file_entry = true,
        Event::End(event) if event.name() == FILE_ENTRY => in_file_entry = false,
        Event::Start(event) if in_file_entry && event.name() == ENCRYPTION_DATA => return Ok(true),
    });
    Ok(false)
}

fn load_table_names(content: &[u8]) -> Result<Vec<String>> {
    let mut reader = XmlReader::new(content);
    let mut names = Vec::new();
    for_each_xml_event!(reader => {
        Event::Start(event) if event.name() == TABLE => {
            names.push(event.attribute("table:name")?.unwrap_or_else(|| format!("Sheet{}", names.len() + 1)));
            reader.skip_element(TABLE)?;
        }
    });
    Ok(names)
}

/// Stored cells of the row whose start tag was just read.
fn read_row(reader: &mut PartReader) -> Result<Vec<Cell>> {
    let mut cells = Vec::new();
    let mut col = 0usize;
    for_each_xml_event!(reader => {
        Event::Start(event) if event.name() == TABLE_CELL || event.name() == TABLE_COVERED_CELL => {
            let covered = event.name() == TABLE_COVERED_CELL;
            let repeat = event
                .parse_attribute::<usize>("table:number-columns-repeated")?
                .unwrap_or(1)
                .min(MAX_COLUMNS - col);
            let stored = StoredValue::read(&event)?;
            let text = read_cell_text(reader, if covered { TABLE_COVERED_CELL } else { TABLE_CELL })?;
            if let Some(cell) = stored.filter(|_| !covered).and_then(|stored| stored.into_cell(col, text)) {
                for offset in 0..repeat {
                    cells.push(Cell { col: col + offset, ..cell.clone() });
                }
            }
            col += repeat;
        }
        Event::End(event) if event.name() == TABLE_ROW => break,
    });
    Ok(cells)
}

/// The typed value a cell's attributes carry.
struct StoredValue {
    kind: CellType,
    value: Option<String>,
}

impl StoredValue {
    fn read(event: &BytesStart) -> Result<Option<StoredValue>> {
        if event.attribute("calcext:value-type")?.as_deref() == Some("error") {
            return Ok(Some(StoredValue { kind: CellType::Error, value: None }));
        }
        let (kind, attribute) = match event.attribute("office:value-type")?.as_deref() {
            Some("float") | Some("percentage") | Some("currency") => (CellType::Number, "office:value"),
            Some("boolean") => (CellType::Boolean, "office:boolean-value"),
            Some("date") => (CellType::IsoDateTime, "office:date-value"),
            Some("time") => (CellType::IsoDuration, "office:time-value"),
            Some("string") => (CellType::Text, "office:string-value"),
            _ => (CellType::Text, ""),
        };
        let value = match attribute {
            "" => None,
            name => event.attribute(name)?,
        };
        Ok(Some(StoredValue { kind, value }))
    }

    /// The cell, `None` when it holds nothing.
    fn into_cell(self, col: usize, text: String) -> Option<Cell> {
        match (self.kind, self.value) {
            (CellType::Text | CellType::Error, stored) => {
                let value = stored.filter(|value| !value.is_empty()).unwrap_or(text);
                (!value.is_empty()).then(|| Cell::new(col, self.kind, value))
            }
            (CellType::Boolean, Some(flag)) => {
                let value = if flag == "true" || flag == "1" { "1" } else { "0" };
                Some(Cell { display: Some(text).filter(|text| !text.is_empty()), ..Cell::new(col, CellType::Boolean, value) })
            }
            (kind, Some(value)) => Some(Cell { display: Some(text).filter(|text| !text.is_empty()), ..Cell::new(col, kind, value) }),
            (_, None) => (!text.is_empty()).then(|| Cell::new(col, CellType::Text, text)),
        }
    }
}

/// Paragraph text up to `end_tag`, annotations excluded.
fn read_cell_text(reader: &mut PartReader, end_tag: QName) -> Result<String> {
    let mut text = String::new();
    let mut paragraphs = 0usize;
    for_each_xml_event!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == ANNOTATION => reader.skip_element(ANNOTATION)?,
        Event::Start(event) if event.name() == PARAGRAPH => {
            if paragraphs > 0 {
                text.push('\n');
            }
            paragraphs += 1;
        }
        Event::Start(event) if event.name() == SPACES => {
            let count = event.parse_attribute::<usize>("text:c")?.unwrap_or(1);
            text.extend(std::iter::repeat(' ').take(count));
        }
        Event::Start(event) if event.name() == TAB => text.push('\t'),
        Event::Start(event) if event.name() == LINE_BREAK => text.push('\n'),
        Event::Text(event) => text.push_text(&event)?,
        Event::GeneralRef(event) => text.push_reference(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells_of(row: &str) -> Vec<Cell> {
        let xml = format!(
            "<table:table-row xmlns:table=\"t\" xmlns:text=\"x\" xmlns:office=\"o\">{}</table:table-row>",
            row
        );
        let mut reader = XmlReader::new(Cursor::new(xml.into_bytes()));
        reader.next().unwrap();
        read_row(&mut reader).unwrap()
    }

    #[test]
    fn repeated_and_covered_cells() {
        let cells = cells_of(concat!(
            "<table:table-cell office:value-type=\"float\" office:value=\"7\" table:number-columns-repeated=\"2\"><text:p>7</text:p></table:table-cell>",
            "<table:covered-table-cell/>",
            "<table:table-cell/>",
            "<table:table-cell office:value-type=\"string\"><text:p>end</text:p></table:table-cell>",
            "<table:table-cell table:number-columns-repeated=\"1000\"/>",
        ));
        let summary: Vec<(usize, &str)> = cells.iter().map(|cell| (cell.col, cell.value.as_str())).collect();
        assert_eq!(summary, vec![(0, "7"), (1, "7"), (4, "end")]);
    }

    fn workbook_of(table: &str) -> OdsWorkbook {
        let xml = format!(
            "<office:document-content xmlns:table=\"t\" xmlns:text=\"x\" xmlns:office=\"o\"><table:table table:name=\"Only\">{}</table:table></office:document-content>",
            table
        );
        OdsWorkbook {
            names: vec!["Only".to_owned()],
            reader: XmlReader::new(Cursor::new(xml.into_bytes())),
            tables_seen: 0,
            in_table: false,
            rows_seen: 0,
            blank_rows: 0,
            queued_blank_rows: 0,
            repeated: None,
        }
    }

    #[test]
    fn column_repeats_stop_at_the_last_column() {
        let cells = cells_of(concat!(
            "<table:table-cell office:value-type=\"string\"><text:p>first</text:p></table:table-cell>",
            "<table:table-cell office:value-type=\"string\" table:number-columns-repeated=\"100000000\"><text:p>x</text:p></table:table-cell>",
            "<table:table-cell office:value-type=\"string\"><text:p>beyond</text:p></table:table-cell>",
        ));
        assert_eq!(cells.len(), MAX_COLUMNS);
        assert_eq!(cells.last().map(|cell| cell.col), Some(MAX_COLUMNS - 1));
        assert!(cells.iter().all(|cell| cell.value != "beyond"));
    }

    #[test]
    fn blank_rows_between_stored_rows() {
        let mut workbook = workbook_of(concat!(
            "<table:table-row><table:table-cell office:value-type=\"string\"><text:p>a</text:p></table:table-cell></table:table-row>",
            "<table:table-row table:number-rows-repeated=\"2\"><table:table-cell/></table:table-row>",
            "<table:table-row table:number-rows-repeated=\"2\"><table:table-cell office:value-type=\"string\"><text:p>b</text:p></table:table-cell></table:table-row>",
            "<table:table-row table:number-rows-repeated=\"1000\"><table:table-cell/></table:table-row>",
        ));
        workbook.open_sheet(0).unwrap();
        let mut rows = Vec::new();
        while let Some(row) = workbook.next_row().unwrap() {
            rows.push(row.into_iter().map(|cell| cell.value).collect::<Vec<_>>());
        }
        let expected: Vec<Vec<String>> = vec![vec!["a".into()], vec![], vec![], vec!["b".into()], vec!["b".into()]];
        assert_eq!(rows, expected);
    }

    #[test]
    fn row_repeats_stop_at_the_last_row() {
        let mut workbook = workbook_of(concat!(
            "<table:table-row table:number-rows-repeated=\"2000000000\"><table:table-cell office:value-type=\"string\"><text:p>x</text:p></table:table-cell></table:table-row>",
            "<table:table-row><table:table-cell office:value-type=\"string\"><text:p>beyond</text:p></table:table-cell></table:table-row>",
        ));
        workbook.open_sheet(0).unwrap();
        let mut count = 0;
        while let Some(row) = workbook.next_row().unwrap() {
            assert_eq!(row[0].value, "x");
            count += 1;
        }
        assert_eq!(count, MAX_ROWS);
    }

    #[test]
    fn paragraph_text() {
        let cells = cells_of(concat!(
            "<table:table-cell office:value-type=\"string\">",
            "<office:annotation><text:p>note</text:p></office:annotation>",
            "<text:p>two<text:s text:c=\"3\"/>words</text:p><text:p>line &amp; more</text:p>",
            "</table:table-cell>",
        ));
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].value, "two   words\nline & more");
    }

    #[test]
    fn typed_values_keep_display_text() {
        let cells = cells_of(concat!(
            "<table:table-cell office:value-type=\"percentage\" office:value=\"0.125\"><text:p>12.5%</text:p></table:table-cell>",
            "<table:table-cell office:value-type=\"boolean\" office:boolean-value=\"true\"><text:p>TRUE</text:p></table:table-cell>",
            "<table:table-cell office:value-type=\"time\" office:time-value=\"PT13H30M00S\"><text:p>13:30</text:p></table:table-cell>",
            "<table:table-cell office:value-type=\"string\" calcext:value-type=\"error\"><text:p>#DIV/0!</text:p></table:table-cell>",
        ));
        let kinds: Vec<CellType> = cells.iter().map(|cell| cell.kind).collect();
        assert_eq!(kinds, vec![CellType::Number, CellType::Boolean, CellType::IsoDuration, CellType::Error]);
        assert_eq!(cells[0].value, "0.125");
        assert_eq!(cells[0].display.as_deref(), Some("12.5%"));
        assert_eq!(cells[1].value, "1");
        assert_eq!(cells[3].value, "#DIV/0!");
    }
}
