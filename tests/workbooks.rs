use chrono::NaiveDate;
use rusty_lines::open_reader;
use rusty_lines::Column;
use rusty_lines::Error;
use rusty_lines::Format;
use rusty_lines::Input;
use rusty_lines::Row;
use rusty_lines::RowEngine;
use rusty_lines::Value;
use std::io::Cursor;
use std::io::Write;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<workbookPr/>
<sheets><sheet name="Orders" sheetId="1" r:id="rId1"/><sheet name="Notes" sheetId="2" r:id="rId2"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy\-mm\-dd"/></numFmts>
<cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="164" applyNumberFormat="1"/></cellXfs>
</styleSheet>"#;

const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
<si><t>id</t></si><si><t>placed</t></si><si><r><t>fir</t></r><r><t>st</t></r></si>
</sst>"#;

const ORDERS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1:C3"/>
<sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>note</t></is></c></row>
<row r="2"><c r="A2"><v>1</v></c><c r="B2" s="1"><v>45352</v></c><c r="C2" t="s"><v>2</v></c></row>
<row r="3"><c r="A3"><v>2</v></c><c r="B3" s="1"><v>45353</v></c></row>
</sheetData>
</worksheet>"#;

const NOTES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1:B2"/>
<sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>text</t></is></c></row>
<row r="2"><c r="B2" t="str"><v>hello</v></c></row>
</sheetData>
</worksheet>"#;

fn xlsx() -> Input {
    Input::memory(archive(&[
        ("[Content_Types].xml", "<Types/>"),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/styles.xml", STYLES),
        ("xl/sharedStrings.xml", SHARED_STRINGS),
        ("xl/worksheets/sheet1.xml", ORDERS),
        ("xl/worksheets/sheet2.xml", NOTES),
    ]))
}

const OUT_OF_RANGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
<row r="1"><c r="A1" t="inlineStr"><is><t>name</t></is></c></row>
<row r="2"><c r="ZZZZZZZZ2" t="inlineStr"><is><t>x</t></is></c></row>
</sheetData>
</worksheet>"#;

const CONTENT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" "#,
    r#"xmlns:table="urn:oasis:names:tc:opendocument:xmlns:table:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0">"#,
    "<office:body><office:spreadsheet>",
    r#"<table:table table:name="People">"#,
    r#"<table:table-row><table:table-cell office:value-type="string"><text:p>name</text:p></table:table-cell>"#,
    r#"<table:table-cell office:value-type="string"><text:p>born</text:p></table:table-cell></table:table-row>"#,
    r#"<table:table-row><table:table-cell office:value-type="string"><text:p>Ada</text:p></table:table-cell>"#,
    r#"<table:table-cell office:value-type="date" office:date-value="1815-12-10"><text:p>10/12/1815</text:p></table:table-cell></table:table-row>"#,
    r#"<table:table-row table:number-rows-repeated="2"><table:table-cell office:value-type="float" office:value="3"><text:p>3</text:p></table:table-cell></table:table-row>"#,
    r#"<table:table-row table:number-rows-repeated="1000"><table:table-cell table:number-columns-repeated="2"/></table:table-row>"#,
    "</table:table>",
    r#"<table:table table:name="Empty"></table:table>"#,
    r#"<table:table table:name="Pets">"#,
    r#"<table:table-row><table:table-cell office:value-type="string"><text:p>pet</text:p></table:table-cell></table:table-row>"#,
    r#"<table:table-row><table:table-cell office:value-type="string"><text:p>Rex</text:p></table:table-cell></table:table-row>"#,
    "</table:table>",
    "</office:spreadsheet></office:body></office:document-content>",
);

fn ods() -> Input {
    Input::memory(archive(&[
        ("mimetype", "application/vnd.oasis.opendocument.spreadsheet"),
        ("content.xml", CONTENT),
    ]))
}

fn read_all(engine: RowEngine) -> Vec<Row> {
    engine.collect::<rusty_lines::Result<Vec<_>>>().unwrap()
}

fn date(year: i32, month: u32, day: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(year, month, day).unwrap())
}

fn datetime(year: i32, month: u32, day: u32) -> Value {
    Value::DateTime(NaiveDate::from_ymd_opt(year, month, day).unwrap().and_hms_opt(0, 0, 0).unwrap())
}

#[test]
fn xlsx_first_sheet_with_derived_columns() {
    let engine = open_reader(&xlsx(), "orders.xlsx", None).unwrap();
    assert_eq!(engine.estimate_total_rows(), Some(3));
    let names: Vec<&str> = engine.format().columns().iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, vec!["id", "placed", "note"]);

    let rows = read_all(engine);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("1"), Some(&Value::from("1")));
    assert_eq!(rows[0].get("2"), Some(&Value::from("2024-03-01 00:00:00")));
    assert_eq!(rows[0].get("3"), Some(&Value::from("first")));
    assert_eq!(rows[1].get("3"), None);
}

#[test]
fn xlsx_typed_columns_across_sheets() {
    let format = Format::builder()
        .all_sections()
        .column(Column::builder("id").type_tag("long").build().unwrap())
        .column(Column::builder("placed").type_tag("date").build().unwrap())
        .column(Column::new("note"))
        .build()
        .unwrap();

    let engine = open_reader(&xlsx(), "orders.xlsx", Some(format)).unwrap();
    assert_eq!(engine.estimate_total_rows(), Some(5));

    let rows = read_all(engine);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("1"), Some(&Value::Integer(1)));
    assert_eq!(rows[0].get("2"), Some(&date(2024, 3, 1)));
    assert_eq!(rows[1].get("2"), Some(&date(2024, 3, 2)));
    // A gap before a stored cell reads as null.
    assert_eq!(rows[2].get("1"), Some(&Value::Null));
    assert_eq!(rows[2].get("2"), Some(&Value::from("hello")));
}

#[test]
fn xlsx_source_formatting() {
    let format = Format::builder().apply_source_formatting(true).build().unwrap();

    let rows = read_all(open_reader(&xlsx(), "orders.xlsx", Some(format)).unwrap());
    assert_eq!(rows[0].get("1"), Some(&Value::from("1")));
    assert_eq!(rows[0].get("2"), Some(&Value::from("2024-03-01")));
}

#[test]
fn xlsx_second_sheet_by_selector() {
    let format = Format::builder().section_selector(2).header_lines(0).build().unwrap();

    let rows = read_all(open_reader(&xlsx(), "orders.xlsx", Some(format)).unwrap());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("1"), Some(&Value::from("text")));
}

#[test]
fn missing_sheet_is_reported() {
    let format = Format::builder().section_selector(3).build().unwrap();

    let Err(error) = open_reader(&xlsx(), "orders.xlsx", Some(format)) else {
        panic!("expected an error");
    };
    assert!(matches!(error, Error::SectionNotFound { requested: 3, available: 2 }));
}

#[test]
fn ods_first_table_with_derived_columns() {
    let engine = open_reader(&ods(), "people.ods", None).unwrap();
    assert_eq!(engine.estimate_total_rows(), None);

    let rows = read_all(engine);
    let names: Vec<String> = rows.iter().map(|row| row.get("1").unwrap().to_string()).collect();
    assert_eq!(names, vec!["Ada", "3", "3"]);
    assert_eq!(rows[0].get("2"), Some(&Value::from("1815-12-10 00:00:00")));
}

#[test]
fn ods_tables_are_sections() {
    let format = Format::builder()
        .all_sections()
        .column(Column::new("name"))
        .column(Column::builder("born").type_tag("date").build().unwrap())
        .build()
        .unwrap();

    let rows = read_all(open_reader(&ods(), "people.ods", Some(format)).unwrap());
    let names: Vec<String> = rows.iter().map(|row| row.get("1").unwrap().to_string()).collect();
    assert_eq!(names, vec!["Ada", "3", "3", "Rex"]);
    assert_eq!(rows[0].get("2"), Some(&date(1815, 12, 10)));
}

#[test]
fn ods_source_formatting_uses_display_text() {
    let format = Format::builder().apply_source_formatting(true).convert_types(false).build().unwrap();

    let rows = read_all(open_reader(&ods(), "people.ods", Some(format)).unwrap());
    assert_eq!(rows[0].get("2"), Some(&Value::from("10/12/1815")));
}

#[test]
fn ods_raw_values_without_conversion() {
    let format = Format::builder().convert_types(false).build().unwrap();

    let rows = read_all(open_reader(&ods(), "people.ods", Some(format)).unwrap());
    assert_eq!(rows[0].get("2"), Some(&datetime(1815, 12, 10)));
    assert_eq!(rows[1].get("1"), Some(&Value::Integer(3)));
}

#[test]
fn wrong_container_is_not_a_workbook() {
    let input = Input::memory(archive(&[("readme.txt", "hello")]));
    let Err(error) = open_reader(&input, "notes.zip", None) else {
        panic!("expected an error");
    };
    assert!(matches!(error, Error::AdapterNotFound(_)));
}

#[test]
fn cell_reference_beyond_the_last_column_is_an_error() {
    let input = Input::memory(archive(&[
        ("[Content_Types].xml", "<Types/>"),
        ("xl/workbook.xml", WORKBOOK),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ("xl/styles.xml", STYLES),
        ("xl/sharedStrings.xml", SHARED_STRINGS),
        ("xl/worksheets/sheet1.xml", OUT_OF_RANGE),
        ("xl/worksheets/sheet2.xml", NOTES),
    ]));
    let format = Format::builder().header_lines(0).build().unwrap();
    let result = open_reader(&input, "wide.xlsx", Some(format))
        .and_then(|engine| engine.collect::<rusty_lines::Result<Vec<_>>>());
    let error = result.unwrap_err();
    assert!(error.to_string().contains("Invalid cell reference 'ZZZZZZZZ2'"), "{}", error);
}
