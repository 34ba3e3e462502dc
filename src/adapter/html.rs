//! Rows of HTML tables: every `<tr>` is a row, its `<td>`/`<th>` children the cells.

use crate::adapter::columns_of;
use crate::adapter::convert_cell;
use crate::adapter::FormatAdapter;
use crate::adapter::RawRow;
use crate::convert::Converter;
use crate::error::Result;
use crate::error::ResultMessage;
use crate::format::column::Column;
use crate::format::Format;
use crate::helpers::reader::Input;
use crate::helpers::text::first_non_blank_line;
use crate::helpers::xml::resolve_char_reference;
use crate::helpers::xml::XmlReader;
use crate::value::Row;
use crate::value::Value;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::collections::VecDeque;

/// Content of a cell while it is being read.
#[derive(Default)]
struct CellText {
    text: String,
    has_children: bool,
    seen_element: bool,
    href: Option<String>,
}

impl CellText {
    /// Links win over text; a cell with no content at all is null.
    fn into_value(self) -> Value {
        if let Some(href) = self.href {
            Value::Text(href)
        } else if self.has_children {
            Value::Text(self.text.split_whitespace().collect::<Vec<_>>().join(" "))
        } else {
            Value::Null
        }
    }
}

#[derive(Default)]
pub struct HtmlTableAdapter {
    rows: VecDeque<Vec<Value>>,
    columns: HashMap<String, Column>,
    total: u64,
}

impl HtmlTableAdapter {
    pub fn new() -> HtmlTableAdapter {
        HtmlTableAdapter::default()
    }
}

fn is_cell(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(b"td") || name.eq_ignore_ascii_case(b"th")
}

fn is_raw_text(name: &[u8]) -> bool {
    name.eq_ignore_ascii_case(b"script") || name.eq_ignore_ascii_case(b"style")
}

fn href_of(element: &BytesStart) -> Option<String> {
    element
        .html_attributes()
        .with_checks(false)
        .filter_map(|attribute| attribute.ok())
        .find(|attribute| attribute.key.local_name().as_ref().eq_ignore_ascii_case(b"href"))
        .and_then(|attribute| attribute.unescape_value().ok().map(|value| value.into_owned()))
}

/// HTML allows far more entities than XML; the common ones are resolved, others kept verbatim.
fn resolve_html_entity(raw: &str) -> String {
    if let Some(character) = resolve_char_reference(raw) {
        return character.to_string();
    }
    if let Some(entity) = resolve_xml_entity(raw) {
        return entity.to_owned();
    }
    match raw {
        "nbsp" => "\u{A0}".to_owned(),
        "copy" => "\u{A9}".to_owned(),
        "reg" => "\u{AE}".to_owned(),
        "euro" => "\u{20AC}".to_owned(),
        "ndash" => "\u{2013}".to_owned(),
        "mdash" => "\u{2014}".to_owned(),
        _ => format!("&{};", raw),
    }
}

/// A `<tr>` not yet closed, with the slot its row takes in document order.
struct OpenRow {
    slot: usize,
    /// Table nesting depth the row belongs to.
    depth: usize,
    cells: Vec<Value>,
    cell: Option<CellText>,
}

impl OpenRow {
    fn finish_cell(&mut self) {
        if let Some(open) = self.cell.take() {
            self.cells.push(open.into_value());
        }
    }
}

/// Closes the open rows that belong to tables at `depth` or deeper.
fn close_rows(open: &mut Vec<OpenRow>, rows: &mut [Option<Vec<Value>>], depth: usize) {
    while open.last().is_some_and(|row| row.depth >= depth) {
        if let Some(mut row) = open.pop() {
            row.finish_cell();
            rows[row.slot] = Some(row.cells);
        }
    }
}

/// The open row whose cells sit directly in the table at `depth`.
fn current_row(open: &mut [OpenRow], depth: usize) -> Option<&mut OpenRow> {
    open.last_mut().filter(|row| row.depth == depth)
}

/// Parses every table row of the document, nested tables included.
///
/// Rows come out in the order their `<tr>` opens. A cell holding a nested
/// table reads as the text of all its descendants.
fn read_rows(input: &Input) -> Result<VecDeque<Vec<Value>>> {
    let mut reader = XmlReader::html(input.reader()?);
    let mut rows: Vec<Option<Vec<Value>>> = Vec::new();
    let mut open: Vec<OpenRow> = Vec::new();
    let mut table_depth = 0usize;
    let mut raw_text_depth = 0usize;

    while let Some(event) = reader.next()? {
        match event {
            Event::Start(start) => {
                let name = start.local_name();
                let name = name.as_ref();
                if is_raw_text(name) {
                    raw_text_depth += 1;
                } else if name.eq_ignore_ascii_case(b"tr") {
                    // An unclosed row of the same table ends here.
                    close_rows(&mut open, &mut rows, table_depth);
                    open.push(OpenRow { slot: rows.len(), depth: table_depth, cells: Vec::new(), cell: None });
                    rows.push(None);
                } else if is_cell(name) {
                    if let Some(row) = current_row(&mut open, table_depth) {
                        row.finish_cell();
                        row.cell = Some(CellText::default());
                    }
                    // Keeps nested cell texts apart inside enclosing cells.
                    for cell in open.iter_mut().filter_map(|row| row.cell.as_mut()) {
                        cell.text.push(' ');
                    }
                } else {
                    if let Some(cell) = current_row(&mut open, table_depth).and_then(|row| row.cell.as_mut()) {
                        cell.has_children = true;
                        if name.eq_ignore_ascii_case(b"br") {
                            cell.text.push(' ');
                        }
                        if !cell.seen_element {
                            cell.seen_element = true;
                            cell.href = href_of(&start);
                        }
                    }
                    if name.eq_ignore_ascii_case(b"table") {
                        table_depth += 1;
                    }
                }
            }
            Event::End(end) => {
                let name = end.local_name();
                let name = name.as_ref();
                if is_raw_text(name) {
                    raw_text_depth = raw_text_depth.saturating_sub(1);
                } else if is_cell(name) {
                    if let Some(row) = current_row(&mut open, table_depth) {
                        row.finish_cell();
                    }
                } else if name.eq_ignore_ascii_case(b"tr") {
                    close_rows(&mut open, &mut rows, table_depth);
                } else if name.eq_ignore_ascii_case(b"table") {
                    close_rows(&mut open, &mut rows, table_depth);
                    table_depth = table_depth.saturating_sub(1);
                }
            }
            Event::Text(text) if raw_text_depth == 0 => {
                push_text(&mut open, &text.xml_content()?);
            }
            Event::CData(data) if raw_text_depth == 0 => {
                push_text(&mut open, &data.xml_content()?);
            }
            Event::GeneralRef(reference) if raw_text_depth == 0 => {
                push_text(&mut open, &resolve_html_entity(&reference.xml_content()?));
            }
            _ => (),
        }
    }
    close_rows(&mut open, &mut rows, 0);
    Ok(rows.into_iter().flatten().collect())
}

/// Character data belongs to every enclosing open cell.
fn push_text(open: &mut [OpenRow], text: &str) {
    for cell in open.iter_mut().filter_map(|row| row.cell.as_mut()) {
        cell.has_children = true;
        cell.text.push_str(text);
    }
}

impl FormatAdapter for HtmlTableAdapter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn supports(&self, input: &Input, _name: &str, _format: Option<&Format>) -> bool {
        first_non_blank_line(input)
            .map(|line| line.starts_with("<!doctypehtml>") || line.starts_with("<html"))
            .unwrap_or(false)
    }

    fn open(&mut self, input: &Input, name: &str, format: Option<&Format>) -> Result<()> {
        self.close();
        self.rows = read_rows(input).with_prefix(&format!("Could not parse HTML file '{}'", name))?;
        self.total = self.rows.len() as u64;
        self.columns = columns_of(format);
        Ok(())
    }

    fn next_raw_row(&mut self, converter: Option<&dyn Converter>) -> Result<RawRow> {
        let Some(cells) = self.rows.pop_front() else {
            return Ok(RawRow::EndOfInput);
        };
        let mut row = Row::with_capacity(cells.len());
        for (index, value) in cells.into_iter().enumerate() {
            let key = (index + 1).to_string();
            let value = convert_cell(value, &key, &self.columns, converter);
            row.insert(key, value);
        }
        Ok(RawRow::Row(row))
    }

    fn estimate_total_rows(&self) -> Option<u64> {
        Some(self.total)
    }

    fn close(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Prices</title>
<script>var total = 0;</script><style>td { color: red; }</style></head>
<body>
<table>
  <tr><th>Item</th><th>Price</th><th>Link</th></tr>
  <tr><td>Tea &amp; cakes</td><td> 4.50 </td><td><a href="/tea">tea</a></td></tr>
  <tr><td>Coffee&nbsp;beans<br>dark</td><td></td><td>none</td></tr>
</table>
</body>
</html>"#;

    fn rows(adapter: &mut HtmlTableAdapter) -> Vec<Row> {
        let mut rows = Vec::new();
        while let RawRow::Row(row) = adapter.next_raw_row(None).unwrap() {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn reads_table_rows() {
        let input = Input::memory(PAGE.as_bytes().to_vec());
        let mut adapter = HtmlTableAdapter::new();
        assert!(adapter.supports(&input, "prices.html", None));
        adapter.open(&input, "prices.html", None).unwrap();
        assert_eq!(adapter.estimate_total_rows(), Some(3));

        let rows = rows(&mut adapter);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("1"), Some(&Value::from("Item")));
        assert_eq!(rows[1].get("1"), Some(&Value::from("Tea & cakes")));
        assert_eq!(rows[1].get("2"), Some(&Value::from("4.50")));
        assert_eq!(rows[1].get("3"), Some(&Value::from("/tea")));
        assert_eq!(rows[2].get("1"), Some(&Value::from("Coffee beans dark")));
        assert_eq!(rows[2].get("2"), Some(&Value::Null));
        assert_eq!(adapter.next_raw_row(None).unwrap(), RawRow::EndOfInput);
    }

    #[test]
    fn nested_tables_keep_the_outer_row_open() {
        let page = concat!(
            "<html><body><table>",
            "<tr><td>outer</td><td><table><tr><td>inner</td><td>cell</td></tr></table></td><td>after</td></tr>",
            "<tr><td>next</td></tr>",
            "</table></body></html>",
        );
        let input = Input::memory(page.as_bytes().to_vec());
        let mut adapter = HtmlTableAdapter::new();
        adapter.open(&input, "nested.html", None).unwrap();

        let rows = rows(&mut adapter);
        let texts: Vec<Vec<String>> = rows
            .iter()
            .map(|row| row.values().map(Value::to_string).collect())
            .collect();
        assert_eq!(
            texts,
            vec![
                vec!["outer".to_owned(), "inner cell".to_owned(), "after".to_owned()],
                vec!["inner".to_owned(), "cell".to_owned()],
                vec!["next".to_owned()],
            ]
        );
    }

    #[test]
    fn unclosed_rows_end_at_the_next_row() {
        let page = "<html><table><tr><td>a<td>b<tr><td>c</table></html>";
        let input = Input::memory(page.as_bytes().to_vec());
        let mut adapter = HtmlTableAdapter::new();
        adapter.open(&input, "loose.html", None).unwrap();

        let rows = rows(&mut adapter);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("2"), Some(&Value::from("b")));
        assert_eq!(rows[1].get("1"), Some(&Value::from("c")));
    }

    #[test]
    fn supports_html_only() {
        let adapter = HtmlTableAdapter::new();
        assert!(adapter.supports(&Input::memory(b"\n  <HTML lang=en>".to_vec()), "a", None));
        assert!(!adapter.supports(&Input::memory(b"id,name\n".to_vec()), "a", None));
        assert!(!adapter.supports(&Input::memory(b"".to_vec()), "a", None));
    }
}
