use chrono::NaiveDate;
use rusty_lines::open_path;
use rusty_lines::Column;
use rusty_lines::Error;
use rusty_lines::Format;
use rusty_lines::Row;
use rusty_lines::RowEngine;
use rusty_lines::Value;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn read_all(engine: RowEngine) -> Vec<Row> {
    engine.collect::<rusty_lines::Result<Vec<_>>>().unwrap()
}

fn open(path: &Path, format: Format) -> RowEngine {
    open_path(path, Some(format)).unwrap()
}

#[test]
fn csv_columns_are_named_from_the_header() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "people.csv", "First Name,Age,age\nAda,36,x\nAlan,41,y\n");

    let engine = open_path(&path, None).unwrap();
    let names: Vec<&str> = engine.format().columns().iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, vec!["first_name", "age", "age_2"]);
    assert_eq!(engine.format().header_lines(), 1);

    let rows = read_all(engine);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("1"), Some(&Value::from("Ada")));
    assert_eq!(rows[1].get("2"), Some(&Value::from("41")));
}

#[test]
fn csv_values_take_their_column_types() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "orders.csv",
        "id;placed;total;paid\n1;2024-03-01;19.5;yes\n2;2024-03-02;n/a;no\n",
    );
    let format = Format::builder()
        .column_separator_chars([';'])
        .column(Column::builder("id").type_tag("long").build().unwrap())
        .column(Column::builder("placed").type_tag("date").build().unwrap())
        .column(Column::builder("total").type_tag("double").build().unwrap())
        .column(Column::builder("paid").type_tag("boolean").build().unwrap())
        .build()
        .unwrap();

    let rows = read_all(open(&path, format));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("1"), Some(&Value::Integer(1)));
    assert_eq!(rows[0].get("2"), Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())));
    assert_eq!(rows[0].get("3"), Some(&Value::Float(19.5)));
    assert_eq!(rows[0].get("4"), Some(&Value::Boolean(true)));
    // An unconvertible cell keeps its raw text.
    assert_eq!(rows[1].get("3"), Some(&Value::from("n/a")));
}

#[test]
fn raw_text_when_conversion_is_off() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "ids.csv", "id\n7\n");
    let format = Format::builder()
        .convert_types(false)
        .column(Column::builder("id").type_tag("long").build().unwrap())
        .build()
        .unwrap();

    let rows = read_all(open(&path, format));
    assert_eq!(rows[0].get("1"), Some(&Value::from("7")));
}

#[test]
fn tsv_with_footer_and_blank_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "report.tsv", "name\tscore\nA\t1\n\n \t \nB\t2\nTotal\t3\n");
    let format = Format::builder().footer_lines(1).build().unwrap();

    let rows = read_all(open(&path, format));
    let names: Vec<String> = rows.iter().map(|row| row.get("1").unwrap().to_string()).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[test]
fn footer_on_last_line_without_newline() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "people.csv", "id,name\n1,Alice\n\n2,Bob\nTOTAL,2");
    let format = Format::builder()
        .column_separator_chars([','])
        .header_lines(1)
        .footer_lines(1)
        .build()
        .unwrap();

    let rows = read_all(open(&path, format));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("1"), Some(&Value::from("1")));
    assert_eq!(rows[0].get("2"), Some(&Value::from("Alice")));
    assert_eq!(rows[1].get("1"), Some(&Value::from("2")));
    assert_eq!(rows[1].get("2"), Some(&Value::from("Bob")));
}

#[test]
fn blank_lines_kept_when_asked() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "gaps.csv", "a,b\n1,2\n,\n3,4\n");
    let format = Format::builder().ignore_blank_lines(false).build().unwrap();

    let rows = read_all(open(&path, format));
    assert_eq!(rows.len(), 3);
    assert!(rows[1].is_blank());
}

#[test]
fn defaults_fill_missing_cells() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "cities.csv", "city,country\nOslo,NO\nParis\nRome,\n");
    let format = Format::builder()
        .column(Column::new("city"))
        .column(Column::builder("country").default_value("unknown").build().unwrap())
        .build()
        .unwrap();

    let rows = read_all(open(&path, format));
    let countries: Vec<String> = rows.iter().map(|row| row.get("2").unwrap().to_string()).collect();
    assert_eq!(countries, vec!["NO", "unknown", "unknown"]);
}

#[test]
fn fixed_width_columns_by_range() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "ledger.txt", "CODE AMOUNT\nAB1    120\nCD2     75\n");
    let format = Format::builder()
        .column(Column::builder("code").location("[1-3]").build().unwrap())
        .column(Column::builder("amount").location("[5-]").type_tag("long").build().unwrap())
        .build()
        .unwrap();

    let engine = open(&path, format);
    assert_eq!(engine.column("[5,-1]").map(|column| column.name.as_str()), Some("amount"));
    let rows = read_all(engine);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("[1,3]"), Some(&Value::from("AB1")));
    assert_eq!(rows[0].get("[5,-1]"), Some(&Value::Integer(120)));
    assert_eq!(rows[1].get("[5,-1]"), Some(&Value::Integer(75)));
}

#[test]
fn html_tables_are_read_cell_by_cell() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "prices.html",
        "<html><body><table>\n<tr><th>Item</th><th>Price</th></tr>\n<tr><td>Tea</td><td>4</td></tr>\n<tr><td>Jam</td><td>3</td></tr>\n</table></body></html>\n",
    );

    let engine = open_path(&path, None).unwrap();
    assert_eq!(engine.estimate_total_rows(), Some(3));
    let names: Vec<&str> = engine.format().columns().iter().map(|column| column.name.as_str()).collect();
    assert_eq!(names, vec!["item", "price"]);

    let rows = read_all(engine);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("1"), Some(&Value::from("Jam")));
}

#[test]
fn estimate_follows_line_lengths() {
    let mut file = NamedTempFile::new().unwrap();
    for index in 0..100 {
        writeln!(file, "{:04},value", index).unwrap();
    }
    let format = Format::builder().header_lines(0).build().unwrap();

    let mut engine = open(file.path(), format);
    assert!(engine.has_more().unwrap());
    let estimate = engine.estimate_total_rows().unwrap();
    assert!((90..=110).contains(&estimate), "estimate was {}", estimate);
    assert_eq!(engine.count(), 100);
}

#[test]
fn exhausted_engine_reports_it() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "one.csv", "a\n1\n");

    let mut engine = open_path(&path, None).unwrap();
    assert!(engine.take_next().is_ok());
    assert!(!engine.has_more().unwrap());
    assert!(matches!(engine.take_next(), Err(Error::Exhausted)));
    assert!(engine.is_closed());
}

#[test]
fn missing_file_names_the_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.csv");

    let Err(Error::Source(message)) = open_path(&path, None) else {
        panic!("expected a source error");
    };
    assert!(message.starts_with(&path.display().to_string()));
}
