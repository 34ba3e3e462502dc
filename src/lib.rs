//! # rusty_lines
//!
//! Streams rows out of tabular sources through one pull-based interface.
//!
//! A [`RowEngine`] drives a [`FormatAdapter`] and applies the rules a [`Format`]
//! describes: header and footer rows are dropped per section, blank rows are
//! skipped, column defaults are filled in and cell values are coerced to the
//! column types by a [`Converter`].
//!
//! ## Sources
//!
//! - Delimited text (CSV, TSV and friends), with the separator detected from the first line
//! - Fixed-width text, sliced by `[start,end]` column locations
//! - HTML tables
//! - Workbooks: `.xlsx`, `.xls` and `.ods`, one section per sheet
//!
//! ```no_run
//! use rusty_lines::open_path;
//!
//! # fn main() -> rusty_lines::Result<()> {
//! for row in open_path("prices.csv", None)? {
//!     let row = row?;
//!     println!("{:?}", row.get("1"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod convert;
pub mod engine;
pub mod error;
pub mod format;
mod helpers;
pub mod selection;
pub mod spreadsheet;
pub mod value;

pub use adapter::FormatAdapter;
pub use adapter::RawRow;
pub use convert::Converter;
pub use convert::StandardConverter;
pub use engine::RowEngine;
pub use error::Error;
pub use error::Result;
pub use format::column::Column;
pub use format::location::Location;
pub use format::Format;
pub use format::FormatBuilder;
pub use helpers::reader::Input;
pub use helpers::reader::SourceReader;
pub use selection::open_path;
pub use selection::open_reader;
pub use selection::AdapterKind;
pub use value::Row;
pub use value::Value;
