//! The contract every source format implements, plus the pieces adapters share.

pub mod delimited;
pub mod fixed_width;
pub mod html;

use crate::convert::Converter;
use crate::error::Result;
use crate::format::column::Column;
use crate::format::Format;
use crate::helpers::reader::Input;
use crate::value::Row;
use crate::value::Value;
use log::warn;
use std::collections::HashMap;

/// What an adapter hands the engine on each pull.
#[derive(Clone, Debug, PartialEq)]
pub enum RawRow {
    Row(Row),
    /// The current section ended and another one follows.
    SectionBoundary,
    /// Nothing more to read.
    EndOfInput,
}

/// Produces raw rows from one kind of source.
///
/// Adapters own every handle they open and release them in [`close`](Self::close).
pub trait FormatAdapter {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// A cheap probe that leaves the input untouched.
    fn supports(&self, input: &Input, name: &str, format: Option<&Format>) -> bool;

    /// Prepares reading from the start of `input`, discarding any previous state.
    fn open(&mut self, input: &Input, name: &str, format: Option<&Format>) -> Result<()>;

    /// The next row, section boundary or end of input.
    ///
    /// With a converter, cells are coerced to the type of the column at their location.
    /// Keeps returning [`RawRow::EndOfInput`] once the input is exhausted.
    fn next_raw_row(&mut self, converter: Option<&dyn Converter>) -> Result<RawRow>;

    /// Rough number of rows, when the source can tell cheaply.
    fn estimate_total_rows(&self) -> Option<u64>;

    /// Releases the input. Safe to call more than once.
    fn close(&mut self);
}

/// Coerces one cell through the column at `key`, keeping the raw value on failure.
pub(crate) fn convert_cell(
    value: Value,
    key: &str,
    columns: &HashMap<String, Column>,
    converter: Option<&dyn Converter>,
) -> Value {
    let (Some(converter), Some(column)) = (converter, columns.get(key)) else {
        return value;
    };
    match converter.convert(&value, &column.type_tag) {
        Ok(converted) => converted,
        Err(error) => {
            warn!(
                "Cannot convert '{}' in column '{}' to '{}': {}",
                value, column.name, column.type_tag, error
            );
            value
        }
    }
}

/// Columns of `format` keyed by location, empty without a format.
pub(crate) fn columns_of(format: Option<&Format>) -> HashMap<String, Column> {
    format.map(Format::columns_by_key).unwrap_or_default()
}
