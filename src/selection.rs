//! Picks the adapter for an input by probing each kind in a fixed order.

use crate::adapter::delimited::DelimitedAdapter;
use crate::adapter::fixed_width::FixedWidthAdapter;
use crate::adapter::html::HtmlTableAdapter;
use crate::adapter::FormatAdapter;
use crate::engine::RowEngine;
use crate::error::Error;
use crate::error::Result;
use crate::error::ResultMessage;
use crate::format::Format;
use crate::helpers::reader::Input;
use crate::spreadsheet::SpreadsheetAdapter;
use crate::spreadsheet::WorkbookKind;
use log::debug;
use std::path::Path;

/// Every adapter kind, most specific first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AdapterKind {
    Xlsx,
    Xls,
    Ods,
    Html,
    FixedWidth,
    Delimited,
}

impl AdapterKind {
    /// Probe order: containers with signatures before plain text.
    pub const ALL: [AdapterKind; 6] = [
        AdapterKind::Xlsx,
        AdapterKind::Xls,
        AdapterKind::Ods,
        AdapterKind::Html,
        AdapterKind::FixedWidth,
        AdapterKind::Delimited,
    ];

    /// A fresh, unopened adapter of this kind.
    pub fn create(self) -> Box<dyn FormatAdapter> {
        match self {
            AdapterKind::Xlsx => Box::new(SpreadsheetAdapter::new(WorkbookKind::Xlsx)),
            AdapterKind::Xls => Box::new(SpreadsheetAdapter::new(WorkbookKind::Xls)),
            AdapterKind::Ods => Box::new(SpreadsheetAdapter::new(WorkbookKind::Ods)),
            AdapterKind::Html => Box::new(HtmlTableAdapter::new()),
            AdapterKind::FixedWidth => Box::new(FixedWidthAdapter::new()),
            AdapterKind::Delimited => Box::new(DelimitedAdapter::new()),
        }
    }
}

/// The first adapter that accepts `input`, unopened.
pub fn select_adapter(input: &Input, name: &str, format: Option<&Format>) -> Option<Box<dyn FormatAdapter>> {
    AdapterKind::ALL
        .iter()
        .map(|kind| kind.create())
        .find(|adapter| adapter.supports(input, name, format))
}

/// Opens a row engine over `input` with the first adapter that accepts it.
///
/// Without a format, column names are taken from the first row.
pub fn open_reader(input: &Input, name: &str, format: Option<Format>) -> Result<RowEngine> {
    let adapter = select_adapter(input, name, format.as_ref()).ok_or_else(|| Error::AdapterNotFound(name.to_owned()))?;
    debug!("Reading '{}' with the {} adapter", name, adapter.name());
    RowEngine::open(adapter, input, name, format)
}

/// [`open_reader`] over a file, named after its path.
pub fn open_path(path: impl AsRef<Path>, format: Option<Format>) -> Result<RowEngine> {
    let path = path.as_ref();
    let name = path.display().to_string();
    std::fs::metadata(path).map_err(Error::from).with_prefix(&name)?;
    open_reader(&Input::file(path), &name, format)
}
