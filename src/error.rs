use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the row engine, its adapters and the selection layer can report.
///
/// Coercion failures are deliberately absent: they are logged and the raw value is kept.
#[derive(Error, Debug)]
pub enum Error {
    /// The input could not be opened or decoded. Fatal for the reader.
    #[error("{0}")]
    Source(String),

    /// `take_next` was called with nothing left to read.
    #[error("No more rows available")]
    Exhausted,

    /// The operation is not part of the row contract.
    #[error("Unsupported operation '{0}'")]
    Unsupported(&'static str),

    /// A section was requested that the source does not have.
    #[error("Section {requested} not found: source has {available} section(s)")]
    SectionNotFound { requested: i32, available: usize },

    /// No adapter accepted the input.
    #[error("No reader found for '{0}'")]
    AdapterNotFound(String),

    #[error("{0}")]
    Format(#[from] crate::format::FormatError),

    // Standard library errors
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloat(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    ParseDateTime(#[from] chrono::ParseError),

    // Third-party library errors
    #[error("{0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    Xml(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncoding(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    Cfb(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    Biff8(#[from] crate::helpers::biff8::Biff8Error),

    #[error("{0}")]
    XmlHelper(#[from] crate::helpers::xml::XmlError),

    // Adapter errors
    #[error("{0}")]
    Spreadsheet(#[from] crate::spreadsheet::SpreadsheetError),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for std::result::Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    /// Folds any error into a [`Error::Source`] whose message starts with `message`.
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| match e {
            Error::Source(inner) => Error::Source(format!("{}: {}", message, inner)),
            Error::SectionNotFound { .. } | Error::Format(_) => e,
            other => Error::Source(format!("{}: {}", message, other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_prefix_keeps_structural_errors() {
        let result: Result<()> = Err(Error::SectionNotFound { requested: 3, available: 1 });
        assert!(matches!(
            result.with_prefix("book.xlsx"),
            Err(Error::SectionNotFound { requested: 3, available: 1 })
        ));
    }

    #[test]
    fn with_prefix_wraps_io_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let result: Result<()> = Err(io.into());
        let message = result.with_prefix("data.csv").unwrap_err().to_string();
        assert_eq!(message, "data.csv: missing");
    }
}
