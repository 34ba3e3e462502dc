use crate::format::location::Location;
use crate::format::FormatError;
use crate::value::Value;
use std::collections::BTreeMap;

/// The textual type tag given to columns that carry no explicit type.
pub const TEXT_TYPE: &str = "string";

/// Describes one column of a [`Format`](crate::Format).
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    /// Opaque type tag handed to the [`Converter`](crate::Converter).
    pub type_tag: String,
    /// `None` means the column sits at its ordinal position in the format.
    pub location: Option<Location>,
    /// Substituted when the cell is absent, null or blank.
    pub default_value: Option<Value>,
    pub attributes: BTreeMap<String, String>,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Column {
        Column {
            name: name.into(),
            type_tag: TEXT_TYPE.to_owned(),
            location: None,
            default_value: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> ColumnBuilder {
        ColumnBuilder { column: Column::new(name), location: None }
    }

    /// Resolves the row key of this column, `ordinal` being its 1-based position in the format.
    pub fn key(&self, ordinal: usize) -> String {
        match &self.location {
            Some(location) => location.key(),
            None => Location::Index(ordinal).key(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

pub struct ColumnBuilder {
    column: Column,
    location: Option<String>,
}

impl ColumnBuilder {
    pub fn type_tag(mut self, type_tag: impl Into<String>) -> Self {
        self.column.type_tag = type_tag.into();
        self
    }

    /// Location text, parsed by [`build`](Self::build): `"3"`, `"[1-3]"` or a name.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.column.default_value = Some(value.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.column.attributes.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Column, FormatError> {
        let mut column = self.column;
        if column.name.is_empty() {
            Err(FormatError::ColumnNameError)?
        }
        column.location = self
            .location
            .map(|location| Location::try_from(location.as_str()))
            .transpose()?;
        Ok(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_defaults() {
        let column = Column::builder("name").build().unwrap();
        assert_eq!(column.type_tag, TEXT_TYPE);
        assert_eq!(column.location, None);
        assert_eq!(column.key(2), "2");
    }

    #[test]
    fn column_with_location() {
        let column = Column::builder("code")
            .type_tag("long")
            .location("[1-3]")
            .default_value("000")
            .attribute("label", "Code")
            .build()
            .unwrap();
        assert_eq!(column.key(1), "[1,3]");
        assert_eq!(column.default_value, Some(Value::from("000")));
        assert_eq!(column.attribute("label"), Some("Code"));
    }

    #[test]
    fn column_rejects_bad_location() {
        assert!(Column::builder("code").location("[x]").build().is_err());
        assert!(Column::builder("").build().is_err());
    }
}
