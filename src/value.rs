//! Cell values and rows as handed to callers.

use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use indexmap::IndexMap;
use std::fmt::Display;

/// A single cell value, either raw from the source or coerced to a column type.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for nulls and for text that trims to nothing.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Reads a numeric literal the way spreadsheets store it: integral values
    /// become [`Value::Integer`], everything else [`Value::Float`].
    pub fn from_number(number: f64) -> Value {
        if number.is_finite() && number.fract() == 0.0 && number.abs() < 9.007_199_254_740_992e15 {
            Value::Integer(number as i64)
        } else {
            Value::Float(number)
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Text(text) => f.write_str(text),
            Value::Integer(value) => write!(f, "{}", value),
            Value::Float(value) => write!(f, "{}", value),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::Date(value) => write!(f, "{}", value.format("%Y-%m-%d")),
            Value::Time(value) => write!(f, "{}", value.format("%H:%M:%S%.f")),
            Value::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

/// One row of output: location key to value, in source order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row(IndexMap<String, Value>);

impl Row {
    pub fn new() -> Row {
        Row(IndexMap::new())
    }

    pub fn with_capacity(capacity: usize) -> Row {
        Row(IndexMap::with_capacity(capacity))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Absent keys read as `None`; callers treat that as null.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// A row with no cells, or whose every cell is null or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.values().all(Value::is_blank)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Row(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_rows() {
        assert!(Row::new().is_blank());

        let row: Row = [("1", Value::Null), ("2", Value::from("  \t"))].into_iter().collect();
        assert!(row.is_blank());

        let row: Row = [("1", Value::Null), ("2", Value::Integer(0))].into_iter().collect();
        assert!(!row.is_blank());
    }

    #[test]
    fn numbers_keep_integral_values_integral() {
        assert_eq!(Value::from_number(42.0), Value::Integer(42));
        assert_eq!(Value::from_number(-3.0), Value::Integer(-3));
        assert_eq!(Value::from_number(2.5), Value::Float(2.5));
        assert_eq!(Value::from_number(1e300), Value::Float(1e300));
    }

    #[test]
    fn display_renders_null_as_empty() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Boolean(true).to_string(), "true");
        let date = NaiveDate::from_ymd_opt(1977, 5, 17).unwrap();
        assert_eq!(Value::Date(date).to_string(), "1977-05-17");
    }

    #[test]
    fn rows_keep_insertion_order() {
        let mut row = Row::new();
        row.insert("b", Value::from("2"));
        row.insert("a", Value::from("1"));
        assert_eq!(row.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(row.get("a"), Some(&Value::from("1")));
        assert_eq!(row.get("c"), None);
    }
}
