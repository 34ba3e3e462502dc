//! The coercion boundary: turning raw cell values into a column's declared type.

use crate::value::Value;
use anyhow::anyhow;
use anyhow::bail;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%d %m %Y", "%d/%m/%Y", "%d.%m.%Y"];
const TIME_FORMATS: [&str; 3] = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Converts a raw value to the type named by a column's type tag.
///
/// Implementations may fail; readers log the failure and keep the raw value.
pub trait Converter {
    fn convert(&self, value: &Value, type_tag: &str) -> anyhow::Result<Value>;
}

/// The type tags the [`StandardConverter`] understands.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TypeTag {
    Boolean,
    Integer,
    Float,
    Text,
    DateTime,
    Date,
    Time,
}

impl TypeTag {
    /// Parses a type tag, accepting the usual aliases for each type.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "BOOL" | "BOOLEAN" => Some(Self::Boolean),
            "INT" | "BIGINT" | "INTEGER" | "LONG" => Some(Self::Integer),
            "FLOAT" | "DOUBLE" | "DECIMAL" | "NUMERIC" => Some(Self::Float),
            "TEXT" | "STRING" | "VARCHAR" => Some(Self::Text),
            "DATETIME" | "TIMESTAMP" => Some(Self::DateTime),
            "DATE" => Some(Self::Date),
            "TIME" => Some(Self::Time),
            _ => None,
        }
    }
}

/// Converter for the built-in [`TypeTag`]s. Unknown tags pass values through.
#[derive(Copy, Clone, Debug, Default)]
pub struct StandardConverter;

impl Converter for StandardConverter {
    fn convert(&self, value: &Value, type_tag: &str) -> anyhow::Result<Value> {
        let Some(tag) = TypeTag::parse(type_tag) else {
            return Ok(value.clone());
        };
        if value.is_null() {
            return Ok(Value::Null);
        }
        if tag != TypeTag::Text && value.is_blank() {
            return Ok(Value::Null);
        }
        match tag {
            TypeTag::Text => Ok(match value {
                Value::Text(_) => value.clone(),
                other => Value::Text(other.to_string()),
            }),
            TypeTag::Boolean => to_boolean(value),
            TypeTag::Integer => to_integer(value),
            TypeTag::Float => to_float(value),
            TypeTag::Date => to_date(value),
            TypeTag::Time => to_time(value),
            TypeTag::DateTime => to_datetime(value),
        }
    }
}

fn to_boolean(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::Boolean(_) => Ok(value.clone()),
        Value::Integer(number) => Ok(Value::Boolean(*number != 0)),
        Value::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Ok(Value::Boolean(true)),
            "false" | "f" | "no" | "n" | "0" => Ok(Value::Boolean(false)),
            _ => bail!("parse '{}' to boolean failed", text),
        },
        other => bail!("cannot convert {:?} to boolean", other),
    }
}

fn to_integer(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::Integer(_) => Ok(value.clone()),
        Value::Float(number) if number.fract() == 0.0 => Ok(Value::Integer(*number as i64)),
        Value::Boolean(flag) => Ok(Value::Integer(*flag as i64)),
        Value::Text(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| anyhow!("parse '{}' to integer failed", text)),
        other => bail!("cannot convert {:?} to integer", other),
    }
}

fn to_float(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::Float(_) => Ok(value.clone()),
        Value::Integer(number) => Ok(Value::Float(*number as f64)),
        Value::Text(text) => text
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| anyhow!("parse '{}' to float failed", text)),
        other => bail!("cannot convert {:?} to float", other),
    }
}

fn to_date(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::Date(_) => Ok(value.clone()),
        Value::DateTime(datetime) => Ok(Value::Date(datetime.date())),
        Value::Text(text) => {
            let text = text.trim();
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .or_else(|| parse_datetime(text).map(|datetime| datetime.date()))
                .map(Value::Date)
                .ok_or_else(|| anyhow!("parse '{}' to date failed", text))
        }
        other => bail!("cannot convert {:?} to date", other),
    }
}

fn to_time(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::Time(_) => Ok(value.clone()),
        Value::DateTime(datetime) => Ok(Value::Time(datetime.time())),
        Value::Text(text) => {
            let text = text.trim();
            TIME_FORMATS
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
                .map(Value::Time)
                .ok_or_else(|| anyhow!("parse '{}' to time failed", text))
        }
        other => bail!("cannot convert {:?} to time", other),
    }
}

fn to_datetime(value: &Value) -> anyhow::Result<Value> {
    match value {
        Value::DateTime(_) => Ok(value.clone()),
        Value::Date(date) => Ok(Value::DateTime(date.and_time(NaiveTime::MIN))),
        Value::Text(text) => {
            let text = text.trim();
            parse_datetime(text)
                .or_else(|| {
                    DATE_FORMATS
                        .iter()
                        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                        .map(|date| date.and_time(NaiveTime::MIN))
                })
                .map(Value::DateTime)
                .ok_or_else(|| anyhow!("parse '{}' to datetime failed", text))
        }
        other => bail!("cannot convert {:?} to datetime", other),
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}
