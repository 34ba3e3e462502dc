use crate::value::Value;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use iso8601_duration::Duration as IsoDuration;
use log::warn;

/// Milliseconds in one day, the unit of a serial date's fraction.
const DAY_MILLISECONDS: f64 = 86_400_000.0;

/// How a stored cell value is to be read.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// `1`/`0` or `true`/`false`
    Boolean,
    /// A plain number
    Number,
    /// Serial number shown as a date
    Date,
    /// Serial number shown as a time of day
    Time,
    /// Serial number shown as date and time
    DateTime,
    /// ISO 8601 date or date-time text
    IsoDateTime,
    /// ISO 8601 duration such as `PT13H30M`
    IsoDuration,
    Text,
    /// An error code such as `#DIV/0!`
    Error,
}

impl CellType {
    /// The type of the built-in number formats that show dates or times.
    pub(crate) fn from_builtin_format(id: u16) -> Option<CellType> {
        match id {
            14..=17 => Some(CellType::Date),
            18..=21 | 45..=47 => Some(CellType::Time),
            22 => Some(CellType::DateTime),
            _ => None,
        }
    }

    /// Scans a custom number format code for date or time placeholders,
    /// ignoring quoted literals, escaped characters and bracketed colors or conditions.
    pub(crate) fn from_custom_format(code: &str) -> CellType {
        let mut escaped = false;
        let mut literal = false;
        let mut bracket = false;
        let mut date = false;
        let mut time = false;
        for character in code.chars() {
            match character {
                _ if escaped => escaped = false,
                '_' | '\\' | '*' if !literal => escaped = true,
                '"' => literal = !literal,
                _ if literal => (),
                '[' => bracket = true,
                ']' => bracket = false,
                _ if bracket => (),
                'Y' | 'y' | 'D' | 'd' => date = true,
                'H' | 'h' | 'S' | 's' => time = true,
                _ => (),
            }
        }
        match (date, time) {
            (true, true) => CellType::DateTime,
            (true, false) => CellType::Date,
            (false, true) => CellType::Time,
            (false, false) => CellType::Number,
        }
    }

    fn is_serial(self) -> bool {
        matches!(self, CellType::Number | CellType::Date | CellType::Time | CellType::DateTime)
    }
}

/// Base of a workbook's serial dates.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum DateSystem {
    /// Day 1 is 1900-01-01, and day 60 is the fictitious 1900-02-29.
    #[default]
    V1900,
    /// Day 0 is 1904-01-01.
    V1904,
}

impl DateSystem {
    pub(crate) fn from_flag(is_1904: bool) -> DateSystem {
        if is_1904 {
            DateSystem::V1904
        } else {
            DateSystem::V1900
        }
    }

    pub(crate) fn to_datetime(self, serial: f64) -> Option<NaiveDateTime> {
        let days = serial.trunc() as i64;
        let offset = match self {
            DateSystem::V1900 if days < 60 => 1,
            DateSystem::V1900 => 0,
            DateSystem::V1904 => 1462,
        };
        let date = NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(days + offset))?;
        Some(date.and_time(to_time(serial)?))
    }
}

/// The time of day held in a serial's fraction, to the millisecond.
pub(crate) fn to_time(serial: f64) -> Option<NaiveTime> {
    let milliseconds = ((serial.fract().abs() * DAY_MILLISECONDS).round() as u32).min(86_399_999);
    NaiveTime::from_num_seconds_from_midnight_opt(milliseconds / 1_000, (milliseconds % 1_000) * 1_000_000)
}

/// Display text of a BIFF error code.
pub(crate) fn error_code(code: u8) -> &'static str {
    match code {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// One stored cell of a sheet row.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Cell {
    /// 0-based column
    pub(crate) col: usize,
    pub(crate) kind: CellType,
    pub(crate) value: String,
    /// Text as the source application shows it, when the file stores it.
    pub(crate) display: Option<String>,
}

/// How a row's cells become values.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct ValueOptions {
    pub(crate) date_system: DateSystem,
    /// Render typed cells as the text the source shows.
    pub(crate) formatted: bool,
}

impl Cell {
    pub(crate) fn new(col: usize, kind: CellType, value: impl Into<String>) -> Cell {
        Cell { col, kind, value: value.into(), display: None }
    }

    /// The cell's value. `as_date` reads plain numbers as serial dates.
    pub(crate) fn to_value(&self, options: ValueOptions, as_date: bool) -> Value {
        let kind = match self.kind {
            CellType::Number if as_date => CellType::DateTime,
            kind => kind,
        };
        if options.formatted {
            if let Some(display) = &self.display {
                return Value::Text(display.clone());
            }
        }
        let value = match kind {
            CellType::Empty => Some(Value::Null),
            CellType::Text => Some(Value::Text(self.value.clone())),
            CellType::Error => Some(Value::Text(format!("ERROR: {}", self.value))),
            CellType::Boolean => {
                let flag = matches!(self.value.trim(), "1" | "true" | "TRUE");
                Some(if options.formatted {
                    Value::from(if flag { "TRUE" } else { "FALSE" })
                } else {
                    Value::Boolean(flag)
                })
            }
            kind if kind.is_serial() => self.serial_value(kind, options),
            CellType::IsoDateTime => self.iso_datetime_value(options.formatted),
            _ => self.iso_duration_value(options.formatted),
        };
        value.unwrap_or_else(|| {
            warn!("Cannot read {:?} cell value '{}', keeping its text", kind, self.value);
            Value::Text(self.value.clone())
        })
    }

    fn serial_value(&self, kind: CellType, options: ValueOptions) -> Option<Value> {
        let serial = self.value.trim().parse::<f64>().ok()?;
        let value = match kind {
            CellType::Time => Value::Time(to_time(serial)?),
            CellType::Date | CellType::DateTime => Value::DateTime(options.date_system.to_datetime(serial)?),
            _ => Value::from_number(serial),
        };
        if !options.formatted {
            return Some(value);
        }
        let text = match (kind, &value) {
            (CellType::Date, Value::DateTime(datetime)) => datetime.format("%Y-%m-%d").to_string(),
            (CellType::DateTime, Value::DateTime(datetime)) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            (CellType::Time, Value::Time(time)) => time.format("%H:%M:%S").to_string(),
            _ => value.to_string(),
        };
        Some(Value::Text(text))
    }

    fn iso_datetime_value(&self, formatted: bool) -> Option<Value> {
        let text = self.value.trim().trim_end_matches('Z');
        if text.contains('T') {
            let datetime = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
            Some(if formatted {
                Value::Text(datetime.format("%Y-%m-%d %H:%M:%S").to_string())
            } else {
                Value::DateTime(datetime)
            })
        } else {
            let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
            Some(if formatted {
                Value::Text(date.format("%Y-%m-%d").to_string())
            } else {
                Value::DateTime(date.and_time(NaiveTime::MIN))
            })
        }
    }

    fn iso_duration_value(&self, formatted: bool) -> Option<Value> {
        let duration = self.value.trim().parse::<IsoDuration>().ok()?;
        let seconds = duration.hour as f64 * 3600.0 + duration.minute as f64 * 60.0 + duration.second as f64;
        let time = to_time(seconds / 86_400.0)?;
        Some(if formatted {
            Value::Text(time.format("%H:%M:%S").to_string())
        } else {
            Value::Time(time)
        })
    }
}
