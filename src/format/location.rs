use crate::format::FormatError;
use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\s*(\d+)\s*(?:-\s*(-1|\d*)\s*)?\]$").expect("Hardcode regex pattern")
});

/// Where a column's value sits in a raw row.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    /// 1-based field ordinal (delimited text, spreadsheet columns).
    Index(usize),
    /// 1-based inclusive character range; `end == None` runs to the end of the line.
    Range { start: usize, end: Option<usize> },
    /// A named key, passed through untouched.
    Name(String),
}

impl Location {
    /// The key this location occupies in a [`Row`](crate::Row).
    pub fn key(&self) -> String {
        match self {
            Location::Index(index) => index.to_string(),
            Location::Range { start, end: Some(end) } => format!("[{},{}]", start, end),
            Location::Range { start, end: None } => format!("[{},-1]", start),
            Location::Name(name) => name.to_owned(),
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, Location::Range { .. })
    }

    /// Slices one line of text; `None` when the range starts past its end.
    pub(crate) fn slice<'a>(&self, line: &'a str, length: usize) -> Option<&'a str> {
        let Location::Range { start, end } = self else {
            return None;
        };
        if *start > length {
            return None;
        }
        let lower = char_offset(line, start - 1);
        let upper = match end {
            Some(end) if *end < length => char_offset(line, *end),
            _ => line.len(),
        };
        Some(&line[lower..upper.max(lower)])
    }
}

/// Byte offset of the `chars`-th character of `line`.
fn char_offset(line: &str, chars: usize) -> usize {
    line.char_indices()
        .nth(chars)
        .map(|(offset, _)| offset)
        .unwrap_or(line.len())
}

impl TryFrom<&str> for Location {
    type Error = FormatError;

    /// Parses `"3"`, `"[5]"`, `"[1-3]"`, `"[5--1]"` or `"[5-]"`; anything else is a name.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let value = value.trim();
        if value.starts_with('[') {
            let captures = RANGE_PATTERN
                .captures(value)
                .ok_or_else(|| FormatError::LocationError(value.to_owned()))?;
            let start = captures[1]
                .parse::<usize>()
                .map_err(|_| FormatError::LocationError(value.to_owned()))?;
            let end = match captures.get(2).map(|matcher| matcher.as_str()) {
                None | Some("") | Some("-1") => None,
                Some(end) => Some(end.parse::<usize>().map_err(|_| FormatError::LocationError(value.to_owned()))?),
            };
            if start == 0 || end.map(|end| end < start).unwrap_or(false) {
                Err(FormatError::LocationError(value.to_owned()))?
            }
            Ok(Location::Range { start, end })
        } else if let Ok(index) = value.parse::<usize>() {
            if index == 0 {
                Err(FormatError::LocationError(value.to_owned()))?
            }
            Ok(Location::Index(index))
        } else if value.is_empty() {
            Err(FormatError::LocationError(value.to_owned()))?
        } else {
            Ok(Location::Name(value.to_owned()))
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Range { start, end: Some(end) } => write!(f, "[{}-{}]", start, end),
            Location::Range { start, end: None } => write!(f, "[{}]", start),
            _ => f.write_str(&self.key()),
        }
    }
}
