//! Cell values and their text rendering.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// A single cell.
///
/// The reader never infers types: non-empty fields arrive as [`Value::Text`]
/// and empty fields as [`Value::Missing`]. [`Value::Number`] only appears
/// once a transform writes a computed number (a median, for example).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Number(f64),
    Missing,
}

impl Value {
    /// Builds a value from a raw CSV field.
    pub fn from_field(field: &str) -> Self {
        if field.is_empty() {
            Self::Missing
        } else {
            Self::Text(field.to_string())
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Returns the text payload, if this is a text cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the cell. Text is parsed on demand; non-finite
    /// results are rejected.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => parse_f64(s),
            _ => None,
        }
    }

    /// Renders the cell the way it is written to output.
    ///
    /// Missing cells render as the empty string, numbers without trailing zeros.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            Self::Number(n) => Cow::Owned(format_numeric(*n)),
            Self::Missing => Cow::Borrowed(""),
        }
    }

    /// Lookup key form: trimmed text, with numbers rendered like output.
    pub fn key_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Cow::Borrowed(trimmed))
                }
            }
            Self::Number(n) => Some(Cow::Owned(format_numeric(*n))),
            Self::Missing => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::from_field(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Formats a floating-point number as a string without trailing zeros after decimal.
///
/// Only trims trailing zeros if the number contains a decimal point.
/// Integer-valued floats like 40.0 are formatted as "40", not "4".
///
/// # Examples
///
/// ```
/// use batchprep_model::format_numeric;
///
/// assert_eq!(format_numeric(1.0), "1");
/// assert_eq!(format_numeric(1.50), "1.5");
/// assert_eq!(format_numeric(40.0), "40");
/// ```
pub fn format_numeric(v: f64) -> String {
    let s = format!("{v}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.');
        if trimmed.is_empty() || trimmed == "-" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    } else if s == "-0" {
        "0".to_string()
    } else {
        s
    }
}

/// Parses a string as `f64`, returning `None` for invalid, empty, or non-finite input.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
