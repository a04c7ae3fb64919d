//! Missing-value sentinels and per-column fill statistics.

use serde::{Deserialize, Serialize};

use crate::value::{Value, format_numeric};

/// The reserved value that marks a cell as "missing" for one column.
///
/// In configuration a number (`0`) or a string (`"Unknown"`) is accepted;
/// an absent sentinel means the empty cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sentinel {
    Number(f64),
    Text(String),
    Missing,
}

impl Sentinel {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Whether `value` is this sentinel.
    ///
    /// Numeric sentinels match any spelling of the number (`0`, `0.0`, `0.00`).
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Missing => value.is_missing(),
            Self::Text(sentinel) => match value {
                Value::Text(s) => s == sentinel,
                Value::Number(n) => format_numeric(*n) == *sentinel,
                Value::Missing => false,
            },
            Self::Number(sentinel) => value.as_f64().is_some_and(|v| v == *sentinel),
        }
    }
}

impl std::fmt::Display for Sentinel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&format_numeric(*n)),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Missing => f.write_str("<empty>"),
        }
    }
}

/// Fill value computed for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnStatistic {
    /// Most frequent non-sentinel value of a categorical column.
    Mode(String),
    /// Median of the non-sentinel numeric values of a column.
    Median(f64),
}

impl ColumnStatistic {
    /// The cell written in place of a sentinel.
    pub fn fill_value(&self) -> Value {
        match self {
            Self::Mode(value) => Value::Text(value.clone()),
            Self::Median(value) => Value::Number(*value),
        }
    }
}

impl std::fmt::Display for ColumnStatistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mode(value) => write!(f, "mode={value}"),
            Self::Median(value) => write!(f, "median={}", format_numeric(*value)),
        }
    }
}
