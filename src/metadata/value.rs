//! Typed cell values read from the relational catalog.
//!
//! SQLite only reports five storage classes, so values are refined by the
//! column's declared type before they are rendered. Rendering rules are shared
//! by the CSV exporter and the schema-extract sample rows:
//!
//! | Value      | CSV field                          | Sample row (JSON)  |
//! |------------|------------------------------------|--------------------|
//! | Null       | empty field                        | `null`             |
//! | Decimal    | float text (`12.5`, `3.0`)         | number             |
//! | Date/Time  | ISO-8601 text                      | string             |
//! | Blob       | lowercase hex                      | string             |

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::ValueRef;

/// Date/time layouts accepted when refining text columns.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A single relational cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    /// Exact numeric; rendered as floating point.
    Decimal(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Blob(Vec<u8>),
}

/// Coarse category of a declared column type, used to refine raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeHint {
    Decimal,
    Date,
    Time,
    Timestamp,
    Other,
}

impl TypeHint {
    /// Classify a declared (lowercase) column type.
    pub fn from_declared(declared: &str) -> Self {
        let t = declared.to_ascii_lowercase();
        if t.contains("decimal") || t.contains("numeric") || t.contains("money") {
            Self::Decimal
        } else if t.contains("timestamp") || t.contains("datetime") {
            Self::Timestamp
        } else if t.starts_with("date") {
            Self::Date
        } else if t.starts_with("time") {
            Self::Time
        } else {
            Self::Other
        }
    }
}

impl CellValue {
    /// Convert a raw SQLite value, refining it with the column's type hint.
    pub fn from_sqlite(value: ValueRef<'_>, hint: TypeHint) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => match hint {
                TypeHint::Decimal => Self::Decimal(i as f64),
                _ => Self::Integer(i),
            },
            ValueRef::Real(f) => match hint {
                TypeHint::Decimal => Self::Decimal(f),
                _ => Self::Float(f),
            },
            ValueRef::Text(bytes) => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                Self::refine_text(text, hint)
            }
            ValueRef::Blob(bytes) => Self::Blob(bytes.to_vec()),
        }
    }

    fn refine_text(text: String, hint: TypeHint) -> Self {
        match hint {
            TypeHint::Decimal => match text.trim().parse::<f64>() {
                Ok(f) => Self::Decimal(f),
                Err(_) => Self::Text(text),
            },
            TypeHint::Date => match NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d") {
                Ok(d) => Self::Date(d),
                Err(_) => Self::Text(text),
            },
            TypeHint::Time => match NaiveTime::parse_from_str(text.trim(), "%H:%M:%S%.f") {
                Ok(t) => Self::Time(t),
                Err(_) => Self::Text(text),
            },
            TypeHint::Timestamp => match parse_timestamp(text.trim()) {
                Some(ts) => Self::Timestamp(ts),
                None => Self::Text(text),
            },
            TypeHint::Other => Self::Text(text),
        }
    }

    /// Whether this is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Render as a CSV field. Nulls become the empty field.
    pub fn to_field(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) | Self::Decimal(f) => format_float(*f),
            Self::Text(s) => s.clone(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Time(t) => t.format("%H:%M:%S%.f").to_string(),
            Self::Timestamp(ts) => ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Self::Blob(b) => hex::encode(b),
        }
    }

    /// Render as a JSON value for sample rows.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) | Self::Decimal(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            other => serde_json::Value::String(other.to_field()),
        }
    }
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// Format a float the way a decimal-to-float conversion prints it:
/// integral values keep a trailing `.0`.
pub fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}
