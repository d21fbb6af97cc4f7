//! Column metadata and attribute type casting.
//!
//! # Responsibility
//! - Describe one mapped column: type, nullability, declared default.
//! - Cast incoming attribute values to the column's type.
//!
//! # Invariants
//! - A declared default of `Value::Null` is stored as "no declared default".
//! - Casting `Value::Null` always yields `Value::Null`; null handling belongs
//!   to callers (the guard), not to the cast.

use crate::model::value::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Boolean,
}

impl ColumnType {
    /// Maps a SQLite declared type to a column type.
    ///
    /// Follows SQLite affinity rules, with `BOOL*` declarations split out of
    /// numeric affinity.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("BOOL") {
            Self::Boolean
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else if upper.is_empty() {
            Self::Text
        } else {
            Self::Real
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Boolean => "boolean",
        }
    }

    /// Casts `value` into this type's canonical in-memory representation.
    ///
    /// # Errors
    /// - Returns [`CastError`] when `value` has no sensible representation in
    ///   this type (e.g. `"abc"` for an integer column).
    pub fn cast(self, column: &str, value: Value) -> Result<Value, CastError> {
        let failed = |value: &Value| CastError {
            column: column.to_string(),
            expected: self,
            actual: value.to_string(),
        };

        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),

            (Self::Integer, Value::Integer(value)) => Ok(Value::Integer(value)),
            (Self::Integer, Value::Boolean(value)) => Ok(Value::Integer(i64::from(value))),
            (Self::Integer, Value::Real(real)) => {
                // i64::MAX as f64 rounds up to 2^63, hence the open upper bound.
                if real.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(&real) {
                    Ok(Value::Integer(real as i64))
                } else {
                    Err(failed(&Value::Real(real)))
                }
            }
            (Self::Integer, Value::Text(text)) => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| failed(&Value::Text(text.clone()))),

            (Self::Real, Value::Real(value)) => Ok(Value::Real(value)),
            (Self::Real, Value::Integer(value)) => Ok(Value::Real(value as f64)),
            (Self::Real, Value::Text(text)) => text
                .trim()
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| failed(&Value::Text(text.clone()))),
            (Self::Real, other) => Err(failed(&other)),

            (Self::Text, Value::Text(value)) => Ok(Value::Text(value)),
            (Self::Text, other) => Ok(Value::Text(other.to_string())),

            (Self::Boolean, Value::Boolean(value)) => Ok(Value::Boolean(value)),
            (Self::Boolean, Value::Integer(0)) => Ok(Value::Boolean(false)),
            (Self::Boolean, Value::Integer(1)) => Ok(Value::Boolean(true)),
            (Self::Boolean, Value::Text(text)) => parse_bool_text(&text)
                .map(Value::Boolean)
                .ok_or_else(|| failed(&Value::Text(text.clone()))),
            (Self::Boolean, other) => Err(failed(&other)),
        }
    }
}

fn parse_bool_text(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" => Some(true),
        "false" | "f" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Raised when an attribute value cannot be cast to its column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastError {
    pub column: String,
    pub expected: ColumnType,
    pub actual: String,
}

impl Display for CastError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cannot cast `{}` to {} for column `{}`",
            self.actual,
            self.expected.as_str(),
            self.column
        )
    }
}

impl Error for CastError {}

/// Schema metadata for one mapped column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    default: Option<Value>,
    pub primary_key: bool,
}

impl ColumnDescriptor {
    /// Creates a nullable column without a declared default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Declares a default. `Value::Null` clears the declared default.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.default = if value.is_null() { None } else { Some(value) };
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Returns the declared default, never `Some(Value::Null)`.
    pub fn declared_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Whether assignments of null to this column fall back to the default.
    pub fn keeps_default(&self) -> bool {
        !self.nullable && self.default.is_some()
    }

    /// Initial value for a freshly built record.
    pub fn initial_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }
}
