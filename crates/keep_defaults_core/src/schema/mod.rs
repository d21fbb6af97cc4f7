//! Column metadata sources for record type definitions.
//!
//! # Responsibility
//! - Answer "which columns does table X have, and does X exist at all".
//! - Keep introspection details out of the type registry.
//!
//! # Invariants
//! - `Ok(None)` means the table does not exist; types mapped to it are
//!   unbacked.
//! - Table names are validated as SQL identifiers before use.

use crate::model::column::ColumnDescriptor;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod sqlite;

pub use sqlite::SqliteSchema;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug)]
pub enum SchemaError {
    Sqlite(rusqlite::Error),
    InvalidTableName(String),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidTableName(name) => write!(f, "invalid table name `{name}`"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidTableName(_) => None,
        }
    }
}

impl From<rusqlite::Error> for SchemaError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Source of column metadata, keyed by table name.
pub trait SchemaSource {
    /// Returns the columns of `table` in declaration order, or `None` when
    /// the table does not exist.
    fn columns(&self, table: &str) -> SchemaResult<Option<Vec<ColumnDescriptor>>>;
}

impl<S: SchemaSource + ?Sized> SchemaSource for &S {
    fn columns(&self, table: &str) -> SchemaResult<Option<Vec<ColumnDescriptor>>> {
        (**self).columns(table)
    }
}

/// Load-time table of column descriptors.
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    tables: BTreeMap<String, Vec<ColumnDescriptor>>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        self.tables.insert(table.into(), columns);
        self
    }
}

impl SchemaSource for StaticSchema {
    fn columns(&self, table: &str) -> SchemaResult<Option<Vec<ColumnDescriptor>>> {
        ensure_identifier(table)?;
        Ok(self.tables.get(table).cloned())
    }
}

/// Whether `value` can be used as an unquoted SQL identifier.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

pub(crate) fn ensure_identifier(table: &str) -> SchemaResult<()> {
    if is_valid_identifier(table) {
        Ok(())
    } else {
        Err(SchemaError::InvalidTableName(table.to_string()))
    }
}

/// Double-quotes an identifier for SQL text.
pub(crate) fn quote_identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::{is_valid_identifier, quote_identifier, SchemaError, SchemaSource, StaticSchema};
    use crate::model::column::{ColumnDescriptor, ColumnType};

    #[test]
    fn static_schema_reports_missing_tables_as_none() {
        let schema = StaticSchema::new().with_table(
            "bars",
            vec![ColumnDescriptor::new("foo", ColumnType::Integer)],
        );

        let columns = schema.columns("bars").expect("lookup should succeed");
        assert_eq!(columns.map(|columns| columns.len()), Some(1));
        assert!(schema
            .columns("missing")
            .expect("lookup should succeed")
            .is_none());
    }

    #[test]
    fn rejects_non_identifier_table_names() {
        let schema = StaticSchema::new();
        let err = schema
            .columns("foo; DROP TABLE foo")
            .expect_err("injection-shaped name must fail");
        assert!(matches!(err, SchemaError::InvalidTableName(_)));
    }

    #[test]
    fn identifier_helpers() {
        assert!(is_valid_identifier("user_accounts2"));
        assert!(!is_valid_identifier("2fast"));
        assert!(!is_valid_identifier(""));
        assert_eq!(quote_identifier("foo"), "\"foo\"");
    }
}
