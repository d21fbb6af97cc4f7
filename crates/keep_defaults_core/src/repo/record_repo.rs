//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/update/find over the table backing a record type.
//!
//! # Invariants
//! - Only types with an integer primary key column are persisted.
//! - A null primary key on insert is left to SQLite (rowid assignment) and
//!   the generated id is stored back on the record.

use crate::db::DbError;
use crate::model::column::ColumnType;
use crate::model::record::{AttributeError, Record};
use crate::model::value::Value;
use crate::registry::RecordType;
use crate::schema::quote_identifier;
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and lookup.
#[derive(Debug)]
pub enum RepoError {
    Attribute(AttributeError),
    Db(DbError),
    NotFound { record_type: String, id: i64 },
    MissingPrimaryKey(String),
    NotPersisted(String),
    Unbacked(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attribute(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { record_type, id } => write!(f, "{record_type} not found: {id}"),
            Self::MissingPrimaryKey(name) => {
                write!(f, "{name} has no integer primary key column")
            }
            Self::NotPersisted(name) => write!(f, "{name} record has no primary key value"),
            Self::Unbacked(name) => write!(f, "{name} has no backing table"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Attribute(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. }
            | Self::MissingPrimaryKey(_)
            | Self::NotPersisted(_)
            | Self::Unbacked(_) => None,
        }
    }
}

impl From<AttributeError> for RepoError {
    fn from(value: AttributeError) -> Self {
        Self::Attribute(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for record persistence.
pub trait RecordRepository {
    fn insert(&self, record: &mut Record) -> RepoResult<i64>;
    fn update(&self, record: &Record) -> RepoResult<()>;
    fn find(&self, record_type: &Arc<RecordType>, id: i64) -> RepoResult<Option<Record>>;
}

/// SQLite-backed record repository.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn insert(&self, record: &mut Record) -> RepoResult<i64> {
        let record_type = Arc::clone(record.record_type());
        let (table, primary_key) = persistence_target(&record_type)?;

        let mut columns = Vec::new();
        let mut values = Vec::new();
        for column in record_type.columns() {
            let value = record.read_attribute(&column.name)?;
            if column.primary_key && value.is_null() {
                continue;
            }
            columns.push(quote_identifier(&column.name));
            values.push(value.clone());
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES;", quote_identifier(table))
        } else {
            let placeholders = (1..=columns.len())
                .map(|index| format!("?{index}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({placeholders});",
                quote_identifier(table),
                columns.join(", ")
            )
        };
        self.conn.execute(&sql, params_from_iter(values.iter()))?;

        let id = match record.id() {
            Some(id) => id,
            None => {
                let id = self.conn.last_insert_rowid();
                record.write_attribute_raw(primary_key, Value::Integer(id))?;
                id
            }
        };
        Ok(id)
    }

    fn update(&self, record: &Record) -> RepoResult<()> {
        let record_type = record.record_type();
        let (table, primary_key) = persistence_target(record_type)?;
        let id = record
            .id()
            .ok_or_else(|| RepoError::NotPersisted(record_type.name().to_string()))?;

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for column in record_type.columns().iter().filter(|c| !c.primary_key) {
            values.push(record.read_attribute(&column.name)?.clone());
            assignments.push(format!(
                "{} = ?{}",
                quote_identifier(&column.name),
                values.len()
            ));
        }
        if assignments.is_empty() {
            return Ok(());
        }
        values.push(Value::Integer(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{};",
            quote_identifier(table),
            assignments.join(", "),
            quote_identifier(primary_key),
            values.len()
        );
        let changed = self.conn.execute(&sql, params_from_iter(values.iter()))?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                record_type: record_type.name().to_string(),
                id,
            });
        }

        Ok(())
    }

    fn find(&self, record_type: &Arc<RecordType>, id: i64) -> RepoResult<Option<Record>> {
        let (table, primary_key) = persistence_target(record_type)?;
        let column_list = record_type
            .columns()
            .iter()
            .map(|column| quote_identifier(&column.name))
            .collect::<Vec<_>>()
            .join(", ");

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column_list} FROM {} WHERE {} = ?1;",
            quote_identifier(table),
            quote_identifier(primary_key)
        ))?;
        let mut rows = stmt.query([id])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut stored = BTreeMap::new();
        for (index, column) in record_type.columns().iter().enumerate() {
            stored.insert(column.name.clone(), row.get::<_, Value>(index)?);
        }

        Ok(Some(Record::hydrate(record_type, stored)?))
    }
}

/// Returns `(table, primary key column)` for a persistable type.
fn persistence_target(record_type: &RecordType) -> RepoResult<(&str, &str)> {
    let table = match record_type.table_name() {
        Some(table) if record_type.is_backed() => table,
        _ => return Err(RepoError::Unbacked(record_type.name().to_string())),
    };
    let primary_key = record_type
        .primary_key()
        .filter(|column| column.column_type == ColumnType::Integer)
        .ok_or_else(|| RepoError::MissingPrimaryKey(record_type.name().to_string()))?;
    Ok((table, primary_key.name.as_str()))
}
