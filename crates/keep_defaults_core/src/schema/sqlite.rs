//! SQLite column introspection via `PRAGMA table_info`.

use super::{ensure_identifier, quote_identifier, SchemaResult, SchemaSource};
use crate::model::column::{ColumnDescriptor, ColumnType};
use crate::model::value::Value;
use log::{debug, warn};
use rusqlite::Connection;

/// Schema source backed by a live SQLite connection.
pub struct SqliteSchema<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSchema<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SchemaSource for SqliteSchema<'_> {
    fn columns(&self, table: &str) -> SchemaResult<Option<Vec<ColumnDescriptor>>> {
        ensure_identifier(table)?;

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({});", quote_identifier(table)))?;
        let mut rows = stmt.query([])?;
        let mut columns = Vec::new();

        while let Some(row) = rows.next()? {
            let name: String = row.get("name")?;
            let declared_type: String = row.get("type")?;
            let not_null: i64 = row.get("notnull")?;
            let raw_default: Option<String> = row.get("dflt_value")?;
            let primary_key: i64 = row.get("pk")?;

            let column_type = ColumnType::from_declared(&declared_type);
            let mut column = ColumnDescriptor::new(name.as_str(), column_type);
            if not_null != 0 {
                column = column.not_null();
            }
            if primary_key > 0 {
                column = column.primary_key();
            }
            if let Some(raw) = raw_default.as_deref() {
                if let Some(default) = parse_default(table, &name, column_type, raw) {
                    column = column.with_default(default);
                }
            }
            columns.push(column);
        }

        if columns.is_empty() {
            debug!("event=schema_lookup module=schema status=missing table={table}");
            return Ok(None);
        }

        Ok(Some(columns))
    }
}

/// Parses a `dflt_value` literal into a typed default.
///
/// Returns `None` for `NULL`, for expression defaults such as
/// `CURRENT_TIMESTAMP`, which have no value until the row is written, and
/// for literals that do not cast to the column type.
fn parse_default(table: &str, column: &str, column_type: ColumnType, raw: &str) -> Option<Value> {
    let literal = parse_literal(raw)?;
    match column_type.cast(column, literal.clone()) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                "event=schema_default module=schema status=uncast table={} column={} error={}",
                table, column, err
            );
            None
        }
    }
}

fn parse_literal(raw: &str) -> Option<Value> {
    let mut text = raw.trim();
    while text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
        text = text[1..text.len() - 1].trim();
    }

    if text.eq_ignore_ascii_case("null") {
        return None;
    }
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Some(Value::Text(text[1..text.len() - 1].replace("''", "'")));
    }
    if let Ok(value) = text.parse::<i64>() {
        return Some(Value::Integer(value));
    }
    if let Ok(value) = text.parse::<f64>() {
        return Some(Value::Real(value));
    }
    if text.eq_ignore_ascii_case("true") {
        return Some(Value::Boolean(true));
    }
    if text.eq_ignore_ascii_case("false") {
        return Some(Value::Boolean(false));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{parse_literal, SqliteSchema};
    use crate::model::column::ColumnType;
    use crate::model::record::Record;
    use crate::model::value::Value;
    use crate::registry::{RecordTypeBuilder, TypeRegistry};
    use crate::schema::SchemaSource;
    use rusqlite::Connection;

    #[test]
    fn parses_literal_defaults() {
        assert_eq!(parse_literal("0"), Some(Value::Integer(0)));
        assert_eq!(parse_literal("-12"), Some(Value::Integer(-12)));
        assert_eq!(parse_literal("1.5"), Some(Value::Real(1.5)));
        assert_eq!(
            parse_literal("'it''s'"),
            Some(Value::Text("it's".to_string()))
        );
        assert_eq!(parse_literal("(7)"), Some(Value::Integer(7)));
        assert_eq!(parse_literal("NULL"), None);
        assert_eq!(parse_literal("CURRENT_TIMESTAMP"), None);
        assert_eq!(parse_literal("FALSE"), Some(Value::Boolean(false)));
    }

    #[test]
    fn introspects_table_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE foo (
                id INTEGER PRIMARY KEY,
                foo INTEGER NOT NULL DEFAULT 0,
                bar VARCHAR(255) NOT NULL DEFAULT 'foo',
                overridden BOOLEAN NOT NULL DEFAULT 0,
                baz VARCHAR(255) NOT NULL,
                zzz INTEGER DEFAULT 99,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
            );",
        )
        .unwrap();

        let columns = SqliteSchema::new(&conn)
            .columns("foo")
            .unwrap()
            .expect("foo should exist");
        let by_name = |name: &str| {
            columns
                .iter()
                .find(|column| column.name == name)
                .expect("column should exist")
        };

        assert!(by_name("id").primary_key);
        assert!(by_name("foo").keeps_default());
        assert_eq!(by_name("foo").declared_default(), Some(&Value::Integer(0)));
        assert_eq!(
            by_name("bar").declared_default(),
            Some(&Value::Text("foo".to_string()))
        );
        assert_eq!(by_name("overridden").column_type, ColumnType::Boolean);
        assert_eq!(
            by_name("overridden").declared_default(),
            Some(&Value::Boolean(false))
        );
        assert!(!by_name("baz").nullable);
        assert_eq!(by_name("baz").declared_default(), None);
        assert!(by_name("zzz").nullable);
        assert_eq!(by_name("created_at").declared_default(), None);
    }

    #[test]
    fn missing_table_is_unbacked() {
        let conn = Connection::open_in_memory().unwrap();
        let columns = SqliteSchema::new(&conn).columns("nope").unwrap();
        assert!(columns.is_none());
    }

    #[test]
    fn uncastable_literal_is_not_a_declared_default() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (
                id INTEGER PRIMARY KEY,
                n INTEGER NOT NULL DEFAULT 'abc',
                m INTEGER NOT NULL DEFAULT '12'
            );",
        )
        .unwrap();

        let columns = SqliteSchema::new(&conn)
            .columns("t")
            .unwrap()
            .expect("t should exist");
        assert_eq!(columns[1].declared_default(), None);
        assert!(!columns[1].keeps_default());
        assert_eq!(columns[2].declared_default(), Some(&Value::Integer(12)));

        let mut registry = TypeRegistry::new(SqliteSchema::new(&conn));
        let t = registry
            .define(RecordTypeBuilder::new("T").table("t").keep_defaults())
            .unwrap();
        let mut record = Record::new(&t).unwrap();
        assert_eq!(record["n"], Value::Null);

        record.set("n", 5).unwrap();
        record.set("n", Value::Null).unwrap();
        assert_eq!(record["n"], Value::Null);
        record.write_attribute("m", Value::Null).unwrap();
        assert_eq!(record["m"], Value::Integer(12));
    }
}
