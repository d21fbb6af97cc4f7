//! Record instances and attribute assignment paths.
//!
//! # Responsibility
//! - Hold the current attribute values of one row.
//! - Provide the named accessor, keyed write and bulk assignment paths.
//!
//! # Invariants
//! - `values` holds exactly one entry per column of the record type.
//! - Every stored value has been cast to its column type.
//! - Named setters dispatch through the type's setter chain; keyed writes
//!   run the type's keyed-write hooks. Neither path skips the cast.

use crate::model::column::CastError;
use crate::model::value::Value;
use crate::registry::RecordType;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Index;
use std::sync::Arc;

pub type AttributeResult<T> = Result<T, AttributeError>;

/// Attribute access and assignment errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    UnknownAttribute {
        record_type: String,
        attribute: String,
    },
    AbstractType(String),
    Cast(CastError),
}

impl Display for AttributeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAttribute {
                record_type,
                attribute,
            } => write!(f, "unknown attribute `{attribute}` for {record_type}"),
            Self::AbstractType(name) => write!(
                f,
                "{name} is abstract or has no backing table and cannot be instantiated"
            ),
            Self::Cast(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AttributeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Cast(err) => Some(err),
            Self::UnknownAttribute { .. } | Self::AbstractType(_) => None,
        }
    }
}

impl From<CastError> for AttributeError {
    fn from(value: CastError) -> Self {
        Self::Cast(value)
    }
}

/// One instantiated row of a record type.
#[derive(Clone)]
pub struct Record {
    record_type: Arc<RecordType>,
    values: BTreeMap<String, Value>,
}

impl Record {
    /// Builds a new record with every column at its declared default.
    ///
    /// # Errors
    /// - `AttributeError::AbstractType` for abstract or unbacked types.
    pub fn new(record_type: &Arc<RecordType>) -> AttributeResult<Self> {
        if !record_type.is_instantiable() {
            return Err(AttributeError::AbstractType(record_type.name().to_string()));
        }

        let values = record_type
            .columns()
            .iter()
            .map(|column| (column.name.clone(), column.initial_value()))
            .collect();

        Ok(Self {
            record_type: Arc::clone(record_type),
            values,
        })
    }

    /// Builds a new record and assigns `attributes` through named setters.
    pub fn with_attributes<I, K, V>(
        record_type: &Arc<RecordType>,
        attributes: I,
    ) -> AttributeResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut record = Self::new(record_type)?;
        record.assign_attributes(attributes)?;
        Ok(record)
    }

    /// Rebuilds a record from stored column values.
    ///
    /// Values are cast but no setter or keyed-write hook runs.
    pub(crate) fn hydrate(
        record_type: &Arc<RecordType>,
        stored: BTreeMap<String, Value>,
    ) -> AttributeResult<Self> {
        let mut record = Self::new(record_type)?;
        for (column, value) in stored {
            record.write_attribute_raw(&column, value)?;
        }
        Ok(record)
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    /// Integer primary key value, when the type has one and it is set.
    pub fn id(&self) -> Option<i64> {
        let primary_key = self.record_type.primary_key()?;
        self.values.get(&primary_key.name).and_then(Value::as_i64)
    }

    /// Assigns through the named setter for `name` (column or alias).
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> AttributeResult<()> {
        let record_type = Arc::clone(&self.record_type);
        let canonical = record_type.canonical_name(name);
        let setter = record_type
            .setter(canonical)
            .ok_or_else(|| self.unknown_attribute(name))?;
        setter.invoke(self, value.into())
    }

    /// Reads through the named getter for `name` (column or alias).
    pub fn get(&self, name: &str) -> AttributeResult<Value> {
        let canonical = self.record_type.canonical_name(name);
        let getter = self
            .record_type
            .getter(canonical)
            .ok_or_else(|| self.unknown_attribute(name))?;
        getter.invoke(self)
    }

    /// Keyed write: resolves aliases, runs keyed-write hooks, casts and stores.
    ///
    /// Bypasses named setters and their overrides.
    pub fn write_attribute(&mut self, name: &str, value: impl Into<Value>) -> AttributeResult<()> {
        let record_type = Arc::clone(&self.record_type);
        let canonical = record_type.canonical_name(name);
        let value = record_type.apply_write_hooks(canonical, value.into());
        self.write_attribute_raw(canonical, value)
    }

    /// Keyed read by column or alias name.
    pub fn read_attribute(&self, name: &str) -> AttributeResult<&Value> {
        let canonical = self.record_type.canonical_name(name);
        self.values
            .get(canonical)
            .ok_or_else(|| self.unknown_attribute(name))
    }

    /// Bulk assignment through named setters, in iteration order.
    ///
    /// Stops at the first failing attribute; earlier assignments stay applied.
    pub fn assign_attributes<I, K, V>(&mut self, attributes: I) -> AttributeResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in attributes {
            self.set(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// Bulk assignment through the keyed write, in iteration order.
    pub fn write_attributes<I, K, V>(&mut self, attributes: I) -> AttributeResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (name, value) in attributes {
            self.write_attribute(name.as_ref(), value)?;
        }
        Ok(())
    }

    /// All column values keyed by canonical column name.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Casts and stores one column value. No hooks, no setters.
    pub(crate) fn write_attribute_raw(&mut self, column: &str, value: Value) -> AttributeResult<()> {
        let descriptor = self
            .record_type
            .column(column)
            .ok_or_else(|| self.unknown_attribute(column))?;
        let value = descriptor.column_type.cast(column, value)?;
        self.values.insert(column.to_string(), value);
        Ok(())
    }

    pub(crate) fn read_attribute_raw(&self, column: &str) -> AttributeResult<&Value> {
        self.values
            .get(column)
            .ok_or_else(|| self.unknown_attribute(column))
    }

    fn unknown_attribute(&self, attribute: &str) -> AttributeError {
        AttributeError::UnknownAttribute {
            record_type: self.record_type.name().to_string(),
            attribute: attribute.to_string(),
        }
    }
}

impl Index<&str> for Record {
    type Output = Value;

    /// Bracket read by column or alias name.
    ///
    /// # Panics
    /// - Panics when `name` is not an attribute of the record type.
    fn index(&self, name: &str) -> &Value {
        match self.read_attribute(name) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("record_type", &self.record_type.name())
            .field("values", &self.values)
            .finish()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.record_type.name() == other.record_type.name() && self.values == other.values
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
