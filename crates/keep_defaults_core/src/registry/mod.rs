//! Record type registry.
//!
//! # Responsibility
//! - Define record types from builders and a schema source.
//! - Resolve inheritance: shared tables, inherited overrides, aliases and
//!   guard state.
//! - Own the install ledger and run guard hooks at definition time.
//!
//! # Invariants
//! - Type names are unique within a registry.
//! - A parent is defined before its subtypes.
//! - Overrides and aliases of a backed type name existing columns.

use crate::guard::installer::{self, GuardError, InstallLedger, InstallOutcome};
use crate::guard::keeps_defaults;
use crate::schema::{ensure_identifier, SchemaError, SchemaSource};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod record_type;

pub use record_type::{
    GetterChain, GetterOverride, RecordType, RecordTypeBuilder, SetterChain, SetterFn,
    SetterOverride, SuperGetter, SuperSetter, WriteHook,
};

static TYPE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(::[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid type name regex")
});

/// Record type definition errors.
#[derive(Debug)]
pub enum DefinitionError {
    InvalidTypeName(String),
    DuplicateType(String),
    UnknownParent {
        record_type: String,
        parent: String,
    },
    UnknownAttribute {
        record_type: String,
        attribute: String,
    },
    Schema(SchemaError),
}

impl Display for DefinitionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTypeName(name) => write!(f, "invalid record type name `{name}`"),
            Self::DuplicateType(name) => write!(f, "record type already defined: {name}"),
            Self::UnknownParent {
                record_type,
                parent,
            } => write!(f, "parent `{parent}` of {record_type} is not defined"),
            Self::UnknownAttribute {
                record_type,
                attribute,
            } => write!(f, "{record_type} has no attribute `{attribute}`"),
            Self::Schema(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DefinitionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for DefinitionError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

/// Registry of defined record types over one schema source.
pub struct TypeRegistry<S: SchemaSource> {
    source: S,
    types: BTreeMap<String, Arc<RecordType>>,
    ledger: InstallLedger,
}

impl<S: SchemaSource> TypeRegistry<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            types: BTreeMap::new(),
            ledger: InstallLedger::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<RecordType>> {
        self.types.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Sorted names of defined types.
    pub fn type_names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }

    pub fn install_ledger(&self) -> &InstallLedger {
        &self.ledger
    }

    /// Defines one record type.
    ///
    /// # Side effects
    /// - Runs the guard include when the builder asks for it, or the
    ///   inheritance hook when the parent armed deferred installation or is
    ///   guarded over a different table.
    /// - Emits a `type_define` logging event.
    pub fn define(
        &mut self,
        builder: RecordTypeBuilder,
    ) -> Result<Arc<RecordType>, DefinitionError> {
        let RecordTypeBuilder {
            name,
            parent: parent_name,
            table,
            is_abstract,
            aliases,
            setter_overrides,
            getter_overrides,
            keep_defaults,
        } = builder;

        let name = name.trim().to_string();
        if !TYPE_NAME_RE.is_match(&name) {
            return Err(DefinitionError::InvalidTypeName(name));
        }
        if self.types.contains_key(&name) {
            return Err(DefinitionError::DuplicateType(name));
        }

        let parent = match parent_name.as_deref() {
            Some(parent_name) => Some(self.get(parent_name.trim()).ok_or_else(|| {
                DefinitionError::UnknownParent {
                    record_type: name.clone(),
                    parent: parent_name.to_string(),
                }
            })?),
            None => None,
        };

        let table_name = table.or_else(|| parent.as_ref().and_then(|p| p.table_name.clone()));
        if let Some(table) = table_name.as_deref() {
            ensure_identifier(table)?;
        }

        let mut record_type = self.resolve_layout(&name, parent.as_deref(), table_name)?;
        record_type.is_abstract = is_abstract;
        apply_aliases(&mut record_type, aliases)?;
        apply_setter_overrides(&mut record_type, setter_overrides)?;
        apply_getter_overrides(&mut record_type, getter_overrides)?;

        let outcome = if keep_defaults {
            Some(installer::include(&mut record_type, &mut self.ledger))
        } else {
            match parent.as_deref() {
                Some(parent) if inherits_guard(parent, &record_type) => {
                    installer::inherited(&mut record_type, &mut self.ledger)
                }
                _ => None,
            }
        };

        info!(
            "event=type_define module=registry status=ok type={} parent={} table={} abstract={} backed={} columns={} guard={}",
            record_type.name,
            record_type.parent.as_deref().unwrap_or("-"),
            record_type.table_name.as_deref().unwrap_or("-"),
            record_type.is_abstract,
            record_type.backed,
            record_type.columns.len(),
            outcome_label(outcome)
        );

        let record_type = Arc::new(record_type);
        self.types.insert(name, Arc::clone(&record_type));
        Ok(record_type)
    }

    /// Includes the default-preserving guard on an already defined type.
    ///
    /// The registry entry is replaced by the guarded definition. Records
    /// built before the call keep the unguarded definition, and subtypes
    /// defined before the call are not affected.
    ///
    /// # Errors
    /// - `GuardError::NotARecordType` when `name` is not a defined type.
    pub fn include_keep_defaults(&mut self, name: &str) -> Result<InstallOutcome, GuardError> {
        let current = self
            .get(name.trim())
            .ok_or_else(|| GuardError::NotARecordType(name.to_string()))?;

        let mut record_type = (*current).clone();
        let outcome = installer::include(&mut record_type, &mut self.ledger);
        self.types
            .insert(record_type.name.clone(), Arc::new(record_type));
        Ok(outcome)
    }

    fn resolve_layout(
        &self,
        name: &str,
        parent: Option<&RecordType>,
        table_name: Option<String>,
    ) -> Result<RecordType, DefinitionError> {
        let shares_parent_table =
            parent.is_some_and(|p| p.backed && p.table_name == table_name);

        let mut record_type = RecordType {
            name: name.to_string(),
            parent: parent.map(|p| p.name.clone()),
            table_name,
            is_abstract: false,
            backed: false,
            columns: Vec::new(),
            aliases: parent.map(|p| p.aliases.clone()).unwrap_or_default(),
            setters: BTreeMap::new(),
            getters: BTreeMap::new(),
            setter_overrides: parent
                .map(|p| p.setter_overrides.clone())
                .unwrap_or_default(),
            getter_overrides: parent
                .map(|p| p.getter_overrides.clone())
                .unwrap_or_default(),
            write_hooks: parent.map(|p| p.write_hooks.clone()).unwrap_or_default(),
            install_on_inherit: parent.is_some_and(|p| p.install_on_inherit),
        };

        if shares_parent_table {
            // Single-table subtype: reuse the parent's columns and chains,
            // including wrapped setters.
            if let Some(parent) = parent {
                record_type.backed = true;
                record_type.columns = parent.columns.clone();
                record_type.setters = parent.setters.clone();
                record_type.getters = parent.getters.clone();
            }
            return Ok(record_type);
        }

        let columns = match record_type.table_name.as_deref() {
            Some(table) => self.source.columns(table)?,
            None => None,
        };
        record_type.backed = columns.is_some();
        record_type.columns = columns.unwrap_or_default();

        for column in &record_type.columns {
            let setter_overrides = record_type
                .setter_overrides
                .get(&column.name)
                .cloned()
                .unwrap_or_default();
            let getter_overrides = record_type
                .getter_overrides
                .get(&column.name)
                .cloned()
                .unwrap_or_default();
            record_type.setters.insert(
                column.name.clone(),
                SetterChain::generated(&column.name, setter_overrides),
            );
            record_type.getters.insert(
                column.name.clone(),
                GetterChain::generated(&column.name, getter_overrides),
            );
        }

        Ok(record_type)
    }
}

fn unknown_attribute(record_type: &RecordType, attribute: &str) -> DefinitionError {
    DefinitionError::UnknownAttribute {
        record_type: record_type.name.clone(),
        attribute: attribute.to_string(),
    }
}

/// Resolves `attribute` through aliases and checks it names a column.
///
/// Unbacked types have no columns yet, so anything is accepted there.
fn declared_attribute(
    record_type: &RecordType,
    attribute: &str,
) -> Result<String, DefinitionError> {
    let canonical = record_type.canonical_name(attribute).to_string();
    if record_type.backed && record_type.column(&canonical).is_none() {
        return Err(unknown_attribute(record_type, &canonical));
    }
    Ok(canonical)
}

fn apply_aliases(
    record_type: &mut RecordType,
    aliases: Vec<(String, String)>,
) -> Result<(), DefinitionError> {
    for (alias, target) in aliases {
        let target = declared_attribute(record_type, &target)?;
        record_type.aliases.insert(alias, target);
    }
    Ok(())
}

fn apply_setter_overrides(
    record_type: &mut RecordType,
    overrides: Vec<(String, SetterOverride)>,
) -> Result<(), DefinitionError> {
    for (attribute, setter) in overrides {
        let attribute = declared_attribute(record_type, &attribute)?;
        if let Some(chain) = record_type.setters.get_mut(&attribute) {
            chain.push_override(Arc::clone(&setter));
        }
        record_type
            .setter_overrides
            .entry(attribute)
            .or_default()
            .push(setter);
    }
    Ok(())
}

fn apply_getter_overrides(
    record_type: &mut RecordType,
    overrides: Vec<(String, GetterOverride)>,
) -> Result<(), DefinitionError> {
    for (attribute, getter) in overrides {
        let attribute = declared_attribute(record_type, &attribute)?;
        if let Some(chain) = record_type.getters.get_mut(&attribute) {
            chain.push_override(Arc::clone(&getter));
        }
        record_type
            .getter_overrides
            .entry(attribute)
            .or_default()
            .push(getter);
    }
    Ok(())
}

/// Whether a subtype of `parent` introduces its own backing store.
fn descends_from_base(parent: &RecordType) -> bool {
    parent.is_abstract || !parent.backed
}

/// Whether `child` needs its own setters wrapped on definition.
///
/// True when the parent armed deferred installation, or when a guarded
/// parent's keyed-write hook was inherited onto a different table, whose
/// setters are freshly generated. Single-table subtypes already carry the
/// parent's wrapped chains.
fn inherits_guard(parent: &RecordType, child: &RecordType) -> bool {
    if parent.install_on_inherit && descends_from_base(parent) {
        return true;
    }
    keeps_defaults(parent) && parent.table_name != child.table_name
}

fn outcome_label(outcome: Option<InstallOutcome>) -> String {
    match outcome {
        None => "none".to_string(),
        Some(InstallOutcome::Installed { wrapped }) => format!("installed:{wrapped}"),
        Some(InstallOutcome::Deferred) => "deferred".to_string(),
        Some(InstallOutcome::AlreadyInstalled) => "already_installed".to_string(),
    }
}
