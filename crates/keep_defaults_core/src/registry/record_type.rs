//! Record type definitions and accessor dispatch chains.
//!
//! # Responsibility
//! - Hold the column set, aliases and accessor chains of one record type.
//! - Compose user accessor overrides on top of generated accessors.
//! - Expose the keyed-write hook point used by `Record::write_attribute`.
//!
//! # Invariants
//! - User overrides always sit above the base setter; replacing the base
//!   (e.g. by the default-preserving wrapper) never reorders them.
//! - A setter chain's base is wrapped at most once.
//! - Overrides are chained parent-first: a child override's super call
//!   reaches the parent override, which reaches the base.

use crate::model::column::ColumnDescriptor;
use crate::model::record::{AttributeResult, Record};
use crate::model::value::Value;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Base setter: casts and stores one attribute.
pub type SetterFn = Arc<dyn Fn(&mut Record, Value) -> AttributeResult<()> + Send + Sync>;

/// User setter override. Receives a handle to the next setter in the chain.
pub type SetterOverride =
    Arc<dyn Fn(&mut Record, Value, SuperSetter<'_>) -> AttributeResult<()> + Send + Sync>;

/// User getter override. Receives a handle to the next getter in the chain.
pub type GetterOverride =
    Arc<dyn Fn(&Record, SuperGetter<'_>) -> AttributeResult<Value> + Send + Sync>;

/// Keyed-write hook: `(record type, canonical column name, value) -> value`.
pub type WriteHook = fn(&RecordType, &str, Value) -> Value;

/// Named setter dispatch for one attribute.
#[derive(Clone)]
pub struct SetterChain {
    attribute: String,
    base: SetterFn,
    overrides: Vec<SetterOverride>,
    wrapped: bool,
}

impl SetterChain {
    /// Generated setter: cast and store without any interception.
    pub(crate) fn generated(attribute: &str, overrides: Vec<SetterOverride>) -> Self {
        let column = attribute.to_string();
        Self {
            attribute: attribute.to_string(),
            base: Arc::new(move |record: &mut Record, value: Value| {
                record.write_attribute_raw(&column, value)
            }),
            overrides,
            wrapped: false,
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Whether the base setter has been replaced by a wrapper.
    pub fn is_wrapped(&self) -> bool {
        self.wrapped
    }

    /// Replaces the base setter with `wrap(base)`.
    ///
    /// Returns `false` and leaves the chain untouched when the base is already
    /// wrapped.
    pub(crate) fn wrap_base(&mut self, wrap: impl FnOnce(SetterFn) -> SetterFn) -> bool {
        if self.wrapped {
            return false;
        }
        self.base = wrap(Arc::clone(&self.base));
        self.wrapped = true;
        true
    }

    pub(crate) fn push_override(&mut self, setter: SetterOverride) {
        self.overrides.push(setter);
    }

    pub(crate) fn invoke(&self, record: &mut Record, value: Value) -> AttributeResult<()> {
        self.call_at(self.overrides.len(), record, value)
    }

    fn call_at(&self, depth: usize, record: &mut Record, value: Value) -> AttributeResult<()> {
        match depth.checked_sub(1) {
            None => (self.base)(record, value),
            Some(index) => (self.overrides[index])(
                record,
                value,
                SuperSetter {
                    chain: self,
                    depth: index,
                },
            ),
        }
    }
}

impl Debug for SetterChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetterChain")
            .field("attribute", &self.attribute)
            .field("overrides", &self.overrides.len())
            .field("wrapped", &self.wrapped)
            .finish()
    }
}

/// Handle to the setter below the currently running override.
pub struct SuperSetter<'a> {
    chain: &'a SetterChain,
    depth: usize,
}

impl SuperSetter<'_> {
    /// Delegates to the next setter in the chain.
    pub fn call(&self, record: &mut Record, value: Value) -> AttributeResult<()> {
        self.chain.call_at(self.depth, record, value)
    }
}

/// Named getter dispatch for one attribute.
#[derive(Clone)]
pub struct GetterChain {
    attribute: String,
    overrides: Vec<GetterOverride>,
}

impl GetterChain {
    pub(crate) fn generated(attribute: &str, overrides: Vec<GetterOverride>) -> Self {
        Self {
            attribute: attribute.to_string(),
            overrides,
        }
    }

    pub(crate) fn push_override(&mut self, getter: GetterOverride) {
        self.overrides.push(getter);
    }

    pub(crate) fn invoke(&self, record: &Record) -> AttributeResult<Value> {
        self.call_at(self.overrides.len(), record)
    }

    fn call_at(&self, depth: usize, record: &Record) -> AttributeResult<Value> {
        match depth.checked_sub(1) {
            None => record.read_attribute_raw(&self.attribute).cloned(),
            Some(index) => (self.overrides[index])(
                record,
                SuperGetter {
                    chain: self,
                    depth: index,
                },
            ),
        }
    }
}

impl Debug for GetterChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetterChain")
            .field("attribute", &self.attribute)
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

/// Handle to the getter below the currently running override.
pub struct SuperGetter<'a> {
    chain: &'a GetterChain,
    depth: usize,
}

impl SuperGetter<'_> {
    /// Delegates to the next getter in the chain.
    pub fn call(&self, record: &Record) -> AttributeResult<Value> {
        self.chain.call_at(self.depth, record)
    }
}

/// A defined record type.
///
/// Instances are created by [`crate::registry::TypeRegistry::define`] and
/// shared as `Arc<RecordType>`.
#[derive(Clone)]
pub struct RecordType {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) table_name: Option<String>,
    pub(crate) is_abstract: bool,
    pub(crate) backed: bool,
    pub(crate) columns: Vec<ColumnDescriptor>,
    pub(crate) aliases: BTreeMap<String, String>,
    pub(crate) setters: BTreeMap<String, SetterChain>,
    pub(crate) getters: BTreeMap<String, GetterChain>,
    pub(crate) setter_overrides: BTreeMap<String, Vec<SetterOverride>>,
    pub(crate) getter_overrides: BTreeMap<String, Vec<GetterOverride>>,
    pub(crate) write_hooks: Vec<(&'static str, WriteHook)>,
    pub(crate) install_on_inherit: bool,
}

impl RecordType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Whether the backing table exists in the schema source.
    pub fn is_backed(&self) -> bool {
        self.backed
    }

    /// Concrete and backed: records of this type can be built.
    pub fn is_instantiable(&self) -> bool {
        !self.is_abstract && self.backed
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.primary_key)
    }

    /// Resolves an attribute alias to its canonical column name.
    ///
    /// Unknown names are returned unchanged.
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map_or(name, String::as_str)
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn setter(&self, attribute: &str) -> Option<&SetterChain> {
        self.setters.get(attribute)
    }

    pub fn getter(&self, attribute: &str) -> Option<&GetterChain> {
        self.getters.get(attribute)
    }

    /// Whether a keyed-write hook with `name` is registered.
    pub fn has_write_hook(&self, name: &str) -> bool {
        self.write_hooks.iter().any(|(hook_name, _)| *hook_name == name)
    }

    /// Whether concrete subtypes should run the installer when defined.
    pub fn installs_on_inherit(&self) -> bool {
        self.install_on_inherit
    }

    pub(crate) fn setter_mut(&mut self, attribute: &str) -> Option<&mut SetterChain> {
        self.setters.get_mut(attribute)
    }

    /// Registers a keyed-write hook once per name.
    pub(crate) fn add_write_hook(&mut self, name: &'static str, hook: WriteHook) -> bool {
        if self.has_write_hook(name) {
            return false;
        }
        self.write_hooks.push((name, hook));
        true
    }

    pub(crate) fn arm_install_on_inherit(&mut self) {
        self.install_on_inherit = true;
    }

    /// Runs all keyed-write hooks in registration order.
    pub(crate) fn apply_write_hooks(&self, column: &str, value: Value) -> Value {
        self.write_hooks
            .iter()
            .fold(value, |value, (_, hook)| hook(self, column, value))
    }
}

impl Debug for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("table_name", &self.table_name)
            .field("is_abstract", &self.is_abstract)
            .field("backed", &self.backed)
            .field("columns", &self.columns)
            .field("aliases", &self.aliases)
            .field("setters", &self.setters)
            .field(
                "write_hooks",
                &self
                    .write_hooks
                    .iter()
                    .map(|(name, _)| *name)
                    .collect::<Vec<_>>(),
            )
            .field("install_on_inherit", &self.install_on_inherit)
            .finish()
    }
}

/// Declaration of a record type, consumed by `TypeRegistry::define`.
#[derive(Default)]
pub struct RecordTypeBuilder {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) table: Option<String>,
    pub(crate) is_abstract: bool,
    pub(crate) aliases: Vec<(String, String)>,
    pub(crate) setter_overrides: Vec<(String, SetterOverride)>,
    pub(crate) getter_overrides: Vec<(String, GetterOverride)>,
    pub(crate) keep_defaults: bool,
}

impl RecordTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Backing table. Without one, a type shares its parent's table.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Marks the type as a shared supertype with no records of its own.
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Makes `alias` read and write the `target` column.
    pub fn alias_attribute(mut self, alias: impl Into<String>, target: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), target.into()));
        self
    }

    /// Overrides the named setter for `attribute`.
    ///
    /// The override decides whether and how to delegate through the
    /// [`SuperSetter`] handle.
    pub fn override_setter<F>(mut self, attribute: impl Into<String>, setter: F) -> Self
    where
        F: Fn(&mut Record, Value, SuperSetter<'_>) -> AttributeResult<()> + Send + Sync + 'static,
    {
        let setter: SetterOverride = Arc::new(setter);
        self.setter_overrides.push((attribute.into(), setter));
        self
    }

    /// Overrides the named getter for `attribute`.
    pub fn override_getter<F>(mut self, attribute: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Record, SuperGetter<'_>) -> AttributeResult<Value> + Send + Sync + 'static,
    {
        let getter: GetterOverride = Arc::new(getter);
        self.getter_overrides.push((attribute.into(), getter));
        self
    }

    /// Includes the default-preserving guard when the type is defined.
    pub fn keep_defaults(mut self) -> Self {
        self.keep_defaults = true;
        self
    }
}
