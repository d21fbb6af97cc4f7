//! Setter wrapping and install bookkeeping.
//!
//! # Responsibility
//! - Wrap the base setter of every qualifying column of a record type.
//! - Defer installation on abstract/unbacked types to their concrete subtypes.
//! - Track which record types are already installed.
//!
//! # Invariants
//! - The wrapper replaces the base setter only, so user overrides keep
//!   running first and reach the wrapper through their super call.
//! - A record type appears in the ledger at most once and is never removed.

use crate::guard::keyed_write::{self, substitute_default};
use crate::model::record::Record;
use crate::model::value::Value;
use crate::registry::{RecordType, SetterFn};
use log::info;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Result of including the guard on one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Setters were wrapped; `wrapped` counts newly wrapped setters.
    Installed { wrapped: usize },
    /// Type is abstract or unbacked; concrete subtypes install on definition.
    Deferred,
    /// Type was installed before; nothing changed.
    AlreadyInstalled,
}

/// Usage errors raised when including the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    NotARecordType(String),
}

impl Display for GuardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotARecordType(name) => write!(
                f,
                "keep_defaults can only be included by defined record types, got `{name}`"
            ),
        }
    }
}

impl Error for GuardError {}

/// Record types whose setters have been wrapped.
#[derive(Debug, Default, Clone)]
pub struct InstallLedger {
    installed: BTreeSet<String>,
}

impl InstallLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.installed.contains(type_name)
    }

    pub fn len(&self) -> usize {
        self.installed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }

    fn mark(&mut self, type_name: &str) -> bool {
        self.installed.insert(type_name.to_string())
    }
}

/// Includes the guard on `record_type`.
///
/// Registers the keyed-write guard unconditionally, then either installs the
/// setter wrappers or, for abstract/unbacked types, arms installation for
/// concrete subtypes. Repeating the include on an armed abstract/unbacked
/// type reports `AlreadyInstalled`.
pub(crate) fn include(record_type: &mut RecordType, ledger: &mut InstallLedger) -> InstallOutcome {
    let registered = keyed_write::register(record_type);

    if !record_type.is_instantiable() {
        if !registered && record_type.installs_on_inherit() {
            info!(
                "event=guard_skip module=guard type={} reason=already_armed",
                record_type.name()
            );
            return InstallOutcome::AlreadyInstalled;
        }
        record_type.arm_install_on_inherit();
        info!(
            "event=guard_defer module=guard type={} abstract={} backed={}",
            record_type.name(),
            record_type.is_abstract(),
            record_type.is_backed()
        );
        return InstallOutcome::Deferred;
    }

    install(record_type, ledger)
}

/// Inheritance hook: runs for a type whose parent armed deferred installation
/// or is guarded over a different table.
///
/// Returns `None` when the new type is itself abstract/unbacked; it arms the
/// hook for its own subtypes.
pub(crate) fn inherited(
    record_type: &mut RecordType,
    ledger: &mut InstallLedger,
) -> Option<InstallOutcome> {
    if !record_type.is_instantiable() {
        record_type.arm_install_on_inherit();
        return None;
    }
    Some(install(record_type, ledger))
}

fn install(record_type: &mut RecordType, ledger: &mut InstallLedger) -> InstallOutcome {
    if ledger.contains(record_type.name()) {
        info!(
            "event=guard_skip module=guard type={} reason=already_installed",
            record_type.name()
        );
        return InstallOutcome::AlreadyInstalled;
    }

    let qualifying: Vec<String> = record_type
        .columns()
        .iter()
        .filter(|column| column.keeps_default())
        .map(|column| column.name.clone())
        .collect();

    let mut wrapped = 0;
    for column in &qualifying {
        let Some(setter) = record_type.setter_mut(column) else {
            continue;
        };
        if setter.wrap_base(|original| keep_default_setter(column, original)) {
            wrapped += 1;
        }
    }

    ledger.mark(record_type.name());
    info!(
        "event=guard_install module=guard status=ok type={} qualifying={} wrapped={}",
        record_type.name(),
        qualifying.len(),
        wrapped
    );
    InstallOutcome::Installed { wrapped }
}

fn keep_default_setter(column: &str, original: SetterFn) -> SetterFn {
    let column = column.to_string();
    Arc::new(move |record: &mut Record, value: Value| {
        let value = substitute_default(record.record_type(), &column, value);
        original(record, value)
    })
}
