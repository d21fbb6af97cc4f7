//! Default-preserving attribute guard.
//!
//! # Responsibility
//! - Wrap named setters of non-nullable columns with a declared default so
//!   that assigning null stores the default instead.
//! - Apply the same substitution on the keyed write path.
//!
//! # Invariants
//! - For a column with `nullable == false` and a declared default `d`, any
//!   assignment of null through a named setter, keyed write or bulk
//!   assignment leaves the attribute equal to `d`.
//! - Nullable columns and columns without a declared default are never
//!   substituted.
//! - Installation happens at most once per record type.

pub mod installer;
pub mod keyed_write;

pub use installer::{GuardError, InstallLedger, InstallOutcome};
pub use keyed_write::{keeps_defaults, substitute_default, KEYED_WRITE_HOOK};
