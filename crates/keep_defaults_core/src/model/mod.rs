//! Record data model.
//!
//! # Responsibility
//! - Define attribute values, column metadata and record instances.
//! - Provide the assignment paths (named setter, keyed write, bulk) that the
//!   guard hooks into.
//!
//! # Invariants
//! - Column metadata is read-only once a record type is defined.
//! - Every stored attribute value has been cast to its column type.

pub mod column;
pub mod record;
pub mod value;
