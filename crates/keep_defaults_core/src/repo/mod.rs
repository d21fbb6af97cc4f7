//! Record persistence over SQLite.
//!
//! # Responsibility
//! - Insert, update and load records of backed record types.
//! - Keep SQL text inside the persistence boundary.
//!
//! # Invariants
//! - Loading a record never runs setters or the keyed-write guard; stored
//!   values are taken as they are.
//! - Constraint violations reported by SQLite surface unchanged as
//!   `RepoError::Db`.

pub mod record_repo;
