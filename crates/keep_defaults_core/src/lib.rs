//! Default-preserving attribute guard for a small record-mapping layer.
//!
//! Assigning null to an attribute whose column is `NOT NULL` with a declared
//! default stores the default instead, on every assignment path, matching
//! what the database would enforce on write.

pub mod db;
pub mod guard;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod schema;

pub use guard::{GuardError, InstallOutcome};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::column::{CastError, ColumnDescriptor, ColumnType};
pub use model::record::{AttributeError, AttributeResult, Record};
pub use model::value::Value;
pub use registry::{
    DefinitionError, RecordType, RecordTypeBuilder, SuperGetter, SuperSetter, TypeRegistry,
};
pub use repo::record_repo::{RecordRepository, RepoError, RepoResult, SqliteRecordRepository};
pub use schema::{SchemaError, SchemaSource, SqliteSchema, StaticSchema};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
