//! Error types for agentdeck-core
//!
//! - **CoreError**: service-level failures with a [`CoreErrorKind`] and
//!   structured fields (ids, operation) for logging.
//! - **SchemaError**: raised by the startup schema gate.
//! - **ConfigError**: raised while loading engine configuration.
//!
//! "Not found" is usually not an error in the sync engine: lookups return
//! `Option` and sync operations on missing records are no-ops.

pub mod core_error;
pub mod schema;

pub use core_error::{CoreError, CoreErrorKind, DbResultExt};
pub use schema::{ConfigError, SchemaError};

pub type CoreResult<T> = Result<T, CoreError>;
