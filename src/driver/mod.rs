//! Capability contract every database backend implements.
//!
//! The mapper only ever talks to these traits: open a connection, check it, select a
//! schema, run ad-hoc SQL, and prepare/bind/execute parameterized statements whose
//! results come back as a [`ResultSet`].

#[cfg(feature = "postgres")]
pub mod pg;

use crate::config::DatabaseConfig;
use crate::error::OrmError;
use crate::results::ResultSet;
use crate::types::SqlValue;

/// An open, possibly stateful handle to one backend session.
pub trait Connection: Send {
    /// Liveness check. A connection can go stale server-side at any time.
    fn is_valid(&mut self) -> bool;

    /// Make `schema` the active database/schema for subsequent statements.
    ///
    /// # Errors
    /// Returns `OrmError::Driver` if the backend rejects the schema.
    fn set_schema(&mut self, schema: &str) -> Result<(), OrmError>;

    /// Run one or more statements without parameters.
    ///
    /// # Errors
    /// Returns `OrmError::Driver` on any backend failure.
    fn execute(&mut self, sql: &str) -> Result<(), OrmError>;

    /// Prepare a parameterized statement. `sql` already uses the backend's native markers.
    ///
    /// # Errors
    /// Returns `OrmError::Driver` if the statement cannot be prepared.
    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn PreparedStatement + 'c>, OrmError>;
}

/// A prepared statement with positional parameters bound from index 1.
pub trait PreparedStatement {
    /// Bind `value` at 1-based position `index`. `SqlValue::Null` binds SQL NULL.
    ///
    /// # Errors
    /// Returns `OrmError::Driver` if the index is out of range or the value cannot be bound.
    fn bind(&mut self, index: usize, value: &SqlValue) -> Result<(), OrmError>;

    /// Execute a statement that returns no rows; yields the affected-row count.
    ///
    /// # Errors
    /// Returns `OrmError::Driver` on execution failure.
    fn execute_update(&mut self) -> Result<u64, OrmError>;

    /// Execute a statement that returns rows.
    ///
    /// # Errors
    /// Returns `OrmError::Driver` on execution failure.
    fn execute_query(&mut self) -> Result<ResultSet, OrmError>;
}

/// Opens new connections for a pool.
pub trait Driver: Send + Sync {
    /// Open a fresh connection.
    ///
    /// # Errors
    /// Returns `OrmError::Connection` (or a raw driver error) if the backend is unreachable.
    fn connect(&self) -> Result<Box<dyn Connection>, OrmError>;

    /// Short backend name used in log lines.
    fn name(&self) -> &'static str;
}

/// Bind a full parameter list in order, starting at position 1.
///
/// # Errors
/// Propagates the first binding failure.
pub fn bind_all(stmt: &mut dyn PreparedStatement, params: &[SqlValue]) -> Result<(), OrmError> {
    for (offset, value) in params.iter().enumerate() {
        stmt.bind(offset + 1, value)?;
    }
    Ok(())
}

/// Pick the compiled-in driver for `config.driver`.
///
/// # Errors
/// Returns `OrmError::Connection` when the configured backend is not compiled into this build.
pub fn driver_for(config: &DatabaseConfig) -> Result<Box<dyn Driver>, OrmError> {
    match config.driver {
        #[cfg(feature = "postgres")]
        crate::config::DriverKind::Postgres => Ok(Box::new(pg::PostgresDriver::new(config))),
        #[allow(unreachable_patterns)]
        kind => Err(OrmError::Connection(format!(
            "{kind:?} driver is not compiled into this build"
        ))),
    }
}
