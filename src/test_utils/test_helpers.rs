//! Helper utilities for testing and development.

use crate::config::{AcquirePolicy, DatabaseConfig, DriverKind};
use crate::pool::ConnectionPool;
use crate::results::ResultSet;
use crate::types::SqlValue;

use super::MemoryDriver;

/// A valid configuration pointing nowhere in particular; the memory backend ignores the address.
#[must_use]
pub fn test_config(driver: DriverKind, pool_size: usize) -> DatabaseConfig {
    DatabaseConfig {
        driver,
        hostname: "localhost".to_string(),
        port: match driver {
            DriverKind::MySql => 3306,
            DriverKind::Postgres => 5432,
        },
        username: "test".to_string(),
        password: "test".to_string(),
        database: "test_db".to_string(),
        pool_size: i64::try_from(pool_size).unwrap_or(i64::MAX),
        acquire_policy: AcquirePolicy::Strict,
        max_overflow: 1,
        acquire_timeout_ms: None,
    }
}

/// Pool over a fresh memory backend, plus the backend handle for inspection.
///
/// # Errors
/// Returns `OrmError::Config` if `config` is invalid.
pub fn memory_pool(
    config: DatabaseConfig,
) -> Result<(ConnectionPool, MemoryDriver), crate::OrmError> {
    let driver = MemoryDriver::new();
    let pool = ConnectionPool::with_driver(config, driver.boxed())?;
    Ok((pool, driver))
}

/// Create a result set with the given column names and rows.
#[must_use]
pub fn create_test_result_set(column_names: &[&str], rows: Vec<Vec<SqlValue>>) -> ResultSet {
    let names = column_names.iter().map(|name| (*name).to_string()).collect();
    let mut result = ResultSet::with_capacity(names, rows.len());
    for row in rows {
        result.add_row_values(row);
    }
    result
}
