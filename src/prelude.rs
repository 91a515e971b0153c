//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and macros
//! to make it easier to get started with the library.

pub use crate::config::{AcquirePolicy, DatabaseConfig, DriverKind};
pub use crate::database::Database;
pub use crate::dialect::Dialect;
pub use crate::driver::{Connection, Driver, PreparedStatement};
pub use crate::error::OrmError;
pub use crate::mapper::{Mapper, Statement};
pub use crate::pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use crate::query::Query;
pub use crate::registry::{Entity, FieldDescriptor, Registry, TableDescriptor};
pub use crate::results::{ResultSet, Row};
pub use crate::schema::SchemaGenerator;
pub use crate::translation::PlaceholderStyle;
pub use crate::types::{FieldValue, SqlType, SqlValue};
pub use crate::{field, sql_params};

#[cfg(feature = "postgres")]
pub use crate::driver::pg::PostgresDriver;

#[cfg(feature = "test-utils")]
pub use crate::test_utils::MemoryDriver;
