//! Blocking object-relational mapper over pooled connections.
//!
//! Entity types describe their table once ([`Entity`] / [`RegistryBuilder`]); a [`Mapper`]
//! then turns entities and [`Query`] filters into parameterized SQL for the configured
//! [`Dialect`], runs it on a leased connection, and materializes rows back into entities.
//! [`SchemaGenerator`] derives `CREATE TABLE` / `DROP TABLE` from the same metadata.

pub mod prelude;

pub use crate::config::{AcquirePolicy, DatabaseConfig, DatabaseConfigBuilder, DriverKind};
pub use crate::database::Database;
pub use crate::dialect::Dialect;
pub use crate::error::OrmError;
pub use crate::mapper::{Mapper, Statement};
pub use crate::pool::{ConnectionPool, PoolStatus, PooledConnection};
pub use crate::query::Query;
pub use crate::registry::{
    Constraints, Entity, FieldDescriptor, Registry, RegistryBuilder, TableDescriptor,
};
pub use crate::results::{ResultSet, Row};
pub use crate::schema::SchemaGenerator;
pub use crate::types::{FieldValue, SqlType, SqlValue};

pub mod config;
pub mod database;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod mapper;
pub mod pool;
pub mod query;
pub mod registry;
pub mod results;
pub mod schema;
pub mod translation;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;
