use std::ops::{Deref, DerefMut};

use crate::driver::{Connection, PreparedStatement};
use crate::error::OrmError;

use super::ConnectionPool;

/// Exclusive lease on a pooled connection; dropping it hands the connection back.
///
/// The lease borrows the pool, so it can never outlive it.
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Box<dyn Connection>,
}

impl<'a> PooledConnection<'a> {
    pub(super) fn new(pool: &'a ConnectionPool, conn: Box<dyn Connection>) -> Self {
        Self { pool, conn }
    }
}

impl Deref for PooledConnection<'_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        &*self.conn
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.conn
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        let conn = std::mem::replace(&mut self.conn, Box::new(Returned));
        self.pool.release(conn);
    }
}

/// Stand-in left behind in a lease while its connection goes back to the pool.
struct Returned;

impl Connection for Returned {
    fn is_valid(&mut self) -> bool {
        false
    }

    fn set_schema(&mut self, _schema: &str) -> Result<(), OrmError> {
        Err(returned())
    }

    fn execute(&mut self, _sql: &str) -> Result<(), OrmError> {
        Err(returned())
    }

    fn prepare<'c>(&'c mut self, _sql: &str) -> Result<Box<dyn PreparedStatement + 'c>, OrmError> {
        Err(returned())
    }
}

fn returned() -> OrmError {
    OrmError::Connection("connection already returned to the pool".to_string())
}
