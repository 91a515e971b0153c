//! In-process backend for tests and benchmarks.
//!
//! Understands the statements the mapper and schema generator emit (CREATE/DROP/TRUNCATE,
//! INSERT with optional RETURNING, SELECT with WHERE/ORDER BY/LIMIT/OFFSET, COUNT(*),
//! UPDATE, DELETE, `SELECT LAST_INSERT_ID()`), with either `?` or `$N` markers and either
//! quoting style. Every clone of a [`MemoryDriver`] shares one database.

mod engine;
mod sql;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::driver::{Connection, Driver, PreparedStatement};
use crate::error::OrmError;
use crate::results::ResultSet;
use crate::translation::{PlaceholderStyle, count_placeholders_in};
use crate::types::SqlValue;

use engine::{Catalog, Outcome};

#[derive(Debug, Default)]
struct Shared {
    catalog: Catalog,
    log: Vec<String>,
    schema: Option<String>,
    generation: u64,
    fail_connects: usize,
    refuse_connects: bool,
    fail_next_statement: Option<String>,
    live: usize,
    max_live: usize,
    opened: usize,
}

/// Fake [`Driver`] backed by shared in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        lock_shared(&self.shared)
    }

    /// Boxed clone for handing to a pool while keeping this handle for inspection.
    #[must_use]
    pub fn boxed(&self) -> Box<dyn Driver> {
        Box::new(self.clone())
    }

    /// Every statement executed so far, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn clear_statements(&self) {
        self.lock().log.clear();
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.lock().fail_connects = count;
    }

    /// Refuse every connection attempt until switched back.
    pub fn refuse_connects(&self, refuse: bool) {
        self.lock().refuse_connects = refuse;
    }

    /// Make the next executed statement fail with `message`.
    pub fn fail_next_statement(&self, message: impl Into<String>) {
        self.lock().fail_next_statement = Some(message.into());
    }

    /// Mark every open connection stale so its next validity check fails.
    pub fn invalidate_connections(&self) {
        self.lock().generation += 1;
    }

    /// Connections currently open.
    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.lock().live
    }

    /// Highest number of connections that were open at the same time.
    #[must_use]
    pub fn max_live_connections(&self) -> usize {
        self.lock().max_live
    }

    /// Total successful connection attempts.
    #[must_use]
    pub fn connections_opened(&self) -> usize {
        self.lock().opened
    }

    /// Schema most recently selected on any connection.
    #[must_use]
    pub fn active_schema(&self) -> Option<String> {
        self.lock().schema.clone()
    }

    #[must_use]
    pub fn has_table(&self, table: &str) -> bool {
        self.lock().catalog.table(table).is_some()
    }

    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.lock().catalog.table(table).map(engine::Table::len)
    }
}

fn lock_shared(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Driver for MemoryDriver {
    fn connect(&self) -> Result<Box<dyn Connection>, OrmError> {
        let mut shared = self.lock();
        if shared.refuse_connects {
            return Err(OrmError::Connection("memory backend refused connection".into()));
        }
        if shared.fail_connects > 0 {
            shared.fail_connects -= 1;
            return Err(OrmError::Connection("memory backend connection failed".into()));
        }
        shared.live += 1;
        shared.opened += 1;
        shared.max_live = shared.max_live.max(shared.live);
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            generation: shared.generation,
            last_insert_id: 0,
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Session on a [`MemoryDriver`] database.
pub struct MemoryConnection {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    last_insert_id: i64,
}

impl MemoryConnection {
    fn run(&mut self, sql: &str, params: &[Option<SqlValue>]) -> Result<Outcome, OrmError> {
        let mut shared = lock_shared(&self.shared);
        shared.log.push(sql.to_string());
        if let Some(message) = shared.fail_next_statement.take() {
            return Err(OrmError::Driver(message));
        }
        let command = sql::parse(sql, params)?;
        shared.catalog.run(command, &mut self.last_insert_id)
    }
}

impl Connection for MemoryConnection {
    fn is_valid(&mut self) -> bool {
        lock_shared(&self.shared).generation == self.generation
    }

    fn set_schema(&mut self, schema: &str) -> Result<(), OrmError> {
        let mut shared = lock_shared(&self.shared);
        shared.log.push(format!("USE {schema}"));
        shared.schema = Some(schema.to_string());
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<(), OrmError> {
        self.run(sql, &[]).map(|_| ())
    }

    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn PreparedStatement + 'c>, OrmError> {
        // either marker style may arrive, depending on the pool's dialect
        let slots = count_placeholders_in(sql, PlaceholderStyle::Question)
            .max(count_placeholders_in(sql, PlaceholderStyle::Dollar));
        Ok(Box::new(MemoryStatement {
            conn: self,
            sql: sql.to_string(),
            params: vec![None; slots],
        }))
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut shared = lock_shared(&self.shared);
        shared.live = shared.live.saturating_sub(1);
    }
}

struct MemoryStatement<'c> {
    conn: &'c mut MemoryConnection,
    sql: String,
    params: Vec<Option<SqlValue>>,
}

impl PreparedStatement for MemoryStatement<'_> {
    fn bind(&mut self, index: usize, value: &SqlValue) -> Result<(), OrmError> {
        let len = self.params.len();
        let slot = index
            .checked_sub(1)
            .and_then(|i| self.params.get_mut(i))
            .ok_or_else(|| {
                OrmError::Driver(format!(
                    "bind index {index} out of range for {len} parameters"
                ))
            })?;
        *slot = Some(value.clone());
        Ok(())
    }

    fn execute_update(&mut self) -> Result<u64, OrmError> {
        match self.conn.run(&self.sql, &self.params)? {
            Outcome::Affected(n) => Ok(n),
            Outcome::Rows(rows) => Ok(rows.len() as u64),
        }
    }

    fn execute_query(&mut self) -> Result<ResultSet, OrmError> {
        match self.conn.run(&self.sql, &self.params)? {
            Outcome::Rows(rows) => Ok(rows),
            Outcome::Affected(_) => Err(OrmError::Driver(format!(
                "statement returned no rows: {}",
                self.sql
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::bind_all;

    fn exec(conn: &mut Box<dyn Connection>, sql: &str, params: &[SqlValue]) -> u64 {
        let mut stmt = conn.prepare(sql).unwrap();
        bind_all(&mut *stmt, params).unwrap();
        stmt.execute_update().unwrap()
    }

    fn query(conn: &mut Box<dyn Connection>, sql: &str, params: &[SqlValue]) -> ResultSet {
        let mut stmt = conn.prepare(sql).unwrap();
        bind_all(&mut *stmt, params).unwrap();
        stmt.execute_query().unwrap()
    }

    #[test]
    fn crud_round_trip() {
        let driver = MemoryDriver::new();
        let mut conn = driver.connect().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS `t` (`id` INT PRIMARY KEY AUTO_INCREMENT, `name` VARCHAR(255) NOT NULL UNIQUE, `qty` INT DEFAULT 3);",
        )
        .unwrap();

        exec(&mut conn, "INSERT INTO `t` (`name`) VALUES (?)", &[SqlValue::from("a")]);
        exec(
            &mut conn,
            "INSERT INTO `t` (`name`, `qty`) VALUES (?, ?)",
            &[SqlValue::from("b"), SqlValue::I32(9)],
        );
        let id = query(&mut conn, "SELECT LAST_INSERT_ID()", &[]);
        assert_eq!(id.first().unwrap().get_i64("LAST_INSERT_ID()").unwrap(), 2);

        let rows = query(
            &mut conn,
            "SELECT * FROM `t` WHERE qty > ? ORDER BY name DESC",
            &[SqlValue::I32(1)],
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.first().unwrap().get_string("name").unwrap(), "b");
        assert_eq!(rows.iter().nth(1).unwrap().get_i64("qty").unwrap(), 3);

        let updated = exec(
            &mut conn,
            "UPDATE `t` SET `qty` = ? WHERE `id` = ?",
            &[SqlValue::I32(0), SqlValue::I64(1)],
        );
        assert_eq!(updated, 1);
        assert_eq!(exec(&mut conn, "DELETE FROM `t` WHERE qty = ?", &[SqlValue::I32(0)]), 1);
        assert_eq!(driver.row_count("t"), Some(1));
    }

    #[test]
    fn unique_and_not_null_are_enforced() {
        let driver = MemoryDriver::new();
        let mut conn = driver.connect().unwrap();
        conn.execute(
            "CREATE TABLE \"t\" (\"id\" BIGINT PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY, \
             \"name\" VARCHAR(255) NOT NULL UNIQUE)",
        )
        .unwrap();
        let rows = query(
            &mut conn,
            "INSERT INTO \"t\" (\"name\") VALUES ($1) RETURNING \"id\"",
            &[SqlValue::from("x")],
        );
        assert_eq!(rows.first().unwrap().get_i64("id").unwrap(), 1);

        let mut dup = conn.prepare("INSERT INTO \"t\" (\"name\") VALUES ($1)").unwrap();
        dup.bind(1, &SqlValue::from("x")).unwrap();
        assert!(dup.execute_update().unwrap_err().to_string().contains("duplicate"));
        drop(dup);

        let mut null = conn.prepare("INSERT INTO \"t\" (\"name\") VALUES ($1)").unwrap();
        null.bind(1, &SqlValue::Null).unwrap();
        assert!(null.execute_update().is_err());
    }

    #[test]
    fn numbered_markers_get_bind_slots() {
        let driver = MemoryDriver::new();
        let mut conn = driver.connect().unwrap();
        conn.execute(
            "CREATE TABLE \"t\" (\"id\" INTEGER PRIMARY KEY, \"name\" VARCHAR(255), \"qty\" INTEGER)",
        )
        .unwrap();
        exec(
            &mut conn,
            "INSERT INTO \"t\" (\"id\", \"name\", \"qty\") VALUES ($1, $2, $3)",
            &[SqlValue::I32(1), SqlValue::from("a"), SqlValue::I32(4)],
        );
        let rows = query(
            &mut conn,
            "SELECT * FROM \"t\" WHERE qty BETWEEN $1 AND $2 AND name = $3",
            &[SqlValue::I32(1), SqlValue::I32(5), SqlValue::from("a")],
        );
        assert_eq!(rows.len(), 1);

        let mut stmt = conn.prepare("DELETE FROM \"t\" WHERE id = $1").unwrap();
        let err = stmt.bind(2, &SqlValue::I32(1)).unwrap_err();
        assert!(err.to_string().contains("out of range for 1 parameters"));
    }

    #[test]
    fn connection_bookkeeping() {
        let driver = MemoryDriver::new();
        let mut a = driver.connect().unwrap();
        let b = driver.connect().unwrap();
        assert_eq!(driver.live_connections(), 2);
        drop(b);
        assert_eq!(driver.live_connections(), 1);
        assert_eq!(driver.max_live_connections(), 2);

        assert!(a.is_valid());
        driver.invalidate_connections();
        assert!(!a.is_valid());

        driver.fail_next_connects(1);
        assert!(driver.connect().is_err());
        assert!(driver.connect().is_ok());
    }

    #[test]
    fn injected_statement_failure_is_one_shot() {
        let driver = MemoryDriver::new();
        let mut conn = driver.connect().unwrap();
        driver.fail_next_statement("disk full");
        let err = conn.execute("CREATE TABLE t (a INT)").unwrap_err();
        assert_eq!(err.to_string(), "Driver error: disk full");
        conn.execute("CREATE TABLE t (a INT)").unwrap();
        assert!(driver.has_table("t"));
    }
}
