//! Blocking connection pool.
//!
//! Callers lease a connection with [`ConnectionPool::acquire`] and give it back by dropping
//! the returned [`PooledConnection`], so release happens on every exit path.

mod lease;

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::config::DatabaseConfig;
use crate::dialect::Dialect;
use crate::driver::{Connection, Driver, driver_for};
use crate::error::OrmError;

pub use lease::PooledConnection;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections queued and ready to lend.
    pub idle: usize,
    /// Connections that exist right now, idle or leased.
    pub live: usize,
    /// Upper bound on `live` under the configured acquire policy.
    pub capacity: usize,
}

struct PoolState {
    idle: VecDeque<Box<dyn Connection>>,
    live: usize,
}

/// Owns every connection it has not lent out, plus the dialect chosen for its backend.
pub struct ConnectionPool {
    state: Mutex<PoolState>,
    returned: Condvar,
    driver: Box<dyn Driver>,
    dialect: Dialect,
    config: DatabaseConfig,
}

impl ConnectionPool {
    /// Build a pool using the driver compiled in for `config.driver`.
    ///
    /// # Errors
    /// Returns `OrmError::Config` for an invalid configuration and `OrmError::Connection`
    /// when no driver for the configured backend is compiled into this build.
    pub fn new(config: DatabaseConfig) -> Result<Self, OrmError> {
        config.validate()?;
        let driver = driver_for(&config)?;
        Self::with_driver(config, driver)
    }

    /// Build a pool around an explicit driver and open `pool_size` connections eagerly.
    ///
    /// Connections that fail to open during warm-up are logged and left out, so the pool may
    /// start smaller than requested.
    ///
    /// # Errors
    /// Returns `OrmError::Config` if `config` fails validation.
    pub fn with_driver(config: DatabaseConfig, driver: Box<dyn Driver>) -> Result<Self, OrmError> {
        config.validate()?;
        let pool = Self {
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                live: 0,
            }),
            returned: Condvar::new(),
            dialect: Dialect::from(config.driver),
            driver,
            config,
        };
        pool.warm_up();
        Ok(pool)
    }

    fn warm_up(&self) {
        let wanted = self.config.pool_size();
        let mut opened = VecDeque::new();
        for attempt in 1..=wanted {
            match self.open() {
                Ok(conn) => opened.push_back(conn),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt,
                        driver = self.driver.name(),
                        "connection failed during pool warm-up"
                    );
                }
            }
        }
        if opened.len() < wanted {
            tracing::warn!(
                opened = opened.len(),
                wanted,
                "pool started with fewer connections than configured"
            );
        }
        let mut state = self.lock();
        state.live = opened.len();
        state.idle = opened;
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a fresh connection and select the configured schema where the backend needs it.
    fn open(&self) -> Result<Box<dyn Connection>, OrmError> {
        let mut conn = self.driver.connect().map_err(|e| match e {
            OrmError::Connection(_) => e,
            other => OrmError::Connection(other.to_string()),
        })?;
        if self.dialect == Dialect::MySql {
            if let Err(e) = conn.set_schema(&self.config.database) {
                tracing::warn!(
                    error = %e,
                    schema = %self.config.database,
                    "failed to select schema on new connection"
                );
            }
        }
        Ok(conn)
    }

    fn creation_limit(&self) -> usize {
        self.config.capacity()
    }

    /// Lease a connection, blocking while none is available.
    ///
    /// Queued connections are re-validated and replaced when stale. With the queue empty, a
    /// new connection is opened if the acquire policy leaves room; otherwise the caller waits
    /// for a return (bounded by `acquire_timeout_ms` when set).
    ///
    /// # Errors
    /// Returns `OrmError::Connection` when a replacement cannot be opened, when nothing can be
    /// opened and no connection is out to wait for, or when the acquire timeout elapses.
    pub fn acquire(&self) -> Result<PooledConnection<'_>, OrmError> {
        let deadline = self.config.acquire_timeout().map(|t| Instant::now() + t);
        let mut may_create = true;
        let mut state = self.lock();

        loop {
            if let Some(candidate) = state.idle.pop_front() {
                drop(state);
                let conn = self.revalidate(candidate)?;
                tracing::debug!("leased pooled connection");
                return Ok(PooledConnection::new(self, conn));
            }

            if may_create && state.live < self.creation_limit() {
                state.live += 1;
                drop(state);
                match self.open() {
                    Ok(conn) => {
                        tracing::debug!("leased newly opened connection");
                        return Ok(PooledConnection::new(self, conn));
                    }
                    Err(e) => {
                        state = self.lock();
                        state.live -= 1;
                        if state.live == 0 {
                            return Err(e);
                        }
                        tracing::warn!(
                            error = %e,
                            "could not open connection, waiting for a return"
                        );
                        may_create = false;
                        continue;
                    }
                }
            }

            if state.live == 0 {
                return Err(OrmError::Connection(
                    "pool has no connections and cannot open one".to_string(),
                ));
            }

            state = match deadline {
                None => self
                    .returned
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(OrmError::Connection(format!(
                            "timed out after {:?} waiting for a connection",
                            self.config.acquire_timeout().unwrap_or_default()
                        )));
                    }
                    self.returned
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Check a queued connection; swap it for a fresh one if the check fails.
    fn revalidate(
        &self,
        mut candidate: Box<dyn Connection>,
    ) -> Result<Box<dyn Connection>, OrmError> {
        if candidate.is_valid() {
            return Ok(candidate);
        }
        tracing::debug!("discarding stale connection");
        drop(candidate);
        self.open().inspect_err(|_| {
            self.lock().live -= 1;
            self.returned.notify_one();
        })
    }

    /// Take a connection back from a lease and wake one waiter.
    fn release(&self, conn: Box<dyn Connection>) {
        let mut state = self.lock();
        if state.live > self.config.pool_size() {
            // overflow connection from a burst; let the pool shrink back
            state.live -= 1;
            drop(state);
            drop(conn);
            tracing::debug!("closed overflow connection on return");
        } else {
            state.idle.push_back(conn);
            drop(state);
            tracing::debug!("returned connection to pool");
        }
        self.returned.notify_one();
    }

    /// Dialect chosen from the configured driver kind; fixed for the pool's lifetime.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.lock();
        PoolStatus {
            idle: state.idle.len(),
            live: state.live,
            capacity: self.creation_limit(),
        }
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let closed = state.idle.len();
        state.idle.clear();
        tracing::debug!(closed, "connection pool shut down");
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("driver", &self.driver.name())
            .field("dialect", &self.dialect)
            .field("status", &self.status())
            .finish()
    }
}
