use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Deserializer};

use crate::error::OrmError;

/// Backend family a pool talks to.
///
/// Unrecognized or missing driver names fall back to the primary backend (`MySql`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum DriverKind {
    /// MySQL / MariaDB
    #[default]
    MySql,
    /// `PostgreSQL`
    Postgres,
}

impl DriverKind {
    /// Resolve a driver name from configuration.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => DriverKind::Postgres,
            _ => DriverKind::MySql,
        }
    }
}

impl<'de> Deserialize<'de> for DriverKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(DriverKind::from_name(&name))
    }
}

/// What `acquire` does when no idle connection is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AcquirePolicy {
    /// Never exceed `pool_size` live connections; block until one is returned.
    #[default]
    Strict,
    /// Open up to `max_overflow` extra connections to absorb bursts before blocking.
    Burst,
}

/// Largest accepted `pool_size`, and largest accepted `max_overflow`.
pub const MAX_POOL_SIZE: usize = 10_000;

fn default_max_overflow() -> usize {
    1
}

/// Database settings the connection pool is built from.
///
/// Loaded from a JSON document of the form `{"DataBaseConfig": { ... }}`:
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let cfg = DatabaseConfig::from_json_str(r#"{
///     "DataBaseConfig": {
///         "driver": "postgresql",
///         "hostname": "127.0.0.1",
///         "port": 5432,
///         "username": "app",
///         "password": "secret",
///         "dataname": "shop",
///         "poolsize": 4
///     }
/// }"#)?;
/// assert_eq!(cfg.driver, DriverKind::Postgres);
/// # Ok::<(), OrmError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub driver: DriverKind,
    pub hostname: String,
    pub port: i64,
    pub username: String,
    pub password: String,
    #[serde(alias = "dataname")]
    pub database: String,
    #[serde(alias = "poolsize")]
    pub pool_size: i64,
    #[serde(default)]
    pub acquire_policy: AcquirePolicy,
    #[serde(default = "default_max_overflow")]
    pub max_overflow: usize,
    #[serde(default)]
    pub acquire_timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
struct ConfigDocument {
    #[serde(rename = "DataBaseConfig")]
    database: DatabaseConfig,
}

impl DatabaseConfig {
    /// Parse and validate a configuration document.
    ///
    /// # Errors
    /// Returns `OrmError::Config` if the document is malformed or any field fails validation.
    pub fn from_json_str(json: &str) -> Result<Self, OrmError> {
        let doc: ConfigDocument = serde_json::from_str(json)?;
        doc.database.validate()?;
        Ok(doc.database)
    }

    /// Read, parse and validate a configuration file.
    ///
    /// # Errors
    /// Returns `OrmError::Config` if the file cannot be read, is malformed, or fails validation.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, OrmError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            OrmError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    #[must_use]
    pub fn builder() -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::default()
    }

    /// Check every field against its constraint.
    ///
    /// # Errors
    /// Returns `OrmError::Config` naming the first field that is missing or out of range.
    pub fn validate(&self) -> Result<(), OrmError> {
        if self.hostname.is_empty() {
            return Err(OrmError::Config("hostname is required".to_string()));
        }
        if !(1..=65535).contains(&self.port) {
            return Err(OrmError::Config(format!(
                "port must be within 1-65535, got {}",
                self.port
            )));
        }
        if self.username.is_empty() {
            return Err(OrmError::Config("username is required".to_string()));
        }
        if self.password.is_empty() {
            return Err(OrmError::Config("password is required".to_string()));
        }
        if self.database.is_empty() {
            return Err(OrmError::Config("database is required".to_string()));
        }
        if self.pool_size <= 0 {
            return Err(OrmError::Config(format!(
                "pool_size must be greater than zero, got {}",
                self.pool_size
            )));
        }
        if !usize::try_from(self.pool_size).is_ok_and(|size| size <= MAX_POOL_SIZE) {
            return Err(OrmError::Config(format!(
                "pool_size must be at most {MAX_POOL_SIZE}, got {}",
                self.pool_size
            )));
        }
        if self.max_overflow > MAX_POOL_SIZE {
            return Err(OrmError::Config(format!(
                "max_overflow must be at most {MAX_POOL_SIZE}, got {}",
                self.max_overflow
            )));
        }
        Ok(())
    }

    /// Validated pool size.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        usize::try_from(self.pool_size).unwrap_or(0)
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    /// Upper bound on live connections under the configured policy.
    #[must_use]
    pub fn capacity(&self) -> usize {
        match self.acquire_policy {
            AcquirePolicy::Strict => self.pool_size(),
            AcquirePolicy::Burst => self.pool_size().saturating_add(self.max_overflow),
        }
    }
}

/// Fluent builder for `DatabaseConfig`.
#[derive(Debug, Clone)]
pub struct DatabaseConfigBuilder {
    cfg: DatabaseConfig,
}

impl Default for DatabaseConfigBuilder {
    fn default() -> Self {
        Self {
            cfg: DatabaseConfig {
                driver: DriverKind::default(),
                hostname: String::new(),
                port: 0,
                username: String::new(),
                password: String::new(),
                database: String::new(),
                pool_size: 0,
                acquire_policy: AcquirePolicy::default(),
                max_overflow: default_max_overflow(),
                acquire_timeout_ms: None,
            },
        }
    }
}

impl DatabaseConfigBuilder {
    #[must_use]
    pub fn driver(mut self, driver: DriverKind) -> Self {
        self.cfg.driver = driver;
        self
    }

    #[must_use]
    pub fn host(mut self, hostname: impl Into<String>, port: u16) -> Self {
        self.cfg.hostname = hostname.into();
        self.cfg.port = i64::from(port);
        self
    }

    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.cfg.username = username.into();
        self.cfg.password = password.into();
        self
    }

    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.cfg.database = database.into();
        self
    }

    #[must_use]
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.cfg.pool_size = i64::try_from(pool_size).unwrap_or(i64::MAX);
        self
    }

    #[must_use]
    pub fn acquire_policy(mut self, policy: AcquirePolicy) -> Self {
        self.cfg.acquire_policy = policy;
        self
    }

    #[must_use]
    pub fn max_overflow(mut self, max_overflow: usize) -> Self {
        self.cfg.max_overflow = max_overflow;
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.acquire_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Finish and validate.
    ///
    /// # Errors
    /// Returns `OrmError::Config` if any field fails validation.
    pub fn build(self) -> Result<DatabaseConfig, OrmError> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "DataBaseConfig": {
            "hostname": "localhost",
            "port": 3306,
            "username": "root",
            "password": "pw",
            "dataname": "shop",
            "poolsize": 8
        }
    }"#;

    #[test]
    fn legacy_keys_and_default_driver() {
        let cfg = DatabaseConfig::from_json_str(VALID).unwrap();
        assert_eq!(cfg.driver, DriverKind::MySql);
        assert_eq!(cfg.database, "shop");
        assert_eq!(cfg.pool_size(), 8);
        assert_eq!(cfg.acquire_policy, AcquirePolicy::Strict);
        assert_eq!(cfg.capacity(), 8);
    }

    #[test]
    fn unknown_driver_falls_back_to_mysql() {
        assert_eq!(DriverKind::from_name("PostgreSQL"), DriverKind::Postgres);
        assert_eq!(DriverKind::from_name("oracle"), DriverKind::MySql);
    }

    #[test]
    fn out_of_range_fields_are_rejected() {
        let bad_port = VALID.replace("3306", "70000");
        let err = DatabaseConfig::from_json_str(&bad_port).unwrap_err();
        assert!(err.to_string().contains("port"));

        let bad_pool = VALID.replace("\"poolsize\": 8", "\"poolsize\": 0");
        assert!(matches!(
            DatabaseConfig::from_json_str(&bad_pool),
            Err(OrmError::Config(_))
        ));
    }

    #[test]
    fn missing_field_is_a_config_error() {
        let missing = VALID.replace("\"password\": \"pw\",", "");
        assert!(matches!(
            DatabaseConfig::from_json_str(&missing),
            Err(OrmError::Config(_))
        ));
    }

    #[test]
    fn pool_size_and_overflow_are_bounded() {
        let huge = VALID.replace("\"poolsize\": 8", &format!("\"poolsize\": {}", i64::MAX));
        let err = DatabaseConfig::from_json_str(&huge).unwrap_err();
        assert!(err.to_string().contains("pool_size must be at most"));

        let at_limit = VALID.replace("\"poolsize\": 8", &format!("\"poolsize\": {MAX_POOL_SIZE}"));
        assert!(DatabaseConfig::from_json_str(&at_limit).is_ok());

        let overflow = DatabaseConfig::builder()
            .host("db", 3306)
            .credentials("u", "p")
            .database("d")
            .pool_size(1)
            .acquire_policy(AcquirePolicy::Burst)
            .max_overflow(usize::MAX)
            .build();
        assert!(matches!(overflow, Err(OrmError::Config(ref m)) if m.contains("max_overflow")));
    }

    #[test]
    fn builder_burst_capacity() {
        let cfg = DatabaseConfig::builder()
            .host("db", 5432)
            .credentials("u", "p")
            .database("d")
            .pool_size(2)
            .acquire_policy(AcquirePolicy::Burst)
            .max_overflow(3)
            .build()
            .unwrap();
        assert_eq!(cfg.capacity(), 5);
    }
}
