use std::sync::Arc;

use crate::config::DatabaseConfig;
use crate::driver::Driver;
use crate::error::OrmError;
use crate::mapper::Mapper;
use crate::pool::ConnectionPool;
use crate::registry::Registry;
use crate::schema::SchemaGenerator;

/// Application-level handle owning the connection pool and the entity registry.
///
/// Cheap to clone; every clone shares the same pool.
/// ```rust,no_run
/// use sql_mapper::prelude::*;
///
/// #[derive(Debug, Default)]
/// struct Note {
///     id: i64,
///     body: String,
/// }
///
/// impl Entity for Note {
///     fn table() -> TableDescriptor<Self> {
///         TableDescriptor::new("notes")
///             .field(field!(Note, id).constraints("PRIMARY KEY AUTO_INCREMENT"))
///             .field(field!(Note, body))
///     }
/// }
///
/// let config = DatabaseConfig::from_json_file("config.json")?;
/// let registry = Registry::builder().entity::<Note>()?.build();
/// let db = Database::connect(config, registry)?;
/// db.schema().create_table::<Note>()?;
/// let mut note = Note { id: 0, body: "hello".into() };
/// db.mapper::<Note>()?.save(&mut note)?;
/// # Ok::<(), OrmError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Database {
    pool: Arc<ConnectionPool>,
    registry: Arc<Registry>,
}

impl Database {
    /// Build the pool for `config` with its compiled-in driver.
    ///
    /// # Errors
    /// Returns `OrmError::Config` or `OrmError::Connection` from pool construction.
    pub fn connect(config: DatabaseConfig, registry: Registry) -> Result<Self, OrmError> {
        let pool = ConnectionPool::new(config)?;
        Ok(Self::from_parts(pool, registry))
    }

    /// Build the pool around an explicit driver.
    ///
    /// # Errors
    /// Returns `OrmError::Config` if `config` fails validation.
    pub fn with_driver(
        config: DatabaseConfig,
        driver: Box<dyn Driver>,
        registry: Registry,
    ) -> Result<Self, OrmError> {
        let pool = ConnectionPool::with_driver(config, driver)?;
        Ok(Self::from_parts(pool, registry))
    }

    #[must_use]
    pub fn from_parts(pool: ConnectionPool, registry: Registry) -> Self {
        Self {
            pool: Arc::new(pool),
            registry: Arc::new(registry),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mapper for a registered entity type.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` if `T` is not registered.
    pub fn mapper<T: Default + 'static>(&self) -> Result<Mapper<'_, T>, OrmError> {
        Mapper::new(&self.pool, &self.registry)
    }

    #[must_use]
    pub fn schema(&self) -> SchemaGenerator<'_> {
        SchemaGenerator::new(&self.pool, &self.registry)
    }
}
