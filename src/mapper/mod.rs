//! Typed CRUD over one registered entity type.

mod dml;
mod select;
mod statements;

use std::sync::Arc;

use crate::dialect::Dialect;
use crate::driver::bind_all;
use crate::error::OrmError;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::registry::{Registry, TableDescriptor};
use crate::results::ResultSet;
use crate::types::SqlValue;

pub use statements::Statement;

/// Build a `Vec<SqlValue>` from heterogeneous arguments for [`Mapper::find`]:
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let params = sql_params!["Mug", 5, true];
/// assert_eq!(params[1], SqlValue::I32(5));
/// ```
#[macro_export]
macro_rules! sql_params {
    () => {
        ::std::vec::Vec::<$crate::types::SqlValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::types::SqlValue::from($value)),+]
    };
}

/// Turns entities of type `T` into SQL and rows back into entities.
///
/// Every executing operation leases exactly one connection from the pool for its duration.
pub struct Mapper<'p, T> {
    pool: &'p ConnectionPool,
    table: Arc<TableDescriptor<T>>,
}

impl<'p, T: Default + 'static> Mapper<'p, T> {
    /// Mapper for `T` using the descriptor registered in `registry`.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` if `T` is not registered.
    pub fn new(pool: &'p ConnectionPool, registry: &Registry) -> Result<Self, OrmError> {
        Ok(Self::with_table(pool, registry.describe::<T>()?))
    }

    #[must_use]
    pub fn with_table(pool: &'p ConnectionPool, table: Arc<TableDescriptor<T>>) -> Self {
        Self { pool, table }
    }

    #[must_use]
    pub fn table(&self) -> &TableDescriptor<T> {
        &self.table
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.pool.dialect()
    }

    fn lease(&self) -> Result<PooledConnection<'p>, OrmError> {
        self.pool.acquire()
    }
}

/// Prepare, bind and run a row-less statement on an already leased connection.
fn run_update(
    conn: &mut PooledConnection<'_>,
    operation: &'static str,
    stmt: &Statement,
) -> Result<u64, OrmError> {
    tracing::debug!(operation, sql = %stmt.sql, params = stmt.params.len(), "executing statement");
    let mut prepared = conn.prepare(&stmt.sql).map_err(|e| e.into_sql(operation))?;
    bind_all(&mut *prepared, &stmt.params).map_err(|e| e.into_sql(operation))?;
    prepared.execute_update().map_err(|e| e.into_sql(operation))
}

/// Prepare, bind and run a row-returning statement on an already leased connection.
fn run_query(
    conn: &mut PooledConnection<'_>,
    operation: &'static str,
    stmt: &Statement,
) -> Result<ResultSet, OrmError> {
    tracing::debug!(operation, sql = %stmt.sql, params = stmt.params.len(), "executing query");
    let mut prepared = conn.prepare(&stmt.sql).map_err(|e| e.into_sql(operation))?;
    bind_all(&mut *prepared, &stmt.params).map_err(|e| e.into_sql(operation))?;
    prepared.execute_query().map_err(|e| e.into_sql(operation))
}

/// First column of the first row as an integer, if there is one.
fn first_i64(rows: &ResultSet) -> Option<i64> {
    rows.first()
        .and_then(|row| row.get_by_index(0))
        .and_then(SqlValue::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, DriverKind};
    use crate::driver::{Connection, Driver};
    use crate::query::Query;
    use crate::registry::Entity;

    struct Offline;

    impl Driver for Offline {
        fn connect(&self) -> Result<Box<dyn Connection>, OrmError> {
            Err(OrmError::Connection("offline".into()))
        }

        fn name(&self) -> &'static str {
            "offline"
        }
    }

    fn pool(kind: DriverKind) -> ConnectionPool {
        let cfg = DatabaseConfig::builder()
            .driver(kind)
            .host("localhost", 1)
            .credentials("u", "p")
            .database("shop")
            .pool_size(1)
            .build()
            .unwrap();
        ConnectionPool::with_driver(cfg, Box::new(Offline)).unwrap()
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Product {
        id: i32,
        name: String,
        sku: String,
        price: f64,
    }

    impl Entity for Product {
        fn table() -> TableDescriptor<Self> {
            TableDescriptor::new("products")
                .field(crate::field!(Product, id).constraints("PRIMARY KEY AUTO_INCREMENT"))
                .field(crate::field!(Product, name).constraints("NOT_NULL"))
                .field(crate::field!(Product, sku).constraints("DEFAULT 'none'"))
                .field(crate::field!(Product, price))
        }
    }

    #[derive(Debug, Default)]
    struct LogLine {
        message: String,
    }

    fn mapper(pool: &ConnectionPool) -> Mapper<'_, Product> {
        Mapper::with_table(pool, Arc::new(Product::table()))
    }

    fn mug() -> Product {
        Product {
            id: 4,
            name: "Mug".into(),
            sku: String::new(),
            price: 9.99,
        }
    }

    #[test]
    fn insert_skips_auto_increment_and_empty_defaults() {
        let pool = pool(DriverKind::MySql);
        let stmt = mapper(&pool).insert_statement(&mug());
        assert_eq!(
            stmt.sql,
            "INSERT INTO `products` (`name`, `price`) VALUES (?, ?)"
        );
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("Mug".into()), SqlValue::Double(9.99)]
        );

        let mut with_sku = mug();
        with_sku.sku = "MG-1".into();
        assert_eq!(mapper(&pool).insert_statement(&with_sku).params.len(), 3);
    }

    #[test]
    fn postgres_insert_returns_key() {
        let pool = pool(DriverKind::Postgres);
        let stmt = mapper(&pool).insert_statement(&mug());
        assert_eq!(
            stmt.sql,
            "INSERT INTO \"products\" (\"name\", \"price\") VALUES ($1, $2) RETURNING \"id\""
        );
    }

    #[test]
    fn update_binds_set_values_before_key() {
        let pool = pool(DriverKind::MySql);
        let stmt = mapper(&pool).update_statement(&mug()).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE `products` SET `name` = ?, `sku` = ?, `price` = ? WHERE `id` = ?"
        );
        assert_eq!(stmt.params.last(), Some(&SqlValue::I32(4)));
        assert_eq!(stmt.params.len(), 4);
    }

    #[test]
    fn delete_uses_key_only() {
        let pool = pool(DriverKind::Postgres);
        let stmt = mapper(&pool).delete_statement(&mug()).unwrap();
        assert_eq!(stmt.sql, "DELETE FROM \"products\" WHERE \"id\" = $1");
        assert_eq!(stmt.params, vec![SqlValue::I32(4)]);
    }

    #[test]
    fn keyless_update_and_delete_are_rejected() {
        let pool = pool(DriverKind::MySql);
        let table = TableDescriptor::new("logs").field(crate::field!(LogLine, message));
        let mapper = Mapper::with_table(&pool, Arc::new(table));
        let line = LogLine::default();
        assert!(matches!(mapper.update_statement(&line), Err(OrmError::Mapping(_))));
        assert!(matches!(mapper.delete_statement(&line), Err(OrmError::Mapping(_))));
        assert!(matches!(mapper.update(&line), Err(OrmError::Mapping(_))));
    }

    #[test]
    fn select_and_count_follow_query() {
        let pool = pool(DriverKind::MySql);
        let q = Query::new()
            .greater_than("price", 5)
            .order_by("name", true)
            .limit(2)
            .offset(1);
        let m = mapper(&pool);
        assert_eq!(
            m.select_statement(&q).sql,
            "SELECT * FROM `products` WHERE price > ? ORDER BY name ASC LIMIT 2 OFFSET 1"
        );
        assert_eq!(
            m.count_statement(&q).sql,
            "SELECT COUNT(*) FROM `products` WHERE price > ?"
        );
        assert_eq!(m.count_statement(&Query::new()).sql, "SELECT COUNT(*) FROM `products`");
        assert_eq!(m.truncate_statement().sql, "TRUNCATE TABLE `products`");
    }

    #[test]
    fn find_one_appends_limit() {
        let pool = pool(DriverKind::Postgres);
        let stmt = mapper(&pool).find_statement("name = ?", &crate::sql_params!["Mug"], true);
        assert_eq!(stmt.sql, "SELECT * FROM \"products\" WHERE name = $1 LIMIT 1");
    }

    #[test]
    fn map_row_reports_missing_columns() {
        let pool = pool(DriverKind::MySql);
        let mut rows = ResultSet::new(vec!["id".into(), "name".into()]);
        rows.add_row_values(vec![SqlValue::I32(1), SqlValue::Text("Mug".into())]);
        let err = mapper(&pool).map_row(rows.first().unwrap()).unwrap_err();
        assert!(err.to_string().contains("`sku`"));
    }

    #[test]
    fn unreachable_backend_surfaces_connection_error() {
        let pool = pool(DriverKind::MySql);
        let err = mapper(&pool).find_all().unwrap_err();
        assert!(matches!(err, OrmError::Connection(_)));
    }
}
