//! DDL derived from registered table descriptors.

use std::sync::{Mutex, PoisonError};

use crate::dialect::Dialect;
use crate::error::OrmError;
use crate::pool::ConnectionPool;
use crate::registry::{FieldDescriptor, Registry, TableDescriptor};

/// Rewrite a raw constraint string for `dialect`.
///
/// Commas become spaces, the `NOT_NULL` marker becomes `NOT NULL` and `AUTO_INCREMENT` is
/// replaced with the dialect's modifier. Runs of whitespace collapse to one space.
#[must_use]
pub fn render_constraints(raw: &str, dialect: Dialect) -> String {
    raw.replace(',', " ")
        .split_whitespace()
        .map(|token| {
            if token.eq_ignore_ascii_case("AUTO_INCREMENT") {
                dialect.auto_increment_modifier()
            } else if token.eq_ignore_ascii_case("NOT_NULL") {
                "NOT NULL"
            } else {
                token
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn column_definition<T>(field: &FieldDescriptor<T>, dialect: Dialect) -> String {
    let ty = field
        .type_override()
        .unwrap_or_else(|| dialect.sql_type(field.semantic_type()));
    let constraints = render_constraints(field.constraint_sql(), dialect);
    let column = dialect.quote_identifier(field.column());
    if constraints.is_empty() {
        format!("{column} {ty}")
    } else {
        format!("{column} {ty} {constraints}")
    }
}

/// `CREATE TABLE IF NOT EXISTS` for one descriptor.
#[must_use]
pub fn create_table_ddl<T>(table: &TableDescriptor<T>, dialect: Dialect) -> String {
    let definitions: Vec<String> = table
        .fields()
        .iter()
        .map(|field| column_definition(field, dialect))
        .chain(table.indexes().iter().cloned())
        .collect();
    let options = dialect.table_options(table.table_options());
    let options = if options.is_empty() {
        options
    } else {
        format!(" {options}")
    };
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}){options};",
        dialect.quote_identifier(table.name()),
        definitions.join(", ")
    )
}

#[must_use]
pub fn drop_table_ddl<T>(table: &TableDescriptor<T>, dialect: Dialect) -> String {
    format!("DROP TABLE IF EXISTS {};", dialect.quote_identifier(table.name()))
}

/// Creates and drops tables for registered entity types.
///
/// DDL failures are best-effort: they are logged, remembered for [`SchemaGenerator::last_error`],
/// and reported as `Ok(false)` so bootstrap code can carry on.
pub struct SchemaGenerator<'a> {
    pool: &'a ConnectionPool,
    registry: &'a Registry,
    last_error: Mutex<Option<String>>,
}

impl<'a> SchemaGenerator<'a> {
    #[must_use]
    pub fn new(pool: &'a ConnectionPool, registry: &'a Registry) -> Self {
        Self {
            pool,
            registry,
            last_error: Mutex::new(None),
        }
    }

    /// # Errors
    /// Returns `OrmError::Mapping` if `T` is not registered.
    pub fn create_table_sql<T: 'static>(&self) -> Result<String, OrmError> {
        let table = self.registry.describe::<T>()?;
        Ok(create_table_ddl(&table, self.pool.dialect()))
    }

    /// # Errors
    /// Returns `OrmError::Mapping` if `T` is not registered.
    pub fn drop_table_sql<T: 'static>(&self) -> Result<String, OrmError> {
        let table = self.registry.describe::<T>()?;
        Ok(drop_table_ddl(&table, self.pool.dialect()))
    }

    /// Create `T`'s table if it does not exist. `Ok(false)` means the DDL itself failed.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` for an unregistered type and `OrmError::Connection` when no
    /// connection can be leased.
    pub fn create_table<T: 'static>(&self) -> Result<bool, OrmError> {
        let sql = self.create_table_sql::<T>()?;
        self.run("create table", &sql)
    }

    /// Drop `T`'s table if it exists. `Ok(false)` means the DDL itself failed.
    ///
    /// # Errors
    /// Same as [`SchemaGenerator::create_table`].
    pub fn drop_table<T: 'static>(&self) -> Result<bool, OrmError> {
        let sql = self.drop_table_sql::<T>()?;
        self.run("drop table", &sql)
    }

    /// Message of the most recent DDL failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn run(&self, operation: &'static str, sql: &str) -> Result<bool, OrmError> {
        let mut conn = self.pool.acquire()?;
        tracing::debug!(operation, sql, "executing DDL");
        match conn.execute(sql) {
            Ok(()) => Ok(true),
            Err(e) => {
                let e = e.into_sql(operation);
                tracing::error!(error = %e, sql, "DDL failed");
                *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(e.to_string());
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Entity;

    #[derive(Debug, Default)]
    struct Product {
        id: i32,
        name: String,
        price: f64,
        active: bool,
        serial: u64,
    }

    impl Entity for Product {
        fn table() -> TableDescriptor<Self> {
            TableDescriptor::new("products")
                .field(crate::field!(Product, id).constraints("PRIMARY KEY, AUTO_INCREMENT"))
                .field(crate::field!(Product, name).constraints("NOT_NULL, UNIQUE"))
                .field(crate::field!(Product, price).sql_type("DECIMAL(10,2)"))
                .field(crate::field!(Product, active).constraints("DEFAULT 1"))
                .field(crate::field!(Product, serial))
                .index("INDEX idx_name (name)")
        }
    }

    #[test]
    fn constraints_are_normalized_per_dialect() {
        assert_eq!(
            render_constraints("PRIMARY KEY,AUTO_INCREMENT", Dialect::MySql),
            "PRIMARY KEY AUTO_INCREMENT"
        );
        assert_eq!(
            render_constraints("PRIMARY KEY AUTO_INCREMENT", Dialect::Postgres),
            "PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY"
        );
        assert_eq!(render_constraints("not_null, unique", Dialect::MySql), "NOT NULL unique");
        assert_eq!(render_constraints("", Dialect::MySql), "");
    }

    #[test]
    fn mysql_create_table() {
        let ddl = create_table_ddl(&Product::table(), Dialect::MySql);
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS `products` (`id` INT PRIMARY KEY AUTO_INCREMENT, \
             `name` VARCHAR(255) NOT NULL UNIQUE, `price` DECIMAL(10,2), \
             `active` TINYINT(1) DEFAULT 1, `serial` BIGINT UNSIGNED, \
             INDEX idx_name (name)) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;"
        );
    }

    #[test]
    fn postgres_create_table_has_no_storage_options() {
        let table = TableDescriptor::new("products")
            .field(crate::field!(Product, id).constraints("PRIMARY KEY AUTO_INCREMENT"))
            .field(crate::field!(Product, active));
        let ddl = create_table_ddl(&table, Dialect::Postgres);
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS \"products\" (\"id\" INTEGER PRIMARY KEY GENERATED BY DEFAULT AS IDENTITY, \"active\" BOOLEAN);"
        );
    }

    #[test]
    fn drop_table() {
        assert_eq!(
            drop_table_ddl(&Product::table(), Dialect::Postgres),
            "DROP TABLE IF EXISTS \"products\";"
        );
    }
}
