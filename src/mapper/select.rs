use crate::error::OrmError;
use crate::query::Query;
use crate::results::{ResultSet, Row};
use crate::types::SqlValue;

use super::{Mapper, Statement, first_i64, run_query};

impl<T: Default + 'static> Mapper<'_, T> {
    /// Build a fresh entity from one result row, reading every mapped column by name.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` when a column is missing or holds an incompatible value.
    pub fn map_row(&self, row: &Row) -> Result<T, OrmError> {
        let mut entity = T::default();
        for field in self.table.fields() {
            let value = row.get(field.column()).ok_or_else(|| {
                OrmError::Mapping(format!(
                    "column `{}` of `{}` missing from result",
                    field.column(),
                    self.table.name()
                ))
            })?;
            field.assign(&mut entity, value)?;
        }
        Ok(entity)
    }

    fn map_rows(&self, rows: &ResultSet) -> Result<Vec<T>, OrmError> {
        rows.iter().map(|row| self.map_row(row)).collect()
    }

    fn fetch(&self, operation: &'static str, stmt: &Statement) -> Result<Vec<T>, OrmError> {
        let rows = {
            let mut conn = self.lease()?;
            run_query(&mut conn, operation, stmt)?
        };
        self.map_rows(&rows)
    }

    /// Every row of the table.
    ///
    /// # Errors
    /// `OrmError::Sql` on driver failure, `OrmError::Mapping` on a row that does not fit `T`.
    pub fn find_all(&self) -> Result<Vec<T>, OrmError> {
        self.fetch("find_all", &self.select_statement(&Query::new()))
    }

    /// Rows matching raw WHERE text with `?` placeholders.
    ///
    /// The text is trusted verbatim; only `params` are bound safely.
    ///
    /// # Errors
    /// `OrmError::Sql` on driver failure, `OrmError::Mapping` on a row that does not fit `T`.
    pub fn find(&self, where_sql: &str, params: &[SqlValue]) -> Result<Vec<T>, OrmError> {
        self.fetch("find", &self.find_statement(where_sql, params, false))
    }

    /// First row matching raw WHERE text (`LIMIT 1` is appended).
    ///
    /// # Errors
    /// See [`Mapper::find`].
    pub fn find_one(&self, where_sql: &str, params: &[SqlValue]) -> Result<Option<T>, OrmError> {
        let stmt = self.find_statement(where_sql, params, true);
        Ok(self.fetch("find_one", &stmt)?.into_iter().next())
    }

    /// Rows matching a built [`Query`].
    ///
    /// # Errors
    /// See [`Mapper::find`].
    pub fn select(&self, query: &Query) -> Result<Vec<T>, OrmError> {
        self.fetch("select", &self.select_statement(query))
    }

    /// First row matching a built [`Query`]. Set a limit on the query to avoid fetching more.
    ///
    /// # Errors
    /// See [`Mapper::find`].
    pub fn select_one(&self, query: &Query) -> Result<Option<T>, OrmError> {
        let rows = {
            let mut conn = self.lease()?;
            run_query(&mut conn, "select_one", &self.select_statement(query))?
        };
        rows.first().map(|row| self.map_row(row)).transpose()
    }

    /// Number of rows matching `query`'s filter.
    ///
    /// # Errors
    /// Returns `OrmError::Sql` wrapping the driver failure.
    pub fn count(&self, query: &Query) -> Result<i64, OrmError> {
        let stmt = self.count_statement(query);
        let mut conn = self.lease()?;
        let rows = run_query(&mut conn, "count", &stmt)?;
        Ok(first_i64(&rows).unwrap_or(0))
    }

    /// Number of rows in the table.
    ///
    /// # Errors
    /// Returns `OrmError::Sql` wrapping the driver failure.
    pub fn count_all(&self) -> Result<i64, OrmError> {
        self.count(&Query::new())
    }
}
