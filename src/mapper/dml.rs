use crate::error::OrmError;
use crate::types::SqlValue;

use super::{Mapper, Statement, first_i64, run_query, run_update};

impl<T: Default + 'static> Mapper<'_, T> {
    /// Insert `entity` and return the generated key, if the table has an auto-increment column.
    ///
    /// `PostgreSQL` reads the key from the statement's `RETURNING` clause; MySQL asks
    /// `LAST_INSERT_ID()` on the same connection.
    ///
    /// # Errors
    /// Returns `OrmError::Sql` wrapping the driver failure, or the pool's connection error.
    pub fn insert(&self, entity: &T) -> Result<Option<i64>, OrmError> {
        const OP: &str = "save";
        let stmt = self.insert_statement(entity);
        let has_key = self.table.auto_increment_field().is_some();
        let mut conn = self.lease()?;

        if has_key && self.dialect().supports_returning_id() {
            let rows = run_query(&mut conn, OP, &stmt)?;
            return Ok(first_i64(&rows));
        }

        run_update(&mut conn, OP, &stmt)?;
        match self.dialect().last_insert_id_query() {
            Some(sql) if has_key => {
                let lookup = Statement {
                    sql: sql.to_string(),
                    params: Vec::new(),
                };
                let rows = run_query(&mut conn, OP, &lookup)?;
                Ok(first_i64(&rows))
            }
            _ => Ok(None),
        }
    }

    /// Insert `entity` and write the generated key back into its auto-increment field.
    ///
    /// # Errors
    /// Same as [`Mapper::insert`], plus `OrmError::Mapping` if the key does not fit the field.
    pub fn save(&self, entity: &mut T) -> Result<(), OrmError> {
        if let Some(id) = self.insert(entity)? {
            if let Some(field) = self.table.auto_increment_field() {
                field.assign(entity, &SqlValue::I64(id))?;
            }
        }
        Ok(())
    }

    /// Update the row matching `entity`'s primary key; returns rows affected.
    ///
    /// # Errors
    /// `OrmError::Mapping` when the table has no primary key, otherwise `OrmError::Sql`.
    pub fn update(&self, entity: &T) -> Result<u64, OrmError> {
        let stmt = self.update_statement(entity)?;
        let mut conn = self.lease()?;
        run_update(&mut conn, "update", &stmt)
    }

    /// Delete the row matching `entity`'s primary key; returns rows affected.
    ///
    /// # Errors
    /// `OrmError::Mapping` when the table has no primary key, otherwise `OrmError::Sql`.
    pub fn remove(&self, entity: &T) -> Result<u64, OrmError> {
        let stmt = self.delete_statement(entity)?;
        let mut conn = self.lease()?;
        run_update(&mut conn, "remove", &stmt)
    }

    /// Delete every row.
    ///
    /// # Errors
    /// Returns `OrmError::Sql` wrapping the driver failure.
    pub fn truncate(&self) -> Result<(), OrmError> {
        let stmt = self.truncate_statement();
        let mut conn = self.lease()?;
        run_update(&mut conn, "truncate", &stmt).map(|_| ())
    }
}
