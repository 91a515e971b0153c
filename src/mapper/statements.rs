use crate::error::OrmError;
use crate::query::Query;
use crate::types::{SqlType, SqlValue};

use super::Mapper;

/// SQL text in the backend's native placeholder style plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl<T: Default + 'static> Mapper<'_, T> {
    fn quoted_table(&self) -> String {
        self.dialect().quote_identifier(self.table.name())
    }

    fn finish(&self, sql: &str, params: Vec<SqlValue>) -> Statement {
        Statement {
            sql: self.dialect().render_placeholders(sql).into_owned(),
            params,
        }
    }

    /// `WHERE pk = ? [AND ...]` over the primary-key fields, with their values.
    fn key_predicate(
        &self,
        entity: &T,
        operation: &str,
    ) -> Result<(String, Vec<SqlValue>), OrmError> {
        let dialect = self.dialect();
        let mut terms = Vec::new();
        let mut params = Vec::new();
        for field in self.table.primary_keys() {
            terms.push(format!("{} = ?", dialect.quote_identifier(field.column())));
            params.push(field.value(entity));
        }
        if terms.is_empty() {
            return Err(OrmError::Mapping(format!(
                "cannot {operation} `{}`: table has no primary key",
                self.table.name()
            )));
        }
        Ok((terms.join(" AND "), params))
    }

    /// `INSERT` for `entity`.
    ///
    /// Auto-increment columns are left to the database, as are empty string fields whose
    /// constraints carry a `DEFAULT`. When the dialect can return the generated key inline,
    /// the statement ends in a `RETURNING` clause.
    #[must_use]
    pub fn insert_statement(&self, entity: &T) -> Statement {
        let dialect = self.dialect();
        let mut columns = Vec::new();
        let mut params = Vec::new();
        for field in self.table.fields() {
            if field.is_auto_increment() {
                continue;
            }
            let value = field.value(entity);
            if field.tags().has_default
                && field.semantic_type() == SqlType::Text
                && value.as_text().is_some_and(str::is_empty)
            {
                continue;
            }
            columns.push(dialect.quote_identifier(field.column()));
            params.push(value);
        }

        let mut sql = if columns.is_empty() && dialect.supports_returning_id() {
            format!("INSERT INTO {} DEFAULT VALUES", self.quoted_table())
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.quoted_table(),
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };
        if let Some(returning) = self
            .table
            .auto_increment_field()
            .and_then(|field| dialect.returning_id_sql(field.column()))
        {
            sql.push(' ');
            sql.push_str(&returning);
        }
        self.finish(&sql, params)
    }

    /// `UPDATE ... SET col = ? ... WHERE pk = ?`; SET values bind before key values.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` if the table has no primary key or nothing besides it.
    pub fn update_statement(&self, entity: &T) -> Result<Statement, OrmError> {
        let dialect = self.dialect();
        let (predicate, key_params) = self.key_predicate(entity, "update")?;

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for field in self.table.fields().iter().filter(|f| !f.is_primary_key()) {
            assignments.push(format!("{} = ?", dialect.quote_identifier(field.column())));
            params.push(field.value(entity));
        }
        if assignments.is_empty() {
            return Err(OrmError::Mapping(format!(
                "cannot update `{}`: no columns besides the primary key",
                self.table.name()
            )));
        }
        params.extend(key_params);

        let sql = format!(
            "UPDATE {} SET {} WHERE {predicate}",
            self.quoted_table(),
            assignments.join(", ")
        );
        Ok(self.finish(&sql, params))
    }

    /// `DELETE ... WHERE pk = ?`.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` if the table has no primary key.
    pub fn delete_statement(&self, entity: &T) -> Result<Statement, OrmError> {
        let (predicate, params) = self.key_predicate(entity, "remove")?;
        let sql = format!("DELETE FROM {} WHERE {predicate}", self.quoted_table());
        Ok(self.finish(&sql, params))
    }

    #[must_use]
    pub fn truncate_statement(&self) -> Statement {
        self.finish(&format!("TRUNCATE TABLE {}", self.quoted_table()), Vec::new())
    }

    /// `SELECT *` with the query's WHERE, ORDER BY, LIMIT and OFFSET.
    #[must_use]
    pub fn select_statement(&self, query: &Query) -> Statement {
        let sql = format!("SELECT * FROM {}{}", self.quoted_table(), query.tail_sql());
        self.finish(&sql, query.params().to_vec())
    }

    /// `SELECT *` filtered by caller-written WHERE text, used verbatim.
    #[must_use]
    pub fn find_statement(
        &self,
        where_sql: &str,
        params: &[SqlValue],
        limit_one: bool,
    ) -> Statement {
        let mut sql = format!("SELECT * FROM {}", self.quoted_table());
        if !where_sql.trim().is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(where_sql);
        }
        if limit_one {
            sql.push_str(" LIMIT 1");
        }
        self.finish(&sql, params.to_vec())
    }

    /// `SELECT COUNT(*)` with the query's WHERE clause; ordering and paging are ignored.
    #[must_use]
    pub fn count_statement(&self, query: &Query) -> Statement {
        let sql = format!("SELECT COUNT(*) FROM {}{}", self.quoted_table(), query.where_sql());
        self.finish(&sql, query.params().to_vec())
    }
}
