use std::collections::HashMap;
use std::sync::Arc;

use crate::error::OrmError;
use crate::types::{FieldValue, SqlValue};

/// Column names of a result set plus a name → index map, shared by every row.
#[derive(Debug)]
pub(crate) struct Columns {
    pub(crate) names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    pub(crate) fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { names, index }
    }

    fn position(&self, column_name: &str) -> Option<usize> {
        if let Some(&idx) = self.index.get(column_name) {
            return Some(idx);
        }
        // backends that fold unquoted identifiers
        self.names
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column_name))
    }
}

/// A row from a query result.
///
/// Cells are `SqlValue`s; the typed getters read a column by name and convert it
/// with the same rules the mapper uses for entity fields.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Arc<Columns>,
    values: Vec<SqlValue>,
}

impl Row {
    pub(crate) fn new(columns: Arc<Columns>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Column names for this row, in result order.
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns.names
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.columns.position(column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&SqlValue> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Read a column by name as `V`.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` if the column is absent or its value does not convert to `V`.
    pub fn read<V: FieldValue>(&self, column_name: &str) -> Result<V, OrmError> {
        let value = self.get(column_name).ok_or_else(|| {
            OrmError::Mapping(format!("column `{column_name}` not present in result row"))
        })?;
        V::from_sql_value(value).map_err(|err| match err {
            OrmError::Mapping(msg) => OrmError::Mapping(format!("column `{column_name}`: {msg}")),
            other => other,
        })
    }

    /// # Errors
    /// See [`Row::read`].
    pub fn get_i32(&self, column_name: &str) -> Result<i32, OrmError> {
        self.read(column_name)
    }

    /// # Errors
    /// See [`Row::read`].
    pub fn get_i64(&self, column_name: &str) -> Result<i64, OrmError> {
        self.read(column_name)
    }

    /// # Errors
    /// See [`Row::read`].
    pub fn get_u32(&self, column_name: &str) -> Result<u32, OrmError> {
        self.read(column_name)
    }

    /// # Errors
    /// See [`Row::read`].
    pub fn get_string(&self, column_name: &str) -> Result<String, OrmError> {
        self.read(column_name)
    }

    /// # Errors
    /// See [`Row::read`].
    pub fn get_bool(&self, column_name: &str) -> Result<bool, OrmError> {
        self.read(column_name)
    }

    /// # Errors
    /// See [`Row::read`].
    pub fn get_f64(&self, column_name: &str) -> Result<f64, OrmError> {
        self.read(column_name)
    }
}
