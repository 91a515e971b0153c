use std::sync::Arc;

use crate::types::SqlValue;

use super::row::{Columns, Row};

/// A result set from a database query
///
/// Drivers build one per executed query; column metadata is stored once and shared
/// by all rows.
#[derive(Debug, Clone)]
pub struct ResultSet {
    columns: Arc<Columns>,
    rows: Vec<Row>,
}

impl ResultSet {
    /// Create an empty result set for the given columns.
    #[must_use]
    pub fn new(column_names: Vec<String>) -> Self {
        Self::with_capacity(column_names, 0)
    }

    /// Create an empty result set with preallocated row capacity.
    #[must_use]
    pub fn with_capacity(column_names: Vec<String>, capacity: usize) -> Self {
        Self {
            columns: Arc::new(Columns::new(column_names)),
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Get the column names for this result set
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns.names
    }

    /// Append a row. Values are positional and must follow `column_names()`.
    pub fn add_row_values(&mut self, values: Vec<SqlValue>) {
        debug_assert_eq!(values.len(), self.columns.names.len());
        self.rows.push(Row::new(Arc::clone(&self.columns), values));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
