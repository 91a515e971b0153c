//! Dialect-neutral filter/order/paging state consumed by the mapper.

use std::fmt::Write as _;

use crate::types::SqlValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    fn as_sql(self) -> &'static str {
        match self {
            Connector::And => " AND ",
            Connector::Or => " OR ",
        }
    }
}

/// Accumulates a WHERE clause plus its positional parameters, ORDER BY terms and paging.
///
/// Every predicate appends one fragment joined by the pending connector (AND unless
/// [`Query::or_`] was called just before). Column names are used verbatim.
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let q = Query::new()
///     .equals("x", 1)
///     .or_()
///     .equals("y", 2)
///     .equals("z", 3)
///     .order_by("x", false)
///     .limit(10);
/// assert_eq!(q.where_clause(), "x = ? OR y = ? AND z = ?");
/// assert_eq!(q.params().len(), 3);
/// assert_eq!(q.tail_sql(), " WHERE x = ? OR y = ? AND z = ? ORDER BY x DESC LIMIT 10");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    where_clause: String,
    params: Vec<SqlValue>,
    pending: Connector,
    order_terms: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push_fragment(mut self, fragment: &str, params: impl IntoIterator<Item = SqlValue>) -> Self {
        if !self.where_clause.is_empty() {
            self.where_clause.push_str(self.pending.as_sql());
        }
        self.where_clause.push_str(fragment);
        self.params.extend(params);
        self.pending = Connector::And;
        self
    }

    fn compare(self, column: &str, op: &str, value: SqlValue) -> Self {
        self.push_fragment(&format!("{column} {op} ?"), [value])
    }

    #[must_use]
    pub fn equals(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, "=", value.into())
    }

    #[must_use]
    pub fn not_equals(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, "!=", value.into())
    }

    #[must_use]
    pub fn greater_than(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, ">", value.into())
    }

    #[must_use]
    pub fn less_than(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, "<", value.into())
    }

    #[must_use]
    pub fn greater_or_equal(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, ">=", value.into())
    }

    #[must_use]
    pub fn less_or_equal(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.compare(column, "<=", value.into())
    }

    /// `column LIKE ?`; the pattern is bound as-is, wildcards included.
    #[must_use]
    pub fn like(self, column: &str, pattern: impl Into<SqlValue>) -> Self {
        self.compare(column, "LIKE", pattern.into())
    }

    #[must_use]
    pub fn is_null(self, column: &str) -> Self {
        self.push_fragment(&format!("{column} IS NULL"), [])
    }

    #[must_use]
    pub fn is_not_null(self, column: &str) -> Self {
        self.push_fragment(&format!("{column} IS NOT NULL"), [])
    }

    /// `column BETWEEN ? AND ?`, binding `low` then `high`.
    #[must_use]
    pub fn between(
        self,
        column: &str,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        self.push_fragment(
            &format!("{column} BETWEEN ? AND ?"),
            [low.into(), high.into()],
        )
    }

    /// `column IN (?, ...)`. An empty set matches nothing (`1=0`).
    #[must_use]
    pub fn in_<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.membership(column, "IN", "1=0", values)
    }

    /// `column NOT IN (?, ...)`. An empty set matches everything (`1=1`).
    #[must_use]
    pub fn not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.membership(column, "NOT IN", "1=1", values)
    }

    fn membership<I, V>(self, column: &str, op: &str, when_empty: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let values: Vec<SqlValue> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return self.push_fragment(when_empty, []);
        }
        let markers = vec!["?"; values.len()].join(", ");
        self.push_fragment(&format!("{column} {op} ({markers})"), values)
    }

    /// Join the next predicate with OR. Applies to that predicate only.
    #[must_use]
    pub fn or_(mut self) -> Self {
        self.pending = Connector::Or;
        self
    }

    /// Join the next predicate with AND (the default).
    #[must_use]
    pub fn and_(mut self) -> Self {
        self.pending = Connector::And;
        self
    }

    /// Add an ORDER BY term; repeated calls accumulate.
    #[must_use]
    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "ASC" } else { "DESC" };
        self.order_terms.push(format!("{column} {direction}"));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// WHERE text without the keyword; empty when no predicate was added.
    #[must_use]
    pub fn where_clause(&self) -> &str {
        &self.where_clause
    }

    /// Parameters in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    #[must_use]
    pub fn order_terms(&self) -> &[String] {
        &self.order_terms
    }

    #[must_use]
    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    #[must_use]
    pub fn has_filter(&self) -> bool {
        !self.where_clause.is_empty()
    }

    /// ` WHERE ...` only, for statements that ignore ordering and paging.
    #[must_use]
    pub fn where_sql(&self) -> String {
        if self.where_clause.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_clause)
        }
    }

    /// Everything that follows `FROM table`: WHERE, ORDER BY, LIMIT and OFFSET, each with a
    /// leading space.
    #[must_use]
    pub fn tail_sql(&self) -> String {
        let mut sql = self.where_sql();
        if !self.order_terms.is_empty() {
            let _ = write!(sql, " ORDER BY {}", self.order_terms.join(", "));
        }
        if let Some(limit) = self.limit {
            let _ = write!(sql, " LIMIT {limit}");
        }
        if let Some(offset) = self.offset {
            let _ = write!(sql, " OFFSET {offset}");
        }
        sql
    }
}
