//! Table storage and statement evaluation for the memory backend.

use std::cmp::Ordering;
use std::collections::HashMap;

use regex::Regex;

use crate::error::OrmError;
use crate::results::ResultSet;
use crate::types::SqlValue;

use super::sql::{CmpOp, ColumnSpec, Command, Filter};

fn engine_error(detail: impl std::fmt::Display) -> OrmError {
    OrmError::Driver(format!("memory backend: {detail}"))
}

#[derive(Debug, Clone)]
pub(super) struct Table {
    columns: Vec<ColumnSpec>,
    rows: Vec<Vec<SqlValue>>,
    next_id: i64,
}

impl Table {
    fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            next_id: 1,
        }
    }

    fn column_index(&self, name: &str) -> Result<usize, OrmError> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| engine_error(format!("unknown column `{name}`")))
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub(super) fn len(&self) -> usize {
        self.rows.len()
    }

    /// Enforce NOT NULL and UNIQUE for `candidate`, ignoring the row at `skip`.
    fn check_row(&self, candidate: &[SqlValue], skip: Option<usize>) -> Result<(), OrmError> {
        for (idx, column) in self.columns.iter().enumerate() {
            let value = &candidate[idx];
            if column.not_null && value.is_null() {
                return Err(engine_error(format!("column `{}` cannot be null", column.name)));
            }
            if column.unique && !value.is_null() {
                let clash = self
                    .rows
                    .iter()
                    .enumerate()
                    .any(|(row_idx, row)| {
                        Some(row_idx) != skip
                            && compare(&row[idx], value) == Some(Ordering::Equal)
                    });
                if clash {
                    return Err(engine_error(format!(
                        "duplicate entry for unique column `{}`",
                        column.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn matches(&self, filter: Option<&Filter>, row: &[SqlValue]) -> Result<bool, OrmError> {
        match filter {
            None => Ok(true),
            Some(filter) => self.eval(filter, row),
        }
    }

    fn eval(&self, filter: &Filter, row: &[SqlValue]) -> Result<bool, OrmError> {
        Ok(match filter {
            Filter::Const(value) => *value,
            Filter::Or(terms) => {
                for term in terms {
                    if self.eval(term, row)? {
                        return Ok(true);
                    }
                }
                false
            }
            Filter::And(terms) => {
                for term in terms {
                    if !self.eval(term, row)? {
                        return Ok(false);
                    }
                }
                true
            }
            Filter::Compare { column, op, value } => {
                let cell = &row[self.column_index(column)?];
                compare(cell, value).is_some_and(|ord| match op {
                    CmpOp::Eq => ord == Ordering::Equal,
                    CmpOp::Ne => ord != Ordering::Equal,
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::Le => ord != Ordering::Greater,
                    CmpOp::Ge => ord != Ordering::Less,
                })
            }
            Filter::IsNull { column, negated } => {
                row[self.column_index(column)?].is_null() != *negated
            }
            Filter::Between { column, low, high, negated } => {
                let cell = &row[self.column_index(column)?];
                let inside = matches!(compare(cell, low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(cell, high), Some(Ordering::Less | Ordering::Equal));
                !cell.is_null() && inside != *negated
            }
            Filter::In { column, values, negated } => {
                let cell = &row[self.column_index(column)?];
                let found = values
                    .iter()
                    .any(|v| compare(cell, v) == Some(Ordering::Equal));
                !cell.is_null() && found != *negated
            }
            Filter::Like { column, pattern, negated } => {
                let cell = &row[self.column_index(column)?];
                let (Some(text), Some(pattern)) = (cell.as_text(), pattern.as_text()) else {
                    return Ok(false);
                };
                like_regex(pattern)?.is_match(text) != *negated
            }
        })
    }
}

/// Translate a LIKE pattern (`%`, `_`) into an anchored regex.
fn like_regex(pattern: &str) -> Result<Regex, OrmError> {
    let mut expr = String::from("(?s)^");
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| engine_error(format!("bad LIKE pattern: {e}")))
}

/// SQL-style comparison; `None` when either side is NULL or the types do not compare.
pub(super) fn compare(left: &SqlValue, right: &SqlValue) -> Option<Ordering> {
    match (left, right) {
        (SqlValue::Null, _) | (_, SqlValue::Null) => None,
        (SqlValue::Text(a), SqlValue::Text(b)) => Some(a.cmp(b)),
        (SqlValue::U64(a), SqlValue::U64(b)) => Some(a.cmp(b)),
        (SqlValue::Double(_), _) | (_, SqlValue::Double(_)) => {
            left.as_f64()?.partial_cmp(&right.as_f64()?)
        }
        (SqlValue::Bool(a), SqlValue::Bool(b)) => Some(a.cmp(b)),
        _ => {
            let as_int = |v: &SqlValue| match v {
                SqlValue::Bool(b) => Some(i64::from(*b)),
                other => other.as_i64(),
            };
            Some(as_int(left)?.cmp(&as_int(right)?))
        }
    }
}

/// What a statement produced.
#[derive(Debug)]
pub(super) enum Outcome {
    Affected(u64),
    Rows(ResultSet),
}

/// All tables of one memory database.
#[derive(Debug, Default)]
pub(super) struct Catalog {
    tables: HashMap<String, Table>,
}

impl Catalog {
    pub(super) fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, OrmError> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| engine_error(format!("table `{name}` does not exist")))
    }

    /// Run one parsed command. `last_insert_id` is the calling connection's session value.
    pub(super) fn run(
        &mut self,
        command: Command,
        last_insert_id: &mut i64,
    ) -> Result<Outcome, OrmError> {
        match command {
            Command::Create { table, if_not_exists, columns } => {
                if self.tables.contains_key(&table) {
                    if if_not_exists {
                        return Ok(Outcome::Affected(0));
                    }
                    return Err(engine_error(format!("table `{table}` already exists")));
                }
                self.tables.insert(table, Table::new(columns));
                Ok(Outcome::Affected(0))
            }
            Command::Drop { table, if_exists } => {
                if self.tables.remove(&table).is_none() && !if_exists {
                    return Err(engine_error(format!("table `{table}` does not exist")));
                }
                Ok(Outcome::Affected(0))
            }
            Command::Truncate { table } => {
                let table = self.table_mut(&table)?;
                table.rows.clear();
                table.next_id = 1;
                Ok(Outcome::Affected(0))
            }
            Command::Insert { table, columns, values, returning } => {
                let table = self.table_mut(&table)?;
                Self::insert(table, &columns, values, returning.as_deref(), last_insert_id)
            }
            Command::Select { table, count, filter, order, limit, offset } => {
                let table = self.table_mut(&table)?;
                Self::select(table, count, filter.as_ref(), &order, limit, offset)
            }
            Command::LastInsertId => {
                let mut rows = ResultSet::new(vec!["LAST_INSERT_ID()".to_string()]);
                rows.add_row_values(vec![SqlValue::I64(*last_insert_id)]);
                Ok(Outcome::Rows(rows))
            }
            Command::Update { table, assignments, filter } => {
                let table = self.table_mut(&table)?;
                let targets: Vec<(usize, SqlValue)> = assignments
                    .into_iter()
                    .map(|(column, value)| Ok((table.column_index(&column)?, value)))
                    .collect::<Result<_, OrmError>>()?;

                let mut affected = 0;
                for row_idx in 0..table.rows.len() {
                    if !table.matches(filter.as_ref(), &table.rows[row_idx])? {
                        continue;
                    }
                    let mut updated = table.rows[row_idx].clone();
                    for (idx, value) in &targets {
                        updated[*idx] = value.clone();
                    }
                    table.check_row(&updated, Some(row_idx))?;
                    table.rows[row_idx] = updated;
                    affected += 1;
                }
                Ok(Outcome::Affected(affected))
            }
            Command::Delete { table, filter } => {
                let table = self.table_mut(&table)?;
                let before = table.rows.len();
                let mut keep = Vec::with_capacity(before);
                for row in &table.rows {
                    keep.push(!table.matches(filter.as_ref(), row)?);
                }
                let mut keep = keep.into_iter();
                table.rows.retain(|_| keep.next().unwrap_or(true));
                Ok(Outcome::Affected((before - table.rows.len()) as u64))
            }
            Command::Use { .. } => Ok(Outcome::Affected(0)),
        }
    }

    fn insert(
        table: &mut Table,
        columns: &[String],
        values: Vec<SqlValue>,
        returning: Option<&str>,
        last_insert_id: &mut i64,
    ) -> Result<Outcome, OrmError> {
        let mut row: Vec<Option<SqlValue>> = vec![None; table.columns.len()];
        for (column, value) in columns.iter().zip(values) {
            let idx = table.column_index(column)?;
            row[idx] = Some(value);
        }

        let mut generated = None;
        let mut filled = Vec::with_capacity(row.len());
        for (idx, cell) in row.into_iter().enumerate() {
            let spec = &table.columns[idx];
            let value = match cell {
                Some(value) => {
                    if spec.auto_increment {
                        if let Some(explicit) = value.as_i64() {
                            table.next_id = table.next_id.max(explicit + 1);
                        }
                    }
                    value
                }
                None if spec.auto_increment => {
                    let id = table.next_id;
                    generated = Some(id);
                    SqlValue::I64(id)
                }
                None => spec.default.clone().unwrap_or(SqlValue::Null),
            };
            filled.push(value);
        }
        table.check_row(&filled, None)?;

        if let Some(id) = generated {
            table.next_id = id + 1;
            *last_insert_id = id;
        }

        let outcome = match returning {
            Some(column) => {
                let idx = table.column_index(column)?;
                let mut rows = ResultSet::new(vec![table.columns[idx].name.clone()]);
                rows.add_row_values(vec![filled[idx].clone()]);
                Outcome::Rows(rows)
            }
            None => Outcome::Affected(1),
        };
        table.rows.push(filled);
        Ok(outcome)
    }

    fn select(
        table: &Table,
        count: bool,
        filter: Option<&Filter>,
        order: &[(String, bool)],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Outcome, OrmError> {
        let mut matched = Vec::new();
        for row in &table.rows {
            if table.matches(filter, row)? {
                matched.push(row.clone());
            }
        }

        if count {
            let mut rows = ResultSet::new(vec!["COUNT(*)".to_string()]);
            rows.add_row_values(vec![SqlValue::I64(matched.len() as i64)]);
            return Ok(Outcome::Rows(rows));
        }

        let keys: Vec<(usize, bool)> = order
            .iter()
            .map(|(column, ascending)| Ok((table.column_index(column)?, *ascending)))
            .collect::<Result<_, OrmError>>()?;
        matched.sort_by(|a, b| {
            for (idx, ascending) in &keys {
                // NULLs sort first
                let ord = match (a[*idx].is_null(), b[*idx].is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    (false, false) => compare(&a[*idx], &b[*idx]).unwrap_or(Ordering::Equal),
                };
                let ord = if *ascending { ord } else { ord.reverse() };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let mut rows = ResultSet::with_capacity(table.column_names(), matched.len());
        for row in matched
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
        {
            rows.add_row_values(row);
        }
        Ok(Outcome::Rows(rows))
    }
}
