//! `PostgreSQL` backend over the blocking `postgres` client.

use postgres::types::{ToSql, Type};
use postgres::{Client, Config, NoTls, Statement};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::config::DatabaseConfig;
use crate::error::OrmError;
use crate::results::ResultSet;
use crate::types::SqlValue;

use super::{Connection, Driver, PreparedStatement};

/// Opens `postgres::Client` sessions from a validated `DatabaseConfig`.
pub struct PostgresDriver {
    config: Config,
}

impl PostgresDriver {
    #[must_use]
    pub fn new(cfg: &DatabaseConfig) -> Self {
        let mut config = Config::new();
        config
            .host(&cfg.hostname)
            .port(u16::try_from(cfg.port).unwrap_or(5432))
            .user(&cfg.username)
            .password(&cfg.password)
            .dbname(&cfg.database);
        Self { config }
    }
}

impl Driver for PostgresDriver {
    fn connect(&self) -> Result<Box<dyn Connection>, OrmError> {
        let client = self.config.connect(NoTls).map_err(|e| {
            OrmError::Connection(format!("Failed to open Postgres connection: {e}"))
        })?;
        Ok(Box::new(PostgresConnection { client }))
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

pub struct PostgresConnection {
    client: Client,
}

impl Connection for PostgresConnection {
    fn is_valid(&mut self) -> bool {
        !self.client.is_closed() && self.client.simple_query("SELECT 1").is_ok()
    }

    fn set_schema(&mut self, schema: &str) -> Result<(), OrmError> {
        let quoted = format!("\"{}\"", schema.replace('"', "\"\""));
        self.client
            .batch_execute(&format!("SET search_path TO {quoted}"))?;
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<(), OrmError> {
        self.client.batch_execute(sql)?;
        Ok(())
    }

    fn prepare<'c>(&'c mut self, sql: &str) -> Result<Box<dyn PreparedStatement + 'c>, OrmError> {
        let stmt = self.client.prepare(sql)?;
        let params = vec![None; stmt.params().len()];
        Ok(Box::new(PostgresPrepared {
            client: &mut self.client,
            stmt,
            params,
        }))
    }
}

struct PostgresPrepared<'c> {
    client: &'c mut Client,
    stmt: Statement,
    params: Vec<Option<SqlValue>>,
}

impl PostgresPrepared<'_> {
    fn converted(&self) -> Result<Vec<Box<dyn ToSql + Sync>>, OrmError> {
        self.stmt
            .params()
            .iter()
            .zip(&self.params)
            .enumerate()
            .map(|(i, (ty, value))| {
                let value = value.as_ref().ok_or_else(|| {
                    OrmError::Driver(format!("parameter ${} was never bound", i + 1))
                })?;
                to_pg_param(value, ty)
            })
            .collect()
    }
}

impl PreparedStatement for PostgresPrepared<'_> {
    fn bind(&mut self, index: usize, value: &SqlValue) -> Result<(), OrmError> {
        let slot = index
            .checked_sub(1)
            .and_then(|i| self.params.get_mut(i))
            .ok_or_else(|| OrmError::Driver(format!("parameter index {index} out of range")))?;
        *slot = Some(value.clone());
        Ok(())
    }

    fn execute_update(&mut self) -> Result<u64, OrmError> {
        let owned = self.converted()?;
        let refs: Vec<&(dyn ToSql + Sync)> = owned.iter().map(AsRef::as_ref).collect();
        Ok(self.client.execute(&self.stmt, &refs)?)
    }

    fn execute_query(&mut self) -> Result<ResultSet, OrmError> {
        let owned = self.converted()?;
        let refs: Vec<&(dyn ToSql + Sync)> = owned.iter().map(AsRef::as_ref).collect();
        let rows = self.client.query(&self.stmt, &refs)?;

        let column_names: Vec<String> = self
            .stmt
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();
        let column_count = column_names.len();
        let mut result_set = ResultSet::with_capacity(column_names, rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(extract_value(row, idx)?);
            }
            result_set.add_row_values(values);
        }
        Ok(result_set)
    }
}

fn out_of_range(value: &SqlValue, ty: &Type) -> OrmError {
    OrmError::Driver(format!(
        "cannot bind {} value to Postgres parameter of type {}",
        value.kind(),
        ty.name()
    ))
}

/// Exact decimal for a numeric value. Doubles go through their shortest display form so
/// `9.99` binds as `9.99` rather than its binary expansion.
fn to_decimal(value: &SqlValue) -> Option<Decimal> {
    match value {
        SqlValue::Double(d) if d.is_finite() => d.to_string().parse().ok(),
        SqlValue::U64(v) => Some(Decimal::from(*v)),
        other => other.as_i64().map(Decimal::from),
    }
}

/// Convert a `SqlValue` into the concrete Rust type the server expects for `ty`.
#[allow(clippy::cast_possible_truncation)]
fn to_pg_param(value: &SqlValue, ty: &Type) -> Result<Box<dyn ToSql + Sync>, OrmError> {
    let is_null = value.is_null();
    let boxed: Box<dyn ToSql + Sync> = match *ty {
        Type::INT2 => {
            if is_null {
                Box::new(None::<i16>)
            } else {
                let v = value
                    .as_i64()
                    .and_then(|v| i16::try_from(v).ok())
                    .ok_or_else(|| out_of_range(value, ty))?;
                Box::new(v)
            }
        }
        Type::INT4 => {
            if is_null {
                Box::new(None::<i32>)
            } else {
                let v = value
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or_else(|| out_of_range(value, ty))?;
                Box::new(v)
            }
        }
        Type::INT8 => {
            if is_null {
                Box::new(None::<i64>)
            } else {
                Box::new(value.as_i64().ok_or_else(|| out_of_range(value, ty))?)
            }
        }
        Type::FLOAT4 => {
            if is_null {
                Box::new(None::<f32>)
            } else {
                let v = value.as_f64().ok_or_else(|| out_of_range(value, ty))?;
                Box::new(v as f32)
            }
        }
        Type::FLOAT8 => {
            if is_null {
                Box::new(None::<f64>)
            } else {
                Box::new(value.as_f64().ok_or_else(|| out_of_range(value, ty))?)
            }
        }
        Type::NUMERIC => {
            if is_null {
                Box::new(None::<Decimal>)
            } else {
                Box::new(to_decimal(value).ok_or_else(|| out_of_range(value, ty))?)
            }
        }
        Type::BOOL => {
            if is_null {
                Box::new(None::<bool>)
            } else {
                Box::new(value.as_bool().ok_or_else(|| out_of_range(value, ty))?)
            }
        }
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => match value {
            SqlValue::Null => Box::new(None::<String>),
            SqlValue::Text(s) => Box::new(s.clone()),
            SqlValue::Bool(b) => Box::new(b.to_string()),
            SqlValue::Double(d) => Box::new(d.to_string()),
            other => Box::new(other.as_i64().map(|v| v.to_string()).unwrap_or_default()),
        },
        _ => return Err(out_of_range(value, ty)),
    };
    Ok(boxed)
}

/// Extracts a `SqlValue` from a `postgres` row at the given index.
fn extract_value(row: &postgres::Row, idx: usize) -> Result<SqlValue, OrmError> {
    let type_info = row.columns()[idx].type_();

    if *type_info == Type::INT2 {
        let val: Option<i16> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, |v| SqlValue::I32(i32::from(v))))
    } else if *type_info == Type::INT4 {
        let val: Option<i32> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::I32))
    } else if *type_info == Type::INT8 {
        let val: Option<i64> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::I64))
    } else if *type_info == Type::FLOAT4 {
        let val: Option<f32> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, |v| SqlValue::Double(f64::from(v))))
    } else if *type_info == Type::FLOAT8 {
        let val: Option<f64> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::Double))
    } else if *type_info == Type::NUMERIC {
        let val: Option<Decimal> = row.try_get(idx)?;
        match val {
            None => Ok(SqlValue::Null),
            Some(d) => d.to_f64().map(SqlValue::Double).ok_or_else(|| {
                OrmError::Driver(format!("numeric value {d} does not fit a double"))
            }),
        }
    } else if *type_info == Type::BOOL {
        let val: Option<bool> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::Bool))
    } else {
        // text-like and anything else the client can render as a string
        let val: Option<String> = row.try_get(idx)?;
        Ok(val.map_or(SqlValue::Null, SqlValue::Text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_become_exact_decimals() {
        let d = to_decimal(&SqlValue::Double(9.99)).unwrap();
        assert_eq!(d.to_string(), "9.99");
        assert!((d.to_f64().unwrap() - 9.99).abs() < 1e-12);
        assert_eq!(to_decimal(&SqlValue::I32(-4)), Some(Decimal::from(-4)));
        assert_eq!(to_decimal(&SqlValue::U64(u64::MAX)), Some(Decimal::from(u64::MAX)));
        assert_eq!(to_decimal(&SqlValue::Double(f64::NAN)), None);
        assert_eq!(to_decimal(&SqlValue::Text("9.99".into())), None);
    }

    #[test]
    fn parameters_convert_per_server_type() {
        assert!(to_pg_param(&SqlValue::Double(9.99), &Type::NUMERIC).is_ok());
        assert!(to_pg_param(&SqlValue::Null, &Type::NUMERIC).is_ok());
        assert!(to_pg_param(&SqlValue::I64(7), &Type::NUMERIC).is_ok());
        assert!(to_pg_param(&SqlValue::U32(5), &Type::INT8).is_ok());
        assert!(to_pg_param(&SqlValue::Bool(true), &Type::BOOL).is_ok());
        assert!(to_pg_param(&SqlValue::Text("Mug".into()), &Type::VARCHAR).is_ok());

        assert!(to_pg_param(&SqlValue::I32(70_000), &Type::INT2).is_err());
        assert!(to_pg_param(&SqlValue::Text("cheap".into()), &Type::NUMERIC).is_err());
        assert!(to_pg_param(&SqlValue::Double(1.5), &Type::INT4).is_err());
        assert!(to_pg_param(&SqlValue::I32(1), &Type::JSONB).is_err());
    }
}
