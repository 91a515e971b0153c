use crate::error::OrmError;

/// Scalar values that can be bound as a statement parameter or read back from a column.
///
/// The same enum is shared by every backend so the mapper and the query builder never
/// branch on driver types:
/// ```rust
/// use sql_mapper::prelude::*;
///
/// let params = vec![
///     SqlValue::I32(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Signed 32-bit integer
    I32(i32),
    /// Signed 64-bit integer
    I64(i64),
    /// Unsigned 32-bit integer
    U32(u32),
    /// Unsigned 64-bit integer. Drivers bind this as a signed 64-bit value.
    U64(u64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Double-precision float
    Double(f64),
    /// NULL value
    Null,
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Any integer variant widened to `i64`. `U64` values above `i64::MAX` wrap.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::I32(v) => Some(i64::from(*v)),
            SqlValue::I64(v) => Some(*v),
            SqlValue::U32(v) => Some(i64::from(*v)),
            SqlValue::U64(v) => Some(*v as i64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(value) => Some(*value),
            // TINYINT(1) columns come back as integers
            other => match other.as_i64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Double(value) => Some(*value),
            SqlValue::I32(value) => Some(f64::from(*value)),
            SqlValue::U32(value) => Some(f64::from(*value)),
            SqlValue::I64(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Short variant name used in mapping error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::I32(_) => "i32",
            SqlValue::I64(_) => "i64",
            SqlValue::U32(_) => "u32",
            SqlValue::U64(_) => "u64",
            SqlValue::Text(_) => "text",
            SqlValue::Bool(_) => "bool",
            SqlValue::Double(_) => "double",
            SqlValue::Null => "null",
        }
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::I32(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::I64(value)
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::U32(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        SqlValue::U64(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_owned())
    }
}

impl From<&String> for SqlValue {
    fn from(value: &String) -> Self {
        SqlValue::Text(value.clone())
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Double(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// Semantic column type of a mapped field; each dialect renders it to DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Int,
    BigInt,
    UnsignedInt,
    UnsignedBigInt,
    Text,
    Boolean,
    Double,
}

/// Rust types that can back a mapped column.
///
/// The set is closed over the scalar types `SqlValue` can carry (plus `Option` of
/// them for nullable columns), so an unsupported field type is a compile error
/// rather than a silently zeroed value.
pub trait FieldValue: Sized + Send + 'static {
    /// Semantic type used when no explicit SQL type override is given.
    const SQL_TYPE: SqlType;

    fn to_sql_value(&self) -> SqlValue;

    /// Type-directed extraction of a column cell.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` if the cell holds NULL or a value of an incompatible type.
    fn from_sql_value(value: &SqlValue) -> Result<Self, OrmError>;
}

fn mismatch(expected: &str, value: &SqlValue) -> OrmError {
    if value.is_null() {
        OrmError::Mapping(format!("unexpected NULL for non-optional {expected} field"))
    } else {
        OrmError::Mapping(format!(
            "cannot read {} column value into {expected} field",
            value.kind()
        ))
    }
}

impl FieldValue for i32 {
    const SQL_TYPE: SqlType = SqlType::Int;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::I32(*self)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, OrmError> {
        let wide = match value {
            SqlValue::U64(v) => i64::try_from(*v).ok(),
            other => other.as_i64(),
        };
        wide.and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| mismatch("i32", value))
    }
}

impl FieldValue for i64 {
    const SQL_TYPE: SqlType = SqlType::BigInt;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::I64(*self)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, OrmError> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FieldValue for u32 {
    const SQL_TYPE: SqlType = SqlType::UnsignedInt;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::U32(*self)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, OrmError> {
        let wide = match value {
            SqlValue::U64(v) => Some(*v),
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        };
        wide.and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| mismatch("u32", value))
    }
}

impl FieldValue for u64 {
    const SQL_TYPE: SqlType = SqlType::UnsignedBigInt;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::U64(*self)
    }

    #[allow(clippy::cast_sign_loss)]
    fn from_sql_value(value: &SqlValue) -> Result<Self, OrmError> {
        match value {
            SqlValue::U64(v) => Ok(*v),
            SqlValue::U32(v) => Ok(u64::from(*v)),
            // inverse of the signed binding, so values past i64::MAX survive a round trip
            SqlValue::I64(v) => Ok(*v as u64),
            SqlValue::I32(v) => u64::try_from(*v).map_err(|_| mismatch("u64", value)),
            other => Err(mismatch("u64", other)),
        }
    }
}

impl FieldValue for String {
    const SQL_TYPE: SqlType = SqlType::Text;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, OrmError> {
        value
            .as_text()
            .map(str::to_owned)
            .ok_or_else(|| mismatch("string", value))
    }
}

impl FieldValue for bool {
    const SQL_TYPE: SqlType = SqlType::Boolean;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Bool(*self)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, OrmError> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FieldValue for f64 {
    const SQL_TYPE: SqlType = SqlType::Double;

    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Double(*self)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, OrmError> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl<V: FieldValue> FieldValue for Option<V> {
    const SQL_TYPE: SqlType = V::SQL_TYPE;

    fn to_sql_value(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, FieldValue::to_sql_value)
    }

    fn from_sql_value(value: &SqlValue) -> Result<Self, OrmError> {
        if value.is_null() {
            Ok(None)
        } else {
            V::from_sql_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_narrow_only_when_they_fit() {
        assert_eq!(i32::from_sql_value(&SqlValue::I64(42)).unwrap(), 42);
        assert!(i32::from_sql_value(&SqlValue::I64(i64::MAX)).is_err());
        assert!(u32::from_sql_value(&SqlValue::I32(-1)).is_err());
    }

    #[test]
    fn u64_survives_signed_storage() {
        let big = u64::MAX - 3;
        let stored = SqlValue::I64(SqlValue::U64(big).as_i64().unwrap());
        assert_eq!(u64::from_sql_value(&stored).unwrap(), big);
    }

    #[test]
    fn tinyint_reads_as_bool() {
        assert!(bool::from_sql_value(&SqlValue::I32(1)).unwrap());
        assert!(!bool::from_sql_value(&SqlValue::I64(0)).unwrap());
        assert!(bool::from_sql_value(&SqlValue::I32(2)).is_err());
    }

    #[test]
    fn null_only_fits_optional_fields() {
        let err = String::from_sql_value(&SqlValue::Null).unwrap_err();
        assert!(err.to_string().contains("unexpected NULL"));
        assert_eq!(Option::<String>::from_sql_value(&SqlValue::Null).unwrap(), None);
        assert_eq!(Option::<i32>::None.to_sql_value(), SqlValue::Null);
    }

    #[test]
    fn text_does_not_coerce_to_numbers() {
        let err = f64::from_sql_value(&SqlValue::Text("9.99".into())).unwrap_err();
        assert!(matches!(err, OrmError::Mapping(_)));
    }
}
