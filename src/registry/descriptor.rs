use std::collections::HashSet;
use std::fmt;

use crate::error::OrmError;
use crate::types::{FieldValue, SqlType, SqlValue};

use super::constraints::Constraints;

/// Table options used when a descriptor does not set its own.
pub const DEFAULT_TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

type Getter<T> = Box<dyn Fn(&T) -> SqlValue + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, &SqlValue) -> Result<(), OrmError> + Send + Sync>;

/// How one entity field maps to one column.
///
/// Built with [`FieldDescriptor::new`] (or the [`field!`](crate::field) macro) from a pair of
/// plain accessor functions; the value type `V` fixes the default SQL type and the
/// conversion used when rows are read back.
pub struct FieldDescriptor<T> {
    column: String,
    constraint_sql: String,
    constraints: Constraints,
    sql_type: SqlType,
    type_override: Option<String>,
    nullable: bool,
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T: 'static> FieldDescriptor<T> {
    pub fn new<V: FieldValue>(
        column: impl Into<String>,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        let null_read = V::from_sql_value(&SqlValue::Null);
        Self {
            column: column.into(),
            constraint_sql: String::new(),
            constraints: Constraints::default(),
            sql_type: V::SQL_TYPE,
            type_override: None,
            nullable: null_read.is_ok(),
            getter: Box::new(move |entity| get(entity).to_sql_value()),
            setter: Box::new(move |entity, value| {
                *get_mut(entity) = V::from_sql_value(value)?;
                Ok(())
            }),
        }
    }

    /// Attach a raw constraint string, e.g. `"PRIMARY KEY AUTO_INCREMENT"` or
    /// `"NOT_NULL, DEFAULT ''"`.
    #[must_use]
    pub fn constraints(mut self, raw: impl Into<String>) -> Self {
        self.constraint_sql = raw.into();
        self.constraints = Constraints::parse(&self.constraint_sql);
        self
    }

    /// Override the dialect's default DDL type for this column.
    #[must_use]
    pub fn sql_type(mut self, ty: impl Into<String>) -> Self {
        self.type_override = Some(ty.into());
        self
    }
}

impl<T> FieldDescriptor<T> {
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[must_use]
    pub fn constraint_sql(&self) -> &str {
        &self.constraint_sql
    }

    #[must_use]
    pub fn tags(&self) -> Constraints {
        self.constraints
    }

    #[must_use]
    pub fn is_primary_key(&self) -> bool {
        self.constraints.primary_key
    }

    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        self.constraints.auto_increment
    }

    #[must_use]
    pub fn semantic_type(&self) -> SqlType {
        self.sql_type
    }

    #[must_use]
    pub fn type_override(&self) -> Option<&str> {
        self.type_override.as_deref()
    }

    /// True when the backing Rust type is an `Option`.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Read the field out of `entity` as a bindable value.
    #[must_use]
    pub fn value(&self, entity: &T) -> SqlValue {
        (self.getter)(entity)
    }

    /// Write a column value into `entity`.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` when `value` does not convert to the field's type.
    pub fn assign(&self, entity: &mut T, value: &SqlValue) -> Result<(), OrmError> {
        (self.setter)(entity, value).map_err(|err| match err {
            OrmError::Mapping(msg) => OrmError::Mapping(format!("column `{}`: {msg}", self.column)),
            other => other,
        })
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("column", &self.column)
            .field("constraints", &self.constraint_sql)
            .field("sql_type", &self.sql_type)
            .field("type_override", &self.type_override)
            .finish_non_exhaustive()
    }
}

/// How one entity type maps to one table.
pub struct TableDescriptor<T> {
    name: String,
    fields: Vec<FieldDescriptor<T>>,
    options: String,
    indexes: Vec<String>,
}

impl<T> TableDescriptor<T> {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            options: DEFAULT_TABLE_OPTIONS.to_string(),
            indexes: Vec::new(),
        }
    }

    /// Append a field; declaration order is column order.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor<T>) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    /// Add a raw index definition, e.g. `"INDEX idx_name (name)"`.
    #[must_use]
    pub fn index(mut self, definition: impl Into<String>) -> Self {
        self.indexes.push(definition.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    #[must_use]
    pub fn table_options(&self) -> &str {
        &self.options
    }

    #[must_use]
    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    #[must_use]
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor<T>> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Primary-key fields in declaration order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &FieldDescriptor<T>> {
        self.fields.iter().filter(|f| f.is_primary_key())
    }

    #[must_use]
    pub fn auto_increment_field(&self) -> Option<&FieldDescriptor<T>> {
        self.fields.iter().find(|f| f.is_auto_increment())
    }

    /// Check the structural rules every registered table must satisfy.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` describing the first violation.
    pub fn validate(&self) -> Result<(), OrmError> {
        if self.name.trim().is_empty() {
            return Err(OrmError::Mapping("table name must not be empty".to_string()));
        }
        if self.fields.is_empty() {
            return Err(OrmError::Mapping(format!(
                "table `{}` declares no fields",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.column.trim().is_empty() {
                return Err(OrmError::Mapping(format!(
                    "table `{}` has a field with an empty column name",
                    self.name
                )));
            }
            if !seen.insert(field.column.as_str()) {
                return Err(OrmError::Mapping(format!(
                    "column `{}` declared twice in table `{}`",
                    field.column, self.name
                )));
            }
        }

        let auto: Vec<_> = self.fields.iter().filter(|f| f.is_auto_increment()).collect();
        if auto.len() > 1 {
            return Err(OrmError::Mapping(format!(
                "table `{}` has more than one auto-increment column",
                self.name
            )));
        }
        if let Some(field) = auto.first() {
            if !field.is_primary_key() {
                return Err(OrmError::Mapping(format!(
                    "auto-increment column `{}` in table `{}` must be the primary key",
                    field.column, self.name
                )));
            }
            if !matches!(
                field.sql_type,
                SqlType::Int | SqlType::BigInt | SqlType::UnsignedInt | SqlType::UnsignedBigInt
            ) {
                return Err(OrmError::Mapping(format!(
                    "auto-increment column `{}` in table `{}` must be an integer",
                    field.column, self.name
                )));
            }
        }
        Ok(())
    }
}

impl<T> fmt::Debug for TableDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("options", &self.options)
            .field("indexes", &self.indexes)
            .finish()
    }
}

/// A type that describes its own table mapping.
///
/// ```rust
/// use sql_mapper::prelude::*;
///
/// #[derive(Debug, Default)]
/// struct Tag {
///     id: i64,
///     label: String,
/// }
///
/// impl Entity for Tag {
///     fn table() -> TableDescriptor<Self> {
///         TableDescriptor::new("tags")
///             .field(field!(Tag, id).constraints("PRIMARY KEY AUTO_INCREMENT"))
///             .field(field!(Tag, label).constraints("NOT_NULL, UNIQUE"))
///     }
/// }
///
/// let registry = Registry::builder().entity::<Tag>()?.build();
/// assert_eq!(registry.describe::<Tag>()?.name(), "tags");
/// # Ok::<(), OrmError>(())
/// ```
pub trait Entity: Default + Send + Sized + 'static {
    fn table() -> TableDescriptor<Self>;
}

/// Build a [`FieldDescriptor`] for a struct member.
///
/// `field!(Product, name)` maps member `name` to column `name`;
/// `field!(Product, name, "product_name")` picks the column explicitly.
#[macro_export]
macro_rules! field {
    ($entity:ty, $member:ident) => {
        $crate::field!($entity, $member, stringify!($member))
    };
    ($entity:ty, $member:ident, $column:expr) => {
        $crate::registry::FieldDescriptor::<$entity>::new(
            $column,
            |e| &e.$member,
            |e| &mut e.$member,
        )
    };
}
