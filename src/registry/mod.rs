//! Per-type table metadata, built once at startup and read-only afterwards.

mod constraints;
mod descriptor;

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::OrmError;

pub use constraints::Constraints;
pub use descriptor::{DEFAULT_TABLE_OPTIONS, Entity, FieldDescriptor, TableDescriptor};

type Stored = Arc<dyn Any + Send + Sync>;

/// Collects table descriptors before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    tables: HashMap<TypeId, Stored>,
    names: HashMap<TypeId, &'static str>,
}

impl RegistryBuilder {
    /// Register the mapping for entity type `T`.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` if `T` is already registered or the descriptor is invalid.
    pub fn register<T: Send + 'static>(
        mut self,
        table: TableDescriptor<T>,
    ) -> Result<Self, OrmError> {
        let key = TypeId::of::<T>();
        if self.tables.contains_key(&key) {
            return Err(OrmError::Mapping(format!(
                "{} is already registered",
                type_name::<T>()
            )));
        }
        table.validate()?;
        tracing::debug!(entity = type_name::<T>(), table = table.name(), "registered entity");
        self.tables.insert(key, Arc::new(table));
        self.names.insert(key, type_name::<T>());
        Ok(self)
    }

    /// Register a self-describing entity.
    ///
    /// # Errors
    /// See [`RegistryBuilder::register`].
    pub fn entity<T: Entity>(self) -> Result<Self, OrmError> {
        self.register(T::table())
    }

    #[must_use]
    pub fn build(self) -> Registry {
        Registry {
            tables: self.tables,
            names: self.names,
        }
    }
}

/// Immutable map from entity type to its [`TableDescriptor`].
///
/// Lookups are lock-free; share it behind an `Arc`.
#[derive(Default)]
pub struct Registry {
    tables: HashMap<TypeId, Stored>,
    names: HashMap<TypeId, &'static str>,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up the descriptor for `T`.
    ///
    /// # Errors
    /// Returns `OrmError::Mapping` if `T` was never registered.
    pub fn describe<T: 'static>(&self) -> Result<Arc<TableDescriptor<T>>, OrmError> {
        let stored = self.tables.get(&TypeId::of::<T>()).ok_or_else(|| {
            OrmError::Mapping(format!("{} is not a registered entity", type_name::<T>()))
        })?;
        Arc::clone(stored)
            .downcast::<TableDescriptor<T>>()
            .map_err(|_| {
                OrmError::Mapping(format!("descriptor type mismatch for {}", type_name::<T>()))
            })
    }

    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.tables.contains_key(&TypeId::of::<T>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Registered entity type names, sorted.
    #[must_use]
    pub fn entity_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.names.values().copied().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entities", &self.entity_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SqlType, SqlValue};

    #[derive(Debug, Default, PartialEq)]
    struct Product {
        id: i32,
        name: String,
        price: f64,
        note: Option<String>,
    }

    impl Entity for Product {
        fn table() -> TableDescriptor<Self> {
            TableDescriptor::new("products")
                .field(crate::field!(Product, id).constraints("PRIMARY KEY AUTO_INCREMENT"))
                .field(crate::field!(Product, name).constraints("NOT_NULL, DEFAULT ''"))
                .field(crate::field!(Product, price).sql_type("DECIMAL(10,2)"))
                .field(crate::field!(Product, note))
        }
    }

    #[derive(Debug, Default)]
    struct Untracked;

    #[test]
    fn describe_returns_registered_descriptor() {
        let registry = Registry::builder().entity::<Product>().unwrap().build();
        let table = registry.describe::<Product>().unwrap();
        assert_eq!(table.name(), "products");
        assert_eq!(table.table_options(), DEFAULT_TABLE_OPTIONS);
        assert_eq!(table.auto_increment_field().unwrap().column(), "id");
        assert_eq!(table.primary_keys().count(), 1);
        assert_eq!(table.fields()[2].type_override(), Some("DECIMAL(10,2)"));
        assert_eq!(table.fields()[1].semantic_type(), SqlType::Text);
        assert!(table.fields()[3].is_nullable());
        assert!(!table.fields()[1].is_nullable());

        let name = table.field_by_column("name").unwrap();
        assert_eq!(name.constraint_sql(), "NOT_NULL, DEFAULT ''");
        assert_eq!(name.semantic_type(), SqlType::Text);
        assert!(table.field_by_column("missing").is_none());
    }

    #[test]
    fn unregistered_type_is_a_mapping_error() {
        let registry = Registry::builder().entity::<Product>().unwrap().build();
        let err = registry.describe::<Untracked>().unwrap_err();
        assert!(matches!(err, OrmError::Mapping(_)));
        assert!(!registry.contains::<Untracked>());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let result = Registry::builder()
            .entity::<Product>()
            .unwrap()
            .entity::<Product>();
        assert!(matches!(result, Err(OrmError::Mapping(_))));
    }

    #[test]
    fn invalid_descriptors_are_rejected() {
        let twice = TableDescriptor::<Product>::new("p")
            .field(crate::field!(Product, id))
            .field(crate::field!(Product, name, "id"));
        assert!(Registry::builder().register(twice).is_err());

        let auto_not_pk = TableDescriptor::<Product>::new("p")
            .field(crate::field!(Product, id).constraints("AUTO_INCREMENT"));
        let err = Registry::builder().register(auto_not_pk).err().unwrap();
        assert!(err.to_string().contains("must be the primary key"));

        let empty = TableDescriptor::<Product>::new("p");
        assert!(Registry::builder().register(empty).is_err());
    }

    #[test]
    fn accessors_read_and_write_fields() {
        let table = Product::table();
        let mut product = Product {
            id: 7,
            name: "Mug".into(),
            price: 9.99,
            note: None,
        };
        assert_eq!(table.fields()[0].value(&product), SqlValue::I32(7));
        assert_eq!(table.fields()[3].value(&product), SqlValue::Null);

        table.fields()[1]
            .assign(&mut product, &SqlValue::Text("Cup".into()))
            .unwrap();
        assert_eq!(product.name, "Cup");

        let err = table.fields()[2]
            .assign(&mut product, &SqlValue::Text("cheap".into()))
            .unwrap_err();
        assert!(err.to_string().contains("column `price`"));
    }
}
