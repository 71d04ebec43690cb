//! Type descriptions
//!
//! The compiler never inspects host types. It asks a [`TypeCatalog`] once per entity
//! type for the fields (with their value kinds and declaring type), the fields that
//! are classified out of the box, and the navigations that lead to parent entities.

use crate::entity::EntityType;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use warden_core::ValueKind;

/// One field of an entity type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: ValueKind,
    /// Type that declares the field; differs from the described type for
    /// inherited fields
    pub declared_by: EntityType,
    /// Dimension the field is classified under by declaration
    pub classification: Option<String>,
}

/// Upward navigation to a parent entity whose visibility the entity inherits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NavigationEdge {
    pub name: String,
    pub target: EntityType,
}

/// Description of one entity type
#[derive(Debug, Clone)]
pub struct EntitySchema {
    entity: EntityType,
    fields: IndexMap<String, FieldDescriptor>,
    navigations: Vec<NavigationEdge>,
}

impl EntitySchema {
    pub fn new(entity: impl Into<EntityType>) -> Self {
        Self {
            entity: entity.into(),
            fields: IndexMap::new(),
            navigations: Vec::new(),
        }
    }

    /// Field declared by this type
    pub fn field(mut self, name: &str, kind: ValueKind) -> Self {
        let declared_by = self.entity.clone();
        self.insert_field(name, kind, declared_by, None);
        self
    }

    /// Field declared by this type and classified under `dimension`
    pub fn classified_field(mut self, name: &str, kind: ValueKind, dimension: &str) -> Self {
        let declared_by = self.entity.clone();
        self.insert_field(name, kind, declared_by, Some(dimension.to_string()));
        self
    }

    /// Field visible on this type but declared by `declared_by`
    pub fn inherited_field(
        mut self,
        name: &str,
        kind: ValueKind,
        declared_by: impl Into<EntityType>,
    ) -> Self {
        self.insert_field(name, kind, declared_by.into(), None);
        self
    }

    /// Navigation `name` leading to a parent of type `target`
    pub fn navigation(mut self, name: &str, target: impl Into<EntityType>) -> Self {
        self.navigations.push(NavigationEdge {
            name: name.to_string(),
            target: target.into(),
        });
        self
    }

    fn insert_field(
        &mut self,
        name: &str,
        kind: ValueKind,
        declared_by: EntityType,
        classification: Option<String>,
    ) {
        self.fields.insert(
            name.to_string(),
            FieldDescriptor {
                name: name.to_string(),
                kind,
                declared_by,
                classification,
            },
        );
    }

    pub fn entity(&self) -> &EntityType {
        &self.entity
    }

    pub fn field_descriptor(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn navigations(&self) -> &[NavigationEdge] {
        &self.navigations
    }
}

/// Source of entity type descriptions
pub trait TypeCatalog: Send + Sync {
    fn describe(&self, entity: &EntityType) -> Option<EntitySchema>;
}

/// In-memory catalog populated at startup
#[derive(Default)]
pub struct SchemaCatalog {
    schemas: RwLock<HashMap<EntityType, EntitySchema>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with(self, schema: EntitySchema) -> Self {
        self.register(schema);
        self
    }

    /// Register or replace the description of a type. Builders already created
    /// for the type keep the description they were created with.
    pub fn register(&self, schema: EntitySchema) {
        self.schemas.write().insert(schema.entity.clone(), schema);
    }

    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }
}

impl TypeCatalog for SchemaCatalog {
    fn describe(&self, entity: &EntityType) -> Option<EntitySchema> {
        self.schemas.read().get(entity).cloned()
    }
}
