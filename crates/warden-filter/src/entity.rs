//! Entity model seen by the predicate compiler

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use warden_core::FieldValue;

/// Identity of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityType(Arc<str>);

impl EntityType {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

/// Row access for predicate evaluation
///
/// Implemented by host data types. Only classified fields and navigations named in
/// the type's schema are ever requested.
pub trait Entity {
    /// Current value of a classified field; `None` when unset
    fn field_value(&self, field: &str) -> Option<FieldValue>;

    /// Parent reached through the navigation `edge`; `None` when not attached
    fn navigate(&self, edge: &str) -> Option<&dyn Entity>;
}

/// Entity with a statically known type, for typed predicate lookups
pub trait TypedEntity: Entity {
    const ENTITY_TYPE: &'static str;

    fn entity_type() -> EntityType {
        EntityType::new(Self::ENTITY_TYPE)
    }
}

impl<T: Entity + ?Sized> Entity for &T {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        (**self).field_value(field)
    }

    fn navigate(&self, edge: &str) -> Option<&dyn Entity> {
        (**self).navigate(edge)
    }
}

impl<T: Entity + ?Sized> Entity for Arc<T> {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        (**self).field_value(field)
    }

    fn navigate(&self, edge: &str) -> Option<&dyn Entity> {
        (**self).navigate(edge)
    }
}

impl<T: Entity + ?Sized> Entity for Box<T> {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        (**self).field_value(field)
    }

    fn navigate(&self, edge: &str) -> Option<&dyn Entity> {
        (**self).navigate(edge)
    }
}

impl<T: TypedEntity> TypedEntity for &T {
    const ENTITY_TYPE: &'static str = T::ENTITY_TYPE;
}

impl<T: TypedEntity> TypedEntity for Arc<T> {
    const ENTITY_TYPE: &'static str = T::ENTITY_TYPE;
}
