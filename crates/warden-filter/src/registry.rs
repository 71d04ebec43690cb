//! Process-wide predicate registry
//!
//! The registry hands out one [`PredicateBuilder`] per entity type, created lazily
//! from the [`TypeCatalog`] on first request. The map lock is held only while a
//! builder is looked up or inserted; compiling happens under the builder's own locks.

use crate::builder::PredicateBuilder;
use crate::entity::{EntityType, TypedEntity};
use crate::predicate::{Predicate, Restriction};
use crate::schema::TypeCatalog;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use warden_core::{ClearanceSource, WardenError, WardenResult};

/// Registry of per-type predicate builders
pub struct PredicateRegistry {
    catalog: Arc<dyn TypeCatalog>,
    builders: Mutex<HashMap<EntityType, Arc<PredicateBuilder>>>,
    clearance_source: RwLock<Option<Arc<dyn ClearanceSource>>>,
}

impl PredicateRegistry {
    pub fn new(catalog: Arc<dyn TypeCatalog>) -> Self {
        Self {
            catalog,
            builders: Mutex::new(HashMap::new()),
            clearance_source: RwLock::new(None),
        }
    }

    /// Builder for `entity`, created on first request
    pub fn get(&self, entity: &EntityType) -> WardenResult<Arc<PredicateBuilder>> {
        let mut builders = self.builders.lock();
        if let Some(builder) = builders.get(entity) {
            return Ok(builder.clone());
        }

        let schema = self
            .catalog
            .describe(entity)
            .ok_or_else(|| WardenError::unknown_entity(entity.as_str()))?;
        let builder = Arc::new(PredicateBuilder::from_schema(schema)?);
        builders.insert(entity.clone(), builder.clone());
        debug!(entity = %entity, "Created predicate builder");
        Ok(builder)
    }

    /// Typed variant of [`get`](Self::get)
    pub fn builder_for<T: TypedEntity>(&self) -> WardenResult<Arc<PredicateBuilder>> {
        self.get(&T::entity_type())
    }

    /// Classify `field` of `entity` under `dimension`
    pub fn register_classified_field(
        &self,
        entity: &EntityType,
        field: &str,
        dimension: &str,
    ) -> WardenResult<()> {
        self.get(entity)?.register_classified_field(field, dimension)
    }

    /// Predicate over the classified fields of `entity` alone
    pub fn build_local_predicate(
        &self,
        entity: &EntityType,
        source: &dyn ClearanceSource,
    ) -> WardenResult<Arc<Predicate>> {
        self.local_restriction(entity, source)
            .map(|restriction| restriction.predicate())
    }

    /// Predicate over `entity` and every ancestor reachable through its navigations
    pub fn build_predicate_including_ancestors(
        &self,
        entity: &EntityType,
        source: &dyn ClearanceSource,
    ) -> WardenResult<Arc<Predicate>> {
        self.inclusive_restriction(entity, source)
            .map(|restriction| restriction.predicate())
    }

    pub fn local_restriction(
        &self,
        entity: &EntityType,
        source: &dyn ClearanceSource,
    ) -> WardenResult<Restriction> {
        self.get(entity)?.local_restriction(source)
    }

    pub fn inclusive_restriction(
        &self,
        entity: &EntityType,
        source: &dyn ClearanceSource,
    ) -> WardenResult<Restriction> {
        self.get(entity)?.inclusive_restriction(self, source)
    }

    /// Ancestor-inclusive predicate for a statically typed entity
    pub fn predicate_for<T: TypedEntity>(
        &self,
        source: &dyn ClearanceSource,
    ) -> WardenResult<Arc<Predicate>> {
        self.build_predicate_including_ancestors(&T::entity_type(), source)
    }

    /// Install the clearance source used by the `*_default` operations
    pub fn set_clearance_source(&self, source: Arc<dyn ClearanceSource>) {
        debug!(source = %source.source_id(), "Installed default clearance source");
        *self.clearance_source.write() = Some(source);
    }

    /// The installed default clearance source
    pub fn clearance_source(&self) -> WardenResult<Arc<dyn ClearanceSource>> {
        self.clearance_source
            .read()
            .clone()
            .ok_or(WardenError::MissingClearanceSource)
    }

    pub fn build_local_predicate_default(&self, entity: &EntityType) -> WardenResult<Arc<Predicate>> {
        let source = self.clearance_source()?;
        self.build_local_predicate(entity, source.as_ref())
    }

    pub fn build_predicate_including_ancestors_default(
        &self,
        entity: &EntityType,
    ) -> WardenResult<Arc<Predicate>> {
        let source = self.clearance_source()?;
        self.build_predicate_including_ancestors(entity, source.as_ref())
    }

    /// Entity types with a builder
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<EntityType> = self.builders.lock().keys().cloned().collect();
        types.sort();
        types
    }
}

impl std::fmt::Debug for PredicateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateRegistry")
            .field("builders", &self.builders.lock().len())
            .field("has_clearance_source", &self.clearance_source.read().is_some())
            .finish()
    }
}
