//! Access layer composition root

use crate::config::WardenConfig;
use std::sync::Arc;
use tracing::info;
use warden_context::{MatcherKind, ScopeGuard, ScopeStack, SecurityScope};
use warden_core::WardenResult;
use warden_filter::{
    AccessFilterExt, Admitted, EntityType, Predicate, PredicateRegistry, SchemaCatalog,
    TypedEntity,
};

/// Owns the type catalog, the predicate registry and the scope stack of one
/// application, with the stack installed as the registry's clearance source
pub struct AccessControl {
    catalog: Arc<SchemaCatalog>,
    registry: PredicateRegistry,
    stack: ScopeStack,
}

impl AccessControl {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self::with_matcher(catalog, MatcherKind::default())
    }

    pub fn with_matcher(catalog: SchemaCatalog, matcher: MatcherKind) -> Self {
        let catalog = Arc::new(catalog);
        let registry = PredicateRegistry::new(catalog.clone());
        let stack = ScopeStack::with_matcher(matcher.build());
        registry.set_clearance_source(Arc::new(stack.clone()));
        Self {
            catalog,
            registry,
            stack,
        }
    }

    pub fn from_config(catalog: SchemaCatalog, config: &WardenConfig) -> WardenResult<Self> {
        let access = Self::with_matcher(catalog, config.matcher_kind());
        config.apply(&access.stack, &access.registry)?;
        info!(
            entity_types = access.catalog.len(),
            matcher = ?config.matcher_kind(),
            "Access control initialized"
        );
        Ok(access)
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &PredicateRegistry {
        &self.registry
    }

    pub fn stack(&self) -> &ScopeStack {
        &self.stack
    }

    /// Enter a nested scope on the calling execution path
    pub fn enter(&self) -> ScopeGuard {
        self.stack.enter()
    }

    /// Ambient scope of the calling execution path
    pub fn current(&self) -> Arc<SecurityScope> {
        self.stack.current()
    }

    pub fn register_classified_field(
        &self,
        entity: impl Into<EntityType>,
        field: &str,
        dimension: &str,
    ) -> WardenResult<()> {
        self.registry
            .register_classified_field(&entity.into(), field, dimension)
    }

    /// Ancestor-inclusive predicate for `T` under the ambient clearances
    pub fn predicate_for<T: TypedEntity>(&self) -> WardenResult<Arc<Predicate>> {
        self.registry.predicate_for::<T>(&self.stack)
    }

    /// Restrict `items` to the entities visible under the ambient clearances
    pub fn access_scope_filtered<I>(&self, items: I) -> WardenResult<Admitted<I::IntoIter>>
    where
        I: IntoIterator,
        I::Item: TypedEntity,
    {
        items
            .into_iter()
            .access_filtered(&self.registry, &self.stack)
    }

    /// Permission check against the ambient scope
    pub fn has_effective_permission(&self, permission: &str) -> bool {
        self.stack.current().has_effective_permission(permission)
    }
}

impl std::fmt::Debug for AccessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessControl")
            .field("registry", &self.registry)
            .field("stack", &self.stack)
            .finish()
    }
}
