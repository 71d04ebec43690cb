//! Per-type predicate builder
//!
//! A [`PredicateBuilder`] holds the classification mapping and navigation edges of one
//! entity type and two cache slots:
//!
//! - **local**: the predicate over this type's own classified fields. Rebuilt when
//!   the clearance source changes identity or when the fingerprint of the tokens held
//!   in the mapped dimensions changes. When the source reports an unchanged
//!   change-version the fingerprint is not even recomputed.
//! - **inclusive**: the local predicate ANDed with every parent's inclusive predicate,
//!   rebased onto the navigation that reaches it. Rebuilt when the local slot or any
//!   parent's inclusive slot was rebuilt since it was last composed.
//!
//! Unchanged clearances return the very same `Arc<Predicate>`.
//!
//! # Consistency
//!
//! Clearances are read while building, without a snapshot across the ancestor
//! graph. If another execution path mutates clearances mid-build, a result may mix
//! values from before and after the mutation. The next request observes the new
//! version and converges; this is accepted, not a correctness violation.
//!
//! # Locking
//!
//! Each builder guards its mapping and its two slots with its own locks. No builder
//! lock is held while another builder is consulted, so unrelated types never
//! serialize and cyclic navigation graphs cannot deadlock.

use crate::compile::compile_field;
use crate::entity::EntityType;
use crate::predicate::{FieldPath, Restriction};
use crate::registry::PredicateRegistry;
use crate::schema::{EntitySchema, NavigationEdge};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};
use warden_core::{
    ClearanceSource, ClearanceVersion, SourceId, ValueKind, WardenError, WardenResult,
};

/// Dimension a field is classified under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub dimension: String,
    pub kind: ValueKind,
}

type Fingerprint = [u8; 32];

#[derive(Default)]
struct LocalSlot {
    source: Option<SourceId>,
    version: Option<ClearanceVersion>,
    fingerprint: Option<Fingerprint>,
    restriction: Option<Restriction>,
    generation: u64,
}

impl LocalSlot {
    fn invalidate(&mut self) {
        self.version = None;
        self.fingerprint = None;
        self.restriction = None;
    }
}

#[derive(Default)]
struct InclusiveSlot {
    restriction: Option<Restriction>,
    local_generation: u64,
    parent_generations: Vec<u64>,
    generation: u64,
}

/// Local restriction together with the generation of the slot that produced it
pub(crate) struct Resolved {
    pub restriction: Restriction,
    pub generation: u64,
    /// False when a navigation cycle was cut somewhere below this type
    pub complete: bool,
}

/// Predicate compiler for one entity type
pub struct PredicateBuilder {
    schema: EntitySchema,
    classifications: RwLock<IndexMap<String, Classification>>,
    local: Mutex<LocalSlot>,
    inclusive: Mutex<InclusiveSlot>,
}

impl PredicateBuilder {
    /// Create a builder from a type description, registering every field the
    /// description declares as classified
    pub fn from_schema(schema: EntitySchema) -> WardenResult<Self> {
        let declared: Vec<(String, String)> = schema
            .fields()
            .filter_map(|field| {
                field
                    .classification
                    .as_ref()
                    .map(|dimension| (field.name.clone(), dimension.clone()))
            })
            .collect();

        let builder = Self {
            schema,
            classifications: RwLock::new(IndexMap::new()),
            local: Mutex::new(LocalSlot::default()),
            inclusive: Mutex::new(InclusiveSlot::default()),
        };
        for (field, dimension) in declared {
            builder.register_classified_field(&field, &dimension)?;
        }
        Ok(builder)
    }

    pub fn entity(&self) -> &EntityType {
        self.schema.entity()
    }

    pub fn navigations(&self) -> &[NavigationEdge] {
        self.schema.navigations()
    }

    /// Snapshot of the classification mapping in registration order
    pub fn classifications(&self) -> Vec<(String, Classification)> {
        self.classifications
            .read()
            .iter()
            .map(|(field, classification)| (field.clone(), classification.clone()))
            .collect()
    }

    /// Distinct dimensions referenced by the mapping, in mapping order
    pub fn related_dimensions(&self) -> Vec<String> {
        let mut dimensions: Vec<String> = Vec::new();
        for classification in self.classifications.read().values() {
            if !dimensions.contains(&classification.dimension) {
                dimensions.push(classification.dimension.clone());
            }
        }
        dimensions
    }

    /// Classify `field` under `dimension`.
    ///
    /// The field must be declared by this type and be of a classifiable kind.
    /// Registering the same field under the same dimension again is a no-op.
    pub fn register_classified_field(&self, field: &str, dimension: &str) -> WardenResult<()> {
        let entity = self.entity();
        let descriptor = self
            .schema
            .field_descriptor(field)
            .ok_or_else(|| WardenError::unknown_field(entity.as_str(), field))?;

        if descriptor.declared_by != *entity {
            return Err(WardenError::ForeignField {
                entity: entity.to_string(),
                field: field.to_string(),
                declared_by: descriptor.declared_by.to_string(),
            });
        }
        if !descriptor.kind.is_classifiable() {
            return Err(WardenError::UnsupportedFieldKind {
                entity: entity.to_string(),
                field: field.to_string(),
                kind: descriptor.kind.to_string(),
                supported: ValueKind::classifiable_names(),
            });
        }

        {
            let mut classifications = self.classifications.write();
            if let Some(existing) = classifications.get(field) {
                if existing.dimension == dimension {
                    return Ok(());
                }
                return Err(WardenError::ConflictingClassification {
                    entity: entity.to_string(),
                    field: field.to_string(),
                    existing: existing.dimension.clone(),
                    requested: dimension.to_string(),
                });
            }
            classifications.insert(
                field.to_string(),
                Classification {
                    dimension: dimension.to_string(),
                    kind: descriptor.kind,
                },
            );
        }

        self.local.lock().invalidate();
        debug!(entity = %entity, field, dimension, "Registered classified field");
        Ok(())
    }

    /// Predicate over this type's own classified fields
    pub fn local_restriction(&self, source: &dyn ClearanceSource) -> WardenResult<Restriction> {
        self.resolve_local(source).map(|(restriction, _)| restriction)
    }

    /// Predicate over this type and every ancestor reachable through its navigations
    pub fn inclusive_restriction(
        &self,
        registry: &PredicateRegistry,
        source: &dyn ClearanceSource,
    ) -> WardenResult<Restriction> {
        let mut visiting = Vec::new();
        self.resolve_inclusive(registry, source, &mut visiting)
            .map(|resolved| resolved.restriction)
    }

    fn resolve_local(&self, source: &dyn ClearanceSource) -> WardenResult<(Restriction, u64)> {
        let mut slot = self.local.lock();

        let source_id = source.source_id();
        if slot.source != Some(source_id) {
            slot.invalidate();
            slot.source = Some(source_id);
        }

        // version is read before any token so a concurrent change is seen next time
        let version = source.version();
        if let (Some(restriction), Some(version)) = (&slot.restriction, version) {
            if slot.version == Some(version) {
                trace!(entity = %self.entity(), "Local predicate unchanged (version)");
                return Ok((restriction.clone(), slot.generation));
            }
        }

        let held: Vec<(String, Vec<String>)> = self
            .related_dimensions()
            .into_iter()
            .map(|dimension| {
                let tokens = source.clearances_of(&dimension);
                (dimension, tokens)
            })
            .collect();
        let fingerprint = fingerprint(&held);

        if let Some(restriction) = slot.restriction.clone() {
            if slot.fingerprint == Some(fingerprint) {
                trace!(entity = %self.entity(), "Local predicate unchanged (fingerprint)");
                slot.version = version;
                return Ok((restriction, slot.generation));
            }
        }

        // a failed build leaves nothing behind for the fast paths to return
        let restriction = match self.compile_local(&held) {
            Ok(restriction) => restriction,
            Err(error) => {
                slot.invalidate();
                return Err(error);
            }
        };
        slot.version = version;
        slot.fingerprint = Some(fingerprint);
        slot.restriction = Some(restriction.clone());
        slot.generation += 1;

        debug!(
            entity = %self.entity(),
            generation = slot.generation,
            unrestricted = restriction.is_unrestricted(),
            "Rebuilt local predicate"
        );
        Ok((restriction, slot.generation))
    }

    fn compile_local(&self, held: &[(String, Vec<String>)]) -> WardenResult<Restriction> {
        let mut restriction = Restriction::Unrestricted;
        for (field, classification) in self.classifications() {
            let tokens = held
                .iter()
                .find(|(dimension, _)| *dimension == classification.dimension)
                .map(|(_, tokens)| tokens.as_slice())
                .unwrap_or_default();
            let predicate = compile_field(&FieldPath::local(&field), classification.kind, tokens)?;
            restriction = restriction.and(predicate);
        }
        Ok(restriction)
    }

    pub(crate) fn resolve_inclusive(
        &self,
        registry: &PredicateRegistry,
        source: &dyn ClearanceSource,
        visiting: &mut Vec<EntityType>,
    ) -> WardenResult<Resolved> {
        visiting.push(self.entity().clone());
        let resolved = self.compose_inclusive(registry, source, visiting);
        visiting.pop();
        resolved
    }

    fn compose_inclusive(
        &self,
        registry: &PredicateRegistry,
        source: &dyn ClearanceSource,
        visiting: &mut Vec<EntityType>,
    ) -> WardenResult<Resolved> {
        let (local, local_generation) = self.resolve_local(source)?;

        let mut complete = true;
        let mut parents: Vec<(&NavigationEdge, Resolved)> = Vec::new();
        for edge in self.navigations() {
            if visiting.contains(&edge.target) {
                warn!(
                    entity = %self.entity(),
                    edge = %edge.name,
                    target = %edge.target,
                    "Navigation cycle; ancestor already on the traversal path is not re-entered"
                );
                complete = false;
                continue;
            }
            let parent = registry.get(&edge.target)?;
            let resolved = parent.resolve_inclusive(registry, source, visiting)?;
            complete &= resolved.complete;
            parents.push((edge, resolved));
        }
        let parent_generations: Vec<u64> = parents.iter().map(|(_, p)| p.generation).collect();

        let mut slot = self.inclusive.lock();
        if complete {
            if let Some(restriction) = &slot.restriction {
                if slot.local_generation == local_generation
                    && slot.parent_generations == parent_generations
                {
                    trace!(entity = %self.entity(), "Inclusive predicate unchanged");
                    return Ok(Resolved {
                        restriction: restriction.clone(),
                        generation: slot.generation,
                        complete,
                    });
                }
            }
        }

        let mut restriction = local;
        for (edge, parent) in &parents {
            if let Restriction::Restricted(predicate) = &parent.restriction {
                restriction = restriction.and(predicate.rebase(&edge.name));
            }
        }

        if !complete {
            // depends on where the traversal entered the cycle; not cacheable
            return Ok(Resolved {
                restriction,
                generation: 0,
                complete,
            });
        }

        slot.restriction = Some(restriction.clone());
        slot.local_generation = local_generation;
        slot.parent_generations = parent_generations;
        slot.generation += 1;

        debug!(
            entity = %self.entity(),
            generation = slot.generation,
            ancestors = parents.len(),
            "Rebuilt inclusive predicate"
        );
        Ok(Resolved {
            restriction,
            generation: slot.generation,
            complete,
        })
    }
}

impl std::fmt::Debug for PredicateBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateBuilder")
            .field("entity", self.entity())
            .field("classified_fields", &self.classifications.read().len())
            .field("navigations", &self.navigations().len())
            .finish()
    }
}

/// blake3 over the `+`-joined tokens of each dimension, dimensions joined by `|`.
/// Every dimension is prefixed with its token count and every token with its byte
/// length, so separators inside token text cannot alias another layout.
fn fingerprint(held: &[(String, Vec<String>)]) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(held.len() as u64).to_le_bytes());
    for (index, (_, tokens)) in held.iter().enumerate() {
        if index > 0 {
            hasher.update(b"|");
        }
        hasher.update(&(tokens.len() as u64).to_le_bytes());
        for (position, token) in tokens.iter().enumerate() {
            if position > 0 {
                hasher.update(b"+");
            }
            hasher.update(&(token.len() as u64).to_le_bytes());
            hasher.update(token.as_bytes());
        }
    }
    *hasher.finalize().as_bytes()
}
