//! Applying compiled predicates to collections

use crate::entity::{Entity, TypedEntity};
use crate::predicate::Predicate;
use crate::registry::PredicateRegistry;
use std::sync::Arc;
use warden_core::{ClearanceSource, WardenResult};

/// Iterator yielding only the entities a predicate admits
pub struct Admitted<I> {
    inner: I,
    predicate: Arc<Predicate>,
}

impl<I> Iterator for Admitted<I>
where
    I: Iterator,
    I::Item: Entity,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let predicate = &self.predicate;
        self.inner.by_ref().find(|entity| predicate.admits(entity))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

/// Row-level filtering for any iterator of entities
pub trait AccessFilterExt: Iterator + Sized
where
    Self::Item: Entity,
{
    /// Keep the entities `predicate` definitely admits
    fn admitted_by(self, predicate: Arc<Predicate>) -> Admitted<Self> {
        Admitted {
            inner: self,
            predicate,
        }
    }

    /// Keep the entities visible under the ancestor-inclusive predicate of the item
    /// type, compiled from `source`
    fn access_filtered(
        self,
        registry: &PredicateRegistry,
        source: &dyn ClearanceSource,
    ) -> WardenResult<Admitted<Self>>
    where
        Self::Item: TypedEntity,
    {
        let predicate = registry.predicate_for::<Self::Item>(source)?;
        Ok(self.admitted_by(predicate))
    }
}

impl<I> AccessFilterExt for I
where
    I: Iterator,
    I::Item: Entity,
{
}
