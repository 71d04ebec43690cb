//! The clearance read contract
//!
//! Predicate compilation consumes clearances only through [`ClearanceSource`]: the
//! ordered token list held per dimension, plus an optional change-version used to
//! skip fingerprinting when nothing moved.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Identity of a clearance source. Two handles to the same source report the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(Uuid);

impl SourceId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Change-version signal of a clearance source.
///
/// `origin` identifies whose clearances are being reported (for example the ambient
/// scope), `generation` must change whenever any token that could be reported for
/// that origin changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClearanceVersion {
    pub origin: u64,
    pub generation: u64,
}

/// Live view of the clearances held by the current caller
pub trait ClearanceSource: Send + Sync {
    /// Stable identity of this source
    fn source_id(&self) -> SourceId;

    /// Tokens currently held in `dimension`, in insertion order
    fn clearances_of(&self, dimension: &str) -> Vec<String>;

    /// Current change-version, or `None` when the source cannot tell. Without a
    /// version every predicate request recomputes the clearance fingerprint.
    fn version(&self) -> Option<ClearanceVersion> {
        None
    }
}

impl<T: ClearanceSource + ?Sized> ClearanceSource for Arc<T> {
    fn source_id(&self) -> SourceId {
        (**self).source_id()
    }

    fn clearances_of(&self, dimension: &str) -> Vec<String> {
        (**self).clearances_of(dimension)
    }

    fn version(&self) -> Option<ClearanceVersion> {
        (**self).version()
    }
}

/// Fixed, explicitly mutated clearance table
pub struct StaticClearances {
    id: SourceId,
    generation: AtomicU64,
    dimensions: RwLock<IndexMap<String, Vec<String>>>,
}

impl StaticClearances {
    pub fn new() -> Self {
        Self {
            id: SourceId::new(),
            generation: AtomicU64::new(0),
            dimensions: RwLock::new(IndexMap::new()),
        }
    }

    /// Builder-style insert
    pub fn with(self, dimension: &str, tokens: &[&str]) -> Self {
        for token in tokens {
            self.add(dimension, token);
        }
        self
    }

    /// Idempotent insert
    pub fn add(&self, dimension: &str, token: &str) {
        let mut dimensions = self.dimensions.write();
        let held = dimensions.entry(dimension.to_string()).or_default();
        if !held.iter().any(|existing| existing == token) {
            held.push(token.to_string());
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Remove every token held in `dimension`
    pub fn clear(&self, dimension: &str) {
        if self.dimensions.write().shift_remove(dimension).is_some() {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Default for StaticClearances {
    fn default() -> Self {
        Self::new()
    }
}

impl ClearanceSource for StaticClearances {
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn clearances_of(&self, dimension: &str) -> Vec<String> {
        self.dimensions
            .read()
            .get(dimension)
            .cloned()
            .unwrap_or_default()
    }

    fn version(&self) -> Option<ClearanceVersion> {
        Some(ClearanceVersion {
            origin: 0,
            generation: self.generation.load(Ordering::SeqCst),
        })
    }
}

/// Clearance source backed by a getter function
pub struct FnClearanceSource<F> {
    id: SourceId,
    getter: F,
}

impl<F> FnClearanceSource<F>
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    pub fn new(getter: F) -> Self {
        Self {
            id: SourceId::new(),
            getter,
        }
    }
}

impl<F> ClearanceSource for FnClearanceSource<F>
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn clearances_of(&self, dimension: &str) -> Vec<String> {
        (self.getter)(dimension)
    }
}
