//! Security scopes
//!
//! A [`SecurityScope`] is one node of the scope tree. It owns its own clearances
//! and permissions and sees those of every ancestor: inheritance is purely additive,
//! a child can add grants and denials but never remove what an ancestor holds.

use crate::matcher::PermissionMatcher;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use warden_core::{split_token_list, WardenResult, NEGATION_MARKER};

/// Path of a scope: the ids of all its ancestors followed by its own id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopePath(Arc<[Uuid]>);

impl ScopePath {
    pub(crate) fn root(id: Uuid) -> Self {
        Self(Arc::from(vec![id]))
    }

    pub(crate) fn child(&self, id: Uuid) -> Self {
        let mut ids = self.0.to_vec();
        ids.push(id);
        Self(Arc::from(ids))
    }

    /// Path of the parent scope, if any
    pub fn parent(&self) -> Option<ScopePath> {
        match self.0.len() {
            0 | 1 => None,
            len => Some(Self(Arc::from(&self.0[..len - 1]))),
        }
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn ids(&self) -> &[Uuid] {
        &self.0
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(Uuid::to_string).collect();
        f.write_str(&rendered.join("/"))
    }
}

#[derive(Debug, Default)]
struct PermissionSet {
    granted: Vec<String>,
    denied: Vec<String>,
}

/// One node of the security scope tree
pub struct SecurityScope {
    id: Uuid,
    serial: u64,
    path: ScopePath,
    parent: Option<Arc<SecurityScope>>,
    is_default: bool,
    accessor_name: RwLock<Option<String>>,
    clearances: RwLock<IndexMap<String, Vec<String>>>,
    permissions: Mutex<PermissionSet>,
    last_modified: RwLock<DateTime<Utc>>,
    revision: AtomicU64,
    matcher: Arc<dyn PermissionMatcher>,
    /// Change counter shared by every scope of one stack
    epoch: Arc<AtomicU64>,
}

impl SecurityScope {
    pub(crate) fn new_default(matcher: Arc<dyn PermissionMatcher>, epoch: Arc<AtomicU64>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            serial: 0,
            path: ScopePath::root(id),
            parent: None,
            is_default: true,
            accessor_name: RwLock::new(None),
            clearances: RwLock::new(IndexMap::new()),
            permissions: Mutex::new(PermissionSet::default()),
            last_modified: RwLock::new(Utc::now()),
            revision: AtomicU64::new(0),
            matcher,
            epoch,
        }
    }

    pub(crate) fn new_child(parent: &Arc<SecurityScope>, serial: u64) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            serial,
            path: parent.path.child(id),
            parent: Some(parent.clone()),
            is_default: false,
            accessor_name: RwLock::new(None),
            clearances: RwLock::new(IndexMap::new()),
            permissions: Mutex::new(PermissionSet::default()),
            last_modified: RwLock::new(Utc::now()),
            revision: AtomicU64::new(0),
            matcher: parent.matcher.clone(),
            epoch: parent.epoch.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number unique within the owning stack; `0` for the default scope
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn path(&self) -> &ScopePath {
        &self.path
    }

    pub fn parent(&self) -> Option<&Arc<SecurityScope>> {
        self.parent.as_ref()
    }

    /// Whether this is the stack's permanent default scope
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Time of the last change to this scope's own clearances or permissions
    pub fn last_modified(&self) -> DateTime<Utc> {
        *self.last_modified.read()
    }

    /// Number of changes made to this scope's own clearances or permissions
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        *self.last_modified.write() = Utc::now();
        self.revision.fetch_add(1, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// This scope followed by its ancestors, innermost first
    fn lineage(&self) -> impl Iterator<Item = &SecurityScope> {
        std::iter::successors(Some(self), |scope| scope.parent.as_deref())
    }

    // -- accessor -----------------------------------------------------------

    pub fn set_accessor_name(&self, name: impl Into<String>) {
        *self.accessor_name.write() = Some(name.into());
    }

    /// Accessor name of the nearest scope (this one included) that set one
    pub fn accessor_name(&self) -> Option<String> {
        self.lineage()
            .find_map(|scope| scope.accessor_name.read().clone())
    }

    // -- clearances ---------------------------------------------------------

    /// Insert one token into this scope's own clearances. Idempotent.
    pub fn add_clearance(&self, dimension: &str, token: &str) {
        self.add_clearances(dimension, [token]);
    }

    /// Insert tokens into this scope's own clearances, skipping ones already held.
    /// The dimension is recorded even when `tokens` is empty.
    pub fn add_clearances<I, S>(&self, dimension: &str, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let changed = {
            let mut clearances = self.clearances.write();
            let held = clearances.entry(dimension.to_string()).or_default();
            let before = held.len();
            for token in tokens {
                let token = token.as_ref();
                if !held.iter().any(|existing| existing == token) {
                    held.push(token.to_string());
                }
            }
            held.len() != before
        };
        if changed {
            debug!(scope = %self.path, dimension, "Clearances added");
            self.touch();
        }
    }

    /// Bulk insert from a mapping of dimension name to comma-separated tokens
    /// (`{"Region": "EU, US", "Tier": "!secret"}`).
    pub fn add_clearances_from_map<I, K, V>(&self, mapping: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (dimension, list) in mapping {
            self.add_clearances(dimension.as_ref(), split_token_list(list.as_ref()));
        }
    }

    /// Tokens held by this scope alone
    pub fn own_clearances(&self, dimension: &str) -> Vec<String> {
        self.clearances
            .read()
            .get(dimension)
            .cloned()
            .unwrap_or_default()
    }

    /// Tokens held by this scope and all its ancestors, outermost ancestor first,
    /// without duplicates
    pub fn effective_clearances(&self, dimension: &str) -> Vec<String> {
        let mut lineage: Vec<&SecurityScope> = self.lineage().collect();
        lineage.reverse();

        let mut effective: Vec<String> = Vec::new();
        for scope in lineage {
            for token in scope.own_clearances(dimension) {
                if !effective.contains(&token) {
                    effective.push(token);
                }
            }
        }
        effective
    }

    /// Dimensions this scope or an ancestor holds clearances in
    pub fn dimensions(&self) -> Vec<String> {
        let mut dimensions: Vec<String> = Vec::new();
        for scope in self.lineage() {
            for dimension in scope.clearances.read().keys() {
                if !dimensions.contains(dimension) {
                    dimensions.push(dimension.clone());
                }
            }
        }
        dimensions
    }

    // -- permissions --------------------------------------------------------

    /// Add permission tokens: `name` is granted, `!name` is denied.
    /// Every pattern is validated before any is inserted.
    pub fn add_permissions<I, S>(&self, tokens: I) -> WardenResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut granted = Vec::new();
        let mut denied = Vec::new();
        for token in tokens {
            let token = token.as_ref();
            match token.strip_prefix(NEGATION_MARKER) {
                Some(pattern) => denied.push(pattern.to_string()),
                None => granted.push(token.to_string()),
            }
        }
        self.insert_permissions(granted, denied)
    }

    /// Add denied permission patterns
    pub fn add_denied_permissions<I, S>(&self, patterns: I) -> WardenResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let denied = patterns
            .into_iter()
            .map(|pattern| pattern.as_ref().to_string())
            .collect();
        self.insert_permissions(Vec::new(), denied)
    }

    fn insert_permissions(&self, granted: Vec<String>, denied: Vec<String>) -> WardenResult<()> {
        for pattern in granted.iter().chain(denied.iter()) {
            self.matcher.validate(pattern)?;
        }
        if granted.is_empty() && denied.is_empty() {
            return Ok(());
        }
        {
            let mut permissions = self.permissions.lock();
            for pattern in granted {
                if !permissions.granted.contains(&pattern) {
                    permissions.granted.push(pattern);
                }
            }
            for pattern in denied {
                if !permissions.denied.contains(&pattern) {
                    permissions.denied.push(pattern);
                }
            }
        }
        debug!(scope = %self.path, "Permissions added");
        self.touch();
        Ok(())
    }

    fn collect_permissions(&self, select: impl Fn(&PermissionSet) -> &Vec<String>) -> Vec<String> {
        let mut collected: Vec<String> = Vec::new();
        for scope in self.lineage() {
            let permissions = scope.permissions.lock();
            for pattern in select(&permissions) {
                if !collected.contains(pattern) {
                    collected.push(pattern.clone());
                }
            }
        }
        collected
    }

    /// Granted patterns of this scope unioned with every ancestor's
    pub fn granted_permissions(&self) -> Vec<String> {
        self.collect_permissions(|set| &set.granted)
    }

    /// Denied patterns of this scope unioned with every ancestor's
    pub fn denied_permissions(&self) -> Vec<String> {
        self.collect_permissions(|set| &set.denied)
    }

    /// Granted patterns that are not also denied verbatim
    pub fn effective_permissions(&self) -> Vec<String> {
        let denied = self.denied_permissions();
        self.granted_permissions()
            .into_iter()
            .filter(|pattern| !denied.contains(pattern))
            .collect()
    }

    /// Whether some granted pattern matches `permission` and no denied pattern does,
    /// over this scope and all its ancestors
    pub fn has_effective_permission(&self, permission: &str) -> bool {
        let granted = self
            .granted_permissions()
            .iter()
            .any(|pattern| self.matcher.matches(pattern, permission));
        granted
            && !self
                .denied_permissions()
                .iter()
                .any(|pattern| self.matcher.matches(pattern, permission))
    }
}

impl fmt::Debug for SecurityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityScope")
            .field("path", &self.path.to_string())
            .field("is_default", &self.is_default)
            .field("revision", &self.revision())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::RegexMatcher;

    fn root() -> Arc<SecurityScope> {
        Arc::new(SecurityScope::new_default(
            Arc::new(RegexMatcher::new()),
            Arc::new(AtomicU64::new(0)),
        ))
    }

    #[test]
    fn test_clearance_insert_is_idempotent() {
        let scope = root();
        scope.add_clearance("D1", "A");
        let revision = scope.revision();
        scope.add_clearance("D1", "A");
        assert_eq!(scope.own_clearances("D1"), vec!["A"]);
        assert_eq!(scope.revision(), revision);
    }

    #[test]
    fn test_bulk_clearances_split_and_trim() {
        let scope = root();
        scope.add_clearances_from_map([("Region", " EU , US,, "), ("Tier", "")]);
        assert_eq!(scope.own_clearances("Region"), vec!["EU", "US"]);
        assert!(scope.own_clearances("Tier").is_empty());
        assert_eq!(scope.dimensions(), vec!["Region", "Tier"]);
    }

    #[test]
    fn test_child_inherits_clearances_additively() {
        let parent = root();
        parent.add_clearances("D1", ["A", "B"]);
        let child = Arc::new(SecurityScope::new_child(&parent, 1));
        assert_eq!(child.effective_clearances("D1"), vec!["A", "B"]);

        child.add_clearances("D1", ["B", "C"]);
        assert_eq!(child.effective_clearances("D1"), vec!["A", "B", "C"]);
        assert_eq!(parent.effective_clearances("D1"), vec!["A", "B"]);
    }

    #[test]
    fn test_accessor_name_inherits_from_nearest_ancestor() {
        let parent = root();
        let child = Arc::new(SecurityScope::new_child(&parent, 1));
        assert_eq!(child.accessor_name(), None);

        parent.set_accessor_name("alice");
        assert_eq!(child.accessor_name().as_deref(), Some("alice"));

        child.set_accessor_name("bob");
        assert_eq!(child.accessor_name().as_deref(), Some("bob"));
        assert_eq!(parent.accessor_name().as_deref(), Some("alice"));
    }

    #[test]
    fn test_permission_negation_marker() {
        let scope = root();
        scope
            .add_permissions(["read-.*", "!read-salary"])
            .unwrap();
        assert!(scope.has_effective_permission("read-invoice"));
        assert!(!scope.has_effective_permission("read-salary"));
        assert!(!scope.has_effective_permission("delete-invoice"));
    }

    #[test]
    fn test_denials_from_ancestors_apply_to_children() {
        let parent = root();
        parent.add_denied_permissions(["delete-"]).unwrap();
        let child = Arc::new(SecurityScope::new_child(&parent, 1));
        child.add_permissions([".*"]).unwrap();

        assert!(child.has_effective_permission("read-invoice"));
        assert!(!child.has_effective_permission("delete-invoice"));
        assert!(!parent.has_effective_permission("read-invoice"));
    }

    #[test]
    fn test_effective_permissions_is_exact_difference() {
        let scope = root();
        scope
            .add_permissions(["read-invoice", "read-order", "!read-order"])
            .unwrap();
        assert_eq!(scope.effective_permissions(), vec!["read-invoice"]);
    }

    #[test]
    fn test_malformed_permission_is_rejected_atomically() {
        let scope = root();
        assert!(scope.add_permissions(["read-.*", "write-("]).is_err());
        assert!(scope.granted_permissions().is_empty());
    }

    #[test]
    fn test_scope_path_rendering() {
        let parent = root();
        let child = SecurityScope::new_child(&parent, 1);
        assert_eq!(child.path().depth(), 2);
        assert_eq!(child.path().parent().as_ref(), Some(parent.path()));
        assert!(child.path().to_string().contains('/'));
    }
}
