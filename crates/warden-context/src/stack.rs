//! The security context stack
//!
//! A [`ScopeStack`] owns one scope tree: a permanent default scope plus every nested
//! scope currently entered on some execution path. Entering returns a
//! [`ScopeGuard`]; dropping the guard exits the scope, so the previous scope is
//! restored on every exit path, error paths included.

use crate::ambient;
use crate::matcher::{MatcherKind, PermissionMatcher};
use crate::scope::{ScopePath, SecurityScope};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;
use warden_core::{ClearanceSource, ClearanceVersion, SourceId};

struct StackInner {
    id: Uuid,
    root: Arc<SecurityScope>,
    active: Mutex<HashMap<ScopePath, Arc<SecurityScope>>>,
    next_serial: AtomicU64,
    epoch: Arc<AtomicU64>,
}

/// Tree of nestable security scopes with an ambient current scope per execution path
#[derive(Clone)]
pub struct ScopeStack {
    inner: Arc<StackInner>,
}

impl ScopeStack {
    /// Stack using regular-expression permission matching
    pub fn new() -> Self {
        Self::with_matcher(MatcherKind::Regex.build())
    }

    pub fn with_matcher(matcher: Arc<dyn PermissionMatcher>) -> Self {
        let epoch = Arc::new(AtomicU64::new(0));
        let root = Arc::new(SecurityScope::new_default(matcher, epoch.clone()));
        Self {
            inner: Arc::new(StackInner {
                id: Uuid::new_v4(),
                root,
                active: Mutex::new(HashMap::new()),
                next_serial: AtomicU64::new(1),
                epoch,
            }),
        }
    }

    /// The permanent default scope
    pub fn root(&self) -> &Arc<SecurityScope> {
        &self.inner.root
    }

    /// Ambient scope of the calling execution path, or the default scope
    pub fn current(&self) -> Arc<SecurityScope> {
        let Some(mut path) = ambient::current_path(self.inner.id) else {
            return self.inner.root.clone();
        };
        let active = self.inner.active.lock();
        // a scope disposed from another path falls back to its nearest live ancestor
        loop {
            if let Some(scope) = active.get(&path) {
                return scope.clone();
            }
            match path.parent() {
                Some(parent) => path = parent,
                None => return self.inner.root.clone(),
            }
        }
    }

    /// Create a child of the current scope and make it ambient
    pub fn enter(&self) -> ScopeGuard {
        let parent = self.current();
        let serial = self.inner.next_serial.fetch_add(1, Ordering::SeqCst);
        let scope = Arc::new(SecurityScope::new_child(&parent, serial));

        self.inner
            .active
            .lock()
            .insert(scope.path().clone(), scope.clone());
        ambient::set_path(self.inner.id, Some(scope.path().clone()));
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        debug!(scope = %scope.path(), depth = scope.path().depth(), "Entered security scope");
        ScopeGuard {
            stack: self.clone(),
            scope,
            exited: false,
        }
    }

    /// Enter a scope for the duration of `f`
    pub fn with_scope<R>(&self, f: impl FnOnce(&SecurityScope) -> R) -> R {
        let guard = self.enter();
        f(&guard)
    }

    fn exit(&self, scope: &Arc<SecurityScope>) {
        if scope.is_default() {
            return;
        }

        // only the path on which this scope is ambient moves back to the parent;
        // a guard dropped elsewhere leaves that path's ambient scope alone
        if ambient::current_path(self.inner.id).as_ref() == Some(scope.path()) {
            let parent_path = scope
                .parent()
                .filter(|parent| !parent.is_default())
                .map(|parent| parent.path().clone());
            ambient::set_path(self.inner.id, parent_path);
        }
        self.inner.active.lock().remove(scope.path());
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        debug!(scope = %scope.path(), "Exited security scope");
    }

    /// Number of nested scopes currently entered across all execution paths
    pub fn active_scopes(&self) -> usize {
        self.inner.active.lock().len()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScopeStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStack")
            .field("id", &self.inner.id)
            .field("active_scopes", &self.active_scopes())
            .finish()
    }
}

/// The stack reports the effective clearances of the ambient scope.
///
/// The version pairs the ambient scope's serial with the stack-wide change epoch,
/// which moves on every clearance, permission, enter and exit in the stack.
impl ClearanceSource for ScopeStack {
    fn source_id(&self) -> SourceId {
        SourceId::from_uuid(self.inner.id)
    }

    fn clearances_of(&self, dimension: &str) -> Vec<String> {
        let clearances = self.current().effective_clearances(dimension);
        trace!(dimension, held = clearances.len(), "Resolved ambient clearances");
        clearances
    }

    fn version(&self) -> Option<ClearanceVersion> {
        Some(ClearanceVersion {
            origin: self.current().serial(),
            generation: self.inner.epoch.load(Ordering::SeqCst),
        })
    }
}

/// Handle to an entered scope; exits it when dropped
pub struct ScopeGuard {
    stack: ScopeStack,
    scope: Arc<SecurityScope>,
    exited: bool,
}

impl ScopeGuard {
    pub fn scope(&self) -> &Arc<SecurityScope> {
        &self.scope
    }

    /// Exit now instead of at end of lexical scope
    pub fn exit(mut self) {
        self.exit_once();
    }

    fn exit_once(&mut self) {
        if !self.exited {
            self.exited = true;
            self.stack.exit(&self.scope);
        }
    }
}

impl Deref for ScopeGuard {
    type Target = SecurityScope;

    fn deref(&self) -> &SecurityScope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.exit_once();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_defaults_to_root() {
        let stack = ScopeStack::new();
        assert!(stack.current().is_default());
        assert!(Arc::ptr_eq(&stack.current(), stack.root()));
    }

    #[test]
    fn test_enter_and_drop_restore_previous_scope() {
        let stack = ScopeStack::new();
        {
            let outer = stack.enter();
            assert_eq!(stack.current().id(), outer.id());
            {
                let inner = stack.enter();
                assert_eq!(stack.current().id(), inner.id());
                assert_eq!(inner.parent().map(|p| p.id()), Some(outer.id()));
            }
            assert_eq!(stack.current().id(), outer.id());
        }
        assert!(stack.current().is_default());
        assert_eq!(stack.active_scopes(), 0);
    }

    #[test]
    fn test_explicit_exit() {
        let stack = ScopeStack::new();
        let guard = stack.enter();
        assert_eq!(stack.active_scopes(), 1);
        guard.exit();
        assert_eq!(stack.active_scopes(), 0);
        assert!(stack.current().is_default());
    }

    #[test]
    fn test_stacks_do_not_share_ambient_scopes() {
        let first = ScopeStack::new();
        let second = ScopeStack::new();
        let _guard = first.enter();
        assert!(!first.current().is_default());
        assert!(second.current().is_default());
    }

    #[test]
    fn test_version_moves_on_mutation_and_scope_change() {
        let stack = ScopeStack::new();
        let initial = stack.version();
        stack.root().add_clearance("D1", "A");
        let after_add = stack.version();
        assert_ne!(initial, after_add);

        let guard = stack.enter();
        assert_ne!(stack.version().map(|v| v.origin), after_add.map(|v| v.origin));
        drop(guard);
        assert_eq!(stack.version().map(|v| v.origin), Some(0));
    }

    #[test]
    fn test_with_scope_returns_closure_result() {
        let stack = ScopeStack::new();
        let held = stack.with_scope(|scope| {
            scope.add_clearance("D1", "A");
            stack.clearances_of("D1")
        });
        assert_eq!(held, vec!["A"]);
        assert!(stack.clearances_of("D1").is_empty());
    }
}
