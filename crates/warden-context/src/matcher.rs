//! Permission pattern matching
//!
//! Resolution of effective permissions is independent of how a pattern is matched
//! against a permission name. Regular expressions are the default; glob and exact
//! matching are available for deployments that do not want regex semantics.

use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use warden_core::{WardenError, WardenResult};

/// Matches permission patterns against permission names
pub trait PermissionMatcher: Send + Sync {
    /// Reject patterns this matcher cannot interpret
    fn validate(&self, pattern: &str) -> WardenResult<()>;

    /// Whether `pattern` matches `permission`. Invalid patterns never match.
    fn matches(&self, pattern: &str, permission: &str) -> bool;
}

/// Unanchored regular-expression matching with a compiled-pattern cache
#[derive(Default)]
pub struct RegexMatcher {
    compiled: RwLock<HashMap<String, Regex>>,
}

impl RegexMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn compile(&self, pattern: &str) -> WardenResult<Regex> {
        if let Some(regex) = self.compiled.read().get(pattern) {
            return Ok(regex.clone());
        }
        let regex =
            Regex::new(pattern).map_err(|e| WardenError::malformed_selector(pattern, e))?;
        self.compiled
            .write()
            .insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

impl PermissionMatcher for RegexMatcher {
    fn validate(&self, pattern: &str) -> WardenResult<()> {
        self.compile(pattern).map(|_| ())
    }

    fn matches(&self, pattern: &str, permission: &str) -> bool {
        self.compile(pattern)
            .map(|regex| regex.is_match(permission))
            .unwrap_or(false)
    }
}

/// Shell-style glob matching (`read-*`, `?`, `[abc]`)
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobMatcher;

impl PermissionMatcher for GlobMatcher {
    fn validate(&self, pattern: &str) -> WardenResult<()> {
        glob::Pattern::new(pattern)
            .map(|_| ())
            .map_err(|e| WardenError::malformed_selector(pattern, e))
    }

    fn matches(&self, pattern: &str, permission: &str) -> bool {
        glob::Pattern::new(pattern)
            .map(|glob| glob.matches(permission))
            .unwrap_or(false)
    }
}

/// Exact string equality
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatcher;

impl PermissionMatcher for ExactMatcher {
    fn validate(&self, pattern: &str) -> WardenResult<()> {
        if pattern.is_empty() {
            return Err(WardenError::malformed_selector(pattern, "empty pattern"));
        }
        Ok(())
    }

    fn matches(&self, pattern: &str, permission: &str) -> bool {
        pattern == permission
    }
}

/// Configurable choice of matcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    #[default]
    Regex,
    Glob,
    Exact,
}

impl MatcherKind {
    pub fn build(self) -> Arc<dyn PermissionMatcher> {
        match self {
            MatcherKind::Regex => Arc::new(RegexMatcher::new()),
            MatcherKind::Glob => Arc::new(GlobMatcher),
            MatcherKind::Exact => Arc::new(ExactMatcher),
        }
    }
}
