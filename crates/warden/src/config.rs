//! Startup configuration
//!
//! ```toml
//! accessor = "batch-importer"
//! matcher = "regex"
//! permissions = ["^invoice-", "!^invoice-delete$"]
//!
//! [clearances]
//! Region = "EU, US"
//! Tier = "*"
//!
//! [[classifications]]
//! entity = "Invoice"
//! field = "Region"
//! dimension = "Region"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use warden_context::{MatcherKind, ScopeStack};
use warden_core::{WardenError, WardenResult};
use warden_filter::{EntityType, PredicateRegistry};

/// Field classified at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationConfig {
    pub entity: String,
    pub field: String,
    pub dimension: String,
}

/// Clearances, permissions and classifications applied when the access layer starts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    /// Accessor name of the default scope
    pub accessor: Option<String>,
    /// Permission pattern syntax; regex when unset
    pub matcher: Option<MatcherKind>,
    /// Dimension name to comma-separated tokens held by the default scope
    pub clearances: BTreeMap<String, String>,
    /// Permission tokens of the default scope; `!` marks a denial
    pub permissions: Vec<String>,
    pub classifications: Vec<ClassificationConfig>,
}

impl WardenConfig {
    pub fn from_toml_str(content: &str) -> WardenResult<Self> {
        let config: WardenConfig = toml::from_str(content)
            .map_err(|e| WardenError::config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WardenError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Matcher to build, falling back to the default kind
    pub fn matcher_kind(&self) -> MatcherKind {
        self.matcher.unwrap_or_default()
    }

    /// Reject empty names; patterns and field kinds are checked when applied
    pub fn validate(&self) -> WardenResult<()> {
        if matches!(&self.accessor, Some(name) if name.trim().is_empty()) {
            return Err(WardenError::config("accessor must not be empty"));
        }
        if self.clearances.keys().any(|dimension| dimension.trim().is_empty()) {
            return Err(WardenError::config("clearance dimension must not be empty"));
        }
        if self.permissions.iter().any(|token| {
            let pattern = token.strip_prefix(warden_core::NEGATION_MARKER).unwrap_or(token);
            pattern.is_empty()
        }) {
            return Err(WardenError::config("permission must not be empty"));
        }
        for (index, classification) in self.classifications.iter().enumerate() {
            for (key, value) in [
                ("entity", &classification.entity),
                ("field", &classification.field),
                ("dimension", &classification.dimension),
            ] {
                if value.trim().is_empty() {
                    return Err(WardenError::config(format!(
                        "classifications[{}].{} must not be empty",
                        index, key
                    )));
                }
            }
        }
        Ok(())
    }

    /// Overlay `other`: scalar settings are replaced when set, lists and maps are
    /// extended
    pub fn merge_with(&mut self, other: &WardenConfig) {
        if other.accessor.is_some() {
            self.accessor = other.accessor.clone();
        }
        if other.matcher.is_some() {
            self.matcher = other.matcher;
        }
        for (dimension, tokens) in &other.clearances {
            self.clearances
                .entry(dimension.clone())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(tokens);
                })
                .or_insert_with(|| tokens.clone());
        }
        self.permissions.extend(other.permissions.iter().cloned());
        self.classifications
            .extend(other.classifications.iter().cloned());
    }

    /// Apply to the default scope of `stack` and to `registry`
    pub fn apply(&self, stack: &ScopeStack, registry: &PredicateRegistry) -> WardenResult<()> {
        self.validate()?;

        let root = stack.root();
        if let Some(accessor) = &self.accessor {
            root.set_accessor_name(accessor.as_str());
        }
        root.add_clearances_from_map(&self.clearances);
        root.add_permissions(&self.permissions)?;

        for classification in &self.classifications {
            registry.register_classified_field(
                &EntityType::new(&classification.entity),
                &classification.field,
                &classification.dimension,
            )?;
        }

        debug!(
            dimensions = self.clearances.len(),
            permissions = self.permissions.len(),
            classifications = self.classifications.len(),
            "Applied access configuration"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_empty_document_is_default() {
        let config = WardenConfig::from_toml_str("").unwrap();
        assert_eq!(config, WardenConfig::default());
        assert_eq!(config.matcher_kind(), MatcherKind::Regex);
    }

    #[test]
    fn test_parse_full_document() {
        let config = WardenConfig::from_toml_str(
            r#"
            accessor = "importer"
            matcher = "glob"
            permissions = ["invoice-*", "!invoice-delete"]

            [clearances]
            Region = "EU, US"

            [[classifications]]
            entity = "Invoice"
            field = "Region"
            dimension = "Region"
            "#,
        )
        .unwrap();

        assert_eq!(config.accessor.as_deref(), Some("importer"));
        assert_eq!(config.matcher, Some(MatcherKind::Glob));
        assert_eq!(config.clearances["Region"], "EU, US");
        assert_eq!(config.classifications[0].entity, "Invoice");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert_matches!(
            WardenConfig::from_toml_str("acessor = \"typo\""),
            Err(WardenError::Config { .. })
        );
    }

    #[test]
    fn test_empty_names_are_rejected() {
        assert_matches!(
            WardenConfig::from_toml_str("permissions = [\"!\"]"),
            Err(WardenError::Config { .. })
        );
        assert_matches!(
            WardenConfig::from_toml_str(
                "[[classifications]]\nentity = \"Invoice\"\nfield = \"\"\ndimension = \"Region\""
            ),
            Err(WardenError::Config { message }) if message.contains("classifications[0].field")
        );
    }

    #[test]
    fn test_merge_extends_lists_and_tokens() {
        let mut base = WardenConfig::from_toml_str("[clearances]\nRegion = \"EU\"").unwrap();
        let overlay = WardenConfig::from_toml_str(
            "accessor = \"ops\"\npermissions = [\"read\"]\n[clearances]\nRegion = \"US\"",
        )
        .unwrap();
        base.merge_with(&overlay);

        assert_eq!(base.accessor.as_deref(), Some("ops"));
        assert_eq!(base.clearances["Region"], "EU,US");
        assert_eq!(base.permissions, vec!["read"]);
    }

    #[test]
    fn test_merge_can_switch_matcher_back_to_regex() {
        let mut base = WardenConfig::from_toml_str("matcher = \"glob\"").unwrap();
        base.merge_with(&WardenConfig::default());
        assert_eq!(base.matcher_kind(), MatcherKind::Glob);

        let overlay = WardenConfig::from_toml_str("matcher = \"regex\"").unwrap();
        base.merge_with(&overlay);
        assert_eq!(base.matcher_kind(), MatcherKind::Regex);
    }
}
