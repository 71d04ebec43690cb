//! Clearance token grammar
//!
//! A clearance token is the unit a caller holds within one dimension:
//!
//! | text   | meaning                               |
//! |--------|---------------------------------------|
//! | `A`    | allow rows classified `A`             |
//! | `*`    | allow every classification            |
//! | `!A`   | deny rows classified `A`              |
//! | `!*`   | deny every classification             |
//!
//! Tokens compare as exact strings apart from the wildcard sentinel.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix marking a denied clearance or permission
pub const NEGATION_MARKER: char = '!';

/// Sentinel matching every classification value
pub const WILDCARD: &str = "*";

/// A parsed clearance token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClearanceToken {
    /// Allow a single classification value
    Allow(String),
    /// Allow every classification value
    AllowAll,
    /// Deny a single classification value
    Deny(String),
    /// Deny every classification value
    DenyAll,
}

impl ClearanceToken {
    /// Parse raw token text. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        match text.strip_prefix(NEGATION_MARKER) {
            Some(WILDCARD) => Self::DenyAll,
            Some(denied) => Self::Deny(denied.to_string()),
            None if text == WILDCARD => Self::AllowAll,
            None => Self::Allow(text.to_string()),
        }
    }

    /// Whether the token is a denial
    pub fn is_negated(&self) -> bool {
        matches!(self, Self::Deny(_) | Self::DenyAll)
    }

    /// Whether the token is a (possibly negated) wildcard
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Self::AllowAll | Self::DenyAll)
    }

    /// The classification value this token names, if it names one
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Allow(value) | Self::Deny(value) => Some(value),
            Self::AllowAll | Self::DenyAll => None,
        }
    }
}

impl fmt::Display for ClearanceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow(value) => write!(f, "{value}"),
            Self::AllowAll => write!(f, "{WILDCARD}"),
            Self::Deny(value) => write!(f, "{NEGATION_MARKER}{value}"),
            Self::DenyAll => write!(f, "{NEGATION_MARKER}{WILDCARD}"),
        }
    }
}

impl From<&str> for ClearanceToken {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

/// Split a comma-separated token list, trimming entries and dropping empty ones
pub fn split_token_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_token_forms() {
        assert_eq!(ClearanceToken::parse("A"), ClearanceToken::Allow("A".into()));
        assert_eq!(ClearanceToken::parse(" * "), ClearanceToken::AllowAll);
        assert_eq!(ClearanceToken::parse("!A"), ClearanceToken::Deny("A".into()));
        assert_eq!(ClearanceToken::parse("!*"), ClearanceToken::DenyAll);
    }

    #[test]
    fn test_wildcard_is_exact_sentinel() {
        // only the bare sentinel is a wildcard
        assert_eq!(ClearanceToken::parse("**"), ClearanceToken::Allow("**".into()));
        assert_eq!(ClearanceToken::parse("!a*"), ClearanceToken::Deny("a*".into()));
    }

    #[test]
    fn test_display_restores_token_text() {
        for raw in ["A", "*", "!A", "!*"] {
            assert_eq!(ClearanceToken::parse(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_split_token_list() {
        assert_eq!(split_token_list(" A, B ,,C ,"), vec!["A", "B", "C"]);
        assert!(split_token_list(" , ").is_empty());
    }

    proptest! {
        #[test]
        fn prop_split_keeps_trimmed_non_empty_entries(
            entries in proptest::collection::vec("[ ]{0,2}[A-Za-z0-9!*]{0,4}[ ]{0,2}", 0..8)
        ) {
            let expected: Vec<String> = entries
                .iter()
                .map(|entry| entry.trim().to_string())
                .filter(|entry| !entry.is_empty())
                .collect();
            prop_assert_eq!(split_token_list(&entries.join(",")), expected);
        }
    }
}
