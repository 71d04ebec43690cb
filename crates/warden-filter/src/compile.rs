//! Field-level compilation of held clearance tokens

use crate::predicate::{FieldPath, Predicate};
use warden_core::{ClearanceToken, ValueKind, WardenResult};

/// Compile the tokens held in one dimension into the sub-predicate of a field
/// classified under that dimension.
///
/// - no tokens: `FALSE`
/// - `!*` held: `FALSE`, whatever else is held
/// - `*` held: `TRUE`, unless `!*` is also held
/// - otherwise `allow AND NOT deny` over the plain and negated tokens, degrading to
///   `allow`, `NOT deny` or `FALSE` when a side is empty
///
/// Every plain or negated value is coerced to the field's kind; a value that does not
/// parse is an error rather than a silently false comparison.
pub fn compile_field(path: &FieldPath, kind: ValueKind, held: &[String]) -> WardenResult<Predicate> {
    let tokens: Vec<ClearanceToken> = held.iter().map(|raw| ClearanceToken::parse(raw)).collect();

    if tokens.is_empty() || tokens.contains(&ClearanceToken::DenyAll) {
        return Ok(Predicate::False);
    }
    if tokens.contains(&ClearanceToken::AllowAll) {
        return Ok(Predicate::True);
    }

    let field = path.to_string();
    let mut allow: Option<Predicate> = None;
    let mut deny: Option<Predicate> = None;

    for token in tokens {
        let (slot, text) = match &token {
            ClearanceToken::Allow(text) => (&mut allow, text),
            ClearanceToken::Deny(text) => (&mut deny, text),
            ClearanceToken::AllowAll | ClearanceToken::DenyAll => continue,
        };
        let comparison = Predicate::equals(path.clone(), kind.coerce(&field, text)?);
        *slot = Some(match slot.take() {
            Some(existing) => Predicate::or(existing, comparison),
            None => comparison,
        });
    }

    Ok(match (allow, deny) {
        (Some(allow), Some(deny)) => Predicate::and(allow, Predicate::not(deny)),
        (Some(allow), None) => allow,
        (None, Some(deny)) => Predicate::not(deny),
        (None, None) => Predicate::False,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use warden_core::{FieldValue, WardenError};

    fn held(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn scope() -> FieldPath {
        FieldPath::local("Scope")
    }

    #[test]
    fn test_no_tokens_denies() {
        let predicate = compile_field(&scope(), ValueKind::Text, &[]).unwrap();
        assert_eq!(predicate, Predicate::False);
    }

    #[test]
    fn test_wildcard_dominates_plain_tokens() {
        let predicate = compile_field(&scope(), ValueKind::Text, &held(&["A", "*", "!B"])).unwrap();
        assert_eq!(predicate, Predicate::True);
    }

    #[test]
    fn test_negated_wildcard_dominates_everything() {
        for tokens in [&["*", "!*"][..], &["!*", "*"], &["A", "!*"]] {
            let predicate = compile_field(&scope(), ValueKind::Text, &held(tokens)).unwrap();
            assert_eq!(predicate, Predicate::False);
        }
    }

    #[test]
    fn test_allow_only() {
        let predicate = compile_field(&scope(), ValueKind::Text, &held(&["A", "B"])).unwrap();
        assert_eq!(predicate.to_string(), "Scope == \"A\" OR Scope == \"B\"");
    }

    #[test]
    fn test_deny_only() {
        let predicate = compile_field(&scope(), ValueKind::Text, &held(&["!A"])).unwrap();
        assert_eq!(predicate.to_string(), "NOT Scope == \"A\"");
    }

    #[test]
    fn test_allow_and_not_deny() {
        let predicate = compile_field(&scope(), ValueKind::Text, &held(&["A", "!A"])).unwrap();
        assert_eq!(predicate.to_string(), "Scope == \"A\" AND NOT Scope == \"A\"");
    }

    #[test]
    fn test_values_are_coerced_to_field_kind() {
        let predicate = compile_field(&FieldPath::local("Tier"), ValueKind::I32, &held(&["3"])).unwrap();
        assert_matches!(
            predicate,
            Predicate::Equals { value: FieldValue::I32(3), .. }
        );
    }

    #[test]
    fn test_negated_values_are_coerced_without_marker() {
        let predicate = compile_field(&FieldPath::local("Tier"), ValueKind::I32, &held(&["!3"])).unwrap();
        assert_eq!(predicate.to_string(), "NOT Tier == 3");
    }

    #[test]
    fn test_coercion_failure_is_an_error() {
        let result = compile_field(&FieldPath::local("Tier"), ValueKind::I32, &held(&["1", "high"]));
        assert_matches!(result, Err(WardenError::ValueCoercion { token, .. }) if token == "high");
    }
}
