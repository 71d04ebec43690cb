//! Classified value kinds and clearance token coercion

use crate::errors::{WardenError, WardenResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Value kind of an entity field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    U8,
    I16,
    I32,
    I64,
    Bool,
    DateTime,
    F64,
    Decimal,
    Uuid,
    /// Raw bytes; never classifiable
    Binary,
    /// Nested or collection-valued data; never classifiable
    Composite,
}

impl ValueKind {
    /// Kinds that may carry a classification
    pub const CLASSIFIABLE: [ValueKind; 10] = [
        ValueKind::Text,
        ValueKind::U8,
        ValueKind::I16,
        ValueKind::I32,
        ValueKind::I64,
        ValueKind::Bool,
        ValueKind::DateTime,
        ValueKind::F64,
        ValueKind::Decimal,
        ValueKind::Uuid,
    ];

    pub fn is_classifiable(self) -> bool {
        Self::CLASSIFIABLE.contains(&self)
    }

    /// Comma-separated names of the classifiable kinds, for error messages
    pub fn classifiable_names() -> String {
        Self::CLASSIFIABLE
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parse clearance token text into a value of this kind.
    ///
    /// `field` is only used to build the error.
    pub fn coerce(self, field: &str, token: &str) -> WardenResult<FieldValue> {
        let fail = |reason: String| WardenError::ValueCoercion {
            field: field.to_string(),
            kind: self.to_string(),
            token: token.to_string(),
            reason,
        };

        let value = match self {
            ValueKind::Text => FieldValue::Text(token.to_string()),
            ValueKind::U8 => FieldValue::U8(token.parse().map_err(|e| fail(format!("{e}")))?),
            ValueKind::I16 => FieldValue::I16(token.parse().map_err(|e| fail(format!("{e}")))?),
            ValueKind::I32 => FieldValue::I32(token.parse().map_err(|e| fail(format!("{e}")))?),
            ValueKind::I64 => FieldValue::I64(token.parse().map_err(|e| fail(format!("{e}")))?),
            ValueKind::Bool => FieldValue::Bool(parse_bool(token).map_err(fail)?),
            ValueKind::DateTime => FieldValue::DateTime(parse_date_time(token).map_err(fail)?),
            ValueKind::F64 => FieldValue::F64(token.parse().map_err(|e| fail(format!("{e}")))?),
            ValueKind::Decimal => FieldValue::Decimal(
                Decimal::from_str(token).map_err(|e| fail(e.to_string()))?,
            ),
            ValueKind::Uuid => {
                FieldValue::Uuid(Uuid::parse_str(token).map_err(|e| fail(e.to_string()))?)
            }
            ValueKind::Binary | ValueKind::Composite => {
                return Err(fail("kind cannot carry a classification".to_string()))
            }
        };
        Ok(value)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Text => "text",
            ValueKind::U8 => "u8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::Bool => "bool",
            ValueKind::DateTime => "date_time",
            ValueKind::F64 => "f64",
            ValueKind::Decimal => "decimal",
            ValueKind::Uuid => "uuid",
            ValueKind::Binary => "binary",
            ValueKind::Composite => "composite",
        };
        f.write_str(name)
    }
}

fn parse_bool(token: &str) -> Result<bool, String> {
    if token.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if token.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err("expected 'true' or 'false'".to_string())
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` (read as UTC) and
/// plain dates (midnight UTC).
fn parse_date_time(token: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(token) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(token, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(token, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| "unrecognized date-time format".to_string())
}

/// Concrete value of a classified field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    F64(f64),
    Decimal(Decimal),
    Uuid(Uuid),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Text(_) => ValueKind::Text,
            FieldValue::U8(_) => ValueKind::U8,
            FieldValue::I16(_) => ValueKind::I16,
            FieldValue::I32(_) => ValueKind::I32,
            FieldValue::I64(_) => ValueKind::I64,
            FieldValue::Bool(_) => ValueKind::Bool,
            FieldValue::DateTime(_) => ValueKind::DateTime,
            FieldValue::F64(_) => ValueKind::F64,
            FieldValue::Decimal(_) => ValueKind::Decimal,
            FieldValue::Uuid(_) => ValueKind::Uuid,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(v) => write!(f, "{v:?}"),
            FieldValue::U8(v) => write!(f, "{v}"),
            FieldValue::I16(v) => write!(f, "{v}"),
            FieldValue::I32(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            FieldValue::F64(v) => write!(f, "{v}"),
            FieldValue::Decimal(v) => write!(f, "{v}"),
            FieldValue::Uuid(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::I32(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::I64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Uuid> for FieldValue {
    fn from(value: Uuid) -> Self {
        FieldValue::Uuid(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifiable_kinds() {
        assert!(ValueKind::Text.is_classifiable());
        assert!(ValueKind::Uuid.is_classifiable());
        assert!(!ValueKind::Binary.is_classifiable());
        assert!(!ValueKind::Composite.is_classifiable());
        assert!(ValueKind::classifiable_names().starts_with("text, u8"));
    }

    #[test]
    fn test_coerce_numeric_kinds() {
        assert_eq!(ValueKind::U8.coerce("f", "7").unwrap(), FieldValue::U8(7));
        assert_eq!(ValueKind::I16.coerce("f", "-3").unwrap(), FieldValue::I16(-3));
        assert_eq!(ValueKind::I64.coerce("f", "42").unwrap(), FieldValue::I64(42));
        assert_eq!(ValueKind::F64.coerce("f", "1.5").unwrap(), FieldValue::F64(1.5));
        assert_eq!(
            ValueKind::Decimal.coerce("f", "10.25").unwrap(),
            FieldValue::Decimal(Decimal::new(1025, 2))
        );
    }

    #[test]
    fn test_coerce_bool_is_case_insensitive() {
        assert_eq!(ValueKind::Bool.coerce("f", "True").unwrap(), FieldValue::Bool(true));
        assert_eq!(ValueKind::Bool.coerce("f", "false").unwrap(), FieldValue::Bool(false));
        assert!(ValueKind::Bool.coerce("f", "yes").is_err());
    }

    #[test]
    fn test_coerce_date_time_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        for token in ["2024-03-01", "2024-03-01 00:00:00", "2024-03-01T00:00:00Z"] {
            assert_eq!(
                ValueKind::DateTime.coerce("f", token).unwrap(),
                FieldValue::DateTime(expected)
            );
        }
    }

    #[test]
    fn test_coerce_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(
            ValueKind::Uuid.coerce("f", &id.to_string()).unwrap(),
            FieldValue::Uuid(id)
        );
    }

    #[test]
    fn test_coercion_failure_names_field_and_token() {
        let err = ValueKind::I32.coerce("Tier", "high").unwrap_err();
        match err {
            WardenError::ValueCoercion { field, kind, token, .. } => {
                assert_eq!(field, "Tier");
                assert_eq!(kind, "i32");
                assert_eq!(token, "high");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_value_kind_round_trips() {
        assert_eq!(FieldValue::from("A").kind(), ValueKind::Text);
        assert_eq!(FieldValue::from(3i64).kind(), ValueKind::I64);
    }
}
