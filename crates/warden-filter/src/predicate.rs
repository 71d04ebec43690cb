//! Predicate AST
//!
//! Compiled predicates are small trees of `AND` / `OR` / `NOT` over
//! `field == constant` comparisons, interpreted directly against an [`Entity`].
//!
//! Evaluation uses three-valued logic: a comparison whose field is unset or whose
//! navigation path leads to a missing parent is *unknown*, and unknown propagates
//! through `NOT` the way SQL `NULL` does. Only a definite `true` admits a row, so a
//! deny-only predicate never admits a row it cannot see the classification of.

use crate::entity::Entity;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use warden_core::FieldValue;

/// Field reached from the evaluated entity by following navigation edges
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    edges: Vec<String>,
    field: String,
}

impl FieldPath {
    /// Field of the evaluated entity itself
    pub fn local(field: &str) -> Self {
        Self {
            edges: Vec::new(),
            field: field.to_string(),
        }
    }

    /// The same field seen from a child that reaches this entity through `edge`
    pub fn rebased(&self, edge: &str) -> Self {
        let mut edges = Vec::with_capacity(self.edges.len() + 1);
        edges.push(edge.to_string());
        edges.extend(self.edges.iter().cloned());
        Self {
            edges,
            field: self.field.clone(),
        }
    }

    pub fn edges(&self) -> &[String] {
        &self.edges
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn resolve(&self, entity: &dyn Entity) -> Option<FieldValue> {
        let mut current = entity;
        for edge in &self.edges {
            current = current.navigate(edge)?;
        }
        current.field_value(&self.field)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for edge in &self.edges {
            write!(f, "{edge}.")?;
        }
        f.write_str(&self.field)
    }
}

/// Boolean predicate over an entity
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    False,
    Equals { path: FieldPath, value: FieldValue },
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn equals(path: FieldPath, value: FieldValue) -> Self {
        Predicate::Equals { path, value }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    pub fn and(left: Predicate, right: Predicate) -> Self {
        Predicate::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Predicate, right: Predicate) -> Self {
        Predicate::Or(Box::new(left), Box::new(right))
    }

    /// This predicate evaluated on the parent reached through `edge`
    pub fn rebase(&self, edge: &str) -> Predicate {
        match self {
            Predicate::True => Predicate::True,
            Predicate::False => Predicate::False,
            Predicate::Equals { path, value } => Predicate::Equals {
                path: path.rebased(edge),
                value: value.clone(),
            },
            Predicate::Not(inner) => Predicate::not(inner.rebase(edge)),
            Predicate::And(left, right) => Predicate::and(left.rebase(edge), right.rebase(edge)),
            Predicate::Or(left, right) => Predicate::or(left.rebase(edge), right.rebase(edge)),
        }
    }

    /// Three-valued evaluation; `None` is unknown
    pub fn evaluate(&self, entity: &dyn Entity) -> Option<bool> {
        match self {
            Predicate::True => Some(true),
            Predicate::False => Some(false),
            Predicate::Equals { path, value } => path.resolve(entity).map(|actual| actual == *value),
            Predicate::Not(inner) => inner.evaluate(entity).map(|known| !known),
            Predicate::And(left, right) => match left.evaluate(entity) {
                Some(false) => Some(false),
                Some(true) => right.evaluate(entity),
                None => match right.evaluate(entity) {
                    Some(false) => Some(false),
                    _ => None,
                },
            },
            Predicate::Or(left, right) => match left.evaluate(entity) {
                Some(true) => Some(true),
                Some(false) => right.evaluate(entity),
                None => match right.evaluate(entity) {
                    Some(true) => Some(true),
                    _ => None,
                },
            },
        }
    }

    /// Whether the entity is admitted: the predicate is definitely true
    pub fn admits(&self, entity: &dyn Entity) -> bool {
        self.evaluate(entity) == Some(true)
    }

    /// Constant value, when the predicate is a literal
    pub fn as_constant(&self) -> Option<bool> {
        match self {
            Predicate::True => Some(true),
            Predicate::False => Some(false),
            _ => None,
        }
    }

    /// Number of comparisons in the tree
    pub fn comparison_count(&self) -> usize {
        match self {
            Predicate::True | Predicate::False => 0,
            Predicate::Equals { .. } => 1,
            Predicate::Not(inner) => inner.comparison_count(),
            Predicate::And(left, right) | Predicate::Or(left, right) => {
                left.comparison_count() + right.comparison_count()
            }
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Predicate::And(..) | Predicate::Or(..))
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_compound() {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::True => f.write_str("TRUE"),
            Predicate::False => f.write_str("FALSE"),
            Predicate::Equals { path, value } => write!(f, "{path} == {value}"),
            Predicate::Not(inner) => {
                f.write_str("NOT ")?;
                inner.fmt_operand(f)
            }
            Predicate::And(left, right) => {
                left.fmt_operand(f)?;
                f.write_str(" AND ")?;
                right.fmt_operand(f)
            }
            Predicate::Or(left, right) => {
                left.fmt_operand(f)?;
                f.write_str(" OR ")?;
                right.fmt_operand(f)
            }
        }
    }
}

static ALWAYS: Lazy<Arc<Predicate>> = Lazy::new(|| Arc::new(Predicate::True));

/// Outcome of compiling a type: either nothing to check, or a predicate
#[derive(Debug, Clone)]
pub enum Restriction {
    /// The type has no classified fields (and, for ancestor-inclusive results, no
    /// restricted ancestors)
    Unrestricted,
    Restricted(Arc<Predicate>),
}

impl Restriction {
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Restriction::Unrestricted)
    }

    /// Predicate to apply; an unrestricted type yields the shared `TRUE` predicate
    pub fn predicate(&self) -> Arc<Predicate> {
        match self {
            Restriction::Unrestricted => ALWAYS.clone(),
            Restriction::Restricted(predicate) => predicate.clone(),
        }
    }

    pub fn admits(&self, entity: &dyn Entity) -> bool {
        match self {
            Restriction::Unrestricted => true,
            Restriction::Restricted(predicate) => predicate.admits(entity),
        }
    }

    /// AND `other` into this restriction
    pub(crate) fn and(self, other: Predicate) -> Restriction {
        match self {
            Restriction::Unrestricted => Restriction::Restricted(Arc::new(other)),
            Restriction::Restricted(existing) => Restriction::Restricted(Arc::new(
                Predicate::and((*existing).clone(), other),
            )),
        }
    }
}
