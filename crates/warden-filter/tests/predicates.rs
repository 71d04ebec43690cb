//! Predicate compilation and filtering over a small parent/child model

use assert_matches::assert_matches;
use proptest::prelude::*;
use std::sync::Arc;
use warden_core::{FieldValue, StaticClearances, ValueKind, WardenError};
use warden_filter::{
    AccessFilterExt, Entity, EntitySchema, EntityType, PredicateRegistry, SchemaCatalog,
    TypedEntity,
};

#[derive(Debug, Clone, PartialEq)]
struct Root {
    id: u32,
    scope: String,
}

impl Entity for Root {
    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "Scope" => Some(FieldValue::from(self.scope.as_str())),
            _ => None,
        }
    }

    fn navigate(&self, _edge: &str) -> Option<&dyn Entity> {
        None
    }
}

impl TypedEntity for Root {
    const ENTITY_TYPE: &'static str = "Root";
}

#[derive(Debug, Clone)]
struct Child {
    id: u32,
    root: Option<Arc<Root>>,
}

impl Entity for Child {
    fn field_value(&self, _field: &str) -> Option<FieldValue> {
        None
    }

    fn navigate(&self, edge: &str) -> Option<&dyn Entity> {
        match edge {
            "root" => self.root.as_deref().map(|root| root as &dyn Entity),
            _ => None,
        }
    }
}

impl TypedEntity for Child {
    const ENTITY_TYPE: &'static str = "Child";
}

fn catalog() -> SchemaCatalog {
    SchemaCatalog::new()
        .with(EntitySchema::new("Root").field("Scope", ValueKind::Text))
        .with(EntitySchema::new("Child").navigation("root", "Root"))
}

fn registry() -> PredicateRegistry {
    let registry = PredicateRegistry::new(Arc::new(catalog()));
    registry
        .register_classified_field(&EntityType::new("Root"), "Scope", "D1")
        .unwrap();
    registry
}

fn data() -> (Vec<Arc<Root>>, Vec<Child>) {
    let roots: Vec<Arc<Root>> = ["A", "B", "A"]
        .iter()
        .enumerate()
        .map(|(id, scope)| {
            Arc::new(Root {
                id: id as u32,
                scope: scope.to_string(),
            })
        })
        .collect();
    let children = roots
        .iter()
        .map(|root| Child {
            id: root.id + 10,
            root: Some(root.clone()),
        })
        .collect();
    (roots, children)
}

fn visible_ids(
    registry: &PredicateRegistry,
    source: &StaticClearances,
    roots: &[Arc<Root>],
    children: &[Child],
) -> (Vec<u32>, Vec<u32>) {
    let root_ids = roots
        .iter()
        .access_filtered(registry, source)
        .unwrap()
        .map(|root| root.id)
        .collect();
    let child_ids = children
        .iter()
        .access_filtered(registry, source)
        .unwrap()
        .map(|child| child.id)
        .collect();
    (root_ids, child_ids)
}

#[test]
fn test_visibility_follows_held_clearances() {
    let registry = registry();
    let source = StaticClearances::new();
    let (roots, children) = data();

    assert_eq!(
        visible_ids(&registry, &source, &roots, &children),
        (vec![], vec![])
    );

    source.add("D1", "A");
    assert_eq!(
        visible_ids(&registry, &source, &roots, &children),
        (vec![0, 2], vec![10, 12])
    );

    source.add("D1", "B");
    assert_eq!(
        visible_ids(&registry, &source, &roots, &children),
        (vec![0, 1, 2], vec![10, 11, 12])
    );
}

#[test]
fn test_child_without_parent_is_hidden() {
    let registry = registry();
    let source = StaticClearances::new().with("D1", &["!B"]);
    let orphan = Child { id: 99, root: None };
    let attached = Child {
        id: 1,
        root: Some(Arc::new(Root {
            id: 0,
            scope: "A".into(),
        })),
    };

    let visible: Vec<u32> = [orphan, attached]
        .iter()
        .access_filtered(&registry, &source)
        .unwrap()
        .map(|child| child.id)
        .collect();
    assert_eq!(visible, vec![1]);
}

#[test]
fn test_inclusive_predicate_is_reused_until_parent_changes() {
    let registry = registry();
    let source = StaticClearances::new().with("D1", &["A"]);
    let child = EntityType::new("Child");

    let first = registry
        .build_predicate_including_ancestors(&child, &source)
        .unwrap();
    let second = registry
        .build_predicate_including_ancestors(&child, &source)
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.to_string(), "root.Scope == \"A\"");

    source.add("D1", "B");
    let third = registry
        .build_predicate_including_ancestors(&child, &source)
        .unwrap();
    assert!(!Arc::ptr_eq(&second, &third));
    assert_eq!(
        third.to_string(),
        "root.Scope == \"A\" OR root.Scope == \"B\""
    );
}

#[test]
fn test_local_predicate_of_child_ignores_parent() {
    let registry = registry();
    let source = StaticClearances::new();
    let predicate = registry
        .build_local_predicate(&EntityType::new("Child"), &source)
        .unwrap();
    assert_eq!(predicate.as_constant(), Some(true));
}

#[test]
fn test_grandparent_restrictions_propagate() {
    let catalog = SchemaCatalog::new()
        .with(EntitySchema::new("Region").classified_field("Code", ValueKind::Text, "Geo"))
        .with(
            EntitySchema::new("Store")
                .classified_field("Tier", ValueKind::I32, "Level")
                .navigation("region", "Region"),
        )
        .with(EntitySchema::new("Sale").navigation("store", "Store"));
    let registry = PredicateRegistry::new(Arc::new(catalog));
    let source = StaticClearances::new()
        .with("Geo", &["EU"])
        .with("Level", &["1", "2"]);

    let predicate = registry
        .build_predicate_including_ancestors(&EntityType::new("Sale"), &source)
        .unwrap();
    assert_eq!(
        predicate.to_string(),
        "(store.Tier == 1 OR store.Tier == 2) AND store.region.Code == \"EU\""
    );
}

#[test]
fn test_parent_coercion_error_surfaces_on_child() {
    let catalog = SchemaCatalog::new()
        .with(EntitySchema::new("Store").classified_field("Tier", ValueKind::I32, "Level"))
        .with(EntitySchema::new("Sale").navigation("store", "Store"));
    let registry = PredicateRegistry::new(Arc::new(catalog));
    let source = StaticClearances::new().with("Level", &["gold"]);

    assert_matches!(
        registry.build_predicate_including_ancestors(&EntityType::new("Sale"), &source),
        Err(WardenError::ValueCoercion { field, .. }) if field == "Tier"
    );
}

#[test]
fn test_navigation_to_undescribed_type_is_an_error() {
    let catalog = SchemaCatalog::new().with(EntitySchema::new("Sale").navigation("store", "Store"));
    let registry = PredicateRegistry::new(Arc::new(catalog));
    assert_matches!(
        registry.build_predicate_including_ancestors(
            &EntityType::new("Sale"),
            &StaticClearances::new()
        ),
        Err(WardenError::UnknownEntityType { .. })
    );
}

fn token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("A".to_string()),
        Just("B".to_string()),
        Just("!A".to_string()),
        Just("!B".to_string()),
        Just("*".to_string()),
    ]
}

proptest! {
    #[test]
    fn prop_deny_all_hides_every_row(mut tokens in proptest::collection::vec(token(), 0..6), at in 0usize..6) {
        let registry = registry();
        let position = at.min(tokens.len());
        tokens.insert(position, "!*".to_string());
        let source = StaticClearances::new();
        for token in &tokens {
            source.add("D1", token);
        }

        let (roots, children) = data();
        prop_assert_eq!(visible_ids(&registry, &source, &roots, &children), (vec![], vec![]));
    }

    #[test]
    fn prop_repeated_builds_are_identical(tokens in proptest::collection::vec(token(), 0..6)) {
        let registry = registry();
        let source = StaticClearances::new();
        for token in &tokens {
            source.add("D1", token);
        }

        let child = EntityType::new("Child");
        let first = registry.build_predicate_including_ancestors(&child, &source).unwrap();
        let second = registry.build_predicate_including_ancestors(&child, &source).unwrap();
        prop_assert!(Arc::ptr_eq(&first, &second));
    }
}
