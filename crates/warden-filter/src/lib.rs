//! # Warden Filter - Classification Predicate Compiler
//!
//! Turns the clearances a caller holds into row-admissibility predicates:
//!
//! - **Classification mapping**: fields of an entity type are classified under a
//!   named dimension; a row is visible when its value is admitted by the caller's
//!   tokens in that dimension
//! - **Navigation inheritance**: an entity is visible only when every parent it
//!   navigates to is visible, recursively
//! - **Caching**: predicates are recompiled only when the relevant clearances change
//!
//! ```ignore
//! let registry = PredicateRegistry::new(Arc::new(catalog));
//! registry.register_classified_field(&"Invoice".into(), "Region", "Geo")?;
//! let visible: Vec<_> = invoices.iter().access_filtered(&registry, &stack)?.collect();
//! ```

#![forbid(unsafe_code)]

pub mod builder;
pub mod compile;
pub mod entity;
pub mod filter;
pub mod predicate;
pub mod registry;
pub mod schema;

pub use builder::{Classification, PredicateBuilder};
pub use compile::compile_field;
pub use entity::{Entity, EntityType, TypedEntity};
pub use filter::{AccessFilterExt, Admitted};
pub use predicate::{FieldPath, Predicate, Restriction};
pub use registry::PredicateRegistry;
pub use schema::{EntitySchema, FieldDescriptor, NavigationEdge, SchemaCatalog, TypeCatalog};
