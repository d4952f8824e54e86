//! Value objects shared by the mapper, the composer and the property sets.
//!
//! The module keeps only pure constructs: identifiers, dynamic values and the
//! literal conversion table. Nothing here talks to a store.

pub mod literal;
pub mod value;
pub mod value_objects;

pub use literal::{Converter, LiteralManager};
pub use value::{Value, ValueKind};
pub use value_objects::{Iri, IriError, Resource, TypeKey};
