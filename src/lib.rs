#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
//! # rdf-composer
//!
//! Runtime role composition for RDF-backed objects.
//!
//! Resources are mapped to *concepts* (capability descriptors) and
//! *behaviours* (implementation fragments) by their type keys. The
//! [`compose::Composer`] orders the behaviours of a combination of roles and
//! builds one dispatch chain per method; an [`object::Entity`] runs those
//! chains, and its property accessors read and write the triple store through
//! cached [`property::PropertySet`]s.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use rdf_composer::{
//!     compose::{Behaviour, Composer, Concept, Signature},
//!     model::{Value, ValueKind},
//!     object::ObjectManager,
//!     store::MemoryStore,
//! };
//!
//! let composer = Composer::new();
//! composer.mapper().add_concept(
//!     Concept::builder("Counter")
//!         .rdf_type("urn:example:Counter")
//!         .method(Signature::new("increment").returns(ValueKind::Integer))
//!         .build(),
//!     None,
//! );
//! composer.mapper().add_behaviour(
//!     Behaviour::builder("Counting")
//!         .implements("Counter")
//!         .state(|| 0_i64)
//!         .method("increment", |msg| {
//!             msg.state(|count: &mut i64| {
//!                 *count += 1;
//!                 Value::Integer(*count)
//!             })
//!         })
//!         .build(),
//!     None,
//! );
//!
//! let manager = ObjectManager::new(Arc::new(composer), Arc::new(MemoryStore::new()));
//! let counter = manager.create(manager.blank(), "urn:example:Counter")?;
//! assert_eq!(counter.invoke("increment", &[])?, Value::Integer(1));
//! # Ok::<(), rdf_composer::Error>(())
//! ```

pub use self::errors::Error;

pub mod compose;
pub mod config;
pub mod errors;
pub mod logger;
pub mod mapper;
pub mod model;
pub mod object;
pub mod ordering;
pub mod property;
pub mod store;

/// Application results options list
pub type Result<T, E = Error> = std::result::Result<T, E>;
