//! # Objects
//!
//! An [`ObjectManager`] is a session over one triple store. It creates
//! [`Entity`] values: a resource paired with the composed class of its roles
//! and one state slot per behaviour. Method calls on an entity run the
//! dispatch chain of the matching method table.

pub mod factory;
pub mod inject;

use std::{
    any::Any,
    collections::BTreeSet,
    fmt,
    sync::{Arc, Mutex},
};

use oxrdf::{vocab::rdf, NamedNode, Term};

pub use self::{
    factory::ObjectFactory,
    inject::{Collaborators, Injector, Locale, Singleton},
};
use crate::{
    compose::{ComposedClass, Composer, Message},
    model::{LiteralManager, Resource, TypeKey, Value},
    property::{in_transaction, PropertySetRegistry},
    store::TripleStore,
    Error, Result,
};

type Slot = Mutex<Box<dyn Any + Send>>;

struct EntityInner {
    resource: Resource,
    class: Arc<ComposedClass>,
    slots: Vec<Slot>,
    manager: ObjectManager,
}

/// A live object: a resource with a composed class. Cloning is cheap and
/// clones share behaviour state.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    pub(crate) fn new(
        resource: Resource,
        class: Arc<ComposedClass>,
        slots: Vec<Slot>,
        manager: ObjectManager,
    ) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                resource,
                class,
                slots,
                manager,
            }),
        }
    }

    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.inner.resource
    }

    #[must_use]
    pub fn class(&self) -> &Arc<ComposedClass> {
        &self.inner.class
    }

    /// State of the behaviour at `index` in dispatch order.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&Mutex<Box<dyn Any + Send>>> {
        self.inner.slots.get(index)
    }

    #[must_use]
    pub fn manager(&self) -> &ObjectManager {
        &self.inner.manager
    }

    /// Whether the entity implements `concept`.
    #[must_use]
    pub fn is(&self, concept: &str) -> bool {
        self.inner.class.implements(concept)
    }

    /// Concept names, subconcepts first.
    #[must_use]
    pub fn concepts(&self) -> Vec<&str> {
        self.inner
            .class
            .role()
            .concepts()
            .iter()
            .map(|concept| concept.name())
            .collect()
    }

    /// Behaviour names in dispatch order.
    #[must_use]
    pub fn behaviours(&self) -> Vec<&str> {
        self.inner
            .class
            .role()
            .behaviours()
            .iter()
            .map(|behaviour| behaviour.name())
            .collect()
    }

    /// Invokes the first method named `name` accepting `args`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownMethod`] when no method matches, and whatever the
    /// chain returns.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method = self
            .inner
            .class
            .resolve(name, args)
            .ok_or_else(|| self.unknown_method(name, args))?;
        Message::dispatch(self, method, args)
    }

    /// The entity seen through one of its concepts.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] when the entity does not implement
    /// `concept`.
    pub fn view(&self, concept: &str) -> Result<ConceptView<'_>> {
        if !self.is(concept) {
            return Err(Error::InvalidArgument(format!(
                "{} does not implement `{concept}`",
                self.inner.resource
            )));
        }
        Ok(ConceptView {
            entity: self,
            concept: concept.to_owned(),
            lineage: self.inner.class.role().lineage(concept),
        })
    }

    /// Drops cached property values of this entity's resource.
    pub fn refresh(&self) -> usize {
        self.inner.manager.refresh(&self.inner.resource)
    }

    fn unknown_method(&self, name: &str, args: &[Value]) -> Error {
        Error::UnknownMethod {
            class: self.inner.class.name(),
            method: name.to_owned(),
            arity: args.len(),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.inner.resource == other.inner.resource
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("resource", &self.inner.resource)
            .field("class", &self.inner.class.name())
            .finish_non_exhaustive()
    }
}

/// Calls restricted to the methods declared by one concept and its
/// supertypes.
pub struct ConceptView<'a> {
    entity: &'a Entity,
    concept: String,
    lineage: BTreeSet<String>,
}

impl ConceptView<'_> {
    #[must_use]
    pub fn concept(&self) -> &str {
        &self.concept
    }

    #[must_use]
    pub fn entity(&self) -> &Entity {
        self.entity
    }

    /// # Errors
    ///
    /// [`Error::UnknownMethod`] when the concept declares no matching method.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value> {
        let method = self
            .entity
            .class()
            .resolve_in(&self.lineage, name, args)
            .ok_or_else(|| Error::UnknownMethod {
                class: self.concept.clone(),
                method: name.to_owned(),
                arity: args.len(),
            })?;
        Message::dispatch(self.entity, method, args)
    }
}

struct Session {
    composer: Arc<Composer>,
    store: Arc<dyn TripleStore>,
    properties: PropertySetRegistry,
    injector: Arc<dyn Injector>,
    factory: ObjectFactory,
}

/// A session bound to one store.
#[derive(Clone)]
pub struct ObjectManager {
    inner: Arc<Session>,
}

impl ObjectManager {
    /// A session without collaborators.
    #[must_use]
    pub fn new(composer: Arc<Composer>, store: Arc<dyn TripleStore>) -> Self {
        Self::with_injector(composer, store, Arc::new(Collaborators::new()))
    }

    #[must_use]
    pub fn with_injector(
        composer: Arc<Composer>,
        store: Arc<dyn TripleStore>,
        injector: Arc<dyn Injector>,
    ) -> Self {
        let properties = PropertySetRegistry::with_order(
            store.clone(),
            composer.literals().clone(),
            composer.property_settings().clone(),
            composer.order_predicate().clone(),
        );
        Self {
            inner: Arc::new(Session {
                composer,
                store,
                properties,
                injector,
                factory: ObjectFactory,
            }),
        }
    }

    /// A fresh blank node.
    #[must_use]
    pub fn blank(&self) -> Resource {
        Resource::blank()
    }

    #[must_use]
    pub fn composer(&self) -> &Arc<Composer> {
        &self.inner.composer
    }

    #[must_use]
    pub fn store(&self) -> &dyn TripleStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn properties(&self) -> &PropertySetRegistry {
        &self.inner.properties
    }

    #[must_use]
    pub fn injector(&self) -> &dyn Injector {
        self.inner.injector.as_ref()
    }

    #[must_use]
    pub fn literals(&self) -> &Arc<LiteralManager> {
        self.inner.composer.literals()
    }

    /// Asserts `resource rdf:type key` and returns the resulting entity.
    ///
    /// # Errors
    ///
    /// When `key` is not an IRI, the store fails or composition fails.
    pub fn create(&self, resource: Resource, key: impl Into<TypeKey>) -> Result<Entity> {
        let key = key.into();
        self.assert_type(&resource, &key)?;
        self.find(&resource)
    }

    /// The entity of `resource`, composed from its stored `rdf:type` values.
    ///
    /// # Errors
    ///
    /// Store and composition errors.
    pub fn find(&self, resource: &Resource) -> Result<Entity> {
        let keys = self.stored_types(resource)?;
        self.create_object(resource.clone(), &keys, &[])
    }

    /// Like [`ObjectManager::find`], additionally implementing `concept`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConcept`] when `concept` is not registered, store and
    /// composition errors.
    pub fn find_as(&self, resource: &Resource, concept: &str) -> Result<Entity> {
        let keys = self.stored_types(resource)?;
        self.create_object(resource.clone(), &keys, &[concept])
    }

    /// Adds the type `key` to an existing entity and recomposes it.
    ///
    /// The returned entity has fresh behaviour state.
    ///
    /// # Errors
    ///
    /// When `key` is not an IRI, the store fails or composition fails.
    pub fn designate(&self, entity: &Entity, key: impl Into<TypeKey>) -> Result<Entity> {
        let key = key.into();
        self.assert_type(entity.resource(), &key)?;
        self.find(entity.resource())
    }

    /// # Errors
    ///
    /// See [`ObjectFactory::create_object`].
    pub fn create_object(
        &self,
        resource: Resource,
        keys: &[TypeKey],
        concepts: &[&str],
    ) -> Result<Entity> {
        self.inner.factory.create_object(self, resource, keys, concepts)
    }

    /// Runs `op` in one store transaction, joining an active one.
    ///
    /// When `op` fails every cached property value of the session is dropped,
    /// since it may reflect writes that were rolled back.
    ///
    /// # Errors
    ///
    /// The error of `op`, or the store error of begin and commit.
    pub fn transaction<R>(&self, op: impl FnOnce() -> Result<R>) -> Result<R> {
        let result = in_transaction(self.store(), op);
        if result.is_err() {
            tracing::debug!("transaction failed, refreshing property sets");
            self.inner.properties.refresh_all();
        }
        result
    }

    /// Drops cached property values of `resource`; returns how many property
    /// sets were refreshed.
    pub fn refresh(&self, resource: &Resource) -> usize {
        self.inner.properties.refresh(resource)
    }

    /// Forgets every property set of `resource`.
    pub fn release(&self, resource: &Resource) {
        self.inner.properties.release(resource);
    }

    fn assert_type(&self, resource: &Resource, key: &TypeKey) -> Result<()> {
        let class = key.to_named_node().ok_or_else(|| {
            Error::InvalidArgument(format!("type key `{key}` is not an IRI"))
        })?;
        let store = self.store();
        in_transaction(store, || {
            store.add(resource, &rdf::TYPE.into_owned(), &Term::from(class))?;
            Ok(())
        })?;
        self.refresh(resource);
        Ok(())
    }

    fn stored_types(&self, resource: &Resource) -> Result<Vec<TypeKey>> {
        Ok(self
            .store()
            .objects(resource, &rdf::TYPE.into_owned())?
            .into_iter()
            .filter_map(|term| match term {
                Term::NamedNode(node) => Some(TypeKey::from(&node)),
                _ => None,
            })
            .collect())
    }
}

impl fmt::Debug for ObjectManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectManager").finish_non_exhaustive()
    }
}

/// The `rdf:type` predicate as an owned node.
#[must_use]
pub fn rdf_type() -> NamedNode {
    rdf::TYPE.into_owned()
}
