//! Session-wide memo of property sets.
//!
//! Property sets are memoized per `(subject, predicate, element type,
//! variant)` in a bounded cache so repeated accessor calls share one read
//! cache. Every set subscribes to the [`RefreshBus`] of its subject: a
//! mutation through any set of a subject invalidates all of them.

use std::{
    any::{Any, TypeId},
    sync::{Arc, Weak},
};

use dashmap::DashMap;
use moka::sync::Cache;
use oxrdf::NamedNode;

use super::{
    CachedPropertySet, LocalizedPropertySet, OrderedPropertySet, PropertyElement,
};
use crate::{
    config::PropertySettings,
    model::{LiteralManager, Resource, Value, ValueKind},
    store::TripleStore,
    Error, Result,
};

/// Something holding cached state derived from the store.
pub trait Refresh: Send + Sync {
    fn invalidate(&self);
}

/// Weak listeners per subject.
#[derive(Default)]
pub struct RefreshBus {
    listeners: DashMap<Resource, Vec<Weak<dyn Refresh>>>,
}

impl RefreshBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, subject: &Resource, listener: Weak<dyn Refresh>) {
        self.listeners
            .entry(subject.clone())
            .or_default()
            .push(listener);
    }

    /// Invalidates every live listener of `subject`; returns how many.
    pub fn notify(&self, subject: &Resource) -> usize {
        let live: Vec<Arc<dyn Refresh>> = match self.listeners.get_mut(subject) {
            Some(mut listeners) => {
                listeners.retain(|listener| listener.strong_count() > 0);
                listeners.iter().filter_map(Weak::upgrade).collect()
            }
            None => Vec::new(),
        };
        for listener in &live {
            listener.invalidate();
        }
        live.len()
    }

    /// Invalidates every live listener.
    pub fn notify_all(&self) {
        let subjects: Vec<Resource> = self
            .listeners
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for subject in subjects {
            self.notify(&subject);
        }
    }

    /// Drops dead listeners of `subject`, and the subject once none is left.
    pub fn prune(&self, subject: &Resource) {
        if let Some(mut listeners) = self.listeners.get_mut(subject) {
            listeners.retain(|listener| listener.strong_count() > 0);
        }
        self.listeners
            .remove_if(subject, |_, listeners| listeners.is_empty());
    }

    pub fn forget(&self, subject: &Resource) {
        self.listeners.remove(subject);
    }

    /// Subjects with registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Variant {
    Cached,
    Ordered(NamedNode),
    Localized(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PropertyKey {
    subject: Resource,
    predicate: NamedNode,
    element: TypeId,
    kind: ValueKind,
    datatype: Option<NamedNode>,
    variant: Variant,
}

type SharedSet = Arc<dyn Any + Send + Sync>;

pub struct PropertySetRegistry {
    store: Arc<dyn TripleStore>,
    literals: Arc<LiteralManager>,
    settings: PropertySettings,
    order: NamedNode,
    bus: Arc<RefreshBus>,
    sets: Cache<PropertyKey, SharedSet>,
}

impl PropertySetRegistry {
    /// Fails when the configured order predicate is not an IRI.
    pub fn new(
        store: Arc<dyn TripleStore>,
        literals: Arc<LiteralManager>,
        settings: PropertySettings,
    ) -> Result<Self> {
        let order = NamedNode::new(settings.order_predicate.as_str())
            .map_err(|err| Error::InvalidArgument(format!("order predicate: {err}")))?;
        Ok(Self::with_order(store, literals, settings, order))
    }

    /// Like [`PropertySetRegistry::new`] with an already parsed order
    /// predicate, which takes precedence over the one in `settings`.
    #[must_use]
    pub fn with_order(
        store: Arc<dyn TripleStore>,
        literals: Arc<LiteralManager>,
        settings: PropertySettings,
        order: NamedNode,
    ) -> Self {
        let bus = Arc::new(RefreshBus::new());
        let listeners = bus.clone();
        let sets = Cache::builder()
            .max_capacity(settings.max_sets)
            .eviction_listener(move |key: Arc<PropertyKey>, set: SharedSet, cause| {
                drop(set);
                listeners.prune(&key.subject);
                tracing::trace!(subject = %key.subject, ?cause, "evicted property set");
            })
            .build();
        Self {
            store,
            literals,
            settings,
            order,
            bus,
            sets,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PropertySettings {
        &self.settings
    }

    #[must_use]
    pub fn bus(&self) -> &Arc<RefreshBus> {
        &self.bus
    }

    /// Unordered set of typed elements.
    pub fn cached<E: PropertyElement>(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
    ) -> Result<Arc<CachedPropertySet<E>>> {
        self.typed(subject, predicate, ValueKind::Any, None)
    }

    /// Unordered set of [`Value`]s of a declared kind and datatype.
    pub fn values(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        kind: &ValueKind,
        datatype: Option<&NamedNode>,
    ) -> Result<Arc<CachedPropertySet<Value>>> {
        self.typed(subject, predicate, kind.clone(), datatype.cloned())
    }

    fn typed<E: PropertyElement>(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        kind: ValueKind,
        datatype: Option<NamedNode>,
    ) -> Result<Arc<CachedPropertySet<E>>> {
        let key = self.key::<E>(subject, predicate, &kind, datatype.as_ref(), Variant::Cached);
        self.memoized(key, || {
            self.base(subject, predicate)
                .with_kind(kind.clone())
                .with_datatype(datatype.clone())
        })
    }

    /// Resource list ordered by the configured order predicate.
    pub fn ordered<E: PropertyElement>(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        kind: &ValueKind,
    ) -> Result<Arc<OrderedPropertySet<E>>> {
        let variant = Variant::Ordered(self.order.clone());
        let key = self.key::<E>(subject, predicate, kind, None, variant);
        self.memoized(key, || {
            OrderedPropertySet::new(
                self.base(subject, predicate).with_kind(kind.clone()),
                self.order.clone(),
            )
        })
    }

    /// Language-tagged texts read in `locale`, or the configured locale.
    pub fn localized(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        locale: Option<&str>,
    ) -> Result<Arc<LocalizedPropertySet>> {
        let locale = locale
            .unwrap_or(self.settings.locale.as_str())
            .to_ascii_lowercase();
        let variant = Variant::Localized(locale.clone());
        let key = self.key::<String>(subject, predicate, &ValueKind::Text, None, variant);
        self.memoized(key, || {
            LocalizedPropertySet::new(self.base(subject, predicate), locale.clone())
        })
    }

    /// Invalidates every property set of `subject`.
    pub fn refresh(&self, subject: &Resource) -> usize {
        self.bus.notify(subject)
    }

    pub fn refresh_all(&self) {
        self.bus.notify_all();
    }

    /// Drops every memoized property set of `subject`.
    pub fn release(&self, subject: &Resource) {
        self.bus.notify(subject);
        self.bus.forget(subject);
        let keys: Vec<Arc<PropertyKey>> = self
            .sets
            .iter()
            .filter(|(key, _)| key.subject == *subject)
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.sets.invalidate(key.as_ref());
        }
        tracing::debug!(%subject, "released property sets");
    }

    /// Memoized property sets, after pending evictions ran.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.sets.run_pending_tasks();
        self.sets.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key<E: 'static>(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        kind: &ValueKind,
        datatype: Option<&NamedNode>,
        variant: Variant,
    ) -> PropertyKey {
        PropertyKey {
            subject: subject.clone(),
            predicate: predicate.clone(),
            element: TypeId::of::<E>(),
            kind: kind.clone(),
            datatype: datatype.cloned(),
            variant,
        }
    }

    fn base<E: PropertyElement>(&self, subject: &Resource, predicate: &NamedNode) -> CachedPropertySet<E> {
        CachedPropertySet::new(
            subject.clone(),
            predicate.clone(),
            self.store.clone(),
            self.literals.clone(),
            self.settings.cache_limit,
        )
        .with_bus(self.bus.clone())
    }

    fn memoized<S>(&self, key: PropertyKey, create: impl FnOnce() -> S) -> Result<Arc<S>>
    where
        S: Refresh + Any + Send + Sync,
    {
        let subject = key.subject.clone();
        let shared = self.sets.get_with(key, || {
            let set = Arc::new(create());
            let listener: Weak<dyn Refresh> = Arc::downgrade(&set) as Weak<dyn Refresh>;
            self.bus.subscribe(&subject, listener);
            tracing::trace!(%subject, "created property set");
            set as SharedSet
        });
        shared
            .downcast::<S>()
            .map_err(|_| Error::Message("property set registered with another type".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use oxrdf::NamedNode;

    use super::PropertySetRegistry;
    use crate::{
        config::PropertySettings,
        model::{LiteralManager, Resource, ValueKind},
        property::PropertySet,
        store::MemoryStore,
    };

    fn registry(max_sets: u64) -> PropertySetRegistry {
        let settings = PropertySettings {
            max_sets,
            ..PropertySettings::default()
        };
        PropertySetRegistry::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LiteralManager::new()),
            settings,
        )
        .expect("registry")
    }

    fn predicate(name: &str) -> NamedNode {
        NamedNode::new(format!("urn:test:{name}")).expect("iri")
    }

    #[test]
    fn memoizes_per_key() {
        let registry = registry(100);
        let subject = Resource::iri("urn:test:s").expect("iri");
        let first = registry.cached::<String>(&subject, &predicate("name")).expect("set");
        let second = registry.cached::<String>(&subject, &predicate("name")).expect("set");
        assert!(Arc::ptr_eq(&first, &second));

        let numbers = registry.cached::<i64>(&subject, &predicate("name")).expect("set");
        numbers.add(1).expect("add");
        let ordered = registry
            .ordered::<NamedNode>(&subject, &predicate("name"), &ValueKind::Resource)
            .expect("set");
        assert_eq!(ordered.order_predicate().as_str(), PropertySettings::default().order_predicate);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn mutations_refresh_sibling_sets() {
        let registry = registry(100);
        let subject = Resource::iri("urn:test:s").expect("iri");
        let name = registry.cached::<String>(&subject, &predicate("name")).expect("set");
        let nick = registry.cached::<String>(&subject, &predicate("nick")).expect("set");
        nick.get_all().expect("read");
        assert!(nick.is_cached());

        name.add("Ada".to_owned()).expect("add");
        assert!(!nick.is_cached());
        assert_eq!(registry.refresh(&subject), 2);
    }

    #[test]
    fn release_drops_the_subject() {
        let registry = registry(100);
        let subject = Resource::iri("urn:test:s").expect("iri");
        let first = registry.cached::<String>(&subject, &predicate("name")).expect("set");
        registry.release(&subject);
        assert!(registry.is_empty());
        let second = registry.cached::<String>(&subject, &predicate("name")).expect("set");
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn evicted_sets_leave_no_bookkeeping_behind() {
        let registry = registry(10);
        for index in 0..500 {
            let subject = Resource::iri(format!("urn:test:s{index}")).expect("iri");
            registry.cached::<String>(&subject, &predicate("name")).expect("set");
        }
        assert!(registry.len() <= 10);
        assert!(registry.bus().len() <= 10);

        let kept = Resource::iri("urn:test:kept").expect("iri");
        let held = registry.cached::<String>(&kept, &predicate("name")).expect("set");
        registry.release(&kept);
        let live = registry.len();
        assert_eq!(registry.bus().len() as u64, live);
        held.add("Ada".to_owned()).expect("add");
    }
}
