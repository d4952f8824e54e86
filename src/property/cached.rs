use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use oxrdf::NamedNode;

use super::{
    in_transaction, ElementCodec, PropertyCache, PropertyElement, PropertySet, Refresh, RefreshBus,
};
use crate::{
    model::{LiteralManager, Resource, ValueKind},
    store::TripleStore,
    Result,
};

/// Property set with a bounded read cache.
pub struct CachedPropertySet<E> {
    subject: Resource,
    predicate: NamedNode,
    kind: ValueKind,
    datatype: Option<NamedNode>,
    store: Arc<dyn TripleStore>,
    literals: Arc<LiteralManager>,
    bus: Option<Arc<RefreshBus>>,
    cache: Mutex<PropertyCache<E>>,
}

impl<E: PropertyElement> CachedPropertySet<E> {
    pub fn new(
        subject: Resource,
        predicate: NamedNode,
        store: Arc<dyn TripleStore>,
        literals: Arc<LiteralManager>,
        cache_limit: usize,
    ) -> Self {
        Self {
            subject,
            predicate,
            kind: ValueKind::Any,
            datatype: None,
            store,
            literals,
            bus: None,
            cache: Mutex::new(PropertyCache::new(cache_limit)),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    /// Literal datatype used when writing elements.
    #[must_use]
    pub fn with_datatype(mut self, datatype: Option<NamedNode>) -> Self {
        self.datatype = datatype;
        self
    }

    /// Bus notified after every mutation.
    #[must_use]
    pub fn with_bus(mut self, bus: Arc<RefreshBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn cache_limit(&self) -> usize {
        self.cache().limit()
    }

    /// Whether the cache currently holds the complete content.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.cache().is_complete()
    }

    #[must_use]
    pub fn literals(&self) -> &Arc<LiteralManager> {
        &self.literals
    }

    fn cache(&self) -> MutexGuard<'_, PropertyCache<E>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn codec(&self) -> ElementCodec<'_> {
        ElementCodec {
            literals: &self.literals,
            datatype: self.datatype.as_ref(),
            kind: &self.kind,
        }
    }

    /// Reads every element from the store, bypassing and refilling the cache.
    pub(crate) fn load(&self) -> Result<Vec<E>> {
        let codec = self.codec();
        let values = self
            .store
            .objects(&self.subject, &self.predicate)?
            .into_iter()
            .map(|term| E::from_term(term, &codec))
            .collect::<Result<Vec<_>>>()?;
        self.cache().store_read(&values);
        Ok(values)
    }

    /// Runs a write in the ambient transaction, then invalidates this set and
    /// every other set of the subject, whether or not the write succeeded.
    pub(crate) fn mutate<R>(&self, op: impl FnOnce(&dyn TripleStore) -> Result<R>) -> Result<R> {
        let store = self.store.as_ref();
        let result = in_transaction(store, || op(store));
        self.changed();
        result
    }

    fn changed(&self) {
        self.cache().invalidate();
        if let Some(bus) = &self.bus {
            bus.notify(&self.subject);
        }
    }
}

impl<E: PropertyElement> PropertySet<E> for CachedPropertySet<E> {
    fn subject(&self) -> &Resource {
        &self.subject
    }

    fn predicate(&self) -> &NamedNode {
        &self.predicate
    }

    fn kind(&self) -> &ValueKind {
        &self.kind
    }

    fn store(&self) -> &dyn TripleStore {
        self.store.as_ref()
    }

    fn get_all(&self) -> Result<Vec<E>> {
        if let Some(values) = self.cache().complete() {
            tracing::trace!(subject = %self.subject, predicate = %self.predicate, "property cache hit");
            return Ok(values.to_vec());
        }
        self.load()
    }

    fn contains(&self, value: &E) -> Result<bool> {
        if let Some(values) = self.cache().complete() {
            return Ok(values.contains(value));
        }
        let term = value.to_term(&self.codec())?;
        Ok(self.store.contains(&self.subject, &self.predicate, &term)?)
    }

    fn contains_all(&self, values: &[E]) -> Result<bool> {
        if let Some(cached) = self.cache().complete() {
            return Ok(values.iter().all(|value| cached.contains(value)));
        }
        let codec = self.codec();
        for value in values {
            let term = value.to_term(&codec)?;
            if !self.store.contains(&self.subject, &self.predicate, &term)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn size(&self) -> Result<usize> {
        if let Some(values) = self.cache().complete() {
            return Ok(values.len());
        }
        Ok(self.load()?.len())
    }

    fn add(&self, value: E) -> Result<bool> {
        let term = value.to_term(&self.codec())?;
        self.mutate(|store| Ok(store.add(&self.subject, &self.predicate, &term)?))
    }

    fn remove(&self, value: &E) -> Result<bool> {
        let term = value.to_term(&self.codec())?;
        self.mutate(|store| Ok(store.remove(&self.subject, &self.predicate, &term)?))
    }

    fn set_all(&self, values: Vec<E>) -> Result<()> {
        let codec = self.codec();
        let terms = values
            .iter()
            .map(|value| value.to_term(&codec))
            .collect::<Result<Vec<_>>>()?;
        self.mutate(|store| {
            for existing in store.objects(&self.subject, &self.predicate)? {
                if !terms.contains(&existing) {
                    store.remove(&self.subject, &self.predicate, &existing)?;
                }
            }
            for term in &terms {
                store.add(&self.subject, &self.predicate, term)?;
            }
            Ok(())
        })
    }

    fn clear(&self) -> Result<()> {
        self.mutate(|store| {
            for existing in store.objects(&self.subject, &self.predicate)? {
                store.remove(&self.subject, &self.predicate, &existing)?;
            }
            Ok(())
        })
    }

    fn init(&self, values: Vec<E>) {
        self.cache().init(values);
    }

    fn refresh(&self) {
        self.cache().invalidate();
    }
}

impl<E: PropertyElement> Refresh for CachedPropertySet<E> {
    fn invalidate(&self) {
        self.cache().invalidate();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use oxrdf::NamedNode;

    use super::CachedPropertySet;
    use crate::{
        model::{LiteralManager, Resource, ValueKind},
        property::PropertySet,
        store::MemoryStore,
    };

    fn set<E: crate::property::PropertyElement>(store: Arc<MemoryStore>) -> CachedPropertySet<E> {
        CachedPropertySet::new(
            Resource::iri("urn:test:s").expect("iri"),
            NamedNode::new("urn:test:p").expect("iri"),
            store,
            Arc::new(LiteralManager::new()),
            3,
        )
    }

    #[test]
    fn caches_small_results() {
        let store = Arc::new(MemoryStore::new());
        let names = set::<String>(store);
        assert!(names.add("a".to_owned()).expect("add"));
        assert!(!names.add("a".to_owned()).expect("add again"));
        assert!(!names.is_cached());

        assert_eq!(names.get_all().expect("read"), vec!["a".to_owned()]);
        assert!(names.is_cached());
        assert!(names.contains(&"a".to_owned()).expect("contains"));

        names.add("b".to_owned()).expect("add");
        assert!(!names.is_cached());
        assert_eq!(names.size().expect("size"), 2);
    }

    #[test]
    fn full_caches_are_not_authoritative() {
        let store = Arc::new(MemoryStore::new());
        let numbers = set::<i64>(store);
        numbers.add_all(vec![1, 2, 3, 4]).expect("add");
        assert_eq!(numbers.size().expect("size"), 4);
        assert!(!numbers.is_cached());
        assert!(numbers.contains(&4).expect("contains"));
        assert!(numbers.contains_all(&[1, 4]).expect("contains all"));
    }

    #[test]
    fn empty_primitive_reads_are_zero() {
        let store = Arc::new(MemoryStore::new());
        let count = set::<i64>(store.clone());
        assert_eq!(count.get_single().expect("read"), Some(0));

        let label = set::<String>(store);
        assert_eq!(label.get_single().expect("read"), None);

        let values = set::<crate::model::Value>(Arc::new(MemoryStore::new())).with_kind(ValueKind::Bool);
        assert_eq!(values.get_single().expect("read"), Some(crate::model::Value::Bool(false)));
    }

    #[test]
    fn set_single_replaces_and_clears() {
        let store = Arc::new(MemoryStore::new());
        let age = set::<i64>(store);
        age.set_single(Some(30)).expect("set");
        age.set_single(Some(31)).expect("set");
        assert_eq!(age.get_all().expect("read"), vec![31]);
        age.set_single(None).expect("clear");
        assert!(age.is_empty().expect("empty"));
    }

    #[test]
    fn init_seeds_a_complete_cache() {
        let store = Arc::new(MemoryStore::new());
        let tags = set::<String>(store);
        tags.init(vec!["x".into(), "y".into(), "z".into(), "w".into()]);
        assert!(tags.is_cached());
        assert_eq!(tags.cache_limit(), 5);
        assert_eq!(tags.size().expect("size"), 4);
        tags.refresh();
        assert_eq!(tags.size().expect("size"), 0);
    }
}
