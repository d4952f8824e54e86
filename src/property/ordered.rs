//! Ordered property sets.
//!
//! Elements are resources; their order is stored as pairwise facts
//! `(element, order_predicate, next)`. Reads rebuild the sequence with a
//! [`LinearExtension`] so missing or contradictory facts still yield a total
//! order.

use std::sync::{Mutex, MutexGuard, PoisonError};

use oxrdf::{NamedNode, Term};

use super::{CachedPropertySet, PropertyElement, PropertySet, Refresh};
use crate::{
    model::{Resource, ValueKind},
    ordering::LinearExtension,
    store::TripleStore,
    Error, Result,
};

pub struct OrderedPropertySet<E> {
    values: CachedPropertySet<E>,
    order: NamedNode,
    sequence: Mutex<Option<Vec<E>>>,
}

impl<E: PropertyElement> OrderedPropertySet<E> {
    /// Orders the elements of `values` with `order` facts.
    #[must_use]
    pub fn new(values: CachedPropertySet<E>, order: NamedNode) -> Self {
        Self {
            values,
            order,
            sequence: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn order_predicate(&self) -> &NamedNode {
        &self.order
    }

    fn sequence(&self) -> MutexGuard<'_, Option<Vec<E>>> {
        self.sequence.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Elements in order.
    pub fn to_vec(&self) -> Result<Vec<E>> {
        if let Some(sequence) = self.sequence().as_ref() {
            return Ok(sequence.clone());
        }
        let codec = self.values.codec();
        let sequence = self
            .ordered_terms(self.values.store())?
            .into_iter()
            .map(|term| E::from_term(term, &codec))
            .collect::<Result<Vec<_>>>()?;
        *self.sequence() = Some(sequence.clone());
        Ok(sequence)
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Result<Option<E>> {
        Ok(self.to_vec()?.into_iter().nth(index))
    }

    pub fn index_of(&self, value: &E) -> Result<Option<usize>> {
        Ok(self.to_vec()?.iter().position(|element| element == value))
    }

    pub fn len(&self) -> Result<usize> {
        self.values.size()
    }

    /// Appends an element; returns `false` when it is already present.
    pub fn push(&self, value: E) -> Result<bool> {
        let term = self.element_term(&value)?;
        self.write(|store, order| {
            if order.contains(&term) {
                return Ok(false);
            }
            self.link_at(store, order, order.len(), &term)?;
            Ok(true)
        })
    }

    /// Inserts an element before position `index` (appending past the end).
    /// An element already present is moved.
    pub fn insert(&self, index: usize, value: E) -> Result<()> {
        let term = self.element_term(&value)?;
        self.write(|store, order| {
            if let Some(current) = order.iter().position(|element| *element == term) {
                self.unlink(store, order, current)?;
            }
            let index = index.min(order.len());
            self.link_at(store, order, index, &term)
        })
    }

    /// Replaces the element at `index`.
    pub fn set(&self, index: usize, value: E) -> Result<()> {
        let term = self.element_term(&value)?;
        self.write(|store, order| {
            if index >= order.len() {
                return Err(Error::InvalidArgument(format!(
                    "index {index} out of bounds for {} elements",
                    order.len()
                )));
            }
            self.unlink(store, order, index)?;
            if let Some(current) = order.iter().position(|element| *element == term) {
                self.unlink(store, order, current)?;
            }
            let index = index.min(order.len());
            self.link_at(store, order, index, &term)
        })
    }

    fn element_term(&self, value: &E) -> Result<Term> {
        let term = value.to_term(&self.values.codec())?;
        match term {
            Term::NamedNode(_) | Term::BlankNode(_) => Ok(term),
            other => Err(Error::InvalidArgument(format!(
                "ordered elements must be resources, got {other}"
            ))),
        }
    }

    /// Runs a write against the current order read inside the transaction.
    fn write<R>(&self, op: impl FnOnce(&dyn TripleStore, &mut Vec<Term>) -> Result<R>) -> Result<R> {
        let result = self.values.mutate(|store| {
            let mut order = self.ordered_terms(store)?;
            op(store, &mut order)
        });
        *self.sequence() = None;
        result
    }

    fn ordered_terms(&self, store: &dyn TripleStore) -> Result<Vec<Term>> {
        let elements = store.objects(self.values.subject(), self.values.predicate())?;
        let mut extension = LinearExtension::new(elements.iter().cloned());
        for element in &elements {
            let Some(resource) = Resource::from_term(element) else {
                continue;
            };
            for next in store.objects(&resource, &self.order)? {
                extension.add_edge(element, &next);
            }
        }
        if !extension.dropped_edges().is_empty() {
            tracing::debug!(
                subject = %self.values.subject(),
                dropped = extension.dropped_edges().len(),
                "ignoring cyclic order facts"
            );
        }
        Ok(extension.sort())
    }

    fn link_at(
        &self,
        store: &dyn TripleStore,
        order: &mut Vec<Term>,
        index: usize,
        term: &Term,
    ) -> Result<()> {
        let subject = self.values.subject();
        store.add(subject, self.values.predicate(), term)?;
        let previous = index.checked_sub(1).and_then(|index| order.get(index)).cloned();
        let next = order.get(index).cloned();
        if let (Some(previous), Some(next)) = (&previous, &next) {
            self.unlink_pair(store, previous, next)?;
        }
        if let Some(previous) = &previous {
            self.link_pair(store, previous, term)?;
        }
        if let Some(next) = &next {
            self.link_pair(store, term, next)?;
        }
        order.insert(index, term.clone());
        Ok(())
    }

    fn unlink(&self, store: &dyn TripleStore, order: &mut Vec<Term>, index: usize) -> Result<()> {
        let term = order.remove(index);
        store.remove(self.values.subject(), self.values.predicate(), &term)?;
        if let Some(resource) = Resource::from_term(&term) {
            for next in store.objects(&resource, &self.order)? {
                store.remove(&resource, &self.order, &next)?;
            }
        }
        let previous = index.checked_sub(1).and_then(|index| order.get(index)).cloned();
        let next = order.get(index).cloned();
        if let Some(previous) = &previous {
            self.unlink_pair(store, previous, &term)?;
        }
        if let (Some(previous), Some(next)) = (&previous, &next) {
            self.link_pair(store, previous, next)?;
        }
        Ok(())
    }

    fn link_pair(&self, store: &dyn TripleStore, before: &Term, after: &Term) -> Result<()> {
        if let Some(before) = Resource::from_term(before) {
            store.add(&before, &self.order, after)?;
        }
        Ok(())
    }

    fn unlink_pair(&self, store: &dyn TripleStore, before: &Term, after: &Term) -> Result<()> {
        if let Some(before) = Resource::from_term(before) {
            store.remove(&before, &self.order, after)?;
        }
        Ok(())
    }
}

impl<E: PropertyElement> PropertySet<E> for OrderedPropertySet<E> {
    fn subject(&self) -> &Resource {
        self.values.subject()
    }

    fn predicate(&self) -> &NamedNode {
        self.values.predicate()
    }

    fn kind(&self) -> &ValueKind {
        self.values.kind()
    }

    fn store(&self) -> &dyn TripleStore {
        self.values.store()
    }

    fn get_all(&self) -> Result<Vec<E>> {
        self.to_vec()
    }

    fn contains(&self, value: &E) -> Result<bool> {
        self.values.contains(value)
    }

    fn size(&self) -> Result<usize> {
        self.values.size()
    }

    fn add(&self, value: E) -> Result<bool> {
        self.push(value)
    }

    fn remove(&self, value: &E) -> Result<bool> {
        let term = self.element_term(value)?;
        self.write(|store, order| match order.iter().position(|element| *element == term) {
            Some(index) => {
                self.unlink(store, order, index)?;
                Ok(true)
            }
            None => Ok(false),
        })
    }

    fn set_all(&self, values: Vec<E>) -> Result<()> {
        let terms = values
            .iter()
            .map(|value| self.element_term(value))
            .collect::<Result<Vec<_>>>()?;
        self.write(|store, order| {
            while !order.is_empty() {
                self.unlink(store, order, 0)?;
            }
            for term in &terms {
                if !order.contains(term) {
                    self.link_at(store, order, order.len(), term)?;
                }
            }
            Ok(())
        })
    }

    fn clear(&self) -> Result<()> {
        self.write(|store, order| {
            while !order.is_empty() {
                self.unlink(store, order, 0)?;
            }
            Ok(())
        })
    }

    fn init(&self, values: Vec<E>) {
        *self.sequence() = Some(values.clone());
        self.values.init(values);
    }

    fn refresh(&self) {
        *self.sequence() = None;
        self.values.refresh();
    }
}

impl<E: PropertyElement> Refresh for OrderedPropertySet<E> {
    fn invalidate(&self) {
        PropertySet::refresh(self);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use oxrdf::{Literal, NamedNode, Term};

    use super::OrderedPropertySet;
    use crate::{
        model::{LiteralManager, Resource},
        property::{CachedPropertySet, PropertySet},
        store::{MemoryStore, TripleStore},
    };

    fn node(name: &str) -> NamedNode {
        NamedNode::new(format!("urn:test:{name}")).expect("iri")
    }

    fn list(store: Arc<MemoryStore>) -> OrderedPropertySet<NamedNode> {
        let values = CachedPropertySet::new(
            Resource::iri("urn:test:list").expect("iri"),
            node("item"),
            store,
            Arc::new(LiteralManager::new()),
            10,
        );
        OrderedPropertySet::new(values, node("precedes"))
    }

    fn names(list: &OrderedPropertySet<NamedNode>) -> Vec<String> {
        list.to_vec()
            .expect("read")
            .into_iter()
            .map(|node| node.as_str().trim_start_matches("urn:test:").to_owned())
            .collect()
    }

    #[test]
    fn keeps_insertion_order() {
        let store = Arc::new(MemoryStore::new());
        let list = list(store);
        for name in ["c", "a", "b"] {
            assert!(list.push(node(name)).expect("push"));
        }
        assert!(!list.push(node("a")).expect("duplicate"));
        assert_eq!(names(&list), vec!["c", "a", "b"]);

        list.insert(1, node("d")).expect("insert");
        assert_eq!(names(&list), vec!["c", "d", "a", "b"]);
        list.insert(0, node("b")).expect("move");
        assert_eq!(names(&list), vec!["b", "c", "d", "a"]);
    }

    #[test]
    fn removal_relinks_neighbours() {
        let store = Arc::new(MemoryStore::new());
        let list = list(store.clone());
        list.set_all(vec![node("a"), node("b"), node("c")]).expect("set");
        assert!(list.remove(&node("b")).expect("remove"));
        assert_eq!(names(&list), vec!["a", "c"]);
        assert_eq!(
            store
                .objects(&Resource::from(node("a")), &node("precedes"))
                .expect("objects"),
            vec![Term::from(node("c"))]
        );

        list.set(1, node("z")).expect("set");
        assert_eq!(names(&list), vec!["a", "z"]);
        assert_eq!(list.index_of(&node("z")).expect("index"), Some(1));
        assert_eq!(list.get(0).expect("get"), Some(node("a")));
    }

    #[test]
    fn literal_elements_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let values = CachedPropertySet::<Term>::new(
            Resource::iri("urn:test:list").expect("iri"),
            node("item"),
            store,
            Arc::new(LiteralManager::new()),
            10,
        );
        let list = OrderedPropertySet::new(values, node("precedes"));
        assert!(list.push(Literal::new_simple_literal("x").into()).is_err());
    }
}
