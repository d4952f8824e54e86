use std::{
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, ThreadId},
};

use oxrdf::{Graph, NamedNode, Term, TermRef, Triple, TripleRef};

use super::{StoreError, StoreResult, TripleStore};
use crate::model::Resource;

#[derive(Debug)]
struct Working {
    owner: ThreadId,
    graph: Graph,
}

#[derive(Debug, Default)]
struct State {
    committed: Graph,
    working: Option<Working>,
}

impl State {
    fn owned(&self) -> bool {
        self.working
            .as_ref()
            .is_some_and(|working| working.owner == thread::current().id())
    }

    /// A transaction of another thread is active.
    fn foreign(&self) -> bool {
        self.working.is_some() && !self.owned()
    }

    fn view(&self) -> &Graph {
        match &self.working {
            Some(working) if working.owner == thread::current().id() => &working.graph,
            _ => &self.committed,
        }
    }

    fn view_mut(&mut self) -> &mut Graph {
        match &mut self.working {
            Some(working) if working.owner == thread::current().id() => &mut working.graph,
            _ => &mut self.committed,
        }
    }

    fn start(&mut self) {
        self.working = Some(Working {
            owner: thread::current().id(),
            graph: self.committed.clone(),
        });
        tracing::trace!("transaction started");
    }

    /// Takes the working graph of the calling thread's transaction.
    fn take_working(&mut self) -> StoreResult<Graph> {
        if !self.owned() {
            return Err(StoreError::new("no active transaction on this thread"));
        }
        Ok(self
            .working
            .take()
            .map(|working| working.graph)
            .unwrap_or_default())
    }
}

/// In-memory store over an [`oxrdf::Graph`].
///
/// A transaction works on a copy of the committed graph that replaces it on
/// commit. Transactions belong to the thread that began them: other threads
/// read the committed graph, and their writes and `begin` calls wait until the
/// transaction ends.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    idle: Condvar,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `triples`, committed.
    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        let mut committed = Graph::new();
        for triple in triples {
            committed.insert(&triple);
        }
        Self {
            state: Mutex::new(State {
                committed,
                working: None,
            }),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the state once no other thread has a transaction.
    fn lock_exclusive(&self) -> MutexGuard<'_, State> {
        self.idle
            .wait_while(self.lock(), |state| state.foreign())
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of statements visible to the current transaction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().view().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the visible statements.
    #[must_use]
    pub fn triples(&self) -> Vec<Triple> {
        self.lock()
            .view()
            .iter()
            .map(|triple| triple.into_owned())
            .collect()
    }
}

/// Evaluates `$body` with `$subject` bound to the node reference of a
/// [`Resource`].
macro_rules! with_subject {
    ($resource:expr, |$subject:ident| $body:expr) => {
        match $resource {
            Resource::Named(node) => {
                let $subject = node.as_ref();
                $body
            }
            Resource::Blank(node) => {
                let $subject = node.as_ref();
                $body
            }
        }
    };
}

impl TripleStore for MemoryStore {
    fn objects(&self, subject: &Resource, predicate: &NamedNode) -> StoreResult<Vec<Term>> {
        let state = self.lock();
        let graph = state.view();
        Ok(with_subject!(subject, |subject| graph
            .objects_for_subject_predicate(subject, predicate)
            .map(TermRef::into_owned)
            .collect()))
    }

    fn contains(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        object: &Term,
    ) -> StoreResult<bool> {
        let state = self.lock();
        let graph = state.view();
        Ok(with_subject!(subject, |subject| graph
            .contains(TripleRef::new(subject, predicate, object))))
    }

    fn add(&self, subject: &Resource, predicate: &NamedNode, object: &Term) -> StoreResult<bool> {
        let mut state = self.lock_exclusive();
        let graph = state.view_mut();
        Ok(with_subject!(subject, |subject| graph
            .insert(TripleRef::new(subject, predicate, object))))
    }

    fn remove(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        object: &Term,
    ) -> StoreResult<bool> {
        let mut state = self.lock_exclusive();
        let graph = state.view_mut();
        Ok(with_subject!(subject, |subject| graph
            .remove(TripleRef::new(subject, predicate, object))))
    }

    fn begin(&self) -> StoreResult<()> {
        let mut state = self.lock_exclusive();
        if state.owned() {
            return Err(StoreError::new("a transaction is already active"));
        }
        state.start();
        Ok(())
    }

    fn begin_or_join(&self) -> StoreResult<bool> {
        let mut state = self.lock_exclusive();
        if state.owned() {
            return Ok(false);
        }
        state.start();
        Ok(true)
    }

    fn commit(&self) -> StoreResult<()> {
        let mut state = self.lock();
        let working = state.take_working()?;
        state.committed = working;
        drop(state);
        self.idle.notify_all();
        tracing::trace!("transaction committed");
        Ok(())
    }

    fn rollback(&self) -> StoreResult<()> {
        let mut state = self.lock();
        state.take_working()?;
        drop(state);
        self.idle.notify_all();
        tracing::trace!("transaction rolled back");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.lock().owned()
    }
}

#[cfg(test)]
mod tests {
    use oxrdf::{BlankNode, Literal, NamedNode, Term, Triple};

    use super::MemoryStore;
    use crate::{model::Resource, store::TripleStore};

    #[test]
    fn reads_objects_of_named_and_blank_subjects() {
        let predicate = NamedNode::new("urn:test:p").expect("iri");
        let blank = BlankNode::default();
        let store = MemoryStore::from_triples([Triple::new(
            blank.clone(),
            predicate.clone(),
            Literal::new_simple_literal("x"),
        )]);

        let objects = store
            .objects(&Resource::Blank(blank), &predicate)
            .expect("objects");
        assert_eq!(objects, vec![Term::from(Literal::new_simple_literal("x"))]);
        assert!(store
            .objects(&Resource::iri("urn:test:other").expect("iri"), &predicate)
            .expect("objects")
            .is_empty());
    }

    #[test]
    fn commit_publishes_the_working_copy() {
        let store = MemoryStore::new();
        let subject = Resource::iri("urn:test:s").expect("iri");
        let predicate = NamedNode::new("urn:test:p").expect("iri");
        let object: Term = NamedNode::new("urn:test:o").expect("iri").into();

        store.begin().expect("begin");
        assert!(store.begin().is_err());
        assert!(store.add(&subject, &predicate, &object).expect("add"));
        assert!(!store.add(&subject, &predicate, &object).expect("add again"));
        store.commit().expect("commit");

        assert_eq!(store.len(), 1);
        assert!(store.commit().is_err());
        assert!(store.remove(&subject, &predicate, &object).expect("remove"));
        assert!(store.is_empty());
    }

    #[test]
    fn transactions_belong_to_their_thread() {
        let store = MemoryStore::new();
        let subject = Resource::iri("urn:test:s").expect("iri");
        let predicate = NamedNode::new("urn:test:p").expect("iri");
        let mine: Term = Literal::new_simple_literal("a").into();
        let theirs: Term = Literal::new_simple_literal("b").into();

        assert!(store.begin_or_join().expect("begin"));
        assert!(!store.begin_or_join().expect("join"));
        store.add(&subject, &predicate, &mine).expect("add");

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                (
                    store.is_active(),
                    store.contains(&subject, &predicate, &mine).expect("contains"),
                )
            });
            assert_eq!(reader.join().expect("reader"), (false, false));

            // waits for the rollback below, then writes to the committed graph
            let writer = scope.spawn(|| store.add(&subject, &predicate, &theirs).expect("add"));
            store.rollback().expect("rollback");
            assert!(writer.join().expect("writer"));
        });

        assert!(!store.is_active());
        assert_eq!(
            store.objects(&subject, &predicate).expect("objects"),
            vec![theirs]
        );
    }
}
