#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use oxrdf::{NamedNode, Term};
use rdf_composer::{
    model::Resource,
    store::{MemoryStore, StoreError, StoreResult, TripleStore},
};

/// Memory store counting the reads that reach it.
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl TripleStore for CountingStore {
    fn objects(&self, subject: &Resource, predicate: &NamedNode) -> StoreResult<Vec<Term>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.objects(subject, predicate)
    }

    fn contains(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        object: &Term,
    ) -> StoreResult<bool> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.contains(subject, predicate, object)
    }

    fn add(&self, subject: &Resource, predicate: &NamedNode, object: &Term) -> StoreResult<bool> {
        self.inner.add(subject, predicate, object)
    }

    fn remove(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        object: &Term,
    ) -> StoreResult<bool> {
        self.inner.remove(subject, predicate, object)
    }

    fn begin(&self) -> StoreResult<()> {
        self.inner.begin()
    }

    fn begin_or_join(&self) -> StoreResult<bool> {
        self.inner.begin_or_join()
    }

    fn commit(&self) -> StoreResult<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> StoreResult<()> {
        self.inner.rollback()
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

/// Memory store whose writes start failing after a number of additions, and
/// whose first commits can be refused.
pub struct FlakyStore {
    inner: MemoryStore,
    remaining: AtomicUsize,
    refused_commits: AtomicUsize,
}

impl FlakyStore {
    pub fn failing_after(adds: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            remaining: AtomicUsize::new(adds),
            refused_commits: AtomicUsize::new(0),
        }
    }

    /// Accepts every write but refuses the next `commits` commits.
    pub fn refusing_commits(commits: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            remaining: AtomicUsize::new(usize::MAX),
            refused_commits: AtomicUsize::new(commits),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl TripleStore for FlakyStore {
    fn objects(&self, subject: &Resource, predicate: &NamedNode) -> StoreResult<Vec<Term>> {
        self.inner.objects(subject, predicate)
    }

    fn contains(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        object: &Term,
    ) -> StoreResult<bool> {
        self.inner.contains(subject, predicate, object)
    }

    fn add(&self, subject: &Resource, predicate: &NamedNode, object: &Term) -> StoreResult<bool> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StoreError::new("write refused"));
        }
        self.inner.add(subject, predicate, object)
    }

    fn remove(
        &self,
        subject: &Resource,
        predicate: &NamedNode,
        object: &Term,
    ) -> StoreResult<bool> {
        self.inner.remove(subject, predicate, object)
    }

    fn begin(&self) -> StoreResult<()> {
        self.inner.begin()
    }

    fn begin_or_join(&self) -> StoreResult<bool> {
        self.inner.begin_or_join()
    }

    fn commit(&self) -> StoreResult<()> {
        let refused = self
            .refused_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(StoreError::new("commit refused"));
        }
        self.inner.commit()
    }

    fn rollback(&self) -> StoreResult<()> {
        self.inner.rollback()
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

pub fn predicate(name: &str) -> NamedNode {
    NamedNode::new(format!("urn:test:{name}")).expect("iri")
}
