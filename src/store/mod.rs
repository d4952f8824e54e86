//! Triple store port.
//!
//! The composer only needs a handful of statement-level operations plus
//! transaction demarcation. [`Transaction`] is the guard every mutating
//! property-set operation goes through: it joins a transaction that is already
//! active and otherwise owns one, rolling it back when dropped uncommitted.

pub mod memory;

use oxrdf::{NamedNode, Term};

pub use self::memory::MemoryStore;
use crate::model::Resource;

/// Failure reported by a triple store.
#[derive(Debug, thiserror::Error)]
#[error("store error: {message}")]
pub struct StoreError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StoreError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Statement-level access to a transactional triple store.
///
/// Reads inside an active transaction observe its uncommitted writes.
/// Writes outside of a transaction are applied immediately.
pub trait TripleStore: Send + Sync {
    /// Objects of every `(subject, predicate, ?)` statement.
    fn objects(&self, subject: &Resource, predicate: &NamedNode) -> StoreResult<Vec<Term>>;

    fn contains(&self, subject: &Resource, predicate: &NamedNode, object: &Term)
        -> StoreResult<bool>;

    /// Returns `false` when the statement was already present.
    fn add(&self, subject: &Resource, predicate: &NamedNode, object: &Term) -> StoreResult<bool>;

    /// Returns `false` when the statement was absent.
    fn remove(&self, subject: &Resource, predicate: &NamedNode, object: &Term)
        -> StoreResult<bool>;

    fn begin(&self) -> StoreResult<()>;

    /// Begins a transaction unless the caller already has one; returns
    /// whether a new one was begun.
    ///
    /// Stores shared across threads override this to check and begin
    /// atomically.
    fn begin_or_join(&self) -> StoreResult<bool> {
        if self.is_active() {
            return Ok(false);
        }
        self.begin()?;
        Ok(true)
    }

    fn commit(&self) -> StoreResult<()>;

    fn rollback(&self) -> StoreResult<()>;

    /// Whether the caller has an active transaction.
    fn is_active(&self) -> bool;
}

/// Scope of one unit of work against a store.
///
/// ```
/// use rdf_composer::store::{MemoryStore, Transaction, TripleStore};
///
/// let store = MemoryStore::new();
/// let outer = Transaction::begin(&store)?;
/// let inner = Transaction::begin(&store)?;
/// assert!(!inner.owns());
/// inner.commit()?;
/// assert!(store.is_active());
/// outer.commit()?;
/// assert!(!store.is_active());
/// # Ok::<(), rdf_composer::store::StoreError>(())
/// ```
#[must_use = "an uncommitted transaction rolls back when dropped"]
pub struct Transaction<'a> {
    store: &'a dyn TripleStore,
    owner: bool,
    finished: bool,
}

impl<'a> Transaction<'a> {
    /// Joins the active transaction, or begins a new one.
    pub fn begin(store: &'a dyn TripleStore) -> StoreResult<Self> {
        let owner = store.begin_or_join()?;
        Ok(Self {
            store,
            owner,
            finished: false,
        })
    }

    /// Whether this guard began the transaction (and will end it).
    #[must_use]
    pub fn owns(&self) -> bool {
        self.owner
    }

    /// Commits an owned transaction; a joined one is left to its owner.
    ///
    /// A failed commit rolls the transaction back when the guard drops.
    pub fn commit(mut self) -> StoreResult<()> {
        if self.owner {
            self.store.commit()?;
        }
        self.finished = true;
        Ok(())
    }

    /// Rolls back an owned transaction immediately.
    pub fn rollback(mut self) -> StoreResult<()> {
        self.finished = true;
        if self.owner {
            self.store.rollback()?;
        }
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.owner && !self.finished && self.store.is_active() {
            if let Err(err) = self.store.rollback() {
                tracing::error!(error = %err, "could not roll back transaction");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use oxrdf::{Literal, NamedNode, Term};

    use super::{MemoryStore, StoreError, StoreResult, Transaction, TripleStore};
    use crate::model::Resource;

    fn statement() -> (Resource, NamedNode, Term) {
        (
            Resource::iri("urn:test:s").expect("iri"),
            NamedNode::new("urn:test:p").expect("iri"),
            Literal::new_simple_literal("o").into(),
        )
    }

    #[test]
    fn dropping_an_owned_transaction_rolls_back() {
        let store = MemoryStore::new();
        let (s, p, o) = statement();
        {
            let tx = Transaction::begin(&store).expect("begin");
            assert!(tx.owns());
            store.add(&s, &p, &o).expect("add");
            assert!(store.contains(&s, &p, &o).expect("contains"));
        }
        assert!(!store.is_active());
        assert!(!store.contains(&s, &p, &o).expect("contains"));
    }

    #[test]
    fn joined_transactions_defer_to_the_owner() {
        let store = MemoryStore::new();
        let (s, p, o) = statement();
        let outer = Transaction::begin(&store).expect("begin");
        {
            let inner = Transaction::begin(&store).expect("join");
            store.add(&s, &p, &o).expect("add");
            drop(inner);
        }
        assert!(store.is_active());
        outer.rollback().expect("rollback");
        assert!(!store.contains(&s, &p, &o).expect("contains"));
    }

    /// Memory store whose next commit fails without ending the transaction.
    #[derive(Default)]
    struct StubbornStore {
        inner: MemoryStore,
        refuse_commit: AtomicBool,
    }

    impl TripleStore for StubbornStore {
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

        fn add(
            &self,
            subject: &Resource,
            predicate: &NamedNode,
            object: &Term,
        ) -> StoreResult<bool> {
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

        fn commit(&self) -> StoreResult<()> {
            if self.refuse_commit.swap(false, Ordering::SeqCst) {
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

    #[test]
    fn failed_commits_roll_back() {
        let store = StubbornStore::default();
        store.refuse_commit.store(true, Ordering::SeqCst);
        let (s, p, o) = statement();

        let tx = Transaction::begin(&store).expect("begin");
        store.add(&s, &p, &o).expect("add");
        assert!(tx.commit().is_err());
        assert!(!store.is_active());
        assert!(!store.contains(&s, &p, &o).expect("contains"));

        let tx = Transaction::begin(&store).expect("begin");
        assert!(tx.owns());
        store.add(&s, &p, &o).expect("add");
        tx.commit().expect("commit");
        assert!(!store.is_active());
        assert!(store.contains(&s, &p, &o).expect("contains"));
    }
}
