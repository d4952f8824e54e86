//! Property sets: multi-valued RDF properties exposed as collections.
//!
//! A property set is a view over the objects of one `(subject, predicate)`
//! pair. Reads are cached up to a limit, mutations run inside the ambient
//! store transaction and invalidate every property set of the subject.

pub mod cache;
pub mod cached;
pub mod localized;
pub mod ordered;
pub mod registry;

use oxrdf::{Literal, NamedNode, Term};

pub use self::{
    cache::PropertyCache,
    cached::CachedPropertySet,
    localized::{best_match, score, LocalizedPropertySet},
    ordered::OrderedPropertySet,
    registry::{PropertySetRegistry, Refresh, RefreshBus},
};
use crate::{
    model::{LiteralManager, Resource, Value, ValueKind},
    store::{Transaction, TripleStore},
    Error, Result,
};

/// Everything needed to move an element across the term boundary.
#[derive(Clone, Copy)]
pub struct ElementCodec<'a> {
    pub literals: &'a LiteralManager,
    pub datatype: Option<&'a NamedNode>,
    pub kind: &'a ValueKind,
}

/// Element type of a property set.
pub trait PropertyElement: Clone + PartialEq + Send + Sync + 'static {
    fn to_term(&self, codec: &ElementCodec<'_>) -> Result<Term>;

    fn from_term(term: Term, codec: &ElementCodec<'_>) -> Result<Self>;

    /// Value read from an empty set; `None` when the element type has none.
    fn zero(_kind: &ValueKind) -> Option<Self> {
        None
    }
}

impl PropertyElement for Term {
    fn to_term(&self, _: &ElementCodec<'_>) -> Result<Term> {
        Ok(self.clone())
    }

    fn from_term(term: Term, _: &ElementCodec<'_>) -> Result<Self> {
        Ok(term)
    }
}

impl PropertyElement for NamedNode {
    fn to_term(&self, _: &ElementCodec<'_>) -> Result<Term> {
        Ok(self.clone().into())
    }

    fn from_term(term: Term, _: &ElementCodec<'_>) -> Result<Self> {
        match term {
            Term::NamedNode(node) => Ok(node),
            other => Err(Error::conversion(other, "named node")),
        }
    }
}

impl PropertyElement for Resource {
    fn to_term(&self, _: &ElementCodec<'_>) -> Result<Term> {
        Ok(Resource::to_term(self))
    }

    fn from_term(term: Term, _: &ElementCodec<'_>) -> Result<Self> {
        Resource::from_term(&term).ok_or_else(|| Error::conversion(term, "resource"))
    }
}

impl PropertyElement for String {
    fn to_term(&self, codec: &ElementCodec<'_>) -> Result<Term> {
        match codec.datatype {
            Some(_) => codec
                .literals
                .to_term(&Value::Text(self.clone()), codec.datatype),
            None => Ok(Literal::new_simple_literal(self.as_str()).into()),
        }
    }

    fn from_term(term: Term, _: &ElementCodec<'_>) -> Result<Self> {
        match term {
            Term::Literal(literal) => Ok(literal.value().to_owned()),
            Term::NamedNode(node) => Ok(node.into_string()),
            other => Err(Error::conversion(other, "text")),
        }
    }
}

/// Elements converted through the [`LiteralManager`] as a [`Value`].
macro_rules! value_element {
    ($element:ty, $variant:ident, $accessor:ident, $zero:expr, $target:literal) => {
        impl PropertyElement for $element {
            fn to_term(&self, codec: &ElementCodec<'_>) -> Result<Term> {
                codec
                    .literals
                    .to_term(&Value::$variant(*self), codec.datatype)
            }

            fn from_term(term: Term, codec: &ElementCodec<'_>) -> Result<Self> {
                let value = codec.literals.to_value(term)?;
                value
                    .$accessor()
                    .ok_or_else(|| Error::conversion(value, $target))
            }

            fn zero(_: &ValueKind) -> Option<Self> {
                Some($zero)
            }
        }
    };
}

value_element!(i64, Integer, as_integer, 0, "integer");
value_element!(bool, Bool, as_bool, false, "boolean");
value_element!(f64, Double, as_double, 0.0, "double");

impl PropertyElement for Value {
    fn to_term(&self, codec: &ElementCodec<'_>) -> Result<Term> {
        codec.literals.to_term(self, codec.datatype)
    }

    fn from_term(term: Term, codec: &ElementCodec<'_>) -> Result<Self> {
        codec.literals.to_value(term)
    }

    fn zero(kind: &ValueKind) -> Option<Self> {
        Some(kind.zero_value()).filter(|value| !value.is_null())
    }
}

/// Runs `op` inside the ambient transaction of `store`, owning one when none
/// is active. An owned transaction is rolled back when `op` fails.
pub fn in_transaction<R>(store: &dyn TripleStore, op: impl FnOnce() -> Result<R>) -> Result<R> {
    let tx = Transaction::begin(store)?;
    let value = op()?;
    tx.commit()?;
    Ok(value)
}

/// Collection view over the objects of one subject and predicate.
pub trait PropertySet<E: PropertyElement>: Send + Sync {
    fn subject(&self) -> &Resource;

    fn predicate(&self) -> &NamedNode;

    /// Declared element kind; decides the zero value of empty reads.
    fn kind(&self) -> &ValueKind;

    fn store(&self) -> &dyn TripleStore;

    /// All elements.
    fn get_all(&self) -> Result<Vec<E>>;

    fn contains(&self, value: &E) -> Result<bool>;

    fn size(&self) -> Result<usize>;

    /// Returns `false` when the element was already present.
    fn add(&self, value: E) -> Result<bool>;

    /// Returns `false` when the element was absent.
    fn remove(&self, value: &E) -> Result<bool>;

    /// Replaces the content with `values`.
    fn set_all(&self, values: Vec<E>) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Seeds the cache with values known to be the complete content.
    fn init(&self, values: Vec<E>);

    /// Drops cached state.
    fn refresh(&self);

    fn is_empty(&self) -> Result<bool> {
        Ok(self.size()? == 0)
    }

    fn contains_all(&self, values: &[E]) -> Result<bool> {
        for value in values {
            if !self.contains(value)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// First element, or the zero value of a primitive kind.
    fn get_single(&self) -> Result<Option<E>> {
        Ok(self
            .get_all()?
            .into_iter()
            .next()
            .or_else(|| E::zero(self.kind())))
    }

    /// `None` clears the set.
    fn set_single(&self, value: Option<E>) -> Result<()> {
        match value {
            Some(value) => self.set_all(vec![value]),
            None => self.clear(),
        }
    }

    fn add_all(&self, values: Vec<E>) -> Result<bool> {
        let result = in_transaction(self.store(), || {
            let mut changed = false;
            for value in values {
                changed |= self.add(value)?;
            }
            Ok(changed)
        });
        self.refresh();
        result
    }

    fn remove_all(&self, values: &[E]) -> Result<bool> {
        let result = in_transaction(self.store(), || {
            let mut changed = false;
            for value in values {
                changed |= self.remove(value)?;
            }
            Ok(changed)
        });
        self.refresh();
        result
    }

    /// Removes every element not in `values`.
    fn retain_all(&self, values: &[E]) -> Result<bool> {
        let result = in_transaction(self.store(), || {
            let mut changed = false;
            for value in self.get_all()? {
                if !values.contains(&value) {
                    changed |= self.remove(&value)?;
                }
            }
            Ok(changed)
        });
        self.refresh();
        result
    }
}
