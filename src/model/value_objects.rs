use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use oxrdf::{BlankNode, NamedNode, Term};
use thiserror::Error;

use crate::mapper::RoleMatcher;

/// Value object ensuring that supplied text represents a valid IRI.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iri {
    value: String,
}

impl Iri {
    /// Validates and constructs a new [`Iri`] value object.
    ///
    /// The constructor rejects malformed identifiers so that every predicate
    /// and subject handed to a store is canonical.
    pub fn new(value: impl Into<String>) -> Result<Self, IriError> {
        let value = value.into();
        NamedNode::new(value.as_str()).map_err(|_| IriError::Invalid {
            value: value.clone(),
        })?;
        Ok(Self { value })
    }

    /// Returns the underlying textual representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Converts the IRI into an `oxrdf` node.
    #[must_use]
    pub fn to_named_node(&self) -> NamedNode {
        NamedNode::new_unchecked(self.value.clone())
    }
}

impl Display for Iri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for Iri {
    type Err = IriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for Iri {
    type Error = IriError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NamedNode> for Iri {
    fn from(node: NamedNode) -> Self {
        Self {
            value: node.into_string(),
        }
    }
}

/// Errors produced when validating an [`Iri`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IriError {
    /// The provided text could not be parsed as an IRI.
    #[error("invalid IRI: {value}")]
    Invalid { value: String },
}

/// Identifier of a role: an RDF class IRI, a resource pattern or any other
/// string the application chooses.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(String);

impl TypeKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is a glob or path pattern rather than a literal key.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        RoleMatcher::is_pattern(&self.0)
    }

    /// Interprets the key as an IRI when it is one.
    #[must_use]
    pub fn to_named_node(&self) -> Option<NamedNode> {
        NamedNode::new(self.0.as_str()).ok()
    }
}

impl Display for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TypeKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Iri> for TypeKey {
    fn from(iri: &Iri) -> Self {
        Self(iri.as_str().to_owned())
    }
}

impl From<&NamedNode> for TypeKey {
    fn from(node: &NamedNode) -> Self {
        Self(node.as_str().to_owned())
    }
}

/// Subject of statements: a named node or a blank node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Named(NamedNode),
    Blank(BlankNode),
}

impl Resource {
    /// Builds a named resource from a validated IRI string.
    pub fn iri(value: impl Into<String>) -> Result<Self, IriError> {
        Ok(Self::Named(Iri::new(value)?.to_named_node()))
    }

    /// Builds a fresh blank node.
    #[must_use]
    pub fn blank() -> Self {
        Self::Blank(BlankNode::default())
    }

    /// Returns the resource as an RDF term.
    #[must_use]
    pub fn to_term(&self) -> Term {
        match self {
            Self::Named(node) => Term::NamedNode(node.clone()),
            Self::Blank(node) => Term::BlankNode(node.clone()),
        }
    }

    /// Interprets a term as a resource; literals are not resources.
    #[must_use]
    pub fn from_term(term: &Term) -> Option<Self> {
        match term {
            Term::NamedNode(node) => Some(Self::Named(node.clone())),
            Term::BlankNode(node) => Some(Self::Blank(node.clone())),
            _ => None,
        }
    }

    /// The IRI of a named resource.
    #[must_use]
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Named(node) => Some(node.as_str()),
            Self::Blank(_) => None,
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(node) => f.write_str(node.as_str()),
            Self::Blank(node) => write!(f, "_:{}", node.as_str()),
        }
    }
}

impl From<NamedNode> for Resource {
    fn from(node: NamedNode) -> Self {
        Self::Named(node)
    }
}

impl From<BlankNode> for Resource {
    fn from(node: BlankNode) -> Self {
        Self::Blank(node)
    }
}

impl From<&Iri> for Resource {
    fn from(iri: &Iri) -> Self {
        Self::Named(iri.to_named_node())
    }
}

#[cfg(test)]
mod tests {
    use super::{Iri, Resource, TypeKey};

    #[test]
    fn accepts_valid_iri() {
        let iri = Iri::new("https://example.org/resource").expect("valid IRI");
        assert_eq!(iri.as_str(), "https://example.org/resource");
    }

    #[test]
    fn rejects_invalid_iri() {
        let err = Iri::new("not an iri").expect_err("invalid IRI");
        assert!(matches!(err, super::IriError::Invalid { value } if value == "not an iri"));
    }

    #[test]
    fn resource_round_trips_through_terms() {
        let named = Resource::iri("urn:test:alice").expect("valid resource");
        assert_eq!(Resource::from_term(&named.to_term()), Some(named.clone()));
        assert_eq!(named.as_iri(), Some("urn:test:alice"));

        let blank = Resource::blank();
        assert_eq!(Resource::from_term(&blank.to_term()), Some(blank.clone()));
        assert!(blank.to_string().starts_with("_:"));
    }

    #[test]
    fn type_keys_know_when_they_are_patterns() {
        assert!(TypeKey::from("urn:test:*").is_pattern());
        assert!(TypeKey::from("/docs").is_pattern());
        assert!(!TypeKey::from("urn:test:Person").is_pattern());
        assert!(TypeKey::from("urn:test:Person").to_named_node().is_some());
    }
}
