//! Concepts: pure capability descriptors.
//!
//! A concept declares methods (optionally with a default body) and
//! store-backed properties. Properties expand into generated accessor methods:
//! `name()` / `set_name(value)` for functional properties and the list-valued
//! equivalents for collections.

use std::{fmt, sync::Arc};

use oxrdf::NamedNode;

use super::message::{Handler, Message};
use crate::{
    model::{TypeKey, Value, ValueKind},
    Result,
};

/// Method identity used for dispatch: name plus parameter kinds.
///
/// Two declarations that differ only in their return kind share one erased
/// signature and therefore one implementation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErasedSignature {
    pub name: String,
    pub params: Vec<ValueKind>,
}

impl fmt::Display for ErasedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str(")")
    }
}

/// Full method signature as declared by a concept.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    name: String,
    params: Vec<ValueKind>,
    returns: ValueKind,
}

impl Signature {
    /// A method without parameters returning `Null`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ValueKind::Null,
        }
    }

    #[must_use]
    pub fn param(mut self, kind: ValueKind) -> Self {
        self.params.push(kind);
        self
    }

    #[must_use]
    pub fn returns(mut self, kind: ValueKind) -> Self {
        self.returns = kind;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn params(&self) -> &[ValueKind] {
        &self.params
    }

    #[must_use]
    pub fn return_kind(&self) -> &ValueKind {
        &self.returns
    }

    #[must_use]
    pub fn erased(&self) -> ErasedSignature {
        ErasedSignature {
            name: self.name.clone(),
            params: self.params.clone(),
        }
    }

    /// Whether `args` can be passed to this signature.
    #[must_use]
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(kind, arg)| kind.accepts(arg))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.erased(), self.returns)
    }
}

/// How a property is laid out in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyLayout {
    /// Zero or one value.
    Functional,
    /// Unordered set of values.
    Collection,
    /// Resources linked by pairwise precedes facts.
    Ordered,
    /// Language-tagged text; reads pick the best match for the session locale.
    Localized,
}

/// Store-backed property of a concept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDecl {
    name: String,
    predicate: NamedNode,
    range: ValueKind,
    datatype: Option<NamedNode>,
    layout: PropertyLayout,
}

impl PropertyDecl {
    /// A functional property with an unconstrained range.
    #[must_use]
    pub fn new(name: impl Into<String>, predicate: NamedNode) -> Self {
        Self {
            name: name.into(),
            predicate,
            range: ValueKind::Any,
            datatype: None,
            layout: PropertyLayout::Functional,
        }
    }

    #[must_use]
    pub fn range(mut self, range: ValueKind) -> Self {
        self.range = range;
        self
    }

    /// Literal datatype written for this property; requires a converter.
    #[must_use]
    pub fn datatype(mut self, datatype: NamedNode) -> Self {
        self.datatype = Some(datatype);
        self
    }

    #[must_use]
    pub fn collection(mut self) -> Self {
        self.layout = PropertyLayout::Collection;
        self
    }

    #[must_use]
    pub fn ordered(mut self) -> Self {
        self.layout = PropertyLayout::Ordered;
        self
    }

    #[must_use]
    pub fn localized(mut self) -> Self {
        self.layout = PropertyLayout::Localized;
        self.range = ValueKind::Text;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn predicate(&self) -> &NamedNode {
        &self.predicate
    }

    #[must_use]
    pub fn range_kind(&self) -> &ValueKind {
        &self.range
    }

    #[must_use]
    pub fn datatype_node(&self) -> Option<&NamedNode> {
        self.datatype.as_ref()
    }

    #[must_use]
    pub fn layout(&self) -> &PropertyLayout {
        &self.layout
    }

    /// Kind exchanged by the generated accessors.
    #[must_use]
    pub fn value_kind(&self) -> ValueKind {
        match self.layout {
            PropertyLayout::Functional | PropertyLayout::Localized => self.range.clone(),
            PropertyLayout::Collection | PropertyLayout::Ordered => {
                ValueKind::list(self.range.clone())
            }
        }
    }

    #[must_use]
    pub fn getter(&self) -> Signature {
        Signature::new(self.name.clone()).returns(self.value_kind())
    }

    #[must_use]
    pub fn setter(&self) -> Signature {
        Signature::new(format!("set_{}", self.name)).param(self.value_kind())
    }
}

/// Direction of a generated property accessor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Get,
    Set,
}

/// A method declared by a concept.
#[derive(Clone)]
pub struct MethodDecl {
    signature: Signature,
    default: Option<Handler>,
    accessor: Option<(PropertyDecl, Access)>,
}

impl MethodDecl {
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub fn default_handler(&self) -> Option<&Handler> {
        self.default.as_ref()
    }

    #[must_use]
    pub fn accessor(&self) -> Option<(&PropertyDecl, Access)> {
        self.accessor
            .as_ref()
            .map(|(property, access)| (property, *access))
    }
}

impl fmt::Debug for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDecl")
            .field("signature", &self.signature)
            .field("default", &self.default.is_some())
            .field("accessor", &self.accessor)
            .finish()
    }
}

/// Named capability descriptor: methods and properties, no data.
#[derive(Clone, Debug)]
pub struct Concept {
    name: String,
    rdf_type: Option<TypeKey>,
    supertypes: Vec<String>,
    methods: Vec<MethodDecl>,
    properties: Vec<PropertyDecl>,
}

impl Concept {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ConceptBuilder {
        ConceptBuilder {
            concept: Self {
                name: name.into(),
                rdf_type: None,
                supertypes: Vec::new(),
                methods: Vec::new(),
                properties: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn rdf_type(&self) -> Option<&TypeKey> {
        self.rdf_type.as_ref()
    }

    /// Direct supertypes, by concept name.
    #[must_use]
    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// Declared methods followed by the generated property accessors.
    #[must_use]
    pub fn methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    #[must_use]
    pub fn properties(&self) -> &[PropertyDecl] {
        &self.properties
    }
}

pub struct ConceptBuilder {
    concept: Concept,
}

impl ConceptBuilder {
    /// RDF class the concept is bound to when registered without a key.
    #[must_use]
    pub fn rdf_type(mut self, key: impl Into<TypeKey>) -> Self {
        self.concept.rdf_type = Some(key.into());
        self
    }

    #[must_use]
    pub fn extends(mut self, supertype: impl Into<String>) -> Self {
        self.concept.supertypes.push(supertype.into());
        self
    }

    /// Declares an abstract method.
    #[must_use]
    pub fn method(mut self, signature: Signature) -> Self {
        self.concept.methods.push(MethodDecl {
            signature,
            default: None,
            accessor: None,
        });
        self
    }

    /// Declares a method with a default body, used when no behaviour
    /// implements it.
    #[must_use]
    pub fn method_with_default<F>(mut self, signature: Signature, body: F) -> Self
    where
        F: Fn(&Message<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.concept.methods.push(MethodDecl {
            signature,
            default: Some(Arc::new(body)),
            accessor: None,
        });
        self
    }

    /// Declares a store-backed property and its accessors.
    #[must_use]
    pub fn property(mut self, property: PropertyDecl) -> Self {
        for (signature, access) in [
            (property.getter(), Access::Get),
            (property.setter(), Access::Set),
        ] {
            self.concept.methods.push(MethodDecl {
                signature,
                default: None,
                accessor: Some((property.clone(), access)),
            });
        }
        self.concept.properties.push(property);
        self
    }

    #[must_use]
    pub fn build(self) -> Concept {
        self.concept
    }
}
