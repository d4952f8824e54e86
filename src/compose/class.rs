//! Composite roles and the classes composed from them.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Write as _},
    sync::Arc,
};

use super::{
    behaviour::Behaviour,
    concept::{Concept, ErasedSignature, Signature},
    message::Handler,
};
use crate::{mapper::Role, model::{Value, ValueKind}};

/// Identity of a composite role: mapper generation plus its sorted roles.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    pub generation: u64,
    pub roles: Vec<Role>,
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .roles
            .iter()
            .filter(|role| matches!(role, Role::Concept(_)))
            .map(Role::name)
            .collect();
        write!(f, "{}", names.join("+"))
    }
}

/// Resolved roles of an object: concepts ordered subconcepts first,
/// behaviours in dispatch order.
#[derive(Debug)]
pub struct CompositeRole {
    key: CompositeKey,
    concepts: Vec<Arc<Concept>>,
    behaviours: Vec<Arc<Behaviour>>,
}

impl CompositeRole {
    pub(crate) fn new(
        key: CompositeKey,
        concepts: Vec<Arc<Concept>>,
        behaviours: Vec<Arc<Behaviour>>,
    ) -> Self {
        Self {
            key,
            concepts,
            behaviours,
        }
    }

    #[must_use]
    pub fn key(&self) -> &CompositeKey {
        &self.key
    }

    #[must_use]
    pub fn concepts(&self) -> &[Arc<Concept>] {
        &self.concepts
    }

    #[must_use]
    pub fn behaviours(&self) -> &[Arc<Behaviour>] {
        &self.behaviours
    }

    #[must_use]
    pub fn concept(&self, name: &str) -> Option<&Arc<Concept>> {
        self.concepts.iter().find(|concept| concept.name() == name)
    }

    /// `concept` and its supertypes within this composite.
    #[must_use]
    pub fn lineage(&self, concept: &str) -> BTreeSet<String> {
        let mut lineage = BTreeSet::new();
        let mut pending = vec![concept.to_owned()];
        while let Some(name) = pending.pop() {
            if let Some(concept) = self.concept(&name) {
                pending.extend(
                    concept
                        .supertypes()
                        .iter()
                        .filter(|supertype| !lineage.contains(*supertype))
                        .cloned(),
                );
            }
            lineage.insert(name);
        }
        lineage
    }
}

/// Where a chain link comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    SubMessage,
    Implementation,
    /// Property accessor or concept default.
    Base,
}

#[derive(Clone)]
pub struct ChainEntry {
    handler: Handler,
    slot: Option<usize>,
    origin: String,
    kind: EntryKind,
}

impl ChainEntry {
    /// A link owned by the behaviour in state slot `slot`.
    #[must_use]
    pub fn behaviour(handler: Handler, slot: usize, origin: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            handler,
            slot: Some(slot),
            origin: origin.into(),
            kind,
        }
    }

    /// A stateless base link.
    #[must_use]
    pub fn base(handler: Handler, origin: impl Into<String>) -> Self {
        Self {
            handler,
            slot: None,
            origin: origin.into(),
            kind: EntryKind::Base,
        }
    }

    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    #[must_use]
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn kind(&self) -> EntryKind {
        self.kind
    }
}

impl fmt::Debug for ChainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainEntry")
            .field("origin", &self.origin)
            .field("kind", &self.kind)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Dispatch table of one erased signature.
#[derive(Debug)]
pub struct MethodTable {
    signature: Signature,
    declared_by: Vec<(String, Signature)>,
    bridges: Vec<ValueKind>,
    entries: Vec<ChainEntry>,
}

impl MethodTable {
    pub(crate) fn new(
        signature: Signature,
        declared_by: Vec<(String, Signature)>,
        entries: Vec<ChainEntry>,
    ) -> Self {
        let bridges = declared_by
            .iter()
            .map(|(_, declared)| declared.return_kind().clone())
            .filter(|kind| kind != signature.return_kind())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            signature,
            declared_by,
            bridges,
            entries,
        }
    }

    /// Signature with the most specific return kind.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Declaring concepts, most specific first.
    #[must_use]
    pub fn declared_by(&self) -> &[(String, Signature)] {
        &self.declared_by
    }

    /// Less specific return kinds served by this table.
    #[must_use]
    pub fn bridges(&self) -> &[ValueKind] {
        &self.bridges
    }

    #[must_use]
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    fn declared_in(&self, lineage: &BTreeSet<String>) -> bool {
        self.declared_by
            .iter()
            .any(|(concept, _)| lineage.contains(concept))
    }
}

/// Executable class of a composite role.
#[derive(Debug)]
pub struct ComposedClass {
    role: Arc<CompositeRole>,
    methods: Vec<Arc<MethodTable>>,
    by_signature: BTreeMap<ErasedSignature, usize>,
}

impl ComposedClass {
    pub(crate) fn new(role: Arc<CompositeRole>, methods: Vec<MethodTable>) -> Self {
        let by_signature = methods
            .iter()
            .enumerate()
            .map(|(index, table)| (table.signature().erased(), index))
            .collect();
        Self {
            role,
            methods: methods.into_iter().map(Arc::new).collect(),
            by_signature,
        }
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.role.key().to_string()
    }

    #[must_use]
    pub fn role(&self) -> &Arc<CompositeRole> {
        &self.role
    }

    /// Whether instances implement `concept`.
    #[must_use]
    pub fn implements(&self, concept: &str) -> bool {
        self.role.concept(concept).is_some()
    }

    #[must_use]
    pub fn methods(&self) -> &[Arc<MethodTable>] {
        &self.methods
    }

    #[must_use]
    pub fn method(&self, signature: &ErasedSignature) -> Option<&Arc<MethodTable>> {
        self.by_signature
            .get(signature)
            .map(|index| &self.methods[*index])
    }

    /// First table named `name` whose parameters accept `args`.
    #[must_use]
    pub fn resolve(&self, name: &str, args: &[Value]) -> Option<&Arc<MethodTable>> {
        self.methods
            .iter()
            .find(|table| table.signature().name() == name && table.signature().accepts(args))
    }

    /// Like [`ComposedClass::resolve`], restricted to methods declared by a
    /// concept of `lineage`.
    #[must_use]
    pub fn resolve_in(
        &self,
        lineage: &BTreeSet<String>,
        name: &str,
        args: &[Value],
    ) -> Option<&Arc<MethodTable>> {
        self.methods.iter().find(|table| {
            table.signature().name() == name
                && table.declared_in(lineage)
                && table.signature().accepts(args)
        })
    }

    /// Human readable layout of the dispatch tables.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "class {}", self.name());
        for behaviour in self.role.behaviours() {
            let _ = writeln!(out, "  behaviour {}", behaviour.name());
        }
        for table in &self.methods {
            let _ = write!(out, "  {}", table.signature());
            for bridge in table.bridges() {
                let _ = write!(out, " [bridge {bridge}]");
            }
            let _ = writeln!(out);
            for entry in table.entries() {
                let _ = writeln!(out, "    {:?} {}", entry.kind(), entry.origin());
            }
        }
        out
    }
}
