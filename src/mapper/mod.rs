//! Role mapping: which concepts and behaviours apply to a type key.
//!
//! Registrations are recorded as-is; lookups run against a [`RoleIndex`]
//! derived from all of them and are memoized per key. Every registration bumps
//! the mapper generation and clears both the index and the memo.

pub mod hierarchy;
pub mod matcher;

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use dashmap::DashMap;

pub use self::{hierarchy::RoleIndex, matcher::RoleMatcher};
use crate::{
    compose::{Behaviour, Concept},
    model::TypeKey,
    ordering::OrderingConstraints,
    Result,
};

/// A concept or a behaviour, by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Concept(String),
    Behaviour(String),
}

impl Role {
    #[must_use]
    pub fn concept(name: impl Into<String>) -> Self {
        Self::Concept(name.into())
    }

    #[must_use]
    pub fn behaviour(name: impl Into<String>) -> Self {
        Self::Behaviour(name.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Concept(name) | Self::Behaviour(name) => name,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Concept(name) => write!(f, "concept:{name}"),
            Self::Behaviour(name) => write!(f, "behaviour:{name}"),
        }
    }
}

/// How the values of a behaviour annotation are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnotationKind {
    /// Values name behaviours ordered after the annotated one.
    Precedes,
    /// Values name behaviours ordered before the annotated one.
    DependsOn,
    /// Values are type keys (or patterns) the annotated behaviour applies to.
    Marker,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub name: String,
    pub kind: AnnotationKind,
}

impl Annotation {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: AnnotationKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Registrations {
    concepts: BTreeMap<String, Arc<Concept>>,
    behaviours: BTreeMap<String, Arc<Behaviour>>,
    ranks: BTreeMap<String, usize>,
    bindings: BTreeMap<TypeKey, BTreeSet<Role>>,
    super_keys: BTreeMap<TypeKey, BTreeSet<TypeKey>>,
    annotations: BTreeMap<String, AnnotationKind>,
}

impl Registrations {
    fn bind(&mut self, key: TypeKey, role: Role) {
        self.bindings.entry(key).or_default().insert(role);
    }
}

#[derive(Debug, Default)]
pub struct RoleMapper {
    registrations: RwLock<Registrations>,
    index: RwLock<Option<Arc<RoleIndex>>>,
    /// Roles per key, tagged with the generation they were resolved in.
    memo: DashMap<TypeKey, (u64, Arc<BTreeSet<Role>>)>,
    generation: AtomicU64,
}

impl RoleMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a concept, bound to `key` or else to its own RDF type.
    ///
    /// A concept name registered twice keeps its first definition; the new
    /// key binding is still recorded.
    pub fn add_concept(&self, concept: Concept, key: Option<TypeKey>) {
        let key = key.or_else(|| concept.rdf_type().cloned());
        let name = concept.name().to_owned();
        self.register(|registrations| {
            registrations
                .concepts
                .entry(name.clone())
                .or_insert_with(|| Arc::new(concept));
            if let Some(key) = key {
                registrations.bind(key, Role::Concept(name.clone()));
            }
        });
        tracing::debug!(concept = %name, "registered concept");
    }

    /// Registers a behaviour, bound to `key` or else to its own RDF type.
    ///
    /// Behaviours without a key apply wherever a concept they implement
    /// applies.
    pub fn add_behaviour(&self, behaviour: Behaviour, key: Option<TypeKey>) {
        let key = key.or_else(|| behaviour.rdf_type().cloned());
        let name = behaviour.name().to_owned();
        self.register(|registrations| {
            let rank = registrations.ranks.len();
            registrations.ranks.entry(name.clone()).or_insert(rank);
            registrations
                .behaviours
                .entry(name.clone())
                .or_insert_with(|| Arc::new(behaviour));
            if let Some(key) = key {
                registrations.bind(key, Role::Behaviour(name.clone()));
            }
        });
        tracing::debug!(behaviour = %name, "registered behaviour");
    }

    /// Makes behaviour annotations named `annotation.name` meaningful.
    pub fn add_annotation(&self, annotation: Annotation) {
        tracing::debug!(annotation = %annotation.name, kind = ?annotation.kind, "registered annotation");
        self.register(|registrations| {
            registrations
                .annotations
                .entry(annotation.name)
                .or_insert(annotation.kind);
        });
    }

    /// Records that every resource of type `sub` is also of type `sup`.
    pub fn add_subtype(&self, sub: impl Into<TypeKey>, sup: impl Into<TypeKey>) {
        let (sub, sup) = (sub.into(), sup.into());
        self.register(|registrations| {
            registrations
                .super_keys
                .entry(sub)
                .or_default()
                .insert(sup);
        });
    }

    /// Binds an already named role to a key pattern (or a plain key).
    pub fn add_pattern_role(&self, pattern: impl Into<TypeKey>, role: Role) {
        let pattern = pattern.into();
        self.register(|registrations| registrations.bind(pattern, role));
    }

    fn register(&self, apply: impl FnOnce(&mut Registrations)) {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        apply(&mut registrations);
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.memo.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Incremented by every registration.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The index over the current registrations, rebuilt when stale.
    pub fn index(&self) -> Result<Arc<RoleIndex>> {
        if let Some(index) = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(index.clone());
        }
        let registrations = self
            .registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut slot = self.index.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = slot.as_ref() {
            return Ok(index.clone());
        }
        let index = Arc::new(RoleIndex::build(&registrations)?);
        tracing::trace!(
            concepts = registrations.concepts.len(),
            behaviours = registrations.behaviours.len(),
            "rebuilt role index"
        );
        *slot = Some(index.clone());
        Ok(index)
    }

    /// Adds the roles applicable to `key` to `into` and returns it.
    pub fn find_roles<'a>(
        &self,
        key: &TypeKey,
        into: &'a mut BTreeSet<Role>,
    ) -> Result<&'a mut BTreeSet<Role>> {
        let generation = self.generation();
        if let Some(entry) = self.memo.get(key) {
            let (resolved, roles) = entry.value();
            if *resolved == generation {
                into.extend(roles.iter().cloned());
                return Ok(into);
            }
        }
        let roles = Arc::new(self.resolve_roles(std::slice::from_ref(key), None, [])?);
        into.extend(roles.iter().cloned());
        self.memo.insert(key.clone(), (generation, roles));
        Ok(into)
    }

    /// Roles for a set of keys, an optional resource IRI matched against
    /// pattern rules, and explicitly requested roles.
    ///
    /// With neither keys nor IRI only universal patterns apply.
    pub fn resolve_roles(
        &self,
        keys: &[TypeKey],
        iri: Option<&str>,
        requested: impl IntoIterator<Item = Role>,
    ) -> Result<BTreeSet<Role>> {
        let index = self.index()?;
        let mut roles: BTreeSet<Role> = requested.into_iter().collect();
        for key in keys {
            index.match_patterns(key.as_str(), &mut roles);
        }
        match iri {
            Some(iri) => index.match_patterns(iri, &mut roles),
            None if keys.is_empty() => index.match_patterns("", &mut roles),
            None => {}
        }
        Ok(index.close(keys.iter().cloned().collect(), roles))
    }

    #[must_use]
    pub fn concept(&self, name: &str) -> Option<Arc<Concept>> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .concepts
            .get(name)
            .cloned()
    }

    #[must_use]
    pub fn behaviour(&self, name: &str) -> Option<Arc<Behaviour>> {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .behaviours
            .get(name)
            .cloned()
    }

    /// Position of a behaviour in registration order.
    #[must_use]
    pub fn behaviour_rank(&self, name: &str) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ranks
            .get(name)
            .copied()
            .unwrap_or(usize::MAX)
    }

    /// Ordering of a behaviour, registered annotations included.
    pub fn constraints(&self, behaviour: &str) -> Result<OrderingConstraints> {
        Ok(self
            .index()?
            .constraints(behaviour)
            .cloned()
            .unwrap_or_default())
    }

    /// Whether any role or subtype link is bound to `key`.
    pub fn is_registered(&self, key: &TypeKey) -> Result<bool> {
        Ok(self.index()?.is_bound(key))
    }

    /// `key` and all keys it is a subtype of.
    pub fn super_keys(&self, key: &TypeKey) -> Result<BTreeSet<TypeKey>> {
        Ok(self.index()?.key_closure(key))
    }

    pub fn sub_keys(&self, key: &TypeKey) -> Result<BTreeSet<TypeKey>> {
        Ok(self.index()?.sub_keys(key))
    }
}
