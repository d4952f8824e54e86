//! # Composition
//!
//! The [`Composer`] turns type keys into executable classes:
//!
//! 1. the [`RoleMapper`] resolves the concepts and behaviours of the keys,
//! 2. the composer orders them into a [`CompositeRole`] (concepts
//!    subconcepts first, behaviours by their ordering constraints),
//! 3. the [`BehaviourFactory`] asks each [`MethodProcessor`] to contribute
//!    links to the chain of every method and builds the [`ComposedClass`].
//!
//! Composite roles and composed classes are memoized; any registration
//! invalidates both.

pub mod behaviour;
pub mod class;
pub mod concept;
pub mod factory;
pub mod message;
pub mod processor;

use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::DashMap;
use oxrdf::NamedNode;

pub use self::{
    behaviour::{Behaviour, BehaviourBuilder, BindingKind, MethodBinding, Requirement},
    class::{ChainEntry, CompositeKey, CompositeRole, ComposedClass, EntryKind, MethodTable},
    concept::{
        Access, Concept, ConceptBuilder, ErasedSignature, MethodDecl, PropertyDecl,
        PropertyLayout, Signature,
    },
    factory::BehaviourFactory,
    message::{Handler, Message},
    processor::{
        BehaviourProcessor, ChainBuilder, ComposedMethod, CompositionContext, DefaultProcessor,
        MethodProcessor, PropertyProcessor,
    },
};
use crate::{
    config::{ComposerSettings, Config, PropertySettings},
    mapper::{Role, RoleMapper},
    model::{LiteralManager, Resource, TypeKey},
    ordering::{linearize, LinearExtension},
    Error, Result,
};

/// Process-wide registry facade: role mapper, literal converters, method
/// processors and the composition caches.
pub struct Composer {
    mapper: RoleMapper,
    literals: Arc<LiteralManager>,
    settings: ComposerSettings,
    properties: PropertySettings,
    order_predicate: NamedNode,
    factory: BehaviourFactory,
    composites: DashMap<CompositeKey, Arc<CompositeRole>>,
    generation: AtomicU64,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    /// A composer with default settings and the built-in processors.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mapper: RoleMapper::new(),
            literals: Arc::new(LiteralManager::new()),
            settings: ComposerSettings::default(),
            properties: PropertySettings::default(),
            order_predicate: NamedNode::new_unchecked(crate::config::DEFAULT_ORDER_PREDICATE),
            factory: BehaviourFactory::new(),
            composites: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn builder() -> ComposerBuilder {
        ComposerBuilder::default()
    }

    #[must_use]
    pub fn mapper(&self) -> &RoleMapper {
        &self.mapper
    }

    #[must_use]
    pub fn literals(&self) -> &Arc<LiteralManager> {
        &self.literals
    }

    #[must_use]
    pub fn settings(&self) -> &ComposerSettings {
        &self.settings
    }

    /// Property settings handed to every session.
    #[must_use]
    pub fn property_settings(&self) -> &PropertySettings {
        &self.properties
    }

    #[must_use]
    pub fn order_predicate(&self) -> &NamedNode {
        &self.order_predicate
    }

    #[must_use]
    pub fn factory(&self) -> &BehaviourFactory {
        &self.factory
    }

    pub fn add_processor(&self, processor: Arc<dyn MethodProcessor>) {
        self.factory.add_processor(processor);
    }

    /// Resolves the composite role of `keys` plus explicitly requested
    /// `concepts`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConcept`] when a requested concept is not registered,
    /// and ordering errors under the `reject` cycle policy.
    pub fn resolve(&self, keys: &[TypeKey], concepts: &[&str]) -> Result<Arc<CompositeRole>> {
        self.resolve_roles(keys, None, concepts)
    }

    /// Like [`Composer::resolve`], also applying the pattern rules matching
    /// the IRI of `resource`.
    ///
    /// # Errors
    ///
    /// See [`Composer::resolve`].
    pub fn resolve_for(
        &self,
        resource: &Resource,
        keys: &[TypeKey],
        concepts: &[&str],
    ) -> Result<Arc<CompositeRole>> {
        self.resolve_roles(keys, resource.as_iri(), concepts)
    }

    /// The composed class of `role`.
    ///
    /// # Errors
    ///
    /// Configuration errors raised while processing its methods.
    pub fn implement(&self, role: &Arc<CompositeRole>) -> Result<Arc<ComposedClass>> {
        self.sync_generation();
        self.factory
            .implement(role, &self.literals, self.settings.cycle_policy)
    }

    fn resolve_roles(
        &self,
        keys: &[TypeKey],
        iri: Option<&str>,
        concepts: &[&str],
    ) -> Result<Arc<CompositeRole>> {
        let generation = self.sync_generation();
        let mut requested = Vec::with_capacity(concepts.len());
        for concept in concepts {
            if self.mapper.concept(concept).is_none() {
                return Err(Error::UnknownConcept((*concept).to_owned()));
            }
            requested.push(Role::concept(*concept));
        }
        let roles = self.mapper.resolve_roles(keys, iri, requested)?;
        let key = CompositeKey {
            generation,
            roles: roles.iter().cloned().collect(),
        };
        if let Some(role) = self.composites.get(&key) {
            return Ok(role.clone());
        }
        let role = Arc::new(self.build_role(key.clone(), &roles)?);
        tracing::debug!(
            composite = %key,
            concepts = role.concepts().len(),
            behaviours = role.behaviours().len(),
            "resolved composite role"
        );
        Ok(self.composites.entry(key).or_insert(role).clone())
    }

    fn build_role(&self, key: CompositeKey, roles: &BTreeSet<Role>) -> Result<CompositeRole> {
        let mut concepts = Vec::new();
        let mut behaviours = Vec::new();
        for role in roles {
            match role {
                Role::Concept(name) => match self.mapper.concept(name) {
                    Some(concept) => concepts.push(concept),
                    None => tracing::warn!(concept = %name, "ignoring unregistered concept role"),
                },
                Role::Behaviour(name) => match self.mapper.behaviour(name) {
                    Some(behaviour) => {
                        let constraints = self.mapper.constraints(name)?;
                        behaviours.push((self.mapper.behaviour_rank(name), behaviour, constraints));
                    }
                    None => {
                        tracing::warn!(behaviour = %name, "ignoring unregistered behaviour role");
                    }
                },
            }
        }

        // subconcepts before their supertypes
        let mut extension = LinearExtension::new(concepts.iter().map(|concept| concept.name().to_owned()));
        for concept in &concepts {
            for supertype in concept.supertypes() {
                extension.add_edge(&concept.name().to_owned(), supertype);
            }
        }
        let order = extension.sort();
        concepts.sort_by_key(|concept| order.iter().position(|name| name == concept.name()));

        behaviours.sort_by_key(|(rank, _, _)| *rank);
        let behaviours = linearize(
            behaviours,
            |(_, behaviour, _)| behaviour.name(),
            |(_, _, constraints)| constraints,
            self.settings.cycle_policy,
        )?
        .into_iter()
        .map(|(_, behaviour, _)| behaviour)
        .collect();

        Ok(CompositeRole::new(key, concepts, behaviours))
    }

    /// Drops memoized composites after a registration; returns the current
    /// mapper generation.
    fn sync_generation(&self) -> u64 {
        let current = self.mapper.generation();
        if self.generation.swap(current, Ordering::SeqCst) != current {
            self.composites.clear();
            self.factory.clear();
        }
        current
    }
}

/// Builds a [`Composer`] from configuration.
#[derive(Default)]
pub struct ComposerBuilder {
    settings: ComposerSettings,
    properties: PropertySettings,
    literals: Option<Arc<LiteralManager>>,
    processors: Vec<Arc<dyn MethodProcessor>>,
}

impl ComposerBuilder {
    #[must_use]
    pub fn config(mut self, config: &Config) -> Self {
        self.settings = config.composer.clone();
        self.properties = config.properties.clone();
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: ComposerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn properties(mut self, properties: PropertySettings) -> Self {
        self.properties = properties;
        self
    }

    /// Shares a literal manager, e.g. one with custom converters.
    #[must_use]
    pub fn literals(mut self, literals: Arc<LiteralManager>) -> Self {
        self.literals = Some(literals);
        self
    }

    #[must_use]
    pub fn processor(mut self, processor: Arc<dyn MethodProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// # Errors
    ///
    /// When the configured order predicate is not an IRI.
    pub fn build(self) -> Result<Composer> {
        let order_predicate = NamedNode::new(self.properties.order_predicate.as_str())
            .map_err(|err| Error::InvalidArgument(format!("order predicate: {err}")))?;
        let composer = Composer {
            literals: self.literals.unwrap_or_default(),
            settings: self.settings,
            properties: self.properties,
            order_predicate,
            ..Composer::new()
        };
        for processor in self.processors {
            composer.add_processor(processor);
        }
        Ok(composer)
    }
}

#[cfg(test)]
mod tests {
    use super::{Behaviour, Composer, Concept};
    use crate::{
        config::{ComposerSettings, Config},
        ordering::CyclePolicy,
        Error,
    };

    fn names<T>(items: &[std::sync::Arc<T>], name: impl Fn(&T) -> &str) -> Vec<String> {
        items.iter().map(|item| name(item.as_ref()).to_owned()).collect()
    }

    #[test]
    fn orders_subconcepts_first() {
        let composer = Composer::new();
        composer
            .mapper()
            .add_concept(Concept::builder("Thing").build(), None);
        composer.mapper().add_concept(
            Concept::builder("Agent").extends("Thing").build(),
            None,
        );
        composer.mapper().add_concept(
            Concept::builder("Person").extends("Agent").build(),
            Some("urn:test:Person".into()),
        );
        let role = composer
            .resolve(&["urn:test:Person".into()], &[])
            .expect("role");
        assert_eq!(names(role.concepts(), Concept::name), vec!["Person", "Agent", "Thing"]);
    }

    #[test]
    fn behaviours_follow_rank_then_constraints() {
        let composer = Composer::new();
        composer
            .mapper()
            .add_concept(Concept::builder("Doc").build(), Some("urn:test:Doc".into()));
        for behaviour in [
            Behaviour::builder("Audit").implements("Doc").depends_on("Cache").build(),
            Behaviour::builder("Cache").implements("Doc").build(),
            Behaviour::builder("Index").implements("Doc").build(),
        ] {
            composer.mapper().add_behaviour(behaviour, None);
        }
        let role = composer.resolve(&["urn:test:Doc".into()], &[]).expect("role");
        assert_eq!(
            names(role.behaviours(), Behaviour::name),
            vec!["Cache", "Audit", "Index"]
        );
    }

    #[test]
    fn composites_are_memoized_per_generation() {
        let composer = Composer::new();
        composer
            .mapper()
            .add_concept(Concept::builder("Doc").build(), Some("urn:test:Doc".into()));
        let first = composer.resolve(&["urn:test:Doc".into()], &[]).expect("role");
        let again = composer.resolve(&["urn:test:Doc".into()], &[]).expect("role");
        assert!(std::sync::Arc::ptr_eq(&first, &again));

        composer
            .mapper()
            .add_behaviour(Behaviour::builder("Audit").implements("Doc").build(), None);
        let changed = composer.resolve(&["urn:test:Doc".into()], &[]).expect("role");
        assert!(!std::sync::Arc::ptr_eq(&first, &changed));
        assert_eq!(changed.behaviours().len(), 1);
    }

    #[test]
    fn unknown_requested_concepts_fail() {
        let composer = Composer::new();
        let err = composer.resolve(&[], &["Missing"]).expect_err("unknown");
        assert!(err.is_configuration());
        assert!(matches!(err, Error::UnknownConcept(name) if name == "Missing"));
    }

    #[test]
    fn reject_policy_surfaces_behaviour_cycles() {
        let config = Config {
            composer: ComposerSettings {
                cycle_policy: CyclePolicy::Reject,
            },
            ..Config::default()
        };
        let composer = Composer::builder().config(&config).build().expect("composer");
        composer
            .mapper()
            .add_concept(Concept::builder("Doc").build(), Some("urn:test:Doc".into()));
        composer.mapper().add_behaviour(
            Behaviour::builder("A").implements("Doc").depends_on("B").build(),
            None,
        );
        composer.mapper().add_behaviour(
            Behaviour::builder("B").implements("Doc").depends_on("A").build(),
            None,
        );
        assert!(matches!(
            composer.resolve(&["urn:test:Doc".into()], &[]),
            Err(Error::OrderingCycle { .. })
        ));
    }

    #[test]
    fn invalid_order_predicates_are_rejected() {
        let mut config = Config::default();
        config.properties.order_predicate = "not an iri".to_owned();
        assert!(Composer::builder().config(&config).build().is_err());
    }
}
