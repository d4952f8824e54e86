//! Builds and memoizes the composed class of each composite role.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use dashmap::DashMap;

use super::{
    class::{CompositeKey, CompositeRole, ComposedClass, MethodTable},
    concept::ErasedSignature,
    processor::{builtin, ChainBuilder, ComposedMethod, CompositionContext, MethodProcessor},
};
use crate::{
    model::LiteralManager,
    ordering::{linearize, CyclePolicy},
    Error, Result,
};

pub struct BehaviourFactory {
    processors: RwLock<Vec<Arc<dyn MethodProcessor>>>,
    classes: DashMap<CompositeKey, Arc<ComposedClass>>,
}

impl Default for BehaviourFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviourFactory {
    /// A factory with the built-in processors.
    #[must_use]
    pub fn new() -> Self {
        Self {
            processors: RwLock::new(builtin()),
            classes: DashMap::new(),
        }
    }

    /// Registers a processor. Classes composed so far are dropped.
    pub fn add_processor(&self, processor: Arc<dyn MethodProcessor>) {
        tracing::debug!(processor = processor.name(), "adding method processor");
        self.processors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(processor);
        self.classes.clear();
    }

    /// Processors in execution order.
    ///
    /// # Errors
    ///
    /// [`Error::OrderingCycle`] when `policy` rejects cycles and the
    /// processor constraints contain one.
    pub fn processors(&self, policy: CyclePolicy) -> Result<Vec<Arc<dyn MethodProcessor>>> {
        let processors = self
            .processors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        linearize(
            processors,
            |processor| processor.name(),
            |processor| processor.constraints(),
            policy,
        )
    }

    /// Memoized number of composed classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub(crate) fn clear(&self) {
        self.classes.clear();
    }

    /// The composed class of `role`, built on first request.
    ///
    /// # Errors
    ///
    /// Configuration errors raised by the processors, and
    /// [`Error::ProcessorNotApplied`] when a processor claims a method and
    /// then declines it.
    pub fn implement(
        &self,
        role: &Arc<CompositeRole>,
        literals: &LiteralManager,
        policy: CyclePolicy,
    ) -> Result<Arc<ComposedClass>> {
        if let Some(class) = self.classes.get(role.key()) {
            return Ok(class.clone());
        }
        let class = Arc::new(self.compose(role, literals, policy)?);
        tracing::debug!(
            class = %role.key(),
            methods = class.methods().len(),
            behaviours = role.behaviours().len(),
            "composed class"
        );
        Ok(self
            .classes
            .entry(role.key().clone())
            .or_insert(class)
            .clone())
    }

    fn compose(
        &self,
        role: &Arc<CompositeRole>,
        literals: &LiteralManager,
        policy: CyclePolicy,
    ) -> Result<ComposedClass> {
        let processors = self.processors(policy)?;
        let ctx = CompositionContext::new(role, literals);
        let mut tables = Vec::new();
        for method in collect_methods(role) {
            let mut chain = ChainBuilder::new();
            for processor in &processors {
                if !processor.implements(&ctx, &method) {
                    continue;
                }
                if !processor.process(&ctx, &method, &mut chain)? {
                    return Err(Error::ProcessorNotApplied {
                        processor: processor.name().to_owned(),
                        method: method.signature().to_string(),
                    });
                }
            }
            let declared_by = method
                .declarations()
                .iter()
                .map(|(concept, declaration)| (concept.clone(), declaration.signature().clone()))
                .collect();
            tables.push(MethodTable::new(
                method.signature().clone(),
                declared_by,
                chain.into_entries(),
            ));
        }
        Ok(ComposedClass::new(role.clone(), tables))
    }
}

/// Methods of every concept of `role`, one per erased signature, in concept
/// order. Declarations differing only in their return kind are merged; the
/// first one, from the most specific concept, gives the signature.
fn collect_methods(role: &CompositeRole) -> Vec<ComposedMethod> {
    let mut methods: Vec<ComposedMethod> = Vec::new();
    let mut positions: HashMap<ErasedSignature, usize> = HashMap::new();
    for concept in role.concepts() {
        for declaration in concept.methods() {
            let erased = declaration.signature().erased();
            match positions.get(&erased) {
                Some(&position) => methods[position].declare(concept.name(), declaration.clone()),
                None => {
                    positions.insert(erased, methods.len());
                    methods.push(ComposedMethod::new(concept.name(), declaration.clone()));
                }
            }
        }
    }
    methods
}
