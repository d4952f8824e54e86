//! Behaviours: concrete implementation fragments.
//!
//! A behaviour implements methods of one or more concepts, may carry
//! per-entity state, may require collaborators from the session injector and
//! declares how it is ordered relative to other behaviours of the same
//! composite role.

use std::{
    any::{type_name, Any, TypeId},
    fmt,
    sync::Arc,
};

use super::message::{Handler, Message};
use crate::{
    model::{TypeKey, Value, ValueKind},
    object::Injector,
    ordering::OrderingConstraints,
    Result,
};

type StateInit = Arc<dyn Fn(&dyn Injector) -> Result<Box<dyn Any + Send>> + Send + Sync>;

/// Position of a behaviour method in a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingKind {
    /// Implements the method.
    Implements,
    /// Runs ahead of every implementation of the method.
    SubMessage,
}

/// A handler bound to a method name, optionally narrowed to a parameter list.
#[derive(Clone)]
pub struct MethodBinding {
    method: String,
    params: Option<Vec<ValueKind>>,
    kind: BindingKind,
    handler: Handler,
}

impl MethodBinding {
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn kind(&self) -> BindingKind {
        self.kind
    }

    #[must_use]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Whether the binding applies to a method with these parameters.
    #[must_use]
    pub fn matches(&self, name: &str, params: &[ValueKind]) -> bool {
        self.method == name
            && self
                .params
                .as_deref()
                .map_or(true, |declared| declared == params)
    }
}

impl fmt::Debug for MethodBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodBinding")
            .field("method", &self.method)
            .field("params", &self.params)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A collaborator type the behaviour needs at instantiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requirement {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

#[derive(Clone)]
pub struct Behaviour {
    name: String,
    rdf_type: Option<TypeKey>,
    implements: Vec<String>,
    constraints: OrderingConstraints,
    use_with: Vec<String>,
    annotations: Vec<(String, Vec<String>)>,
    requires: Vec<Requirement>,
    state: Option<StateInit>,
    bindings: Vec<MethodBinding>,
}

impl Behaviour {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> BehaviourBuilder {
        BehaviourBuilder {
            behaviour: Self {
                name: name.into(),
                rdf_type: None,
                implements: Vec::new(),
                constraints: OrderingConstraints::default(),
                use_with: Vec::new(),
                annotations: Vec::new(),
                requires: Vec::new(),
                state: None,
                bindings: Vec::new(),
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

    /// Concepts implemented, by name.
    #[must_use]
    pub fn implements(&self) -> &[String] {
        &self.implements
    }

    /// Ordering declared on the behaviour itself.
    #[must_use]
    pub fn constraints(&self) -> &OrderingConstraints {
        &self.constraints
    }

    /// Processors allowed to use this behaviour; empty means all.
    #[must_use]
    pub fn use_with(&self) -> &[String] {
        &self.use_with
    }

    #[must_use]
    pub fn usable_by(&self, processor: &str) -> bool {
        self.use_with.is_empty() || self.use_with.iter().any(|name| name == processor)
    }

    /// Raw annotation values by annotation name.
    #[must_use]
    pub fn annotations(&self) -> &[(String, Vec<String>)] {
        &self.annotations
    }

    #[must_use]
    pub fn requires(&self) -> &[Requirement] {
        &self.requires
    }

    #[must_use]
    pub fn bindings(&self) -> &[MethodBinding] {
        &self.bindings
    }

    /// Builds a fresh state for one entity. Stateless behaviours get `()`.
    pub fn init_state(&self, injector: &dyn Injector) -> Result<Box<dyn Any + Send>> {
        match &self.state {
            Some(init) => init(injector),
            None => Ok(Box::new(())),
        }
    }
}

impl fmt::Debug for Behaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behaviour")
            .field("name", &self.name)
            .field("rdf_type", &self.rdf_type)
            .field("implements", &self.implements)
            .field("constraints", &self.constraints)
            .field("use_with", &self.use_with)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

pub struct BehaviourBuilder {
    behaviour: Behaviour,
}

impl BehaviourBuilder {
    #[must_use]
    pub fn rdf_type(mut self, key: impl Into<TypeKey>) -> Self {
        self.behaviour.rdf_type = Some(key.into());
        self
    }

    #[must_use]
    pub fn implements(mut self, concept: impl Into<String>) -> Self {
        self.behaviour.implements.push(concept.into());
        self
    }

    /// Orders this behaviour after `behaviour`.
    #[must_use]
    pub fn depends_on(mut self, behaviour: impl Into<String>) -> Self {
        self.behaviour.constraints.depends_on.push(behaviour.into());
        self
    }

    /// Orders this behaviour before `behaviour`.
    #[must_use]
    pub fn precedes(mut self, behaviour: impl Into<String>) -> Self {
        self.behaviour.constraints.precedes.push(behaviour.into());
        self
    }

    /// Restricts the behaviour to the named method processor.
    #[must_use]
    pub fn use_with(mut self, processor: impl Into<String>) -> Self {
        self.behaviour.use_with.push(processor.into());
        self
    }

    /// Attaches a custom annotation, interpreted once the annotation name is
    /// registered with the role mapper.
    #[must_use]
    pub fn annotate<I, S>(mut self, annotation: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.behaviour
            .annotations
            .push((annotation.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Requires a collaborator of type `T` to be present in the injector.
    #[must_use]
    pub fn requires<T: Any>(mut self) -> Self {
        self.behaviour.requires.push(Requirement {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        });
        self
    }

    /// Per-entity state created by `init`.
    #[must_use]
    pub fn state<T, F>(mut self, init: F) -> Self
    where
        T: Any + Send,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.behaviour.state = Some(Arc::new(move |_: &dyn Injector| {
            Ok(Box::new(init()) as Box<dyn Any + Send>)
        }));
        self
    }

    /// Per-entity state built from the session's collaborators.
    #[must_use]
    pub fn state_with<T, F>(mut self, init: F) -> Self
    where
        T: Any + Send,
        F: Fn(&dyn Injector) -> Result<T> + Send + Sync + 'static,
    {
        self.behaviour.state = Some(Arc::new(move |injector: &dyn Injector| {
            Ok(Box::new(init(injector)?) as Box<dyn Any + Send>)
        }));
        self
    }

    /// Implements every overload of `method`.
    #[must_use]
    pub fn method<F>(self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Message<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.bind(method.into(), None, BindingKind::Implements, Arc::new(handler))
    }

    /// Implements the overload of `method` taking exactly `params`.
    #[must_use]
    pub fn overload<F>(self, method: impl Into<String>, params: Vec<ValueKind>, handler: F) -> Self
    where
        F: Fn(&Message<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.bind(
            method.into(),
            Some(params),
            BindingKind::Implements,
            Arc::new(handler),
        )
    }

    /// Runs `handler` ahead of every implementation of `method`.
    #[must_use]
    pub fn sub_message<F>(self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Message<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.bind(method.into(), None, BindingKind::SubMessage, Arc::new(handler))
    }

    fn bind(
        mut self,
        method: String,
        params: Option<Vec<ValueKind>>,
        kind: BindingKind,
        handler: Handler,
    ) -> Self {
        self.behaviour.bindings.push(MethodBinding {
            method,
            params,
            kind,
            handler,
        });
        self
    }

    #[must_use]
    pub fn build(self) -> Behaviour {
        self.behaviour
    }
}
