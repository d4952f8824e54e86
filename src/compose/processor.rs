//! Method processors decide what runs when a composed method is invoked.
//!
//! For every method of a composite role, each processor is asked whether it
//! implements the method; the ones that do append links to the method's
//! chain. Processors run in the order given by their constraints, which for
//! the built-ins is `behaviours`, `properties`, `defaults`.

use std::sync::Arc;

use super::{
    behaviour::{Behaviour, BindingKind},
    class::{ChainEntry, CompositeRole, EntryKind},
    concept::{Access, MethodDecl, PropertyDecl, PropertyLayout, Signature},
    message::{Handler, Message},
};
use crate::{
    model::{LiteralManager, Resource, Value, ValueKind},
    object::Locale,
    ordering::OrderingConstraints,
    property::PropertySet,
    Error, Result,
};

/// Name of the processor binding behaviour methods.
pub const BEHAVIOURS: &str = "behaviours";
/// Name of the processor implementing property accessors.
pub const PROPERTIES: &str = "properties";
/// Name of the processor falling back to concept default bodies.
pub const DEFAULTS: &str = "defaults";

/// What a processor sees while a composite role is implemented.
pub struct CompositionContext<'a> {
    role: &'a CompositeRole,
    literals: &'a LiteralManager,
}

impl<'a> CompositionContext<'a> {
    pub(crate) fn new(role: &'a CompositeRole, literals: &'a LiteralManager) -> Self {
        Self { role, literals }
    }

    #[must_use]
    pub fn role(&self) -> &'a CompositeRole {
        self.role
    }

    /// Behaviours in dispatch order with their state slot.
    pub fn behaviours(&self) -> impl Iterator<Item = (usize, &'a Arc<Behaviour>)> {
        self.role.behaviours().iter().enumerate()
    }

    #[must_use]
    pub fn literals(&self) -> &'a LiteralManager {
        self.literals
    }
}

/// One erased method of a composite with every concept declaring it.
#[derive(Debug, Clone)]
pub struct ComposedMethod {
    signature: Signature,
    declarations: Vec<(String, MethodDecl)>,
}

impl ComposedMethod {
    pub(crate) fn new(concept: &str, declaration: MethodDecl) -> Self {
        Self {
            signature: declaration.signature().clone(),
            declarations: vec![(concept.to_owned(), declaration)],
        }
    }

    pub(crate) fn declare(&mut self, concept: &str, declaration: MethodDecl) {
        self.declarations.push((concept.to_owned(), declaration));
    }

    /// Signature of the most specific declaration.
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Declarations with their concept, most specific first.
    #[must_use]
    pub fn declarations(&self) -> &[(String, MethodDecl)] {
        &self.declarations
    }

    /// Property accessor of the most specific declaration that has one.
    #[must_use]
    pub fn accessor(&self) -> Option<(&PropertyDecl, Access)> {
        self.declarations
            .iter()
            .find_map(|(_, declaration)| declaration.accessor())
    }

    /// Default body of the most specific declaration that has one.
    #[must_use]
    pub fn default_handler(&self) -> Option<(&str, &Handler)> {
        self.declarations.iter().find_map(|(concept, declaration)| {
            declaration
                .default_handler()
                .map(|handler| (concept.as_str(), handler))
        })
    }
}

/// Links of a method chain, in the order they were appended.
#[derive(Debug, Default)]
pub struct ChainBuilder {
    entries: Vec<ChainEntry>,
}

impl ChainBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ChainEntry) {
        self.entries.push(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> Vec<ChainEntry> {
        self.entries
    }
}

pub trait MethodProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Ordering relative to other processors, by name.
    fn constraints(&self) -> &OrderingConstraints;

    /// Whether this processor claims `method`.
    fn implements(&self, ctx: &CompositionContext<'_>, method: &ComposedMethod) -> bool;

    /// Appends links for a claimed method. Returning `false` means the
    /// processor did not apply after all, which fails the composition.
    ///
    /// # Errors
    ///
    /// Configuration errors detected while building the links.
    fn process(
        &self,
        ctx: &CompositionContext<'_>,
        method: &ComposedMethod,
        chain: &mut ChainBuilder,
    ) -> Result<bool>;
}

/// Binds behaviour methods: sub-messages first, then implementations, both in
/// behaviour order.
#[derive(Debug, Default)]
pub struct BehaviourProcessor {
    constraints: OrderingConstraints,
}

impl BehaviourProcessor {
    fn bindings<'a>(
        &'a self,
        ctx: &CompositionContext<'a>,
        method: &'a ComposedMethod,
        kind: BindingKind,
    ) -> impl Iterator<Item = ChainEntry> + 'a {
        let signature = method.signature();
        ctx.behaviours()
            .filter(|(_, behaviour)| behaviour.usable_by(BEHAVIOURS))
            .flat_map(move |(slot, behaviour)| {
                behaviour
                    .bindings()
                    .iter()
                    .filter(move |binding| {
                        binding.kind() == kind
                            && binding.matches(signature.name(), signature.params())
                    })
                    .map(move |binding| {
                        let kind = match binding.kind() {
                            BindingKind::SubMessage => EntryKind::SubMessage,
                            BindingKind::Implements => EntryKind::Implementation,
                        };
                        ChainEntry::behaviour(binding.handler().clone(), slot, behaviour.name(), kind)
                    })
            })
    }
}

impl MethodProcessor for BehaviourProcessor {
    fn name(&self) -> &str {
        BEHAVIOURS
    }

    fn constraints(&self) -> &OrderingConstraints {
        &self.constraints
    }

    fn implements(&self, ctx: &CompositionContext<'_>, method: &ComposedMethod) -> bool {
        let signature = method.signature();
        ctx.behaviours().any(|(_, behaviour)| {
            behaviour.usable_by(BEHAVIOURS)
                && behaviour
                    .bindings()
                    .iter()
                    .any(|binding| binding.matches(signature.name(), signature.params()))
        })
    }

    fn process(
        &self,
        ctx: &CompositionContext<'_>,
        method: &ComposedMethod,
        chain: &mut ChainBuilder,
    ) -> Result<bool> {
        let before = chain.len();
        for kind in [BindingKind::SubMessage, BindingKind::Implements] {
            for entry in self.bindings(ctx, method, kind) {
                chain.push(entry);
            }
        }
        Ok(chain.len() > before)
    }
}

/// Implements property accessors against the session's property sets.
#[derive(Debug)]
pub struct PropertyProcessor {
    constraints: OrderingConstraints,
}

impl Default for PropertyProcessor {
    fn default() -> Self {
        Self {
            constraints: OrderingConstraints::new().depends_on(BEHAVIOURS),
        }
    }
}

impl MethodProcessor for PropertyProcessor {
    fn name(&self) -> &str {
        PROPERTIES
    }

    fn constraints(&self) -> &OrderingConstraints {
        &self.constraints
    }

    fn implements(&self, _: &CompositionContext<'_>, method: &ComposedMethod) -> bool {
        method.accessor().is_some()
    }

    fn process(
        &self,
        ctx: &CompositionContext<'_>,
        method: &ComposedMethod,
        chain: &mut ChainBuilder,
    ) -> Result<bool> {
        let Some((property, access)) = method.accessor() else {
            return Ok(false);
        };
        if let Some(datatype) = property.datatype_node() {
            ctx.literals().require(datatype)?;
        }
        chain.push(ChainEntry::base(
            accessor(property.clone(), access),
            format!("property {}", property.name()),
        ));
        Ok(true)
    }
}

/// Runs the concept default body when one is declared.
#[derive(Debug)]
pub struct DefaultProcessor {
    constraints: OrderingConstraints,
}

impl Default for DefaultProcessor {
    fn default() -> Self {
        Self {
            constraints: OrderingConstraints::new().depends_on(PROPERTIES),
        }
    }
}

impl MethodProcessor for DefaultProcessor {
    fn name(&self) -> &str {
        DEFAULTS
    }

    fn constraints(&self) -> &OrderingConstraints {
        &self.constraints
    }

    fn implements(&self, _: &CompositionContext<'_>, method: &ComposedMethod) -> bool {
        method.default_handler().is_some()
    }

    fn process(
        &self,
        _: &CompositionContext<'_>,
        method: &ComposedMethod,
        chain: &mut ChainBuilder,
    ) -> Result<bool> {
        let Some((concept, handler)) = method.default_handler() else {
            return Ok(false);
        };
        chain.push(ChainEntry::base(handler.clone(), format!("default {concept}")));
        Ok(true)
    }
}

/// The processors every composer starts with.
#[must_use]
pub fn builtin() -> Vec<Arc<dyn MethodProcessor>> {
    vec![
        Arc::new(BehaviourProcessor::default()),
        Arc::new(PropertyProcessor::default()),
        Arc::new(DefaultProcessor::default()),
    ]
}

fn accessor(property: PropertyDecl, access: Access) -> Handler {
    match access {
        Access::Get => Arc::new(move |msg: &Message<'_>| read_property(msg, &property)),
        Access::Set => Arc::new(move |msg: &Message<'_>| -> Result<Value> {
            write_property(msg, &property, msg.arg(0)?)?;
            Ok(Value::Null)
        }),
    }
}

fn locale(msg: &Message<'_>) -> Option<String> {
    msg.collaborator::<Locale>()
        .map(|locale| locale.as_str().to_owned())
}

fn read_property(msg: &Message<'_>, property: &PropertyDecl) -> Result<Value> {
    let manager = msg.manager();
    let subject = msg.target().resource();
    let range = property.range_kind();
    match property.layout() {
        PropertyLayout::Functional => {
            let values =
                manager
                    .properties()
                    .values(subject, property.predicate(), range, property.datatype_node())?;
            match values.get_single()? {
                Some(value) => resolve(msg, value, range),
                None => Ok(Value::Null),
            }
        }
        PropertyLayout::Collection => {
            let values =
                manager
                    .properties()
                    .values(subject, property.predicate(), range, property.datatype_node())?;
            values
                .get_all()?
                .into_iter()
                .map(|value| resolve(msg, value, range))
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        }
        PropertyLayout::Ordered => {
            let list = manager
                .properties()
                .ordered::<Resource>(subject, property.predicate(), range)?;
            list.to_vec()?
                .into_iter()
                .map(|resource| resolve(msg, resource.into(), range))
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        }
        PropertyLayout::Localized => {
            let texts = manager.properties().localized(
                subject,
                property.predicate(),
                locale(msg).as_deref(),
            )?;
            Ok(texts.get_single()?.map_or(Value::Null, Value::Text))
        }
    }
}

/// Turns resources read for an entity range into entities.
fn resolve(msg: &Message<'_>, value: Value, range: &ValueKind) -> Result<Value> {
    let ValueKind::Entity(concept) = range else {
        return Ok(value);
    };
    let Some(resource) = value.as_resource() else {
        return Ok(value);
    };
    let manager = msg.manager();
    let entity = match concept {
        Some(concept) => manager.find_as(&resource, concept)?,
        None => manager.find(&resource)?,
    };
    Ok(Value::Entity(entity))
}

fn write_property(msg: &Message<'_>, property: &PropertyDecl, value: &Value) -> Result<()> {
    let manager = msg.manager();
    let subject = msg.target().resource();
    let range = property.range_kind();
    match property.layout() {
        PropertyLayout::Functional => {
            let values =
                manager
                    .properties()
                    .values(subject, property.predicate(), range, property.datatype_node())?;
            values.set_single(Some(value.clone()).filter(|value| !value.is_null()))
        }
        PropertyLayout::Collection => {
            let values =
                manager
                    .properties()
                    .values(subject, property.predicate(), range, property.datatype_node())?;
            values.set_all(elements(property, value)?.to_vec())
        }
        PropertyLayout::Ordered => {
            let list = manager
                .properties()
                .ordered::<Resource>(subject, property.predicate(), range)?;
            let resources = elements(property, value)?
                .iter()
                .map(|element| {
                    element
                        .as_resource()
                        .ok_or_else(|| Error::conversion(element, "resource"))
                })
                .collect::<Result<Vec<_>>>()?;
            list.set_all(resources)
        }
        PropertyLayout::Localized => {
            let texts = manager.properties().localized(
                subject,
                property.predicate(),
                locale(msg).as_deref(),
            )?;
            match value {
                Value::Null => texts.set_single(None),
                Value::Text(text) => texts.set_single(Some(text.clone())),
                other => Err(Error::conversion(other, "text")),
            }
        }
    }
}

fn elements<'v>(property: &PropertyDecl, value: &'v Value) -> Result<&'v [Value]> {
    match value {
        Value::Null => Ok(&[]),
        Value::List(values) => Ok(values),
        other => Err(Error::InvalidArgument(format!(
            "`{}` expects a list, got {}",
            property.name(),
            other.type_name()
        ))),
    }
}
