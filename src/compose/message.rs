//! Invocation messages.
//!
//! Every call on an entity walks the chain of its method table: sub-message
//! behaviours, then implementing behaviours, then the base behaviour. A
//! [`Message`] is a cursor into that chain. [`Message::proceed`] runs the next
//! link and returns its result; a handler that returns without proceeding
//! short-circuits the rest of the chain. Proceeding past the last link yields
//! [`Value::Null`].

use std::{
    any::{type_name, Any},
    sync::{Arc, PoisonError},
};

use super::{class::MethodTable, concept::Signature};
use crate::{
    model::Value,
    object::{Entity, ObjectManager},
    Error, Result,
};

/// Body of a chain link.
pub type Handler = Arc<dyn Fn(&Message<'_>) -> Result<Value> + Send + Sync>;

/// One invocation in flight: target, method, arguments and chain position.
pub struct Message<'a> {
    target: &'a Entity,
    method: &'a MethodTable,
    args: &'a [Value],
    position: usize,
}

impl<'a> Message<'a> {
    /// Runs the chain of `method` on `target` from its first link.
    pub(crate) fn dispatch(target: &'a Entity, method: &'a MethodTable, args: &'a [Value]) -> Result<Value> {
        if method.entries().is_empty() {
            return Err(Error::Unimplemented {
                class: target.class().name(),
                method: method.signature().to_string(),
            });
        }
        tracing::trace!(resource = %target.resource(), method = %method.signature(), "dispatching");
        Message {
            target,
            method,
            args,
            position: 0,
        }
        .run()
    }

    fn run(&self) -> Result<Value> {
        match self.method.entries().get(self.position) {
            Some(entry) => (entry.handler())(self),
            None => Ok(Value::Null),
        }
    }

    /// Invokes the rest of the chain with the same arguments.
    pub fn proceed(&self) -> Result<Value> {
        Message {
            target: self.target,
            method: self.method,
            args: self.args,
            position: self.position + 1,
        }
        .run()
    }

    /// Invokes the rest of the chain with replaced arguments.
    pub fn proceed_with(&self, args: Vec<Value>) -> Result<Value> {
        Message {
            target: self.target,
            method: self.method,
            args: &args,
            position: self.position + 1,
        }
        .run()
    }

    #[must_use]
    pub fn target(&self) -> &'a Entity {
        self.target
    }

    #[must_use]
    pub fn manager(&self) -> &'a ObjectManager {
        self.target.manager()
    }

    #[must_use]
    pub fn signature(&self) -> &'a Signature {
        self.method.signature()
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// Argument at `index`, or an error naming the method.
    pub fn arg(&self, index: usize) -> Result<&Value> {
        self.args.get(index).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{} has no argument at position {index}",
                self.method.signature()
            ))
        })
    }

    /// Position of the running link within the chain.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether no link follows the running one.
    #[must_use]
    pub fn is_last(&self) -> bool {
        self.position + 1 >= self.method.entries().len()
    }

    /// Runs `f` on the state of the behaviour owning the running link.
    ///
    /// Fails when the link is not owned by a behaviour or when the state has
    /// another type.
    pub fn state<T, R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: Any + Send,
    {
        let entry = &self.method.entries()[self.position];
        let state_error = || Error::StateType {
            behaviour: entry.origin().to_owned(),
            expected: type_name::<T>(),
        };
        let slot = entry
            .slot()
            .and_then(|slot| self.target.slot(slot))
            .ok_or_else(state_error)?;
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let state: &mut (dyn Any + Send) = &mut **guard;
        state.downcast_mut::<T>().map(f).ok_or_else(state_error)
    }

    /// A collaborator provided by the session's injector.
    #[must_use]
    pub fn collaborator<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.target.manager().injector().get::<T>()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use crate::{
        compose::{Behaviour, Composer, Concept, Signature},
        model::{Value, ValueKind},
        object::ObjectManager,
        store::MemoryStore,
        Error,
    };

    fn manager(composer: Composer) -> ObjectManager {
        ObjectManager::new(Arc::new(composer), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn proceeding_past_the_end_yields_null() {
        let composer = Composer::new();
        composer.mapper().add_concept(
            Concept::builder("Echo")
                .rdf_type("urn:test:Echo")
                .method(Signature::new("echo").param(ValueKind::Any).returns(ValueKind::Any))
                .build(),
            None,
        );
        composer.mapper().add_behaviour(
            Behaviour::builder("EchoLast")
                .implements("Echo")
                .method("echo", |msg| {
                    assert!(msg.is_last());
                    let rest = msg.proceed()?;
                    assert_eq!(rest, Value::Null);
                    Ok(msg.arg(0)?.clone())
                })
                .build(),
            None,
        );

        let manager = manager(composer);
        let entity = manager
            .create_object(manager.blank(), &["urn:test:Echo".into()], &[])
            .expect("entity");
        assert_eq!(entity.invoke("echo", &[Value::from(7)]).expect("echo"), Value::Integer(7));
    }

    #[test]
    fn proceed_with_replaces_arguments() {
        let composer = Composer::new();
        composer.mapper().add_concept(
            Concept::builder("Doubler")
                .method(Signature::new("apply").param(ValueKind::Integer).returns(ValueKind::Integer))
                .build(),
            Some("urn:test:Doubler".into()),
        );
        composer.mapper().add_behaviour(
            Behaviour::builder("DoubleArgument")
                .implements("Doubler")
                .precedes("ReturnArgument")
                .method("apply", |msg| {
                    let value = msg.arg(0)?.as_integer().unwrap_or_default();
                    msg.proceed_with(vec![Value::Integer(value * 2)])
                })
                .build(),
            None,
        );
        composer.mapper().add_behaviour(
            Behaviour::builder("ReturnArgument")
                .implements("Doubler")
                .method("apply", |msg| Ok(msg.arg(0)?.clone()))
                .build(),
            None,
        );

        let manager = manager(composer);
        let entity = manager
            .create_object(manager.blank(), &["urn:test:Doubler".into()], &[])
            .expect("entity");
        assert_eq!(entity.invoke("apply", &[Value::from(21)]).expect("apply"), Value::Integer(42));
    }

    #[test]
    fn state_is_scoped_to_its_behaviour() {
        let calls = Arc::new(AtomicUsize::new(0));
        let composer = Composer::new();
        composer.mapper().add_concept(
            Concept::builder("Tally")
                .method(Signature::new("bump").returns(ValueKind::Integer))
                .build(),
            Some("urn:test:Tally".into()),
        );
        let counted = calls.clone();
        composer.mapper().add_behaviour(
            Behaviour::builder("TallyCount")
                .implements("Tally")
                .state(|| 0_i64)
                .method("bump", move |msg| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    assert!(msg.state(|_: &mut String| ()).is_err());
                    msg.state(|count: &mut i64| {
                        *count += 1;
                        Value::Integer(*count)
                    })
                })
                .build(),
            None,
        );

        let manager = manager(composer);
        let first = manager
            .create_object(manager.blank(), &["urn:test:Tally".into()], &[])
            .expect("entity");
        let second = manager
            .create_object(manager.blank(), &["urn:test:Tally".into()], &[])
            .expect("entity");
        assert_eq!(first.invoke("bump", &[]).expect("bump"), Value::Integer(1));
        assert_eq!(first.invoke("bump", &[]).expect("bump"), Value::Integer(2));
        assert_eq!(second.invoke("bump", &[]).expect("bump"), Value::Integer(1));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn unimplemented_methods_fail_on_invocation() {
        let composer = Composer::new();
        composer.mapper().add_concept(
            Concept::builder("Abstract")
                .method(Signature::new("missing"))
                .build(),
            Some("urn:test:Abstract".into()),
        );
        let manager = manager(composer);
        let entity = manager
            .create_object(manager.blank(), &["urn:test:Abstract".into()], &[])
            .expect("entity");
        assert!(matches!(
            entity.invoke("missing", &[]),
            Err(Error::Unimplemented { .. })
        ));
        assert!(matches!(
            entity.invoke("absent", &[]),
            Err(Error::UnknownMethod { .. })
        ));
    }
}
