use std::sync::Mutex;

use super::{Entity, ObjectManager};
use crate::{
    model::{Resource, TypeKey},
    Error, Result,
};

/// Instantiates composed classes for a session.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectFactory;

impl ObjectFactory {
    /// Creates the entity of `resource` with the roles of `keys`, the pattern
    /// roles of its IRI and the explicitly requested `concepts`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownConcept`] for an unregistered requested concept,
    /// [`Error::MissingCollaborator`] when a behaviour requires a collaborator
    /// the injector does not provide, and every composition error.
    pub fn create_object(
        &self,
        manager: &ObjectManager,
        resource: Resource,
        keys: &[TypeKey],
        concepts: &[&str],
    ) -> Result<Entity> {
        let composer = manager.composer();
        let role = composer.resolve_for(&resource, keys, concepts)?;
        let class = composer.implement(&role)?;
        let injector = manager.injector();

        let mut slots = Vec::with_capacity(role.behaviours().len());
        for behaviour in role.behaviours() {
            if let Some(missing) = behaviour
                .requires()
                .iter()
                .find(|requirement| !injector.contains(requirement.type_id))
            {
                return Err(Error::MissingCollaborator {
                    behaviour: behaviour.name().to_owned(),
                    collaborator: missing.type_name,
                });
            }
            slots.push(Mutex::new(behaviour.init_state(injector)?));
        }

        let entity = Entity::new(resource, class, slots, manager.clone());
        injector.inject_members(&entity)?;
        tracing::trace!(resource = %entity.resource(), class = %entity.class().name(), "created object");
        Ok(entity)
    }
}
