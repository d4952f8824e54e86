//! Collaborator injection.
//!
//! Behaviours declare the collaborator types they need; the session's
//! [`Injector`] provides them as singletons keyed by type.

use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

use dashmap::DashMap;

use super::Entity;
use crate::Result;

pub type Singleton = Arc<dyn Any + Send + Sync>;

pub trait Injector: Send + Sync {
    /// The singleton registered for `type_id`.
    fn singleton(&self, type_id: TypeId) -> Option<Singleton>;

    /// Completes a freshly created entity. Nothing by default.
    ///
    /// # Errors
    ///
    /// Implementations fail when a member cannot be provided.
    fn inject_members(&self, _entity: &Entity) -> Result<()> {
        Ok(())
    }
}

impl<'a> dyn Injector + 'a {
    /// The singleton of type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.singleton(TypeId::of::<T>())?.downcast::<T>().ok()
    }

    #[must_use]
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.singleton(type_id).is_some()
    }
}

/// Map of singletons by type.
#[derive(Default)]
pub struct Collaborators {
    singletons: DashMap<TypeId, Singleton>,
}

impl Collaborators {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` as the singleton of its type.
    #[must_use]
    pub fn provide<T: Any + Send + Sync>(self, value: T) -> Self {
        self.insert(Arc::new(value));
        self
    }

    /// Replaces the singleton of type `T`.
    pub fn insert<T: Any + Send + Sync>(&self, value: Arc<T>) {
        self.singletons.insert(TypeId::of::<T>(), value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.singletons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.singletons.is_empty()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("singletons", &self.singletons.len())
            .finish()
    }
}

impl Injector for Collaborators {
    fn singleton(&self, type_id: TypeId) -> Option<Singleton> {
        self.singletons.get(&type_id).map(|entry| entry.value().clone())
    }
}

/// Locale collaborator: when provided, localized properties are read and
/// written in it instead of the configured locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(String);

impl Locale {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into().to_ascii_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::any::TypeId;

    use super::{Collaborators, Injector, Locale};

    #[test]
    fn provides_singletons_by_type() {
        let collaborators = Collaborators::new().provide(Locale::new("fr-CA")).provide(7_u32);
        let injector: &dyn Injector = &collaborators;
        assert_eq!(injector.get::<Locale>().expect("locale").as_str(), "fr-ca");
        assert_eq!(*injector.get::<u32>().expect("number"), 7);
        assert!(injector.get::<String>().is_none());
        assert!(injector.contains(TypeId::of::<u32>()));
        assert_eq!(collaborators.len(), 2);
    }
}
