//! Derived view of the registrations used to answer role lookups.
//!
//! The index is rebuilt from the complete set of registrations whenever it is
//! stale, so the answer to a lookup never depends on the order in which
//! concepts, behaviours, annotations and subtype links were registered.

use std::collections::{BTreeMap, BTreeSet};

use super::{matcher::RoleMatcher, AnnotationKind, Registrations, Role};
use crate::{model::TypeKey, ordering::OrderingConstraints, Result};

#[derive(Debug, Default)]
pub struct RoleIndex {
    bindings: BTreeMap<TypeKey, BTreeSet<Role>>,
    super_keys: BTreeMap<TypeKey, BTreeSet<TypeKey>>,
    concept_keys: BTreeMap<String, BTreeSet<TypeKey>>,
    supertypes: BTreeMap<String, Vec<String>>,
    implementors: BTreeMap<String, BTreeSet<String>>,
    constraints: BTreeMap<String, OrderingConstraints>,
    matcher: RoleMatcher,
}

impl RoleIndex {
    pub(super) fn build(registrations: &Registrations) -> Result<Self> {
        let mut index = Self::default();

        for (key, roles) in &registrations.bindings {
            for role in roles {
                index.bind(key, role)?;
            }
        }

        // annotation-derived keys and ordering
        for behaviour in registrations.behaviours.values() {
            let role = Role::Behaviour(behaviour.name().to_owned());
            let mut constraints = behaviour.constraints().clone();
            for (annotation, values) in behaviour.annotations() {
                match registrations.annotations.get(annotation) {
                    Some(AnnotationKind::Precedes) => {
                        constraints.precedes.extend(values.iter().cloned());
                    }
                    Some(AnnotationKind::DependsOn) => {
                        constraints.depends_on.extend(values.iter().cloned());
                    }
                    Some(AnnotationKind::Marker) => {
                        for value in values {
                            index.bind(&TypeKey::from(value.as_str()), &role)?;
                        }
                    }
                    None => {}
                }
            }
            index
                .constraints
                .insert(behaviour.name().to_owned(), constraints);
            for concept in behaviour.implements() {
                index
                    .implementors
                    .entry(concept.clone())
                    .or_default()
                    .insert(behaviour.name().to_owned());
            }
        }

        for concept in registrations.concepts.values() {
            index
                .supertypes
                .insert(concept.name().to_owned(), concept.supertypes().to_vec());
        }

        for (sub, sups) in &registrations.super_keys {
            index
                .super_keys
                .entry(sub.clone())
                .or_default()
                .extend(sups.iter().cloned());
        }
        let mut derived = Vec::new();
        for (concept, supertypes) in &index.supertypes {
            let Some(sub_keys) = index.concept_keys.get(concept) else {
                continue;
            };
            for supertype in supertypes {
                for super_key in index.concept_keys.get(supertype).into_iter().flatten() {
                    for sub_key in sub_keys {
                        if sub_key != super_key {
                            derived.push((sub_key.clone(), super_key.clone()));
                        }
                    }
                }
            }
        }
        for (sub, sup) in derived {
            index.super_keys.entry(sub).or_default().insert(sup);
        }

        Ok(index)
    }

    fn bind(&mut self, key: &TypeKey, role: &Role) -> Result<()> {
        if key.is_pattern() {
            return self.matcher.add(key.as_str(), role.clone());
        }
        self.bindings
            .entry(key.clone())
            .or_default()
            .insert(role.clone());
        if let Role::Concept(concept) = role {
            self.concept_keys
                .entry(concept.clone())
                .or_default()
                .insert(key.clone());
        }
        Ok(())
    }

    /// `key` and every key it is a subtype of, transitively.
    #[must_use]
    pub fn key_closure(&self, key: &TypeKey) -> BTreeSet<TypeKey> {
        let mut keys = BTreeSet::new();
        let mut pending = vec![key.clone()];
        while let Some(key) = pending.pop() {
            if let Some(supers) = self.super_keys.get(&key) {
                pending.extend(supers.iter().filter(|sup| !keys.contains(*sup)).cloned());
            }
            keys.insert(key);
        }
        keys
    }

    /// Keys registered as direct or indirect subtypes of `key`.
    #[must_use]
    pub fn sub_keys(&self, key: &TypeKey) -> BTreeSet<TypeKey> {
        self.super_keys
            .keys()
            .filter(|sub| *sub != key && self.key_closure(sub).contains(key))
            .cloned()
            .collect()
    }

    pub fn match_patterns(&self, key: &str, into: &mut BTreeSet<Role>) {
        self.matcher.find(key, into);
    }

    /// Closes `roles` under the lookup rules.
    ///
    /// Keys contribute the roles bound to them and to their super keys.
    /// Concepts contribute their supertypes, the keys bound to those
    /// supertypes and every behaviour implementing them.
    #[must_use]
    pub fn close(&self, keys: BTreeSet<TypeKey>, roles: BTreeSet<Role>) -> BTreeSet<Role> {
        let mut seen_keys = BTreeSet::new();
        let mut closed = BTreeSet::new();
        let mut pending_keys: Vec<TypeKey> = keys.into_iter().collect();
        let mut pending_roles: Vec<Role> = roles.into_iter().collect();

        loop {
            if let Some(key) = pending_keys.pop() {
                if !seen_keys.insert(key.clone()) {
                    continue;
                }
                if let Some(supers) = self.super_keys.get(&key) {
                    pending_keys.extend(supers.iter().cloned());
                }
                if let Some(bound) = self.bindings.get(&key) {
                    pending_roles.extend(bound.iter().cloned());
                }
            } else if let Some(role) = pending_roles.pop() {
                if !closed.insert(role.clone()) {
                    continue;
                }
                let Role::Concept(concept) = role else {
                    continue;
                };
                for supertype in self.supertypes.get(&concept).into_iter().flatten() {
                    pending_roles.push(Role::Concept(supertype.clone()));
                    if let Some(keys) = self.concept_keys.get(supertype) {
                        pending_keys.extend(keys.iter().cloned());
                    }
                }
                if let Some(behaviours) = self.implementors.get(&concept) {
                    pending_roles.extend(behaviours.iter().cloned().map(Role::Behaviour));
                }
            } else {
                break;
            }
        }
        closed
    }

    /// Behaviour ordering including registered annotation edges.
    #[must_use]
    pub fn constraints(&self, behaviour: &str) -> Option<&OrderingConstraints> {
        self.constraints.get(behaviour)
    }

    /// Direct supertypes of a registered concept.
    #[must_use]
    pub fn supertypes(&self, concept: &str) -> &[String] {
        self.supertypes.get(concept).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn is_bound(&self, key: &TypeKey) -> bool {
        self.bindings.contains_key(key) || self.super_keys.contains_key(key)
    }
}
