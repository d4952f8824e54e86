//! Language-aware text properties.
//!
//! Reads return the literals that best match a locale, scored by [`score`].
//! All literals sharing the top score are returned; negatively scored ones
//! only when nothing else is available.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use oxrdf::{Literal, NamedNode, Term};

use super::{CachedPropertySet, PropertySet, Refresh};
use crate::{model::Resource, Error, Result};

/// How well a literal language tag fits a requested locale.
///
/// | tag                                     | score        |
/// |-----------------------------------------|--------------|
/// | equal to the locale                     | `i32::MAX`   |
/// | prefix of the locale (`en` for `en-us`) | tag length   |
/// | same two-letter primary language        | 1            |
/// | `en`                                    | 1            |
/// | none                                    | 0            |
/// | anything else                           | -1           |
#[must_use]
pub fn score(locale: &str, language: Option<&str>) -> i32 {
    let Some(language) = language.filter(|language| !language.is_empty()) else {
        return 0;
    };
    let locale = locale.to_ascii_lowercase();
    let language = language.to_ascii_lowercase();
    if language == locale {
        return i32::MAX;
    }
    if locale
        .strip_prefix(language.as_str())
        .is_some_and(|rest| rest.starts_with('-'))
    {
        return i32::try_from(language.len()).unwrap_or(i32::MAX - 1);
    }
    let primary = |tag: &str| tag.split('-').next().unwrap_or_default().to_owned();
    let shared = primary(&language);
    if shared.len() == 2 && shared == primary(&locale) {
        return 1;
    }
    if language == "en" {
        return 1;
    }
    -1
}

/// The literals of `literals` that best match `locale`.
#[must_use]
pub fn best_match(locale: &str, literals: Vec<Literal>) -> Vec<Literal> {
    let scored: Vec<(i32, Literal)> = literals
        .into_iter()
        .map(|literal| (score(locale, literal.language()), literal))
        .collect();
    let Some(best) = scored.iter().map(|(score, _)| *score).max() else {
        return Vec::new();
    };
    scored
        .into_iter()
        .filter(|(score, _)| *score == best)
        .map(|(_, literal)| literal)
        .collect()
}

pub struct LocalizedPropertySet {
    values: CachedPropertySet<Term>,
    locale: String,
    by_locale: Mutex<HashMap<String, Vec<Literal>>>,
}

impl LocalizedPropertySet {
    #[must_use]
    pub fn new(values: CachedPropertySet<Term>, locale: impl Into<String>) -> Self {
        Self {
            values,
            locale: locale.into().to_ascii_lowercase(),
            by_locale: Mutex::new(HashMap::new()),
        }
    }

    /// Locale used by reads and writes without an explicit locale.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    #[must_use]
    pub fn subject(&self) -> &Resource {
        self.values.subject()
    }

    #[must_use]
    pub fn predicate(&self) -> &NamedNode {
        self.values.predicate()
    }

    fn by_locale(&self) -> MutexGuard<'_, HashMap<String, Vec<Literal>>> {
        self.by_locale.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Best matching literals for `locale`.
    pub fn for_locale(&self, locale: &str) -> Result<Vec<Literal>> {
        let locale = locale.to_ascii_lowercase();
        if let Some(literals) = self.by_locale().get(&locale) {
            return Ok(literals.clone());
        }
        let literals = self
            .values
            .get_all()?
            .into_iter()
            .filter_map(|term| match term {
                Term::Literal(literal) => Some(literal),
                _ => None,
            })
            .collect();
        let best = best_match(&locale, literals);
        self.by_locale().insert(locale, best.clone());
        Ok(best)
    }

    /// Texts best matching the session locale.
    pub fn get_all(&self) -> Result<Vec<String>> {
        Ok(self
            .for_locale(&self.locale)?
            .into_iter()
            .map(|literal| literal.value().to_owned())
            .collect())
    }

    pub fn get_single(&self) -> Result<Option<String>> {
        Ok(self.get_all()?.into_iter().next())
    }

    /// Replaces the texts tagged with the session locale.
    ///
    /// Texts in other languages are kept; `None` only removes.
    pub fn set_single(&self, text: Option<String>) -> Result<()> {
        let replacement = text.map(|text| self.literal(&text)).transpose()?;
        let locale = self.locale.clone();
        let result = self.values.mutate(|store| {
            let subject = self.values.subject();
            let predicate = self.values.predicate();
            for term in store.objects(subject, predicate)? {
                let in_locale = matches!(
                    &term,
                    Term::Literal(literal) if literal
                        .language()
                        .is_some_and(|language| language.eq_ignore_ascii_case(&locale))
                );
                if in_locale {
                    store.remove(subject, predicate, &term)?;
                }
            }
            if let Some(literal) = &replacement {
                store.add(subject, predicate, &Term::from(literal.clone()))?;
            }
            Ok(())
        });
        self.by_locale().clear();
        result
    }

    /// Adds a text tagged with the session locale.
    pub fn add(&self, text: &str) -> Result<bool> {
        let literal = self.literal(text)?;
        let result = self.values.add(literal.into());
        self.by_locale().clear();
        result
    }

    pub fn remove(&self, text: &str) -> Result<bool> {
        let literal = self.literal(text)?;
        let result = self.values.remove(&literal.into());
        self.by_locale().clear();
        result
    }

    pub fn refresh(&self) {
        self.by_locale().clear();
        self.values.refresh();
    }

    fn literal(&self, text: &str) -> Result<Literal> {
        Literal::new_language_tagged_literal(text, self.locale.as_str())
            .map_err(|err| Error::InvalidArgument(format!("locale {}: {err}", self.locale)))
    }
}

impl Refresh for LocalizedPropertySet {
    fn invalidate(&self) {
        LocalizedPropertySet::refresh(self);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use oxrdf::{Literal, NamedNode};
    use rstest::rstest;

    use super::{best_match, score, LocalizedPropertySet};
    use crate::{
        model::{LiteralManager, Resource},
        property::CachedPropertySet,
        store::MemoryStore,
    };

    #[rstest]
    #[case("en-us", Some("en-US"), i32::MAX)]
    #[case("en-us", Some("en"), 2)]
    #[case("fr-ca", Some("fr-fr"), 1)]
    #[case("fr", Some("en"), 1)]
    #[case("fr", None, 0)]
    #[case("fr", Some("de"), -1)]
    fn scores_language_tags(#[case] locale: &str, #[case] tag: Option<&str>, #[case] expected: i32) {
        assert_eq!(score(locale, tag), expected);
    }

    fn literals() -> Vec<Literal> {
        vec![
            Literal::new_language_tagged_literal("colour", "en").expect("tag"),
            Literal::new_language_tagged_literal("color", "en-US").expect("tag"),
            Literal::new_simple_literal("kleur"),
        ]
    }

    fn values(literals: Vec<Literal>) -> Vec<String> {
        literals
            .into_iter()
            .map(|literal| literal.value().to_owned())
            .collect()
    }

    #[rstest]
    #[case("en-US", vec!["color"])]
    #[case("fr", vec!["colour"])]
    #[case("en-GB", vec!["colour"])]
    fn picks_the_best_match(#[case] locale: &str, #[case] expected: Vec<&str>) {
        assert_eq!(values(best_match(locale, literals())), expected);
    }

    #[test]
    fn negative_scores_only_without_alternatives() {
        let german = vec![Literal::new_language_tagged_literal("Farbe", "de").expect("tag")];
        assert_eq!(values(best_match("fr", german)), vec!["Farbe"]);
        assert!(best_match("fr", Vec::new()).is_empty());
    }

    #[test]
    fn writes_in_the_session_locale() {
        let store = Arc::new(MemoryStore::new());
        let values = CachedPropertySet::new(
            Resource::iri("urn:test:s").expect("iri"),
            NamedNode::new("urn:test:label").expect("iri"),
            store,
            Arc::new(LiteralManager::new()),
            10,
        );
        let labels = LocalizedPropertySet::new(values, "fr");
        labels.add("rouge").expect("add");
        assert_eq!(labels.get_single().expect("read"), Some("rouge".to_owned()));

        labels.set_single(Some("rouge vif".to_owned())).expect("set");
        assert_eq!(labels.get_all().expect("read"), vec!["rouge vif".to_owned()]);
        assert!(labels.remove("rouge vif").expect("remove"));
        assert_eq!(labels.get_single().expect("read"), None);
    }
}
