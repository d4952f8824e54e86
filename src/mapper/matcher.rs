//! Pattern bindings: roles bound to a family of resources rather than to one
//! type key.
//!
//! * `*` matches every key.
//! * `prefix*` matches keys starting with `prefix`.
//! * `/path` and `/path*` match against the path part of an IRI. A path with
//!   a trailing slash also matches the exact rule without it, while sub-path
//!   rules (`/path/*`) only match below the slash.
//! * Any other use of `*` is a wildcard over the whole key (or path).

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use super::Role;
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct RoleMatcher {
    prefixes: Vec<(String, Role)>,
    paths: BTreeMap<String, BTreeSet<Role>>,
    path_prefixes: Vec<(String, Role)>,
    wildcards: Vec<(Regex, bool, Role)>,
}

impl RoleMatcher {
    /// Whether `key` is handled by a matcher rather than an exact lookup.
    #[must_use]
    pub fn is_pattern(key: &str) -> bool {
        key.contains('*') || key.starts_with('/')
    }

    pub fn add(&mut self, pattern: &str, role: Role) -> Result<()> {
        let on_path = pattern.starts_with('/');
        let stars = pattern.matches('*').count();
        if stars == 0 {
            self.paths
                .entry(pattern.to_owned())
                .or_default()
                .insert(role);
        } else if stars == 1 && pattern.ends_with('*') {
            let prefix = pattern[..pattern.len() - 1].to_owned();
            if on_path {
                self.path_prefixes.push((prefix, role));
            } else {
                self.prefixes.push((prefix, role));
            }
        } else {
            let expression = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            let regex = Regex::new(&format!("^{expression}$"))
                .map_err(|err| Error::InvalidArgument(format!("pattern {pattern}: {err}")))?;
            self.wildcards.push((regex, on_path, role));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
            && self.paths.is_empty()
            && self.path_prefixes.is_empty()
            && self.wildcards.is_empty()
    }

    /// Adds every role whose pattern matches `key` to `into`.
    pub fn find(&self, key: &str, into: &mut BTreeSet<Role>) {
        into.extend(
            self.prefixes
                .iter()
                .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
                .map(|(_, role)| role.clone()),
        );

        let path = path_of(key);
        if let Some(path) = path {
            if let Some(roles) = self.paths.get(path) {
                into.extend(roles.iter().cloned());
            }
            let trimmed = path.trim_end_matches('/');
            if trimmed != path && !trimmed.is_empty() {
                if let Some(roles) = self.paths.get(trimmed) {
                    into.extend(roles.iter().cloned());
                }
            }
            into.extend(
                self.path_prefixes
                    .iter()
                    .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
                    .map(|(_, role)| role.clone()),
            );
        }

        for (regex, on_path, role) in &self.wildcards {
            let subject = if *on_path { path } else { Some(key) };
            if subject.is_some_and(|subject| regex.is_match(subject)) {
                into.insert(role.clone());
            }
        }
    }
}

/// Path part of an IRI with an authority, or the key itself when it already
/// is a path.
fn path_of(key: &str) -> Option<&str> {
    if key.starts_with('/') {
        return Some(key);
    }
    let (_, rest) = key.split_once("://")?;
    let start = rest.find('/')?;
    let path = &rest[start..];
    let end = path.find(['?', '#']).unwrap_or(path.len());
    Some(&path[..end])
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rstest::rstest;

    use super::{path_of, RoleMatcher};
    use crate::mapper::Role;

    fn matcher() -> RoleMatcher {
        let mut matcher = RoleMatcher::default();
        for (pattern, name) in [
            ("/path", "Exact"),
            ("/path/*", "Sub"),
            ("/path*", "Starts"),
            ("urn:test:*", "Test"),
            ("*", "Anything"),
            ("http://*.example.org/*.ttl", "Turtle"),
        ] {
            matcher.add(pattern, Role::concept(name)).expect("pattern");
        }
        matcher
    }

    fn names(key: &str) -> Vec<String> {
        let mut roles = BTreeSet::new();
        matcher().find(key, &mut roles);
        roles
            .into_iter()
            .map(|role| role.name().to_owned())
            .collect()
    }

    #[rstest]
    #[case("http://example.com/path", vec!["Anything", "Exact", "Starts"])]
    #[case("http://example.com/path/", vec!["Anything", "Exact", "Starts", "Sub"])]
    #[case("http://example.com/path/child", vec!["Anything", "Starts", "Sub"])]
    #[case("http://example.com/pathology", vec!["Anything", "Starts"])]
    #[case("urn:test:Person", vec!["Anything", "Test"])]
    #[case("http://data.example.org/dump.ttl", vec!["Anything", "Turtle"])]
    fn matches_patterns(#[case] key: &str, #[case] expected: Vec<&str>) {
        assert_eq!(names(key), expected);
    }

    #[test]
    fn extracts_paths() {
        assert_eq!(path_of("http://example.com/a/b?q=1"), Some("/a/b"));
        assert_eq!(path_of("http://example.com/a#frag"), Some("/a"));
        assert_eq!(path_of("http://example.com"), None);
        assert_eq!(path_of("urn:test:x"), None);
        assert_eq!(path_of("/local"), Some("/local"));
    }

    #[test]
    fn recognizes_patterns() {
        assert!(RoleMatcher::is_pattern("*"));
        assert!(RoleMatcher::is_pattern("/path"));
        assert!(!RoleMatcher::is_pattern("urn:test:Person"));
    }
}
