//! Linear extensions of partial orders.
//!
//! [`LinearExtension`] is the single topological sort used by the crate:
//! behaviours, method processors and concepts are ordered with it at
//! composition time, and ordered property sets rebuild their element order
//! with it on every read. Elements that are ready at the same time come out in
//! input order, so the result is deterministic.
//!
//! An edge that would close a cycle is never added. [`linearize`] applies the
//! configured [`CyclePolicy`] to such edges: drop and log them, or fail.

use std::{
    collections::{BTreeSet, HashMap},
    hash::Hash,
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// What to do with an ordering edge that would close a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Keep the edges added so far and skip the closing one.
    #[default]
    DropEdge,
    /// Fail with [`Error::OrderingCycle`].
    Reject,
}

/// Registration-time ordering metadata of a behaviour or a processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderingConstraints {
    /// Names that must be ordered before the owner.
    pub depends_on: Vec<String>,
    /// Names that must be ordered after the owner.
    pub precedes: Vec<String>,
}

impl OrderingConstraints {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    #[must_use]
    pub fn precedes(mut self, name: impl Into<String>) -> Self {
        self.precedes.push(name.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.depends_on.is_empty() && self.precedes.is_empty()
    }
}

/// Result of [`LinearExtension::add_edge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Added,
    /// The edge was already present.
    Duplicate,
    /// One of the endpoints is not an element of the extension.
    Ignored,
    /// The edge would close a cycle (self edges included) and was skipped.
    Dropped,
}

/// A set of elements plus "before" edges that is sorted into a total order.
#[derive(Debug, Clone)]
pub struct LinearExtension<T> {
    items: Vec<T>,
    index: HashMap<T, usize>,
    successors: Vec<BTreeSet<usize>>,
    dropped: Vec<(T, T)>,
}

impl<T: Clone + Eq + Hash> LinearExtension<T> {
    /// Creates an extension over `items`; repeated items keep their first
    /// position.
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let mut extension = Self {
            items: Vec::new(),
            index: HashMap::new(),
            successors: Vec::new(),
            dropped: Vec::new(),
        };
        for item in items {
            if !extension.index.contains_key(&item) {
                extension.index.insert(item.clone(), extension.items.len());
                extension.items.push(item);
                extension.successors.push(BTreeSet::new());
            }
        }
        extension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.index.contains_key(item)
    }

    /// Declares that `before` must come before `after`.
    pub fn add_edge(&mut self, before: &T, after: &T) -> EdgeOutcome {
        let (Some(&from), Some(&to)) = (self.index.get(before), self.index.get(after)) else {
            return EdgeOutcome::Ignored;
        };
        if self.successors[from].contains(&to) {
            return EdgeOutcome::Duplicate;
        }
        if from == to || self.reaches(to, from) {
            self.dropped.push((before.clone(), after.clone()));
            return EdgeOutcome::Dropped;
        }
        self.successors[from].insert(to);
        EdgeOutcome::Added
    }

    /// Edges skipped because they would have closed a cycle.
    #[must_use]
    pub fn dropped_edges(&self) -> &[(T, T)] {
        &self.dropped
    }

    /// Returns the elements in an order consistent with every added edge.
    #[must_use]
    pub fn sort(&self) -> Vec<T> {
        let mut in_degree = vec![0_usize; self.items.len()];
        for successors in &self.successors {
            for &successor in successors {
                in_degree[successor] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(position, _)| position)
            .collect();
        let mut sorted = Vec::with_capacity(self.items.len());

        while let Some(current) = ready.pop_first() {
            sorted.push(self.items[current].clone());
            for &successor in &self.successors[current] {
                in_degree[successor] -= 1;
                if in_degree[successor] == 0 {
                    ready.insert(successor);
                }
            }
        }

        sorted
    }

    fn reaches(&self, start: usize, target: usize) -> bool {
        let mut visited = vec![false; self.items.len()];
        let mut to_visit = vec![start];
        while let Some(current) = to_visit.pop() {
            if current == target {
                return true;
            }
            if std::mem::replace(&mut visited[current], true) {
                continue;
            }
            to_visit.extend(self.successors[current].iter().copied());
        }
        false
    }
}

/// Orders named items by their [`OrderingConstraints`].
///
/// `depends_on` names are placed before the owner and `precedes` names after
/// it. Names that are not among `items` are ignored. Ties keep input order.
pub fn linearize<T, N, C>(
    items: Vec<T>,
    name_of: N,
    constraints_of: C,
    policy: CyclePolicy,
) -> Result<Vec<T>>
where
    N: Fn(&T) -> &str,
    C: Fn(&T) -> &OrderingConstraints,
{
    let names: HashMap<&str, usize> = items
        .iter()
        .enumerate()
        .map(|(position, item)| (name_of(item), position))
        .collect();
    let mut extension = LinearExtension::new(0..items.len());

    for (position, item) in items.iter().enumerate() {
        let constraints = constraints_of(item);
        let edges = constraints
            .depends_on
            .iter()
            .filter_map(|name| names.get(name.as_str()).map(|&other| (other, position)))
            .chain(
                constraints
                    .precedes
                    .iter()
                    .filter_map(|name| names.get(name.as_str()).map(|&other| (position, other))),
            );
        for (before, after) in edges {
            if extension.add_edge(&before, &after) == EdgeOutcome::Dropped {
                let before = name_of(&items[before]).to_owned();
                let after = name_of(&items[after]).to_owned();
                match policy {
                    CyclePolicy::DropEdge => {
                        tracing::warn!(%before, %after, "dropping ordering edge that closes a cycle");
                    }
                    CyclePolicy::Reject => return Err(Error::OrderingCycle { before, after }),
                }
            }
        }
    }

    let order = extension.sort();
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|position| slots[position].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{linearize, CyclePolicy, EdgeOutcome, LinearExtension, OrderingConstraints};
    use crate::Error;

    #[test]
    fn sorts_consistently_with_edges() {
        let mut extension = LinearExtension::new(["c", "b", "a"]);
        assert_eq!(extension.add_edge(&"a", &"b"), EdgeOutcome::Added);
        assert_eq!(extension.add_edge(&"b", &"c"), EdgeOutcome::Added);
        assert_eq!(extension.sort(), vec!["a", "b", "c"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let mut extension = LinearExtension::new(["x", "y", "z", "w"]);
        extension.add_edge(&"w", &"y");
        assert_eq!(extension.sort(), vec!["x", "z", "w", "y"]);
    }

    #[rstest]
    #[case::back_edge(vec![("a", "b"), ("b", "c"), ("c", "a")], vec!["a", "b", "c"])]
    #[case::two_cycle(vec![("b", "a"), ("a", "b")], vec!["b", "a", "c"])]
    #[case::self_edge(vec![("c", "c"), ("c", "a")], vec!["b", "c", "a"])]
    fn drops_edges_closing_cycles(
        #[case] edges: Vec<(&'static str, &'static str)>,
        #[case] expected: Vec<&'static str>,
    ) {
        let mut extension = LinearExtension::new(["a", "b", "c"]);
        for (before, after) in &edges {
            extension.add_edge(before, after);
        }
        assert_eq!(extension.dropped_edges().len(), 1);
        assert_eq!(extension.sort(), expected);
    }

    #[test]
    fn ignores_unknown_elements_and_duplicates() {
        let mut extension = LinearExtension::new([1, 2, 2, 3]);
        assert_eq!(extension.len(), 3);
        assert_eq!(extension.add_edge(&4, &1), EdgeOutcome::Ignored);
        assert_eq!(extension.add_edge(&3, &1), EdgeOutcome::Added);
        assert_eq!(extension.add_edge(&3, &1), EdgeOutcome::Duplicate);
        assert_eq!(extension.sort(), vec![2, 3, 1]);
    }

    #[derive(Debug)]
    struct Named(&'static str, OrderingConstraints);

    fn names(items: &[Named]) -> Vec<&'static str> {
        items.iter().map(|item| item.0).collect()
    }

    #[test]
    fn linearizes_by_constraints() {
        let items = vec![
            Named("logging", OrderingConstraints::new().depends_on("security")),
            Named("security", OrderingConstraints::new()),
            Named("cache", OrderingConstraints::new().precedes("security")),
            Named("unrelated", OrderingConstraints::new().depends_on("missing")),
        ];
        let sorted = linearize(items, |item| item.0, |item| &item.1, CyclePolicy::DropEdge)
            .expect("sorted");
        assert_eq!(names(&sorted), vec!["cache", "security", "logging", "unrelated"]);
    }

    #[test]
    fn reject_policy_reports_the_cycle() {
        let items = vec![
            Named("a", OrderingConstraints::new().depends_on("b")),
            Named("b", OrderingConstraints::new().depends_on("a")),
        ];
        let err = linearize(items, |item| item.0, |item| &item.1, CyclePolicy::Reject)
            .expect_err("cycle");
        assert!(matches!(err, Error::OrderingCycle { before, after } if before == "a" && after == "b"));
    }

    #[test]
    fn drop_policy_keeps_the_first_edge() {
        let items = vec![
            Named("a", OrderingConstraints::new().depends_on("b")),
            Named("b", OrderingConstraints::new().depends_on("a")),
        ];
        let sorted = linearize(items, |item| item.0, |item| &item.1, CyclePolicy::DropEdge)
            .expect("sorted");
        assert_eq!(names(&sorted), vec!["b", "a"]);
    }
}
