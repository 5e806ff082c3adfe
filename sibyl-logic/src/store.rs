//! Timestamped fact storage
//!
//! Facts are `(predicate, args, timestamp)` triples. The store is
//! append-only at a given timestamp, duplicate assertions are idempotent
//! no-ops, and retraction removes exact ground matches. Temporal queries
//! are filters over the timestamp field, not separate storage.

use crate::error::{LogicError, Result};
use serde::{Deserialize, Serialize};
use sibyl_term::{unify_slices, Bindings, Term};
use std::fmt;

/// A timestamped, predicate-shaped datum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub predicate: String,
    pub args: Vec<Term>,
    pub timestamp: u64,
}

impl Fact {
    pub fn new(predicate: impl Into<String>, args: Vec<Term>, timestamp: u64) -> Self {
        Self {
            predicate: predicate.into(),
            args,
            timestamp,
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.predicate)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        write!(f, ")@{}", self.timestamp)
    }
}

/// A predicate plus argument terms that may contain variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactPattern {
    pub predicate: String,
    pub args: Vec<Term>,
}

impl FactPattern {
    pub fn new(predicate: impl Into<String>, args: Vec<Term>) -> Self {
        Self {
            predicate: predicate.into(),
            args,
        }
    }

    /// Read a pattern from a `(predicate arg...)` term
    pub fn from_term(term: &Term) -> Result<Self> {
        let items = term
            .as_list()
            .ok_or_else(|| LogicError::BadPattern(format!("expected a list, got {}", term)))?;
        let predicate = items
            .first()
            .and_then(Term::as_symbol)
            .ok_or_else(|| {
                LogicError::BadPattern(format!("pattern head must be a symbol: {}", term))
            })?
            .to_string();
        Ok(Self {
            predicate,
            args: items[1..].to_vec(),
        })
    }

    /// Unify this pattern against a fact under existing bindings
    ///
    /// Arity mismatch is a non-match, not an error.
    pub fn unify_fact(&self, fact: &Fact, bindings: &Bindings) -> Option<Bindings> {
        if self.predicate != fact.predicate {
            return None;
        }
        unify_slices(&self.args, &fact.args, bindings)
    }
}

impl fmt::Display for FactPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.predicate)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        write!(f, ")")
    }
}

/// One query result: the bindings plus the matched fact's timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub bindings: Bindings,
    pub timestamp: u64,
}

/// The fact store
///
/// Backed by an insertion-ordered vector; histories are bounded by the
/// scheduler's step count, so linear scans with structural equality are
/// the dedupe mechanism (terms contain floats and cannot hash).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactStore {
    facts: Vec<Fact>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert a fact at a timestamp; re-asserting an identical fact is a
    /// no-op. Returns true when the fact was new.
    pub fn assert_at(&mut self, predicate: &str, args: Vec<Term>, timestamp: u64) -> bool {
        let fact = Fact::new(predicate, args, timestamp);
        self.insert(fact)
    }

    pub fn insert(&mut self, fact: Fact) -> bool {
        if self.facts.contains(&fact) {
            return false;
        }
        tracing::trace!(target: "sibyl::logic", fact = %fact, "assert");
        self.facts.push(fact);
        true
    }

    /// Remove exact ground matches at every timestamp; retracting a fact
    /// that is not present is a no-op. Returns the number removed.
    pub fn retract(&mut self, predicate: &str, args: &[Term]) -> usize {
        let before = self.facts.len();
        self.facts
            .retain(|fact| fact.predicate != predicate || fact.args != args);
        before - self.facts.len()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn clear(&mut self) {
        self.facts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    /// Lazily match a pattern against the store
    pub fn query<'a>(&'a self, pattern: &'a FactPattern) -> impl Iterator<Item = Match> + 'a {
        self.facts.iter().filter_map(move |fact| {
            pattern
                .unify_fact(fact, &Bindings::new())
                .map(|bindings| Match {
                    bindings,
                    timestamp: fact.timestamp,
                })
        })
    }

    /// Conjunctive query: every pattern must match under one binding set
    pub fn query_all(&self, patterns: &[FactPattern]) -> Vec<Bindings> {
        let mut frontier = vec![Bindings::new()];
        for pattern in patterns {
            let mut next = Vec::new();
            for bindings in &frontier {
                for fact in &self.facts {
                    if let Some(extended) = pattern.unify_fact(fact, bindings) {
                        if !next.contains(&extended) {
                            next.push(extended);
                        }
                    }
                }
            }
            if next.is_empty() {
                return Vec::new();
            }
            frontier = next;
        }
        frontier
    }

    /// Sorted, de-duplicated timestamps present in the history
    pub fn timestamps(&self) -> Vec<u64> {
        let mut out: Vec<u64> = self.facts.iter().map(|fact| fact.timestamp).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn facts_at(&self, timestamp: u64) -> Vec<&Fact> {
        self.facts
            .iter()
            .filter(|fact| fact.timestamp == timestamp)
            .collect()
    }

    // Temporal views: ordinary filters over the timestamp field.

    /// Exact-timestamp matches
    pub fn query_at(&self, pattern: &FactPattern, timestamp: u64) -> Vec<Match> {
        self.query(pattern)
            .filter(|m| m.timestamp == timestamp)
            .collect()
    }

    /// Strictly-before matches
    pub fn query_before(&self, pattern: &FactPattern, timestamp: u64) -> Vec<Match> {
        self.query(pattern)
            .filter(|m| m.timestamp < timestamp)
            .collect()
    }

    /// Strictly-after matches
    pub fn query_after(&self, pattern: &FactPattern, timestamp: u64) -> Vec<Match> {
        self.query(pattern)
            .filter(|m| m.timestamp > timestamp)
            .collect()
    }

    /// Inclusive-range matches
    pub fn query_between(&self, pattern: &FactPattern, start: u64, end: u64) -> Vec<Match> {
        self.query(pattern)
            .filter(|m| m.timestamp >= start && m.timestamp <= end)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Term {
        Term::symbol(name)
    }

    fn var(name: &str) -> Term {
        Term::Var(name.to_string())
    }

    #[test]
    fn test_assert_is_idempotent() {
        let mut store = FactStore::new();
        assert!(store.assert_at("parent", vec![sym("tom"), sym("bob")], 0));
        assert!(!store.assert_at("parent", vec![sym("tom"), sym("bob")], 0));
        assert_eq!(store.len(), 1);

        // same fact at another timestamp is a distinct fact
        assert!(store.assert_at("parent", vec![sym("tom"), sym("bob")], 1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_retract_exact_match() {
        let mut store = FactStore::new();
        store.assert_at("event", vec![Term::Int(1)], 0);
        store.assert_at("event", vec![Term::Int(2)], 0);

        assert_eq!(store.retract("event", &[Term::Int(1)]), 1);
        assert_eq!(store.len(), 1);

        // retracting something absent is a no-op, not an error
        assert_eq!(store.retract("event", &[Term::Int(9)]), 0);
    }

    #[test]
    fn test_retract_removes_all_timestamps() {
        let mut store = FactStore::new();
        store.assert_at("flag", vec![sym("on")], 1);
        store.assert_at("flag", vec![sym("on")], 2);
        assert_eq!(store.retract("flag", &[sym("on")]), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_query_binds_variables() {
        let mut store = FactStore::new();
        store.assert_at("parent", vec![sym("tom"), sym("bob")], 0);
        store.assert_at("parent", vec![sym("bob"), sym("ann")], 0);

        let pattern = FactPattern::new("parent", vec![sym("tom"), var("x")]);
        let matches: Vec<Match> = store.query(&pattern).collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bindings.get("x"), Some(&sym("bob")));
    }

    #[test]
    fn test_arity_mismatch_is_non_match() {
        let mut store = FactStore::new();
        store.assert_at("p", vec![sym("a"), sym("b")], 0);
        let pattern = FactPattern::new("p", vec![var("x")]);
        assert_eq!(store.query(&pattern).count(), 0);
    }

    #[test]
    fn test_query_all_joins_bindings() {
        let mut store = FactStore::new();
        store.assert_at("parent", vec![sym("tom"), sym("bob")], 0);
        store.assert_at("parent", vec![sym("bob"), sym("ann")], 0);

        let patterns = vec![
            FactPattern::new("parent", vec![var("x"), var("y")]),
            FactPattern::new("parent", vec![var("y"), var("z")]),
        ];
        let results = store.query_all(&patterns);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("x"), Some(&sym("tom")));
        assert_eq!(results[0].get("z"), Some(&sym("ann")));
    }

    #[test]
    fn test_temporal_filters() {
        let mut store = FactStore::new();
        for t in [1, 5, 9] {
            store.assert_at("event", vec![sym("tick")], t);
        }
        let pattern = FactPattern::new("event", vec![var("e")]);

        let before: Vec<u64> = store
            .query_before(&pattern, 6)
            .iter()
            .map(|m| m.timestamp)
            .collect();
        assert_eq!(before, vec![1, 5]);

        let between: Vec<u64> = store
            .query_between(&pattern, 2, 9)
            .iter()
            .map(|m| m.timestamp)
            .collect();
        assert_eq!(between, vec![5, 9]);

        assert_eq!(store.query_after(&pattern, 5).len(), 1);
        assert_eq!(store.query_at(&pattern, 5).len(), 1);
        assert_eq!(store.query_at(&pattern, 2).len(), 0);
    }

    #[test]
    fn test_pattern_from_term() {
        let term = Term::list([sym("parent"), sym("tom"), var("x")]);
        let pattern = FactPattern::from_term(&term).unwrap();
        assert_eq!(pattern.predicate, "parent");
        assert_eq!(pattern.args.len(), 2);

        assert!(FactPattern::from_term(&Term::Int(3)).is_err());
        assert!(FactPattern::from_term(&Term::List(vec![Term::Int(1)])).is_err());
    }

    #[test]
    fn test_timestamps_sorted_distinct() {
        let mut store = FactStore::new();
        store.assert_at("a", vec![], 5);
        store.assert_at("b", vec![], 1);
        store.assert_at("c", vec![], 5);
        assert_eq!(store.timestamps(), vec![1, 5]);
    }

    #[test]
    fn test_store_serde_roundtrip() {
        let mut store = FactStore::new();
        store.assert_at("inventory", vec![sym("bread"), Term::Int(3)], 2);
        let json = serde_json::to_string(&store).unwrap();
        let back: FactStore = serde_json::from_str(&json).unwrap();
        assert_eq!(store, back);
    }
}
