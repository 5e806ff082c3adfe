//! Knowledge base: base facts plus rules, with a cached materialization
//!
//! Queries always run against the derived closure. The closure is
//! recomputed lazily after any mutation of the base facts or rule set.

use crate::error::Result;
use crate::rules::{Rule, RuleSet};
use crate::store::{FactPattern, FactStore, Match};
use serde::{Deserialize, Serialize};
use sibyl_term::{Bindings, Term};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Knowledge {
    facts: FactStore,
    rules: RuleSet,
    #[serde(skip)]
    derived: Option<FactStore>,
}

impl Knowledge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert a base fact at the given timestamp. Re-asserting an
    /// existing (fact, timestamp) pair is a no-op.
    pub fn assert_at(&mut self, predicate: &str, args: Vec<Term>, timestamp: u64) -> bool {
        let added = self.facts.assert_at(predicate, args, timestamp);
        if added {
            self.derived = None;
        }
        added
    }

    /// Retract every timestamped occurrence of an exactly-matching base
    /// fact; returns how many were removed
    pub fn retract(&mut self, predicate: &str, args: &[Term]) -> usize {
        let removed = self.facts.retract(predicate, args);
        if removed > 0 {
            self.derived = None;
        }
        removed
    }

    /// Define a rule, replacing any rule with the same name. Fails if the
    /// resulting rule set is not stratifiable; on failure the rule set is
    /// left unchanged.
    pub fn define_rule(&mut self, rule: Rule) -> Result<()> {
        self.rules.define(rule)?;
        self.derived = None;
        Ok(())
    }

    pub fn base(&self) -> &FactStore {
        &self.facts
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn clear(&mut self) {
        self.facts.clear();
        self.rules.clear();
        self.derived = None;
    }

    /// The derived closure (base facts plus everything the rules entail),
    /// recomputing it if a mutation invalidated the cache
    pub fn materialized(&mut self) -> &FactStore {
        if self.derived.is_none() {
            tracing::debug!(
                target: "sibyl::logic",
                base = self.facts.len(),
                rules = self.rules.len(),
                "materializing knowledge base"
            );
            self.derived = Some(self.rules.materialize(&self.facts));
        }
        self.derived.as_ref().unwrap_or(&self.facts)
    }

    pub fn query(&mut self, pattern: &FactPattern) -> Vec<Match> {
        self.materialized().query(pattern).collect()
    }

    pub fn query_all(&mut self, patterns: &[FactPattern]) -> Vec<Bindings> {
        self.materialized().query_all(patterns)
    }

    pub fn query_at(&mut self, pattern: &FactPattern, timestamp: u64) -> Vec<Match> {
        self.materialized().query_at(pattern, timestamp)
    }

    pub fn query_before(&mut self, pattern: &FactPattern, timestamp: u64) -> Vec<Match> {
        self.materialized().query_before(pattern, timestamp)
    }

    pub fn query_after(&mut self, pattern: &FactPattern, timestamp: u64) -> Vec<Match> {
        self.materialized().query_after(pattern, timestamp)
    }

    pub fn query_between(&mut self, pattern: &FactPattern, start: u64, end: u64) -> Vec<Match> {
        self.materialized().query_between(pattern, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Condition;

    fn sym(name: &str) -> Term {
        Term::symbol(name)
    }

    fn var(name: &str) -> Term {
        Term::Var(name.to_string())
    }

    #[test]
    fn test_query_sees_derived_facts() {
        let mut kb = Knowledge::new();
        kb.assert_at("parent", vec![sym("tom"), sym("bob")], 0);
        kb.assert_at("parent", vec![sym("bob"), sym("ann")], 0);
        kb.define_rule(Rule::new(
            "grandparent",
            FactPattern::new("grandparent", vec![var("x"), var("z")]),
            vec![
                Condition::Fact(FactPattern::new("parent", vec![var("x"), var("y")])),
                Condition::Fact(FactPattern::new("parent", vec![var("y"), var("z")])),
            ],
        ))
        .unwrap();

        let matches = kb.query(&FactPattern::new("grandparent", vec![var("x"), var("z")]));
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bindings.get("z"), Some(&sym("ann")));
    }

    #[test]
    fn test_cache_invalidated_on_assert() {
        let mut kb = Knowledge::new();
        kb.define_rule(Rule::new(
            "copy",
            FactPattern::new("seen", vec![var("x")]),
            vec![Condition::Fact(FactPattern::new("raw", vec![var("x")]))],
        ))
        .unwrap();

        assert!(kb.query(&FactPattern::new("seen", vec![var("x")])).is_empty());
        kb.assert_at("raw", vec![Term::Int(1)], 3);
        assert_eq!(kb.query(&FactPattern::new("seen", vec![var("x")])).len(), 1);
    }

    #[test]
    fn test_retract_removes_derivations() {
        let mut kb = Knowledge::new();
        kb.define_rule(Rule::new(
            "copy",
            FactPattern::new("seen", vec![var("x")]),
            vec![Condition::Fact(FactPattern::new("raw", vec![var("x")]))],
        ))
        .unwrap();
        kb.assert_at("raw", vec![Term::Int(1)], 0);
        assert_eq!(kb.retract("raw", &[Term::Int(1)]), 1);
        assert!(kb.query(&FactPattern::new("seen", vec![var("x")])).is_empty());
    }

    #[test]
    fn test_failed_rule_definition_leaves_rules_intact() {
        let mut kb = Knowledge::new();
        kb.define_rule(Rule::new(
            "ok",
            FactPattern::new("a", vec![var("x")]),
            vec![Condition::Fact(FactPattern::new("b", vec![var("x")]))],
        ))
        .unwrap();
        let bad = kb.define_rule(Rule::new(
            "bad",
            FactPattern::new("c", vec![var("x")]),
            vec![Condition::Not(FactPattern::new("c", vec![var("x")]))],
        ));
        assert!(bad.is_err());
        assert_eq!(kb.rules().len(), 1);
    }
}
