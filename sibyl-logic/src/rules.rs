//! Rule definition and fixpoint evaluation
//!
//! Rules derive new facts from existing ones. Evaluation is a naive
//! iterative fixpoint: each pass joins positive conditions against the
//! fact set as it stood at the start of the pass, filters through builtin
//! comparisons, rejects bindings whose negated patterns match, and stops
//! when a full pass derives nothing new. Negation must be stratified;
//! cyclic negation is rejected when the rule is defined.

use crate::error::{LogicError, Result};
use crate::store::{Fact, FactPattern, FactStore};
use serde::{Deserialize, Serialize};
use sibyl_term::{substitute, walk, Bindings, Term};
use std::collections::{HashSet, VecDeque};

/// Builtin comparison operators usable in rule bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "=" => Some(CmpOp::Eq),
            "!=" => Some(CmpOp::Ne),
            "<" => Some(CmpOp::Lt),
            "<=" => Some(CmpOp::Le),
            ">" => Some(CmpOp::Gt),
            ">=" => Some(CmpOp::Ge),
            _ => None,
        }
    }

    pub(crate) fn holds(self, lhs: &Term, rhs: &Term) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            _ => match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => match self {
                    CmpOp::Lt => a < b,
                    CmpOp::Le => a <= b,
                    CmpOp::Gt => a > b,
                    CmpOp::Ge => a >= b,
                    CmpOp::Eq | CmpOp::Ne => false,
                },
                _ => false,
            },
        }
    }
}

/// One body condition: a positive pattern, a negated pattern, or a
/// comparison. Comparisons bind no variables; they only filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Fact(FactPattern),
    Not(FactPattern),
    Compare { op: CmpOp, lhs: Term, rhs: Term },
}

impl Condition {
    /// Read a condition from `(pred args...)`, `(not (pred args...))`, or
    /// `(op lhs rhs)` where op is a comparison symbol
    pub fn from_term(term: &Term) -> Result<Self> {
        let items = term
            .as_list()
            .ok_or_else(|| LogicError::BadCondition(format!("expected a list, got {}", term)))?;
        let head = items.first().and_then(Term::as_symbol).ok_or_else(|| {
            LogicError::BadCondition(format!("condition head must be a symbol: {}", term))
        })?;

        if head == "not" {
            if items.len() != 2 {
                return Err(LogicError::BadCondition(format!(
                    "not takes one pattern: {}",
                    term
                )));
            }
            return Ok(Condition::Not(FactPattern::from_term(&items[1])?));
        }

        if let Some(op) = CmpOp::from_symbol(head) {
            if items.len() != 3 {
                return Err(LogicError::BadCondition(format!(
                    "comparison takes two arguments: {}",
                    term
                )));
            }
            return Ok(Condition::Compare {
                op,
                lhs: items[1].clone(),
                rhs: items[2].clone(),
            });
        }

        Ok(Condition::Fact(FactPattern::from_term(term)?))
    }
}

/// A named derivation rule; immutable once defined, replaced by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub head: FactPattern,
    pub body: Vec<Condition>,
}

impl Rule {
    pub fn new(name: impl Into<String>, head: FactPattern, body: Vec<Condition>) -> Self {
        Self {
            name: name.into(),
            head,
            body,
        }
    }

    /// Build a rule from dialect terms: a head pattern and body condition
    /// terms as they appear in a `defrule` form
    pub fn from_terms(name: &str, head: &Term, body: &[Term]) -> Result<Self> {
        let head = FactPattern::from_term(head)?;
        let body = body.iter().map(Condition::from_term).collect::<Result<_>>()?;
        Ok(Self::new(name, head, body))
    }
}

/// The rule set, with stratification checked at definition time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Define a rule, replacing any existing rule with the same name.
    /// Rejects rule sets where a negated predicate can reach its own rule
    /// head through the dependency graph.
    pub fn define(&mut self, rule: Rule) -> Result<()> {
        let mut candidate = self.rules.clone();
        candidate.retain(|existing| existing.name != rule.name);
        candidate.push(rule.clone());

        Self::check_stratified(&candidate, &rule)?;

        self.rules = candidate;
        Ok(())
    }

    /// A negative edge `head -not-> p` is unstratifiable when `p` reaches
    /// `head` back through the dependency graph (any polarity).
    fn check_stratified(rules: &[Rule], defined: &Rule) -> Result<()> {
        for rule in rules {
            for condition in &rule.body {
                if let Condition::Not(pattern) = condition {
                    if Self::reaches(rules, &pattern.predicate, &rule.head.predicate) {
                        return Err(LogicError::UnstratifiableRule {
                            rule: defined.name.clone(),
                            predicate: pattern.predicate.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// True when facts for `from` can depend on facts for `to`
    fn reaches(rules: &[Rule], from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            for rule in rules.iter().filter(|r| r.head.predicate == current) {
                for condition in &rule.body {
                    let dependency = match condition {
                        Condition::Fact(p) | Condition::Not(p) => p.predicate.as_str(),
                        Condition::Compare { .. } => continue,
                    };
                    if dependency == to {
                        return true;
                    }
                    if seen.insert(dependency) {
                        queue.push_back(dependency);
                    }
                }
            }
        }
        false
    }

    /// Compute the transitive closure of the base facts under the rules
    ///
    /// Derived facts are timestamped with the maximum timestamp of the
    /// facts that support them.
    pub fn materialize(&self, base: &FactStore) -> FactStore {
        let mut known = base.clone();
        loop {
            // negation sees the set as it stood at the start of the pass
            let snapshot = known.clone();
            let mut derived_any = false;

            for rule in &self.rules {
                for (bindings, support_ts) in solve_body(&rule.body, &snapshot) {
                    let args: Vec<Term> = rule
                        .head
                        .args
                        .iter()
                        .map(|arg| substitute(arg, &bindings))
                        .collect();
                    if !args.iter().all(Term::is_ground) {
                        // unsafe head instantiation, skip
                        continue;
                    }
                    let fact = Fact::new(rule.head.predicate.clone(), args, support_ts);
                    if known.insert(fact) {
                        derived_any = true;
                    }
                }
            }

            if !derived_any {
                break;
            }
            tracing::debug!(
                target: "sibyl::logic",
                facts = known.len(),
                "fixpoint pass derived new facts"
            );
        }
        known
    }
}

/// Solve a rule body against a snapshot, producing each satisfying binding
/// set together with the max timestamp of its supporting facts
fn solve_body(body: &[Condition], snapshot: &FactStore) -> Vec<(Bindings, u64)> {
    let mut frontier: Vec<(Bindings, u64)> = vec![(Bindings::new(), 0)];

    for condition in body {
        let mut next = Vec::new();
        match condition {
            Condition::Fact(pattern) => {
                for (bindings, support_ts) in &frontier {
                    for fact in snapshot.iter() {
                        if let Some(extended) = pattern.unify_fact(fact, bindings) {
                            next.push((extended, (*support_ts).max(fact.timestamp)));
                        }
                    }
                }
            }
            Condition::Not(pattern) => {
                for (bindings, support_ts) in &frontier {
                    let resolved = FactPattern::new(
                        pattern.predicate.clone(),
                        pattern
                            .args
                            .iter()
                            .map(|arg| substitute(arg, bindings))
                            .collect(),
                    );
                    let blocked = snapshot
                        .iter()
                        .any(|fact| resolved.unify_fact(fact, bindings).is_some());
                    if !blocked {
                        next.push((bindings.clone(), *support_ts));
                    }
                }
            }
            Condition::Compare { op, lhs, rhs } => {
                for (bindings, support_ts) in &frontier {
                    let lhs = walk(lhs, bindings).clone();
                    let rhs = walk(rhs, bindings).clone();
                    // an unresolved variable simply fails the filter
                    if lhs.is_ground() && rhs.is_ground() && op.holds(&lhs, &rhs) {
                        next.push((bindings.clone(), *support_ts));
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

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str) -> Term {
        Term::symbol(name)
    }

    fn var(name: &str) -> Term {
        Term::Var(name.to_string())
    }

    fn grandparent_rule() -> Rule {
        Rule::new(
            "grandparent",
            FactPattern::new("grandparent", vec![var("x"), var("z")]),
            vec![
                Condition::Fact(FactPattern::new("parent", vec![var("x"), var("y")])),
                Condition::Fact(FactPattern::new("parent", vec![var("y"), var("z")])),
            ],
        )
    }

    #[test]
    fn test_grandparent_derivation() {
        let mut store = FactStore::new();
        store.assert_at("parent", vec![sym("tom"), sym("bob")], 0);
        store.assert_at("parent", vec![sym("bob"), sym("ann")], 0);

        let mut rules = RuleSet::new();
        rules.define(grandparent_rule()).unwrap();

        let closure = rules.materialize(&store);
        let pattern = FactPattern::new("grandparent", vec![sym("tom"), var("who")]);
        let matches: Vec<_> = closure.query(&pattern).collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bindings.get("who"), Some(&sym("ann")));
    }

    #[test]
    fn test_transitive_closure_to_fixpoint() {
        let mut store = FactStore::new();
        store.assert_at("edge", vec![sym("a"), sym("b")], 0);
        store.assert_at("edge", vec![sym("b"), sym("c")], 0);
        store.assert_at("edge", vec![sym("c"), sym("d")], 0);

        let mut rules = RuleSet::new();
        rules
            .define(Rule::new(
                "path-base",
                FactPattern::new("path", vec![var("x"), var("y")]),
                vec![Condition::Fact(FactPattern::new(
                    "edge",
                    vec![var("x"), var("y")],
                ))],
            ))
            .unwrap();
        rules
            .define(Rule::new(
                "path-step",
                FactPattern::new("path", vec![var("x"), var("z")]),
                vec![
                    Condition::Fact(FactPattern::new("edge", vec![var("x"), var("y")])),
                    Condition::Fact(FactPattern::new("path", vec![var("y"), var("z")])),
                ],
            ))
            .unwrap();

        let closure = rules.materialize(&store);
        let pattern = FactPattern::new("path", vec![var("x"), var("y")]);
        assert_eq!(closure.query(&pattern).count(), 6);
    }

    #[test]
    fn test_negation_filters() {
        let mut store = FactStore::new();
        store.assert_at("node", vec![sym("a")], 0);
        store.assert_at("node", vec![sym("b")], 0);
        store.assert_at("busy", vec![sym("a")], 0);

        let mut rules = RuleSet::new();
        rules
            .define(Rule::new(
                "idle",
                FactPattern::new("idle", vec![var("n")]),
                vec![
                    Condition::Fact(FactPattern::new("node", vec![var("n")])),
                    Condition::Not(FactPattern::new("busy", vec![var("n")])),
                ],
            ))
            .unwrap();

        let closure = rules.materialize(&store);
        let matches: Vec<_> = closure
            .query(&FactPattern::new("idle", vec![var("n")]))
            .collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bindings.get("n"), Some(&sym("b")));
    }

    #[test]
    fn test_direct_negative_cycle_is_unstratifiable() {
        let mut rules = RuleSet::new();
        let result = rules.define(Rule::new(
            "p-from-not-p",
            FactPattern::new("p", vec![var("x")]),
            vec![
                Condition::Fact(FactPattern::new("q", vec![var("x")])),
                Condition::Not(FactPattern::new("p", vec![var("x")])),
            ],
        ));
        assert!(matches!(
            result,
            Err(LogicError::UnstratifiableRule { .. })
        ));
    }

    #[test]
    fn test_transitive_negative_cycle_is_unstratifiable() {
        let mut rules = RuleSet::new();
        rules
            .define(Rule::new(
                "a-rule",
                FactPattern::new("a", vec![var("x")]),
                vec![Condition::Not(FactPattern::new("b", vec![var("x")]))],
            ))
            .unwrap();
        // b depends on a, closing the loop through a negation
        let result = rules.define(Rule::new(
            "b-rule",
            FactPattern::new("b", vec![var("x")]),
            vec![Condition::Fact(FactPattern::new("a", vec![var("x")]))],
        ));
        assert!(matches!(
            result,
            Err(LogicError::UnstratifiableRule { .. })
        ));
    }

    #[test]
    fn test_comparison_conditions_filter() {
        let mut store = FactStore::new();
        store.assert_at("stock", vec![sym("bread"), Term::Int(5)], 0);
        store.assert_at("stock", vec![sym("cake"), Term::Int(-2)], 0);

        let mut rules = RuleSet::new();
        rules
            .define(Rule::new(
                "oversold",
                FactPattern::new("oversold", vec![var("item")]),
                vec![
                    Condition::Fact(FactPattern::new("stock", vec![var("item"), var("n")])),
                    Condition::Compare {
                        op: CmpOp::Lt,
                        lhs: var("n"),
                        rhs: Term::Int(0),
                    },
                ],
            ))
            .unwrap();

        let closure = rules.materialize(&store);
        let matches: Vec<_> = closure
            .query(&FactPattern::new("oversold", vec![var("item")]))
            .collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].bindings.get("item"), Some(&sym("cake")));
    }

    #[test]
    fn test_derived_timestamp_is_max_of_support() {
        let mut store = FactStore::new();
        store.assert_at("parent", vec![sym("tom"), sym("bob")], 2);
        store.assert_at("parent", vec![sym("bob"), sym("ann")], 7);

        let mut rules = RuleSet::new();
        rules.define(grandparent_rule()).unwrap();

        let closure = rules.materialize(&store);
        let matches = closure.query_at(
            &FactPattern::new("grandparent", vec![var("x"), var("z")]),
            7,
        );
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn test_redefining_rule_replaces() {
        let mut rules = RuleSet::new();
        rules.define(grandparent_rule()).unwrap();
        rules.define(grandparent_rule()).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_rule_from_terms() {
        let head = Term::list([sym("grandparent"), var("x"), var("z")]);
        let body = vec![
            Term::list([sym("parent"), var("x"), var("y")]),
            Term::list([sym("parent"), var("y"), var("z")]),
            Term::list([sym("not"), Term::list([sym("same"), var("x"), var("z")])]),
            Term::list([sym("<"), var("x"), Term::Int(5)]),
        ];
        let rule = Rule::from_terms("gp", &head, &body).unwrap();
        assert_eq!(rule.body.len(), 4);
        assert!(matches!(rule.body[0], Condition::Fact(_)));
        assert!(matches!(rule.body[1], Condition::Fact(_)));
        assert!(matches!(rule.body[2], Condition::Not(_)));
        assert!(matches!(rule.body[3], Condition::Compare { .. }));
    }
}
