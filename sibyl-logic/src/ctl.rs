//! Trace-based temporal property checking
//!
//! Formulas are evaluated over the recorded fact history: the "trace" is
//! the sorted sequence of distinct timestamps in the store, and each
//! position is judged by querying the facts at that timestamp. This is a
//! bounded checker over history, not a branching-time model checker, so
//! `ag`/`af`/`ef`/`ex` collapse to their linear readings.
//!
//! On failure the checker reports the earliest falsifying timestamp along
//! with the facts that witnessed the violation.

use crate::error::{LogicError, Result};
use crate::rules::CmpOp;
use crate::store::{Fact, FactPattern, FactStore};
use serde::{Deserialize, Serialize};
use sibyl_term::{walk, Bindings, Term};

/// A temporal formula over the fact history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Formula {
    /// A pattern holds at a position when some fact at that timestamp
    /// unifies with it and every guard comparison passes
    Holds {
        pattern: FactPattern,
        guards: Vec<(CmpOp, Term, Term)>,
    },
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
    Implies(Box<Formula>, Box<Formula>),
    /// True at every position of the trace (vacuously true when empty)
    Always(Box<Formula>),
    /// True at at least one position (false when the trace is empty)
    Eventually(Box<Formula>),
    /// Sugar for `Always(Not(..))`
    Never(Box<Formula>),
    /// True when a next position exists and the inner formula holds there
    Next(Box<Formula>),
}

impl Formula {
    /// Parse a formula from its dialect form, e.g.
    /// `(never (where (inventory ?item ?n) (< ?n 0)))`
    pub fn from_term(term: &Term) -> Result<Self> {
        let items = term
            .as_list()
            .ok_or_else(|| LogicError::BadFormula(format!("expected a list, got {}", term)))?;
        let head = items.first().and_then(Term::as_symbol).ok_or_else(|| {
            LogicError::BadFormula(format!("formula head must be a symbol: {}", term))
        })?;

        let unary = |ctor: fn(Box<Formula>) -> Formula| -> Result<Formula> {
            if items.len() != 2 {
                return Err(LogicError::BadFormula(format!(
                    "{} takes one sub-formula: {}",
                    head, term
                )));
            }
            Ok(ctor(Box::new(Formula::from_term(&items[1])?)))
        };

        match head {
            "always" | "always?" | "ag" => unary(Formula::Always),
            // on a recorded linear trace the universal and existential
            // eventualities coincide
            "eventually" | "eventually?" | "af" | "ef" => unary(Formula::Eventually),
            "never" | "never?" => unary(Formula::Never),
            "next" | "ex" => unary(Formula::Next),
            "not" => unary(Formula::Not),
            "and" => Ok(Formula::And(
                items[1..]
                    .iter()
                    .map(Formula::from_term)
                    .collect::<Result<_>>()?,
            )),
            "or" => Ok(Formula::Or(
                items[1..]
                    .iter()
                    .map(Formula::from_term)
                    .collect::<Result<_>>()?,
            )),
            "implies" | "->" => {
                if items.len() != 3 {
                    return Err(LogicError::BadFormula(format!(
                        "implies takes two sub-formulas: {}",
                        term
                    )));
                }
                Ok(Formula::Implies(
                    Box::new(Formula::from_term(&items[1])?),
                    Box::new(Formula::from_term(&items[2])?),
                ))
            }
            "where" => {
                if items.len() < 2 {
                    return Err(LogicError::BadFormula(format!(
                        "where takes a pattern and guards: {}",
                        term
                    )));
                }
                let pattern = FactPattern::from_term(&items[1])?;
                let guards = items[2..]
                    .iter()
                    .map(parse_guard)
                    .collect::<Result<_>>()?;
                Ok(Formula::Holds { pattern, guards })
            }
            _ => Ok(Formula::Holds {
                pattern: FactPattern::from_term(term)?,
                guards: Vec::new(),
            }),
        }
    }

    /// Check this formula against a fact history
    pub fn check(&self, store: &FactStore) -> CheckResult {
        let trace = store.timestamps();
        if self.eval(store, &trace, 0) {
            return CheckResult::pass();
        }
        CheckResult::fail(self.explain(store, &trace))
    }

    /// Evaluate at `position` in the trace. Positions at or past the end
    /// mean an empty remaining trace.
    fn eval(&self, store: &FactStore, trace: &[u64], position: usize) -> bool {
        match self {
            Formula::Holds { pattern, guards } => trace
                .get(position)
                .is_some_and(|&ts| holds_at(store, pattern, guards, ts).is_some()),
            Formula::Not(inner) => !inner.eval(store, trace, position),
            Formula::And(parts) => parts.iter().all(|f| f.eval(store, trace, position)),
            Formula::Or(parts) => parts.iter().any(|f| f.eval(store, trace, position)),
            Formula::Implies(lhs, rhs) => {
                !lhs.eval(store, trace, position) || rhs.eval(store, trace, position)
            }
            Formula::Always(inner) => {
                (position..trace.len()).all(|i| inner.eval(store, trace, i))
            }
            Formula::Eventually(inner) => {
                (position..trace.len()).any(|i| inner.eval(store, trace, i))
            }
            Formula::Never(inner) => {
                (position..trace.len()).all(|i| !inner.eval(store, trace, i))
            }
            Formula::Next(inner) => {
                position + 1 < trace.len() && inner.eval(store, trace, position + 1)
            }
        }
    }

    /// Build the counterexample for a formula known to have failed
    fn explain(&self, store: &FactStore, trace: &[u64]) -> Counterexample {
        match self {
            Formula::Always(inner) => {
                for (i, &ts) in trace.iter().enumerate() {
                    if !inner.eval(store, trace, i) {
                        return Counterexample {
                            timestamp: ts,
                            witnesses: inner.witnesses(store, ts),
                            detail: format!("sub-formula false at timestamp {}", ts),
                        };
                    }
                }
                Counterexample::at(0, "formula false on the recorded trace")
            }
            Formula::Never(inner) => {
                for (i, &ts) in trace.iter().enumerate() {
                    if inner.eval(store, trace, i) {
                        return Counterexample {
                            timestamp: ts,
                            witnesses: inner.witnesses(store, ts),
                            detail: format!("forbidden condition observed at timestamp {}", ts),
                        };
                    }
                }
                Counterexample::at(0, "formula false on the recorded trace")
            }
            Formula::Eventually(_) => Counterexample::at(
                trace.last().copied().unwrap_or(0),
                "condition never observed on the recorded trace",
            ),
            Formula::Next(_) => Counterexample::at(
                trace.first().copied().unwrap_or(0),
                "no next position satisfies the sub-formula",
            ),
            Formula::Holds { pattern, .. } => Counterexample::at(
                trace.first().copied().unwrap_or(0),
                format!("no fact matching ({} ...) at the first timestamp", pattern.predicate),
            ),
            Formula::Implies(lhs, _) => {
                let ts = trace.first().copied().unwrap_or(0);
                Counterexample {
                    timestamp: ts,
                    witnesses: lhs.witnesses(store, ts),
                    detail: "antecedent holds but consequent fails".to_string(),
                }
            }
            Formula::Not(_) | Formula::And(_) | Formula::Or(_) => Counterexample::at(
                trace.first().copied().unwrap_or(0),
                "formula false on the recorded trace",
            ),
        }
    }

    /// Facts at `timestamp` that this formula's leaf patterns match
    fn witnesses(&self, store: &FactStore, timestamp: u64) -> Vec<Fact> {
        match self {
            Formula::Holds { pattern, guards } => store
                .facts_at(timestamp)
                .into_iter()
                .filter(|fact| {
                    pattern
                        .unify_fact(fact, &Bindings::new())
                        .is_some_and(|b| guards_pass(guards, &b))
                })
                .cloned()
                .collect(),
            Formula::Not(inner)
            | Formula::Always(inner)
            | Formula::Eventually(inner)
            | Formula::Never(inner)
            | Formula::Next(inner) => inner.witnesses(store, timestamp),
            Formula::And(parts) | Formula::Or(parts) => parts
                .iter()
                .flat_map(|f| f.witnesses(store, timestamp))
                .collect(),
            Formula::Implies(lhs, rhs) => {
                let mut out = lhs.witnesses(store, timestamp);
                out.extend(rhs.witnesses(store, timestamp));
                out
            }
        }
    }
}

fn parse_guard(term: &Term) -> Result<(CmpOp, Term, Term)> {
    let items = term
        .as_list()
        .ok_or_else(|| LogicError::BadFormula(format!("guard must be a list: {}", term)))?;
    let head = items.first().and_then(Term::as_symbol);
    let op = head.and_then(CmpOp::from_symbol).ok_or_else(|| {
        LogicError::BadFormula(format!("guard head must be a comparison: {}", term))
    })?;
    if items.len() != 3 {
        return Err(LogicError::BadFormula(format!(
            "guard takes two arguments: {}",
            term
        )));
    }
    Ok((op, items[1].clone(), items[2].clone()))
}

fn guards_pass(guards: &[(CmpOp, Term, Term)], bindings: &Bindings) -> bool {
    guards.iter().all(|(op, lhs, rhs)| {
        let lhs = walk(lhs, bindings);
        let rhs = walk(rhs, bindings);
        lhs.is_ground() && rhs.is_ground() && op.holds(lhs, rhs)
    })
}

fn holds_at(
    store: &FactStore,
    pattern: &FactPattern,
    guards: &[(CmpOp, Term, Term)],
    timestamp: u64,
) -> Option<Bindings> {
    store.facts_at(timestamp).into_iter().find_map(|fact| {
        pattern
            .unify_fact(fact, &Bindings::new())
            .filter(|bindings| guards_pass(guards, bindings))
    })
}

/// Outcome of a property check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub holds: bool,
    pub counterexample: Option<Counterexample>,
}

impl CheckResult {
    fn pass() -> Self {
        Self {
            holds: true,
            counterexample: None,
        }
    }

    fn fail(counterexample: Counterexample) -> Self {
        Self {
            holds: false,
            counterexample: Some(counterexample),
        }
    }
}

/// Earliest falsifying timestamp plus the facts observed there
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterexample {
    pub timestamp: u64,
    pub witnesses: Vec<Fact>,
    pub detail: String,
}

impl Counterexample {
    fn at(timestamp: u64, detail: impl Into<String>) -> Self {
        Self {
            timestamp,
            witnesses: Vec::new(),
            detail: detail.into(),
        }
    }
}

/// Named properties, checked on demand against a store snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyTable {
    properties: Vec<(String, Formula)>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a property, replacing any with the same name
    pub fn define(&mut self, name: impl Into<String>, formula: Formula) {
        let name = name.into();
        self.properties.retain(|(n, _)| *n != name);
        self.properties.push((name, formula));
    }

    pub fn get(&self, name: &str) -> Option<&Formula> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }

    pub fn check(&self, name: &str, store: &FactStore) -> Result<CheckResult> {
        let formula = self
            .get(name)
            .ok_or_else(|| LogicError::UnknownProperty(name.to_string()))?;
        let result = formula.check(store);
        tracing::debug!(
            target: "sibyl::logic",
            property = name,
            holds = result.holds,
            "property checked"
        );
        Ok(result)
    }

    pub fn clear(&mut self) {
        self.properties.clear();
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(n, _)| n.as_str())
    }
}
