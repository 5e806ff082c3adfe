//! Session facade: the public surface of the runtime
//!
//! A `Session` owns every piece of shared state — environment arena,
//! registry, knowledge base, actor table, property table, protocol
//! monitor, random source, and the scheduler clock — and exposes the
//! operations a front end needs: load and evaluate source, control
//! actors, assert and query facts, and check temporal properties.

use crate::actor::ActorStatus;
use crate::csp::{CspMonitor, CspViolation};
use crate::error::{EngineError, Result};
use crate::host::{EngineRng, SessionHost};
use crate::registry::Registry;
use crate::actor::ActorTable;
use sibyl_lang::LangError;
use sibyl_logic::{
    CheckResult, FactPattern, Formula, Knowledge, Match, PropertyTable, Rule,
};
use sibyl_term::{Bindings, EnvArena, EnvId, Term};

pub const DEFAULT_SEED: u64 = 0x5eed;

pub struct Session {
    pub(crate) arena: EnvArena,
    pub(crate) root: EnvId,
    pub(crate) registry: Registry,
    pub(crate) knowledge: Knowledge,
    pub(crate) actors: ActorTable,
    pub(crate) properties: PropertyTable,
    pub(crate) csp: CspMonitor,
    pub(crate) rng: EngineRng,
    /// Completed scheduler ticks; the timestamp basis for asserted facts
    pub(crate) clock: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }

    pub fn with_seed(seed: u64) -> Self {
        let mut arena = EnvArena::new();
        let root = arena.root();
        Self {
            arena,
            root,
            registry: Registry::new(),
            knowledge: Knowledge::new(),
            actors: ActorTable::new(),
            properties: PropertyTable::new(),
            csp: CspMonitor::new(),
            rng: EngineRng::seeded(seed),
            clock: 0,
        }
    }

    /// Parse and evaluate source in the root environment, returning the
    /// value of the last form
    pub fn evaluate(&mut self, source: &str) -> Result<Term> {
        let mut host = SessionHost::new(
            &mut self.registry,
            &mut self.knowledge,
            &mut self.actors,
            &mut self.rng,
            self.clock,
            None,
        );
        let result = sibyl_lang::run(source, &mut self.arena, self.root, &mut host);
        result.map_err(Self::lift)
    }

    /// Mailbox overflow keeps its identity as a run-fatal error
    fn lift(error: LangError) -> EngineError {
        match error {
            LangError::Host(sibyl_lang::HostFault::MailboxOverflow { actor }) => {
                EngineError::MailboxOverflow { actor }
            }
            other => EngineError::Lang(other),
        }
    }

    // Actor control

    pub fn spawn_actor(
        &mut self,
        name: &str,
        capacity: usize,
        function: &str,
        args: Vec<Term>,
    ) -> Result<()> {
        self.actors
            .spawn(crate::actor::Actor::new(name, capacity, function, args))
            .map_err(|name| EngineError::DuplicateActor { name })
    }

    pub fn send_to(&mut self, name: &str, message: Term) -> Result<()> {
        use crate::actor::DeliveryFailure;
        self.actors.deliver(name, message).map_err(|e| match e {
            DeliveryFailure::Unknown(name) => EngineError::UnknownActor { name },
            DeliveryFailure::Overflow(actor) => EngineError::MailboxOverflow { actor },
        })
    }

    pub fn actor_state(&self, name: &str) -> Result<Term> {
        self.actors
            .get(name)
            .map(crate::actor::Actor::snapshot)
            .ok_or_else(|| EngineError::UnknownActor {
                name: name.to_string(),
            })
    }

    /// Snapshots of every actor, in registration order
    pub fn actor_states(&self) -> Vec<Term> {
        self.actors.iter().map(crate::actor::Actor::snapshot).collect()
    }

    pub fn actor_status(&self, name: &str) -> Option<ActorStatus> {
        self.actors.get(name).map(|a| a.status)
    }

    /// Current scheduler clock, in completed ticks
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Discard every piece of run state: environments, registry, facts,
    /// rules, actors, properties, violations, and the clock. The random
    /// source returns to its original seed.
    pub fn reset(&mut self) {
        self.arena.clear();
        self.root = self.arena.root();
        self.registry.clear();
        self.knowledge.clear();
        self.actors.clear();
        self.properties.clear();
        self.csp.clear();
        let seed = self.rng.seed();
        self.rng.reseed(seed);
        self.clock = 0;
        tracing::info!(target: "sibyl::engine", "session reset");
    }

    // Registry

    pub fn registry_get(&self, name: &str) -> Option<Term> {
        self.registry.get(name)
    }

    pub fn registry_set(&mut self, name: &str, value: Term) {
        self.registry.set(name, value);
    }

    // Facts and rules

    /// Assert a fact at the current clock
    pub fn assert_fact(&mut self, predicate: &str, args: Vec<Term>) -> bool {
        self.knowledge.assert_at(predicate, args, self.clock)
    }

    pub fn assert_fact_at(&mut self, predicate: &str, args: Vec<Term>, timestamp: u64) -> bool {
        self.knowledge.assert_at(predicate, args, timestamp)
    }

    pub fn retract_fact(&mut self, predicate: &str, args: &[Term]) -> usize {
        self.knowledge.retract(predicate, args)
    }

    pub fn define_rule(&mut self, rule: Rule) -> Result<()> {
        Ok(self.knowledge.define_rule(rule)?)
    }

    pub fn query(&mut self, pattern: &FactPattern) -> Vec<Match> {
        self.knowledge.query(pattern)
    }

    pub fn query_all(&mut self, patterns: &[FactPattern]) -> Vec<Bindings> {
        self.knowledge.query_all(patterns)
    }

    pub fn query_at(&mut self, pattern: &FactPattern, timestamp: u64) -> Vec<Match> {
        self.knowledge.query_at(pattern, timestamp)
    }

    pub fn query_before(&mut self, pattern: &FactPattern, timestamp: u64) -> Vec<Match> {
        self.knowledge.query_before(pattern, timestamp)
    }

    pub fn query_after(&mut self, pattern: &FactPattern, timestamp: u64) -> Vec<Match> {
        self.knowledge.query_after(pattern, timestamp)
    }

    pub fn query_between(&mut self, pattern: &FactPattern, start: u64, end: u64) -> Vec<Match> {
        self.knowledge.query_between(pattern, start, end)
    }

    // Properties

    pub fn define_property(&mut self, name: &str, formula: &Term) -> Result<()> {
        let parsed = Formula::from_term(formula)?;
        self.properties.define(name, parsed);
        Ok(())
    }

    /// Check a named property against the materialized fact history
    pub fn check_property(&mut self, name: &str) -> Result<CheckResult> {
        let formula = self
            .properties
            .get(name)
            .cloned()
            .ok_or_else(|| sibyl_logic::LogicError::UnknownProperty(name.to_string()))?;
        Ok(formula.check(self.knowledge.materialized()))
    }

    /// Check a one-off formula without naming it
    pub fn check_formula(&mut self, formula: &Term) -> Result<CheckResult> {
        let parsed = Formula::from_term(formula)?;
        Ok(parsed.check(self.knowledge.materialized()))
    }

    // Protocol enforcement

    /// Turn guard-first monitoring on or off. Disabled sessions record no
    /// violations and assert no `csp-violation` facts.
    pub fn csp_enforce(&mut self, enabled: bool, strict: bool) {
        self.csp.set_enforcement(enabled, strict);
    }

    pub fn csp_violations(&self) -> &[CspViolation] {
        self.csp.violations()
    }
}
