//! Session-backed implementation of the evaluator's host seam
//!
//! `SessionHost` borrows the session's shared state for the duration of
//! one evaluation (a top-level load or a single actor step) and routes
//! effectful builtins into it. Fact timestamps come from the scheduler
//! clock carried in at construction.

use crate::actor::{Actor, ActorTable, DeliveryFailure};
use crate::csp::StepTrace;
use crate::registry::Registry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use sibyl_lang::{Host, HostFault};
use sibyl_logic::{FactPattern, Knowledge, LogicError, Rule};
use sibyl_term::{Bindings, Term};

/// Seedable random source shared by every builtin that samples
#[derive(Debug)]
pub struct EngineRng {
    rng: StdRng,
    seed: u64,
}

impl EngineRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
        self.seed = seed;
    }

    pub fn random(&mut self) -> f64 {
        self.rng.gen()
    }

    pub fn random_int(&mut self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    pub fn random_normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        match Normal::new(mean, std_dev) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        }
    }

    pub fn random_poisson(&mut self, lambda: f64) -> Result<i64, HostFault> {
        if lambda <= 0.0 {
            return Ok(0);
        }
        let dist = Poisson::new(lambda)
            .map_err(|_| HostFault::Unsupported(format!("bad poisson rate {}", lambda)))?;
        Ok(dist.sample(&mut self.rng) as i64)
    }
}

pub struct SessionHost<'a> {
    registry: &'a mut Registry,
    knowledge: &'a mut Knowledge,
    actors: &'a mut ActorTable,
    rng: &'a mut EngineRng,
    clock: u64,
    inbox: Option<Term>,
    step: StepTrace,
}

impl<'a> SessionHost<'a> {
    pub fn new(
        registry: &'a mut Registry,
        knowledge: &'a mut Knowledge,
        actors: &'a mut ActorTable,
        rng: &'a mut EngineRng,
        clock: u64,
        inbox: Option<Term>,
    ) -> Self {
        Self {
            registry,
            knowledge,
            actors,
            rng,
            clock,
            inbox,
            step: StepTrace::default(),
        }
    }

    /// Protocol trace of the evaluation this host served
    pub fn step_trace(&self) -> &StepTrace {
        &self.step
    }
}

fn logic_fault(error: LogicError) -> HostFault {
    match error {
        LogicError::UnstratifiableRule { rule, predicate } => {
            HostFault::UnstratifiableRule { rule, predicate }
        }
        other => HostFault::Unsupported(other.to_string()),
    }
}

/// Render bindings as a sorted a-list so query output is deterministic
fn bindings_to_alist(bindings: &Bindings) -> Term {
    let mut pairs: Vec<(&String, &Term)> = bindings.iter().collect();
    pairs.sort_by_key(|(name, _)| name.as_str());
    Term::List(
        pairs
            .into_iter()
            .map(|(name, value)| Term::list([Term::symbol(name.as_str()), value.clone()]))
            .collect(),
    )
}

impl Host for SessionHost<'_> {
    fn registry_get(&self, name: &str) -> Option<Term> {
        self.registry.get(name)
    }

    fn registry_set(&mut self, name: &str, value: Term) {
        self.registry.set(name, value);
    }

    fn assert_fact(&mut self, predicate: &str, args: Vec<Term>) -> Result<(), HostFault> {
        self.knowledge.assert_at(predicate, args, self.clock);
        Ok(())
    }

    fn retract_fact(&mut self, predicate: &str, args: Vec<Term>) -> Result<(), HostFault> {
        self.knowledge.retract(predicate, &args);
        Ok(())
    }

    fn query(&mut self, pattern: &Term) -> Result<Term, HostFault> {
        let results: Vec<Bindings> = match pattern.as_list() {
            Some(items) if items.first().and_then(Term::as_symbol) == Some("and") => {
                let patterns = items[1..]
                    .iter()
                    .map(FactPattern::from_term)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(logic_fault)?;
                self.knowledge.query_all(&patterns)
            }
            _ => {
                let parsed = FactPattern::from_term(pattern).map_err(logic_fault)?;
                self.knowledge
                    .query(&parsed)
                    .into_iter()
                    .map(|m| m.bindings)
                    .collect()
            }
        };
        Ok(Term::List(results.iter().map(bindings_to_alist).collect()))
    }

    fn define_rule(&mut self, name: &str, head: &Term, body: &[Term]) -> Result<(), HostFault> {
        let rule = Rule::from_terms(name, head, body).map_err(logic_fault)?;
        self.knowledge.define_rule(rule).map_err(logic_fault)
    }

    fn materialize(&mut self) -> Result<(), HostFault> {
        self.knowledge.materialized();
        Ok(())
    }

    fn spawn_actor(
        &mut self,
        name: &str,
        capacity: usize,
        function: &str,
        args: Vec<Term>,
    ) -> Result<(), HostFault> {
        self.actors
            .spawn(Actor::new(name, capacity, function, args))
            .map_err(|taken| HostFault::Unsupported(format!("actor {} already exists", taken)))
    }

    fn send_to(&mut self, name: &str, message: Term) -> Result<(), HostFault> {
        self.actors.deliver(name, message).map_err(|e| match e {
            DeliveryFailure::Unknown(name) => HostFault::UnknownActor { name },
            DeliveryFailure::Overflow(actor) => HostFault::MailboxOverflow { actor },
        })
    }

    fn receive(&mut self) -> Option<Term> {
        self.inbox.take()
    }

    fn actor_state(&self, name: &str) -> Option<Term> {
        self.actors.get(name).map(Actor::snapshot)
    }

    fn random(&mut self) -> f64 {
        self.rng.random()
    }

    fn random_int(&mut self, low: i64, high: i64) -> i64 {
        self.rng.random_int(low, high)
    }

    fn random_normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        self.rng.random_normal(mean, std_dev)
    }

    fn random_poisson(&mut self, lambda: f64) -> Result<i64, HostFault> {
        self.rng.random_poisson(lambda)
    }

    fn reseed(&mut self, seed: u64) {
        self.rng.reseed(seed);
    }

    fn note_receive(&mut self) {
        self.step.note_receive();
    }

    fn note_mutation(&mut self, what: &str) {
        self.step.note_mutation(what);
    }
}
