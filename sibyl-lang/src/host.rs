//! Host seam between the evaluator and the surrounding runtime
//!
//! Effectful builtins (registry access, actor primitives, fact store
//! access, RNG) are routed through the `Host` trait so the evaluator does
//! not depend on any particular engine. The scheduler implements `Host`
//! per actor step; language-only callers can use [`NullHost`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use serde::{Deserialize, Serialize};
use sibyl_term::Term;
use std::collections::HashMap;

/// Failure raised by a host operation
///
/// These cross the evaluator boundary as `LangError::Host`. Mailbox
/// overflow is singled out because the scheduler treats it as fatal to the
/// whole run rather than as an ordinary per-actor fault.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum HostFault {
    #[error("Unstratifiable rule {rule}: negated predicate {predicate} depends on itself")]
    UnstratifiableRule { rule: String, predicate: String },

    #[error("Mailbox overflow sending to actor {actor}")]
    MailboxOverflow { actor: String },

    #[error("Unknown actor: {name}")]
    UnknownActor { name: String },

    #[error("{0}")]
    Unsupported(String),
}

/// Runtime services available to dialect code
pub trait Host {
    // Registry
    fn registry_get(&self, name: &str) -> Option<Term>;
    fn registry_set(&mut self, name: &str, value: Term);

    // Fact store
    fn assert_fact(&mut self, predicate: &str, args: Vec<Term>) -> Result<(), HostFault>;
    fn retract_fact(&mut self, predicate: &str, args: Vec<Term>) -> Result<(), HostFault>;
    /// Returns a list of binding a-lists, one per match
    fn query(&mut self, pattern: &Term) -> Result<Term, HostFault>;
    fn define_rule(&mut self, name: &str, head: &Term, body: &[Term]) -> Result<(), HostFault>;
    fn materialize(&mut self) -> Result<(), HostFault>;

    // Actors
    fn spawn_actor(
        &mut self,
        name: &str,
        capacity: usize,
        function: &str,
        args: Vec<Term>,
    ) -> Result<(), HostFault>;
    fn send_to(&mut self, name: &str, message: Term) -> Result<(), HostFault>;
    /// Message delivered to the actor being stepped, if any
    fn receive(&mut self) -> Option<Term>;
    fn actor_state(&self, name: &str) -> Option<Term>;

    // Seedable randomness
    fn random(&mut self) -> f64;
    fn random_int(&mut self, low: i64, high: i64) -> i64;
    fn random_normal(&mut self, mean: f64, std_dev: f64) -> f64;
    fn random_poisson(&mut self, lambda: f64) -> Result<i64, HostFault>;
    fn reseed(&mut self, seed: u64);

    // CSP guard-first bookkeeping; no-ops outside actor steps
    fn note_receive(&mut self) {}
    fn note_mutation(&mut self, _what: &str) {}
}

/// Host for language-only evaluation
///
/// Carries a registry and a deterministic pseudo-random source, rejects
/// actor and fact-store operations. Used by tests and by callers that
/// only need the evaluator.
#[derive(Debug)]
pub struct NullHost {
    registry: HashMap<String, Term>,
    rng: StdRng,
}

impl NullHost {
    const SEED: u64 = 0x9e3779b97f4a7c15;

    pub fn new() -> Self {
        Self {
            registry: HashMap::new(),
            rng: StdRng::seed_from_u64(Self::SEED),
        }
    }

    fn unsupported(what: &str) -> HostFault {
        HostFault::Unsupported(format!("{} requires a session host", what))
    }
}

impl Default for NullHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for NullHost {
    fn registry_get(&self, name: &str) -> Option<Term> {
        self.registry.get(name).cloned()
    }

    fn registry_set(&mut self, name: &str, value: Term) {
        self.registry.insert(name.to_string(), value);
    }

    fn assert_fact(&mut self, _predicate: &str, _args: Vec<Term>) -> Result<(), HostFault> {
        Err(Self::unsupported("assert!"))
    }

    fn retract_fact(&mut self, _predicate: &str, _args: Vec<Term>) -> Result<(), HostFault> {
        Err(Self::unsupported("retract!"))
    }

    fn query(&mut self, _pattern: &Term) -> Result<Term, HostFault> {
        Err(Self::unsupported("query"))
    }

    fn define_rule(&mut self, _name: &str, _head: &Term, _body: &[Term]) -> Result<(), HostFault> {
        Err(Self::unsupported("defrule"))
    }

    fn materialize(&mut self) -> Result<(), HostFault> {
        Err(Self::unsupported("materialize"))
    }

    fn spawn_actor(
        &mut self,
        _name: &str,
        _capacity: usize,
        _function: &str,
        _args: Vec<Term>,
    ) -> Result<(), HostFault> {
        Err(Self::unsupported("spawn-actor"))
    }

    fn send_to(&mut self, _name: &str, _message: Term) -> Result<(), HostFault> {
        Err(Self::unsupported("send-to!"))
    }

    fn receive(&mut self) -> Option<Term> {
        None
    }

    fn actor_state(&self, _name: &str) -> Option<Term> {
        None
    }

    fn random(&mut self) -> f64 {
        self.rng.gen()
    }

    fn random_int(&mut self, low: i64, high: i64) -> i64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    fn random_normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        match Normal::new(mean, std_dev) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => mean,
        }
    }

    fn random_poisson(&mut self, lambda: f64) -> Result<i64, HostFault> {
        if lambda <= 0.0 {
            return Ok(0);
        }
        let dist = Poisson::new(lambda)
            .map_err(|_| HostFault::Unsupported(format!("bad poisson rate {}", lambda)))?;
        Ok(dist.sample(&mut self.rng) as i64)
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }
}
