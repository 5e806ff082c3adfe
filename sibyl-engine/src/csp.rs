//! Guard-first protocol monitoring
//!
//! A well-behaved actor step receives its message before performing any
//! mutating effect (registry set, send, fact assertion or retraction).
//! The monitor is off by default. Once enabled it records each step that
//! mutated before its first receive; under strict enforcement the
//! offending actor is halted, under lenient enforcement it keeps running
//! and the violation stays queryable.

use serde::{Deserialize, Serialize};

/// What one actor step did, in order, as far as the protocol cares
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepTrace {
    received: bool,
    first_unguarded: Option<String>,
}

impl StepTrace {
    pub fn note_receive(&mut self) {
        self.received = true;
    }

    pub fn note_mutation(&mut self, what: &str) {
        if !self.received && self.first_unguarded.is_none() {
            self.first_unguarded = Some(what.to_string());
        }
    }

    /// The mutation that ran before the step's first receive, if any
    pub fn unguarded_mutation(&self) -> Option<&str> {
        self.first_unguarded.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CspViolation {
    pub actor: String,
    pub tick: u64,
    pub mutation: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CspMonitor {
    enabled: bool,
    strict: bool,
    violations: Vec<CspViolation>,
}

impl CspMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enforcement(&mut self, enabled: bool, strict: bool) {
        self.enabled = enabled;
        self.strict = strict;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Record a violation; returns true when the actor must be halted
    pub fn record(&mut self, actor: &str, tick: u64, mutation: &str) -> bool {
        tracing::warn!(
            target: "sibyl::engine",
            actor,
            tick,
            mutation,
            strict = self.strict,
            "guard-first violation"
        );
        self.violations.push(CspViolation {
            actor: actor.to_string(),
            tick,
            mutation: mutation.to_string(),
        });
        self.strict
    }

    pub fn violations(&self) -> &[CspViolation] {
        &self.violations
    }

    pub fn clear(&mut self) {
        self.violations.clear();
    }
}
