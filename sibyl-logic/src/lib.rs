//! Timestamped fact store, derivation rules, and temporal checking
//!
//! This crate is the logic half of the runtime:
//! - [`store`] keeps ground facts with the scheduler tick at which each
//!   was asserted, and answers unification queries over them
//! - [`rules`] derives new facts to a fixpoint, with stratified negation
//!   and builtin comparison filters
//! - [`knowledge`] bundles facts and rules behind a cached
//!   materialization
//! - [`ctl`] checks always/eventually/never-style properties against the
//!   recorded history and produces counterexamples

pub mod ctl;
pub mod error;
pub mod knowledge;
pub mod rules;
pub mod store;

pub use ctl::{CheckResult, Counterexample, Formula, PropertyTable};
pub use error::{LogicError, Result};
pub use knowledge::Knowledge;
pub use rules::{CmpOp, Condition, Rule, RuleSet};
pub use store::{Fact, FactPattern, FactStore, Match};
