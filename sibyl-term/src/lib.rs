//! Shared term model for the sibyl runtime
//!
//! This crate provides the value representation used by every other
//! sibyl crate:
//! - `Term`: the tagged union shared by the evaluator and the logic engine
//! - `EnvArena`/`EnvId`: arena-backed environment frames for closures
//! - `unify`: structural unification over terms
//! - `Span`: byte ranges for lexer and parser diagnostics

pub mod env;
pub mod span;
pub mod term;
pub mod unify;

pub use env::{EnvArena, EnvId};
pub use span::Span;
pub use term::{Closure, Term};
pub use unify::{substitute, unify, unify_slices, walk, Bindings};
