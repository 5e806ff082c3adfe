//! The runtime engine: actors, scheduling, shared state, and the
//! session facade
//!
//! - [`session`] is the public entry point; a [`Session`] owns all run
//!   state and exposes evaluation, actor control, fact and rule access,
//!   and property checking
//! - [`scheduler`] drives actors in deterministic registration order,
//!   one message per actor per tick
//! - [`actor`] holds the actor table and bounded mailboxes
//! - [`csp`] monitors the guard-first protocol
//! - [`host`] implements the evaluator's host seam over session state

pub mod actor;
pub mod csp;
pub mod error;
pub mod host;
pub mod registry;
pub mod scheduler;
pub mod session;

pub use actor::{Actor, ActorStatus, ActorTable};
pub use csp::{CspMonitor, CspViolation};
pub use error::{EngineError, Result};
pub use host::{EngineRng, SessionHost};
pub use registry::Registry;
pub use session::{Session, DEFAULT_SEED};
