use serde::{Deserialize, Serialize};
use sibyl_lang::LangError;
use sibyl_logic::LogicError;

/// Session-level failures
///
/// Per-actor evaluation faults are not errors at this level; they are
/// recorded on the faulting actor and the run continues. Only conditions
/// that invalidate the whole run surface here.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum EngineError {
    #[error(transparent)]
    Lang(#[from] LangError),

    #[error(transparent)]
    Logic(#[from] LogicError),

    #[error("Mailbox overflow sending to actor {actor}")]
    MailboxOverflow { actor: String },

    #[error("Unknown actor: {name}")]
    UnknownActor { name: String },

    #[error("Actor {name} already exists")]
    DuplicateActor { name: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
