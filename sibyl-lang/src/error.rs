use crate::host::HostFault;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use sibyl_term::Span;

/// Errors that can occur while lexing, parsing, or evaluating dialect code
///
/// All of these are recoverable at the call site: a parse error aborts the
/// enclosing load, evaluation errors abort only the offending top-level
/// form, and the scheduler turns them into per-actor faults.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum LangError {
    #[error("Parse error at {span}: {message}")]
    Parse { span: Span, message: String },

    #[error("Unbound symbol: {name}")]
    UnboundSymbol { name: String },

    #[error("Arity mismatch calling {name}: expected {expected}, got {got}")]
    ArityMismatch {
        name: String,
        expected: String,
        got: usize,
    },

    #[error("Type mismatch in {builtin}: expected {expected}, got {got}")]
    TypeMismatch {
        builtin: String,
        expected: String,
        got: String,
    },

    #[error("Variable ?{name} is only meaningful inside a pattern")]
    StrayVariable { name: String },

    #[error(transparent)]
    Host(#[from] HostFault),
}

impl LangError {
    pub(crate) fn parse(span: Span, message: impl Into<String>) -> Self {
        LangError::Parse {
            span,
            message: message.into(),
        }
    }

    pub(crate) fn type_mismatch(
        builtin: &str,
        expected: impl Into<String>,
        got: impl fmt::Display,
    ) -> Self {
        LangError::TypeMismatch {
            builtin: builtin.to_string(),
            expected: expected.into(),
            got: got.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LangError>;
