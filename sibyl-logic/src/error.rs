use serde::{Deserialize, Serialize};

/// Errors from the fact store, rule engine, and temporal checker
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum LogicError {
    /// A rule's negated predicate depends on itself, directly or through
    /// other rules. Caught at definition time; evaluation never loops.
    #[error("Unstratifiable rule {rule}: negated predicate {predicate} depends on itself")]
    UnstratifiableRule { rule: String, predicate: String },

    #[error("Malformed fact pattern: {0}")]
    BadPattern(String),

    #[error("Malformed rule condition: {0}")]
    BadCondition(String),

    #[error("Malformed formula: {0}")]
    BadFormula(String),

    #[error("Unknown property: {0}")]
    UnknownProperty(String),
}

pub type Result<T> = std::result::Result<T, LogicError>;
