//! The universal value representation
//!
//! Every value flowing through sibyl is a `Term`: dialect source parses to
//! terms, the evaluator produces terms, facts carry terms as arguments, and
//! logic patterns are terms containing variables.

use crate::env::EnvId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A user-defined function: parameter names, a body term, and the
/// environment frame captured at definition time.
///
/// The captured frame is an arena index, so closures never form ownership
/// cycles even when they are recursive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Closure {
    pub params: Vec<String>,
    pub body: Arc<Term>,
    pub env: EnvId,
}

/// The tagged union shared by the evaluator and the logic engine
///
/// Lists are immutable once constructed and equality is structural
/// throughout. `Var` is only meaningful inside logic patterns and during
/// unification; the evaluator treats a leftover variable as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Term {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Symbol(String),
    List(Vec<Term>),
    Var(String),
    Closure(Closure),
}

impl Term {
    /// Build a symbol term
    pub fn symbol(name: impl Into<String>) -> Self {
        Term::Symbol(name.into())
    }

    /// Build a string term
    pub fn string(value: impl Into<String>) -> Self {
        Term::Str(value.into())
    }

    /// Build a list term
    pub fn list(items: impl IntoIterator<Item = Term>) -> Self {
        Term::List(items.into_iter().collect())
    }

    /// The dialect's falsiness rule
    ///
    /// Exactly `nil`, `false`, the empty list, integer `0`, and the empty
    /// string are false. Nothing else is: float `0.0` counts as true. This
    /// is a deliberate deviation from conventional Lisp truthiness and is
    /// preserved verbatim because rule and property logic depends on it.
    pub fn is_truthy(&self) -> bool {
        match self {
            Term::Nil | Term::Bool(false) | Term::Int(0) => false,
            Term::List(items) => !items.is_empty(),
            Term::Str(value) => !value.is_empty(),
            _ => true,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Term::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Term::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Term::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric view: integers widen to floats
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Term::Int(value) => Some(*value as f64),
            Term::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Term::Int(_) | Term::Float(_))
    }

    /// True when the term contains no variables (and no closures)
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Var(_) | Term::Closure(_) => false,
            Term::List(items) => items.iter().all(Term::is_ground),
            _ => true,
        }
    }

    /// Short tag naming the term's shape, used in type-mismatch reports
    pub fn kind(&self) -> &'static str {
        match self {
            Term::Nil => "nil",
            Term::Bool(_) => "bool",
            Term::Int(_) => "int",
            Term::Float(_) => "float",
            Term::Str(_) => "string",
            Term::Symbol(_) => "symbol",
            Term::List(_) => "list",
            Term::Var(_) => "variable",
            Term::Closure(_) => "closure",
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Nil => write!(f, "nil"),
            Term::Bool(value) => write!(f, "{}", value),
            Term::Int(value) => write!(f, "{}", value),
            Term::Float(value) => {
                if value.fract() == 0.0 && value.is_finite() {
                    write!(f, "{:.1}", value)
                } else {
                    write!(f, "{}", value)
                }
            }
            Term::Str(value) => write!(f, "{:?}", value),
            Term::Symbol(name) => write!(f, "{}", name),
            Term::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Term::Var(name) => write!(f, "?{}", name),
            Term::Closure(closure) => {
                write!(f, "#<closure ({})>", closure.params.join(" "))
            }
        }
    }
}

impl From<i64> for Term {
    fn from(value: i64) -> Self {
        Term::Int(value)
    }
}

impl From<f64> for Term {
    fn from(value: f64) -> Self {
        Term::Float(value)
    }
}

impl From<bool> for Term {
    fn from(value: bool) -> Self {
        Term::Bool(value)
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::Str(value.to_string())
    }
}
