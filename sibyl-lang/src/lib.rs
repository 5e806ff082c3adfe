//! Lexer, parser, and evaluator for the sibyl dialect
//!
//! The dialect is a small s-expression language with closures, a single
//! local binding form, and a deliberately exact falsiness rule (`nil`,
//! `false`, `()`, integer `0`, and `""` are false; nothing else is).
//! Effectful builtins reach the surrounding runtime through the
//! [`Host`] trait, so this crate knows nothing about actors or the fact
//! store beyond that seam.

mod builtins;

pub mod error;
pub mod eval;
pub mod host;
pub mod lexer;
pub mod parser;

pub use error::{LangError, Result};
pub use eval::{run, Evaluator};
pub use host::{Host, HostFault, NullHost};
pub use lexer::{tokenize, SpannedToken, Token};
pub use parser::{parse, parse_one, Parser};
