//! Globally shared symbol → value registry
//!
//! Mutated only through the explicit get/set builtins. Safe to leave
//! unsynchronized: the scheduler runs exactly one actor step at a time.

use serde::{Deserialize, Serialize};
use sibyl_term::Term;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    entries: HashMap<String, Term>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Term> {
        self.entries.get(name).cloned()
    }

    pub fn set(&mut self, name: &str, value: Term) {
        self.entries.insert(name.to_string(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites() {
        let mut registry = Registry::new();
        registry.set("stock", Term::Int(10));
        registry.set("stock", Term::Int(7));
        assert_eq!(registry.get("stock"), Some(Term::Int(7)));
        assert_eq!(registry.len(), 1);
    }
}
