//! Arena-backed environment frames
//!
//! Closures share the frame chain active at their definition point, and
//! recursive definitions point back at their own frame. Index-based frames
//! make that sharing trivial: there are no ownership cycles to break, and
//! frames are reclaimed wholesale when the arena is cleared at reset
//! rather than freed individually mid-run.

use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Index of a frame inside an [`EnvArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvId(pub usize);

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env:{}", self.0)
    }
}

/// One mapping frame in the chain
#[derive(Debug, Clone, Default)]
struct Frame {
    bindings: HashMap<String, Term>,
    parent: Option<EnvId>,
}

/// Arena of environment frames
///
/// Lookup walks the parent chain outward. A frame is mutated only by
/// `define` in the scope that owns it; frames reachable from a closure are
/// read-only after the defining scope finishes.
#[derive(Debug, Clone, Default)]
pub struct EnvArena {
    frames: Vec<Frame>,
}

impl EnvArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a root frame with no parent
    pub fn root(&mut self) -> EnvId {
        self.alloc(None)
    }

    /// Allocate a child frame chained to `parent`
    pub fn child(&mut self, parent: EnvId) -> EnvId {
        self.alloc(Some(parent))
    }

    fn alloc(&mut self, parent: Option<EnvId>) -> EnvId {
        let id = EnvId(self.frames.len());
        self.frames.push(Frame {
            bindings: HashMap::new(),
            parent,
        });
        id
    }

    /// Bind `name` in exactly the given frame
    pub fn define(&mut self, env: EnvId, name: impl Into<String>, value: Term) {
        self.frames[env.0].bindings.insert(name.into(), value);
    }

    /// Walk the chain outward looking for `name`
    pub fn lookup(&self, env: EnvId, name: &str) -> Option<&Term> {
        let mut current = Some(env);
        while let Some(id) = current {
            let frame = &self.frames[id.0];
            if let Some(value) = frame.bindings.get(name) {
                return Some(value);
            }
            current = frame.parent;
        }
        None
    }

    /// True when `name` resolves anywhere in the chain
    pub fn is_bound(&self, env: EnvId, name: &str) -> bool {
        self.lookup(env, name).is_some()
    }

    /// Number of live frames
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Drop every frame at once; the session allocates a fresh root after
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
