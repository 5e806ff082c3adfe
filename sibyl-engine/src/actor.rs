//! Actors: named continuations with bounded mailboxes
//!
//! An actor is a function symbol plus pending arguments; the scheduler
//! re-invokes that function each time it delivers a message. Mailboxes
//! have a hard capacity with no drain policy; overflow is surfaced to the
//! scheduler, which treats it as fatal to the run.

use serde::{Deserialize, Serialize};
use sibyl_term::Term;
use std::collections::VecDeque;

/// Lifecycle of an actor. `Running → Done` is one-way; `Halted` is
/// reached only by strict-mode protocol enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorStatus {
    Running,
    Done,
    Halted,
}

impl ActorStatus {
    pub fn as_symbol(self) -> &'static str {
        match self {
            ActorStatus::Running => "running",
            ActorStatus::Done => "done",
            ActorStatus::Halted => "halted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub function: String,
    pub args: Vec<Term>,
    pub mailbox: VecDeque<Term>,
    pub capacity: usize,
    pub status: ActorStatus,
    /// Diagnostic from the step that took this actor out of `Running`
    pub fault: Option<String>,
}

impl Actor {
    pub fn new(name: &str, capacity: usize, function: &str, args: Vec<Term>) -> Self {
        Self {
            name: name.to_string(),
            function: function.to_string(),
            args,
            mailbox: VecDeque::new(),
            capacity,
            status: ActorStatus::Running,
            fault: None,
        }
    }

    /// Snapshot as a binding a-list for `actor-state`
    pub fn snapshot(&self) -> Term {
        let mut fields = vec![
            Term::list([Term::symbol("name"), Term::Str(self.name.clone())]),
            Term::list([Term::symbol("status"), Term::symbol(self.status.as_symbol())]),
            Term::list([Term::symbol("function"), Term::symbol(self.function.as_str())]),
            Term::list([Term::symbol("mailbox"), Term::Int(self.mailbox.len() as i64)]),
        ];
        if let Some(fault) = &self.fault {
            fields.push(Term::list([
                Term::symbol("fault"),
                Term::Str(fault.clone()),
            ]));
        }
        Term::List(fields)
    }
}

/// All actors in registration order; the scheduler's iteration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActorTable {
    actors: Vec<Actor>,
}

impl ActorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn clear(&mut self) {
        self.actors.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Actor> {
        self.actors.iter().find(|a| a.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Actor> {
        self.actors.iter_mut().find(|a| a.name == name)
    }

    pub fn at(&self, index: usize) -> Option<&Actor> {
        self.actors.get(index)
    }

    pub fn at_mut(&mut self, index: usize) -> Option<&mut Actor> {
        self.actors.get_mut(index)
    }

    /// Register a new actor at the end of the scheduling order. Fails if
    /// the name is taken.
    pub fn spawn(&mut self, actor: Actor) -> Result<(), String> {
        if self.get(&actor.name).is_some() {
            return Err(actor.name);
        }
        tracing::debug!(
            target: "sibyl::engine",
            actor = %actor.name,
            function = %actor.function,
            capacity = actor.capacity,
            "actor spawned"
        );
        self.actors.push(actor);
        Ok(())
    }

    /// Enqueue a message; `Err` means the mailbox was already full
    pub fn deliver(&mut self, name: &str, message: Term) -> Result<(), DeliveryFailure> {
        let actor = self
            .get_mut(name)
            .ok_or_else(|| DeliveryFailure::Unknown(name.to_string()))?;
        if actor.mailbox.len() >= actor.capacity {
            return Err(DeliveryFailure::Overflow(name.to_string()));
        }
        actor.mailbox.push_back(message);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryFailure {
    Unknown(String),
    Overflow(String),
}
