//! The deterministic scheduler
//!
//! One tick visits every actor in registration order. A running actor
//! with a non-empty mailbox dequeues exactly one message and has its
//! continuation applied with that message available through `receive!`;
//! an empty mailbox defers the whole step to the next tick. Actors
//! spawned during a tick join the rotation on the following tick.
//!
//! The tick counter is the unit of simulated time: facts asserted
//! during a step carry the current tick as their timestamp.

use crate::actor::ActorStatus;
use crate::csp::StepTrace;
use crate::error::{EngineError, Result};
use crate::host::SessionHost;
use crate::session::Session;
use sibyl_lang::{Evaluator, HostFault, LangError};
use sibyl_term::Term;

impl Session {
    /// Run exactly `steps` ticks, idle actors or not
    pub fn run_scheduler(&mut self, steps: u64) -> Result<()> {
        for _ in 0..steps {
            self.clock += 1;
            self.tick()?;
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<()> {
        // spawns during this tick land past `registered` and wait
        let registered = self.actors.len();
        for index in 0..registered {
            let message = {
                let actor = match self.actors.at_mut(index) {
                    Some(actor) => actor,
                    None => continue,
                };
                if actor.status != ActorStatus::Running {
                    continue;
                }
                match actor.mailbox.pop_front() {
                    Some(message) => message,
                    // step-granular deferral, retried next tick
                    None => continue,
                }
            };
            self.step_actor(index, message)?;
        }
        Ok(())
    }

    /// Apply one actor's continuation to one message and interpret the
    /// result. Per-actor faults end that actor; mailbox overflow ends
    /// the run.
    fn step_actor(&mut self, index: usize, message: Term) -> Result<()> {
        let (name, function, args) = match self.actors.at(index) {
            Some(actor) => (
                actor.name.clone(),
                actor.function.clone(),
                actor.args.clone(),
            ),
            None => return Ok(()),
        };

        let callee = match self.arena.lookup(self.root, &function) {
            Some(Term::Closure(closure)) => closure.clone(),
            _ => {
                self.fail_actor(index, format!("continuation {} is not a function", function));
                return Ok(());
            }
        };

        let (result, trace) = {
            let mut host = SessionHost::new(
                &mut self.registry,
                &mut self.knowledge,
                &mut self.actors,
                &mut self.rng,
                self.clock,
                Some(message),
            );
            let mut evaluator = Evaluator::new(&mut self.arena, &mut host);
            let result = evaluator.apply(&callee, args, &function);
            (result, host.step_trace().clone())
        };

        match result {
            Err(LangError::Host(HostFault::MailboxOverflow { actor })) => {
                Err(EngineError::MailboxOverflow { actor })
            }
            Err(error) => {
                self.fail_actor(index, error.to_string());
                Ok(())
            }
            Ok(value) => {
                self.settle_step(index, &name, value, &trace);
                Ok(())
            }
        }
    }

    /// Interpret a completed step's value: a become record keeps the
    /// actor running under its new continuation, anything else is Done
    fn settle_step(&mut self, index: usize, name: &str, value: Term, trace: &StepTrace) {
        let becoming = value
            .as_list()
            .filter(|items| {
                items.len() >= 2
                    && items[0].as_symbol() == Some("become")
                    && items[1].as_symbol().is_some()
            })
            .map(|items| items.to_vec());

        let Some(record) = becoming else {
            if let Some(actor) = self.actors.at_mut(index) {
                actor.status = ActorStatus::Done;
                tracing::debug!(target: "sibyl::engine", actor = name, "actor done");
            }
            return;
        };

        // guard-first check happens at become
        if let Some(mutation) = trace.unguarded_mutation().filter(|_| self.csp.is_enabled()) {
            let halt = self.csp.record(name, self.clock, mutation);
            self.knowledge.assert_at(
                "csp-violation",
                vec![Term::symbol(name), Term::symbol(mutation)],
                self.clock,
            );
            if halt {
                if let Some(actor) = self.actors.at_mut(index) {
                    actor.status = ActorStatus::Halted;
                }
                return;
            }
        }

        if let Some(actor) = self.actors.at_mut(index) {
            if let Some(function) = record[1].as_symbol() {
                actor.function = function.to_string();
            }
            actor.args = record[2..].to_vec();
        }
    }

    fn fail_actor(&mut self, index: usize, fault: String) {
        if let Some(actor) = self.actors.at_mut(index) {
            tracing::warn!(
                target: "sibyl::engine",
                actor = %actor.name,
                %fault,
                "actor faulted"
            );
            actor.status = ActorStatus::Done;
            actor.fault = Some(fault);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sibyl_logic::FactPattern;

    fn var(name: &str) -> Term {
        Term::Var(name.to_string())
    }

    #[test]
    fn test_one_message_per_actor_per_tick() {
        let mut session = Session::new();
        session
            .evaluate("(define (counter n) (receive!) (become counter (+ n 1)))")
            .unwrap();
        session.spawn_actor("c", 8, "counter", vec![Term::Int(0)]).unwrap();
        for _ in 0..3 {
            session.send_to("c", Term::symbol("tick")).unwrap();
        }
        session.run_scheduler(2).unwrap();
        // two ticks, two messages consumed, one left
        let state = session.actor_state("c").unwrap();
        let fields = state.as_list().unwrap();
        let mailbox = fields[3].as_list().unwrap();
        assert_eq!(mailbox[1], Term::Int(1));
        assert_eq!(session.actor_status("c"), Some(ActorStatus::Running));
    }

    #[test]
    fn test_empty_mailbox_defers_step() {
        let mut session = Session::new();
        session
            .evaluate("(define (idle) (receive!) nil)")
            .unwrap();
        session.spawn_actor("i", 4, "idle", vec![]).unwrap();
        session.run_scheduler(5).unwrap();
        assert_eq!(session.actor_status("i"), Some(ActorStatus::Running));
        session.send_to("i", Term::Nil).unwrap();
        session.run_scheduler(1).unwrap();
        assert_eq!(session.actor_status("i"), Some(ActorStatus::Done));
    }

    #[test]
    fn test_facts_carry_tick_timestamps() {
        let mut session = Session::new();
        session
            .evaluate(
                "(define (logger) (let (m (receive!)) (do (assert! (saw m)) (become logger))))",
            )
            .unwrap();
        session.spawn_actor("log", 8, "logger", vec![]).unwrap();
        session.send_to("log", Term::Int(1)).unwrap();
        session.run_scheduler(1).unwrap();
        session.send_to("log", Term::Int(2)).unwrap();
        session.run_scheduler(1).unwrap();

        let pattern = FactPattern::new("saw", vec![var("m")]);
        assert_eq!(session.query_at(&pattern, 1).len(), 1);
        assert_eq!(session.query_at(&pattern, 2).len(), 1);
    }

    #[test]
    fn test_fault_isolation() {
        let mut session = Session::new();
        session
            .evaluate(
                "(define (bad) (receive!) (/ 1 0))
                 (define (good n) (receive!) (become good (+ n 1)))",
            )
            .unwrap();
        session.spawn_actor("bad", 4, "bad", vec![]).unwrap();
        session.spawn_actor("good", 4, "good", vec![Term::Int(0)]).unwrap();
        session.send_to("bad", Term::Nil).unwrap();
        session.send_to("good", Term::Nil).unwrap();
        session.run_scheduler(1).unwrap();

        assert_eq!(session.actor_status("bad"), Some(ActorStatus::Done));
        assert_eq!(session.actor_status("good"), Some(ActorStatus::Running));
        let state = session.actor_state("bad").unwrap();
        assert_eq!(state.as_list().unwrap().len(), 5);
    }

    #[test]
    fn test_mailbox_overflow_is_fatal() {
        let mut session = Session::new();
        session
            .evaluate(
                "(define (flooder) (receive!) (do
                   (send-to! 'sink 1) (send-to! 'sink 2) (send-to! 'sink 3)
                   (become flooder)))
                 (define (sink) (receive!) (become sink))",
            )
            .unwrap();
        session.spawn_actor("flood", 4, "flooder", vec![]).unwrap();
        session.spawn_actor("sink", 2, "sink", vec![]).unwrap();
        session.send_to("flood", Term::symbol("go")).unwrap();
        let result = session.run_scheduler(1);
        assert_eq!(
            result,
            Err(EngineError::MailboxOverflow {
                actor: "sink".to_string()
            })
        );
    }

    #[test]
    fn test_spawned_actor_joins_next_tick() {
        let mut session = Session::new();
        session
            .evaluate(
                "(define (parent) (receive!) (do
                   (spawn-actor 'child 4 'echo)
                   (send-to! 'child 'hello)
                   nil))
                 (define (echo) (let (m (receive!)) (do (assert! (echoed m)) nil)))",
            )
            .unwrap();
        session.spawn_actor("parent", 4, "parent", vec![]).unwrap();
        session.send_to("parent", Term::symbol("go")).unwrap();

        session.run_scheduler(1).unwrap();
        let pattern = FactPattern::new("echoed", vec![var("m")]);
        assert!(session.query(&pattern).is_empty());

        session.run_scheduler(1).unwrap();
        assert_eq!(session.query(&pattern).len(), 1);
    }

    #[test]
    fn test_strict_csp_halts_unguarded_actor() {
        let mut session = Session::new();
        session.csp_enforce(true, true);
        session
            .evaluate(
                "(define (pushy) (do (register-set! 'x 1) (receive!) (become pushy)))",
            )
            .unwrap();
        session.spawn_actor("p", 4, "pushy", vec![]).unwrap();
        session.send_to("p", Term::Nil).unwrap();
        session.run_scheduler(1).unwrap();

        assert_eq!(session.actor_status("p"), Some(ActorStatus::Halted));
        assert_eq!(session.csp_violations().len(), 1);
        assert_eq!(session.csp_violations()[0].mutation, "register-set!");
        let pattern = FactPattern::new("csp-violation", vec![var("a"), var("w")]);
        assert_eq!(session.query(&pattern).len(), 1);
    }

    #[test]
    fn test_lenient_csp_records_and_continues() {
        let mut session = Session::new();
        session.csp_enforce(true, false);
        session
            .evaluate(
                "(define (pushy) (do (register-set! 'x 1) (receive!) (become pushy)))",
            )
            .unwrap();
        session.spawn_actor("p", 4, "pushy", vec![]).unwrap();
        session.send_to("p", Term::Nil).unwrap();
        session.run_scheduler(1).unwrap();

        assert_eq!(session.actor_status("p"), Some(ActorStatus::Running));
        assert_eq!(session.csp_violations().len(), 1);
    }

    #[test]
    fn test_monitoring_off_by_default_leaves_history_untouched() {
        let mut session = Session::new();
        session
            .evaluate(
                "(define (pushy) (do (register-set! 'x 1) (receive!) (become pushy)))",
            )
            .unwrap();
        session.spawn_actor("p", 4, "pushy", vec![]).unwrap();
        session.send_to("p", Term::Nil).unwrap();
        session.run_scheduler(2).unwrap();

        assert_eq!(session.actor_status("p"), Some(ActorStatus::Running));
        assert!(session.csp_violations().is_empty());
        let pattern = FactPattern::new("csp-violation", vec![var("a"), var("w")]);
        assert!(session.query(&pattern).is_empty());
    }

    #[test]
    fn test_guarded_step_is_clean() {
        let mut session = Session::new();
        session.csp_enforce(true, true);
        session
            .evaluate(
                "(define (polite) (let (m (receive!)) (do (register-set! 'x m) (become polite))))",
            )
            .unwrap();
        session.spawn_actor("p", 4, "polite", vec![]).unwrap();
        session.send_to("p", Term::Int(7)).unwrap();
        session.run_scheduler(1).unwrap();

        assert_eq!(session.actor_status("p"), Some(ActorStatus::Running));
        assert!(session.csp_violations().is_empty());
        assert_eq!(session.registry_get("x"), Some(Term::Int(7)));
    }
}
