//! The dialect evaluator
//!
//! `Evaluator` interprets terms against arena-backed environments. Special
//! forms are handled here; everything effectful goes through the
//! [`Host`](crate::host::Host) seam so the same evaluator serves both
//! top-level loads and scheduled actor steps.

use crate::builtins;
use crate::error::{LangError, Result};
use crate::host::Host;
use sibyl_term::{Closure, EnvArena, EnvId, Term};
use std::sync::Arc;

/// Evaluates terms against an environment arena and a host
pub struct Evaluator<'a, H: Host> {
    arena: &'a mut EnvArena,
    host: &'a mut H,
}

impl<'a, H: Host> Evaluator<'a, H> {
    pub fn new(arena: &'a mut EnvArena, host: &'a mut H) -> Self {
        Self { arena, host }
    }

    /// Evaluate one term
    pub fn eval(&mut self, term: &Term, env: EnvId) -> Result<Term> {
        match term {
            Term::Nil
            | Term::Bool(_)
            | Term::Int(_)
            | Term::Float(_)
            | Term::Str(_)
            | Term::Closure(_) => Ok(term.clone()),

            Term::Symbol(name) => match self.arena.lookup(env, name) {
                Some(value) => Ok(value.clone()),
                None => Err(LangError::UnboundSymbol { name: name.clone() }),
            },

            Term::Var(name) => Err(LangError::StrayVariable { name: name.clone() }),

            Term::List(items) => {
                if items.is_empty() {
                    return Ok(term.clone());
                }
                self.eval_form(items, env)
            }
        }
    }

    /// Apply a closure to already-evaluated arguments
    ///
    /// `name` is only used in the arity-mismatch report.
    pub fn apply(&mut self, closure: &Closure, args: Vec<Term>, name: &str) -> Result<Term> {
        if args.len() != closure.params.len() {
            return Err(LangError::ArityMismatch {
                name: name.to_string(),
                expected: closure.params.len().to_string(),
                got: args.len(),
            });
        }
        let frame = self.arena.child(closure.env);
        for (param, arg) in closure.params.iter().zip(args) {
            self.arena.define(frame, param.clone(), arg);
        }
        let body = Arc::clone(&closure.body);
        self.eval(body.as_ref(), frame)
    }

    fn eval_form(&mut self, items: &[Term], env: EnvId) -> Result<Term> {
        if let Some(head) = items[0].as_symbol() {
            match head {
                "quote" => return self.form_quote(items),
                "if" => return self.form_if(items, env),
                "define" => return self.form_define(items, env),
                "let" => return self.form_let(items, env),
                "lambda" | "fn" => return self.form_lambda(items, env),
                "do" | "begin" => return self.eval_sequence(&items[1..], env),
                "and" => return self.form_and(items, env),
                "or" => return self.form_or(items, env),
                "become" => return self.form_become(items, env),
                "defrule" => return self.form_defrule(items),
                "assert!" | "retract!" => return self.form_fact(head, items, env),
                "query" => return self.form_query(items, env),
                _ => {}
            }

            // Plain call: user definitions shadow builtins
            if let Some(bound) = self.arena.lookup(env, head) {
                let callee = bound.clone();
                let args = self.eval_args(&items[1..], env)?;
                return self.apply_callee(callee, args, head);
            }
            if builtins::is_builtin(head) {
                let args = self.eval_args(&items[1..], env)?;
                return builtins::call(self.host, head, args);
            }
            return Err(LangError::UnboundSymbol {
                name: head.to_string(),
            });
        }

        // Computed callee, e.g. ((lambda (x) x) 1)
        let callee = self.eval(&items[0], env)?;
        let args = self.eval_args(&items[1..], env)?;
        self.apply_callee(callee, args, "<expression>")
    }

    fn apply_callee(&mut self, callee: Term, args: Vec<Term>, name: &str) -> Result<Term> {
        match callee {
            Term::Closure(closure) => self.apply(&closure, args, name),
            other => Err(LangError::type_mismatch(
                "apply",
                "closure",
                format!("{} ({})", other.kind(), other),
            )),
        }
    }

    fn eval_args(&mut self, args: &[Term], env: EnvId) -> Result<Vec<Term>> {
        args.iter().map(|arg| self.eval(arg, env)).collect()
    }

    fn eval_sequence(&mut self, forms: &[Term], env: EnvId) -> Result<Term> {
        let mut last = Term::Nil;
        for form in forms {
            last = self.eval(form, env)?;
        }
        Ok(last)
    }

    fn form_quote(&mut self, items: &[Term]) -> Result<Term> {
        if items.len() != 2 {
            return Err(arity("quote", "1", items.len() - 1));
        }
        Ok(items[1].clone())
    }

    fn form_if(&mut self, items: &[Term], env: EnvId) -> Result<Term> {
        if items.len() != 3 && items.len() != 4 {
            return Err(arity("if", "2 or 3", items.len() - 1));
        }
        let condition = self.eval(&items[1], env)?;
        if condition.is_truthy() {
            self.eval(&items[2], env)
        } else if let Some(alternative) = items.get(3) {
            self.eval(alternative, env)
        } else {
            Ok(Term::Nil)
        }
    }

    /// `define` mutates the defining frame, not a fresh child: top-level
    /// definitions land in the root environment.
    fn form_define(&mut self, items: &[Term], env: EnvId) -> Result<Term> {
        match items.get(1) {
            Some(Term::Symbol(name)) => {
                if items.len() != 3 {
                    return Err(arity("define", "2", items.len() - 1));
                }
                let value = self.eval(&items[2], env)?;
                self.arena.define(env, name.clone(), value.clone());
                Ok(value)
            }
            // (define (f a b) body...) function sugar
            Some(Term::List(signature)) => {
                let name = signature
                    .first()
                    .and_then(Term::as_symbol)
                    .ok_or_else(|| {
                        LangError::type_mismatch("define", "function name symbol", &items[1])
                    })?
                    .to_string();
                let params = param_names("define", &signature[1..])?;
                let closure = Term::Closure(Closure {
                    params,
                    body: Arc::new(wrap_body(&items[2..])),
                    env,
                });
                self.arena.define(env, name, closure.clone());
                Ok(closure)
            }
            _ => Err(LangError::type_mismatch(
                "define",
                "symbol or signature list",
                items.get(1).map(|t| t.to_string()).unwrap_or_default(),
            )),
        }
    }

    /// `(let (name value) body...)`: one new frame, one binding
    fn form_let(&mut self, items: &[Term], env: EnvId) -> Result<Term> {
        let binding = items
            .get(1)
            .and_then(Term::as_list)
            .ok_or_else(|| {
                LangError::type_mismatch(
                    "let",
                    "(name value) binding",
                    items.get(1).map(|t| t.to_string()).unwrap_or_default(),
                )
            })?;
        if binding.len() != 2 {
            return Err(LangError::type_mismatch(
                "let",
                "(name value) binding",
                Term::List(binding.to_vec()),
            ));
        }
        let name = binding[0]
            .as_symbol()
            .ok_or_else(|| LangError::type_mismatch("let", "binding name symbol", &binding[0]))?
            .to_string();
        let value = self.eval(&binding[1], env)?;
        let frame = self.arena.child(env);
        self.arena.define(frame, name, value);
        self.eval_sequence(&items[2..], frame)
    }

    fn form_lambda(&mut self, items: &[Term], env: EnvId) -> Result<Term> {
        let params_list = items
            .get(1)
            .and_then(Term::as_list)
            .ok_or_else(|| {
                LangError::type_mismatch(
                    "lambda",
                    "parameter list",
                    items.get(1).map(|t| t.to_string()).unwrap_or_default(),
                )
            })?;
        let params = param_names("lambda", params_list)?;
        Ok(Term::Closure(Closure {
            params,
            body: Arc::new(wrap_body(&items[2..])),
            env,
        }))
    }

    fn form_and(&mut self, items: &[Term], env: EnvId) -> Result<Term> {
        let mut last = Term::Bool(true);
        for form in &items[1..] {
            last = self.eval(form, env)?;
            if !last.is_truthy() {
                return Ok(last);
            }
        }
        Ok(last)
    }

    fn form_or(&mut self, items: &[Term], env: EnvId) -> Result<Term> {
        let mut last = Term::Nil;
        for form in &items[1..] {
            last = self.eval(form, env)?;
            if last.is_truthy() {
                return Ok(last);
            }
        }
        Ok(last)
    }

    /// `(become f args...)` evaluates its arguments and yields the become
    /// record the scheduler interprets; the function name stays symbolic.
    fn form_become(&mut self, items: &[Term], env: EnvId) -> Result<Term> {
        let function = items
            .get(1)
            .and_then(Term::as_symbol)
            .ok_or_else(|| {
                LangError::type_mismatch(
                    "become",
                    "function name symbol",
                    items.get(1).map(|t| t.to_string()).unwrap_or_default(),
                )
            })?
            .to_string();
        let mut record = vec![Term::symbol("become"), Term::symbol(function)];
        record.extend(self.eval_args(&items[2..], env)?);
        Ok(Term::List(record))
    }

    fn form_defrule(&mut self, items: &[Term]) -> Result<Term> {
        if items.len() < 4 {
            return Err(arity("defrule", "at least 3", items.len() - 1));
        }
        let name = items[1]
            .as_symbol()
            .ok_or_else(|| LangError::type_mismatch("defrule", "rule name symbol", &items[1]))?;
        let head = &items[2];
        if head.as_list().is_none() {
            return Err(LangError::type_mismatch("defrule", "head pattern list", head));
        }
        self.host.define_rule(name, head, &items[3..])?;
        Ok(Term::Nil)
    }

    /// `assert!` and `retract!` take their fact unevaluated. The
    /// predicate and any unbound symbol stay literal, a bound symbol is
    /// replaced by its value, and a nested list is evaluated as an
    /// expression: `(assert! (inventory bread (- stock sold)))`.
    fn form_fact(&mut self, name: &str, items: &[Term], env: EnvId) -> Result<Term> {
        let (predicate, arg_terms): (String, &[Term]) = match &items[1..] {
            [Term::List(fact)] => {
                let predicate = fact
                    .first()
                    .and_then(Term::as_symbol)
                    .ok_or_else(|| {
                        LangError::type_mismatch(name, "fact list with symbol predicate", &items[1])
                    })?
                    .to_string();
                (predicate, &fact[1..])
            }
            [Term::Symbol(predicate), rest @ ..] => (predicate.clone(), rest),
            _ => return Err(arity(name, "a fact", items.len() - 1)),
        };
        let mut fact = vec![Term::symbol(predicate)];
        for arg in arg_terms {
            fact.push(self.resolve_fact_arg(arg, env)?);
        }
        builtins::call(self.host, name, vec![Term::List(fact)])
    }

    fn resolve_fact_arg(&mut self, arg: &Term, env: EnvId) -> Result<Term> {
        match arg {
            Term::Var(_) => Ok(arg.clone()),
            Term::Symbol(name) => Ok(self
                .arena
                .lookup(env, name)
                .cloned()
                .unwrap_or_else(|| arg.clone())),
            Term::List(_) => self.eval(arg, env),
            other => Ok(other.clone()),
        }
    }

    /// `query` takes one pattern, kept literal apart from bound symbols:
    /// `(query (parent ?x bob))`, `(query (and (p ?x) (q ?x)))`
    fn form_query(&mut self, items: &[Term], env: EnvId) -> Result<Term> {
        if items.len() != 2 {
            return Err(arity("query", "1", items.len() - 1));
        }
        let pattern = self.resolve_pattern(&items[1], env)?;
        builtins::call(self.host, "query", vec![pattern])
    }

    /// Pattern positions never evaluate as calls. The head symbol stays
    /// literal, and sub-lists are resolved as nested patterns.
    fn resolve_pattern(&mut self, pattern: &Term, env: EnvId) -> Result<Term> {
        let items = pattern
            .as_list()
            .ok_or_else(|| LangError::type_mismatch("query", "pattern list", pattern))?;
        let head = items
            .first()
            .and_then(Term::as_symbol)
            .ok_or_else(|| LangError::type_mismatch("query", "pattern head symbol", pattern))?;
        let mut resolved = vec![Term::symbol(head)];
        for arg in &items[1..] {
            let arg = match arg {
                Term::List(_) => self.resolve_pattern(arg, env)?,
                Term::Symbol(name) => self
                    .arena
                    .lookup(env, name)
                    .cloned()
                    .unwrap_or_else(|| arg.clone()),
                other => other.clone(),
            };
            resolved.push(arg);
        }
        Ok(Term::List(resolved))
    }
}

fn arity(name: &str, expected: &str, got: usize) -> LangError {
    LangError::ArityMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        got,
    }
}

fn wrap_body(forms: &[Term]) -> Term {
    match forms {
        [single] => single.clone(),
        _ => {
            let mut body = vec![Term::symbol("do")];
            body.extend(forms.iter().cloned());
            Term::List(body)
        }
    }
}

fn param_names(form: &str, params: &[Term]) -> Result<Vec<String>> {
    params
        .iter()
        .map(|param| {
            param
                .as_symbol()
                .map(str::to_string)
                .ok_or_else(|| LangError::type_mismatch(form, "parameter symbol", param))
        })
        .collect()
}

/// Parse and evaluate every form in `source`, returning the last value
pub fn run<H: Host>(
    source: &str,
    arena: &mut EnvArena,
    env: EnvId,
    host: &mut H,
) -> Result<Term> {
    let forms = crate::parser::parse(source)?;
    let mut evaluator = Evaluator::new(arena, host);
    let mut last = Term::Nil;
    for form in &forms {
        last = evaluator.eval(form, env)?;
    }
    Ok(last)
}
