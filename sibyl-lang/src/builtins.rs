//! Evaluator-resident procedures
//!
//! Builtins receive already-evaluated arguments. Pure builtins compute
//! directly; effectful ones go through the host, and the mutating ones
//! (`register-set!`, `send-to!`, `assert!`, `retract!`) report themselves
//! to the CSP monitor before performing the effect.

use crate::error::{LangError, Result};
use crate::host::{Host, HostFault};
use sibyl_term::Term;

const BUILTINS: &[&str] = &[
    "+", "-", "*", "/", "mod",
    "=", "!=", "<", "<=", ">", ">=",
    "not",
    "list", "cons", "first", "rest", "nth", "length", "append",
    "str", "print",
    "random", "random-int", "random-normal", "random-poisson", "random-seed!",
    "register-get", "register-set!",
    "spawn-actor", "send-to!", "receive!", "actor-state",
    "assert!", "retract!", "query", "materialize",
];

pub(crate) fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

pub(crate) fn call<H: Host>(host: &mut H, name: &str, args: Vec<Term>) -> Result<Term> {
    match name {
        "+" => fold_numeric(name, args, Numeric::Int(0), |a, b| a + b, |a, b| a + b),
        "*" => fold_numeric(name, args, Numeric::Int(1), |a, b| a * b, |a, b| a * b),
        "-" => sub_or_div(name, args, |a, b| a - b, |a, b| a - b),
        "/" => divide(name, args),
        "mod" => modulo(args),
        "=" => chain(name, args, |a, b| Ok(a == b)),
        "!=" => {
            let (a, b) = two(name, &args)?;
            Ok(Term::Bool(a != b))
        }
        "<" => numeric_chain(name, args, |a, b| a < b),
        "<=" => numeric_chain(name, args, |a, b| a <= b),
        ">" => numeric_chain(name, args, |a, b| a > b),
        ">=" => numeric_chain(name, args, |a, b| a >= b),
        "not" => {
            let value = one(name, &args)?;
            Ok(Term::Bool(!value.is_truthy()))
        }
        "list" => Ok(Term::List(args)),
        "cons" => {
            let (head, tail) = two(name, &args)?;
            let tail = expect_list(name, tail)?;
            let mut items = Vec::with_capacity(tail.len() + 1);
            items.push(head.clone());
            items.extend(tail.iter().cloned());
            Ok(Term::List(items))
        }
        "first" => {
            let list = expect_list(name, one(name, &args)?)?;
            Ok(list.first().cloned().unwrap_or(Term::Nil))
        }
        "rest" => {
            let list = expect_list(name, one(name, &args)?)?;
            Ok(Term::List(list.iter().skip(1).cloned().collect()))
        }
        "nth" => {
            let (list, index) = two(name, &args)?;
            let list = expect_list(name, list)?;
            let index = expect_int(name, index)?;
            if index < 0 {
                return Ok(Term::Nil);
            }
            Ok(list.get(index as usize).cloned().unwrap_or(Term::Nil))
        }
        "length" => {
            let list = expect_list(name, one(name, &args)?)?;
            Ok(Term::Int(list.len() as i64))
        }
        "append" => {
            let mut items = Vec::new();
            for arg in &args {
                items.extend(expect_list(name, arg)?.iter().cloned());
            }
            Ok(Term::List(items))
        }
        "str" => {
            let mut out = String::new();
            for arg in &args {
                match arg {
                    Term::Str(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
            }
            Ok(Term::Str(out))
        }
        "print" => {
            let rendered: Vec<String> = args
                .iter()
                .map(|arg| match arg {
                    Term::Str(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            tracing::info!(target: "sibyl::dialect", "{}", rendered.join(" "));
            Ok(Term::Nil)
        }
        "random" => {
            none(name, &args)?;
            Ok(Term::Float(host.random()))
        }
        "random-int" => {
            let (low, high) = two(name, &args)?;
            let low = expect_int(name, low)?;
            let high = expect_int(name, high)?;
            Ok(Term::Int(host.random_int(low, high)))
        }
        "random-normal" => {
            let (mean, std_dev) = two(name, &args)?;
            let mean = expect_number(name, mean)?;
            let std_dev = expect_number(name, std_dev)?;
            Ok(Term::Float(host.random_normal(mean, std_dev)))
        }
        "random-poisson" => {
            let lambda = expect_number(name, one(name, &args)?)?;
            Ok(Term::Int(host.random_poisson(lambda)?))
        }
        "random-seed!" => {
            let seed = expect_int(name, one(name, &args)?)?;
            host.reseed(seed as u64);
            Ok(Term::Nil)
        }
        "register-get" => {
            let key = expect_name(name, one(name, &args)?)?;
            Ok(host.registry_get(key).unwrap_or(Term::Nil))
        }
        "register-set!" => {
            let (key, value) = two(name, &args)?;
            let key = expect_name(name, key)?;
            host.note_mutation("register-set!");
            host.registry_set(key, value.clone());
            Ok(value.clone())
        }
        "spawn-actor" => spawn_actor(host, args),
        "send-to!" => {
            let (target, message) = two(name, &args)?;
            let target = expect_name(name, target)?;
            host.note_mutation("send-to!");
            host.send_to(target, message.clone())?;
            Ok(Term::Nil)
        }
        "receive!" => {
            none(name, &args)?;
            host.note_receive();
            host.receive().ok_or_else(|| {
                LangError::Host(HostFault::Unsupported(
                    "receive! called outside an actor step".to_string(),
                ))
            })
        }
        "actor-state" => {
            let actor = expect_name(name, one(name, &args)?)?;
            Ok(host.actor_state(actor).unwrap_or(Term::Nil))
        }
        "assert!" => {
            let (predicate, fact_args) = fact_shape(name, &args)?;
            host.note_mutation("assert!");
            host.assert_fact(&predicate, fact_args)?;
            Ok(Term::Nil)
        }
        "retract!" => {
            let (predicate, fact_args) = fact_shape(name, &args)?;
            host.note_mutation("retract!");
            host.retract_fact(&predicate, fact_args)?;
            Ok(Term::Nil)
        }
        "query" => {
            let pattern = one(name, &args)?;
            Ok(host.query(pattern)?)
        }
        "materialize" => {
            none(name, &args)?;
            host.materialize()?;
            Ok(Term::Nil)
        }
        _ => Err(LangError::UnboundSymbol {
            name: name.to_string(),
        }),
    }
}

fn spawn_actor<H: Host>(host: &mut H, args: Vec<Term>) -> Result<Term> {
    if args.len() < 3 {
        return Err(LangError::ArityMismatch {
            name: "spawn-actor".to_string(),
            expected: "at least 3".to_string(),
            got: args.len(),
        });
    }
    let actor = expect_name("spawn-actor", &args[0])?.to_string();
    let capacity = expect_int("spawn-actor", &args[1])?;
    if capacity <= 0 {
        return Err(LangError::type_mismatch(
            "spawn-actor",
            "positive mailbox capacity",
            &args[1],
        ));
    }
    let function = expect_name("spawn-actor", &args[2])?.to_string();
    host.spawn_actor(&actor, capacity as usize, &function, args[3..].to_vec())?;
    Ok(Term::symbol(actor))
}

/// Accepts `(pred arg...)` as one list argument or predicate-first spread
fn fact_shape(name: &str, args: &[Term]) -> Result<(String, Vec<Term>)> {
    match args {
        [Term::List(items)] => {
            let predicate = items
                .first()
                .and_then(Term::as_symbol)
                .ok_or_else(|| {
                    LangError::type_mismatch(name, "fact list with symbol predicate", &args[0])
                })?
                .to_string();
            Ok((predicate, items[1..].to_vec()))
        }
        [predicate, rest @ ..] => {
            let predicate = expect_name(name, predicate)?.to_string();
            Ok((predicate, rest.to_vec()))
        }
        [] => Err(LangError::ArityMismatch {
            name: name.to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        }),
    }
}

#[derive(Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
}

fn numeric(builtin: &str, term: &Term) -> Result<Numeric> {
    match term {
        Term::Int(value) => Ok(Numeric::Int(*value)),
        Term::Float(value) => Ok(Numeric::Float(*value)),
        other => Err(LangError::type_mismatch(builtin, "number", other)),
    }
}

fn fold_numeric(
    builtin: &str,
    args: Vec<Term>,
    init: Numeric,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Term> {
    let mut acc = init;
    for arg in &args {
        acc = match (acc, numeric(builtin, arg)?) {
            (Numeric::Int(a), Numeric::Int(b)) => Numeric::Int(int_op(a, b)),
            (a, b) => Numeric::Float(float_op(as_float(a), as_float(b))),
        };
    }
    Ok(to_term(acc))
}

fn sub_or_div(
    builtin: &str,
    args: Vec<Term>,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Term> {
    if args.is_empty() {
        return Err(LangError::ArityMismatch {
            name: builtin.to_string(),
            expected: "at least 1".to_string(),
            got: 0,
        });
    }
    if args.len() == 1 {
        // unary negation
        return match numeric(builtin, &args[0])? {
            Numeric::Int(v) => Ok(Term::Int(int_op(0, v))),
            Numeric::Float(v) => Ok(Term::Float(float_op(0.0, v))),
        };
    }
    let mut acc = numeric(builtin, &args[0])?;
    for arg in &args[1..] {
        acc = match (acc, numeric(builtin, arg)?) {
            (Numeric::Int(a), Numeric::Int(b)) => Numeric::Int(int_op(a, b)),
            (a, b) => Numeric::Float(float_op(as_float(a), as_float(b))),
        };
    }
    Ok(to_term(acc))
}

fn divide(builtin: &str, args: Vec<Term>) -> Result<Term> {
    if args.len() < 2 {
        return Err(LangError::ArityMismatch {
            name: builtin.to_string(),
            expected: "at least 2".to_string(),
            got: args.len(),
        });
    }
    let mut acc = numeric(builtin, &args[0])?;
    for arg in &args[1..] {
        let divisor = numeric(builtin, arg)?;
        if as_float(divisor) == 0.0 {
            return Err(LangError::type_mismatch(builtin, "non-zero divisor", arg));
        }
        acc = match (acc, divisor) {
            (Numeric::Int(a), Numeric::Int(b)) => Numeric::Int(a / b),
            (a, b) => Numeric::Float(as_float(a) / as_float(b)),
        };
    }
    Ok(to_term(acc))
}

fn modulo(args: Vec<Term>) -> Result<Term> {
    let (a, b) = two("mod", &args)?;
    let a = expect_int("mod", a)?;
    let b = expect_int("mod", b)?;
    if b == 0 {
        return Err(LangError::type_mismatch("mod", "non-zero divisor", &args[1]));
    }
    Ok(Term::Int(a.rem_euclid(b)))
}

fn as_float(value: Numeric) -> f64 {
    match value {
        Numeric::Int(v) => v as f64,
        Numeric::Float(v) => v,
    }
}

fn to_term(value: Numeric) -> Term {
    match value {
        Numeric::Int(v) => Term::Int(v),
        Numeric::Float(v) => Term::Float(v),
    }
}

fn chain(builtin: &str, args: Vec<Term>, op: fn(&Term, &Term) -> Result<bool>) -> Result<Term> {
    if args.len() < 2 {
        return Err(LangError::ArityMismatch {
            name: builtin.to_string(),
            expected: "at least 2".to_string(),
            got: args.len(),
        });
    }
    for pair in args.windows(2) {
        if !op(&pair[0], &pair[1])? {
            return Ok(Term::Bool(false));
        }
    }
    Ok(Term::Bool(true))
}

fn numeric_chain(builtin: &str, args: Vec<Term>, cmp: fn(f64, f64) -> bool) -> Result<Term> {
    if args.len() < 2 {
        return Err(LangError::ArityMismatch {
            name: builtin.to_string(),
            expected: "at least 2".to_string(),
            got: args.len(),
        });
    }
    for pair in args.windows(2) {
        let a = expect_number(builtin, &pair[0])?;
        let b = expect_number(builtin, &pair[1])?;
        if !cmp(a, b) {
            return Ok(Term::Bool(false));
        }
    }
    Ok(Term::Bool(true))
}

fn one<'a>(builtin: &str, args: &'a [Term]) -> Result<&'a Term> {
    match args {
        [only] => Ok(only),
        _ => Err(LangError::ArityMismatch {
            name: builtin.to_string(),
            expected: "1".to_string(),
            got: args.len(),
        }),
    }
}

fn two<'a>(builtin: &str, args: &'a [Term]) -> Result<(&'a Term, &'a Term)> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(LangError::ArityMismatch {
            name: builtin.to_string(),
            expected: "2".to_string(),
            got: args.len(),
        }),
    }
}

fn none(builtin: &str, args: &[Term]) -> Result<()> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(LangError::ArityMismatch {
            name: builtin.to_string(),
            expected: "0".to_string(),
            got: args.len(),
        })
    }
}

fn expect_list<'a>(builtin: &str, term: &'a Term) -> Result<&'a [Term]> {
    term.as_list()
        .ok_or_else(|| LangError::type_mismatch(builtin, "list", term))
}

fn expect_int(builtin: &str, term: &Term) -> Result<i64> {
    term.as_int()
        .ok_or_else(|| LangError::type_mismatch(builtin, "integer", term))
}

fn expect_number(builtin: &str, term: &Term) -> Result<f64> {
    term.as_f64()
        .ok_or_else(|| LangError::type_mismatch(builtin, "number", term))
}

/// Symbols and strings are both accepted where a name is expected
fn expect_name<'a>(builtin: &str, term: &'a Term) -> Result<&'a str> {
    term.as_symbol()
        .or_else(|| term.as_str())
        .ok_or_else(|| LangError::type_mismatch(builtin, "symbol or string", term))
}
