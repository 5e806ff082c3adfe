//! Structural unification over terms
//!
//! Used two ways: by the logic engine for pattern matching against facts
//! (where a non-match just means "try the next candidate") and by the CTL
//! checker for matching formulas against history. Failure is always
//! non-fatal and reported as `None`.

use crate::term::Term;
use std::collections::HashMap;

/// Variable bindings accumulated during unification
pub type Bindings = HashMap<String, Term>;

/// Resolve a term through the bindings until it is not a bound variable
pub fn walk<'a>(term: &'a Term, bindings: &'a Bindings) -> &'a Term {
    let mut current = term;
    while let Term::Var(name) = current {
        match bindings.get(name) {
            Some(next) => current = next,
            None => break,
        }
    }
    current
}

/// Substitute bound variables throughout a term, leaving unbound ones
pub fn substitute(term: &Term, bindings: &Bindings) -> Term {
    match walk(term, bindings) {
        Term::List(items) => Term::List(items.iter().map(|t| substitute(t, bindings)).collect()),
        other => other.clone(),
    }
}

fn occurs(name: &str, term: &Term, bindings: &Bindings) -> bool {
    match walk(term, bindings) {
        Term::Var(other) => other == name,
        Term::List(items) => items.iter().any(|item| occurs(name, item, bindings)),
        _ => false,
    }
}

/// Unify two terms under the given bindings
///
/// Ground terms unify iff structurally equal. A variable unifies with
/// anything, binding it unless it is already bound to a conflicting term.
/// Lists unify element-wise and only when lengths agree.
pub fn unify(a: &Term, b: &Term, bindings: &Bindings) -> Option<Bindings> {
    let left = walk(a, bindings).clone();
    let right = walk(b, bindings).clone();

    match (&left, &right) {
        (Term::Var(name), other) | (other, Term::Var(name)) => {
            if let Term::Var(other_name) = other {
                if other_name == name {
                    return Some(bindings.clone());
                }
            }
            if occurs(name, other, bindings) {
                return None;
            }
            let mut extended = bindings.clone();
            extended.insert(name.clone(), other.clone());
            Some(extended)
        }
        (Term::List(xs), Term::List(ys)) => unify_slices(xs, ys, bindings),
        (x, y) if x == y => Some(bindings.clone()),
        _ => None,
    }
}

/// Unify two sequences element-wise; length mismatch is a non-match
pub fn unify_slices(xs: &[Term], ys: &[Term], bindings: &Bindings) -> Option<Bindings> {
    if xs.len() != ys.len() {
        return None;
    }
    let mut current = bindings.clone();
    for (x, y) in xs.iter().zip(ys) {
        current = unify(x, y, &current)?;
    }
    Some(current)
}
