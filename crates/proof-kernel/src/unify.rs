//! One-way matching of patterns against concrete sequents.

use crate::expr::Expr;
use crate::sequent::Sequent;
use crate::subst::Substitution;

/// Match `pattern` against `target`, treating every [`Expr::Sym`] in the
/// pattern as a placeholder. Returns the substitution that instantiates the
/// pattern to the target.
pub fn match_expr(pattern: &Expr, target: &Expr) -> Option<Substitution> {
    let mut bindings = Vec::new();
    if bind(pattern, target, &mut bindings) {
        Some(Substitution::from_pairs(bindings))
    } else {
        None
    }
}

/// Match a sequent pattern formula by formula. Both sides must have the same
/// number of antecedent and succedent formulas.
pub fn match_sequent(pattern: &Sequent, target: &Sequent) -> Option<Substitution> {
    if pattern.ante.len() != target.ante.len() || pattern.succ.len() != target.succ.len() {
        return None;
    }
    let mut bindings = Vec::new();
    let pairs = pattern
        .ante
        .iter()
        .zip(&target.ante)
        .chain(pattern.succ.iter().zip(&target.succ));
    for (p, t) in pairs {
        if !bind(p, t, &mut bindings) {
            return None;
        }
    }
    Some(Substitution::from_pairs(bindings))
}

fn bind(pattern: &Expr, target: &Expr, bindings: &mut Vec<(String, Expr)>) -> bool {
    match (pattern, target) {
        (Expr::Sym(name), _) => match bindings.iter().find(|(n, _)| n == name) {
            Some((_, bound)) => bound == target,
            None => {
                bindings.push((name.clone(), target.clone()));
                true
            }
        },
        (Expr::App(op, args), Expr::App(op2, args2)) => {
            op == op2
                && args.len() == args2.len()
                && args.iter().zip(args2).all(|(a, b)| bind(a, b, bindings))
        }
        (Expr::Forall(x, body), Expr::Forall(y, body2)) => x == y && bind(body, body2, bindings),
        (p, t) => p == t,
    }
}
