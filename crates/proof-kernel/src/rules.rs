//! Propositional sequent rules.

use std::fmt;

use crate::error::KernelError;
use crate::expr::Expr;
use crate::sequent::{Position, Sequent};

/// A proof rule: maps a goal to the premises that justify it.
///
/// An empty premise list closes the goal. Rules that operate on a specific
/// formula receive its position; positional rules fail with
/// [`KernelError::MissingPosition`] when called without one.
pub trait Rule: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError>;
}

fn inapplicable(rule: &dyn Rule, reason: impl Into<String>) -> KernelError {
    KernelError::Inapplicable {
        rule: rule.name().to_string(),
        reason: reason.into(),
    }
}

fn require_position(rule: &dyn Rule, position: Option<Position>) -> Result<Position, KernelError> {
    position.ok_or_else(|| KernelError::MissingPosition {
        rule: rule.name().to_string(),
    })
}

/// The formula at `position`, which must be in the succedent (`succ = true`)
/// or antecedent.
fn formula_at<'a>(
    rule: &dyn Rule,
    goal: &'a Sequent,
    position: Position,
    succ: bool,
) -> Result<&'a Expr, KernelError> {
    match (position, succ) {
        (Position::Succ(_), true) | (Position::Ante(_), false) => goal
            .at(position)
            .ok_or_else(|| inapplicable(rule, format!("position {position} out of range in {goal}"))),
        _ => Err(inapplicable(
            rule,
            format!("expected {} position, got {position}", if succ { "a succedent" } else { "an antecedent" }),
        )),
    }
}

/// Closes a goal with `true` in the succedent (at the position, if given).
#[derive(Debug, Clone, Copy)]
pub struct CloseTrue;

impl Rule for CloseTrue {
    fn name(&self) -> &str {
        "closeTrue"
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let found = match position {
            Some(pos) => formula_at(self, goal, pos, true)? == &Expr::tt(),
            None => goal.succ.contains(&Expr::tt()),
        };
        if found {
            Ok(vec![])
        } else {
            Err(inapplicable(self, format!("no true in succedent of {goal}")))
        }
    }
}

/// Closes a goal whose antecedent and succedent share a formula.
#[derive(Debug, Clone, Copy)]
pub struct Identity;

impl Rule for Identity {
    fn name(&self) -> &str {
        "id"
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let found = match position {
            Some(pos @ Position::Succ(_)) => goal.ante.contains(formula_at(self, goal, pos, true)?),
            Some(pos @ Position::Ante(_)) => goal.succ.contains(formula_at(self, goal, pos, false)?),
            None => goal.ante.iter().any(|f| goal.succ.contains(f)),
        };
        if found {
            Ok(vec![])
        } else {
            Err(inapplicable(self, format!("no shared formula in {goal}")))
        }
    }
}

/// `G ==> a & b, D` splits into `G ==> a, D` and `G ==> b, D`.
#[derive(Debug, Clone, Copy)]
pub struct AndRight;

impl Rule for AndRight {
    fn name(&self) -> &str {
        "andR"
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let pos = require_position(self, position)?;
        let (a, b) = formula_at(self, goal, pos, true)?
            .binary("and")
            .ok_or_else(|| inapplicable(self, format!("not a conjunction at {pos}")))?;
        Ok(vec![goal.updated(pos, a.clone()), goal.updated(pos, b.clone())])
    }
}

/// `a & b, G ==> D` becomes `a, G, b ==> D`.
#[derive(Debug, Clone, Copy)]
pub struct AndLeft;

impl Rule for AndLeft {
    fn name(&self) -> &str {
        "andL"
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let pos = require_position(self, position)?;
        let (a, b) = formula_at(self, goal, pos, false)?
            .binary("and")
            .ok_or_else(|| inapplicable(self, format!("not a conjunction at {pos}")))?;
        let mut premise = goal.updated(pos, a.clone());
        premise.ante.push(b.clone());
        Ok(vec![premise])
    }
}

/// `G ==> a | b, D` becomes `G ==> a, D, b`.
#[derive(Debug, Clone, Copy)]
pub struct OrRight;

impl Rule for OrRight {
    fn name(&self) -> &str {
        "orR"
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let pos = require_position(self, position)?;
        let (a, b) = formula_at(self, goal, pos, true)?
            .binary("or")
            .ok_or_else(|| inapplicable(self, format!("not a disjunction at {pos}")))?;
        let mut premise = goal.updated(pos, a.clone());
        premise.succ.push(b.clone());
        Ok(vec![premise])
    }
}

/// `G ==> a -> b, D` becomes `G, a ==> b, D`.
#[derive(Debug, Clone, Copy)]
pub struct ImplyRight;

impl Rule for ImplyRight {
    fn name(&self) -> &str {
        "implyR"
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let pos = require_position(self, position)?;
        let (a, b) = formula_at(self, goal, pos, true)?
            .binary("imp")
            .ok_or_else(|| inapplicable(self, format!("not an implication at {pos}")))?;
        let mut premise = goal.updated(pos, b.clone());
        premise.ante.push(a.clone());
        Ok(vec![premise])
    }
}

/// Weakening: drops the formula at an antecedent position.
#[derive(Debug, Clone, Copy)]
pub struct HideLeft;

impl Rule for HideLeft {
    fn name(&self) -> &str {
        "hideL"
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let pos = require_position(self, position)?;
        formula_at(self, goal, pos, false)?;
        Ok(vec![goal.removed(pos)])
    }
}

/// Weakening: drops the formula at a succedent position.
#[derive(Debug, Clone, Copy)]
pub struct HideRight;

impl Rule for HideRight {
    fn name(&self) -> &str {
        "hideR"
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let pos = require_position(self, position)?;
        formula_at(self, goal, pos, true)?;
        Ok(vec![goal.removed(pos)])
    }
}

/// Cut in `formula`: the goal with `formula` assumed, then the goal with
/// `formula` to be shown.
#[derive(Debug, Clone)]
pub struct Cut {
    pub formula: Expr,
}

impl Rule for Cut {
    fn name(&self) -> &str {
        "cut"
    }

    fn apply(&self, goal: &Sequent, _position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let mut use_cut = goal.clone();
        use_cut.ante.push(self.formula.clone());
        let mut show_cut = goal.clone();
        show_cut.succ.push(self.formula.clone());
        Ok(vec![use_cut, show_cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> Expr {
        Expr::sym("p")
    }

    fn q() -> Expr {
        Expr::sym("q")
    }

    #[test]
    fn test_close_true_with_and_without_position() {
        let g = Sequent::goal(Expr::tt());
        assert!(CloseTrue.apply(&g, None).unwrap().is_empty());
        assert!(CloseTrue.apply(&g, Some(Position::Succ(0))).unwrap().is_empty());
        let err = CloseTrue.apply(&Sequent::goal(p()), None).unwrap_err();
        assert!(matches!(err, KernelError::Inapplicable { .. }));
    }

    #[test]
    fn test_identity_closes_shared_formula() {
        let g = Sequent::new(vec![p()], vec![q(), p()]);
        assert!(Identity.apply(&g, None).unwrap().is_empty());
        assert!(Identity.apply(&g, Some(Position::Succ(1))).unwrap().is_empty());
        assert!(Identity.apply(&g, Some(Position::Succ(0))).is_err());
    }

    #[test]
    fn test_and_right_requires_position() {
        let g = Sequent::goal(Expr::and(p(), q()));
        let err = AndRight.apply(&g, None).unwrap_err();
        assert_eq!(err, KernelError::MissingPosition { rule: "andR".into() });
    }

    #[test]
    fn test_and_right_rejects_antecedent_position() {
        let g = Sequent::new(vec![Expr::and(p(), q())], vec![]);
        assert!(matches!(
            AndRight.apply(&g, Some(Position::Ante(0))),
            Err(KernelError::Inapplicable { .. })
        ));
    }

    #[test]
    fn test_imply_right_moves_antecedent() {
        let g = Sequent::goal(Expr::imp(p(), q()));
        let premises = ImplyRight.apply(&g, Some(Position::Succ(0))).unwrap();
        assert_eq!(premises, vec![Sequent::new(vec![p()], vec![q()])]);
    }

    #[test]
    fn test_and_left_and_or_right() {
        let g = Sequent::new(vec![Expr::and(p(), q())], vec![Expr::or(q(), p())]);
        let l = AndLeft.apply(&g, Some(Position::Ante(0))).unwrap();
        assert_eq!(l[0].ante, vec![p(), q()]);
        let r = OrRight.apply(&g, Some(Position::Succ(0))).unwrap();
        assert_eq!(r[0].succ, vec![q(), p()]);
    }

    #[test]
    fn test_hide_and_cut() {
        let g = Sequent::new(vec![p()], vec![q()]);
        assert_eq!(HideLeft.apply(&g, Some(Position::Ante(0))).unwrap()[0].ante.len(), 0);
        assert_eq!(HideRight.apply(&g, Some(Position::Succ(0))).unwrap()[0].succ.len(), 0);
        let cut = Cut { formula: Expr::sym("c") };
        let premises = cut.apply(&g, None).unwrap();
        assert_eq!(premises.len(), 2);
        assert!(premises[0].ante.contains(&Expr::sym("c")));
        assert!(premises[1].succ.contains(&Expr::sym("c")));
    }
}
