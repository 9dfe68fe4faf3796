//! Kernel operations composed the way the tactic engine drives them.

use proof_kernel::rules::{AndRight, CloseTrue, ImplyRight};
use proof_kernel::{match_sequent, Certificate, Expr, KernelError, Position, Sequent, Substitution};

fn p() -> Expr {
    Expr::sym("p")
}

/// Proving a subgoal separately and splicing it back gives the same
/// certificate as applying the rules in place.
#[test]
fn test_splice_matches_in_place_derivation() {
    let goal = Sequent::goal(Expr::and(Expr::imp(p(), p()), Expr::tt()));
    let parent = Certificate::start(goal)
        .apply_rule(0, &AndRight, Some(Position::Succ(0)))
        .unwrap();

    let child = Certificate::start(parent.subgoal(0).unwrap().clone())
        .apply_rule(0, &ImplyRight, Some(Position::Succ(0)))
        .unwrap();
    let (spliced, inserted) = parent.splice_child(0, &child, None).unwrap();
    assert_eq!(inserted, 1);

    let in_place = parent.apply_rule(0, &ImplyRight, Some(Position::Succ(0))).unwrap();
    assert_eq!(spliced, in_place);

    let finished = spliced.apply_rule(1, &CloseTrue, None).unwrap();
    assert_eq!(finished.subgoals(), &[Sequent::new(vec![p()], vec![p()])]);
}

#[test]
fn test_splice_under_substitution() {
    let parent = Certificate::start(Sequent::goal(Expr::and(p(), p())))
        .apply_rule(0, &AndRight, Some(Position::Succ(0)))
        .unwrap();
    let child = Certificate::start(Sequent::goal(Expr::tt()))
        .apply_rule(0, &CloseTrue, None)
        .unwrap();

    assert!(matches!(
        parent.splice_child(0, &child, None),
        Err(KernelError::ConclusionMismatch { .. })
    ));

    let s = Substitution::single("p", Expr::tt());
    let (merged, inserted) = parent.splice_child(0, &child, Some(&s)).unwrap();
    assert_eq!(inserted, 0);
    assert_eq!(merged.conclusion(), &Sequent::goal(Expr::and(Expr::tt(), Expr::tt())));
    assert!(merged.apply_rule(0, &CloseTrue, None).unwrap().is_closed());
}

#[test]
fn test_matched_pattern_instantiates_to_target() {
    let pattern = Sequent::goal(Expr::and(Expr::sym("a"), Expr::sym("b")));
    let target = Sequent::goal(Expr::and(p(), Expr::geq(Expr::var("x"), Expr::num(0))));
    let subst = match_sequent(&pattern, &target).unwrap();
    assert_eq!(subst.len(), 2);
    assert_eq!(subst.apply_sequent(&pattern).unwrap(), target);

    assert!(match_sequent(&pattern, &Sequent::goal(p())).is_none());
}

#[test]
fn test_substitution_clashes() {
    let square = Expr::pow(Expr::var("x"), Expr::num(2));
    let bound = Expr::forall("x", Expr::geq(Expr::sym("j"), Expr::num(0)));
    let capture = Substitution::single("j", square.clone());
    assert!(matches!(capture.apply(&bound), Err(KernelError::Clash(_))));
    assert_eq!(
        capture.apply(&Expr::geq(Expr::sym("j"), Expr::num(0))).unwrap(),
        Expr::geq(square, Expr::num(0))
    );

    let both = Substitution::single("j", Expr::num(1)).compose(&Substitution::single("j", Expr::num(2)));
    let cert = Certificate::start(Sequent::goal(Expr::sym("j")));
    assert!(matches!(cert.apply_substitution(&both), Err(KernelError::Clash(_))));

    let twice = Substitution::single("j", Expr::num(1)).compose(&Substitution::single("j", Expr::num(1)));
    assert_eq!(twice.len(), 1);
}
