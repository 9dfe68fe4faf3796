//! Branch combination: one child tactic per open subgoal, folded back into
//! the parent certificate.

use std::sync::Arc;

use proof_kernel::{Certificate, Substitution};

use crate::config::Strategy;
use crate::error::TacticError;
use crate::interpreter::{EvalResult, Interpreter};
use crate::label::BranchLabel;
use crate::subst::{compose_pending, splice_value};
use crate::tactic::{Tactic, TacticRef};
use crate::value::ProofValue;

/// Run `children[i]` on subgoal `i` of `parent` and merge the results.
pub(crate) fn combine(
    interp: &Interpreter,
    children: &[TacticRef],
    parent: &ProofValue,
    depth: usize,
) -> EvalResult {
    let count = parent.subgoal_count();
    if children.len() != count {
        return Err(TacticError::IllFormed(format!(
            "{} branch tactic(s) for {count} open subgoal(s)",
            children.len()
        )));
    }
    let goals = split(parent);
    let results = match interp.strategy() {
        Strategy::Exhaustive => run_exhaustive(interp, children, &goals, depth)?,
        Strategy::Lazy => run_lazy(interp, children, &goals, depth)?,
    };
    merge(parent, &results)
}

/// One single-goal value per open subgoal, each carrying its inherited label.
fn split(parent: &ProofValue) -> Vec<ProofValue> {
    parent
        .cert()
        .subgoals()
        .iter()
        .enumerate()
        .map(|(i, goal)| {
            let label = parent.labels().and_then(|ls| ls.get(i)).cloned();
            ProofValue::from_parts(Certificate::start(goal.clone()), label.map(|l| vec![l]), None)
        })
        .collect()
}

fn run_exhaustive(
    interp: &Interpreter,
    children: &[TacticRef],
    goals: &[ProofValue],
    depth: usize,
) -> Result<Vec<ProofValue>, TacticError> {
    let mut successes = Vec::with_capacity(goals.len());
    let mut failures = Vec::new();
    for (i, (child, goal)) in children.iter().zip(goals).enumerate() {
        match interp.apply(child, goal, depth) {
            Ok(result) => successes.push(result),
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) => {
                tracing::debug!(branch = i, error = %e.root_cause(), "Branch failed");
                failures.push((i, e));
            }
        }
    }
    if failures.is_empty() {
        Ok(successes)
    } else {
        Err(TacticError::CompoundCritical { failures })
    }
}

fn run_lazy(
    interp: &Interpreter,
    children: &[TacticRef],
    goals: &[ProofValue],
    depth: usize,
) -> Result<Vec<ProofValue>, TacticError> {
    let n = goals.len();
    children
        .iter()
        .zip(goals)
        .enumerate()
        .map(|(i, (child, goal))| {
            interp.apply(child, goal, depth).map_err(|e| {
                tracing::debug!(branch = i, error = %e.root_cause(), "Branch failed, skipping the rest");
                e.with_context(format!("branch {i} of {n} failed"))
            })
        })
        .collect()
}

/// Fold per-subgoal results into `parent`, left to right.
///
/// Splicing a child with `k` subgoals into slot `index` shifts the slots of
/// every later sibling by `k - 1`. Substitutions owed by earlier children
/// are applied to later ones before they are spliced.
fn merge(parent: &ProofValue, results: &[ProofValue]) -> EvalResult {
    let mut cert = parent.cert().clone();
    let mut labels = parent.labels().map(<[_]>::to_vec);
    let mut introduced: Option<Substitution> = None;
    let mut index = 0usize;
    for (i, child) in results.iter().enumerate() {
        let before = cert.subgoal_count();
        let (next, inserted) = splice_value(&cert, index, child, introduced.as_ref())
            .map_err(|e| e.with_context(format!("merging branch {i}")))?;
        labels = stitch_labels(labels, child.labels(), index, inserted, before)
            .map_err(|e| e.with_context(format!("merging branch {i}")))?;
        cert = next;
        introduced = compose_pending(introduced, child.pending());
        index += inserted;
    }
    Ok(ProofValue::from_parts(
        cert,
        labels,
        compose_pending(parent.pending().cloned(), introduced.as_ref()),
    ))
}

/// Labels after replacing slot `index` (of `before` slots) by `inserted`
/// child subgoals.
fn stitch_labels(
    parent: Option<Vec<BranchLabel>>,
    child: Option<&[BranchLabel]>,
    index: usize,
    inserted: usize,
    before: usize,
) -> Result<Option<Vec<BranchLabel>>, TacticError> {
    let positional = |k: usize| BranchLabel::top(k.to_string());
    match (parent, child) {
        (Some(ls), _) if index >= ls.len() => Err(TacticError::IllFormed(format!(
            "label slot {index} out of range for {} label(s)",
            ls.len()
        ))),
        (Some(mut ls), Some(cs)) => {
            ls.splice(index..=index, cs.iter().cloned());
            Ok(Some(ls))
        }
        (Some(mut ls), None) => {
            let base = ls[index].clone();
            ls.splice(index..=index, (0..inserted).map(|j| base.child(j.to_string())));
            Ok(Some(ls))
        }
        (None, Some(cs)) => Ok(Some(
            (0..index)
                .map(positional)
                .chain(cs.iter().cloned())
                .chain((index + 1..before).map(positional))
                .collect(),
        )),
        (None, None) => Ok(None),
    }
}

/// Right-folded chain of alternatives: `t0 | (t1 | (... | tn))`.
pub(crate) fn alternatives(tactics: &[TacticRef]) -> Option<TacticRef> {
    let (last, rest) = tactics.split_last()?;
    Some(
        rest.iter()
            .rev()
            .fold(Arc::clone(last), |chain, t| Arc::new(Tactic::Either(Arc::clone(t), chain))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l(name: &str) -> BranchLabel {
        BranchLabel::top(name)
    }

    #[test]
    fn test_stitch_both_labelled() {
        let out = stitch_labels(Some(vec![l("a"), l("b")]), Some(&[l("x"), l("y")]), 1, 2, 2).unwrap();
        assert_eq!(out.unwrap(), vec![l("a"), l("x"), l("y")]);
    }

    #[test]
    fn test_stitch_parent_only_derives_children() {
        let out = stitch_labels(Some(vec![l("a"), l("b")]), None, 0, 2, 2).unwrap().unwrap();
        assert_eq!(out, vec![l("a").child("0"), l("a").child("1"), l("b")]);
    }

    #[test]
    fn test_stitch_child_only_fills_positions() {
        let out = stitch_labels(None, Some(&[l("x")]), 1, 1, 3).unwrap().unwrap();
        assert_eq!(out, vec![l("0"), l("x"), l("2")]);
    }

    #[test]
    fn test_stitch_closed_child_removes_slot() {
        let out = stitch_labels(Some(vec![l("a"), l("b")]), Some(&[]), 0, 0, 2).unwrap();
        assert_eq!(out.unwrap(), vec![l("b")]);
        assert_eq!(stitch_labels(None, None, 0, 3, 1).unwrap(), None);
    }

    #[test]
    fn test_stitch_out_of_range_slot_is_ill_formed() {
        let err = stitch_labels(Some(vec![l("a")]), None, 3, 1, 4).unwrap_err();
        assert_eq!(err.class(), crate::error::ErrorClass::IllFormed);
        assert!(err.to_string().contains("label slot 3 out of range"));
    }

    #[test]
    fn test_alternatives_fold_right() {
        let ts: Vec<TacticRef> = vec![Arc::new(Tactic::Idle), Arc::new(Tactic::Idle), Arc::new(Tactic::Idle)];
        let chain = alternatives(&ts).unwrap();
        assert_eq!(chain.to_string(), "(nil | (nil | nil))");
        assert!(alternatives(&[]).is_none());
    }
}
