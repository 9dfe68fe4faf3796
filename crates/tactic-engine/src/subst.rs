//! Delayed substitution algebra.
//!
//! A delayed value proves the substituted form of its original goal. When
//! such a value is merged into a parent, the parent must be substituted the
//! same way first, and every later sibling must see the accumulated
//! substitution too. These helpers are the only places where pending
//! substitutions are combined.

use proof_kernel::{Certificate, Substitution};

use crate::error::TacticError;
use crate::value::ProofValue;

/// Accumulate `next` after `acc`; absent on both sides stays absent.
pub fn compose_pending(acc: Option<Substitution>, next: Option<&Substitution>) -> Option<Substitution> {
    match (acc, next) {
        (Some(a), Some(n)) => Some(a.compose(n)),
        (Some(a), None) => Some(a),
        (None, Some(n)) => Some(n.clone()),
        (None, None) => None,
    }
}

/// Substitute `value`'s certificate and record `subst` as owed.
pub fn delay(value: &ProofValue, subst: &Substitution) -> Result<ProofValue, TacticError> {
    let cert = value.cert().apply_substitution(subst)?;
    Ok(value.advance(cert).with_pending(subst))
}

/// Merge `child` into subgoal `index` of `parent`.
///
/// `introduced` is what earlier siblings have already imposed on the
/// parent; the child certificate is brought up to date with it before the
/// kernel checks that its conclusion matches. The child's own pending
/// substitution is applied to the parent. Returns the merged certificate
/// and the number of subgoals the child inserted.
pub fn splice_value(
    parent: &Certificate,
    index: usize,
    child: &ProofValue,
    introduced: Option<&Substitution>,
) -> Result<(Certificate, usize), TacticError> {
    let child_cert = match introduced {
        Some(s) => child.cert().apply_substitution(s)?,
        None => child.cert().clone(),
    };
    Ok(parent.splice_child(index, &child_cert, child.pending())?)
}

/// Rebuild the outer proof of a single-subgoal `outer` from an `inner`
/// derivation that worked on an abbreviated goal.
///
/// `us` maps the abbreviation back to its value. When `owed` is set the
/// outer goal itself mentions the abbreviation, so the outer certificate is
/// substituted with `us` as well and the result stays delayed by it.
pub fn backsubstitute(
    outer: &ProofValue,
    inner: &ProofValue,
    us: &Substitution,
    owed: bool,
) -> Result<ProofValue, TacticError> {
    let backsubst = inner.cert().apply_substitution(us)?;
    let mut parent_subst = inner.pending().cloned();
    if owed {
        parent_subst = compose_pending(parent_subst, Some(us));
    }
    let (cert, _) = outer.cert().splice_child(0, &backsubst, parent_subst.as_ref())?;
    tracing::debug!(%us, open = cert.subgoal_count(), "Backsubstituted abbreviation");
    Ok(ProofValue::from_parts(
        cert,
        inner.labels().map(<[_]>::to_vec),
        compose_pending(outer.pending().cloned(), parent_subst.as_ref()),
    ))
}
