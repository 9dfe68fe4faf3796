//! Combinators that introduce substitutions: definition unfolding, local
//! abbreviations and the search-and-rescue loop.

use proof_kernel::{Certificate, Expr, Substitution};

use crate::error::{ErrorClass, TacticError};
use crate::interpreter::{EvalResult, Interpreter};
use crate::subst::{backsubstitute, compose_pending, delay};
use crate::tactic::{InspectFn, Instantiator, TacticRef};
use crate::value::ProofValue;

impl Interpreter {
    /// Unfold the named definitions everywhere and owe the unfolding to the
    /// enclosing proof.
    pub(crate) fn expand(&self, names: &[String], value: &ProofValue) -> EvalResult {
        let subst = self.definitions().substitution_for(names)?;
        let added = self.invariants().extend_substituted(&subst);
        tracing::debug!(%subst, added, "Expanded definitions");
        delay(value, &subst)
    }

    /// Prove the single subgoal with `term` abbreviated as `abbr()`.
    pub(crate) fn let_abbrv(
        &self,
        abbr: &str,
        term: &Expr,
        inner: &TacticRef,
        value: &ProofValue,
        depth: usize,
    ) -> EvalResult {
        let goal = self.single_subgoal(value, "let")?;
        let abbreviated = goal.replace_all(term, &Expr::sym(abbr));
        let start = inner_start(Certificate::start(abbreviated), value);
        let result = self
            .apply(inner, &start, depth)
            .map_err(|e| e.with_context(format!("inner proof of let {abbr}()")))?;
        let us = Substitution::single(abbr, term.clone());
        recover_clash(backsubstitute(value, &result, &us, false), result, value, abbr)
    }

    /// Prove the single subgoal, which mentions `abbr()`, then read the value
    /// of `abbr()` off the finished inner proof.
    pub(crate) fn let_inspect(
        &self,
        abbr: &str,
        instantiator: &InspectFn,
        inner: &TacticRef,
        value: &ProofValue,
        depth: usize,
    ) -> EvalResult {
        let goal = self.single_subgoal(value, "letInspect")?;
        let start = inner_start(Certificate::start(goal.clone()), value);
        let result = self
            .apply(inner, &start, depth)
            .map_err(|e| e.with_context(format!("inner proof of letInspect {abbr}()")))?;
        let witness = instantiator(&result).map_err(|e| TacticError::Construction {
            tactic: format!("letInspect {abbr}()"),
            value: result.to_string(),
            source: Box::new(e),
        })?;
        tracing::debug!(abbr, %witness, "Inspected abbreviation value");
        let us = Substitution::single(abbr, witness);
        recover_clash(backsubstitute(value, &result, &us, true), result, value, abbr)
    }

    /// Run `common` once, then keep instantiating `abbrs` and running
    /// `continuation` until it succeeds.
    pub(crate) fn search_and_rescue(
        &self,
        abbrs: &[String],
        common: &TacticRef,
        instantiator: &dyn Instantiator,
        continuation: &TacticRef,
        value: &ProofValue,
        depth: usize,
    ) -> EvalResult {
        let goal = self.single_subgoal(value, "searchAndRescue")?;
        let shared = self
            .apply(common, &inner_start(Certificate::start(goal.clone()), value), depth)
            .map_err(|e| e.with_context("common part of searchAndRescue"))?;

        let mut last_failure: Option<TacticError> = None;
        let mut attempt = 0usize;
        loop {
            self.check_alive()?;
            let values = instantiator
                .instantiate(goal, last_failure.as_ref())
                .map_err(|e| e.with_context(format!("instantiating attempt {attempt}")))?;
            if values.len() != abbrs.len() {
                return Err(TacticError::IllFormed(format!(
                    "instantiator proposed {} value(s) for {} abbreviation(s)",
                    values.len(),
                    abbrs.len()
                )));
            }
            let us = Substitution::from_pairs(abbrs.iter().cloned().zip(values));
            let outcome = shared
                .cert()
                .apply_substitution(&us)
                .map_err(TacticError::from)
                .and_then(|cert| self.apply(continuation, &shared.advance(cert), depth));
            match outcome {
                Ok(done) => {
                    tracing::info!(attempt, %us, "searchAndRescue succeeded");
                    let owed = compose_pending(Some(us), done.pending());
                    let (cert, _) = value.cert().splice_child(0, done.cert(), owed.as_ref())?;
                    return Ok(ProofValue::from_parts(
                        cert,
                        done.labels().map(<[_]>::to_vec),
                        compose_pending(value.pending().cloned(), owed.as_ref()),
                    ));
                }
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt, error = %e.root_cause(), "searchAndRescue attempt failed");
                    last_failure = Some(e);
                }
            }
            attempt += 1;
        }
    }
}

/// A fresh inner attempt carrying the outer subgoal's label.
fn inner_start(cert: Certificate, outer: &ProofValue) -> ProofValue {
    ProofValue::from_parts(cert, outer.labels().map(<[_]>::to_vec), None)
}

/// A backsubstitution clash leaves the outer subgoal open and keeps the
/// inner derivation, which proves the abbreviated goal, detached from it.
fn recover_clash(backsubstituted: EvalResult, inner: ProofValue, outer: &ProofValue, abbr: &str) -> EvalResult {
    match backsubstituted {
        Err(e) if e.class() == ErrorClass::SubstitutionClash => {
            tracing::info!(abbr, error = %e, "Backsubstitution clashed, keeping inner derivation detached");
            Ok(outer.clone().with_detached(inner.cert().clone()))
        }
        other => other,
    }
}
