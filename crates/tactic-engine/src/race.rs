//! Racing proof branches on the worker pool.
//!
//! Each branch runs on a blocking pool thread under its own forked
//! interpreter. The calling thread waits on a channel for the first success.
//! Losers are cancelled cooperatively: their kill switch is flipped and they
//! stop at their next evaluation step.
//!
//! A nested race started from a branch thread may find every pool slot
//! taken by its ancestors. Its branches then run on that thread, so nesting
//! deeper than the pool is wide degrades to sequential alternatives. Branches
//! run this way are not bounded by a timeout deadline.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::TacticError;
use crate::interpreter::{EvalResult, Interpreter};
use crate::pool::PoolHandle;
use crate::tactic::TacticRef;
use crate::value::ProofValue;

/// Why a race produced no winner.
#[derive(Debug)]
pub(crate) enum RaceFailure {
    TimedOut,
    Failed(TacticError),
}

impl RaceFailure {
    pub(crate) fn into_error(self) -> TacticError {
        match self {
            RaceFailure::TimedOut => TacticError::NoProgress("race timed out".into()),
            RaceFailure::Failed(e) => e,
        }
    }
}

/// Run `tactics` concurrently on `value` and return the first success.
///
/// Recoverable branch failures are collected; if every branch fails the
/// race fails with `NoProgress`. Any other failure ends the race at once.
/// Branches that find no free pool slot run on the calling thread, in order,
/// until one of them succeeds or fails hard.
pub(crate) fn race(
    interp: &Interpreter,
    pool: &PoolHandle,
    tactics: &[TacticRef],
    value: &ProofValue,
    depth: usize,
    limit: Option<Duration>,
) -> Result<ProofValue, RaceFailure> {
    let n = tactics.len();
    if n == 0 {
        return Err(RaceFailure::Failed(TacticError::NoProgress("race over no tactics".into())));
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, EvalResult)>();
    let mut switches = Vec::with_capacity(n);
    let mut joins = Vec::with_capacity(n);
    let mut inline = Vec::new();
    for (index, tactic) in tactics.iter().enumerate() {
        let branch = interp.fork();
        switches.push(branch.kill_switch());
        let tactic = Arc::clone(tactic);
        let Some(permit) = pool.try_reserve() else {
            inline.push((index, branch, tactic));
            continue;
        };
        let value = value.clone();
        let tx = tx.clone();
        joins.push(pool.runtime().spawn_blocking(move || {
            let _permit = permit;
            let outcome = run_branch(&branch, index, &tactic, &value, depth);
            // The receiver is gone once a winner was chosen.
            let _ = tx.send((index, outcome));
        }));
    }
    tracing::debug!(branches = n, inline = inline.len(), "Race started");

    for (index, branch, tactic) in inline {
        let outcome = run_branch(&branch, index, &tactic, value, depth);
        let decided = !matches!(&outcome, Err(e) if e.is_recoverable());
        let _ = tx.send((index, outcome));
        if decided {
            break;
        }
    }
    drop(tx);

    let interrupt = interp.interrupt_token().clone();
    let collect = async move {
        let mut failures: Vec<(usize, TacticError)> = Vec::new();
        loop {
            tokio::select! {
                _ = interrupt.cancelled() => {
                    return Err(TacticError::Aborted("interrupted while racing".into()));
                }
                received = rx.recv() => match received {
                    Some((index, Ok(result))) => return Ok((index, result)),
                    Some((index, Err(e))) if e.is_recoverable() => {
                        tracing::debug!(branch = index, error = %e.root_cause(), "Racing branch failed");
                        failures.push((index, e));
                    }
                    Some((index, Err(e))) => {
                        return Err(e.with_context(format!("racing branch {index} failed")));
                    }
                    None => break,
                }
            }
        }
        let summary: Vec<String> = failures
            .iter()
            .map(|(i, e)| format!("branch {i}: {}", e.root_cause()))
            .collect();
        Err(TacticError::NoProgress(format!(
            "all {n} racing branch(es) failed: {}",
            summary.join("; ")
        )))
    };

    let handle = pool.runtime();
    let outcome = match limit {
        Some(limit) => handle
            .block_on(async move { tokio::time::timeout(limit, collect).await })
            .map_err(|_| RaceFailure::TimedOut),
        None => Ok(handle.block_on(collect)),
    };

    for switch in &switches {
        switch.kill();
    }
    for join in &joins {
        join.abort();
    }

    match outcome {
        Ok(Ok((index, result))) => {
            tracing::info!(winner = index, branches = n, "Race won");
            Ok(result)
        }
        Ok(Err(e)) => Err(RaceFailure::Failed(e)),
        Err(timed_out) => {
            tracing::info!(limit_ms = limit.map_or(0, |l| l.as_millis() as u64), "Race timed out");
            Err(timed_out)
        }
    }
}

/// Run one branch under its forked interpreter, turning a panic into a
/// fatal error.
fn run_branch(branch: &Interpreter, index: usize, tactic: &TacticRef, value: &ProofValue, depth: usize) -> EvalResult {
    panic::catch_unwind(AssertUnwindSafe(|| branch.apply(tactic, value, depth))).unwrap_or_else(|payload| {
        Err(TacticError::Fatal(format!(
            "racing branch {index} panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

/// Try each option against a fresh deadline of `limit`; a timed-out option
/// is cancelled and the next one tried.
pub(crate) fn timeout_alternatives(
    interp: &Interpreter,
    pool: &PoolHandle,
    options: &[TacticRef],
    limit: Duration,
    value: &ProofValue,
    depth: usize,
) -> EvalResult {
    for (i, option) in options.iter().enumerate() {
        interp.check_alive()?;
        match race(interp, pool, std::slice::from_ref(option), value, depth, Some(limit)) {
            Ok(result) => return Ok(result),
            Err(RaceFailure::TimedOut) => {
                tracing::info!(option = i, limit_ms = limit.as_millis() as u64, "Option timed out, trying next");
            }
            Err(RaceFailure::Failed(e)) => return Err(e.with_context(format!("timeout option {i}"))),
        }
    }
    Err(TacticError::NoProgress(format!(
        "all {} timeout option(s) ran out of time",
        options.len()
    )))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
