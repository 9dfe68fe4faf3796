use crate::error::TacticError;
use crate::tactic::Tactic;
use crate::value::ProofValue;

/// Observer of tactic evaluation.
///
/// Hooks are called synchronously from whichever thread is evaluating, so
/// implementations must tolerate concurrent calls. After a fatal error no
/// further notifications are guaranteed.
pub trait IOListener: Send + Sync {
    fn begin(&self, input: &ProofValue, tactic: &Tactic);

    fn end(&self, input: &ProofValue, tactic: &Tactic, output: &Result<ProofValue, TacticError>);

    fn kill(&self) {}
}

/// Emits a `trace!` event for every hook.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl IOListener for TracingListener {
    fn begin(&self, input: &ProofValue, tactic: &Tactic) {
        tracing::trace!(%tactic, open = input.subgoal_count(), "Begin tactic");
    }

    fn end(&self, _input: &ProofValue, tactic: &Tactic, output: &Result<ProofValue, TacticError>) {
        match output {
            Ok(value) => tracing::trace!(%tactic, open = value.subgoal_count(), "End tactic"),
            Err(e) => tracing::trace!(%tactic, class = %e.class(), "Tactic failed"),
        }
    }

    fn kill(&self) {
        tracing::trace!("Interpreter killed");
    }
}
