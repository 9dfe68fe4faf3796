//! Recursive tactic evaluation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use proof_kernel::{match_sequent, Position, Rule, Sequent, Substitution};
use tokio_util::sync::CancellationToken;

use crate::branch;
use crate::config::{InterpreterConfig, Strategy};
use crate::error::{ErrorClass, TacticError};
use crate::invariants::{Definitions, InvariantStore};
use crate::label::BranchLabel;
use crate::listener::IOListener;
use crate::pool::PoolHandle;
use crate::race;
use crate::tactic::{CaseFn, ChooseFn, Input, OptionsFn, Tactic, TacticRef, RAW_SUBSTITUTION};
use crate::value::ProofValue;

pub type EvalResult = Result<ProofValue, TacticError>;

/// Cancels an interpreter from another thread.
#[derive(Debug, Clone)]
pub struct KillSwitch {
    killed: Arc<AtomicBool>,
    interrupt: CancellationToken,
}

impl KillSwitch {
    /// Set the liveness flag and cancel the interruption token. Idempotent.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::SeqCst);
        self.interrupt.cancel();
    }

    /// Whether `kill` has been called.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

/// Evaluates tactics against proof states.
///
/// One interpreter serves one proof attempt. Racing combinators fork
/// independent child interpreters that share the worker pool, invariant
/// store and definitions but have their own liveness flag and no listeners.
pub struct Interpreter {
    listeners: Vec<Arc<dyn IOListener>>,
    killed: Arc<AtomicBool>,
    interrupt: CancellationToken,
    strategy: Strategy,
    max_depth: usize,
    pool: Option<PoolHandle>,
    invariants: InvariantStore,
    definitions: Arc<Definitions>,
}

/// Builder for [`Interpreter`].
pub struct InterpreterBuilder {
    listeners: Vec<Arc<dyn IOListener>>,
    interrupt: Option<CancellationToken>,
    strategy: Strategy,
    max_depth: usize,
    pool: Option<PoolHandle>,
    invariants: InvariantStore,
    definitions: Definitions,
}

impl InterpreterBuilder {
    /// Register an observer notified around every evaluation step.
    pub fn listener(mut self, listener: Arc<dyn IOListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// How branch combination treats failing branches.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Nesting limit beyond which evaluation fails fatally.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Runtime for racing combinators. Without one, `Race` falls back to
    /// trying alternatives in order and timeouts are rejected.
    pub fn pool(mut self, handle: PoolHandle) -> Self {
        self.pool = Some(handle);
        self
    }

    /// External interruption signal, checked at every evaluation step.
    /// Killing the interpreter does not cancel the caller's token.
    pub fn interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = Some(token);
        self
    }

    /// Invariant store shared with every fork of this interpreter.
    pub fn invariants(mut self, store: InvariantStore) -> Self {
        self.invariants = store;
        self
    }

    /// Definitions unfolded by `Expand` and `ExpandAll`.
    pub fn definitions(mut self, definitions: Definitions) -> Self {
        self.definitions = definitions;
        self
    }

    /// Finish the interpreter. It starts alive, with its own kill switch.
    pub fn build(self) -> Interpreter {
        Interpreter {
            listeners: self.listeners,
            killed: Arc::new(AtomicBool::new(false)),
            interrupt: self.interrupt.map(|t| t.child_token()).unwrap_or_default(),
            strategy: self.strategy,
            max_depth: self.max_depth,
            pool: self.pool,
            invariants: self.invariants,
            definitions: Arc::new(self.definitions),
        }
    }
}

impl Interpreter {
    /// An interpreter builder with default strategy and depth, and no pool.
    pub fn builder() -> InterpreterBuilder {
        InterpreterBuilder {
            listeners: Vec::new(),
            interrupt: None,
            strategy: Strategy::default(),
            max_depth: InterpreterConfig::default().max_depth,
            pool: None,
            invariants: InvariantStore::default(),
            definitions: Definitions::default(),
        }
    }

    /// A builder preloaded with strategy and depth from `config`.
    pub fn from_config(config: &InterpreterConfig) -> InterpreterBuilder {
        Self::builder()
            .strategy(config.strategy)
            .max_depth(config.max_depth)
    }

    /// Run `tactic` on `value`.
    pub fn run(&self, tactic: &Tactic, value: &ProofValue) -> EvalResult {
        self.apply(tactic, value, 0)
    }

    /// Start a proof of `goal` and run `tactic` on it.
    pub fn prove(&self, goal: Sequent, tactic: &Tactic) -> EvalResult {
        self.run(tactic, &ProofValue::start(goal))
    }

    /// Stop this interpreter. Evaluation fails with `Aborted` at its next step.
    pub fn kill(&self) {
        if self.killed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::warn!("Interpreter killed");
        self.interrupt.cancel();
        for l in &self.listeners {
            l.kill();
        }
    }

    pub fn is_dead(&self) -> bool {
        self.killed.load(Ordering::SeqCst) || self.interrupt.is_cancelled()
    }

    /// A handle that kills this interpreter from another thread.
    pub fn kill_switch(&self) -> KillSwitch {
        KillSwitch {
            killed: Arc::clone(&self.killed),
            interrupt: self.interrupt.clone(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn invariants(&self) -> &InvariantStore {
        &self.invariants
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub(crate) fn pool(&self) -> Option<&PoolHandle> {
        self.pool.as_ref()
    }

    pub(crate) fn interrupt_token(&self) -> &CancellationToken {
        &self.interrupt
    }

    /// An independent interpreter for a racing branch.
    pub(crate) fn fork(&self) -> Interpreter {
        Interpreter {
            listeners: Vec::new(),
            killed: Arc::new(AtomicBool::new(false)),
            interrupt: self.interrupt.child_token(),
            strategy: self.strategy,
            max_depth: self.max_depth,
            pool: self.pool.clone(),
            invariants: self.invariants.clone(),
            definitions: Arc::clone(&self.definitions),
        }
    }

    pub(crate) fn check_alive(&self) -> Result<(), TacticError> {
        if self.killed.load(Ordering::SeqCst) {
            return Err(TacticError::Aborted("interpreter was killed".into()));
        }
        if self.interrupt.is_cancelled() {
            return Err(TacticError::Aborted("interrupted".into()));
        }
        Ok(())
    }

    /// Evaluate one tactic node. Every recursive step goes through here.
    pub(crate) fn apply(&self, tactic: &Tactic, value: &ProofValue, depth: usize) -> EvalResult {
        self.check_alive()?;
        if depth > self.max_depth {
            tracing::warn!(depth, max_depth = self.max_depth, %tactic, "Tactic nesting too deep");
            return Err(TacticError::Fatal(format!(
                "tactic nesting exceeded {} levels at {tactic}",
                self.max_depth
            )));
        }
        for l in &self.listeners {
            l.begin(value, tactic);
        }
        let result = self.dispatch(tactic, value, depth + 1);
        if !matches!(&result, Err(e) if e.class() == ErrorClass::Fatal) {
            for l in &self.listeners {
                l.end(value, tactic, &result);
            }
        }
        result
    }

    fn dispatch(&self, tactic: &Tactic, value: &ProofValue, depth: usize) -> EvalResult {
        match tactic {
            Tactic::Idle => Ok(value.clone()),
            Tactic::BuiltIn(rule) => self.apply_rule(rule.as_ref(), value, None),
            Tactic::Positional(rule) => Err(TacticError::IllFormed(format!(
                "{} needs a position but none was bound",
                rule.name()
            ))),
            Tactic::AppliedPosition { rule, position } => self.apply_rule(rule.as_ref(), value, Some(*position)),
            Tactic::ApplySubstitution(subst) => {
                let cert = value.cert().apply_substitution(subst)?;
                Ok(value.advance(cert))
            }
            Tactic::Seq(first, second) => {
                let mid = self
                    .apply(first, value, depth)
                    .map_err(|e| e.with_context(format!("left side of {tactic} failed")))?;
                self.apply(second, &mid, depth)
                    .map_err(|e| e.with_context(format!("right side of {tactic} failed")))
            }
            Tactic::Either(left, right) => self.either(left, right, value, depth),
            Tactic::Saturate(inner) => self.saturate(inner, value, depth),
            Tactic::Repeat(inner, times) => {
                let mut current = value.clone();
                for i in 0..*times {
                    current = self
                        .apply(inner, &current, depth)
                        .map_err(|e| e.with_context(format!("iteration {i} of {tactic} failed")))?;
                }
                Ok(current)
            }
            Tactic::Branch(children) => branch::combine(self, children, value, depth),
            Tactic::OnAll(inner) => {
                let children = vec![Arc::clone(inner); value.subgoal_count()];
                branch::combine(self, &children, value, depth)
            }
            Tactic::Dependent { name, compute } => {
                let computed = compute(value).map_err(|e| TacticError::Construction {
                    tactic: name.clone(),
                    value: value.to_string(),
                    source: Box::new(e),
                })?;
                self.apply(&computed, value, depth)
                    .map_err(|e| e.with_context(format!("running {name}")))
            }
            Tactic::Input { name, inputs, build } => {
                let built = build(inputs).map_err(|e| TacticError::Construction {
                    tactic: name.clone(),
                    value: value.to_string(),
                    source: Box::new(e),
                })?;
                let result = self
                    .apply(&built, value, depth)
                    .map_err(|e| e.with_context(format!("running {tactic}")))?;
                if name != RAW_SUBSTITUTION {
                    return Ok(result);
                }
                let owed = inputs.iter().fold(Substitution::empty(), |acc, i| match i {
                    Input::Subst(s) => acc.compose(s),
                    _ => acc,
                });
                Ok(result.with_pending(&owed))
            }
            Tactic::Partial { inner, label } => {
                let result = self.apply(inner, value, depth)?;
                Ok(match label {
                    Some(l) => attach_label(&result, l),
                    None => result,
                })
            }
            Tactic::LabelBranch(l) => Ok(attach_label(value, l)),
            Tactic::Expand(name) => self.expand(std::slice::from_ref(name), value),
            Tactic::ExpandAll(names) => self.expand(names, value),
            Tactic::Let { abbr, value: term, inner } => self.let_abbrv(abbr, term, inner, value, depth),
            Tactic::LetInspect { abbr, instantiator, inner } => {
                self.let_inspect(abbr, instantiator, inner, value, depth)
            }
            Tactic::SearchAndRescue {
                abbrs,
                common,
                instantiator,
                continuation,
            } => self.search_and_rescue(abbrs, common, instantiator.as_ref(), continuation, value, depth),
            Tactic::UnifyMatch(cases) => self.unify_match(cases, value, depth),
            Tactic::TryCatch {
                inner,
                class,
                catch,
                finally,
            } => self.try_catch(inner, *class, catch, finally.as_ref(), value, depth),
            Tactic::Race(tactics) => match self.pool() {
                Some(handle) => race::race(self, handle, tactics, value, depth, None).map_err(|f| f.into_error()),
                None => match branch::alternatives(tactics) {
                    Some(chain) => self.apply(&chain, value, depth),
                    None => Err(TacticError::NoProgress("race over no tactics".into())),
                },
            },
            Tactic::TimeoutAlternatives { options, limit } => match self.pool() {
                Some(handle) => race::timeout_alternatives(self, handle, options, *limit, value, depth),
                None => Err(TacticError::IllFormed(
                    "timeout alternatives need an interpreter with a worker pool".into(),
                )),
            },
            Tactic::ChooseSome {
                name,
                options,
                build,
                allow_open,
            } => self.choose_some(name, options, build, *allow_open, value, depth),
        }
    }

    fn apply_rule(&self, rule: &dyn Rule, value: &ProofValue, position: Option<Position>) -> EvalResult {
        if value.is_closed() {
            return Err(TacticError::IllFormed(format!(
                "{} applied to a closed certificate",
                rule.name()
            )));
        }
        let cert = value.cert().apply_rule(0, rule, position)?;
        Ok(value.advance(cert))
    }

    fn either(&self, left: &TacticRef, right: &TacticRef, value: &ProofValue, depth: usize) -> EvalResult {
        match self.apply(left, value, depth) {
            Ok(result) if result.cert() != value.cert() => Ok(result),
            Ok(_) => {
                tracing::debug!(%left, "Left alternative made no progress, trying right");
                self.apply(right, value, depth)
                    .map_err(|e| e.with_context(format!("{left} made no progress and {right} failed")))
            }
            Err(e) if e.is_recoverable() => {
                tracing::debug!(%left, error = %e.root_cause(), "Left alternative failed, trying right");
                self.apply(right, value, depth)
                    .map_err(|e2| e2.with_context(format!("both alternatives failed; left: {}", e.root_cause())))
            }
            Err(e) => Err(e),
        }
    }

    fn saturate(&self, inner: &TacticRef, value: &ProofValue, depth: usize) -> EvalResult {
        let mut current = value.clone();
        let mut rounds = 0usize;
        loop {
            if current.is_closed() {
                tracing::debug!(rounds, "Saturation closed the proof");
                return Ok(current);
            }
            match self.apply(inner, &current, depth) {
                Ok(next) if next.cert() == current.cert() => {
                    tracing::debug!(rounds, "Saturation reached a fixpoint");
                    return Ok(current);
                }
                Ok(next) => {
                    current = next;
                    rounds += 1;
                }
                Err(e) if e.is_recoverable() => {
                    tracing::debug!(rounds, error = %e.root_cause(), "Saturation stopped on failure");
                    return Ok(current);
                }
                Err(e) => return Err(e.with_context(format!("round {rounds} of {inner}*"))),
            }
        }
    }

    /// The only open subgoal of `value`, or an ill-formed error naming `what`.
    pub(crate) fn single_subgoal<'v>(&self, value: &'v ProofValue, what: &str) -> Result<&'v Sequent, TacticError> {
        match value.cert().subgoals() {
            [goal] => Ok(goal),
            goals => Err(TacticError::IllFormed(format!(
                "{what} needs exactly one open subgoal, found {}",
                goals.len()
            ))),
        }
    }

    fn unify_match(&self, cases: &[(Sequent, CaseFn)], value: &ProofValue, depth: usize) -> EvalResult {
        let goal = self.single_subgoal(value, "pattern match")?;
        let Some((_, fallback)) = cases.last() else {
            return Err(TacticError::IllFormed("pattern match without cases".into()));
        };
        let (index, unifier, build) = cases
            .iter()
            .enumerate()
            .find_map(|(i, (pattern, build))| match_sequent(pattern, goal).map(|u| (i, u, build)))
            .unwrap_or_else(|| (cases.len() - 1, Substitution::empty(), fallback));
        tracing::debug!(case = index, %unifier, "Pattern case selected");
        let chosen = build(&unifier);
        self.apply(&chosen, value, depth)
            .map_err(|e| e.with_context(format!("pattern case {index}")))
    }

    fn try_catch(
        &self,
        inner: &TacticRef,
        class: ErrorClass,
        catch: &TacticRef,
        finally: Option<&TacticRef>,
        value: &ProofValue,
        depth: usize,
    ) -> EvalResult {
        let outcome = match self.apply(inner, value, depth) {
            Err(e) if e.is_terminal() => return Err(e),
            Err(e) if e.causes().any(|c| c.layer_class() == Some(class)) => {
                tracing::debug!(%class, error = %e.root_cause(), "Caught failure, running handler");
                self.apply(catch, value, depth)
                    .map_err(|h| h.with_context(format!("handler for {class} failure")))
            }
            other => other,
        };
        let Some(finally) = finally else {
            return outcome;
        };
        match outcome {
            Ok(result) => self
                .apply(finally, &result, depth)
                .map_err(|e| e.with_context("finally handler failed")),
            Err(e) if e.is_terminal() => Err(e),
            Err(e) => {
                // Observes the failure on the original input; only a terminal
                // error can replace the one being propagated.
                match self.apply(finally, value, depth) {
                    Err(f) if f.is_terminal() => return Err(f),
                    Err(f) => {
                        tracing::debug!(error = %f.root_cause(), "finally handler failed while propagating a failure");
                    }
                    Ok(_) => {}
                }
                Err(e)
            }
        }
    }

    fn choose_some(
        &self,
        name: &str,
        options: &OptionsFn,
        build: &ChooseFn,
        allow_open: bool,
        value: &ProofValue,
        depth: usize,
    ) -> EvalResult {
        let mut diagnostics = Vec::new();
        for option in options() {
            self.check_alive()?;
            let tactic = match build(&option) {
                Ok(t) => t,
                Err(e) if e.is_recoverable() => {
                    diagnostics.push(format!("{option}: {}", e.root_cause()));
                    continue;
                }
                Err(e) => {
                    return Err(TacticError::Construction {
                        tactic: name.to_string(),
                        value: option.to_string(),
                        source: Box::new(e),
                    })
                }
            };
            match self.apply(&tactic, value, depth) {
                Ok(result) if allow_open || result.is_closed() => {
                    tracing::debug!(%option, "chooseSome option succeeded");
                    return Ok(result);
                }
                Ok(result) => diagnostics.push(format!(
                    "{option}: left {} subgoal(s) open",
                    result.subgoal_count()
                )),
                Err(e) if e.is_recoverable() => diagnostics.push(format!("{option}: {}", e.root_cause())),
                Err(e) => return Err(e.with_context(format!("{name} option {option}"))),
            }
        }
        Err(TacticError::NoProgress(if diagnostics.is_empty() {
            format!("{name} had no options")
        } else {
            format!("{name} exhausted its options: {}", diagnostics.join("; "))
        }))
    }
}

/// Extend every label of `value` by `label`, or label each subgoal with it
/// when the value carries none.
fn attach_label(value: &ProofValue, label: &BranchLabel) -> ProofValue {
    let labels = match value.labels() {
        Some(existing) => existing.iter().map(|l| l.append(label)).collect(),
        None => vec![label.clone(); value.subgoal_count()],
    };
    value.relabel(Some(labels))
}
