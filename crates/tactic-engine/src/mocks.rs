//! Test doubles for exercising the interpreter without real proof rules.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use proof_kernel::{Expr, KernelError, Position, Rule, Sequent};

use crate::error::TacticError;
use crate::listener::IOListener;
use crate::tactic::{Instantiator, Tactic};
use crate::value::ProofValue;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Closes any goal.
#[derive(Debug, Clone, Copy)]
pub struct Trust;

impl Rule for Trust {
    fn name(&self) -> &str {
        "trust"
    }

    fn apply(&self, _goal: &Sequent, _position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        Ok(vec![])
    }
}

/// Always inapplicable, optionally after sleeping.
#[derive(Debug, Clone)]
pub struct FailingRule {
    pub name: String,
    pub delay: Duration,
}

impl FailingRule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn after(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }
}

impl Rule for FailingRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, goal: &Sequent, _position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        std::thread::sleep(self.delay);
        Err(KernelError::Inapplicable {
            rule: self.name.clone(),
            reason: format!("scripted failure on {goal}"),
        })
    }
}

/// Sleeps, then delegates to `inner`.
#[derive(Debug, Clone)]
pub struct SlowRule {
    pub inner: Arc<dyn Rule>,
    pub delay: Duration,
}

impl SlowRule {
    pub fn new(inner: impl Rule + 'static, delay: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            delay,
        }
    }
}

impl Rule for SlowRule {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        std::thread::sleep(self.delay);
        self.inner.apply(goal, position)
    }
}

/// Counts applications of `inner`, successful or not.
#[derive(Debug, Clone)]
pub struct CountingRule {
    pub inner: Arc<dyn Rule>,
    pub count: Arc<AtomicUsize>,
}

impl CountingRule {
    pub fn new(inner: impl Rule + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Rule for CountingRule {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn apply(&self, goal: &Sequent, position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.inner.apply(goal, position)
    }
}

/// Adds a `tick()` assumption until the goal holds `limit` of them, then
/// succeeds without changing anything.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub limit: usize,
}

impl Tick {
    pub fn marker() -> Expr {
        Expr::sym("tick")
    }

    pub fn ticks(goal: &Sequent) -> usize {
        goal.ante.iter().filter(|f| **f == Self::marker()).count()
    }
}

impl Rule for Tick {
    fn name(&self) -> &str {
        "tick"
    }

    fn apply(&self, goal: &Sequent, _position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        let mut premise = goal.clone();
        if Self::ticks(goal) < self.limit {
            premise.ante.push(Self::marker());
        }
        Ok(vec![premise])
    }
}

/// Splits a goal into `arity` premises, the `i`-th assuming `case<i>()`.
#[derive(Debug, Clone, Copy)]
pub struct Split {
    pub arity: usize,
}

impl Rule for Split {
    fn name(&self) -> &str {
        "split"
    }

    fn apply(&self, goal: &Sequent, _position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        Ok((0..self.arity)
            .map(|i| {
                let mut premise = goal.clone();
                premise.ante.push(Expr::sym(&format!("case{i}")));
                premise
            })
            .collect())
    }
}

/// Panics when applied.
#[derive(Debug, Clone, Copy)]
pub struct PanicRule;

impl Rule for PanicRule {
    fn name(&self) -> &str {
        "panic"
    }

    fn apply(&self, _goal: &Sequent, _position: Option<Position>) -> Result<Vec<Sequent>, KernelError> {
        panic!("rule exploded")
    }
}

// ---------------------------------------------------------------------------
// RecordingListener
// ---------------------------------------------------------------------------

/// Records every hook call as a line of text.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
    kills: AtomicUsize,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn kills(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    /// Number of `begin` events for tactics that display as `name`.
    pub fn begun(&self, name: &str) -> usize {
        let wanted = format!("begin {name}");
        self.events().iter().filter(|e| **e == wanted).count()
    }
}

impl IOListener for RecordingListener {
    fn begin(&self, _input: &ProofValue, tactic: &Tactic) {
        self.events.lock().unwrap().push(format!("begin {tactic}"));
    }

    fn end(&self, _input: &ProofValue, tactic: &Tactic, output: &Result<ProofValue, TacticError>) {
        let line = match output {
            Ok(_) => format!("end {tactic}"),
            Err(e) => format!("fail {tactic}: {}", e.class()),
        };
        self.events.lock().unwrap().push(line);
    }

    fn kill(&self) {
        self.kills.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// ScriptedInstantiator
// ---------------------------------------------------------------------------

/// Hands out canned abbreviation values in order and remembers the failure
/// it was shown each time.
#[derive(Debug, Default)]
pub struct ScriptedInstantiator {
    answers: Mutex<VecDeque<Vec<Expr>>>,
    seen: Mutex<Vec<Option<String>>>,
}

impl ScriptedInstantiator {
    pub fn new(answers: Vec<Vec<Expr>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Traces of the failures passed to each call, `None` for the first.
    pub fn seen_failures(&self) -> Vec<Option<String>> {
        self.seen.lock().unwrap().clone()
    }
}

impl Instantiator for ScriptedInstantiator {
    fn instantiate(&self, _goal: &Sequent, last_failure: Option<&TacticError>) -> Result<Vec<Expr>, TacticError> {
        self.seen.lock().unwrap().push(last_failure.map(TacticError::trace));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TacticError::IllFormed("instantiator script exhausted".into()))
    }
}
