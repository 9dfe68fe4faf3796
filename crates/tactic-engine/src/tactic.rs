//! The tactic combinator language.
//!
//! Tactics are immutable trees built once and shared by reference (`Arc`),
//! so racing branches can hold them without copying. Computed tactics carry
//! closures; everything else is plain data.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use proof_kernel::{Expr, Position, Rule, Sequent, Substitution};

use crate::error::{ErrorClass, TacticError};
use crate::label::BranchLabel;
use crate::value::ProofValue;

pub type TacticRef = Arc<Tactic>;

/// Computes a tactic from the current proof state.
pub type DependentFn = Arc<dyn Fn(&ProofValue) -> Result<Tactic, TacticError> + Send + Sync>;
/// Builds a tactic from construction-time inputs.
pub type InputFn = Arc<dyn Fn(&[Input]) -> Result<Tactic, TacticError> + Send + Sync>;
/// Reads the abbreviation value off a finished inner proof.
pub type InspectFn = Arc<dyn Fn(&ProofValue) -> Result<Expr, TacticError> + Send + Sync>;
/// Builds the tactic for a matched pattern case from its unifier.
pub type CaseFn = Arc<dyn Fn(&Substitution) -> Tactic + Send + Sync>;
/// Enumerates candidates lazily, one per call to `next`.
pub type OptionsFn = Arc<dyn Fn() -> Box<dyn Iterator<Item = Input> + Send> + Send + Sync>;
/// Builds the tactic to try for one candidate.
pub type ChooseFn = Arc<dyn Fn(&Input) -> Result<Tactic, TacticError> + Send + Sync>;

/// Name of the input tactic whose substitution inputs are owed to the
/// enclosing proof.
pub const RAW_SUBSTITUTION: &str = "US";

/// An argument value supplied to input and choose-some tactics.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Expr(Expr),
    Subst(Substitution),
    Text(String),
    Int(i64),
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Input::Expr(e) => write!(f, "{e}"),
            Input::Subst(s) => write!(f, "{s}"),
            Input::Text(t) => write!(f, "\"{t}\""),
            Input::Int(n) => write!(f, "{n}"),
        }
    }
}

/// Proposes values for the abbreviations of a search-and-rescue loop.
pub trait Instantiator: Send + Sync {
    /// One value per abbreviation, in order. `last_failure` is the
    /// continuation's error from the previous attempt.
    fn instantiate(&self, goal: &Sequent, last_failure: Option<&TacticError>) -> Result<Vec<Expr>, TacticError>;
}

pub enum Tactic {
    /// Succeeds without changing anything.
    Idle,
    /// A kernel rule applied to the first open subgoal.
    BuiltIn(Arc<dyn Rule>),
    /// A positional rule whose position has not been bound yet.
    Positional(Arc<dyn Rule>),
    AppliedPosition { rule: Arc<dyn Rule>, position: Position },
    /// Substitute the certificate in place.
    ApplySubstitution(Substitution),
    Seq(TacticRef, TacticRef),
    Either(TacticRef, TacticRef),
    Saturate(TacticRef),
    Repeat(TacticRef, usize),
    /// One tactic per open subgoal.
    Branch(Vec<TacticRef>),
    /// The same tactic on every open subgoal.
    OnAll(TacticRef),
    Dependent { name: String, compute: DependentFn },
    Input { name: String, inputs: Vec<Input>, build: InputFn },
    Partial { inner: TacticRef, label: Option<BranchLabel> },
    LabelBranch(BranchLabel),
    Expand(String),
    ExpandAll(Vec<String>),
    Let { abbr: String, value: Expr, inner: TacticRef },
    LetInspect { abbr: String, instantiator: InspectFn, inner: TacticRef },
    SearchAndRescue {
        abbrs: Vec<String>,
        common: TacticRef,
        instantiator: Arc<dyn Instantiator>,
        continuation: TacticRef,
    },
    /// Pattern cases tried in order; the last case is the fallback.
    UnifyMatch(Vec<(Sequent, CaseFn)>),
    TryCatch {
        inner: TacticRef,
        class: ErrorClass,
        catch: TacticRef,
        finally: Option<TacticRef>,
    },
    Race(Vec<TacticRef>),
    TimeoutAlternatives { options: Vec<TacticRef>, limit: Duration },
    ChooseSome {
        name: String,
        options: OptionsFn,
        build: ChooseFn,
        allow_open: bool,
    },
}

impl Tactic {
    /// `self` then `next`.
    pub fn then(self, next: Tactic) -> Tactic {
        seq(self, next)
    }

    /// `self`, or `other` if `self` fails or makes no progress.
    pub fn or_else(self, other: Tactic) -> Tactic {
        either(self, other)
    }
}

/// Apply `rule` to the first open subgoal.
pub fn rule(rule: impl Rule + 'static) -> Tactic {
    Tactic::BuiltIn(Arc::new(rule))
}

/// A rule still waiting for a position; fails until one is bound.
pub fn positional(rule: impl Rule + 'static) -> Tactic {
    Tactic::Positional(Arc::new(rule))
}

/// Apply `rule` at `position` of the first open subgoal.
pub fn at(rule: impl Rule + 'static, position: Position) -> Tactic {
    Tactic::AppliedPosition {
        rule: Arc::new(rule),
        position,
    }
}

/// Run `first`, then `second` on its result.
pub fn seq(first: Tactic, second: Tactic) -> Tactic {
    Tactic::Seq(Arc::new(first), Arc::new(second))
}

/// `left` if it succeeds with progress, otherwise `right` on the original input.
pub fn either(left: Tactic, right: Tactic) -> Tactic {
    Tactic::Either(Arc::new(left), Arc::new(right))
}

/// Apply `t` until the proof closes, stops changing, or `t` fails recoverably.
pub fn saturate(t: Tactic) -> Tactic {
    Tactic::Saturate(Arc::new(t))
}

/// Apply `t` exactly `times` times.
pub fn repeat(t: Tactic, times: usize) -> Tactic {
    Tactic::Repeat(Arc::new(t), times)
}

/// One tactic per open subgoal, in order.
pub fn branch(children: Vec<Tactic>) -> Tactic {
    Tactic::Branch(children.into_iter().map(Arc::new).collect())
}

/// The same tactic on every open subgoal.
pub fn on_all(t: Tactic) -> Tactic {
    Tactic::OnAll(Arc::new(t))
}

/// A tactic computed from the proof state it is about to run on.
pub fn dependent(
    name: impl Into<String>,
    compute: impl Fn(&ProofValue) -> Result<Tactic, TacticError> + Send + Sync + 'static,
) -> Tactic {
    Tactic::Dependent {
        name: name.into(),
        compute: Arc::new(compute),
    }
}

/// A tactic built from argument values supplied up front.
pub fn input(
    name: impl Into<String>,
    inputs: Vec<Input>,
    build: impl Fn(&[Input]) -> Result<Tactic, TacticError> + Send + Sync + 'static,
) -> Tactic {
    Tactic::Input {
        name: name.into(),
        inputs,
        build: Arc::new(build),
    }
}

/// Apply `subst` to the certificate and owe it to the enclosing proof.
pub fn uniform_substitution(subst: Substitution) -> Tactic {
    input(RAW_SUBSTITUTION, vec![Input::Subst(subst)], |inputs| {
        let combined = inputs.iter().fold(Substitution::empty(), |acc, i| match i {
            Input::Subst(s) => acc.compose(s),
            _ => acc,
        });
        Ok(Tactic::ApplySubstitution(combined))
    })
}

/// Run `t`, leaving the proof open, and tag the resulting subgoals with `label`.
pub fn partial(t: Tactic, label: Option<BranchLabel>) -> Tactic {
    Tactic::Partial {
        inner: Arc::new(t),
        label,
    }
}

/// Tag every open subgoal with `label`.
pub fn label(label: BranchLabel) -> Tactic {
    Tactic::LabelBranch(label)
}

/// Unfold definition `name()` and owe the unfolding to the enclosing proof.
pub fn expand(name: impl Into<String>) -> Tactic {
    Tactic::Expand(name.into())
}

/// Unfold several definitions with one combined substitution.
pub fn expand_all<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Tactic {
    Tactic::ExpandAll(names.into_iter().map(Into::into).collect())
}

/// Prove the goal with `value` abbreviated as `abbr()`, then substitute back.
pub fn let_abbrv(abbr: impl Into<String>, value: Expr, inner: Tactic) -> Tactic {
    Tactic::Let {
        abbr: abbr.into(),
        value,
        inner: Arc::new(inner),
    }
}

/// Prove the goal mentioning `abbr()` and read its value off the finished proof.
pub fn let_inspect(
    abbr: impl Into<String>,
    instantiator: impl Fn(&ProofValue) -> Result<Expr, TacticError> + Send + Sync + 'static,
    inner: Tactic,
) -> Tactic {
    Tactic::LetInspect {
        abbr: abbr.into(),
        instantiator: Arc::new(instantiator),
        inner: Arc::new(inner),
    }
}

/// Run `common` once, then retry `continuation` with instantiated `abbrs` until it succeeds.
pub fn search_and_rescue(
    abbrs: Vec<String>,
    common: Tactic,
    instantiator: Arc<dyn Instantiator>,
    continuation: Tactic,
) -> Tactic {
    Tactic::SearchAndRescue {
        abbrs,
        common: Arc::new(common),
        instantiator,
        continuation: Arc::new(continuation),
    }
}

/// Run the case whose pattern matches the goal; the last case is the fallback.
pub fn unify_match(cases: Vec<(Sequent, CaseFn)>) -> Tactic {
    Tactic::UnifyMatch(cases)
}

/// Run `inner`, handling failures of `class` with `catch`; `finally` observes either outcome.
pub fn try_catch(inner: Tactic, class: ErrorClass, catch: Tactic, finally: Option<Tactic>) -> Tactic {
    Tactic::TryCatch {
        inner: Arc::new(inner),
        class,
        catch: Arc::new(catch),
        finally: finally.map(Arc::new),
    }
}

/// Run `tactics` concurrently and keep the first success.
pub fn race(tactics: Vec<Tactic>) -> Tactic {
    Tactic::Race(tactics.into_iter().map(Arc::new).collect())
}

/// Try each option in turn, giving each `limit` to finish.
pub fn timeout_alternatives(options: Vec<Tactic>, limit: Duration) -> Tactic {
    Tactic::TimeoutAlternatives {
        options: options.into_iter().map(Arc::new).collect(),
        limit,
    }
}

/// Try the tactics built from `options` one at a time until one works.
pub fn choose_some(
    name: impl Into<String>,
    options: impl Fn() -> Box<dyn Iterator<Item = Input> + Send> + Send + Sync + 'static,
    build: impl Fn(&Input) -> Result<Tactic, TacticError> + Send + Sync + 'static,
    allow_open: bool,
) -> Tactic {
    Tactic::ChooseSome {
        name: name.into(),
        options: Arc::new(options),
        build: Arc::new(build),
        allow_open,
    }
}

fn join(f: &mut fmt::Formatter<'_>, items: &[TacticRef], sep: &str) -> fmt::Result {
    for (i, t) in items.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{t}")?;
    }
    Ok(())
}

impl fmt::Display for Tactic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tactic::Idle => write!(f, "nil"),
            Tactic::BuiltIn(r) | Tactic::Positional(r) => write!(f, "{}", r.name()),
            Tactic::AppliedPosition { rule, position } => write!(f, "{}({position})", rule.name()),
            Tactic::ApplySubstitution(s) => write!(f, "US({s})"),
            Tactic::Seq(a, b) => write!(f, "({a} ; {b})"),
            Tactic::Either(a, b) => write!(f, "({a} | {b})"),
            Tactic::Saturate(t) => write!(f, "{t}*"),
            Tactic::Repeat(t, n) => write!(f, "{t}*{n}"),
            Tactic::Branch(children) => {
                write!(f, "<(")?;
                join(f, children, ", ")?;
                write!(f, ")")
            }
            Tactic::OnAll(t) => write!(f, "onAll({t})"),
            Tactic::Dependent { name, .. } => write!(f, "{name}"),
            Tactic::Input { name, inputs, .. } => {
                let args: Vec<String> = inputs.iter().map(|i| i.to_string()).collect();
                write!(f, "{name}({})", args.join(", "))
            }
            Tactic::Partial { inner, .. } => write!(f, "partial({inner})"),
            Tactic::LabelBranch(l) => write!(f, "label(\"{l}\")"),
            Tactic::Expand(name) => write!(f, "expand \"{name}\""),
            Tactic::ExpandAll(names) => write!(f, "expandAll({})", names.join(", ")),
            Tactic::Let { abbr, value, inner } => write!(f, "let({abbr}() = {value}, {inner})"),
            Tactic::LetInspect { abbr, inner, .. } => write!(f, "letInspect({abbr}(), {inner})"),
            Tactic::SearchAndRescue { abbrs, common, continuation, .. } => {
                write!(f, "searchAndRescue({}; {common}; {continuation})", abbrs.join(", "))
            }
            Tactic::UnifyMatch(cases) => write!(f, "case[{}]", cases.len()),
            Tactic::TryCatch { inner, class, catch, finally } => {
                write!(f, "try({inner}) catch[{class}]({catch})")?;
                if let Some(fin) = finally {
                    write!(f, " finally({fin})")?;
                }
                Ok(())
            }
            Tactic::Race(ts) => {
                write!(f, "race(")?;
                join(f, ts, ", ")?;
                write!(f, ")")
            }
            Tactic::TimeoutAlternatives { options, limit } => {
                write!(f, "timeout[{}ms](", limit.as_millis())?;
                join(f, options, ", ")?;
                write!(f, ")")
            }
            Tactic::ChooseSome { name, .. } => write!(f, "chooseSome({name})"),
        }
    }
}

impl fmt::Debug for Tactic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tactic({self})")
    }
}
