//! End-to-end tests of the tactic interpreter against the reference kernel.
//!
//! Racing tests build a real worker pool. They only check that some valid
//! winner comes back, never which branch it was.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proof_kernel::rules::{AndRight, CloseTrue, Cut, ImplyRight};
use proof_kernel::{Certificate, Expr, Position, Sequent, Substitution};
use tactic_engine::mocks::{CountingRule, FailingRule, PanicRule, RecordingListener, SlowRule, Split, Tick, Trust};
use tactic_engine::tactic::*;
use tactic_engine::{
    load_interpreter_toml, BranchLabel, ErrorClass, Interpreter, InterpreterConfig, ProofValue, Strategy, Tactic,
    TacticError, WorkerPool,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn p() -> Expr {
    Expr::sym("p")
}

fn square(x: &str) -> Expr {
    Expr::pow(Expr::var(x), Expr::num(2))
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn racing_interpreter(pool: &WorkerPool) -> Interpreter {
    Interpreter::builder().pool(pool.handle()).build()
}

/// `==> p` split into `n` labelled subgoals.
fn labelled_split(labels: &[&str]) -> ProofValue {
    let cert = Certificate::start(Sequent::goal(p()))
        .apply_rule(0, &Split { arity: labels.len() }, None)
        .unwrap();
    ProofValue::from_parts(cert, Some(labels.iter().map(|l| BranchLabel::top(*l)).collect()), None)
}

fn assert_labels_fit(value: &ProofValue) {
    if let Some(labels) = value.labels() {
        assert_eq!(labels.len(), value.subgoal_count(), "labels out of step in {value}");
    }
}

fn compound_failures(err: &TacticError) -> Vec<usize> {
    err.causes()
        .find_map(|e| match e {
            TacticError::CompoundCritical { failures } => Some(failures.iter().map(|(i, _)| *i).collect()),
            _ => None,
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

#[test]
fn test_labels_track_subgoal_count() {
    init_tracing();
    let interp = Interpreter::builder().build();
    let start = labelled_split(&["a", "b"]);
    let tactics = vec![
        Tactic::Idle,
        branch(vec![rule(Trust), rule(Split { arity: 3 })]),
        branch(vec![rule(Split { arity: 2 }), rule(Trust)]),
        on_all(rule(Split { arity: 2 })),
        on_all(rule(Trust)),
        on_all(saturate(rule(Tick { limit: 2 }))),
        on_all(partial(rule(Split { arity: 2 }), Some(BranchLabel::top("p")))),
        on_all(let_abbrv("j", Expr::sym("case0"), rule(Split { arity: 4 }))),
        rule(Split { arity: 5 }),
        label(BranchLabel::top("extra")),
    ];
    for t in &tactics {
        let result = interp.run(t, &start).unwrap();
        assert_labels_fit(&result);
        assert!(result.labels().is_some(), "labels dropped by {t}");
    }
}

#[test]
fn test_partial_without_label_keeps_labels() {
    let interp = Interpreter::builder().build();
    let result = interp
        .run(&on_all(partial(rule(Split { arity: 2 }), None)), &labelled_split(&["a", "b"]))
        .unwrap();
    let (a, b) = (BranchLabel::top("a"), BranchLabel::top("b"));
    assert_eq!(result.labels().unwrap(), &[a.clone(), a, b.clone(), b]);

    let unlabelled = interp
        .prove(Sequent::goal(p()), &partial(rule(Split { arity: 2 }), None))
        .unwrap();
    assert_eq!(unlabelled.subgoal_count(), 2);
    assert!(unlabelled.labels().is_none());
}

#[test]
fn test_unlabelled_values_stay_unlabelled() {
    let interp = Interpreter::builder().build();
    let result = interp
        .prove(Sequent::goal(p()), &rule(Split { arity: 2 }).then(on_all(rule(Split { arity: 2 }))))
        .unwrap();
    assert_eq!(result.subgoal_count(), 4);
    assert!(result.labels().is_none());
}

// ---------------------------------------------------------------------------
// Alternatives and saturation
// ---------------------------------------------------------------------------

#[test]
fn test_either_progress_law() {
    let interp = Interpreter::builder().build();
    let goal = Sequent::goal(Expr::imp(p(), p()));
    let a = at(ImplyRight, Position::Succ(0));
    let b = rule(Cut { formula: Expr::tt() });

    let a_alone = interp.prove(goal.clone(), &at(ImplyRight, Position::Succ(0))).unwrap();
    let b_alone = interp.prove(goal.clone(), &rule(Cut { formula: Expr::tt() })).unwrap();

    assert_eq!(interp.prove(goal.clone(), &either(a, b)).unwrap(), a_alone);
    let no_progress = either(Tactic::Idle, rule(Cut { formula: Expr::tt() }));
    assert_eq!(interp.prove(goal.clone(), &no_progress).unwrap(), b_alone);
    let failing = either(at(AndRight, Position::Succ(0)), rule(Cut { formula: Expr::tt() }));
    assert_eq!(interp.prove(goal, &failing).unwrap(), b_alone);
}

#[test]
fn test_saturate_stops_at_fixpoint() {
    let interp = Interpreter::builder().build();
    for k in [0, 1, 3] {
        let result = interp
            .prove(Sequent::goal(p()), &saturate(rule(Tick { limit: k })))
            .unwrap();
        let goal = result.cert().subgoal(0).unwrap();
        assert_eq!(Tick::ticks(goal), k);
        let exact = interp
            .prove(Sequent::goal(p()), &repeat(rule(Tick { limit: k }), k))
            .unwrap();
        assert_eq!(result, exact);
    }
}

#[test]
fn test_saturate_stops_when_closed_or_failing() {
    let interp = Interpreter::builder().build();
    let closing = CountingRule::new(Trust);
    let result = interp
        .prove(Sequent::goal(p()), &saturate(rule(closing.clone())))
        .unwrap();
    assert!(result.is_closed());
    assert_eq!(closing.count(), 1);

    let failing = interp
        .prove(Sequent::goal(p()), &saturate(rule(FailingRule::new("nope"))))
        .unwrap();
    assert_eq!(failing, ProofValue::start(Sequent::goal(p())));
}

#[test]
fn test_saturate_propagates_hard_errors() {
    let interp = Interpreter::builder().build();
    let err = interp
        .prove(Sequent::goal(Expr::and(p(), p())), &saturate(positional(AndRight)))
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::IllFormed);
}

// ---------------------------------------------------------------------------
// Branch strategies
// ---------------------------------------------------------------------------

fn three_branches() -> (Tactic, [CountingRule; 3]) {
    let counters = [
        CountingRule::new(FailingRule::new("zero")),
        CountingRule::new(Trust),
        CountingRule::new(FailingRule::new("two")),
    ];
    let t = rule(Split { arity: 3 }).then(branch(counters.iter().map(|c| rule(c.clone())).collect()));
    (t, counters)
}

#[test]
fn test_lazy_stops_at_first_failing_branch() {
    let interp = Interpreter::builder().strategy(Strategy::Lazy).build();
    let (t, counters) = three_branches();
    let err = interp.prove(Sequent::goal(p()), &t).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Inapplicable);
    assert!(err.trace().contains("branch 0 of 3 failed"));
    assert!(compound_failures(&err).is_empty());
    assert_eq!(counters[0].count(), 1);
    assert_eq!(counters[2].count(), 0);
}

#[test]
fn test_exhaustive_runs_every_branch() {
    let interp = Interpreter::builder().strategy(Strategy::Exhaustive).build();
    let (t, counters) = three_branches();
    let err = interp.prove(Sequent::goal(p()), &t).unwrap_err();
    assert_eq!(err.class(), ErrorClass::CompoundCritical);
    assert!(!err.is_recoverable());
    assert_eq!(compound_failures(&err), vec![0, 2]);
    for c in &counters {
        assert_eq!(c.count(), 1);
    }
}

#[test]
fn test_exhaustive_returns_abort_immediately() {
    let interp = Interpreter::builder().strategy(Strategy::Exhaustive).build();
    let switch = interp.kill_switch();
    let killer = dependent("killer", move |_| {
        switch.kill();
        Ok(Tactic::Idle)
    });
    let later = CountingRule::new(Trust);
    let t = rule(Split { arity: 3 }).then(branch(vec![killer, rule(later.clone()), rule(later.clone())]));
    let err = interp.prove(Sequent::goal(p()), &t).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Aborted);
    assert!(compound_failures(&err).is_empty());
    assert_eq!(later.count(), 0);
}

#[test]
fn test_branch_count_mismatch_names_both_counts() {
    let interp = Interpreter::builder().build();
    let t = rule(Split { arity: 3 }).then(branch(vec![Tactic::Idle, Tactic::Idle]));
    let err = interp.prove(Sequent::goal(p()), &t).unwrap_err();
    assert_eq!(err.class(), ErrorClass::IllFormed);
    assert!(err.trace().contains("2 branch tactic(s) for 3 open subgoal(s)"));
}

#[test]
fn test_branch_index_shifting() {
    let interp = Interpreter::builder().build();
    let parent = labelled_split(&["left", "right"]);
    let result = interp
        .run(&branch(vec![rule(Trust), rule(Split { arity: 2 })]), &parent)
        .unwrap();

    let base = parent.cert().subgoal(1).unwrap();
    let expected: Vec<Sequent> = (0..2)
        .map(|i| {
            let mut s = base.clone();
            s.ante.push(Expr::sym(&format!("case{i}")));
            s
        })
        .collect();
    assert_eq!(result.cert().subgoals(), expected.as_slice());
    assert_eq!(
        result.labels().unwrap(),
        &[BranchLabel::top("right"), BranchLabel::top("right")]
    );
}

#[test]
fn test_branch_accumulates_delayed_substitutions() {
    let interp = Interpreter::builder().build();
    let s = Substitution::single("p", Expr::tt());
    let t = at(AndRight, Position::Succ(0))
        .then(branch(vec![
            uniform_substitution(s.clone()).then(rule(CloseTrue)),
            Tactic::Idle,
        ]))
        .then(rule(CloseTrue));
    let result = interp.prove(Sequent::goal(Expr::and(p(), p())), &t).unwrap();
    assert!(result.is_closed());
    assert_eq!(result.pending(), Some(&s));
    assert_eq!(
        result.cert().conclusion(),
        &Sequent::goal(Expr::and(Expr::tt(), Expr::tt()))
    );
}

// ---------------------------------------------------------------------------
// Let
// ---------------------------------------------------------------------------

#[test]
fn test_let_backsubstitutes_into_outer_proof() {
    let interp = Interpreter::builder().build();
    let goal = Sequent::goal(Expr::geq(square("x"), Expr::num(0)));
    let inner = dependent("closeAbbreviated", |v| {
        let abbreviated = v.cert().subgoal(0).is_some_and(|g| g.contains(&Expr::sym("j")));
        if abbreviated {
            Ok(rule(Trust))
        } else {
            Err(TacticError::Inapplicable("goal was not abbreviated".into()))
        }
    });
    let via_let = interp
        .prove(goal.clone(), &let_abbrv("j", square("x"), inner))
        .unwrap();
    let direct = interp.prove(goal, &rule(Trust)).unwrap();
    assert!(via_let.is_closed());
    assert_eq!(via_let.cert(), direct.cert());
}

#[test]
fn test_let_clash_keeps_outer_goal_open() {
    let interp = Interpreter::builder().build();
    let goal = Sequent::goal(Expr::forall("x", Expr::geq(square("x"), Expr::num(0))));
    let result = interp
        .prove(goal.clone(), &let_abbrv("j", square("x"), rule(Trust)))
        .unwrap();
    assert!(!result.is_closed());
    assert_eq!(result.cert().conclusion(), &goal);
    assert_eq!(result.cert().subgoals(), &[goal.clone()]);
    assert!(result.pending().is_none());

    let inner = result.detached().unwrap();
    assert!(inner.is_closed());
    assert_ne!(inner.conclusion(), &goal);
    assert!(inner.conclusion().contains(&Expr::sym("j")));
}

#[test]
fn test_let_clash_is_not_accepted_as_a_proof() {
    let interp = Interpreter::builder().build();
    let goal = Sequent::goal(Expr::forall("x", Expr::geq(square("x"), Expr::num(0))));
    let options = || -> Box<dyn Iterator<Item = Input> + Send> { Box::new(std::iter::once(Input::Int(0))) };
    let build = |_: &Input| -> Result<Tactic, TacticError> { Ok(let_abbrv("j", square("x"), rule(Trust))) };
    let err = interp
        .prove(goal.clone(), &choose_some("abbreviate", options, build, false))
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::NoProgress);

    let saturated = interp
        .prove(goal.clone(), &saturate(let_abbrv("j", square("x"), rule(Trust))))
        .unwrap();
    assert!(!saturated.is_closed());
}

// ---------------------------------------------------------------------------
// Racing
// ---------------------------------------------------------------------------

#[test]
fn test_race_returns_slow_success_over_fast_failure() {
    init_tracing();
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let t = race(vec![
        rule(FailingRule::after("fast", ms(20))),
        rule(SlowRule::new(Trust, ms(150))),
    ]);
    let result = interp.prove(Sequent::goal(p()), &t).unwrap();
    assert!(result.is_closed());
}

#[test]
fn test_race_returns_some_valid_winner() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let t = race(vec![rule(Split { arity: 2 }), rule(Split { arity: 3 })]);
    let result = interp.prove(Sequent::goal(p()), &t).unwrap();
    assert!(matches!(result.subgoal_count(), 2 | 3));
}

#[test]
fn test_race_all_failing_is_recoverable() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let t = race(vec![rule(FailingRule::new("a")), rule(FailingRule::after("b", ms(10)))]);
    let err = interp.prove(Sequent::goal(p()), &t).unwrap_err();
    assert_eq!(err.class(), ErrorClass::NoProgress);
    assert!(err.is_recoverable());

    let fallback = either(race(vec![rule(FailingRule::new("a"))]), rule(Trust));
    assert!(interp.prove(Sequent::goal(p()), &fallback).unwrap().is_closed());
}

#[test]
fn test_race_fails_fast_on_hard_error() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let t = race(vec![positional(AndRight), rule(SlowRule::new(Trust, ms(300)))]);
    let err = interp
        .prove(Sequent::goal(Expr::and(p(), p())), &t)
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::IllFormed);
}

#[test]
fn test_race_branch_panic_is_fatal() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let t = race(vec![rule(PanicRule), rule(SlowRule::new(Trust, ms(300)))]);
    let err = interp.prove(Sequent::goal(p()), &t).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Fatal);
    assert!(err.trace().contains("rule exploded"));
}

#[test]
fn test_race_cancels_losers() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let ticks = CountingRule::new(Tick { limit: usize::MAX });
    let endless = saturate(rule(SlowRule::new(ticks.clone(), ms(5))));
    let t = race(vec![endless, rule(SlowRule::new(Trust, ms(50)))]);
    assert!(interp.prove(Sequent::goal(p()), &t).unwrap().is_closed());

    thread::sleep(ms(100));
    let settled = ticks.count();
    thread::sleep(ms(100));
    assert_eq!(ticks.count(), settled);
    assert!(!interp.is_dead());
}

#[test]
fn test_racing_branches_do_not_notify_caller_listeners() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let listener = Arc::new(RecordingListener::new());
    let interp = Interpreter::builder()
        .pool(pool.handle())
        .listener(listener.clone())
        .build();
    let t = race(vec![rule(Trust)]);
    interp.prove(Sequent::goal(p()), &t).unwrap();
    assert_eq!(listener.events(), vec!["begin race(trust)", "end race(trust)"]);
}

#[test]
fn test_nested_race() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let inner = race(vec![rule(FailingRule::new("a")), rule(SlowRule::new(Trust, ms(20)))]);
    let t = race(vec![inner, rule(FailingRule::after("b", ms(5)))]);
    assert!(interp.prove(Sequent::goal(p()), &t).unwrap().is_closed());
}

#[test]
fn test_nested_race_on_single_slot_pool() {
    let config = InterpreterConfig {
        max_blocking_threads: 1,
        ..InterpreterConfig::default()
    };
    let pool = WorkerPool::new(&config).unwrap();
    let interp = racing_interpreter(&pool);

    let t = race(vec![race(vec![rule(Trust)])]);
    assert!(interp.prove(Sequent::goal(p()), &t).unwrap().is_closed());

    let inner = race(vec![rule(FailingRule::new("a")), race(vec![rule(Split { arity: 2 })])]);
    let t = race(vec![inner, rule(FailingRule::new("b"))]);
    assert_eq!(interp.prove(Sequent::goal(p()), &t).unwrap().subgoal_count(), 2);
}

#[test]
fn test_timeout_moves_to_next_option() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let slow = rule(SlowRule::new(Trust, ms(2_000)));
    let t = timeout_alternatives(vec![slow, rule(Split { arity: 2 })], ms(100));
    let result = interp.prove(Sequent::goal(p()), &t).unwrap();
    assert_eq!(result.subgoal_count(), 2);
}

#[test]
fn test_timeout_exhausted_is_no_progress() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let endless = saturate(rule(SlowRule::new(Tick { limit: usize::MAX }, ms(5))));
    let t = timeout_alternatives(vec![endless], ms(50));
    let err = interp.prove(Sequent::goal(p()), &t).unwrap_err();
    assert_eq!(err.class(), ErrorClass::NoProgress);
    assert!(err.to_string().contains("ran out of time"));
}

#[test]
fn test_kill_from_another_thread_stops_race() {
    let pool = WorkerPool::new(&InterpreterConfig::default()).unwrap();
    let interp = racing_interpreter(&pool);
    let switch = interp.kill_switch();
    let killer = thread::spawn(move || {
        thread::sleep(ms(50));
        switch.kill();
    });
    let endless = saturate(rule(SlowRule::new(Tick { limit: usize::MAX }, ms(5))));
    let err = interp
        .prove(Sequent::goal(p()), &race(vec![endless]))
        .unwrap_err();
    killer.join().unwrap();
    assert_eq!(err.class(), ErrorClass::Aborted);
    assert!(interp.is_dead());
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn test_interpreter_from_toml() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[interpreter]\nstrategy = \"lazy\"\nworker_threads = 2\nmax_depth = 32").unwrap();
    let config = load_interpreter_toml(file.path()).unwrap();
    let pool = WorkerPool::new(&config).unwrap();
    let interp = Interpreter::from_config(&config).pool(pool.handle()).build();
    assert_eq!(interp.strategy(), Strategy::Lazy);

    let (t, counters) = three_branches();
    assert!(interp.prove(Sequent::goal(p()), &t).is_err());
    assert_eq!(counters[2].count(), 0);

    let deep = (0..40).fold(Tactic::Idle, |acc, _| Tactic::Idle.then(acc));
    let err = interp.prove(Sequent::goal(p()), &deep).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Fatal);
}
