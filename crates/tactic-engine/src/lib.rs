//! Tactic interpreter for the proof kernel.
//!
//! Runs a combinator language of proof tactics against immutable proof
//! states. Every result is derived from the input by kernel operations
//! only, while the interpreter provides search control: alternatives,
//! saturation, per-subgoal branching, racing on a thread pool, local
//! abbreviations and delayed substitutions.
//!
//! # Key types
//!
//! - [`Interpreter`]: recursive evaluator, built with [`Interpreter::builder`]
//! - [`Tactic`]: the combinator tree, with builder functions in [`tactic`]
//! - [`ProofValue`]: certificate plus labels and pending substitution
//! - [`TacticError`] / [`ErrorClass`]: failure taxonomy; recoverable errors
//!   drive search, everything else propagates with context
//! - [`WorkerPool`]: runtime that racing combinators run branches on
//! - [`InterpreterConfig`]: configuration loaded from TOML
//! - [`IOListener`]: observer hooks around every evaluation step
//!
//! # Example
//!
//! ```
//! use proof_kernel::rules::{AndRight, CloseTrue};
//! use proof_kernel::{Expr, Position, Sequent};
//! use tactic_engine::tactic::{at, on_all, rule};
//! use tactic_engine::Interpreter;
//!
//! let interp = Interpreter::builder().build();
//! let goal = Sequent::goal(Expr::and(Expr::tt(), Expr::tt()));
//! let proof = interp.prove(goal, &at(AndRight, Position::Succ(0)).then(on_all(rule(CloseTrue))))?;
//! assert!(proof.is_closed());
//! # Ok::<(), tactic_engine::TacticError>(())
//! ```

mod abbreviation;
mod branch;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod invariants;
pub mod label;
pub mod listener;
pub mod mocks;
pub mod pool;
mod race;
pub mod subst;
pub mod tactic;
pub mod value;

pub use config::{load_interpreter_toml, InterpreterConfig, Strategy};
pub use error::{ErrorClass, TacticError};
pub use interpreter::{EvalResult, Interpreter, InterpreterBuilder, KillSwitch};
pub use invariants::{Candidate, Definitions, InvariantStore};
pub use label::{adjust_labels, BranchLabel};
pub use listener::{IOListener, TracingListener};
pub use pool::{PoolHandle, WorkerPool};
pub use tactic::{Input, Instantiator, Tactic, TacticRef};
pub use value::ProofValue;
