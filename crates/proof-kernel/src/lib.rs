//! Reference proof kernel.
//!
//! Provides the small trusted core the tactic engine drives: an expression
//! language with a single binder, sequents, uniform substitutions with
//! admissibility checks, and immutable [`Certificate`]s that can only be
//! transformed by kernel operations.
//!
//! # Quick Start
//!
//! ```
//! use proof_kernel::{Certificate, Expr, Position, Sequent};
//! use proof_kernel::rules::{AndRight, CloseTrue};
//!
//! let goal = Sequent::goal(Expr::and(Expr::tt(), Expr::tt()));
//! let cert = Certificate::start(goal)
//!     .apply_rule(0, &AndRight, Some(Position::Succ(0)))?
//!     .apply_rule(0, &CloseTrue, None)?
//!     .apply_rule(0, &CloseTrue, None)?;
//! assert!(cert.is_closed());
//! # Ok::<(), proof_kernel::KernelError>(())
//! ```

pub mod certificate;
pub mod error;
pub mod expr;
pub mod rules;
pub mod sequent;
pub mod subst;
pub mod unify;

pub use certificate::Certificate;
pub use error::KernelError;
pub use expr::Expr;
pub use rules::Rule;
pub use sequent::{Position, Sequent};
pub use subst::{Substitution, SubstitutionPair};
pub use unify::{match_expr, match_sequent};
