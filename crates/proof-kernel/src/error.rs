/// Errors reported by kernel operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// The rule does not apply to the goal (wrong shape at the position).
    #[error("{rule} is not applicable: {reason}")]
    Inapplicable { rule: String, reason: String },

    /// A subgoal index outside the certificate's open subgoals.
    #[error("no subgoal {index} in a certificate with {count} open subgoal(s)")]
    NoSuchSubgoal { index: usize, count: usize },

    /// A positional rule was applied without a position.
    #[error("{rule} requires a position")]
    MissingPosition { rule: String },

    /// A child derivation does not conclude the subgoal it is spliced into.
    #[error("conclusion mismatch: expected {expected}, found {found}")]
    ConclusionMismatch { expected: String, found: String },

    /// A substitution is not admissible (domain or capture clash).
    #[error("substitution clash: {0}")]
    Clash(String),
}
