use std::fmt;

use proof_kernel::KernelError;

/// Classification of a [`TacticError`], used by combinators to decide
/// whether to recover and by `TryCatch` to match handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The tactic ran but did not change the proof.
    NoProgress,
    /// The tactic (or one of its rules) does not apply to this goal.
    Inapplicable,
    /// Wrong arity, wrong value shape or an unbound position.
    IllFormed,
    SubstitutionClash,
    /// The kernel rejected a merge of derivations.
    Soundness,
    CompoundCritical,
    Aborted,
    Fatal,
    /// A dependent or input tactic could not be computed.
    Construction,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoProgress => "no-progress",
            Self::Inapplicable => "inapplicable",
            Self::IllFormed => "ill-formed",
            Self::SubstitutionClash => "substitution-clash",
            Self::Soundness => "soundness",
            Self::CompoundCritical => "compound-critical",
            Self::Aborted => "aborted",
            Self::Fatal => "fatal",
            Self::Construction => "construction",
        };
        write!(f, "{name}")
    }
}

/// Errors raised while interpreting tactics.
///
/// Recoverable variants ([`NoProgress`](Self::NoProgress),
/// [`Inapplicable`](Self::Inapplicable)) are search-control signals that
/// alternative, saturating and racing combinators act on. Everything else
/// propagates. Combinators add [`Context`](Self::Context) layers while
/// unwinding; context never changes the classification.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TacticError {
    #[error("no progress: {0}")]
    NoProgress(String),

    #[error("inapplicable: {0}")]
    Inapplicable(String),

    #[error("ill-formed tactic application: {0}")]
    IllFormed(String),

    #[error("substitution clash: {0}")]
    SubstitutionClash(String),

    #[error("kernel rejected derivation: {0}")]
    Soundness(String),

    #[error("{} branch(es) failed: [{}]", failures.len(), summarize(failures))]
    CompoundCritical { failures: Vec<(usize, TacticError)> },

    #[error("aborted: {0}")]
    Aborted(String),

    /// The interpreter's own state may be corrupted; callers should restart
    /// the interpreter process rather than retry the proof attempt.
    #[error("fatal interpreter error, restart the interpreter: {0}")]
    Fatal(String),

    #[error("could not construct tactic {tactic} from {value}")]
    Construction {
        tactic: String,
        value: String,
        #[source]
        source: Box<TacticError>,
    },

    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<TacticError>,
    },
}

fn summarize(failures: &[(usize, TacticError)]) -> String {
    failures
        .iter()
        .map(|(i, e)| format!("branch {i}: {}", e.root_cause()))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<KernelError> for TacticError {
    fn from(e: KernelError) -> Self {
        match e {
            KernelError::Inapplicable { .. } => TacticError::Inapplicable(e.to_string()),
            KernelError::NoSuchSubgoal { .. } | KernelError::MissingPosition { .. } => {
                TacticError::IllFormed(e.to_string())
            }
            KernelError::ConclusionMismatch { .. } => TacticError::Soundness(e.to_string()),
            KernelError::Clash(msg) => TacticError::SubstitutionClash(msg),
        }
    }
}

impl TacticError {
    /// Wrap in a context layer naming where the failure happened.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        TacticError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The class of this layer, or `None` for pure context layers.
    pub fn layer_class(&self) -> Option<ErrorClass> {
        Some(match self {
            Self::NoProgress(_) => ErrorClass::NoProgress,
            Self::Inapplicable(_) => ErrorClass::Inapplicable,
            Self::IllFormed(_) => ErrorClass::IllFormed,
            Self::SubstitutionClash(_) => ErrorClass::SubstitutionClash,
            Self::Soundness(_) => ErrorClass::Soundness,
            Self::CompoundCritical { .. } => ErrorClass::CompoundCritical,
            Self::Aborted(_) => ErrorClass::Aborted,
            Self::Fatal(_) => ErrorClass::Fatal,
            Self::Construction { .. } => ErrorClass::Construction,
            Self::Context { .. } => return None,
        })
    }

    /// Classification with context layers peeled off.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Context { source, .. } => source.class(),
            other => other.layer_class().unwrap_or(ErrorClass::Fatal),
        }
    }

    /// Whether this is a search-control signal ("try something else").
    ///
    /// Construction failures inherit recoverability from their cause: a
    /// dependent tactic that finds nothing to do is an ordinary search miss.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NoProgress(_) | Self::Inapplicable(_) => true,
            Self::Context { source, .. } | Self::Construction { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }

    /// Aborted or fatal: never caught by any combinator.
    pub fn is_terminal(&self) -> bool {
        matches!(self.class(), ErrorClass::Aborted | ErrorClass::Fatal)
    }

    /// This error followed by its chain of causes.
    pub fn causes(&self) -> Causes<'_> {
        Causes { next: Some(self) }
    }

    /// The innermost cause.
    pub fn root_cause(&self) -> &TacticError {
        self.causes().last().unwrap_or(self)
    }

    /// Render the whole cause chain, outermost first.
    pub fn trace(&self) -> String {
        self.causes()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n  caused by: ")
    }
}

/// Iterator over an error and its causes.
pub struct Causes<'a> {
    next: Option<&'a TacticError>,
}

impl<'a> Iterator for Causes<'a> {
    type Item = &'a TacticError;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = match current {
            TacticError::Context { source, .. } | TacticError::Construction { source, .. } => {
                Some(source.as_ref())
            }
            _ => None,
        };
        Some(current)
    }
}
