use std::fmt;

use proof_kernel::{Certificate, Sequent, Substitution};

use crate::label::{adjust_labels, BranchLabel};

/// The state a tactic consumes and produces.
///
/// `Delayed` carries a certificate that proves the *substituted* form of the
/// original goal, together with the substitution still owed to the
/// enclosing proof. Labels, when present, always have one entry per open
/// subgoal.
///
/// `detached` holds a derivation that could not be merged into `cert` (a
/// local abbreviation whose backsubstitution clashed). It is only kept for
/// inspection, never counts towards closing `cert`, and is dropped by the
/// next step that rebuilds the value.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofValue {
    Provable {
        cert: Certificate,
        labels: Option<Vec<BranchLabel>>,
        detached: Option<Box<Certificate>>,
    },
    Delayed {
        cert: Certificate,
        labels: Option<Vec<BranchLabel>>,
        subst: Substitution,
        detached: Option<Box<Certificate>>,
    },
}

impl ProofValue {
    /// An unlabelled, undelayed value.
    pub fn new(cert: Certificate) -> Self {
        ProofValue::Provable {
            cert,
            labels: None,
            detached: None,
        }
    }

    /// A fresh proof attempt for `goal`.
    pub fn start(goal: Sequent) -> Self {
        Self::new(Certificate::start(goal))
    }

    /// Build from parts, fitting `labels` to the certificate's subgoal count.
    /// An empty pending substitution is dropped.
    pub fn from_parts(
        cert: Certificate,
        labels: Option<Vec<BranchLabel>>,
        pending: Option<Substitution>,
    ) -> Self {
        let labels = adjust_labels(labels.as_deref(), cert.subgoal_count());
        match pending {
            Some(subst) if !subst.is_empty() => ProofValue::Delayed {
                cert,
                labels,
                subst,
                detached: None,
            },
            _ => ProofValue::Provable {
                cert,
                labels,
                detached: None,
            },
        }
    }

    pub fn into_parts(self) -> (Certificate, Option<Vec<BranchLabel>>, Option<Substitution>) {
        match self {
            ProofValue::Provable { cert, labels, .. } => (cert, labels, None),
            ProofValue::Delayed { cert, labels, subst, .. } => (cert, labels, Some(subst)),
        }
    }

    pub fn cert(&self) -> &Certificate {
        match self {
            ProofValue::Provable { cert, .. } | ProofValue::Delayed { cert, .. } => cert,
        }
    }

    pub fn labels(&self) -> Option<&[BranchLabel]> {
        match self {
            ProofValue::Provable { labels, .. } | ProofValue::Delayed { labels, .. } => labels.as_deref(),
        }
    }

    /// The substitution still owed to the enclosing proof, if delayed.
    pub fn pending(&self) -> Option<&Substitution> {
        match self {
            ProofValue::Provable { .. } => None,
            ProofValue::Delayed { subst, .. } => Some(subst),
        }
    }

    /// A derivation kept alongside this value without being part of it.
    pub fn detached(&self) -> Option<&Certificate> {
        match self {
            ProofValue::Provable { detached, .. } | ProofValue::Delayed { detached, .. } => detached.as_deref(),
        }
    }

    pub fn with_detached(mut self, inner: Certificate) -> ProofValue {
        match &mut self {
            ProofValue::Provable { detached, .. } | ProofValue::Delayed { detached, .. } => {
                *detached = Some(Box::new(inner));
            }
        }
        self
    }

    pub fn is_delayed(&self) -> bool {
        matches!(self, ProofValue::Delayed { .. })
    }

    pub fn subgoal_count(&self) -> usize {
        self.cert().subgoal_count()
    }

    pub fn is_closed(&self) -> bool {
        self.cert().is_closed()
    }

    /// Same variant and pending substitution with a new certificate; labels
    /// are refitted to the new subgoal count.
    pub fn advance(&self, cert: Certificate) -> ProofValue {
        Self::from_parts(cert, self.labels().map(<[_]>::to_vec), self.pending().cloned())
    }

    pub fn relabel(&self, labels: Option<Vec<BranchLabel>>) -> ProofValue {
        Self::from_parts(self.cert().clone(), labels, self.pending().cloned())
    }

    /// Fold `subst` into the pending substitution, turning a provable value
    /// into a delayed one.
    pub fn with_pending(self, subst: &Substitution) -> ProofValue {
        let (cert, labels, pending) = self.into_parts();
        let pending = match pending {
            Some(p) => p.compose(subst),
            None => subst.clone(),
        };
        Self::from_parts(cert, labels, Some(pending))
    }
}

impl fmt::Display for ProofValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cert())?;
        if let Some(labels) = self.labels() {
            let names: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
            write!(f, " labels=[{}]", names.join(", "))?;
        }
        if let Some(subst) = self.pending() {
            write!(f, " pending={subst}")?;
        }
        if let Some(inner) = self.detached() {
            write!(f, " detached={inner}")?;
        }
        Ok(())
    }
}
