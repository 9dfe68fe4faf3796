use std::fmt;

use crate::error::KernelError;
use crate::rules::Rule;
use crate::sequent::{Position, Sequent};
use crate::subst::Substitution;

/// An immutable, possibly incomplete derivation: a conclusion plus the
/// ordered open subgoals that remain to be proved.
///
/// The fields are private; the only way to obtain a certificate is
/// [`Certificate::start`] followed by kernel operations, so every value of
/// this type is derivable from its conclusion's subgoals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    conclusion: Sequent,
    subgoals: Vec<Sequent>,
}

impl Certificate {
    /// The trivial derivation `goal` from `goal`.
    pub fn start(goal: Sequent) -> Self {
        Self {
            conclusion: goal.clone(),
            subgoals: vec![goal],
        }
    }

    pub fn conclusion(&self) -> &Sequent {
        &self.conclusion
    }

    pub fn subgoals(&self) -> &[Sequent] {
        &self.subgoals
    }

    pub fn subgoal(&self, index: usize) -> Option<&Sequent> {
        self.subgoals.get(index)
    }

    pub fn subgoal_count(&self) -> usize {
        self.subgoals.len()
    }

    /// True when no open subgoals remain.
    pub fn is_closed(&self) -> bool {
        self.subgoals.is_empty()
    }

    fn require_subgoal(&self, index: usize) -> Result<&Sequent, KernelError> {
        self.subgoals.get(index).ok_or(KernelError::NoSuchSubgoal {
            index,
            count: self.subgoals.len(),
        })
    }

    /// Apply `rule` to subgoal `index`; its premises replace the subgoal in
    /// place, so later subgoals shift by `premises - 1`.
    pub fn apply_rule(
        &self,
        index: usize,
        rule: &dyn Rule,
        position: Option<Position>,
    ) -> Result<Certificate, KernelError> {
        let goal = self.require_subgoal(index)?;
        let premises = rule.apply(goal, position)?;
        tracing::trace!(
            rule = rule.name(),
            index,
            premises = premises.len(),
            "Applied rule"
        );
        let mut subgoals = self.subgoals.clone();
        subgoals.splice(index..=index, premises);
        Ok(Certificate {
            conclusion: self.conclusion.clone(),
            subgoals,
        })
    }

    /// Uniformly substitute the whole derivation.
    pub fn apply_substitution(&self, subst: &Substitution) -> Result<Certificate, KernelError> {
        Ok(Certificate {
            conclusion: subst.apply_sequent(&self.conclusion)?,
            subgoals: self
                .subgoals
                .iter()
                .map(|s| subst.apply_sequent(s))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Merge `child` into subgoal `index`, after substituting `self` with
    /// `subst` if given.
    ///
    /// The child's conclusion must be exactly that subgoal. Returns the merged
    /// certificate together with the number of subgoals the child inserted in
    /// place of the one it discharged.
    pub fn splice_child(
        &self,
        index: usize,
        child: &Certificate,
        subst: Option<&Substitution>,
    ) -> Result<(Certificate, usize), KernelError> {
        let parent = match subst {
            Some(s) => self.apply_substitution(s)?,
            None => self.clone(),
        };
        let goal = parent.require_subgoal(index)?;
        if *goal != child.conclusion {
            return Err(KernelError::ConclusionMismatch {
                expected: goal.to_string(),
                found: child.conclusion.to_string(),
            });
        }
        let mut subgoals = parent.subgoals;
        subgoals.splice(index..=index, child.subgoals.iter().cloned());
        Ok((
            Certificate {
                conclusion: parent.conclusion,
                subgoals,
            },
            child.subgoals.len(),
        ))
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} open]", self.conclusion, self.subgoals.len())
    }
}
