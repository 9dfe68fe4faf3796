//! Shared invariant candidates and definitions.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use proof_kernel::{Expr, Substitution};

use crate::error::TacticError;

/// A proposed invariant for some program, with an optional proof hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub formula: Expr,
    pub hint: Option<String>,
}

impl Candidate {
    pub fn new(formula: Expr) -> Self {
        Self { formula, hint: None }
    }

    pub fn with_hint(formula: Expr, hint: impl Into<String>) -> Self {
        Self {
            formula,
            hint: Some(hint.into()),
        }
    }
}

/// Thread-safe store of invariant candidates keyed by program.
///
/// Clones share the same store. Every interpreter forked for a racing
/// branch holds a clone, so candidates registered by one branch are seen by
/// its siblings.
#[derive(Debug, Clone, Default)]
pub struct InvariantStore {
    inner: Arc<RwLock<HashMap<Expr, Vec<Candidate>>>>,
}

impl InvariantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates for `program`, in registration order.
    pub fn candidates(&self, program: &Expr) -> Vec<Candidate> {
        self.inner
            .read()
            .unwrap()
            .get(program)
            .cloned()
            .unwrap_or_default()
    }

    /// Register a candidate. Returns false if it was already known.
    pub fn add(&self, program: Expr, candidate: Candidate) -> bool {
        let mut map = self.inner.write().unwrap();
        let entry = map.entry(program).or_default();
        if entry.contains(&candidate) {
            return false;
        }
        entry.push(candidate);
        true
    }

    /// Register the `subst` image of every known candidate.
    ///
    /// Pairs whose substitution clashes are skipped. Returns how many new
    /// candidates were added.
    pub fn extend_substituted(&self, subst: &Substitution) -> usize {
        let snapshot: Vec<(Expr, Vec<Candidate>)> = {
            let map = self.inner.read().unwrap();
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let mut added = 0;
        for (program, candidates) in snapshot {
            let Ok(program) = subst.apply(&program) else {
                continue;
            };
            for c in candidates {
                let Ok(formula) = subst.apply(&c.formula) else {
                    continue;
                };
                if self.add(program.clone(), Candidate { formula, hint: c.hint }) {
                    added += 1;
                }
            }
        }
        tracing::debug!(%subst, added, "Extended invariant candidates");
        added
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Named bodies of abstract symbols, unfolded by `Expand`.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    bodies: BTreeMap<String, Expr>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define symbol `name()` as `body`.
    pub fn define(mut self, name: impl Into<String>, body: Expr) -> Self {
        self.bodies.insert(name.into(), body);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.bodies.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bodies.keys().map(String::as_str)
    }

    /// The combined unfolding substitution for `names`, in the given order.
    pub fn substitution_for<S: AsRef<str>>(&self, names: &[S]) -> Result<Substitution, TacticError> {
        let pairs = names
            .iter()
            .map(|n| {
                let n = n.as_ref();
                self.get(n)
                    .map(|body| (n.to_string(), body.clone()))
                    .ok_or_else(|| TacticError::IllFormed(format!("no definition for {n}()")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Substitution::from_pairs(pairs))
    }
}
