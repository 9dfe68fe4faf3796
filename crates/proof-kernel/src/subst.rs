use std::fmt;

use crate::error::KernelError;
use crate::expr::Expr;
use crate::sequent::Sequent;

/// One replacement `name() ~> repl` of a uniform substitution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubstitutionPair {
    pub what: String,
    pub repl: Expr,
}

/// A uniform substitution: an ordered list of symbol replacements.
///
/// Pairs are kept in insertion order so that composition is observable in
/// logs. Admissibility is only checked on application, which lets callers
/// accumulate substitutions freely and learn about clashes at the point the
/// kernel actually uses them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Substitution {
    pairs: Vec<SubstitutionPair>,
}

impl Substitution {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The single replacement `what() ~> repl`.
    pub fn single(what: &str, repl: Expr) -> Self {
        Self {
            pairs: vec![SubstitutionPair {
                what: what.to_string(),
                repl,
            }],
        }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Expr)>) -> Self {
        let mut s = Self::default();
        for (what, repl) in pairs {
            s.push(what, repl);
        }
        s
    }

    fn push(&mut self, what: String, repl: Expr) {
        let pair = SubstitutionPair { what, repl };
        if !self.pairs.contains(&pair) {
            self.pairs.push(pair);
        }
    }

    pub fn pairs(&self) -> &[SubstitutionPair] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Symbols replaced by this substitution.
    pub fn domain(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|p| p.what.as_str())
    }

    /// Accumulate `other` after `self`. Exact duplicates are dropped;
    /// conflicting replacements are kept and surface as a clash on use.
    pub fn compose(&self, other: &Substitution) -> Substitution {
        let mut out = self.clone();
        for p in &other.pairs {
            out.push(p.what.clone(), p.repl.clone());
        }
        out
    }

    fn lookup(&self, name: &str) -> Option<&Expr> {
        self.pairs.iter().find(|p| p.what == name).map(|p| &p.repl)
    }

    /// Fail if a symbol is mapped to two different replacements.
    pub fn check_domain(&self) -> Result<(), KernelError> {
        for (i, p) in self.pairs.iter().enumerate() {
            if let Some(q) = self.pairs[i + 1..].iter().find(|q| q.what == p.what) {
                return Err(KernelError::Clash(format!(
                    "{}() is mapped to both {} and {}",
                    p.what, p.repl, q.repl
                )));
            }
        }
        Ok(())
    }

    /// Apply to an expression, rejecting replacements whose free variables
    /// would be captured by an enclosing quantifier.
    pub fn apply(&self, e: &Expr) -> Result<Expr, KernelError> {
        self.check_domain()?;
        self.apply_under(e, &mut Vec::new())
    }

    fn apply_under(&self, e: &Expr, bound: &mut Vec<String>) -> Result<Expr, KernelError> {
        match e {
            Expr::Sym(name) => match self.lookup(name) {
                Some(repl) => {
                    let free = repl.free_vars();
                    if let Some(x) = bound.iter().find(|x| free.contains(*x)) {
                        return Err(KernelError::Clash(format!(
                            "replacing {name}() by {repl} would capture {x}"
                        )));
                    }
                    Ok(repl.clone())
                }
                None => Ok(e.clone()),
            },
            Expr::App(op, args) => Ok(Expr::App(
                op.clone(),
                args.iter()
                    .map(|a| self.apply_under(a, bound))
                    .collect::<Result<_, _>>()?,
            )),
            Expr::Forall(x, body) => {
                bound.push(x.clone());
                let body = self.apply_under(body, bound);
                bound.pop();
                Ok(Expr::Forall(x.clone(), Box::new(body?)))
            }
            Expr::Var(_) | Expr::Num(_) => Ok(e.clone()),
        }
    }

    pub fn apply_sequent(&self, s: &Sequent) -> Result<Sequent, KernelError> {
        s.try_map(|f| self.apply(f))
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, p) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}() ~> {}", p.what, p.repl)?;
        }
        write!(f, "}}")
    }
}
