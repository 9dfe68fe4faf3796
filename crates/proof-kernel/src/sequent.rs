use std::fmt;

use crate::expr::Expr;

/// A position of a formula within a sequent (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Ante(usize),
    Succ(usize),
}

impl fmt::Display for Position {
    /// Signed 1-based notation: antecedent positions are negative.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Ante(i) => write!(f, "-{}", i + 1),
            Position::Succ(i) => write!(f, "{}", i + 1),
        }
    }
}

/// A sequent `ante ==> succ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Sequent {
    pub ante: Vec<Expr>,
    pub succ: Vec<Expr>,
}

impl Sequent {
    pub fn new(ante: Vec<Expr>, succ: Vec<Expr>) -> Self {
        Self { ante, succ }
    }

    /// The sequent `==> formula`.
    pub fn goal(formula: Expr) -> Self {
        Self {
            ante: Vec::new(),
            succ: vec![formula],
        }
    }

    /// The formula at `pos`, if in range.
    pub fn at(&self, pos: Position) -> Option<&Expr> {
        match pos {
            Position::Ante(i) => self.ante.get(i),
            Position::Succ(i) => self.succ.get(i),
        }
    }

    /// A copy with the formula at `pos` replaced. Out-of-range positions
    /// leave the sequent unchanged.
    pub fn updated(&self, pos: Position, formula: Expr) -> Sequent {
        let mut s = self.clone();
        let slot = match pos {
            Position::Ante(i) => s.ante.get_mut(i),
            Position::Succ(i) => s.succ.get_mut(i),
        };
        if let Some(slot) = slot {
            *slot = formula;
        }
        s
    }

    /// A copy with the formula at `pos` removed.
    pub fn removed(&self, pos: Position) -> Sequent {
        let mut s = self.clone();
        match pos {
            Position::Ante(i) if i < s.ante.len() => {
                s.ante.remove(i);
            }
            Position::Succ(i) if i < s.succ.len() => {
                s.succ.remove(i);
            }
            _ => {}
        }
        s
    }

    /// Replace `what` by `with` in every formula.
    pub fn replace_all(&self, what: &Expr, with: &Expr) -> Sequent {
        Sequent {
            ante: self.ante.iter().map(|f| f.replace_all(what, with)).collect(),
            succ: self.succ.iter().map(|f| f.replace_all(what, with)).collect(),
        }
    }

    /// Whether `sub` occurs in any formula.
    pub fn contains(&self, sub: &Expr) -> bool {
        self.ante.iter().chain(self.succ.iter()).any(|f| f.contains(sub))
    }

    /// Apply a fallible transformation to every formula.
    pub fn try_map<E>(&self, mut f: impl FnMut(&Expr) -> Result<Expr, E>) -> Result<Sequent, E> {
        Ok(Sequent {
            ante: self.ante.iter().map(&mut f).collect::<Result<_, _>>()?,
            succ: self.succ.iter().map(&mut f).collect::<Result<_, _>>()?,
        })
    }
}

impl fmt::Display for Sequent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |fs: &[Expr]| fs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ");
        if self.ante.is_empty() {
            write!(f, "==> {}", join(self.succ.as_slice()))
        } else {
            write!(f, "{} ==> {}", join(self.ante.as_slice()), join(self.succ.as_slice()))
        }
    }
}
