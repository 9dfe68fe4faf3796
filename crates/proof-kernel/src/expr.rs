use std::collections::BTreeSet;
use std::fmt;

/// A term or formula of the kernel's expression language.
///
/// Formulas are expressions too: connectives, relations and arithmetic are
/// all [`Expr::App`] nodes with a reserved operator name. The only binder is
/// [`Expr::Forall`], which is what makes substitution admissibility checks
/// meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expr {
    /// A bindable variable (`x`).
    Var(String),
    /// An abstract symbol that uniform substitutions may replace (`p()`).
    Sym(String),
    /// An integer literal.
    Num(i64),
    /// Operator or function application.
    App(String, Vec<Expr>),
    /// Universal quantification over a variable.
    Forall(String, Box<Expr>),
}

const INFIX: &[(&str, &str)] = &[
    ("and", "&"),
    ("or", "|"),
    ("imp", "->"),
    ("equiv", "<->"),
    ("eq", "="),
    ("geq", ">="),
    ("leq", "<="),
    ("gt", ">"),
    ("lt", "<"),
    ("plus", "+"),
    ("minus", "-"),
    ("times", "*"),
    ("pow", "^"),
];

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn sym(name: &str) -> Self {
        Expr::Sym(name.to_string())
    }

    pub fn num(n: i64) -> Self {
        Expr::Num(n)
    }

    pub fn app(op: &str, args: Vec<Expr>) -> Self {
        Expr::App(op.to_string(), args)
    }

    pub fn tt() -> Self {
        Expr::app("true", vec![])
    }

    pub fn ff() -> Self {
        Expr::app("false", vec![])
    }

    pub fn not(e: Expr) -> Self {
        Expr::app("not", vec![e])
    }

    pub fn and(l: Expr, r: Expr) -> Self {
        Expr::app("and", vec![l, r])
    }

    pub fn or(l: Expr, r: Expr) -> Self {
        Expr::app("or", vec![l, r])
    }

    pub fn imp(l: Expr, r: Expr) -> Self {
        Expr::app("imp", vec![l, r])
    }

    pub fn eq(l: Expr, r: Expr) -> Self {
        Expr::app("eq", vec![l, r])
    }

    pub fn geq(l: Expr, r: Expr) -> Self {
        Expr::app("geq", vec![l, r])
    }

    pub fn plus(l: Expr, r: Expr) -> Self {
        Expr::app("plus", vec![l, r])
    }

    pub fn pow(l: Expr, r: Expr) -> Self {
        Expr::app("pow", vec![l, r])
    }

    pub fn forall(var: &str, body: Expr) -> Self {
        Expr::Forall(var.to_string(), Box::new(body))
    }

    /// If this is a binary application of `op`, return its operands.
    pub fn binary(&self, op: &str) -> Option<(&Expr, &Expr)> {
        match self {
            Expr::App(name, args) if name == op && args.len() == 2 => Some((&args[0], &args[1])),
            _ => None,
        }
    }

    /// Replace every occurrence of `what` by `with`, structurally.
    ///
    /// This is plain syntactic replacement used for abbreviating subterms;
    /// it performs no capture checks (those belong to [`crate::Substitution`]).
    pub fn replace_all(&self, what: &Expr, with: &Expr) -> Expr {
        if self == what {
            return with.clone();
        }
        match self {
            Expr::App(op, args) => Expr::App(
                op.clone(),
                args.iter().map(|a| a.replace_all(what, with)).collect(),
            ),
            Expr::Forall(x, body) => Expr::Forall(x.clone(), Box::new(body.replace_all(what, with))),
            other => other.clone(),
        }
    }

    /// Whether `sub` occurs anywhere in this expression.
    pub fn contains(&self, sub: &Expr) -> bool {
        if self == sub {
            return true;
        }
        match self {
            Expr::App(_, args) => args.iter().any(|a| a.contains(sub)),
            Expr::Forall(_, body) => body.contains(sub),
            _ => false,
        }
    }

    /// Variables occurring free (not under a binder of the same name).
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free(&mut Vec::new(), &mut out);
        out
    }

    fn collect_free(&self, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
        match self {
            Expr::Var(x) if !bound.contains(x) => {
                out.insert(x.clone());
            }
            Expr::App(_, args) => args.iter().for_each(|a| a.collect_free(bound, out)),
            Expr::Forall(x, body) => {
                bound.push(x.clone());
                body.collect_free(bound, out);
                bound.pop();
            }
            _ => {}
        }
    }

    /// Names of all abstract symbols in this expression.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Sym(s) => {
                out.insert(s.clone());
            }
            Expr::App(_, args) => args.iter().for_each(|a| a.collect_symbols(out)),
            Expr::Forall(_, body) => body.collect_symbols(out),
            _ => {}
        }
    }

    fn is_atomic(&self) -> bool {
        match self {
            Expr::App(op, args) => INFIX.iter().all(|(name, _)| name != op) || args.len() != 2,
            Expr::Forall(..) => false,
            _ => true,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_atomic() {
            write!(f, "{self}")
        } else {
            write!(f, "({self})")
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(x) => write!(f, "{x}"),
            Expr::Sym(s) => write!(f, "{s}()"),
            Expr::Num(n) => write!(f, "{n}"),
            Expr::App(op, args) if args.is_empty() => write!(f, "{op}"),
            Expr::App(op, args) if op == "not" && args.len() == 1 => {
                write!(f, "!")?;
                args[0].fmt_operand(f)
            }
            Expr::App(op, args) => {
                if let (Some((_, sym)), 2) = (INFIX.iter().find(|(name, _)| name == op), args.len()) {
                    args[0].fmt_operand(f)?;
                    write!(f, " {sym} ")?;
                    return args[1].fmt_operand(f);
                }
                write!(f, "{op}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Expr::Forall(x, body) => {
                write!(f, "\\forall {x} ")?;
                body.fmt_operand(f)
            }
        }
    }
}
