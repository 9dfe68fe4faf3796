use std::fmt;

/// Hierarchical name of an open subgoal, e.g. `init//base`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BranchLabel {
    Top(String),
    Sub(Box<BranchLabel>, String),
}

impl BranchLabel {
    pub fn top(name: impl Into<String>) -> Self {
        BranchLabel::Top(name.into())
    }

    /// A child label one level below `self`.
    pub fn child(&self, name: impl Into<String>) -> Self {
        BranchLabel::Sub(Box::new(self.clone()), name.into())
    }

    /// Append every component of `suffix` below `self`.
    pub fn append(&self, suffix: &BranchLabel) -> Self {
        suffix
            .components()
            .into_iter()
            .fold(self.clone(), |acc, c| acc.child(c))
    }

    /// Components from the root down.
    pub fn components(&self) -> Vec<&str> {
        match self {
            BranchLabel::Top(name) => vec![name.as_str()],
            BranchLabel::Sub(parent, name) => {
                let mut out = parent.components();
                out.push(name.as_str());
                out
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            BranchLabel::Top(_) => 1,
            BranchLabel::Sub(parent, _) => parent.depth() + 1,
        }
    }

    /// Whether `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: &BranchLabel) -> bool {
        let mine = self.components();
        let theirs = other.components();
        mine.len() >= theirs.len() && mine[..theirs.len()] == theirs[..]
    }
}

impl fmt::Display for BranchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components().join("//"))
    }
}

/// Make a label list fit `count` subgoals.
///
/// Longer lists are truncated. Shorter lists are padded by repeating the
/// last label, since new subgoals inherit the provenance of the branch
/// that produced them. An empty list cannot be padded and becomes `None`,
/// as does a missing one.
pub fn adjust_labels(labels: Option<&[BranchLabel]>, count: usize) -> Option<Vec<BranchLabel>> {
    let labels = labels?;
    if labels.len() >= count {
        return Some(labels[..count].to_vec());
    }
    let last = labels.last()?;
    let mut out = labels.to_vec();
    out.resize(count, last.clone());
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_joins_components() {
        let l = BranchLabel::top("init").child("base").child("0");
        assert_eq!(l.to_string(), "init//base//0");
        assert_eq!(l.depth(), 3);
    }

    #[test]
    fn test_append_extends_below() {
        let suffix = BranchLabel::top("use").child("left");
        let l = BranchLabel::top("step").append(&suffix);
        assert_eq!(l.components(), vec!["step", "use", "left"]);
        assert!(l.starts_with(&BranchLabel::top("step")));
        assert!(!BranchLabel::top("step").starts_with(&l));
    }

    #[test]
    fn test_adjust_pads_with_last_label() {
        let labels = vec![BranchLabel::top("a"), BranchLabel::top("b")];
        let out = adjust_labels(Some(&labels), 4).unwrap();
        assert_eq!(
            out,
            vec![
                BranchLabel::top("a"),
                BranchLabel::top("b"),
                BranchLabel::top("b"),
                BranchLabel::top("b"),
            ]
        );
    }

    #[test]
    fn test_adjust_truncates() {
        let labels = vec![BranchLabel::top("a"), BranchLabel::top("b")];
        assert_eq!(adjust_labels(Some(&labels), 1).unwrap(), vec![BranchLabel::top("a")]);
        assert_eq!(adjust_labels(Some(&labels), 0).unwrap(), vec![]);
    }

    #[test]
    fn test_adjust_keeps_absence() {
        assert_eq!(adjust_labels(None, 3), None);
        assert_eq!(adjust_labels(Some(&[]), 0), Some(vec![]));
        assert_eq!(adjust_labels(Some(&[]), 2), None);
    }
}
