//! Query syntax tree

use std::fmt;

/// `^` / `$` anchors. On a keyword they require the matched term to be the
/// document's first / last token; on a phrase they apply to the phrase's
/// first / last token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Anchor {
    pub start: bool,
    pub end: bool,
}

impl Anchor {
    pub const NONE: Anchor = Anchor { start: false, end: false };

    pub fn is_none(&self) -> bool {
        !self.start && !self.end
    }
}

/// How the tokens of a phrase must occur in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhraseOp {
    /// Contiguous, in order
    All,
    /// `~n`: gaps between the tokens sum to less than `n`
    Proximity(u32),
    /// `/n`: at least `n` of the tokens occur
    Quorum(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    Keyword {
        keyword: String,
        anchor: Anchor,
    },
    Phrase {
        tokens: Vec<String>,
        anchor: Anchor,
        op: PhraseOp,
    },
    /// Both operands, or the non-negated one minus the negated one.
    And {
        left: Box<QueryNode>,
        right: Box<QueryNode>,
        not_left: bool,
        not_right: bool,
    },
    Or {
        left: Box<QueryNode>,
        right: Box<QueryNode>,
    },
    /// Both operands, with a left match at or before a right match.
    Before {
        left: Box<QueryNode>,
        right: Box<QueryNode>,
    },
}

impl QueryNode {
    pub fn keyword(keyword: impl Into<String>) -> Self {
        QueryNode::Keyword { keyword: keyword.into(), anchor: Anchor::NONE }
    }

    pub fn anchored(keyword: impl Into<String>, start: bool, end: bool) -> Self {
        QueryNode::Keyword { keyword: keyword.into(), anchor: Anchor { start, end } }
    }

    pub fn phrase<S: Into<String>>(tokens: impl IntoIterator<Item = S>, op: PhraseOp) -> Self {
        QueryNode::Phrase {
            tokens: tokens.into_iter().map(Into::into).collect(),
            anchor: Anchor::NONE,
            op,
        }
    }

    pub fn and(left: QueryNode, right: QueryNode) -> Self {
        Self::and_not(left, right, false, false)
    }

    pub fn and_not(left: QueryNode, right: QueryNode, not_left: bool, not_right: bool) -> Self {
        QueryNode::And {
            left: Box::new(left),
            right: Box::new(right),
            not_left,
            not_right,
        }
    }

    pub fn or(left: QueryNode, right: QueryNode) -> Self {
        QueryNode::Or { left: Box::new(left), right: Box::new(right) }
    }

    pub fn before(left: QueryNode, right: QueryNode) -> Self {
        QueryNode::Before { left: Box::new(left), right: Box::new(right) }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, node: &QueryNode, negated: bool) -> fmt::Result {
    if negated {
        f.write_str("!")?;
    }
    match node {
        QueryNode::Keyword { .. } | QueryNode::Phrase { .. } => write!(f, "{}", node),
        _ => write!(f, "({})", node),
    }
}

/// Renders the query back in query syntax, with every compound operand
/// parenthesized.
impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Keyword { keyword, anchor } => {
                if anchor.start {
                    f.write_str("^")?;
                }
                f.write_str(keyword)?;
                if anchor.end {
                    f.write_str("$")?;
                }
                Ok(())
            }
            QueryNode::Phrase { tokens, anchor, op } => {
                f.write_str("\"")?;
                if anchor.start {
                    f.write_str("^")?;
                }
                f.write_str(&tokens.join(" "))?;
                if anchor.end {
                    f.write_str("$")?;
                }
                f.write_str("\"")?;
                match op {
                    PhraseOp::All => Ok(()),
                    PhraseOp::Proximity(n) => write!(f, "~{}", n),
                    PhraseOp::Quorum(n) => write!(f, "/{}", n),
                }
            }
            QueryNode::And { left, right, not_left, not_right } => {
                write_operand(f, left, *not_left)?;
                f.write_str(" & ")?;
                write_operand(f, right, *not_right)
            }
            QueryNode::Or { left, right } => {
                write_operand(f, left, false)?;
                f.write_str(" | ")?;
                write_operand(f, right, false)
            }
            QueryNode::Before { left, right } => {
                write_operand(f, left, false)?;
                f.write_str(" << ")?;
                write_operand(f, right, false)
            }
        }
    }
}
