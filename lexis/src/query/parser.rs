//! Recursive descent parser for query strings
//!
//! # Grammar
//!
//! ```text
//! query    := and EOF
//! and      := operand ('&'? and)?
//! operand  := NOT primary | before
//! before   := or ('<<' before)?
//! or       := primary ('|' or)?
//! primary  := keyword | phrase | '(' and ')'
//! keyword  := '^'? WORD '$'?
//! phrase   := '"' '^'? TOKENS '$'? '"' ('~' N | '/' N)?
//! ```
//!
//! Every binary production is right-recursive, so `a b c` is `a & (b & c)`
//! and `a << b | c` is `a << (b | c)`. Negation is only accepted on an
//! operand of `&`, and never on both operands of the same `&`.
//!
//! Keywords come out normalized and phrase text tokenized, so the tree can be
//! evaluated against indexed terms directly.

use super::ast::{Anchor, PhraseOp, QueryNode};
use super::lexer::{Lexer, PhraseSuffix, Token, NOT_IN_WORD};
use super::QueryError;
use crate::tokenize::{normalize, tokenize};
use crate::wildcard::is_wildcard;

const NOT_IN_AND: &str = "Unexpected NOT in AND query";
const BARE_WILDCARD: &str = "Unexpected wildcard, only supported in PHRASE query";

fn syntax(message: impl Into<String>) -> QueryError {
    QueryError::Syntax(message.into())
}

/// Split `^` / `$` off the ends of `text`.
fn split_anchor(text: &str) -> (&str, Anchor) {
    let mut anchor = Anchor::NONE;
    let mut body = text;
    if let Some(rest) = body.strip_prefix('^') {
        anchor.start = true;
        body = rest;
    }
    if let Some(rest) = body.strip_suffix('$') {
        anchor.end = true;
        body = rest;
    }
    (body, anchor)
}

pub struct QueryParser {
    lexer: Lexer,
    current_token: Token,
}

impl QueryParser {
    pub fn new(input: &str) -> Result<Self, QueryError> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        Ok(Self { lexer, current_token })
    }

    pub fn parse(&mut self) -> Result<QueryNode, QueryError> {
        if self.current_token == Token::Eof {
            return Err(syntax("Empty query"));
        }

        let (node, negated) = self.parse_and()?;
        if negated {
            return Err(syntax(NOT_IN_WORD));
        }

        if self.current_token != Token::Eof {
            return Err(syntax(format!("Unexpected {}", self.current_token.describe())));
        }
        Ok(node)
    }

    fn advance(&mut self) -> Result<(), QueryError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self.current_token,
            Token::Word(_) | Token::Phrase(..) | Token::LeftParen | Token::Not
        )
    }

    /// Parse: and := operand ('&'? and)?
    ///
    /// Returns the node and whether it is a lone negated operand, which only
    /// the enclosing `&` can absorb.
    fn parse_and(&mut self) -> Result<(QueryNode, bool), QueryError> {
        let (left, not_left) = self.parse_operand()?;

        if self.current_token == Token::And {
            self.advance()?;
        } else if !self.starts_operand() {
            return Ok((left, not_left));
        }

        let (right, not_right) = self.parse_and()?;
        if not_left && not_right {
            return Err(syntax(NOT_IN_AND));
        }
        Ok((QueryNode::and_not(left, right, not_left, not_right), false))
    }

    /// Parse: operand := NOT primary | before
    fn parse_operand(&mut self) -> Result<(QueryNode, bool), QueryError> {
        if self.current_token != Token::Not {
            return Ok((self.parse_before()?, false));
        }

        self.advance()?;
        let node = self.parse_primary()?;
        if matches!(self.current_token, Token::Or | Token::Before) {
            return Err(syntax(NOT_IN_WORD));
        }
        Ok((node, true))
    }

    /// Parse: before := or ('<<' before)?
    fn parse_before(&mut self) -> Result<QueryNode, QueryError> {
        let left = self.parse_or()?;
        if self.current_token != Token::Before {
            return Ok(left);
        }
        self.advance()?;
        Ok(QueryNode::before(left, self.parse_before()?))
    }

    /// Parse: or := primary ('|' or)?
    fn parse_or(&mut self) -> Result<QueryNode, QueryError> {
        let left = self.parse_primary()?;
        if self.current_token != Token::Or {
            return Ok(left);
        }
        self.advance()?;
        Ok(QueryNode::or(left, self.parse_or()?))
    }

    fn parse_primary(&mut self) -> Result<QueryNode, QueryError> {
        match std::mem::replace(&mut self.current_token, Token::Eof) {
            Token::Word(word) => {
                self.advance()?;
                Self::keyword(&word)
            }
            Token::Phrase(text, suffix) => {
                self.advance()?;
                Self::phrase(&text, suffix)
            }
            Token::LeftParen => {
                self.advance()?;
                let (node, negated) = self.parse_and()?;
                if negated {
                    return Err(syntax(NOT_IN_WORD));
                }
                if self.current_token != Token::RightParen {
                    return Err(syntax(format!("Expected ')', found {}", self.current_token.describe())));
                }
                self.advance()?;
                Ok(node)
            }
            Token::Not => Err(syntax(NOT_IN_WORD)),
            other => Err(syntax(format!("Unexpected {}", other.describe()))),
        }
    }

    fn keyword(word: &str) -> Result<QueryNode, QueryError> {
        let (body, anchor) = split_anchor(word);
        if !body.is_empty() && body.chars().all(is_wildcard) {
            return Err(syntax(BARE_WILDCARD));
        }

        let keyword = normalize(body);
        if keyword.is_empty() {
            return Err(QueryError::MalformedKeyword);
        }
        Ok(QueryNode::Keyword { keyword, anchor })
    }

    fn phrase(text: &str, suffix: Option<PhraseSuffix>) -> Result<QueryNode, QueryError> {
        let (body, anchor) = split_anchor(text.trim());
        let tokens = tokenize(body, 0, false);
        if tokens.is_empty() {
            return Err(QueryError::MalformedPhrase);
        }

        let op = match suffix {
            None => PhraseOp::All,
            Some(PhraseSuffix::Proximity(n)) => PhraseOp::Proximity(n),
            Some(PhraseSuffix::Quorum(n)) => PhraseOp::Quorum(n),
        };
        Ok(QueryNode::Phrase { tokens, anchor, op })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;

    fn kw(word: &str) -> QueryNode {
        QueryNode::keyword(word)
    }

    fn err(input: &str) -> String {
        parse(input).unwrap_err().to_string()
    }

    #[test]
    fn test_default_and() {
        assert_eq!(parse("cat mouse").unwrap(), QueryNode::and(kw("cat"), kw("mouse")));
        assert_eq!(parse("cat & mouse").unwrap(), QueryNode::and(kw("cat"), kw("mouse")));
    }

    #[test]
    fn test_or_and_before() {
        assert_eq!(parse("cat | mouse").unwrap(), QueryNode::or(kw("cat"), kw("mouse")));
        assert_eq!(parse("cat << mouse").unwrap(), QueryNode::before(kw("cat"), kw("mouse")));
        assert_eq!(
            parse("cat << mouse | dog").unwrap(),
            QueryNode::before(kw("cat"), QueryNode::or(kw("mouse"), kw("dog")))
        );
    }

    #[test]
    fn test_phrases() {
        assert_eq!(
            parse("hello \"cat mouse\"").unwrap(),
            QueryNode::and(kw("hello"), QueryNode::phrase(["cat", "mouse"], PhraseOp::All))
        );
        assert_eq!(
            parse("\"cat mouse\"/10").unwrap(),
            QueryNode::phrase(["cat", "mouse"], PhraseOp::Quorum(10))
        );
        assert_eq!(
            parse("\"cat mouse\"~10").unwrap(),
            QueryNode::phrase(["cat", "mouse"], PhraseOp::Proximity(10))
        );
        assert_eq!(
            parse("\"hello you there\"").unwrap(),
            QueryNode::phrase(["hello", "you", "there"], PhraseOp::All)
        );
    }

    #[test]
    fn test_anchors() {
        assert_eq!(parse("^hello$").unwrap(), QueryNode::anchored("hello", true, true));
        assert_eq!(parse("cat$").unwrap(), QueryNode::anchored("cat", false, true));
        assert_eq!(
            parse("\"^he* there$\"").unwrap(),
            QueryNode::Phrase {
                tokens: vec!["he*".into(), "there".into()],
                anchor: Anchor { start: true, end: true },
                op: PhraseOp::All,
            }
        );
    }

    #[test]
    fn test_keywords_are_normalized() {
        assert_eq!(parse("hèllö").unwrap(), kw("hello"));
        assert_eq!(parse("\"Crème Brûlée\"").unwrap(), QueryNode::phrase(["creme", "brulee"], PhraseOp::All));
    }

    #[test]
    fn test_right_nesting() {
        assert_eq!(
            parse("looking for cat | mouse").unwrap(),
            QueryNode::and(
                kw("looking"),
                QueryNode::and(kw("for"), QueryNode::or(kw("cat"), kw("mouse")))
            )
        );
        assert_eq!(
            parse("(bag of words) << \"phrase  here\" << red|blue|green").unwrap(),
            QueryNode::before(
                QueryNode::and(kw("bag"), QueryNode::and(kw("of"), kw("words"))),
                QueryNode::before(
                    QueryNode::phrase(["phrase", "here"], PhraseOp::All),
                    QueryNode::or(kw("red"), QueryNode::or(kw("blue"), kw("green")))
                )
            )
        );
        assert_eq!(
            parse("partridge << turtle doves << French hens").unwrap(),
            QueryNode::and(
                QueryNode::before(kw("partridge"), kw("turtle")),
                QueryNode::and(QueryNode::before(kw("doves"), kw("french")), kw("hens"))
            )
        );
    }

    #[test]
    fn test_grouping() {
        assert_eq!(
            parse("(looking for) | (cat mouse)").unwrap(),
            QueryNode::or(
                QueryNode::and(kw("looking"), kw("for")),
                QueryNode::and(kw("cat"), kw("mouse"))
            )
        );
        assert_eq!(
            parse("(looking for) | cat").unwrap(),
            QueryNode::or(QueryNode::and(kw("looking"), kw("for")), kw("cat"))
        );
    }

    #[test]
    fn test_not() {
        assert_eq!(
            parse("!hello world").unwrap(),
            QueryNode::and_not(kw("hello"), kw("world"), true, false)
        );
        assert_eq!(
            parse("hello -world").unwrap(),
            QueryNode::and_not(kw("hello"), kw("world"), false, true)
        );
        assert_eq!(
            parse("hello -(or | query)").unwrap(),
            QueryNode::and_not(kw("hello"), QueryNode::or(kw("or"), kw("query")), false, true)
        );
        assert_eq!(
            parse("aaa -(bbb -(ccc ddd))").unwrap(),
            QueryNode::and_not(
                kw("aaa"),
                QueryNode::and_not(kw("bbb"), QueryNode::and(kw("ccc"), kw("ddd")), false, true),
                false,
                true
            )
        );
    }

    #[test]
    fn test_illegal_not() {
        for input in ["-cat", "cat | -dog", "!cat | dog", "!cat | !dog", "cat << -dog", "c!at", "!c!at", "(-cat)"] {
            assert_eq!(err(input), "Unexpected NOT in WORD", "{}", input);
        }
        assert_eq!(err("-cat -dog"), "Unexpected NOT in AND query");
        assert_eq!(err("\"cat !dog\""), "Unexpected NOT in PHRASE query");
        assert_eq!(err("\"cat !dog\"/~10"), "Unexpected NOT in PHRASE query");
    }

    #[test]
    fn test_illegal_wildcard() {
        assert_eq!(err("hello *"), "Unexpected wildcard, only supported in PHRASE query");
        assert_eq!(parse("he*").unwrap(), kw("he*"));
    }

    #[test]
    fn test_malformed() {
        assert!(parse("").is_err());
        assert!(parse("(cat").is_err());
        assert!(parse("cat)").is_err());
        assert!(parse("cat |").is_err());
        assert_eq!(parse("\"  \"").unwrap_err(), QueryError::MalformedPhrase);
        assert_eq!(parse("^$").unwrap_err(), QueryError::MalformedKeyword);
    }

    #[test]
    fn test_display_parses_back() {
        for input in ["a b | c", "a << \"b c\"~2 !d", "^x$ | (\"^y z$\"/1 & w)"] {
            let node = parse(input).unwrap();
            assert_eq!(parse(&node.to_string()).unwrap(), node, "{}", input);
        }
    }
}
