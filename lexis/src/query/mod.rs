//! Query language: syntax tree, parser and evaluator.

mod ast;
mod evaluator;
mod lexer;
mod parser;

pub use ast::{Anchor, PhraseOp, QueryNode};
pub use evaluator::{evaluate, QuerySource};
pub use lexer::{Lexer, PhraseSuffix, Token};
pub use parser::QueryParser;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Parse failure; the message is shown to the user as is.
    #[error("{0}")]
    Syntax(String),
    #[error("Malformed keyword")]
    MalformedKeyword,
    #[error("Malformed phrase query")]
    MalformedPhrase,
    #[error("Invalid NOT in AND query")]
    InvalidNot,
}

/// Parse a query string into a tree with normalized keywords and tokenized
/// phrases.
pub fn parse(query: &str) -> Result<QueryNode, QueryError> {
    QueryParser::new(query)?.parse()
}
