//! Lexis - persistent full-text search over a key-value store
//!
//! Documents are indexed as token streams. Terms and document ids are interned
//! into dense integer surrogates; postings, positions and a wildcard n-gram
//! index are kept as gap + varbyte encoded lists.
//!
//! Searches take plain terms, `*`/`?` wildcard patterns or a small boolean
//! query language (`&`, `|`, `<<`, `!`, quoted phrases with `~n` and `/n`).

pub mod codec;
pub mod config;
pub mod dictionary;
pub mod gaps;
mod index;
pub mod interface;
pub mod positions;
pub mod postings;
pub mod query;
pub mod scoring;
pub mod sets;
pub mod storage;
pub mod tokenize;
pub mod wildcard;
pub mod wildcards;

pub use config::IndexConfig;
pub use index::Index;
pub use interface::*;
pub use query::{parse, QueryError, QueryNode};
pub use tokenize::{tokenize, tokenize_text};
