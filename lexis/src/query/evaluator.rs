//! Query evaluation over term searches.
//!
//! Leaves (keywords and phrases) are answered by a [`QuerySource`]; inner
//! nodes combine their children's hits by document with the set helpers.

use super::ast::{Anchor, PhraseOp, QueryNode};
use super::QueryError;
use crate::interface::{IndexApi, IndexError, IndexResult, SearchHit, SearchResult};
use crate::sets::{contains, intersect_by, minus_by, ordered, proximity, quorum, union_by};
use crate::wildcard::{has_wildcard, wildcard_match};
use futures::future::BoxFuture;
use futures::FutureExt;

/// The two lookups a query needs.
#[async_trait::async_trait]
pub trait QuerySource: Send + Sync {
    /// Documents containing any of `terms`.
    async fn search_terms(&self, terms: &[String]) -> IndexResult<SearchResult>;

    /// Indexed terms matching a wildcard pattern.
    async fn expand_wildcard(&self, pattern: &str) -> IndexResult<Vec<String>>;
}

#[async_trait::async_trait]
impl<T: IndexApi + ?Sized> QuerySource for T {
    async fn search_terms(&self, terms: &[String]) -> IndexResult<SearchResult> {
        self.search(terms).await
    }

    async fn expand_wildcard(&self, pattern: &str) -> IndexResult<Vec<String>> {
        self.wildcard(pattern).await
    }
}

/// Evaluate `node`, returning matching documents with their matched terms.
pub async fn evaluate(source: &dyn QuerySource, node: &QueryNode) -> IndexResult<Vec<SearchHit>> {
    evaluate_node(source, node).await
}

fn evaluate_node<'a>(source: &'a dyn QuerySource, node: &'a QueryNode) -> BoxFuture<'a, IndexResult<Vec<SearchHit>>> {
    async move {
        match node {
            QueryNode::Keyword { keyword, anchor } => keyword_hits(source, keyword, *anchor).await,
            QueryNode::Phrase { tokens, anchor, op } => phrase_hits(source, tokens, *anchor, *op).await,
            QueryNode::And { left, right, not_left, not_right } => {
                if *not_left && *not_right {
                    return Err(IndexError::Query(QueryError::InvalidNot));
                }
                let (left_hits, right_hits) =
                    futures::try_join!(evaluate_node(source, left), evaluate_node(source, right))?;

                Ok(match (*not_left, *not_right) {
                    (false, true) => minus_by(left_hits, &right_hits, doc_of),
                    (true, false) => minus_by(right_hits, &left_hits, doc_of),
                    _ => intersect_by(left_hits, &right_hits, doc_of, |a, b| Some(merge_matches(a, b))),
                })
            }
            QueryNode::Or { left, right } => {
                let (left_hits, right_hits) =
                    futures::try_join!(evaluate_node(source, left), evaluate_node(source, right))?;
                Ok(union_by(left_hits, right_hits, doc_of, |a, b| Some(merge_matches(a, &b))))
            }
            QueryNode::Before { left, right } => {
                let (left_hits, right_hits) =
                    futures::try_join!(evaluate_node(source, left), evaluate_node(source, right))?;
                Ok(intersect_by(left_hits, &right_hits, doc_of, |a, b| {
                    ordered(&a.term_ids, &a.matched_ids, &b.matched_ids, |x, y| x == y).then(|| merge_matches(a, b))
                }))
            }
        }
    }
    .boxed()
}

fn doc_of(hit: &SearchHit) -> u64 {
    hit.doc
}

/// `a` with the matched terms of `b` appended, without repeats.
fn merge_matches(mut a: SearchHit, b: &SearchHit) -> SearchHit {
    for (id, text) in b.matched_ids.iter().zip(&b.matched) {
        if !a.matched_ids.contains(id) {
            a.matched_ids.push(*id);
            a.matched.push(text.clone());
        }
    }
    a
}

async fn keyword_hits(source: &dyn QuerySource, keyword: &str, anchor: Anchor) -> IndexResult<Vec<SearchHit>> {
    if keyword.is_empty() || keyword == "*" {
        return Err(QueryError::MalformedKeyword.into());
    }

    let terms = if has_wildcard(keyword) {
        source.expand_wildcard(keyword).await?
    } else {
        vec![keyword.to_string()]
    };
    let hits = source.search_terms(&terms).await?.hits;

    if anchor.is_none() {
        return Ok(hits);
    }

    Ok(hits
        .into_iter()
        .filter(|hit| {
            let (Some(first), Some(last)) = (hit.term_ids.first(), hit.term_ids.last()) else {
                return false;
            };
            hit.matched_ids
                .iter()
                .any(|id| (!anchor.start || id == first) && (!anchor.end || id == last))
        })
        .collect())
}

fn term_matches(term: &String, pattern: &String) -> bool {
    wildcard_match(term, pattern)
}

fn anchors_hold(terms: &[String], tokens: &[String], anchor: Anchor) -> bool {
    let (Some(first), Some(last)) = (terms.first(), terms.last()) else {
        return anchor.is_none();
    };
    let (Some(first_token), Some(last_token)) = (tokens.first(), tokens.last()) else {
        return true;
    };
    (!anchor.start || term_matches(first, first_token)) && (!anchor.end || term_matches(last, last_token))
}

async fn phrase_hits(source: &dyn QuerySource, tokens: &[String], anchor: Anchor, op: PhraseOp) -> IndexResult<Vec<SearchHit>> {
    let Some(first) = tokens.first() else {
        return Err(QueryError::MalformedPhrase.into());
    };

    // One literal token narrows the candidates; without one, the first
    // token's expansions do.
    let terms = match tokens.iter().find(|token| !has_wildcard(token)) {
        Some(literal) => vec![literal.clone()],
        None => source.expand_wildcard(first).await?,
    };
    let hits = source.search_terms(&terms).await?.hits;

    if op == PhraseOp::Quorum(1) {
        return Ok(hits);
    }

    Ok(hits
        .into_iter()
        .filter(|hit| {
            anchors_hold(&hit.terms, tokens, anchor)
                && match op {
                    PhraseOp::All => contains(&hit.terms, tokens, term_matches).is_some(),
                    PhraseOp::Proximity(n) => proximity(&hit.terms, tokens, u64::from(n), term_matches),
                    PhraseOp::Quorum(n) => quorum(&hit.terms, tokens, n as usize, term_matches),
                }
        })
        .collect())
}
