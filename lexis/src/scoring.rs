//! TF-IDF cosine scoring
//!
//! `idf = log10(N / df)`, `wt = 1 + log10(tf)`. Each query term adds
//! `(1 / |terms|) * idf * wt * idf` to every document listing it, and each
//! document's total is divided by its token count.

use crate::interface::{SearchHit, SearchResult};
use std::collections::HashMap;
use std::hash::Hash;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoringError {
    #[error("Ragged scoring input: {terms} terms but {lists} document lists")]
    Ragged { terms: usize, lists: usize },
}

pub type ScoringResult<T> = Result<T, ScoringError>;

fn idf(corpus_size: u64, df: usize) -> f64 {
    if df == 0 {
        return 0.0;
    }
    (corpus_size as f64 / df as f64).log10()
}

fn wt(tf: usize) -> f64 {
    if tf == 0 {
        return 0.0;
    }
    1.0 + (tf as f64).log10()
}

/// Score every document listed in `terms_to_ids`.
///
/// `terms_to_ids[i]` lists the documents containing `terms[i]`;
/// `ids_to_terms` holds each document's tokens. Documents without tokens
/// score 0.
pub fn score<T, D>(
    terms: &[T],
    terms_to_ids: &[Vec<D>],
    corpus_size: u64,
    ids_to_terms: &HashMap<D, Vec<T>>,
) -> ScoringResult<HashMap<D, f64>>
where
    T: PartialEq,
    D: Copy + Eq + Hash,
{
    if terms.len() != terms_to_ids.len() {
        return Err(ScoringError::Ragged {
            terms: terms.len(),
            lists: terms_to_ids.len(),
        });
    }

    let mut scores: HashMap<D, f64> = HashMap::new();
    for (term, docs) in terms.iter().zip(terms_to_ids) {
        let term_idf = idf(corpus_size, docs.len());
        let query_weight = term_idf / terms.len() as f64;

        for doc in docs {
            let tf = ids_to_terms
                .get(doc)
                .map_or(0, |tokens| tokens.iter().filter(|t| *t == term).count());
            *scores.entry(*doc).or_insert(0.0) += wt(tf) * term_idf * query_weight;
        }
    }

    for (doc, total) in scores.iter_mut() {
        let len = ids_to_terms.get(doc).map_or(0, Vec::len);
        *total = if len > 0 { *total / len as f64 } else { 0.0 };
    }
    Ok(scores)
}

/// Hits of `result` ordered by descending score, ties kept in result order.
pub fn rank(terms: &[String], result: &SearchResult, corpus_size: u64) -> ScoringResult<Vec<(SearchHit, f64)>> {
    let streams: HashMap<u64, Vec<String>> = result
        .hits
        .iter()
        .map(|hit| (hit.doc, hit.terms.clone()))
        .collect();
    let scores = score(terms, &result.terms_to_ids, corpus_size, &streams)?;

    let mut ranked: Vec<(SearchHit, f64)> = result
        .hits
        .iter()
        .map(|hit| (hit.clone(), scores.get(&hit.doc).copied().unwrap_or(0.0)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(ranked)
}
