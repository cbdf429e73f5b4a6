//! Wildcard index: padded n-gram -> term ids containing it.
//!
//! Entries use the postings encoding (sorted, gap + varbyte). Lookups return
//! candidate ids only; callers resolve them to text and confirm with
//! [`crate::wildcard::wildcard_match`].

use crate::codec;
use crate::gaps;
use crate::interface::{IndexResult, TermId};
use crate::storage::{KeyValueStore, TableKind, Transaction};
use crate::wildcard::{ngrams, query_ngram};
use futures::future::try_join_all;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

pub const TABLE: TableKind = TableKind::Wildcards;

/// Group term ids by n-gram. Keys come out sorted, which keeps the write
/// order deterministic before it is shuffled.
fn by_ngram(terms: &[String], ids: &[TermId], width: usize) -> Vec<(String, Vec<TermId>)> {
    let mut groups: BTreeMap<String, Vec<TermId>> = BTreeMap::new();
    for (term, &id) in terms.iter().zip(ids) {
        for gram in ngrams(term, width) {
            groups.entry(gram).or_default().push(id);
        }
    }
    let mut groups: Vec<_> = groups.into_iter().collect();
    groups.shuffle(&mut rand::thread_rng());
    groups
}

async fn read(store: &dyn KeyValueStore, tx: &Transaction, gram: &str) -> IndexResult<Vec<u64>> {
    match store.get(tx, TABLE, gram.as_bytes()).await? {
        Some(bytes) => Ok(codec::decode(&bytes)?),
        None => Ok(Vec::new()),
    }
}

async fn update<F>(store: &dyn KeyValueStore, tx: &Transaction, gram: &str, ids: &[TermId], apply: F) -> IndexResult<()>
where
    F: Fn(&mut Vec<u64>, u64) -> bool,
{
    let mut list = read(store, tx, gram).await?;
    let mut changed = false;
    for &id in ids {
        changed |= apply(&mut list, id);
    }
    if !changed {
        return Ok(());
    }

    if list.is_empty() {
        store.remove(tx, TABLE, gram.as_bytes()).await?;
    } else {
        store.put(tx, TABLE, gram.as_bytes(), codec::encode(&list)).await?;
    }
    Ok(())
}

/// Index each term (paired with its id) under all of its n-grams.
pub async fn insert_bulk(
    store: &dyn KeyValueStore,
    tx: &Transaction,
    terms: &[String],
    ids: &[TermId],
    width: usize,
) -> IndexResult<()> {
    let groups = by_ngram(terms, ids, width);
    try_join_all(
        groups
            .iter()
            .map(|(gram, ids)| update(store, tx, gram, ids, gaps::insert)),
    )
    .await?;
    Ok(())
}

/// Drop each term from all of its n-grams, deleting entries that empty.
pub async fn remove_bulk(
    store: &dyn KeyValueStore,
    tx: &Transaction,
    terms: &[String],
    ids: &[TermId],
    width: usize,
) -> IndexResult<()> {
    let groups = by_ngram(terms, ids, width);
    try_join_all(
        groups
            .iter()
            .map(|(gram, ids)| update(store, tx, gram, ids, gaps::remove)),
    )
    .await?;
    Ok(())
}

/// Candidate term ids for `pattern`, ascending. Fails when the pattern has no
/// literal run of `width` characters.
pub async fn candidates(store: &dyn KeyValueStore, tx: &Transaction, pattern: &str, width: usize) -> IndexResult<Vec<TermId>> {
    let gram = query_ngram(pattern, width)?;
    Ok(gaps::from_gaps(&read(store, tx, &gram).await?))
}
