//! Postings: term id -> sorted document ids, gap + varbyte encoded.

use crate::codec;
use crate::gaps;
use crate::interface::{DocId, IndexResult, TermId};
use crate::sets::unique_by;
use crate::storage::{KeyValueStore, TableKind, Transaction};
use futures::future::try_join_all;
use rand::seq::SliceRandom;
use std::collections::HashMap;

pub const TABLE: TableKind = TableKind::Postings;

/// Postings of several terms, inverted per document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingsLookup {
    /// Documents in first-seen order, walking the terms in query order
    pub ids: Vec<DocId>,
    /// For each entry of `ids`, the query terms listing it, in query order
    pub ids_to_terms: Vec<Vec<TermId>>,
    /// For each query term, its documents
    pub terms_to_ids: Vec<Vec<DocId>>,
}

async fn read_gaps(store: &dyn KeyValueStore, tx: &Transaction, term: TermId) -> IndexResult<Vec<u64>> {
    match store.get(tx, TABLE, &codec::encode_one(term)).await? {
        Some(bytes) => Ok(codec::decode(&bytes)?),
        None => Ok(Vec::new()),
    }
}

async fn write_gaps(store: &dyn KeyValueStore, tx: &Transaction, term: TermId, list: &[u64]) -> IndexResult<()> {
    let key = codec::encode_one(term);
    if list.is_empty() {
        store.remove(tx, TABLE, &key).await?;
    } else {
        store.put(tx, TABLE, &key, codec::encode(list)).await?;
    }
    Ok(())
}

pub async fn get(store: &dyn KeyValueStore, tx: &Transaction, term: TermId) -> IndexResult<Vec<DocId>> {
    Ok(gaps::from_gaps(&read_gaps(store, tx, term).await?))
}

/// Terms in random order, deduplicated. Spreads write contention when
/// concurrent writers touch overlapping term sets.
fn shuffled(terms: &[TermId]) -> Vec<TermId> {
    let mut order = unique_by(terms.to_vec(), |t| *t);
    order.shuffle(&mut rand::thread_rng());
    order
}

async fn insert_one(store: &dyn KeyValueStore, tx: &Transaction, term: TermId, doc: DocId) -> IndexResult<(TermId, bool)> {
    let mut list = read_gaps(store, tx, term).await?;
    let was_empty = list.is_empty();
    if gaps::insert(&mut list, doc) {
        write_gaps(store, tx, term, &list).await?;
    }
    Ok((term, was_empty))
}

/// Add `doc` to every term's postings. Returns the terms whose postings were
/// empty before, in input order.
pub async fn insert_bulk(
    store: &dyn KeyValueStore,
    tx: &Transaction,
    terms: &[TermId],
    doc: DocId,
) -> IndexResult<Vec<TermId>> {
    let order = shuffled(terms);
    let results = try_join_all(order.iter().map(|&term| insert_one(store, tx, term, doc))).await?;
    let fresh: HashMap<TermId, bool> = results.into_iter().collect();

    Ok(unique_by(terms.to_vec(), |t| *t)
        .into_iter()
        .filter(|term| fresh.get(term).copied().unwrap_or(false))
        .collect())
}

/// Remove `docs` from one term's postings, deleting the entry when it
/// empties. Returns true if the term has no postings afterwards.
pub async fn remove_docs(store: &dyn KeyValueStore, tx: &Transaction, term: TermId, docs: &[DocId]) -> IndexResult<bool> {
    let mut list = read_gaps(store, tx, term).await?;
    if list.is_empty() {
        return Ok(true);
    }

    let mut changed = false;
    for &doc in docs {
        changed |= gaps::remove(&mut list, doc);
    }
    if changed {
        write_gaps(store, tx, term, &list).await?;
    }
    Ok(list.is_empty())
}

/// Remove `doc` from every term's postings. Returns, per input term, whether
/// the term has no postings left.
pub async fn remove_bulk(
    store: &dyn KeyValueStore,
    tx: &Transaction,
    terms: &[TermId],
    doc: DocId,
) -> IndexResult<Vec<bool>> {
    let order = shuffled(terms);
    let results = try_join_all(order.iter().map(|&term| async move {
        let emptied = remove_docs(store, tx, term, &[doc]).await?;
        Ok::<_, crate::interface::IndexError>((term, emptied))
    }))
    .await?;
    let emptied: HashMap<TermId, bool> = results.into_iter().collect();

    Ok(terms.iter().map(|term| emptied.get(term).copied().unwrap_or(false)).collect())
}

pub async fn get_bulk(store: &dyn KeyValueStore, tx: &Transaction, terms: &[TermId]) -> IndexResult<PostingsLookup> {
    let lists = try_join_all(terms.iter().map(|&term| get(store, tx, term))).await?;

    let mut lookup = PostingsLookup::default();
    let mut positions: HashMap<DocId, usize> = HashMap::new();

    for (term, docs) in terms.iter().zip(&lists) {
        for &doc in docs {
            match positions.get(&doc) {
                Some(&i) => lookup.ids_to_terms[i].push(*term),
                None => {
                    positions.insert(doc, lookup.ids.len());
                    lookup.ids.push(doc);
                    lookup.ids_to_terms.push(vec![*term]);
                }
            }
        }
    }
    lookup.terms_to_ids = lists;
    Ok(lookup)
}
