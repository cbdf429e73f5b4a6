//! Positions: document id -> the document's term id stream, varbyte encoded
//! without deltas so order and repeats survive.

use crate::codec;
use crate::interface::{DocId, IndexResult, TermId};
use crate::storage::{KeyValueStore, TableKind, Transaction};
use futures::future::try_join_all;

pub const TABLE: TableKind = TableKind::Positions;

/// Store the stream for `doc`, replacing any previous one.
pub async fn insert(store: &dyn KeyValueStore, tx: &Transaction, doc: DocId, terms: &[TermId]) -> IndexResult<()> {
    store.put(tx, TABLE, &codec::encode_one(doc), codec::encode(terms)).await?;
    Ok(())
}

/// The stream for `doc`. Empty means the document is not indexed.
pub async fn get(store: &dyn KeyValueStore, tx: &Transaction, doc: DocId) -> IndexResult<Vec<TermId>> {
    match store.get(tx, TABLE, &codec::encode_one(doc)).await? {
        Some(bytes) => Ok(codec::decode(&bytes)?),
        None => Ok(Vec::new()),
    }
}

pub async fn get_bulk(store: &dyn KeyValueStore, tx: &Transaction, docs: &[DocId]) -> IndexResult<Vec<Vec<TermId>>> {
    try_join_all(docs.iter().map(|&doc| get(store, tx, doc))).await
}

pub async fn remove(store: &dyn KeyValueStore, tx: &Transaction, doc: DocId) -> IndexResult<()> {
    store.remove(tx, TABLE, &codec::encode_one(doc)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, TxMode};

    #[tokio::test]
    async fn test_stream_keeps_order_and_repeats() {
        let store = MemoryStore::new();
        let tx = store.begin(&[TABLE], TxMode::ReadWrite).await.unwrap();

        insert(&store, &tx, 4, &[3, 1, 3, 200]).await.unwrap();
        assert_eq!(get(&store, &tx, 4).await.unwrap(), vec![3, 1, 3, 200]);

        insert(&store, &tx, 4, &[9]).await.unwrap();
        assert_eq!(get(&store, &tx, 4).await.unwrap(), vec![9]);
    }

    #[tokio::test]
    async fn test_missing_document_reads_empty() {
        let store = MemoryStore::new();
        let tx = store.begin(&[TABLE], TxMode::ReadWrite).await.unwrap();
        insert(&store, &tx, 1, &[5, 6]).await.unwrap();
        remove(&store, &tx, 1).await.unwrap();

        let streams = get_bulk(&store, &tx, &[1, 2]).await.unwrap();
        assert_eq!(streams, vec![Vec::<TermId>::new(), Vec::new()]);
    }
}
