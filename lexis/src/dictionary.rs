//! Bidirectional interning of terms and document keys.
//!
//! A dictionary spans two tables: `forward` maps an encoded key to its id and
//! also holds the id counter under a reserved key; `inverse` maps the id back
//! to the encoded key. Ids are allocated monotonically from 1 and never reused.

use crate::codec;
use crate::interface::{DocKey, IndexError, IndexResult};
use crate::storage::{KeyValueStore, TableKind, Transaction};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;

const COUNTER_KEY: &[u8] = &[0x00];
const TAG_STR: u8 = 0x01;
const TAG_INT: u8 = 0x02;

/// A key that can be interned.
pub trait DictKey: Clone + Eq + Hash + Send + Sync {
    fn to_bytes(&self) -> Vec<u8>;
    fn from_bytes(bytes: &[u8]) -> Option<Self>;
}

fn str_bytes(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 1);
    out.push(TAG_STR);
    out.extend_from_slice(s.as_bytes());
    out
}

impl DictKey for String {
    fn to_bytes(&self) -> Vec<u8> {
        str_bytes(self)
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.split_first() {
            Some((&TAG_STR, rest)) => String::from_utf8(rest.to_vec()).ok(),
            _ => None,
        }
    }
}

impl DictKey for DocKey {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            DocKey::Str(s) => str_bytes(s),
            DocKey::Int(n) => {
                let mut out = vec![TAG_INT];
                codec::encode_into(*n, &mut out);
                out
            }
        }
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.split_first() {
            Some((&TAG_STR, rest)) => String::from_utf8(rest.to_vec()).ok().map(DocKey::Str),
            Some((&TAG_INT, rest)) => codec::decode_one(rest).ok().flatten().map(DocKey::Int),
            _ => None,
        }
    }
}

pub struct Dictionary<K> {
    forward: TableKind,
    inverse: TableKind,
    _key: PhantomData<fn() -> K>,
}

/// Term text <-> term id
pub type Lexicon = Dictionary<String>;

/// Document key <-> document id
pub type DocIds = Dictionary<DocKey>;

impl Lexicon {
    pub const fn lexicon() -> Self {
        Dictionary::new(TableKind::Lexicon, TableKind::LexiconInverse)
    }
}

impl DocIds {
    pub const fn doc_ids() -> Self {
        Dictionary::new(TableKind::Ids, TableKind::IdsInverse)
    }
}

impl<K: DictKey> Dictionary<K> {
    pub const fn new(forward: TableKind, inverse: TableKind) -> Self {
        Self { forward, inverse, _key: PhantomData }
    }

    pub fn tables(&self) -> [TableKind; 2] {
        [self.forward, self.inverse]
    }

    async fn read_id(&self, store: &dyn KeyValueStore, tx: &Transaction, key: &[u8]) -> IndexResult<Option<u64>> {
        match store.get(tx, self.forward, key).await? {
            Some(bytes) => Ok(codec::decode_one(&bytes)?),
            None => Ok(None),
        }
    }

    /// Id per key, allocating ids for unseen keys. Repeated keys in one call
    /// share an id. Needs a read-write transaction over both tables.
    pub async fn bulk(&self, store: &dyn KeyValueStore, tx: &Transaction, keys: &[K]) -> IndexResult<Vec<u64>> {
        let encoded: Vec<Vec<u8>> = keys.iter().map(K::to_bytes).collect();
        let (existing, counter) = futures::try_join!(
            try_join_all(encoded.iter().map(|key| self.read_id(store, tx, key))),
            self.read_id(store, tx, COUNTER_KEY),
        )?;

        let initial = counter.unwrap_or(1);
        let mut next = initial;
        let mut seen: HashMap<&[u8], u64> = HashMap::new();
        let mut ids = Vec::with_capacity(keys.len());

        for (key, found) in encoded.iter().zip(existing) {
            if let Some(id) = found {
                ids.push(id);
                continue;
            }
            if let Some(&id) = seen.get(key.as_slice()) {
                ids.push(id);
                continue;
            }

            let id = next;
            next += 1;
            seen.insert(key.as_slice(), id);
            ids.push(id);

            store.put(tx, self.forward, key, codec::encode_one(id)).await?;
            store.put(tx, self.inverse, &codec::encode_one(id), key.clone()).await?;
        }

        if next != initial {
            store.put(tx, self.forward, COUNTER_KEY, codec::encode_one(next)).await?;
        }

        Ok(ids)
    }

    /// Id per key without allocating; unknown keys map to `None`.
    pub async fn lookup(&self, store: &dyn KeyValueStore, tx: &Transaction, keys: &[K]) -> IndexResult<Vec<Option<u64>>> {
        try_join_all(keys.iter().map(|key| {
            let encoded = key.to_bytes();
            async move { self.read_id(store, tx, &encoded).await }
        }))
        .await
    }

    async fn read_key(&self, store: &dyn KeyValueStore, tx: &Transaction, id: u64) -> IndexResult<Option<K>> {
        match store.get(tx, self.inverse, &codec::encode_one(id)).await? {
            Some(bytes) => K::from_bytes(&bytes)
                .map(Some)
                .ok_or_else(|| IndexError::Corrupt(format!("undecodable key for id {} in {:?}", id, self.inverse))),
            None => Ok(None),
        }
    }

    /// Key per id; ids never allocated map to `None`.
    pub async fn resolve(&self, store: &dyn KeyValueStore, tx: &Transaction, ids: &[u64]) -> IndexResult<Vec<Option<K>>> {
        try_join_all(ids.iter().map(|&id| self.read_key(store, tx, id))).await
    }

    /// Number of interned keys.
    pub async fn count(&self, store: &dyn KeyValueStore, tx: &Transaction) -> IndexResult<u64> {
        Ok(store.count(tx, self.inverse).await?)
    }

    pub async fn size_in_bytes(&self, store: &dyn KeyValueStore, tx: &Transaction) -> IndexResult<u64> {
        let (a, b) = futures::try_join!(
            store.size_in_bytes(tx, self.forward),
            store.size_in_bytes(tx, self.inverse),
        )?;
        Ok(a + b)
    }

    pub async fn clear(&self, store: &dyn KeyValueStore, tx: &Transaction) -> IndexResult<()> {
        store.clear(tx, self.forward).await?;
        store.clear(tx, self.inverse).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, TxMode};

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn test_bulk_allocates_and_dedupes() {
        let store = MemoryStore::new();
        let lexicon = Lexicon::lexicon();

        let tx = store.begin(&lexicon.tables(), TxMode::ReadWrite).await.unwrap();
        let ids = lexicon.bulk(&store, &tx, &terms(&["a", "b", "a", "c"])).await.unwrap();
        assert_eq!(ids, vec![1, 2, 1, 3]);
        store.commit(tx).await.unwrap();

        let tx = store.begin(&lexicon.tables(), TxMode::ReadWrite).await.unwrap();
        let ids = lexicon.bulk(&store, &tx, &terms(&["c", "d"])).await.unwrap();
        assert_eq!(ids, vec![3, 4]);
        store.commit(tx).await.unwrap();

        let tx = store.begin(&lexicon.tables(), TxMode::ReadOnly).await.unwrap();
        assert_eq!(lexicon.count(&store, &tx).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_resolve_and_lookup() {
        let store = MemoryStore::new();
        let lexicon = Lexicon::lexicon();

        let tx = store.begin(&lexicon.tables(), TxMode::ReadWrite).await.unwrap();
        lexicon.bulk(&store, &tx, &terms(&["hello", "world"])).await.unwrap();
        store.commit(tx).await.unwrap();

        let tx = store.begin(&lexicon.tables(), TxMode::ReadOnly).await.unwrap();
        assert_eq!(
            lexicon.resolve(&store, &tx, &[2, 1, 9]).await.unwrap(),
            vec![Some("world".to_string()), Some("hello".to_string()), None]
        );
        assert_eq!(
            lexicon.lookup(&store, &tx, &terms(&["world", "nope"])).await.unwrap(),
            vec![Some(2), None]
        );
    }

    #[tokio::test]
    async fn test_uncommitted_allocation_is_discarded() {
        let store = MemoryStore::new();
        let lexicon = Lexicon::lexicon();
        {
            let tx = store.begin(&lexicon.tables(), TxMode::ReadWrite).await.unwrap();
            lexicon.bulk(&store, &tx, &terms(&["lost"])).await.unwrap();
        }
        let tx = store.begin(&lexicon.tables(), TxMode::ReadWrite).await.unwrap();
        assert_eq!(lexicon.bulk(&store, &tx, &terms(&["kept"])).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_doc_keys_keep_type() {
        let store = MemoryStore::new();
        let docs = DocIds::doc_ids();

        let tx = store.begin(&docs.tables(), TxMode::ReadWrite).await.unwrap();
        let ids = docs
            .bulk(&store, &tx, &[DocKey::from("123"), DocKey::from(123u64)])
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(
            docs.resolve(&store, &tx, &ids).await.unwrap(),
            vec![Some(DocKey::from("123")), Some(DocKey::from(123u64))]
        );
    }

    #[test]
    fn test_key_encoding_never_collides_with_counter() {
        assert_ne!("".to_string().to_bytes(), COUNTER_KEY);
        assert_ne!(DocKey::from(0u64).to_bytes(), COUNTER_KEY);
        assert_eq!(String::from_bytes(&"héllo".to_string().to_bytes()), Some("héllo".to_string()));
        assert_eq!(String::from_bytes(COUNTER_KEY), None);
    }
}
