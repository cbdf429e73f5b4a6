//! LRU read cache in front of another store.
//!
//! Only read-only transactions are served from and populate the cache, so
//! cached values are always committed values. Any commit carrying writes
//! empties the cache, and a read that raced with such a commit is not
//! inserted (generation check). This holds whatever the decorator order,
//! since the cache never needs to know which storage keys a write touched.

use super::{KeyValueStore, StorageResult, TableKind, Transaction, TxMode};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

type CacheKey = (TableKind, Vec<u8>);

struct CacheState {
    entries: LruCache<CacheKey, Option<Vec<u8>>>,
    generation: u64,
}

pub struct CachedStore<S> {
    inner: S,
    state: Mutex<CacheState>,
}

impl<S: KeyValueStore> CachedStore<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                generation: 0,
            }),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of cached entries (including cached misses).
    pub fn cached_len(&self) -> usize {
        self.state.lock().entries.len()
    }
}

#[async_trait::async_trait]
impl<S: KeyValueStore> KeyValueStore for CachedStore<S> {
    async fn commit(&self, tx: Transaction) -> StorageResult<()> {
        let writes = tx.has_writes();
        self.inner.commit(tx).await?;

        if writes {
            let mut state = self.state.lock();
            state.generation += 1;
            state.entries.clear();
        }
        Ok(())
    }

    async fn get(&self, tx: &Transaction, table: TableKind, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        if tx.mode() == TxMode::ReadWrite {
            return self.inner.get(tx, table, key).await;
        }
        tx.check(table, false)?;

        let cache_key = (table, key.to_vec());
        let generation = {
            let mut state = self.state.lock();
            if let Some(value) = state.entries.get(&cache_key) {
                return Ok(value.clone());
            }
            state.generation
        };

        let value = self.inner.get(tx, table, key).await?;

        let mut state = self.state.lock();
        if state.generation == generation {
            state.entries.put(cache_key, value.clone());
        }
        Ok(value)
    }

    async fn count(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64> {
        self.inner.count(tx, table).await
    }

    async fn size_in_bytes(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64> {
        self.inner.size_in_bytes(tx, table).await
    }

    async fn put(&self, tx: &Transaction, table: TableKind, key: &[u8], value: Vec<u8>) -> StorageResult<()> {
        self.inner.put(tx, table, key, value).await
    }

    async fn remove(&self, tx: &Transaction, table: TableKind, key: &[u8]) -> StorageResult<()> {
        self.inner.remove(tx, table, key).await
    }

    async fn clear(&self, tx: &Transaction, table: TableKind) -> StorageResult<()> {
        self.inner.clear(tx, table).await
    }
}
