//! In-memory backend. Cloning shares the underlying tables.

use super::{overlay_stats, KeyValueStore, Staged, StorageResult, TableKind, Transaction, TxMode};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<TableKind, Table>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn committed(&self, table: TableKind, key: &[u8]) -> Option<Vec<u8>> {
        self.tables.read().get(&table).and_then(|t| t.get(key).cloned())
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn commit(&self, tx: Transaction) -> StorageResult<()> {
        if tx.mode() == TxMode::ReadOnly || !tx.has_writes() {
            return Ok(());
        }
        let writes = tx.into_writes();

        let mut tables = self.tables.write();
        for table in writes.cleared {
            tables.remove(&table);
        }
        for ((table, key), value) in writes.writes {
            let entries = tables.entry(table).or_default();
            match value {
                Some(value) => {
                    entries.insert(key, value);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn get(&self, tx: &Transaction, table: TableKind, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        tx.check(table, false)?;
        Ok(match tx.staged(table, key) {
            Staged::Value(value) => Some(value),
            Staged::Removed => None,
            Staged::Untouched => self.committed(table, key),
        })
    }

    async fn count(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64> {
        tx.check(table, false)?;
        let (count, _) = self.stats(tx, table)?;
        Ok(count)
    }

    async fn size_in_bytes(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64> {
        tx.check(table, false)?;
        let (_, size) = self.stats(tx, table)?;
        Ok(size)
    }
}

impl MemoryStore {
    fn stats(&self, tx: &Transaction, table: TableKind) -> StorageResult<(u64, u64)> {
        let (base_count, base_size) = {
            let tables = self.tables.read();
            tables.get(&table).map_or((0, 0), |entries| {
                let size = entries.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum();
                (entries.len() as u64, size)
            })
        };
        overlay_stats(tx.is_cleared(table), tx.staged_entries(table), base_count, base_size, |key| {
            Ok(self.committed(table, key).map(|v| v.len() as u64))
        })
    }
}
