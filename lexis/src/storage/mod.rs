//! Transactional key-value storage consumed by the index.
//!
//! Backends implement [`KeyValueStore`]; decorators ([`TransformedStore`],
//! [`CachedStore`]) wrap any backend and implement the same trait, so they
//! compose freely.
//!
//! A [`Transaction`] buffers writes until `commit`. Reads through a
//! transaction see its own staged writes on top of the committed state.

mod cache;
mod memory;
mod sqlite;
mod transform;

pub use cache::CachedStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use transform::{FnTransform, Identity, SaltedHashKeys, Transform, TransformedStore};

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Write to {0:?} in a read-only transaction")]
    ReadOnly(TableKind),
    #[error("Table {0:?} is not part of this transaction")]
    OutOfScope(TableKind),
    #[error("Transform failed for {0:?}: {1}")]
    Transform(TableKind, String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Logical tables of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TableKind {
    /// term text -> term id, plus the id counter
    Lexicon,
    /// term id -> term text
    LexiconInverse,
    /// document key -> document id, plus the id counter
    Ids,
    /// document id -> document key
    IdsInverse,
    /// term id -> gap-encoded document ids
    Postings,
    /// document id -> term id stream
    Positions,
    /// n-gram -> gap-encoded term ids
    Wildcards,
    /// integrity marker and other bookkeeping
    Metadata,
}

impl TableKind {
    pub const ALL: [TableKind; 8] = [
        TableKind::Lexicon,
        TableKind::LexiconInverse,
        TableKind::Ids,
        TableKind::IdsInverse,
        TableKind::Postings,
        TableKind::Positions,
        TableKind::Wildcards,
        TableKind::Metadata,
    ];

    /// Table name used by persistent backends.
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Lexicon => "lexicon",
            TableKind::LexiconInverse => "lexicon_inverse",
            TableKind::Ids => "ids",
            TableKind::IdsInverse => "ids_inverse",
            TableKind::Postings => "postings",
            TableKind::Positions => "positions",
            TableKind::Wildcards => "wildcards",
            TableKind::Metadata => "metadata",
        }
    }

    /// Stable one-byte tag, mixed into derived keys.
    pub fn tag(self) -> u8 {
        match self {
            TableKind::Lexicon => 1,
            TableKind::LexiconInverse => 2,
            TableKind::Ids => 3,
            TableKind::IdsInverse => 4,
            TableKind::Postings => 5,
            TableKind::Positions => 6,
            TableKind::Wildcards => 7,
            TableKind::Metadata => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// What a transaction knows about a key before consulting committed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staged {
    Value(Vec<u8>),
    Removed,
    Untouched,
}

/// Writes buffered by a transaction, applied atomically on commit.
#[derive(Debug, Default)]
pub struct StagedWrites {
    /// Tables cleared in this transaction; applied before `writes`.
    pub cleared: BTreeSet<TableKind>,
    /// `None` marks a removal.
    pub writes: BTreeMap<(TableKind, Vec<u8>), Option<Vec<u8>>>,
}

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Handle for one atomic unit of work against a [`KeyValueStore`].
///
/// Methods take `&self` so per-key operations of one mutation can run
/// concurrently against the same transaction.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    mode: TxMode,
    tables: Vec<TableKind>,
    staged: Mutex<StagedWrites>,
}

impl Transaction {
    pub fn new(tables: &[TableKind], mode: TxMode) -> Self {
        Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::Relaxed),
            mode,
            tables: tables.to_vec(),
            staged: Mutex::new(StagedWrites::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    pub fn tables(&self) -> &[TableKind] {
        &self.tables
    }

    /// Reject access to tables outside the scope, and writes in read-only mode.
    pub fn check(&self, table: TableKind, write: bool) -> StorageResult<()> {
        if !self.tables.contains(&table) {
            return Err(StorageError::OutOfScope(table));
        }
        if write && self.mode == TxMode::ReadOnly {
            return Err(StorageError::ReadOnly(table));
        }
        Ok(())
    }

    pub fn stage_put(&self, table: TableKind, key: &[u8], value: Vec<u8>) {
        self.staged.lock().writes.insert((table, key.to_vec()), Some(value));
    }

    pub fn stage_remove(&self, table: TableKind, key: &[u8]) {
        self.staged.lock().writes.insert((table, key.to_vec()), None);
    }

    pub fn stage_clear(&self, table: TableKind) {
        let mut staged = self.staged.lock();
        staged.writes.retain(|(t, _), _| *t != table);
        staged.cleared.insert(table);
    }

    pub fn staged(&self, table: TableKind, key: &[u8]) -> Staged {
        let staged = self.staged.lock();
        match staged.writes.get(&(table, key.to_vec())) {
            Some(Some(value)) => Staged::Value(value.clone()),
            Some(None) => Staged::Removed,
            None if staged.cleared.contains(&table) => Staged::Removed,
            None => Staged::Untouched,
        }
    }

    pub fn is_cleared(&self, table: TableKind) -> bool {
        self.staged.lock().cleared.contains(&table)
    }

    /// Staged entries of one table, `None` meaning removed.
    pub fn staged_entries(&self, table: TableKind) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
        self.staged
            .lock()
            .writes
            .iter()
            .filter(|((t, _), _)| *t == table)
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn has_writes(&self) -> bool {
        let staged = self.staged.lock();
        !staged.writes.is_empty() || !staged.cleared.is_empty()
    }

    pub fn into_writes(self) -> StagedWrites {
        self.staged.into_inner()
    }
}

/// Key-value backend with per-table scoping and atomic transactions.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Open a transaction over `tables`.
    async fn begin(&self, tables: &[TableKind], mode: TxMode) -> StorageResult<Transaction> {
        Ok(Transaction::new(tables, mode))
    }

    /// Apply all staged writes atomically. Read-only transactions commit trivially.
    async fn commit(&self, tx: Transaction) -> StorageResult<()>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────────

    async fn get(&self, tx: &Transaction, table: TableKind, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Number of entries in the table.
    async fn count(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64>;

    /// Total key and value bytes held by the table.
    async fn size_in_bytes(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────────

    async fn put(&self, tx: &Transaction, table: TableKind, key: &[u8], value: Vec<u8>) -> StorageResult<()> {
        tx.check(table, true)?;
        tx.stage_put(table, key, value);
        Ok(())
    }

    async fn remove(&self, tx: &Transaction, table: TableKind, key: &[u8]) -> StorageResult<()> {
        tx.check(table, true)?;
        tx.stage_remove(table, key);
        Ok(())
    }

    async fn clear(&self, tx: &Transaction, table: TableKind) -> StorageResult<()> {
        tx.check(table, true)?;
        tx.stage_clear(table);
        Ok(())
    }
}

/// Fold staged entries over committed statistics.
///
/// `committed` answers the byte length of a key's committed value, if any.
pub(crate) fn overlay_stats<F>(
    cleared: bool,
    staged: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    base_count: u64,
    base_size: u64,
    mut committed: F,
) -> StorageResult<(u64, u64)>
where
    F: FnMut(&[u8]) -> StorageResult<Option<u64>>,
{
    let (mut count, mut size) = if cleared { (0, 0) } else { (base_count, base_size) };

    for (key, value) in staged {
        let existing = if cleared { None } else { committed(&key)? };
        if let Some(len) = existing {
            count = count.saturating_sub(1);
            size = size.saturating_sub(key.len() as u64 + len);
        }
        if let Some(value) = value {
            count += 1;
            size += (key.len() + value.len()) as u64;
        }
    }

    Ok((count, size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_and_mode_checks() {
        let tx = Transaction::new(&[TableKind::Postings], TxMode::ReadOnly);
        assert!(tx.check(TableKind::Postings, false).is_ok());
        assert!(matches!(tx.check(TableKind::Postings, true), Err(StorageError::ReadOnly(_))));
        assert!(matches!(tx.check(TableKind::Positions, false), Err(StorageError::OutOfScope(_))));
    }

    #[test]
    fn test_staged_view() {
        let tx = Transaction::new(&[TableKind::Postings], TxMode::ReadWrite);
        tx.stage_put(TableKind::Postings, b"a", vec![1]);
        tx.stage_remove(TableKind::Postings, b"b");
        assert_eq!(tx.staged(TableKind::Postings, b"a"), Staged::Value(vec![1]));
        assert_eq!(tx.staged(TableKind::Postings, b"b"), Staged::Removed);
        assert_eq!(tx.staged(TableKind::Postings, b"c"), Staged::Untouched);

        tx.stage_clear(TableKind::Postings);
        assert_eq!(tx.staged(TableKind::Postings, b"a"), Staged::Removed);
        assert_eq!(tx.staged(TableKind::Postings, b"c"), Staged::Removed);

        tx.stage_put(TableKind::Postings, b"c", vec![2]);
        let writes = tx.into_writes();
        assert!(writes.cleared.contains(&TableKind::Postings));
        assert_eq!(writes.writes.len(), 1);
    }

    #[test]
    fn test_transaction_ids_are_unique() {
        let a = Transaction::new(&[], TxMode::ReadOnly);
        let b = Transaction::new(&[], TxMode::ReadOnly);
        assert_ne!(a.id(), b.id());
    }
}
