//! SQLite backend for persistent indexes
//!
//! One table per [`TableKind`] holding `(key BLOB, value BLOB)` rows.
//! Uses r2d2 connection pooling so concurrent readers never wait on a mutex;
//! WAL mode lets them proceed while a commit is in flight.
//! Blocking SQLite work runs on `spawn_blocking` threads.

use super::{overlay_stats, KeyValueStore, Staged, StorageResult, TableKind, Transaction, TxMode};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use log::debug;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open or create an index database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA synchronous=NORMAL;
                PRAGMA mmap_size=67108864;
                PRAGMA cache_size=-32000;
            ",
            )?;
            Ok(())
        });

        let pool = Pool::builder().max_size(8).build(manager)?;

        let store = Self { pool };
        store.setup_schema()?;
        debug!("Opened SQLite index at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory database (tests, benchmarks)
    pub fn open_in_memory() -> StorageResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs single connection to maintain state
        let pool = Pool::builder().max_size(1).build(manager)?;

        let store = Self { pool };
        store.setup_schema()?;
        Ok(store)
    }

    fn get_conn(&self) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> StorageResult<()> {
        let conn = self.get_conn()?;
        for table in TableKind::ALL {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {} (key BLOB PRIMARY KEY, value BLOB NOT NULL) WITHOUT ROWID;",
                table.name()
            ))?;
        }
        Ok(())
    }

    /// Run blocking work against a pooled connection.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> StorageResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await?
    }

    fn read_value(conn: &rusqlite::Connection, table: TableKind, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", table.name());
        Ok(conn
            .prepare_cached(&sql)?
            .query_row(params![key], |row| row.get(0))
            .optional()?)
    }

    async fn stats(&self, tx: &Transaction, table: TableKind) -> StorageResult<(u64, u64)> {
        let cleared = tx.is_cleared(table);
        let staged = tx.staged_entries(table);
        self.with_conn(move |conn| Self::table_stats(conn, table, cleared, staged)).await
    }

    fn table_stats(
        conn: &rusqlite::Connection,
        table: TableKind,
        cleared: bool,
        staged: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    ) -> StorageResult<(u64, u64)> {
        let sql = format!(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(key) + LENGTH(value)), 0) FROM {}",
            table.name()
        );
        let (count, size): (i64, i64) = conn.query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))?;
        overlay_stats(cleared, staged, count as u64, size as u64, |key| {
            Ok(Self::read_value(conn, table, key)?.map(|v| v.len() as u64))
        })
    }
}

#[async_trait::async_trait]
impl KeyValueStore for SqliteStore {
    async fn commit(&self, tx: Transaction) -> StorageResult<()> {
        if tx.mode() == TxMode::ReadOnly || !tx.has_writes() {
            return Ok(());
        }
        let writes = tx.into_writes();

        self.with_conn(move |conn| {
            let sql_tx = conn.unchecked_transaction()?;
            for table in &writes.cleared {
                sql_tx.execute(&format!("DELETE FROM {}", table.name()), [])?;
            }
            for ((table, key), value) in &writes.writes {
                match value {
                    Some(value) => {
                        let sql = format!(
                            "INSERT INTO {} (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                            table.name()
                        );
                        sql_tx.prepare_cached(&sql)?.execute(params![key, value])?;
                    }
                    None => {
                        let sql = format!("DELETE FROM {} WHERE key = ?1", table.name());
                        sql_tx.prepare_cached(&sql)?.execute(params![key])?;
                    }
                }
            }
            sql_tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get(&self, tx: &Transaction, table: TableKind, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        tx.check(table, false)?;
        match tx.staged(table, key) {
            Staged::Value(value) => Ok(Some(value)),
            Staged::Removed => Ok(None),
            Staged::Untouched => {
                let key = key.to_vec();
                self.with_conn(move |conn| Self::read_value(conn, table, &key)).await
            }
        }
    }

    async fn count(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64> {
        tx.check(table, false)?;
        let (count, _) = self.stats(tx, table).await?;
        Ok(count)
    }

    async fn size_in_bytes(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64> {
        tx.check(table, false)?;
        let (_, size) = self.stats(tx, table).await?;
        Ok(size)
    }
}
