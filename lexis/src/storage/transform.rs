//! Key and value transforms applied before data reaches a backend.
//!
//! A [`Transform`] maps logical keys to storage keys (`property`) and values
//! to stored bytes (`serialize`/`deserialize`). Hashing keys hides terms at
//! rest; encrypting values hides postings and token streams.

use super::{KeyValueStore, StorageError, StorageResult, TableKind, Transaction};
use sha2::{Digest, Sha256};
use std::sync::Arc;

pub trait Transform: Send + Sync {
    fn property(&self, table: TableKind, key: &[u8]) -> Vec<u8>;

    fn serialize(&self, table: TableKind, key: &[u8], value: Vec<u8>) -> Vec<u8>;

    fn deserialize(&self, table: TableKind, key: &[u8], value: Vec<u8>) -> StorageResult<Vec<u8>>;
}

/// Stores keys and values unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn property(&self, _table: TableKind, key: &[u8]) -> Vec<u8> {
        key.to_vec()
    }

    fn serialize(&self, _table: TableKind, _key: &[u8], value: Vec<u8>) -> Vec<u8> {
        value
    }

    fn deserialize(&self, _table: TableKind, _key: &[u8], value: Vec<u8>) -> StorageResult<Vec<u8>> {
        Ok(value)
    }
}

/// Replaces every key with `SHA-256(salt || table tag || key)`.
#[derive(Debug, Clone)]
pub struct SaltedHashKeys {
    salt: Vec<u8>,
}

impl SaltedHashKeys {
    pub fn new(salt: impl Into<Vec<u8>>) -> Self {
        Self { salt: salt.into() }
    }
}

impl Transform for SaltedHashKeys {
    fn property(&self, table: TableKind, key: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(&self.salt);
        hasher.update([table.tag()]);
        hasher.update(key);
        hasher.finalize().to_vec()
    }

    fn serialize(&self, _table: TableKind, _key: &[u8], value: Vec<u8>) -> Vec<u8> {
        value
    }

    fn deserialize(&self, _table: TableKind, _key: &[u8], value: Vec<u8>) -> StorageResult<Vec<u8>> {
        Ok(value)
    }
}

type PropertyFn = dyn Fn(TableKind, &[u8]) -> Vec<u8> + Send + Sync;
type SerializeFn = dyn Fn(TableKind, &[u8], Vec<u8>) -> Vec<u8> + Send + Sync;
type DeserializeFn = dyn Fn(TableKind, &[u8], Vec<u8>) -> Result<Vec<u8>, String> + Send + Sync;

/// Transform assembled from caller-supplied closures, typically wrapping a
/// cipher. The `key` passed to `serialize`/`deserialize` is the logical key,
/// usable as associated data or nonce material.
#[derive(Clone)]
pub struct FnTransform {
    property: Arc<PropertyFn>,
    serialize: Arc<SerializeFn>,
    deserialize: Arc<DeserializeFn>,
}

impl FnTransform {
    pub fn new<P, S, D>(property: P, serialize: S, deserialize: D) -> Self
    where
        P: Fn(TableKind, &[u8]) -> Vec<u8> + Send + Sync + 'static,
        S: Fn(TableKind, &[u8], Vec<u8>) -> Vec<u8> + Send + Sync + 'static,
        D: Fn(TableKind, &[u8], Vec<u8>) -> Result<Vec<u8>, String> + Send + Sync + 'static,
    {
        Self {
            property: Arc::new(property),
            serialize: Arc::new(serialize),
            deserialize: Arc::new(deserialize),
        }
    }
}

impl Transform for FnTransform {
    fn property(&self, table: TableKind, key: &[u8]) -> Vec<u8> {
        (self.property)(table, key)
    }

    fn serialize(&self, table: TableKind, key: &[u8], value: Vec<u8>) -> Vec<u8> {
        (self.serialize)(table, key, value)
    }

    fn deserialize(&self, table: TableKind, key: &[u8], value: Vec<u8>) -> StorageResult<Vec<u8>> {
        (self.deserialize)(table, key, value).map_err(|e| StorageError::Transform(table, e))
    }
}

/// Decorator applying a [`Transform`] on the way in and out of `S`.
pub struct TransformedStore<S, T> {
    inner: S,
    transform: T,
}

impl<S: KeyValueStore, T: Transform> TransformedStore<S, T> {
    pub fn new(inner: S, transform: T) -> Self {
        Self { inner, transform }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<S: KeyValueStore, T: Transform> KeyValueStore for TransformedStore<S, T> {
    async fn commit(&self, tx: Transaction) -> StorageResult<()> {
        self.inner.commit(tx).await
    }

    async fn get(&self, tx: &Transaction, table: TableKind, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let stored_key = self.transform.property(table, key);
        match self.inner.get(tx, table, &stored_key).await? {
            Some(bytes) => Ok(Some(self.transform.deserialize(table, key, bytes)?)),
            None => Ok(None),
        }
    }

    async fn count(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64> {
        self.inner.count(tx, table).await
    }

    async fn size_in_bytes(&self, tx: &Transaction, table: TableKind) -> StorageResult<u64> {
        self.inner.size_in_bytes(tx, table).await
    }

    async fn put(&self, tx: &Transaction, table: TableKind, key: &[u8], value: Vec<u8>) -> StorageResult<()> {
        let stored_key = self.transform.property(table, key);
        let bytes = self.transform.serialize(table, key, value);
        self.inner.put(tx, table, &stored_key, bytes).await
    }

    async fn remove(&self, tx: &Transaction, table: TableKind, key: &[u8]) -> StorageResult<()> {
        let stored_key = self.transform.property(table, key);
        self.inner.remove(tx, table, &stored_key).await
    }

    async fn clear(&self, tx: &Transaction, table: TableKind) -> StorageResult<()> {
        self.inner.clear(tx, table).await
    }
}
