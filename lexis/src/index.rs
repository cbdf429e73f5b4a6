//! Index - the search engine over a key-value store
//!
//! Ties the dictionaries, postings, positions and wildcard tables together.
//!
//! Concurrency Model:
//! - Mutations (`store`, `remove`, `clear`, metadata writes, repairs) are
//!   serialized by an async
//!   writer lock and each runs in one read-write transaction
//! - Reads run in their own read-only transactions and never take the lock
//! - A search that meets postings of removed documents drops them from its
//!   result and repairs them in a background task on the current runtime

use crate::config::IndexConfig;
use crate::dictionary::{DocIds, Lexicon};
use crate::interface::{DocId, DocKey, IndexApi, IndexError, IndexResult, IndexStats, SearchHit, SearchResult, TermId};
use crate::query::{evaluate, parse};
use crate::scoring;
use crate::sets::unique_by;
use crate::storage::{CachedStore, KeyValueStore, MemoryStore, SqliteStore, StorageError, TableKind, Transaction, TxMode};
use crate::wildcard::wildcard_match;
use crate::{positions, postings, wildcards};
use futures::future::try_join_all;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Tables touched by document mutations.
const DATA_TABLES: [TableKind; 7] = [
    TableKind::Lexicon,
    TableKind::LexiconInverse,
    TableKind::Ids,
    TableKind::IdsInverse,
    TableKind::Postings,
    TableKind::Positions,
    TableKind::Wildcards,
];

const SEARCH_TABLES: [TableKind; 6] = [
    TableKind::Lexicon,
    TableKind::LexiconInverse,
    TableKind::Ids,
    TableKind::IdsInverse,
    TableKind::Postings,
    TableKind::Positions,
];

const MARKER_KEY: &[u8] = b"T_E_S_T";
const MARKER_VALUE: &[u8] = b"TEST";

/// Caller metadata keys live under this prefix, apart from the marker.
const METADATA_PREFIX: u8 = 0x01;

fn metadata_key(key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(METADATA_PREFIX);
    out.extend_from_slice(key.as_bytes());
    out
}

/// A document that disappeared, with the terms whose postings still list it.
type StaleDoc = (DocId, Vec<TermId>);

struct IndexInner {
    store: Arc<dyn KeyValueStore>,
    config: IndexConfig,
    lexicon: Lexicon,
    doc_ids: DocIds,
    writer: tokio::sync::Mutex<()>,
    repairs: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheap to clone; clones share the store and the writer lock.
#[derive(Clone)]
pub struct Index {
    inner: Arc<IndexInner>,
}

fn single(ids: Vec<u64>) -> IndexResult<u64> {
    ids.into_iter()
        .next()
        .ok_or_else(|| IndexError::Corrupt("dictionary returned no id".to_string()))
}

impl Index {
    /// Index over `store` with the default configuration.
    pub fn new<S: KeyValueStore + 'static>(store: S) -> Self {
        Self::build(store, IndexConfig::default())
    }

    pub fn with_config<S: KeyValueStore + 'static>(store: S, config: IndexConfig) -> IndexResult<Self> {
        config.validate()?;
        Ok(Self::build(store, config))
    }

    /// Index kept in memory (for tests and throwaway indexes)
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Index persisted in a SQLite database at `path`
    pub fn open_sqlite<P: AsRef<Path>>(path: P) -> IndexResult<Self> {
        Ok(Self::new(SqliteStore::open(path)?))
    }

    fn build<S: KeyValueStore + 'static>(store: S, config: IndexConfig) -> Self {
        let store: Arc<dyn KeyValueStore> = if config.cache_capacity > 0 {
            Arc::new(CachedStore::new(store, config.cache_capacity))
        } else {
            Arc::new(store)
        };

        Self {
            inner: Arc::new(IndexInner {
                store,
                config,
                lexicon: Lexicon::lexicon(),
                doc_ids: DocIds::doc_ids(),
                writer: tokio::sync::Mutex::new(()),
                repairs: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.inner.config
    }

    fn kv(&self) -> &dyn KeyValueStore {
        self.inner.store.as_ref()
    }

    fn ngram_width(&self) -> usize {
        self.inner.config.ngram_width
    }

    /// Internal id of a document, if it was ever stored.
    pub async fn lookup_doc(&self, id: &DocKey) -> IndexResult<Option<DocId>> {
        let store = self.kv();
        let tx = store.begin(&self.inner.doc_ids.tables(), TxMode::ReadOnly).await?;
        let ids = self.inner.doc_ids.lookup(store, &tx, std::slice::from_ref(id)).await?;
        Ok(ids.into_iter().next().flatten())
    }

    /// Documents listed in the postings of `term`, stale ones included.
    pub async fn postings_for(&self, term: &str) -> IndexResult<Vec<DocKey>> {
        let store = self.kv();
        let tables = [TableKind::Lexicon, TableKind::IdsInverse, TableKind::Postings];
        let tx = store.begin(&tables, TxMode::ReadOnly).await?;

        let Some(term_id) = self.inner.lexicon.lookup(store, &tx, &[term.to_string()]).await?.into_iter().next().flatten() else {
            return Ok(Vec::new());
        };
        let docs = postings::get(store, &tx, term_id).await?;
        let keys = self.inner.doc_ids.resolve(store, &tx, &docs).await?;
        Ok(keys.into_iter().flatten().collect())
    }

    /// Search hits ordered by TF-IDF score, best first.
    pub async fn search_ranked(&self, terms: &[String]) -> IndexResult<Vec<(SearchHit, f64)>> {
        let result = self.search(terms).await?;
        let corpus_size = {
            let store = self.kv();
            let tx = store.begin(&[TableKind::Positions], TxMode::ReadOnly).await?;
            store.count(&tx, TableKind::Positions).await?
        };
        Ok(scoring::rank(terms, &result, corpus_size)?)
    }

    /// Wait until background repairs started by earlier searches are done.
    pub async fn wait_for_repairs(&self) {
        loop {
            let pending = std::mem::take(&mut *self.inner.repairs.lock());
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    warn!("Stale postings repair task failed: {}", e);
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Mutation helpers (caller holds the writer lock)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Drop wildcard entries of terms that no document references anymore.
    async fn prune_wildcards(&self, tx: &Transaction, emptied: &[TermId]) -> IndexResult<()> {
        if emptied.is_empty() {
            return Ok(());
        }
        let store = self.kv();
        let texts = self.inner.lexicon.resolve(store, tx, emptied).await?;
        let (ids, texts): (Vec<TermId>, Vec<String>) = emptied
            .iter()
            .zip(texts)
            .filter_map(|(id, text)| text.map(|text| (*id, text)))
            .unzip();
        wildcards::remove_bulk(store, tx, &texts, &ids, self.ngram_width()).await
    }

    /// Remove `doc` from the postings of `terms`.
    async fn unlink(&self, tx: &Transaction, terms: &[TermId], doc: DocId) -> IndexResult<()> {
        if terms.is_empty() {
            return Ok(());
        }
        let emptied_flags = postings::remove_bulk(self.kv(), tx, terms, doc).await?;
        let emptied: Vec<TermId> = terms
            .iter()
            .zip(emptied_flags)
            .filter(|(_, emptied)| *emptied)
            .map(|(term, _)| *term)
            .collect();
        self.prune_wildcards(tx, &emptied).await
    }

    /// Remove the indexed stream of `doc` and every posting pointing at it.
    async fn unindex(&self, tx: &Transaction, doc: DocId) -> IndexResult<()> {
        let previous = positions::get(self.kv(), tx, doc).await?;
        let terms = unique_by(previous, |t| *t);
        self.unlink(tx, &terms, doc).await?;
        positions::remove(self.kv(), tx, doc).await
    }

    fn schedule_repair(&self, stale: Vec<StaleDoc>) {
        if !self.inner.config.repair_stale {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime to repair {} stale documents on", stale.len());
            return;
        };

        debug!("Scheduling repair of {} stale documents", stale.len());
        let index = self.clone();
        let handle = runtime.spawn(async move {
            if let Err(e) = index.repair(stale).await {
                warn!("Stale postings repair failed: {}", e);
            }
        });

        let mut repairs = self.inner.repairs.lock();
        repairs.retain(|handle| !handle.is_finished());
        repairs.push(handle);
    }

    async fn repair(&self, stale: Vec<StaleDoc>) -> IndexResult<()> {
        let _writer = self.inner.writer.lock().await;
        let store = self.kv();
        let tx = store.begin(&DATA_TABLES, TxMode::ReadWrite).await?;

        let mut by_term: BTreeMap<TermId, Vec<DocId>> = BTreeMap::new();
        for (doc, terms) in &stale {
            // Stored again since the search saw it missing
            if !positions::get(store, &tx, *doc).await?.is_empty() {
                continue;
            }
            for &term in terms {
                by_term.entry(term).or_default().push(*doc);
            }
        }
        if by_term.is_empty() {
            return Ok(());
        }

        let (terms, docs): (Vec<TermId>, Vec<Vec<DocId>>) = by_term.into_iter().unzip();
        let emptied_flags = try_join_all(
            terms
                .iter()
                .zip(&docs)
                .map(|(&term, docs)| postings::remove_docs(store, &tx, term, docs)),
        )
        .await?;
        let emptied: Vec<TermId> = terms
            .iter()
            .zip(emptied_flags)
            .filter(|(_, emptied)| *emptied)
            .map(|(term, _)| *term)
            .collect();
        self.prune_wildcards(&tx, &emptied).await?;

        store.commit(tx).await?;
        debug!("Repaired postings of {} terms ({} emptied)", terms.len(), emptied.len());
        Ok(())
    }

    async fn count(&self, tx: &Transaction, table: TableKind) -> IndexResult<u64> {
        Ok(self.kv().count(tx, table).await?)
    }
}

#[async_trait::async_trait]
impl IndexApi for Index {
    // ─────────────────────────────────────────────────────────────────────────────
    // Read Operations
    // ─────────────────────────────────────────────────────────────────────────────

    async fn search(&self, terms: &[String]) -> IndexResult<SearchResult> {
        #[cfg(feature = "perf-log")]
        let t0 = std::time::Instant::now();

        let store = self.kv();
        let tx = store.begin(&SEARCH_TABLES, TxMode::ReadOnly).await?;

        let looked_up = self.inner.lexicon.lookup(store, &tx, terms).await?;
        let mut query_text: HashMap<TermId, &String> = HashMap::new();
        for (term, id) in terms.iter().zip(&looked_up) {
            if let Some(id) = id {
                query_text.entry(*id).or_insert(term);
            }
        }
        let known = unique_by(looked_up.iter().flatten().copied().collect(), |t| *t);

        let lookup = postings::get_bulk(store, &tx, &known).await?;
        let lists: HashMap<TermId, &Vec<DocId>> = known.iter().copied().zip(&lookup.terms_to_ids).collect();
        let terms_to_ids: Vec<Vec<DocId>> = looked_up
            .iter()
            .map(|id| id.and_then(|id| lists.get(&id)).map(|docs| (*docs).clone()).unwrap_or_default())
            .collect();

        #[cfg(feature = "perf-log")]
        let t1 = std::time::Instant::now();

        let streams = positions::get_bulk(store, &tx, &lookup.ids).await?;

        #[cfg(feature = "perf-log")]
        let t2 = std::time::Instant::now();

        let mut live = Vec::with_capacity(streams.len());
        let mut stale: Vec<StaleDoc> = Vec::new();
        for (i, stream) in streams.iter().enumerate() {
            if stream.is_empty() {
                stale.push((lookup.ids[i], lookup.ids_to_terms[i].clone()));
            } else {
                live.push(i);
            }
        }

        let live_docs: Vec<DocId> = live.iter().map(|&i| lookup.ids[i]).collect();
        let vocabulary = unique_by(live.iter().flat_map(|&i| streams[i].iter().copied()).collect(), |t| *t);
        let (keys, texts) = futures::try_join!(
            self.inner.doc_ids.resolve(store, &tx, &live_docs),
            self.inner.lexicon.resolve(store, &tx, &vocabulary),
        )?;
        let text_of: HashMap<TermId, String> = vocabulary
            .iter()
            .copied()
            .zip(texts)
            .filter_map(|(id, text)| text.map(|text| (id, text)))
            .collect();

        let mut hits = Vec::with_capacity(live.len());
        for (&i, key) in live.iter().zip(keys) {
            let doc = lookup.ids[i];
            let id = key.ok_or_else(|| IndexError::Corrupt(format!("document {} has no key", doc)))?;
            let term_ids = streams[i].clone();
            let doc_terms = term_ids
                .iter()
                .map(|term| {
                    text_of
                        .get(term)
                        .cloned()
                        .ok_or_else(|| IndexError::Corrupt(format!("term {} has no text", term)))
                })
                .collect::<IndexResult<Vec<String>>>()?;
            let matched_ids = lookup.ids_to_terms[i].clone();
            let matched = matched_ids
                .iter()
                .filter_map(|term| query_text.get(term).map(|text| (*text).clone()))
                .collect();

            hits.push(SearchHit {
                doc,
                id,
                term_ids,
                terms: doc_terms,
                matched_ids,
                matched,
            });
        }

        #[cfg(feature = "perf-log")]
        debug!(
            "[perf] lookup={:.1}ms postings+positions={:.1}ms resolve={:.1}ms hits={} stale={}",
            (t1 - t0).as_secs_f64() * 1000.0,
            (t2 - t1).as_secs_f64() * 1000.0,
            t2.elapsed().as_secs_f64() * 1000.0,
            hits.len(),
            stale.len()
        );

        if !stale.is_empty() {
            self.schedule_repair(stale);
        }

        Ok(SearchResult {
            hits,
            ids: lookup.ids,
            ids_to_terms: lookup.ids_to_terms,
            terms_to_ids,
        })
    }

    async fn wildcard(&self, pattern: &str) -> IndexResult<Vec<String>> {
        let store = self.kv();
        let tx = store
            .begin(&[TableKind::Wildcards, TableKind::LexiconInverse], TxMode::ReadOnly)
            .await?;

        let candidates = wildcards::candidates(store, &tx, pattern, self.ngram_width()).await?;
        let texts = self.inner.lexicon.resolve(store, &tx, &candidates).await?;
        Ok(texts
            .into_iter()
            .flatten()
            .filter(|text| wildcard_match(text, pattern))
            .collect())
    }

    async fn query(&self, query: &str) -> IndexResult<Vec<SearchHit>> {
        let node = parse(query)?;
        debug!("Evaluating query {}", node);
        evaluate(self, &node).await
    }

    async fn stats(&self) -> IndexResult<IndexStats> {
        let store = self.kv();
        let tx = store.begin(&TableKind::ALL, TxMode::ReadOnly).await?;

        let (postings, positions, wildcards, lexicon, ids) = futures::try_join!(
            self.count(&tx, TableKind::Postings),
            self.count(&tx, TableKind::Positions),
            self.count(&tx, TableKind::Wildcards),
            self.inner.lexicon.count(store, &tx),
            self.inner.doc_ids.count(store, &tx),
        )?;
        let sizes = try_join_all(TableKind::ALL.iter().map(|&table| store.size_in_bytes(&tx, table))).await?;

        Ok(IndexStats {
            postings,
            positions,
            wildcards,
            lexicon,
            ids,
            total: postings + positions + wildcards + lexicon + ids,
            size: sizes.iter().sum(),
        })
    }

    async fn is_corrupt(&self) -> IndexResult<bool> {
        let store = self.kv();
        let tx = store.begin(&[TableKind::Metadata], TxMode::ReadOnly).await?;
        match store.get(&tx, TableKind::Metadata, MARKER_KEY).await {
            Ok(Some(value)) => Ok(value != MARKER_VALUE),
            Ok(None) => Ok(true),
            Err(StorageError::Transform(..)) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────────

    async fn store(&self, id: DocKey, terms: &[String]) -> IndexResult<()> {
        if id.is_empty() {
            return Err(IndexError::InvalidInput("document id must not be empty".to_string()));
        }

        let _writer = self.inner.writer.lock().await;
        let store = self.kv();
        let tx = store.begin(&DATA_TABLES, TxMode::ReadWrite).await?;

        let doc = single(self.inner.doc_ids.bulk(store, &tx, std::slice::from_ref(&id)).await?)?;
        if terms.is_empty() {
            self.unindex(&tx, doc).await?;
            store.commit(tx).await?;
            debug!("Stored document {} without terms, unindexed", id);
            return Ok(());
        }

        let term_ids = self.inner.lexicon.bulk(store, &tx, terms).await?;

        // Terms of a previous version that are gone from this one
        let current: HashSet<TermId> = term_ids.iter().copied().collect();
        let dropped: Vec<TermId> = unique_by(positions::get(store, &tx, doc).await?, |t| *t)
            .into_iter()
            .filter(|term| !current.contains(term))
            .collect();
        self.unlink(&tx, &dropped, doc).await?;

        let fresh = postings::insert_bulk(store, &tx, &term_ids, doc).await?;
        if !fresh.is_empty() {
            let text_of: HashMap<TermId, &String> = term_ids.iter().copied().zip(terms).collect();
            let (ids, texts): (Vec<TermId>, Vec<String>) = fresh
                .iter()
                .filter_map(|id| text_of.get(id).map(|text| (*id, (*text).clone())))
                .unzip();
            wildcards::insert_bulk(store, &tx, &texts, &ids, self.ngram_width()).await?;
        }
        positions::insert(store, &tx, doc, &term_ids).await?;

        store.commit(tx).await?;
        debug!(
            "Stored document {} ({} terms, {} new, {} dropped)",
            id,
            term_ids.len(),
            fresh.len(),
            dropped.len()
        );
        Ok(())
    }

    async fn initialize(&self) -> IndexResult<()> {
        let _writer = self.inner.writer.lock().await;
        let store = self.kv();
        let tx = store.begin(&[TableKind::Metadata], TxMode::ReadWrite).await?;
        store.put(&tx, TableKind::Metadata, MARKER_KEY, MARKER_VALUE.to_vec()).await?;
        store.commit(tx).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Metadata
    // ─────────────────────────────────────────────────────────────────────────────

    async fn metadata_get(&self, key: &str) -> IndexResult<Option<Vec<u8>>> {
        let store = self.kv();
        let tx = store.begin(&[TableKind::Metadata], TxMode::ReadOnly).await?;
        Ok(store.get(&tx, TableKind::Metadata, &metadata_key(key)).await?)
    }

    async fn metadata_set(&self, key: &str, value: Vec<u8>) -> IndexResult<()> {
        let _writer = self.inner.writer.lock().await;
        let store = self.kv();
        let tx = store.begin(&[TableKind::Metadata], TxMode::ReadWrite).await?;
        store.put(&tx, TableKind::Metadata, &metadata_key(key), value).await?;
        store.commit(tx).await?;
        debug!("Set metadata {}", key);
        Ok(())
    }

    async fn metadata_remove(&self, key: &str) -> IndexResult<()> {
        let _writer = self.inner.writer.lock().await;
        let store = self.kv();
        let tx = store.begin(&[TableKind::Metadata], TxMode::ReadWrite).await?;
        store.remove(&tx, TableKind::Metadata, &metadata_key(key)).await?;
        store.commit(tx).await?;
        debug!("Removed metadata {}", key);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Delete Operations
    // ─────────────────────────────────────────────────────────────────────────────

    async fn remove(&self, id: DocKey) -> IndexResult<()> {
        if id.is_empty() {
            return Err(IndexError::InvalidInput("document id must not be empty".to_string()));
        }

        let _writer = self.inner.writer.lock().await;
        let store = self.kv();
        let tx = store.begin(&DATA_TABLES, TxMode::ReadWrite).await?;

        let found = self.inner.doc_ids.lookup(store, &tx, std::slice::from_ref(&id)).await?;
        let Some(doc) = found.into_iter().next().flatten() else {
            debug!("Remove of unknown document {}", id);
            return Ok(());
        };

        self.unindex(&tx, doc).await?;
        store.commit(tx).await?;
        debug!("Removed document {}", id);
        Ok(())
    }

    async fn clear(&self) -> IndexResult<()> {
        let _writer = self.inner.writer.lock().await;
        let store = self.kv();
        let tx = store.begin(&TableKind::ALL, TxMode::ReadWrite).await?;
        for table in TableKind::ALL {
            store.clear(&tx, table).await?;
        }
        store.commit(tx).await?;
        debug!("Cleared index");
        Ok(())
    }
}
