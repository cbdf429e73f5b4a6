//! End-to-end behavior of the index façade over the in-memory backend.

use lexis::storage::{FnTransform, KeyValueStore, MemoryStore, SaltedHashKeys, TableKind, TransformedStore, TxMode};
use lexis::{codec, tokenize_text, DocKey, Index, IndexApi, IndexConfig, SearchResult};

const BODY_A: &str = "hello this is a really long fluffy text abc";
const BODY_B: &str = "i just started using this secure email app this hello";
const BODY_C: &str = "hello this is a really good app abc";

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

fn ids(result: &SearchResult) -> Vec<String> {
    result.keys().iter().map(|key| key.to_string()).collect()
}

async fn search_index() -> Index {
    let index = Index::in_memory();
    index.store("123".into(), &tokenize_text(BODY_A)).await.unwrap();
    index.store("124".into(), &tokenize_text(BODY_B)).await.unwrap();
    index.store("125".into(), &tokenize_text(BODY_C)).await.unwrap();
    index.store("150".into(), &tokenize_text("random text")).await.unwrap();
    index.store("160".into(), &tokenize_text("redemption rededicate")).await.unwrap();
    index.store("161".into(), &tokenize_text("redundancy retired rediscover")).await.unwrap();
    index
}

// ============================================================
// Search
// ============================================================

#[tokio::test]
async fn search_unknown_keyword_is_empty() {
    let index = search_index().await;
    let result = index.search(&words(&["foo"])).await.unwrap();
    assert!(result.hits.is_empty());
    assert_eq!(result.terms_to_ids, vec![Vec::<u64>::new()]);
}

#[tokio::test]
async fn search_returns_documents_in_first_seen_order() {
    let index = search_index().await;
    assert_eq!(ids(&index.search(&tokenize_text("hello this")).await.unwrap()), ["123", "124", "125"]);
    assert_eq!(ids(&index.search(&words(&["hello"])).await.unwrap()), ["123", "124", "125"]);
    assert_eq!(ids(&index.search(&words(&["fluffy"])).await.unwrap()), ["123"]);
    assert_eq!(ids(&index.search(&words(&["app"])).await.unwrap()), ["124", "125"]);
}

#[tokio::test]
async fn search_reports_matched_terms() {
    let index = search_index().await;
    let result = index.search(&words(&["hello", "secure"])).await.unwrap();
    assert_eq!(ids(&result), ["123", "124", "125"]);

    let matched: Vec<Vec<String>> = result.hits.iter().map(|hit| hit.matched.clone()).collect();
    assert_eq!(matched, vec![words(&["hello"]), words(&["hello", "secure"]), words(&["hello"])]);

    // Token stream comes back in document order
    assert_eq!(result.hits[1].terms, tokenize_text(BODY_B));
}

// ============================================================
// Wildcards
// ============================================================

#[tokio::test]
async fn wildcard_expansion() {
    let index = search_index().await;
    assert_eq!(
        index.wildcard("re*").await.unwrap(),
        words(&["really", "redemption", "rededicate", "redundancy", "retired", "rediscover"])
    );
    assert_eq!(
        index.wildcard("red*").await.unwrap(),
        words(&["redemption", "rededicate", "redundancy", "rediscover"])
    );
    assert_eq!(index.wildcard("*ed").await.unwrap(), words(&["started", "retired"]));
    assert_eq!(index.wildcard("*ndo*").await.unwrap(), words(&["random"]));
}

#[tokio::test]
async fn wildcard_needs_enough_literal_characters() {
    let index = search_index().await;
    assert!(index.wildcard("*").await.is_err());
    assert!(index.wildcard("r*").await.is_err());
}

#[tokio::test]
async fn query_with_wildcard() {
    let index = search_index().await;
    let hits = index.query("red*").await.unwrap();
    let keys: Vec<String> = hits.iter().map(|hit| hit.id.to_string()).collect();
    assert_eq!(keys, ["160", "161"]);
}

// ============================================================
// Stale postings
// ============================================================

#[tokio::test]
async fn search_cleans_stale_postings() {
    let store = MemoryStore::new();
    let index = Index::with_config(store.clone(), IndexConfig::default().with_cache_capacity(0)).unwrap();

    index.store("199".into(), &words(&["unicorn", "zebra"])).await.unwrap();
    assert_eq!(ids(&index.search(&words(&["unicorn", "zebra"])).await.unwrap()), ["199"]);
    assert_eq!(index.postings_for("unicorn").await.unwrap(), vec![DocKey::from("199")]);

    // Drop the document's stream behind the index's back
    let doc = index.lookup_doc(&"199".into()).await.unwrap().unwrap();
    let tx = store.begin(&[TableKind::Positions], TxMode::ReadWrite).await.unwrap();
    store.remove(&tx, TableKind::Positions, &codec::encode_one(doc)).await.unwrap();
    store.commit(tx).await.unwrap();

    assert!(index.search(&words(&["unicorn", "zebra"])).await.unwrap().hits.is_empty());
    index.wait_for_repairs().await;

    assert!(index.postings_for("unicorn").await.unwrap().is_empty());
    assert!(index.postings_for("zebra").await.unwrap().is_empty());
    assert!(index.wildcard("uni*").await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_postings_kept_when_repair_disabled() {
    let store = MemoryStore::new();
    let config = IndexConfig::default().with_cache_capacity(0).with_repair_stale(false);
    let index = Index::with_config(store.clone(), config).unwrap();

    index.store("1".into(), &words(&["unicorn"])).await.unwrap();
    let doc = index.lookup_doc(&"1".into()).await.unwrap().unwrap();
    let tx = store.begin(&[TableKind::Positions], TxMode::ReadWrite).await.unwrap();
    store.remove(&tx, TableKind::Positions, &codec::encode_one(doc)).await.unwrap();
    store.commit(tx).await.unwrap();

    let result = index.search(&words(&["unicorn"])).await.unwrap();
    assert!(result.hits.is_empty());
    assert_eq!(result.ids, vec![doc]);
    index.wait_for_repairs().await;
    assert_eq!(index.postings_for("unicorn").await.unwrap(), vec![DocKey::from("1")]);
}

// ============================================================
// Removal
// ============================================================

#[tokio::test]
async fn remove_one() {
    let index = Index::in_memory();
    let tokens = tokenize_text("this is my body");
    index.store("123".into(), &tokens).await.unwrap();
    index.remove("123".into()).await.unwrap();

    assert!(index.search(&tokens).await.unwrap().hits.is_empty());
    assert!(index.postings_for("this").await.unwrap().is_empty());
    assert!(index.wildcard("thi*").await.unwrap().is_empty());

    // Removing again is a no-op
    index.remove("123".into()).await.unwrap();
    index.remove("never-stored".into()).await.unwrap();
}

#[tokio::test]
async fn remove_multiple_keeps_shared_terms() {
    let index = Index::in_memory();
    let mut first = tokenize_text("this is my body");
    first.push("removed".to_string());
    index.store("123".into(), &first).await.unwrap();
    index.store("321".into(), &tokenize_text("this is my body")).await.unwrap();
    index.remove("123".into()).await.unwrap();

    for token in tokenize_text("this is my body") {
        assert_eq!(index.postings_for(&token).await.unwrap(), vec![DocKey::from("321")]);
    }

    // Shared n-grams survive, unique ones go
    assert_eq!(index.wildcard("thi*").await.unwrap(), words(&["this"]));
    assert_eq!(index.wildcard("*is").await.unwrap(), words(&["this", "is"]));
    assert!(index.wildcard("rem*").await.unwrap().is_empty());
    assert!(index.wildcard("*ved").await.unwrap().is_empty());
}

#[tokio::test]
async fn store_without_terms_unindexes() {
    let index = Index::in_memory();
    index.store(7u64.into(), &words(&["alpha"])).await.unwrap();
    index.store(7u64.into(), &[]).await.unwrap();
    assert!(index.search(&words(&["alpha"])).await.unwrap().hits.is_empty());
    assert_eq!(index.stats().await.unwrap().positions, 0);
}

// ============================================================
// Stats, integrity and transforms
// ============================================================

#[tokio::test]
async fn stats_count_every_table() {
    let index = Index::in_memory();
    index.store("123".into(), &tokenize_text("this is my body")).await.unwrap();

    let stats = index.stats().await.unwrap();
    assert_eq!(stats.postings, 4);
    assert_eq!(stats.positions, 1);
    // ^th thi his is$ ^is ^my my$ ^bo bod ody dy$
    assert_eq!(stats.wildcards, 11);
    assert_eq!(stats.lexicon, 4);
    assert_eq!(stats.ids, 1);
    assert_eq!(stats.total, 21);

    index.clear().await.unwrap();
    let cleared = index.stats().await.unwrap();
    assert_eq!(cleared.total, 0);
    assert_eq!(cleared.size, 0);
}

fn tagged(tag: u8) -> FnTransform {
    FnTransform::new(
        |_, key| key.to_vec(),
        move |_, _, mut value| {
            value.insert(0, tag);
            value
        },
        move |_, _, value| match value.split_first() {
            Some((first, rest)) if *first == tag => Ok(rest.to_vec()),
            _ => Err("bad tag".to_string()),
        },
    )
}

#[tokio::test]
async fn transformed_store_round_trips() {
    let index = Index::new(TransformedStore::new(MemoryStore::new(), SaltedHashKeys::new("salt")));
    index.store("a".into(), &tokenize_text(BODY_A)).await.unwrap();
    index.store("b".into(), &tokenize_text(BODY_C)).await.unwrap();

    assert_eq!(ids(&index.search(&words(&["fluffy"])).await.unwrap()), ["a"]);
    assert_eq!(index.wildcard("rea*").await.unwrap(), words(&["really"]));
    index.remove("a".into()).await.unwrap();
    assert_eq!(ids(&index.search(&words(&["abc"])).await.unwrap()), ["b"]);
}

#[tokio::test]
async fn wrong_transform_reports_corruption() {
    let store = MemoryStore::new();
    let index = Index::new(TransformedStore::new(store.clone(), tagged(0xA5)));
    assert!(index.is_corrupt().await.unwrap());
    index.initialize().await.unwrap();
    assert!(!index.is_corrupt().await.unwrap());

    let reopened = Index::new(TransformedStore::new(store, tagged(0x5A)));
    assert!(reopened.is_corrupt().await.unwrap());
}

#[tokio::test]
async fn metadata_survives_transform_and_clear_drops_it() {
    let store = MemoryStore::new();
    let index = Index::new(TransformedStore::new(store.clone(), tagged(0xA5)));
    index.initialize().await.unwrap();
    index.metadata_set("cursor", b"42".to_vec()).await.unwrap();
    assert_eq!(index.metadata_get("cursor").await.unwrap(), Some(b"42".to_vec()));
    assert_eq!(index.metadata_get("missing").await.unwrap(), None);

    // Stored bytes carry the transform
    let reopened = Index::new(TransformedStore::new(store.clone(), tagged(0xA5)));
    assert_eq!(reopened.metadata_get("cursor").await.unwrap(), Some(b"42".to_vec()));
    assert!(Index::new(TransformedStore::new(store.clone(), tagged(0x5A)))
        .metadata_get("cursor")
        .await
        .is_err());

    reopened.metadata_set("cursor", b"43".to_vec()).await.unwrap();
    assert_eq!(reopened.metadata_get("cursor").await.unwrap(), Some(b"43".to_vec()));
    reopened.metadata_remove("cursor").await.unwrap();
    assert_eq!(reopened.metadata_get("cursor").await.unwrap(), None);
    assert!(!reopened.is_corrupt().await.unwrap());

    reopened.metadata_set("cursor", b"44".to_vec()).await.unwrap();
    reopened.clear().await.unwrap();
    assert_eq!(reopened.metadata_get("cursor").await.unwrap(), None);
}

// ============================================================
// Concurrency
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stores_all_land() {
    let index = Index::in_memory();
    let mut tasks = Vec::new();
    for i in 0..64u64 {
        let index = index.clone();
        tasks.push(tokio::spawn(async move {
            let terms = vec!["shared".to_string(), format!("only{i}"), "common".to_string()];
            index.store(DocKey::from(i), &terms).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let result = index.search(&words(&["shared"])).await.unwrap();
    assert_eq!(result.hits.len(), 64);
    let mut keys = result.keys();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 64);
    assert_eq!(ids(&index.search(&words(&["only17"])).await.unwrap()), ["17"]);

    let stats = index.stats().await.unwrap();
    assert_eq!(stats.lexicon, 66);
    assert_eq!(stats.ids, 64);
    assert_eq!(stats.positions, 64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn search_during_removal_never_fails() {
    let index = Index::in_memory();
    for i in 0..32u64 {
        index.store(DocKey::from(i), &words(&["shared", "common"])).await.unwrap();
    }

    let mut searches = Vec::new();
    for _ in 0..4 {
        let index = index.clone();
        searches.push(tokio::spawn(async move {
            for _ in 0..50 {
                let result = index.search(&words(&["shared"])).await;
                assert!(result.is_ok(), "search failed: {:?}", result.err());
                tokio::task::yield_now().await;
            }
        }));
    }
    let mut removals = Vec::new();
    for i in 0..32u64 {
        let index = index.clone();
        removals.push(tokio::spawn(async move { index.remove(DocKey::from(i)).await }));
    }

    for task in removals {
        task.await.unwrap().unwrap();
    }
    for task in searches {
        task.await.unwrap();
    }
    index.wait_for_repairs().await;

    assert!(index.search(&words(&["shared"])).await.unwrap().hits.is_empty());
    assert!(index.postings_for("common").await.unwrap().is_empty());
}
