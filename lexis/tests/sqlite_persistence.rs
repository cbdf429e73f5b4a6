//! Indexes persisted in SQLite survive reopening.

use lexis::storage::{SaltedHashKeys, SqliteStore, TransformedStore};
use lexis::{tokenize_text, DocKey, Index, IndexApi};
use tempfile::TempDir;

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

#[tokio::test]
async fn reopen_keeps_documents() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("index.sqlite");

    {
        let index = Index::open_sqlite(&db_path).unwrap();
        index.initialize().await.unwrap();
        index.store("a".into(), &tokenize_text("the quick brown fox")).await.unwrap();
        index.store(42u64.into(), &tokenize_text("quick silver lining")).await.unwrap();
    }

    let index = Index::open_sqlite(&db_path).unwrap();
    assert!(!index.is_corrupt().await.unwrap());

    let result = index.search(&words(&["quick"])).await.unwrap();
    assert_eq!(result.keys(), vec![DocKey::from("a"), DocKey::from(42u64)]);
    assert_eq!(index.wildcard("sil*").await.unwrap(), words(&["silver"]));

    let hits = index.query("quick -fox").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, DocKey::from(42u64));
}

#[tokio::test]
async fn ids_are_not_reused_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("index.sqlite");

    let first = {
        let index = Index::open_sqlite(&db_path).unwrap();
        index.store("one".into(), &words(&["alpha"])).await.unwrap();
        index.remove("one".into()).await.unwrap();
        index.lookup_doc(&"one".into()).await.unwrap().unwrap()
    };

    let index = Index::open_sqlite(&db_path).unwrap();
    index.store("two".into(), &words(&["alpha"])).await.unwrap();
    let second = index.lookup_doc(&"two".into()).await.unwrap().unwrap();
    assert!(second > first);

    let stats = index.stats().await.unwrap();
    assert_eq!(stats.ids, 2);
    assert_eq!(stats.positions, 1);
    assert!(stats.size > 0);
}

#[tokio::test]
async fn hashed_keys_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("index.sqlite");

    let open = || -> Index {
        let store = SqliteStore::open(&db_path).unwrap();
        Index::new(TransformedStore::new(store, SaltedHashKeys::new("pepper")))
    };

    {
        let index = open();
        index.initialize().await.unwrap();
        index.store("doc".into(), &tokenize_text("encrypted search works")).await.unwrap();
    }

    let index = open();
    assert!(!index.is_corrupt().await.unwrap());
    let hits = index.query("\"search works\"").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, DocKey::from("doc"));

    index.clear().await.unwrap();
    assert!(index.is_corrupt().await.unwrap());
    assert_eq!(index.stats().await.unwrap().total, 0);
}
