//! Persistence tests for the file-backed vector store.

use docqa::document::{Chunk, DocumentMetadata};
use docqa::{FileVectorStore, VectorStore};

fn chunk(id: &str, text: &str, embedding: Vec<f32>) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        metadata: DocumentMetadata {
            source: "suppliers.csv".into(),
            file_path: "/uploads/suppliers.csv".into(),
            page: None,
            row: Some(3),
        },
        ordinal: 0,
        start: 0,
        end: text.chars().count(),
        embedding,
    }
}

#[tokio::test]
async fn contents_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("rag_collection", 2).await.unwrap();
        store
            .upsert(
                "rag_collection",
                &[chunk("id-1", "Acme ships bolts", vec![1.0, 0.0]), chunk("id-2", "Globex", vec![0.0, 1.0])],
            )
            .await
            .unwrap();
        store.flush("rag_collection").await.unwrap();
    }

    let reopened = FileVectorStore::open(dir.path()).await.unwrap();

    assert_eq!(reopened.count("rag_collection").await.unwrap(), 2);
    let hits = reopened.search("rag_collection", &[1.0, 0.0], 1).await.unwrap();
    assert_eq!(hits[0].chunk.id, "id-1");
    assert_eq!(hits[0].chunk.metadata.row, Some(3));
    assert_eq!(hits[0].chunk.text, "Acme ships bolts");
}

#[tokio::test]
async fn deleting_a_collection_removes_its_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.create_collection("docs", 2).await.unwrap();
    assert!(dir.path().join("docs.json").exists());

    store.delete_collection("docs").await.unwrap();

    assert!(!dir.path().join("docs.json").exists());
    let reopened = FileVectorStore::open(dir.path()).await.unwrap();
    assert!(reopened.count("docs").await.is_err());
}

#[tokio::test]
async fn deletes_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.create_collection("docs", 2).await.unwrap();
    store
        .upsert("docs", &[chunk("a", "one", vec![1.0, 0.0]), chunk("b", "two", vec![0.0, 1.0])])
        .await
        .unwrap();
    store.delete("docs", &["a"]).await.unwrap();
    store.flush("docs").await.unwrap();
    drop(store);

    let reopened = FileVectorStore::open(dir.path()).await.unwrap();
    let remaining = reopened.sample("docs", 10).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "b");
}

#[tokio::test]
async fn creating_an_existing_collection_keeps_its_contents() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.create_collection("docs", 2).await.unwrap();
    store.upsert("docs", &[chunk("a", "one", vec![1.0, 0.0])]).await.unwrap();

    store.create_collection("docs", 2).await.unwrap();

    assert_eq!(store.count("docs").await.unwrap(), 1);
}

#[tokio::test]
async fn unsafe_collection_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();

    assert!(store.create_collection("../escape", 2).await.is_err());
    assert!(store.create_collection("", 2).await.is_err());
}

#[tokio::test]
async fn corrupt_snapshot_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

    assert!(FileVectorStore::open(dir.path()).await.is_err());
}

#[tokio::test]
async fn location_is_the_persist_directory() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();

    assert_eq!(store.location(), dir.path().display().to_string());
}

#[tokio::test]
async fn writes_reach_disk_on_flush() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.create_collection("docs", 2).await.unwrap();
    store.upsert("docs", &[chunk("a", "one", vec![1.0, 0.0])]).await.unwrap();
    store.upsert("docs", &[chunk("b", "two", vec![0.0, 1.0])]).await.unwrap();

    let before = FileVectorStore::open(dir.path()).await.unwrap();
    assert_eq!(before.count("docs").await.unwrap(), 0);

    store.flush("docs").await.unwrap();
    let after = FileVectorStore::open(dir.path()).await.unwrap();
    assert_eq!(after.count("docs").await.unwrap(), 2);
}

#[tokio::test]
async fn failed_snapshot_removal_keeps_the_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileVectorStore::open(dir.path()).await.unwrap();
    store.create_collection("docs", 2).await.unwrap();
    store.upsert("docs", &[chunk("a", "one", vec![1.0, 0.0])]).await.unwrap();
    store.flush("docs").await.unwrap();

    // A directory in place of the snapshot file cannot be removed as a file.
    let snapshot = dir.path().join("docs.json");
    std::fs::remove_file(&snapshot).unwrap();
    std::fs::create_dir(&snapshot).unwrap();
    std::fs::write(snapshot.join("keep"), "x").unwrap();

    assert!(store.delete_collection("docs").await.is_err());
    assert_eq!(store.count("docs").await.unwrap(), 1);
    let hits = store.search("docs", &[1.0, 0.0], 1).await.unwrap();
    assert_eq!(hits[0].chunk.id, "a");
}
