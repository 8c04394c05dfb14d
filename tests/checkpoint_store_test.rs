//! Integration tests for checkpoint persistence
//!
//! Exercises the filesystem store across reopen and its chain queries.

mod common;

use chrono::Utc;
use common::day;
use recwalk_core::{Checkpoint, CheckpointStore, FsCheckpointStore, MemoryCheckpointStore};
use tempfile::TempDir;

fn checkpoint(end: i64, parent: Option<i64>) -> Checkpoint {
    Checkpoint {
        window_end: day(end),
        parent: parent.map(day),
        scorer: "popularity".to_string(),
        state: vec![end as u8; 4],
        examples: end as u64,
        created_at: Utc::now(),
    }
}

async fn fill(store: &dyn CheckpointStore) {
    store.write(&checkpoint(30, None)).await.unwrap();
    store.write(&checkpoint(37, Some(30))).await.unwrap();
    store.write(&checkpoint(51, Some(37))).await.unwrap();
}

#[tokio::test]
async fn test_fs_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = FsCheckpointStore::open(dir.path()).await.unwrap();
        fill(&store).await;
    }

    let store = FsCheckpointStore::open(dir.path()).await.unwrap();
    assert_eq!(store.list().await.unwrap(), vec![day(30), day(37), day(51)]);

    let latest = store.read_latest().await.unwrap().unwrap();
    assert_eq!(latest.window_end, day(51));
    assert_eq!(latest.parent, Some(day(37)));
    assert_eq!(latest.state, vec![51; 4]);
    assert_eq!(latest.examples, 51);
}

#[tokio::test]
async fn test_chain_walk_back_to_root() {
    let dir = TempDir::new().unwrap();
    let store = FsCheckpointStore::open(dir.path().join("nested/ckpt")).await.unwrap();
    fill(&store).await;

    let mut cursor = store.read_latest().await.unwrap();
    let mut chain = Vec::new();
    while let Some(cp) = cursor {
        chain.push(cp.window_end);
        cursor = match cp.parent {
            Some(parent) => store.read(parent).await.unwrap(),
            None => None,
        };
    }
    assert_eq!(chain, vec![day(51), day(37), day(30)]);
}

#[tokio::test]
async fn test_stores_agree_on_lookup() {
    let dir = TempDir::new().unwrap();
    let fs = FsCheckpointStore::open(dir.path()).await.unwrap();
    let memory = MemoryCheckpointStore::new();
    fill(&fs).await;
    fill(&memory).await;

    for query in [29, 30, 36, 44, 51, 90] {
        let a = fs.read_at_or_before(day(query)).await.unwrap();
        let b = memory.read_at_or_before(day(query)).await.unwrap();
        assert_eq!(
            a.map(|c| c.window_end),
            b.map(|c| c.window_end),
            "query day {}",
            query
        );
    }
}
