//! In-process checkpoint store

use super::CheckpointStore;
use crate::error::{RecwalkError, Result};
use crate::types::Checkpoint;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<BTreeMap<NaiveDate, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.checkpoints.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.checkpoints.read().await.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn write(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut checkpoints = self.checkpoints.write().await;
        if checkpoints.contains_key(&checkpoint.window_end) {
            return Err(RecwalkError::AlreadyExists(format!(
                "checkpoint {}",
                checkpoint.window_end
            )));
        }
        checkpoints.insert(checkpoint.window_end, checkpoint.clone());
        Ok(())
    }

    async fn read_latest(&self) -> Result<Option<Checkpoint>> {
        Ok(self
            .checkpoints
            .read()
            .await
            .values()
            .next_back()
            .cloned())
    }

    async fn read(&self, window_end: NaiveDate) -> Result<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(&window_end).cloned())
    }

    async fn list(&self) -> Result<Vec<NaiveDate>> {
        Ok(self.checkpoints.read().await.keys().copied().collect())
    }
}
