//! Checkpoint persistence
//!
//! Checkpoints are immutable and keyed by the end date of the window they
//! were trained on. A store never overwrites an existing key; each new
//! checkpoint links to its parent, forming a singly linked chain ordered by
//! window end.

pub mod fs;
pub mod memory;

pub use fs::FsCheckpointStore;
pub use memory::MemoryCheckpointStore;

use crate::error::Result;
use crate::types::Checkpoint;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Storage backend for model checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint; fails with `AlreadyExists` if its key is taken
    async fn write(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Checkpoint with the greatest window end
    async fn read_latest(&self) -> Result<Option<Checkpoint>>;

    /// Checkpoint for an exact window end
    async fn read(&self, window_end: NaiveDate) -> Result<Option<Checkpoint>>;

    /// Stored window ends, oldest first
    async fn list(&self) -> Result<Vec<NaiveDate>>;

    /// Latest checkpoint whose window end is on or before `day`
    async fn read_at_or_before(&self, day: NaiveDate) -> Result<Option<Checkpoint>> {
        let keys = self.list().await?;
        match keys.into_iter().rev().find(|end| *end <= day) {
            Some(end) => self.read(end).await,
            None => Ok(None),
        }
    }
}
