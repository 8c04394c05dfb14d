//! Filesystem checkpoint store
//!
//! One bincode file per checkpoint, named `YYYY-MM-DD.ckpt` after the window
//! end. Files are written to a temporary name first and then hard-linked
//! into place, so a reader never sees a partial checkpoint and an existing
//! key is never replaced.

use super::CheckpointStore;
use crate::error::{RecwalkError, Result};
use crate::types::Checkpoint;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const EXTENSION: &str = "ckpt";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    dir: PathBuf,
}

impl FsCheckpointStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, window_end: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.{}", window_end.format(DATE_FORMAT), EXTENSION))
    }

    fn key_of(path: &Path) -> Option<NaiveDate> {
        if path.extension()? != EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
    }
}

#[async_trait]
impl CheckpointStore for FsCheckpointStore {
    async fn write(&self, checkpoint: &Checkpoint) -> Result<()> {
        let target = self.path_for(checkpoint.window_end);
        if fs::try_exists(&target).await? {
            return Err(RecwalkError::AlreadyExists(target.display().to_string()));
        }

        let bytes = bincode::serialize(checkpoint)?;
        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            checkpoint.window_end.format(DATE_FORMAT),
            uuid::Uuid::new_v4()
        ));
        fs::write(&tmp, &bytes).await?;

        let linked = fs::hard_link(&tmp, &target).await;
        fs::remove_file(&tmp).await?;
        match linked {
            Ok(()) => {
                debug!("Wrote checkpoint {} ({} bytes)", target.display(), bytes.len());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(RecwalkError::AlreadyExists(target.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_latest(&self) -> Result<Option<Checkpoint>> {
        match self.list().await?.last() {
            Some(end) => self.read(*end).await,
            None => Ok(None),
        }
    }

    async fn read(&self, window_end: NaiveDate) -> Result<Option<Checkpoint>> {
        let path = self.path_for(window_end);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let checkpoint: Checkpoint = bincode::deserialize(&bytes).map_err(|e| {
            RecwalkError::Checkpoint(format!("{} is corrupt: {}", path.display(), e))
        })?;
        if checkpoint.window_end != window_end {
            return Err(RecwalkError::Checkpoint(format!(
                "{} holds window end {}",
                path.display(),
                checkpoint.window_end
            )));
        }
        Ok(Some(checkpoint))
    }

    async fn list(&self) -> Result<Vec<NaiveDate>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(key) = Self::key_of(&entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
