//! Incremental trainer
//!
//! Turns checkpoint n-1 plus window n's labelled examples into checkpoint n.
//! The trained scorer is returned frozen behind an `Arc` so ranking tasks can
//! share it without any writer in reach.

use crate::error::{RecwalkError, Result};
use crate::scorer::{Scorer, ScorerFactory};
use crate::types::{Checkpoint, LabeledExample};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::debug;

/// Output of one training step
#[derive(Clone)]
pub struct TrainedModel {
    pub checkpoint: Checkpoint,
    pub model: Arc<dyn Scorer>,
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("window_end", &self.checkpoint.window_end)
            .field("scorer", &self.checkpoint.scorer)
            .finish()
    }
}

pub struct IncrementalTrainer {
    factory: Arc<dyn ScorerFactory>,
    passes: usize,
}

impl IncrementalTrainer {
    pub fn new(factory: Arc<dyn ScorerFactory>, passes: usize) -> Self {
        Self {
            factory,
            passes: passes.max(1),
        }
    }

    /// Train one window on top of `previous`
    ///
    /// Examples are stably sorted by timestamp before learning. On error no
    /// checkpoint is produced and the caller keeps `previous`. Scorer
    /// failures come back as `Training` or `Checkpoint` errors.
    pub fn train_window(
        &self,
        previous: Option<&Checkpoint>,
        window_end: NaiveDate,
        mut examples: Vec<LabeledExample>,
    ) -> Result<TrainedModel> {
        let mut scorer = self.factory.create();
        if let Some(checkpoint) = previous {
            if checkpoint.window_end >= window_end {
                return Err(RecwalkError::InvalidOperation(format!(
                    "checkpoint {} is not older than window end {}",
                    checkpoint.window_end, window_end
                )));
            }
            scorer.load(checkpoint).map_err(as_checkpoint_error)?;
        }

        examples.sort_by_key(LabeledExample::timestamp);
        for pass in 0..self.passes {
            debug!(
                "Window {}: pass {}/{} over {} examples",
                window_end,
                pass + 1,
                self.passes,
                examples.len()
            );
            scorer.learn(&examples).map_err(as_training_error)?;
        }

        let checkpoint = Checkpoint {
            window_end,
            parent: previous.map(|c| c.window_end),
            scorer: scorer.kind().to_string(),
            state: scorer.save().map_err(as_training_error)?,
            examples: examples.len() as u64,
            created_at: Utc::now(),
        };

        Ok(TrainedModel {
            checkpoint,
            model: Arc::from(scorer),
        })
    }

    /// Rebuild a frozen model from a stored checkpoint
    pub fn restore(&self, checkpoint: &Checkpoint) -> Result<Arc<dyn Scorer>> {
        let mut scorer = self.factory.create();
        scorer.load(checkpoint).map_err(as_checkpoint_error)?;
        Ok(Arc::from(scorer))
    }
}

// Scorer failures never abort a run: map them into the non-fatal classes
fn as_training_error(err: RecwalkError) -> RecwalkError {
    match err {
        RecwalkError::Training(_) => err,
        other => RecwalkError::Training(other.to_string()),
    }
}

fn as_checkpoint_error(err: RecwalkError) -> RecwalkError {
    match err {
        RecwalkError::Checkpoint(_) => err,
        other => RecwalkError::Checkpoint(other.to_string()),
    }
}
