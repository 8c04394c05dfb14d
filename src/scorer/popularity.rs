//! Non-personalized popularity baseline.
//!
//! Counts positive examples per product. With a decay below 1.0 every
//! learn call first shrinks the existing counts, so recent windows weigh
//! more than old ones.

use super::{ensure_kind, Scorer};
use crate::error::Result;
use crate::types::{Checkpoint, FeatureSnapshot, LabeledExample, Label, PRODUCT_ID_KEY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PopularityState {
    counts: BTreeMap<String, f64>,
}

/// Popularity scorer
#[derive(Debug, Clone)]
pub struct PopularityScorer {
    decay: f64,
    state: PopularityState,
}

impl PopularityScorer {
    pub const KIND: &'static str = "popularity";

    pub fn new(decay: f64) -> Self {
        Self {
            decay,
            state: PopularityState::default(),
        }
    }

    /// Current count for a product
    pub fn count(&self, product_id: &str) -> f64 {
        self.state.counts.get(product_id).copied().unwrap_or(0.0)
    }
}

impl Scorer for PopularityScorer {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn load(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        ensure_kind(Self::KIND, checkpoint)?;
        self.state = bincode::deserialize(&checkpoint.state)?;
        Ok(())
    }

    fn learn(&mut self, examples: &[LabeledExample]) -> Result<()> {
        if self.decay < 1.0 {
            for count in self.state.counts.values_mut() {
                *count *= self.decay;
            }
        }

        for example in examples.iter().filter(|e| e.label == Label::Positive) {
            *self
                .state
                .counts
                .entry(example.event.product_id.0.clone())
                .or_insert(0.0) += 1.0;
        }
        Ok(())
    }

    fn save(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.state)?)
    }

    fn predict(&self, _client: &FeatureSnapshot, product: &FeatureSnapshot) -> f64 {
        product
            .text(PRODUCT_ID_KEY)
            .map(|id| self.count(id))
            .unwrap_or(0.0)
    }
}
