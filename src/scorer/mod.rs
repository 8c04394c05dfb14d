//! Pluggable scoring capability.
//!
//! The harness never knows which learning algorithm it drives. Anything that
//! can restore itself from a checkpoint, learn from time-ordered labelled
//! examples, serialize its state and score a (client, product) pair can be
//! plugged in through a [`ScorerFactory`].
//!
//! # Contract
//!
//! - `load` replaces the scorer's state with a checkpoint's state; it must
//!   reject checkpoints produced by a different scorer kind.
//! - `learn` receives examples sorted by timestamp ascending. Online scorers
//!   rely on this order.
//! - `save` must capture everything `predict` depends on.
//! - `predict` is read-only; once trained, a scorer is frozen behind an `Arc`
//!   and shared by concurrent ranking tasks.
//!
//! Two reference scorers ship with the crate: [`PopularityScorer`] (a
//! non-personalized baseline) and [`LogisticScorer`] (online logistic
//! regression over hashed features).

pub mod logistic;
pub mod popularity;

pub use logistic::LogisticScorer;
pub use popularity::PopularityScorer;

use crate::error::{RecwalkError, Result};
use crate::types::{Checkpoint, FeatureSnapshot, LabeledExample};
use serde::{Deserialize, Serialize};

/// Scoring capability plugged into the harness
pub trait Scorer: Send + Sync {
    /// Stable scorer kind, recorded in every checkpoint
    fn kind(&self) -> &str;

    /// Restore state from a checkpoint
    fn load(&mut self, checkpoint: &Checkpoint) -> Result<()>;

    /// Learn from examples ordered by timestamp
    fn learn(&mut self, examples: &[LabeledExample]) -> Result<()>;

    /// Serialize the current state
    fn save(&self) -> Result<Vec<u8>>;

    /// Score a client/product pair; higher is better
    fn predict(&self, client: &FeatureSnapshot, product: &FeatureSnapshot) -> f64;
}

/// Creates fresh, untrained scorers
pub trait ScorerFactory: Send + Sync {
    fn create(&self) -> Box<dyn Scorer>;
}

impl<F> ScorerFactory for F
where
    F: Fn() -> Box<dyn Scorer> + Send + Sync,
{
    fn create(&self) -> Box<dyn Scorer> {
        self()
    }
}

/// Reject a checkpoint written by another scorer kind
pub(crate) fn ensure_kind(expected: &str, checkpoint: &Checkpoint) -> Result<()> {
    if checkpoint.scorer != expected {
        return Err(RecwalkError::Checkpoint(format!(
            "checkpoint {} was produced by '{}', cannot load into '{}'",
            checkpoint.window_end, checkpoint.scorer, expected
        )));
    }
    Ok(())
}

/// Scorer selection as found in the harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScorerConfig {
    /// Per-product purchase counts
    Popularity {
        /// Multiplier applied to every count before each learn call
        #[serde(default = "default_decay")]
        decay: f64,
    },

    /// Online logistic regression over hashed features
    Logistic {
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        /// Hash space is 2^bits weights
        #[serde(default = "default_bits")]
        bits: u8,
        #[serde(default)]
        l2: f64,
    },
}

fn default_decay() -> f64 {
    1.0
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_bits() -> u8 {
    16
}

impl Default for ScorerConfig {
    fn default() -> Self {
        ScorerConfig::Logistic {
            learning_rate: default_learning_rate(),
            bits: default_bits(),
            l2: 0.0,
        }
    }
}

impl ScorerConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            ScorerConfig::Popularity { decay } => {
                if !(*decay > 0.0 && *decay <= 1.0) {
                    return Err(RecwalkError::Configuration(format!(
                        "popularity decay must be in (0, 1], got {}",
                        decay
                    )));
                }
            }
            ScorerConfig::Logistic {
                learning_rate,
                bits,
                l2,
            } => {
                if !(*learning_rate > 0.0 && learning_rate.is_finite()) {
                    return Err(RecwalkError::Configuration(format!(
                        "learning_rate must be positive, got {}",
                        learning_rate
                    )));
                }
                if !(4..=28).contains(bits) {
                    return Err(RecwalkError::Configuration(format!(
                        "bits must be between 4 and 28, got {}",
                        bits
                    )));
                }
                if *l2 < 0.0 {
                    return Err(RecwalkError::Configuration(format!(
                        "l2 must be non-negative, got {}",
                        l2
                    )));
                }
            }
        }
        Ok(())
    }
}

impl ScorerFactory for ScorerConfig {
    fn create(&self) -> Box<dyn Scorer> {
        match self {
            ScorerConfig::Popularity { decay } => Box::new(PopularityScorer::new(*decay)),
            ScorerConfig::Logistic {
                learning_rate,
                bits,
                l2,
            } => Box::new(LogisticScorer::new(*bits, *learning_rate, *l2)),
        }
    }
}
