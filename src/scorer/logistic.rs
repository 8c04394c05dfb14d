//! Online logistic regression over hashed features.
//!
//! Each snapshot attribute becomes one hashed feature (categorical values
//! are one-hot, numeric values are log-squashed) and every pair of
//! categorical client/product attributes becomes a crossed feature, so the
//! model can learn client × product affinities such as
//! `client_id=42 ∧ category=running`.
//!
//! # Learning Algorithm
//!
//! Plain SGD on the log loss, one example at a time, in arrival order:
//! 1. Predict `p = σ(b + w·x)`
//! 2. Compute the error `p − y`
//! 3. Update each touched weight proportionally to the error and its
//!    feature value, with optional L2 shrinkage
//!
//! Weights live in a `2^bits` table indexed by FNV-1a hashes, which keeps
//! checkpoints a fixed size whatever the catalog cardinality.

use super::{ensure_kind, Scorer};
use crate::error::{RecwalkError, Result};
use crate::types::{Checkpoint, FeatureSnapshot, FeatureValue, LabeledExample};
use serde::{Deserialize, Serialize};
use tracing::debug;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over a sequence of byte fragments
#[derive(Debug, Clone, Copy)]
struct FeatureHasher(u64);

impl FeatureHasher {
    fn new() -> Self {
        Self(FNV_OFFSET)
    }

    fn update(&mut self, bytes: &[u8]) -> &mut Self {
        for b in bytes {
            self.0 = (self.0 ^ u64::from(*b)).wrapping_mul(FNV_PRIME);
        }
        // fragment separator
        self.0 = (self.0 ^ 0xff).wrapping_mul(FNV_PRIME);
        self
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogisticState {
    bits: u8,
    bias: f32,
    weights: Vec<f32>,
    updates: u64,
}

/// Hashed logistic regression scorer
#[derive(Debug, Clone)]
pub struct LogisticScorer {
    learning_rate: f32,
    l2: f32,
    state: LogisticState,
}

impl LogisticScorer {
    pub const KIND: &'static str = "logistic";

    pub fn new(bits: u8, learning_rate: f64, l2: f64) -> Self {
        Self {
            learning_rate: learning_rate as f32,
            l2: l2 as f32,
            state: LogisticState {
                bits,
                bias: 0.0,
                weights: vec![0.0; 1usize << bits],
                updates: 0,
            },
        }
    }

    /// Number of SGD updates applied so far
    pub fn updates(&self) -> u64 {
        self.state.updates
    }

    fn mask(&self) -> u64 {
        (1u64 << self.state.bits) - 1
    }

    fn features(&self, client: &FeatureSnapshot, product: &FeatureSnapshot) -> Vec<(usize, f32)> {
        let mask = self.mask();
        let mut out = Vec::with_capacity(client.len() + product.len() + client.len() * 4);

        let mut client_cats = Vec::new();
        let mut product_cats = Vec::new();
        encode_side(b"c", client, mask, &mut out, &mut client_cats);
        encode_side(b"p", product, mask, &mut out, &mut product_cats);

        for (ck, cv) in &client_cats {
            for (pk, pv) in &product_cats {
                let idx = FeatureHasher::new()
                    .update(b"x")
                    .update(ck.as_bytes())
                    .update(cv.as_bytes())
                    .update(pk.as_bytes())
                    .update(pv.as_bytes())
                    .finish()
                    & mask;
                out.push((idx as usize, 1.0));
            }
        }
        out
    }

    fn margin(&self, features: &[(usize, f32)]) -> f32 {
        features
            .iter()
            .fold(self.state.bias, |acc, (idx, value)| {
                acc + self.state.weights[*idx] * value
            })
    }
}

fn encode_side(
    side: &[u8],
    snapshot: &FeatureSnapshot,
    mask: u64,
    out: &mut Vec<(usize, f32)>,
    categorical: &mut Vec<(String, String)>,
) {
    for (key, value) in snapshot.iter() {
        let mut hasher = FeatureHasher::new();
        hasher.update(side).update(key.as_bytes());
        match value {
            FeatureValue::Number(n) => {
                if !n.is_finite() {
                    continue;
                }
                let squashed = (n.signum() * n.abs().ln_1p()) as f32;
                out.push(((hasher.finish() & mask) as usize, squashed));
            }
            other => {
                let text = other.to_string();
                hasher.update(text.as_bytes());
                out.push(((hasher.finish() & mask) as usize, 1.0));
                categorical.push((key.clone(), text));
            }
        }
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

impl Scorer for LogisticScorer {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn load(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        ensure_kind(Self::KIND, checkpoint)?;
        let state: LogisticState = bincode::deserialize(&checkpoint.state)?;
        if state.bits != self.state.bits || state.weights.len() != 1usize << state.bits {
            return Err(RecwalkError::Checkpoint(format!(
                "checkpoint {} uses a 2^{} weight table, scorer is configured for 2^{}",
                checkpoint.window_end, state.bits, self.state.bits
            )));
        }
        self.state = state;
        Ok(())
    }

    fn learn(&mut self, examples: &[LabeledExample]) -> Result<()> {
        let lr = self.learning_rate;
        let l2 = self.l2;

        for example in examples {
            let x = self.features(
                &example.event.client_features,
                &example.event.product_features,
            );
            let p = sigmoid(self.margin(&x));
            let error = p - example.label.as_f64() as f32;

            self.state.bias -= lr * error;
            for (idx, value) in &x {
                let w = &mut self.state.weights[*idx];
                *w -= lr * (error * value + l2 * *w);
            }
            self.state.updates += 1;
        }

        if !self.state.bias.is_finite() {
            return Err(RecwalkError::Training(format!(
                "logistic weights diverged after {} updates",
                self.state.updates
            )));
        }

        debug!(
            "Logistic scorer learned {} examples ({} updates total)",
            examples.len(),
            self.state.updates
        );
        Ok(())
    }

    fn save(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.state)?)
    }

    fn predict(&self, client: &FeatureSnapshot, product: &FeatureSnapshot) -> f64 {
        let x = self.features(client, product);
        f64::from(sigmoid(self.margin(&x)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{start_of_day, ClientId, Event, Label, ProductId};
    use chrono::{NaiveDate, Utc};

    fn client(gender: &str) -> FeatureSnapshot {
        FeatureSnapshot::new()
            .with("gender", gender)
            .with("age", 35.0)
    }

    fn product(category: &str) -> FeatureSnapshot {
        FeatureSnapshot::new().with("category", category)
    }

    fn example(gender: &str, category: &str, label: Label) -> LabeledExample {
        let event = Event {
            client_id: ClientId::new(gender),
            product_id: ProductId::new(category),
            timestamp: start_of_day(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            client_features: client(gender),
            product_features: product(category),
            quantity: 0.0,
            amount: 0.0,
        };
        LabeledExample { event, label }
    }

    fn training_set() -> Vec<LabeledExample> {
        vec![
            example("F", "dress", Label::Positive),
            example("F", "boots", Label::Negative),
            example("M", "boots", Label::Positive),
            example("M", "dress", Label::Negative),
        ]
    }

    #[test]
    fn test_learns_client_product_affinity() {
        let mut scorer = LogisticScorer::new(12, 0.1, 0.0);
        for _ in 0..50 {
            scorer.learn(&training_set()).unwrap();
        }

        assert!(
            scorer.predict(&client("F"), &product("dress"))
                > scorer.predict(&client("F"), &product("boots"))
        );
        assert!(
            scorer.predict(&client("M"), &product("boots"))
                > scorer.predict(&client("M"), &product("dress"))
        );
        assert_eq!(scorer.updates(), 200);
    }

    #[test]
    fn test_divergence_is_training_error() {
        // Beyond f32 range: the first update sends the bias to infinity
        let mut scorer = LogisticScorer::new(8, 1e39, 0.0);
        let result = scorer.learn(&training_set());
        assert!(matches!(result, Err(RecwalkError::Training(_))));
    }

    #[test]
    fn test_untrained_scorer_is_indifferent() {
        let scorer = LogisticScorer::new(8, 0.1, 0.0);
        let score = scorer.predict(&client("F"), &product("dress"));
        assert!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_checkpoint_roundtrip_preserves_predictions() {
        let mut scorer = LogisticScorer::new(10, 0.1, 0.001);
        scorer.learn(&training_set()).unwrap();

        let checkpoint = Checkpoint {
            window_end: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            parent: None,
            scorer: LogisticScorer::KIND.to_string(),
            state: scorer.save().unwrap(),
            examples: 4,
            created_at: Utc::now(),
        };

        let mut restored = LogisticScorer::new(10, 0.1, 0.001);
        restored.load(&checkpoint).unwrap();

        let a = scorer.predict(&client("F"), &product("dress"));
        let b = restored.predict(&client("F"), &product("dress"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_mismatched_hash_space() {
        let scorer = LogisticScorer::new(10, 0.1, 0.0);
        let checkpoint = Checkpoint {
            window_end: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            parent: None,
            scorer: LogisticScorer::KIND.to_string(),
            state: scorer.save().unwrap(),
            examples: 0,
            created_at: Utc::now(),
        };

        let mut other = LogisticScorer::new(12, 0.1, 0.0);
        assert!(matches!(
            other.load(&checkpoint),
            Err(RecwalkError::Checkpoint(_))
        ));
    }

    #[test]
    fn test_hash_is_stable() {
        let a = FeatureHasher::new().update(b"c").update(b"gender").finish();
        let b = FeatureHasher::new().update(b"c").update(b"gender").finish();
        let c = FeatureHasher::new().update(b"cg").update(b"ender").finish();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
