//! Negative sampling for implicit feedback
//!
//! Every observed purchase in a window is a positive example. For each client
//! with at least one positive, `n_neg` synthetic negatives are drawn from the
//! products seen in the window that the client did not buy. A negative is the
//! client's most recent event with the product swapped out and its quantity
//! and amount zeroed.

use crate::types::{ClientId, Event, FeatureSnapshot, LabeledExample, ProductId, PRODUCT_ID_KEY};
use rand::seq::index;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Labelled examples produced for one window
#[derive(Debug, Clone, Default)]
pub struct SampledWindow {
    /// Positives followed by each client's negatives, in input order
    pub examples: Vec<LabeledExample>,
    pub positives: usize,
    pub negatives: usize,
    /// Clients that bought every product in the window; their negatives were
    /// drawn from the whole product set
    pub degenerate_clients: Vec<ClientId>,
}

#[derive(Debug, Clone, Copy)]
pub struct NegativeSampler {
    n_neg: usize,
}

impl NegativeSampler {
    pub fn new(n_neg: usize) -> Self {
        Self { n_neg }
    }

    /// Label `positives` and augment them with sampled negatives
    ///
    /// Deterministic for a given input order and random source.
    pub fn sample<R: Rng + ?Sized>(&self, positives: &[Event], rng: &mut R) -> SampledWindow {
        // Latest event per product, keyed by product for a stable draw order
        let mut products: BTreeMap<&ProductId, &Event> = BTreeMap::new();
        // Per client: purchased set and latest event
        let mut clients: BTreeMap<&ClientId, (BTreeSet<&ProductId>, &Event)> = BTreeMap::new();

        for event in positives {
            let latest = products.entry(&event.product_id).or_insert(event);
            if event.timestamp >= latest.timestamp {
                *latest = event;
            }
            let entry = clients
                .entry(&event.client_id)
                .or_insert_with(|| (BTreeSet::new(), event));
            entry.0.insert(&event.product_id);
            if event.timestamp >= entry.1.timestamp {
                entry.1 = event;
            }
        }

        let mut window = SampledWindow {
            examples: positives.iter().cloned().map(LabeledExample::positive).collect(),
            positives: positives.len(),
            ..Default::default()
        };

        if self.n_neg == 0 {
            return window;
        }

        let universe: Vec<(&ProductId, &FeatureSnapshot)> =
            products.iter().map(|(id, e)| (*id, &e.product_features)).collect();

        for (client, (purchased, latest)) in &clients {
            let mut pool: Vec<(&ProductId, &FeatureSnapshot)> = universe
                .iter()
                .filter(|(id, _)| !purchased.contains(id))
                .copied()
                .collect();

            if pool.is_empty() {
                warn!(
                    "Client {} bought every product in the window, sampling negatives from the full set",
                    client
                );
                window.degenerate_clients.push((*client).clone());
                pool = universe.clone();
            }

            for (product_id, features) in draw(&pool, self.n_neg, rng) {
                window
                    .examples
                    .push(LabeledExample::negative(negative_from(latest, product_id, features)));
                window.negatives += 1;
            }
        }

        window
    }
}

/// Uniform draw of `n` items: without replacement when the pool is large
/// enough, with replacement otherwise
fn draw<T: Copy, R: Rng + ?Sized>(pool: &[T], n: usize, rng: &mut R) -> Vec<T> {
    if pool.len() >= n {
        index::sample(rng, pool.len(), n)
            .into_iter()
            .map(|i| pool[i])
            .collect()
    } else {
        (0..n).map(|_| pool[rng.gen_range(0..pool.len())]).collect()
    }
}

fn negative_from(latest: &Event, product_id: &ProductId, features: &FeatureSnapshot) -> Event {
    let mut event = latest.clone();
    event.product_id = product_id.clone();
    event.product_features = features.clone();
    event
        .product_features
        .insert(PRODUCT_ID_KEY, product_id.as_str());
    event.quantity = 0.0;
    event.amount = 0.0;
    event
}
