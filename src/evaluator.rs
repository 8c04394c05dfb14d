//! Hit-rate evaluation
//!
//! A client counts as a hit on a day when any of its top-K recommendations
//! is among the products it bought that day. Daily results are appended to
//! [`RunMetrics`]; the run-level accuracy is pooled over clients, not
//! averaged over days.

use crate::ranker::Recommendation;
use crate::types::{ClientId, EvaluationResult, Event, ProductId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Purchased products per client, from one day of events
pub fn ground_truth(events: &[Event]) -> BTreeMap<ClientId, BTreeSet<ProductId>> {
    let mut purchases: BTreeMap<ClientId, BTreeSet<ProductId>> = BTreeMap::new();
    for event in events {
        purchases
            .entry(event.client_id.clone())
            .or_default()
            .insert(event.product_id.clone());
    }
    purchases
}

/// Binary hit: recommendations intersect the purchased set
pub fn is_hit(recommendations: &[Recommendation], purchased: &BTreeSet<ProductId>) -> bool {
    recommendations
        .iter()
        .any(|r| purchased.contains(&r.product_id))
}

/// Append-only record of daily results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    results: Vec<EvaluationResult>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: EvaluationResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    pub fn total_clients(&self) -> usize {
        self.results.iter().map(|r| r.total_clients).sum()
    }

    pub fn correct_count(&self) -> usize {
        self.results.iter().map(|r| r.correct_count).sum()
    }

    /// Σcorrect / Σtotal, undefined when nobody was evaluated
    pub fn overall_accuracy(&self) -> Option<f64> {
        let total = self.total_clients();
        if total == 0 {
            None
        } else {
            Some(self.correct_count() as f64 / total as f64)
        }
    }

    pub fn into_results(self) -> Vec<EvaluationResult> {
        self.results
    }
}
