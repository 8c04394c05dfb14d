//! Common test utilities and helpers
#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use recwalk_core::{
    types::start_of_day, Checkpoint, CheckpointStore, ClientId, Event, FeatureSnapshot,
    HarnessConfig, InMemoryEventStore, LabeledExample, PopularityScorer, Product, ProductId,
    ProfileSource, RecwalkError, Result, Scorer, ScorerConfig, ScorerFactory, WalkForwardHarness,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Day `n` of the simulated calendar
pub fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
}

/// Offset of `d` from day 0
pub fn offset(d: NaiveDate) -> i64 {
    (d - day(0)).num_days()
}

/// A purchase at 10:00 on day `d` by a client living in `country`
pub fn purchase(client: &str, product: &str, d: i64, country: &str) -> Event {
    Event::new(
        ClientId::new(client),
        ProductId::new(product),
        start_of_day(day(d)) + Duration::hours(10),
        FeatureSnapshot::new()
            .with("country", country)
            .with("segment", "A"),
        FeatureSnapshot::new().with("family", format!("fam-{}", product)),
    )
}

/// Every product sold in every listed country
pub fn catalog(ids: &[&str], countries: &[&str]) -> Vec<Product> {
    ids.iter()
        .map(|id| {
            Product::new(
                ProductId::new(*id),
                FeatureSnapshot::new(),
                countries.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect()
}

/// Two clients buying every day in `days`; `c1` favours `a`, `c2` favours `b`
pub fn daily_history(days: impl IntoIterator<Item = i64>) -> Vec<Event> {
    let mut events = Vec::new();
    for d in days {
        events.push(purchase("c1", "a", d, "FRA"));
        events.push(purchase("c2", "b", d, "FRA"));
        if d % 3 == 0 {
            events.push(purchase("c1", "c", d, "FRA"));
        }
    }
    events
}

/// Small schedule: warm-up 30, cadence 7, lookback 90
pub fn test_config() -> HarnessConfig {
    HarnessConfig {
        n_neg: 2,
        top_k: 2,
        scoring_workers: 2,
        passes: 1,
        scorer: ScorerConfig::Popularity { decay: 1.0 },
        ..Default::default()
    }
}

pub async fn build_harness(
    events: Vec<Event>,
    config: HarnessConfig,
    factory: Arc<dyn ScorerFactory>,
    profiles: Arc<dyn ProfileSource>,
    store: Arc<dyn CheckpointStore>,
) -> WalkForwardHarness {
    WalkForwardHarness::new(
        config,
        Arc::new(InMemoryEventStore::new(events)),
        profiles,
        catalog(&["a", "b", "c", "d"], &["FRA"]),
        factory,
        store,
    )
    .await
    .expect("Failed to build harness")
}

/// Batches handed to `learn`, in call order
pub type LearnLog = Arc<Mutex<Vec<Vec<LabeledExample>>>>;

/// Popularity scorer that records every learn batch
pub struct RecordingScorer {
    inner: PopularityScorer,
    log: LearnLog,
}

impl Scorer for RecordingScorer {
    fn kind(&self) -> &str {
        self.inner.kind()
    }

    fn load(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.inner.load(checkpoint)
    }

    fn learn(&mut self, examples: &[LabeledExample]) -> Result<()> {
        self.log.lock().unwrap().push(examples.to_vec());
        self.inner.learn(examples)
    }

    fn save(&self) -> Result<Vec<u8>> {
        self.inner.save()
    }

    fn predict(&self, client: &FeatureSnapshot, product: &FeatureSnapshot) -> f64 {
        self.inner.predict(client, product)
    }
}

pub struct RecordingFactory {
    pub log: LearnLog,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ScorerFactory for RecordingFactory {
    fn create(&self) -> Box<dyn Scorer> {
        Box::new(RecordingScorer {
            inner: PopularityScorer::new(1.0),
            log: self.log.clone(),
        })
    }
}

/// Popularity scorer whose `fail_on`-th learn call (0-based, across all
/// scorers of the factory) fails
pub struct FailingFactory {
    calls: Arc<AtomicUsize>,
    fail_on: usize,
}

impl FailingFactory {
    pub fn new(fail_on: usize) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_on,
        }
    }
}

struct FailingScorer {
    inner: PopularityScorer,
    calls: Arc<AtomicUsize>,
    fail_on: usize,
}

impl Scorer for FailingScorer {
    fn kind(&self) -> &str {
        self.inner.kind()
    }

    fn load(&mut self, checkpoint: &Checkpoint) -> Result<()> {
        self.inner.load(checkpoint)
    }

    fn learn(&mut self, examples: &[LabeledExample]) -> Result<()> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == self.fail_on {
            return Err(RecwalkError::Training("diverged".to_string()));
        }
        self.inner.learn(examples)
    }

    fn save(&self) -> Result<Vec<u8>> {
        self.inner.save()
    }

    fn predict(&self, client: &FeatureSnapshot, product: &FeatureSnapshot) -> f64 {
        self.inner.predict(client, product)
    }
}

impl ScorerFactory for FailingFactory {
    fn create(&self) -> Box<dyn Scorer> {
        Box::new(FailingScorer {
            inner: PopularityScorer::new(1.0),
            calls: self.calls.clone(),
            fail_on: self.fail_on,
        })
    }
}
