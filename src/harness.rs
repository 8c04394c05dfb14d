//! Walk-forward harness
//!
//! Drives the whole simulation: the scheduler emits windows in order, each
//! window's positives are augmented with sampled negatives and fed to the
//! trainer on top of the previous checkpoint, the new checkpoint is
//! persisted, and on stepping windows every client purchasing on the window
//! end day is ranked with the frozen model and scored for a hit.
//!
//! Data gaps, unknown clients, empty candidate sets and training failures are
//! recorded in the [`RunReport`]; configuration problems and store failures
//! abort the run.

use crate::catalog::ProductUniverse;
use crate::checkpoint::CheckpointStore;
use crate::clients::{ClientContext, ClientResolver, ClientSource, ResolverSettings};
use crate::config::HarnessConfig;
use crate::data::{EventStore, ProfileSource};
use crate::error::{RecwalkError, Result};
use crate::evaluator::{ground_truth, is_hit, RunMetrics};
use crate::ranker::{Ranker, Recommendation};
use crate::sampling::NegativeSampler;
use crate::schedule::{Phase, ScheduledWindow, WindowScheduler};
use crate::scorer::{Scorer, ScorerFactory};
use crate::trainer::{IncrementalTrainer, TrainedModel};
use crate::types::{start_of_day, ClientId, EvaluationResult, Product, TimeRange, Window};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened to a scheduled window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Trained {
        examples: usize,
        positives: usize,
        negatives: usize,
        degenerate_clients: usize,
    },
    /// No events in the training range: no checkpoint, no evaluation
    DataGap,
    /// Scorer failed; the previous checkpoint stays current
    TrainingFailed { reason: String },
}

/// Per-window entry of the run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub phase: Phase,
    pub window: Window,
    /// Timestamps the window trained on
    pub training_range: TimeRange,
    pub outcome: StepOutcome,
    /// Whether an evaluation result was recorded for the window end day
    pub evaluated: bool,
}

/// Summary of a walk-forward run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Window end of the checkpoint the run continued from
    pub resumed_from: Option<NaiveDate>,
    pub steps: Vec<StepRecord>,
    pub results: Vec<EvaluationResult>,
    pub total_clients: usize,
    pub correct_count: usize,
    pub overall_accuracy: Option<f64>,
}

impl RunReport {
    pub fn checkpoints_written(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Trained { .. }))
            .count()
    }
}

/// Top-K for a single client on a single day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRecommendations {
    pub client_id: ClientId,
    pub day: NaiveDate,
    /// Window end of the checkpoint used for scoring
    pub checkpoint: NaiveDate,
    pub source: ClientSource,
    pub country: String,
    pub recommendations: Vec<Recommendation>,
}

pub struct WalkForwardHarness {
    config: HarnessConfig,
    events: Arc<dyn EventStore>,
    resolver: ClientResolver,
    universe: ProductUniverse,
    checkpoints: Arc<dyn CheckpointStore>,
    trainer: IncrementalTrainer,
    sampler: NegativeSampler,
    ranker: Ranker,
    /// First and last day with events
    span: Option<(NaiveDate, NaiveDate)>,
}

impl WalkForwardHarness {
    /// Validate the configuration and build the per-run product universe
    pub async fn new(
        config: HarnessConfig,
        events: Arc<dyn EventStore>,
        profiles: Arc<dyn ProfileSource>,
        catalog: Vec<Product>,
        factory: Arc<dyn ScorerFactory>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Result<Self> {
        config.validate()?;

        let span = events
            .span()
            .await?
            .map(|(first, last)| (first.date_naive(), last.date_naive()));

        let volumes = match span {
            Some((first, last)) => {
                let history = events
                    .events_in(TimeRange::from_days(first, last + Duration::days(1)))
                    .await?;
                ProductUniverse::volumes(&history)
            }
            None => Default::default(),
        };
        let universe = ProductUniverse::build(catalog, &volumes, config.top_n_products);

        let resolver = ClientResolver::new(
            events.clone(),
            profiles,
            ResolverSettings {
                defaults: config.client_defaults.clone(),
                default_country: config.default_country.clone(),
                country_attribute: config.country_attribute.clone(),
                stamp_calendar: config.stamp_calendar,
            },
        );

        Ok(Self {
            trainer: IncrementalTrainer::new(factory, config.passes),
            sampler: NegativeSampler::new(config.n_neg),
            ranker: Ranker::new(config.top_k),
            universe,
            config,
            events,
            resolver,
            checkpoints,
            span,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn universe(&self) -> &ProductUniverse {
        &self.universe
    }

    /// Run the full schedule
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut metrics = RunMetrics::new();
        let mut steps = Vec::new();

        let latest = self.checkpoints.read_latest().await?;
        if latest.is_some() && !self.config.resume {
            return Err(RecwalkError::Configuration(
                "checkpoint store is not empty; enable resume or use a fresh store".to_string(),
            ));
        }

        let mut current: Option<TrainedModel> = None;
        let mut resumed_from = None;

        match self.span {
            None => warn!("Event store is empty, nothing to schedule"),
            Some((data_start, data_end)) => {
                info!(
                    "Run {}: data {} to {}, {} products in universe",
                    run_id,
                    data_start,
                    data_end,
                    self.universe.len()
                );

                let mut scheduler = WindowScheduler::new(
                    data_start,
                    data_end,
                    self.config.warmup_days,
                    self.config.cadence_days,
                    self.config.lookback_days,
                );

                if let Some(checkpoint) = latest {
                    info!("Resuming after checkpoint {}", checkpoint.window_end);
                    scheduler.resume_after(checkpoint.window_end);
                    resumed_from = Some(checkpoint.window_end);
                    current = Some(TrainedModel {
                        model: self.trainer.restore(&checkpoint)?,
                        checkpoint,
                    });
                }

                for scheduled in scheduler {
                    let step = self.step(scheduled, &mut current, &mut metrics).await?;
                    steps.push(step);
                }
            }
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            resumed_from,
            steps,
            total_clients: metrics.total_clients(),
            correct_count: metrics.correct_count(),
            overall_accuracy: metrics.overall_accuracy(),
            results: metrics.into_results(),
        };

        info!(
            "Run {} finished: {} windows, {} checkpoints, {}/{} hits (accuracy {})",
            report.run_id,
            report.steps.len(),
            report.checkpoints_written(),
            report.correct_count,
            report.total_clients,
            report
                .overall_accuracy
                .map_or("n/a".to_string(), |a| format!("{:.4}", a))
        );

        Ok(report)
    }

    async fn step(
        &self,
        scheduled: ScheduledWindow,
        current: &mut Option<TrainedModel>,
        metrics: &mut RunMetrics,
    ) -> Result<StepRecord> {
        let ScheduledWindow {
            index,
            phase,
            window,
        } = scheduled;
        let training_range = self.training_range(phase, window);

        let mut positives = self.events.events_in(training_range).await?;
        self.universe.retain_events(&mut positives);

        let outcome = if positives.is_empty() {
            debug!("Window {} {} has no events, skipping", index, window);
            StepOutcome::DataGap
        } else {
            let mut rng = window_rng(self.config.seed, window.end);
            let sampled = self.sampler.sample(&positives, &mut rng);
            let (positives, negatives) = (sampled.positives, sampled.negatives);
            let degenerate_clients = sampled.degenerate_clients.len();
            let examples = sampled.examples.len();

            let previous = current.as_ref().map(|m| &m.checkpoint);
            match self
                .trainer
                .train_window(previous, window.end, sampled.examples)
            {
                Ok(trained) => {
                    self.checkpoints.write(&trained.checkpoint).await?;
                    info!(
                        "Window {} {} ({}): trained on {} positives + {} negatives",
                        index, window, phase, positives, negatives
                    );
                    *current = Some(trained);
                    StepOutcome::Trained {
                        examples,
                        positives,
                        negatives,
                        degenerate_clients,
                    }
                }
                Err(e) if !e.is_fatal() => {
                    warn!(
                        "Window {} {} training failed, keeping checkpoint {:?}: {}",
                        index,
                        window,
                        current.as_ref().map(|m| m.checkpoint.window_end),
                        e
                    );
                    StepOutcome::TrainingFailed {
                        reason: e.to_string(),
                    }
                }
                Err(e) => return Err(e),
            }
        };

        let mut evaluated = false;
        if phase == Phase::Stepping && outcome != StepOutcome::DataGap {
            match current.as_ref() {
                Some(trained) => {
                    if let Some(result) = self.evaluate_day(window.end, &trained.model).await? {
                        metrics.record(result);
                        evaluated = true;
                    }
                }
                None => debug!("No checkpoint yet, skipping evaluation of {}", window.end),
            }
        }

        Ok(StepRecord {
            index,
            phase,
            window,
            training_range,
            outcome,
            evaluated,
        })
    }

    /// Evaluate every client purchasing on `day`
    ///
    /// Returns `None` when nobody purchased that day.
    pub async fn evaluate_day(
        &self,
        day: NaiveDate,
        model: &Arc<dyn Scorer>,
    ) -> Result<Option<EvaluationResult>> {
        let mut day_events = self.events.events_on(day).await?;
        self.universe.retain_events(&mut day_events);
        if day_events.is_empty() {
            debug!("No purchases on {}, nothing to evaluate", day);
            return Ok(None);
        }

        let purchases = ground_truth(&day_events);
        let horizon = self.scoring_horizon(day);

        let mut skipped = 0;
        let mut defaulted = 0;
        let mut contexts = Vec::with_capacity(purchases.len());
        for client in purchases.keys() {
            let ctx = self.resolver.resolve(client, day, horizon).await?;
            let Some(candidates) = self.universe.candidates(&ctx.country) else {
                debug!("Client {} has no candidates in {}", client, ctx.country);
                skipped += 1;
                continue;
            };
            if ctx.source == ClientSource::Defaulted {
                defaulted += 1;
            }
            contexts.push((ctx, candidates));
        }

        let mut correct = 0;
        let total = contexts.len();
        for (client, recommendations) in self.rank_all(contexts, model).await? {
            if purchases
                .get(&client)
                .is_some_and(|bought| is_hit(&recommendations, bought))
            {
                correct += 1;
            }
        }

        let mut result = EvaluationResult::new(day, total, correct);
        result.skipped_clients = skipped;
        result.defaulted_clients = defaulted;

        info!(
            "Evaluated {}: {}/{} hits, {} skipped, {} defaulted",
            day, correct, total, skipped, defaulted
        );
        Ok(Some(result))
    }

    /// Rank clients concurrently on a bounded pool of blocking tasks
    async fn rank_all(
        &self,
        contexts: Vec<(ClientContext, Arc<[Product]>)>,
        model: &Arc<dyn Scorer>,
    ) -> Result<Vec<(ClientId, Vec<Recommendation>)>> {
        let semaphore = Arc::new(Semaphore::new(self.config.scoring_workers));
        let mut tasks = JoinSet::new();

        for (ctx, candidates) in contexts {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| RecwalkError::Other(format!("scoring pool closed: {}", e)))?;
            let model = Arc::clone(model);
            let ranker = self.ranker;

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let recommendations = ranker.rank(model.as_ref(), &ctx.features, &candidates);
                (ctx.client_id, recommendations)
            });
        }

        let mut ranked = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let entry =
                joined.map_err(|e| RecwalkError::Other(format!("ranking task failed: {}", e)))?;
            ranked.push(entry);
        }
        ranked.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ranked)
    }

    /// Rank the top-K for one client on `day`
    ///
    /// Uses the latest stored checkpoint whose window end is not after `day`.
    pub async fn recommend(
        &self,
        client: &ClientId,
        day: NaiveDate,
    ) -> Result<ClientRecommendations> {
        let checkpoint = self
            .checkpoints
            .read_at_or_before(day)
            .await?
            .ok_or_else(|| RecwalkError::NotFound(format!("no checkpoint on or before {}", day)))?;
        let model = self.trainer.restore(&checkpoint)?;

        let ctx = self
            .resolver
            .resolve(client, day, self.scoring_horizon(day))
            .await?;
        let recommendations = match self.universe.candidates(&ctx.country) {
            Some(candidates) => self.ranker.rank(model.as_ref(), &ctx.features, &candidates),
            None => Vec::new(),
        };

        Ok(ClientRecommendations {
            client_id: ctx.client_id,
            day,
            checkpoint: checkpoint.window_end,
            source: ctx.source,
            country: ctx.country,
            recommendations,
        })
    }

    fn training_range(&self, phase: Phase, window: Window) -> TimeRange {
        match phase {
            Phase::Warmup => window.training_range(false),
            Phase::Stepping => window.training_range(self.config.evaluate_with_overlap),
        }
    }

    /// Client snapshots for scoring `day` come from events strictly before
    /// this instant
    fn scoring_horizon(&self, day: NaiveDate) -> DateTime<Utc> {
        if self.config.evaluate_with_overlap {
            start_of_day(day + Duration::days(1))
        } else {
            start_of_day(day)
        }
    }
}

/// Deterministic per-window random source
pub fn window_rng(seed: u64, window_end: NaiveDate) -> StdRng {
    let day = window_end.num_days_from_ce() as u64;
    StdRng::seed_from_u64(seed ^ day.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::data::{InMemoryEventStore, NoProfiles};
    use crate::scorer::ScorerConfig;
    use crate::types::{Event, FeatureSnapshot, ProductId};
    use rand::Rng;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
    }

    fn event(client: &str, product: &str, d: i64) -> Event {
        Event::new(
            ClientId::new(client),
            ProductId::new(product),
            start_of_day(day(d)) + Duration::hours(10),
            FeatureSnapshot::new().with("country", "FRA"),
            FeatureSnapshot::new(),
        )
    }

    fn catalog() -> Vec<Product> {
        ["a", "b", "c"]
            .iter()
            .map(|id| {
                Product::new(
                    ProductId::new(*id),
                    FeatureSnapshot::new(),
                    vec!["FRA".to_string()],
                )
            })
            .collect()
    }

    fn config() -> HarnessConfig {
        HarnessConfig {
            warmup_days: 5,
            cadence_days: 2,
            lookback_days: 10,
            n_neg: 1,
            top_k: 1,
            passes: 1,
            scorer: ScorerConfig::Popularity { decay: 1.0 },
            ..Default::default()
        }
    }

    async fn harness(events: Vec<Event>, config: HarnessConfig) -> WalkForwardHarness {
        WalkForwardHarness::new(
            config.clone(),
            Arc::new(InMemoryEventStore::new(events)),
            Arc::new(NoProfiles),
            catalog(),
            Arc::new(config.scorer.clone()),
            Arc::new(MemoryCheckpointStore::new()),
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_window_rng_is_deterministic() {
        let a: u64 = window_rng(42, day(30)).gen();
        let b: u64 = window_rng(42, day(30)).gen();
        let c: u64 = window_rng(42, day(37)).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_popular_product_hits() {
        let mut events = Vec::new();
        for d in 0..5 {
            events.push(event("c1", "a", d));
            events.push(event("c2", "a", d));
        }
        events.push(event("c3", "b", 1));
        events.push(event("c3", "b", 5));
        events.push(event("c1", "a", 7));
        events.push(event("c2", "c", 7));

        let report = harness(events, config()).await.run().await.unwrap();

        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].day, day(7));
        assert_eq!(report.results[0].total_clients, 2);
        assert_eq!(report.results[0].correct_count, 1);
        assert_eq!(report.overall_accuracy, Some(0.5));
    }

    #[tokio::test]
    async fn test_empty_event_store_reports_nothing() {
        let report = harness(Vec::new(), config()).await.run().await.unwrap();
        assert!(report.steps.is_empty());
        assert_eq!(report.overall_accuracy, None);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_run() {
        let bad = HarnessConfig {
            cadence_days: 0,
            ..config()
        };
        let result = WalkForwardHarness::new(
            bad.clone(),
            Arc::new(InMemoryEventStore::new(Vec::new())),
            Arc::new(NoProfiles),
            catalog(),
            Arc::new(bad.scorer.clone()),
            Arc::new(MemoryCheckpointStore::new()),
        )
        .await;
        assert!(matches!(result, Err(RecwalkError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_recommend_uses_latest_checkpoint() {
        let mut events = Vec::new();
        for d in 0..5 {
            events.push(event("c1", "b", d));
        }
        events.push(event("c1", "b", 7));
        let harness = harness(events, config()).await;
        harness.run().await.unwrap();

        // window [5, 7) is a data gap, so the warm-up checkpoint stays current
        let recs = harness.recommend(&ClientId::new("c1"), day(8)).await.unwrap();
        assert_eq!(recs.checkpoint, day(5));
        assert_eq!(recs.recommendations[0].product_id.as_str(), "b");

        let missing = harness.recommend(&ClientId::new("c1"), day(2)).await;
        assert!(matches!(missing, Err(RecwalkError::NotFound(_))));
    }
}
