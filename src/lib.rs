//! recwalk - Walk-Forward Recommender Harness
//!
//! Retrains an implicit-feedback product recommender on a sliding temporal
//! window and evaluates it day by day as if it were running in production:
//! - Warm-up window followed by windows advancing at a fixed cadence
//! - Negative sampling of unpurchased products per client and window
//! - Checkpoint chain carrying model state from one window to the next
//! - Country-scoped candidates ranked with the frozen model of the day
//! - Top-K hit rate per day and pooled over the run
//!
//! # Architecture
//!
//! The crate is organized into several layers:
//! - **Types**: Core data structures (Event, Window, Checkpoint, etc.)
//! - **Data**: Read-only event store and client profile sources
//! - **Scorer**: Pluggable learning algorithms behind the `Scorer` trait
//! - **Checkpoint**: Persistence of the checkpoint chain
//! - **Harness**: Scheduling, training, ranking and evaluation
//!
//! # Example
//!
//! ```ignore
//! use recwalk_core::{
//!     HarnessConfig, InMemoryEventStore, MemoryCheckpointStore, NoProfiles, WalkForwardHarness,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = HarnessConfig::from_file("recwalk.toml".as_ref())?;
//!     let events = recwalk_core::data::files::load_events("events.jsonl".as_ref())?;
//!     let catalog = recwalk_core::data::files::load_products("products.jsonl".as_ref())?;
//!
//!     let harness = WalkForwardHarness::new(
//!         config.clone(),
//!         Arc::new(InMemoryEventStore::new(events)),
//!         Arc::new(NoProfiles),
//!         catalog,
//!         Arc::new(config.scorer.clone()),
//!         Arc::new(MemoryCheckpointStore::new()),
//!     )
//!     .await?;
//!
//!     let report = harness.run().await?;
//!     println!("accuracy: {:?}", report.overall_accuracy);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod checkpoint;
pub mod clients;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod harness;
pub mod ranker;
pub mod sampling;
pub mod schedule;
pub mod scorer;
pub mod trainer;
pub mod types;

// Re-export commonly used types
pub use catalog::ProductUniverse;
pub use checkpoint::{CheckpointStore, FsCheckpointStore, MemoryCheckpointStore};
pub use clients::{ClientContext, ClientResolver, ClientSource};
pub use config::HarnessConfig;
pub use data::{EventStore, InMemoryEventStore, InMemoryProfiles, NoProfiles, ProfileSource};
pub use error::{RecwalkError, Result};
pub use evaluator::RunMetrics;
pub use harness::{ClientRecommendations, RunReport, StepOutcome, StepRecord, WalkForwardHarness};
pub use ranker::{Ranker, Recommendation};
pub use sampling::{NegativeSampler, SampledWindow};
pub use schedule::{Phase, ScheduledWindow, WindowScheduler};
pub use scorer::{LogisticScorer, PopularityScorer, Scorer, ScorerConfig, ScorerFactory};
pub use trainer::{IncrementalTrainer, TrainedModel};
pub use types::{
    Checkpoint, ClientId, EvaluationResult, Event, FeatureSnapshot, FeatureValue, Label,
    LabeledExample, Product, ProductId, TimeRange, Window,
};
