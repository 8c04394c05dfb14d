//! Read-only data sources consumed by the harness
//!
//! The event history and the client profile table are external
//! collaborators. The harness only ever queries them through the traits
//! below; [`memory`] provides the in-process implementation used by the CLI
//! and the tests, and [`files`] loads it from JSON Lines.

pub mod files;
pub mod memory;

pub use memory::{InMemoryEventStore, InMemoryProfiles, NoProfiles};

use crate::error::Result;
use crate::types::{ClientId, Event, FeatureSnapshot, TimeRange};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Ordered, read-only interaction history
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Timestamps of the first and last event, if any
    async fn span(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>>;

    /// Events with `range.start <= timestamp < range.end`, oldest first
    async fn events_in(&self, range: TimeRange) -> Result<Vec<Event>>;

    /// Events of one calendar day, oldest first
    async fn events_on(&self, day: NaiveDate) -> Result<Vec<Event>> {
        self.events_in(TimeRange::day(day)).await
    }

    /// Most recent event of `client` strictly before `before`
    async fn latest_for_client(
        &self,
        client: &ClientId,
        before: DateTime<Utc>,
    ) -> Result<Option<Event>>;
}

/// Fallback source for clients without history
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn profile(&self, client: &ClientId) -> Result<Option<FeatureSnapshot>>;
}
