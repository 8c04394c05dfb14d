//! In-memory event store and profile table

use super::{EventStore, ProfileSource};
use crate::error::Result;
use crate::types::{ClientId, Event, FeatureSnapshot, TimeRange};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Event history held in a timestamp-sorted vector
///
/// Events with identical timestamps keep their insertion order.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: Vec<Event>,
    by_client: HashMap<ClientId, Vec<usize>>,
}

impl InMemoryEventStore {
    pub fn new(mut events: Vec<Event>) -> Self {
        events.sort_by_key(|e| e.timestamp);

        let mut by_client: HashMap<ClientId, Vec<usize>> = HashMap::new();
        for (idx, event) in events.iter().enumerate() {
            by_client
                .entry(event.client_id.clone())
                .or_default()
                .push(idx);
        }

        Self { events, by_client }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn lower_bound(&self, ts: DateTime<Utc>) -> usize {
        self.events.partition_point(|e| e.timestamp < ts)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn span(&self) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        Ok(match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => Some((first.timestamp, last.timestamp)),
            _ => None,
        })
    }

    async fn events_in(&self, range: TimeRange) -> Result<Vec<Event>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let from = self.lower_bound(range.start);
        let to = self.lower_bound(range.end);
        Ok(self.events[from..to].to_vec())
    }

    async fn latest_for_client(
        &self,
        client: &ClientId,
        before: DateTime<Utc>,
    ) -> Result<Option<Event>> {
        let Some(indices) = self.by_client.get(client) else {
            return Ok(None);
        };
        let n = indices.partition_point(|&idx| self.events[idx].timestamp < before);
        Ok(n.checked_sub(1).map(|pos| self.events[indices[pos]].clone()))
    }
}

/// Profile table keyed by client
#[derive(Debug, Default)]
pub struct InMemoryProfiles {
    profiles: HashMap<ClientId, FeatureSnapshot>,
}

impl InMemoryProfiles {
    pub fn new(profiles: HashMap<ClientId, FeatureSnapshot>) -> Self {
        Self { profiles }
    }

    pub fn insert(&mut self, client: ClientId, profile: FeatureSnapshot) {
        self.profiles.insert(client, profile);
    }
}

#[async_trait]
impl ProfileSource for InMemoryProfiles {
    async fn profile(&self, client: &ClientId) -> Result<Option<FeatureSnapshot>> {
        Ok(self.profiles.get(client).cloned())
    }
}

/// Profile source that knows nobody
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProfiles;

#[async_trait]
impl ProfileSource for NoProfiles {
    async fn profile(&self, _client: &ClientId) -> Result<Option<FeatureSnapshot>> {
        Ok(None)
    }
}
