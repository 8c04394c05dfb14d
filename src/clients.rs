//! Client context resolution for scoring time
//!
//! Finds the feature snapshot a client is ranked with on a given day. The
//! most recent event before the scoring horizon wins, then the profile
//! source, then an empty snapshot; missing attributes are always filled from
//! the default table.

use crate::data::{EventStore, ProfileSource};
use crate::error::Result;
use crate::types::{ClientId, FeatureSnapshot, CLIENT_ID_KEY};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where a client's snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientSource {
    History,
    Profile,
    Defaulted,
}

/// A client ready to be ranked
#[derive(Debug, Clone, PartialEq)]
pub struct ClientContext {
    pub client_id: ClientId,
    pub features: FeatureSnapshot,
    pub country: String,
    pub source: ClientSource,
}

/// Resolution settings taken from the harness configuration
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub defaults: FeatureSnapshot,
    pub default_country: String,
    pub country_attribute: String,
    pub stamp_calendar: bool,
}

pub struct ClientResolver {
    events: Arc<dyn EventStore>,
    profiles: Arc<dyn ProfileSource>,
    settings: ResolverSettings,
}

impl ClientResolver {
    pub fn new(
        events: Arc<dyn EventStore>,
        profiles: Arc<dyn ProfileSource>,
        settings: ResolverSettings,
    ) -> Self {
        Self {
            events,
            profiles,
            settings,
        }
    }

    /// Resolve `client` for scoring on `day`
    ///
    /// Only events strictly before `horizon` are considered.
    pub async fn resolve(
        &self,
        client: &ClientId,
        day: NaiveDate,
        horizon: DateTime<Utc>,
    ) -> Result<ClientContext> {
        let (mut features, source) =
            match self.events.latest_for_client(client, horizon).await? {
                Some(event) => (event.client_features, ClientSource::History),
                None => match self.profiles.profile(client).await? {
                    Some(profile) => (profile, ClientSource::Profile),
                    None => (FeatureSnapshot::new(), ClientSource::Defaulted),
                },
            };

        features.insert(CLIENT_ID_KEY, client.as_str());
        features.fill_missing(&self.settings.defaults);
        if self.settings.stamp_calendar {
            stamp_calendar(&mut features, day);
        }

        let country = features
            .text(&self.settings.country_attribute)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(self.settings.default_country.as_str())
            .to_string();

        Ok(ClientContext {
            client_id: client.clone(),
            features,
            country,
            source,
        })
    }
}

/// Overwrite the calendar attributes with those of `day`
///
/// Values are categorical: weekday counts from Monday = 0.
pub fn stamp_calendar(features: &mut FeatureSnapshot, day: NaiveDate) {
    features.insert("weekday", day.weekday().num_days_from_monday().to_string());
    features.insert("month", day.month().to_string());
    features.insert("quarter", ((day.month() - 1) / 3 + 1).to_string());
}
