//! Core data types for the recwalk harness
//!
//! This module defines the values that flow through a walk-forward run:
//! interaction events and their feature snapshots, harness-assigned labels,
//! windows, checkpoints and per-day evaluation results.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved snapshot key carrying the client identifier
pub const CLIENT_ID_KEY: &str = "client_id";

/// Reserved snapshot key carrying the product identifier
pub const PRODUCT_ID_KEY: &str = "product_id";

/// Identifier for clients
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for products
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single attribute value inside a feature snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl FeatureValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureValue::Flag(b) => write!(f, "{}", b),
            FeatureValue::Number(n) => write!(f, "{}", n),
            FeatureValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

impl From<bool> for FeatureValue {
    fn from(value: bool) -> Self {
        FeatureValue::Flag(value)
    }
}

/// Flat attribute name → value mapping
///
/// Ordered so that iteration (and therefore feature hashing and
/// serialization) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSnapshot(pub BTreeMap<String, FeatureValue>);

impl FeatureSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FeatureValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FeatureValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FeatureValue> {
        self.0.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(FeatureValue::as_text)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(FeatureValue::as_number)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Insert every entry of `defaults` whose key is missing here
    pub fn fill_missing(&mut self, defaults: &FeatureSnapshot) {
        for (key, value) in &defaults.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FeatureValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One observed purchase
///
/// Events carry no label: labels are assigned by the harness when the event
/// becomes a training example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub client_id: ClientId,
    pub product_id: ProductId,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub client_features: FeatureSnapshot,
    #[serde(default)]
    pub product_features: FeatureSnapshot,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub amount: f64,
}

fn default_quantity() -> f64 {
    1.0
}

impl Event {
    /// Create an event, stamping the identifiers into both snapshots
    pub fn new(
        client_id: ClientId,
        product_id: ProductId,
        timestamp: DateTime<Utc>,
        client_features: FeatureSnapshot,
        product_features: FeatureSnapshot,
    ) -> Self {
        let mut event = Self {
            client_id,
            product_id,
            timestamp,
            client_features,
            product_features,
            quantity: 1.0,
            amount: 0.0,
        };
        event.stamp_ids();
        event
    }

    pub fn with_magnitude(mut self, quantity: f64, amount: f64) -> Self {
        self.quantity = quantity;
        self.amount = amount;
        self
    }

    /// Make sure the reserved id keys match the event's identifiers
    pub fn stamp_ids(&mut self) {
        self.client_features
            .insert(CLIENT_ID_KEY, self.client_id.as_str());
        self.product_features
            .insert(PRODUCT_ID_KEY, self.product_id.as_str());
    }

    /// Calendar day of the event
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }
}

/// Harness-assigned training label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    pub fn as_f64(self) -> f64 {
        match self {
            Label::Positive => 1.0,
            Label::Negative => 0.0,
        }
    }
}

/// An event paired with its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub event: Event,
    pub label: Label,
}

impl LabeledExample {
    pub fn positive(event: Event) -> Self {
        Self {
            event,
            label: Label::Positive,
        }
    }

    pub fn negative(event: Event) -> Self {
        Self {
            event,
            label: Label::Negative,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.event.timestamp
    }
}

/// A catalog product with its availability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default)]
    pub attributes: FeatureSnapshot,
    /// Countries where the product can be bought
    #[serde(default)]
    pub countries: Vec<String>,
}

impl Product {
    pub fn new(id: ProductId, attributes: FeatureSnapshot, countries: Vec<String>) -> Self {
        let mut product = Self {
            id,
            attributes,
            countries,
        };
        product.stamp_id();
        product
    }

    pub fn stamp_id(&mut self) {
        self.attributes.insert(PRODUCT_ID_KEY, self.id.as_str());
    }

    pub fn available_in(&self, country: &str) -> bool {
        self.countries.iter().any(|c| c == country)
    }
}

/// Half-open `[start, end)` interval on the day axis
///
/// A window owns no events; it is a filter predicate over the event store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        day >= self.start && day < self.end
    }

    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Timestamp range a window trains on
    ///
    /// With `include_end_day` the range extends through the whole of the
    /// `end` day.
    pub fn training_range(&self, include_end_day: bool) -> TimeRange {
        let end = if include_end_day {
            self.end + Duration::days(1)
        } else {
            self.end
        };
        TimeRange::from_days(self.start, end)
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Half-open `[start, end)` interval on the timestamp axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn from_days(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start_of_day(start),
            end: start_of_day(end),
        }
    }

    /// The full calendar day
    pub fn day(day: NaiveDate) -> Self {
        Self::from_days(day, day + Duration::days(1))
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Midnight UTC of `day`
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc()
}

/// Immutable snapshot of scorer state keyed by window end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// End of the window this checkpoint was trained on
    pub window_end: NaiveDate,
    /// Window end of the checkpoint this one was derived from
    pub parent: Option<NaiveDate>,
    /// Scorer kind that produced `state`
    pub scorer: String,
    /// Opaque model state
    pub state: Vec<u8>,
    /// Labelled examples learned in this window (per pass)
    pub examples: u64,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Evaluation outcome for one day
///
/// `accuracy` is undefined (`None`) when no client could be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub day: NaiveDate,
    pub total_clients: usize,
    pub correct_count: usize,
    /// Purchasing clients without any eligible candidate
    pub skipped_clients: usize,
    /// Clients scored from a defaulted snapshot
    pub defaulted_clients: usize,
    pub accuracy: Option<f64>,
}

impl EvaluationResult {
    pub fn new(day: NaiveDate, total_clients: usize, correct_count: usize) -> Self {
        let accuracy = if total_clients == 0 {
            None
        } else {
            Some(correct_count as f64 / total_clients as f64)
        };
        Self {
            day,
            total_clients,
            correct_count,
            skipped_clients: 0,
            defaulted_clients: 0,
            accuracy,
        }
    }
}
