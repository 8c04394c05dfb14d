//! Harness configuration
//!
//! Defines the options of a walk-forward run: schedule lengths, sampling
//! and ranking sizes, the catalog restriction, the evaluation-overlap policy
//! and the scorer selection. Loaded from TOML and validated before any
//! window is processed.

use crate::error::{RecwalkError, Result};
use crate::scorer::ScorerConfig;
use crate::types::FeatureSnapshot;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main harness configuration
///
/// Day counts are signed so that a negative value in a config file is
/// reported as a configuration error instead of a parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Length of the initial training period
    pub warmup_days: i64,

    /// Distance between consecutive window ends
    pub cadence_days: i64,

    /// Maximum window length (clamped at the warm-up end)
    pub lookback_days: i64,

    /// Negative examples sampled per client and window
    pub n_neg: usize,

    /// Recommendations per client
    pub top_k: usize,

    /// Restrict the product universe to the N best sellers (None = full catalog)
    ///
    /// Written as `top_n_products = 0` in TOML to lift the restriction.
    #[serde(with = "catalog_limit")]
    pub top_n_products: Option<usize>,

    /// Train stepping windows on their end day too (legacy behaviour)
    pub evaluate_with_overlap: bool,

    /// Seed for negative sampling
    pub seed: u64,

    /// Concurrent per-client scoring tasks
    pub scoring_workers: usize,

    /// Passes over each window's examples
    pub passes: usize,

    /// Country used when a client's country is unknown
    pub default_country: String,

    /// Client snapshot key holding the country
    pub country_attribute: String,

    /// Overwrite weekday/month/quarter with the scoring day
    pub stamp_calendar: bool,

    /// Continue from the checkpoint store's latest entry
    pub resume: bool,

    /// Scorer selection and parameters
    pub scorer: ScorerConfig,

    /// Values substituted for missing client attributes
    pub client_defaults: FeatureSnapshot,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            warmup_days: 30,
            cadence_days: 7,
            lookback_days: 90,
            n_neg: 10,
            top_k: 5,
            top_n_products: Some(1000),
            evaluate_with_overlap: false,
            seed: 42,
            scoring_workers: 4,
            passes: 5,
            default_country: "Unknown".to_string(),
            country_attribute: "country".to_string(),
            stamp_calendar: true,
            resume: false,
            scorer: ScorerConfig::default(),
            client_defaults: default_client_table(),
        }
    }
}

/// Recognised defaults for cold-start clients
pub fn default_client_table() -> FeatureSnapshot {
    FeatureSnapshot::new()
        .with("gender", "Unknown")
        .with("age", 30.0)
        .with("segment", "UNKNOWN")
        .with("opt_in_email", false)
        .with("opt_in_phone", false)
        .with("days_since_last_transaction", 900.0)
        .with("cumulative_spent", 0.0)
        .with("cumulative_quantity", 0.0)
        .with("unique_products_so_far", 0.0)
        .with("average_amount_per_transaction", 0.0)
        .with("average_frequency", 0.0)
        .with("average_price", 0.0)
        .with("frequency_30", 0.0)
        .with("monetary_30", 0.0)
        .with("recency_30", 30.0)
        .with("frequency_60", 0.0)
        .with("monetary_60", 0.0)
        .with("recency_60", 60.0)
        .with("frequency_90", 0.0)
        .with("monetary_90", 0.0)
        .with("recency_90", 90.0)
        .with("season", "Unknown")
}

impl HarnessConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: HarnessConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        positive("warmup_days", self.warmup_days)?;
        positive("cadence_days", self.cadence_days)?;
        positive("lookback_days", self.lookback_days)?;

        if self.top_k == 0 {
            return Err(invalid("top_k must be at least 1"));
        }
        if self.top_n_products == Some(0) {
            return Err(invalid("top_n_products must be at least 1 when set"));
        }
        if self.scoring_workers == 0 {
            return Err(invalid("scoring_workers must be at least 1"));
        }
        if self.passes == 0 {
            return Err(invalid("passes must be at least 1"));
        }
        if self.default_country.trim().is_empty() {
            return Err(invalid("default_country cannot be empty"));
        }
        if self.country_attribute.trim().is_empty() {
            return Err(invalid("country_attribute cannot be empty"));
        }

        self.scorer.validate()
    }
}

/// `top_n_products` on disk: a plain integer where 0 means unrestricted
mod catalog_limit {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        limit: &Option<usize>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u64(limit.unwrap_or(0) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Option<usize>, D::Error> {
        let n = usize::deserialize(deserializer)?;
        Ok((n > 0).then_some(n))
    }
}

fn positive(name: &str, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(invalid(&format!("{} must be positive, got {}", name, value)));
    }
    Ok(())
}

fn invalid(msg: &str) -> RecwalkError {
    RecwalkError::Configuration(msg.to_string())
}
