//! JSON Lines loaders for events, products and client profiles.
//!
//! One JSON object per line; blank lines are ignored. Identifiers are
//! stamped into the feature snapshots after parsing.

use crate::error::{RecwalkError, Result};
use crate::types::{ClientId, Event, FeatureSnapshot, Product};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Profile line: `{"client_id": "...", "features": {...}}`
#[derive(Debug, Deserialize)]
struct ProfileLine {
    client_id: ClientId,
    #[serde(default)]
    features: FeatureSnapshot,
}

fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut out = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value = serde_json::from_str(&line).map_err(|e| {
            RecwalkError::Other(format!("{}:{}: {}", path.display(), idx + 1, e))
        })?;
        out.push(value);
    }
    Ok(out)
}

/// Load interaction events
pub fn load_events(path: &Path) -> Result<Vec<Event>> {
    let mut events: Vec<Event> = read_lines(path)?;
    for event in &mut events {
        event.stamp_ids();
    }
    info!("Loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

/// Load the product catalog
pub fn load_products(path: &Path) -> Result<Vec<Product>> {
    let mut products: Vec<Product> = read_lines(path)?;
    for product in &mut products {
        product.stamp_id();
    }
    info!("Loaded {} products from {}", products.len(), path.display());
    Ok(products)
}

/// Load client profiles
pub fn load_profiles(path: &Path) -> Result<HashMap<ClientId, FeatureSnapshot>> {
    let lines: Vec<ProfileLine> = read_lines(path)?;
    info!("Loaded {} client profiles from {}", lines.len(), path.display());
    Ok(lines
        .into_iter()
        .map(|line| (line.client_id, line.features))
        .collect())
}
