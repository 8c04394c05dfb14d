//! Product universe and candidate generation.
//!
//! The universe is built once per run from the catalog and the whole event
//! history: products are ranked by total purchased quantity and only the
//! top N are kept. The restriction is harness-wide: it bounds the candidates
//! and filters the events used for training and ground truth.

use crate::types::{Event, Product, ProductId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// Immutable, per-run product universe
#[derive(Debug, Clone, Default)]
pub struct ProductUniverse {
    /// Kept products in catalog order
    products: Vec<Product>,
    /// Product ids allowed in events; `None` means unrestricted
    allowed: Option<HashSet<ProductId>>,
    /// Country → candidate list in catalog order, shared with ranking tasks
    by_country: BTreeMap<String, Arc<[Product]>>,
}

impl ProductUniverse {
    /// Build the universe from a catalog and per-product purchase volumes
    ///
    /// With `top_n`, products are ranked by volume (ties by id) and only the
    /// best N with non-zero history are kept; products never purchased can
    /// not make it into a restricted universe.
    pub fn build(
        catalog: Vec<Product>,
        volumes: &HashMap<ProductId, f64>,
        top_n: Option<usize>,
    ) -> Self {
        let allowed = top_n.map(|n| {
            let mut ranked: Vec<(&ProductId, f64)> =
                volumes.iter().map(|(id, v)| (id, *v)).collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            ranked
                .into_iter()
                .take(n)
                .map(|(id, _)| id.clone())
                .collect::<HashSet<_>>()
        });

        let mut seen = HashSet::new();
        let products: Vec<Product> = catalog
            .into_iter()
            .filter(|p| allowed.as_ref().map_or(true, |set| set.contains(&p.id)))
            .filter(|p| seen.insert(p.id.clone()))
            .collect();

        let mut slots: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, product) in products.iter().enumerate() {
            for country in &product.countries {
                let entry = slots.entry(country.as_str()).or_default();
                if entry.last() != Some(&idx) {
                    entry.push(idx);
                }
            }
        }
        let by_country: BTreeMap<String, Arc<[Product]>> = slots
            .into_iter()
            .map(|(country, idxs)| {
                let list: Arc<[Product]> = idxs.iter().map(|&i| products[i].clone()).collect();
                (country.to_string(), list)
            })
            .collect();

        info!(
            "Product universe: {} products across {} countries (restriction: {})",
            products.len(),
            by_country.len(),
            top_n.map_or("none".to_string(), |n| format!("top {}", n))
        );

        Self {
            products,
            allowed,
            by_country,
        }
    }

    /// Total purchased quantity per product
    pub fn volumes(events: &[Event]) -> HashMap<ProductId, f64> {
        let mut volumes = HashMap::new();
        for event in events {
            *volumes.entry(event.product_id.clone()).or_insert(0.0) += event.quantity;
        }
        volumes
    }

    /// Whether events for this product take part in the run
    pub fn admits(&self, product: &ProductId) -> bool {
        self.allowed
            .as_ref()
            .map_or(true, |set| set.contains(product))
    }

    /// Drop events whose product is outside the universe
    pub fn retain_events(&self, events: &mut Vec<Event>) {
        if self.allowed.is_some() {
            events.retain(|e| self.admits(&e.product_id));
        }
    }

    /// Products available in `country`, in catalog order
    ///
    /// The list is built once per run; callers get a shared handle.
    pub fn candidates(&self, country: &str) -> Option<Arc<[Product]>> {
        self.by_country.get(country).cloned()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
