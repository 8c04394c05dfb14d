//! Top-K ranking of candidate products

use crate::scorer::Scorer;
use crate::types::{FeatureSnapshot, Product, ProductId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A ranked product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    top_k: usize,
}

impl Ranker {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Score every candidate and keep the best `top_k`
    ///
    /// Ties keep candidate order; NaN scores rank last.
    pub fn rank(
        &self,
        model: &dyn Scorer,
        client: &FeatureSnapshot,
        candidates: &[Product],
    ) -> Vec<Recommendation> {
        let scored = candidates
            .iter()
            .map(|product| (product, model.predict(client, &product.attributes)));
        self.select(scored)
    }

    /// Top-K over pre-computed scores
    pub fn select<'a>(
        &self,
        scored: impl IntoIterator<Item = (&'a Product, f64)>,
    ) -> Vec<Recommendation> {
        let mut scored: Vec<(&Product, f64)> = scored
            .into_iter()
            .map(|(p, s)| (p, if s.is_nan() { f64::NEG_INFINITY } else { s }))
            .collect();

        // Vec::sort_by is stable
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(self.top_k)
            .map(|(product, score)| Recommendation {
                product_id: product.id.clone(),
                score,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::types::{Checkpoint, LabeledExample, PRODUCT_ID_KEY};

    struct TableScorer(Vec<(&'static str, f64)>);

    impl Scorer for TableScorer {
        fn kind(&self) -> &str {
            "table"
        }
        fn load(&mut self, _checkpoint: &Checkpoint) -> Result<()> {
            Ok(())
        }
        fn learn(&mut self, _examples: &[LabeledExample]) -> Result<()> {
            Ok(())
        }
        fn save(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn predict(&self, _client: &FeatureSnapshot, product: &FeatureSnapshot) -> f64 {
            let id = product.text(PRODUCT_ID_KEY).unwrap_or_default();
            self.0
                .iter()
                .find(|(p, _)| *p == id)
                .map(|(_, s)| *s)
                .unwrap_or(0.0)
        }
    }

    fn products(ids: &[&str]) -> Vec<Product> {
        ids.iter()
            .map(|id| Product::new(ProductId::new(*id), FeatureSnapshot::new(), vec![]))
            .collect()
    }

    fn ids(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.product_id.as_str()).collect()
    }

    #[test]
    fn test_descending_with_stable_ties() {
        let catalog = products(&["a", "b", "c", "d", "e"]);
        let model = TableScorer(vec![("a", 0.1), ("b", 0.9), ("c", 0.5), ("d", 0.9), ("e", 0.5)]);

        let recs = Ranker::new(3).rank(&model, &FeatureSnapshot::new(), &catalog);
        assert_eq!(ids(&recs), vec!["b", "d", "c"]);
        assert_eq!(recs[0].score, 0.9);
    }

    #[test]
    fn test_nan_ranks_last() {
        let catalog = products(&["a", "b", "c"]);
        let model = TableScorer(vec![("a", f64::NAN), ("b", -5.0), ("c", 1.0)]);

        let recs = Ranker::new(3).rank(&model, &FeatureSnapshot::new(), &catalog);
        assert_eq!(ids(&recs), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_fewer_candidates_than_k() {
        let catalog = products(&["a", "b"]);
        let model = TableScorer(vec![]);

        let recs = Ranker::new(5).rank(&model, &FeatureSnapshot::new(), &catalog);
        assert_eq!(ids(&recs), vec!["a", "b"]);
        assert!(Ranker::new(5)
            .rank(&model, &FeatureSnapshot::new(), &[])
            .is_empty());
    }
}
