//! Score fusion. Rule-based weighting ships; a learned ranker is just
//! another implementation of the same contract.

use autocut_core::RankingWeights;

use crate::features::FeatureSet;

pub trait Scorer: Send + Sync {
    /// Fused score in [0,1].
    fn score(&self, features: &FeatureSet) -> f32;

    /// (feature name, weighted contribution) for available slots, used for
    /// rationale strings. Sorted by contribution, largest first.
    fn contributions(&self, features: &FeatureSet) -> Vec<(&'static str, f32, f32)>;
}

pub struct WeightedSum {
    weights: RankingWeights,
}

impl WeightedSum {
    pub fn new(weights: RankingWeights) -> Self {
        Self { weights }
    }
}

impl Scorer for WeightedSum {
    /// Weighted mean over the available features. An unavailable slot's
    /// weight is redistributed proportionally over the rest, so a missing
    /// expensive signal never depresses a camera.
    fn score(&self, features: &FeatureSet) -> f32 {
        let named = self.weights.named();
        let slots = features.slots();
        let mut weighted = 0.0f32;
        let mut available_weight = 0.0f32;
        for ((_, w), slot) in named.iter().zip(slots.iter()) {
            if let Some(value) = slot {
                weighted += w * value;
                available_weight += w;
            }
        }
        if available_weight <= 0.0 {
            return 0.0;
        }
        (weighted / available_weight).clamp(0.0, 1.0)
    }

    fn contributions(&self, features: &FeatureSet) -> Vec<(&'static str, f32, f32)> {
        let named = self.weights.named();
        let slots = features.slots();
        let mut out: Vec<(&'static str, f32, f32)> = named
            .iter()
            .zip(slots.iter())
            .filter_map(|((name, w), slot)| slot.map(|value| (*name, value, w * value)))
            .collect();
        out.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        out
    }
}
