// src/matching/combiner.rs - Per-field scoring of one parcel/record pair
use log::debug;
use serde::Serialize;

use crate::errors::ReconcileError;
use crate::matching::normalize::{normalize_name, normalize_plot_id};
use crate::matching::similarity::{prefix_weighted_similarity, similarity};
use crate::models::core::{Parcel, TextRecord};
use crate::models::matching::{ConfidenceLevel, FieldScores, MatchAlgorithm, NameScores, ScorerKind};
use crate::utils::config::ReconcileConfig;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Signal weights of the combined algorithm.
#[derive(Debug, Clone, Serialize)]
pub struct CombinerWeights {
    pub owner_name: f64,
    pub plot_id: f64,
    pub area: f64,
}

impl Default for CombinerWeights {
    fn default() -> Self {
        Self {
            owner_name: 0.40,
            plot_id: 0.35,
            area: 0.25,
        }
    }
}

impl CombinerWeights {
    pub fn validate(&self) -> Result<(), ReconcileError> {
        let weights = [self.owner_name, self.plot_id, self.area];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ReconcileError::InvalidConfig(format!(
                "combiner weights must be non-negative numbers, got {:?}",
                self
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ReconcileError::InvalidConfig(format!(
                "combiner weights must sum to 1.0, got {:.4}",
                sum
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairScore {
    pub scores: FieldScores,
    /// In [0, 100], one decimal place.
    pub confidence: f64,
}

impl PairScore {
    pub fn confidence_level(&self) -> ConfidenceLevel {
        ConfidenceLevel::from_confidence(self.confidence)
    }
}

/// `1 - |a - b| / max(a, b)` for two usable areas.
pub fn area_closeness(a: f64, b: f64) -> f64 {
    let larger = a.max(b);
    if larger <= 0.0 {
        return 0.0;
    }
    (1.0 - (a - b).abs() / larger).clamp(0.0, 1.0)
}

fn round_confidence(unit_score: f64) -> f64 {
    ((unit_score * 1000.0).round() / 10.0).clamp(0.0, 100.0)
}

fn normalized_optional(value: &Option<String>, normalize: fn(&str) -> String) -> Option<String> {
    value.as_deref().map(normalize).filter(|v| !v.is_empty())
}

/// Scores one pair under the given algorithm. Pure and deterministic.
pub fn score(parcel: &Parcel, record: &TextRecord, algorithm: MatchAlgorithm, config: &ReconcileConfig) -> PairScore {
    let name_a = normalize_name(&parcel.owner_name);
    let name_b = normalize_name(&record.owner_name);

    let scorers: &[ScorerKind] = match algorithm {
        MatchAlgorithm::Single(ref kind) => std::slice::from_ref(kind),
        MatchAlgorithm::Combined => &ScorerKind::ALL,
    };
    let mut by_scorer = NameScores::default();
    for kind in scorers {
        by_scorer.set(*kind, similarity(*kind, &name_a, &name_b, &config.prefix));
    }
    let owner_name = by_scorer.best().unwrap_or(0.0);

    let father_name = match (
        normalized_optional(&parcel.father_name, normalize_name),
        normalized_optional(&record.father_name, normalize_name),
    ) {
        (Some(a), Some(b)) => Some(prefix_weighted_similarity(&a, &b, &config.prefix)),
        _ => None,
    };

    let plot_id = match (
        normalized_optional(&parcel.plot_id, normalize_plot_id),
        normalized_optional(&record.plot_id, normalize_plot_id),
    ) {
        (Some(a), Some(b)) => Some(if a == b { 1.0 } else { 0.0 }),
        _ => None,
    };

    let area = match (parcel.area(), record.area_sqm()) {
        (Some(a), Some(b)) => Some(area_closeness(a, b)),
        _ => None,
    };

    let scores = FieldScores {
        owner_name,
        owner_name_by_scorer: by_scorer,
        father_name,
        plot_id,
        area,
    };

    if name_a.is_empty() && name_b.is_empty() {
        debug!("Owner name missing on both {} and {}, confidence 0", parcel.id, record.id);
        return PairScore { scores, confidence: 0.0 };
    }

    let unit_score = match algorithm {
        MatchAlgorithm::Single(_) => owner_name,
        MatchAlgorithm::Combined => combine(&scores, &config.weights),
    };

    PairScore {
        scores,
        confidence: round_confidence(unit_score),
    }
}

// Absent signals drop out and the remaining weights are renormalised.
fn combine(scores: &FieldScores, weights: &CombinerWeights) -> f64 {
    let signals = [
        (Some(scores.owner_name), weights.owner_name),
        (scores.plot_id, weights.plot_id),
        (scores.area, weights.area),
    ];
    let (weighted, total) = signals
        .iter()
        .filter_map(|(score, weight)| score.map(|s| (s * weight, *weight)))
        .fold((0.0, 0.0), |(ws, tw), (s, w)| (ws + s, tw + w));

    if total <= 0.0 {
        0.0
    } else {
        (weighted / total).clamp(0.0, 1.0)
    }
}
