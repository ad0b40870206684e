// src/models/stats_models.rs
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use super::matching::{ConfidenceLevel, MatchAlgorithm, MatchResult, MatchStatus, SuggestionRank};

/// Counters for a single village run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub village_id: String,
    pub algorithm: MatchAlgorithm,
    pub threshold: f64,
    pub parcels: usize,
    pub text_records: usize,
    pub candidate_pairs: usize,
    pub pairs_scored: usize,
    pub pairs_accepted: usize,
    pub primary_suggestions: usize,
    pub skipped_terminal: usize,
    pub rescored_changed: usize,
    pub superseded: usize,
    pub retired: usize,
    /// Suggestions the store refused because their pair was reviewed while the run was scoring.
    pub refused_reviewed: usize,
    /// Records dropped or degraded because of malformed fields.
    pub invalid_records: usize,
    pub batches: usize,
    pub avg_confidence: f64,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunStats {
    pub fn new(village_id: &str, algorithm: MatchAlgorithm, threshold: f64) -> Self {
        Self {
            village_id: village_id.to_string(),
            algorithm,
            threshold,
            parcels: 0,
            text_records: 0,
            candidate_pairs: 0,
            pairs_scored: 0,
            pairs_accepted: 0,
            primary_suggestions: 0,
            skipped_terminal: 0,
            rescored_changed: 0,
            superseded: 0,
            retired: 0,
            refused_reviewed: 0,
            invalid_records: 0,
            batches: 0,
            avg_confidence: 0.0,
            elapsed: Duration::ZERO,
        }
    }
}

/// Summary over a set of stored results, used by review dashboards and reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciliationStats {
    pub total_matches: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_confidence: BTreeMap<String, usize>,
    pub primary_suggestions: usize,
    pub average_score: f64,
    /// Verified plus rejected.
    pub reviewed_count: usize,
}

impl ReconciliationStats {
    pub fn from_results(results: &[MatchResult]) -> Self {
        let mut stats = ReconciliationStats {
            total_matches: results.len(),
            ..Default::default()
        };
        for status in [MatchStatus::Pending, MatchStatus::Verified, MatchStatus::Rejected] {
            stats.by_status.insert(status.as_str().to_string(), 0);
        }

        let mut score_sum = 0.0;
        for result in results {
            *stats.by_status.entry(result.status.as_str().to_string()).or_insert(0) += 1;
            let level = match result.confidence_level {
                ConfidenceLevel::High => "high",
                ConfidenceLevel::Medium => "medium",
                ConfidenceLevel::Low => "low",
            };
            *stats.by_confidence.entry(level.to_string()).or_insert(0) += 1;
            if result.rank == SuggestionRank::Primary {
                stats.primary_suggestions += 1;
            }
            if result.status.is_terminal() {
                stats.reviewed_count += 1;
            }
            score_sum += result.confidence;
        }

        if !results.is_empty() {
            stats.average_score = (score_sum / results.len() as f64 * 100.0).round() / 100.0;
        }
        stats
    }
}
