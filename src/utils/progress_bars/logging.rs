// src/utils/progress_bars/logging.rs - Logging helpers for reconciliation runs
use log::{debug, info, warn};
use std::time::Instant;

use crate::models::matching::MatchAlgorithm;
use crate::models::stats_models::RunStats;

#[derive(Clone)]
pub struct ReconcileLogger {
    village_id: String,
    method_name: &'static str,
    method_emoji: &'static str,
    start_time: Instant,
}

impl ReconcileLogger {
    pub fn new(village_id: &str, algorithm: MatchAlgorithm) -> Self {
        let (method_name, method_emoji) = match algorithm {
            MatchAlgorithm::Combined => ("COMBINED", "🧩"),
            MatchAlgorithm::Single(_) => ("NAME", "👤"),
        };
        Self {
            village_id: village_id.to_string(),
            method_name,
            method_emoji,
            start_time: Instant::now(),
        }
    }

    pub fn log_start(&self, algorithm: MatchAlgorithm, threshold: f64) {
        info!(
            "[{}] {} 🚀 Starting reconciliation for village {} ({}, threshold {:.1})",
            self.method_name, self.method_emoji, self.village_id, algorithm, threshold
        );
    }

    pub fn log_phase(&self, phase: &str, details: Option<&str>) {
        let elapsed = self.start_time.elapsed();
        if let Some(details) = details {
            info!(
                "[{}] {} 🔄 Phase: {} - {} [+{:.1}s]",
                self.method_name, self.method_emoji, phase, details, elapsed.as_secs_f32()
            );
        } else {
            info!(
                "[{}] {} 🔄 Phase: {} [+{:.1}s]",
                self.method_name, self.method_emoji, phase, elapsed.as_secs_f32()
            );
        }
    }

    pub fn log_data_loaded(&self, parcels: usize, records: usize, invalid: usize) {
        info!(
            "[{}] {} 📊 Village {}: {} parcels, {} text records ({} invalid skipped)",
            self.method_name, self.method_emoji, self.village_id, parcels, records, invalid
        );
    }

    pub fn log_prior_results(&self, terminal: usize, pending: usize) {
        if terminal + pending > 0 {
            info!(
                "[{}] {} ⏭️  Found {} reviewed and {} pending prior results (reviewed pairs are skipped, pending ones superseded)",
                self.method_name, self.method_emoji, terminal, pending
            );
        } else {
            info!(
                "[{}] {} ✨ No prior results for village {} - clean slate",
                self.method_name, self.method_emoji, self.village_id
            );
        }
    }

    pub fn log_candidates(&self, total_pairs: usize, limit: usize) {
        info!(
            "[{}] {} 📈 Candidate pairs to evaluate: {} (limit {})",
            self.method_name, self.method_emoji, total_pairs, limit
        );
    }

    pub fn log_batch_progress(&self, batch_num: usize, pairs_in_batch: usize, accepted_so_far: usize) {
        if batch_num % 5 == 0 || batch_num == 1 {
            info!(
                "[{}] {} 📦 Batch {} scored ({} pairs, {} accepted so far)",
                self.method_name, self.method_emoji, batch_num, pairs_in_batch, accepted_so_far
            );
        } else {
            debug!(
                "[{}] Batch {} scored ({} pairs)",
                self.method_name, batch_num, pairs_in_batch
            );
        }
    }

    pub fn log_completion(&self, stats: &RunStats) {
        let duration = self.start_time.elapsed();
        info!(
            "[{}] {} 🎉 COMPLETED village {}: {} suggestions ({} primary) in {:.2?}",
            self.method_name,
            self.method_emoji,
            self.village_id,
            stats.pairs_accepted,
            stats.primary_suggestions,
            duration
        );
        info!(
            "[{}] {} 📊 Results: {} pairs scored, avg confidence {:.1}, {} reviewed pairs skipped, {} pending superseded, {} retired",
            self.method_name,
            self.method_emoji,
            stats.pairs_scored,
            stats.avg_confidence,
            stats.skipped_terminal,
            stats.superseded,
            stats.retired
        );
        if stats.invalid_records > 0 {
            self.log_warning(&format!(
                "{} records had malformed fields and were skipped or degraded",
                stats.invalid_records
            ));
        }
    }

    pub fn log_warning(&self, message: &str) {
        warn!("[{}] {} ⚠️  {}", self.method_name, self.method_emoji, message);
    }
}
