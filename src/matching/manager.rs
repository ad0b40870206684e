// src/matching/manager.rs - Wires village runs and reviews to the match store
use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;

use crate::matching::matcher::{run_reconciliation, ReconciliationOutcome};
use crate::models::core::{Parcel, TextRecord};
use crate::models::matching::{MatchAlgorithm, MatchResult, SuggestionRank};
use crate::models::stats_models::ReconciliationStats;
use crate::persistence::{MatchStore, ResultFilter};
use crate::review::verification::ReviewService;
use crate::utils::cancellation::CancellationFlag;
use crate::utils::config::ReconcileConfig;

pub struct ReconciliationManager {
    store: Arc<dyn MatchStore>,
    config: ReconcileConfig,
    review: ReviewService,
}

impl ReconciliationManager {
    pub fn new(store: Arc<dyn MatchStore>, config: ReconcileConfig) -> Result<Self> {
        config.validate().context("Invalid reconciliation configuration")?;
        Ok(Self {
            review: ReviewService::new(store.clone()),
            store,
            config,
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn review(&self) -> &ReviewService {
        &self.review
    }

    /// Loads the village's prior results, runs the matcher and stores the batch.
    /// `algorithm` and `threshold` default to the configured values.
    pub fn run_village(
        &self,
        village_id: &str,
        parcels: &[Parcel],
        text_records: &[TextRecord],
        algorithm: Option<MatchAlgorithm>,
        threshold: Option<f64>,
        cancel: Option<&CancellationFlag>,
    ) -> Result<ReconciliationOutcome> {
        let algorithm = algorithm.unwrap_or(self.config.algorithm);
        let threshold = threshold.unwrap_or(self.config.threshold);

        let prior = self
            .store
            .results_for_village(village_id, &ResultFilter::for_algorithm(algorithm))
            .with_context(|| format!("Failed to load prior results for village {}", village_id))?;

        let mut outcome = run_reconciliation(
            village_id,
            parcels,
            text_records,
            algorithm,
            threshold,
            &prior,
            &self.config,
            cancel,
        )
        .with_context(|| format!("Reconciliation failed for village {}", village_id))?;

        let refused = self
            .store
            .save_run(&outcome.results, &outcome.retired, self.config.rerun_policy)
            .with_context(|| format!("Failed to store results for village {}", village_id))?;
        if !refused.is_empty() {
            warn!(
                "Village {}: {} suggestions dropped, their pairs were reviewed during the run",
                village_id,
                refused.len()
            );
            outcome.results.retain(|r| !refused.contains(&r.id));
            outcome.stats.refused_reviewed = refused.len();
            outcome.stats.pairs_accepted = outcome.results.len();
            outcome.stats.primary_suggestions = outcome
                .results
                .iter()
                .filter(|r| r.rank == SuggestionRank::Primary)
                .count();
        }

        if outcome.results.is_empty() {
            warn!("Village {} produced no suggestions at threshold {:.1}", village_id, threshold);
        }
        info!(
            "Stored {} suggestions for village {} ({} superseded, {} retired)",
            outcome.results.len(),
            village_id,
            outcome.stats.superseded,
            outcome.stats.retired
        );
        Ok(outcome)
    }

    /// Stored results of a village, e.g. the pending high-confidence queue.
    pub fn village_results(&self, village_id: &str, filter: &ResultFilter) -> Result<Vec<MatchResult>> {
        self.store
            .results_for_village(village_id, filter)
            .with_context(|| format!("Failed to load results for village {}", village_id))
    }

    pub fn village_stats(&self, village_id: &str) -> Result<ReconciliationStats> {
        let results = self.village_results(village_id, &ResultFilter::default())?;
        Ok(ReconciliationStats::from_results(&results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ReconcileError;
    use crate::models::matching::{ConfidenceLevel, MatchStatus};
    use crate::persistence::InMemoryMatchStore;
    use crate::review::verification::VerifierStamp;

    fn village() -> (Vec<Parcel>, Vec<TextRecord>) {
        (
            vec![
                Parcel::new("p1", "v1", "Ramesh Kumar", Some("KH-123"), 4500.0),
                Parcel::new("p2", "v1", "Mohal Lal", None, 600.0),
            ],
            vec![
                TextRecord::new("r1", "v1", "Ramesh Kumaar", Some("KH-123"), 4510.0),
                TextRecord::new("r2", "v1", "Mohan Lal", None, 600.0),
                TextRecord::new("r3", "v1", "Mohan Lal", None, 600.0),
            ],
        )
    }

    fn manager() -> (Arc<InMemoryMatchStore>, ReconciliationManager) {
        let store = Arc::new(InMemoryMatchStore::new());
        let config = ReconcileConfig {
            worker_threads: 2,
            ..ReconcileConfig::default()
        };
        let manager = ReconciliationManager::new(store.clone(), config).unwrap();
        (store, manager)
    }

    #[test]
    fn test_rerun_replaces_pending_rows() {
        let (store, manager) = manager();
        let (parcels, records) = village();

        let first = manager.run_village("v1", &parcels, &records, None, None, None).unwrap();
        assert_eq!(store.len(), first.results.len());

        let second = manager.run_village("v1", &parcels, &records, None, None, None).unwrap();
        assert_eq!(store.len(), second.results.len());
        for old in &first.results {
            assert!(store.get(old.id).unwrap().is_none());
        }
    }

    #[test]
    fn test_verified_pairs_survive_reruns() {
        let (store, manager) = manager();
        let (parcels, records) = village();

        let first = manager.run_village("v1", &parcels, &records, None, None, None).unwrap();
        let chosen = first.results.iter().find(|r| r.parcel_id == "p1").unwrap();
        manager
            .review()
            .verify(chosen.id, true, VerifierStamp::now("officer-7"))
            .unwrap();

        let second = manager.run_village("v1", &parcels, &records, None, None, None).unwrap();
        assert!(second.results.iter().all(|r| r.parcel_id != "p1"));
        assert_eq!(second.stats.skipped_terminal, 1);
        assert_eq!(store.get(chosen.id).unwrap().unwrap().status, MatchStatus::Verified);

        let stats = manager.village_stats("v1").unwrap();
        assert_eq!(stats.total_matches, 3);
        assert_eq!(stats.reviewed_count, 1);
        assert_eq!(stats.by_status.get("pending"), Some(&2));
        assert_eq!(stats.primary_suggestions, 2);
    }

    #[test]
    fn test_review_queue_filters_by_status_and_confidence() {
        let (_, manager) = manager();
        let (parcels, records) = village();

        let first = manager.run_village("v1", &parcels, &records, None, None, None).unwrap();
        let chosen = first.results.iter().find(|r| r.parcel_id == "p1").unwrap();
        manager
            .review()
            .verify(chosen.id, true, VerifierStamp::now("officer-7"))
            .unwrap();

        let pending = manager
            .village_results("v1", &ResultFilter::default().with_status(MatchStatus::Pending))
            .unwrap();
        assert_eq!(pending.len(), first.results.len() - 1);
        assert!(pending.iter().all(|r| r.id != chosen.id));

        let level = chosen.confidence_level;
        let by_level = manager
            .village_results("v1", &ResultFilter::default().with_confidence_level(level))
            .unwrap();
        assert!(by_level.iter().all(|r| r.confidence_level == level));
        assert!(by_level.iter().any(|r| r.id == chosen.id));

        // Nothing under the 70 threshold is ever stored.
        assert!(manager
            .village_results("v1", &ResultFilter::default().with_confidence_level(ConfidenceLevel::Low))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_invalid_threshold_surfaces_typed_error() {
        let (_, manager) = manager();
        let (parcels, records) = village();

        let err = manager
            .run_village("v1", &parcels, &records, None, Some(150.0), None)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReconcileError>(),
            Some(ReconcileError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let store = Arc::new(InMemoryMatchStore::new());
        let config = ReconcileConfig {
            batch_size: 0,
            ..ReconcileConfig::default()
        };
        assert!(ReconciliationManager::new(store, config).is_err());
    }
}
