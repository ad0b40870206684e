// src/persistence/in_memory.rs
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{MatchStore, ResultFilter};
use crate::errors::{ReconcileError, ReconcileResult};
use crate::models::matching::{MatchResult, MatchStatus, ReviewEvent};
use crate::utils::config::RerunPolicy;

/// Process-local store used by tests and the command line tool.
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    results: RwLock<HashMap<Uuid, MatchResult>>,
    events: Mutex<Vec<ReviewEvent>>,
}

fn poisoned<T>(_: T) -> ReconcileError {
    ReconcileError::Store("in-memory store lock poisoned".to_string())
}

fn sorted(mut results: Vec<MatchResult>) -> Vec<MatchResult> {
    results.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.pair_key().cmp(&b.pair_key())));
    results
}

fn same_pair(a: &MatchResult, b: &MatchResult) -> bool {
    a.algorithm == b.algorithm && a.parcel_id == b.parcel_id && a.text_record_id == b.text_record_id
}

// A pending row never sits beside a reviewed row of its pair unless the run
// deliberately re-scored that pair.
fn refuses(stored: &HashMap<Uuid, MatchResult>, new: &MatchResult, policy: RerunPolicy) -> bool {
    let replaces_reviewed = new
        .supersedes
        .and_then(|id| stored.get(&id))
        .map_or(false, |r| r.status.is_terminal());
    if replaces_reviewed {
        return true;
    }
    stored.values().any(|r| {
        r.status.is_terminal()
            && same_pair(r, new)
            && match policy {
                RerunPolicy::SkipTerminal => true,
                RerunPolicy::RescoreChanged => r.pair_signature == new.pair_signature,
                RerunPolicy::Force => false,
            }
    })
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.results.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MatchStore for InMemoryMatchStore {
    fn results_for_village(&self, village_id: &str, filter: &ResultFilter) -> ReconcileResult<Vec<MatchResult>> {
        let results = self.results.read().map_err(poisoned)?;
        Ok(sorted(
            results
                .values()
                .filter(|r| r.village_id == village_id && filter.matches(r))
                .cloned()
                .collect(),
        ))
    }

    fn results_for_parcel(&self, parcel_id: &str) -> ReconcileResult<Vec<MatchResult>> {
        let results = self.results.read().map_err(poisoned)?;
        Ok(sorted(results.values().filter(|r| r.parcel_id == parcel_id).cloned().collect()))
    }

    fn get(&self, match_id: Uuid) -> ReconcileResult<Option<MatchResult>> {
        let results = self.results.read().map_err(poisoned)?;
        Ok(results.get(&match_id).cloned())
    }

    fn save_run(
        &self,
        new_results: &[MatchResult],
        retired: &[Uuid],
        policy: RerunPolicy,
    ) -> ReconcileResult<Vec<Uuid>> {
        let mut results = self.results.write().map_err(poisoned)?;

        let refused: Vec<Uuid> = new_results
            .iter()
            .filter(|r| refuses(&results, r, policy))
            .map(|r| r.id)
            .collect();
        for id in &refused {
            debug!("Refused suggestion {}: its pair was reviewed during the run", id);
        }

        let mut removed = 0;
        let replaced = new_results.iter().filter_map(|r| r.supersedes);
        for id in replaced.chain(retired.iter().copied()) {
            // Only pending rows are ever replaced; reviewed rows are history.
            if results.get(&id).map_or(false, |r| r.status == MatchStatus::Pending) {
                results.remove(&id);
                removed += 1;
            }
        }
        for result in new_results.iter().filter(|r| !refused.contains(&r.id)) {
            results.insert(result.id, result.clone());
        }
        debug!(
            "Saved {} results, removed {} superseded or retired, refused {}",
            new_results.len() - refused.len(),
            removed,
            refused.len()
        );
        Ok(refused)
    }

    fn compare_and_set(&self, expected: MatchStatus, updated: &MatchResult) -> ReconcileResult<()> {
        let mut results = self.results.write().map_err(poisoned)?;
        let current = results.get(&updated.id).ok_or(ReconcileError::NotFound(updated.id))?;
        if current.status != expected {
            return Err(ReconcileError::InvalidTransition {
                match_id: updated.id,
                from: current.status,
                to: updated.status,
            });
        }
        if updated.status == MatchStatus::Verified {
            let verified = results
                .values()
                .find(|r| r.id != updated.id && r.parcel_id == updated.parcel_id && r.status == MatchStatus::Verified);
            if let Some(verified) = verified {
                return Err(ReconcileError::Conflict {
                    match_id: updated.id,
                    parcel_id: updated.parcel_id.clone(),
                    verified_match_id: verified.id,
                });
            }
        }
        results.insert(updated.id, updated.clone());
        Ok(())
    }

    fn append_event(&self, event: ReviewEvent) -> ReconcileResult<()> {
        self.events.lock().map_err(poisoned)?.push(event);
        Ok(())
    }

    fn events_for_match(&self, match_id: Uuid) -> ReconcileResult<Vec<ReviewEvent>> {
        let events = self.events.lock().map_err(poisoned)?;
        Ok(events.iter().filter(|e| e.match_id == match_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::matcher::run_reconciliation;
    use crate::models::core::{Parcel, TextRecord};
    use crate::models::matching::{ConfidenceLevel, MatchAlgorithm, ScorerKind};
    use crate::utils::config::ReconcileConfig;

    fn suggestions() -> Vec<MatchResult> {
        let parcels = vec![Parcel::new("p1", "v1", "Mohal Lal", None, 600.0)];
        let records = vec![
            TextRecord::new("r1", "v1", "Mohan Lal", None, 600.0),
            TextRecord::new("r2", "v1", "Mohan Lal", None, 600.0),
        ];
        let config = ReconcileConfig {
            worker_threads: 1,
            ..ReconcileConfig::default()
        };
        run_reconciliation("v1", &parcels, &records, MatchAlgorithm::Combined, 70.0, &[], &config, None)
            .unwrap()
            .results
    }

    fn superseding(first: &[MatchResult]) -> Vec<MatchResult> {
        suggestions()
            .into_iter()
            .map(|mut r| {
                r.supersedes = first.iter().find(|f| f.pair_key() == r.pair_key()).map(|f| f.id);
                r
            })
            .collect()
    }

    fn verified(result: &MatchResult) -> MatchResult {
        let mut updated = result.clone();
        updated.status = MatchStatus::Verified;
        updated.verified_by = Some("officer-1".to_string());
        updated
    }

    fn rows_for_pair(store: &InMemoryMatchStore, record_id: &str) -> Vec<MatchResult> {
        store
            .results_for_parcel("p1")
            .unwrap()
            .into_iter()
            .filter(|r| r.text_record_id == record_id)
            .collect()
    }

    #[test]
    fn test_save_run_only_drops_pending_rows() {
        let store = InMemoryMatchStore::new();
        let mut first = suggestions();
        first[0].status = MatchStatus::Verified;
        store.save_run(&first, &[], RerunPolicy::Force).unwrap();

        let second = superseding(&first);
        let refused = store.save_run(&second, &[], RerunPolicy::Force).unwrap();

        // The verified row stays, the pending one is replaced, and the
        // suggestion aimed at the verified row is refused.
        assert_eq!(refused, vec![second[0].id]);
        assert_eq!(store.len(), 2);
        assert!(store.get(first[0].id).unwrap().is_some());
        assert!(store.get(first[1].id).unwrap().is_none());
        assert!(store.get(second[1].id).unwrap().is_some());
        assert!(store.results_for_village("v2", &ResultFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn test_pair_reviewed_during_run_keeps_only_the_decision() {
        let store = InMemoryMatchStore::new();
        let first = suggestions();
        store.save_run(&first, &[], RerunPolicy::SkipTerminal).unwrap();

        // A re-run loads first[0] as pending and scores it again...
        let second = superseding(&first);
        // ...while a reviewer verifies it.
        store.compare_and_set(MatchStatus::Pending, &verified(&first[0])).unwrap();

        let refused = store.save_run(&second, &[], RerunPolicy::SkipTerminal).unwrap();
        assert_eq!(refused, vec![second[0].id]);

        let rows = rows_for_pair(&store, &first[0].text_record_id);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, first[0].id);
        assert_eq!(rows[0].status, MatchStatus::Verified);
        // The untouched pair is still replaced as usual.
        assert_eq!(rows_for_pair(&store, &first[1].text_record_id)[0].id, second[1].id);
    }

    #[test]
    fn test_unseen_reviewed_pair_is_refused_unless_rescored() {
        let store = InMemoryMatchStore::new();
        let first = suggestions();
        store.save_run(&first[..1], &[], RerunPolicy::SkipTerminal).unwrap();
        store.compare_and_set(MatchStatus::Pending, &verified(&first[0])).unwrap();

        // A run that loaded its priors before first[0] existed knows nothing of it.
        let late = suggestions();
        let refused = store.save_run(&late, &[], RerunPolicy::SkipTerminal).unwrap();
        assert_eq!(refused, vec![late[0].id]);
        assert_eq!(rows_for_pair(&store, &first[0].text_record_id).len(), 1);

        let mut changed = suggestions();
        changed[0].pair_signature = "changed".to_string();
        let refused = store.save_run(&changed[..1], &[], RerunPolicy::RescoreChanged).unwrap();
        assert!(refused.is_empty());
        assert_eq!(rows_for_pair(&store, &first[0].text_record_id).len(), 2);
    }

    #[test]
    fn test_compare_and_set_checks_expected_status() {
        let store = InMemoryMatchStore::new();
        let results = suggestions();
        store.save_run(&results, &[], RerunPolicy::SkipTerminal).unwrap();

        let mut updated = results[0].clone();
        updated.status = MatchStatus::Rejected;
        assert_eq!(store.compare_and_set(MatchStatus::Pending, &updated), Ok(()));
        assert_eq!(
            store.compare_and_set(MatchStatus::Pending, &updated),
            Err(ReconcileError::InvalidTransition {
                match_id: updated.id,
                from: MatchStatus::Rejected,
                to: MatchStatus::Rejected,
            })
        );

        let mut unknown = results[0].clone();
        unknown.id = Uuid::new_v4();
        assert_eq!(
            store.compare_and_set(MatchStatus::Pending, &unknown),
            Err(ReconcileError::NotFound(unknown.id))
        );
    }

    #[test]
    fn test_compare_and_set_refuses_second_verified_row_for_parcel() {
        let store = InMemoryMatchStore::new();
        let results = suggestions();
        store.save_run(&results, &[], RerunPolicy::SkipTerminal).unwrap();

        store.compare_and_set(MatchStatus::Pending, &verified(&results[0])).unwrap();
        assert_eq!(
            store.compare_and_set(MatchStatus::Pending, &verified(&results[1])),
            Err(ReconcileError::Conflict {
                match_id: results[1].id,
                parcel_id: "p1".to_string(),
                verified_match_id: results[0].id,
            })
        );
        assert_eq!(store.get(results[1].id).unwrap().unwrap().status, MatchStatus::Pending);
    }

    #[test]
    fn test_village_results_filtered_by_status_level_and_algorithm() {
        let store = InMemoryMatchStore::new();
        let mut results = suggestions();
        results[0].confidence_level = ConfidenceLevel::High;
        results[1].confidence_level = ConfidenceLevel::Medium;
        store.save_run(&results, &[], RerunPolicy::SkipTerminal).unwrap();
        store.compare_and_set(MatchStatus::Pending, &verified(&results[0])).unwrap();

        let pending = ResultFilter::default().with_status(MatchStatus::Pending);
        let rows = store.results_for_village("v1", &pending).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, results[1].id);

        let high = ResultFilter::for_algorithm(MatchAlgorithm::Combined).with_confidence_level(ConfidenceLevel::High);
        let rows = store.results_for_village("v1", &high).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, results[0].id);

        let other = ResultFilter::for_algorithm(MatchAlgorithm::Single(ScorerKind::Cosine));
        assert!(store.results_for_village("v1", &other).unwrap().is_empty());
        assert_eq!(store.results_for_village("v1", &ResultFilter::default()).unwrap().len(), 2);
    }
}
