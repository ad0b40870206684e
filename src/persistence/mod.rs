// src/persistence/mod.rs - Storage seam for match results and review history
pub mod in_memory;

use uuid::Uuid;

use crate::errors::ReconcileResult;
use crate::models::matching::{ConfidenceLevel, MatchAlgorithm, MatchResult, MatchStatus, ReviewEvent};
use crate::utils::config::RerunPolicy;

pub use in_memory::InMemoryMatchStore;

/// Optional constraints on a village query. The default matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultFilter {
    pub algorithm: Option<MatchAlgorithm>,
    pub status: Option<MatchStatus>,
    pub confidence_level: Option<ConfidenceLevel>,
}

impl ResultFilter {
    pub fn for_algorithm(algorithm: MatchAlgorithm) -> Self {
        Self {
            algorithm: Some(algorithm),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: MatchStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_confidence_level(mut self, level: ConfidenceLevel) -> Self {
        self.confidence_level = Some(level);
        self
    }

    pub fn matches(&self, result: &MatchResult) -> bool {
        self.algorithm.map_or(true, |a| result.algorithm == a)
            && self.status.map_or(true, |s| result.status == s)
            && self.confidence_level.map_or(true, |l| result.confidence_level == l)
    }
}

/// Persistence collaborator of the reconciliation core.
///
/// `save_run` and `compare_and_set` must each be atomic with respect to
/// every other writer of the same store, including other `ReviewService`
/// and manager instances sharing it.
pub trait MatchStore: Send + Sync {
    /// Stored results of a village that pass `filter`, oldest first.
    fn results_for_village(&self, village_id: &str, filter: &ResultFilter) -> ReconcileResult<Vec<MatchResult>>;

    fn results_for_parcel(&self, parcel_id: &str) -> ReconcileResult<Vec<MatchResult>>;

    fn get(&self, match_id: Uuid) -> ReconcileResult<Option<MatchResult>>;

    /// Stores one run: drops the prior pending results listed in
    /// `supersedes` of the new results and in `retired`, then inserts the batch.
    ///
    /// A new result is refused when the pending row it supersedes has been
    /// reviewed since the run loaded it, or when `policy` would have skipped
    /// its pair against a reviewed row already stored. Returns the ids of
    /// the refused results.
    fn save_run(&self, results: &[MatchResult], retired: &[Uuid], policy: RerunPolicy) -> ReconcileResult<Vec<Uuid>>;

    /// Replaces the stored result with `updated` only if its status is still
    /// `expected`. Fails with `InvalidTransition` otherwise, and with
    /// `Conflict` when `updated` is verified while another result of the
    /// same parcel already is.
    fn compare_and_set(&self, expected: MatchStatus, updated: &MatchResult) -> ReconcileResult<()>;

    fn append_event(&self, event: ReviewEvent) -> ReconcileResult<()>;

    fn events_for_match(&self, match_id: Uuid) -> ReconcileResult<Vec<ReviewEvent>>;
}
