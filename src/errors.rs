// src/errors.rs - Typed failures surfaced by the reconciliation core
use thiserror::Error;
use uuid::Uuid;

use crate::models::matching::MatchStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    /// Malformed record fields or call arguments. Inside a run this only
    /// degrades the affected pair; it is returned directly for bad arguments.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid transition for match {match_id}: {from} -> {to}")]
    InvalidTransition {
        match_id: Uuid,
        from: MatchStatus,
        to: MatchStatus,
    },

    #[error(
        "Conflict: parcel {parcel_id} already has verified match {verified_match_id}; refusing to verify {match_id}"
    )]
    Conflict {
        match_id: Uuid,
        parcel_id: String,
        verified_match_id: Uuid,
    },

    #[error("Capacity exceeded for village {village_id}: {candidates} candidate pairs (limit {limit})")]
    CapacityExceeded {
        village_id: String,
        candidates: usize,
        limit: usize,
    },

    #[error("Match not found: {0}")]
    NotFound(Uuid),

    #[error("Reconciliation for village {village_id} cancelled after {batches_completed} batches")]
    Cancelled {
        village_id: String,
        batches_completed: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
