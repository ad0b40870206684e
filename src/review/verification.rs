// src/review/verification.rs - Pending -> verified | rejected transitions
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::{ReconcileError, ReconcileResult};
use crate::models::matching::{MatchResult, MatchStatus, ReviewEvent};
use crate::persistence::MatchStore;

/// Identity and time of a review decision, supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierStamp {
    pub verifier_id: String,
    pub verified_at: DateTime<Utc>,
    /// Kept on rejection, ignored on approval.
    #[serde(default)]
    pub reason: Option<String>,
}

impl VerifierStamp {
    pub fn now(verifier_id: &str) -> Self {
        Self {
            verifier_id: verifier_id.to_string(),
            verified_at: Utc::now(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }
}

/// Applies review decisions. The store's compare-and-set on `Pending` is the
/// single point of truth, so any number of services may share one store.
pub struct ReviewService {
    store: Arc<dyn MatchStore>,
}

impl ReviewService {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Approves (`approve = true`) or rejects a pending result.
    pub fn verify(&self, match_id: Uuid, approve: bool, stamp: VerifierStamp) -> ReconcileResult<MatchResult> {
        let target = if approve {
            MatchStatus::Verified
        } else {
            MatchStatus::Rejected
        };
        let current = self.store.get(match_id)?.ok_or(ReconcileError::NotFound(match_id))?;
        if current.status.is_terminal() {
            warn!(
                "Rejected transition {} -> {} for match {} by {}",
                current.status, target, match_id, stamp.verifier_id
            );
            return Err(ReconcileError::InvalidTransition {
                match_id,
                from: current.status,
                to: target,
            });
        }

        let mut updated = current.clone();
        updated.status = target;
        updated.verified_at = Some(stamp.verified_at);
        updated.verified_by = Some(stamp.verifier_id.clone());
        updated.rejection_reason = if approve { None } else { stamp.reason.clone() };

        // Another decision may land between the read above and this write.
        if let Err(e) = self.store.compare_and_set(MatchStatus::Pending, &updated) {
            warn!("Decision on match {} by {} refused: {}", match_id, stamp.verifier_id, e);
            return Err(e);
        }

        self.store.append_event(ReviewEvent {
            id: Uuid::new_v4(),
            match_id,
            parcel_id: updated.parcel_id.clone(),
            from: current.status,
            to: target,
            verifier_id: stamp.verifier_id,
            at: stamp.verified_at,
            reason: updated.rejection_reason.clone(),
        })?;

        info!(
            "Match {} ({} <-> {}) {} by {}",
            match_id,
            updated.parcel_id,
            updated.text_record_id,
            target,
            updated.verified_by.as_deref().unwrap_or_default()
        );
        Ok(updated)
    }

    /// Review events of a result, oldest first.
    pub fn history(&self, match_id: Uuid) -> ReconcileResult<Vec<ReviewEvent>> {
        self.store.events_for_match(match_id)
    }
}
