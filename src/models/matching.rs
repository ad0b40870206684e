// src/models/matching.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ReconcileError;

/// Individual string similarity algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScorerKind {
    /// Normalized edit distance.
    Levenshtein,
    /// Jaro with a boosted common prefix.
    JaroWinkler,
    /// Cosine over whitespace token frequencies.
    Cosine,
}

impl ScorerKind {
    pub const ALL: [ScorerKind; 3] = [ScorerKind::Levenshtein, ScorerKind::JaroWinkler, ScorerKind::Cosine];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScorerKind::Levenshtein => "levenshtein",
            ScorerKind::JaroWinkler => "jaro_winkler",
            ScorerKind::Cosine => "cosine",
        }
    }
}

/// Algorithm selector for a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MatchAlgorithm {
    /// One scorer applied to the owner name only.
    Single(ScorerKind),
    /// Best owner-name scorer blended with plot id and area evidence.
    Combined,
}

impl MatchAlgorithm {
    pub const SUPPORTED: [MatchAlgorithm; 4] = [
        MatchAlgorithm::Single(ScorerKind::Levenshtein),
        MatchAlgorithm::Single(ScorerKind::JaroWinkler),
        MatchAlgorithm::Single(ScorerKind::Cosine),
        MatchAlgorithm::Combined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchAlgorithm::Single(kind) => kind.as_str(),
            MatchAlgorithm::Combined => "combined",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MatchAlgorithm::Single(ScorerKind::Levenshtein) => "Edit distance based name matching",
            MatchAlgorithm::Single(ScorerKind::JaroWinkler) => "Jaro-Winkler similarity (optimized for names)",
            MatchAlgorithm::Single(ScorerKind::Cosine) => "Token-based cosine similarity",
            MatchAlgorithm::Combined => "Weighted combination of name, area, and plot ID matching",
        }
    }
}

impl fmt::Display for MatchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchAlgorithm {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "levenshtein" | "edit_distance" => Ok(MatchAlgorithm::Single(ScorerKind::Levenshtein)),
            "jaro_winkler" | "jaro-winkler" | "prefix" => Ok(MatchAlgorithm::Single(ScorerKind::JaroWinkler)),
            "cosine" | "token" => Ok(MatchAlgorithm::Single(ScorerKind::Cosine)),
            "combined" => Ok(MatchAlgorithm::Combined),
            other => Err(ReconcileError::InvalidInput(format!("unknown algorithm '{}'", other))),
        }
    }
}

impl TryFrom<String> for MatchAlgorithm {
    type Error = ReconcileError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MatchAlgorithm> for String {
    fn from(value: MatchAlgorithm) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Verified,
    Rejected,
}

impl MatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchStatus::Verified | MatchStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Verified => "verified",
            MatchStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 80.0 {
            ConfidenceLevel::High
        } else if confidence >= 50.0 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Position of a result among the surviving candidates of its parcel.
/// Informational only: every suggestion stays pending for review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionRank {
    Primary,
    Alternative,
}

/// Owner-name similarity per scorer. Only the scorers that ran are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameScores {
    pub levenshtein: Option<f64>,
    pub jaro_winkler: Option<f64>,
    pub cosine: Option<f64>,
}

impl NameScores {
    pub fn set(&mut self, kind: ScorerKind, score: f64) {
        match kind {
            ScorerKind::Levenshtein => self.levenshtein = Some(score),
            ScorerKind::JaroWinkler => self.jaro_winkler = Some(score),
            ScorerKind::Cosine => self.cosine = Some(score),
        }
    }

    pub fn best(&self) -> Option<f64> {
        [self.levenshtein, self.jaro_winkler, self.cosine]
            .into_iter()
            .flatten()
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))))
    }
}

/// Per-field similarities of one candidate pair, each in [0, 1].
/// `None` means the field is absent on at least one side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldScores {
    pub owner_name: f64,
    pub owner_name_by_scorer: NameScores,
    pub father_name: Option<f64>,
    pub plot_id: Option<f64>,
    pub area: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: Uuid,
    pub parcel_id: String,
    pub text_record_id: String,
    pub village_id: String,
    pub scores: FieldScores,
    /// Combined confidence in [0, 100], one decimal place.
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub algorithm: MatchAlgorithm,
    pub rank: SuggestionRank,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub rejection_reason: Option<String>,
    /// Fingerprint of the matching fields of both records at scoring time.
    pub pair_signature: String,
    /// Prior pending result this one replaced.
    pub supersedes: Option<Uuid>,
}

impl MatchResult {
    pub fn pair_key(&self) -> (String, String) {
        (self.parcel_id.clone(), self.text_record_id.clone())
    }
}

/// Audit entry for one review transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub id: Uuid,
    pub match_id: Uuid,
    pub parcel_id: String,
    pub from: MatchStatus,
    pub to: MatchStatus,
    pub verifier_id: String,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_names_round_trip_through_serde() {
        for algorithm in MatchAlgorithm::SUPPORTED {
            let json = serde_json::to_string(&algorithm).unwrap();
            assert_eq!(json, format!("\"{}\"", algorithm.as_str()));
            let back: MatchAlgorithm = serde_json::from_str(&json).unwrap();
            assert_eq!(back, algorithm);
        }
        assert!(serde_json::from_str::<MatchAlgorithm>("\"soundex\"").is_err());
    }

    #[test]
    fn test_confidence_levels() {
        assert_eq!(ConfidenceLevel::from_confidence(80.0), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_confidence(79.9), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(50.0), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(12.0), ConfidenceLevel::Low);
    }

    #[test]
    fn test_best_name_score_ignores_unset_scorers() {
        let mut scores = NameScores::default();
        assert_eq!(scores.best(), None);
        scores.set(ScorerKind::Cosine, 0.5);
        scores.set(ScorerKind::Levenshtein, 0.9);
        assert_eq!(scores.best(), Some(0.9));
    }
}
