// src/matching/matcher.rs - Scores candidate pairs of one village and ranks suggestions
use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use uuid::Uuid;

use crate::candidate_generation::candidate_generation::generate_candidates;
use crate::errors::{ReconcileError, ReconcileResult};
use crate::matching::combiner::{score, PairScore};
use crate::models::core::{Parcel, TextRecord};
use crate::models::matching::{MatchAlgorithm, MatchResult, MatchStatus, SuggestionRank};
use crate::models::stats_models::RunStats;
use crate::utils::cancellation::CancellationFlag;
use crate::utils::config::{ReconcileConfig, RerunPolicy};
use crate::utils::progress_bars::logging::ReconcileLogger;
use crate::utils::signature::pair_signature;

/// Output of one village run.
#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    /// New pending suggestions, highest confidence first.
    pub results: Vec<MatchResult>,
    /// Prior pending results of the village that this run did not re-emit.
    pub retired: Vec<Uuid>,
    pub stats: RunStats,
}

struct ScoredPair<'a> {
    parcel: &'a Parcel,
    record: &'a TextRecord,
    score: PairScore,
    signature: String,
}

enum PairOutcome<'a> {
    SkippedTerminal,
    Scored { pair: ScoredPair<'a>, rescored_terminal: bool },
}

fn malformed_area(value: f64) -> bool {
    !value.is_finite() || value < 0.0
}

// Highest confidence first, then the better father-name match, then record id.
fn rank_order(a: &ScoredPair, b: &ScoredPair) -> Ordering {
    b.score
        .confidence
        .total_cmp(&a.score.confidence)
        .then_with(|| {
            let fa = a.score.scores.father_name.unwrap_or(-1.0);
            let fb = b.score.scores.father_name.unwrap_or(-1.0);
            fb.total_cmp(&fa)
        })
        .then_with(|| a.record.id.cmp(&b.record.id))
}

fn output_order(a: &MatchResult, b: &MatchResult) -> Ordering {
    let rank = |r: &MatchResult| match r.rank {
        SuggestionRank::Primary => 0,
        SuggestionRank::Alternative => 1,
    };
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.parcel_id.cmp(&b.parcel_id))
        .then_with(|| rank(a).cmp(&rank(b)))
        .then_with(|| a.text_record_id.cmp(&b.text_record_id))
}

/// Reconciles the parcels and text records of one village.
///
/// `prior` holds the results already stored for the village. Reviewed pairs
/// are handled per `config.rerun_policy`; prior pending results are replaced
/// by this run (`supersedes`) or reported in `retired`.
#[allow(clippy::too_many_arguments)]
pub fn run_reconciliation(
    village_id: &str,
    parcels: &[Parcel],
    text_records: &[TextRecord],
    algorithm: MatchAlgorithm,
    threshold: f64,
    prior: &[MatchResult],
    config: &ReconcileConfig,
    cancel: Option<&CancellationFlag>,
) -> ReconcileResult<ReconciliationOutcome> {
    let started = Instant::now();
    if !threshold.is_finite() || !(0.0..=100.0).contains(&threshold) {
        return Err(ReconcileError::InvalidInput(format!(
            "threshold must be within 0-100, got {}",
            threshold
        )));
    }
    config.validate()?;

    let logger = ReconcileLogger::new(village_id, algorithm);
    logger.log_start(algorithm, threshold);
    let mut stats = RunStats::new(village_id, algorithm, threshold);

    let stream = generate_candidates(parcels, text_records, config).restrict_to_village(village_id);

    let village_parcels = parcels.iter().filter(|p| p.village_id == village_id);
    let village_records = text_records.iter().filter(|r| r.village_id == village_id);
    stats.parcels = stream.parcel_count();
    stats.text_records = stream.index().village_record_count(village_id);
    stats.invalid_records = stream.index().skipped_records
        + village_parcels
            .filter(|p| p.id.trim().is_empty() || malformed_area(p.area_sqm))
            .count()
        + village_records
            .filter(|r| !r.id.trim().is_empty() && malformed_area(r.area_declared))
            .count();
    logger.log_data_loaded(stats.parcels, stats.text_records, stats.invalid_records);

    // Priors of other algorithms are independent and left alone.
    let mut terminal: HashMap<(&str, &str), &MatchResult> = HashMap::new();
    let mut pending: HashMap<(&str, &str), &MatchResult> = HashMap::new();
    for result in prior
        .iter()
        .filter(|r| r.village_id == village_id && r.algorithm == algorithm)
    {
        let key = (result.parcel_id.as_str(), result.text_record_id.as_str());
        if result.status.is_terminal() {
            terminal.insert(key, result);
        } else {
            pending.insert(key, result);
        }
    }
    logger.log_prior_results(terminal.len(), pending.len());

    logger.log_phase("Candidate generation", Some("blocking on owner token and plot prefix"));
    let candidate_pairs = stream.count_pairs();
    stats.candidate_pairs = candidate_pairs;
    logger.log_candidates(candidate_pairs, config.max_candidate_pairs);
    if candidate_pairs > config.max_candidate_pairs {
        return Err(ReconcileError::CapacityExceeded {
            village_id: village_id.to_string(),
            candidates: candidate_pairs,
            limit: config.max_candidate_pairs,
        });
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build()
        .map_err(|e| ReconcileError::InvalidConfig(format!("failed to build scoring pool: {}", e)))?;

    logger.log_phase("Scoring", None);
    let mut accepted: Vec<ScoredPair> = Vec::new();
    let mut stream = stream.peekable();
    while stream.peek().is_some() {
        if cancel.map_or(false, CancellationFlag::is_cancelled) {
            logger.log_warning(&format!("Cancelled after {} batches", stats.batches));
            return Err(ReconcileError::Cancelled {
                village_id: village_id.to_string(),
                batches_completed: stats.batches,
            });
        }

        let batch: Vec<(&Parcel, &TextRecord)> = stream.by_ref().take(config.batch_size).collect();
        let outcomes: Vec<PairOutcome> = pool.install(|| {
            batch
                .par_iter()
                .map(|&(parcel, record)| evaluate_pair(parcel, record, algorithm, config, &terminal))
                .collect()
        });

        for outcome in outcomes {
            match outcome {
                PairOutcome::SkippedTerminal => stats.skipped_terminal += 1,
                PairOutcome::Scored { pair, rescored_terminal } => {
                    stats.pairs_scored += 1;
                    if rescored_terminal {
                        stats.rescored_changed += 1;
                    }
                    if pair.score.confidence >= threshold {
                        accepted.push(pair);
                    }
                }
            }
        }
        stats.batches += 1;
        logger.log_batch_progress(stats.batches, batch.len(), accepted.len());
    }

    logger.log_phase("Ranking", Some("one primary suggestion per parcel"));
    let mut by_parcel: BTreeMap<&str, Vec<ScoredPair>> = BTreeMap::new();
    for pair in accepted {
        by_parcel.entry(pair.parcel.id.as_str()).or_default().push(pair);
    }

    let created_at = Utc::now();
    let mut results = Vec::new();
    for (_, mut pairs) in by_parcel {
        pairs.sort_by(rank_order);
        for (position, pair) in pairs.into_iter().enumerate() {
            let rank = if position == 0 {
                SuggestionRank::Primary
            } else {
                SuggestionRank::Alternative
            };
            let supersedes = pending
                .get(&(pair.parcel.id.as_str(), pair.record.id.as_str()))
                .map(|r| r.id);
            results.push(MatchResult {
                id: Uuid::new_v4(),
                parcel_id: pair.parcel.id.clone(),
                text_record_id: pair.record.id.clone(),
                village_id: village_id.to_string(),
                confidence: pair.score.confidence,
                confidence_level: pair.score.confidence_level(),
                scores: pair.score.scores,
                algorithm,
                rank,
                status: MatchStatus::Pending,
                created_at,
                verified_at: None,
                verified_by: None,
                rejection_reason: None,
                pair_signature: pair.signature,
                supersedes,
            });
        }
    }
    results.sort_by(output_order);

    let superseded: HashSet<Uuid> = results.iter().filter_map(|r| r.supersedes).collect();
    let mut retired: Vec<Uuid> = pending
        .values()
        .map(|r| r.id)
        .filter(|id| !superseded.contains(id))
        .collect();
    retired.sort();

    stats.pairs_accepted = results.len();
    stats.primary_suggestions = results.iter().filter(|r| r.rank == SuggestionRank::Primary).count();
    stats.superseded = superseded.len();
    stats.retired = retired.len();
    if !results.is_empty() {
        stats.avg_confidence = results.iter().map(|r| r.confidence).sum::<f64>() / results.len() as f64;
    }
    stats.elapsed = started.elapsed();
    logger.log_completion(&stats);

    Ok(ReconciliationOutcome {
        results,
        retired,
        stats,
    })
}

fn evaluate_pair<'a>(
    parcel: &'a Parcel,
    record: &'a TextRecord,
    algorithm: MatchAlgorithm,
    config: &ReconcileConfig,
    terminal: &HashMap<(&str, &str), &MatchResult>,
) -> PairOutcome<'a> {
    let signature = pair_signature(parcel, record);
    let reviewed = terminal.get(&(parcel.id.as_str(), record.id.as_str()));

    let rescored_terminal = match (reviewed, config.rerun_policy) {
        (None, _) => false,
        (Some(_), RerunPolicy::SkipTerminal) => return PairOutcome::SkippedTerminal,
        (Some(prior), RerunPolicy::RescoreChanged) => {
            if prior.pair_signature == signature {
                return PairOutcome::SkippedTerminal;
            }
            true
        }
        (Some(_), RerunPolicy::Force) => true,
    };

    PairOutcome::Scored {
        pair: ScoredPair {
            parcel,
            record,
            score: score(parcel, record, algorithm, config),
            signature,
        },
        rescored_terminal,
    }
}
