pub mod candidate_generation;
pub mod errors;
pub mod matching;
pub mod models;
pub mod persistence;
pub mod review;
pub mod utils;

pub use candidate_generation::candidate_generation::{generate_candidates, CandidateStream};
pub use errors::{ReconcileError, ReconcileResult};
pub use matching::combiner::{score, PairScore};
pub use matching::manager::ReconciliationManager;
pub use matching::matcher::{run_reconciliation, ReconciliationOutcome};
pub use models::core::{AreaUnit, Parcel, TextRecord};
pub use models::matching::{MatchAlgorithm, MatchResult, MatchStatus, ReviewEvent, ScorerKind};
pub use models::stats_models::{ReconciliationStats, RunStats};
pub use persistence::{InMemoryMatchStore, MatchStore, ResultFilter};
pub use utils::cancellation::CancellationFlag;
pub use review::verification::{ReviewService, VerifierStamp};
pub use utils::config::{ReconcileConfig, RerunPolicy};
