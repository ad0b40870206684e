//! Reconciliation run configuration.
//! Every knob has a default and can be overridden through `RECONCILE_*`
//! environment variables (optionally loaded from a `.env` file).

use log::{debug, info, warn};
use serde::Serialize;
use std::env;
use std::fmt;
use std::str::FromStr;

use crate::errors::ReconcileError;
use crate::matching::combiner::CombinerWeights;
use crate::matching::similarity::PrefixWeights;
use crate::models::matching::MatchAlgorithm;

pub const DEFAULT_THRESHOLD: f64 = 70.0;
pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_CANDIDATE_PAIRS: usize = 2_000_000;
pub const DEFAULT_PLOT_PREFIX_LEN: usize = 4;

/// What a re-run does with pairs that already reached a terminal review outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunPolicy {
    /// Never re-score a verified or rejected pair.
    SkipTerminal,
    /// Re-score a terminal pair only when either record changed since review.
    RescoreChanged,
    /// Explicit re-run: score every candidate pair again.
    Force,
}

impl RerunPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RerunPolicy::SkipTerminal => "skip_terminal",
            RerunPolicy::RescoreChanged => "rescore_changed",
            RerunPolicy::Force => "force",
        }
    }
}

impl fmt::Display for RerunPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RerunPolicy {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip_terminal" | "skip" => Ok(RerunPolicy::SkipTerminal),
            "rescore_changed" | "changed" => Ok(RerunPolicy::RescoreChanged),
            "force" => Ok(RerunPolicy::Force),
            other => Err(ReconcileError::InvalidInput(format!("unknown rerun policy '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileConfig {
    /// Minimum confidence (0-100) for a pair to become a suggestion.
    pub threshold: f64,
    pub algorithm: MatchAlgorithm,
    /// Candidate pairs scored per parallel batch; cancellation is checked between batches.
    pub batch_size: usize,
    /// Safety bound on candidate pairs for one village.
    pub max_candidate_pairs: usize,
    pub worker_threads: usize,
    /// Leading characters of the normalized plot id used as a blocking key.
    pub plot_prefix_len: usize,
    pub weights: CombinerWeights,
    pub prefix: PrefixWeights,
    pub rerun_policy: RerunPolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            algorithm: MatchAlgorithm::Combined,
            batch_size: DEFAULT_BATCH_SIZE,
            max_candidate_pairs: DEFAULT_MAX_CANDIDATE_PAIRS,
            worker_threads: num_cpus::get(),
            plot_prefix_len: DEFAULT_PLOT_PREFIX_LEN,
            weights: CombinerWeights::default(),
            prefix: PrefixWeights::default(),
            rerun_policy: RerunPolicy::SkipTerminal,
        }
    }
}

pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Ignoring unparsable {}='{}', using default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

impl ReconcileConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let config = Self {
            threshold: env_or("RECONCILE_THRESHOLD", defaults.threshold),
            algorithm: env_or("RECONCILE_ALGORITHM", defaults.algorithm),
            batch_size: env_or("RECONCILE_BATCH_SIZE", defaults.batch_size),
            max_candidate_pairs: env_or("RECONCILE_MAX_CANDIDATE_PAIRS", defaults.max_candidate_pairs),
            worker_threads: env_or("RECONCILE_WORKER_THREADS", defaults.worker_threads),
            plot_prefix_len: env_or("RECONCILE_PLOT_PREFIX_LEN", defaults.plot_prefix_len),
            weights: CombinerWeights {
                owner_name: env_or("RECONCILE_WEIGHT_NAME", defaults.weights.owner_name),
                plot_id: env_or("RECONCILE_WEIGHT_PLOT", defaults.weights.plot_id),
                area: env_or("RECONCILE_WEIGHT_AREA", defaults.weights.area),
            },
            prefix: PrefixWeights {
                scaling_factor: env_or("RECONCILE_PREFIX_SCALING", defaults.prefix.scaling_factor),
                max_prefix: env_or("RECONCILE_PREFIX_MAX_LEN", defaults.prefix.max_prefix),
                boost_threshold: env_or("RECONCILE_PREFIX_BOOST_THRESHOLD", defaults.prefix.boost_threshold),
            },
            rerun_policy: env_or("RECONCILE_RERUN_POLICY", defaults.rerun_policy),
        };
        debug!("Reconcile config from env: {:?}", config);
        config
    }

    pub fn with_algorithm(mut self, algorithm: MatchAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        if !(0.0..=100.0).contains(&self.threshold) {
            return Err(ReconcileError::InvalidInput(format!(
                "threshold must be within 0-100, got {}",
                self.threshold
            )));
        }
        if self.batch_size == 0 {
            return Err(ReconcileError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.worker_threads == 0 {
            return Err(ReconcileError::InvalidConfig("worker_threads must be positive".into()));
        }
        if self.plot_prefix_len == 0 {
            return Err(ReconcileError::InvalidConfig("plot_prefix_len must be positive".into()));
        }
        self.weights.validate()?;
        self.prefix.validate()?;
        Ok(())
    }

    /// Log the current configuration
    pub fn log_config(&self) {
        info!("⚙️  Reconciliation configuration:");
        info!("   • algorithm: {} (threshold {:.1})", self.algorithm, self.threshold);
        info!(
            "   • batches of {} pairs on {} worker threads",
            self.batch_size, self.worker_threads
        );
        info!("   • candidate safety bound: {} pairs per village", self.max_candidate_pairs);
        info!(
            "   • weights: name {:.2}, plot {:.2}, area {:.2}",
            self.weights.owner_name, self.weights.plot_id, self.weights.area
        );
        info!("   • rerun policy: {}", self.rerun_policy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::matching::ScorerKind;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReconcileConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.algorithm, MatchAlgorithm::Combined);
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.rerun_policy, RerunPolicy::SkipTerminal);
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("RECONCILE_THRESHOLD", "82.5");
        env::set_var("RECONCILE_ALGORITHM", "jaro_winkler");
        env::set_var("RECONCILE_BATCH_SIZE", "not-a-number");
        env::set_var("RECONCILE_RERUN_POLICY", "force");

        let config = ReconcileConfig::from_env();
        assert_eq!(config.threshold, 82.5);
        assert_eq!(config.algorithm, MatchAlgorithm::Single(ScorerKind::JaroWinkler));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.rerun_policy, RerunPolicy::Force);

        // Clean up
        env::remove_var("RECONCILE_THRESHOLD");
        env::remove_var("RECONCILE_ALGORITHM");
        env::remove_var("RECONCILE_BATCH_SIZE");
        env::remove_var("RECONCILE_RERUN_POLICY");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ReconcileConfig::default().with_threshold(120.0);
        assert!(matches!(config.validate(), Err(ReconcileError::InvalidInput(_))));

        let mut config = ReconcileConfig::default();
        config.batch_size = 0;
        assert!(matches!(config.validate(), Err(ReconcileError::InvalidConfig(_))));

        let mut config = ReconcileConfig::default();
        config.weights.area = 0.5;
        assert!(config.validate().is_err());

        let mut config = ReconcileConfig::default();
        config.prefix.scaling_factor = 0.3;
        assert!(config.validate().is_err());
    }
}
