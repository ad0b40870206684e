// src/matching/similarity.rs - String similarity scorers, each normalised to [0, 1]
use serde::Serialize;
use std::collections::HashMap;
use strsim::{jaro, normalized_levenshtein};

use crate::errors::ReconcileError;
use crate::models::matching::ScorerKind;

/// Parameters of the prefix boost applied on top of Jaro.
#[derive(Debug, Clone, Serialize)]
pub struct PrefixWeights {
    pub scaling_factor: f64,
    pub max_prefix: usize,
    /// The boost only applies when plain Jaro is above this value.
    pub boost_threshold: f64,
}

impl Default for PrefixWeights {
    fn default() -> Self {
        Self {
            scaling_factor: 0.1,
            max_prefix: 4,
            boost_threshold: 0.7,
        }
    }
}

impl PrefixWeights {
    /// `scaling_factor * max_prefix` must not exceed 1 or the boosted score leaves [0, 1].
    pub fn validate(&self) -> Result<(), ReconcileError> {
        if !self.scaling_factor.is_finite() || self.scaling_factor < 0.0 {
            return Err(ReconcileError::InvalidConfig(format!(
                "prefix scaling factor must be a non-negative number, got {}",
                self.scaling_factor
            )));
        }
        if self.scaling_factor * self.max_prefix as f64 > 1.0 {
            return Err(ReconcileError::InvalidConfig(format!(
                "prefix scaling factor {} times max prefix {} exceeds 1",
                self.scaling_factor, self.max_prefix
            )));
        }
        if !(0.0..=1.0).contains(&self.boost_threshold) {
            return Err(ReconcileError::InvalidConfig(format!(
                "prefix boost threshold must be within 0-1, got {}",
                self.boost_threshold
            )));
        }
        Ok(())
    }
}

/// 1 - edit distance / longer length, counted in chars.
pub fn edit_distance_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    normalized_levenshtein(a, b).clamp(0.0, 1.0)
}

/// Jaro similarity with the common-prefix boost.
pub fn prefix_weighted_similarity(a: &str, b: &str, weights: &PrefixWeights) -> f64 {
    if a == b {
        return 1.0;
    }
    let base = jaro(a, b);
    if base <= weights.boost_threshold {
        return base.clamp(0.0, 1.0);
    }
    let prefix = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .take(weights.max_prefix)
        .count();
    (base + prefix as f64 * weights.scaling_factor * (1.0 - base)).clamp(0.0, 1.0)
}

fn term_frequencies(s: &str) -> HashMap<&str, u64> {
    let mut tf = HashMap::new();
    for token in s.split_whitespace() {
        *tf.entry(token).or_insert(0) += 1;
    }
    tf
}

/// Cosine of whitespace-token frequency vectors.
pub fn token_cosine_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let tf_a = term_frequencies(a);
    let tf_b = term_frequencies(b);

    // Integer arithmetic keeps the score exactly symmetric.
    let norm_a: u64 = tf_a.values().map(|c| c * c).sum();
    let norm_b: u64 = tf_b.values().map(|c| c * c).sum();
    if norm_a == 0 || norm_b == 0 {
        return 0.0;
    }
    let dot: u64 = tf_a
        .iter()
        .filter_map(|(token, ca)| tf_b.get(token).map(|cb| ca * cb))
        .sum();

    (dot as f64 / ((norm_a * norm_b) as f64).sqrt()).clamp(0.0, 1.0)
}

pub fn similarity(kind: ScorerKind, a: &str, b: &str, weights: &PrefixWeights) -> f64 {
    match kind {
        ScorerKind::Levenshtein => edit_distance_similarity(a, b),
        ScorerKind::JaroWinkler => prefix_weighted_similarity(a, b, weights),
        ScorerKind::Cosine => token_cosine_similarity(a, b),
    }
}
