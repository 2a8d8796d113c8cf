//! Secondary relevance ranking on top of cosine similarity

use crate::error::ConfigError;
use crate::types::CodeEmbedding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Weights of the relevance score.
///
/// The score is the weighted mean of the ranking factors. With a positive
/// similarity weight and the other factors held equal, a lower similarity can
/// never produce a higher relevance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub similarity_weight: f32,
    pub recency_weight: f32,
    pub tag_weight: f32,
    pub complexity_weight: f32,
    /// Age at which the recency factor drops to 0.5
    pub recency_half_life_days: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            similarity_weight: 0.7,
            recency_weight: 0.15,
            tag_weight: 0.1,
            complexity_weight: 0.05,
            recency_half_life_days: 30.0,
        }
    }
}

/// Per-result factors, each in [0, 1] except similarity which is the raw cosine
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingFactors {
    pub similarity: f32,
    pub recency: f32,
    pub tag_match: f32,
    pub complexity: f32,
}

impl RankingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [
            ("similarity_weight", self.similarity_weight),
            ("recency_weight", self.recency_weight),
            ("tag_weight", self.tag_weight),
            ("complexity_weight", self.complexity_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid {
                    reason: format!("ranking.{name} must be a non-negative number, got {weight}"),
                });
            }
        }
        if self.similarity_weight <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: "ranking.similarity_weight must be greater than 0".to_string(),
            });
        }
        if !self.recency_half_life_days.is_finite() || self.recency_half_life_days <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "ranking.recency_half_life_days must be positive, got {}",
                    self.recency_half_life_days
                ),
            });
        }
        Ok(())
    }

    /// Compute the ranking factors of `record` at time `now`
    pub fn factors(
        &self,
        record: &CodeEmbedding,
        similarity: f32,
        boost_tags: &[String],
        now: DateTime<Utc>,
    ) -> RankingFactors {
        RankingFactors {
            similarity,
            recency: self.recency(record.metadata.last_modified, now),
            tag_match: tag_match(record, boost_tags),
            complexity: (1.0 / (1.0 + record.metadata.complexity.max(0.0))) as f32,
        }
    }

    /// Weighted mean of `factors`
    pub fn relevance(&self, factors: &RankingFactors) -> f32 {
        let total = self.similarity_weight
            + self.recency_weight
            + self.tag_weight
            + self.complexity_weight;
        if total <= 0.0 {
            return factors.similarity;
        }

        (self.similarity_weight * factors.similarity
            + self.recency_weight * factors.recency
            + self.tag_weight * factors.tag_match
            + self.complexity_weight * factors.complexity)
            / total
    }

    fn recency(&self, last_modified: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
        let age_days = (now - last_modified).num_milliseconds() as f64 / MILLIS_PER_DAY;
        if age_days <= 0.0 || self.recency_half_life_days <= 0.0 {
            return 1.0;
        }
        0.5_f64.powf(age_days / self.recency_half_life_days) as f32
    }
}

fn tag_match(record: &CodeEmbedding, boost_tags: &[String]) -> f32 {
    if boost_tags.is_empty() {
        return 0.0;
    }
    let matched = boost_tags
        .iter()
        .filter(|tag| record.metadata.tags.contains(tag.as_str()))
        .count();
    matched as f32 / boost_tags.len() as f32
}
