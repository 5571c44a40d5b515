//! Engagement score estimation
//!
//! A bounded 1-10 popularity estimate built additively from a neutral base.
//! Two magnitude policies exist; the policy picks the bonus scale used for
//! every other step so relative weights stay proportionate.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constants::scoring::{
    BASE_SCORE, HIGH_ENGAGEMENT_CATEGORIES, MAX_SCORE, MEDIUM_ENGAGEMENT_CATEGORIES, MIN_SCORE,
    SHORT_HASHTAG_LEN, TRENDING_KEYWORDS,
};
use super::numeric;

/// How post counts translate into score points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// `min(4.0, log10(posts) / 2)`; smooth, capped at 10^8 posts
    #[default]
    Logarithmic,
    /// Fixed steps at 1e6 / 5e5 / 1e5 / 5e4 with a penalty below 1e3
    Bucketed,
}

/// Per-policy bonus weights
#[derive(Debug, Clone, Copy)]
struct Weights {
    high_category: f64,
    keyword: f64,
    short_bonus: f64,
    long_penalty: f64,
    long_threshold: usize,
}

impl ScoringPolicy {
    fn weights(self) -> Weights {
        match self {
            Self::Logarithmic => Weights {
                high_category: 0.5,
                keyword: 0.3,
                short_bonus: 0.2,
                long_penalty: 0.2,
                long_threshold: 25,
            },
            Self::Bucketed => Weights {
                high_category: 1.0,
                keyword: 0.5,
                short_bonus: 0.3,
                long_penalty: 0.2,
                long_threshold: 20,
            },
        }
    }

    fn magnitude_points(self, posts: i64) -> f64 {
        let posts = posts as f64;
        match self {
            Self::Logarithmic => (posts.log10() / 2.0).min(4.0),
            Self::Bucketed => {
                if posts >= 1_000_000.0 {
                    2.0
                } else if posts >= 500_000.0 {
                    1.5
                } else if posts >= 100_000.0 {
                    1.0
                } else if posts >= 50_000.0 {
                    0.5
                } else if posts < 1_000.0 {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Deterministic engagement scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementScorer {
    policy: ScoringPolicy,
}

impl EngagementScorer {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    /// Score a hashtag in `[1.0, 10.0]`, rounded to one decimal.
    ///
    /// `element_text` is the flattened row text; it is part of the scoring
    /// contract but no current policy weighs it. Any non-finite intermediate
    /// falls back to the neutral base score.
    pub fn score(
        &self,
        hashtag: &str,
        posts_raw: Option<&str>,
        category: &str,
        _element_text: &str,
    ) -> f64 {
        let weights = self.policy.weights();
        let mut score = BASE_SCORE;

        if let Some(posts) = numeric::normalize_opt(posts_raw).filter(|p| *p > 0) {
            score += self.policy.magnitude_points(posts);
        }

        if HIGH_ENGAGEMENT_CATEGORIES.contains(&category) {
            score += weights.high_category;
        } else if MEDIUM_ENGAGEMENT_CATEGORIES.contains(&category) {
            score += weights.high_category / 2.0;
        }

        if !hashtag.is_empty() {
            let lower = hashtag.to_lowercase();
            if TRENDING_KEYWORDS.iter().any(|k| lower.contains(k)) {
                score += weights.keyword;
            }

            let length = hashtag.chars().count();
            if length <= SHORT_HASHTAG_LEN {
                score += weights.short_bonus;
            } else if length > weights.long_threshold {
                score -= weights.long_penalty;
            }
        }

        if !score.is_finite() {
            debug!("Non-finite engagement score for {}, using neutral default", hashtag);
            return BASE_SCORE;
        }

        round_one_decimal(score.clamp(MIN_SCORE, MAX_SCORE))
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
