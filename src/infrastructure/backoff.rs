//! Session retry backoff
//!
//! Exponential backoff with additive jitter between whole-session attempts:
//! `base * multiplier^attempt + uniform(0, jitter)`.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff settings between session attempts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Maximum number of session attempts (the first one included)
    pub max_attempts: u32,
    /// Base delay in seconds
    pub base_delay_secs: f64,
    /// Growth factor per attempt
    pub backoff_multiplier: f64,
    /// Upper bound of the additive uniform jitter in seconds
    pub jitter_secs: f64,
    /// Cap applied before jitter
    pub max_delay_secs: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2.0,
            backoff_multiplier: 2.0,
            jitter_secs: 1.0,
            max_delay_secs: 120.0,
        }
    }
}

/// Backoff calculator for session attempts
#[derive(Debug, Clone, Copy)]
pub struct BackoffCalculator {
    policy: BackoffPolicy,
}

impl BackoffCalculator {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Whether another attempt follows the zero-based `attempt`
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.policy.max_attempts
    }

    /// Deterministic part of the delay after the zero-based `attempt`
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = (self.policy.base_delay_secs * self.policy.backoff_multiplier.powi(exponent))
            .min(self.policy.max_delay_secs);
        secs_to_duration(secs)
    }

    /// Full delay after the zero-based `attempt`, jitter included
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.policy.jitter_secs > 0.0 {
            fastrand::f64() * self.policy.jitter_secs
        } else {
            0.0
        };
        self.base_delay(attempt) + secs_to_duration(jitter)
    }
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    }
}
