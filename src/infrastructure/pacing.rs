//! Human-like pacing of browser interactions
//!
//! Every timed wait in the pipeline goes through a [`Pacer`] so tests can
//! record or skip waits instead of sleeping.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Uniform random delay window in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JitterWindow {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl JitterWindow {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    /// A fixed delay with no randomness
    pub const fn fixed(secs: f64) -> Self {
        Self::new(secs, secs)
    }

    /// Draw a delay uniformly from the window
    pub fn sample(&self) -> Duration {
        let secs = if self.max_secs > self.min_secs {
            self.min_secs + fastrand::f64() * (self.max_secs - self.min_secs)
        } else {
            self.min_secs
        };
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::ZERO)
    }
}

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, duration: Duration);

    /// Sleep for a random delay drawn from `window`
    async fn jitter(&self, window: JitterWindow) -> Duration {
        let delay = window.sample();
        self.pause(delay).await;
        delay
    }
}

/// Real sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
