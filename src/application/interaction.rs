//! Bounded "View more" activation loop
//!
//! Each attempt walks the selector chain for a usable control. Missing or
//! disabled controls and transient interaction failures count against a
//! small patience budget; an invisible control ends the loop at once since
//! the list has been fully expanded.

#![allow(clippy::uninlined_format_args)]

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::infrastructure::browser::{self, BrowserResult, BrowserSurface, SYNTHETIC_CLICK, SurfaceElement};
use crate::infrastructure::config::InteractionConfig;
use crate::infrastructure::pacing::Pacer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Attempt budget used up
    Exhausted,
    /// No usable control for `failure_patience` consecutive attempts
    NotFound,
    /// Control present but hidden
    NotVisible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub clicks: u32,
    pub attempts: u32,
    pub stop: StopReason,
}

enum AttemptOutcome {
    Clicked,
    Missing,
    Hidden,
}

pub struct InteractionRetryController {
    settings: InteractionConfig,
    pacer: Arc<dyn Pacer>,
}

impl InteractionRetryController {
    pub fn new(settings: InteractionConfig, pacer: Arc<dyn Pacer>) -> Self {
        Self { settings, pacer }
    }

    /// Click the first usable control in `chain` up to `max_attempts` times.
    ///
    /// Only fatal surface errors propagate.
    pub async fn activate_more(
        &self,
        surface: &dyn BrowserSurface,
        max_attempts: u32,
        chain: &[String],
    ) -> BrowserResult<ActivationReport> {
        let patience = self.settings.failure_patience.max(1);
        let mut clicks = 0u32;
        let mut attempts = 0u32;
        let mut consecutive_failures = 0u32;

        while attempts < max_attempts {
            attempts += 1;

            let outcome = match self.attempt(surface, chain, &mut consecutive_failures).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("⚠️  View more attempt {} failed: {}", attempts, e);
                    AttemptOutcome::Missing
                }
            };

            match outcome {
                AttemptOutcome::Clicked => {
                    clicks += 1;
                    self.pacer.jitter(self.settings.post_click_wait).await;

                    let every = self.settings.aux_scroll_every;
                    if every > 0 && clicks % every == 0 {
                        if let Err(e) = browser::scroll_by(surface, self.settings.aux_scroll_px).await {
                            if e.is_fatal() {
                                return Err(e);
                            }
                            debug!("Auxiliary scroll failed: {}", e);
                        }
                        self.pacer.jitter(self.settings.aux_scroll_wait).await;
                    }
                    if clicks % 10 == 0 {
                        info!("📈 View more progress: {} clicks in {} attempts", clicks, attempts);
                    }
                }
                AttemptOutcome::Hidden => {
                    info!("View more control no longer visible after {} clicks", clicks);
                    return Ok(ActivationReport {
                        clicks,
                        attempts,
                        stop: StopReason::NotVisible,
                    });
                }
                AttemptOutcome::Missing => {
                    consecutive_failures += 1;
                    if consecutive_failures >= patience {
                        info!(
                            "No View more control after {} consecutive attempts ({} clicks)",
                            consecutive_failures, clicks
                        );
                        return Ok(ActivationReport {
                            clicks,
                            attempts,
                            stop: StopReason::NotFound,
                        });
                    }
                    self.pacer.jitter(self.settings.not_found_wait).await;
                }
            }
        }

        debug!("View more attempt budget exhausted: {} clicks", clicks);
        Ok(ActivationReport {
            clicks,
            attempts,
            stop: StopReason::Exhausted,
        })
    }

    async fn attempt(
        &self,
        surface: &dyn BrowserSurface,
        chain: &[String],
        consecutive_failures: &mut u32,
    ) -> BrowserResult<AttemptOutcome> {
        let Some(control) = find_enabled(surface, chain).await? else {
            return Ok(AttemptOutcome::Missing);
        };
        if !control.is_visible().await? {
            return Ok(AttemptOutcome::Hidden);
        }

        *consecutive_failures = 0;
        control.scroll_into_view().await?;
        self.pacer.jitter(self.settings.pre_click_wait).await;

        if let Err(e) = control.click(true).await {
            if e.is_fatal() {
                return Err(e);
            }
            debug!("Primary click failed ({}), falling back to synthetic click", e);
            control.evaluate(SYNTHETIC_CLICK).await?;
        }
        Ok(AttemptOutcome::Clicked)
    }
}

/// First enabled element found by walking the chain in order.
///
/// A selector that errors is skipped; only fatal errors end the walk.
async fn find_enabled(surface: &dyn BrowserSurface, chain: &[String]) -> BrowserResult<Option<Box<dyn SurfaceElement>>> {
    for selector in chain {
        let element = match surface.query(selector).await {
            Ok(Some(element)) => element,
            Ok(None) => continue,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!("Control selector '{}' failed: {}", selector, e);
                continue;
            }
        };
        match element.is_enabled().await {
            Ok(true) => return Ok(Some(element)),
            Ok(false) => debug!("Control '{}' is disabled", selector),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("Enabled check for '{}' failed: {}", selector, e),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::browser::BrowserError;
    use crate::test_utils::{MockControl, MockSurface, RecordingPacer};

    fn chain() -> Vec<String> {
        vec![".view-more-btn".to_string(), "button.more".to_string()]
    }

    fn controller(pacer: Arc<RecordingPacer>) -> InteractionRetryController {
        InteractionRetryController::new(InteractionConfig::default(), pacer)
    }

    #[tokio::test]
    async fn test_missing_control_stops_after_patience() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>");

        let report = controller(pacer.clone()).activate_more(&surface, 25, &chain()).await.unwrap();

        assert_eq!(report.attempts, 3);
        assert_eq!(report.clicks, 0);
        assert_eq!(report.stop, StopReason::NotFound);
        // Two not-found waits; the third failure stops immediately
        assert_eq!(pacer.count(), 2);
    }

    #[tokio::test]
    async fn test_always_present_control_clicks_every_attempt() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>").with_control("button.more", MockControl::always());

        let report = controller(pacer).activate_more(&surface, 12, &chain()).await.unwrap();

        assert_eq!(report.clicks, 12);
        assert_eq!(report.attempts, 12);
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(surface.clicks("button.more"), 12);
        // Auxiliary scroll after clicks 5 and 10
        assert_eq!(surface.scripts_containing("scrollBy(0, 300)"), 2);
    }

    #[tokio::test]
    async fn test_hidden_control_stops_immediately() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>").with_control(".view-more-btn", MockControl::always().hidden());

        let report = controller(pacer).activate_more(&surface, 25, &chain()).await.unwrap();
        assert_eq!(report.stop, StopReason::NotVisible);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.clicks, 0);
    }

    #[tokio::test]
    async fn test_control_disappearing_resets_then_exhausts_patience() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>").with_control(".view-more-btn", MockControl::times(4));

        let report = controller(pacer).activate_more(&surface, 25, &chain()).await.unwrap();
        assert_eq!(report.clicks, 4);
        assert_eq!(report.attempts, 7);
        assert_eq!(report.stop, StopReason::NotFound);
    }

    #[tokio::test]
    async fn test_disabled_control_counts_as_missing() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>").with_control(".view-more-btn", MockControl::always().disabled());

        let report = controller(pacer).activate_more(&surface, 25, &chain()).await.unwrap();
        assert_eq!(report.stop, StopReason::NotFound);
        assert_eq!(surface.clicks(".view-more-btn"), 0);
    }

    #[tokio::test]
    async fn test_failed_primary_click_uses_synthetic_click() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>")
            .with_control(".view-more-btn", MockControl::always().failing_click());

        let report = controller(pacer).activate_more(&surface, 3, &chain()).await.unwrap();
        assert_eq!(report.clicks, 3);
        assert_eq!(surface.synthetic_clicks(".view-more-btn"), 3);
    }

    #[tokio::test]
    async fn test_erroring_selector_falls_through_to_the_next() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>")
            .with_query_failure(".view-more-btn", BrowserError::Evaluation("Execution context was destroyed".into()))
            .with_control("button.more", MockControl::always());

        let report = controller(pacer).activate_more(&surface, 5, &chain()).await.unwrap();
        assert_eq!(report.clicks, 5);
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(surface.clicks("button.more"), 5);
    }

    #[tokio::test]
    async fn test_fatal_query_error_ends_the_walk() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>")
            .with_query_failure(".view-more-btn", BrowserError::SessionClosed("target closed".into()))
            .with_control("button.more", MockControl::always());

        let err = controller(pacer).activate_more(&surface, 5, &chain()).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(surface.clicks("button.more"), 0);
    }

    #[tokio::test]
    async fn test_fatal_error_propagates() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>");
        surface.close_with(BrowserError::SessionClosed("crashed".into()));

        let err = controller(pacer).activate_more(&surface, 25, &chain()).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_zero_budget_does_nothing() {
        let pacer = Arc::new(RecordingPacer::new());
        let surface = MockSurface::new("<html></html>").with_control("button.more", MockControl::always());

        let report = controller(pacer.clone()).activate_more(&surface, 0, &chain()).await.unwrap();
        assert_eq!(report.attempts, 0);
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(pacer.count(), 0);
    }
}
