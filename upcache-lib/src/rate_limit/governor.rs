//! Fixed window rate governor with minimum spacing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use super::RateLimitConfig;
use crate::clock::Clock;
use crate::clock::SystemClock;

/// Paces every outbound call to one upstream service.
///
/// Counts grants in a window that resets once `window` has elapsed since it
/// started, and keeps at least `min_spacing` between consecutive grants.
/// Callers that arrive too early are suspended, never rejected.
///
/// This governor is cheap to clone; clones share the same counters, so the
/// token cache and all fetchers of one upstream should hold clones of a single
/// instance.
///
/// # Example
///
/// ```
/// use upcache_lib::rate_limit::{RateGovernor, RateLimitConfig};
///
/// // 55 calls per minute, 1.1s apart
/// let governor = RateGovernor::new(RateLimitConfig::default());
/// assert_eq!(governor.max_per_window(), 55);
/// ```
#[derive(Clone)]
pub struct RateGovernor {
    inner: Arc<RateGovernorInner>,
}

struct RateGovernorInner {
    state: Mutex<GovernorState>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

struct GovernorState {
    window_start: Instant,
    granted_in_window: u32,
    last_grant: Option<Instant>,
}

impl GovernorState {
    fn roll_window(&mut self, now: Instant, window: Duration) {
        if now.saturating_duration_since(self.window_start) >= window {
            self.window_start = now;
            self.granted_in_window = 0;
        }
    }

    /// Time until the current window ends. A window too long to represent as
    /// an `Instant` never ends early.
    fn resets_in(&self, now: Instant, window: Duration) -> Duration {
        match self.window_start.checked_add(window) {
            Some(resets_at) => resets_at.saturating_duration_since(now),
            None => window,
        }
    }
}

impl RateGovernor {
    /// Creates a governor on the system clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a governor on the given clock.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            inner: Arc::new(RateGovernorInner {
                state: Mutex::new(GovernorState {
                    window_start: now,
                    granted_in_window: 0,
                    last_grant: None,
                }),
                config,
                clock,
            }),
        }
    }

    /// Waits until a call may be made, then records the grant.
    pub async fn acquire(&self) {
        let config = &self.inner.config;
        loop {
            let wait = {
                let mut state = self.inner.state.lock().await;
                let now = self.inner.clock.now();
                state.roll_window(now, config.window);

                let mut wait = Duration::ZERO;

                if state.granted_in_window >= config.max_per_window {
                    wait = state.resets_in(now, config.window);
                }

                if let Some(last) = state.last_grant {
                    let since = now.saturating_duration_since(last);
                    if since < config.min_spacing {
                        wait = wait.max(config.min_spacing - since);
                    }
                }

                if wait.is_zero() {
                    state.granted_in_window += 1;
                    state.last_grant = Some(now);
                    return;
                }

                if state.granted_in_window >= config.max_per_window {
                    log::info!(
                        "rate limit reached ({} per {:?}), waiting {:.1}s",
                        config.max_per_window,
                        config.window,
                        wait.as_secs_f64()
                    );
                } else {
                    log::debug!("spacing upstream call, waiting {}ms", wait.as_millis());
                }
                wait
            };

            // Wait outside the lock, then decide again
            self.inner.clock.sleep(wait).await;
        }
    }

    /// Returns the number of grants left in the current window.
    pub async fn available(&self) -> u32 {
        let mut state = self.inner.state.lock().await;
        let now = self.inner.clock.now();
        state.roll_window(now, self.inner.config.window);
        self.inner
            .config
            .max_per_window
            .saturating_sub(state.granted_in_window)
    }

    /// Returns the configured grants per window.
    pub fn max_per_window(&self) -> u32 {
        self.inner.config.max_per_window
    }

    /// Returns the configured window length.
    pub fn window(&self) -> Duration {
        self.inner.config.window
    }

    /// Returns the configured minimum spacing.
    pub fn min_spacing(&self) -> Duration {
        self.inner.config.min_spacing
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl std::fmt::Debug for RateGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGovernor")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
