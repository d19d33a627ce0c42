use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter as GovernorLimiter};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::provider::SourceError;

type DirectRateLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Outbound request budget for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(5)
    }
}

impl RateLimitConfig {
    pub fn per_minute(max_requests: u32) -> Self {
        Self {
            enabled: true,
            max_requests,
            window: Duration::from_secs(60),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::per_minute(1)
        }
    }

    /// Minimum gap between two consecutive requests (`window / max_requests`).
    pub fn min_spacing(&self) -> Duration {
        self.window / self.max_requests.max(1)
    }
}

/// Trailing-window ledger of request instants.
#[derive(Debug, Default)]
struct RequestLedger {
    requests: VecDeque<Instant>,
}

impl RequestLedger {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.requests.front() {
            if now.duration_since(*oldest) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    /// How long until another request fits; zero when one fits now.
    fn wait_time(&mut self, now: Instant, window: Duration, max_requests: usize) -> Duration {
        self.prune(now, window);
        if self.requests.len() < max_requests {
            return Duration::ZERO;
        }

        self.requests
            .front()
            .map(|oldest| (*oldest + window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    fn record(&mut self, now: Instant) {
        self.requests.push_back(now);
    }
}

/// Throttle enforcing a per-window cap and minimum spacing. Callers over
/// budget are delayed, never rejected.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    ledger: Arc<Mutex<RequestLedger>>,
    spacing: Arc<DirectRateLimiter>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            ledger: Arc::new(Mutex::new(RequestLedger::default())),
            spacing: Arc::new(GovernorLimiter::direct(spacing_quota(&config))),
        }
    }

    pub fn disabled() -> Self {
        Self::new(RateLimitConfig::disabled())
    }

    pub const fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Suspends until both the spacing and the window budget allow one more request.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), SourceError> {
        if !self.config.enabled {
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(SourceError::cancelled()),
            _ = self.spacing.until_ready() => {}
        }

        let max_requests = self.config.max_requests.max(1) as usize;
        loop {
            let wait = {
                let mut ledger = self.lock_ledger();
                let now = Instant::now();
                let wait = ledger.wait_time(now, self.config.window, max_requests);
                if wait.is_zero() {
                    ledger.record(now);
                    return Ok(());
                }
                wait
            };

            debug!(
                wait_ms = wait.as_millis() as u64,
                max_requests, "rate limit window full, delaying request"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(SourceError::cancelled()),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Requests recorded in the trailing window.
    pub fn requests_in_window(&self) -> usize {
        let mut ledger = self.lock_ledger();
        ledger.prune(Instant::now(), self.config.window);
        ledger.requests.len()
    }

    fn lock_ledger(&self) -> MutexGuard<'_, RequestLedger> {
        self.ledger.lock().unwrap_or_else(|poisoned| {
            warn!("rate limiter ledger mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

fn spacing_quota(config: &RateLimitConfig) -> Quota {
    let period = config.min_spacing().max(Duration::from_millis(1));
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::MIN)
}
