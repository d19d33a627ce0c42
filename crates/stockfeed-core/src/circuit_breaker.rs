//! Per-provider circuit breakers.
//!
//! - **Closed**: calls flow; consecutive failures are counted.
//! - **Open**: calls are skipped until the cooldown expires.
//! - **HalfOpen**: exactly one trial call is in flight; its outcome closes or
//!   reopens the circuit.
//!
//! All circuits live behind one mutex. Critical sections only touch counters
//! and timestamps and never span I/O.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::UtcDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Point-in-time view of one provider's circuit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_at: Option<UtcDateTime>,
    pub next_retry_at: Option<UtcDateTime>,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<UtcDateTime>,
    reopen_at: Option<Instant>,
    next_retry_at: Option<UtcDateTime>,
    probe_in_flight: bool,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            reopen_at: None,
            next_retry_at: None,
            probe_in_flight: false,
        }
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.reopen_at = None;
        self.next_retry_at = None;
        self.probe_in_flight = false;
    }

    /// A cooldown past the clock's range leaves `reopen_at` unset, which
    /// keeps the circuit open until a manual reset.
    fn open(&mut self, now: Instant, wall_now: UtcDateTime, cooldown: Duration) {
        self.state = CircuitState::Open;
        self.reopen_at = now.checked_add(cooldown);
        self.next_retry_at = Some(wall_now.saturating_add(cooldown));
        self.probe_in_flight = false;
    }

    fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            failure_count: self.failure_count,
            last_failure_at: self.last_failure_at,
            next_retry_at: self.next_retry_at,
        }
    }
}

/// Circuit breakers keyed by provider name.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    circuits: Mutex<HashMap<String, Circuit>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub const fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Adds a Closed circuit for `provider` if none exists yet.
    pub fn register(&self, provider: &str) {
        self.lock_circuits()
            .entry(provider.to_owned())
            .or_insert_with(Circuit::new);
    }

    /// Asks to call `provider`. `None` means skip it; a skip is not a failure.
    ///
    /// Open circuits whose cooldown has expired move to HalfOpen here, and
    /// only the caller that observes the move receives the trial permit.
    pub fn try_acquire(&self, provider: &str) -> Option<CircuitPermit<'_>> {
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(provider.to_owned())
            .or_insert_with(Circuit::new);

        let probe = match circuit.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let cooled_down = circuit
                    .reopen_at
                    .is_some_and(|reopen_at| Instant::now() >= reopen_at);
                if !cooled_down {
                    debug!(provider, "circuit open, skipping provider");
                    return None;
                }
                info!(provider, "circuit half-open, admitting trial call");
                circuit.state = CircuitState::HalfOpen;
                circuit.probe_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if circuit.probe_in_flight {
                    debug!(provider, "trial call already in flight, skipping provider");
                    return None;
                }
                circuit.probe_in_flight = true;
                true
            }
        };

        Some(CircuitPermit {
            registry: self,
            provider: provider.to_owned(),
            probe,
            settled: false,
        })
    }

    /// Resets the failure count and forces Closed.
    pub fn record_success(&self, provider: &str) {
        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(provider.to_owned())
            .or_insert_with(Circuit::new);

        if circuit.state != CircuitState::Closed {
            info!(provider, from = %circuit.state, "circuit closed after successful call");
        }
        circuit.close();
    }

    /// Counts a failure. Opens the circuit once the threshold is reached, and
    /// reopens it with a fresh cooldown when a trial call fails.
    pub fn record_failure(&self, provider: &str) {
        let now = Instant::now();
        let wall_now = UtcDateTime::now();
        let threshold = self.config.failure_threshold.max(1);

        let mut circuits = self.lock_circuits();
        let circuit = circuits
            .entry(provider.to_owned())
            .or_insert_with(Circuit::new);

        circuit.failure_count = circuit.failure_count.saturating_add(1);
        circuit.last_failure_at = Some(wall_now);

        match circuit.state {
            CircuitState::HalfOpen => {
                warn!(
                    provider,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "trial call failed, circuit reopened"
                );
                circuit.open(now, wall_now, self.config.cooldown);
            }
            CircuitState::Closed if circuit.failure_count >= threshold => {
                warn!(
                    provider,
                    failure_count = circuit.failure_count,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "failure threshold reached, circuit opened"
                );
                circuit.open(now, wall_now, self.config.cooldown);
            }
            CircuitState::Closed | CircuitState::Open => {
                debug!(
                    provider,
                    failure_count = circuit.failure_count,
                    threshold,
                    "provider failure recorded"
                );
            }
        }
    }

    /// Forces Closed with zero failures. Returns `false` for unknown providers.
    pub fn reset(&self, provider: &str) -> bool {
        let mut circuits = self.lock_circuits();
        match circuits.get_mut(provider) {
            Some(circuit) => {
                info!(provider, from = %circuit.state, "circuit manually reset");
                circuit.close();
                true
            }
            None => false,
        }
    }

    pub fn state(&self, provider: &str) -> Option<CircuitState> {
        self.lock_circuits()
            .get(provider)
            .map(|circuit| circuit.state)
    }

    pub fn snapshot(&self) -> BTreeMap<String, CircuitSnapshot> {
        self.lock_circuits()
            .iter()
            .map(|(name, circuit)| (name.clone(), circuit.snapshot()))
            .collect()
    }

    fn release_probe(&self, provider: &str) {
        if let Some(circuit) = self.lock_circuits().get_mut(provider) {
            if circuit.state == CircuitState::HalfOpen {
                debug!(provider, "trial call abandoned, probe slot released");
                circuit.probe_in_flight = false;
            }
        }
    }

    fn lock_circuits(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(|poisoned| {
            warn!("circuit breaker mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

/// Admission to call a provider. Settle it with [`succeed`](Self::succeed) or
/// [`fail`](Self::fail); dropping an unsettled trial permit frees the trial slot.
#[derive(Debug)]
#[must_use = "an unsettled permit records no outcome"]
pub struct CircuitPermit<'a> {
    registry: &'a CircuitBreakerRegistry,
    provider: String,
    probe: bool,
    settled: bool,
}

impl CircuitPermit<'_> {
    /// Whether this permit is the single HalfOpen trial.
    pub const fn is_trial(&self) -> bool {
        self.probe
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.registry.record_success(&self.provider);
    }

    pub fn fail(mut self) {
        self.settled = true;
        self.registry.record_failure(&self.provider);
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.registry.release_probe(&self.provider);
        }
    }
}
