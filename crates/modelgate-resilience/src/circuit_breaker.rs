//! Per-provider circuit breaker.
//!
//! Tracks consecutive failures per provider and isolates an unhealthy
//! upstream instead of letting every request wait out a timeout against
//! it. Recovery goes through a half-open probe: exactly one in-flight
//! request is admitted, and its outcome decides whether the circuit
//! closes or re-opens with a longer cooldown.

use modelgate_core::ProviderId;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests flow through
    Closed,
    /// Provider isolated, requests are rejected without contacting it
    Open,
    /// Cooldown elapsed, a single probe request is admitted
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Initial cooldown before the first probe is admitted
    pub cooldown: Duration,
    /// Upper bound on the cooldown as it backs off
    pub max_cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(300),
        }
    }
}

/// Admission token returned by [`CircuitBreaker::try_acquire`].
///
/// Holding a permit means the call is allowed; the caller must hand the
/// permit back through `record_success`, `record_failure`, or `release`
/// so half-open probes are accounted for exactly once.
#[derive(Debug)]
pub struct CallPermit {
    probe: bool,
}

impl CallPermit {
    /// Whether this permit admits the single half-open probe
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.probe
    }
}

/// Point-in-time health view of one breaker
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    /// Effective state at snapshot time
    pub state: CircuitState,
    /// Consecutive failures recorded while closed
    pub consecutive_failures: u32,
    /// How long the circuit has been open, if it is
    pub open_for: Option<Duration>,
    /// Time until the next probe is admitted, if the circuit is open
    pub next_probe_in: Option<Duration>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    next_probe_at: Option<Instant>,
    /// Current cooldown, doubled on each failed probe up to max_cooldown
    current_cooldown: Duration,
    probe_in_flight: bool,
}

/// Circuit breaker for a single provider
pub struct CircuitBreaker {
    provider_id: ProviderId,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new closed breaker for a provider
    #[must_use]
    pub fn new(provider_id: ProviderId, config: CircuitBreakerConfig) -> Self {
        let current_cooldown = config.cooldown;
        Self {
            provider_id,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                next_probe_at: None,
                current_cooldown,
                probe_in_flight: false,
            }),
        }
    }

    /// Provider this breaker guards
    #[must_use]
    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    /// Try to admit a call.
    ///
    /// Returns a permit while closed. While open, returns `None` until
    /// the cooldown elapses, then transitions to half-open and admits
    /// exactly one probe; concurrent callers are rejected until that
    /// probe resolves.
    #[must_use]
    pub fn try_acquire(&self) -> Option<CallPermit> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(CallPermit { probe: false }),
            CircuitState::Open => {
                let due = inner
                    .next_probe_at
                    .is_some_and(|at| Instant::now() >= at);
                if !due {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                debug!(provider = %self.provider_id, "Circuit half-open, admitting probe");
                Some(CallPermit { probe: true })
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    None
                } else {
                    inner.probe_in_flight = true;
                    Some(CallPermit { probe: true })
                }
            }
        }
    }

    /// Record a successful call, consuming the permit.
    ///
    /// A successful probe closes the circuit and resets the cooldown to
    /// its configured base. A success on a permit acquired while the
    /// circuit was still closed is ignored if the circuit has since
    /// opened: recovery only goes through the half-open probe.
    pub fn record_success(&self, permit: CallPermit) {
        let mut inner = self.inner.lock();
        if !permit.probe && inner.state != CircuitState::Closed {
            debug!(
                provider = %self.provider_id,
                state = %inner.state,
                "Ignoring stale success recorded after the circuit tripped"
            );
            return;
        }
        if permit.probe {
            info!(provider = %self.provider_id, "Probe succeeded, closing circuit");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.next_probe_at = None;
        inner.current_cooldown = self.config.cooldown;
        inner.probe_in_flight = false;
    }

    /// Record a failed call, consuming the permit.
    ///
    /// A failed probe re-opens the circuit with a doubled cooldown. A
    /// failure while closed increments the consecutive count and opens
    /// the circuit exactly once when the threshold is reached.
    pub fn record_failure(&self, permit: CallPermit) {
        let mut inner = self.inner.lock();

        if permit.probe {
            inner.probe_in_flight = false;
            let cooldown = (inner.current_cooldown * 2).min(self.config.max_cooldown);
            inner.current_cooldown = cooldown;
            self.open_locked(&mut inner, cooldown);
            warn!(
                provider = %self.provider_id,
                cooldown_secs = cooldown.as_secs(),
                "Probe failed, re-opening circuit"
            );
            return;
        }

        inner.consecutive_failures += 1;
        if inner.state == CircuitState::Closed
            && inner.consecutive_failures >= self.config.failure_threshold
        {
            let cooldown = inner.current_cooldown;
            self.open_locked(&mut inner, cooldown);
            warn!(
                provider = %self.provider_id,
                failures = inner.consecutive_failures,
                cooldown_secs = cooldown.as_secs(),
                "Failure threshold reached, opening circuit"
            );
        }
    }

    /// Hand back a permit without an upstream verdict.
    ///
    /// Used when the call never reached the provider (budget settlement
    /// failed, request was cancelled). State is untouched so the
    /// non-outcome neither opens nor closes the circuit, but a probe
    /// slot is freed for the next caller.
    pub fn release(&self, permit: CallPermit) {
        if permit.probe {
            let mut inner = self.inner.lock();
            inner.probe_in_flight = false;
        }
    }

    fn open_locked(&self, inner: &mut BreakerInner, cooldown: Duration) {
        let now = Instant::now();
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.next_probe_at = Some(now + cooldown);
    }

    /// Effective state right now.
    ///
    /// An open circuit whose cooldown has elapsed reports `HalfOpen`
    /// even before a probe has been admitted.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Open
                if inner
                    .next_probe_at
                    .is_some_and(|at| Instant::now() >= at) =>
            {
                CircuitState::HalfOpen
            }
            state => state,
        }
    }

    /// Health snapshot for the health endpoint and metrics
    #[must_use]
    pub fn snapshot(&self) -> ProviderHealth {
        let inner = self.inner.lock();
        let now = Instant::now();
        let effective = match inner.state {
            CircuitState::Open if inner.next_probe_at.is_some_and(|at| now >= at) => {
                CircuitState::HalfOpen
            }
            state => state,
        };
        ProviderHealth {
            state: effective,
            consecutive_failures: inner.consecutive_failures,
            open_for: inner.opened_at.map(|at| now.duration_since(at)),
            next_probe_in: inner
                .next_probe_at
                .and_then(|at| at.checked_duration_since(now)),
        }
    }
}

/// Registry of one breaker per provider
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<ProviderId, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Get the breaker for a provider, creating a closed one on first use
    #[must_use]
    pub fn get_or_create(&self, provider_id: &ProviderId) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(provider_id) {
            return Arc::clone(breaker);
        }
        let mut breakers = self.breakers.write();
        Arc::clone(breakers.entry(provider_id.clone()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(
                provider_id.clone(),
                self.config.clone(),
            ))
        }))
    }

    /// Effective state of every registered breaker.
    ///
    /// The routing engine consumes this map so one registry read serves
    /// a whole selection pass.
    #[must_use]
    pub fn snapshot_states(&self) -> HashMap<ProviderId, CircuitState> {
        self.breakers
            .read()
            .iter()
            .map(|(id, breaker)| (id.clone(), breaker.state()))
            .collect()
    }

    /// Full health snapshot of every registered breaker
    #[must_use]
    pub fn snapshots(&self) -> HashMap<ProviderId, ProviderHealth> {
        self.breakers
            .read()
            .iter()
            .map(|(id, breaker)| (id.clone(), breaker.snapshot()))
            .collect()
    }
}
