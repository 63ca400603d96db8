// src/breaker.rs
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use crate::config::BreakerConfig;
use crate::models::ProviderId;

/// Breaker states. CLOSED passes calls through, OPEN short-circuits them,
/// HALF_OPEN admits a single trial call after the cool-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Read-only snapshot of one breaker for operator introspection.
#[derive(Debug, Clone)]
pub struct CircuitStats {
    pub provider: ProviderId,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_failures: u64,
    pub total_successes: u64,
    pub last_failure_at: Option<Instant>,
    pub last_state_change: Instant,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    total_failures: u64,
    total_successes: u64,
    last_failure_at: Option<Instant>,
    last_state_change: Instant,
    /// Set while a half-open probe is in flight so concurrent jobs cannot
    /// all probe at once.
    probe_in_flight: bool,
}

/// Per-provider circuit breaker. Shared, process-lifetime state: many
/// enrichment jobs touching the same provider go through one instance, so
/// all transitions are check-and-swap under the lock. Nothing here is
/// persisted.
pub struct CircuitBreaker {
    provider: ProviderId,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(provider: ProviderId, config: BreakerConfig) -> Self {
        Self {
            provider,
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                total_failures: 0,
                total_successes: 0,
                last_failure_at: None,
                last_state_change: Instant::now(),
                probe_in_flight: false,
            }),
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Current state, accounting for an elapsed cool-down (an OPEN breaker
    /// whose cool-down has passed reports HALF_OPEN).
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Open if inner.last_state_change.elapsed() >= self.config.cooldown => {
                CircuitState::HalfOpen
            }
            state => state,
        }
    }

    /// Whether a call would currently be admitted. Used as a pre-flight
    /// check to skip enrichment entirely when a provider is degraded.
    pub fn is_call_permitted(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn stats(&self) -> CircuitStats {
        let inner = self.inner.lock().expect("breaker lock poisoned");
        CircuitStats {
            provider: self.provider,
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            last_failure_at: inner.last_failure_at,
            last_state_change: inner.last_state_change,
        }
    }

    /// Admission check and state transition in one critical section.
    fn try_acquire(&self) -> Admission {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                if inner.last_state_change.elapsed() >= self.config.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    inner.last_state_change = Instant::now();
                    inner.probe_in_flight = true;
                    info!(
                        "Circuit breaker for {} entering half-open, admitting one probe",
                        self.provider
                    );
                    Admission::Probe
                } else {
                    Admission::Denied
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Admission::Denied
                } else {
                    inner.probe_in_flight = true;
                    Admission::Probe
                }
            }
        }
    }

    /// Release a probe slot whose call never reported an outcome. Leaves the
    /// breaker HALF_OPEN so the next caller can probe instead.
    fn release_probe_slot(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.total_successes += 1;
        inner.consecutive_successes += 1;
        inner.consecutive_failures = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            inner.last_state_change = Instant::now();
            inner.probe_in_flight = false;
            info!("Circuit breaker for {} closed after successful probe", self.provider);
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.total_failures += 1;
        inner.consecutive_failures += 1;
        inner.consecutive_successes = 0;
        inner.last_failure_at = Some(Instant::now());
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.last_state_change = Instant::now();
                inner.probe_in_flight = false;
                warn!("Circuit breaker for {} re-opened after failed probe", self.provider);
            }
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.last_state_change = Instant::now();
                    warn!(
                        "Circuit breaker for {} opened after {} consecutive failures",
                        self.provider, inner.consecutive_failures
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Run `call` unless the breaker is OPEN, recording the outcome either
    /// way. An open breaker yields a synthetic failure without any I/O.
    /// Cancellation-safe: if the returned future is dropped mid-call (e.g.
    /// the caller timed out), an admitted probe slot is handed back instead
    /// of wedging the breaker HALF_OPEN with a phantom probe.
    pub async fn execute<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let slot = match self.try_acquire() {
            Admission::Denied => {
                debug!("Circuit breaker for {} is open, short-circuiting call", self.provider);
                return Err(anyhow!("{} provider not available (circuit open)", self.provider));
            }
            Admission::Allowed => None,
            Admission::Probe => Some(ProbeSlot { breaker: self, outcome_recorded: false }),
        };
        let result = call().await;
        // From here on the outcome handlers own the slot state.
        if let Some(mut slot) = slot {
            slot.outcome_recorded = true;
        }
        match result {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }
}

enum Admission {
    Denied,
    Allowed,
    Probe,
}

/// Drop guard for a half-open probe admission. The call reporting its
/// outcome resolves the slot through `on_success`/`on_failure`; dropping the
/// guard before that (a cancelled future) releases the slot instead.
struct ProbeSlot<'a> {
    breaker: &'a CircuitBreaker,
    outcome_recorded: bool,
}

impl Drop for ProbeSlot<'_> {
    fn drop(&mut self) {
        if !self.outcome_recorded {
            debug!(
                "Probe call against {} was cancelled before completing, releasing slot",
                self.breaker.provider
            );
            self.breaker.release_probe_slot();
        }
    }
}

/// Owns one breaker per provider. Jobs go through the registry instead of
/// ambient module-level state, so tests and multiple pipelines can each have
/// their own isolated set.
pub struct BreakerRegistry {
    config: BreakerConfig,
    breakers: Mutex<HashMap<ProviderId, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch (or lazily create) the breaker for a provider.
    pub fn get(&self, provider: ProviderId) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().expect("registry lock poisoned");
        breakers
            .entry(provider)
            .or_insert_with(|| Arc::new(CircuitBreaker::new(provider, self.config.clone())))
            .clone()
    }

    /// Snapshot of every breaker instantiated so far.
    pub fn stats(&self) -> Vec<CircuitStats> {
        let breakers = self.breakers.lock().expect("registry lock poisoned");
        let mut stats: Vec<CircuitStats> = breakers.values().map(|b| b.stats()).collect();
        stats.sort_by_key(|s| s.provider);
        stats
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn test_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_millis(50),
        }
    }

    async fn fail(breaker: &CircuitBreaker) {
        let _ = breaker
            .execute(|| async { Err::<(), _>(anyhow!("provider exploded")) })
            .await;
    }

    #[tokio::test]
    async fn test_opens_after_consecutive_failures_and_short_circuits() {
        let breaker = CircuitBreaker::new(ProviderId::AppleMusic, test_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.is_call_permitted());

        // The wrapped function must not run while open.
        let calls = AtomicUsize::new(0);
        let result = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let breaker = CircuitBreaker::new(ProviderId::Deezer, test_config());
        fail(&breaker).await;
        fail(&breaker).await;
        breaker.execute(|| async { Ok(()) }).await.unwrap();
        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_probe_success_closes() {
        let breaker = CircuitBreaker::new(ProviderId::Tidal, test_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.execute(|| async { Ok(()) }).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.stats().total_successes, 1);
    }

    #[tokio::test]
    async fn test_half_open_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(ProviderId::SoundCloud, test_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_cancelled_half_open_trial_frees_the_slot() {
        let breaker = CircuitBreaker::new(ProviderId::Spotify, test_config());
        for _ in 0..3 {
            fail(&breaker).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        // Caller times out and drops the trial call mid-flight.
        let trial = breaker.execute(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), trial).await;
        assert!(timed_out.is_err());

        // The slot must be reusable: a healthy call closes the breaker
        // rather than being rejected by a phantom in-flight trial.
        breaker.execute(|| async { Ok(()) }).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_registry_returns_one_breaker_per_provider() {
        let registry = BreakerRegistry::new(test_config());
        let a = registry.get(ProviderId::AppleMusic);
        let b = registry.get(ProviderId::AppleMusic);
        assert!(Arc::ptr_eq(&a, &b));
        registry.get(ProviderId::Deezer);
        assert_eq!(registry.stats().len(), 2);
    }
}
