//! Circuit breaker per spec.md §3. Ported from the teacher's
//! `agentkern-arbiter`'s `CircuitBreaker` (`antifragile.rs`), reshaped onto
//! the spec's exact field names and transition table:
//! CLOSED -> OPEN on `failure_count >= failure_threshold`;
//! OPEN -> HALF_OPEN when `now >= next_attempt_time`;
//! HALF_OPEN -> CLOSED on `success_count >= success_threshold`;
//! HALF_OPEN -> OPEN on any failure.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    pub id: String,
    pub service: String,
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    next_attempt_time: Option<Instant>,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl CircuitBreaker {
    /// Resilience4j-inspired defaults, same rationale the teacher documents
    /// for `agentkern-arbiter`'s breaker: 5 failures to open, 3 successes in
    /// half-open to close, 30s before a probe is allowed.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            service: service.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            next_attempt_time: None,
            failure_threshold: 5,
            success_threshold: 3,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_thresholds(mut self, failure_threshold: u32, success_threshold: u32, timeout: Duration) -> Self {
        self.failure_threshold = failure_threshold;
        self.success_threshold = success_threshold;
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// A breaker in OPEN state rejects calls until `now >= next_attempt_time`,
    /// then admits a single probe by moving to HALF_OPEN.
    pub fn allow_request(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let Some(next_attempt) = self.next_attempt_time else {
                    return false;
                };
                if Instant::now() >= next_attempt {
                    self.state = CircuitState::HalfOpen;
                    self.success_count = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                self.success_count += 1;
                if self.success_count >= self.success_threshold {
                    self.state = CircuitState::Closed;
                    self.failure_count = 0;
                    self.success_count = 0;
                    tracing::info!(circuit = %self.service, "circuit closed after successful probes");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_time = Some(Instant::now());

        match self.state {
            CircuitState::Closed => {
                if self.failure_count >= self.failure_threshold {
                    self.open();
                }
            }
            CircuitState::HalfOpen => {
                self.open();
            }
            CircuitState::Open => {}
        }
    }

    fn open(&mut self) {
        self.state = CircuitState::Open;
        self.next_attempt_time = Some(Instant::now() + self.timeout);
        tracing::warn!(circuit = %self.service, "circuit opened");
    }
}

/// One breaker per external service name, single-writer-under-lock like
/// every other shared cache in this system (spec.md §5).
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self { breakers: RwLock::new(HashMap::new()) }
    }

    pub fn allow_request(&self, service: &str) -> bool {
        let mut breakers = self.breakers.write();
        breakers.entry(service.to_string()).or_insert_with(|| CircuitBreaker::new(service)).allow_request()
    }

    pub fn record_success(&self, service: &str) {
        let mut breakers = self.breakers.write();
        breakers.entry(service.to_string()).or_insert_with(|| CircuitBreaker::new(service)).record_success();
    }

    pub fn record_failure(&self, service: &str) {
        let mut breakers = self.breakers.write();
        breakers.entry(service.to_string()).or_insert_with(|| CircuitBreaker::new(service)).record_failure();
    }

    pub fn state(&self, service: &str) -> Option<CircuitState> {
        self.breakers.read().get(service).map(CircuitBreaker::state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn opens_after_failure_threshold() {
        let mut cb = CircuitBreaker::new("svc").with_thresholds(3, 2, Duration::from_millis(10));
        for _ in 0..2 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn half_open_closes_after_success_threshold_but_reopens_on_failure() {
        let mut cb = CircuitBreaker::new("svc").with_thresholds(1, 2, Duration::from_millis(1));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_closes_after_enough_successes() {
        let mut cb = CircuitBreaker::new("svc").with_thresholds(1, 2, Duration::from_millis(1));
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.allow_request());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
