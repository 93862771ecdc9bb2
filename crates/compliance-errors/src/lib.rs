//! Compliance Fleet: error taxonomy, circuit breakers, retry policy, rate
//! limiting. Every other pillar depends on this crate the way AgentKern's
//! pillars depend on `agentkern-governance` for cross-cutting guarantees.

pub mod circuit_breaker;
pub mod envelope;
pub mod error;
pub mod rate_limit;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use envelope::{mask_sensitive, ErrorEnvelope};
pub use error::{ComplianceError, ErrorKind, ErrorSeverity, RecoveryStrategy};
pub use rate_limit::RateLimiter;
pub use retry::{retry_with_backoff, RetryPolicy};
