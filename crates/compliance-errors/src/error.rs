//! The 14-kind error taxonomy of spec.md §7, each mapped to a default
//! recovery strategy and HTTP status. Grounded on
//! `examples/original_source/shared/models/error_handling.hpp`'s
//! `ErrorCategory`/`RecoveryStrategy` split, reshaped into the teacher's
//! `thiserror` idiom (see `agentkern-gate`'s `thiserror::Error` enums).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    RateLimit,
    Network,
    Timeout,
    ExternalApi,
    Database,
    Configuration,
    Processing,
    Resource,
    Security,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryStrategy {
    Retry,
    CircuitBreaker,
    Fallback,
    Degradation,
    Manual,
    Ignore,
}

impl ErrorKind {
    /// spec.md §7 table, column "HTTP status".
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::Authentication => 401,
            ErrorKind::Authorization => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::RateLimit => 429,
            ErrorKind::Network => 503,
            ErrorKind::Timeout => 504,
            ErrorKind::ExternalApi => 502,
            ErrorKind::Database => 500,
            ErrorKind::Configuration => 500,
            ErrorKind::Processing => 500,
            ErrorKind::Resource => 503,
            ErrorKind::Security => 403,
            ErrorKind::Unknown => 500,
        }
    }

    /// spec.md §7 table, column "Default strategy".
    pub fn default_recovery_strategy(self) -> RecoveryStrategy {
        match self {
            ErrorKind::Validation => RecoveryStrategy::Fallback,
            ErrorKind::Authentication => RecoveryStrategy::Manual,
            ErrorKind::Authorization => RecoveryStrategy::Manual,
            ErrorKind::NotFound => RecoveryStrategy::Ignore,
            ErrorKind::Conflict => RecoveryStrategy::Manual,
            ErrorKind::RateLimit => RecoveryStrategy::Retry,
            ErrorKind::Network => RecoveryStrategy::Retry,
            ErrorKind::Timeout => RecoveryStrategy::Retry,
            ErrorKind::ExternalApi => RecoveryStrategy::CircuitBreaker,
            ErrorKind::Database => RecoveryStrategy::CircuitBreaker,
            ErrorKind::Configuration => RecoveryStrategy::Manual,
            ErrorKind::Processing => RecoveryStrategy::Degradation,
            ErrorKind::Resource => RecoveryStrategy::CircuitBreaker,
            ErrorKind::Security => RecoveryStrategy::Manual,
            ErrorKind::Unknown => RecoveryStrategy::Ignore,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(self.default_recovery_strategy(), RecoveryStrategy::Retry)
    }

    pub fn default_severity(self) -> ErrorSeverity {
        match self {
            ErrorKind::Validation | ErrorKind::NotFound => ErrorSeverity::Low,
            ErrorKind::RateLimit | ErrorKind::Network | ErrorKind::Timeout | ErrorKind::Conflict => ErrorSeverity::Medium,
            ErrorKind::Authentication | ErrorKind::Authorization | ErrorKind::ExternalApi | ErrorKind::Processing => ErrorSeverity::High,
            ErrorKind::Database | ErrorKind::Configuration | ErrorKind::Resource | ErrorKind::Security => ErrorSeverity::Critical,
            ErrorKind::Unknown => ErrorSeverity::Medium,
        }
    }
}

#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[error("{kind:?} error in {component}::{operation}: {message}")]
pub struct ComplianceError {
    pub kind: ErrorKind,
    pub component: String,
    pub operation: String,
    pub message: String,
    pub details: Option<String>,
    pub context: HashMap<String, String>,
    pub correlation_id: Option<String>,
}

impl ComplianceError {
    pub fn new(kind: ErrorKind, component: impl Into<String>, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            component: component.into(),
            operation: operation.into(),
            message: message.into(),
            details: None,
            context: HashMap::new(),
            correlation_id: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.kind.default_severity()
    }

    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        self.kind.default_recovery_strategy()
    }

    pub fn http_status(&self) -> u16 {
        self.kind.http_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_table() {
        assert_eq!(ErrorKind::Validation.http_status(), 400);
        assert_eq!(ErrorKind::RateLimit.http_status(), 429);
        assert_eq!(ErrorKind::ExternalApi.http_status(), 502);
        assert_eq!(ErrorKind::Timeout.http_status(), 504);
    }

    #[test]
    fn only_retry_strategy_kinds_are_retryable() {
        assert!(ErrorKind::RateLimit.is_retryable());
        assert!(ErrorKind::Network.is_retryable());
        assert!(!ErrorKind::ExternalApi.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
    }
}
