//! Standard error envelope (spec.md §6) and sensitive-field masking before
//! logging (spec.md §7 "User-visible failures").

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::ComplianceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub field: Option<String>,
    pub timestamp: String,
    pub request_id: String,
    pub path: String,
    pub method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
    pub meta: Option<serde_json::Value>,
}

impl ErrorEnvelope {
    pub fn from_error(err: &ComplianceError, request_id: impl Into<String>, path: impl Into<String>, method: impl Into<String>, production_mode: bool) -> Self {
        Self {
            error: ErrorBody {
                code: format!("{:?}", err.kind).to_uppercase(),
                message: err.message.clone(),
                details: if production_mode { None } else { err.details.clone() },
                field: err.context.get("field").cloned(),
                timestamp: Utc::now().to_rfc3339(),
                request_id: request_id.into(),
                path: path.into(),
                method: method.into(),
            },
            meta: None,
        }
    }
}

static SENSITIVE_FIELD_RE: OnceLock<Regex> = OnceLock::new();

/// Masks values whose key matches `password|token|secret|key|authorization`
/// before a structured log line is emitted. Operates on a single `key=value`
/// pair; callers apply it per logged field.
pub fn mask_sensitive(key: &str, value: &str) -> String {
    let re = SENSITIVE_FIELD_RE.get_or_init(|| Regex::new(r"(?i)password|token|secret|key|authorization").unwrap());
    if re.is_match(key) {
        "***REDACTED***".to_string()
    } else {
        value.to_string()
    }
}
