//! Hot-reloadable configuration, one section per component (spec.md §6).

use serde::{Deserialize, Serialize};

fn default_execution_timeout_ms() -> u64 { 5_000 }
fn default_max_parallel_executions() -> usize { 10 }
fn default_max_batch_size() -> usize { 100 }
fn default_translation_timeout_ms() -> u64 { 5_000 }
fn default_protocol() -> String { "REST_HTTP".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_connections() -> usize { 5_000 }
fn default_heartbeat_interval_secs() -> u64 { 30 }
fn default_connection_timeout_secs() -> u64 { 300 }
fn default_message_queue_size() -> usize { 1_000 }
fn default_rate_limit_per_minute() -> u32 { 60 }
fn default_max_attempts() -> u32 { 3 }
fn default_initial_delay_ms() -> u64 { 100 }
fn default_multiplier() -> f64 { 2.0 }
fn default_max_delay_ms() -> u64 { 30_000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleEngineConfig {
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
    #[serde(default = "default_max_parallel_executions")]
    pub max_parallel_executions: usize,
    pub performance_monitoring: bool,
}

impl Default for RuleEngineConfig {
    fn default() -> Self {
        Self {
            execution_timeout_ms: default_execution_timeout_ms(),
            max_parallel_executions: default_max_parallel_executions(),
            performance_monitoring: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_translation_timeout_ms")]
    pub translation_timeout_ms: u64,
    pub validate_schemas: bool,
    #[serde(default = "default_protocol")]
    pub default_protocol: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            translation_timeout_ms: default_translation_timeout_ms(),
            validate_schemas: false,
            default_protocol: default_protocol(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    #[serde(default = "default_message_queue_size")]
    pub message_queue_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_connections: default_max_connections(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            connection_timeout_secs: default_connection_timeout_secs(),
            message_queue_size: default_message_queue_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlingConfig {
    pub retry: RetryConfig,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    /// `production` suppresses internal error detail in responses.
    pub production_mode: bool,
}

impl Default for ErrorHandlingConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            production_mode: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rule_engine: RuleEngineConfig,
    pub translator: TranslatorConfig,
    pub websocket: WebSocketConfig,
    pub error_handling: ErrorHandlingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let yaml = "rule_engine:\n  max_parallel_executions: 4\n";
        let cfg: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.rule_engine.max_parallel_executions, 4);
        assert_eq!(cfg.rule_engine.execution_timeout_ms, 5_000);
        assert_eq!(cfg.websocket.max_connections, 5_000);
    }
}
