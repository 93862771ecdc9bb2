use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use compliance_errors::{ComplianceError, ErrorKind};
use compliance_store::StoreGateway;
use compliance_types::{
    MessageHeader, Protocol, TranslationOutcome, TranslationResult, TranslationRule,
};
use parking_lot::RwLock;
use serde_json::Value;

use crate::convert::convert;
use crate::detect::detect_protocol;
use crate::schema::validate_against_schema;

const RULE_KIND: &str = "translation_rule";
const SCHEMA_KIND: &str = "protocol_schema";

#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    pub max_batch_size: usize,
    pub translation_timeout: Duration,
    pub validate_schemas: bool,
    pub default_protocol: Protocol,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            translation_timeout: Duration::from_secs(5),
            validate_schemas: false,
            default_protocol: Protocol::RestHttp,
        }
    }
}

struct Diagnostics {
    warnings: Vec<String>,
    errors: Vec<String>,
}

/// Detects source protocols, applies translation rules or built-in
/// converters, and serializes to the target protocol.
pub struct MessageTranslator {
    store: Arc<dyn StoreGateway>,
    config: RwLock<TranslatorConfig>,
    rule_cache: RwLock<HashMap<String, TranslationRule>>,
    message_counter: AtomicU64,
}

impl MessageTranslator {
    pub fn new(store: Arc<dyn StoreGateway>) -> Self {
        Self { store, config: RwLock::new(TranslatorConfig::default()), rule_cache: RwLock::new(HashMap::new()), message_counter: AtomicU64::new(0) }
    }

    pub fn with_config(self, config: TranslatorConfig) -> Self {
        *self.config.write() = config;
        self
    }

    pub fn next_message_id(&self) -> String {
        format!("msg_{}", self.message_counter.fetch_add(1, Ordering::SeqCst))
    }

    /// spec.md §4.3 "Translation algorithm", steps 1-6.
    pub async fn translate_message(&self, raw: &str, header: &MessageHeader, target_protocol: Protocol) -> TranslationResult {
        let start = Instant::now();
        let mut warnings = Vec::new();
        let errors = Vec::new();

        let source_protocol = header.source_protocol;
        if let Some(detected) = detect_protocol(raw) {
            if detected != source_protocol {
                warnings.push(format!("header declared {source_protocol:?} but detection found {detected:?}"));
            }
        }

        if source_protocol == target_protocol {
            return match serde_json::from_str::<Value>(raw) {
                Ok(payload) => self.finish(TranslationOutcome::Success, payload, header, target_protocol, Diagnostics { warnings, errors }, start),
                Err(e) => self.finish(TranslationOutcome::Failure, Value::Null, header, target_protocol, Diagnostics { warnings, errors: vec![e.to_string()] }, start),
            };
        }

        let payload: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => return self.finish(TranslationOutcome::Failure, Value::Null, header, target_protocol, Diagnostics { warnings, errors: vec![format!("parse failure: {e}")] }, start),
        };

        if self.config.read().validate_schemas {
            if let Some(violations) = self.schema_violations(source_protocol, &payload).await {
                if !violations.is_empty() {
                    return self.finish(TranslationOutcome::Failure, Value::Null, header, target_protocol, Diagnostics { warnings, errors: violations }, start);
                }
            }
        }

        let best_rule = self.best_matching_rule(source_protocol, target_protocol).await;
        let translated = if let Some(rule) = &best_rule {
            apply_transformation(&payload, rule)
        } else {
            match convert(&payload, source_protocol, target_protocol) {
                Some(converted) => converted,
                None => return self.finish(TranslationOutcome::Unsupported, Value::Null, header, target_protocol, Diagnostics { warnings, errors }, start),
            }
        };

        self.finish(TranslationOutcome::Success, translated, header, target_protocol, Diagnostics { warnings, errors }, start)
    }

    /// spec.md §4.3: bounded by `max_batch_size`.
    pub async fn translate_batch(&self, messages: &[(String, MessageHeader)], target_protocol: Protocol) -> Vec<TranslationResult> {
        let limit = self.config.read().max_batch_size;
        let mut results = Vec::with_capacity(messages.len().min(limit));
        for (raw, header) in messages.iter().take(limit) {
            results.push(self.translate_message(raw, header, target_protocol).await);
        }
        results
    }

    async fn schema_violations(&self, protocol: Protocol, payload: &Value) -> Option<Vec<String>> {
        let schema = self.store.get(SCHEMA_KIND, &format!("{protocol:?}")).await.ok()??;
        Some(validate_against_schema(payload, &schema))
    }

    async fn best_matching_rule(&self, from: Protocol, to: Protocol) -> Option<TranslationRule> {
        let cache = self.rule_cache.read();
        cache.values().filter(|r| r.matches(from, to)).max_by_key(|r| r.priority).cloned()
    }

    fn finish(&self, outcome: TranslationOutcome, payload: Value, header: &MessageHeader, target_protocol: Protocol, diagnostics: Diagnostics, start: Instant) -> TranslationResult {
        let Diagnostics { warnings, errors } = diagnostics;
        let mut translated_header = header.clone();
        translated_header.target_protocol = target_protocol;
        translated_header.timestamp = Utc::now();
        merge_protocol_defaults(&mut translated_header, target_protocol);

        let processing_time_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            message_id = %header.message_id,
            source_protocol = ?header.source_protocol,
            target_protocol = ?target_protocol,
            result = ?outcome,
            processing_time_us = start.elapsed().as_micros() as u64,
            "message translated"
        );
        TranslationResult { result: outcome, translated_payload: payload, translated_header, warnings, errors, metadata: HashMap::new(), processing_time_ms }
    }

    pub async fn add_translation_rule(&self, rule: TranslationRule) -> Result<(), ComplianceError> {
        self.persist_rule(&rule).await?;
        self.rule_cache.write().insert(rule.rule_id.clone(), rule);
        Ok(())
    }

    pub async fn update_translation_rule(&self, rule: TranslationRule) -> Result<(), ComplianceError> {
        self.persist_rule(&rule).await?;
        self.rule_cache.write().insert(rule.rule_id.clone(), rule);
        Ok(())
    }

    pub async fn remove_translation_rule(&self, rule_id: &str) -> Result<(), ComplianceError> {
        self.store.delete(RULE_KIND, rule_id).await?;
        self.rule_cache.write().remove(rule_id);
        Ok(())
    }

    pub fn list_translation_rules(&self) -> Vec<TranslationRule> {
        self.rule_cache.read().values().cloned().collect()
    }

    async fn persist_rule(&self, rule: &TranslationRule) -> Result<(), ComplianceError> {
        let value = serde_json::to_value(rule).map_err(|e| ComplianceError::new(ErrorKind::Processing, "compliance-translator", "persist_rule", e.to_string()))?;
        self.store.put(RULE_KIND, &rule.rule_id, value).await
    }

    pub async fn register_schema(&self, protocol: Protocol, schema: Value) -> Result<(), ComplianceError> {
        self.store.put(SCHEMA_KIND, &format!("{protocol:?}"), schema).await
    }

    pub async fn fetch_schema(&self, protocol: Protocol) -> Result<Option<Value>, ComplianceError> {
        self.store.get(SCHEMA_KIND, &format!("{protocol:?}")).await
    }

    pub async fn validate_payload(&self, protocol: Protocol, payload: &Value) -> Result<Vec<String>, ComplianceError> {
        match self.fetch_schema(protocol).await? {
            Some(schema) => Ok(validate_against_schema(payload, &schema)),
            None => Ok(Vec::new()),
        }
    }
}

fn apply_transformation(payload: &Value, rule: &TranslationRule) -> Value {
    let mut result = payload.clone();
    if let Value::Object(map) = &mut result {
        for mapping in &rule.transformation_spec.field_mappings {
            if let Some(value) = map.remove(&mapping.from_field) {
                map.insert(mapping.to_field.clone(), value);
            }
        }
        for transform in &rule.transformation_spec.value_transformations {
            if let Some(Value::String(s)) = map.get(&transform.field) {
                let transformed = match transform.transform {
                    compliance_types::ValueTransform::Uppercase => s.to_uppercase(),
                    compliance_types::ValueTransform::Lowercase => s.to_lowercase(),
                };
                map.insert(transform.field.clone(), Value::String(transformed));
            }
        }
    }
    result
}

fn merge_protocol_defaults(header: &mut MessageHeader, protocol: Protocol) {
    let key = match protocol {
        Protocol::JsonRpc => "jsonrpc_version",
        Protocol::RestHttp => "content_type",
        Protocol::Grpc => "grpc_encoding",
        Protocol::Soap => "soap_version",
        Protocol::WebSocket => "ws_subprotocol",
        Protocol::GraphQl => "graphql_version",
    };
    let value = match protocol {
        Protocol::JsonRpc => "2.0",
        Protocol::RestHttp => "application/json",
        Protocol::Grpc => "identity",
        Protocol::Soap => "1.2",
        Protocol::WebSocket => "json",
        Protocol::GraphQl => "june2018",
    };
    header.custom_headers.entry(key.to_string()).or_insert_with(|| value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_store::InMemoryStore;
    use compliance_types::{FieldMapping, TransformationSpec};
    use serde_json::json;

    fn translator() -> MessageTranslator {
        MessageTranslator::new(Arc::new(InMemoryStore::new()))
    }

    fn header(source: Protocol, target: Protocol) -> MessageHeader {
        MessageHeader::new("msg_1", "sender", source, target)
    }

    #[tokio::test]
    async fn same_protocol_passes_through_unchanged() {
        let translator = translator();
        let header = header(Protocol::RestHttp, Protocol::RestHttp);
        let result = translator.translate_message(r#"{"a":1}"#, &header, Protocol::RestHttp).await;
        assert_eq!(result.result, TranslationOutcome::Success);
        assert_eq!(result.translated_payload, json!({"a": 1}));
    }

    #[tokio::test]
    async fn built_in_converter_handles_json_rpc_to_rest() {
        let translator = translator();
        let header = header(Protocol::JsonRpc, Protocol::RestHttp);
        let raw = r#"{"jsonrpc":"2.0","method":"orders.create","params":{"sku":"X"},"id":"7"}"#;
        let result = translator.translate_message(raw, &header, Protocol::RestHttp).await;
        assert_eq!(result.result, TranslationOutcome::Success);
        assert_eq!(result.translated_payload["method"], "orders.create");
        assert_eq!(result.translated_payload["url"], "/api/v1/orders.create");
        assert_eq!(result.translated_payload["headers"]["Content-Type"], "application/json");
        assert_eq!(result.translated_payload["body"], json!({"sku": "X"}));
    }

    #[tokio::test]
    async fn unsupported_pair_without_rule_reports_unsupported() {
        let translator = translator();
        let header = header(Protocol::Soap, Protocol::GraphQl);
        let result = translator.translate_message(r#"{"a":1}"#, &header, Protocol::GraphQl).await;
        assert_eq!(result.result, TranslationOutcome::Unsupported);
    }

    #[tokio::test]
    async fn explicit_rule_takes_priority_over_built_in() {
        let translator = translator();
        let rule = TranslationRule {
            rule_id: "r1".into(),
            name: "rename amount".into(),
            from_protocol: Protocol::RestHttp,
            to_protocol: Protocol::Soap,
            transformation_spec: TransformationSpec { field_mappings: vec![FieldMapping { from_field: "amount".into(), to_field: "value".into() }], value_transformations: vec![] },
            bidirectional: false,
            priority: 10,
            active: true,
        };
        translator.add_translation_rule(rule).await.unwrap();
        let header = header(Protocol::RestHttp, Protocol::Soap);
        let result = translator.translate_message(r#"{"amount": 5}"#, &header, Protocol::Soap).await;
        assert_eq!(result.result, TranslationOutcome::Success);
        assert_eq!(result.translated_payload, json!({"value": 5}));
    }

    #[tokio::test]
    async fn batch_translation_is_bounded_by_max_batch_size() {
        let translator = translator().with_config(TranslatorConfig { max_batch_size: 1, ..TranslatorConfig::default() });
        let messages = vec![
            (r#"{"a":1}"#.to_string(), header(Protocol::RestHttp, Protocol::RestHttp)),
            (r#"{"a":2}"#.to_string(), header(Protocol::RestHttp, Protocol::RestHttp)),
        ];
        let results = translator.translate_batch(&messages, Protocol::RestHttp).await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn parse_failure_reports_failure_with_diagnostic() {
        let translator = translator();
        let header = header(Protocol::RestHttp, Protocol::Soap);
        let result = translator.translate_message("not json", &header, Protocol::Soap).await;
        assert_eq!(result.result, TranslationOutcome::Failure);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn message_ids_are_monotonic_and_prefixed() {
        let translator = translator();
        assert_eq!(translator.next_message_id(), "msg_0");
        assert_eq!(translator.next_message_id(), "msg_1");
    }
}
