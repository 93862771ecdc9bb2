//! Structural protocol-schema validation (a JSON Schema subset: `type`,
//! `required`, `properties.*.type`), not a full JSON Schema implementation —
//! see SPEC_FULL.md's schema-validation supplement.

use serde_json::Value;

/// Checks `instance` against `schema`'s `required` keys and each declared
/// property's primitive `type`. Returns the list of violations; empty means
/// valid.
pub fn validate_against_schema(instance: &Value, schema: &Value) -> Vec<String> {
    let mut violations = Vec::new();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required {
            if let Some(key) = key.as_str() {
                if instance.get(key).is_none() {
                    violations.push(format!("missing required field '{key}'"));
                }
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, spec) in properties {
            let Some(value) = instance.get(field) else { continue };
            let Some(expected_type) = spec.get("type").and_then(Value::as_str) else { continue };
            if !matches_type(value, expected_type) {
                violations.push(format!("field '{field}' expected type '{expected_type}'"));
            }
        }
    }

    violations
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}
