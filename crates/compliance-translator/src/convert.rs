//! Built-in pairwise protocol converters, used when no active translation
//! rule matches the `(from, to)` pair (spec.md §4.3 step 5).

use compliance_types::Protocol;
use serde_json::{json, Value};

/// Converts `payload` from `from` to `to` using a fixed built-in mapping.
/// Returns `None` if the pair has no built-in converter.
pub fn convert(payload: &Value, from: Protocol, to: Protocol) -> Option<Value> {
    use Protocol::*;
    match (from, to) {
        (JsonRpc, RestHttp) => {
            let method = payload.get("method").and_then(Value::as_str).unwrap_or("");
            Some(json!({
                "method": method,
                "url": format!("/api/v1/{method}"),
                "headers": {"Content-Type": "application/json"},
                "body": payload.get("params").cloned().unwrap_or(Value::Null),
            }))
        }
        (RestHttp, JsonRpc) => Some(json!({
            "jsonrpc": "2.0",
            "method": strip_rest_prefix(payload.get("url").and_then(Value::as_str).unwrap_or("")),
            "params": payload.get("body").cloned().unwrap_or(Value::Null),
        })),
        (JsonRpc, Grpc) => Some(json!({
            "service": "rpc",
            "rpc_method": payload.get("method").cloned().unwrap_or(Value::Null),
            "request": payload.get("params").cloned().unwrap_or(Value::Null),
        })),
        (Grpc, JsonRpc) => Some(json!({
            "jsonrpc": "2.0",
            "method": payload.get("rpc_method").cloned().unwrap_or(Value::Null),
            "params": payload.get("request").cloned().unwrap_or(Value::Null),
        })),
        (RestHttp, Soap) => Some(json!({
            "soap:Envelope": {
                "soap:Body": payload.get("body").cloned().unwrap_or(Value::Null),
            }
        })),
        (Soap, RestHttp) => {
            let body = payload.get("soap:Envelope").and_then(|e| e.get("soap:Body")).cloned().unwrap_or(Value::Null);
            Some(json!({"method": "POST", "url": "/", "body": body}))
        }
        (WebSocket, RestHttp) | (RestHttp, WebSocket) => Some(payload.clone()),
        _ => None,
    }
}

/// Strips the `/api/v1/` prefix this converter writes, falling back to a
/// bare leading slash for REST payloads built some other way.
fn strip_rest_prefix(url: &str) -> &str {
    url.strip_prefix("/api/v1/").unwrap_or_else(|| url.trim_start_matches('/'))
}
