//! Source-protocol detection over a raw message body (spec.md §4.3
//! "Detection algorithm").

use compliance_types::Protocol;
use serde_json::Value;

/// Returns the most likely protocol for `raw`, or `None` if nothing matches.
pub fn detect_protocol(raw: &str) -> Option<Protocol> {
    let parsed: Option<Value> = serde_json::from_str(raw).ok();

    if let Some(value) = &parsed {
        if value.get("jsonrpc").is_some() && value.get("method").is_some() {
            return Some(Protocol::JsonRpc);
        }
        if value.get("query").is_some() || value.get("mutation").is_some() {
            return Some(Protocol::GraphQl);
        }
        if value.get("method").is_some() && value.get("url").is_some() {
            return Some(Protocol::RestHttp);
        }
    }

    let trimmed = raw.trim_start();
    if trimmed.starts_with("<?xml") || trimmed.contains("<soap:") {
        return Some(Protocol::Soap);
    }

    if parsed.is_some() {
        return Some(Protocol::RestHttp);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_json_rpc_first() {
        let raw = r#"{"jsonrpc": "2.0", "method": "ping", "id": 1}"#;
        assert_eq!(detect_protocol(raw), Some(Protocol::JsonRpc));
    }

    #[test]
    fn detects_graphql_before_rest() {
        let raw = r#"{"query": "{ health }"}"#;
        assert_eq!(detect_protocol(raw), Some(Protocol::GraphQl));
    }

    #[test]
    fn detects_rest_http_with_method_and_url() {
        let raw = r#"{"method": "GET", "url": "/health"}"#;
        assert_eq!(detect_protocol(raw), Some(Protocol::RestHttp));
    }

    #[test]
    fn detects_soap_by_prologue() {
        let raw = "<?xml version=\"1.0\"?><soap:Envelope></soap:Envelope>";
        assert_eq!(detect_protocol(raw), Some(Protocol::Soap));
    }

    #[test]
    fn falls_back_to_rest_http_for_plain_json() {
        let raw = r#"{"foo": "bar"}"#;
        assert_eq!(detect_protocol(raw), Some(Protocol::RestHttp));
    }

    #[test]
    fn unparseable_input_detects_nothing() {
        assert_eq!(detect_protocol("not json, not xml"), None);
    }
}
