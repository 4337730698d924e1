// # JSON-RPC Envelope
//
// Wire format of one DIM call.
//
// ```json
// → {"jsonrpc": "2.0", "method": "rr_get_attrs", "params": [{...}], "id": null}
// ← {"result": <any>, "error": {"code": 0, "message": ""}}
// ```
//
// DIM answers with `Content-Type: text/html` regardless, so the body is
// parsed as JSON unconditionally. `error.code == 0` is success even when an
// error object is present.

use dim_core::value::kind_of;
use dim_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version tag
pub const JSONRPC_VERSION: &str = "2.0";

/// Outgoing request body
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: &'a [Value],
    /// Always null; DIM does not correlate responses
    pub id: Option<u64>,
}

impl<'a> RpcRequest<'a> {
    pub fn new(method: &'a str, params: &'a [Value]) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
            id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Parse a response body for `method`
///
/// A body that is not a JSON object (an SSO login page, say) is
/// [`Error::Decode`]; a non-zero error code is [`Error::Remote`] with the
/// code and message preserved.
pub fn decode_response(method: &str, body: &[u8]) -> Result<Value> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| Error::decode(method, e.to_string()))?;
    if !value.is_object() {
        return Err(Error::decode(
            method,
            format!("expected a JSON object, got {}", kind_of(&value)),
        ));
    }
    let response: RpcResponse =
        serde_json::from_value(value).map_err(|e| Error::decode(method, e.to_string()))?;

    match response.error {
        Some(RpcError {
            code: Some(code),
            message,
        }) if code != 0 => Err(Error::remote(method, code, message.unwrap_or_default())),
        _ => Ok(response.result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let params = vec![json!({"type": "A"})];
        let body = serde_json::to_value(RpcRequest::new("rr_list", &params)).unwrap();
        assert_eq!(
            body,
            json!({"jsonrpc": "2.0", "method": "rr_list", "params": [{"type": "A"}], "id": null})
        );
    }

    #[test]
    fn test_result_returned_verbatim() {
        let value = decode_response("zone_list", br#"{"result": [{"name": "a."}], "error": null}"#).unwrap();
        assert_eq!(value, json!([{"name": "a."}]));
    }

    #[test]
    fn test_code_zero_is_success() {
        let body = br#"{"result": 5, "error": {"code": 0, "message": "ignored"}}"#;
        assert_eq!(decode_response("ip_free", body).unwrap(), json!(5));
    }

    #[test]
    fn test_missing_result_is_null() {
        assert_eq!(decode_response("rr_delete", b"{}").unwrap(), Value::Null);
    }

    #[test]
    fn test_remote_error() {
        let body = br#"{"result": null, "error": {"code": 1, "message": "not found"}}"#;
        match decode_response("rr_get_attrs", body) {
            Err(Error::Remote { method, code, message }) => {
                assert_eq!(method, "rr_get_attrs");
                assert_eq!(code, 1);
                assert_eq!(message, "not found");
            }
            other => panic!("expected Remote, got {:?}", other),
        }
    }

    #[test]
    fn test_html_is_decode_error() {
        let err = decode_response("server_info", b"<html><body>Sign in</body></html>").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_array_body_is_decode_error() {
        assert!(matches!(decode_response("x", b"[]"), Err(Error::Decode { .. })));
    }
}
