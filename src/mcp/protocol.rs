//! JSON-RPC 2.0 envelope types for the tool protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body could not be parsed as a JSON-RPC envelope.
pub(crate) const PARSE_ERROR: i64 = -32700;
/// Unknown method, or unknown tool on `tools/call`.
pub(crate) const METHOD_NOT_FOUND: i64 = -32601;
/// Structurally valid call with unusable parameters.
pub(crate) const INVALID_PARAMS: i64 = -32602;
/// Dispatch failed after validation.
pub(crate) const SERVER_ERROR: i64 = -32000;

/// Incoming JSON-RPC request.
///
/// The `id` defaults to null so notifications and id-less requests still get a
/// correlated response.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Correlation value echoed back unchanged.
    #[serde(default)]
    pub id: Value,
    /// Method name (`initialize`, `tools/list`, `tools/call`).
    pub method: String,
    /// Method-specific parameters.
    #[serde(default)]
    pub params: Value,
}

/// Outgoing JSON-RPC response, success or error.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Correlation value copied from the request.
    pub id: Value,
    /// Present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// Protocol error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

impl JsonRpcResponse {
    /// Build a success response carrying `result`.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response with the given code and message.
    pub fn failure(id: Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}
