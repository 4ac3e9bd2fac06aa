//! JSON-RPC tool-protocol adapter.
//!
//! Exposes the search capability to AI-agent clients as a discoverable tool over a
//! single POST endpoint. The adapter speaks a three-method JSON-RPC 2.0 subset
//! (`initialize`, `tools/list`, `tools/call`) with one conversational turn per call
//! and no session state. The request `id` is echoed unchanged in every response,
//! errors included.

mod protocol;
mod schemas;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

use crate::config::Config;
use crate::search::{SearchDispatcher, SearchInvocation};
use serde_json::{Value, json};

/// Protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// The single tool this adapter declares.
pub const TOOL_NAME: &str = "ask";

/// Handle one protocol request body and produce the response document.
///
/// Malformed bodies answer with `-32700` and a null id; everything else follows the
/// JSON-RPC error table (`-32601` unknown method/tool, `-32602` invalid params,
/// `-32000` dispatch failure).
pub async fn handle(dispatcher: &SearchDispatcher, config: &Config, body: &[u8]) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => {
            return JsonRpcResponse::failure(
                Value::Null,
                protocol::PARSE_ERROR,
                format!("Parse error: {err}"),
            );
        }
    };

    let id = request.id.clone();
    match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result()),
        "tools/list" => JsonRpcResponse::success(id, tools_list_result()),
        "tools/call" => handle_tool_call(dispatcher, config, id, request.params).await,
        other => JsonRpcResponse::failure(
            id,
            protocol::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "ragrelay",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn tools_list_result() -> Value {
    json!({
        "tools": [
            {
                "name": TOOL_NAME,
                "description": "Search the documentation and answer a question grounded in the matching pages.",
                "inputSchema": schemas::ask_input_schema(),
            }
        ],
    })
}

async fn handle_tool_call(
    dispatcher: &SearchDispatcher,
    config: &Config,
    id: Value,
    params: Value,
) -> JsonRpcResponse {
    let tool = params["name"].as_str().unwrap_or_default();
    if tool != TOOL_NAME {
        return JsonRpcResponse::failure(
            id,
            protocol::METHOD_NOT_FOUND,
            format!("Tool not found: {tool}"),
        );
    }

    let query = params["arguments"]["query"]
        .as_str()
        .map(str::trim)
        .unwrap_or_default();
    if query.is_empty() {
        return JsonRpcResponse::failure(
            id,
            protocol::INVALID_PARAMS,
            "`query` must be a non-empty string".to_string(),
        );
    }

    let invocation = SearchInvocation {
        query: query.to_string(),
        top_k: config.search_default_top_k,
        score_threshold: config.search_default_score_threshold,
        rewrite_query: true,
        wants_stream: false,
    };

    match dispatcher.answer(&invocation).await {
        Ok(answer) => {
            tracing::info!(sources = answer.data.len(), "Tool call answered");
            let sources: Vec<Value> = answer
                .data
                .iter()
                .map(|doc| json!({ "filename": doc.filename, "score": doc.score }))
                .collect();
            JsonRpcResponse::success(
                id,
                json!({
                    "content": [ { "type": "text", "text": answer.response } ],
                    "sources": sources,
                }),
            )
        }
        Err(err) => {
            tracing::error!(error = %err, "Tool call dispatch failed");
            JsonRpcResponse::failure(id, protocol::SERVER_ERROR, err.to_string())
        }
    }
}
