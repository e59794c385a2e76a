//! MCP request dispatch
//!
//! Implements the server side of the methods a tool-only MCP server needs:
//! `initialize`, `ping`, `tools/list` and `tools/call`. Notifications are
//! accepted and never answered.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::jsonrpc::*;
use crate::tools::FarmTools;

/// Protocol revision offered when the client does not ask for one
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const SERVER_NAME: &str = "Testing-Farm MCP Server";

pub struct McpHandler {
    tools: Arc<FarmTools>,
}

impl McpHandler {
    pub fn new(tools: Arc<FarmTools>) -> Self {
        Self { tools }
    }

    /// Handle one raw message (a request, a notification or a batch).
    ///
    /// Returns the JSON to send back, or `None` when nothing is owed.
    pub async fn handle_message(&self, raw: &str) -> Option<Value> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("Unparseable message: {}", e);
                return to_value(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        match value {
            Value::Array(batch) => {
                if batch.is_empty() {
                    return to_value(JsonRpcResponse::error(
                        Value::Null,
                        INVALID_REQUEST,
                        "Empty batch",
                    ));
                }
                let mut responses = Vec::new();
                for item in batch {
                    if let Some(resp) = self.handle_value(item).await {
                        responses.extend(to_value(resp));
                    }
                }
                (!responses.is_empty()).then_some(Value::Array(responses))
            }
            other => self.handle_value(other).await.and_then(to_value),
        }
    }

    async fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        // Responses from the client carry no method and are never answered
        if value.get("method").is_none()
            && (value.get("result").is_some() || value.get("error").is_some())
        {
            debug!("Ignoring client response {}", value.get("id").unwrap_or(&serde_json::Value::Null));
            return None;
        }

        let id = value.get("id").cloned();
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(req) => self.handle(req).await,
            Err(_) if id.is_some() => Some(JsonRpcResponse::error(
                id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "Invalid request",
            )),
            Err(_) => None,
        }
    }

    /// Handle a JSON-RPC request
    pub async fn handle(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        trace!("RPC: {}", req.method);

        if req.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                req.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "Invalid JSON-RPC version",
            ));
        }

        if req.is_notification() {
            debug!("Notification: {}", req.method);
            return None;
        }
        let id = req.id.unwrap_or(Value::Null);

        let response = match req.method.as_str() {
            "initialize" => self.initialize(id, &req.params),
            "ping" => JsonRpcResponse::result(id, json!({})),
            "tools/list" => self.tools_list(id),
            "tools/call" => self.tools_call(id, &req.params).await,
            _ => {
                warn!("Unknown RPC method: {}", req.method);
                JsonRpcResponse::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", req.method),
                )
            }
        };
        Some(response)
    }

    fn initialize(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let protocol = params
            .get("protocolVersion")
            .and_then(|v| v.as_str())
            .unwrap_or(PROTOCOL_VERSION);
        if let Some(client) = params.get("clientInfo") {
            debug!("Client connected: {}", client);
        }

        JsonRpcResponse::result(
            id,
            json!({
                "protocolVersion": protocol,
                "capabilities": {
                    "tools": {"listChanged": false}
                },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
    }

    fn tools_list(&self, id: Value) -> JsonRpcResponse {
        match serde_json::to_value(FarmTools::definitions()) {
            Ok(tools) => JsonRpcResponse::result(id, json!({ "tools": tools })),
            Err(e) => JsonRpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn tools_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(|n| n.as_str()) else {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing tool name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        match self.tools.call(name, &arguments).await {
            Ok(output) => JsonRpcResponse::result(
                id,
                json!({
                    "content": [{"type": "text", "text": output.text}],
                    "isError": output.is_error,
                }),
            ),
            Err(e) => {
                debug!("Rejected tool call {}: {}", name, e);
                JsonRpcResponse::error(id, INVALID_PARAMS, e.to_string())
            }
        }
    }
}

fn to_value(resp: JsonRpcResponse) -> Option<Value> {
    match serde_json::to_value(resp) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Failed to serialize response: {}", e);
            None
        }
    }
}
