// ABOUTME: MCP server core that routes JSON-RPC requests to catalog-backed handlers
// ABOUTME: Implements initialize, tools/list, tools/call, and ping with per-call panic isolation
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::sync::Arc;

use mcpshell::catalog::Catalog;
use mcpshell::error::{ErrorKind, ToolError};
use mcpshell::executor::execute_tool;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::protocol::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcRequest, JsonRpcResponse,
    ToolDefinition, ToolsListResult,
};

/// MCP server dispatching JSON-RPC requests against a loaded catalog
///
/// The catalog is read-only after load, so the server shares it freely
/// across concurrent calls. Each `tools/call` runs on its own task: a
/// panicking tool pipeline is reported as an internal error for that
/// request and never takes the server down.
pub struct McpServer {
    catalog: Arc<Catalog>,
    shutdown: CancellationToken,
}

impl McpServer {
    /// Create a server over the given catalog and shutdown token
    pub const fn new(catalog: Arc<Catalog>, shutdown: CancellationToken) -> Self {
        Self { catalog, shutdown }
    }

    /// The shutdown token tool executions observe
    #[must_use]
    pub const fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Entry point over opaque JSON bytes
    ///
    /// Transports frame messages however they like and feed each one
    /// here. Unparseable input yields a parse-error response;
    /// notifications yield `None`.
    pub async fn handle_message(&self, raw: &[u8]) -> Option<Vec<u8>> {
        let request: JsonRpcRequest = match serde_json::from_slice(raw) {
            Ok(req) => req,
            Err(e) => {
                error!(error = %e, "Failed to parse JSON-RPC request");
                let resp = JsonRpcResponse::parse_error(format!("Parse error: {e}"));
                return serde_json::to_vec(&resp).ok();
            }
        };
        let response = self.handle_request(request).await?;
        match serde_json::to_vec(&response) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                error!(error = %e, "Failed to serialize JSON-RPC response");
                None
            }
        }
    }

    /// Route a JSON-RPC request to the appropriate MCP handler
    ///
    /// Returns `None` for notifications (requests without an id).
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::invalid_request(
                request.id,
                format!("Unsupported JSON-RPC version: {}", request.jsonrpc),
            ));
        }

        if request.is_notification() {
            debug!(method = %request.method, "Received notification, no response");
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id, request.params.as_ref()),
            "tools/list" => self.handle_tools_list(request.id),
            "tools/call" => self.handle_tools_call(request.id, request.params).await,
            "ping" => {
                JsonRpcResponse::result(request.id, Value::Object(serde_json::Map::new()))
            }
            method => {
                debug!(method, "Unknown MCP method");
                JsonRpcResponse::method_not_found(
                    request.id,
                    format!("Method not found: {method}"),
                )
            }
        };

        Some(response)
    }

    /// Handle `initialize` — advertise capabilities and catalog instructions
    fn handle_initialize(&self, id: Option<Value>, params: Option<&Value>) -> JsonRpcResponse {
        if let Some(params) = params {
            debug!(
                client = params
                    .pointer("/clientInfo/name")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown"),
                protocol = params
                    .get("protocolVersion")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or(""),
                "MCP client connected"
            );
        }

        let result =
            InitializeResult::advertise(self.catalog.description().map(ToOwned::to_owned));
        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::result(id, val),
            Err(e) => JsonRpcResponse::internal_error(id, format!("Serialization error: {e}")),
        }
    }

    /// Handle `tools/list` — definitions for every available tool
    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        let tools = self
            .catalog
            .tools()
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                input_schema: tool.input_schema(),
            })
            .collect();
        let result = ToolsListResult { tools };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::result(id, val),
            Err(e) => JsonRpcResponse::internal_error(id, format!("Serialization error: {e}")),
        }
    }

    /// Handle `tools/call` — dispatch to the tool executor on its own task
    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let call_params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(cp) => cp,
                Err(e) => {
                    return JsonRpcResponse::invalid_params(id, format!("Invalid params: {e}"));
                }
            },
            None => {
                return JsonRpcResponse::invalid_params(id, "Missing params for tools/call");
            }
        };

        if self.catalog.get(&call_params.name).is_none() {
            return JsonRpcResponse::method_not_found(
                id,
                format!("Tool not found: {}", call_params.name),
            );
        }

        let catalog = Arc::clone(&self.catalog);
        let token = self.shutdown.child_token();
        let name = call_params.name;
        let arguments = call_params.arguments.unwrap_or(Value::Null);

        // A spawned task is both the concurrency offload and a second
        // panic barrier: a panicking pipeline surfaces as JoinError.
        let outcome = tokio::spawn(async move {
            let Some(tool) = catalog.get(&name) else {
                return Err(ToolError::internal(format!("tool '{name}' disappeared")));
            };
            execute_tool(tool, &arguments, &token).await
        })
        .await;

        match outcome {
            Ok(Ok(output)) => Self::tool_result_response(id, CallToolResult::ok(output)),
            Ok(Err(err)) => Self::tool_error_response(id, &err),
            Err(join_err) => {
                error!(error = %join_err, "tools/call task failed");
                JsonRpcResponse::internal_error(id, "tool execution failed internally")
            }
        }
    }

    /// Map a `ToolError` onto the wire per its kind
    ///
    /// Validation failures are JSON-RPC invalid-params errors; execution
    /// failures come back as `isError` tool results so the client reads
    /// them as tool output; everything else is an internal error.
    fn tool_error_response(id: Option<Value>, err: &ToolError) -> JsonRpcResponse {
        warn!(kind = ?err.kind, message = %err.message, "tools/call failed");
        if err.is_validation() {
            return JsonRpcResponse::invalid_params(id, err.message.clone());
        }
        match err.kind {
            ErrorKind::ExecError => {
                Self::tool_result_response(id, CallToolResult::fail(err.message.clone()))
            }
            _ => JsonRpcResponse::internal_error(id, err.message.clone()),
        }
    }

    fn tool_result_response(id: Option<Value>, result: CallToolResult) -> JsonRpcResponse {
        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::result(id, val),
            Err(e) => {
                JsonRpcResponse::internal_error(id, format!("Result serialization error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpshell::catalog::ConfigFile;

    fn server() -> McpServer {
        let file: ConfigFile = serde_yaml::from_str(
            r#"
mcp:
  description: "Greeting tools"
  tools:
    - name: hello_world
      description: "Greets the caller"
      params:
        name:
          type: string
          required: true
      constraints:
        - "name.size() <= 100"
        - "!name.contains('/')"
      run:
        command: "echo 'Hello, {{ .name }}!'"
"#,
        )
        .expect("yaml");
        let catalog = Catalog::from_files(vec![file]).expect("catalog");
        McpServer::new(Arc::new(catalog), CancellationToken::new())
    }

    async fn roundtrip(server: &McpServer, raw: &str) -> Value {
        let bytes = server
            .handle_message(raw.as_bytes())
            .await
            .expect("response expected");
        serde_json::from_slice(&bytes).expect("valid json response")
    }

    #[tokio::test]
    async fn initialize_advertises_instructions() {
        let server = server();
        let resp = roundtrip(
            &server,
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"test"}}}"#,
        )
        .await;
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["result"]["serverInfo"]["name"], "mcpshell");
        assert_eq!(resp["result"]["instructions"], "Greeting tools");
    }

    #[tokio::test]
    async fn tools_list_exposes_schema() {
        let server = server();
        let resp = roundtrip(&server, r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#).await;
        let tools = resp["result"]["tools"].as_array().expect("tools array");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "hello_world");
        assert_eq!(tools[0]["inputSchema"]["properties"]["name"]["type"], "string");
        assert_eq!(tools[0]["inputSchema"]["required"][0], "name");
    }

    #[tokio::test]
    async fn tools_call_executes() {
        let server = server();
        let resp = roundtrip(
            &server,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"hello_world","arguments":{"name":"John"}}}"#,
        )
        .await;
        assert_eq!(resp["result"]["content"][0]["type"], "text");
        assert_eq!(resp["result"]["content"][0]["text"], "Hello, John!\n");
        assert!(resp["result"]["isError"].is_null());
    }

    #[tokio::test]
    async fn constraint_violation_is_invalid_params() {
        let server = server();
        let resp = roundtrip(
            &server,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"hello_world","arguments":{"name":"A/B"}}}"#,
        )
        .await;
        assert_eq!(resp["error"]["code"], -32_602);
        assert_eq!(resp["error"]["message"], "constraint not satisfied");
    }

    #[tokio::test]
    async fn unknown_tool_is_method_not_found() {
        let server = server();
        let resp = roundtrip(
            &server,
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#,
        )
        .await;
        assert_eq!(resp["error"]["code"], -32_601);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let server = server();
        let resp = roundtrip(
            &server,
            r#"{"jsonrpc":"2.0","id":6,"method":"resources/list"}"#,
        )
        .await;
        assert_eq!(resp["error"]["code"], -32_601);
        assert_eq!(resp["id"], 6);
    }

    #[tokio::test]
    async fn parse_error_yields_minus_32700() {
        let server = server();
        let resp = roundtrip(&server, "{not json").await;
        assert_eq!(resp["error"]["code"], -32_700);
    }

    #[tokio::test]
    async fn notification_yields_no_response() {
        let server = server();
        let silent = server
            .handle_message(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(silent.is_none());
    }

    #[tokio::test]
    async fn missing_required_param_is_invalid_params() {
        let server = server();
        let resp = roundtrip(
            &server,
            r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"hello_world","arguments":{}}}"#,
        )
        .await;
        assert_eq!(resp["error"]["code"], -32_602);
        assert!(resp["error"]["message"]
            .as_str()
            .expect("message")
            .contains("name"));
    }

    #[tokio::test]
    async fn ping_answers_empty_object() {
        let server = server();
        let resp = roundtrip(&server, r#"{"jsonrpc":"2.0","id":8,"method":"ping"}"#).await;
        assert!(resp["result"].as_object().expect("object").is_empty());
    }
}
