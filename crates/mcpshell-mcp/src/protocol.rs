// ABOUTME: Wire types for the MCP dialect of JSON-RPC 2.0
// ABOUTME: Envelope plus the initialize handshake and the tools/list + tools/call surface
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Protocol revision this server speaks
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name advertised in the initialize handshake
pub const SERVER_NAME: &str = "mcpshell";

/// Version advertised in the initialize handshake
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A JSON-RPC request as read off the transport
///
/// `id` doubles as the notification marker: the protocol says a request
/// without one expects no reply.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Envelope version marker, must be "2.0"
    pub jsonrpc: String,
    /// Request identifier, echoed in the response
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name, e.g. `tools/call`
    pub method: String,
    /// Method parameters, shape depends on the method
    #[serde(default)]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Whether this request is a notification (no id, no reply)
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// A JSON-RPC response: a result or an error, never both
///
/// Construction goes through the helpers below so every error carries
/// its canonical code and the success/error exclusivity holds by
/// construction.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    /// Successful response carrying `result`
    #[must_use]
    pub fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }

    /// `-32700`: the message was not valid JSON; the id is unknowable
    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::failure(None, -32_700, message)
    }

    /// `-32600`: the envelope itself is malformed
    #[must_use]
    pub fn invalid_request(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::failure(id, -32_600, message)
    }

    /// `-32601`: no such method (also used for calls on unknown tools)
    #[must_use]
    pub fn method_not_found(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::failure(id, -32_601, message)
    }

    /// `-32602`: parameters rejected before anything ran
    #[must_use]
    pub fn invalid_params(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::failure(id, -32_602, message)
    }

    /// `-32603`: the server failed while handling the request
    #[must_use]
    pub fn internal_error(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::failure(id, -32_603, message)
    }
}

/// Payload answering `initialize`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol revision the server supports
    pub protocol_version: &'static str,
    /// Capability set; tools are the only capability this server has
    pub capabilities: Value,
    /// Who is answering
    pub server_info: ServerInfo,
    /// Free-form usage guidance, fed from the catalog description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    /// Build the handshake payload, attaching the catalog description
    /// as instructions when one is configured
    #[must_use]
    pub fn advertise(instructions: Option<String>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            capabilities: json!({ "tools": {} }),
            server_info: ServerInfo {
                name: SERVER_NAME,
                version: SERVER_VERSION,
            },
            instructions,
        }
    }
}

/// Server identity inside the initialize payload
#[derive(Debug, Serialize)]
pub struct ServerInfo {
    /// Server name
    pub name: &'static str,
    /// Server version
    pub version: &'static str,
}

/// One entry of a `tools/list` answer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Tool name, unique within the catalog
    pub name: String,
    /// What the tool does, for the model's benefit
    pub description: String,
    /// JSON Schema of the arguments object
    pub input_schema: Value,
}

/// The `tools/list` answer
#[derive(Debug, Serialize)]
pub struct ToolsListResult {
    /// Every available tool
    pub tools: Vec<ToolDefinition>,
}

/// What a `tools/call` request carries
#[derive(Debug, Deserialize)]
pub struct CallToolParams {
    /// Which tool to run
    pub name: String,
    /// Arguments object; absent means no arguments
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// The `tools/call` answer: text content plus an error flag
///
/// Execution failures the client should read as tool output travel in
/// this envelope with `isError` set, not as JSON-RPC errors.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Content parts; this server always produces exactly one text part
    pub content: Vec<TextContent>,
    /// Set (true) when the content is an error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// A text content part
#[derive(Debug, Serialize)]
pub struct TextContent {
    /// Content discriminator, always "text"
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// The text itself
    pub text: String,
}

impl CallToolResult {
    /// Wrap successful tool output
    #[must_use]
    pub fn ok(text: String) -> Self {
        Self {
            content: vec![TextContent { kind: "text", text }],
            is_error: None,
        }
    }

    /// Wrap a failure the client should observe as tool output
    #[must_use]
    pub fn fail(text: String) -> Self {
        Self {
            content: vec![TextContent { kind: "text", text }],
            is_error: Some(true),
        }
    }
}
