// ABOUTME: OpenAI-compatible chat-completions wire types and streaming client
// ABOUTME: Parses SSE chunk frames and coalesces tool-call deltas into complete calls
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use mcpshell::catalog::Catalog;
use mcpshell::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

// ============================================================================
// Message Types
// ============================================================================

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction message
    System,
    /// User input message
    User,
    /// Assistant response message
    Assistant,
    /// Tool result message, addressed by `tool_call_id`
    Tool,
}

/// A single message in a chat conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: Role,
    /// Message content (absent on assistant messages that only carry
    /// tool calls)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls issued by an assistant message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// The assistant tool call this tool message answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a plain-text assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create an assistant message carrying tool calls
    #[must_use]
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }

    /// Create a tool message answering the given tool call
    #[must_use]
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Approximate byte size of this message for compaction budgeting
    #[must_use]
    pub fn byte_size(&self) -> usize {
        let content = self.content.as_ref().map_or(0, String::len);
        let calls = self.tool_calls.as_ref().map_or(0, |calls| {
            calls
                .iter()
                .map(|c| c.id.len() + c.function.name.len() + c.function.arguments.len())
                .sum()
        });
        content + calls
    }
}

/// A complete tool call issued by the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, echoed back by the tool message
    pub id: String,
    /// Call type (always "function")
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function being called
    pub function: FunctionCall,
}

/// Function name and raw arguments of a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name
    pub name: String,
    /// Arguments as a JSON-encoded string
    pub arguments: String,
}

// ============================================================================
// Tool Schemas
// ============================================================================

/// A function tool advertised to the model
#[derive(Debug, Clone, Serialize)]
pub struct ToolSchema {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    /// Function spec
    pub function: FunctionSpec,
}

/// Function spec within a tool schema
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: Value,
}

/// Convert the catalog's available tools to function-call schemas
#[must_use]
pub fn tool_schemas(catalog: &Catalog) -> Vec<ToolSchema> {
    catalog
        .tools()
        .iter()
        .map(|tool| ToolSchema {
            tool_type: "function",
            function: FunctionSpec {
                name: tool.name().to_owned(),
                description: tool.description().to_owned(),
                parameters: tool.input_schema(),
            },
        })
        .collect()
}

// ============================================================================
// Streaming
// ============================================================================

/// One frame of a streaming chat completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental assistant text
    Content(String),
    /// Partial tool call, keyed by index
    ToolCallDelta(ToolCallDelta),
    /// Terminal frame carrying the finish reason
    Finish(String),
}

/// A tool-call fragment from a streaming delta
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    /// Position of the call within the assistant message
    pub index: usize,
    /// Call id (first fragment only)
    pub id: Option<String>,
    /// Function name (first fragment only)
    pub name: Option<String>,
    /// Arguments fragment, concatenated across deltas
    pub arguments: Option<String>,
}

/// Stream of chat-completion frames
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ToolError>> + Send>>;

/// Coalesces index-keyed tool-call deltas into complete calls
///
/// OpenAI-compatible APIs split a call across many frames: the id and
/// name arrive first, then the arguments string trickles in. The
/// accumulator folds fragments by index and reassembles them in index
/// order.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    partials: BTreeMap<usize, PartialCall>,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    /// Create an empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta into the partial calls
    pub fn push(&mut self, delta: &ToolCallDelta) {
        let partial = self.partials.entry(delta.index).or_default();
        if let Some(id) = &delta.id {
            partial.id.push_str(id);
        }
        if let Some(name) = &delta.name {
            partial.name.push_str(name);
        }
        if let Some(arguments) = &delta.arguments {
            partial.arguments.push_str(arguments);
        }
    }

    /// Whether any call fragment has arrived
    #[must_use]
    pub fn has_calls(&self) -> bool {
        !self.partials.is_empty()
    }

    /// Reassemble the complete calls in index order
    #[must_use]
    pub fn finish(self) -> Vec<ToolCall> {
        self.partials
            .into_values()
            .map(|partial| ToolCall {
                id: partial.id,
                call_type: "function".to_owned(),
                function: FunctionCall {
                    name: partial.name,
                    arguments: partial.arguments,
                },
            })
            .collect()
    }
}

// ============================================================================
// Backend Trait & Client
// ============================================================================

/// A chat-completions backend the orchestrator can stream from
///
/// The production implementation is [`ChatClient`]; tests inject
/// scripted backends.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a streaming completion over the accumulated messages
    async fn create_stream(
        &self,
        token: &CancellationToken,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        max_tokens: Option<u32>,
    ) -> Result<ChatStream, ToolError>;
}

/// Reqwest-based client for OpenAI-compatible chat-completions APIs
pub struct ChatClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolSchema],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl ChatClient {
    /// Create a client for the given endpoint, key, and model
    #[must_use]
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn create_stream(
        &self,
        token: &CancellationToken,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        max_tokens: Option<u32>,
    ) -> Result<ChatStream, ToolError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            tools,
            stream: true,
            max_tokens,
        };

        let mut request = self.http.post(self.endpoint()).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        debug!(endpoint = %self.endpoint(), model = %self.model, "Starting chat completion stream");

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::llm(format!("chat completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ToolError::llm(format!(
                "chat completion returned {status}: {}",
                detail.trim()
            )));
        }

        let (tx, rx) = mpsc::channel::<Result<StreamEvent, ToolError>>(64);
        let token = token.clone();
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = String::new();
            loop {
                let chunk = tokio::select! {
                    () = token.cancelled() => break,
                    chunk = bytes.next() => chunk,
                };
                let Some(chunk) = chunk else { break };
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ToolError::llm(format!("stream read failed: {e}"))))
                            .await;
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_owned();
                    buffer.drain(..=pos);
                    for event in parse_sse_line(&line) {
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Parse one SSE line into zero or more stream events
///
/// Lines outside the `data:` protocol and the `[DONE]` sentinel produce
/// nothing. A malformed data payload is skipped with a warning rather
/// than failing the stream.
fn parse_sse_line(line: &str) -> Vec<StreamEvent> {
    let Some(data) = line.strip_prefix("data:") else {
        return Vec::new();
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Vec::new();
    }

    let Ok(frame) = serde_json::from_str::<ChunkFrame>(data) else {
        warn!(payload = %&data[..data.len().min(120)], "Skipping malformed SSE chunk");
        return Vec::new();
    };

    let mut events = Vec::new();
    if let Some(choice) = frame.choices.into_iter().next() {
        if let Some(content) = choice.delta.content {
            if !content.is_empty() {
                events.push(StreamEvent::Content(content));
            }
        }
        if let Some(deltas) = choice.delta.tool_calls {
            for delta in deltas {
                events.push(StreamEvent::ToolCallDelta(ToolCallDelta {
                    index: delta.index,
                    id: delta.id,
                    name: delta.function.as_ref().and_then(|f| f.name.clone()),
                    arguments: delta.function.and_then(|f| f.arguments),
                }));
            }
        }
        if let Some(reason) = choice.finish_reason {
            events.push(StreamEvent::Finish(reason));
        }
    }
    events
}

// Wire shape of one streaming chunk frame
#[derive(Deserialize)]
struct ChunkFrame {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<RawToolCallDelta>>,
}

#[derive(Deserialize)]
struct RawToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<RawFunctionDelta>,
}

#[derive(Deserialize)]
struct RawFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("s").role, Role::System);
        assert_eq!(ChatMessage::user("u").role, Role::User);
        assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);
        let tool = ChatMessage::tool("call_1", "out");
        assert_eq!(tool.role, Role::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn tool_message_serializes_call_id() {
        let msg = ChatMessage::tool("call_7", "result text");
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"tool_call_id\":\"call_7\""));
        assert!(json.contains("\"role\":\"tool\""));
        assert!(!json.contains("tool_calls"));
    }

    #[test]
    fn accumulator_reassembles_split_arguments() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&ToolCallDelta {
            index: 0,
            id: Some("call_1".to_owned()),
            name: Some("hello_world".to_owned()),
            arguments: Some("{\"na".to_owned()),
        });
        acc.push(&ToolCallDelta {
            index: 0,
            arguments: Some("me\": \"John\"}".to_owned()),
            ..ToolCallDelta::default()
        });
        let calls = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "hello_world");
        assert_eq!(calls[0].function.arguments, "{\"name\": \"John\"}");
    }

    #[test]
    fn accumulator_orders_calls_by_index() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(&ToolCallDelta {
            index: 1,
            id: Some("call_b".to_owned()),
            name: Some("second".to_owned()),
            arguments: Some("{}".to_owned()),
        });
        acc.push(&ToolCallDelta {
            index: 0,
            id: Some("call_a".to_owned()),
            name: Some("first".to_owned()),
            arguments: Some("{}".to_owned()),
        });
        let calls = acc.finish();
        assert_eq!(calls[0].function.name, "first");
        assert_eq!(calls[1].function.name, "second");
    }

    #[test]
    fn parse_content_chunk() {
        let events = parse_sse_line(
            r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#,
        );
        assert_eq!(events, vec![StreamEvent::Content("Hel".to_owned())]);
    }

    #[test]
    fn parse_tool_call_chunk() {
        let events = parse_sse_line(
            r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"hello_world","arguments":""}}]},"finish_reason":null}]}"#,
        );
        let StreamEvent::ToolCallDelta(delta) = &events[0] else {
            panic!("expected tool call delta");
        };
        assert_eq!(delta.id.as_deref(), Some("call_1"));
        assert_eq!(delta.name.as_deref(), Some("hello_world"));
    }

    #[test]
    fn parse_finish_chunk() {
        let events =
            parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#);
        assert_eq!(events, vec![StreamEvent::Finish("tool_calls".to_owned())]);
    }

    #[test]
    fn done_sentinel_and_noise_ignored() {
        assert!(parse_sse_line("data: [DONE]").is_empty());
        assert!(parse_sse_line(": keep-alive").is_empty());
        assert!(parse_sse_line("").is_empty());
        assert!(parse_sse_line("data: {malformed").is_empty());
    }

    #[test]
    fn byte_size_counts_content_and_calls() {
        assert_eq!(ChatMessage::user("1234").byte_size(), 4);
        let call = ToolCall {
            id: "ab".to_owned(),
            call_type: "function".to_owned(),
            function: FunctionCall {
                name: "cd".to_owned(),
                arguments: "{}".to_owned(),
            },
        };
        assert_eq!(
            ChatMessage::assistant_tool_calls(None, vec![call]).byte_size(),
            6
        );
    }
}
