// ABOUTME: Agent events — the tagged records the orchestrator emits per run
// ABOUTME: Events flow through one mpsc channel so they are totally ordered
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

/// One event emitted by the orchestrator
///
/// Events for a run are totally ordered: chunks of a turn precede that
/// turn's completion event, and tool-call events follow the assistant
/// message's declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// Incremental assistant text from the LLM stream
    AssistantChunk(String),
    /// A completed plain-text assistant message
    AssistantMessage(String),
    /// A tool call is about to execute
    ToolCallStart {
        /// Tool name
        name: String,
        /// Raw arguments JSON as supplied by the model
        args: String,
    },
    /// A tool call finished
    ToolCallResult {
        /// Tool name
        name: String,
        /// Tool output, or the error text fed back to the model
        output: Result<String, String>,
    },
    /// The run ended: `model`, `once`, `input-closed`, or `cancelled`
    Terminated(String),
    /// The run failed: `iteration-cap` or an LLM failure description
    Error(String),
}
