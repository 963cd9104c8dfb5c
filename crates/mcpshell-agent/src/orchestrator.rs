// ABOUTME: The agent orchestration loop — streaming LLM turns with tool dispatch
// ABOUTME: Enforces the iteration cap, feeds tool errors back, and honors cancellation
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

//! # Orchestrator
//!
//! One run drives a multi-turn conversation: stream an assistant
//! response, execute any tool calls through the core executor, feed the
//! results back, and repeat until the model emits `TERMINATE`, the
//! input channel closes, the iteration cap trips, or the token cancels.
//! Tool argument parse failures and execution errors are fed back to
//! the model as tool messages so it may retry; cancellation ends the
//! run without an error.

use std::sync::Arc;

use futures::StreamExt;
use mcpshell::catalog::Catalog;
use mcpshell::error::ToolError;
use mcpshell::executor::execute_tool;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::compact::maybe_compact;
use crate::config::ModelPrompts;
use crate::events::AgentEvent;
use crate::openai::{
    tool_schemas, ChatBackend, ChatMessage, ChatStream, StreamEvent, ToolCall,
    ToolCallAccumulator, ToolSchema,
};

/// Maximum tool-call rounds in a single run
const MAX_TOOL_ROUNDS: usize = 50;

/// Instruction appended to the system prompt unless one already
/// mentions the terminal keyword
const TERMINATE_INSTRUCTION: &str =
    "When your task is complete, emit TERMINATE in your final message.";

/// Settings fixed for the lifetime of one orchestrator
pub struct OrchestratorSettings {
    /// Exit after the first plain-text assistant message
    pub once: bool,
    /// Byte budget driving session compaction
    pub context_bytes: usize,
    /// Max tokens per completion, forwarded to the backend
    pub max_tokens: Option<u32>,
    /// Model-level prompt blocks, concatenated after the catalog's
    pub prompts: ModelPrompts,
}

/// The agent orchestration loop
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    tool_runner: Option<Arc<dyn ChatBackend>>,
    catalog: Arc<Catalog>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    /// Create an orchestrator over a backend and catalog
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        catalog: Arc<Catalog>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            backend,
            tool_runner: None,
            catalog,
            settings,
        }
    }

    /// Route tool-result completions to a dedicated backend
    ///
    /// The primary backend opens the conversation and handles plain
    /// turns; once a round has executed tool calls, the next completion
    /// — the one that digests the tool results and decides what to do
    /// next — goes to this backend instead. Configured through the
    /// `agent.tool-runner` entry.
    #[must_use]
    pub fn with_tool_runner(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.tool_runner = Some(backend);
        self
    }

    /// Run one conversation to termination
    ///
    /// Events are emitted in total order on `events`; `user_input`
    /// supplies follow-up lines in interactive mode. Cancellation of
    /// `token` ends the run with `Terminated("cancelled")` and an `Ok`
    /// return — cancellation is not a failure.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` when the chat backend fails beyond its one
    /// transparent retry.
    pub async fn run(
        &self,
        initial_prompt: String,
        mut user_input: mpsc::Receiver<String>,
        events: mpsc::Sender<AgentEvent>,
        token: CancellationToken,
    ) -> Result<(), ToolError> {
        let tools = tool_schemas(&self.catalog);
        let mut messages = self.seed_messages(&initial_prompt);
        let mut tool_rounds = 0usize;
        let mut after_tools = false;

        loop {
            if token.is_cancelled() {
                let _ = events.send(AgentEvent::Terminated("cancelled".to_owned())).await;
                return Ok(());
            }

            let backend = self.active_backend(after_tools);
            let turn = match self
                .stream_turn(backend, &messages, &tools, &events, &token)
                .await
            {
                Ok(turn) => turn,
                Err(err) => {
                    let _ = events.send(AgentEvent::Error(err.message.clone())).await;
                    return Err(err);
                }
            };

            if token.is_cancelled() {
                let _ = events.send(AgentEvent::Terminated("cancelled".to_owned())).await;
                return Ok(());
            }

            if !turn.tool_calls.is_empty() {
                if tool_rounds >= MAX_TOOL_ROUNDS {
                    warn!("Iteration cap reached, terminating run");
                    let _ = events.send(AgentEvent::Error("iteration-cap".to_owned())).await;
                    return Ok(());
                }
                tool_rounds += 1;

                let content = (!turn.content.is_empty()).then(|| turn.content.clone());
                messages.push(ChatMessage::assistant_tool_calls(content, turn.tool_calls.clone()));

                for call in &turn.tool_calls {
                    if self.dispatch_tool_call(call, &mut messages, &events, &token).await {
                        let _ = events
                            .send(AgentEvent::Terminated("cancelled".to_owned()))
                            .await;
                        return Ok(());
                    }
                }

                after_tools = true;
                maybe_compact(&mut messages, self.settings.context_bytes);
                continue;
            }

            // Plain-text turn
            after_tools = false;
            messages.push(ChatMessage::assistant(turn.content.clone()));
            let _ = events
                .send(AgentEvent::AssistantMessage(turn.content.clone()))
                .await;

            if turn.content.to_lowercase().contains("terminate") {
                info!("Model emitted TERMINATE");
                let _ = events.send(AgentEvent::Terminated("model".to_owned())).await;
                return Ok(());
            }

            if self.settings.once {
                let _ = events.send(AgentEvent::Terminated("once".to_owned())).await;
                return Ok(());
            }

            let line = tokio::select! {
                () = token.cancelled() => {
                    let _ = events.send(AgentEvent::Terminated("cancelled".to_owned())).await;
                    return Ok(());
                }
                line = user_input.recv() => line,
            };
            match line {
                Some(line) => messages.push(ChatMessage::user(line)),
                None => {
                    let _ = events
                        .send(AgentEvent::Terminated("input-closed".to_owned()))
                        .await;
                    return Ok(());
                }
            }

            maybe_compact(&mut messages, self.settings.context_bytes);
        }
    }

    /// Seed the conversation: system prompt, configured user prompts,
    /// and the initial user prompt
    fn seed_messages(&self, initial_prompt: &str) -> Vec<ChatMessage> {
        let mut system: Vec<String> = self.catalog.system_prompts().to_vec();
        system.extend(self.settings.prompts.system.iter().cloned());
        if !system.iter().any(|s| s.contains("TERMINATE")) {
            system.push(TERMINATE_INSTRUCTION.to_owned());
        }

        let mut messages = vec![ChatMessage::system(system.join("\n\n"))];
        for prompt in self
            .catalog
            .user_prompts()
            .iter()
            .chain(self.settings.prompts.user.iter())
        {
            messages.push(ChatMessage::user(prompt.clone()));
        }
        messages.push(ChatMessage::user(initial_prompt.to_owned()));
        messages
    }

    /// The backend for the next completion: plain turns go to the
    /// primary model, turns that digest tool results go to the tool
    /// runner when one is configured
    fn active_backend(&self, after_tools: bool) -> &Arc<dyn ChatBackend> {
        if after_tools {
            self.tool_runner.as_ref().unwrap_or(&self.backend)
        } else {
            &self.backend
        }
    }

    /// Stream one assistant turn, with one transparent retry on failure
    async fn stream_turn(
        &self,
        backend: &Arc<dyn ChatBackend>,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        events: &mpsc::Sender<AgentEvent>,
        token: &CancellationToken,
    ) -> Result<Turn, ToolError> {
        let stream = match self.open_stream(backend, messages, tools, token).await {
            Ok(stream) => stream,
            Err(first) => {
                warn!(error = %first, "LLM call failed, retrying once");
                self.open_stream(backend, messages, tools, token).await?
            }
        };
        self.consume_stream(stream, events, token).await
    }

    async fn open_stream(
        &self,
        backend: &Arc<dyn ChatBackend>,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        token: &CancellationToken,
    ) -> Result<ChatStream, ToolError> {
        backend
            .create_stream(token, messages, tools, self.settings.max_tokens)
            .await
    }

    /// Drain the stream, emitting chunks and coalescing tool-call deltas
    async fn consume_stream(
        &self,
        mut stream: ChatStream,
        events: &mpsc::Sender<AgentEvent>,
        token: &CancellationToken,
    ) -> Result<Turn, ToolError> {
        let mut content = String::new();
        let mut accumulator = ToolCallAccumulator::new();
        let mut finish_reason = None;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::Content(text) => {
                    content.push_str(&text);
                    let _ = events.send(AgentEvent::AssistantChunk(text)).await;
                }
                StreamEvent::ToolCallDelta(delta) => accumulator.push(&delta),
                StreamEvent::Finish(reason) => finish_reason = Some(reason),
            }
        }

        let tool_calls = accumulator.finish();
        debug!(
            content_len = content.len(),
            tool_calls = tool_calls.len(),
            finish = finish_reason.as_deref().unwrap_or(""),
            "Turn complete"
        );

        if content.is_empty() && tool_calls.is_empty() && !token.is_cancelled() {
            return Err(ToolError::llm("completion returned no choices"));
        }

        Ok(Turn {
            content,
            tool_calls,
        })
    }

    /// Execute one tool call and append its tool message
    ///
    /// Argument parse failures and execution errors are fed back to the
    /// model rather than ending the run. Returns `true` only when the
    /// call was canceled, which ends the run.
    async fn dispatch_tool_call(
        &self,
        call: &ToolCall,
        messages: &mut Vec<ChatMessage>,
        events: &mpsc::Sender<AgentEvent>,
        token: &CancellationToken,
    ) -> bool {
        let name = &call.function.name;
        let _ = events
            .send(AgentEvent::ToolCallStart {
                name: name.clone(),
                args: call.function.arguments.clone(),
            })
            .await;

        let outcome = match parse_arguments(&call.function.arguments) {
            Err(parse_err) => Err(parse_err.message),
            Ok(arguments) => match self.catalog.get(name) {
                None => Err(format!("unknown tool: {name}")),
                Some(tool) => match execute_tool(tool, &arguments, token).await {
                    Ok(output) => Ok(output),
                    Err(err) if err.is_canceled() => return true,
                    Err(err) => Err(err.message),
                },
            },
        };

        let feedback = match &outcome {
            Ok(output) => output.clone(),
            Err(error) => format!("Error: {error}"),
        };
        messages.push(ChatMessage::tool(call.id.clone(), feedback));

        let _ = events
            .send(AgentEvent::ToolCallResult {
                name: name.clone(),
                output: outcome,
            })
            .await;
        false
    }
}

/// One completed assistant turn
struct Turn {
    content: String,
    tool_calls: Vec<ToolCall>,
}

/// Parse the model-supplied arguments JSON
///
/// An empty string counts as an empty object; anything unparseable is a
/// `ToolArgsParse` error whose message is fed back to the model.
fn parse_arguments(raw: &str) -> Result<Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(raw)
        .map_err(|e| ToolError::tool_args_parse(format!("invalid tool arguments JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_arguments_parse_as_object() {
        assert!(parse_arguments("").expect("parse").is_object());
        assert!(parse_arguments("  ").expect("parse").is_object());
    }

    #[test]
    fn malformed_arguments_are_tool_args_parse() {
        let err = parse_arguments("{oops").expect_err("must fail");
        assert_eq!(err.kind, mcpshell::error::ErrorKind::ToolArgsParse);
    }
}
