// ABOUTME: CLI entry point for the mcpshell agent binary
// ABOUTME: Wires stdin, the event printer, and ctrl-c into one orchestrator run
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mcpshell::catalog::Catalog;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use mcpshell_agent::config::AgentConfig;
use mcpshell_agent::events::AgentEvent;
use mcpshell_agent::openai::{ChatBackend, ChatClient};
use mcpshell_agent::orchestrator::{Orchestrator, OrchestratorSettings};

/// mcpshell-agent — drive the tool catalog directly against an LLM
#[derive(Parser)]
#[command(name = "mcpshell-agent", version, about)]
struct Cli {
    /// Initial user prompt
    prompt: String,

    /// Tool catalog files (merged in order)
    #[arg(long, required = true)]
    tools: Vec<PathBuf>,

    /// Exit after the first assistant message (no interactive follow-up)
    #[arg(long)]
    once: bool,

    /// Model entry name from the agent config
    #[arg(long)]
    model: Option<String>,

    /// Agent config path (default: ~/.mcpshell/agent.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Diagnostics go to stderr; stdout carries the conversation
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let catalog = Arc::new(Catalog::load(&cli.tools)?);

    let config_path = cli.config.unwrap_or_else(AgentConfig::default_path);
    let config = AgentConfig::load(&config_path)?;
    let resolved = config.orchestrator_model(cli.model.as_deref())?.resolve()?;

    let backend: Arc<dyn ChatBackend> = Arc::new(ChatClient::new(
        resolved.api_url.clone(),
        resolved.api_key.clone(),
        resolved.model.clone(),
    ));

    let settings = OrchestratorSettings {
        once: cli.once,
        context_bytes: resolved.context_bytes,
        max_tokens: resolved.max_tokens,
        prompts: resolved.prompts,
    };
    let mut orchestrator = Orchestrator::new(backend, catalog, settings);

    // When roles are distinguished, tool-result turns run on their own model
    if let Some(runner) = config.tool_runner_model() {
        let runner = runner.resolve()?;
        orchestrator = orchestrator.with_tool_runner(Arc::new(ChatClient::new(
            runner.api_url,
            runner.api_key,
            runner.model,
        )));
    }

    let token = CancellationToken::new();
    let ctrlc_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrlc_token.cancel();
        }
    });

    // Forward stdin lines as follow-up user turns
    let (user_tx, user_rx) = mpsc::channel::<String>(8);
    if !cli.once {
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if user_tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }

    let (event_tx, mut event_rx) = mpsc::channel::<AgentEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
        }
    });

    let result = orchestrator
        .run(cli.prompt, user_rx, event_tx, token)
        .await;
    let _ = printer.await;

    result?;
    Ok(())
}

/// Render one agent event for the terminal
fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::AssistantChunk(text) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        AgentEvent::AssistantMessage(_) => println!(),
        AgentEvent::ToolCallStart { name, args } => {
            println!("[tool] {name} {args}");
        }
        AgentEvent::ToolCallResult { name, output } => match output {
            Ok(text) => println!("[tool] {name} -> {}", text.trim_end()),
            Err(error) => println!("[tool] {name} failed: {error}"),
        },
        AgentEvent::Terminated(reason) => {
            println!("[agent] terminated ({reason})");
        }
        AgentEvent::Error(message) => {
            eprintln!("[agent] error: {message}");
        }
    }
}
