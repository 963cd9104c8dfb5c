// ABOUTME: CLI entry point for the mcpshell MCP server binary
// ABOUTME: Loads the tool catalog, selects transport (stdio or HTTP), and starts serving
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use mcpshell::catalog::Catalog;
use mcpshell::error::ToolError;
use tokio_util::sync::CancellationToken;

use mcpshell_mcp::server::McpServer;
use mcpshell_mcp::transport::{self, McpTransport};

/// mcpshell-mcp — MCP server exposing a YAML tool catalog via Model Context Protocol
#[derive(Parser)]
#[command(name = "mcpshell-mcp", version, about)]
struct Cli {
    /// Tool catalog files (merged in order)
    #[arg(required = true)]
    tools: Vec<PathBuf>,

    /// Transport mode: "stdio" for stdin/stdout or "http" for HTTP+SSE
    #[arg(long, default_value = "stdio")]
    transport: String,

    /// HTTP listen port (only used with --transport http)
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// HTTP listen host (only used with --transport http)
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Validate the catalog and exit without serving
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr to keep stdout clean for stdio transport
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let catalog = Catalog::load(&cli.tools)?;

    if cli.validate {
        catalog.validate()?;
        eprintln!("Catalog OK: {} tool(s) available", catalog.tools().len());
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let server = Arc::new(McpServer::new(Arc::new(catalog), shutdown));

    tracing::info!(transport = %cli.transport, "Starting mcpshell MCP server");

    match cli.transport.as_str() {
        "stdio" => {
            transport::stdio::StdioTransport.serve(server).await?;
        }
        "http" => {
            transport::http::HttpTransport::new(cli.host, cli.port)
                .serve(server)
                .await?;
        }
        other => {
            return Err(ToolError::config_invalid(format!(
                "Unknown transport: {other}. Valid: stdio, http"
            ))
            .into());
        }
    }

    Ok(())
}

/// Cancel the shutdown token on SIGINT or SIGTERM
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let sigterm = async {
            #[cfg(unix)]
            {
                let mut term = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(term) => term,
                    Err(_) => return std::future::pending::<()>().await,
                };
                term.recv().await;
            }
            #[cfg(not(unix))]
            std::future::pending::<()>().await;
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, shutting down");
            }
            () = sigterm => {
                tracing::info!("Received SIGTERM, shutting down");
            }
        }
        shutdown.cancel();
    });
}
