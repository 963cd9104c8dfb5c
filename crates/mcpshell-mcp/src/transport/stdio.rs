// ABOUTME: Stdio transport reading newline-delimited JSON-RPC from stdin and writing to stdout
// ABOUTME: Requests are offloaded to worker tasks; a writer task keeps output lines whole
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::sync::Arc;

use async_trait::async_trait;
use mcpshell::error::ToolError;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::server::McpServer;
use crate::transport::McpTransport;

/// MCP transport over stdin/stdout using newline-delimited JSON-RPC
///
/// Each line on stdin is a complete JSON-RPC message. The reader takes
/// one request at a time but dispatches each to its own task, so a
/// long-running `tools/call` cannot starve `tools/list` or `ping`.
/// Responses funnel through one mpsc writer so lines never interleave;
/// they may come back out of order across concurrent requests, matched
/// to their request by id. Logs go to stderr to keep the protocol
/// channel clean.
pub struct StdioTransport;

#[async_trait]
impl McpTransport for StdioTransport {
    async fn serve(self, server: Arc<McpServer>) -> Result<(), ToolError> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(64);

        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(bytes) = rx.recv().await {
                if let Err(e) = write_line(&mut stdout, &bytes).await {
                    error!(error = %e, "stdout write failed");
                    break;
                }
            }
        });

        debug!("Stdio transport ready, waiting for JSON-RPC messages on stdin");

        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }

            let server = Arc::clone(&server);
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Some(response) = server.handle_message(line.as_bytes()).await {
                    let _ = tx.send(response).await;
                }
            });
        }

        debug!("Stdin closed, shutting down stdio transport");
        drop(tx);
        let _ = writer.await;
        Ok(())
    }
}

/// Write one response followed by a newline and flush
async fn write_line(stdout: &mut tokio::io::Stdout, bytes: &[u8]) -> Result<(), ToolError> {
    stdout
        .write_all(bytes)
        .await
        .map_err(|e| ToolError::internal(format!("stdout write failed: {e}")))?;
    stdout
        .write_all(b"\n")
        .await
        .map_err(|e| ToolError::internal(format!("stdout newline write failed: {e}")))?;
    stdout
        .flush()
        .await
        .map_err(|e| ToolError::internal(format!("stdout flush failed: {e}")))?;
    Ok(())
}
