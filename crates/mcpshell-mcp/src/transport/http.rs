// ABOUTME: HTTP transport implementing MCP Streamable HTTP with JSON and SSE responses
// ABOUTME: Serves a POST endpoint that accepts JSON-RPC and responds via JSON or event stream
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures::stream;
use mcpshell::error::ToolError;
use tracing::{debug, info};

use crate::server::McpServer;
use crate::transport::McpTransport;

/// MCP transport over HTTP using axum
///
/// Exposes a single POST endpoint at `/mcp` that accepts JSON-RPC
/// messages. Supports both `application/json` and `text/event-stream`
/// response formats based on the client's `Accept` header (Streamable
/// HTTP transport). Concurrent `tools/call` requests are served in
/// parallel by the runtime.
pub struct HttpTransport {
    host: String,
    port: u16,
}

impl HttpTransport {
    /// Create an HTTP transport bound to the given host and port
    pub const fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn serve(self, server: Arc<McpServer>) -> Result<(), ToolError> {
        let shutdown = server.shutdown_token().clone();
        let app = Router::new()
            .route("/mcp", post(handle_mcp_post))
            .with_state(server);

        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ToolError::internal(format!("Failed to bind {addr}: {e}")))?;

        info!(address = %addr, "HTTP transport listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| ToolError::internal(format!("HTTP server error: {e}")))?;

        Ok(())
    }
}

/// Handle an incoming MCP POST request
///
/// Feeds the body to the dispatcher's opaque-bytes entry point and
/// returns the response as JSON or SSE depending on the Accept header.
async fn handle_mcp_post(
    State(server): State<Arc<McpServer>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    debug!(bytes = body.len(), "Handling HTTP MCP request");

    let Some(response) = server.handle_message(body.as_bytes()).await else {
        // Notification — no response needed
        return axum::http::StatusCode::NO_CONTENT.into_response();
    };

    let wants_sse = headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"));

    if wants_sse {
        respond_sse(response)
    } else {
        (
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            response,
        )
            .into_response()
    }
}

/// Wrap a serialized JSON-RPC response in a single SSE event
fn respond_sse(response: Vec<u8>) -> Response {
    let data = String::from_utf8_lossy(&response).into_owned();
    let event = Event::default().data(data);
    let event_stream = stream::once(async { Ok::<_, Infallible>(event) });
    Sse::new(event_stream).into_response()
}
