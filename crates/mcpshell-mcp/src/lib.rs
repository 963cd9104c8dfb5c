// ABOUTME: Library root re-exporting MCP server modules for integration testing
// ABOUTME: Enables tests/ to access the protocol types, dispatcher, and transports
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

pub mod protocol;
pub mod server;
pub mod transport;
