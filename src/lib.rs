// ABOUTME: Core library for MCPShell — YAML-declared shell tools served to LLMs
// ABOUTME: Re-exports the tool model, constraint engine, runners, executor, and catalog
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

//! # MCPShell Core
//!
//! A catalog of shell-command "tools" declared in YAML: typed
//! parameters, constraint predicates gating execution, a command
//! template, an output formatter, and one or more runners that execute
//! the command natively or inside a sandbox. This crate is the core the
//! MCP server (`mcpshell-mcp`) and the agent mode (`mcpshell-agent`)
//! are built on.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use mcpshell::catalog::Catalog;
//! use mcpshell::executor::execute_tool;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), mcpshell::error::ToolError> {
//! let catalog = Catalog::load(&[PathBuf::from("tools.yaml")])?;
//! let tool = catalog.get("hello_world").expect("declared tool");
//! let args = serde_json::json!({ "name": "John" });
//! let output = execute_tool(tool, &args, &CancellationToken::new()).await?;
//! println!("{output}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`error`] — kind-tagged `ToolError` shared across the workspace
//! - [`param`] — parameter declarations, coercion, and binding
//! - [`constraint`] — compiled predicate programs over the parameters
//! - [`template`] — command and output template rendering
//! - [`runner`] — execution strategies with host requirements
//! - [`tool`] — the compiled tool and its input schema
//! - [`executor`] — the bind → gate → render → run → format pipeline
//! - [`catalog`] — multi-file loading, merging, and validation

/// Kind-tagged error type shared across the workspace
pub mod error;

/// Catalog loading, merging, and validation
pub mod catalog;
/// Compiled constraint programs
pub mod constraint;
/// The tool execution pipeline
pub mod executor;
/// Parameter declarations and binding
pub mod param;
/// Execution strategies and subprocess plumbing
pub mod runner;
/// Command and output templates
pub mod template;
/// The compiled tool model
pub mod tool;

// Re-export the working set for ergonomic access
pub use catalog::Catalog;
pub use error::{ErrorKind, ToolError};
pub use executor::execute_tool;
pub use param::{bind, BoundArgs, ParamSpec, ParamType, ParamValue};
pub use runner::{Requirements, Runner, RunnerSpec};
pub use tool::{OutputFormat, Tool, ToolSpec};
