// ABOUTME: Catalog loading — YAML schema, multi-file merge, tool compilation, validation
// ABOUTME: The catalog is immutable after load; unavailable tools are filtered with a diagnostic
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

//! # Catalog
//!
//! One or more YAML files declare prompts, server metadata, and tools.
//! Loading merges them (prompts concatenate in file order; description
//! and shell come from the first file that sets them; tools
//! concatenate), compiles each tool, freezes its runner, and keeps only
//! the available ones. `validate` re-runs compilation without starting
//! anything — the CLI validate action.

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::tool::{Tool, ToolSpec};

/// Default shell when the catalog does not set `mcp.run.shell`
const DEFAULT_SHELL: &str = "sh";

/// Environment variable overriding the directory bare catalog names
/// resolve against
pub const TOOLS_DIR_ENV: &str = "MCPSHELL_TOOLS_DIR";

/// Prompt blocks advertised alongside the tools
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptsSpec {
    /// System prompt fragments, concatenated across files
    #[serde(default)]
    pub system: Vec<String>,
    /// User prompt fragments, concatenated across files
    #[serde(default)]
    pub user: Vec<String>,
}

/// `mcp.run` section of a catalog file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpRunSpec {
    /// Shell used by runners (`sh`, `bash`, ...)
    #[serde(default)]
    pub shell: Option<String>,
}

/// `mcp` section of a catalog file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpSpec {
    /// Server description, surfaced as MCP instructions
    #[serde(default)]
    pub description: Option<String>,
    /// Run settings
    #[serde(default)]
    pub run: McpRunSpec,
    /// Tool declarations
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
}

/// One parsed catalog file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Prompt blocks
    #[serde(default)]
    pub prompts: PromptsSpec,
    /// MCP section
    #[serde(default)]
    pub mcp: McpSpec,
}

/// The loaded, immutable tool catalog
pub struct Catalog {
    tools: Vec<Tool>,
    specs: Vec<ToolSpec>,
    description: Option<String>,
    shell: String,
    system_prompts: Vec<String>,
    user_prompts: Vec<String>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("tools", &self.tools.len())
            .field("specs", &self.specs)
            .field("description", &self.description)
            .field("shell", &self.shell)
            .field("system_prompts", &self.system_prompts)
            .field("user_prompts", &self.user_prompts)
            .finish()
    }
}

impl Catalog {
    /// Load and merge catalog files from disk
    ///
    /// # Errors
    ///
    /// - `ConfigInvalid` for unreadable or unparseable files, or a tool
    ///   declaration that fails compilation
    /// - `CatalogEmpty` when no tool survives the viability filter
    pub fn load(paths: &[PathBuf]) -> Result<Self, ToolError> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let resolved = resolve_tools_path(path);
            let raw = std::fs::read_to_string(&resolved).map_err(|e| {
                ToolError::config_invalid(format!(
                    "cannot read catalog file {}: {e}",
                    resolved.display()
                ))
            })?;
            let parsed: ConfigFile = serde_yaml::from_str(&raw).map_err(|e| {
                ToolError::config_invalid(format!(
                    "invalid catalog file {}: {e}",
                    resolved.display()
                ))
            })?;
            debug!(path = %resolved.display(), tools = parsed.mcp.tools.len(), "Parsed catalog file");
            files.push(parsed);
        }
        Self::from_files(files)
    }

    /// Merge parsed files and compile the catalog
    ///
    /// # Errors
    ///
    /// Same as [`Catalog::load`], minus the filesystem failures.
    pub fn from_files(files: Vec<ConfigFile>) -> Result<Self, ToolError> {
        let mut description = None;
        let mut shell = None;
        let mut system_prompts = Vec::new();
        let mut user_prompts = Vec::new();
        let mut specs: Vec<ToolSpec> = Vec::new();

        for file in files {
            if description.is_none() {
                description = file.mcp.description;
            }
            if shell.is_none() {
                shell = file.mcp.run.shell;
            }
            system_prompts.extend(file.prompts.system);
            user_prompts.extend(file.prompts.user);
            for spec in file.mcp.tools {
                if specs.iter().any(|existing| existing.name == spec.name) {
                    warn!(tool = %spec.name, "Duplicate tool name, keeping the first declaration");
                    continue;
                }
                specs.push(spec);
            }
        }

        let shell = shell.unwrap_or_else(|| DEFAULT_SHELL.to_owned());

        let mut tools = Vec::with_capacity(specs.len());
        for spec in &specs {
            match Tool::compile(spec, &shell)? {
                Some(tool) => tools.push(tool),
                None => {
                    warn!(tool = %spec.name, "Skipping tool: no viable runner on this host");
                }
            }
        }

        if tools.is_empty() {
            return Err(ToolError::catalog_empty(
                "no tool in the catalog has a viable runner on this host",
            ));
        }

        info!(
            tools = tools.len(),
            declared = specs.len(),
            shell = %shell,
            "Catalog loaded"
        );

        Ok(Self {
            tools,
            specs,
            description,
            shell,
            system_prompts,
            user_prompts,
        })
    }

    /// Available tools in declaration order
    #[must_use]
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Look up an available tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Merged server description, if any file set one
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Shell forwarded to runners
    #[must_use]
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Concatenated system prompt fragments
    #[must_use]
    pub fn system_prompts(&self) -> &[String] {
        &self.system_prompts
    }

    /// Concatenated user prompt fragments
    #[must_use]
    pub fn user_prompts(&self) -> &[String] {
        &self.user_prompts
    }

    /// Re-run every declared tool through compilation
    ///
    /// Recompiles constraints, re-checks command templates and output
    /// references, and re-probes runner requirements. Never starts a
    /// server; this is the CLI validate entry point. Validating an
    /// unchanged catalog has no side effects.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigInvalid` found, if any.
    pub fn validate(&self) -> Result<(), ToolError> {
        for spec in &self.specs {
            Tool::compile(spec, &self.shell)?;
        }
        Ok(())
    }
}

/// Resolve a catalog path, mapping bare file names through
/// `MCPSHELL_TOOLS_DIR` when it is set
#[must_use]
pub fn resolve_tools_path(path: &Path) -> PathBuf {
    if path.components().count() == 1 && !path.exists() {
        if let Ok(dir) = env::var(TOOLS_DIR_ENV) {
            let candidate = PathBuf::from(dir).join(path);
            if candidate.exists() {
                return candidate;
            }
        }
    }
    path.to_path_buf()
}
