// ABOUTME: The compiled Tool — declaration schema, runner selection, and input schema
// ABOUTME: A tool is available iff a viable runner was frozen at catalog load
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::constraint::ConstraintSet;
use crate::error::ToolError;
use crate::param::ParamSpec;
use crate::runner::{select_runner, Runner, RunnerSpec};
use crate::template::output_template_refs;

/// Optional shaping of a tool's output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputFormat {
    /// Text prepended to captured stdout
    #[serde(default)]
    pub prefix: Option<String>,
    /// Text appended to captured stdout
    #[serde(default)]
    pub suffix: Option<String>,
    /// When set, the sole output: `${param}` occurrences substituted
    /// from the bound args (stdout is discarded)
    #[serde(default)]
    pub template: Option<String>,
}

/// Run section of a tool declaration
#[derive(Debug, Clone, Deserialize)]
pub struct RunSpec {
    /// Command template with `{{ .param }}` placeholders
    pub command: String,
    /// Environment variable names forwarded to the subprocess
    #[serde(default)]
    pub env: Vec<String>,
    /// Execution strategies in preference order
    #[serde(default)]
    pub runners: Vec<RunnerSpec>,
}

/// A tool as declared in a catalog file, before compilation
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name
    pub name: String,
    /// Human-readable description advertised to clients
    #[serde(default)]
    pub description: String,
    /// Parameter declarations, keyed by name
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
    /// Constraint predicates that must all hold before execution
    #[serde(default)]
    pub constraints: Vec<String>,
    /// Command and runner configuration
    pub run: RunSpec,
    /// Output shaping
    #[serde(default)]
    pub output: OutputFormat,
}

/// A compiled, executable tool with its frozen runner
pub struct Tool {
    name: String,
    description: String,
    params: BTreeMap<String, ParamSpec>,
    constraints: ConstraintSet,
    command: String,
    env: Vec<String>,
    output: OutputFormat,
    shell: String,
    runner: Arc<dyn Runner>,
}

impl Tool {
    /// Compile a declaration into an executable tool
    ///
    /// Returns `Ok(None)` when the declaration is valid but no declared
    /// runner is viable on this host — the tool is then excluded from
    /// the catalog.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for an empty command template, a bad
    /// constraint, an uncoercible default, or an output template that
    /// references undeclared parameters.
    pub fn compile(spec: &ToolSpec, shell: &str) -> Result<Option<Self>, ToolError> {
        if spec.run.command.trim().is_empty() {
            return Err(ToolError::config_invalid(format!(
                "tool '{}' has an empty command template",
                spec.name
            )));
        }

        for (param_name, param) in &spec.params {
            param.default_value(param_name).map_err(|e| {
                ToolError::config_invalid(format!("tool '{}': {}", spec.name, e.message))
            })?;
        }

        let constraints =
            ConstraintSet::compile(&spec.constraints, &spec.params).map_err(|e| {
                ToolError::config_invalid(format!("tool '{}': {}", spec.name, e.message))
            })?;

        if let Some(template) = &spec.output.template {
            for reference in output_template_refs(template) {
                if !spec.params.contains_key(&reference) {
                    return Err(ToolError::config_invalid(format!(
                        "tool '{}': output template references unknown parameter '{reference}'",
                        spec.name
                    )));
                }
            }
        }

        let Some(runner) = select_runner(&spec.run.runners) else {
            debug!(tool = %spec.name, "No viable runner on this host");
            return Ok(None);
        };

        Ok(Some(Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            params: spec.params.clone(),
            constraints,
            command: spec.run.command.clone(),
            env: spec.run.env.clone(),
            output: spec.output.clone(),
            shell: shell.to_owned(),
            runner,
        }))
    }

    /// Unique tool name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description advertised via `tools/list`
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared parameters
    #[must_use]
    pub const fn params(&self) -> &BTreeMap<String, ParamSpec> {
        &self.params
    }

    /// Compiled constraint set
    #[must_use]
    pub const fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Command template
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Environment allowlist forwarded to the subprocess
    #[must_use]
    pub fn env(&self) -> &[String] {
        &self.env
    }

    /// Output shaping
    #[must_use]
    pub const fn output(&self) -> &OutputFormat {
        &self.output
    }

    /// Shell used by the selected runner
    #[must_use]
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// The runner frozen at catalog load
    #[must_use]
    pub fn runner(&self) -> &Arc<dyn Runner> {
        &self.runner
    }

    /// JSON Schema describing this tool's input object
    ///
    /// Built from the parameter declarations: property `type` and
    /// `description` per parameter, plus a `required` array.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for (name, spec) in &self.params {
            properties.insert(
                name.clone(),
                json!({
                    "type": spec.param_type.schema_name(),
                    "description": spec.description,
                }),
            );
            if spec.required {
                required.push(Value::String(name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("runner", &self.runner.name())
            .finish_non_exhaustive()
    }
}
