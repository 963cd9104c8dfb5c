// ABOUTME: The tool execution pipeline — bind, gate, render, dispatch, format
// ABOUTME: Runs under a panic barrier so a defect surfaces as Internal, not a crash
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::param::bind;
use crate::template::{render_command, render_output};
use crate::tool::Tool;

/// Execute one tool call end to end
///
/// Steps in order: bind wire arguments, evaluate constraints, render the
/// command template, dispatch to the tool's frozen runner, shape the
/// output. A constraint rejection short-circuits before any subprocess
/// is spawned. Any panic inside the pipeline is recovered and surfaces
/// as `Internal` with no stack detail.
///
/// # Errors
///
/// Every `ErrorKind` of the binding/gating/rendering/execution taxonomy
/// can come back from here; see the step functions for specifics.
pub async fn execute_tool(
    tool: &Tool,
    arguments: &Value,
    token: &CancellationToken,
) -> Result<String, ToolError> {
    let pipeline = run_pipeline(tool, arguments, token);
    match std::panic::AssertUnwindSafe(pipeline).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            warn!(tool = tool.name(), "Recovered panic in tool pipeline");
            Err(ToolError::internal("tool execution failed internally"))
        }
    }
}

async fn run_pipeline(
    tool: &Tool,
    arguments: &Value,
    token: &CancellationToken,
) -> Result<String, ToolError> {
    let empty = serde_json::Map::new();
    let wire_args = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ToolError::invalid_param(format!(
                "arguments must be an object, got {other}"
            )));
        }
    };

    let bound = bind(tool.params(), wire_args)?;

    if !tool.constraints().evaluate(&bound)? {
        debug!(tool = tool.name(), "Call rejected by constraints");
        return Err(ToolError::constraint_violated());
    }

    let command = render_command(tool.command(), &bound)?;
    debug!(tool = tool.name(), command, "Dispatching to runner");

    let stdout = tool
        .runner()
        .run(token, tool.shell(), &command, tool.env())
        .await?;

    let output = tool.output();
    if let Some(template) = &output.template {
        return Ok(render_output(template, &bound));
    }
    let mut text = String::new();
    if let Some(prefix) = &output.prefix {
        text.push_str(prefix);
    }
    text.push_str(&stdout);
    if let Some(suffix) = &output.suffix {
        text.push_str(suffix);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::tool::ToolSpec;
    use serde_json::json;

    fn compile(yaml: &str) -> Tool {
        let spec: ToolSpec = serde_yaml::from_str(yaml).expect("tool yaml");
        Tool::compile(&spec, "sh").expect("compile").expect("viable")
    }

    #[tokio::test]
    async fn hello_world_end_to_end() {
        let tool = compile(
            r#"
name: hello_world
params:
  name:
    type: string
    required: true
constraints:
  - "name.size() <= 100"
run:
  command: "echo 'Hello, {{ .name }}!'"
"#,
        );
        let out = execute_tool(&tool, &json!({"name": "John"}), &CancellationToken::new())
            .await
            .expect("execute");
        assert_eq!(out, "Hello, John!\n");
    }

    #[tokio::test]
    async fn constraint_rejection_spawns_nothing() {
        let marker = std::env::temp_dir().join(format!(
            "mcpshell-gate-test-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&marker);

        let tool = compile(&format!(
            r#"
name: guarded
params:
  name:
    type: string
    required: true
constraints:
  - "!name.contains('/')"
run:
  command: "touch {}"
"#,
            marker.display()
        ));

        let err = execute_tool(&tool, &json!({"name": "A/B"}), &CancellationToken::new())
            .await
            .expect_err("must be rejected");
        assert_eq!(err.kind, ErrorKind::ConstraintViolated);
        assert!(!marker.exists(), "constraint rejection must not spawn");
    }

    #[tokio::test]
    async fn defaults_and_prefix_applied() {
        let tool = compile(
            r#"
name: disk_usage
params:
  directory:
    type: string
    required: true
  max_depth:
    type: number
    default: 2
run:
  command: "echo \"du -d {{ .max_depth }} {{ .directory }}\""
output:
  prefix: "Disk Usage Analysis:\n"
"#,
        );
        let out = execute_tool(
            &tool,
            &json!({"directory": "/tmp"}),
            &CancellationToken::new(),
        )
        .await
        .expect("execute");
        assert_eq!(out, "Disk Usage Analysis:\ndu -d 2 /tmp\n");
    }

    #[tokio::test]
    async fn output_template_replaces_stdout() {
        let tool = compile(
            r#"
name: templated
params:
  directory:
    type: string
    required: true
run:
  command: "echo ignored"
output:
  template: "analyzed ${directory}"
"#,
        );
        let out = execute_tool(
            &tool,
            &json!({"directory": "/tmp"}),
            &CancellationToken::new(),
        )
        .await
        .expect("execute");
        assert_eq!(out, "analyzed /tmp");
    }

    #[tokio::test]
    async fn missing_required_parameter() {
        let tool = compile(
            r#"
name: hello_world
params:
  name:
    type: string
    required: true
run:
  command: "echo {{ .name }}"
"#,
        );
        let err = execute_tool(&tool, &json!({}), &CancellationToken::new())
            .await
            .expect_err("must fail");
        assert_eq!(err.kind, ErrorKind::MissingParameter);
    }

    #[tokio::test]
    async fn constraint_type_error_reported() {
        let tool = compile(
            r#"
name: mismatch
params:
  name:
    type: string
constraints:
  - "name > 3"
run:
  command: "echo hi"
"#,
        );
        let err = execute_tool(&tool, &json!({"name": "x"}), &CancellationToken::new())
            .await
            .expect_err("must fail");
        assert_eq!(err.kind, ErrorKind::ConstraintError);
    }

    #[tokio::test]
    async fn exec_error_carries_stderr() {
        let tool = compile(
            r#"
name: failing
run:
  command: "echo boom >&2; exit 7"
"#,
        );
        let err = execute_tool(&tool, &json!({}), &CancellationToken::new())
            .await
            .expect_err("must fail");
        assert_eq!(err.kind, ErrorKind::ExecError);
        assert!(err.message.contains("boom"));
    }

    #[tokio::test]
    async fn non_object_arguments_rejected() {
        let tool = compile(
            r#"
name: plain
run:
  command: "echo hi"
"#,
        );
        let err = execute_tool(&tool, &json!([1, 2]), &CancellationToken::new())
            .await
            .expect_err("must fail");
        assert_eq!(err.kind, ErrorKind::InvalidParam);
    }

    #[tokio::test]
    async fn null_arguments_treated_as_empty() {
        let tool = compile(
            r#"
name: plain
run:
  command: "echo hi"
"#,
        );
        let out = execute_tool(&tool, &Value::Null, &CancellationToken::new())
            .await
            .expect("execute");
        assert_eq!(out, "hi\n");
    }
}
