// ABOUTME: End-to-end tests for catalog loading plus the tool execution pipeline
// ABOUTME: Covers greeting, constraint rejection, defaults with formatting, and filtering
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::io::Write;
use std::path::PathBuf;

use mcpshell::catalog::{Catalog, ConfigFile};
use mcpshell::error::ErrorKind;
use mcpshell::executor::execute_tool;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn load(yaml: &str) -> Catalog {
    let file: ConfigFile = serde_yaml::from_str(yaml).expect("catalog yaml");
    Catalog::from_files(vec![file]).expect("catalog")
}

const GREETING: &str = r#"
mcp:
  description: "Greeting tools"
  tools:
    - name: hello_world
      description: "Greets the caller"
      params:
        name:
          type: string
          required: true
      constraints:
        - "name.size() <= 100"
        - "!name.contains('/')"
      run:
        command: "echo 'Hello, {{ .name }}!'"
"#;

#[tokio::test]
async fn static_tool_greets() {
    let catalog = load(GREETING);
    let tool = catalog.get("hello_world").expect("tool");
    let out = execute_tool(tool, &json!({"name": "John"}), &CancellationToken::new())
        .await
        .expect("execute");
    assert_eq!(out, "Hello, John!\n");
}

#[tokio::test]
async fn constraint_rejects_slash() {
    let catalog = load(GREETING);
    let tool = catalog.get("hello_world").expect("tool");
    let err = execute_tool(tool, &json!({"name": "A/B"}), &CancellationToken::new())
        .await
        .expect_err("must be rejected");
    assert_eq!(err.kind, ErrorKind::ConstraintViolated);
}

#[tokio::test]
async fn defaults_bind_and_prefix_wraps_stdout() {
    let catalog = load(
        r#"
mcp:
  tools:
    - name: disk_usage
      params:
        directory:
          type: string
          required: true
        max_depth:
          type: number
          default: 2
      run:
        command: "echo \"depth={{ .max_depth }} dir={{ .directory }}\""
      output:
        prefix: "Disk Usage Analysis:\n"
"#,
    );
    let tool = catalog.get("disk_usage").expect("tool");
    let out = execute_tool(
        tool,
        &json!({"directory": "/tmp"}),
        &CancellationToken::new(),
    )
    .await
    .expect("execute");
    assert_eq!(out, "Disk Usage Analysis:\ndepth=2 dir=/tmp\n");
}

#[tokio::test]
async fn host_without_docker_filters_docker_only_tool() {
    let catalog = load(
        r#"
mcp:
  tools:
    - name: containerized
      run:
        command: "docker ps"
        runners:
          - name: docker
            requirements:
              executables: [definitely-not-a-real-binary-xyz]
    - name: fallback
      run:
        command: "echo here"
"#,
    );
    assert!(catalog.get("containerized").is_none());
    assert_eq!(catalog.tools().len(), 1);
}

#[tokio::test]
async fn render_depends_only_on_tool_and_args() {
    // An env var outside the allowlist must not leak into the output.
    std::env::set_var("MCPSHELL_E2E_LEAK", "leaked");
    let catalog = load(
        r#"
mcp:
  tools:
    - name: probe
      run:
        command: "echo \"${MCPSHELL_E2E_LEAK:-clean}\""
"#,
    );
    let tool = catalog.get("probe").expect("tool");
    let out = execute_tool(tool, &json!({}), &CancellationToken::new())
        .await
        .expect("execute");
    assert_eq!(out, "clean\n");
    std::env::remove_var("MCPSHELL_E2E_LEAK");
}

#[tokio::test]
async fn declared_env_is_forwarded() {
    std::env::set_var("MCPSHELL_E2E_TOKEN", "forwarded");
    let catalog = load(
        r#"
mcp:
  tools:
    - name: probe
      run:
        command: "echo \"$MCPSHELL_E2E_TOKEN\""
        env: [MCPSHELL_E2E_TOKEN]
"#,
    );
    let tool = catalog.get("probe").expect("tool");
    let out = execute_tool(tool, &json!({}), &CancellationToken::new())
        .await
        .expect("execute");
    assert_eq!(out, "forwarded\n");
    std::env::remove_var("MCPSHELL_E2E_TOKEN");
}

#[test]
fn multi_file_load_from_disk_merges_in_order() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let first = dir.path().join("first.yaml");
    let second = dir.path().join("second.yaml");
    std::fs::File::create(&first)
        .and_then(|mut f| f.write_all(GREETING.as_bytes()))
        .expect("write first");
    std::fs::File::create(&second)
        .and_then(|mut f| {
            f.write_all(
                br#"
mcp:
  description: "Ignored: first file wins"
  tools:
    - name: second_tool
      run:
        command: "echo two"
prompts:
  system: ["Extra guidance."]
"#,
            )
        })
        .expect("write second");

    let catalog = Catalog::load(&[first, second]).expect("load");
    assert_eq!(catalog.description(), Some("Greeting tools"));
    assert_eq!(catalog.tools().len(), 2);
    assert_eq!(catalog.system_prompts(), ["Extra guidance."]);
}

#[test]
fn tools_dir_env_resolves_bare_names() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let path = dir.path().join("greetings.yaml");
    std::fs::File::create(&path)
        .and_then(|mut f| f.write_all(GREETING.as_bytes()))
        .expect("write");

    std::env::set_var("MCPSHELL_TOOLS_DIR", dir.path());
    let catalog = Catalog::load(&[PathBuf::from("greetings.yaml")]).expect("load");
    std::env::remove_var("MCPSHELL_TOOLS_DIR");

    assert!(catalog.get("hello_world").is_some());
}
