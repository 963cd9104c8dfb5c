// ABOUTME: Direct subprocess runner — the default execution strategy
// ABOUTME: Runs the materialized command via the configured shell's -c flag
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ToolError;
use crate::runner::process::{run_command, CommandSpec};
use crate::runner::{finish, Runner};

/// Direct execution: `sh -c <command>` (shell configurable at the
/// catalog level)
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecRunner;

#[async_trait]
impl Runner for ExecRunner {
    fn name(&self) -> &'static str {
        "exec"
    }

    async fn run(
        &self,
        token: &CancellationToken,
        shell: &str,
        command: &str,
        env_allowlist: &[String],
    ) -> Result<String, ToolError> {
        debug!(shell, command, "Executing command");
        let spec = CommandSpec {
            program: shell.to_owned(),
            args: vec!["-c".to_owned(), command.to_owned()],
            env_allowlist: env_allowlist.to_vec(),
        };
        finish(run_command(&spec, token).await?)
    }
}
