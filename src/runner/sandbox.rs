// ABOUTME: Sandboxed runner variants — docker, firejail, and sandbox-exec wrappers
// ABOUTME: Each builds an argv prefix around the shell invocation per its options
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ToolError;
use crate::runner::process::{run_command, CommandSpec};
use crate::runner::{finish, Runner, RunnerOptions};

/// Ephemeral-container execution via `docker run --rm`
///
/// Hardened by default: read-only root filesystem, all capabilities
/// dropped, `no-new-privileges`, and no network unless the options say
/// otherwise. Sandbox bring-up failures (missing binary, bad image)
/// surface as `ExecError` before the wrapped command ever runs.
#[derive(Debug, Clone)]
pub struct DockerRunner {
    options: RunnerOptions,
}

impl DockerRunner {
    /// Create a docker runner with the given options
    #[must_use]
    pub const fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    fn build_args(&self, image: &str, shell: &str, command: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".to_owned(),
            "--rm".to_owned(),
            "--read-only".to_owned(),
            "--cap-drop=ALL".to_owned(),
            "--security-opt=no-new-privileges".to_owned(),
        ];

        let network = self.options.network.as_deref().unwrap_or("none");
        args.push(format!("--network={network}"));

        for mount in &self.options.mounts {
            args.push("-v".to_owned());
            args.push(mount.clone());
        }

        args.extend(self.options.extra_args.iter().cloned());

        args.push(image.to_owned());
        args.push(shell.to_owned());
        args.push("-c".to_owned());
        args.push(command.to_owned());
        args
    }
}

#[async_trait]
impl Runner for DockerRunner {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn run(
        &self,
        token: &CancellationToken,
        shell: &str,
        command: &str,
        env_allowlist: &[String],
    ) -> Result<String, ToolError> {
        let Some(image) = self.options.image.as_deref() else {
            return Err(ToolError::exec(
                "docker runner is missing the 'image' option",
            ));
        };
        debug!(image, command, "Launching container");
        let spec = CommandSpec {
            program: "docker".to_owned(),
            args: self.build_args(image, shell, command),
            env_allowlist: env_allowlist.to_vec(),
        };
        finish(run_command(&spec, token).await?)
    }
}

/// Linux sandbox execution via `firejail`
#[derive(Debug, Clone)]
pub struct FirejailRunner {
    options: RunnerOptions,
}

impl FirejailRunner {
    /// Create a firejail runner with the given options
    #[must_use]
    pub const fn new(options: RunnerOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Runner for FirejailRunner {
    fn name(&self) -> &'static str {
        "firejail"
    }

    async fn run(
        &self,
        token: &CancellationToken,
        shell: &str,
        command: &str,
        env_allowlist: &[String],
    ) -> Result<String, ToolError> {
        let mut args = vec!["--quiet".to_owned()];
        if let Some(profile) = &self.options.profile {
            args.push(format!("--profile={profile}"));
        }
        args.extend(self.options.extra_args.iter().cloned());
        args.push("--".to_owned());
        args.push(shell.to_owned());
        args.push("-c".to_owned());
        args.push(command.to_owned());

        debug!(command, "Launching firejail sandbox");
        let spec = CommandSpec {
            program: "firejail".to_owned(),
            args,
            env_allowlist: env_allowlist.to_vec(),
        };
        finish(run_command(&spec, token).await?)
    }
}

/// macOS sandbox execution via `sandbox-exec`
///
/// With no profile configured a permissive `(version 1)(allow default)`
/// inline profile is used so the wrapper stays a no-op until the catalog
/// tightens it.
#[derive(Debug, Clone)]
pub struct SandboxExecRunner {
    options: RunnerOptions,
}

impl SandboxExecRunner {
    /// Create a sandbox-exec runner with the given options
    #[must_use]
    pub const fn new(options: RunnerOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Runner for SandboxExecRunner {
    fn name(&self) -> &'static str {
        "sandbox-exec"
    }

    async fn run(
        &self,
        token: &CancellationToken,
        shell: &str,
        command: &str,
        env_allowlist: &[String],
    ) -> Result<String, ToolError> {
        let mut args = Vec::new();
        if let Some(profile) = &self.options.profile {
            args.push("-f".to_owned());
            args.push(profile.clone());
        } else {
            args.push("-p".to_owned());
            args.push("(version 1)(allow default)".to_owned());
        }
        args.extend(self.options.extra_args.iter().cloned());
        args.push(shell.to_owned());
        args.push("-c".to_owned());
        args.push(command.to_owned());

        debug!(command, "Launching sandbox-exec");
        let spec = CommandSpec {
            program: "sandbox-exec".to_owned(),
            args,
            env_allowlist: env_allowlist.to_vec(),
        };
        finish(run_command(&spec, token).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_args_hardened_by_default() {
        let runner = DockerRunner::new(RunnerOptions {
            image: Some("alpine:3".to_owned()),
            ..RunnerOptions::default()
        });
        let args = runner.build_args("alpine:3", "sh", "echo hi");
        assert!(args.contains(&"--rm".to_owned()));
        assert!(args.contains(&"--read-only".to_owned()));
        assert!(args.contains(&"--cap-drop=ALL".to_owned()));
        assert!(args.contains(&"--network=none".to_owned()));
        assert_eq!(args.last(), Some(&"echo hi".to_owned()));
    }

    #[test]
    fn docker_args_mounts_and_network() {
        let runner = DockerRunner::new(RunnerOptions {
            image: Some("alpine:3".to_owned()),
            mounts: vec!["/data:/data:ro".to_owned()],
            network: Some("host".to_owned()),
            ..RunnerOptions::default()
        });
        let args = runner.build_args("alpine:3", "sh", "ls /data");
        assert!(args.contains(&"--network=host".to_owned()));
        assert!(args.contains(&"/data:/data:ro".to_owned()));
    }

    #[tokio::test]
    async fn docker_without_image_is_exec_error() {
        let runner = DockerRunner::new(RunnerOptions::default());
        let err = runner
            .run(&CancellationToken::new(), "sh", "echo hi", &[])
            .await
            .expect_err("must fail");
        assert_eq!(err.kind, crate::error::ErrorKind::ExecError);
        assert!(err.message.contains("image"));
    }
}
