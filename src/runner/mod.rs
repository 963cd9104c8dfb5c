// ABOUTME: Runner abstraction — execution strategies with host requirements and selection
// ABOUTME: Catalog load freezes the first viable declared runner, or implicit exec
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

//! # Runners
//!
//! A runner executes one materialized command line in a chosen
//! environment: directly (`exec`) or wrapped in a sandbox (`docker`,
//! `firejail`, `sandbox-exec`). Each declared runner carries
//! requirements; a runner is viable on this host iff the OS matches
//! (when specified) and every named executable resolves on `PATH`.
//! Selection happens once at catalog load and is frozen into the tool.

pub mod exec;
pub mod process;
pub mod sandbox;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ToolError;

use process::ProcessOutput;

/// Host requirements gating a runner's viability
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Requirements {
    /// Operating system the runner needs (`linux`, `macos`, ...)
    #[serde(default)]
    pub os: Option<String>,
    /// Executables that must resolve on `PATH`
    #[serde(default)]
    pub executables: Vec<String>,
}

impl Requirements {
    /// Whether this host satisfies the requirements
    #[must_use]
    pub fn is_met(&self) -> bool {
        if let Some(os) = &self.os {
            if os != std::env::consts::OS {
                return false;
            }
        }
        self.executables
            .iter()
            .all(|name| which::which(name).is_ok())
    }
}

/// Sandbox knobs shared by the wrapped runner variants
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunnerOptions {
    /// Container image (docker)
    #[serde(default)]
    pub image: Option<String>,
    /// Bind mounts as `host:container[:ro]` (docker)
    #[serde(default)]
    pub mounts: Vec<String>,
    /// Network mode (docker: `none`, `host`, or a network name)
    #[serde(default)]
    pub network: Option<String>,
    /// Sandbox profile path (firejail, sandbox-exec)
    #[serde(default)]
    pub profile: Option<String>,
    /// Extra arguments inserted before the command
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// A runner as declared in a catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSpec {
    /// Strategy name: `exec`, `docker`, `firejail`, `sandbox-exec`
    pub name: String,
    /// Host requirements
    #[serde(default)]
    pub requirements: Requirements,
    /// Strategy options
    #[serde(default)]
    pub options: RunnerOptions,
}

/// An execution strategy bound to one tool
#[async_trait]
pub trait Runner: Send + Sync {
    /// Strategy name for logging and diagnostics
    fn name(&self) -> &'static str;

    /// Execute a command line through the configured shell
    ///
    /// Captures stdout; a non-zero exit is an `ExecError` carrying the
    /// captured stderr; cancellation of the token yields `Canceled`.
    async fn run(
        &self,
        token: &CancellationToken,
        shell: &str,
        command: &str,
        env_allowlist: &[String],
    ) -> Result<String, ToolError>;
}

/// Select the first viable runner in declaration order
///
/// An empty declaration list selects the implicit `exec` runner.
/// Returns `None` when runners were declared but none is viable on this
/// host — the owning tool is then excluded from the catalog.
#[must_use]
pub fn select_runner(specs: &[RunnerSpec]) -> Option<Arc<dyn Runner>> {
    if specs.is_empty() {
        return Some(Arc::new(exec::ExecRunner));
    }
    for spec in specs {
        if !spec.requirements.is_met() {
            debug!(runner = %spec.name, "Runner requirements not met, trying next");
            continue;
        }
        match build_runner(spec) {
            Some(runner) => {
                debug!(runner = runner.name(), "Selected runner");
                return Some(runner);
            }
            None => {
                warn!(runner = %spec.name, "Unknown runner name, trying next");
            }
        }
    }
    None
}

/// Instantiate a runner from its declaration, `None` for unknown names
fn build_runner(spec: &RunnerSpec) -> Option<Arc<dyn Runner>> {
    match spec.name.as_str() {
        "exec" => Some(Arc::new(exec::ExecRunner)),
        "docker" => Some(Arc::new(sandbox::DockerRunner::new(spec.options.clone()))),
        "firejail" => Some(Arc::new(sandbox::FirejailRunner::new(
            spec.options.clone(),
        ))),
        "sandbox-exec" => Some(Arc::new(sandbox::SandboxExecRunner::new(
            spec.options.clone(),
        ))),
        _ => None,
    }
}

/// Turn a completed process into the runner contract's result
///
/// Shared by every runner variant: zero exit yields stdout, non-zero
/// yields `ExecError` with whatever stderr was captured.
pub(crate) fn finish(output: ProcessOutput) -> Result<String, ToolError> {
    if output.exit_code == 0 {
        return Ok(output.stdout);
    }
    let detail = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_owned()
    } else {
        output.stderr.trim().to_owned()
    };
    Err(ToolError::exec(format!(
        "command exited with status {}: {detail}",
        output.exit_code
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_requirements_always_met() {
        assert!(Requirements::default().is_met());
    }

    #[test]
    fn wrong_os_not_met() {
        let req = Requirements {
            os: Some("plan9".to_owned()),
            executables: Vec::new(),
        };
        assert!(!req.is_met());
    }

    #[test]
    fn missing_executable_not_met() {
        let req = Requirements {
            os: None,
            executables: vec!["definitely-not-a-real-binary-xyz".to_owned()],
        };
        assert!(!req.is_met());
    }

    #[test]
    fn present_executable_met() {
        let req = Requirements {
            os: None,
            executables: vec!["sh".to_owned()],
        };
        assert!(req.is_met());
    }

    #[test]
    fn empty_declaration_selects_implicit_exec() {
        let runner = select_runner(&[]).expect("implicit exec");
        assert_eq!(runner.name(), "exec");
    }

    #[test]
    fn unviable_declarations_select_nothing() {
        let specs = vec![RunnerSpec {
            name: "docker".to_owned(),
            requirements: Requirements {
                os: None,
                executables: vec!["definitely-not-a-real-binary-xyz".to_owned()],
            },
            options: RunnerOptions::default(),
        }];
        assert!(select_runner(&specs).is_none());
    }

    #[test]
    fn first_viable_wins() {
        let specs = vec![
            RunnerSpec {
                name: "docker".to_owned(),
                requirements: Requirements {
                    os: None,
                    executables: vec!["definitely-not-a-real-binary-xyz".to_owned()],
                },
                options: RunnerOptions::default(),
            },
            RunnerSpec {
                name: "exec".to_owned(),
                requirements: Requirements::default(),
                options: RunnerOptions::default(),
            },
        ];
        let runner = select_runner(&specs).expect("exec viable");
        assert_eq!(runner.name(), "exec");
    }

    #[test]
    fn finish_maps_nonzero_exit() {
        let err = finish(ProcessOutput {
            stdout: String::new(),
            stderr: "denied\n".to_owned(),
            exit_code: 2,
        })
        .expect_err("must fail");
        assert!(err.message.contains("status 2"));
        assert!(err.message.contains("denied"));
    }
}
