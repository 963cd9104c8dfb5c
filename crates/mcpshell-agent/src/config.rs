// ABOUTME: Agent configuration — model entries, env substitution, and provider resolution
// ABOUTME: Loads ~/.mcpshell/agent.yaml and resolves a model into endpoint + key + prompts
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::env;
use std::path::PathBuf;

use mcpshell::error::ToolError;
use serde::Deserialize;
use tracing::debug;

/// Environment variable overriding the config home (`~/.mcpshell`)
pub const CONFIG_DIR_ENV: &str = "MCPSHELL_DIR";

/// Environment variable selecting a model by name at startup
pub const MODEL_ENV: &str = "MCPSHELL_AGENT_MODEL";

/// Default OpenAI endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Default Ollama endpoint
const OLLAMA_API_URL: &str = "http://localhost:11434/v1";

/// Placeholder key for providers that ignore authentication
const PLACEHOLDER_API_KEY: &str = "ollama";

/// Default context budget in bytes when a model does not set one
pub const DEFAULT_CONTEXT_BYTES: usize = 256 * 1024;

/// Prompt blocks attached to a model entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelPrompts {
    /// System prompt fragments
    #[serde(default)]
    pub system: Vec<String>,
    /// User prompt fragments prepended to the conversation
    #[serde(default)]
    pub user: Vec<String>,
}

/// One model entry of the agent config
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    /// Entry name, matched against `--model` / `MCPSHELL_AGENT_MODEL`
    #[serde(default)]
    pub name: String,
    /// Model identifier sent to the API
    #[serde(default)]
    pub model: String,
    /// Provider class: `openai`, `ollama`, or empty for generic
    #[serde(default)]
    pub class: String,
    /// Whether this entry is the default selection
    #[serde(default)]
    pub default: bool,
    /// API key, usually `${OPENAI_API_KEY}`
    #[serde(default, rename = "api-key")]
    pub api_key: Option<String>,
    /// API endpoint override
    #[serde(default, rename = "api-url")]
    pub api_url: Option<String>,
    /// Prompt blocks
    #[serde(default)]
    pub prompts: ModelPrompts,
    /// Context budget in bytes driving session compaction
    #[serde(default, rename = "context-bytes")]
    pub context_bytes: Option<usize>,
    /// Max tokens per completion
    #[serde(default, rename = "max-tokens")]
    pub max_tokens: Option<u32>,
}

/// `agent:` section of the config file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentSection {
    /// Selectable model entries
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    /// Dedicated loop-driving model; used when no model is selected
    /// explicitly by name
    #[serde(default)]
    pub orchestrator: Option<ModelConfig>,
    /// Dedicated model for the completions that digest tool results;
    /// absent means the orchestrator model handles them too
    #[serde(default, rename = "tool-runner")]
    pub tool_runner: Option<ModelConfig>,
}

/// Top level of `agent.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    /// The agent section
    #[serde(default)]
    pub agent: AgentSection,
}

/// A model entry resolved into everything the client needs
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    /// Model identifier sent to the API
    pub model: String,
    /// Chat-completions endpoint base URL
    pub api_url: String,
    /// Bearer key (may be a placeholder for keyless providers)
    pub api_key: String,
    /// Prompt blocks
    pub prompts: ModelPrompts,
    /// Context budget in bytes
    pub context_bytes: usize,
    /// Max tokens per completion
    pub max_tokens: Option<u32>,
}

impl AgentConfig {
    /// Path of the agent config file: `<home>/.mcpshell/agent.yaml`
    ///
    /// The home directory comes from `MCPSHELL_DIR` when set, otherwise
    /// the user's home.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let base = env::var(CONFIG_DIR_ENV).map_or_else(
            |_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".mcpshell")
            },
            PathBuf::from,
        );
        base.join("agent.yaml")
    }

    /// Load the agent config from the given path
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` when the file is unreadable or not valid
    /// YAML.
    pub fn load(path: &std::path::Path) -> Result<Self, ToolError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ToolError::config_invalid(format!(
                "cannot read agent config {}: {e}",
                path.display()
            ))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            ToolError::config_invalid(format!(
                "invalid agent config {}: {e}",
                path.display()
            ))
        })
    }

    /// Select the model that drives the conversation loop
    ///
    /// Precedence: explicit name, then `MCPSHELL_AGENT_MODEL`, then a
    /// dedicated `agent.orchestrator` entry, then the `default: true`
    /// flag, then the sole entry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` when no entry matches.
    pub fn orchestrator_model(&self, name: Option<&str>) -> Result<&ModelConfig, ToolError> {
        let requested = name
            .map(ToOwned::to_owned)
            .or_else(|| env::var(MODEL_ENV).ok());

        if let Some(requested) = requested {
            return self
                .agent
                .models
                .iter()
                .find(|m| m.name == requested)
                .ok_or_else(|| {
                    ToolError::config_invalid(format!("no model named '{requested}' in agent config"))
                });
        }

        if let Some(orchestrator) = &self.agent.orchestrator {
            return Ok(orchestrator);
        }
        if let Some(default) = self.agent.models.iter().find(|m| m.default) {
            return Ok(default);
        }
        if self.agent.models.len() == 1 {
            return Ok(&self.agent.models[0]);
        }
        Err(ToolError::config_invalid(
            "agent config declares no default model; pass --model or set MCPSHELL_AGENT_MODEL",
        ))
    }

    /// The dedicated tool-runner entry, when roles are distinguished
    ///
    /// When set, the completions that digest tool results run on this
    /// model instead of the orchestrator's.
    #[must_use]
    pub fn tool_runner_model(&self) -> Option<&ModelConfig> {
        self.agent.tool_runner.as_ref()
    }
}

impl ModelConfig {
    /// Resolve this entry per its provider class
    ///
    /// - `openai` — requires a key, defaults the endpoint, requires a
    ///   non-empty model name
    /// - `ollama` — key optional (placeholder used), local default
    ///   endpoint
    /// - empty or unknown — OpenAI-compatible with a user-supplied URL
    ///
    /// All string fields go through `${VAR}` environment substitution
    /// first.
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for a missing key (openai), missing URL
    /// (generic), or empty model name.
    pub fn resolve(&self) -> Result<ResolvedModel, ToolError> {
        let model = substitute_env(&self.model);
        let api_key = self.api_key.as_deref().map(substitute_env);
        let api_url = self.api_url.as_deref().map(substitute_env);

        let (api_url, api_key) = match self.class.as_str() {
            "openai" => {
                let key = api_key.filter(|k| !k.is_empty()).ok_or_else(|| {
                    ToolError::config_invalid(format!(
                        "model '{}' (class openai) needs an api-key",
                        self.name
                    ))
                })?;
                if model.is_empty() {
                    return Err(ToolError::config_invalid(format!(
                        "model '{}' (class openai) needs a model name",
                        self.name
                    )));
                }
                (api_url.unwrap_or_else(|| OPENAI_API_URL.to_owned()), key)
            }
            "ollama" => (
                api_url.unwrap_or_else(|| OLLAMA_API_URL.to_owned()),
                api_key
                    .filter(|k| !k.is_empty())
                    .unwrap_or_else(|| PLACEHOLDER_API_KEY.to_owned()),
            ),
            class => {
                let url = api_url.filter(|u| !u.is_empty()).ok_or_else(|| {
                    ToolError::config_invalid(format!(
                        "model '{}' (class '{class}') needs an api-url",
                        self.name
                    ))
                })?;
                (url, api_key.unwrap_or_default())
            }
        };

        debug!(model = %model, url = %api_url, "Resolved model config");

        Ok(ResolvedModel {
            model,
            api_url,
            api_key,
            prompts: ModelPrompts {
                system: self.prompts.system.iter().map(|s| substitute_env(s)).collect(),
                user: self.prompts.user.iter().map(|s| substitute_env(s)).collect(),
            },
            context_bytes: self.context_bytes.unwrap_or(DEFAULT_CONTEXT_BYTES),
            max_tokens: self.max_tokens,
        })
    }
}

/// Replace every `${VAR}` occurrence with the value of environment
/// variable `VAR`; unset variables substitute as empty
#[must_use]
pub fn substitute_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let var = &after[..end];
        if let Ok(value) = env::var(var) {
            out.push_str(&value);
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
agent:
  models:
    - name: gpt
      model: gpt-4o
      class: openai
      default: true
      api-key: "${MCPSHELL_TEST_KEY}"
    - name: local
      model: llama3
      class: ollama
    - name: custom
      model: mistral
      api-url: "http://example.test/v1"
"#;

    fn parsed() -> AgentConfig {
        serde_yaml::from_str(CONFIG).expect("config yaml")
    }

    #[test]
    fn substitutes_env_vars() {
        env::set_var("MCPSHELL_SUBST_TEST", "value");
        assert_eq!(substitute_env("x-${MCPSHELL_SUBST_TEST}-y"), "x-value-y");
        assert_eq!(substitute_env("no vars"), "no vars");
        assert_eq!(substitute_env("${MCPSHELL_UNSET_XYZ}"), "");
        assert_eq!(substitute_env("${unterminated"), "${unterminated");
        env::remove_var("MCPSHELL_SUBST_TEST");
    }

    #[test]
    fn selects_default_model() {
        let config = parsed();
        let model = config.orchestrator_model(None).expect("select");
        assert_eq!(model.name, "gpt");
    }

    #[test]
    fn selects_by_explicit_name() {
        let config = parsed();
        let model = config.orchestrator_model(Some("local")).expect("select");
        assert_eq!(model.class, "ollama");
    }

    #[test]
    fn unknown_name_fails() {
        let config = parsed();
        assert!(config.orchestrator_model(Some("missing")).is_err());
    }

    #[test]
    fn orchestrator_entry_beats_default_flag() {
        let config: AgentConfig = serde_yaml::from_str(
            r#"
agent:
  models:
    - name: everyday
      model: gpt-4o-mini
      class: ollama
      default: true
  orchestrator:
    name: planner
    model: gpt-4o
    class: ollama
  tool-runner:
    name: runner
    model: llama3
    class: ollama
"#,
        )
        .expect("config yaml");

        let model = config.orchestrator_model(None).expect("select");
        assert_eq!(model.name, "planner");

        // An explicit name still wins over the role entry.
        let model = config.orchestrator_model(Some("everyday")).expect("select");
        assert_eq!(model.name, "everyday");

        let runner = config.tool_runner_model().expect("tool runner");
        assert_eq!(runner.model, "llama3");
    }

    #[test]
    fn tool_runner_absent_by_default() {
        assert!(parsed().tool_runner_model().is_none());
    }

    #[test]
    fn openai_requires_key() {
        env::remove_var("MCPSHELL_TEST_KEY");
        let config = parsed();
        let err = config.agent.models[0].resolve().expect_err("must fail");
        assert_eq!(err.kind, mcpshell::error::ErrorKind::ConfigInvalid);

        env::set_var("MCPSHELL_TEST_KEY", "sk-test");
        let resolved = config.agent.models[0].resolve().expect("resolve");
        assert_eq!(resolved.api_key, "sk-test");
        assert_eq!(resolved.api_url, "https://api.openai.com/v1");
        env::remove_var("MCPSHELL_TEST_KEY");
    }

    #[test]
    fn ollama_defaults() {
        let config = parsed();
        let resolved = config.agent.models[1].resolve().expect("resolve");
        assert_eq!(resolved.api_url, "http://localhost:11434/v1");
        assert_eq!(resolved.api_key, "ollama");
        assert_eq!(resolved.context_bytes, DEFAULT_CONTEXT_BYTES);
    }

    #[test]
    fn generic_class_requires_url() {
        let config = parsed();
        let resolved = config.agent.models[2].resolve().expect("resolve");
        assert_eq!(resolved.api_url, "http://example.test/v1");

        let bare = ModelConfig {
            name: "bare".to_owned(),
            model: "m".to_owned(),
            ..ModelConfig::default()
        };
        assert!(bare.resolve().is_err());
    }

    #[test]
    fn default_path_honors_override() {
        env::set_var(CONFIG_DIR_ENV, "/tmp/mcpshell-test-home");
        let path = AgentConfig::default_path();
        assert_eq!(
            path,
            PathBuf::from("/tmp/mcpshell-test-home/agent.yaml")
        );
        env::remove_var(CONFIG_DIR_ENV);
    }
}
