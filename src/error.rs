// ABOUTME: Kind-tagged error type shared by the tool pipeline, catalog, and agent loop
// ABOUTME: The kind enum carries the failure taxonomy surfaced to MCP clients and the LLM
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::fmt;

/// Error type for tool loading, validation, and execution
#[derive(Debug, Clone)]
pub struct ToolError {
    /// Error category
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

/// Categories of failures produced by the tool pipeline and its callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Catalog or agent config failed to parse or validate
    ConfigInvalid,
    /// No viable tool survived requirement filtering
    CatalogEmpty,
    /// A required parameter has no binding and no default
    MissingParameter,
    /// A supplied argument does not match its declared type
    InvalidParam,
    /// A constraint predicate evaluated to false
    ConstraintViolated,
    /// A constraint predicate hit a runtime type mismatch
    ConstraintError,
    /// Command or output template rendering failed
    TemplateError,
    /// The runner returned a non-zero exit or failed to start
    ExecError,
    /// Context cancellation during execution
    Canceled,
    /// Chat-completion call failed, timed out, or returned no choices
    LlmError,
    /// LLM-supplied tool arguments were not valid JSON
    ToolArgsParse,
    /// Recovered panic or unexpected internal state
    Internal,
}

impl ToolError {
    /// Create an error with an explicit kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a config-invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a catalog-empty error
    pub fn catalog_empty(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CatalogEmpty, message)
    }

    /// Create a missing-parameter error for the named parameter
    pub fn missing_parameter(name: &str) -> Self {
        Self::new(
            ErrorKind::MissingParameter,
            format!("Missing required parameter: {name}"),
        )
    }

    /// Create an invalid-parameter error
    pub fn invalid_param(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParam, message)
    }

    /// Create a constraint-violated error
    ///
    /// The message is fixed: which predicate failed is never surfaced
    /// to the client.
    pub fn constraint_violated() -> Self {
        Self::new(ErrorKind::ConstraintViolated, "constraint not satisfied")
    }

    /// Create a constraint evaluation error (runtime type mismatch)
    pub fn constraint_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConstraintError, message)
    }

    /// Create a template rendering error
    pub fn template(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TemplateError, message)
    }

    /// Create an execution error
    pub fn exec(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExecError, message)
    }

    /// Create a cancellation error
    pub fn canceled() -> Self {
        Self::new(ErrorKind::Canceled, "execution canceled")
    }

    /// Create an LLM call error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LlmError, message)
    }

    /// Create a tool-arguments parse error
    pub fn tool_args_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ToolArgsParse, message)
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Whether this error belongs to the validation class
    ///
    /// Validation-class errors mean the operation was rejected before any
    /// subprocess ran; dispatchers map them to JSON-RPC invalid-params
    /// instead of internal errors.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::MissingParameter
                | ErrorKind::InvalidParam
                | ErrorKind::ConstraintViolated
                | ErrorKind::ConstraintError
                | ErrorKind::TemplateError
        )
    }

    /// Whether this error was produced by context cancellation
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self.kind, ErrorKind::Canceled)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_split() {
        assert!(ToolError::missing_parameter("x").is_validation());
        assert!(ToolError::invalid_param("bad").is_validation());
        assert!(ToolError::constraint_violated().is_validation());
        assert!(ToolError::template("oops").is_validation());
        assert!(!ToolError::exec("exit 1").is_validation());
        assert!(!ToolError::internal("panic").is_validation());
        assert!(!ToolError::canceled().is_validation());
    }

    #[test]
    fn constraint_violation_message_is_opaque() {
        let err = ToolError::constraint_violated();
        assert_eq!(err.message, "constraint not satisfied");
    }

    #[test]
    fn display_includes_kind() {
        let err = ToolError::exec("command exited with status 2");
        let text = err.to_string();
        assert!(text.contains("ExecError"));
        assert!(text.contains("status 2"));
    }
}
