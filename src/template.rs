// ABOUTME: Template rendering — command-line materialization and output substitution
// ABOUTME: Command templates use {{ .name }} placeholders; output templates use ${name}
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

//! # Template Rendering
//!
//! Two distinct syntaxes serve two distinct jobs:
//!
//! - **Command templates** substitute `{{ .name }}` placeholders with
//!   bound argument values. Substitution is NOT shell-quoted: command
//!   lines routinely rely on unquoted expansion, and tools are expected
//!   to gate dangerous characters through their constraint set.
//! - **Output templates** are a plain `${name}` literal replacement used
//!   by the optional `output.template` field.

use crate::error::ToolError;
use crate::param::BoundArgs;

/// Render a command template against bound arguments
///
/// `{{ .name }}` (whitespace inside the braces is ignored) resolves to
/// the bound value's string form; names with no binding render empty.
///
/// # Errors
///
/// Returns `TemplateError` for an unterminated placeholder or a
/// placeholder not of the `.name` form.
pub fn render_command(template: &str, args: &BoundArgs) -> Result<String, ToolError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(ToolError::template(format!(
                "unterminated placeholder in template: {template}"
            )));
        };
        let inner = after[..end].trim();
        let Some(name) = inner.strip_prefix('.') else {
            return Err(ToolError::template(format!(
                "placeholder '{{{{ {inner} }}}}' must reference a parameter as .name"
            )));
        };
        let name = name.trim();
        if name.is_empty() || !is_identifier(name) {
            return Err(ToolError::template(format!(
                "invalid parameter reference '{inner}' in template"
            )));
        }
        if let Some(value) = args.get(name) {
            out.push_str(&value.render());
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Substitute `${name}` occurrences in an output template
///
/// Purely literal replacement over the bound args; unknown names are
/// left in place so formatting mistakes stay visible in the output.
#[must_use]
pub fn render_output(template: &str, args: &BoundArgs) -> String {
    let mut out = template.to_owned();
    for (name, value) in args {
        let needle = format!("${{{name}}}");
        if out.contains(&needle) {
            out = out.replace(&needle, &value.render());
        }
    }
    out
}

/// Collect parameter names referenced by an output template
#[must_use]
pub fn output_template_refs(template: &str) -> Vec<String> {
    let mut refs = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if is_identifier(name) && !refs.iter().any(|r| r == name) {
            refs.push(name.to_owned());
        }
        rest = &after[end + 1..];
    }
    refs
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
