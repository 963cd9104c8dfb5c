// ABOUTME: Typed tool parameters — declarations, wire-value coercion, and default injection
// ABOUTME: Binding turns a JSON argument object into a checked name→value map for one call
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Declared type of a tool parameter
///
/// `integer` in a catalog file is accepted as a synonym for `number`;
/// numeric values are IEEE-754 doubles throughout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// UTF-8 string (the default when no type is declared)
    #[default]
    String,
    /// IEEE-754 double
    Number,
    /// true / false
    Boolean,
}

impl<'de> Deserialize<'de> for ParamType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "string" => Ok(Self::String),
            "number" | "integer" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            other => Err(serde::de::Error::custom(format!(
                "unsupported parameter type: {other}"
            ))),
        }
    }
}

impl ParamType {
    /// JSON Schema type name for this parameter type
    #[must_use]
    pub const fn schema_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// Declaration of a single tool parameter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParamSpec {
    /// Declared type (absent means string)
    #[serde(rename = "type", default)]
    pub param_type: ParamType,
    /// Human-readable description surfaced in the tool's input schema
    #[serde(default)]
    pub description: String,
    /// Whether a binding must be present (or defaulted) at call time
    #[serde(default)]
    pub required: bool,
    /// Default injected when the caller omits the parameter
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
}

impl ParamSpec {
    /// Coerce the declared default into a runtime value, if one is set
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` when the default cannot be coerced to the
    /// declared type.
    pub fn default_value(&self, name: &str) -> Result<Option<ParamValue>, ToolError> {
        let Some(raw) = &self.default else {
            return Ok(None);
        };
        let json = yaml_scalar_to_json(raw).ok_or_else(|| {
            ToolError::invalid_param(format!("Parameter '{name}' has a non-scalar default"))
        })?;
        coerce(name, self.param_type, &json).map(Some)
    }
}

/// A parameter value after coercion
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// String value
    Str(String),
    /// Numeric value (double)
    Num(f64),
    /// Boolean value
    Bool(bool),
}

impl ParamValue {
    /// The zero value for a declared type, substituted for missing
    /// bindings during constraint evaluation
    #[must_use]
    pub const fn zero(param_type: ParamType) -> Self {
        match param_type {
            ParamType::String => Self::Str(String::new()),
            ParamType::Number => Self::Num(0.0),
            ParamType::Boolean => Self::Bool(false),
        }
    }

    /// Render the value for substitution into a command or output template
    ///
    /// Whole numbers render without a fractional part so `-d {{ .depth }}`
    /// produces `-d 2`, not `-d 2.0`.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Num(n) => {
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 9_007_199_254_740_992.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Self::Bool(b) => b.to_string(),
        }
    }
}

/// Bound argument set for one tool call, keyed by parameter name
///
/// Ordered so downstream rendering and logging are deterministic.
pub type BoundArgs = BTreeMap<String, ParamValue>;

/// Bind wire arguments against the declared parameter set
///
/// Coerces each supplied value to its declared type, injects defaults for
/// absent parameters, and checks the required set. Binding is idempotent:
/// binding the rendered result again yields the same map.
///
/// # Errors
///
/// - `InvalidParam` for an undeclared argument name or a value that does
///   not coerce to its declared type
/// - `MissingParameter` for a required parameter with no binding and no
///   default
pub fn bind(
    params: &BTreeMap<String, ParamSpec>,
    wire_args: &serde_json::Map<String, Value>,
) -> Result<BoundArgs, ToolError> {
    for key in wire_args.keys() {
        if !params.contains_key(key) {
            return Err(ToolError::invalid_param(format!(
                "Unknown parameter: {key}"
            )));
        }
    }

    let mut bound = BoundArgs::new();
    for (name, spec) in params {
        if let Some(raw) = wire_args.get(name) {
            if raw.is_null() {
                continue;
            }
            bound.insert(name.clone(), coerce(name, spec.param_type, raw)?);
        } else if let Some(default) = spec.default_value(name)? {
            bound.insert(name.clone(), default);
        } else if spec.required {
            return Err(ToolError::missing_parameter(name));
        }
    }
    Ok(bound)
}

/// Coerce one wire value to the declared parameter type
fn coerce(name: &str, param_type: ParamType, raw: &Value) -> Result<ParamValue, ToolError> {
    match param_type {
        ParamType::String => match raw {
            Value::String(s) => Ok(ParamValue::Str(s.clone())),
            Value::Number(n) => Ok(ParamValue::Str(n.to_string())),
            Value::Bool(b) => Ok(ParamValue::Str(b.to_string())),
            _ => Err(type_mismatch(name, "string", raw)),
        },
        ParamType::Number => match raw {
            Value::Number(n) => n
                .as_f64()
                .map(ParamValue::Num)
                .ok_or_else(|| type_mismatch(name, "number", raw)),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(ParamValue::Num)
                .map_err(|_| type_mismatch(name, "number", raw)),
            _ => Err(type_mismatch(name, "number", raw)),
        },
        ParamType::Boolean => match raw {
            Value::Bool(b) => Ok(ParamValue::Bool(*b)),
            Value::String(s) => match s.trim() {
                "true" => Ok(ParamValue::Bool(true)),
                "false" => Ok(ParamValue::Bool(false)),
                _ => Err(type_mismatch(name, "boolean", raw)),
            },
            _ => Err(type_mismatch(name, "boolean", raw)),
        },
    }
}

fn type_mismatch(name: &str, expected: &str, raw: &Value) -> ToolError {
    ToolError::invalid_param(format!(
        "Parameter '{name}' expects {expected}, got {raw}"
    ))
}

/// Convert a YAML scalar to its JSON equivalent for coercion
fn yaml_scalar_to_json(value: &serde_yaml::Value) -> Option<Value> {
    match value {
        serde_yaml::Value::String(s) => Some(Value::String(s.clone())),
        serde_yaml::Value::Number(n) => {
            serde_json::Number::from_f64(n.as_f64()?).map(Value::Number)
        }
        serde_yaml::Value::Bool(b) => Some(Value::Bool(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn params(entries: &[(&str, ParamType, bool, Option<serde_yaml::Value>)]) -> BTreeMap<String, ParamSpec> {
        entries
            .iter()
            .map(|(name, ty, required, default)| {
                (
                    (*name).to_owned(),
                    ParamSpec {
                        param_type: *ty,
                        description: String::new(),
                        required: *required,
                        default: default.clone(),
                    },
                )
            })
            .collect()
    }

    fn args(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn binds_declared_string() {
        let decl = params(&[("name", ParamType::String, true, None)]);
        let bound = bind(&decl, &args(json!({"name": "John"}))).expect("bind");
        assert_eq!(bound["name"], ParamValue::Str("John".to_owned()));
    }

    #[test]
    fn missing_required_fails() {
        let decl = params(&[("name", ParamType::String, true, None)]);
        let err = bind(&decl, &args(json!({}))).expect_err("must fail");
        assert_eq!(err.kind, ErrorKind::MissingParameter);
    }

    #[test]
    fn default_injected_for_absent_param() {
        let decl = params(&[(
            "max_depth",
            ParamType::Number,
            false,
            Some(serde_yaml::Value::Number(2.into())),
        )]);
        let bound = bind(&decl, &args(json!({}))).expect("bind");
        assert_eq!(bound["max_depth"], ParamValue::Num(2.0));
    }

    #[test]
    fn unknown_argument_rejected() {
        let decl = params(&[("name", ParamType::String, false, None)]);
        let err = bind(&decl, &args(json!({"other": 1}))).expect_err("must fail");
        assert_eq!(err.kind, ErrorKind::InvalidParam);
    }

    #[test]
    fn numeric_string_coerces_to_number() {
        let decl = params(&[("depth", ParamType::Number, true, None)]);
        let bound = bind(&decl, &args(json!({"depth": "3"}))).expect("bind");
        assert_eq!(bound["depth"], ParamValue::Num(3.0));
    }

    #[test]
    fn bool_mismatch_rejected() {
        let decl = params(&[("flag", ParamType::Boolean, true, None)]);
        let err = bind(&decl, &args(json!({"flag": "yes"}))).expect_err("must fail");
        assert_eq!(err.kind, ErrorKind::InvalidParam);
    }

    #[test]
    fn binding_is_idempotent() {
        let decl = params(&[
            ("name", ParamType::String, true, None),
            (
                "depth",
                ParamType::Number,
                false,
                Some(serde_yaml::Value::Number(2.into())),
            ),
        ]);
        let first = bind(&decl, &args(json!({"name": "a"}))).expect("bind");
        let rebound: serde_json::Map<String, Value> = first
            .iter()
            .map(|(k, v)| {
                let json = match v {
                    ParamValue::Str(s) => Value::String(s.clone()),
                    ParamValue::Num(n) => json!(n),
                    ParamValue::Bool(b) => Value::Bool(*b),
                };
                (k.clone(), json)
            })
            .collect();
        let second = bind(&decl, &rebound).expect("rebind");
        assert_eq!(first, second);
    }

    #[test]
    fn integer_synonym_parses() {
        let spec: ParamSpec = serde_yaml::from_str("type: integer\nrequired: true").expect("yaml");
        assert_eq!(spec.param_type, ParamType::Number);
    }

    #[test]
    fn fractional_value_for_integer_param_kept_as_double() {
        let decl = params(&[("n", ParamType::Number, true, None)]);
        let bound = bind(&decl, &args(json!({"n": 2.5}))).expect("bind");
        assert_eq!(bound["n"], ParamValue::Num(2.5));
    }

    #[test]
    fn whole_number_renders_without_fraction() {
        assert_eq!(ParamValue::Num(2.0).render(), "2");
        assert_eq!(ParamValue::Num(2.5).render(), "2.5");
    }
}
