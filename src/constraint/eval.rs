// ABOUTME: Tree-walking evaluator for compiled constraint expressions
// ABOUTME: Missing bindings read as type zero values; type mismatches are eval errors
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::collections::BTreeMap;

use regex::Regex;

use crate::constraint::parser::{BinOp, Expr, MacroKind, Method};
use crate::error::ToolError;
use crate::param::{BoundArgs, ParamType, ParamValue};

/// Runtime value produced while evaluating a constraint expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String
    Str(String),
    /// Number (double)
    Num(f64),
    /// Boolean
    Bool(bool),
    /// List of values
    List(Vec<Value>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Num(_) => "number",
            Self::Bool(_) => "boolean",
            Self::List(_) => "list",
        }
    }
}

impl From<&ParamValue> for Value {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Str(s) => Self::Str(s.clone()),
            ParamValue::Num(n) => Self::Num(*n),
            ParamValue::Bool(b) => Self::Bool(*b),
        }
    }
}

/// Evaluation environment: bound arguments plus declared types for
/// zero-value substitution, plus macro-variable overlays
pub struct Env<'a> {
    args: &'a BoundArgs,
    types: &'a BTreeMap<String, ParamType>,
    locals: Vec<(String, Value)>,
}

impl<'a> Env<'a> {
    /// Create an environment over one call's bound arguments
    #[must_use]
    pub const fn new(args: &'a BoundArgs, types: &'a BTreeMap<String, ParamType>) -> Self {
        Self {
            args,
            types,
            locals: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, ToolError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(local, _)| local == name) {
            return Ok(value.clone());
        }
        if let Some(bound) = self.args.get(name) {
            return Ok(Value::from(bound));
        }
        if let Some(param_type) = self.types.get(name) {
            return Ok(Value::from(&ParamValue::zero(*param_type)));
        }
        // Compile rejects undeclared names; reaching here means the
        // program and parameter set went out of sync.
        Err(ToolError::constraint_error(format!(
            "unknown identifier '{name}'"
        )))
    }
}

/// Evaluate an expression to a runtime value
///
/// # Errors
///
/// Returns `ConstraintError` on any runtime type mismatch.
pub fn eval(expr: &Expr, env: &mut Env<'_>) -> Result<Value, ToolError> {
    match expr {
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Num(n) => Ok(Value::Num(*n)),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Ident(name) => env.lookup(name),
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, env)?);
            }
            Ok(Value::List(values))
        }
        Expr::Not(inner) => match eval(inner, env)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            other => Err(mismatch("!", "boolean", &other)),
        },
        Expr::Neg(inner) => match eval(inner, env)? {
            Value::Num(n) => Ok(Value::Num(-n)),
            other => Err(mismatch("-", "number", &other)),
        },
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, env),
        Expr::Call {
            recv,
            method,
            arg,
            compiled,
        } => eval_call(recv, *method, arg.as_deref(), compiled.as_ref(), env),
        Expr::Macro {
            recv,
            kind,
            var,
            pred,
        } => eval_macro(recv, *kind, var, pred, env),
    }
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    env: &mut Env<'_>,
) -> Result<Value, ToolError> {
    // Logical operators short-circuit.
    if matches!(op, BinOp::And | BinOp::Or) {
        let left = match eval(lhs, env)? {
            Value::Bool(b) => b,
            other => return Err(mismatch("logical operator", "boolean", &other)),
        };
        if (op == BinOp::And && !left) || (op == BinOp::Or && left) {
            return Ok(Value::Bool(left));
        }
        return match eval(rhs, env)? {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(mismatch("logical operator", "boolean", &other)),
        };
    }

    let left = eval(lhs, env)?;
    let right = eval(rhs, env)?;
    let result = match (op, &left, &right) {
        (BinOp::Eq, _, _) => equals(&left, &right)?,
        (BinOp::Ne, _, _) => !equals(&left, &right)?,
        (BinOp::Lt, Value::Num(a), Value::Num(b)) => a < b,
        (BinOp::Le, Value::Num(a), Value::Num(b)) => a <= b,
        (BinOp::Gt, Value::Num(a), Value::Num(b)) => a > b,
        (BinOp::Ge, Value::Num(a), Value::Num(b)) => a >= b,
        (BinOp::Lt, Value::Str(a), Value::Str(b)) => a < b,
        (BinOp::Le, Value::Str(a), Value::Str(b)) => a <= b,
        (BinOp::Gt, Value::Str(a), Value::Str(b)) => a > b,
        (BinOp::Ge, Value::Str(a), Value::Str(b)) => a >= b,
        _ => {
            return Err(ToolError::constraint_error(format!(
                "cannot order {} against {}",
                left.type_name(),
                right.type_name()
            )));
        }
    };
    Ok(Value::Bool(result))
}

fn equals(left: &Value, right: &Value) -> Result<bool, ToolError> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Num(a), Value::Num(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        _ => Err(ToolError::constraint_error(format!(
            "cannot compare {} against {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn eval_call(
    recv: &Expr,
    method: Method,
    arg: Option<&Expr>,
    compiled: Option<&Regex>,
    env: &mut Env<'_>,
) -> Result<Value, ToolError> {
    let receiver = eval(recv, env)?;

    if method == Method::Size {
        return match receiver {
            Value::Str(s) => Ok(Value::Num(s.chars().count() as f64)),
            Value::List(items) => Ok(Value::Num(items.len() as f64)),
            other => Err(mismatch("size()", "string or list", &other)),
        };
    }

    let Value::Str(subject) = receiver else {
        return Err(mismatch("string method", "string", &receiver));
    };
    let arg_value = match arg {
        Some(expr) => eval(expr, env)?,
        None => return Err(ToolError::constraint_error("string method needs an argument")),
    };
    let Value::Str(needle) = arg_value else {
        return Err(mismatch("string method argument", "string", &arg_value));
    };

    let result = match method {
        Method::StartsWith => subject.starts_with(&needle),
        Method::EndsWith => subject.ends_with(&needle),
        Method::Contains => subject.contains(&needle),
        Method::Matches => match compiled {
            Some(regex) => regex.is_match(&subject),
            None => Regex::new(&needle)
                .map_err(|e| {
                    ToolError::constraint_error(format!("invalid regex '{needle}': {e}"))
                })?
                .is_match(&subject),
        },
        Method::Size => unreachable!("handled above"),
    };
    Ok(Value::Bool(result))
}

fn eval_macro(
    recv: &Expr,
    kind: MacroKind,
    var: &str,
    pred: &Expr,
    env: &mut Env<'_>,
) -> Result<Value, ToolError> {
    let receiver = eval(recv, env)?;
    let Value::List(items) = receiver else {
        return Err(mismatch("exists()/all()", "list", &receiver));
    };

    for item in items {
        env.locals.push((var.to_owned(), item));
        let verdict = eval(pred, env);
        env.locals.pop();
        match verdict? {
            Value::Bool(true) if kind == MacroKind::Exists => return Ok(Value::Bool(true)),
            Value::Bool(false) if kind == MacroKind::All => return Ok(Value::Bool(false)),
            Value::Bool(_) => {}
            other => return Err(mismatch("macro predicate", "boolean", &other)),
        }
    }

    // exists over an empty remainder is false; all is vacuously true.
    Ok(Value::Bool(kind == MacroKind::All))
}

fn mismatch(context: &str, expected: &str, got: &Value) -> ToolError {
    ToolError::constraint_error(format!(
        "{context} expects {expected}, got {}",
        got.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::parser::parse;

    fn env_fixture() -> (BoundArgs, BTreeMap<String, ParamType>) {
        let mut args = BoundArgs::new();
        args.insert("name".to_owned(), ParamValue::Str("John".to_owned()));
        args.insert("depth".to_owned(), ParamValue::Num(2.0));
        let mut types = BTreeMap::new();
        types.insert("name".to_owned(), ParamType::String);
        types.insert("depth".to_owned(), ParamType::Number);
        types.insert("missing".to_owned(), ParamType::String);
        (args, types)
    }

    fn run(source: &str) -> Result<Value, ToolError> {
        let (args, types) = env_fixture();
        let expr = parse(source).expect("parse");
        let mut env = Env::new(&args, &types);
        eval(&expr, &mut env)
    }

    #[test]
    fn size_le() {
        assert_eq!(run("name.size() <= 100").expect("eval"), Value::Bool(true));
        assert_eq!(run("name.size() > 100").expect("eval"), Value::Bool(false));
    }

    #[test]
    fn contains_and_negation() {
        assert_eq!(run("!name.contains('/')").expect("eval"), Value::Bool(true));
        assert_eq!(run("name.contains('oh')").expect("eval"), Value::Bool(true));
    }

    #[test]
    fn matches_regex() {
        assert_eq!(
            run("name.matches('^[A-Za-z]+$')").expect("eval"),
            Value::Bool(true)
        );
        assert_eq!(
            run(r"name.matches('^\d+$')").expect("eval"),
            Value::Bool(false)
        );
    }

    #[test]
    fn missing_binding_reads_zero_value() {
        assert_eq!(run("missing == ''").expect("eval"), Value::Bool(true));
        assert_eq!(run("missing.size() == 0").expect("eval"), Value::Bool(true));
    }

    #[test]
    fn exists_over_list() {
        assert_eq!(
            run("['John', 'Jane'].exists(v, v == name)").expect("eval"),
            Value::Bool(true)
        );
        assert_eq!(
            run("['Alice', 'Bob'].exists(v, v == name)").expect("eval"),
            Value::Bool(false)
        );
    }

    #[test]
    fn all_over_list() {
        assert_eq!(
            run("['a', 'b'].all(v, v.size() == 1)").expect("eval"),
            Value::Bool(true)
        );
        assert_eq!(
            run("[].all(v, v == 'x')").expect("eval"),
            Value::Bool(true)
        );
        assert_eq!(
            run("[].exists(v, v == 'x')").expect("eval"),
            Value::Bool(false)
        );
    }

    #[test]
    fn numeric_comparison_uses_bound_number() {
        assert_eq!(run("depth <= 3").expect("eval"), Value::Bool(true));
        assert_eq!(run("depth > 2").expect("eval"), Value::Bool(false));
    }

    #[test]
    fn type_mismatch_is_eval_error() {
        let err = run("name > 3").expect_err("must fail");
        assert_eq!(err.kind, crate::error::ErrorKind::ConstraintError);
        let err = run("depth.contains('x')").expect_err("must fail");
        assert_eq!(err.kind, crate::error::ErrorKind::ConstraintError);
    }

    #[test]
    fn logical_short_circuit() {
        // The rhs would be a type error; short-circuit must skip it.
        assert_eq!(
            run("name == 'John' || name > 3").expect("eval"),
            Value::Bool(true)
        );
    }
}
