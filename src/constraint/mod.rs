// ABOUTME: Constraint programs — CEL-style predicates compiled once per tool at catalog load
// ABOUTME: All predicates must hold before a tool's command is rendered or executed
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

//! # Constraint Programs
//!
//! Each tool declares zero or more predicate expressions over its
//! parameter namespace. The set is compiled once when the catalog loads
//! (`ConfigInvalid` on syntax errors or undeclared names) and evaluated
//! per call. Evaluation is total: missing bindings read as the declared
//! type's zero value. A runtime type mismatch is a `ConstraintError`;
//! a predicate evaluating to `false` gates execution.

mod eval;
mod lexer;
mod parser;

use std::collections::BTreeMap;

use crate::error::ToolError;
use crate::param::{BoundArgs, ParamSpec, ParamType};

use eval::{eval, Env, Value};
use parser::{free_identifiers, parse, Expr};

/// One compiled predicate, kept with its source for diagnostics
#[derive(Debug, Clone)]
struct Program {
    source: String,
    expr: Expr,
}

/// The compiled constraint set of a single tool
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    programs: Vec<Program>,
    types: BTreeMap<String, ParamType>,
}

impl ConstraintSet {
    /// Compile a list of predicate expressions against the declared
    /// parameter set
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` when an expression is syntactically
    /// invalid or references a name outside the parameter namespace.
    pub fn compile(
        expressions: &[String],
        params: &BTreeMap<String, ParamSpec>,
    ) -> Result<Self, ToolError> {
        let types: BTreeMap<String, ParamType> = params
            .iter()
            .map(|(name, spec)| (name.clone(), spec.param_type))
            .collect();

        let mut programs = Vec::with_capacity(expressions.len());
        for source in expressions {
            let expr = parse(source)?;
            let mut idents = Vec::new();
            free_identifiers(&expr, &mut idents);
            for ident in idents {
                if !types.contains_key(&ident) {
                    return Err(ToolError::config_invalid(format!(
                        "constraint '{source}': unknown parameter '{ident}'"
                    )));
                }
            }
            programs.push(Program {
                source: source.clone(),
                expr,
            });
        }

        Ok(Self { programs, types })
    }

    /// Evaluate every predicate against one call's bound arguments
    ///
    /// Returns `Ok(true)` only when all predicates hold; an empty set
    /// holds vacuously. `Ok(false)` names no predicate — the failing
    /// expression is logged, never surfaced.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintError` when a predicate hits a runtime type
    /// mismatch or produces a non-boolean result.
    pub fn evaluate(&self, args: &BoundArgs) -> Result<bool, ToolError> {
        for program in &self.programs {
            let mut env = Env::new(args, &self.types);
            match eval(&program.expr, &mut env)? {
                Value::Bool(true) => {}
                Value::Bool(false) => {
                    tracing::debug!(constraint = %program.source, "Constraint rejected call");
                    return Ok(false);
                }
                other => {
                    return Err(ToolError::constraint_error(format!(
                        "constraint '{}' produced {:?}, expected boolean",
                        program.source, other
                    )));
                }
            }
        }
        Ok(true)
    }

    /// Number of compiled predicates
    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Whether the set has no predicates
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
