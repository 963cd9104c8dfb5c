// ABOUTME: Recursive-descent parser producing the constraint expression AST
// ABOUTME: Validates method names and macro shapes at parse time
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use regex::Regex;

use crate::constraint::lexer::{tokenize, Token};
use crate::error::ToolError;

/// Binary operators of the constraint language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

/// String methods callable on an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `size()` — length of a string or list
    Size,
    /// `startsWith(prefix)`
    StartsWith,
    /// `endsWith(suffix)`
    EndsWith,
    /// `contains(needle)`
    Contains,
    /// `matches(regex)`
    Matches,
}

/// List macros with a bound variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    /// `exists(v, pred)` — true when any element satisfies the predicate
    Exists,
    /// `all(v, pred)` — true when every element satisfies the predicate
    All,
}

/// A parsed constraint expression
#[derive(Debug, Clone)]
pub enum Expr {
    /// String literal
    Str(String),
    /// Numeric literal
    Num(f64),
    /// Boolean literal
    Bool(bool),
    /// Parameter reference or macro-bound variable
    Ident(String),
    /// List literal
    List(Vec<Expr>),
    /// Logical negation
    Not(Box<Expr>),
    /// Numeric negation
    Neg(Box<Expr>),
    /// Binary operation
    Binary {
        /// Operator
        op: BinOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Method call on a receiver
    Call {
        /// Receiver expression
        recv: Box<Expr>,
        /// Method selector
        method: Method,
        /// Argument (absent for `size()`)
        arg: Option<Box<Expr>>,
        /// Regex pre-compiled when the `matches()` argument is a literal
        compiled: Option<Regex>,
    },
    /// `exists` / `all` macro over a list receiver
    Macro {
        /// Receiver expression (must evaluate to a list)
        recv: Box<Expr>,
        /// Which macro
        kind: MacroKind,
        /// Bound variable name
        var: String,
        /// Per-element predicate
        pred: Box<Expr>,
    },
}

/// Parse one constraint expression into an AST
///
/// # Errors
///
/// Returns `ConfigInvalid` on any syntax error, unknown method name, or
/// malformed macro.
pub fn parse(source: &str) -> Result<Expr, ToolError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error(&format!(
            "unexpected trailing token '{}'",
            parser.tokens[parser.pos]
        )));
    }
    Ok(expr)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> ToolError {
        ToolError::config_invalid(format!("constraint '{}': {message}", self.source))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ToolError> {
        match self.advance() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(self.error(&format!("expected '{expected}', found '{token}'"))),
            None => Err(self.error(&format!("expected '{expected}', found end of expression"))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ToolError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ToolError> {
        let mut lhs = self.parse_comparison()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ToolError> {
        let lhs = self.parse_unary()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinOp::Eq,
            Some(Token::BangEq) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_unary()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, ToolError> {
        match self.peek() {
            Some(Token::Bang) => {
                self.advance();
                Ok(Expr::Not(Box::new(self.parse_unary()?)))
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    /// Parse a primary expression followed by any chain of `.method(...)`
    fn parse_postfix(&mut self) -> Result<Expr, ToolError> {
        let mut expr = self.parse_primary()?;
        while self.peek() == Some(&Token::Dot) {
            self.advance();
            let name = match self.advance() {
                Some(Token::Ident(name)) => name,
                Some(token) => {
                    return Err(self.error(&format!("expected method name, found '{token}'")));
                }
                None => return Err(self.error("expected method name after '.'")),
            };
            self.expect(&Token::LParen)?;
            expr = match name.as_str() {
                "size" => {
                    self.expect(&Token::RParen)?;
                    Expr::Call {
                        recv: Box::new(expr),
                        method: Method::Size,
                        arg: None,
                        compiled: None,
                    }
                }
                "startsWith" | "endsWith" | "contains" | "matches" => {
                    let arg = self.parse_or()?;
                    self.expect(&Token::RParen)?;
                    let method = match name.as_str() {
                        "startsWith" => Method::StartsWith,
                        "endsWith" => Method::EndsWith,
                        "contains" => Method::Contains,
                        _ => Method::Matches,
                    };
                    let compiled = if method == Method::Matches {
                        self.precompile_regex(&arg)?
                    } else {
                        None
                    };
                    Expr::Call {
                        recv: Box::new(expr),
                        method,
                        arg: Some(Box::new(arg)),
                        compiled,
                    }
                }
                "exists" | "all" => {
                    let var = match self.advance() {
                        Some(Token::Ident(var)) => var,
                        _ => {
                            return Err(
                                self.error(&format!("{name}() needs a variable as first argument"))
                            );
                        }
                    };
                    self.expect(&Token::Comma)?;
                    let pred = self.parse_or()?;
                    self.expect(&Token::RParen)?;
                    let kind = if name == "exists" {
                        MacroKind::Exists
                    } else {
                        MacroKind::All
                    };
                    Expr::Macro {
                        recv: Box::new(expr),
                        kind,
                        var,
                        pred: Box::new(pred),
                    }
                }
                other => return Err(self.error(&format!("unknown method '{other}'"))),
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ToolError> {
        match self.advance() {
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Number(n)) => Ok(Expr::Num(n)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if self.peek() == Some(&Token::RBracket) {
                    self.advance();
                    return Ok(Expr::List(items));
                }
                loop {
                    items.push(self.parse_or()?);
                    match self.advance() {
                        Some(Token::Comma) => {}
                        Some(Token::RBracket) => break,
                        Some(token) => {
                            return Err(
                                self.error(&format!("expected ',' or ']', found '{token}'"))
                            );
                        }
                        None => return Err(self.error("unterminated list literal")),
                    }
                }
                Ok(Expr::List(items))
            }
            Some(token) => Err(self.error(&format!("unexpected token '{token}'"))),
            None => Err(self.error("empty expression")),
        }
    }

    /// Pre-compile the regex when the `matches()` argument is a string
    /// literal so bad patterns fail at catalog load, not at call time
    fn precompile_regex(&self, arg: &Expr) -> Result<Option<Regex>, ToolError> {
        if let Expr::Str(pattern) = arg {
            let regex = Regex::new(pattern)
                .map_err(|e| self.error(&format!("invalid regex '{pattern}': {e}")))?;
            return Ok(Some(regex));
        }
        Ok(None)
    }
}

/// Collect every identifier the expression references, excluding
/// macro-bound variables
pub fn free_identifiers(expr: &Expr, out: &mut Vec<String>) {
    collect(expr, &mut Vec::new(), out);
}

fn collect(expr: &Expr, scope: &mut Vec<String>, out: &mut Vec<String>) {
    match expr {
        Expr::Ident(name) => {
            if !scope.iter().any(|bound| bound == name) && !out.contains(name) {
                out.push(name.clone());
            }
        }
        Expr::List(items) => {
            for item in items {
                collect(item, scope, out);
            }
        }
        Expr::Not(inner) | Expr::Neg(inner) => collect(inner, scope, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect(lhs, scope, out);
            collect(rhs, scope, out);
        }
        Expr::Call { recv, arg, .. } => {
            collect(recv, scope, out);
            if let Some(arg) = arg {
                collect(arg, scope, out);
            }
        }
        Expr::Macro {
            recv, var, pred, ..
        } => {
            collect(recv, scope, out);
            scope.push(var.clone());
            collect(pred, scope, out);
            scope.pop();
        }
        Expr::Str(_) | Expr::Num(_) | Expr::Bool(_) => {}
    }
}
