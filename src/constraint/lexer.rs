// ABOUTME: Tokenizer for the constraint predicate language
// ABOUTME: Produces a flat token stream consumed by the Pratt parser
//
// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 the mcpshell authors

use std::fmt;

use crate::error::ToolError;

/// A single token of a constraint expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier: a parameter name, macro variable, or method name
    Ident(String),
    /// Numeric literal
    Number(f64),
    /// String literal (quotes stripped, escapes resolved)
    Str(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `!`
    Bang,
    /// `-`
    Minus,
    /// `==`
    EqEq,
    /// `!=`
    BangEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "{name}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::LBracket => write!(f, "["),
            Self::RBracket => write!(f, "]"),
            Self::Comma => write!(f, ","),
            Self::Dot => write!(f, "."),
            Self::Bang => write!(f, "!"),
            Self::Minus => write!(f, "-"),
            Self::EqEq => write!(f, "=="),
            Self::BangEq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::Le => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::Ge => write!(f, ">="),
            Self::AndAnd => write!(f, "&&"),
            Self::OrOr => write!(f, "||"),
        }
    }
}

/// Tokenize a constraint expression
///
/// # Errors
///
/// Returns `ConfigInvalid` on unterminated strings, bad escapes, or
/// characters outside the language.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ToolError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => push_single(&mut chars, &mut tokens, Token::LParen),
            ')' => push_single(&mut chars, &mut tokens, Token::RParen),
            '[' => push_single(&mut chars, &mut tokens, Token::LBracket),
            ']' => push_single(&mut chars, &mut tokens, Token::RBracket),
            ',' => push_single(&mut chars, &mut tokens, Token::Comma),
            '.' => {
                // A dot starts a number only when followed by a digit and
                // not preceded by an expression; method dots dominate, so
                // treat bare `.` as the member operator.
                push_single(&mut chars, &mut tokens, Token::Dot);
            }
            '-' => push_single(&mut chars, &mut tokens, Token::Minus),
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::BangEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    return Err(lex_error(source, "single '=' is not an operator"));
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(lex_error(source, "single '&' is not an operator"));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::OrOr);
                } else {
                    return Err(lex_error(source, "single '|' is not an operator"));
                }
            }
            '\'' | '"' => {
                tokens.push(read_string(&mut chars, source)?);
            }
            '0'..='9' => {
                tokens.push(read_number(&mut chars, source)?);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => Token::Ident(ident),
                });
            }
            other => {
                return Err(lex_error(
                    source,
                    &format!("unexpected character '{other}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

fn push_single(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    tokens: &mut Vec<Token>,
    token: Token,
) {
    chars.next();
    tokens.push(token);
}

fn read_string(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    source: &str,
) -> Result<Token, ToolError> {
    let quote = chars.next().unwrap_or('\'');
    let mut value = String::new();
    loop {
        match chars.next() {
            Some(c) if c == quote => return Ok(Token::Str(value)),
            Some('\\') => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('\\') => value.push('\\'),
                Some(c) if c == quote => value.push(c),
                Some(c) => {
                    // Preserve unknown escapes verbatim so regex literals like
                    // `\d` survive into the matches() argument.
                    value.push('\\');
                    value.push(c);
                }
                None => return Err(lex_error(source, "unterminated escape in string literal")),
            },
            Some(c) => value.push(c),
            None => return Err(lex_error(source, "unterminated string literal")),
        }
    }
}

fn read_number(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    source: &str,
) -> Result<Token, ToolError> {
    let mut text = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            // Stop before a method dot: `100.size()` is not a number.
            if c == '.' {
                let mut lookahead = chars.clone();
                lookahead.next();
                if !lookahead.peek().is_some_and(char::is_ascii_digit) {
                    break;
                }
                if text.contains('.') {
                    break;
                }
            }
            text.push(c);
            chars.next();
        } else {
            break;
        }
    }
    text.parse::<f64>()
        .map(Token::Number)
        .map_err(|_| lex_error(source, &format!("invalid number literal '{text}'")))
}

fn lex_error(source: &str, message: &str) -> ToolError {
    ToolError::config_invalid(format!("constraint '{source}': {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_comparison() {
        let tokens = tokenize("name.size() <= 100").expect("lex");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("name".to_owned()),
                Token::Dot,
                Token::Ident("size".to_owned()),
                Token::LParen,
                Token::RParen,
                Token::Le,
                Token::Number(100.0),
            ]
        );
    }

    #[test]
    fn tokenizes_negated_method() {
        let tokens = tokenize("!name.contains('/')").expect("lex");
        assert_eq!(tokens[0], Token::Bang);
        assert!(tokens.contains(&Token::Str("/".to_owned())));
    }

    #[test]
    fn tokenizes_list_literal() {
        let tokens = tokenize("['a', 'b'].exists(v, v == x)").expect("lex");
        assert_eq!(tokens[0], Token::LBracket);
        assert!(tokens.contains(&Token::Comma));
        assert!(tokens.contains(&Token::EqEq));
    }

    #[test]
    fn double_quoted_strings() {
        let tokens = tokenize(r#"name == "John""#).expect("lex");
        assert_eq!(tokens[2], Token::Str("John".to_owned()));
    }

    #[test]
    fn regex_escapes_survive() {
        let tokens = tokenize(r"name.matches('^[a-z]+\d*$')").expect("lex");
        assert!(tokens.contains(&Token::Str(r"^[a-z]+\d*$".to_owned())));
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(tokenize("name == 'oops").is_err());
    }

    #[test]
    fn single_equals_fails() {
        assert!(tokenize("name = 'x'").is_err());
    }

    #[test]
    fn float_literal() {
        let tokens = tokenize("n >= 1.5").expect("lex");
        assert_eq!(tokens[2], Token::Number(1.5));
    }
}
