//! Expression-mode permission specs.
//!
//! A deliberately small language: string and integer literals, attribute
//! variables, `+` concatenation, parentheses, and a top-level comma list that
//! yields one token per element.
//!
//! ```text
//! list     := concat ( ',' concat )*
//! concat   := term ( '+' term )*
//! term     := string | integer | variable | '(' concat ')'
//! variable := '#'? identifier
//! string   := '…' | "…"        ${name} interpolates, \ escapes
//! ```
//!
//! Evaluation reads only the attributes of an [`IdentityContext`]. There are
//! no function calls, member access, or any other route to ambient state.

use std::collections::BTreeSet;

use crate::attributes::IdentityContext;
use crate::error::{ConfigurationError, RenderError};
use crate::template::is_identifier;

/// Longest accepted expression source, in bytes.
pub const MAX_EXPRESSION_LEN: usize = 1024;

/// Deepest accepted parenthesis nesting.
pub const MAX_NESTING_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Var(String),
    Concat(Vec<Node>),
}

impl Node {
    fn eval(&self, identity: &IdentityContext, out: &mut String) -> Result<(), RenderError> {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Var(name) => {
                let value = identity.get(name).ok_or_else(|| RenderError::MissingContext {
                    attribute: name.clone(),
                })?;
                out.push_str(&value.to_string());
            }
            Self::Concat(parts) => {
                for part in parts {
                    part.eval(identity, out)?;
                }
            }
        }
        Ok(())
    }

    fn collect_references(&self, into: &mut BTreeSet<String>) {
        match self {
            Self::Text(_) => {}
            Self::Var(name) => {
                into.insert(name.clone());
            }
            Self::Concat(parts) => parts.iter().for_each(|p| p.collect_references(into)),
        }
    }
}

/// A compiled expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    items: Vec<Node>,
}

impl Expression {
    /// Compiles `source`. All syntax errors surface here, never at render time.
    pub fn parse(source: &str) -> Result<Self, ConfigurationError> {
        let invalid = |message: String| ConfigurationError::InvalidExpression {
            expression: source.to_string(),
            message,
        };

        if source.len() > MAX_EXPRESSION_LEN {
            return Err(invalid(format!(
                "expression exceeds {MAX_EXPRESSION_LEN} bytes"
            )));
        }

        let tokens = lex(source).map_err(invalid)?;
        if tokens.is_empty() {
            return Err(invalid("expression is empty".to_string()));
        }

        let mut parser = Parser { tokens, pos: 0 };
        let items = parser.list().map_err(invalid)?;
        if let Some(token) = parser.peek() {
            return Err(invalid(format!("unexpected {token}")));
        }

        Ok(Self { items })
    }

    /// Attribute names read by the expression.
    pub fn references(&self) -> BTreeSet<String> {
        let mut refs = BTreeSet::new();
        for item in &self.items {
            item.collect_references(&mut refs);
        }
        refs
    }

    /// Evaluates every list element into a token.
    pub fn render(&self, identity: &IdentityContext) -> Result<Vec<String>, RenderError> {
        self.items
            .iter()
            .map(|item| {
                let mut out = String::new();
                item.eval(identity, &mut out)?;
                Ok(out)
            })
            .collect()
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Str(Vec<Node>),
    Int(i64),
    Var(String),
    Plus,
    Comma,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(_) => f.write_str("string literal"),
            Self::Int(n) => write!(f, "integer {n}"),
            Self::Var(name) => write!(f, "variable '{name}'"),
            Self::Plus => f.write_str("'+'"),
            Self::Comma => f.write_str("','"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
        }
    }
}

fn lex(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '\'' | '"' => {
                chars.next();
                tokens.push(Token::Str(lex_string(&mut chars, c)?));
            }
            '0'..='9' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    digits.push(d);
                    chars.next();
                }
                let n = digits
                    .parse::<i64>()
                    .map_err(|_| format!("integer literal {digits} out of range"))?;
                tokens.push(Token::Int(n));
            }
            '#' | 'a'..='z' | 'A'..='Z' | '_' => {
                if c == '#' {
                    chars.next();
                }
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if !(d.is_ascii_alphanumeric() || d == '_') {
                        break;
                    }
                    name.push(d);
                    chars.next();
                }
                if !is_identifier(&name) {
                    return Err(format!("invalid variable name {name:?}"));
                }
                tokens.push(Token::Var(name));
            }
            other => return Err(format!("unexpected character {other:?}")),
        }
    }

    Ok(tokens)
}

fn lex_string(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
) -> Result<Vec<Node>, String> {
    let mut parts = Vec::new();
    let mut text = String::new();

    loop {
        match chars.next() {
            None => return Err("unterminated string literal".to_string()),
            Some(c) if c == quote => break,
            Some('\\') => match chars.next() {
                Some(escaped @ ('\\' | '\'' | '"' | '$')) => text.push(escaped),
                Some(other) => return Err(format!("unsupported escape '\\{other}'")),
                None => return Err("unterminated string literal".to_string()),
            },
            Some('$') if chars.peek() == Some(&'{') => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err("unterminated interpolation".to_string()),
                    }
                }
                let name = name.trim().trim_start_matches('#').to_string();
                if !is_identifier(&name) {
                    return Err(format!("invalid interpolation name {name:?}"));
                }
                if !text.is_empty() {
                    parts.push(Node::Text(std::mem::take(&mut text)));
                }
                parts.push(Node::Var(name));
            }
            Some(c) => text.push(c),
        }
    }

    if !text.is_empty() || parts.is_empty() {
        parts.push(Node::Text(text));
    }
    Ok(parts)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn list(&mut self) -> Result<Vec<Node>, String> {
        let mut items = vec![self.concat(0)?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            items.push(self.concat(0)?);
        }
        Ok(items)
    }

    fn concat(&mut self, depth: usize) -> Result<Node, String> {
        let mut parts = vec![self.term(depth)?];
        while self.peek() == Some(&Token::Plus) {
            self.pos += 1;
            parts.push(self.term(depth)?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Node::Concat(parts)
        })
    }

    fn term(&mut self, depth: usize) -> Result<Node, String> {
        match self.advance() {
            Some(Token::Str(mut parts)) => Ok(if parts.len() == 1 {
                parts.remove(0)
            } else {
                Node::Concat(parts)
            }),
            Some(Token::Int(n)) => Ok(Node::Text(n.to_string())),
            Some(Token::Var(name)) => Ok(Node::Var(name)),
            Some(Token::LParen) => {
                if depth + 1 > MAX_NESTING_DEPTH {
                    return Err(format!("nesting deeper than {MAX_NESTING_DEPTH}"));
                }
                let inner = self.concat(depth + 1)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(format!("expected ')', found {other}")),
                    None => Err("expected ')', found end of expression".to_string()),
                }
            }
            Some(other) => Err(format!("expected a value, found {other}")),
            None => Err("expected a value, found end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> IdentityContext {
        IdentityContext::new("u1")
            .with_attribute("appId", "1")
            .with_attribute("unitId", 5_i64)
    }

    fn render(source: &str) -> Vec<String> {
        Expression::parse(source).unwrap().render(&ctx()).unwrap()
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(
            render("'APP' + #appId + '_UNIT' + #unitId + '_READ'"),
            vec!["APP1_UNIT5_READ"]
        );
    }

    #[test]
    fn test_bare_variables_and_integers() {
        assert_eq!(render("appId + 0 + unitId"), vec!["105"]);
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(render("\"APP${appId}_UNIT${ #unitId }\""), vec!["APP1_UNIT5"]);
        assert_eq!(render("'cost: \\$5'"), vec!["cost: $5"]);
        assert_eq!(render("'$x'"), vec!["$x"]);
    }

    #[test]
    fn test_list_yields_multiple_tokens() {
        assert_eq!(
            render("'APP' + #appId + '_READ', 'APP' + #appId + '_ADMIN'"),
            vec!["APP1_READ", "APP1_ADMIN"]
        );
    }

    #[test]
    fn test_parentheses() {
        assert_eq!(render("('A' + ('B' + #unitId))"), vec!["AB5"]);
    }

    #[test]
    fn test_empty_string_literal() {
        assert_eq!(render("'' + #appId"), vec!["1"]);
    }

    #[test]
    fn test_references() {
        let expr = Expression::parse("'X' + #a, \"${b}\" + (c)").unwrap();
        let refs: Vec<String> = expr.references().into_iter().collect();
        assert_eq!(refs, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_missing_variable() {
        let expr = Expression::parse("'UNIT' + #nope").unwrap();
        assert_eq!(
            expr.render(&ctx()),
            Err(RenderError::MissingContext {
                attribute: "nope".to_string()
            })
        );
    }

    #[test]
    fn test_no_member_access_or_calls() {
        assert!(Expression::parse("T(java.lang.Runtime).getRuntime()").is_err());
        assert!(Expression::parse("#appId.length()").is_err());
        assert!(Expression::parse("#appId[0]").is_err());
        assert!(Expression::parse("@bean").is_err());
    }

    #[test]
    fn test_syntax_errors() {
        assert!(Expression::parse("").is_err());
        assert!(Expression::parse("   ").is_err());
        assert!(Expression::parse("'open").is_err());
        assert!(Expression::parse("'A' +").is_err());
        assert!(Expression::parse("('A'").is_err());
        assert!(Expression::parse("'A' 'B'").is_err());
        assert!(Expression::parse("'${}'").is_err());
        assert!(Expression::parse("'\\n'").is_err());
        assert!(Expression::parse("99999999999999999999").is_err());
        assert!(Expression::parse("#").is_err());
    }

    #[test]
    fn test_limits() {
        let long = format!("'{}'", "x".repeat(MAX_EXPRESSION_LEN));
        assert!(Expression::parse(&long).is_err());

        let ok = format!("{}'x'{}", "(".repeat(MAX_NESTING_DEPTH), ")".repeat(MAX_NESTING_DEPTH));
        assert!(Expression::parse(&ok).is_ok());

        let deep = format!(
            "{}'x'{}",
            "(".repeat(MAX_NESTING_DEPTH + 1),
            ")".repeat(MAX_NESTING_DEPTH + 1)
        );
        assert!(Expression::parse(&deep).is_err());
    }
}
