//! Literal-mode permission templates.
//!
//! A template is fixed text with `{name}` placeholders, filled by direct
//! substitution: `APP{appId}_UNIT{unitId}{suffix}`. `{{` and `}}` produce
//! literal braces. There is no evaluation of any kind.

use std::collections::BTreeSet;

use crate::attributes::IdentityContext;
use crate::error::{ConfigurationError, RenderError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder(String),
}

/// A parsed literal template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`, rejecting unbalanced braces and invalid placeholder names.
    pub fn parse(source: &str) -> Result<Self, ConfigurationError> {
        let invalid = |message: &str| ConfigurationError::InvalidTemplate {
            template: source.to_string(),
            message: message.to_string(),
        };

        if source.is_empty() {
            return Err(invalid("template is empty"));
        }

        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => return Err(invalid("unterminated placeholder")),
                        }
                    }
                    if !is_identifier(&name) {
                        return Err(invalid(&format!("invalid placeholder name {name:?}")));
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                '}' => return Err(invalid("unmatched '}'")),
                other => text.push(other),
            }
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self { segments })
    }

    /// Attribute names referenced by placeholders.
    pub fn references(&self) -> BTreeSet<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.clone()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Substitutes every placeholder from `identity`.
    pub fn render(&self, identity: &IdentityContext) -> Result<String, RenderError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = identity.get(name).ok_or_else(|| RenderError::MissingContext {
                        attribute: name.clone(),
                    })?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> IdentityContext {
        IdentityContext::new("u1")
            .with_attribute("appId", "1")
            .with_attribute("unitId", 5_i64)
            .with_attribute("suffix", "_READ")
    }

    #[test]
    fn test_render_placeholders() {
        let template = Template::parse("APP{appId}_UNIT{unitId}{suffix}").unwrap();
        assert_eq!(template.render(&ctx()).unwrap(), "APP1_UNIT5_READ");
    }

    #[test]
    fn test_references() {
        let template = Template::parse("{a}-{b}-{a}").unwrap();
        let refs: Vec<String> = template.references().into_iter().collect();
        assert_eq!(refs, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_static_template() {
        let template = Template::parse("GLOBAL_ADMIN").unwrap();
        assert!(template.references().is_empty());
        assert_eq!(template.render(&ctx()).unwrap(), "GLOBAL_ADMIN");
    }

    #[test]
    fn test_escaped_braces() {
        let template = Template::parse("{{literal}}_{unitId}").unwrap();
        assert_eq!(template.render(&ctx()).unwrap(), "{literal}_5");
    }

    #[test]
    fn test_missing_attribute_is_error() {
        let template = Template::parse("UNIT{missing}").unwrap();
        assert_eq!(
            template.render(&ctx()),
            Err(RenderError::MissingContext {
                attribute: "missing".to_string()
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Template::parse("").is_err());
        assert!(Template::parse("APP{appId").is_err());
        assert!(Template::parse("APP}").is_err());
        assert!(Template::parse("APP{}").is_err());
        assert!(Template::parse("APP{app id}").is_err());
        assert!(Template::parse("APP{1app}").is_err());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("unitId"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("9lives"));
        assert!(!is_identifier("a.b"));
    }
}
