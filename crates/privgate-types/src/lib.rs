//! # privgate-types: Core types for `privgate`
//!
//! This crate contains the vocabulary shared by the decision engine and its
//! configuration layer:
//! - Request sources ([`Source`], [`SourceOrder`], [`ParamLocation`])
//! - Attribute typing ([`AttributeKind`], [`AttributeValue`])
//! - Token rendering modes ([`RenderMode`])

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Source - Copy (where an attribute value can come from)
// ============================================================================

/// A place in the request from which an attribute value can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// An explicit, named argument of the protected operation.
    Argument,
    /// A declared query-parameter binding.
    Query,
    /// A declared path-segment binding.
    Path,
    /// A named field of the structured request payload.
    Body,
    /// An ambient request header.
    Header,
}

impl Source {
    /// All sources, in the default resolution order.
    pub const ALL: [Source; 5] = [
        Source::Argument,
        Source::Query,
        Source::Path,
        Source::Body,
        Source::Header,
    ];

    /// Returns the lowercase name used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Argument => "argument",
            Self::Query => "query",
            Self::Path => "path",
            Self::Body => "body",
            Self::Header => "header",
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "argument" | "arg" => Ok(Self::Argument),
            "query" => Ok(Self::Query),
            "path" => Ok(Self::Path),
            "body" => Ok(Self::Body),
            "header" => Ok(Self::Header),
            _ => Err(TypesError::UnknownSource(s.to_string())),
        }
    }
}

// ============================================================================
// SourceOrder - the precedence in which sources are consulted
// ============================================================================

/// Ordered, duplicate-free list of sources consulted during resolution.
///
/// A value present in an earlier source masks any value present in a later
/// one. The default order is argument → query → path → body → header.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Source>", into = "Vec<Source>")]
pub struct SourceOrder(Vec<Source>);

impl SourceOrder {
    /// Creates a source order, rejecting empty lists and repeated sources.
    pub fn new(sources: Vec<Source>) -> Result<Self, TypesError> {
        if sources.is_empty() {
            return Err(TypesError::EmptySourceOrder);
        }
        for (i, source) in sources.iter().enumerate() {
            if sources[..i].contains(source) {
                return Err(TypesError::DuplicateSource(*source));
            }
        }
        Ok(Self(sources))
    }

    /// Returns the sources in precedence order.
    pub fn as_slice(&self) -> &[Source] {
        &self.0
    }

    /// Iterates over the sources in precedence order.
    pub fn iter(&self) -> impl Iterator<Item = Source> + '_ {
        self.0.iter().copied()
    }
}

impl Default for SourceOrder {
    fn default() -> Self {
        Self(Source::ALL.to_vec())
    }
}

impl TryFrom<Vec<Source>> for SourceOrder {
    type Error = TypesError;

    fn try_from(sources: Vec<Source>) -> Result<Self, Self::Error> {
        Self::new(sources)
    }
}

impl From<SourceOrder> for Vec<Source> {
    fn from(order: SourceOrder) -> Self {
        order.0
    }
}

impl Display for SourceOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|s| s.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for SourceOrder {
    type Err = TypesError;

    /// Parses a comma-separated list such as `"header,query"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sources = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Source::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(sources)
    }
}

/// Location of a declared request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    /// Query string parameter.
    Query,
    /// Path template segment.
    Path,
}

// ============================================================================
// Attribute typing
// ============================================================================

/// The declared type of a scope attribute.
///
/// Integer attributes opportunistically coerce string inputs; a value that
/// does not parse is treated as absent from that source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeKind {
    /// Free-form text (default).
    #[default]
    Text,
    /// Signed 64-bit integer.
    Integer,
}

/// A resolved attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Integer value.
    Integer(i64),
    /// Text value.
    Text(String),
}

impl AttributeValue {
    /// Converts this value to `kind`, or returns `None` if it cannot be coerced.
    ///
    /// Text → integer parses the trimmed string. Integer → text always succeeds.
    pub fn coerce(self, kind: AttributeKind) -> Option<Self> {
        match (self, kind) {
            (Self::Integer(n), AttributeKind::Integer) => Some(Self::Integer(n)),
            (Self::Integer(n), AttributeKind::Text) => Some(Self::Text(n.to_string())),
            (Self::Text(s), AttributeKind::Integer) => s.trim().parse().ok().map(Self::Integer),
            (Self::Text(s), AttributeKind::Text) => Some(Self::Text(s)),
        }
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ============================================================================
// RenderMode - Copy (explicit token rendering strategy)
// ============================================================================

/// How a required-permission spec turns attributes into token strings.
///
/// The mode is always declared, never inferred from the template text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Direct `{name}` placeholder substitution (default).
    #[default]
    Literal,
    /// Sandboxed concatenation expression over resolved attributes.
    Expression,
}

impl Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => write!(f, "literal"),
            Self::Expression => write!(f, "expression"),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error raised while parsing or constructing shared types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    #[error("unknown source '{0}' (expected argument, query, path, body or header)")]
    UnknownSource(String),

    #[error("source order must name at least one source")]
    EmptySourceOrder,

    #[error("source '{0}' appears more than once in the source order")]
    DuplicateSource(Source),
}

#[cfg(test)]
mod tests;
