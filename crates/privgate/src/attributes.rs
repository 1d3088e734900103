//! Identity context: the principal and the scope attributes resolved for one decision.
//!
//! An [`IdentityContext`] is built per invocation, either by the engine from a
//! request or explicitly by the caller, and is discarded once the decision
//! completes. It is never persisted or shared between decisions.

use std::collections::BTreeMap;
use std::fmt;

use privgate_types::{AttributeValue, Source};
use serde::{Deserialize, Serialize};

// ============================================================================
// Provenance
// ============================================================================

/// Where a resolved attribute value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Read from a request source.
    Source(Source),
    /// A process-wide constant such as the application identifier.
    Constant,
    /// Supplied directly by the caller that built the context.
    Supplied,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source(source) => write!(f, "{source}"),
            Self::Constant => f.write_str("constant"),
            Self::Supplied => f.write_str("supplied"),
        }
    }
}

/// An attribute value together with the source that satisfied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAttribute {
    pub value: AttributeValue,
    pub provenance: Provenance,
}

impl ResolvedAttribute {
    pub fn new(value: AttributeValue, provenance: Provenance) -> Self {
        Self { value, provenance }
    }
}

// ============================================================================
// IdentityContext
// ============================================================================

/// The caller identity and scope attributes driving a single decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    principal: String,
    attributes: BTreeMap<String, ResolvedAttribute>,
}

impl IdentityContext {
    /// Creates a context for `principal` with no scope attributes.
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a caller-supplied attribute (builder pattern).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(
            name.into(),
            ResolvedAttribute::new(value.into(), Provenance::Supplied),
        );
        self
    }

    /// Records a resolved attribute, replacing any earlier value under `name`.
    pub fn insert(&mut self, name: impl Into<String>, attribute: ResolvedAttribute) {
        self.attributes.insert(name.into(), attribute);
    }

    /// The principal identifier.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Returns true when the principal is non-blank.
    pub fn has_principal(&self) -> bool {
        !self.principal.trim().is_empty()
    }

    /// Returns the value of `name`, if resolved.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name).map(|a| &a.value)
    }

    /// Returns where `name` was resolved from.
    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.attributes.get(name).map(|a| a.provenance)
    }

    /// Returns true if `name` has a value.
    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Iterates over attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &ResolvedAttribute)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of resolved attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
