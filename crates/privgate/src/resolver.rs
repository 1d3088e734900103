//! Multi-source attribute resolution with ordered fallback.
//!
//! Each policy attribute carries an [`AttributeBinding`]: the name it goes by
//! in every request source it may come from. The [`IdentityResolver`] walks
//! the configured [`SourceOrder`] and returns the first value present.
//!
//! Resolution never fails. A missing attribute is `None`, and the caller
//! decides how severe that is.

use privgate_config::{BindingDefinition, SourceNames};
use privgate_types::{AttributeKind, AttributeValue, ParamLocation, Source, SourceOrder};
use serde_json::Value;
use tracing::{debug, trace};

use crate::attributes::{Provenance, ResolvedAttribute};
use crate::request::RequestContext;

// ============================================================================
// AttributeBinding
// ============================================================================

/// Declared location of one attribute in each request source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBinding {
    name: String,
    kind: AttributeKind,
    argument: Option<String>,
    query: Option<String>,
    path: Option<String>,
    body: Option<String>,
    header: Option<String>,
}

impl AttributeBinding {
    /// Creates a text binding with no sources; add them with the `from_*` methods.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Text,
            argument: None,
            query: None,
            path: None,
            body: None,
            header: None,
        }
    }

    /// Creates a binding that reads the same name from every source.
    pub fn uniform(name: impl Into<String>) -> Self {
        let name = name.into();
        let names = SourceNames::uniform(&name);
        Self::with_names(name, &names)
    }

    /// Builds a binding from its configuration form.
    ///
    /// A definition that names no source at all reads its own name everywhere.
    pub fn from_definition(definition: &BindingDefinition) -> Self {
        let binding = if definition.sources.is_empty() {
            Self::uniform(&definition.name)
        } else {
            Self::with_names(&definition.name, &definition.sources)
        };
        binding.with_kind(definition.kind)
    }

    /// Builds a binding from per-source names.
    pub fn with_names(name: impl Into<String>, names: &SourceNames) -> Self {
        Self {
            name: name.into(),
            kind: AttributeKind::Text,
            argument: names.argument.clone(),
            query: names.query.clone(),
            path: names.path.clone(),
            body: names.body.clone(),
            header: names.header.clone(),
        }
    }

    pub fn with_kind(mut self, kind: AttributeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks the attribute as numeric.
    pub fn integer(self) -> Self {
        self.with_kind(AttributeKind::Integer)
    }

    pub fn from_argument(mut self, name: impl Into<String>) -> Self {
        self.argument = Some(name.into());
        self
    }

    pub fn from_query(mut self, name: impl Into<String>) -> Self {
        self.query = Some(name.into());
        self
    }

    pub fn from_path(mut self, name: impl Into<String>) -> Self {
        self.path = Some(name.into());
        self
    }

    /// Reads a body field by dotted path or JSON pointer.
    pub fn from_body(mut self, field: impl Into<String>) -> Self {
        self.body = Some(field.into());
        self
    }

    pub fn from_header(mut self, name: impl Into<String>) -> Self {
        self.header = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    /// The name under which this attribute appears in `source`, if it is read from there.
    pub fn source_name(&self, source: Source) -> Option<&str> {
        match source {
            Source::Argument => self.argument.as_deref(),
            Source::Query => self.query.as_deref(),
            Source::Path => self.path.as_deref(),
            Source::Body => self.body.as_deref(),
            Source::Header => self.header.as_deref(),
        }
    }

    /// Returns true if at least one source is declared.
    pub fn has_sources(&self) -> bool {
        Source::ALL.iter().any(|s| self.source_name(*s).is_some())
    }

    /// Returns true if `order` visits at least one declared source.
    pub fn is_reachable(&self, order: &SourceOrder) -> bool {
        order.iter().any(|s| self.source_name(s).is_some())
    }
}

// ============================================================================
// IdentityResolver
// ============================================================================

/// Extracts attribute values from a request in source-precedence order.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    default_order: SourceOrder,
}

impl IdentityResolver {
    pub fn new(default_order: SourceOrder) -> Self {
        Self { default_order }
    }

    /// The deployment-wide order used when a policy does not override it.
    pub fn default_order(&self) -> &SourceOrder {
        &self.default_order
    }

    /// Resolves `binding` against `request`.
    ///
    /// Sources are tried in `order` (or the default order) and the first
    /// present, correctly typed value wins. A value that fails coercion to the
    /// binding's kind counts as absent from that source.
    pub fn resolve<R>(
        &self,
        binding: &AttributeBinding,
        order: Option<&SourceOrder>,
        request: &R,
    ) -> Option<ResolvedAttribute>
    where
        R: RequestContext + ?Sized,
    {
        let order = order.unwrap_or(&self.default_order);

        for source in order.iter() {
            let Some(location) = binding.source_name(source) else {
                continue;
            };
            let Some(raw) = read_source(request, source, location) else {
                trace!(attribute = %binding.name, %source, location, "not present");
                continue;
            };
            match raw.coerce(binding.kind) {
                Some(value) => {
                    trace!(attribute = %binding.name, %source, "resolved");
                    return Some(ResolvedAttribute::new(value, Provenance::Source(source)));
                }
                None => {
                    debug!(
                        attribute = %binding.name,
                        %source,
                        kind = ?binding.kind,
                        "value failed coercion; trying next source"
                    );
                }
            }
        }

        None
    }

    /// Resolves the principal id, skipping blank values.
    pub fn resolve_principal<R>(
        &self,
        binding: &AttributeBinding,
        order: Option<&SourceOrder>,
        request: &R,
    ) -> Option<String>
    where
        R: RequestContext + ?Sized,
    {
        let order = order.unwrap_or(&self.default_order);

        order.iter().find_map(|source| {
            let location = binding.source_name(source)?;
            let value = read_source(request, source, location)?.coerce(AttributeKind::Text)?;
            let principal = value.to_string();
            if principal.trim().is_empty() {
                debug!(%source, "blank principal; trying next source");
                None
            } else {
                Some(principal)
            }
        })
    }
}

fn read_source<R>(request: &R, source: Source, location: &str) -> Option<AttributeValue>
where
    R: RequestContext + ?Sized,
{
    match source {
        Source::Argument => request.argument(location),
        Source::Query => request
            .param(location, ParamLocation::Query)
            .map(AttributeValue::from),
        Source::Path => request
            .param(location, ParamLocation::Path)
            .map(AttributeValue::from),
        Source::Body => request.body_field(location).and_then(json_to_value),
        Source::Header => request.header(location).map(AttributeValue::from),
    }
}

/// 2^63, the first float outside `i64`.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Converts a JSON scalar into an attribute value. `null` is absent.
///
/// Integral numbers (`5`, `5.0`) become integers; anything else is text.
fn json_to_value(value: &Value) -> Option<AttributeValue> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(AttributeValue::Text(s.clone())),
        Value::Number(n) => Some(number_to_value(n)),
        other => Some(AttributeValue::Text(other.to_string())),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_value(n: &serde_json::Number) -> AttributeValue {
    if let Some(i) = n.as_i64() {
        return AttributeValue::Integer(i);
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && (-I64_LIMIT..I64_LIMIT).contains(&f) => {
            AttributeValue::Integer(f as i64)
        }
        _ => AttributeValue::Text(n.to_string()),
    }
}
