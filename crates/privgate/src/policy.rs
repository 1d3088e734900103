//! Policy definitions.
//!
//! A [`PolicyDescriptor`] attaches a required-privilege policy to one
//! operation: a non-empty list of alternative [`RequiredPermissionSpec`]s (any
//! one suffices), plus the declared [`AttributeBinding`]s those specs read.
//! Descriptors are built and validated once, at registration time, and are
//! immutable afterwards.

use std::collections::{BTreeSet, HashSet};

use privgate_config::PolicyDefinition;
use privgate_types::{RenderMode, SourceOrder};

use crate::error::ConfigurationError;
use crate::expression::Expression;
use crate::resolver::AttributeBinding;
use crate::template::Template;

// ============================================================================
// RequiredPermissionSpec
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Compiled {
    Literal(Template),
    Expression(Expression),
}

/// One alternative way of satisfying a policy.
///
/// The rendering mode is declared by the constructor used, never inferred from
/// the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredPermissionSpec {
    source: String,
    mode: RenderMode,
    references: BTreeSet<String>,
    pub(crate) compiled: Compiled,
}

impl RequiredPermissionSpec {
    /// Compiles `source` in the given mode.
    pub fn new(mode: RenderMode, source: impl Into<String>) -> Result<Self, ConfigurationError> {
        let source = source.into();
        let (compiled, references) = match mode {
            RenderMode::Literal => {
                let template = Template::parse(&source)?;
                let refs = template.references();
                (Compiled::Literal(template), refs)
            }
            RenderMode::Expression => {
                let expression = Expression::parse(&source)?;
                let refs = expression.references();
                (Compiled::Expression(expression), refs)
            }
        };
        Ok(Self {
            source,
            mode,
            references,
            compiled,
        })
    }

    /// A `{placeholder}` template.
    pub fn literal(source: impl Into<String>) -> Result<Self, ConfigurationError> {
        Self::new(RenderMode::Literal, source)
    }

    /// A sandboxed concatenation expression.
    pub fn expression(source: impl Into<String>) -> Result<Self, ConfigurationError> {
        Self::new(RenderMode::Expression, source)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Attribute names this spec reads.
    pub fn references(&self) -> &BTreeSet<String> {
        &self.references
    }
}

// ============================================================================
// PolicyDescriptor
// ============================================================================

/// The requirement attached to a protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDescriptor {
    operation: String,
    specs: Vec<RequiredPermissionSpec>,
    bindings: Vec<AttributeBinding>,
    order: Option<SourceOrder>,
    principal: Option<AttributeBinding>,
}

impl PolicyDescriptor {
    /// Starts building a policy for `operation`.
    pub fn builder(operation: impl Into<String>) -> PolicyBuilder {
        PolicyBuilder::new(operation)
    }

    /// Builds a policy from its configuration form.
    pub fn from_definition(
        definition: &PolicyDefinition,
        constants: &BTreeSet<String>,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = Self::builder(&definition.operation).constants(constants.iter().cloned());
        if let Some(order) = &definition.order {
            builder = builder.order(order.clone());
        }
        if let Some(names) = &definition.principal {
            builder = builder.principal(AttributeBinding::with_names("principal", names));
        }
        for binding in &definition.bindings {
            builder = builder.bind(AttributeBinding::from_definition(binding));
        }
        for spec in &definition.specs {
            builder = builder.require(RequiredPermissionSpec::new(spec.mode, &spec.template)?);
        }
        builder.build()
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Alternative specs, in declaration order.
    pub fn specs(&self) -> &[RequiredPermissionSpec] {
        &self.specs
    }

    pub fn bindings(&self) -> &[AttributeBinding] {
        &self.bindings
    }

    /// The binding declared for `name`.
    pub fn binding(&self, name: &str) -> Option<&AttributeBinding> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    /// Policy-level source order override.
    pub fn order(&self) -> Option<&SourceOrder> {
        self.order.as_ref()
    }

    /// Policy-level principal binding override.
    pub fn principal(&self) -> Option<&AttributeBinding> {
        self.principal.as_ref()
    }

    /// Every attribute referenced by any spec.
    pub fn referenced_attributes(&self) -> BTreeSet<&str> {
        self.specs
            .iter()
            .flat_map(|spec| spec.references().iter().map(String::as_str))
            .collect()
    }

    /// Checks that every referenced attribute is either bound or one of `constants`,
    /// and that no binding shadows a constant.
    pub fn validate_against(&self, constants: &BTreeSet<String>) -> Result<(), ConfigurationError> {
        for binding in &self.bindings {
            if constants.contains(binding.name()) {
                return Err(ConfigurationError::ShadowedConstant {
                    operation: self.operation.clone(),
                    attribute: binding.name().to_string(),
                });
            }
        }
        for attribute in self.referenced_attributes() {
            if self.binding(attribute).is_none() && !constants.contains(attribute) {
                return Err(ConfigurationError::UndeclaredAttribute {
                    operation: self.operation.clone(),
                    attribute: attribute.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// PolicyBuilder
// ============================================================================

/// Builder for [`PolicyDescriptor`]. All validation happens in [`build`](Self::build).
#[derive(Debug)]
pub struct PolicyBuilder {
    operation: String,
    specs: Vec<RequiredPermissionSpec>,
    bindings: Vec<AttributeBinding>,
    order: Option<SourceOrder>,
    principal: Option<AttributeBinding>,
    constants: BTreeSet<String>,
    error: Option<ConfigurationError>,
}

impl PolicyBuilder {
    fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            specs: Vec::new(),
            bindings: Vec::new(),
            order: None,
            principal: None,
            constants: BTreeSet::new(),
            error: None,
        }
    }

    /// Adds an alternative spec.
    pub fn require(mut self, spec: RequiredPermissionSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Adds an alternative literal template.
    pub fn require_literal(self, source: &str) -> Self {
        self.require_mode(RenderMode::Literal, source)
    }

    /// Adds an alternative expression.
    pub fn require_expression(self, source: &str) -> Self {
        self.require_mode(RenderMode::Expression, source)
    }

    fn require_mode(mut self, mode: RenderMode, source: &str) -> Self {
        match RequiredPermissionSpec::new(mode, source) {
            Ok(spec) => self.specs.push(spec),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Declares where an attribute is read from.
    pub fn bind(mut self, binding: AttributeBinding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// Overrides the source order for this policy.
    pub fn order(mut self, order: SourceOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Overrides where the principal id is read from.
    pub fn principal(mut self, binding: AttributeBinding) -> Self {
        self.principal = Some(binding);
        self
    }

    /// Names process-wide constant attributes the specs may reference unbound.
    pub fn constants(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.constants.extend(names);
        self
    }

    /// Validates and freezes the policy.
    pub fn build(self) -> Result<PolicyDescriptor, ConfigurationError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.operation.trim().is_empty() {
            return Err(ConfigurationError::EmptyOperation);
        }
        if self.specs.is_empty() {
            return Err(ConfigurationError::NoSpecs {
                operation: self.operation,
            });
        }

        let mut seen = HashSet::new();
        for binding in &self.bindings {
            if !seen.insert(binding.name()) {
                return Err(ConfigurationError::DuplicateBinding {
                    operation: self.operation.clone(),
                    attribute: binding.name().to_string(),
                });
            }
            if !binding.has_sources() {
                return Err(ConfigurationError::EmptyBinding(binding.name().to_string()));
            }
        }
        if let Some(principal) = &self.principal {
            if !principal.has_sources() {
                return Err(ConfigurationError::EmptyBinding(principal.name().to_string()));
            }
        }
        if let Some(order) = &self.order {
            let unreachable = self
                .principal
                .iter()
                .chain(&self.bindings)
                .find(|binding| !binding.is_reachable(order));
            if let Some(binding) = unreachable {
                return Err(ConfigurationError::UnreachableBinding {
                    operation: self.operation.clone(),
                    attribute: binding.name().to_string(),
                });
            }
        }

        let descriptor = PolicyDescriptor {
            operation: self.operation,
            specs: self.specs,
            bindings: self.bindings,
            order: self.order,
            principal: self.principal,
        };
        descriptor.validate_against(&self.constants)?;
        Ok(descriptor)
    }
}
