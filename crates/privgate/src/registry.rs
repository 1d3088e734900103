//! Operation-to-policy registry.
//!
//! Policies are registered once at startup and looked up by operation id on
//! every decision. The registry knows which process-wide constants exist so
//! that it can reject policies referencing attributes nothing will supply.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use privgate_config::{PolicyDefinition, PrivgateConfig};
use tracing::debug;

use crate::error::ConfigurationError;
use crate::policy::{PolicyBuilder, PolicyDescriptor};

/// Immutable-after-startup map of protected operations.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    constants: BTreeSet<String>,
    policies: HashMap<String, Arc<PolicyDescriptor>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a constant attribute policies may reference without binding it.
    pub fn with_constant(mut self, name: impl Into<String>) -> Self {
        self.constants.insert(name.into());
        self
    }

    /// Starts a policy builder that already knows this registry's constants.
    pub fn policy(&self, operation: impl Into<String>) -> PolicyBuilder {
        PolicyDescriptor::builder(operation).constants(self.constants.iter().cloned())
    }

    /// Registers `policy` under its operation id.
    pub fn register(&mut self, policy: PolicyDescriptor) -> Result<(), ConfigurationError> {
        policy.validate_against(&self.constants)?;
        if self.policies.contains_key(policy.operation()) {
            return Err(ConfigurationError::DuplicateOperation(
                policy.operation().to_string(),
            ));
        }
        debug!(
            operation = policy.operation(),
            specs = policy.specs().len(),
            "registered policy"
        );
        self.policies
            .insert(policy.operation().to_string(), Arc::new(policy));
        Ok(())
    }

    pub fn get(&self, operation: &str) -> Option<Arc<PolicyDescriptor>> {
        self.policies.get(operation).cloned()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Registered operation ids, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let mut ops: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        ops.sort_unstable();
        ops
    }

    /// Builds a registry from declarative policy definitions.
    pub fn from_definitions<'a>(
        definitions: impl IntoIterator<Item = &'a PolicyDefinition>,
        constants: impl IntoIterator<Item = String>,
    ) -> Result<Self, ConfigurationError> {
        let mut registry = Self::new();
        registry.constants.extend(constants);
        for definition in definitions {
            let policy = PolicyDescriptor::from_definition(definition, &registry.constants)?;
            registry.register(policy)?;
        }
        Ok(registry)
    }

    /// Builds a registry from every `[[policies]]` table in `config`.
    ///
    /// The application attribute is a constant only when an application id is set.
    pub fn from_config(config: &PrivgateConfig) -> Result<Self, ConfigurationError> {
        let constants = config
            .application
            .id
            .as_ref()
            .map(|_| config.application.attribute.clone());
        Self::from_definitions(&config.policies, constants)
    }
}
