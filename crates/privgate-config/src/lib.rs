//! Configuration management for privgate
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (PRIVGATE_* prefix, `__` between nested keys)
//! 2. privgate.local.toml (gitignored, local overrides)
//! 3. privgate.toml (git-tracked, project config)
//! 4. ~/.config/privgate/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! Configuration is read once at startup. The application identifier in
//! particular is treated as a process-wide constant by the decision engine.

use anyhow::Result;
use privgate_types::{AttributeKind, RenderMode, Source, SourceOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main privgate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivgateConfig {
    pub application: ApplicationConfig,
    pub resolution: ResolutionConfig,
    pub cache: CacheConfig,
    pub policies: Vec<PolicyDefinition>,
}

/// Process-wide application identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application identifier, exposed to every decision as a constant attribute.
    pub id: Option<String>,
    /// Attribute name under which `id` is exposed.
    pub attribute: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            id: None,
            attribute: "appId".to_string(),
        }
    }
}

/// Deployment-wide attribute resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Default source precedence, overridable per policy.
    pub order: SourceOrder,
    /// Where the principal id is read from.
    pub principal: SourceNames,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            order: SourceOrder::default(),
            principal: SourceNames {
                header: Some("userId".to_string()),
                ..SourceNames::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Deadline for a single privilege lookup, in milliseconds. `None` disables it.
    pub timeout_ms: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Some(500),
        }
    }
}

/// Per-source names under which one attribute appears in a request.
///
/// A `None` entry means the attribute is never read from that source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceNames {
    pub argument: Option<String>,
    pub query: Option<String>,
    pub path: Option<String>,
    /// Dotted path (`unit.id`) or JSON pointer (`/unit/id`) into the body.
    pub body: Option<String>,
    pub header: Option<String>,
}

impl SourceNames {
    /// Returns names for an attribute read under the same name from every source.
    pub fn uniform(name: &str) -> Self {
        Self {
            argument: Some(name.to_string()),
            query: Some(name.to_string()),
            path: Some(name.to_string()),
            body: Some(name.to_string()),
            header: Some(name.to_string()),
        }
    }

    /// The name declared for `source`, if any.
    pub fn get(&self, source: Source) -> Option<&str> {
        match source {
            Source::Argument => self.argument.as_deref(),
            Source::Query => self.query.as_deref(),
            Source::Path => self.path.as_deref(),
            Source::Body => self.body.as_deref(),
            Source::Header => self.header.as_deref(),
        }
    }

    /// Returns true if no source is declared.
    pub fn is_empty(&self) -> bool {
        self.argument.is_none()
            && self.query.is_none()
            && self.path.is_none()
            && self.body.is_none()
            && self.header.is_none()
    }
}

/// Declared binding of a policy attribute to request locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingDefinition {
    pub name: String,
    #[serde(default)]
    pub kind: AttributeKind,
    /// Source names; when every entry is omitted the attribute name is used everywhere.
    #[serde(flatten)]
    pub sources: SourceNames,
}

/// One alternative required-permission template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDefinition {
    #[serde(default)]
    pub mode: RenderMode,
    pub template: String,
}

/// Declarative policy attached to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub operation: String,
    #[serde(default)]
    pub order: Option<SourceOrder>,
    #[serde(default)]
    pub principal: Option<SourceNames>,
    #[serde(default)]
    pub bindings: Vec<BindingDefinition>,
    #[serde(default)]
    pub specs: Vec<SpecDefinition>,
}

impl PrivgateConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Load a single TOML file, without layering.
    pub fn from_toml_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks settings that serde cannot express.
    ///
    /// Policy bodies (templates, bindings) are validated when they are
    /// registered with the engine; this only covers structural settings.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.application.attribute.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "application.attribute must not be empty".to_string(),
            ));
        }
        if self.cache.timeout_ms == Some(0) {
            return Err(ConfigError::ValidationError(
                "cache.timeout_ms must be positive; omit it to disable the deadline".to_string(),
            ));
        }
        if self.resolution.principal.is_empty() {
            return Err(ConfigError::ValidationError(
                "resolution.principal must declare at least one source".to_string(),
            ));
        }
        if !self
            .resolution
            .order
            .iter()
            .any(|source| self.resolution.principal.get(source).is_some())
        {
            return Err(ConfigError::ValidationError(format!(
                "resolution.principal declares no source in resolution.order ({})",
                self.resolution.order
            )));
        }

        let mut seen = HashSet::new();
        for policy in &self.policies {
            if !seen.insert(policy.operation.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "operation '{}' is declared more than once",
                    policy.operation
                )));
            }
        }
        Ok(())
    }

    /// Cache deadline as a `Duration`.
    pub fn cache_timeout(&self) -> Option<std::time::Duration> {
        self.cache.timeout_ms.map(std::time::Duration::from_millis)
    }
}
