//! The decision engine.
//!
//! Runs the pipeline `ResolvingIdentity → ResolvingContext →
//! FetchingPrivileges → Evaluating` for one invocation of a protected
//! operation. Every failure short-circuits to a denial; nothing is retried and
//! nothing is cached between decisions.

use std::collections::BTreeMap;
use std::time::Duration;

use privgate_config::PrivgateConfig;
use privgate_types::{AttributeValue, SourceOrder};
use tracing::{debug, info, warn};

use crate::attributes::{IdentityContext, Provenance, ResolvedAttribute};
use crate::decision::{Decision, DenyReason, PrivilegeLookup, Stage};
use crate::error::{CacheError, ConfigurationError, RenderError};
use crate::policy::PolicyDescriptor;
use crate::privilege::{PrivilegeCache, PrivilegeSet};
use crate::registry::PolicyRegistry;
use crate::request::RequestContext;
use crate::resolver::{AttributeBinding, IdentityResolver};
use crate::token::PermissionTokenBuilder;

/// Default deadline for a privilege lookup.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(500);

/// Deployment-wide engine settings.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Source precedence used by policies that do not override it.
    pub default_order: SourceOrder,
    /// Where the principal id is read from.
    pub principal: AttributeBinding,
    /// Process-wide attributes, available to every policy.
    pub constants: BTreeMap<String, AttributeValue>,
    /// Deadline for the privilege lookup. `None` waits indefinitely.
    pub cache_timeout: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_order: SourceOrder::default(),
            principal: AttributeBinding::new("principal").from_header("userId"),
            constants: BTreeMap::new(),
            cache_timeout: Some(DEFAULT_CACHE_TIMEOUT),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &PrivgateConfig) -> Self {
        let mut constants = BTreeMap::new();
        if let Some(id) = &config.application.id {
            constants.insert(
                config.application.attribute.clone(),
                AttributeValue::from(id.as_str()),
            );
        }
        Self {
            default_order: config.resolution.order.clone(),
            principal: AttributeBinding::with_names("principal", &config.resolution.principal),
            constants,
            cache_timeout: config.cache_timeout(),
        }
    }

    /// Adds a process-wide constant attribute.
    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.constants.insert(name.into(), value.into());
        self
    }

    pub fn with_cache_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cache_timeout = timeout;
        self
    }

    pub fn with_principal(mut self, binding: AttributeBinding) -> Self {
        self.principal = binding;
        self
    }

    pub fn with_default_order(mut self, order: SourceOrder) -> Self {
        self.default_order = order;
        self
    }
}

/// Authorization decision engine.
///
/// Holds no mutable state; one engine serves any number of concurrent
/// decisions.
#[derive(Debug)]
pub struct DecisionEngine<C> {
    cache: C,
    resolver: IdentityResolver,
    tokens: PermissionTokenBuilder,
    settings: EngineSettings,
    audit_enabled: bool,
}

impl<C: PrivilegeCache> DecisionEngine<C> {
    pub fn new(cache: C, settings: EngineSettings) -> Self {
        Self {
            cache,
            resolver: IdentityResolver::new(settings.default_order.clone()),
            tokens: PermissionTokenBuilder::new(),
            settings,
            audit_enabled: true,
        }
    }

    /// Disables audit logging (for testing).
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Resolves the principal and every attribute `policy` references.
    ///
    /// Constants take precedence over request values. All missing attributes
    /// are reported together, sorted by name.
    pub fn build_identity<R>(
        &self,
        policy: &PolicyDescriptor,
        request: &R,
    ) -> Result<IdentityContext, DenyReason>
    where
        R: RequestContext + ?Sized,
    {
        let order = policy.order();
        // A policy's order only governs the principal when it also binds it.
        let (principal_binding, principal_order) = match policy.principal() {
            Some(binding) => (binding, order),
            None => (&self.settings.principal, None),
        };

        let principal = self
            .resolver
            .resolve_principal(principal_binding, principal_order, request)
            .ok_or(DenyReason::MissingIdentity)?;

        let mut identity = IdentityContext::new(principal);
        let mut missing = Vec::new();

        for attribute in policy.referenced_attributes() {
            if let Some(value) = self.settings.constants.get(attribute) {
                identity.insert(
                    attribute,
                    ResolvedAttribute::new(value.clone(), Provenance::Constant),
                );
                continue;
            }
            let resolved = policy
                .binding(attribute)
                .and_then(|binding| self.resolver.resolve(binding, order, request));
            match resolved {
                Some(resolved) => identity.insert(attribute, resolved),
                None => missing.push(attribute.to_string()),
            }
        }

        if missing.is_empty() {
            Ok(identity)
        } else {
            Err(DenyReason::MissingContext(missing))
        }
    }

    /// Decides whether `request` may invoke the operation guarded by `policy`.
    pub async fn decide<R>(&self, policy: &PolicyDescriptor, request: &R) -> Decision
    where
        R: RequestContext + ?Sized,
    {
        match self.build_identity(policy, request) {
            Ok(identity) => self.conclude(policy, &identity).await,
            Err(reason) => {
                let stage = match reason {
                    DenyReason::MissingIdentity => Stage::ResolvingIdentity,
                    _ => Stage::ResolvingContext,
                };
                let decision = Decision::deny(reason, stage);
                self.audit(policy.operation(), None, &decision);
                decision
            }
        }
    }

    /// Decides for a caller-built identity context.
    ///
    /// Constants replace whatever the context carries under the same name; any
    /// other referenced attribute it lacks denies the request before the store
    /// is consulted.
    pub async fn evaluate(&self, policy: &PolicyDescriptor, identity: &IdentityContext) -> Decision {
        if !identity.has_principal() {
            let decision = Decision::deny(DenyReason::MissingIdentity, Stage::ResolvingIdentity);
            self.audit(policy.operation(), None, &decision);
            return decision;
        }

        let mut identity = identity.clone();
        let mut missing = Vec::new();
        for attribute in policy.referenced_attributes() {
            if let Some(value) = self.settings.constants.get(attribute) {
                identity.insert(
                    attribute,
                    ResolvedAttribute::new(value.clone(), Provenance::Constant),
                );
            } else if !identity.contains(attribute) {
                missing.push(attribute.to_string());
            }
        }

        if !missing.is_empty() {
            let decision = Decision::deny(DenyReason::MissingContext(missing), Stage::ResolvingContext);
            self.audit(policy.operation(), Some(identity.principal()), &decision);
            return decision;
        }

        self.conclude(policy, &identity).await
    }

    /// Looks up the policy for `operation` and decides.
    pub async fn decide_operation<R>(
        &self,
        registry: &PolicyRegistry,
        operation: &str,
        request: &R,
    ) -> Decision
    where
        R: RequestContext + ?Sized,
    {
        match registry.get(operation) {
            Some(policy) => self.decide(&policy, request).await,
            None => {
                let decision = Decision::deny(
                    DenyReason::ConfigurationError(ConfigurationError::UnknownOperation(
                        operation.to_string(),
                    )),
                    Stage::Init,
                );
                self.audit(operation, None, &decision);
                decision
            }
        }
    }

    /// Fetches privileges and evaluates the rendered tokens against them.
    async fn conclude(&self, policy: &PolicyDescriptor, identity: &IdentityContext) -> Decision {
        let principal = identity.principal();

        let decision = match self.fetch(principal).await {
            Err(e) => Decision::deny(DenyReason::CacheUnavailable(e), Stage::FetchingPrivileges),
            Ok(None) => Decision::deny(
                DenyReason::NoPrivileges {
                    lookup: PrivilegeLookup::Missing,
                },
                Stage::FetchingPrivileges,
            ),
            Ok(Some(set)) if set.is_empty() => Decision::deny(
                DenyReason::NoPrivileges {
                    lookup: PrivilegeLookup::Empty,
                },
                Stage::FetchingPrivileges,
            ),
            Ok(Some(set)) => self.match_tokens(policy, identity, &set),
        };

        self.audit(policy.operation(), Some(principal), &decision);
        decision
    }

    fn match_tokens(
        &self,
        policy: &PolicyDescriptor,
        identity: &IdentityContext,
        held: &PrivilegeSet,
    ) -> Decision {
        let required = match self.tokens.render_all(policy.specs(), identity) {
            Ok(tokens) => tokens,
            Err(RenderError::MissingContext { attribute }) => {
                return Decision::deny(DenyReason::MissingContext(vec![attribute]), Stage::Evaluating);
            }
        };

        let matched = required.iter().find(|token| held.contains(token)).cloned();
        match matched {
            Some(token) => Decision::allow(token, required),
            None => Decision::deny(
                DenyReason::InsufficientPrivilege {
                    required: required.clone(),
                    held_count: held.len(),
                },
                Stage::Evaluating,
            )
            .with_evaluated(required),
        }
    }

    async fn fetch(&self, principal: &str) -> Result<Option<PrivilegeSet>, CacheError> {
        let lookup = self.cache.get(principal);
        match self.settings.cache_timeout {
            Some(limit) => match tokio::time::timeout(limit, lookup).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(principal, ?limit, "privilege lookup timed out");
                    Err(CacheError::Timeout(limit))
                }
            },
            None => lookup.await,
        }
    }

    fn audit(&self, operation: &str, principal: Option<&str>, decision: &Decision) {
        if !self.audit_enabled {
            return;
        }
        let principal = principal.unwrap_or("-");
        match (decision.granted_token(), decision.deny_reason()) {
            (Some(token), _) => info!(
                operation,
                principal,
                token,
                "Access granted"
            ),
            (None, Some(reason)) => warn!(
                operation,
                principal,
                reason = reason.code(),
                detail = %reason,
                stage = %decision.stage(),
                "Access denied"
            ),
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privilege::InMemoryPrivilegeCache;
    use crate::request::StaticRequest;
    use privgate_types::Source;

    fn policy() -> PolicyDescriptor {
        PolicyDescriptor::builder("units.read")
            .bind(AttributeBinding::uniform("unitId").integer())
            .require_literal("APP{appId}_UNIT{unitId}_READ")
            .constants(["appId".to_string()])
            .build()
            .unwrap()
    }

    fn engine(entries: Vec<(&str, Vec<&str>)>) -> DecisionEngine<InMemoryPrivilegeCache> {
        let cache = InMemoryPrivilegeCache::with_entries(entries).unwrap();
        let settings = EngineSettings::default().with_constant("appId", "1");
        DecisionEngine::new(cache, settings).without_audit()
    }

    #[test]
    fn test_build_identity_records_provenance() {
        let engine = engine(vec![]);
        let request = StaticRequest::new()
            .with_header("userId", "u1")
            .with_query("unitId", "5")
            .with_query("appId", "999");

        let identity = engine.build_identity(&policy(), &request).unwrap();
        assert_eq!(identity.principal(), "u1");
        assert_eq!(identity.get("appId"), Some(&AttributeValue::from("1")));
        assert_eq!(identity.provenance("appId"), Some(Provenance::Constant));
        assert_eq!(identity.get("unitId"), Some(&AttributeValue::Integer(5)));
        assert_eq!(
            identity.provenance("unitId"),
            Some(Provenance::Source(Source::Query))
        );
    }

    #[test]
    fn test_build_identity_reports_all_missing_sorted() {
        let policy = PolicyDescriptor::builder("op")
            .bind(AttributeBinding::uniform("zone"))
            .bind(AttributeBinding::uniform("unitId"))
            .require_literal("{zone}_{unitId}")
            .build()
            .unwrap();
        let request = StaticRequest::new().with_header("userId", "u1");

        let err = engine(vec![]).build_identity(&policy, &request).unwrap_err();
        assert_eq!(
            err,
            DenyReason::MissingContext(vec!["unitId".to_string(), "zone".to_string()])
        );
    }

    #[tokio::test]
    async fn test_allow_records_matched_token() {
        let engine = engine(vec![("u1", vec!["APP1_UNIT5_READ"])]);
        let request = StaticRequest::new()
            .with_header("userId", "u1")
            .with_path("unitId", "5");

        let decision = engine.decide(&policy(), &request).await;
        assert!(decision.is_allowed());
        assert_eq!(decision.granted_token(), Some("APP1_UNIT5_READ"));
        assert_eq!(decision.stage(), Stage::Evaluating);
        assert_eq!(decision.evaluated_tokens(), ["APP1_UNIT5_READ".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_and_empty_privileges_are_distinguished() {
        let engine = engine(vec![("empty", vec![])]);

        for (principal, lookup) in [
            ("nobody", PrivilegeLookup::Missing),
            ("empty", PrivilegeLookup::Empty),
        ] {
            let identity = IdentityContext::new(principal).with_attribute("unitId", 5_i64);
            let decision = engine.evaluate(&policy(), &identity).await;
            assert_eq!(
                decision.deny_reason(),
                Some(&DenyReason::NoPrivileges { lookup })
            );
            assert_eq!(decision.stage(), Stage::FetchingPrivileges);
        }
    }

    #[tokio::test]
    async fn test_evaluate_fills_constants_and_checks_context() {
        let engine = engine(vec![("u1", vec!["APP1_UNIT5_READ"])]);

        let identity = IdentityContext::new("u1").with_attribute("unitId", 5_i64);
        assert!(engine.evaluate(&policy(), &identity).await.is_allowed());

        let identity = IdentityContext::new("u1");
        let decision = engine.evaluate(&policy(), &identity).await;
        assert_eq!(
            decision.deny_reason(),
            Some(&DenyReason::MissingContext(vec!["unitId".to_string()]))
        );

        let identity = IdentityContext::new(" ").with_attribute("unitId", 5_i64);
        let decision = engine.evaluate(&policy(), &identity).await;
        assert_eq!(decision.deny_reason(), Some(&DenyReason::MissingIdentity));
    }

    #[tokio::test]
    async fn test_evaluate_constants_override_supplied_values() {
        let engine = engine(vec![("u1", vec!["APP2_UNIT5_READ"])]);
        let identity = IdentityContext::new("u1")
            .with_attribute("appId", "2")
            .with_attribute("unitId", 5_i64);

        let decision = engine.evaluate(&policy(), &identity).await;
        assert_eq!(
            decision.deny_reason(),
            Some(&DenyReason::InsufficientPrivilege {
                required: vec!["APP1_UNIT5_READ".to_string()],
                held_count: 1,
            })
        );
        assert_eq!(decision.evaluated_tokens(), ["APP1_UNIT5_READ".to_string()]);
    }

    #[tokio::test]
    async fn test_order_override_keeps_deployment_principal() {
        let engine = engine(vec![("u1", vec!["APP1_UNIT5_READ"])]);
        let policy = PolicyDescriptor::builder("units.read")
            .order(SourceOrder::new(vec![Source::Path]).unwrap())
            .bind(AttributeBinding::uniform("unitId").integer())
            .require_literal("APP{appId}_UNIT{unitId}_READ")
            .constants(["appId".to_string()])
            .build()
            .unwrap();
        let request = StaticRequest::new()
            .with_header("userId", "u1")
            .with_path("unitId", "5")
            .with_query("unitId", "9");

        let decision = engine.decide(&policy, &request).await;
        assert!(decision.is_allowed());
        assert_eq!(decision.granted_token(), Some("APP1_UNIT5_READ"));
    }

    #[tokio::test]
    async fn test_policy_principal_follows_policy_order() {
        let engine = engine(vec![("u1", vec!["APP1_UNIT5_READ"])]);
        let policy = PolicyDescriptor::builder("units.read")
            .order(SourceOrder::new(vec![Source::Path, Source::Argument]).unwrap())
            .principal(
                AttributeBinding::new("principal")
                    .from_argument("userId")
                    .from_header("userId"),
            )
            .bind(AttributeBinding::uniform("unitId").integer())
            .require_literal("APP{appId}_UNIT{unitId}_READ")
            .constants(["appId".to_string()])
            .build()
            .unwrap();

        // Header is outside the policy's order.
        let request = StaticRequest::new()
            .with_header("userId", "u1")
            .with_path("unitId", "5");
        let decision = engine.decide(&policy, &request).await;
        assert_eq!(decision.deny_reason(), Some(&DenyReason::MissingIdentity));

        let request = request.with_argument("userId", "u1");
        assert!(engine.decide(&policy, &request).await.is_allowed());
    }

    #[tokio::test]
    async fn test_unknown_operation_is_denied() {
        let engine = engine(vec![]);
        let registry = PolicyRegistry::new();
        let decision = engine
            .decide_operation(&registry, "units.delete", &StaticRequest::new())
            .await;

        assert_eq!(decision.stage(), Stage::Init);
        assert_eq!(
            decision.deny_reason(),
            Some(&DenyReason::ConfigurationError(
                ConfigurationError::UnknownOperation("units.delete".to_string())
            ))
        );
    }

    #[tokio::test]
    async fn test_policy_principal_override() {
        let policy = PolicyDescriptor::builder("op")
            .principal(AttributeBinding::new("principal").from_argument("caller"))
            .require_literal("ADMIN")
            .build()
            .unwrap();
        let engine = engine(vec![("u7", vec!["ADMIN"])]);

        let request = StaticRequest::new().with_argument("caller", "u7");
        assert!(engine.decide(&policy, &request).await.is_allowed());

        // The deployment-wide header binding is not consulted
        let request = StaticRequest::new().with_header("userId", "u7");
        let decision = engine.decide(&policy, &request).await;
        assert_eq!(decision.deny_reason(), Some(&DenyReason::MissingIdentity));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = PrivgateConfig::default();
        config.application.id = Some("42".to_string());
        config.cache.timeout_ms = None;

        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.constants.get("appId"), Some(&AttributeValue::from("42")));
        assert_eq!(settings.cache_timeout, None);
        assert_eq!(
            settings.principal.source_name(Source::Header),
            Some("userId")
        );
    }
}
