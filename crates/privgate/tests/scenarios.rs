//! End-to-end decision scenarios.
//!
//! Each test wires a registry, an engine and a privilege store together and
//! drives a request through `decide_operation`, the way a host interception
//! layer would.

use std::sync::Arc;
use std::time::Duration;

use privgate::{
    AttributeBinding, CacheError, DecisionEngine, DenyReason, EngineSettings,
    InMemoryPrivilegeCache, PolicyRegistry, PrivilegeCache, PrivilegeSet, Provenance, Source,
    Stage, StaticRequest,
};
use serde_json::json;

/// Registry with one policy: read access to a unit, or admin on it.
fn unit_registry() -> PolicyRegistry {
    let mut registry = PolicyRegistry::new().with_constant("appId");
    let policy = registry
        .policy("units.read")
        .bind(
            AttributeBinding::new("unitId")
                .from_argument("unitId")
                .from_query("unitId")
                .from_path("unit")
                .from_body("unit.id")
                .integer(),
        )
        .require_literal("APP{appId}_UNIT{unitId}_READ")
        .require_expression("'APP' + #appId + '_UNIT' + #unitId + '_ADMIN'")
        .build()
        .expect("policy is valid");
    registry.register(policy).expect("operation is unique");
    registry
}

fn settings() -> EngineSettings {
    EngineSettings::default().with_constant("appId", "1")
}

fn store() -> InMemoryPrivilegeCache {
    InMemoryPrivilegeCache::with_entries([
        ("u1", vec!["APP1_UNIT5_ADMIN"]),
        ("u2", vec!["APP1_UNIT9_READ"]),
    ])
    .expect("store seeds")
}

// ============================================================================
// Scenario A: one of several alternatives is held
// ============================================================================

#[tokio::test]
async fn scenario_a_admin_alternative_allows() {
    let engine = DecisionEngine::new(store(), settings()).without_audit();
    let request = StaticRequest::new()
        .with_header("userId", "u1")
        .with_path("unit", "5");

    let decision = engine
        .decide_operation(&unit_registry(), "units.read", &request)
        .await;

    assert!(decision.is_allowed());
    assert_eq!(decision.granted_token(), Some("APP1_UNIT5_ADMIN"));
    assert_eq!(
        decision.evaluated_tokens(),
        ["APP1_UNIT5_READ".to_string(), "APP1_UNIT5_ADMIN".to_string()]
    );
}

#[tokio::test]
async fn scenario_a_wrong_unit_is_insufficient() {
    let engine = DecisionEngine::new(store(), settings()).without_audit();
    let request = StaticRequest::new()
        .with_header("userId", "u2")
        .with_path("unit", "5");

    let decision = engine
        .decide_operation(&unit_registry(), "units.read", &request)
        .await;

    assert!(!decision.is_allowed());
    assert_eq!(decision.stage(), Stage::Evaluating);
    assert_eq!(
        decision.deny_reason(),
        Some(&DenyReason::InsufficientPrivilege {
            required: vec!["APP1_UNIT5_READ".to_string(), "APP1_UNIT5_ADMIN".to_string()],
            held_count: 1,
        })
    );
}

#[tokio::test]
async fn scenario_a_unit_from_body() {
    let engine = DecisionEngine::new(store(), settings()).without_audit();
    let registry = unit_registry();
    let request = StaticRequest::new()
        .with_header("userId", "u1")
        .with_body(json!({"unit": {"id": 5}}));

    let policy = registry.get("units.read").expect("registered");
    let identity = engine.build_identity(&policy, &request).expect("resolves");
    assert_eq!(
        identity.provenance("unitId"),
        Some(Provenance::Source(Source::Body))
    );
    assert_eq!(identity.provenance("appId"), Some(Provenance::Constant));

    assert!(engine.evaluate(&policy, &identity).await.is_allowed());
}

// ============================================================================
// Scenario B: a scope attribute cannot be resolved
// ============================================================================

#[tokio::test]
async fn scenario_b_missing_unit_denies() {
    let engine = DecisionEngine::new(store(), settings()).without_audit();
    let request = StaticRequest::new()
        .with_header("userId", "u1")
        .with_query("unit", "5");

    let decision = engine
        .decide_operation(&unit_registry(), "units.read", &request)
        .await;

    assert_eq!(decision.stage(), Stage::ResolvingContext);
    assert_eq!(
        decision.deny_reason(),
        Some(&DenyReason::MissingContext(vec!["unitId".to_string()]))
    );
}

#[tokio::test]
async fn scenario_b_non_numeric_unit_denies() {
    let engine = DecisionEngine::new(store(), settings()).without_audit();
    let request = StaticRequest::new()
        .with_header("userId", "u1")
        .with_query("unitId", "five");

    let decision = engine
        .decide_operation(&unit_registry(), "units.read", &request)
        .await;

    assert_eq!(
        decision.deny_reason().map(DenyReason::code),
        Some("missing_context")
    );
}

// ============================================================================
// Scenario C: the privilege store does not answer in time
// ============================================================================

/// A store whose lookups never complete.
struct StalledCache;

impl PrivilegeCache for StalledCache {
    async fn get(&self, _principal: &str) -> Result<Option<PrivilegeSet>, CacheError> {
        std::future::pending().await
    }

    async fn put(&self, _principal: &str, _set: PrivilegeSet) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, _principal: &str) -> Result<(), CacheError> {
        Ok(())
    }
}

/// A store that is down.
struct FailingCache;

impl PrivilegeCache for FailingCache {
    async fn get(&self, _principal: &str) -> Result<Option<PrivilegeSet>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn put(&self, _principal: &str, _set: PrivilegeSet) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn remove(&self, _principal: &str) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

fn unit_request() -> StaticRequest {
    StaticRequest::new()
        .with_header("userId", "u1")
        .with_argument("unitId", 5_i64)
}

#[tokio::test(start_paused = true)]
async fn scenario_c_cache_timeout_denies() {
    let limit = Duration::from_millis(50);
    let engine = DecisionEngine::new(StalledCache, settings().with_cache_timeout(Some(limit)))
        .without_audit();

    let decision = engine
        .decide_operation(&unit_registry(), "units.read", &unit_request())
        .await;

    assert_eq!(decision.stage(), Stage::FetchingPrivileges);
    assert_eq!(
        decision.deny_reason(),
        Some(&DenyReason::CacheUnavailable(CacheError::Timeout(limit)))
    );
}

#[tokio::test]
async fn scenario_c_store_failure_is_not_no_privileges() {
    let engine = DecisionEngine::new(FailingCache, settings()).without_audit();

    let decision = engine
        .decide_operation(&unit_registry(), "units.read", &unit_request())
        .await;

    assert!(matches!(
        decision.deny_reason(),
        Some(DenyReason::CacheUnavailable(CacheError::Unavailable(_)))
    ));
}

#[tokio::test]
async fn scenario_c_malformed_entry_is_unavailable() {
    let cache = InMemoryPrivilegeCache::new();
    cache
        .put_raw("u1", b"not json".to_vec())
        .expect("raw write");
    let engine = DecisionEngine::new(cache, settings()).without_audit();

    let decision = engine
        .decide_operation(&unit_registry(), "units.read", &unit_request())
        .await;

    assert!(matches!(
        decision.deny_reason(),
        Some(DenyReason::CacheUnavailable(CacheError::Codec(_)))
    ));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_decisions_share_one_engine() {
    let engine = Arc::new(DecisionEngine::new(Arc::new(store()), settings()).without_audit());
    let registry = Arc::new(unit_registry());

    let mut handles = Vec::new();
    for i in 0..32_i64 {
        let engine = Arc::clone(&engine);
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            let (principal, unit) = if i % 2 == 0 { ("u1", 5_i64) } else { ("u2", 9_i64) };
            let request = StaticRequest::new()
                .with_header("userId", principal)
                .with_argument("unitId", unit);
            engine
                .decide_operation(&registry, "units.read", &request)
                .await
                .is_allowed()
        }));
    }

    for handle in handles {
        assert!(handle.await.expect("task completes"));
    }
}
