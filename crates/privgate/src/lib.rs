//! # privgate: Privilege-Token Authorization
//!
//! Decides whether the caller of a protected operation holds at least one of
//! the privilege tokens the operation requires. Tokens are rendered per
//! request from templates parameterized by scope attributes (application,
//! unit, tenant, ...) that are pulled from the request itself.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Protected operation invoked                 │
//! │  (arguments, query, path, body, headers)     │
//! └─────────────────┬───────────────────────────┘
//!                   │  RequestContext
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  IdentityResolver                            │
//! │  ├─ Principal from the principal binding     │
//! │  └─ Scope attributes in source order         │
//! └─────────────────┬───────────────────────────┘
//!                   │  IdentityContext
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  PrivilegeCache::get(principal)              │
//! └─────────────────┬───────────────────────────┘
//!                   │  PrivilegeSet
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  PermissionTokenBuilder                      │
//! │  ├─ Render every alternative spec            │
//! │  └─ Allow if any token is held               │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision                                    │
//! │  - Verdict (Allow/Deny)                      │
//! │  - Granted token or deny reason              │
//! │  - Concluding stage, evaluated tokens        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Every failure denies. A missing principal, an unresolvable attribute, an
//! unreachable privilege store, and an empty privilege set all produce a
//! `Deny` with a distinct [`DenyReason`].
//!
//! ## Spec Modes
//!
//! - **Literal**: `APP{appId}_UNIT{unitId}_READ`, direct substitution
//! - **Expression**: `'APP' + #appId + '_UNIT' + #unitId`, a sandboxed
//!   concatenation language whose comma lists yield several tokens
//!
//! ## Examples
//!
//! ```
//! use privgate::{
//!     AttributeBinding, DecisionEngine, EngineSettings, InMemoryPrivilegeCache,
//!     PolicyRegistry, StaticRequest,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = PolicyRegistry::new().with_constant("appId");
//! let policy = registry
//!     .policy("units.read")
//!     .bind(AttributeBinding::uniform("unitId").integer())
//!     .require_literal("APP{appId}_UNIT{unitId}_READ")
//!     .require_literal("APP{appId}_UNIT{unitId}_ADMIN")
//!     .build()?;
//! registry.register(policy)?;
//!
//! let cache = InMemoryPrivilegeCache::with_entries([("u1", ["APP1_UNIT5_ADMIN"])])?;
//! let engine = DecisionEngine::new(cache, EngineSettings::default().with_constant("appId", "1"));
//!
//! let request = StaticRequest::new()
//!     .with_header("userId", "u1")
//!     .with_path("unitId", "5");
//!
//! let decision = engine.decide_operation(&registry, "units.read", &request).await;
//! assert!(decision.is_allowed());
//! assert_eq!(decision.granted_token(), Some("APP1_UNIT5_ADMIN"));
//! # Ok(())
//! # }
//! ```

pub mod attributes;
pub mod decision;
pub mod engine;
pub mod error;
pub mod expression;
pub mod policy;
pub mod privilege;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod template;
pub mod token;


pub use attributes::{IdentityContext, Provenance, ResolvedAttribute};
pub use decision::{Decision, DenyReason, PrivilegeLookup, Reason, Stage, Verdict};
pub use engine::{DecisionEngine, EngineSettings};
pub use error::{CacheError, ConfigurationError, RenderError};
pub use policy::{PolicyBuilder, PolicyDescriptor, RequiredPermissionSpec};
pub use privilege::{
    InMemoryPrivilegeCache, PrivilegeCache, PrivilegeSet, decode_privileges, encode_privileges,
};
pub use registry::PolicyRegistry;
pub use request::{RequestContext, StaticRequest};
pub use resolver::{AttributeBinding, IdentityResolver};
pub use token::PermissionTokenBuilder;

pub use privgate_types::{AttributeKind, AttributeValue, ParamLocation, RenderMode, Source, SourceOrder};
