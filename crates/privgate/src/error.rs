//! Error types for policy registration, token rendering and privilege lookup.

use std::time::Duration;

use privgate_types::TypesError;
use thiserror::Error;

/// A policy that cannot be registered.
///
/// These are raised once, at registration time. A decision that encounters
/// one (for example an unknown operation) is denied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("operation identifier must not be empty")]
    EmptyOperation,

    #[error("policy '{operation}' declares no required permissions")]
    NoSpecs { operation: String },

    #[error("policy '{operation}' references undeclared attribute '{attribute}'")]
    UndeclaredAttribute {
        operation: String,
        attribute: String,
    },

    #[error("attribute '{attribute}' is bound more than once in policy '{operation}'")]
    DuplicateBinding {
        operation: String,
        attribute: String,
    },

    #[error("attribute '{attribute}' in policy '{operation}' shadows a process-wide constant")]
    ShadowedConstant {
        operation: String,
        attribute: String,
    },

    #[error("binding '{0}' declares no request sources")]
    EmptyBinding(String),

    #[error("binding '{attribute}' in policy '{operation}' reads no source in the policy's order")]
    UnreachableBinding {
        operation: String,
        attribute: String,
    },

    #[error("operation '{0}' is already registered")]
    DuplicateOperation(String),

    #[error("operation '{0}' has no registered policy")]
    UnknownOperation(String),

    #[error("invalid template {template:?}: {message}")]
    InvalidTemplate { template: String, message: String },

    #[error("invalid expression {expression:?}: {message}")]
    InvalidExpression { expression: String, message: String },

    #[error(transparent)]
    Types(#[from] TypesError),
}

/// Failure to render a required-permission spec into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The spec references an attribute the identity context does not carry.
    #[error("attribute '{attribute}' is not present in the identity context")]
    MissingContext { attribute: String },
}

/// Failure of the external privilege store.
///
/// Always surfaced as `CacheUnavailable`; never folded into "no privileges".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("privilege store unavailable: {0}")]
    Unavailable(String),

    #[error("privilege lookup exceeded {0:?}")]
    Timeout(Duration),

    #[error("privilege payload could not be decoded: {0}")]
    Codec(String),
}
