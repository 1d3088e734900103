//! Decision outcomes.
//!
//! Every path through the engine ends in a [`Decision`]. Denials carry a
//! [`DenyReason`] and the [`Stage`] that produced it; both are for audit
//! only and never change the verdict.

use std::fmt;

use thiserror::Error;

use crate::error::{CacheError, ConfigurationError};

/// Allow or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "allow"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// Pipeline stage at which a decision concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Init,
    ResolvingIdentity,
    ResolvingContext,
    FetchingPrivileges,
    Evaluating,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::ResolvingIdentity => "resolving_identity",
            Self::ResolvingContext => "resolving_context",
            Self::FetchingPrivileges => "fetching_privileges",
            Self::Evaluating => "evaluating",
        };
        f.write_str(name)
    }
}

/// Why a principal was found to hold no privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeLookup {
    /// The store has no entry for the principal.
    Missing,
    /// The store has an entry, and it is empty.
    Empty,
}

/// The reason behind a denial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("no principal could be resolved from the request")]
    MissingIdentity,

    #[error("required attributes could not be resolved: {}", .0.join(", "))]
    MissingContext(Vec<String>),

    #[error("principal holds no privileges ({lookup:?})")]
    NoPrivileges { lookup: PrivilegeLookup },

    #[error("none of the required privileges [{}] are held ({held_count} held)", .required.join(", "))]
    InsufficientPrivilege {
        required: Vec<String>,
        held_count: usize,
    },

    #[error("privilege store unavailable: {0}")]
    CacheUnavailable(#[source] CacheError),

    #[error("policy configuration error: {0}")]
    ConfigurationError(#[source] ConfigurationError),
}

impl DenyReason {
    /// Stable, machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingIdentity => "missing_identity",
            Self::MissingContext(_) => "missing_context",
            Self::NoPrivileges { .. } => "no_privileges",
            Self::InsufficientPrivilege { .. } => "insufficient_privilege",
            Self::CacheUnavailable(_) => "cache_unavailable",
            Self::ConfigurationError(_) => "configuration_error",
        }
    }
}

/// What concluded the decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// The principal holds `token`.
    Granted { token: String },
    Denied(DenyReason),
}

/// The outcome of one authorization decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    verdict: Verdict,
    reason: Reason,
    stage: Stage,
    evaluated_tokens: Vec<String>,
}

impl Decision {
    pub(crate) fn allow(token: String, evaluated_tokens: Vec<String>) -> Self {
        Self {
            verdict: Verdict::Allow,
            reason: Reason::Granted { token },
            stage: Stage::Evaluating,
            evaluated_tokens,
        }
    }

    pub(crate) fn deny(reason: DenyReason, stage: Stage) -> Self {
        Self {
            verdict: Verdict::Deny,
            reason: Reason::Denied(reason),
            stage,
            evaluated_tokens: Vec::new(),
        }
    }

    pub(crate) fn with_evaluated(mut self, tokens: Vec<String>) -> Self {
        self.evaluated_tokens = tokens;
        self
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    pub fn reason(&self) -> &Reason {
        &self.reason
    }

    /// The deny reason, if this is a denial.
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match &self.reason {
            Reason::Denied(reason) => Some(reason),
            Reason::Granted { .. } => None,
        }
    }

    /// The token that granted access, if this is an allow.
    pub fn granted_token(&self) -> Option<&str> {
        match &self.reason {
            Reason::Granted { token } => Some(token),
            Reason::Denied(_) => None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Tokens rendered while evaluating, in spec order.
    pub fn evaluated_tokens(&self) -> &[String] {
        &self.evaluated_tokens
    }

    /// Converts a denial into `Err` for `?` propagation.
    pub fn into_result(self) -> Result<Self, DenyReason> {
        match self.reason {
            Reason::Denied(reason) => Err(reason),
            Reason::Granted { .. } => Ok(self),
        }
    }
}
