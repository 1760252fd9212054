//! Capability checks and the per-request context they are evaluated against.
//!
//! Every public [`LabelStore`](crate::labels::LabelStore) operation calls
//! [`AuthorizationChecker::check_any`] before touching the data store. The
//! default checker, [`ContextPermissions`], trusts the capabilities the
//! caller's transport layer attached to the [`RequestContext`].

use std::collections::BTreeSet;
use std::fmt;

use tokio_util::sync::CancellationToken;

/// An authorization level a caller may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    /// Internal callers (background jobs, migrations).
    System,
    /// Any authenticated user.
    User,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("unauthorized: no credentials")]
    Unauthenticated,

    #[error("forbidden: requires one of [{}]", join_caps(.required))]
    Missing { required: Vec<Capability> },
}

fn join_caps(caps: &[Capability]) -> String {
    caps.iter()
        .map(Capability::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-request state: the capabilities granted to the caller and a
/// cancellation signal for the in-flight request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    capabilities: BTreeSet<Capability>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// A context with no capabilities. Every label operation rejects it.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn system() -> Self {
        Self::anonymous().with_capability(Capability::System)
    }

    pub fn user() -> Self {
        Self::anonymous().with_capability(Capability::User)
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Attach an externally owned cancellation token (e.g. one that fires
    /// when the client disconnects or a deadline passes).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_anonymous(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Capability gate consulted once per public store operation.
pub trait AuthorizationChecker: Send + Sync {
    /// Succeed if the context holds at least one of `required`.
    fn check_any(&self, ctx: &RequestContext, required: &[Capability]) -> Result<(), AuthError>;
}

/// Checks the capabilities carried on the [`RequestContext`] itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextPermissions;

impl AuthorizationChecker for ContextPermissions {
    fn check_any(&self, ctx: &RequestContext, required: &[Capability]) -> Result<(), AuthError> {
        if ctx.is_anonymous() {
            return Err(AuthError::Unauthenticated);
        }
        if required.iter().any(|cap| ctx.has(*cap)) {
            return Ok(());
        }
        Err(AuthError::Missing {
            required: required.to_vec(),
        })
    }
}
