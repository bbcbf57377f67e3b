//! Error types for the provision crate.

use flexstack_core::{CoreError, ResourceKind};

/// Errors that can occur while applying a plan to a control plane.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// The plan itself was invalid.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The control plane refused to create or update a resource.
    #[error("failed to provision {kind} '{name}': {reason}")]
    ResourceFailed {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    /// A resource the step depends on has not been provisioned.
    #[error("{0} has not been provisioned")]
    NotProvisioned(ResourceKind),

    /// A role binding exists but has not taken effect yet.
    #[error("authorization for {principal} on {scope} has not propagated yet")]
    AuthorizationPending { principal: String, scope: String },

    /// The principal holds no role that permits the operation.
    #[error("{principal} is not authorized on {scope}")]
    Unauthorized { principal: String, scope: String },

    /// Every retry attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ProvisionError>,
    },

    /// Any other control plane failure.
    #[error("control plane error: {0}")]
    Backend(String),
}

impl ProvisionError {
    /// Returns `true` if retrying the same operation later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::AuthorizationPending { .. })
    }
}
