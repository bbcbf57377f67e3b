use crate::names::ResourceKind;

/// Errors produced by the `flexstack-core` crate.
///
/// Every variant is fatal to a provisioning run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A required input was missing or empty.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// A synthesized name exceeded the resource kind's length ceiling.
    #[error("name '{name}' for {kind} is {len} characters; the limit is {max}")]
    NameLength {
        kind: ResourceKind,
        name: String,
        len: usize,
        max: usize,
    },

    /// A synthesized name contains characters the resource kind rejects.
    #[error("name '{name}' for {kind} is invalid: {reason}")]
    InvalidName {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    /// The name dependency graph contains a cycle.
    #[error("name dependency cycle between: {}", .kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    DependencyCycle { kinds: Vec<ResourceKind> },

    /// A parameters document could not be parsed.
    #[error("invalid deployment parameters: {0}")]
    Parameters(#[from] serde_json::Error),

    /// The same (scope, principal, role) triple was emitted twice.
    #[error("role binding {role} for principal {principal_id} on {scope} emitted twice")]
    BindingConflict {
        role: String,
        principal_id: String,
        scope: String,
    },
}

impl CoreError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config { reason: reason.into() }
    }
}
