use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for role assignment names.
///
/// Fixed forever: changing it would rename every existing assignment and
/// break idempotent re-apply.
const ASSIGNMENT_NAMESPACE: Uuid = Uuid::from_u128(0x6f3c_2a4e_9b1d_5c7f_8e20_4a6b_d1c9_e357);

/// The normalized root of every synthesized resource name.
///
/// Lowercase, no whitespace, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub struct NamingSeed(pub String);

impl NamingSeed {
    /// Returns the seed as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamingSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A short deterministic suffix appended to names for uniqueness.
///
/// Always [`TOKEN_LEN`](crate::token::TOKEN_LEN) characters of `[a-z2-7]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ResourceToken(pub String);

impl ResourceToken {
    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns at most the first `n` characters of the token.
    #[must_use]
    pub fn take(&self, n: usize) -> &str {
        take(&self.0, n)
    }
}

impl fmt::Display for ResourceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object id of a principal (managed identity or user) in the tenant directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PrincipalId(pub String);

impl PrincipalId {
    /// Creates a `PrincipalId`, trimming surrounding whitespace.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_owned())
    }

    /// Returns `true` if the id is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PrincipalId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A fully qualified resource identifier.
///
/// Format: `/subscriptions/{sub}/resourceGroups/{rg}/providers/{type}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ResourceId(pub String);

impl ResourceId {
    /// Identifier of a resource group.
    #[must_use]
    pub fn resource_group(subscription_id: &str, resource_group: &str) -> Self {
        Self(format!("/subscriptions/{subscription_id}/resourceGroups/{resource_group}"))
    }

    /// Identifier of a provider resource inside this resource group.
    #[must_use]
    pub fn provider(&self, provider_type: &str, name: &str) -> Self {
        Self(format!("{}/providers/{provider_type}/{name}", self.0))
    }

    /// Identifier of a child resource nested under this one.
    #[must_use]
    pub fn child(&self, segments: &str, name: &str) -> Self {
        Self(format!("{}/{segments}/{name}", self.0))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic name of a role assignment.
///
/// A UUIDv5 over `(scope, principal, role definition)`, so re-applying the
/// same binding targets the same assignment instead of creating a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub struct AssignmentName(pub Uuid);

impl AssignmentName {
    /// Derives the assignment name for a binding triple.
    #[must_use]
    pub fn derive(scope: &ResourceId, principal_id: &PrincipalId, role_definition: Uuid) -> Self {
        let key = format!("{}\n{}\n{}", scope.as_str(), principal_id.as_str(), role_definition);
        Self(Uuid::new_v5(&ASSIGNMENT_NAMESPACE, key.as_bytes()))
    }

    /// Returns the inner `Uuid`.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for AssignmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns at most the first `n` characters of `s`.
pub(crate) fn take(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
