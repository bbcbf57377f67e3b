//! Control plane abstraction.
//!
//! Lets the deployer run against the real cloud or an in-memory simulation
//! without changing the orchestration logic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use flexstack_core::{PrincipalId, ResourceDeclaration, ResourceId, RoleBinding};

use crate::ProvisionError;

/// A resource after the control plane has ensured it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProvisionedResource {
    /// Identifier reported by the control plane.
    pub id: ResourceId,
    /// `false` if the resource already existed and was left as is.
    pub created: bool,
}

impl ProvisionedResource {
    /// Create a provisioned-resource record.
    #[must_use]
    pub fn new(id: ResourceId, created: bool) -> Self {
        Self { id, created }
    }
}

/// Directory facts of a managed identity, known only after it exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct IdentityPrincipal {
    /// Object id role bindings target.
    pub principal_id: PrincipalId,
    /// Client id the app authenticates with.
    pub client_id: String,
    /// Tenant the identity lives in.
    pub tenant_id: String,
}

impl IdentityPrincipal {
    /// Create an identity record.
    #[must_use]
    pub fn new(principal_id: PrincipalId, client_id: String, tenant_id: String) -> Self {
        Self { principal_id, client_id, tenant_id }
    }
}

/// Where an application package is uploaded, and by whom.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct PackageTarget {
    /// Deployment container id.
    pub container: ResourceId,
    /// Blob name inside the container.
    pub blob_name: String,
    /// Principal performing the upload.
    pub uploader: PrincipalId,
}

impl PackageTarget {
    /// Create an upload target.
    #[must_use]
    pub fn new(container: ResourceId, blob_name: impl Into<String>, uploader: PrincipalId) -> Self {
        Self { container, blob_name: blob_name.into(), uploader }
    }
}

/// Cloud resource control plane.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
/// Every method must be idempotent: ensuring an existing resource or
/// applying an existing binding is a no-op.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create `decl` if it does not exist.
    ///
    /// # Errors
    /// Returns [`ProvisionError::ResourceFailed`] if the control plane rejects it.
    async fn ensure_resource(
        &self,
        decl: &ResourceDeclaration,
    ) -> Result<ProvisionedResource, ProvisionError>;

    /// Look up the directory principal behind a user-assigned identity.
    ///
    /// # Errors
    /// Returns [`ProvisionError::NotProvisioned`] if the identity does not exist.
    async fn identity_principal(
        &self,
        identity: &ResourceId,
    ) -> Result<IdentityPrincipal, ProvisionError>;

    /// Submit a role binding. Returns before the grant takes effect.
    ///
    /// # Errors
    /// Returns [`ProvisionError::Backend`] if the submission is rejected.
    async fn apply_role_binding(&self, binding: &RoleBinding) -> Result<(), ProvisionError>;

    /// Upload an application package to the deployment container.
    ///
    /// # Errors
    /// Returns [`ProvisionError::AuthorizationPending`] while the uploader's
    /// grant is still propagating, or [`ProvisionError::Unauthorized`] if
    /// the uploader holds no suitable grant.
    async fn upload_package(
        &self,
        target: &PackageTarget,
        package: &[u8],
    ) -> Result<(), ProvisionError>;

    /// Connection string of an Application Insights component.
    ///
    /// # Errors
    /// Returns [`ProvisionError::NotProvisioned`] if the component does not exist.
    async fn telemetry_connection_string(
        &self,
        component: &ResourceId,
    ) -> Result<String, ProvisionError>;

    /// Check that the control plane is reachable and authenticated.
    ///
    /// # Errors
    /// Returns [`ProvisionError::Backend`] if it is not.
    async fn health_check(&self) -> Result<(), ProvisionError>;
}
