//! In-memory control plane.
//!
//! Simulates a cloud control plane for dry runs and tests: resources and
//! bindings are keyed by id and assignment name, so every write is
//! idempotent, and role bindings only take effect after a configurable
//! number of authorization checks have observed them as pending.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use flexstack_core::{
    AssignmentName, PrincipalId, ResourceDeclaration, ResourceId, ResourceKind, Role, RoleBinding,
};

use crate::backend::{ControlPlane, IdentityPrincipal, PackageTarget, ProvisionedResource};
use crate::ProvisionError;

/// Tenant reported by a default simulation.
pub const SIMULATED_TENANT: &str = "00000000-0000-0000-0000-00000000a11c";

#[derive(Debug)]
struct AppliedBinding {
    binding: RoleBinding,
    checks_until_effective: u32,
}

#[derive(Debug, Default)]
struct State {
    resources: BTreeMap<ResourceId, ResourceKind>,
    bindings: BTreeMap<AssignmentName, AppliedBinding>,
    packages: BTreeMap<String, Vec<u8>>,
    binding_writes: usize,
}

/// Simulated control plane. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct InMemoryControlPlane {
    tenant_id: String,
    propagation_checks: u32,
    fail_on: Option<ResourceKind>,
    state: Arc<Mutex<State>>,
}

impl Default for InMemoryControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryControlPlane {
    /// A simulation where grants take effect immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tenant_id: SIMULATED_TENANT.to_owned(),
            propagation_checks: 0,
            fail_on: None,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Grants report pending for the first `checks` authorization checks.
    #[must_use]
    pub fn with_propagation_checks(mut self, checks: u32) -> Self {
        self.propagation_checks = checks;
        self
    }

    /// Reject every attempt to ensure a resource of `kind`.
    #[must_use]
    pub fn failing_on(mut self, kind: ResourceKind) -> Self {
        self.fail_on = Some(kind);
        self
    }

    /// Report `tenant_id` for every identity.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    /// Number of distinct resources that exist.
    pub async fn resource_count(&self) -> usize {
        self.state.lock().await.resources.len()
    }

    /// Number of distinct role bindings that exist.
    pub async fn binding_count(&self) -> usize {
        self.state.lock().await.bindings.len()
    }

    /// Number of `apply_role_binding` calls received, including repeats.
    pub async fn binding_writes(&self) -> usize {
        self.state.lock().await.binding_writes
    }

    /// The package stored at `target`, if any.
    pub async fn package(&self, target: &PackageTarget) -> Option<Vec<u8>> {
        self.state.lock().await.packages.get(&blob_key(target)).cloned()
    }

    fn identity_for(&self, identity: &ResourceId) -> IdentityPrincipal {
        let principal = Uuid::new_v5(&Uuid::NAMESPACE_URL, identity.as_str().as_bytes());
        let client = Uuid::new_v5(&principal, b"client");
        IdentityPrincipal::new(
            PrincipalId::new(principal.to_string()),
            client.to_string(),
            self.tenant_id.clone(),
        )
    }
}

fn blob_key(target: &PackageTarget) -> String {
    format!("{}/{}", target.container, target.blob_name)
}

/// Whether `scope` covers `resource`: equal, or a path prefix of it.
fn covers(scope: &ResourceId, resource: &ResourceId) -> bool {
    resource.as_str() == scope.as_str()
        || resource
            .as_str()
            .strip_prefix(scope.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn ensure_resource(
        &self,
        decl: &ResourceDeclaration,
    ) -> Result<ProvisionedResource, ProvisionError> {
        if self.fail_on == Some(decl.kind) {
            return Err(ProvisionError::ResourceFailed {
                kind: decl.kind,
                name: decl.name.clone(),
                reason: "simulated failure".to_owned(),
            });
        }
        let mut state = self.state.lock().await;
        for dep in &decl.depends_on {
            if !state.resources.values().any(|k| k == dep) {
                return Err(ProvisionError::NotProvisioned(*dep));
            }
        }
        let created = state.resources.insert(decl.id.clone(), decl.kind).is_none();
        Ok(ProvisionedResource::new(decl.id.clone(), created))
    }

    async fn identity_principal(
        &self,
        identity: &ResourceId,
    ) -> Result<IdentityPrincipal, ProvisionError> {
        let state = self.state.lock().await;
        match state.resources.get(identity) {
            Some(ResourceKind::UserAssignedIdentity) => Ok(self.identity_for(identity)),
            _ => Err(ProvisionError::NotProvisioned(ResourceKind::UserAssignedIdentity)),
        }
    }

    async fn apply_role_binding(&self, binding: &RoleBinding) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        if !state.resources.contains_key(&binding.scope) {
            return Err(ProvisionError::Backend(format!(
                "scope {} does not exist",
                binding.scope
            )));
        }
        state.binding_writes += 1;
        let checks = self.propagation_checks;
        state.bindings.entry(binding.name).or_insert_with(|| AppliedBinding {
            binding: binding.clone(),
            checks_until_effective: checks,
        });
        Ok(())
    }

    async fn upload_package(
        &self,
        target: &PackageTarget,
        package: &[u8],
    ) -> Result<(), ProvisionError> {
        let mut state = self.state.lock().await;
        if !state.resources.contains_key(&target.container) {
            return Err(ProvisionError::NotProvisioned(ResourceKind::DeploymentContainer));
        }

        let grant = state.bindings.values_mut().find(|b| {
            b.binding.role == Role::BlobDataOwner
                && b.binding.principal_id == target.uploader
                && covers(&b.binding.scope, &target.container)
        });
        let Some(grant) = grant else {
            return Err(ProvisionError::Unauthorized {
                principal: target.uploader.to_string(),
                scope: target.container.to_string(),
            });
        };
        if grant.checks_until_effective > 0 {
            grant.checks_until_effective -= 1;
            return Err(ProvisionError::AuthorizationPending {
                principal: target.uploader.to_string(),
                scope: grant.binding.scope.to_string(),
            });
        }

        state.packages.insert(blob_key(target), package.to_vec());
        Ok(())
    }

    async fn telemetry_connection_string(
        &self,
        component: &ResourceId,
    ) -> Result<String, ProvisionError> {
        let state = self.state.lock().await;
        match state.resources.get(component) {
            Some(ResourceKind::ApplicationInsights) => {
                let key = Uuid::new_v5(&Uuid::NAMESPACE_URL, component.as_str().as_bytes());
                Ok(format!(
                    "InstrumentationKey={key};IngestionEndpoint=https://in.applicationinsights.example/;Authorization=AAD"
                ))
            }
            _ => Err(ProvisionError::NotProvisioned(ResourceKind::ApplicationInsights)),
        }
    }

    async fn health_check(&self) -> Result<(), ProvisionError> {
        Ok(())
    }
}
