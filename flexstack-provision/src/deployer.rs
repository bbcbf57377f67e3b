//! Applies a [`DeploymentPlan`] to a [`ControlPlane`].
//!
//! Order of operations:
//! 1. Ensure every declared resource, in creation order.
//! 2. Read the managed identity's principal and compute role bindings.
//! 3. Submit bindings without waiting for them to take effect.
//! 4. Upload the application package through [`retry_after_settle`].
//! 5. Collect the outputs the calling automation needs.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use flexstack_core::{
    AssignmentName, DeploymentOutputs, DeploymentPlan, PrincipalId, ResourceKind, RoleBindingSet,
};

use crate::backend::{ControlPlane, IdentityPrincipal, PackageTarget, ProvisionedResource};
use crate::retry::{retry_after_settle, RetryPolicy};
use crate::ProvisionError;

/// Blob name the function app's deployment source points at.
pub const PACKAGE_BLOB: &str = "released-package.zip";

/// What [`Deployer::provision`] did.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct ProvisionReport {
    /// Every declared resource, in creation order.
    pub resources: Vec<ProvisionedResource>,
    /// The managed identity's directory facts.
    pub identity: IdentityPrincipal,
    /// Every binding the plan requires.
    pub bindings: RoleBindingSet,
    /// Bindings submitted by this call; zero on a repeat run.
    pub newly_applied: usize,
    /// When provisioning began.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time until the last binding was submitted.
    pub duration: Duration,
}

/// Drives a plan through a control plane.
///
/// Remembers which assignments it has submitted, so running the same plan
/// twice through one deployer submits each binding once.
pub struct Deployer<B: ControlPlane> {
    backend: B,
    policy: RetryPolicy,
    applied: Arc<Mutex<BTreeSet<AssignmentName>>>,
}

impl<B: ControlPlane> Deployer<B> {
    /// Create a deployer with the default retry policy.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, RetryPolicy::default())
    }

    /// Create a deployer with a custom retry policy.
    #[must_use]
    pub fn with_policy(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy, applied: Arc::new(Mutex::new(BTreeSet::new())) }
    }

    /// The underlying control plane.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of distinct assignments submitted so far.
    pub async fn applied_count(&self) -> usize {
        self.applied.lock().await.len()
    }

    /// Ensure resources, then compute and submit role bindings.
    ///
    /// # Errors
    /// Propagates control plane failures and [`flexstack_core::CoreError`]s
    /// from binding computation. Stops at the first failure.
    pub async fn provision(&self, plan: &DeploymentPlan) -> Result<ProvisionReport, ProvisionError> {
        self.backend.health_check().await?;
        let started_at = Utc::now();
        let wall_start = Instant::now();

        let mut resources = Vec::with_capacity(plan.resources.len());
        for decl in &plan.resources {
            let provisioned = self.backend.ensure_resource(decl).await?;
            tracing::info!(
                kind = %decl.kind,
                name = %decl.name,
                created = provisioned.created,
                "resource ensured"
            );
            resources.push(provisioned);
        }

        let identity_id = plan.resource_id(ResourceKind::UserAssignedIdentity)?;
        let identity = self.backend.identity_principal(identity_id).await?;
        let bindings = plan.bindings(&identity.principal_id)?;

        let mut applied = self.applied.lock().await;
        let mut newly_applied = 0;
        for binding in bindings.iter() {
            if applied.contains(&binding.name) {
                tracing::debug!(assignment = %binding.name, "binding already submitted");
                continue;
            }
            self.backend.apply_role_binding(binding).await?;
            applied.insert(binding.name);
            newly_applied += 1;
            tracing::info!(
                role = %binding.role,
                principal = %binding.principal_id,
                scope = %binding.scope,
                "role binding submitted"
            );
        }
        drop(applied);

        let duration = wall_start.elapsed();
        tracing::info!(
            resources = resources.len(),
            newly_applied,
            elapsed_ms = duration.as_millis(),
            "provisioning complete"
        );

        Ok(ProvisionReport { resources, identity, bindings, newly_applied, started_at, duration })
    }

    /// Upload `package` once the uploader's grant has propagated.
    ///
    /// The deploying user uploads when one is configured and user grants are
    /// enabled; otherwise the managed identity does.
    ///
    /// # Errors
    /// Returns [`ProvisionError::RetriesExhausted`] if the grant never takes
    /// effect within the policy's budget, or any non-transient failure.
    pub async fn deploy_package(
        &self,
        plan: &DeploymentPlan,
        report: &ProvisionReport,
        package: &[u8],
    ) -> Result<PackageTarget, ProvisionError> {
        let uploader: PrincipalId = plan
            .user_principal
            .clone()
            .filter(|_| plan.flags.allow_user_identity_principal)
            .unwrap_or_else(|| report.identity.principal_id.clone());
        let container = plan.resource_id(ResourceKind::DeploymentContainer)?.clone();
        let target = PackageTarget::new(container, PACKAGE_BLOB, uploader);

        let backend = &self.backend;
        let target_ref = &target;
        retry_after_settle(&self.policy, "package upload", move |attempt| {
            tracing::debug!(attempt, bytes = package.len(), "uploading package");
            backend.upload_package(target_ref, package)
        })
        .await?;

        tracing::info!(container = %target.container, blob = %target.blob_name, "package uploaded");
        Ok(target)
    }

    /// Collect post-provisioning values.
    ///
    /// # Errors
    /// Propagates control plane failures.
    pub async fn outputs(
        &self,
        plan: &DeploymentPlan,
        report: &ProvisionReport,
    ) -> Result<DeploymentOutputs, ProvisionError> {
        let telemetry = plan.resource_id(ResourceKind::ApplicationInsights)?;
        let connection_string = self.backend.telemetry_connection_string(telemetry).await?;

        Ok(DeploymentOutputs::new(
            plan.names.require(ResourceKind::FunctionApp)?.to_owned(),
            plan.function_endpoint()?,
            plan.resource_id(ResourceKind::StorageAccount)?.to_string(),
            connection_string,
            report.identity.tenant_id.clone(),
            plan.resource_id(ResourceKind::ResourceGroup)?.to_string(),
            report.identity.client_id.clone(),
        ))
    }

    /// Provision, optionally upload a package, and return the outputs.
    ///
    /// # Errors
    /// Propagates the first failure of any step.
    pub async fn run(
        &self,
        plan: &DeploymentPlan,
        package: Option<&[u8]>,
    ) -> Result<DeploymentOutputs, ProvisionError> {
        let report = self.provision(plan).await?;
        if let Some(package) = package {
            self.deploy_package(plan, &report, package).await?;
        }
        self.outputs(plan, &report).await
    }
}
