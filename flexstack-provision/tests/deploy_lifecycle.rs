//! Integration test: full deployment against the in-memory control plane.
//!
//! Verifies the end-to-end properties: resources are created in dependency
//! order, bindings are submitted once, the package upload survives grant
//! propagation delay, and a repeat run changes nothing.

use flexstack_core::{
    DeploymentParameters, DeploymentPlan, FeatureFlags, PrincipalKind, ResourceKind, Role,
};
use flexstack_provision::{
    Deployer, InMemoryControlPlane, PackageTarget, ProvisionError, RetryPolicy, PACKAGE_BLOB,
};

const PACKAGE: &[u8] = b"PK\x03\x04 not really a zip";

fn params(user: &str, flags: FeatureFlags) -> DeploymentParameters {
    let mut p = DeploymentParameters::default();
    p.environment_name = "dev".to_owned();
    p.seed = "funcsj".to_owned();
    p.location = "swedencentral".to_owned();
    p.subscription_id = "11111111-2222-3333-4444-555555555555".to_owned();
    p.principal_id = user.to_owned();
    p.flags = flags;
    p
}

fn plan(user: &str, flags: FeatureFlags) -> DeploymentPlan {
    DeploymentPlan::build(&params(user, flags)).expect("plan builds")
}

#[tokio::test]
async fn full_run_returns_outputs_and_stores_package() {
    let plane = InMemoryControlPlane::new().with_tenant("tenant-1");
    let deployer = Deployer::with_policy(plane.clone(), RetryPolicy::immediate(3));
    let plan = plan("user-1", FeatureFlags::default());

    let outputs = deployer.run(&plan, Some(PACKAGE)).await.expect("run succeeds");

    assert_eq!(outputs.function_app_name, plan.names.get(ResourceKind::FunctionApp).unwrap_or_default());
    assert_eq!(outputs.tenant_id, "tenant-1");
    assert!(outputs.function_endpoint.starts_with("https://func-funcsj-"));
    assert!(outputs.storage_account_id.contains("Microsoft.Storage/storageAccounts"));
    assert!(outputs.application_insights_connection_string.starts_with("InstrumentationKey="));
    assert!(outputs.resource_group_id.ends_with("/resourceGroups/rg-funcsj"));

    assert_eq!(plane.resource_count().await, ResourceKind::ALL.len());

    let container = plan.resource_id(ResourceKind::DeploymentContainer).expect("declared").clone();
    let target = PackageTarget::new(container, PACKAGE_BLOB, "user-1".into());
    assert_eq!(plane.package(&target).await.as_deref(), Some(PACKAGE));
}

#[tokio::test]
async fn repeat_run_applies_no_new_bindings() {
    let plane = InMemoryControlPlane::new();
    let deployer = Deployer::with_policy(plane.clone(), RetryPolicy::immediate(3));
    let plan = plan("user-1", FeatureFlags::new(true, true, true, true));

    let first = deployer.provision(&plan).await.expect("first provision");
    assert_eq!(first.newly_applied, 8);
    assert!(first.resources.iter().all(|r| r.created));

    let second = deployer.provision(&plan).await.expect("second provision");
    assert_eq!(second.newly_applied, 0, "repeat run must not resubmit bindings");
    assert!(second.resources.iter().all(|r| !r.created), "repeat run must not recreate resources");
    assert_eq!(plane.binding_count().await, 8);
    assert_eq!(plane.binding_writes().await, 8);
}

#[tokio::test]
async fn fresh_deployer_reapplies_idempotently() {
    let plane = InMemoryControlPlane::new();
    let plan = plan("user-1", FeatureFlags::default());

    Deployer::with_policy(plane.clone(), RetryPolicy::immediate(1))
        .provision(&plan)
        .await
        .expect("first provision");
    Deployer::with_policy(plane.clone(), RetryPolicy::immediate(1))
        .provision(&plan)
        .await
        .expect("second provision");

    assert_eq!(plane.binding_count().await, 4, "same assignment names must not duplicate");
    assert_eq!(plane.binding_writes().await, 8, "each deployer submits its own writes");
}

#[tokio::test]
async fn upload_waits_out_propagation() {
    let plane = InMemoryControlPlane::new().with_propagation_checks(3);
    let deployer = Deployer::with_policy(plane.clone(), RetryPolicy::immediate(4));
    let plan = plan("user-1", FeatureFlags::default());

    let report = deployer.provision(&plan).await.expect("provision");
    let target = deployer.deploy_package(&plan, &report, PACKAGE).await.expect("upload after retries");
    assert_eq!(plane.package(&target).await.as_deref(), Some(PACKAGE));
}

#[tokio::test]
async fn upload_gives_up_when_propagation_outlasts_budget() {
    let plane = InMemoryControlPlane::new().with_propagation_checks(10);
    let deployer = Deployer::with_policy(plane, RetryPolicy::immediate(3));
    let plan = plan("user-1", FeatureFlags::default());

    let report = deployer.provision(&plan).await.expect("provision");
    let result = deployer.deploy_package(&plan, &report, PACKAGE).await;
    match result {
        Err(ProvisionError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn identity_uploads_when_no_user_is_configured() {
    let plane = InMemoryControlPlane::new();
    let deployer = Deployer::with_policy(plane.clone(), RetryPolicy::immediate(1));
    let plan = plan("", FeatureFlags::default());

    let report = deployer.provision(&plan).await.expect("provision");
    assert_eq!(report.bindings.for_kind(PrincipalKind::User).count(), 0);

    let target = deployer.deploy_package(&plan, &report, PACKAGE).await.expect("identity upload");
    assert_eq!(target.uploader, report.identity.principal_id);
}

#[tokio::test]
async fn identity_uploads_when_user_grants_are_disabled() {
    let plane = InMemoryControlPlane::new();
    let deployer = Deployer::with_policy(plane.clone(), RetryPolicy::immediate(1));
    let plan = plan("user-1", FeatureFlags::new(true, false, false, false));

    let report = deployer.provision(&plan).await.expect("provision");
    assert_eq!(report.bindings.for_kind(PrincipalKind::User).count(), 0);

    let target = deployer.deploy_package(&plan, &report, PACKAGE).await.expect("identity upload");
    assert_eq!(target.uploader, report.identity.principal_id);
    assert_eq!(plane.package(&target).await.as_deref(), Some(PACKAGE));

    let outputs = Deployer::with_policy(plane, RetryPolicy::immediate(1))
        .run(&plan, Some(PACKAGE))
        .await;
    assert!(outputs.is_ok(), "full run must succeed, got {outputs:?}");
}

#[tokio::test]
async fn upload_without_blob_grant_is_unauthorized() {
    let plane = InMemoryControlPlane::new();
    let deployer = Deployer::with_policy(plane, RetryPolicy::immediate(5));
    let plan = plan("user-1", FeatureFlags::new(false, true, false, true));

    let report = deployer.provision(&plan).await.expect("provision");
    assert!(!report.bindings.contains(Role::BlobDataOwner, &report.identity.principal_id));

    let result = deployer.deploy_package(&plan, &report, PACKAGE).await;
    assert!(
        matches!(result, Err(ProvisionError::Unauthorized { .. })),
        "missing grants must fail fast, got {result:?}"
    );
}

#[tokio::test]
async fn resource_failure_stops_before_bindings() {
    let plane = InMemoryControlPlane::new().failing_on(ResourceKind::StorageAccount);
    let deployer = Deployer::with_policy(plane.clone(), RetryPolicy::immediate(1));

    let result = deployer.provision(&plan("user-1", FeatureFlags::default())).await;
    assert!(matches!(
        result,
        Err(ProvisionError::ResourceFailed { kind: ResourceKind::StorageAccount, .. })
    ));
    assert_eq!(plane.binding_count().await, 0);
}
