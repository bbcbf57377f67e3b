//! The naming pipeline: parameters in, an immutable deployment plan out.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{PrincipalId, ResourceId};
use crate::names::{resolve_names, NameOverrides, ResourceKind, ResourceNameSet};
use crate::resource::{declare_resources, ResourceDeclaration};
use crate::roles::{compute_bindings, BindingScopes, FeatureFlags, RoleBindingSet};
use crate::seed::NamingContext;

/// Operator inputs for one deployment.
///
/// Every field defaults, so a parameters file only needs what it sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
pub struct DeploymentParameters {
    /// Environment identifier; the seed fallback.
    pub environment_name: String,
    /// Optional naming seed override.
    pub seed: String,
    /// Target region.
    pub location: String,
    /// Subscription to deploy into.
    pub subscription_id: String,
    /// Object id of the deploying user; may be empty.
    pub principal_id: String,
    /// Explicit names per resource kind.
    pub overrides: NameOverrides,
    /// Storage features and user-principal mirroring.
    pub flags: FeatureFlags,
}

impl DeploymentParameters {
    /// Parse parameters from a JSON document.
    ///
    /// # Errors
    /// Returns [`CoreError::Parameters`] if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Everything derived from [`DeploymentParameters`] before touching the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DeploymentPlan {
    /// Resolved seed, token, and location.
    pub context: NamingContext,
    /// Name per resource kind.
    pub names: ResourceNameSet,
    /// Resources in creation order.
    pub resources: Vec<ResourceDeclaration>,
    /// Feature flags the bindings are computed from.
    pub flags: FeatureFlags,
    /// Deploying user, if one was given.
    pub user_principal: Option<PrincipalId>,
}

impl DeploymentPlan {
    /// Run seed resolution, token generation, name resolution, and
    /// resource declaration.
    ///
    /// # Errors
    /// Propagates any [`CoreError`] from the pipeline stages.
    pub fn build(params: &DeploymentParameters) -> Result<Self, CoreError> {
        let context = NamingContext::new(
            &params.seed,
            &params.environment_name,
            &params.location,
            &params.subscription_id,
        )?;
        let names = resolve_names(&context, &params.overrides)?;
        let resources = declare_resources(&context, &names)?;
        let user_principal =
            Some(PrincipalId::new(params.principal_id.as_str())).filter(|p| !p.is_empty());

        tracing::info!(
            seed = %context.seed,
            token = %context.token,
            resources = resources.len(),
            "deployment plan built"
        );

        Ok(Self { context, names, resources, flags: params.flags, user_principal })
    }

    /// The declaration for `kind`.
    #[must_use]
    pub fn declaration(&self, kind: ResourceKind) -> Option<&ResourceDeclaration> {
        self.resources.iter().find(|d| d.kind == kind)
    }

    /// The resource id for `kind`.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if `kind` was not declared.
    pub fn resource_id(&self, kind: ResourceKind) -> Result<&ResourceId, CoreError> {
        self.declaration(kind)
            .map(|d| &d.id)
            .ok_or_else(|| CoreError::config(format!("{kind} is not declared in the plan")))
    }

    /// Compute role bindings once the managed identity's principal is known.
    ///
    /// # Errors
    /// See [`compute_bindings`].
    pub fn bindings(&self, managed_identity: &PrincipalId) -> Result<RoleBindingSet, CoreError> {
        compute_bindings(
            self.flags,
            managed_identity,
            self.user_principal.as_ref(),
            BindingScopes {
                storage: self.resource_id(ResourceKind::StorageAccount)?,
                telemetry: self.resource_id(ResourceKind::ApplicationInsights)?,
            },
        )
    }

    /// Public HTTPS endpoint of the function app.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if the function app has no name.
    pub fn function_endpoint(&self) -> Result<String, CoreError> {
        let name = self.names.require(ResourceKind::FunctionApp)?;
        Ok(format!("https://{name}.azurewebsites.net"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &str = r#"{
        "environmentName": "dev",
        "seed": "funcsj",
        "location": "swedencentral",
        "subscriptionId": "11111111-2222-3333-4444-555555555555",
        "principalId": "user-1",
        "flags": { "enableQueue": true }
    }"#;

    fn params() -> DeploymentParameters {
        match DeploymentParameters::from_json(PARAMS) {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn partial_flags_keep_defaults() {
        let p = params();
        assert!(p.flags.enable_blob, "unset enableBlob must default to true");
        assert!(p.flags.enable_queue);
        assert!(!p.flags.enable_table);
        assert!(p.flags.allow_user_identity_principal);
    }

    #[test]
    fn malformed_parameters_are_reported() {
        let result = DeploymentParameters::from_json("{ \"seed\": 42 }");
        assert!(matches!(result, Err(CoreError::Parameters(_))));
    }

    #[test]
    fn overrides_parse_by_kind() {
        let json = r#"{ "overrides": { "functionApp": "my-api" } }"#;
        let p = match DeploymentParameters::from_json(json) {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(p.overrides.get(ResourceKind::FunctionApp), Some("my-api"));
    }

    #[test]
    fn plan_binds_with_plan_scopes() {
        let plan = match DeploymentPlan::build(&params()) {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let bindings = match plan.bindings(&PrincipalId::new("mi-1")) {
            Ok(b) => b,
            Err(e) => panic!("unexpected error: {e}"),
        };
        // identity: metrics, blob, queue; user: the same three.
        assert_eq!(bindings.len(), 6);
        let storage = plan.resource_id(ResourceKind::StorageAccount).ok();
        assert!(bindings.iter().any(|b| Some(&b.scope) == storage));
    }

    #[test]
    fn plan_without_seed_or_environment_fails() {
        let mut p = params();
        p.seed.clear();
        p.environment_name.clear();
        assert!(matches!(DeploymentPlan::build(&p), Err(CoreError::Config { .. })));
    }

    #[test]
    fn plan_json_is_camel_case_throughout() {
        let plan = match DeploymentPlan::build(&params()) {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let json = match serde_json::to_value(&plan) {
            Ok(v) => v,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let context = &json["context"];
        assert_eq!(context["subscriptionId"], "11111111-2222-3333-4444-555555555555");
        assert_eq!(context["environmentId"], "dev");
        assert_eq!(context["rawSeed"], "funcsj");
        assert!(context.get("subscription_id").is_none());
        assert!(json["userPrincipal"].is_string());
    }

    #[test]
    fn endpoint_uses_function_app_name() {
        let plan = match DeploymentPlan::build(&params()) {
            Ok(p) => p,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let endpoint = plan.function_endpoint().unwrap_or_default();
        assert!(endpoint.starts_with("https://func-funcsj-"));
        assert!(endpoint.ends_with(".azurewebsites.net"));
    }
}
