//! Resource declarations derived from a resolved name set.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::ResourceId;
use crate::names::{resolution_order, ResourceKind, ResourceNameSet};
use crate::seed::NamingContext;

/// One resource the control plane must ensure exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct ResourceDeclaration {
    /// What this resource is.
    pub kind: ResourceKind,
    /// Resolved name.
    pub name: String,
    /// Fully qualified identifier.
    pub id: ResourceId,
    /// Region the resource is placed in.
    pub location: String,
    /// Resources that must exist before this one.
    pub depends_on: Vec<ResourceKind>,
}

/// Kinds that must be created before `kind` can be.
///
/// Distinct from [`ResourceKind::depends_on`], which only covers names.
#[must_use]
pub fn provisioning_dependencies(kind: ResourceKind) -> Vec<ResourceKind> {
    use ResourceKind as K;
    match kind {
        K::ResourceGroup => vec![],
        K::LogAnalytics | K::AppServicePlan | K::StorageAccount | K::UserAssignedIdentity => {
            vec![K::ResourceGroup]
        }
        K::ApplicationInsights => vec![K::ResourceGroup, K::LogAnalytics],
        K::DeploymentContainer => vec![K::StorageAccount],
        K::FunctionApp => vec![
            K::AppServicePlan,
            K::StorageAccount,
            K::DeploymentContainer,
            K::ApplicationInsights,
            K::UserAssignedIdentity,
        ],
    }
}

/// Build the resource id for `kind`.
///
/// # Errors
/// Returns [`CoreError::Config`] if a parent name is missing from `names`.
pub fn resource_id(
    ctx: &NamingContext,
    names: &ResourceNameSet,
    kind: ResourceKind,
) -> Result<ResourceId, CoreError> {
    let group = ResourceId::resource_group(
        &ctx.subscription_id,
        names.require(ResourceKind::ResourceGroup)?,
    );
    let name = names.require(kind)?;
    Ok(match kind {
        ResourceKind::ResourceGroup => group,
        ResourceKind::DeploymentContainer => {
            let account = resource_id(ctx, names, ResourceKind::StorageAccount)?;
            account.child("blobServices/default/containers", name)
        }
        other => match other.provider_type() {
            Some(provider) => group.provider(provider, name),
            None => group,
        },
    })
}

/// Declare every resource in creation order.
///
/// # Errors
/// Returns [`CoreError::DependencyCycle`] if the creation graph is cyclic,
/// or [`CoreError::Config`] if `names` is incomplete.
pub fn declare_resources(
    ctx: &NamingContext,
    names: &ResourceNameSet,
) -> Result<Vec<ResourceDeclaration>, CoreError> {
    resolution_order(&ResourceKind::ALL, provisioning_dependencies)?
        .into_iter()
        .map(|kind| {
            Ok(ResourceDeclaration {
                kind,
                name: names.require(kind)?.to_owned(),
                id: resource_id(ctx, names, kind)?,
                location: ctx.location.clone(),
                depends_on: provisioning_dependencies(kind),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::{resolve_names, NameOverrides};

    fn fixture() -> (NamingContext, ResourceNameSet) {
        let ctx = match NamingContext::new("funcsj", "", "swedencentral", "sub-1") {
            Ok(c) => c,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let names = match resolve_names(&ctx, &NameOverrides::new()) {
            Ok(n) => n,
            Err(e) => panic!("unexpected error: {e}"),
        };
        (ctx, names)
    }

    #[test]
    fn declarations_follow_creation_order() {
        let (ctx, names) = fixture();
        let decls = match declare_resources(&ctx, &names) {
            Ok(d) => d,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(decls.len(), ResourceKind::ALL.len());
        assert_eq!(decls[0].kind, ResourceKind::ResourceGroup);
        assert_eq!(decls.last().map(|d| d.kind), Some(ResourceKind::FunctionApp));

        for (i, decl) in decls.iter().enumerate() {
            for dep in &decl.depends_on {
                let dep_pos = decls.iter().position(|d| d.kind == *dep).unwrap_or(usize::MAX);
                assert!(dep_pos < i, "{} must be declared before {}", dep, decl.kind);
            }
        }
    }

    #[test]
    fn storage_id_is_provider_scoped() {
        let (ctx, names) = fixture();
        let id = match resource_id(&ctx, &names, ResourceKind::StorageAccount) {
            Ok(id) => id,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let expected = format!(
            "/subscriptions/sub-1/resourceGroups/rg-funcsj/providers/Microsoft.Storage/storageAccounts/{}",
            names.get(ResourceKind::StorageAccount).unwrap_or_default()
        );
        assert_eq!(id.as_str(), expected);
    }

    #[test]
    fn container_id_nests_under_storage_account() {
        let (ctx, names) = fixture();
        let container = match resource_id(&ctx, &names, ResourceKind::DeploymentContainer) {
            Ok(id) => id,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let account = match resource_id(&ctx, &names, ResourceKind::StorageAccount) {
            Ok(id) => id,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert!(container.as_str().starts_with(account.as_str()));
        assert!(container.as_str().contains("/blobServices/default/containers/app-package-"));
    }
}
