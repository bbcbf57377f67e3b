//! Conditional role binding.
//!
//! Each rule is evaluated once, independently, into a [`BindingDecision`].
//! Emitted bindings are collected into a [`RoleBindingSet`] keyed by their
//! deterministic [`AssignmentName`], so the output is a set and re-applying
//! it never creates duplicates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::id::{AssignmentName, PrincipalId, ResourceId};

/// Which data-plane features the function app uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[non_exhaustive]
#[allow(clippy::struct_excessive_bools)]
pub struct FeatureFlags {
    /// Grant blob access on the storage account.
    pub enable_blob: bool,
    /// Grant queue access on the storage account.
    pub enable_queue: bool,
    /// Grant table access on the storage account.
    pub enable_table: bool,
    /// Mirror grants to the deploying user for local development.
    pub allow_user_identity_principal: bool,
}

impl FeatureFlags {
    /// Flags with every field given explicitly.
    #[must_use]
    pub const fn new(
        enable_blob: bool,
        enable_queue: bool,
        enable_table: bool,
        allow_user_identity_principal: bool,
    ) -> Self {
        Self { enable_blob, enable_queue, enable_table, allow_user_identity_principal }
    }
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self::new(true, false, false, true)
    }
}

/// Built-in roles the deployment grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum Role {
    /// Storage Blob Data Owner.
    BlobDataOwner,
    /// Storage Queue Data Contributor.
    QueueDataContributor,
    /// Storage Table Data Contributor.
    TableDataContributor,
    /// Monitoring Metrics Publisher.
    MetricsPublisher,
}

impl Role {
    /// Built-in role definition id.
    #[must_use]
    pub const fn definition_id(self) -> Uuid {
        match self {
            Self::BlobDataOwner => Uuid::from_u128(0xb7e6_dc6d_f1e8_4753_8033_0f27_6bb0_955b),
            Self::QueueDataContributor => {
                Uuid::from_u128(0x974c_5e8b_45b9_4653_ba55_5f85_5dd0_fb88)
            }
            Self::TableDataContributor => {
                Uuid::from_u128(0x0a9a_7e1f_b9d0_4cc4_a60d_0319_b160_aaa3)
            }
            Self::MetricsPublisher => Uuid::from_u128(0x3913_510d_42f4_4e42_8a64_420c_3900_55eb),
        }
    }

    /// Display name as shown in the portal.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::BlobDataOwner => "Storage Blob Data Owner",
            Self::QueueDataContributor => "Storage Queue Data Contributor",
            Self::TableDataContributor => "Storage Table Data Contributor",
            Self::MetricsPublisher => "Monitoring Metrics Publisher",
        }
    }

    /// Subscription-scoped role definition resource id.
    #[must_use]
    pub fn definition_resource_id(self, subscription_id: &str) -> String {
        format!(
            "/subscriptions/{subscription_id}/providers/Microsoft.Authorization/roleDefinitions/{}",
            self.definition_id()
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// The type of principal a binding targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PrincipalKind {
    /// A managed identity or application.
    ServicePrincipal,
    /// An interactive user.
    User,
}

/// One access grant: principal × role × scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct RoleBinding {
    /// Deterministic assignment name; the binding's identity.
    pub name: AssignmentName,
    /// Role granted.
    pub role: Role,
    /// Principal receiving the grant.
    pub principal_id: PrincipalId,
    /// Type of the principal.
    pub principal_kind: PrincipalKind,
    /// Resource the grant applies to.
    pub scope: ResourceId,
}

impl RoleBinding {
    /// Create a binding; its name is derived from `(scope, principal, role)`.
    #[must_use]
    pub fn new(
        role: Role,
        principal_id: PrincipalId,
        principal_kind: PrincipalKind,
        scope: ResourceId,
    ) -> Self {
        let name = AssignmentName::derive(&scope, &principal_id, role.definition_id());
        Self { name, role, principal_id, principal_kind, scope }
    }
}

/// Outcome of evaluating one binding rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingDecision {
    /// The rule fired.
    Emit(RoleBinding),
    /// The rule did not fire.
    Skip,
}

impl BindingDecision {
    fn when(condition: bool, binding: impl FnOnce() -> RoleBinding) -> Self {
        if condition {
            Self::Emit(binding())
        } else {
            Self::Skip
        }
    }
}

/// Set of bindings keyed by assignment name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<RoleBinding>", try_from = "Vec<RoleBinding>")]
pub struct RoleBindingSet(BTreeMap<AssignmentName, RoleBinding>);

impl RoleBindingSet {
    /// Add a binding.
    ///
    /// # Errors
    /// Returns [`CoreError::BindingConflict`] if a binding with the same
    /// assignment name is already present.
    pub fn insert(&mut self, binding: RoleBinding) -> Result<(), CoreError> {
        if self.0.contains_key(&binding.name) {
            return Err(CoreError::BindingConflict {
                role: binding.role.to_string(),
                principal_id: binding.principal_id.to_string(),
                scope: binding.scope.to_string(),
            });
        }
        self.0.insert(binding.name, binding);
        Ok(())
    }

    /// Iterate bindings ordered by assignment name.
    pub fn iter(&self) -> impl Iterator<Item = &RoleBinding> {
        self.0.values()
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set holds no bindings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `principal` holds `role` anywhere in the set.
    #[must_use]
    pub fn contains(&self, role: Role, principal: &PrincipalId) -> bool {
        self.0.values().any(|b| b.role == role && &b.principal_id == principal)
    }

    /// Bindings held by principals of `kind`.
    pub fn for_kind(&self, kind: PrincipalKind) -> impl Iterator<Item = &RoleBinding> {
        self.0.values().filter(move |b| b.principal_kind == kind)
    }
}

impl From<RoleBindingSet> for Vec<RoleBinding> {
    fn from(set: RoleBindingSet) -> Self {
        set.0.into_values().collect()
    }
}

impl TryFrom<Vec<RoleBinding>> for RoleBindingSet {
    type Error = CoreError;

    fn try_from(bindings: Vec<RoleBinding>) -> Result<Self, Self::Error> {
        let mut set = Self::default();
        for binding in bindings {
            set.insert(binding)?;
        }
        Ok(set)
    }
}

/// Scopes the binder grants on.
#[derive(Debug, Clone, Copy)]
pub struct BindingScopes<'a> {
    /// Storage account id.
    pub storage: &'a ResourceId,
    /// Application Insights id.
    pub telemetry: &'a ResourceId,
}

/// Compute every role binding for a deployment.
///
/// Rules:
/// - the managed identity always gets `MetricsPublisher` on telemetry;
/// - each enabled storage feature grants its role to the managed identity;
/// - when user principals are allowed and one is given, the user mirrors
///   every storage grant and gets `MetricsPublisher` on telemetry.
///
/// # Errors
/// - [`CoreError::Config`] if `managed_identity` is blank.
/// - [`CoreError::BindingConflict`] if two rules produce the same triple,
///   e.g. when the user principal equals the managed identity.
pub fn compute_bindings(
    flags: FeatureFlags,
    managed_identity: &PrincipalId,
    user: Option<&PrincipalId>,
    scopes: BindingScopes<'_>,
) -> Result<RoleBindingSet, CoreError> {
    if managed_identity.is_empty() {
        return Err(CoreError::config("managed identity principal id is empty"));
    }
    let user = user.filter(|u| !u.is_empty() && flags.allow_user_identity_principal);

    let storage_roles = [
        (Role::BlobDataOwner, flags.enable_blob),
        (Role::QueueDataContributor, flags.enable_queue),
        (Role::TableDataContributor, flags.enable_table),
    ];

    let identity = |role, scope: &ResourceId| {
        RoleBinding::new(role, managed_identity.clone(), PrincipalKind::ServicePrincipal, scope.clone())
    };

    let mut decisions = Vec::with_capacity(8);
    decisions.push(BindingDecision::Emit(identity(Role::MetricsPublisher, scopes.telemetry)));
    for (role, enabled) in storage_roles {
        decisions.push(BindingDecision::when(enabled, || identity(role, scopes.storage)));
    }
    if let Some(user) = user {
        let for_user = |role, scope: &ResourceId| {
            RoleBinding::new(role, user.clone(), PrincipalKind::User, scope.clone())
        };
        for (role, enabled) in storage_roles {
            decisions.push(BindingDecision::when(enabled, || for_user(role, scopes.storage)));
        }
        decisions.push(BindingDecision::Emit(for_user(Role::MetricsPublisher, scopes.telemetry)));
    }

    let mut set = RoleBindingSet::default();
    for decision in decisions {
        if let BindingDecision::Emit(binding) = decision {
            set.insert(binding)?;
        }
    }

    tracing::debug!(
        count = set.len(),
        user_bindings = set.for_kind(PrincipalKind::User).count(),
        "computed role bindings"
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORAGE: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/st";
    const TELEMETRY: &str = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Insights/components/appi";

    fn scopes() -> (ResourceId, ResourceId) {
        (ResourceId(STORAGE.to_owned()), ResourceId(TELEMETRY.to_owned()))
    }

    fn compute(flags: FeatureFlags, identity: &str, user: Option<&str>) -> Result<RoleBindingSet, CoreError> {
        let (storage, telemetry) = scopes();
        let user = user.map(PrincipalId::new);
        compute_bindings(
            flags,
            &PrincipalId::new(identity),
            user.as_ref(),
            BindingScopes { storage: &storage, telemetry: &telemetry },
        )
    }

    #[test]
    fn blob_only_with_user_yields_four_bindings() {
        let flags = FeatureFlags::new(true, false, false, true);
        let set = match compute(flags, "mi-1", Some("user-1")) {
            Ok(s) => s,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(set.len(), 4);
        let mi = PrincipalId::new("mi-1");
        let user = PrincipalId::new("user-1");
        assert!(set.contains(Role::BlobDataOwner, &mi));
        assert!(set.contains(Role::MetricsPublisher, &mi));
        assert!(set.contains(Role::BlobDataOwner, &user));
        assert!(set.contains(Role::MetricsPublisher, &user));
        assert!(set.iter().all(|b| b.role != Role::QueueDataContributor && b.role != Role::TableDataContributor));
    }

    #[test]
    fn user_bindings_disabled_by_flag() {
        for (blob, queue, table) in [(true, true, true), (false, false, false), (true, false, true)] {
            let flags = FeatureFlags::new(blob, queue, table, false);
            let set = match compute(flags, "mi-1", Some("user-1")) {
                Ok(s) => s,
                Err(e) => panic!("unexpected error: {e}"),
            };
            assert_eq!(set.for_kind(PrincipalKind::User).count(), 0);
        }
    }

    #[test]
    fn empty_user_is_not_an_error() {
        let set = match compute(FeatureFlags::default(), "mi-1", Some("  ")) {
            Ok(s) => s,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(set.for_kind(PrincipalKind::User).count(), 0);
        assert_eq!(set.len(), 2, "metrics + blob for the identity only");
    }

    #[test]
    fn empty_identity_is_config_error() {
        assert!(matches!(compute(FeatureFlags::default(), "", Some("user-1")), Err(CoreError::Config { .. })));
    }

    #[test]
    fn all_features_grant_eight_bindings() {
        let set = match compute(FeatureFlags::new(true, true, true, true), "mi-1", Some("user-1")) {
            Ok(s) => s,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(set.len(), 8);
        let storage_bindings = set.iter().filter(|b| b.scope.as_str() == STORAGE).count();
        assert_eq!(storage_bindings, 6);
    }

    #[test]
    fn user_equal_to_identity_is_conflict() {
        let result = compute(FeatureFlags::default(), "same", Some("same"));
        assert!(matches!(result, Err(CoreError::BindingConflict { .. })));
    }

    #[test]
    fn assignment_name_is_deterministic() {
        let (storage, _) = scopes();
        let a = RoleBinding::new(Role::BlobDataOwner, PrincipalId::new("p"), PrincipalKind::User, storage.clone());
        let b = RoleBinding::new(Role::BlobDataOwner, PrincipalId::new("p"), PrincipalKind::User, storage.clone());
        let c = RoleBinding::new(Role::QueueDataContributor, PrincipalId::new("p"), PrincipalKind::User, storage);
        assert_eq!(a.name, b.name);
        assert_ne!(a.name, c.name);
    }

    #[test]
    fn role_definition_ids_are_distinct() {
        let ids = [
            Role::BlobDataOwner,
            Role::QueueDataContributor,
            Role::TableDataContributor,
            Role::MetricsPublisher,
        ]
        .map(Role::definition_id);
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
        assert_eq!(
            Role::BlobDataOwner.definition_id().to_string(),
            "b7e6dc6d-f1e8-4753-8033-0f276bb0955b"
        );
    }

    #[test]
    fn binding_set_round_trips_through_json() {
        let set = match compute(FeatureFlags::default(), "mi-1", Some("user-1")) {
            Ok(s) => s,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let json = match serde_json::to_string(&set) {
            Ok(j) => j,
            Err(e) => panic!("unexpected error: {e}"),
        };
        let back: RoleBindingSet = match serde_json::from_str(&json) {
            Ok(s) => s,
            Err(e) => panic!("unexpected error: {e}"),
        };
        assert_eq!(set, back);
    }

    proptest::proptest! {
        #[test]
        fn proptest_binding_count_matches_rules(
            blob: bool, queue: bool, table: bool, allow_user: bool, has_user: bool,
        ) {
            let flags = FeatureFlags::new(blob, queue, table, allow_user);
            let user = if has_user { Some("user-1") } else { None };
            let set = compute(flags, "mi-1", user);
            proptest::prop_assert!(set.is_ok());
            let set = set.unwrap_or_default();

            let storage = usize::from(blob) + usize::from(queue) + usize::from(table);
            let user_count = if allow_user && has_user { storage + 1 } else { 0 };
            proptest::prop_assert_eq!(set.for_kind(PrincipalKind::ServicePrincipal).count(), storage + 1);
            proptest::prop_assert_eq!(set.for_kind(PrincipalKind::User).count(), user_count);
        }
    }
}
