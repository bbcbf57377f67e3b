//! Resource kinds and name resolution.
//!
//! Every kind either takes an explicit override verbatim or synthesizes a
//! name from its abbreviation, the naming seed, and the resource token.
//! Names that embed other names are resolved after their dependencies, in
//! topological order over [`ResourceKind::depends_on`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{take, NamingSeed, ResourceToken};
use crate::seed::NamingContext;
use crate::token::derive_token;

/// A kind of resource the deployment declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum ResourceKind {
    /// Resource group holding everything else.
    ResourceGroup,
    /// Log Analytics workspace backing Application Insights.
    LogAnalytics,
    /// Application Insights component; the telemetry binding scope.
    ApplicationInsights,
    /// Flex-consumption hosting plan.
    AppServicePlan,
    /// Storage account; the storage binding scope.
    StorageAccount,
    /// Blob container the function app pulls its package from.
    DeploymentContainer,
    /// User-assigned managed identity the app authenticates as.
    UserAssignedIdentity,
    /// The function app itself.
    FunctionApp,
}

impl ResourceKind {
    /// Every kind, in declaration order.
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::ResourceGroup,
        ResourceKind::LogAnalytics,
        ResourceKind::ApplicationInsights,
        ResourceKind::AppServicePlan,
        ResourceKind::StorageAccount,
        ResourceKind::DeploymentContainer,
        ResourceKind::UserAssignedIdentity,
        ResourceKind::FunctionApp,
    ];

    /// Stable camelCase identifier, matching the serde form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceGroup => "resourceGroup",
            Self::LogAnalytics => "logAnalytics",
            Self::ApplicationInsights => "applicationInsights",
            Self::AppServicePlan => "appServicePlan",
            Self::StorageAccount => "storageAccount",
            Self::DeploymentContainer => "deploymentContainer",
            Self::UserAssignedIdentity => "userAssignedIdentity",
            Self::FunctionApp => "functionApp",
        }
    }

    /// Name prefix for synthesized names.
    #[must_use]
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::ResourceGroup => "rg-",
            Self::LogAnalytics => "log-",
            Self::ApplicationInsights => "appi-",
            Self::AppServicePlan => "plan-",
            Self::StorageAccount => "st",
            Self::DeploymentContainer => "app-package-",
            Self::UserAssignedIdentity => "id-",
            Self::FunctionApp => "func-",
        }
    }

    /// Provider-imposed maximum name length.
    #[must_use]
    pub const fn max_len(self) -> usize {
        match self {
            Self::ResourceGroup => 90,
            Self::LogAnalytics | Self::DeploymentContainer => 63,
            Self::ApplicationInsights => 260,
            Self::AppServicePlan | Self::FunctionApp => 60,
            Self::StorageAccount => 24,
            Self::UserAssignedIdentity => 128,
        }
    }

    /// How a name is synthesized when no override is given.
    #[must_use]
    pub const fn pattern(self) -> NamingPattern {
        match self {
            Self::ResourceGroup => NamingPattern::Seeded,
            Self::StorageAccount => NamingPattern::Compact { take: 6 },
            Self::DeploymentContainer => NamingPattern::Derived {
                from: Self::FunctionApp,
                take_parent: 32,
                take_token: 7,
            },
            Self::LogAnalytics
            | Self::ApplicationInsights
            | Self::AppServicePlan
            | Self::UserAssignedIdentity
            | Self::FunctionApp => NamingPattern::SeedToken,
        }
    }

    /// Characters a synthesized name may contain.
    #[must_use]
    pub const fn charset(self) -> Charset {
        match self {
            Self::StorageAccount => Charset::LowerAlphanumeric,
            Self::DeploymentContainer => Charset::LowerAlphanumericHyphen,
            Self::LogAnalytics | Self::AppServicePlan | Self::FunctionApp => {
                Charset::AlphanumericHyphen
            }
            Self::ResourceGroup | Self::ApplicationInsights | Self::UserAssignedIdentity => {
                Charset::Extended
            }
        }
    }

    /// Kinds whose resolved names this kind's name embeds.
    #[must_use]
    pub fn depends_on(self) -> Vec<ResourceKind> {
        match self.pattern() {
            NamingPattern::Derived { from, .. } => vec![from],
            _ => Vec::new(),
        }
    }

    /// ARM provider type, or `None` for the resource group itself.
    #[must_use]
    pub const fn provider_type(self) -> Option<&'static str> {
        match self {
            Self::ResourceGroup => None,
            Self::LogAnalytics => Some("Microsoft.OperationalInsights/workspaces"),
            Self::ApplicationInsights => Some("Microsoft.Insights/components"),
            Self::AppServicePlan => Some("Microsoft.Web/serverfarms"),
            Self::StorageAccount => Some("Microsoft.Storage/storageAccounts"),
            Self::DeploymentContainer => {
                Some("Microsoft.Storage/storageAccounts/blobServices/containers")
            }
            Self::UserAssignedIdentity => {
                Some("Microsoft.ManagedIdentity/userAssignedIdentities")
            }
            Self::FunctionApp => Some("Microsoft.Web/sites"),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a synthesized name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NamingPattern {
    /// `abbreviation + seed`.
    Seeded,
    /// `abbreviation + seed + "-" + token`.
    SeedToken,
    /// `abbreviation + seed + take(token, take)`, for tight length ceilings.
    Compact { take: usize },
    /// `abbreviation + take(lower(name(from)), take_parent) + "-" +
    /// take(derive_token(name(from), token), take_token)`.
    Derived {
        from: ResourceKind,
        take_parent: usize,
        take_token: usize,
    },
}

/// Allowed characters of a synthesized name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Charset {
    /// `[a-z0-9]`
    LowerAlphanumeric,
    /// `[a-z0-9-]`
    LowerAlphanumericHyphen,
    /// `[A-Za-z0-9-]`
    AlphanumericHyphen,
    /// `[A-Za-z0-9-_.()]`
    Extended,
}

impl Charset {
    /// Returns `true` if `c` may appear in a name.
    #[must_use]
    pub fn allows(self, c: char) -> bool {
        match self {
            Self::LowerAlphanumeric => c.is_ascii_lowercase() || c.is_ascii_digit(),
            Self::LowerAlphanumericHyphen => {
                c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
            }
            Self::AlphanumericHyphen => c.is_ascii_alphanumeric() || c == '-',
            Self::Extended => c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '(' | ')'),
        }
    }
}

/// Explicit names supplied by the operator, keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameOverrides(BTreeMap<ResourceKind, String>);

impl NameOverrides {
    /// An empty override set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the override for `kind`.
    #[must_use]
    pub fn with(mut self, kind: ResourceKind, name: impl Into<String>) -> Self {
        self.0.insert(kind, name.into());
        self
    }

    /// The override for `kind`, if one is set and non-empty.
    #[must_use]
    pub fn get(&self, kind: ResourceKind) -> Option<&str> {
        self.0.get(&kind).map(String::as_str).filter(|s| !s.is_empty())
    }
}

/// Resolved name per resource kind. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceNameSet(BTreeMap<ResourceKind, String>);

impl ResourceNameSet {
    /// The resolved name for `kind`.
    #[must_use]
    pub fn get(&self, kind: ResourceKind) -> Option<&str> {
        self.0.get(&kind).map(String::as_str)
    }

    /// The resolved name for `kind`, or an error if it was never resolved.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if `kind` has no entry.
    pub fn require(&self, kind: ResourceKind) -> Result<&str, CoreError> {
        self.get(kind)
            .ok_or_else(|| CoreError::config(format!("no name resolved for {kind}")))
    }

    /// Iterate `(kind, name)` pairs in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Number of resolved names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing has been resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolve one name.
///
/// Returns the override verbatim when present. Otherwise synthesizes the
/// name from `kind`'s pattern and checks it against the kind's length
/// ceiling and character set. `resolved` must already hold every kind in
/// [`ResourceKind::depends_on`].
///
/// # Errors
/// - [`CoreError::NameLength`] if the synthesized name is too long.
/// - [`CoreError::InvalidName`] if it contains disallowed characters.
/// - [`CoreError::Config`] if a dependency has not been resolved yet.
pub fn resolve_name(
    kind: ResourceKind,
    override_name: Option<&str>,
    seed: &NamingSeed,
    token: &ResourceToken,
    resolved: &ResourceNameSet,
) -> Result<String, CoreError> {
    if let Some(name) = override_name.filter(|s| !s.is_empty()) {
        tracing::debug!(%kind, name, "using explicit name");
        return Ok(name.to_owned());
    }

    let abbr = kind.abbreviation();
    let name = match kind.pattern() {
        NamingPattern::Seeded => format!("{abbr}{seed}"),
        NamingPattern::SeedToken => format!("{abbr}{seed}-{token}"),
        NamingPattern::Compact { take: n } => format!("{abbr}{seed}{}", token.take(n)),
        NamingPattern::Derived { from, take_parent, take_token } => {
            let parent = resolved.require(from)?.to_lowercase();
            let suffix = derive_token(&[&parent, token.as_str()]);
            format!("{abbr}{}-{}", take(&parent, take_parent), suffix.take(take_token))
        }
    };

    validate(kind, &name)?;
    tracing::debug!(%kind, %name, "synthesized name");
    Ok(name)
}

fn validate(kind: ResourceKind, name: &str) -> Result<(), CoreError> {
    let len = name.chars().count();
    if len > kind.max_len() {
        return Err(CoreError::NameLength {
            kind,
            name: name.to_owned(),
            len,
            max: kind.max_len(),
        });
    }
    let charset = kind.charset();
    if let Some(bad) = name.chars().find(|c| !charset.allows(*c)) {
        return Err(CoreError::InvalidName {
            kind,
            name: name.to_owned(),
            reason: format!("character '{bad}' is not allowed"),
        });
    }
    Ok(())
}

/// Resolve every kind's name for one deployment.
///
/// # Errors
/// Propagates [`resolve_name`] errors, and returns
/// [`CoreError::DependencyCycle`] if the name dependencies are cyclic.
pub fn resolve_names(
    ctx: &NamingContext,
    overrides: &NameOverrides,
) -> Result<ResourceNameSet, CoreError> {
    let order = resolution_order(&ResourceKind::ALL, ResourceKind::depends_on)?;
    let mut resolved = ResourceNameSet::default();
    for kind in order {
        let name = resolve_name(kind, overrides.get(kind), &ctx.seed, &ctx.token, &resolved)?;
        resolved.0.insert(kind, name);
    }
    Ok(resolved)
}

/// Order `kinds` so every kind follows its dependencies.
///
/// Kahn's algorithm; ties break on kind order so the result is stable.
///
/// # Errors
/// Returns [`CoreError::DependencyCycle`] listing the kinds left unordered.
pub fn resolution_order<F>(kinds: &[ResourceKind], deps: F) -> Result<Vec<ResourceKind>, CoreError>
where
    F: Fn(ResourceKind) -> Vec<ResourceKind>,
{
    let nodes: BTreeSet<ResourceKind> = kinds.iter().copied().collect();
    let mut pending: BTreeMap<ResourceKind, BTreeSet<ResourceKind>> = nodes
        .iter()
        .map(|&k| (k, deps(k).into_iter().filter(|d| nodes.contains(d)).collect()))
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(next) = pending.iter().find(|(_, d)| d.is_empty()).map(|(k, _)| *k) {
        pending.remove(&next);
        for remaining in pending.values_mut() {
            remaining.remove(&next);
        }
        order.push(next);
    }

    if !pending.is_empty() {
        return Err(CoreError::DependencyCycle { kinds: pending.into_keys().collect() });
    }
    Ok(order)
}
