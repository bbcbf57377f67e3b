//! Deterministic naming and role binding for a keyless Function App deployment.
//!
//! The pipeline runs once per invocation, purely over its inputs:
//! seed resolution → token generation → name resolution → resource
//! declarations → conditional role bindings. Identical inputs always produce
//! identical names and bindings, which is what makes re-provisioning
//! idempotent.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod id;
pub mod names;
pub mod outputs;
pub mod plan;
pub mod resource;
pub mod roles;
pub mod seed;
pub mod token;

pub use error::CoreError;
pub use id::{AssignmentName, NamingSeed, PrincipalId, ResourceId, ResourceToken};
pub use names::{resolve_name, resolve_names, NameOverrides, ResourceKind, ResourceNameSet};
pub use outputs::DeploymentOutputs;
pub use plan::{DeploymentParameters, DeploymentPlan};
pub use resource::{declare_resources, ResourceDeclaration};
pub use roles::{
    compute_bindings, BindingDecision, BindingScopes, FeatureFlags, PrincipalKind, Role,
    RoleBinding, RoleBindingSet,
};
pub use seed::{resolve_seed, NamingContext};
pub use token::{generate_token, TOKEN_LEN};
