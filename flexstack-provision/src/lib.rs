//! Applies deployment plans to a cloud control plane.
//!
//! Ensures resources, submits role bindings fire-and-forget, and waits out
//! grant propagation with settle-and-retry before uploading application code.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod backend;
pub mod deployer;
pub mod error;
pub mod memory;
pub mod retry;

pub use backend::{ControlPlane, IdentityPrincipal, PackageTarget, ProvisionedResource};
pub use deployer::{Deployer, ProvisionReport, PACKAGE_BLOB};
pub use error::ProvisionError;
pub use memory::InMemoryControlPlane;
pub use retry::{retry_after_settle, RetryPolicy};
