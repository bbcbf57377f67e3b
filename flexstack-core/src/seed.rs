//! Seed resolution and the per-invocation naming context.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{NamingSeed, ResourceToken};
use crate::token::generate_token;

/// Inputs every synthesized name derives from.
///
/// Built once per invocation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct NamingContext {
    /// Operator-supplied seed; may be empty.
    pub raw_seed: String,
    /// Environment identifier used when no seed is given.
    pub environment_id: String,
    /// Target region (e.g. `"swedencentral"`).
    pub location: String,
    /// Subscription that owns every resource.
    pub subscription_id: String,
    /// Result of [`resolve_seed`].
    pub seed: NamingSeed,
    /// Result of [`generate_token`] over `(subscription_id, seed, location)`.
    pub token: ResourceToken,
}

impl NamingContext {
    /// Resolve the seed and token for one deployment.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if both seed sources are empty, or if
    /// `location` or `subscription_id` is empty.
    pub fn new(
        raw_seed: &str,
        environment_id: &str,
        location: &str,
        subscription_id: &str,
    ) -> Result<Self, CoreError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(CoreError::config("location must not be empty"));
        }
        let subscription_id = subscription_id.trim();
        if subscription_id.is_empty() {
            return Err(CoreError::config("subscription id must not be empty"));
        }

        let seed = resolve_seed(raw_seed, environment_id)?;
        let token = generate_token(subscription_id, seed.as_str(), location);

        tracing::debug!(%seed, %token, location, "naming context resolved");

        Ok(Self {
            raw_seed: raw_seed.to_owned(),
            environment_id: environment_id.to_owned(),
            location: location.to_owned(),
            subscription_id: subscription_id.to_owned(),
            seed,
            token,
        })
    }
}

/// Pick the effective seed and normalize it.
///
/// `raw_seed` wins when it has any non-whitespace content; otherwise
/// `environment_id` is used. The result is lowercased with all whitespace
/// removed.
///
/// # Errors
/// Returns [`CoreError::Config`] if both inputs are blank.
pub fn resolve_seed(raw_seed: &str, environment_id: &str) -> Result<NamingSeed, CoreError> {
    let effective = if raw_seed.trim().is_empty() { environment_id } else { raw_seed };
    let normalized = normalize(effective);
    if normalized.is_empty() {
        return Err(CoreError::config(
            "naming seed is empty: supply a seed or an environment name",
        ));
    }
    Ok(NamingSeed(normalized))
}

fn normalize(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}
