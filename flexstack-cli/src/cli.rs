//! Command-line surface.
//!
//! Parameters layer in order: defaults, then the `--params` file, then
//! flags and their environment variables.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use flexstack_core::{DeploymentParameters, ResourceKind};

use crate::CliError;

/// Plan and simulate keyless Function App deployments.
#[derive(Parser, Debug)]
#[command(name = "flexstack", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub params: ParamArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Deployment inputs shared by every subcommand.
#[derive(Args, Debug, Default)]
pub struct ParamArgs {
    /// JSON parameters file; flags override its values
    #[arg(long = "params", global = true, value_name = "FILE")]
    pub params_file: Option<PathBuf>,

    /// Environment name, used as the seed when no seed is given
    #[arg(long, env = "AZURE_ENV_NAME", global = true)]
    pub environment_name: Option<String>,

    /// Naming seed override
    #[arg(long, env = "FLEXSTACK_SEED", global = true)]
    pub seed: Option<String>,

    /// Target region
    #[arg(long, env = "AZURE_LOCATION", global = true)]
    pub location: Option<String>,

    /// Subscription to deploy into
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID", global = true)]
    pub subscription_id: Option<String>,

    /// Object id of the deploying user
    #[arg(long, env = "AZURE_PRINCIPAL_ID", global = true)]
    pub principal_id: Option<String>,

    /// Explicit resource name, as KIND=NAME (e.g. functionApp=my-api)
    #[arg(long = "name", value_name = "KIND=NAME", value_parser = parse_override, global = true)]
    pub names: Vec<(ResourceKind, String)>,

    /// Do not grant blob access
    #[arg(long, global = true)]
    pub disable_blob: bool,

    /// Grant queue access
    #[arg(long, global = true)]
    pub enable_queue: bool,

    /// Grant table access
    #[arg(long, global = true)]
    pub enable_table: bool,

    /// Do not mirror grants to the deploying user
    #[arg(long, global = true)]
    pub no_user_identity: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved resource names as JSON
    Names,

    /// Print the deployment plan and the role bindings for an identity
    Plan {
        /// Object id of the function app's managed identity
        #[arg(long, env = "FLEXSTACK_IDENTITY_PRINCIPAL_ID")]
        identity_principal_id: String,
    },

    /// Run the deployment against a simulated control plane
    Simulate {
        /// Application package to upload
        #[arg(long, value_name = "FILE")]
        package: Option<PathBuf>,

        /// Print outputs as KEY="value" lines instead of JSON
        #[arg(long)]
        env: bool,

        /// Authorization checks a new grant stays pending for
        #[arg(long, default_value_t = 0)]
        propagation_checks: u32,

        /// Upload attempts before giving up
        #[arg(long, default_value_t = 5)]
        max_attempts: u32,
    },
}

fn parse_override(s: &str) -> Result<(ResourceKind, String), String> {
    let (kind, name) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KIND=NAME, got '{s}'"))?;
    let kind = ResourceKind::ALL
        .into_iter()
        .find(|k| k.as_str() == kind.trim())
        .ok_or_else(|| {
            let known: Vec<_> = ResourceKind::ALL.iter().map(|k| k.as_str()).collect();
            format!("unknown resource kind '{kind}'; expected one of {}", known.join(", "))
        })?;
    Ok((kind, name.to_owned()))
}

impl ParamArgs {
    /// Layer the parameters file and flags into one parameter set.
    ///
    /// # Errors
    /// Returns [`CliError::Read`] if the file cannot be read, or
    /// [`CliError::Core`] if it is not valid parameters JSON.
    pub fn resolve(&self) -> Result<DeploymentParameters, CliError> {
        let mut params = match &self.params_file {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .map_err(|source| CliError::Read { path: path.clone(), source })?;
                DeploymentParameters::from_json(&json)?
            }
            None => DeploymentParameters::default(),
        };

        let set = |field: &mut String, value: &Option<String>| {
            if let Some(v) = value {
                field.clone_from(v);
            }
        };
        set(&mut params.environment_name, &self.environment_name);
        set(&mut params.seed, &self.seed);
        set(&mut params.location, &self.location);
        set(&mut params.subscription_id, &self.subscription_id);
        set(&mut params.principal_id, &self.principal_id);

        for (kind, name) in &self.names {
            params.overrides = std::mem::take(&mut params.overrides).with(*kind, name.clone());
        }

        if self.disable_blob {
            params.flags.enable_blob = false;
        }
        if self.enable_queue {
            params.flags.enable_queue = true;
        }
        if self.enable_table {
            params.flags.enable_table = true;
        }
        if self.no_user_identity {
            params.flags.allow_user_identity_principal = false;
        }

        Ok(params)
    }
}
