//! Subcommand handlers. Each returns the text to print on stdout.

use serde::Serialize;

use flexstack_core::{DeploymentPlan, PrincipalId, RoleBindingSet};
use flexstack_provision::{Deployer, InMemoryControlPlane, RetryPolicy};

use crate::cli::{Cli, Command};
use crate::CliError;

#[derive(Serialize)]
struct PlanOutput<'a> {
    plan: &'a DeploymentPlan,
    bindings: &'a RoleBindingSet,
}

/// Execute a parsed command line.
///
/// # Errors
/// Returns the first [`CliError`] raised while building or applying the plan.
pub async fn run(cli: Cli) -> Result<String, CliError> {
    let params = cli.params.resolve()?;
    let plan = DeploymentPlan::build(&params)?;

    match cli.command {
        Command::Names => Ok(serde_json::to_string_pretty(&plan.names)?),
        Command::Plan { identity_principal_id } => {
            let bindings = plan.bindings(&PrincipalId::new(identity_principal_id))?;
            Ok(serde_json::to_string_pretty(&PlanOutput { plan: &plan, bindings: &bindings })?)
        }
        Command::Simulate { package, env, propagation_checks, max_attempts } => {
            let package = match &package {
                Some(path) => Some(
                    std::fs::read(path)
                        .map_err(|source| CliError::Read { path: path.clone(), source })?,
                ),
                None => None,
            };

            let plane = InMemoryControlPlane::new().with_propagation_checks(propagation_checks);
            let deployer = Deployer::with_policy(plane, RetryPolicy::immediate(max_attempts));
            let outputs = deployer.run(&plan, package.as_deref()).await?;

            let applied = deployer.applied_count().await;
            tracing::info!(
                function_app = %outputs.function_app_name,
                bindings = applied,
                "simulated deployment complete"
            );

            if env {
                Ok(outputs.to_env_lines().trim_end().to_owned())
            } else {
                Ok(serde_json::to_string_pretty(&outputs)?)
            }
        }
    }
}
