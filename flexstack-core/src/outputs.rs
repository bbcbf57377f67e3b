//! Values handed back to the calling automation after provisioning.

use serde::{Deserialize, Serialize};

/// Post-provisioning values consumed by the code-deployment step.
///
/// Serialized with the environment-variable names the deploy tooling reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct DeploymentOutputs {
    /// Name of the function app.
    #[serde(rename = "AZURE_FUNCTION_NAME")]
    pub function_app_name: String,
    /// Public HTTPS endpoint of the function app.
    #[serde(rename = "SERVICE_API_URI")]
    pub function_endpoint: String,
    /// Storage account resource id.
    #[serde(rename = "AZURE_STORAGE_ACCOUNT_ID")]
    pub storage_account_id: String,
    /// Application Insights connection string.
    #[serde(rename = "APPLICATIONINSIGHTS_CONNECTION_STRING")]
    pub application_insights_connection_string: String,
    /// Directory tenant the identities live in.
    #[serde(rename = "AZURE_TENANT_ID")]
    pub tenant_id: String,
    /// Resource group resource id.
    #[serde(rename = "AZURE_RESOURCE_GROUP_ID")]
    pub resource_group_id: String,
    /// Client id of the user-assigned identity.
    #[serde(rename = "AZURE_CLIENT_ID")]
    pub identity_client_id: String,
}

impl DeploymentOutputs {
    /// Create an output record.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        function_app_name: String,
        function_endpoint: String,
        storage_account_id: String,
        application_insights_connection_string: String,
        tenant_id: String,
        resource_group_id: String,
        identity_client_id: String,
    ) -> Self {
        Self {
            function_app_name,
            function_endpoint,
            storage_account_id,
            application_insights_connection_string,
            tenant_id,
            resource_group_id,
            identity_client_id,
        }
    }

    /// `(key, value)` pairs in a fixed order.
    #[must_use]
    pub fn pairs(&self) -> [(&'static str, &str); 7] {
        [
            ("AZURE_FUNCTION_NAME", self.function_app_name.as_str()),
            ("SERVICE_API_URI", self.function_endpoint.as_str()),
            ("AZURE_STORAGE_ACCOUNT_ID", self.storage_account_id.as_str()),
            (
                "APPLICATIONINSIGHTS_CONNECTION_STRING",
                self.application_insights_connection_string.as_str(),
            ),
            ("AZURE_TENANT_ID", self.tenant_id.as_str()),
            ("AZURE_RESOURCE_GROUP_ID", self.resource_group_id.as_str()),
            ("AZURE_CLIENT_ID", self.identity_client_id.as_str()),
        ]
    }

    /// Render as `.env` lines: `KEY="value"`, one per line.
    #[must_use]
    pub fn to_env_lines(&self) -> String {
        self.pairs()
            .iter()
            .map(|(k, v)| format!("{k}=\"{}\"\n", v.replace('\\', "\\\\").replace('"', "\\\"")))
            .collect()
    }
}
