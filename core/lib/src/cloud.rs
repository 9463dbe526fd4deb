use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::Capability;
use aws_sdk_cloudformation::Client;
use aws_sdk_sts::Client as StsClient;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[cfg(test)]
mod tests;

/// Region used when neither the configuration nor the environment names one.
pub const DEFAULT_REGION: &str = "us-east-1";

const NO_UPDATES_MESSAGE: &str = "No updates are to be performed";

/// Status of a CloudFormation stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackStatus {
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    RollbackInProgress,
    RollbackComplete,
    RollbackFailed,
    UpdateInProgress,
    UpdateCompleteCleanupInProgress,
    UpdateComplete,
    UpdateRollbackInProgress,
    UpdateRollbackCompleteCleanupInProgress,
    UpdateRollbackComplete,
    UpdateRollbackFailed,
    DeleteInProgress,
    DeleteComplete,
    DeleteFailed,
    Other(String),
}

impl StackStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StackStatus::CreateInProgress => "CREATE_IN_PROGRESS",
            StackStatus::CreateComplete => "CREATE_COMPLETE",
            StackStatus::CreateFailed => "CREATE_FAILED",
            StackStatus::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            StackStatus::RollbackComplete => "ROLLBACK_COMPLETE",
            StackStatus::RollbackFailed => "ROLLBACK_FAILED",
            StackStatus::UpdateInProgress => "UPDATE_IN_PROGRESS",
            StackStatus::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            StackStatus::UpdateComplete => "UPDATE_COMPLETE",
            StackStatus::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            StackStatus::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            StackStatus::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            StackStatus::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            StackStatus::DeleteInProgress => "DELETE_IN_PROGRESS",
            StackStatus::DeleteComplete => "DELETE_COMPLETE",
            StackStatus::DeleteFailed => "DELETE_FAILED",
            StackStatus::Other(status) => status,
        }
    }

    /// Whether CloudFormation is still working on the stack.
    pub fn is_in_progress(&self) -> bool {
        self.as_str().ends_with("_IN_PROGRESS")
    }

}

impl From<&str> for StackStatus {
    fn from(status: &str) -> Self {
        match status {
            "CREATE_IN_PROGRESS" => StackStatus::CreateInProgress,
            "CREATE_COMPLETE" => StackStatus::CreateComplete,
            "CREATE_FAILED" => StackStatus::CreateFailed,
            "ROLLBACK_IN_PROGRESS" => StackStatus::RollbackInProgress,
            "ROLLBACK_COMPLETE" => StackStatus::RollbackComplete,
            "ROLLBACK_FAILED" => StackStatus::RollbackFailed,
            "UPDATE_IN_PROGRESS" => StackStatus::UpdateInProgress,
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => StackStatus::UpdateCompleteCleanupInProgress,
            "UPDATE_COMPLETE" => StackStatus::UpdateComplete,
            "UPDATE_ROLLBACK_IN_PROGRESS" => StackStatus::UpdateRollbackInProgress,
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => {
                StackStatus::UpdateRollbackCompleteCleanupInProgress
            }
            "UPDATE_ROLLBACK_COMPLETE" => StackStatus::UpdateRollbackComplete,
            "UPDATE_ROLLBACK_FAILED" => StackStatus::UpdateRollbackFailed,
            "DELETE_IN_PROGRESS" => StackStatus::DeleteInProgress,
            "DELETE_COMPLETE" => StackStatus::DeleteComplete,
            "DELETE_FAILED" => StackStatus::DeleteFailed,
            other => StackStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What CloudFormation reports about a deployed stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackDescription {
    pub stack_name: String,
    pub stack_id: Option<String>,
    pub status: StackStatus,
    pub status_reason: Option<String>,
    pub outputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Started,
    NoChanges,
}

/// Stack-level operations of the deployment service.
#[async_trait]
pub trait StackClient: Send + Sync {
    /// `None` when no stack of that name exists.
    async fn describe_stack(&self, stack_name: &str)
        -> Result<Option<StackDescription>, CloudError>;

    /// Start creating a stack and return its id.
    async fn create_stack(&self, stack_name: &str, template_body: &str)
        -> Result<String, CloudError>;

    async fn update_stack(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<UpdateOutcome, CloudError>;

    async fn delete_stack(&self, stack_name: &str) -> Result<(), CloudError>;

    /// Account id of the credentials the client signs requests with.
    async fn caller_account(&self) -> Result<String, CloudError>;
}

/// Errors reported by the deployment service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CloudError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Stack already exists: {0}")]
    StackAlreadyExists(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Missing capabilities: {0}")]
    InsufficientCapabilities(String),

    #[error("Stack {stack_name} ended in {status}: {reason}")]
    StackFailed {
        stack_name: String,
        status: StackStatus,
        reason: String,
    },

    #[error("Credentials belong to account {actual}, expected {expected}")]
    AccountMismatch { expected: String, actual: String },

    #[error("Timed out waiting for stack {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Unknown cloud provider error: {0}")]
    Unknown(String),
}

impl CloudError {
    /// Get suggested remediation steps for the error
    pub fn remediation_steps(&self) -> Vec<String> {
        match self {
            CloudError::Authentication(_) => vec![
                "Check your AWS credentials".to_string(),
                "Ensure your access keys or SSO session are not expired".to_string(),
            ],
            CloudError::Authorization(_) => vec![
                "Check the IAM permissions of the deploying identity".to_string(),
                "CloudFormation needs permission to manage every resource in the template"
                    .to_string(),
            ],
            CloudError::StackAlreadyExists(_) => vec![
                "Another stack with the same name exists in this account and region".to_string(),
                "Delete it or deploy to a different region".to_string(),
            ],
            CloudError::Validation(_) => vec![
                "Run `iac synth` and inspect the generated template".to_string(),
                "Check that the stacks whose exports are imported are deployed".to_string(),
            ],
            CloudError::InsufficientCapabilities(_) => vec![
                "The stacks create IAM resources and must be deployed with IAM capabilities"
                    .to_string(),
            ],
            CloudError::StackFailed { stack_name, .. } => vec![
                format!(
                    "Inspect the events of stack {} in the CloudFormation console",
                    stack_name
                ),
                "A stack in ROLLBACK_COMPLETE is deleted and recreated on the next deploy"
                    .to_string(),
            ],
            CloudError::AccountMismatch { expected, .. } => vec![
                format!("Switch to credentials for account {}", expected),
                "Or change `account` in iac.toml or the -c account=... argument".to_string(),
            ],
            CloudError::Timeout(_) => vec![
                "The stack may still be in progress; check its status before retrying".to_string(),
            ],
            CloudError::Network(_) => vec![
                "Check your internet connection".to_string(),
                "Verify network connectivity to the CloudFormation endpoint".to_string(),
            ],
            CloudError::RateLimit(_) => vec!["Wait before running the command again".to_string()],
            CloudError::Unknown(_) => vec![
                "Review the error message for more details".to_string(),
                "Check the AWS service health dashboard".to_string(),
            ],
        }
    }
}

fn cloud_error<E, R>(err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    if matches!(err, SdkError::DispatchFailure(_) | SdkError::TimeoutError(_)) {
        return CloudError::Network(message);
    }

    match err.code() {
        Some(
            "ExpiredToken" | "ExpiredTokenException" | "InvalidClientTokenId"
            | "UnrecognizedClientException",
        ) => CloudError::Authentication(message),
        Some("AccessDenied" | "AccessDeniedException") => CloudError::Authorization(message),
        Some("AlreadyExistsException") => CloudError::StackAlreadyExists(message),
        Some("InsufficientCapabilitiesException") => CloudError::InsufficientCapabilities(message),
        Some("ValidationError") => CloudError::Validation(message),
        Some("Throttling" | "ThrottlingException") => CloudError::RateLimit(message),
        _ => CloudError::Unknown(message),
    }
}

/// [`StackClient`] backed by the AWS CloudFormation API.
pub struct CloudFormationClient {
    client: Client,
    sts: StsClient,
}

impl CloudFormationClient {
    pub fn new(client: Client, sts: StsClient) -> Self {
        Self { client, sts }
    }

    /// Load credentials and region from the environment. An explicit region
    /// wins over the default provider chain.
    pub async fn from_env(region: Option<String>) -> Self {
        let region_provider = RegionProviderChain::first_try(region.map(Region::new))
            .or_default_provider()
            .or_else(Region::new(DEFAULT_REGION));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        debug!("CloudFormation client region: {:?}", shared_config.region());
        Self::new(Client::new(&shared_config), StsClient::new(&shared_config))
    }
}

#[async_trait]
impl StackClient for CloudFormationClient {
    async fn describe_stack(
        &self,
        stack_name: &str,
    ) -> Result<Option<StackDescription>, CloudError> {
        let output = match self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if err.message().is_some_and(|m| m.contains("does not exist")) => {
                return Ok(None);
            }
            Err(err) => return Err(cloud_error(err)),
        };

        Ok(output.stacks().first().map(|stack| StackDescription {
            stack_name: stack.stack_name().unwrap_or(stack_name).to_string(),
            stack_id: stack.stack_id().map(str::to_string),
            status: stack
                .stack_status()
                .map(|s| StackStatus::from(s.as_str()))
                .unwrap_or_else(|| StackStatus::Other("UNKNOWN".to_string())),
            status_reason: stack.stack_status_reason().map(str::to_string),
            outputs: stack
                .outputs()
                .iter()
                .filter_map(|o| {
                    Some((o.output_key()?.to_string(), o.output_value()?.to_string()))
                })
                .collect(),
        }))
    }

    async fn create_stack(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<String, CloudError> {
        let output = self
            .client
            .create_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
            .map_err(cloud_error)?;

        Ok(output.stack_id().unwrap_or(stack_name).to_string())
    }

    async fn update_stack(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<UpdateOutcome, CloudError> {
        match self
            .client
            .update_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .capabilities(Capability::CapabilityIam)
            .capabilities(Capability::CapabilityNamedIam)
            .send()
            .await
        {
            Ok(_) => Ok(UpdateOutcome::Started),
            Err(err) if err.message().is_some_and(|m| m.contains(NO_UPDATES_MESSAGE)) => {
                Ok(UpdateOutcome::NoChanges)
            }
            Err(err) => Err(cloud_error(err)),
        }
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), CloudError> {
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(cloud_error)?;
        Ok(())
    }

    async fn caller_account(&self) -> Result<String, CloudError> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(cloud_error)?;

        identity
            .account()
            .map(str::to_string)
            .ok_or_else(|| CloudError::Unknown("caller identity has no account".to_string()))
    }
}
