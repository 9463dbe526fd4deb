use crate::template::{Expr, ResourceProperties};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArtifactStore {
    pub location: Expr,
    #[serde(rename = "Type")]
    pub store_type: String,
}

impl ArtifactStore {
    pub fn s3(bucket_name: Expr) -> Self {
        Self {
            location: bucket_name,
            store_type: "S3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionCategory {
    Source,
    Build,
    Test,
    Deploy,
    Approval,
    Invoke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionOwner {
    #[serde(rename = "AWS")]
    Aws,
    ThirdParty,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionTypeId {
    pub category: ActionCategory,
    pub owner: ActionOwner,
    pub provider: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArtifactRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionDeclaration {
    pub action_type_id: ActionTypeId,
    pub configuration: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_artifacts: Vec<ArtifactRef>,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_artifacts: Vec<ArtifactRef>,
    pub run_order: u32,
}

impl ActionDeclaration {
    /// GitHub (version 1) source action. `oauth_token` must be a dynamic
    /// reference into a secret store, never the token itself.
    pub fn github_source(
        name: impl Into<String>,
        owner: &str,
        repo: &str,
        branch: &str,
        oauth_token: &str,
        output: ArtifactRef,
    ) -> Self {
        Self {
            action_type_id: ActionTypeId {
                category: ActionCategory::Source,
                owner: ActionOwner::ThirdParty,
                provider: "GitHub".to_string(),
                version: "1".to_string(),
            },
            configuration: serde_json::json!({
                "Owner": owner,
                "Repo": repo,
                "Branch": branch,
                "OAuthToken": oauth_token,
                "PollForSourceChanges": false,
            }),
            input_artifacts: Vec::new(),
            name: name.into(),
            output_artifacts: vec![output],
            run_order: 1,
        }
    }

    pub fn codebuild(name: impl Into<String>, project_name: Expr, input: ArtifactRef) -> Self {
        Self {
            action_type_id: ActionTypeId {
                category: ActionCategory::Build,
                owner: ActionOwner::Aws,
                provider: "CodeBuild".to_string(),
                version: "1".to_string(),
            },
            configuration: serde_json::json!({ "ProjectName": project_name }),
            input_artifacts: vec![input],
            name: name.into(),
            output_artifacts: Vec::new(),
            run_order: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StageDeclaration {
    pub actions: Vec<ActionDeclaration>,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Pipeline {
    pub artifact_store: ArtifactStore,
    pub name: String,
    pub role_arn: Expr,
    pub stages: Vec<StageDeclaration>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, role_arn: Expr, artifact_store: ArtifactStore) -> Self {
        Self {
            artifact_store,
            name: name.into(),
            role_arn,
            stages: Vec::new(),
        }
    }

    pub fn add_stage(&mut self, name: impl Into<String>, actions: Vec<ActionDeclaration>) {
        self.stages.push(StageDeclaration {
            actions,
            name: name.into(),
        });
    }
}

impl ResourceProperties for Pipeline {
    const RESOURCE_TYPE: &'static str = "AWS::CodePipeline::Pipeline";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookAuthConfiguration {
    pub secret_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookFilter {
    pub json_path: String,
    pub match_equals: String,
}

/// Push webhook registered with GitHub that starts the pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Webhook {
    pub authentication: String,
    pub authentication_configuration: WebhookAuthConfiguration,
    pub filters: Vec<WebhookFilter>,
    pub register_with_third_party: bool,
    pub target_action: String,
    pub target_pipeline: Expr,
    pub target_pipeline_version: u32,
}

impl Webhook {
    /// Trigger `target_action` of `pipeline` on pushes to `branch`.
    pub fn github_push(
        pipeline: Expr,
        target_action: impl Into<String>,
        branch: &str,
        secret_token: &str,
    ) -> Self {
        Self {
            authentication: "GITHUB_HMAC".to_string(),
            authentication_configuration: WebhookAuthConfiguration {
                secret_token: secret_token.to_string(),
            },
            filters: vec![WebhookFilter {
                json_path: "$.ref".to_string(),
                match_equals: format!("refs/heads/{}", branch),
            }],
            register_with_third_party: true,
            target_action: target_action.into(),
            target_pipeline: pipeline,
            target_pipeline_version: 1,
        }
    }
}

impl ResourceProperties for Webhook {
    const RESOURCE_TYPE: &'static str = "AWS::CodePipeline::Webhook";
}
