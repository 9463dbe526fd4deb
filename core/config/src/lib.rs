use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contents of `iac.toml`. Every section is optional; missing values fall back
/// to the defaults applied when the deployment context is resolved.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct IacFile {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub function: FunctionConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Per-environment overrides keyed by environment label (`dev`, `qa`, `prod`).
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentOverride>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProjectConfig {
    /// Environment label used when none is passed on the command line.
    pub environment: Option<String>,
    pub region: Option<String>,
    /// Deploys and destroys stop unless the credentials belong to this account.
    pub account: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FunctionConfig {
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub memory_size: Option<u32>,
    pub timeout: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    /// Name or ARN of the Secrets Manager secret holding the GitHub token.
    pub oauth_secret_name: Option<String>,
    /// JSON key inside the secret, when the secret is a JSON document.
    pub oauth_secret_field: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EnvironmentOverride {
    pub function: Option<FunctionConfig>,
    pub pipeline: Option<PipelineConfig>,
}

impl FunctionConfig {
    /// Values set in `other` win over values set in `self`.
    pub fn merged_with(&self, other: &FunctionConfig) -> FunctionConfig {
        FunctionConfig {
            runtime: other.runtime.clone().or_else(|| self.runtime.clone()),
            handler: other.handler.clone().or_else(|| self.handler.clone()),
            memory_size: other.memory_size.or(self.memory_size),
            timeout: other.timeout.or(self.timeout),
        }
    }
}

impl PipelineConfig {
    /// Values set in `other` win over values set in `self`.
    pub fn merged_with(&self, other: &PipelineConfig) -> PipelineConfig {
        PipelineConfig {
            owner: other.owner.clone().or_else(|| self.owner.clone()),
            repo: other.repo.clone().or_else(|| self.repo.clone()),
            branch: other.branch.clone().or_else(|| self.branch.clone()),
            oauth_secret_name: other
                .oauth_secret_name
                .clone()
                .or_else(|| self.oauth_secret_name.clone()),
            oauth_secret_field: other
                .oauth_secret_field
                .clone()
                .or_else(|| self.oauth_secret_field.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let file: IacFile = toml::from_str("").expect("empty file should parse");
        assert_eq!(file, IacFile::default());
    }

    #[test]
    fn test_environment_overrides_parse() {
        let content = r#"
            [project]
            environment = "qa"
            region = "eu-west-1"

            [function]
            memory_size = 256

            [environments.prod.function]
            memory_size = 1024
            timeout = 30

            [environments.prod.pipeline]
            branch = "release"
        "#;

        let file: IacFile = toml::from_str(content).expect("valid file");
        assert_eq!(file.project.environment.as_deref(), Some("qa"));
        assert_eq!(file.function.memory_size, Some(256));

        let prod = file.environments.get("prod").expect("prod override");
        let function = file
            .function
            .merged_with(prod.function.as_ref().expect("function override"));
        assert_eq!(function.memory_size, Some(1024));
        assert_eq!(function.timeout, Some(30));
        assert_eq!(function.runtime, None);
    }

    #[test]
    fn test_pipeline_merge_keeps_unset_fields() {
        let base = PipelineConfig {
            owner: Some("acme".to_string()),
            repo: Some("service".to_string()),
            branch: Some("master".to_string()),
            oauth_secret_name: Some("github-token".to_string()),
            oauth_secret_field: None,
        };
        let over = PipelineConfig {
            branch: Some("develop".to_string()),
            ..Default::default()
        };

        let merged = base.merged_with(&over);
        assert_eq!(merged.owner.as_deref(), Some("acme"));
        assert_eq!(merged.branch.as_deref(), Some("develop"));
        assert_eq!(merged.oauth_secret_name.as_deref(), Some("github-token"));
    }
}
