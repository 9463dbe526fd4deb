use crate::error::IacResult;
use crate::template::{Expr, ResourceProperties};
use serde::Serialize;

pub const ATTR_ARN: &str = "Arn";

/// `aws/codebuild/standard:6.0` (Ubuntu 22.04).
pub const STANDARD_6_0: &str = "aws/codebuild/standard:6.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    Codepipeline,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Artifacts {
    #[serde(rename = "Type")]
    pub artifacts_type: SourceType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Source {
    pub build_spec: String,
    #[serde(rename = "Type")]
    pub source_type: SourceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableType {
    Plaintext,
    ParameterStore,
    SecretsManager,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentVariable {
    pub name: String,
    #[serde(rename = "Type")]
    pub variable_type: VariableType,
    pub value: Expr,
}

impl EnvironmentVariable {
    pub fn plaintext(name: impl Into<String>, value: impl Into<Expr>) -> Self {
        Self {
            name: name.into(),
            variable_type: VariableType::Plaintext,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildEnvironment {
    pub compute_type: String,
    pub environment_variables: Vec<EnvironmentVariable>,
    pub image: String,
    pub image_pull_credentials_type: String,
    pub privileged_mode: bool,
    #[serde(rename = "Type")]
    pub environment_type: String,
}

impl BuildEnvironment {
    /// Small Linux container running `image`.
    pub fn linux(image: impl Into<String>) -> Self {
        Self {
            compute_type: "BUILD_GENERAL1_SMALL".to_string(),
            environment_variables: Vec::new(),
            image: image.into(),
            image_pull_credentials_type: "CODEBUILD".to_string(),
            privileged_mode: false,
            environment_type: "LINUX_CONTAINER".to_string(),
        }
    }
}

/// A project whose source and artifacts are handed over by CodePipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Project {
    pub artifacts: Artifacts,
    pub environment: BuildEnvironment,
    pub service_role: Expr,
    pub source: Source,
}

impl Project {
    pub fn for_pipeline(
        environment: BuildEnvironment,
        service_role: Expr,
        build_spec: &BuildSpec,
    ) -> IacResult<Self> {
        Ok(Self {
            artifacts: Artifacts {
                artifacts_type: SourceType::Codepipeline,
            },
            environment,
            service_role,
            source: Source {
                build_spec: build_spec.to_json()?,
                source_type: SourceType::Codepipeline,
            },
        })
    }
}

impl ResourceProperties for Project {
    const RESOURCE_TYPE: &'static str = "AWS::CodeBuild::Project";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    pub commands: Vec<String>,
}

impl Phase {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Phases {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_build: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_build: Option<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactFiles {
    pub files: Vec<String>,
}

/// A CodeBuild buildspec, embedded into the project as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSpec {
    pub version: String,
    pub phases: Phases,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactFiles>,
}

impl BuildSpec {
    pub fn new(phases: Phases) -> Self {
        Self {
            version: "0.2".to_string(),
            phases,
            artifacts: None,
        }
    }

    pub fn with_artifacts<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifacts = Some(ArtifactFiles {
            files: files.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Every command in execution order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        [
            &self.phases.install,
            &self.phases.pre_build,
            &self.phases.build,
            &self.phases.post_build,
        ]
        .into_iter()
        .flatten()
        .flat_map(|phase| phase.commands.iter().map(String::as_str))
    }

    pub fn to_json(&self) -> IacResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buildspec_keeps_phase_order() {
        let spec = BuildSpec::new(Phases {
            install: Some(Phase::new(["pip install -r requirements.txt"])),
            build: Some(Phase::new(["zip -r package.zip ."])),
            post_build: Some(Phase::new(["echo done"])),
            ..Default::default()
        })
        .with_artifacts(["package.zip"]);

        let json = spec.to_json().unwrap();
        let install = json.find("\"install\"").unwrap();
        let build = json.find("\"build\"").unwrap();
        let post_build = json.find("\"post_build\"").unwrap();
        assert!(install < build && build < post_build);
        assert!(!json.contains("pre_build"));

        let commands: Vec<&str> = spec.commands().collect();
        assert_eq!(
            commands,
            vec![
                "pip install -r requirements.txt",
                "zip -r package.zip .",
                "echo done"
            ]
        );
    }
}
