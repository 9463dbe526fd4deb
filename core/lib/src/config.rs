use crate::naming;
use iac_lambda_config::{FunctionConfig, IacFile, PipelineConfig};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Environment label used when neither the command line nor `iac.toml` names one.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Project file looked up in the working directory.
pub const CONFIG_FILE: &str = "iac.toml";

/// Context key carrying the environment label (`-c env=qa`).
pub const ENVIRONMENT_CONTEXT_KEY: &str = "env";

const DEFAULT_RUNTIME: &str = "python3.12";
const DEFAULT_HANDLER: &str = "app.lambda_handler";
const DEFAULT_SOURCE_OWNER: &str = "fjlacruz";
const DEFAULT_SOURCE_REPO: &str = "sam-py";
const DEFAULT_SOURCE_BRANCH: &str = "master";
const DEFAULT_OAUTH_SECRET: &str = "github-token";

/// Settings of the placeholder function deployed by the compute stack.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSettings {
    pub runtime: String,
    pub handler: String,
    pub memory_size: Option<u32>,
    pub timeout: Option<u32>,
}

impl Default for FunctionSettings {
    fn default() -> Self {
        Self {
            runtime: DEFAULT_RUNTIME.to_string(),
            handler: DEFAULT_HANDLER.to_string(),
            memory_size: None,
            timeout: None,
        }
    }
}

/// Reference to a value stored in AWS Secrets Manager. It is rendered as a
/// CloudFormation dynamic reference so the plaintext never enters a template.
#[derive(Debug, Clone, PartialEq)]
pub struct SecretReference {
    pub secret_id: String,
    pub json_field: Option<String>,
}

impl SecretReference {
    pub fn new(secret_id: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            json_field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.json_field = Some(field.into());
        self
    }

    /// `{{resolve:secretsmanager:<id>:SecretString:<field>::}}`
    pub fn dynamic_reference(&self) -> String {
        format!(
            "{{{{resolve:secretsmanager:{}:SecretString:{}::}}}}",
            self.secret_id,
            self.json_field.as_deref().unwrap_or("")
        )
    }
}

/// Version-control repository the pipeline pulls from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRepository {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub oauth_token: SecretReference,
}

impl Default for SourceRepository {
    fn default() -> Self {
        Self {
            owner: DEFAULT_SOURCE_OWNER.to_string(),
            repo: DEFAULT_SOURCE_REPO.to_string(),
            branch: DEFAULT_SOURCE_BRANCH.to_string(),
            oauth_token: SecretReference::new(DEFAULT_OAUTH_SECRET),
        }
    }
}

/// Everything a stack constructor needs to know about the target deployment.
/// Resolved once at the composition root and passed down explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentContext {
    pub environment: String,
    pub region: Option<String>,
    /// Checked against the caller identity before any stack is touched.
    pub account: Option<String>,
    pub function: FunctionSettings,
    pub source: SourceRepository,
}

impl Default for DeploymentContext {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            region: None,
            account: None,
            function: FunctionSettings::default(),
            source: SourceRepository::default(),
        }
    }
}

impl DeploymentContext {
    /// Context for an explicit environment label with every other setting defaulted.
    pub fn for_environment(environment: impl Into<String>) -> Result<Self, ConfigError> {
        let environment = environment.into();
        validate_label(&environment)?;
        Ok(Self {
            environment,
            ..Self::default()
        })
    }

    /// Resolve the context from the project file and command line overrides.
    ///
    /// Precedence for the environment label is: `-c env=...`, then
    /// `project.environment`, then [`DEFAULT_ENVIRONMENT`]. Environment specific
    /// sections of the file are applied on top of the base sections.
    pub fn resolve(file: &IacFile, overrides: &ContextOverrides) -> Result<Self, ConfigError> {
        validate_file(file)?;

        let environment = overrides
            .get(ENVIRONMENT_CONTEXT_KEY)
            .map(str::to_string)
            .or_else(|| file.project.environment.clone())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        validate_label(&environment)?;

        let mut function = file.function.clone();
        let mut pipeline = file.pipeline.clone();
        if let Some(env_override) = file.environments.get(&environment) {
            debug!("Applying overrides for environment {}", environment);
            if let Some(function_override) = &env_override.function {
                function = function.merged_with(function_override);
            }
            if let Some(pipeline_override) = &env_override.pipeline {
                pipeline = pipeline.merged_with(pipeline_override);
            }
        }

        let context = Self {
            environment,
            region: overrides
                .get("region")
                .map(str::to_string)
                .or_else(|| file.project.region.clone()),
            account: overrides
                .get("account")
                .map(str::to_string)
                .or_else(|| file.project.account.clone()),
            function: function_settings(&function),
            source: source_repository(&pipeline),
        };

        if let Some(account) = &context.account {
            validate_account(account)?;
        }

        for key in overrides.keys() {
            if !matches!(key, ENVIRONMENT_CONTEXT_KEY | "region" | "account") {
                warn!("Ignoring unknown context key '{}'", key);
            }
        }

        Ok(context)
    }
}

fn function_settings(config: &FunctionConfig) -> FunctionSettings {
    let defaults = FunctionSettings::default();
    FunctionSettings {
        runtime: config.runtime.clone().unwrap_or(defaults.runtime),
        handler: config.handler.clone().unwrap_or(defaults.handler),
        memory_size: config.memory_size,
        timeout: config.timeout,
    }
}

fn source_repository(config: &PipelineConfig) -> SourceRepository {
    let defaults = SourceRepository::default();
    let mut oauth_token = config
        .oauth_secret_name
        .clone()
        .map(SecretReference::new)
        .unwrap_or(defaults.oauth_token);
    if let Some(field) = &config.oauth_secret_field {
        oauth_token = oauth_token.with_field(field.clone());
    }

    SourceRepository {
        owner: config.owner.clone().unwrap_or(defaults.owner),
        repo: config.repo.clone().unwrap_or(defaults.repo),
        branch: config.branch.clone().unwrap_or(defaults.branch),
        oauth_token,
    }
}

/// `key=value` pairs passed with `-c`/`--context`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextOverrides {
    values: BTreeMap<String, String>,
}

impl ContextOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` arguments. Later occurrences of a key win.
    pub fn parse<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = Self::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                ConfigError::InvalidContext(format!("expected KEY=VALUE, got '{}'", arg))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::InvalidContext(format!(
                    "empty key in '{}'",
                    arg
                )));
            }
            overrides.set(key, value.trim());
        }
        Ok(overrides)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Load and validate a project file.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<IacFile, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| ConfigError::FileRead(format!("{}: {}", path.display(), e)))?;

    let file: IacFile =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    validate_file(&file)?;
    Ok(file)
}

/// Like [`load_from_file`], but a missing file yields the built-in defaults.
pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<IacFile, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("No {} found, using defaults", path.display());
        return Ok(IacFile::default());
    }
    load_from_file(path)
}

/// Validate value ranges of a project file.
pub fn validate_file(file: &IacFile) -> Result<(), ConfigError> {
    if let Some(environment) = &file.project.environment {
        validate_label(environment)?;
    }

    validate_function_config(&file.function, None)?;
    validate_pipeline_config(&file.pipeline, None)?;

    for (env_name, env_override) in &file.environments {
        validate_label(env_name)?;

        if let Some(function) = &env_override.function {
            validate_function_config(function, Some(env_name))?;
        }
        if let Some(pipeline) = &env_override.pipeline {
            validate_pipeline_config(pipeline, Some(env_name))?;
        }
    }

    Ok(())
}

/// Account ids are twelve digits.
fn validate_account(account: &str) -> Result<(), ConfigError> {
    if account.len() != 12 || !account.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ConfigError::Validation(format!(
            "account '{}' must be a 12 digit AWS account id",
            account
        )));
    }
    Ok(())
}

fn validate_label(label: &str) -> Result<(), ConfigError> {
    naming::validate_environment_label(label).map_err(|e| ConfigError::Validation(e.to_string()))
}

fn validate_function_config(
    config: &FunctionConfig,
    environment: Option<&str>,
) -> Result<(), ConfigError> {
    let prefix = environment
        .map(|e| format!("environments.{}.function.", e))
        .unwrap_or_else(|| "function.".to_string());

    if let Some(memory_size) = config.memory_size {
        if !(128..=10240).contains(&memory_size) {
            return Err(ConfigError::Validation(format!(
                "{}memory_size must be between 128 and 10240 MB",
                prefix
            )));
        }
    }

    if let Some(timeout) = config.timeout {
        if timeout == 0 || timeout > 900 {
            return Err(ConfigError::Validation(format!(
                "{}timeout must be between 1 and 900 seconds",
                prefix
            )));
        }
    }

    for (field, value) in [("runtime", &config.runtime), ("handler", &config.handler)] {
        if value.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Validation(format!(
                "{}{} cannot be empty",
                prefix, field
            )));
        }
    }

    Ok(())
}

fn validate_pipeline_config(
    config: &PipelineConfig,
    environment: Option<&str>,
) -> Result<(), ConfigError> {
    let prefix = environment
        .map(|e| format!("environments.{}.pipeline.", e))
        .unwrap_or_else(|| "pipeline.".to_string());

    let fields = [
        ("owner", &config.owner),
        ("repo", &config.repo),
        ("branch", &config.branch),
        ("oauth_secret_name", &config.oauth_secret_name),
        ("oauth_secret_field", &config.oauth_secret_field),
    ];
    for (field, value) in fields {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(ConfigError::Validation(format!(
                "{}{} cannot be empty",
                prefix, field
            )));
        }
    }

    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Invalid context argument: {0}")]
    InvalidContext(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use iac_lambda_config::{EnvironmentOverride, ProjectConfig};
    use tempfile::TempDir;

    #[test]
    fn test_default_environment_when_nothing_is_set() {
        let context =
            DeploymentContext::resolve(&IacFile::default(), &ContextOverrides::new()).unwrap();

        assert_eq!(context.environment, DEFAULT_ENVIRONMENT);
        assert_eq!(context.function.runtime, "python3.12");
        assert_eq!(context.source.branch, "master");
    }

    #[test]
    fn test_context_override_beats_project_file() {
        let file = IacFile {
            project: ProjectConfig {
                environment: Some("prod".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let from_file = DeploymentContext::resolve(&file, &ContextOverrides::new()).unwrap();
        assert_eq!(from_file.environment, "prod");

        let overrides = ContextOverrides::parse(["env=qa"]).unwrap();
        let from_cli = DeploymentContext::resolve(&file, &overrides).unwrap();
        assert_eq!(from_cli.environment, "qa");
    }

    #[test]
    fn test_environment_section_applies_to_matching_label_only() {
        let mut environments = BTreeMap::new();
        environments.insert(
            "prod".to_string(),
            EnvironmentOverride {
                function: Some(FunctionConfig {
                    memory_size: Some(1024),
                    ..Default::default()
                }),
                pipeline: Some(PipelineConfig {
                    branch: Some("release".to_string()),
                    ..Default::default()
                }),
            },
        );
        let file = IacFile {
            environments,
            ..Default::default()
        };

        let dev = DeploymentContext::resolve(&file, &ContextOverrides::new()).unwrap();
        assert_eq!(dev.function.memory_size, None);
        assert_eq!(dev.source.branch, "master");

        let overrides = ContextOverrides::parse(["env=prod"]).unwrap();
        let prod = DeploymentContext::resolve(&file, &overrides).unwrap();
        assert_eq!(prod.function.memory_size, Some(1024));
        assert_eq!(prod.source.branch, "release");
    }

    #[test]
    fn test_invalid_environment_label_is_rejected() {
        let overrides = ContextOverrides::parse(["env=Not Valid"]).unwrap();
        let result = DeploymentContext::resolve(&IacFile::default(), &overrides);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_account_is_resolved_and_validated() {
        let file = IacFile {
            project: ProjectConfig {
                account: Some("123456789012".to_string()),
                ..ProjectConfig::default()
            },
            ..IacFile::default()
        };
        let context = DeploymentContext::resolve(&file, &ContextOverrides::new()).unwrap();
        assert_eq!(context.account.as_deref(), Some("123456789012"));

        let overrides = ContextOverrides::parse(["account=210987654321"]).unwrap();
        let context = DeploymentContext::resolve(&file, &overrides).unwrap();
        assert_eq!(context.account.as_deref(), Some("210987654321"));

        let overrides = ContextOverrides::parse(["account=prod-account"]).unwrap();
        assert!(matches!(
            DeploymentContext::resolve(&file, &overrides),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_context_argument_parsing() {
        let overrides = ContextOverrides::parse(["env=qa", "region = eu-west-1", "env=prod"])
            .expect("valid arguments");
        assert_eq!(overrides.get("env"), Some("prod"));
        assert_eq!(overrides.get("region"), Some("eu-west-1"));

        assert!(matches!(
            ContextOverrides::parse(["env"]),
            Err(ConfigError::InvalidContext(_))
        ));
        assert!(matches!(
            ContextOverrides::parse(["=qa"]),
            Err(ConfigError::InvalidContext(_))
        ));
    }

    #[test]
    fn test_function_limits_are_validated() {
        let file = IacFile {
            function: FunctionConfig {
                memory_size: Some(64),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            validate_file(&file),
            Err(ConfigError::Validation(msg)) if msg.contains("memory_size")
        ));

        let file = IacFile {
            function: FunctionConfig {
                timeout: Some(901),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_file(&file).is_err());
    }

    #[test]
    fn test_secret_dynamic_reference() {
        let plain = SecretReference::new("github-token");
        assert_eq!(
            plain.dynamic_reference(),
            "{{resolve:secretsmanager:github-token:SecretString:::}}"
        );

        let field = SecretReference::new("ci/credentials").with_field("github");
        assert_eq!(
            field.dynamic_reference(),
            "{{resolve:secretsmanager:ci/credentials:SecretString:github::}}"
        );
    }

    #[test]
    fn test_load_optional_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = load_optional(temp_dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(file, IacFile::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"
            [project]
            environment = "qa"

            [pipeline]
            oauth_secret_name = "ci/github"
            oauth_secret_field = "token"
            "#,
        )
        .unwrap();

        let file = load_from_file(&path).expect("valid file");
        let context = DeploymentContext::resolve(&file, &ContextOverrides::new()).unwrap();
        assert_eq!(context.environment, "qa");
        assert_eq!(
            context.source.oauth_token,
            SecretReference::new("ci/github").with_field("token")
        );
    }

    #[test]
    fn test_load_from_file_parse_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&path, "[project\nenvironment = ").unwrap();

        assert!(matches!(
            load_from_file(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
