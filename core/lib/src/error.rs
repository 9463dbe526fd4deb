use crate::cloud::CloudError;
use crate::config::ConfigError;
use crate::naming::NamingError;
use std::fmt;

/// Error context for providing additional information about errors
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub stack_name: Option<String>,
    pub resource_id: Option<String>,
    pub additional_info: Vec<String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            stack_name: None,
            resource_id: None,
            additional_info: Vec::new(),
        }
    }

    pub fn with_stack(mut self, stack_name: impl Into<String>) -> Self {
        self.stack_name = Some(stack_name.into());
        self
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info.push(info.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operation: {}", self.operation)?;
        if let Some(ref stack) = self.stack_name {
            write!(f, ", Stack: {}", stack)?;
        }
        if let Some(ref resource) = self.resource_id {
            write!(f, ", Resource: {}", resource)?;
        }
        if !self.additional_info.is_empty() {
            write!(f, ", Info: {}", self.additional_info.join(", "))?;
        }
        Ok(())
    }
}

/// Errors raised while building, synthesizing or deploying the stacks
#[derive(Debug, thiserror::Error)]
pub enum IacError {
    #[error("Configuration error: {message}")]
    Config {
        #[source]
        source: Option<ConfigError>,
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Dependency error: {message}")]
    Dependency {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Synthesis error: {message}")]
    Synthesis {
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        #[source]
        source: Option<serde_json::Error>,
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("IO error: {message}")]
    Io {
        #[source]
        source: std::io::Error,
        message: String,
        context: Option<ErrorContext>,
    },

    #[error("Deployment error: {message}")]
    Deployment {
        #[source]
        source: Option<CloudError>,
        message: String,
        context: Option<ErrorContext>,
    },
}

impl IacError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            source: None,
            message: message.into(),
            context: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            context: None,
        }
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency {
            message: message.into(),
            context: None,
        }
    }

    pub fn synthesis(message: impl Into<String>) -> Self {
        Self::Synthesis {
            message: message.into(),
            context: None,
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            source: None,
            message: message.into(),
            context: None,
        }
    }

    pub fn deployment(message: impl Into<String>) -> Self {
        Self::Deployment {
            source: None,
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        match &mut self {
            IacError::Config { context: ctx, .. } => *ctx = Some(context),
            IacError::Validation { context: ctx, .. } => *ctx = Some(context),
            IacError::Dependency { context: ctx, .. } => *ctx = Some(context),
            IacError::Synthesis { context: ctx, .. } => *ctx = Some(context),
            IacError::Serialization { context: ctx, .. } => *ctx = Some(context),
            IacError::Io { context: ctx, .. } => *ctx = Some(context),
            IacError::Deployment { context: ctx, .. } => *ctx = Some(context),
        }
        self
    }

    /// Get the error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            IacError::Config { context, .. } => context.as_ref(),
            IacError::Validation { context, .. } => context.as_ref(),
            IacError::Dependency { context, .. } => context.as_ref(),
            IacError::Synthesis { context, .. } => context.as_ref(),
            IacError::Serialization { context, .. } => context.as_ref(),
            IacError::Io { context, .. } => context.as_ref(),
            IacError::Deployment { context, .. } => context.as_ref(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            IacError::Config { .. } => "configuration",
            IacError::Validation { .. } => "validation",
            IacError::Dependency { .. } => "dependency",
            IacError::Synthesis { .. } => "synthesis",
            IacError::Serialization { .. } => "serialization",
            IacError::Io { .. } => "io",
            IacError::Deployment { .. } => "deployment",
        }
    }

    /// Get suggested remediation steps for the error
    pub fn remediation_steps(&self) -> Vec<String> {
        match self {
            IacError::Config { .. } => vec![
                "Check the iac.toml configuration file".to_string(),
                "Check the -c KEY=VALUE context arguments".to_string(),
            ],
            IacError::Validation { .. } => vec![
                "Check resource names against the AWS naming rules".to_string(),
                "Make sure logical ids and export names are unique".to_string(),
            ],
            IacError::Dependency { .. } => vec![
                "Declare a dependency on every stack whose exports are imported".to_string(),
                "Remove dependency cycles between stacks".to_string(),
            ],
            IacError::Synthesis { .. } => vec![
                "Review the stack definitions for missing resources".to_string(),
            ],
            IacError::Serialization { .. } => vec![
                "Check property values for unsupported data".to_string(),
            ],
            IacError::Io { .. } => vec![
                "Check file and directory permissions".to_string(),
                "Verify the output path is correct".to_string(),
            ],
            IacError::Deployment {
                source: Some(cloud_error),
                ..
            } => cloud_error.remediation_steps(),
            IacError::Deployment { .. } => vec![
                "Check your AWS credentials and region".to_string(),
                "Inspect the stack events in the CloudFormation console".to_string(),
            ],
        }
    }

    /// Create a formatted error report with context and remediation steps
    pub fn error_report(&self) -> String {
        let mut report = format!("Error: {}\n", self);

        if let Some(context) = self.context() {
            report.push_str(&format!("Context: {}\n", context));
        }

        report.push_str(&format!("Category: {}\n", self.category()));

        let steps = self.remediation_steps();
        if !steps.is_empty() {
            report.push_str("\nRemediation Steps:\n");
            for (i, step) in steps.iter().enumerate() {
                report.push_str(&format!("  {}. {}\n", i + 1, step));
            }
        }

        report
    }
}

impl From<ConfigError> for IacError {
    fn from(err: ConfigError) -> Self {
        IacError::Config {
            message: err.to_string(),
            source: Some(err),
            context: None,
        }
    }
}

impl From<NamingError> for IacError {
    fn from(err: NamingError) -> Self {
        IacError::validation(err.to_string())
    }
}

impl From<CloudError> for IacError {
    fn from(err: CloudError) -> Self {
        IacError::Deployment {
            message: err.to_string(),
            source: Some(err),
            context: None,
        }
    }
}

impl From<serde_json::Error> for IacError {
    fn from(err: serde_json::Error) -> Self {
        IacError::Serialization {
            message: err.to_string(),
            source: Some(err),
            context: None,
        }
    }
}

impl From<std::io::Error> for IacError {
    fn from(err: std::io::Error) -> Self {
        IacError::Io {
            message: err.to_string(),
            source: err,
            context: None,
        }
    }
}

pub type IacResult<T> = Result<T, IacError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_report_includes_context_and_steps() {
        let err = IacError::dependency("LambdaStack imports DynamoDBTableArn")
            .with_context(ErrorContext::new("validate").with_stack("LambdaStack"));

        let report = err.error_report();
        assert!(report.contains("Dependency error: LambdaStack imports DynamoDBTableArn"));
        assert!(report.contains("Context: Operation: validate, Stack: LambdaStack"));
        assert!(report.contains("Category: dependency"));
        assert!(report.contains("1. Declare a dependency"));
    }

    #[test]
    fn test_config_error_conversion() {
        let err: IacError = ConfigError::Validation("bad label".to_string()).into();
        assert_eq!(err.category(), "configuration");
        assert!(err.to_string().contains("bad label"));
    }
}
