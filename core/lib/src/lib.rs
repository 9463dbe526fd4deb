//! Typed CloudFormation stacks for a Lambda service behind API Gateway, its
//! DynamoDB table, its artifact bucket and the pipeline that redeploys it.

pub use serde_json;
pub use tokio;

// Core modules
pub mod app;
pub mod assembly;
pub mod aws_mock;
pub mod cloud;
pub mod config;
pub mod deployment;
pub mod error;
pub mod exports;
pub mod logging;
pub mod naming;
pub mod resources;
pub mod stack;
pub mod stacks;
pub mod template;

// Re-export commonly used types
pub use app::App;
pub use assembly::{CloudAssembly, Manifest, StackArtifact, MANIFEST_FILE};
pub use aws_mock::{MockCall, MockStackClient, MOCK_ACCOUNT};
pub use cloud::{
    CloudError, CloudFormationClient, StackClient, StackDescription, StackStatus, UpdateOutcome,
};
pub use config::{ConfigError, ContextOverrides, DeploymentContext, DEFAULT_ENVIRONMENT};
pub use deployment::{
    Command, DeploymentEngine, DeploymentPlan, DeploymentSummary, StackOutcome, StackResult,
};
pub use error::{ErrorContext, IacError, IacResult};
pub use exports::ExportName;
pub use logging::{
    init_tracing, DeploymentLogEntry, DeploymentLogger, OperationStatus, RunReport, RunStatus,
    StackAction,
};
pub use stack::Stack;
pub use stacks::{build_app, Unit};
pub use template::{Expr, RemovalPolicy, Template};
