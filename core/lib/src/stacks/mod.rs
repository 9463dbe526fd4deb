//! The four deployable units and the composition root that wires them together.

pub mod artifact_bucket;
pub mod compute;
pub mod pipeline;
pub mod storage;

use crate::app::App;
use crate::config::DeploymentContext;
use crate::error::IacResult;
use tracing::info;

/// Prefix shared by the artifact bucket and the function name.
pub const PACKAGE_NAME_PREFIX: &str = "lambda-packagecode-zip";

/// The deployable units, in the order their exports flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Unit {
    Storage,
    ArtifactBucket,
    Compute,
    Pipeline,
}

impl Unit {
    pub const ALL: [Unit; 4] = [
        Unit::Storage,
        Unit::ArtifactBucket,
        Unit::Compute,
        Unit::Pipeline,
    ];

    pub fn stack_name(&self) -> &'static str {
        match self {
            Unit::Storage => storage::STACK_NAME,
            Unit::ArtifactBucket => artifact_bucket::STACK_NAME,
            Unit::Compute => compute::STACK_NAME,
            Unit::Pipeline => pipeline::STACK_NAME,
        }
    }
}

/// `lambda-packagecode-zip-<env>`, used for both the bucket and the function.
pub fn package_name(environment: &str) -> String {
    format!("{}-{}", PACKAGE_NAME_PREFIX, environment)
}

/// Build the application: every unit plus the dependency edges between them.
pub fn build_app(ctx: &DeploymentContext) -> IacResult<App> {
    info!("Building stacks for environment {}", ctx.environment);

    let mut app = App::new();
    app.add_stack(storage::build(ctx)?)?;
    app.add_stack(artifact_bucket::build(ctx)?)?;
    app.add_stack(compute::build(ctx)?)?;
    app.add_stack(pipeline::build(ctx)?)?;

    app.add_dependency(compute::STACK_NAME, artifact_bucket::STACK_NAME)?;
    app.add_dependency(compute::STACK_NAME, storage::STACK_NAME)?;
    app.add_dependency(pipeline::STACK_NAME, compute::STACK_NAME)?;

    Ok(app)
}
