use iac_lambda::logging::DEFAULT_LOG_DIR;
use iac_lambda::{
    build_app, CloudFormationClient, DeploymentContext, DeploymentEngine, DeploymentLogger,
    DeploymentPlan, IacResult,
};
use tracing::info;

pub async fn deploy_command(
    ctx: &DeploymentContext,
    stacks: &[String],
    dry_run: bool,
) -> IacResult<()> {
    let assembly = build_app(ctx)?.synth()?;

    if dry_run {
        print!("{}", DeploymentPlan::deploy(&assembly, stacks)?);
        return Ok(());
    }

    let mut engine = engine(ctx).await?;
    let result = engine.deploy(&assembly, stacks).await;
    engine.logger().print_summary();

    let summary = result?;
    info!(
        "Deployed {} stacks for environment {}",
        summary.results.len(),
        ctx.environment
    );
    Ok(())
}

pub async fn destroy_command(
    ctx: &DeploymentContext,
    stacks: &[String],
    dry_run: bool,
) -> IacResult<()> {
    let assembly = build_app(ctx)?.synth()?;

    if dry_run {
        print!("{}", DeploymentPlan::destroy(&assembly, stacks)?);
        return Ok(());
    }

    let mut engine = engine(ctx).await?;
    let result = engine.destroy(&assembly, stacks).await;
    engine.logger().print_summary();

    result.map(|_| ())
}

async fn engine(ctx: &DeploymentContext) -> IacResult<DeploymentEngine> {
    let client = CloudFormationClient::from_env(ctx.region.clone()).await;
    let logger = DeploymentLogger::new(DEFAULT_LOG_DIR)?;
    if let Some(path) = logger.log_file() {
        info!("Logging deployment to {}", path.display());
    }
    Ok(DeploymentEngine::new(Box::new(client), logger)
        .with_expected_account(ctx.account.clone()))
}
