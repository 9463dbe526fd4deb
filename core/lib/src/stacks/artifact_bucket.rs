use super::package_name;
use crate::config::DeploymentContext;
use crate::error::IacResult;
use crate::exports::ExportName;
use crate::naming;
use crate::resources::s3::{self, Bucket};
use crate::stack::{ResourceOptions, Stack};
use crate::template::{Expr, RemovalPolicy};

pub const STACK_NAME: &str = "LambdaS3Stack";

/// Versioned bucket receiving the packaged function code.
pub fn build(ctx: &DeploymentContext) -> IacResult<Stack> {
    let bucket_name = package_name(&ctx.environment);
    naming::validate_bucket_name(&bucket_name)?;

    let mut stack = Stack::new(STACK_NAME, "S3 bucket holding the Lambda deployment package")?;

    let bucket = stack.add_resource_with(
        "LambdaS3Bucket",
        &Bucket::new(bucket_name).versioned(),
        ResourceOptions::new().removal_policy(RemovalPolicy::Destroy),
    )?;

    stack.export(
        "BucketNameOutput",
        ExportName::LambdaS3BucketName,
        bucket.reference(),
        "Bucket to lambda code",
    )?;
    stack.export(
        "BucketArnOutput",
        ExportName::LambdaS3BucketArn,
        bucket.get_att(s3::ATTR_ARN),
        "The ARN of the S3 bucket",
    )?;
    stack.export(
        "EnvironmentOutput",
        ExportName::LambdaEnvironment,
        Expr::literal(ctx.environment.as_str()),
        "The environment (dev, qa, prod)",
    )?;

    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_is_versioned_and_named_after_environment() {
        let ctx = DeploymentContext::for_environment("prod").unwrap();
        let stack = build(&ctx).unwrap();
        let bucket = stack.template().resource("LambdaS3Bucket").unwrap();

        assert_eq!(bucket.properties["BucketName"], "lambda-packagecode-zip-prod");
        assert_eq!(
            bucket.properties["VersioningConfiguration"]["Status"],
            "Enabled"
        );
        assert_eq!(bucket.deletion_policy, Some(RemovalPolicy::Destroy));
        assert_eq!(
            stack.template().outputs["EnvironmentOutput"].value,
            Expr::literal("prod")
        );
    }
}
