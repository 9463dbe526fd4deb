use crate::config::DeploymentContext;
use crate::error::IacResult;
use crate::exports::ExportName;
use crate::naming;
use crate::resources::codebuild::{
    self, BuildEnvironment, BuildSpec, EnvironmentVariable, Phase, Phases, Project,
};
use crate::resources::codepipeline::{
    ActionDeclaration, ArtifactRef, ArtifactStore, Pipeline, Webhook,
};
use crate::resources::iam::{self, Policy, PolicyStatement, Role};
use crate::resources::s3;
use crate::stack::{ResourceOptions, Stack};
use crate::template::Expr;

pub const STACK_NAME: &str = "CicdStack";
pub const PIPELINE_NAME: &str = "LambdaCodePipeline";
pub const BUILD_ARTIFACT: &str = "package.zip";
pub const SOURCE_ACTION: &str = "GitHub_Source";

const SOURCE_OUTPUT: &str = "SourceOutput";

/// Commands run by the build stage. They rely on the project's environment
/// variables `bucket_name`, `lambda_function_name`, `lambda_function_alias_name`
/// and `BUILD_ARTIFACT`.
pub fn build_spec() -> BuildSpec {
    BuildSpec::new(Phases {
        install: Some(Phase::new([
            "echo \"Installing dependencies for the Lambda function...\"",
            "pip install -r requirements.txt",
        ])),
        pre_build: None,
        build: Some(Phase::new([
            "echo \"Packaging the Lambda function...\"",
            "cd src && zip -r ../$BUILD_ARTIFACT . && cd ..",
            "zip -r $BUILD_ARTIFACT requirements.txt",
            "aws s3 cp $BUILD_ARTIFACT s3://$bucket_name/$BUILD_ARTIFACT",
            "aws lambda update-function-code --function-name $lambda_function_name --s3-bucket $bucket_name --s3-key $BUILD_ARTIFACT",
            "aws lambda wait function-updated --function-name $lambda_function_name",
            "FUNCTION_VERSION=$(aws lambda publish-version --function-name $lambda_function_name --query Version --output text)",
            "aws lambda update-alias --function-name $lambda_function_name --name $lambda_function_alias_name --function-version $FUNCTION_VERSION",
        ])),
        post_build: Some(Phase::new([
            "echo \"The code was packaged and deployed\"",
        ])),
    })
    .with_artifacts([BUILD_ARTIFACT])
}

/// `arn:<partition>:logs:<region>:<account>:log-group:/aws/codebuild/*`
fn codebuild_log_groups() -> Expr {
    Expr::concat(vec![
        Expr::literal("arn:"),
        Expr::partition(),
        Expr::literal(":logs:"),
        Expr::region(),
        Expr::literal(":"),
        Expr::account_id(),
        Expr::literal(":log-group:/aws/codebuild/*"),
    ])
}

/// Source and build pipeline that redeploys the function on every push.
pub fn build(ctx: &DeploymentContext) -> IacResult<Stack> {
    naming::validate_pipeline_name(PIPELINE_NAME)?;

    let mut stack = Stack::new(
        STACK_NAME,
        "CodePipeline that packages and deploys the Lambda function",
    )?;

    let bucket_name = stack.import(ExportName::LambdaS3BucketName);
    let bucket_arn = stack.import(ExportName::LambdaS3BucketArn);
    let function_arn = stack.import(ExportName::LambdaFunctionArn);
    let alias_arn = stack.import(ExportName::LambdaFunctionAliasArn);
    let function_name = stack.import(ExportName::LambdaFunctionName);
    let alias_name = stack.import(ExportName::LambdaFunctionAliasName);

    let build_role = stack.add_resource(
        "CodeBuildRole",
        &Role::for_service("codebuild.amazonaws.com"),
    )?;

    let mut build_policy = Policy::new("CodeBuildRoleDefaultPolicy", build_role.reference());
    build_policy.add_statement(PolicyStatement::allow(
        [
            "lambda:UpdateFunctionCode",
            "lambda:PublishVersion",
            "lambda:UpdateAlias",
            "lambda:GetFunction",
            "lambda:GetFunctionConfiguration",
        ],
        [function_arn, alias_arn],
    ));
    build_policy.add_statement(PolicyStatement::allow(
        ["s3:GetObject", "s3:PutObject"],
        [s3::objects_arn(bucket_arn.clone())],
    ));
    build_policy.add_statement(PolicyStatement::allow(
        ["logs:CreateLogGroup", "logs:CreateLogStream", "logs:PutLogEvents"],
        [codebuild_log_groups()],
    ));
    let build_policy = stack.add_resource("CodeBuildRoleDefaultPolicy", &build_policy)?;

    let mut environment = BuildEnvironment::linux(codebuild::STANDARD_6_0);
    environment.privileged_mode = true;
    environment.environment_variables = vec![
        EnvironmentVariable::plaintext("bucket_name", bucket_name.clone()),
        EnvironmentVariable::plaintext("lambda_function_name", function_name),
        EnvironmentVariable::plaintext("lambda_function_alias_name", alias_name),
        EnvironmentVariable::plaintext("BUILD_ARTIFACT", BUILD_ARTIFACT),
    ];

    let project = stack.add_resource_with(
        "LambdaCodeBuildProject",
        &Project::for_pipeline(
            environment,
            build_role.get_att(iam::ATTR_ARN),
            &build_spec(),
        )?,
        ResourceOptions::new().depends_on(&build_policy),
    )?;

    let pipeline_role = stack.add_resource(
        "LambdaCodePipelineRole",
        &Role::for_service("codepipeline.amazonaws.com"),
    )?;

    let mut pipeline_policy = Policy::new(
        "LambdaCodePipelineRoleDefaultPolicy",
        pipeline_role.reference(),
    );
    pipeline_policy.add_statement(PolicyStatement::allow(
        [
            "s3:GetObject",
            "s3:GetObjectVersion",
            "s3:GetBucketVersioning",
            "s3:PutObject",
        ],
        [bucket_arn.clone(), s3::objects_arn(bucket_arn)],
    ));
    pipeline_policy.add_statement(PolicyStatement::allow(
        ["codebuild:BatchGetBuilds", "codebuild:StartBuild"],
        [project.get_att(codebuild::ATTR_ARN)],
    ));
    let pipeline_policy =
        stack.add_resource("LambdaCodePipelineRoleDefaultPolicy", &pipeline_policy)?;

    // Resolved by CloudFormation at deploy time; the token never appears in the template.
    let oauth_token = ctx.source.oauth_token.dynamic_reference();
    let source_output = ArtifactRef {
        name: SOURCE_OUTPUT.to_string(),
    };

    let mut pipeline = Pipeline::new(
        PIPELINE_NAME,
        pipeline_role.get_att(iam::ATTR_ARN),
        ArtifactStore::s3(bucket_name),
    );
    pipeline.add_stage(
        "Source",
        vec![ActionDeclaration::github_source(
            SOURCE_ACTION,
            &ctx.source.owner,
            &ctx.source.repo,
            &ctx.source.branch,
            &oauth_token,
            source_output.clone(),
        )],
    );
    pipeline.add_stage(
        "Build",
        vec![ActionDeclaration::codebuild(
            "CodeBuild",
            project.reference(),
            source_output,
        )],
    );

    let pipeline = stack.add_resource_with(
        PIPELINE_NAME,
        &pipeline,
        ResourceOptions::new()
            .depends_on(&pipeline_policy)
            .depends_on(&pipeline_role),
    )?;

    stack.add_resource(
        "LambdaCodePipelineWebhook",
        &Webhook::github_push(
            pipeline.reference(),
            SOURCE_ACTION,
            &ctx.source.branch,
            &oauth_token,
        ),
    )?;

    stack.export(
        "PipelineNameOutput",
        ExportName::PipelineName,
        pipeline.reference(),
        "Name of the CI/CD pipeline",
    )?;

    Ok(stack)
}
