use super::package_name;
use crate::config::DeploymentContext;
use crate::error::IacResult;
use crate::exports::ExportName;
use crate::naming;
use crate::resources::apigateway::{
    self, ApiResource, AuthorizationType, Deployment, EndpointConfiguration, EndpointType,
    Integration, Method, RestApi, Stage,
};
use crate::resources::iam::{Policy, PolicyStatement, Role};
use crate::resources::lambda::{
    self, Alias, Code, Function, Permission, TracingConfig, TracingMode, Version,
};
use crate::resources::s3;
use crate::stack::{ResourceOptions, Stack};
use crate::template::{Expr, RemovalPolicy};
use tracing::debug;

pub const STACK_NAME: &str = "LambdaStack";
pub const REST_API_NAME: &str = "cdk-apigateway-py";
/// Stage the REST API is deployed to, independent of the environment label.
pub const API_STAGE: &str = "dev";

const API_GATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";

/// Placeholder body; the pipeline replaces it with the packaged sources.
const PLACEHOLDER_SOURCE: &str = "def lambda_handler(event, context):
    return {'statusCode': 200, 'body': 'Lambda base...!!'}
";

/// Function, alias and the REST API in front of it.
pub fn build(ctx: &DeploymentContext) -> IacResult<Stack> {
    let function_name = package_name(&ctx.environment);
    let alias_name = ctx.environment.as_str();
    naming::validate_function_name(&function_name)?;
    naming::validate_alias_name(alias_name)?;

    let mut stack = Stack::new(STACK_NAME, "Lambda function behind an API Gateway REST API")?;

    let table_arn = stack.import(ExportName::DynamoDbTableArn);
    let table_name = stack.import(ExportName::DynamoDbTableName);
    let bucket_name = stack.import(ExportName::LambdaS3BucketName);
    let bucket_arn = stack.import(ExportName::LambdaS3BucketArn);

    let role = stack.add_resource(
        "cdk-lambda-pyServiceRole",
        &Role::for_service("lambda.amazonaws.com")
            .with_managed_policy("service-role/AWSLambdaBasicExecutionRole"),
    )?;

    let mut policy = Policy::new("cdklambdapyServiceRoleDefaultPolicy", role.reference());
    policy.add_statement(PolicyStatement::allow(
        ["xray:PutTraceSegments", "xray:PutTelemetryRecords"],
        [Expr::literal("*")],
    ));
    policy.add_statement(PolicyStatement::allow(["dynamodb:*"], [table_arn]));
    policy.add_statement(PolicyStatement::allow(
        ["s3:GetObject", "s3:PutObject", "s3:DeleteObject"],
        [s3::objects_arn(bucket_arn)],
    ));
    let policy = stack.add_resource("cdk-lambda-pyServiceRoleDefaultPolicy", &policy)?;

    let mut function = Function {
        code: Code {
            zip_file: PLACEHOLDER_SOURCE.to_string(),
        },
        role: role.get_att(crate::resources::iam::ATTR_ARN),
        environment: None,
        function_name,
        handler: ctx.function.handler.clone(),
        memory_size: ctx.function.memory_size,
        runtime: ctx.function.runtime.clone(),
        timeout: ctx.function.timeout,
        tracing_config: Some(TracingConfig {
            mode: TracingMode::Active,
        }),
    };
    function.add_environment("DYNAMODB_TABLE_NAME", table_name);
    function.add_environment("S3_BUCKET_NAME", bucket_name);
    let version_suffix = function.content_hash()?;

    let function = stack.add_resource_with(
        "cdk-lambda-py",
        &function,
        ResourceOptions::new().depends_on(&policy).depends_on(&role),
    )?;

    // A new logical id per configuration makes CloudFormation publish a new
    // version; old versions stay behind for aliases that still point at them.
    let version = stack.add_resource_with(
        &format!("cdk-lambda-pyCurrentVersion{}", version_suffix),
        &Version {
            function_name: function.reference(),
        },
        ResourceOptions::new().removal_policy(RemovalPolicy::Retain),
    )?;

    // Bootstrap-only binding: the alias points at the version published with
    // this template. After that the pipeline's build stage repoints it, so a
    // later template update may move the alias back to the synthesized version.
    let alias = stack.add_resource(
        &format!("cdk-lambda-pyAlias{}", alias_name),
        &Alias {
            function_name: function.reference(),
            function_version: version.get_att(lambda::ATTR_VERSION),
            name: alias_name.to_string(),
        },
    )?;
    debug!(
        "Alias {} bound to {} until the pipeline publishes a version",
        alias_name,
        version.logical_id()
    );

    stack.add_resource(
        "ApiGatewayInvokePermission",
        &Permission::invoke(alias.reference(), API_GATEWAY_PRINCIPAL),
    )?;

    let rest_api = stack.add_resource(
        "cdk-apigateway-py",
        &RestApi {
            description: Some("API Gateway REST for Lambda".to_string()),
            endpoint_configuration: EndpointConfiguration {
                types: vec![EndpointType::Edge],
            },
            name: REST_API_NAME.to_string(),
        },
    )?;

    let proxy = stack.add_resource(
        "cdk-apigateway-py{proxy+}",
        &ApiResource {
            parent_id: rest_api.get_att(apigateway::ATTR_ROOT_RESOURCE_ID),
            path_part: apigateway::PROXY_PATH_PART.to_string(),
            rest_api_id: rest_api.reference(),
        },
    )?;

    let method = stack.add_resource(
        "cdk-apigateway-py{proxy+}ANY",
        &Method {
            authorization_type: AuthorizationType::None,
            http_method: "ANY".to_string(),
            integration: Integration::lambda_proxy(alias.reference()),
            resource_id: proxy.reference(),
            rest_api_id: rest_api.reference(),
        },
    )?;

    let deployment = stack.add_resource_with(
        "cdk-apigateway-pyDeployment",
        &Deployment {
            description: Some("Deployment of cdk-apigateway-py".to_string()),
            rest_api_id: rest_api.reference(),
        },
        ResourceOptions::new().depends_on(&method).depends_on(&proxy),
    )?;

    let stage = stack.add_resource(
        &format!("cdk-apigateway-pyDeploymentStage{}", API_STAGE),
        &Stage {
            deployment_id: deployment.reference(),
            rest_api_id: rest_api.reference(),
            stage_name: API_STAGE.to_string(),
            tracing_enabled: true,
        },
    )?;

    stack.add_resource(
        "cdk-apigateway-py{proxy+}ANYPermission",
        &Permission::invoke(alias.reference(), API_GATEWAY_PRINCIPAL).with_source_arn(
            apigateway::execute_api_arn(rest_api.reference(), stage.reference(), "*", "/*"),
        ),
    )?;

    stack.add_output(
        "cdk-apigateway-pyEndpoint",
        apigateway::endpoint_url(rest_api.reference(), stage.reference()),
        "Invoke URL of the REST API",
    )?;

    stack.export(
        "LambdaFunctionArn",
        ExportName::LambdaFunctionArn,
        function.get_att(lambda::ATTR_ARN),
        "ARN of the Lambda function",
    )?;
    stack.export(
        "LambdaFunctionAliasArn",
        ExportName::LambdaFunctionAliasArn,
        alias.reference(),
        "ARN of the Lambda function alias",
    )?;
    stack.export(
        "LambdaFunctionName",
        ExportName::LambdaFunctionName,
        function.reference(),
        "Name of the Lambda function",
    )?;
    stack.export(
        "LambdaFunctionAliasName",
        ExportName::LambdaFunctionAliasName,
        Expr::literal(alias_name),
        "Name of the Lambda function alias",
    )?;

    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compute(env: &str) -> Stack {
        build(&DeploymentContext::for_environment(env).unwrap()).unwrap()
    }

    #[test]
    fn test_function_environment_comes_from_imports() {
        let stack = compute("dev");
        let function = stack.template().resource("cdklambdapy").unwrap();

        assert_eq!(function.properties["FunctionName"], "lambda-packagecode-zip-dev");
        assert_eq!(function.properties["Runtime"], "python3.12");
        assert_eq!(function.properties["Handler"], "app.lambda_handler");
        assert_eq!(function.properties["TracingConfig"]["Mode"], "Active");
        assert_eq!(
            function.properties["Environment"]["Variables"],
            json!({
                "DYNAMODB_TABLE_NAME": {"Fn::ImportValue": "DynamoDBTableName"},
                "S3_BUCKET_NAME": {"Fn::ImportValue": "LambdaS3BucketName"}
            })
        );
        assert_eq!(
            function.depends_on,
            vec![
                "cdklambdapyServiceRoleDefaultPolicy".to_string(),
                "cdklambdapyServiceRole".to_string()
            ]
        );
    }

    #[test]
    fn test_placeholder_source_is_not_indented() {
        let stack = compute("dev");
        let code = &stack.template().resource("cdklambdapy").unwrap().properties["Code"];
        let source = code["ZipFile"].as_str().unwrap();

        assert!(source.starts_with("def lambda_handler(event, context):"));
        assert!(source.contains("'statusCode': 200"));
    }

    #[test]
    fn test_version_is_retained_and_hash_named() {
        let stack = compute("dev");
        let versions: Vec<_> = stack
            .template()
            .resources_of_type("AWS::Lambda::Version")
            .collect();

        assert_eq!(versions.len(), 1);
        let (logical_id, version) = versions[0];
        assert!(logical_id.starts_with("cdklambdapyCurrentVersion"));
        assert_eq!(version.deletion_policy, Some(RemovalPolicy::Retain));
        assert_eq!(version.update_replace_policy, Some(RemovalPolicy::Retain));
    }

    #[test]
    fn test_alias_targets_the_published_version() {
        let stack = compute("qa");
        let (_, alias) = stack
            .template()
            .resources_of_type("AWS::Lambda::Alias")
            .next()
            .unwrap();

        assert_eq!(alias.properties["Name"], "qa");
        assert_eq!(alias.properties["FunctionName"], json!({"Ref": "cdklambdapy"}));
        let version_ref = alias.properties["FunctionVersion"]["Fn::GetAtt"][0]
            .as_str()
            .unwrap();
        assert!(version_ref.starts_with("cdklambdapyCurrentVersion"));
    }

    #[test]
    fn test_labels_matching_other_logical_ids_synthesize() {
        for label in ["cdklambdapy", "cdkapigatewaypy"] {
            let stack = compute(label);
            let (logical_id, alias) = stack
                .template()
                .resources_of_type("AWS::Lambda::Alias")
                .next()
                .unwrap();

            assert_eq!(logical_id, &format!("cdklambdapyAlias{}", label));
            assert_eq!(alias.properties["Name"], label);
        }
    }

    #[test]
    fn test_role_policy_statements() {
        let stack = compute("dev");
        let policy = stack
            .template()
            .resource("cdklambdapyServiceRoleDefaultPolicy")
            .unwrap();
        let statements = policy.properties["PolicyDocument"]["Statement"]
            .as_array()
            .unwrap();

        assert!(statements.contains(&json!({
            "Action": "dynamodb:*",
            "Effect": "Allow",
            "Resource": {"Fn::ImportValue": "DynamoDBTableArn"}
        })));
        assert!(statements.contains(&json!({
            "Action": ["s3:GetObject", "s3:PutObject", "s3:DeleteObject"],
            "Effect": "Allow",
            "Resource": {"Fn::Join": ["", [{"Fn::ImportValue": "LambdaS3BucketArn"}, "/*"]]}
        })));
    }

    #[test]
    fn test_stage_is_fixed_regardless_of_label() {
        let stack = compute("prod");
        let (_, stage) = stack
            .template()
            .resources_of_type("AWS::ApiGateway::Stage")
            .next()
            .unwrap();

        assert_eq!(stage.properties["StageName"], API_STAGE);
        assert_eq!(stage.properties["TracingEnabled"], true);
    }

    #[test]
    fn test_changing_the_function_publishes_a_new_version() {
        let mut ctx = DeploymentContext::default();
        let before = build(&ctx).unwrap();
        ctx.function.memory_size = Some(256);
        let after = build(&ctx).unwrap();

        let version_id = |stack: &Stack| {
            stack
                .template()
                .resources_of_type("AWS::Lambda::Version")
                .map(|(id, _)| id.clone())
                .next()
                .unwrap()
        };
        assert_ne!(version_id(&before), version_id(&after));
    }
}
