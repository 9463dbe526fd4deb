use crate::template::{Expr, ResourceProperties};
use serde::Serialize;

pub const ATTR_ROOT_RESOURCE_ID: &str = "RootResourceId";

/// Path part matching any sub-path, forwarded to the integration as `proxy`.
pub const PROXY_PATH_PART: &str = "{proxy+}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointType {
    Edge,
    Regional,
    Private,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointConfiguration {
    pub types: Vec<EndpointType>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestApi {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub endpoint_configuration: EndpointConfiguration,
    pub name: String,
}

impl ResourceProperties for RestApi {
    const RESOURCE_TYPE: &'static str = "AWS::ApiGateway::RestApi";
}

/// A path segment under a REST API (`AWS::ApiGateway::Resource`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiResource {
    pub parent_id: Expr,
    pub path_part: String,
    pub rest_api_id: Expr,
}

impl ResourceProperties for ApiResource {
    const RESOURCE_TYPE: &'static str = "AWS::ApiGateway::Resource";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationType {
    None,
    AwsIam,
    Custom,
    CognitoUserPools,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationType {
    Aws,
    AwsProxy,
    Http,
    HttpProxy,
    Mock,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Integration {
    pub integration_http_method: String,
    #[serde(rename = "Type")]
    pub integration_type: IntegrationType,
    pub uri: Expr,
}

impl Integration {
    /// Lambda proxy integration invoking `function_arn` (a function, version or alias ARN).
    pub fn lambda_proxy(function_arn: Expr) -> Self {
        Self {
            integration_http_method: "POST".to_string(),
            integration_type: IntegrationType::AwsProxy,
            uri: lambda_invocation_uri(function_arn),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Method {
    pub authorization_type: AuthorizationType,
    pub http_method: String,
    pub integration: Integration,
    pub resource_id: Expr,
    pub rest_api_id: Expr,
}

impl ResourceProperties for Method {
    const RESOURCE_TYPE: &'static str = "AWS::ApiGateway::Method";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Deployment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rest_api_id: Expr,
}

impl ResourceProperties for Deployment {
    const RESOURCE_TYPE: &'static str = "AWS::ApiGateway::Deployment";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Stage {
    pub deployment_id: Expr,
    pub rest_api_id: Expr,
    pub stage_name: String,
    pub tracing_enabled: bool,
}

impl ResourceProperties for Stage {
    const RESOURCE_TYPE: &'static str = "AWS::ApiGateway::Stage";
}

/// `arn:<partition>:apigateway:<region>:lambda:path/2015-03-31/functions/<arn>/invocations`
pub fn lambda_invocation_uri(function_arn: Expr) -> Expr {
    Expr::concat(vec![
        Expr::literal("arn:"),
        Expr::partition(),
        Expr::literal(":apigateway:"),
        Expr::region(),
        Expr::literal(":lambda:path/2015-03-31/functions/"),
        function_arn,
        Expr::literal("/invocations"),
    ])
}

/// `arn:<partition>:execute-api:<region>:<account>:<api>/<stage>/<method>/<path>`
pub fn execute_api_arn(rest_api_id: Expr, stage: Expr, method: &str, path: &str) -> Expr {
    Expr::concat(vec![
        Expr::literal("arn:"),
        Expr::partition(),
        Expr::literal(":execute-api:"),
        Expr::region(),
        Expr::literal(":"),
        Expr::account_id(),
        Expr::literal(":"),
        rest_api_id,
        Expr::literal("/"),
        stage,
        Expr::literal(format!("/{}{}", method, path)),
    ])
}

/// `https://<api>.execute-api.<region>.<url suffix>/<stage>/`
pub fn endpoint_url(rest_api_id: Expr, stage: Expr) -> Expr {
    Expr::concat(vec![
        Expr::literal("https://"),
        rest_api_id,
        Expr::literal(".execute-api."),
        Expr::region(),
        Expr::literal("."),
        Expr::url_suffix(),
        Expr::literal("/"),
        stage,
        Expr::literal("/"),
    ])
}
