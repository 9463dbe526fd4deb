use crate::error::IacResult;
use crate::template::{Expr, ResourceProperties};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const ATTR_ARN: &str = "Arn";
/// Attribute of an `AWS::Lambda::Version` holding the version number.
pub const ATTR_VERSION: &str = "Version";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Code {
    pub zip_file: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Environment {
    pub variables: BTreeMap<String, Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TracingMode {
    Active,
    PassThrough,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TracingConfig {
    pub mode: TracingMode,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Function {
    pub code: Code,
    pub role: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,
    pub function_name: String,
    pub handler: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_size: Option<u32>,
    pub runtime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracing_config: Option<TracingConfig>,
}

impl Function {
    /// Short hash of the function's configuration. Any change to the code or
    /// settings yields a new value, which is used to name the version resource
    /// so that CloudFormation publishes a new version.
    pub fn content_hash(&self) -> IacResult<String> {
        let content = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Ok(digest[..32].to_string())
    }

    pub fn add_environment(&mut self, key: impl Into<String>, value: Expr) {
        self.environment
            .get_or_insert_with(|| Environment {
                variables: BTreeMap::new(),
            })
            .variables
            .insert(key.into(), value);
    }
}

impl ResourceProperties for Function {
    const RESOURCE_TYPE: &'static str = "AWS::Lambda::Function";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Version {
    pub function_name: Expr,
}

impl ResourceProperties for Version {
    const RESOURCE_TYPE: &'static str = "AWS::Lambda::Version";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Alias {
    pub function_name: Expr,
    pub function_version: Expr,
    pub name: String,
}

impl ResourceProperties for Alias {
    const RESOURCE_TYPE: &'static str = "AWS::Lambda::Alias";
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Permission {
    pub action: String,
    pub function_name: Expr,
    pub principal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_arn: Option<Expr>,
}

impl Permission {
    pub fn invoke(function_name: Expr, principal: impl Into<String>) -> Self {
        Self {
            action: "lambda:InvokeFunction".to_string(),
            function_name,
            principal: principal.into(),
            source_arn: None,
        }
    }

    pub fn with_source_arn(mut self, source_arn: Expr) -> Self {
        self.source_arn = Some(source_arn);
        self
    }
}

impl ResourceProperties for Permission {
    const RESOURCE_TYPE: &'static str = "AWS::Lambda::Permission";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(source: &str) -> Function {
        Function {
            code: Code {
                zip_file: source.to_string(),
            },
            role: Expr::get_att("Role", ATTR_ARN),
            environment: None,
            function_name: "handler".to_string(),
            handler: "app.lambda_handler".to_string(),
            memory_size: None,
            runtime: "python3.12".to_string(),
            timeout: None,
            tracing_config: None,
        }
    }

    #[test]
    fn test_content_hash_tracks_code_changes() {
        let a = function("def lambda_handler(e, c): return 1");
        let b = function("def lambda_handler(e, c): return 2");

        let hash = a.content_hash().unwrap();
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, a.clone().content_hash().unwrap());
        assert_ne!(hash, b.content_hash().unwrap());
    }

    #[test]
    fn test_environment_variables_are_sorted() {
        let mut f = function("pass");
        f.add_environment("S3_BUCKET_NAME", Expr::literal("bucket"));
        f.add_environment("DYNAMODB_TABLE_NAME", Expr::literal("table"));

        let value = serde_json::to_value(&f).unwrap();
        let keys: Vec<&String> = value["Environment"]["Variables"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(keys, vec!["DYNAMODB_TABLE_NAME", "S3_BUCKET_NAME"]);
    }
}
