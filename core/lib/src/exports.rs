use crate::stacks::Unit;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Names of the values stacks publish to each other.
///
/// The strings are a contract with separately deployed stacks and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExportName {
    DynamoDbTableArn,
    DynamoDbTableName,
    LambdaS3BucketName,
    LambdaS3BucketArn,
    LambdaEnvironment,
    LambdaFunctionArn,
    LambdaFunctionAliasArn,
    LambdaFunctionName,
    LambdaFunctionAliasName,
    PipelineName,
}

impl ExportName {
    pub const ALL: [ExportName; 10] = [
        ExportName::DynamoDbTableArn,
        ExportName::DynamoDbTableName,
        ExportName::LambdaS3BucketName,
        ExportName::LambdaS3BucketArn,
        ExportName::LambdaEnvironment,
        ExportName::LambdaFunctionArn,
        ExportName::LambdaFunctionAliasArn,
        ExportName::LambdaFunctionName,
        ExportName::LambdaFunctionAliasName,
        ExportName::PipelineName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportName::DynamoDbTableArn => "DynamoDBTableArn",
            ExportName::DynamoDbTableName => "DynamoDBTableName",
            ExportName::LambdaS3BucketName => "LambdaS3BucketName",
            ExportName::LambdaS3BucketArn => "LambdaS3BucketArn",
            ExportName::LambdaEnvironment => "LambdaEnvironment",
            ExportName::LambdaFunctionArn => "LambdaFunctionArn",
            ExportName::LambdaFunctionAliasArn => "LambdaFunctionAliasArn",
            ExportName::LambdaFunctionName => "LambdaFunctionName",
            ExportName::LambdaFunctionAliasName => "LambdaFunctionAliasName",
            ExportName::PipelineName => "PipelineName",
        }
    }

    /// The unit that publishes this value.
    pub fn producer(&self) -> Unit {
        match self {
            ExportName::DynamoDbTableArn | ExportName::DynamoDbTableName => Unit::Storage,
            ExportName::LambdaS3BucketName
            | ExportName::LambdaS3BucketArn
            | ExportName::LambdaEnvironment => Unit::ArtifactBucket,
            ExportName::LambdaFunctionArn
            | ExportName::LambdaFunctionAliasArn
            | ExportName::LambdaFunctionName
            | ExportName::LambdaFunctionAliasName => Unit::Compute,
            ExportName::PipelineName => Unit::Pipeline,
        }
    }

    /// The units allowed to import this value. `LambdaEnvironment` and
    /// `PipelineName` are published for inspection only.
    pub fn consumers(&self) -> &'static [Unit] {
        match self {
            ExportName::DynamoDbTableArn | ExportName::DynamoDbTableName => &[Unit::Compute],
            ExportName::LambdaS3BucketName | ExportName::LambdaS3BucketArn => {
                &[Unit::Compute, Unit::Pipeline]
            }
            ExportName::LambdaFunctionArn
            | ExportName::LambdaFunctionAliasArn
            | ExportName::LambdaFunctionName
            | ExportName::LambdaFunctionAliasName => &[Unit::Pipeline],
            ExportName::LambdaEnvironment | ExportName::PipelineName => &[],
        }
    }
}

impl fmt::Display for ExportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown export name: {0}")]
pub struct UnknownExport(pub String);

impl FromStr for ExportName {
    type Err = UnknownExport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExportName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownExport(s.to_string()))
    }
}

impl Serialize for ExportName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
