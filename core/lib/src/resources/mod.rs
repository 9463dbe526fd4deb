//! Typed `Properties` blocks for the CloudFormation resource types the stacks use.

pub mod apigateway;
pub mod codebuild;
pub mod codepipeline;
pub mod dynamodb;
pub mod iam;
pub mod lambda;
pub mod s3;
