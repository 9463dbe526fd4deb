use crate::template::{Expr, ResourceProperties};
use serde::Serialize;

pub const ATTR_ARN: &str = "Arn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VersioningStatus {
    Enabled,
    Suspended,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersioningConfiguration {
    pub status: VersioningStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Bucket {
    pub bucket_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versioning_configuration: Option<VersioningConfiguration>,
}

impl Bucket {
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            versioning_configuration: None,
        }
    }

    pub fn versioned(mut self) -> Self {
        self.versioning_configuration = Some(VersioningConfiguration {
            status: VersioningStatus::Enabled,
        });
        self
    }
}

impl ResourceProperties for Bucket {
    const RESOURCE_TYPE: &'static str = "AWS::S3::Bucket";
}

/// ARN pattern matching every object in the bucket: `<bucket arn>/*`.
pub fn objects_arn(bucket_arn: Expr) -> Expr {
    Expr::concat(vec![bucket_arn, Expr::literal("/*")])
}
