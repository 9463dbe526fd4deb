use crate::template::ResourceProperties;
use serde::Serialize;

/// Attribute name of a table's ARN.
pub const ATTR_ARN: &str = "Arn";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeType {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "B")]
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyType {
    Hash,
    Range,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: KeyType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeDefinition {
    pub attribute_name: String,
    pub attribute_type: AttributeType,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisionedThroughput {
    pub read_capacity_units: u32,
    pub write_capacity_units: u32,
}

impl Default for ProvisionedThroughput {
    fn default() -> Self {
        Self {
            read_capacity_units: 5,
            write_capacity_units: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Table {
    pub key_schema: Vec<KeySchemaElement>,
    pub attribute_definitions: Vec<AttributeDefinition>,
    pub provisioned_throughput: ProvisionedThroughput,
    pub table_name: String,
}

impl Table {
    /// A provisioned table keyed only by a partition key.
    pub fn with_partition_key(
        table_name: impl Into<String>,
        key_name: impl Into<String>,
        key_type: AttributeType,
    ) -> Self {
        let key_name = key_name.into();
        Self {
            key_schema: vec![KeySchemaElement {
                attribute_name: key_name.clone(),
                key_type: KeyType::Hash,
            }],
            attribute_definitions: vec![AttributeDefinition {
                attribute_name: key_name,
                attribute_type: key_type,
            }],
            provisioned_throughput: ProvisionedThroughput::default(),
            table_name: table_name.into(),
        }
    }
}

impl ResourceProperties for Table {
    const RESOURCE_TYPE: &'static str = "AWS::DynamoDB::Table";
}
