use crate::config::DeploymentContext;
use crate::error::IacResult;
use crate::exports::ExportName;
use crate::resources::dynamodb::{self, AttributeType, Table};
use crate::stack::{ResourceOptions, Stack};
use crate::template::RemovalPolicy;

pub const STACK_NAME: &str = "DynamoDBStack";
pub const TABLE_NAME: &str = "cdk-table-py";
pub const PARTITION_KEY: &str = "id";

/// Key-value table holding the function's records.
pub fn build(_ctx: &DeploymentContext) -> IacResult<Stack> {
    crate::naming::validate_table_name(TABLE_NAME)?;

    let mut stack = Stack::new(STACK_NAME, "DynamoDB table used by the Lambda function")?;

    // Destroyed with the stack; development data only.
    let table = stack.add_resource_with(
        "cdk-table-py",
        &Table::with_partition_key(TABLE_NAME, PARTITION_KEY, AttributeType::String),
        ResourceOptions::new().removal_policy(RemovalPolicy::Destroy),
    )?;

    stack.export(
        "DynamoDBTableArn",
        ExportName::DynamoDbTableArn,
        table.get_att(dynamodb::ATTR_ARN),
        "ARN of the DynamoDB table",
    )?;
    stack.export(
        "DynamoDBTableName",
        ExportName::DynamoDbTableName,
        table.reference(),
        "Name of the DynamoDB table",
    )?;

    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_shape() {
        let stack = build(&DeploymentContext::default()).unwrap();
        let table = stack.template().resource("cdktablepy").unwrap();

        assert_eq!(table.resource_type, "AWS::DynamoDB::Table");
        assert_eq!(table.properties["TableName"], "cdk-table-py");
        assert_eq!(
            table.properties["KeySchema"],
            json!([{"AttributeName": "id", "KeyType": "HASH"}])
        );
        assert_eq!(
            table.properties["AttributeDefinitions"],
            json!([{"AttributeName": "id", "AttributeType": "S"}])
        );
        assert_eq!(table.deletion_policy, Some(RemovalPolicy::Destroy));
    }
}
