use super::*;
use crate::aws_mock::{MockCall, MockStackClient, MOCK_ACCOUNT};
use crate::config::DeploymentContext;
use crate::stacks::build_app;

const ALL: [&str; 4] = ["DynamoDBStack", "LambdaS3Stack", "LambdaStack", "CicdStack"];

fn assembly() -> CloudAssembly {
    build_app(&DeploymentContext::default())
        .unwrap()
        .synth()
        .unwrap()
}

fn engine(client: &MockStackClient) -> DeploymentEngine {
    DeploymentEngine::new(Box::new(client.clone()), DeploymentLogger::in_memory())
        .with_polling(Duration::from_millis(1), Duration::from_secs(5))
}

fn creates(names: &[&str]) -> Vec<MockCall> {
    names
        .iter()
        .map(|n| MockCall::Create(n.to_string()))
        .collect()
}

#[test]
fn test_plans() {
    let assembly = assembly();

    let deploy = DeploymentPlan::deploy(&assembly, &["CicdStack".to_string()]).unwrap();
    assert_eq!(deploy.stacks, ALL);

    let destroy = DeploymentPlan::destroy(&assembly, &["LambdaS3Stack".to_string()]).unwrap();
    assert_eq!(destroy.stacks, ["CicdStack", "LambdaStack", "LambdaS3Stack"]);
    assert!(destroy.to_string().contains("  1. CicdStack"));

    assert!(DeploymentPlan::deploy(&assembly, &["Nope".to_string()]).is_err());
}

#[tokio::test]
async fn test_fresh_deploy_creates_in_dependency_order() {
    let client = MockStackClient::new().with_poll_delay(2);
    let assembly = assembly();

    let summary = engine(&client).deploy(&assembly, &[]).await.unwrap();

    assert_eq!(client.mutations(), creates(&ALL));
    assert_eq!(summary.count(StackOutcome::Created), 4);
    assert_eq!(summary.command, Command::Deploy);
    for name in ALL {
        assert_eq!(client.status(name), Some(StackStatus::CreateComplete));
        assert_eq!(
            client.template_body(name).unwrap(),
            assembly.template_json(name).unwrap()
        );
    }
}

#[tokio::test]
async fn test_redeploy_without_changes_is_unchanged() {
    let client = MockStackClient::new();
    let assembly = assembly();
    engine(&client).deploy(&assembly, &[]).await.unwrap();

    let summary = engine(&client).deploy(&assembly, &[]).await.unwrap();
    assert_eq!(summary.count(StackOutcome::Unchanged), 4);
}

#[tokio::test]
async fn test_changed_template_is_updated() {
    let client = MockStackClient::new();
    let dev = assembly();
    engine(&client).deploy(&dev, &[]).await.unwrap();

    let qa = build_app(&DeploymentContext::for_environment("qa").unwrap())
        .unwrap()
        .synth()
        .unwrap();
    let summary = engine(&client)
        .deploy(&qa, &["LambdaS3Stack".to_string()])
        .await
        .unwrap();

    assert_eq!(summary.results.len(), 1);
    assert_eq!(summary.outcome("LambdaS3Stack"), Some(StackOutcome::Updated));
    assert_eq!(client.status("LambdaS3Stack"), Some(StackStatus::UpdateComplete));
}

#[tokio::test]
async fn test_selection_deploys_dependencies_only() {
    let client = MockStackClient::new();

    let summary = engine(&client)
        .deploy(&assembly(), &["LambdaStack".to_string()])
        .await
        .unwrap();

    assert_eq!(
        client.mutations(),
        creates(&["DynamoDBStack", "LambdaS3Stack", "LambdaStack"])
    );
    assert_eq!(summary.outcome("CicdStack"), None);
}

#[tokio::test]
async fn test_rollback_aborts_the_run() {
    let client = MockStackClient::new();
    client.roll_back("LambdaStack", "Export LambdaS3BucketName cannot be found");

    let mut engine = engine(&client);
    let err = engine.deploy(&assembly(), &[]).await.unwrap_err();

    assert!(matches!(
        &err,
        IacError::Deployment {
            source: Some(CloudError::StackFailed { status: StackStatus::RollbackComplete, .. }),
            ..
        }
    ));
    assert!(err.to_string().contains("cannot be found"));
    assert_eq!(err.context().unwrap().stack_name.as_deref(), Some("LambdaStack"));

    // Nothing after the failed stack is attempted.
    assert_eq!(
        client.mutations(),
        creates(&["DynamoDBStack", "LambdaS3Stack", "LambdaStack"])
    );
    let report = engine.logger().report().unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.failed(), 1);
}

#[tokio::test]
async fn test_rolled_back_stack_is_recreated() {
    let client = MockStackClient::new();
    client.insert_stack("DynamoDBStack", "{}", StackStatus::RollbackComplete);

    let mut engine = engine(&client);
    let summary = engine
        .deploy(&assembly(), &["DynamoDBStack".to_string()])
        .await
        .unwrap();

    assert_eq!(
        client.mutations(),
        vec![
            MockCall::Delete("DynamoDBStack".to_string()),
            MockCall::Create("DynamoDBStack".to_string()),
        ]
    );
    assert_eq!(summary.outcome("DynamoDBStack"), Some(StackOutcome::Created));
    assert_eq!(engine.logger().report().unwrap().warnings.len(), 1);
}

#[tokio::test]
async fn test_busy_stack_is_awaited_before_update() {
    let client = MockStackClient::new().with_poll_delay(3);
    let assembly = assembly();
    let template = assembly.template_json("DynamoDBStack").unwrap();
    client.create_stack("DynamoDBStack", &template).await.unwrap();

    let summary = engine(&client)
        .deploy(&assembly, &["DynamoDBStack".to_string()])
        .await
        .unwrap();

    assert_eq!(summary.outcome("DynamoDBStack"), Some(StackOutcome::Unchanged));
    assert_eq!(
        client.mutations(),
        vec![
            MockCall::Create("DynamoDBStack".to_string()),
            MockCall::Update("DynamoDBStack".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_wait_times_out() {
    let client = MockStackClient::new().with_poll_delay(u32::MAX);
    let engine = DeploymentEngine::new(Box::new(client.clone()), DeploymentLogger::in_memory())
        .with_polling(Duration::from_millis(1), Duration::from_millis(20));

    client.create_stack("LambdaStack", "{}").await.unwrap();
    assert!(matches!(
        engine.wait_for_stack("LambdaStack").await,
        Err(CloudError::Timeout(_))
    ));
}

#[tokio::test]
async fn test_destroy_removes_dependents_first() {
    let client = MockStackClient::new();
    let assembly = assembly();
    engine(&client).deploy(&assembly, &[]).await.unwrap();

    let summary = engine(&client)
        .destroy(&assembly, &["LambdaStack".to_string()])
        .await
        .unwrap();

    let deletes: Vec<MockCall> = client
        .mutations()
        .into_iter()
        .filter(|c| matches!(c, MockCall::Delete(_)))
        .collect();
    assert_eq!(
        deletes,
        vec![
            MockCall::Delete("CicdStack".to_string()),
            MockCall::Delete("LambdaStack".to_string()),
        ]
    );
    assert_eq!(summary.count(StackOutcome::Deleted), 2);
    assert_eq!(client.status("CicdStack"), None);
    assert_eq!(client.status("DynamoDBStack"), Some(StackStatus::CreateComplete));
}

#[tokio::test]
async fn test_destroy_skips_missing_stacks() {
    let client = MockStackClient::new();

    let summary = engine(&client).destroy(&assembly(), &[]).await.unwrap();

    assert_eq!(summary.count(StackOutcome::Absent), 4);
    assert!(client.mutations().is_empty());
}

#[tokio::test]
async fn test_api_errors_are_reported_with_remediation() {
    let client = MockStackClient::new();
    client.fail_requests(
        "DynamoDBStack",
        CloudError::Authentication("The security token included in the request is expired".to_string()),
    );

    let err = engine(&client).deploy(&assembly(), &[]).await.unwrap_err();

    assert_eq!(err.category(), "deployment");
    assert!(err.error_report().contains("Check your AWS credentials"));
    assert!(client.mutations().is_empty());
}

#[tokio::test]
async fn test_runs_are_logged_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockStackClient::new();
    let mut engine = DeploymentEngine::new(
        Box::new(client.clone()),
        DeploymentLogger::new(dir.path()).unwrap(),
    )
    .with_polling(Duration::from_millis(1), Duration::from_secs(5));

    let summary = engine.deploy(&assembly(), &[]).await.unwrap();

    let log = std::fs::read_to_string(dir.path().join("deployment.log")).unwrap();
    assert_eq!(log.lines().count(), 6);
    assert!(log.lines().all(|line| line.contains(&summary.run_id)));
}

#[tokio::test]
async fn test_wrong_account_touches_no_stack() {
    let client = MockStackClient::new().with_account("210987654321");
    let mut engine = engine(&client).with_expected_account(Some("123456789012".to_string()));

    let err = engine.deploy(&assembly(), &[]).await.unwrap_err();

    assert!(matches!(
        &err,
        IacError::Deployment {
            source: Some(CloudError::AccountMismatch { .. }),
            ..
        }
    ));
    assert!(err.to_string().contains("210987654321"));
    assert_eq!(client.calls(), vec![MockCall::CallerIdentity]);

    let err = engine.destroy(&assembly(), &[]).await.unwrap_err();
    assert!(err.error_report().contains("Switch to credentials for account 123456789012"));
    assert!(client.mutations().is_empty());
}

#[tokio::test]
async fn test_matching_account_deploys() {
    let client = MockStackClient::new();
    let mut engine = engine(&client).with_expected_account(Some(MOCK_ACCOUNT.to_string()));

    let summary = engine.deploy(&assembly(), &[]).await.unwrap();

    assert_eq!(summary.count(StackOutcome::Created), 4);
    assert_eq!(client.calls()[0], MockCall::CallerIdentity);
}

#[tokio::test]
async fn test_unwritable_log_does_not_fail_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockStackClient::new();
    let logger = DeploymentLogger::new(dir.path()).unwrap();
    std::fs::create_dir(dir.path().join("deployment.log")).unwrap();
    let mut engine = DeploymentEngine::new(Box::new(client.clone()), logger)
        .with_polling(Duration::from_millis(1), Duration::from_secs(5));

    let summary = engine.deploy(&assembly(), &[]).await.unwrap();

    assert_eq!(summary.count(StackOutcome::Created), 4);
    assert!(summary.run_id.starts_with("deploy-"));
    let report = engine.logger().report().unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.stacks.len(), 4);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].starts_with("deployment log not written"));
}
