use super::*;

#[test]
fn test_status_round_trips_through_strings() {
    for status in [
        StackStatus::CreateInProgress,
        StackStatus::CreateComplete,
        StackStatus::RollbackComplete,
        StackStatus::UpdateCompleteCleanupInProgress,
        StackStatus::UpdateRollbackCompleteCleanupInProgress,
        StackStatus::DeleteComplete,
    ] {
        assert_eq!(StackStatus::from(status.as_str()), status);
    }

    assert_eq!(
        StackStatus::from("IMPORT_IN_PROGRESS"),
        StackStatus::Other("IMPORT_IN_PROGRESS".to_string())
    );
}

#[test]
fn test_in_progress_statuses() {
    assert!(StackStatus::CreateInProgress.is_in_progress());
    assert!(StackStatus::UpdateCompleteCleanupInProgress.is_in_progress());
    assert!(StackStatus::from("REVIEW_IN_PROGRESS").is_in_progress());
    assert!(!StackStatus::CreateComplete.is_in_progress());
    assert!(!StackStatus::RollbackComplete.is_in_progress());
}

#[test]
fn test_stack_failed_message() {
    let err = CloudError::StackFailed {
        stack_name: "LambdaStack".to_string(),
        status: StackStatus::UpdateRollbackComplete,
        reason: "Export LambdaS3BucketName cannot be found".to_string(),
    };

    assert_eq!(
        err.to_string(),
        "Stack LambdaStack ended in UPDATE_ROLLBACK_COMPLETE: Export LambdaS3BucketName cannot be found"
    );
    assert!(err.remediation_steps()[0].contains("LambdaStack"));
}

#[test]
fn test_every_error_has_remediation() {
    let errors = [
        CloudError::Authentication("expired".to_string()),
        CloudError::Authorization("denied".to_string()),
        CloudError::StackAlreadyExists("LambdaStack".to_string()),
        CloudError::Validation("bad template".to_string()),
        CloudError::InsufficientCapabilities("CAPABILITY_IAM".to_string()),
        CloudError::AccountMismatch {
            expected: "111111111111".to_string(),
            actual: "222222222222".to_string(),
        },
        CloudError::Timeout("LambdaStack".to_string()),
        CloudError::Network("offline".to_string()),
        CloudError::RateLimit("slow down".to_string()),
        CloudError::Unknown("?".to_string()),
    ];

    for err in errors {
        assert!(!err.remediation_steps().is_empty(), "{}", err);
    }
}
