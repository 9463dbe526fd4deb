use crate::cloud::*;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call received by [`MockStackClient`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Describe(String),
    Create(String),
    Update(String),
    Delete(String),
    CallerIdentity,
}

#[derive(Debug, Clone)]
struct MockStack {
    template_body: String,
    status: StackStatus,
    status_reason: Option<String>,
    /// Describes left before `next` takes effect.
    pending: Option<(u32, StackStatus)>,
}

#[derive(Debug, Default)]
struct MockState {
    stacks: HashMap<String, MockStack>,
    calls: Vec<MockCall>,
    rollbacks: HashMap<String, String>,
    request_failures: HashMap<String, CloudError>,
    polls_per_operation: u32,
    account: Option<String>,
}

/// In-memory CloudFormation for engine tests. Clones share state, so a test
/// can keep one handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockStackClient {
    state: Arc<Mutex<MockState>>,
}

impl MockStackClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report operations as in progress for `polls` describes before they finish.
    pub fn with_poll_delay(self, polls: u32) -> Self {
        self.lock().polls_per_operation = polls;
        self
    }

    /// Account reported by [`StackClient::caller_account`], [`MOCK_ACCOUNT`] by default.
    pub fn with_account(self, account: &str) -> Self {
        self.lock().account = Some(account.to_string());
        self
    }

    /// Seed an existing stack.
    pub fn insert_stack(&self, stack_name: &str, template_body: &str, status: StackStatus) {
        self.lock().stacks.insert(
            stack_name.to_string(),
            MockStack {
                template_body: template_body.to_string(),
                status,
                status_reason: None,
                pending: None,
            },
        );
    }

    /// Make the next create or update of `stack_name` roll back with `reason`.
    pub fn roll_back(&self, stack_name: &str, reason: &str) {
        self.lock()
            .rollbacks
            .insert(stack_name.to_string(), reason.to_string());
    }

    /// Make every request for `stack_name` fail with `error`.
    pub fn fail_requests(&self, stack_name: &str, error: CloudError) {
        self.lock()
            .request_failures
            .insert(stack_name.to_string(), error);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Calls that change a stack, skipping reads.
    pub fn mutations(&self) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, MockCall::Describe(_) | MockCall::CallerIdentity))
            .collect()
    }

    pub fn status(&self, stack_name: &str) -> Option<StackStatus> {
        self.lock().stacks.get(stack_name).map(|s| s.status.clone())
    }

    pub fn template_body(&self, stack_name: &str) -> Option<String> {
        self.lock()
            .stacks
            .get(stack_name)
            .map(|s| s.template_body.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: MockCall, stack_name: &str) -> Result<MutexGuard<'_, MockState>, CloudError> {
        let mut state = self.lock();
        state.calls.push(call);
        if let Some(error) = state.request_failures.get(stack_name).cloned() {
            return Err(error);
        }
        Ok(state)
    }
}

#[async_trait]
impl StackClient for MockStackClient {
    async fn describe_stack(
        &self,
        stack_name: &str,
    ) -> Result<Option<StackDescription>, CloudError> {
        let mut state = self.record(MockCall::Describe(stack_name.to_string()), stack_name)?;

        let Some(stack) = state.stacks.get_mut(stack_name) else {
            return Ok(None);
        };

        match stack.pending.take() {
            Some((0, next)) => stack.status = next,
            Some((remaining, next)) => stack.pending = Some((remaining - 1, next)),
            None => {}
        }

        if stack.status == StackStatus::DeleteComplete {
            state.stacks.remove(stack_name);
            return Ok(None);
        }

        Ok(Some(StackDescription {
            stack_name: stack_name.to_string(),
            stack_id: Some(mock_stack_id(stack_name)),
            status: stack.status.clone(),
            status_reason: stack.status_reason.clone(),
            outputs: BTreeMap::new(),
        }))
    }

    async fn create_stack(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<String, CloudError> {
        let mut state = self.record(MockCall::Create(stack_name.to_string()), stack_name)?;

        if state.stacks.contains_key(stack_name) {
            return Err(CloudError::StackAlreadyExists(format!(
                "Stack [{}] already exists",
                stack_name
            )));
        }

        let (next, status_reason) = match state.rollbacks.remove(stack_name) {
            Some(reason) => (StackStatus::RollbackComplete, Some(reason)),
            None => (StackStatus::CreateComplete, None),
        };
        let polls = state.polls_per_operation;
        state.stacks.insert(
            stack_name.to_string(),
            MockStack {
                template_body: template_body.to_string(),
                status: StackStatus::CreateInProgress,
                status_reason,
                pending: Some((polls, next)),
            },
        );

        Ok(mock_stack_id(stack_name))
    }

    async fn update_stack(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<UpdateOutcome, CloudError> {
        let mut state = self.record(MockCall::Update(stack_name.to_string()), stack_name)?;
        let rollback = state.rollbacks.remove(stack_name);
        let polls = state.polls_per_operation;

        let stack = state.stacks.get_mut(stack_name).ok_or_else(|| {
            CloudError::Validation(format!("Stack with id {} does not exist", stack_name))
        })?;

        if stack.status.is_in_progress() {
            return Err(CloudError::Validation(format!(
                "Stack:{} is in {} state and can not be updated.",
                stack_name, stack.status
            )));
        }
        if stack.template_body == template_body && rollback.is_none() {
            return Ok(UpdateOutcome::NoChanges);
        }

        stack.status = StackStatus::UpdateInProgress;
        match rollback {
            Some(reason) => {
                stack.status_reason = Some(reason);
                stack.pending = Some((polls, StackStatus::UpdateRollbackComplete));
            }
            None => {
                stack.template_body = template_body.to_string();
                stack.status_reason = None;
                stack.pending = Some((polls, StackStatus::UpdateComplete));
            }
        }

        Ok(UpdateOutcome::Started)
    }

    async fn delete_stack(&self, stack_name: &str) -> Result<(), CloudError> {
        let mut state = self.record(MockCall::Delete(stack_name.to_string()), stack_name)?;
        let polls = state.polls_per_operation;

        if let Some(stack) = state.stacks.get_mut(stack_name) {
            stack.status = StackStatus::DeleteInProgress;
            stack.pending = Some((polls, StackStatus::DeleteComplete));
        }
        Ok(())
    }

    async fn caller_account(&self) -> Result<String, CloudError> {
        let mut state = self.lock();
        state.calls.push(MockCall::CallerIdentity);
        Ok(state
            .account
            .clone()
            .unwrap_or_else(|| MOCK_ACCOUNT.to_string()))
    }
}

/// Account the mock answers with unless told otherwise.
pub const MOCK_ACCOUNT: &str = "123456789012";

fn mock_stack_id(stack_name: &str) -> String {
    format!(
        "arn:aws:cloudformation:us-east-1:{}:stack/{}/mock",
        MOCK_ACCOUNT, stack_name
    )
}
