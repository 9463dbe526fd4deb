use crate::assembly::CloudAssembly;
use crate::cloud::*;
use crate::error::{ErrorContext, IacError, IacResult};
use crate::logging::*;
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

#[cfg(test)]
mod tests;

/// How often stack status is polled while CloudFormation works.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound for a single stack operation.
pub const DEFAULT_STACK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Deploy,
    Destroy,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Deploy => write!(f, "deploy"),
            Command::Destroy => write!(f, "destroy"),
        }
    }
}

/// Stacks a command will touch, in the order it touches them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub command: Command,
    pub stacks: Vec<String>,
}

impl DeploymentPlan {
    /// The selection plus its dependencies, dependencies first.
    pub fn deploy(assembly: &CloudAssembly, selection: &[String]) -> IacResult<Self> {
        Ok(Self {
            command: Command::Deploy,
            stacks: owned(assembly.with_dependencies(selection)?),
        })
    }

    /// The selection plus its dependents, dependents first.
    pub fn destroy(assembly: &CloudAssembly, selection: &[String]) -> IacResult<Self> {
        let mut stacks = owned(assembly.with_dependents(selection)?);
        stacks.reverse();
        Ok(Self {
            command: Command::Destroy,
            stacks,
        })
    }
}

impl fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Plan ({}):", self.command)?;
        for (i, stack) in self.stacks.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, stack)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOutcome {
    Created,
    Updated,
    Unchanged,
    Deleted,
    /// Destroy found nothing to delete.
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackResult {
    pub stack_name: String,
    pub outcome: StackOutcome,
    pub duration_ms: u64,
}

/// Result of a deploy or destroy run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSummary {
    pub run_id: String,
    pub command: Command,
    pub results: Vec<StackResult>,
}

impl DeploymentSummary {
    pub fn outcome(&self, stack_name: &str) -> Option<StackOutcome> {
        self.results
            .iter()
            .find(|r| r.stack_name == stack_name)
            .map(|r| r.outcome)
    }

    pub fn count(&self, outcome: StackOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }
}

/// Drives CloudFormation through a synthesized assembly, one stack at a time.
pub struct DeploymentEngine {
    client: Box<dyn StackClient>,
    logger: DeploymentLogger,
    poll_interval: Duration,
    stack_timeout: Duration,
    expected_account: Option<String>,
}

impl DeploymentEngine {
    pub fn new(client: Box<dyn StackClient>, logger: DeploymentLogger) -> Self {
        Self {
            client,
            logger,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stack_timeout: DEFAULT_STACK_TIMEOUT,
            expected_account: None,
        }
    }

    /// Refuse to touch any stack unless the credentials belong to `account`.
    pub fn with_expected_account(mut self, account: Option<String>) -> Self {
        self.expected_account = account;
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, stack_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.stack_timeout = stack_timeout;
        self
    }

    pub fn logger(&self) -> &DeploymentLogger {
        &self.logger
    }

    /// Create or update the selected stacks and their dependencies. An empty
    /// selection deploys every stack. The first failure aborts the run.
    pub async fn deploy(
        &mut self,
        assembly: &CloudAssembly,
        selection: &[String],
    ) -> IacResult<DeploymentSummary> {
        let plan = DeploymentPlan::deploy(assembly, selection)?;
        self.run(plan, assembly).await
    }

    /// Delete the selected stacks and everything depending on them, dependents
    /// first. An empty selection destroys every stack.
    pub async fn destroy(
        &mut self,
        assembly: &CloudAssembly,
        selection: &[String],
    ) -> IacResult<DeploymentSummary> {
        let plan = DeploymentPlan::destroy(assembly, selection)?;
        self.run(plan, assembly).await
    }

    async fn run(
        &mut self,
        plan: DeploymentPlan,
        assembly: &CloudAssembly,
    ) -> IacResult<DeploymentSummary> {
        let command = plan.command;
        self.verify_account().await.map_err(|err| {
            IacError::from(err).with_context(ErrorContext::new(command.to_string()))
        })?;

        let run_started = self.logger.start_run(&command.to_string()).map(drop);
        self.note_log_failure(run_started);
        let run_id = self.logger.run_id().unwrap_or_default().to_string();
        let mut results = Vec::with_capacity(plan.stacks.len());

        for stack_name in &plan.stacks {
            let started = Instant::now();
            let outcome = match command {
                Command::Deploy => self.deploy_stack(assembly, stack_name).await,
                Command::Destroy => self.destroy_stack(stack_name).await,
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(outcome) => {
                    let (action, status) = log_action(outcome);
                    let logged = self.logger.record_stack(
                        stack_name,
                        action,
                        status,
                        Some(duration_ms),
                        None,
                    );
                    self.note_log_failure(logged);
                    results.push(StackResult {
                        stack_name: stack_name.clone(),
                        outcome,
                        duration_ms,
                    });
                }
                Err(err) => {
                    let action = match command {
                        Command::Deploy => StackAction::Update,
                        Command::Destroy => StackAction::Delete,
                    };
                    let logged = self.logger.record_stack(
                        stack_name,
                        action,
                        OperationStatus::Failed,
                        Some(duration_ms),
                        Some(err.to_string()),
                    );
                    self.note_log_failure(logged);
                    let ended = self.logger.end_run(RunStatus::Failed);
                    self.note_log_failure(ended);
                    return Err(IacError::from(err).with_context(
                        ErrorContext::new(command.to_string())
                            .with_stack(stack_name.as_str())
                            .with_info(run_id),
                    ));
                }
            }
        }

        let ended = self.logger.end_run(RunStatus::Completed);
        self.note_log_failure(ended);
        Ok(DeploymentSummary {
            run_id,
            command,
            results,
        })
    }

    async fn verify_account(&self) -> Result<(), CloudError> {
        let Some(expected) = &self.expected_account else {
            return Ok(());
        };
        let actual = self.client.caller_account().await?;
        if &actual != expected {
            return Err(CloudError::AccountMismatch {
                expected: expected.clone(),
                actual,
            });
        }
        debug!("Deploying with credentials for account {}", actual);
        Ok(())
    }

    /// A run's outcome never depends on the log file.
    fn note_log_failure(&mut self, result: std::io::Result<()>) {
        let Err(err) = result else {
            return;
        };
        warn!("Could not write deployment log: {}", err);
        let warning = format!("deployment log not written: {}", err);
        if self
            .logger
            .report()
            .is_some_and(|r| !r.warnings.contains(&warning))
        {
            self.logger.add_warning(warning);
        }
    }

    async fn deploy_stack(
        &mut self,
        assembly: &CloudAssembly,
        stack_name: &str,
    ) -> Result<StackOutcome, CloudError> {
        let template_body = assembly
            .template_json(stack_name)
            .map_err(|e| CloudError::Validation(e.to_string()))?;

        let mut existing = self.client.describe_stack(stack_name).await?;
        if existing.as_ref().is_some_and(|d| d.status.is_in_progress()) {
            info!("Stack {} is busy, waiting before deploying", stack_name);
            existing = self.wait_for_stack(stack_name).await?;
        }

        match existing {
            Some(stack) if stack.status == StackStatus::RollbackComplete => {
                warn!(
                    "Stack {} is in {} and cannot be updated, recreating it",
                    stack_name, stack.status
                );
                self.logger.add_warning(format!(
                    "{} was recreated from {}",
                    stack_name, stack.status
                ));
                self.delete_and_wait(stack_name).await?;
                self.create_and_wait(stack_name, &template_body).await
            }
            Some(_) => self.update_and_wait(stack_name, &template_body).await,
            None => self.create_and_wait(stack_name, &template_body).await,
        }
    }

    async fn create_and_wait(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<StackOutcome, CloudError> {
        let stack_id = self.client.create_stack(stack_name, template_body).await?;
        debug!("Creating {} ({})", stack_name, stack_id);

        let settled = self.wait_for_stack(stack_name).await?;
        expect_status(stack_name, settled, StackStatus::CreateComplete)?;
        Ok(StackOutcome::Created)
    }

    async fn update_and_wait(
        &self,
        stack_name: &str,
        template_body: &str,
    ) -> Result<StackOutcome, CloudError> {
        match self.client.update_stack(stack_name, template_body).await? {
            UpdateOutcome::NoChanges => {
                info!("Stack {} is up to date", stack_name);
                Ok(StackOutcome::Unchanged)
            }
            UpdateOutcome::Started => {
                let settled = self.wait_for_stack(stack_name).await?;
                expect_status(stack_name, settled, StackStatus::UpdateComplete)?;
                Ok(StackOutcome::Updated)
            }
        }
    }

    async fn destroy_stack(&self, stack_name: &str) -> Result<StackOutcome, CloudError> {
        if self.client.describe_stack(stack_name).await?.is_none() {
            info!("Stack {} does not exist, nothing to delete", stack_name);
            return Ok(StackOutcome::Absent);
        }
        self.delete_and_wait(stack_name).await?;
        Ok(StackOutcome::Deleted)
    }

    async fn delete_and_wait(&self, stack_name: &str) -> Result<(), CloudError> {
        self.client.delete_stack(stack_name).await?;
        match self.wait_for_stack(stack_name).await? {
            None => Ok(()),
            Some(stack) if stack.status == StackStatus::DeleteComplete => Ok(()),
            Some(stack) => Err(stack_failed(stack_name, &stack)),
        }
    }

    /// Poll until the stack leaves every `*_IN_PROGRESS` state. `None` means
    /// the stack no longer exists.
    pub async fn wait_for_stack(
        &self,
        stack_name: &str,
    ) -> Result<Option<StackDescription>, CloudError> {
        let deadline = Instant::now() + self.stack_timeout;

        loop {
            let Some(stack) = self.client.describe_stack(stack_name).await? else {
                return Ok(None);
            };
            if !stack.status.is_in_progress() {
                debug!("Stack {} settled in {}", stack_name, stack.status);
                return Ok(Some(stack));
            }
            if Instant::now() >= deadline {
                return Err(CloudError::Timeout(format!(
                    "{} still {} after {}s",
                    stack_name,
                    stack.status,
                    self.stack_timeout.as_secs()
                )));
            }

            debug!("Stack {} is {}", stack_name, stack.status);
            sleep(self.poll_interval).await;
        }
    }
}

fn expect_status(
    stack_name: &str,
    settled: Option<StackDescription>,
    expected: StackStatus,
) -> Result<(), CloudError> {
    match settled {
        Some(stack) if stack.status == expected => Ok(()),
        Some(stack) => Err(stack_failed(stack_name, &stack)),
        None => Err(CloudError::StackFailed {
            stack_name: stack_name.to_string(),
            status: StackStatus::DeleteComplete,
            reason: "stack disappeared while waiting".to_string(),
        }),
    }
}

fn stack_failed(stack_name: &str, stack: &StackDescription) -> CloudError {
    CloudError::StackFailed {
        stack_name: stack_name.to_string(),
        status: stack.status.clone(),
        reason: stack
            .status_reason
            .clone()
            .unwrap_or_else(|| "no reason reported".to_string()),
    }
}

fn log_action(outcome: StackOutcome) -> (StackAction, OperationStatus) {
    match outcome {
        StackOutcome::Created => (StackAction::Create, OperationStatus::Completed),
        StackOutcome::Updated => (StackAction::Update, OperationStatus::Completed),
        StackOutcome::Unchanged => (StackAction::Unchanged, OperationStatus::Completed),
        StackOutcome::Deleted => (StackAction::Delete, OperationStatus::Completed),
        StackOutcome::Absent => (StackAction::Delete, OperationStatus::Skipped),
    }
}

fn owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}
