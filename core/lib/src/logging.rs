use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directory the CLI writes deployment logs to.
pub const DEFAULT_LOG_DIR: &str = ".iac-logs";

/// Install the global tracing subscriber. `RUST_LOG` selects the level,
/// defaulting to `info`.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // A second initialization (tests, embedding) keeps the first subscriber.
    let _ = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };
}

/// One JSON line of the operation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentLogEntry {
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub operation: String,
    pub stack_name: String,
    pub status: OperationStatus,
    pub duration_ms: Option<u64>,
    pub details: BTreeMap<String, String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::Started => write!(f, "STARTED"),
            OperationStatus::Completed => write!(f, "COMPLETED"),
            OperationStatus::Failed => write!(f, "FAILED"),
            OperationStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// What happened to a stack during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackAction {
    Create,
    Update,
    Unchanged,
    Delete,
}

impl std::fmt::Display for StackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackAction::Create => write!(f, "CREATE"),
            StackAction::Update => write!(f, "UPDATE"),
            StackAction::Unchanged => write!(f, "UNCHANGED"),
            StackAction::Delete => write!(f, "DELETE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::InProgress => write!(f, "IN_PROGRESS"),
            RunStatus::Completed => write!(f, "COMPLETED"),
            RunStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackReport {
    pub stack_name: String,
    pub action: StackAction,
    pub status: OperationStatus,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

/// Summary of one deploy or destroy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub command: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub stacks: Vec<StackReport>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn count(&self, action: StackAction) -> usize {
        self.stacks
            .iter()
            .filter(|s| s.action == action && s.status == OperationStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.stacks
            .iter()
            .filter(|s| s.status == OperationStatus::Failed)
            .count()
    }
}

/// Writes the JSON-lines operation log of deploy and destroy runs and keeps
/// the report of the current run.
#[derive(Debug)]
pub struct DeploymentLogger {
    log_file_path: Option<PathBuf>,
    current: Option<RunReport>,
}

impl DeploymentLogger {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> std::io::Result<Self> {
        let log_dir = log_dir.as_ref();
        std::fs::create_dir_all(log_dir)?;

        Ok(Self {
            log_file_path: Some(log_dir.join("deployment.log")),
            current: None,
        })
    }

    /// A logger that keeps the report in memory only.
    pub fn in_memory() -> Self {
        Self {
            log_file_path: None,
            current: None,
        }
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.log_file_path.as_deref()
    }

    pub fn start_run(&mut self, command: &str) -> std::io::Result<String> {
        let start_time = Utc::now();
        let run_id = format!("{}-{}", command, start_time.format("%Y%m%dT%H%M%S%.3fZ"));
        self.current = Some(RunReport {
            run_id: run_id.clone(),
            command: command.to_string(),
            start_time,
            end_time: None,
            status: RunStatus::InProgress,
            stacks: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        });

        info!("Starting {} run {}", command, run_id);
        self.log_operation(command, "-", OperationStatus::Started, None, BTreeMap::new(), None)?;
        Ok(run_id)
    }

    pub fn end_run(&mut self, status: RunStatus) -> std::io::Result<()> {
        let Some(report) = self.current.as_mut() else {
            return Ok(());
        };
        report.end_time = Some(Utc::now());
        report.status = status;

        let command = report.command.clone();
        let mut details = BTreeMap::new();
        details.insert("stacks".to_string(), report.stacks.len().to_string());
        details.insert("failed".to_string(), report.failed().to_string());
        for action in [
            StackAction::Create,
            StackAction::Update,
            StackAction::Unchanged,
            StackAction::Delete,
        ] {
            details.insert(
                action.to_string().to_lowercase(),
                report.count(action).to_string(),
            );
        }

        let operation_status = match status {
            RunStatus::Completed => OperationStatus::Completed,
            RunStatus::Failed => OperationStatus::Failed,
            RunStatus::InProgress => OperationStatus::Started,
        };
        self.log_operation(&command, "-", operation_status, None, details, None)
    }

    pub fn log_operation(
        &self,
        operation: &str,
        stack_name: &str,
        status: OperationStatus,
        duration_ms: Option<u64>,
        details: BTreeMap<String, String>,
        error: Option<String>,
    ) -> std::io::Result<()> {
        let entry = DeploymentLogEntry {
            timestamp: Utc::now(),
            run_id: self
                .current
                .as_ref()
                .map(|r| r.run_id.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            operation: operation.to_string(),
            stack_name: stack_name.to_string(),
            status,
            duration_ms,
            details,
            error,
        };

        match &entry.error {
            Some(err) => error!("{} {} {}: {}", entry.status, entry.operation, entry.stack_name, err),
            None => info!("{} {} {}", entry.status, entry.operation, entry.stack_name),
        }

        self.write_log_entry(&entry)
    }

    /// Record the outcome of one stack in the current report and the log.
    pub fn record_stack(
        &mut self,
        stack_name: &str,
        action: StackAction,
        status: OperationStatus,
        duration_ms: Option<u64>,
        error: Option<String>,
    ) -> std::io::Result<()> {
        if let Some(report) = self.current.as_mut() {
            report.stacks.push(StackReport {
                stack_name: stack_name.to_string(),
                action,
                status,
                duration_ms,
                error: error.clone(),
            });
            if let Some(err) = &error {
                report.errors.push(format!("{}: {}", stack_name, err));
            }
        }

        let mut details = BTreeMap::new();
        details.insert("action".to_string(), action.to_string());
        self.log_operation("stack", stack_name, status, duration_ms, details, error)
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        if let Some(report) = self.current.as_mut() {
            report.warnings.push(warning.into());
        }
    }

    pub fn report(&self) -> Option<&RunReport> {
        self.current.as_ref()
    }

    pub fn run_id(&self) -> Option<&str> {
        self.current.as_ref().map(|r| r.run_id.as_str())
    }

    fn write_log_entry(&self, entry: &DeploymentLogEntry) -> std::io::Result<()> {
        let Some(path) = &self.log_file_path else {
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let json_line = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        writeln!(file, "{}", json_line)?;
        file.flush()
    }

    pub fn print_summary(&self) {
        let Some(report) = &self.current else {
            return;
        };

        println!("\n📊 {} summary", report.command);
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Run ID: {}", report.run_id);
        println!("Status: {}", report.status);
        if let Some(end_time) = report.end_time {
            let duration = end_time.signed_duration_since(report.start_time);
            println!("Duration: {:.2}s", duration.num_milliseconds() as f64 / 1000.0);
        }

        println!(
            "Created: {}  Updated: {}  Unchanged: {}  Deleted: {}  Failed: {}",
            report.count(StackAction::Create),
            report.count(StackAction::Update),
            report.count(StackAction::Unchanged),
            report.count(StackAction::Delete),
            report.failed()
        );

        for stack in &report.stacks {
            let icon = match stack.status {
                OperationStatus::Completed => "✅",
                OperationStatus::Failed => "❌",
                OperationStatus::Started => "🔄",
                OperationStatus::Skipped => "⏭️",
            };
            match stack.duration_ms {
                Some(ms) => println!("  {} {} ({}, {}ms)", icon, stack.stack_name, stack.action, ms),
                None => println!("  {} {} ({})", icon, stack.stack_name, stack.action),
            }
            if let Some(err) = &stack.error {
                println!("    Error: {}", err);
            }
        }

        if !report.warnings.is_empty() {
            println!("\n⚠️  Warnings:");
            for warning in &report.warnings {
                println!("  - {}", warning);
            }
        }
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_is_written_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut logger = DeploymentLogger::new(dir.path()).unwrap();

        let run_id = logger.start_run("deploy").unwrap();
        assert!(run_id.starts_with("deploy-"));
        logger
            .record_stack("DynamoDBStack", StackAction::Create, OperationStatus::Completed, Some(12), None)
            .unwrap();
        logger
            .record_stack(
                "LambdaStack",
                StackAction::Update,
                OperationStatus::Failed,
                Some(40),
                Some("UPDATE_ROLLBACK_COMPLETE".to_string()),
            )
            .unwrap();
        logger.end_run(RunStatus::Failed).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("deployment.log")).unwrap();
        let entries: Vec<DeploymentLogEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.run_id == run_id));
        assert_eq!(entries[2].stack_name, "LambdaStack");
        assert_eq!(entries[2].error.as_deref(), Some("UPDATE_ROLLBACK_COMPLETE"));
        assert_eq!(entries[3].status, OperationStatus::Failed);
        assert_eq!(entries[3].details["create"], "1");
        assert_eq!(entries[3].details["failed"], "1");
    }

    #[test]
    fn test_report_counts() {
        let mut logger = DeploymentLogger::in_memory();
        logger.start_run("destroy").unwrap();
        logger
            .record_stack("CicdStack", StackAction::Delete, OperationStatus::Completed, None, None)
            .unwrap();
        logger
            .record_stack("LambdaStack", StackAction::Delete, OperationStatus::Completed, None, None)
            .unwrap();
        logger.add_warning("LambdaS3Stack was already gone");
        logger.end_run(RunStatus::Completed).unwrap();

        let report = logger.report().unwrap();
        assert_eq!(report.count(StackAction::Delete), 2);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.status, RunStatus::Completed);
        assert!(report.end_time.is_some());
        assert_eq!(report.warnings.len(), 1);
        assert!(logger.log_file().is_none());
    }
}
