//! How a single file gets processed: in a child process (the default) or on
//! a tokio task in this process.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{
    core::{
        config::{PipelineConfig, WORKER_CONFIG_ENV},
        errors::{AppError, AppResult},
        types::{FailureReport, FileOutcome, SourceDocument},
    },
    pipeline::ExtractionExecutor,
};

#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Always yields exactly one outcome for `doc`; failures are outcomes too.
    async fn run(&self, doc: SourceDocument) -> FileOutcome;
}

/// Re-executes the current binary as `alldocs worker --format <fmt> <file>`.
/// The worker prints its outcome as one JSON line on stdout.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    config_json: String,
}

impl ProcessLauncher {
    pub fn new(config: &PipelineConfig) -> AppResult<Self> {
        let program = std::env::current_exe()
            .map_err(|e| AppError::Internal(format!("cannot locate own executable: {e}")))?;
        Self::with_program(program, config)
    }

    pub fn with_program(program: impl Into<PathBuf>, config: &PipelineConfig) -> AppResult<Self> {
        Ok(Self {
            program: program.into(),
            config_json: config.to_worker_env()?,
        })
    }

    async fn spawn(&self, doc: &SourceDocument) -> AppResult<FileOutcome> {
        let file = doc.basename();
        let output = Command::new(&self.program)
            .arg("worker")
            .arg("--format")
            .arg(doc.format.as_str())
            .arg(&doc.path)
            .env(WORKER_CONFIG_ENV, &self.config_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::WorkerCrashed(format!("{file}: cannot start worker: {e}")))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
            tracing::debug!(file = %file, "worker: {line}");
        }

        if !output.status.success() {
            let last = stderr.lines().rev().find(|line| !line.trim().is_empty()).unwrap_or("");
            return Err(AppError::WorkerCrashed(format!(
                "{file}: worker exited with {} {}",
                output.status,
                last.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| AppError::WorkerCrashed(format!("{file}: worker reported no outcome")))?;
        serde_json::from_str(line)
            .map_err(|e| AppError::WorkerCrashed(format!("{file}: unreadable worker outcome: {e}")))
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn run(&self, doc: SourceDocument) -> FileOutcome {
        match self.spawn(&doc).await {
            Ok(outcome) => outcome,
            Err(err) => FileOutcome::Failed(FailureReport::from_error(doc.basename(), &err)),
        }
    }
}

/// Runs the pipeline directly. Panics are contained by the dispatcher's task
/// boundary rather than by a process boundary.
#[derive(Clone)]
pub struct InProcessLauncher {
    executor: ExtractionExecutor,
}

impl InProcessLauncher {
    pub fn new(executor: ExtractionExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl WorkerLauncher for InProcessLauncher {
    async fn run(&self, doc: SourceDocument) -> FileOutcome {
        let result = self.executor.process(&doc).await;
        FileOutcome::from_result(&doc, result)
    }
}
