//! Batch dispatcher: per-format discovery, a bounded worker pool per batch,
//! and a single consumer that owns progress reporting.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use crate::{
    commands::launcher::{InProcessLauncher, ProcessLauncher, WorkerLauncher},
    core::{
        config::PipelineConfig,
        errors::{AppError, AppResult},
        types::{
            BatchSummary, Disposition, FailureReport, FileOutcome, RunSummary, SourceDocument,
            SourceFormat,
        },
    },
    pipeline::ExtractionExecutor,
};

/// One sequential phase of a run.
#[derive(Debug, Clone, Copy)]
pub struct BatchKind {
    pub label: &'static str,
    pub format: SourceFormat,
    pub extensions: &'static [&'static str],
    /// Image extensions also match in any letter case.
    pub any_case: bool,
}

pub const BATCHES: &[BatchKind] = &[
    BatchKind {
        label: "Extracting text from PDFs",
        format: SourceFormat::Pdf,
        extensions: &["pdf"],
        any_case: false,
    },
    BatchKind {
        label: "Extracting text from DOCX",
        format: SourceFormat::Docx,
        extensions: &["docx"],
        any_case: false,
    },
    BatchKind {
        label: "Extracting text from DOC",
        format: SourceFormat::Doc,
        extensions: &["doc"],
        any_case: false,
    },
    BatchKind {
        label: "Extracting text from RTF",
        format: SourceFormat::Rtf,
        extensions: &["rtf"],
        any_case: false,
    },
    BatchKind {
        label: "Extracting text from XLS",
        format: SourceFormat::Xls,
        extensions: &["xls", "xlsx"],
        any_case: false,
    },
    BatchKind {
        label: "Running OCR on JPEG images",
        format: SourceFormat::Image,
        extensions: &["jpg", "jpeg"],
        any_case: true,
    },
    BatchKind {
        label: "Running OCR on PNG images",
        format: SourceFormat::Image,
        extensions: &["png"],
        any_case: true,
    },
    BatchKind {
        label: "Running OCR on TIFF images",
        format: SourceFormat::Image,
        extensions: &["tif", "tiff"],
        any_case: true,
    },
];

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input_dir: PathBuf,
    pub config: PipelineConfig,
    pub jobs: usize,
    pub in_process: bool,
    pub report: Option<PathBuf>,
    /// Empty means every format.
    pub only: Vec<SourceFormat>,
    pub show_progress: bool,
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Regular files directly inside `input_dir` that belong to `kind`, sorted
/// and de-duplicated.
pub fn discover(input_dir: &Path, kind: &BatchKind) -> AppResult<Vec<SourceDocument>> {
    let dir = input_dir.to_str().ok_or_else(|| {
        AppError::InvalidInput(format!("input path is not UTF-8: {}", input_dir.display()))
    })?;
    let dir = Pattern::escape(dir);

    let mut found: BTreeSet<PathBuf> = BTreeSet::new();
    for ext in kind.extensions {
        let pattern = format!("{dir}/*.{ext}");
        collect_matches(&pattern, MatchOptions::new(), &mut found)?;
        if kind.any_case {
            let options = MatchOptions {
                case_sensitive: false,
                ..MatchOptions::new()
            };
            collect_matches(&pattern, options, &mut found)?;
        }
    }

    Ok(found
        .into_iter()
        .map(|path| SourceDocument::with_format(path, kind.format))
        .collect())
}

fn collect_matches(pattern: &str, options: MatchOptions, found: &mut BTreeSet<PathBuf>) -> AppResult<()> {
    let paths = glob::glob_with(pattern, options)
        .map_err(|e| AppError::InvalidInput(format!("bad glob pattern {pattern}: {e}")))?;
    for entry in paths {
        match entry {
            Ok(path) if path.is_file() => {
                found.insert(path);
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "skipping unreadable directory entry"),
        }
    }
    Ok(())
}

pub struct Dispatcher {
    launcher: Arc<dyn WorkerLauncher>,
    jobs: usize,
    show_progress: bool,
}

impl Dispatcher {
    pub fn new(launcher: Arc<dyn WorkerLauncher>, jobs: usize) -> Self {
        Self {
            launcher,
            jobs: jobs.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Runs the batches strictly one after another. Empty batches are still
    /// reported so the summary lists every phase.
    pub async fn run_batches(&self, input_dir: &Path, kinds: &[BatchKind]) -> AppResult<Vec<BatchSummary>> {
        let mut summaries = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let docs = discover(input_dir, kind)?;
            tracing::info!(batch = kind.label, files = docs.len(), "batch start");
            summaries.push(self.run_batch(kind, docs).await);
        }
        Ok(summaries)
    }

    /// Every submitted file yields exactly one outcome, collected by a single
    /// consumer over the result channel.
    pub async fn run_batch(&self, kind: &BatchKind, docs: Vec<SourceDocument>) -> BatchSummary {
        let mut summary = BatchSummary::new(kind.label, kind.format, docs.len());
        let bar = progress_bar(kind.label, docs.len(), self.show_progress);
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let (tx, mut rx) = mpsc::unbounded_channel::<FileOutcome>();

        for doc in docs {
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let launcher = Arc::clone(&self.launcher);
            tokio::spawn(async move {
                let file = doc.basename();
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        let task = tokio::spawn(async move { launcher.run(doc).await });
                        match task.await {
                            Ok(outcome) => outcome,
                            Err(err) => crashed(&file, &err.to_string()),
                        }
                    }
                    Err(err) => crashed(&file, &err.to_string()),
                };
                let _ = tx.send(outcome);
            });
        }
        drop(tx);

        while let Some(outcome) = rx.recv().await {
            match outcome {
                FileOutcome::Succeeded(report) => {
                    summary.succeeded += 1;
                    match report.disposition {
                        Disposition::OcrRecovered => summary.ocr_recovered += 1,
                        Disposition::OcrEmpty => summary.ocr_empty += 1,
                        Disposition::Accepted => {}
                    }
                }
                FileOutcome::Failed(failure) => {
                    bar.suspend(|| eprintln!("{}", failure.diagnostic_line()));
                    summary.failures.push(failure);
                }
            }
            bar.inc(1);
        }
        bar.finish();

        summary.failures.sort_by(|a, b| a.file.cmp(&b.file));
        summary
    }
}

fn crashed(file: &str, reason: &str) -> FileOutcome {
    let err = AppError::WorkerCrashed(format!("{file}: {reason}"));
    FileOutcome::Failed(FailureReport::from_error(file, &err))
}

fn progress_bar(label: &str, len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.set_message(label.to_string());
    bar
}

pub async fn run_convert(options: ConvertOptions) -> AppResult<RunSummary> {
    if !options.input_dir.is_dir() {
        return Err(AppError::NotFound(format!(
            "input directory {}",
            options.input_dir.display()
        )));
    }
    options.config.validate()?;
    std::fs::create_dir_all(&options.config.output_dir).map_err(|e| {
        AppError::Io(format!(
            "cannot create output directory {}: {e}",
            options.config.output_dir.display()
        ))
    })?;

    let launcher: Arc<dyn WorkerLauncher> = if options.in_process {
        Arc::new(InProcessLauncher::new(ExtractionExecutor::from_config(
            options.config.clone(),
        )?))
    } else {
        Arc::new(ProcessLauncher::new(&options.config)?)
    };

    let kinds: Vec<BatchKind> = BATCHES
        .iter()
        .filter(|kind| options.only.is_empty() || options.only.contains(&kind.format))
        .copied()
        .collect();

    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();
    tracing::info!(run_id = %run_id, input = %options.input_dir.display(), jobs = options.jobs, "run start");

    let dispatcher = Dispatcher::new(launcher, options.jobs).with_progress(options.show_progress);
    let batches = dispatcher.run_batches(&options.input_dir, &kinds).await?;

    let summary = RunSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        batches,
    };

    if let Some(path) = &options.report {
        write_report(path, &summary)?;
    }
    Ok(summary)
}

pub fn write_report(path: &Path, summary: &RunSummary) -> AppResult<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| AppError::Internal(format!("cannot serialize report: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| AppError::Io(format!("cannot write report {}: {e}", path.display())))
}
