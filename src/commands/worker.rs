use std::path::PathBuf;

use crate::{
    core::{
        config::PipelineConfig,
        errors::AppResult,
        types::{FailureReport, FileOutcome, SourceDocument, SourceFormat},
    },
    pipeline::ExtractionExecutor,
};

/// Body of the hidden `worker` subcommand: process one file and print its
/// outcome as a single JSON line. A failed file is still a clean exit.
pub async fn run_worker(format: SourceFormat, file: PathBuf) -> AppResult<()> {
    let doc = SourceDocument::with_format(file, format);
    let outcome = match PipelineConfig::from_worker_env().and_then(ExtractionExecutor::from_config) {
        Ok(executor) => {
            let result = executor.process(&doc).await;
            FileOutcome::from_result(&doc, result)
        }
        Err(err) => FileOutcome::Failed(FailureReport::from_error(doc.basename(), &err)),
    };

    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}
