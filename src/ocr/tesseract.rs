use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::errors::{AppError, AppResult};
use crate::ocr::OcrEngine;

/// The `tesseract` binary, text written to stdout.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: String,
}

impl TesseractCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, image: &Path, language: &str) -> AppResult<String> {
        let output = Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::Ocr(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Ocr(format!(
                "{} exited with {} on {}: {}",
                self.program,
                output.status,
                image.display(),
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        tracing::debug!(image = %image.display(), chars = text.len(), "page recognized");
        Ok(text.trim().to_string())
    }
}
