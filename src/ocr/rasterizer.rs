use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::core::errors::{AppError, AppResult};
use crate::ocr::Rasterizer;

const PAGE_PREFIX: &str = "page";

/// `pdftoppm -r <dpi> -png`, one PNG per page.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: String,
}

impl PdftoppmRasterizer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &Path, out_dir: &Path, dpi: u32) -> AppResult<Vec<PathBuf>> {
        let output = Command::new(&self.program)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-png")
            .arg(pdf)
            .arg(out_dir.join(PAGE_PREFIX))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::Ocr(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Ocr(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let pages = collect_pages(out_dir)?;
        if pages.is_empty() {
            return Err(AppError::Ocr(format!(
                "{} rendered no pages",
                self.program
            )));
        }
        tracing::debug!(pdf = %pdf.display(), pages = pages.len(), dpi, "pdf rasterized");
        Ok(pages)
    }
}

/// Rendered pages sorted by page number, not by file name.
pub fn collect_pages(out_dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut numbered: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(out_dir)? {
        let path = entry?.path();
        if let Some(number) = page_number(&path) {
            numbered.push((number, path));
        }
    }
    numbered.sort_by_key(|(number, _)| *number);
    Ok(numbered.into_iter().map(|(_, path)| path).collect())
}

fn page_number(path: &Path) -> Option<u32> {
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if !is_png {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (prefix, number) = stem.rsplit_once('-')?;
    if prefix != PAGE_PREFIX {
        return None;
    }
    number.parse().ok()
}
