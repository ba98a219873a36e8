use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
    Doc,
    Rtf,
    Xls,
    Image,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Rtf => "rtf",
            Self::Xls => "xls",
            Self::Image => "image",
        }
    }

    /// Detects the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::Doc),
            "rtf" => Some(Self::Rtf),
            "xls" | "xlsx" => Some(Self::Xls),
            "jpg" | "jpeg" | "png" | "tif" | "tiff" => Some(Self::Image),
            _ => None,
        }
    }

    /// Only page-oriented formats escalate to OCR when the output is near-empty.
    pub fn is_page_oriented(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceFormat {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "doc" => Ok(Self::Doc),
            "rtf" => Ok(Self::Rtf),
            "xls" | "xlsx" => Ok(Self::Xls),
            "image" | "img" => Ok(Self::Image),
            other => Err(AppError::InvalidInput(format!("unknown format '{other}'"))),
        }
    }
}

/// One input file. Read-only for the whole pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub format: SourceFormat,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>) -> AppResult<Self> {
        let path = path.into();
        let format = SourceFormat::from_path(&path).ok_or_else(|| {
            AppError::InvalidInput(format!("unsupported file type: {}", path.display()))
        })?;
        Ok(Self { path, format })
    }

    pub fn with_format(path: impl Into<PathBuf>, format: SourceFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    pub fn basename(&self) -> String {
        basename(&self.path)
    }
}

pub fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Page,
    Paragraph,
    Blob,
}

/// Ordered text units; position in `units` is position in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub kind: UnitKind,
    pub units: Vec<String>,
}

impl ExtractedText {
    pub fn new(kind: UnitKind, units: Vec<String>) -> Self {
        Self { kind, units }
    }
}

/// One spreadsheet sheet. Row 0 is the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTable {
    pub index: usize,
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// What a format parser produced for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    Text(ExtractedText),
    Sheets(Vec<SheetTable>),
}

impl ExtractionResult {
    pub fn unit_count(&self) -> usize {
        match self {
            Self::Text(text) => text.units.len(),
            Self::Sheets(sheets) => sheets.iter().map(|sheet| sheet.rows.len()).sum(),
        }
    }

    /// No unit carries any text.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.units.iter().all(|unit| unit.trim().is_empty()),
            Self::Sheets(sheets) => sheets
                .iter()
                .flat_map(|sheet| sheet.rows.iter().flatten())
                .all(|cell| cell.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Selected,
    Extracting,
    ExtractionOk,
    SizeChecked,
    Accepted,
    OcrFallback,
    OcrRecovered,
    OcrEmpty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Accepted,
    OcrRecovered,
    /// OCR ran and found no text; the artifact holds whatever direct
    /// extraction produced, possibly nothing.
    OcrEmpty,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file: String,
    pub format: SourceFormat,
    pub disposition: Disposition,
    pub units: usize,
    pub artifacts: Vec<OutputArtifact>,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub file: String,
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl FailureReport {
    pub fn from_error(file: impl Into<String>, err: &AppError) -> Self {
        Self {
            file: file.into(),
            code: err.code().to_string(),
            message: err.to_string(),
            retryable: err.retryable(),
        }
    }

    pub fn diagnostic_line(&self) -> String {
        format!(
            "! - Error processing '{}' [{}]: {}, skipping...",
            self.file, self.code, self.message
        )
    }
}

/// The single result reported for one file, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Succeeded(FileReport),
    Failed(FailureReport),
}

impl FileOutcome {
    pub fn from_result(doc: &SourceDocument, result: AppResult<FileReport>) -> Self {
        match result {
            Ok(report) => Self::Succeeded(report),
            Err(err) => Self::Failed(FailureReport::from_error(doc.basename(), &err)),
        }
    }

    pub fn file(&self) -> &str {
        match self {
            Self::Succeeded(report) => &report.file,
            Self::Failed(failure) => &failure.file,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub label: String,
    pub format: SourceFormat,
    pub submitted: usize,
    pub succeeded: usize,
    pub ocr_recovered: usize,
    pub ocr_empty: usize,
    pub failures: Vec<FailureReport>,
}

impl BatchSummary {
    pub fn new(label: impl Into<String>, format: SourceFormat, submitted: usize) -> Self {
        Self {
            label: label.into(),
            format,
            submitted,
            succeeded: 0,
            ocr_recovered: 0,
            ocr_empty: 0,
            failures: Vec::new(),
        }
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failures.len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub batches: Vec<BatchSummary>,
}

impl RunSummary {
    pub fn total_files(&self) -> usize {
        self.batches.iter().map(|batch| batch.submitted).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.batches.iter().map(|batch| batch.failures.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pdf_is_page_oriented() {
        assert!(SourceFormat::Pdf.is_page_oriented());
        for format in [SourceFormat::Docx, SourceFormat::Doc, SourceFormat::Rtf, SourceFormat::Xls, SourceFormat::Image] {
            assert!(!format.is_page_oriented(), "{format}");
        }
    }

    #[test]
    fn extraction_result_counts_units_and_detects_blank_content() {
        let text = ExtractionResult::Text(ExtractedText::new(UnitKind::Paragraph, vec!["".into(), "  ".into()]));
        assert_eq!(text.unit_count(), 2);
        assert!(text.is_empty());

        let sheets = ExtractionResult::Sheets(vec![SheetTable {
            index: 0,
            name: "Sheet1".into(),
            rows: vec![vec!["Имя".into(), "".into()], vec!["".into(), "".into()]],
        }]);
        assert_eq!(sheets.unit_count(), 2);
        assert!(!sheets.is_empty());
    }
}
