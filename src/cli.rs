use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::config::{
    ExternalTools, PipelineConfig, DEFAULT_MIN_OUTPUT_BYTES, DEFAULT_OCR_LANGUAGE,
    DEFAULT_RASTER_DPI, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG,
    DEFAULT_TRANSLATE_ENDPOINT,
};
use crate::core::types::SourceFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert every supported document in a directory to text
    Convert(ConvertArgs),
    /// Report which external tools are available
    Check(CheckArgs),
    /// Process a single file and print its outcome as JSON
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ToolArgs {
    /// Legacy .doc converter
    #[arg(long, env = "ALLDOCS_ANTIWORD", default_value = "antiword")]
    pub antiword: String,

    /// PDF page rasterizer
    #[arg(long, env = "ALLDOCS_PDFTOPPM", default_value = "pdftoppm")]
    pub pdftoppm: String,

    /// OCR engine
    #[arg(long, env = "ALLDOCS_TESSERACT", default_value = "tesseract")]
    pub tesseract: String,
}

impl From<ToolArgs> for ExternalTools {
    fn from(args: ToolArgs) -> Self {
        Self {
            antiword: args.antiword,
            pdftoppm: args.pdftoppm,
            tesseract: args.tesseract,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Directory holding the documents
    pub input_dir: PathBuf,

    /// Where output files are written
    #[arg(short, long, env = "ALLDOCS_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Files processed concurrently [default: available cores]
    #[arg(short, long, env = "ALLDOCS_JOBS")]
    pub jobs: Option<usize>,

    /// Write extracted text as-is
    #[arg(long, env = "ALLDOCS_NO_TRANSLATE")]
    pub no_translate: bool,

    #[arg(long, env = "ALLDOCS_SOURCE_LANG", default_value = DEFAULT_SOURCE_LANG)]
    pub source_lang: String,

    #[arg(long, env = "ALLDOCS_TARGET_LANG", default_value = DEFAULT_TARGET_LANG)]
    pub target_lang: String,

    /// Tesseract language model
    #[arg(long, env = "ALLDOCS_OCR_LANG", default_value = DEFAULT_OCR_LANGUAGE)]
    pub ocr_lang: String,

    /// PDF output smaller than this many bytes triggers OCR
    #[arg(long, env = "ALLDOCS_MIN_OUTPUT_BYTES", default_value_t = DEFAULT_MIN_OUTPUT_BYTES)]
    pub min_output_bytes: u64,

    /// Rasterization resolution for OCR
    #[arg(long, env = "ALLDOCS_DPI", default_value_t = DEFAULT_RASTER_DPI)]
    pub dpi: u32,

    #[arg(long, env = "ALLDOCS_TRANSLATE_ENDPOINT", default_value = DEFAULT_TRANSLATE_ENDPOINT)]
    pub translate_endpoint: String,

    /// Per-request translation timeout in seconds
    #[arg(long, env = "ALLDOCS_TIMEOUT_SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Run files on tasks in this process instead of worker processes
    #[arg(long)]
    pub in_process: bool,

    /// Write a JSON run summary to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Restrict the run to these formats (pdf, docx, doc, rtf, xls, image)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<SourceFormat>,

    /// Hide progress bars
    #[arg(long, env = "ALLDOCS_NO_PROGRESS")]
    pub no_progress: bool,

    #[command(flatten)]
    pub tools: ToolArgs,
}

impl ConvertArgs {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            output_dir: self.output_dir.clone(),
            source_lang: self.source_lang.clone(),
            target_lang: self.target_lang.clone(),
            ocr_language: self.ocr_lang.clone(),
            min_output_bytes: self.min_output_bytes,
            raster_dpi: self.dpi,
            translate: !self.no_translate,
            translate_endpoint: self.translate_endpoint.clone(),
            request_timeout_secs: self.timeout_secs,
            tools: self.tools.clone().into(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(long, env = "ALLDOCS_OCR_LANG", default_value = DEFAULT_OCR_LANGUAGE)]
    pub ocr_lang: String,

    #[command(flatten)]
    pub tools: ToolArgs,
}

#[derive(Args, Debug, Clone)]
pub struct WorkerArgs {
    #[arg(long)]
    pub format: SourceFormat,

    pub file: PathBuf,
}
