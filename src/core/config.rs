use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{AppError, AppResult};

pub const DEFAULT_SOURCE_LANG: &str = "ru";
pub const DEFAULT_TARGET_LANG: &str = "en";
pub const DEFAULT_OCR_LANGUAGE: &str = "rus";
/// Direct PDF output smaller than this is treated as a failed extraction.
pub const DEFAULT_MIN_OUTPUT_BYTES: u64 = 20;
pub const DEFAULT_RASTER_DPI: u32 = 300;
pub const DEFAULT_TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Environment variable carrying the serialized config into worker processes.
pub const WORKER_CONFIG_ENV: &str = "ALLDOCS_WORKER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalTools {
    pub antiword: String,
    pub pdftoppm: String,
    pub tesseract: String,
}

impl Default for ExternalTools {
    fn default() -> Self {
        Self {
            antiword: "antiword".to_string(),
            pdftoppm: "pdftoppm".to_string(),
            tesseract: "tesseract".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub source_lang: String,
    pub target_lang: String,
    pub ocr_language: String,
    pub min_output_bytes: u64,
    pub raster_dpi: u32,
    pub translate: bool,
    pub translate_endpoint: String,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub tools: ExternalTools,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            source_lang: DEFAULT_SOURCE_LANG.to_string(),
            target_lang: DEFAULT_TARGET_LANG.to_string(),
            ocr_language: DEFAULT_OCR_LANGUAGE.to_string(),
            min_output_bytes: DEFAULT_MIN_OUTPUT_BYTES,
            raster_dpi: DEFAULT_RASTER_DPI,
            translate: true,
            translate_endpoint: DEFAULT_TRANSLATE_ENDPOINT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            tools: ExternalTools::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.source_lang.trim().is_empty() || self.target_lang.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "source and target languages cannot be empty".to_string(),
            ));
        }
        if self.ocr_language.trim().is_empty() {
            return Err(AppError::InvalidInput("ocr language cannot be empty".to_string()));
        }
        if self.raster_dpi == 0 {
            return Err(AppError::InvalidInput("raster dpi must be positive".to_string()));
        }
        Ok(())
    }

    pub fn to_worker_env(&self) -> AppResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_worker_env() -> AppResult<Self> {
        let raw = std::env::var(WORKER_CONFIG_ENV).map_err(|_| {
            AppError::InvalidInput(format!("{WORKER_CONFIG_ENV} is not set"))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }
}
