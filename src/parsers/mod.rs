pub mod legacy_doc;
pub mod native_parser;
pub mod rtf;

use std::path::Path;

use crate::core::errors::AppResult;

/// Per-page text layer of a PDF. Raw page text, one entry per page.
pub trait PdfPageSource: Send + Sync {
    fn extract_pages(&self, path: &Path) -> AppResult<Vec<String>>;
}

/// Text layer read with pdf-extract.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractPages;

impl PdfPageSource for PdfExtractPages {
    fn extract_pages(&self, path: &Path) -> AppResult<Vec<String>> {
        native_parser::pdf_page_texts(path)
    }
}
