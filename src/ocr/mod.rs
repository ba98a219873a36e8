//! Optical character recognition for image-only pages and scanned images.
//!
//! Both seams are async traits so the pipeline can run against mocks in
//! tests and against the command-line tools in production.

pub mod rasterizer;
pub mod tesseract;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::errors::{AppError, AppResult};

pub use rasterizer::PdftoppmRasterizer;
pub use tesseract::TesseractCli;

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text of one page image. An empty string means the page
    /// held no recognizable text, which is not an error.
    async fn recognize(&self, image: &Path, language: &str) -> AppResult<String>;
}

#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render every page of `pdf` into `out_dir`, returning the bitmaps in
    /// page order.
    async fn rasterize(&self, pdf: &Path, out_dir: &Path, dpi: u32) -> AppResult<Vec<PathBuf>>;
}

/// Decode the image header so unreadable files fail before any OCR work.
pub fn validate_image(path: &Path) -> AppResult<(u32, u32)> {
    image::image_dimensions(path)
        .map_err(|e| AppError::Parse(format!("unreadable image: {e}")))
}
