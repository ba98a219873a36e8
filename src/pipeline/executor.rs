use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;

use crate::{
    core::{
        config::PipelineConfig,
        errors::{AppError, AppResult},
        types::{
            Disposition, ExtractedText, ExtractionResult, FileReport, OutputArtifact, SheetTable,
            SourceDocument, SourceFormat, Stage,
        },
    },
    ocr::{self, OcrEngine, PdftoppmRasterizer, Rasterizer, TesseractCli},
    parsers::{
        legacy_doc::{self, AntiwordConverter, LegacyConverter},
        native_parser, rtf, PdfExtractPages, PdfPageSource,
    },
    pipeline::output,
    providers::{google::GoogleTranslateClient, PassthroughTranslator, Translator},
};

const OCR_SCRATCH_PREFIX: &str = ".alldocs-ocr-";

/// Runs one file through extraction, the OCR fallback policy, translation
/// and output writing. Cheap to clone; every collaborator sits behind an
/// `Arc`.
#[derive(Clone)]
pub struct ExtractionExecutor {
    config: PipelineConfig,
    translator: Arc<dyn Translator>,
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn Rasterizer>,
    converter: Arc<dyn LegacyConverter>,
    pdf_source: Arc<dyn PdfPageSource>,
}

impl ExtractionExecutor {
    pub fn from_config(config: PipelineConfig) -> AppResult<Self> {
        config.validate()?;
        let translator: Arc<dyn Translator> = if config.translate {
            Arc::new(GoogleTranslateClient::from_config(&config)?)
        } else {
            Arc::new(PassthroughTranslator)
        };
        Ok(Self {
            ocr: Arc::new(TesseractCli::new(config.tools.tesseract.clone())),
            rasterizer: Arc::new(PdftoppmRasterizer::new(config.tools.pdftoppm.clone())),
            converter: Arc::new(AntiwordConverter::new(config.tools.antiword.clone())),
            pdf_source: Arc::new(PdfExtractPages),
            translator,
            config,
        })
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = ocr;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn LegacyConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_pdf_source(mut self, pdf_source: Arc<dyn PdfPageSource>) -> Self {
        self.pdf_source = pdf_source;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn process(&self, doc: &SourceDocument) -> AppResult<FileReport> {
        let span = tracing::info_span!("file", file = %doc.basename(), format = %doc.format);
        async {
            let started = Instant::now();
            let result = self.process_inner(doc).await;
            match &result {
                Ok(report) => tracing::info!(
                    disposition = ?report.disposition,
                    units = report.units,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "file done"
                ),
                Err(err) => tracing::warn!(code = err.code(), error = %err, "file failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn process_inner(&self, doc: &SourceDocument) -> AppResult<FileReport> {
        let mut stages = Vec::new();
        enter(&mut stages, Stage::Selected);

        if !doc.path.is_file() {
            return Err(AppError::NotFound(doc.path.display().to_string()));
        }
        if doc.format == SourceFormat::Image {
            return self.process_image(doc, stages).await;
        }

        enter(&mut stages, Stage::Extracting);
        let extracted = self.extract(doc).await?;
        enter(&mut stages, Stage::ExtractionOk);
        tracing::debug!(units = extracted.unit_count(), empty = extracted.is_empty(), "extracted");

        match extracted {
            ExtractionResult::Text(text) => self.accept_or_escalate(doc, text, stages).await,
            ExtractionResult::Sheets(sheets) => self.write_sheets(doc, &sheets, stages).await,
        }
    }

    async fn extract(&self, doc: &SourceDocument) -> AppResult<ExtractionResult> {
        let path = doc.path.clone();
        let extracted = match doc.format {
            SourceFormat::Pdf => {
                let source = Arc::clone(&self.pdf_source);
                let pages = run_blocking(move || source.extract_pages(&path)).await?;
                ExtractionResult::Text(native_parser::pdf_units(pages))
            }
            SourceFormat::Docx => {
                ExtractionResult::Text(run_blocking(move || native_parser::parse_docx(&path)).await?)
            }
            SourceFormat::Rtf => ExtractionResult::Text(run_blocking(move || rtf::parse_rtf(&path)).await?),
            SourceFormat::Doc => {
                ExtractionResult::Text(legacy_doc::parse_doc(&doc.path, self.converter.as_ref()).await?)
            }
            SourceFormat::Xls => {
                ExtractionResult::Sheets(run_blocking(move || native_parser::parse_spreadsheet(&path)).await?)
            }
            SourceFormat::Image => {
                return Err(AppError::Internal("images have no text layer to extract".to_string()))
            }
        };
        Ok(extracted)
    }

    /// Writes the direct extraction. Page-oriented formats whose output is
    /// effectively empty go on to OCR; everything else is accepted as is.
    async fn accept_or_escalate(
        &self,
        doc: &SourceDocument,
        extracted: ExtractedText,
        mut stages: Vec<Stage>,
    ) -> AppResult<FileReport> {
        let artifact = self.translate_and_write(doc, &extracted).await?;
        if !doc.format.is_page_oriented() {
            enter(&mut stages, Stage::Accepted);
            return Ok(report(doc, Disposition::Accepted, extracted.units.len(), vec![artifact], stages));
        }

        enter(&mut stages, Stage::SizeChecked);
        tracing::debug!(bytes = artifact.bytes, threshold = self.config.min_output_bytes, "output size");
        if artifact.bytes >= self.config.min_output_bytes {
            enter(&mut stages, Stage::Accepted);
            return Ok(report(doc, Disposition::Accepted, extracted.units.len(), vec![artifact], stages));
        }

        enter(&mut stages, Stage::OcrFallback);
        let recovered = self.ocr_pdf(doc).await?;
        if recovered.units.is_empty() {
            // Whatever direct extraction found stays in place.
            tracing::info!(bytes = artifact.bytes, "OCR found no text, keeping direct output");
            enter(&mut stages, Stage::OcrEmpty);
            return Ok(report(doc, Disposition::OcrEmpty, extracted.units.len(), vec![artifact], stages));
        }

        let artifact = self.translate_and_write(doc, &recovered).await?;
        enter(&mut stages, Stage::OcrRecovered);
        Ok(report(doc, Disposition::OcrRecovered, recovered.units.len(), vec![artifact], stages))
    }

    async fn process_image(&self, doc: &SourceDocument, mut stages: Vec<Stage>) -> AppResult<FileReport> {
        enter(&mut stages, Stage::OcrFallback);
        let (width, height) = ocr::validate_image(&doc.path)?;
        tracing::debug!(width, height, "image header ok");

        let text = self.ocr.recognize(&doc.path, &self.config.ocr_language).await?;
        let recovered = native_parser::pdf_units(vec![text]);
        let artifact = self.translate_and_write(doc, &recovered).await?;

        let (stage, disposition) = if recovered.units.is_empty() {
            tracing::info!("OCR found no text in image");
            (Stage::OcrEmpty, Disposition::OcrEmpty)
        } else {
            (Stage::OcrRecovered, Disposition::OcrRecovered)
        };
        enter(&mut stages, stage);

        Ok(report(doc, disposition, recovered.units.len(), vec![artifact], stages))
    }

    async fn write_sheets(
        &self,
        doc: &SourceDocument,
        sheets: &[SheetTable],
        mut stages: Vec<Stage>,
    ) -> AppResult<FileReport> {
        let mut artifacts = Vec::with_capacity(sheets.len());
        let mut units = 0usize;
        for sheet in sheets {
            let mut rows = Vec::with_capacity(sheet.rows.len());
            for row in &sheet.rows {
                rows.push(self.translator.translate_batch(row).await?);
            }
            units += rows.len();

            let target = output::sheet_artifact_path(&self.config.output_dir, &doc.path, sheet.index);
            let artifact = output::write_sheet(&target, &rows)?;
            tracing::debug!(sheet = %sheet.name, rows = rows.len(), bytes = artifact.bytes, "sheet written");
            artifacts.push(artifact);
        }
        enter(&mut stages, Stage::Accepted);

        Ok(report(doc, Disposition::Accepted, units, artifacts, stages))
    }

    async fn translate_and_write(
        &self,
        doc: &SourceDocument,
        extracted: &ExtractedText,
    ) -> AppResult<OutputArtifact> {
        let translated = self.translator.translate_batch(&extracted.units).await?;
        let target = output::text_artifact_path(&self.config.output_dir, &doc.path);
        let artifact = output::write_text(&target, &translated)?;
        tracing::debug!(path = %artifact.path.display(), bytes = artifact.bytes, "output written");
        Ok(artifact)
    }

    /// Rasterize into a private scratch directory inside the output
    /// directory, recognize every page once, then remove the bitmaps whether
    /// or not recognition succeeded. Pages with no text are dropped.
    async fn ocr_pdf(&self, doc: &SourceDocument) -> AppResult<ExtractedText> {
        let scratch = tempfile::Builder::new()
            .prefix(OCR_SCRATCH_PREFIX)
            .tempdir_in(&self.config.output_dir)
            .map_err(|e| AppError::Io(format!("cannot create OCR scratch directory: {e}")))?;

        let recognized = self.recognize_pages(&doc.path, scratch.path()).await;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(err) = scratch.close() {
            tracing::warn!(path = %scratch_path.display(), error = %err, "could not remove OCR bitmaps");
        }

        Ok(native_parser::pdf_units(recognized?))
    }

    async fn recognize_pages(&self, pdf: &Path, scratch: &Path) -> AppResult<Vec<String>> {
        let images = self
            .rasterizer
            .rasterize(pdf, scratch, self.config.raster_dpi)
            .await?;
        tracing::debug!(pages = images.len(), "running OCR");

        let mut pages = Vec::with_capacity(images.len());
        for image in &images {
            pages.push(self.ocr.recognize(image, &self.config.ocr_language).await?);
        }
        Ok(pages)
    }
}

fn enter(stages: &mut Vec<Stage>, stage: Stage) {
    tracing::trace!(?stage, "stage");
    stages.push(stage);
}

fn report(
    doc: &SourceDocument,
    disposition: Disposition,
    units: usize,
    artifacts: Vec<OutputArtifact>,
    stages: Vec<Stage>,
) -> FileReport {
    FileReport {
        file: doc.basename(),
        format: doc.format,
        disposition,
        units,
        artifacts,
        stages,
    }
}

/// Format parsers are synchronous and may panic on malformed input; a panic
/// surfaces as a parse failure for this file only.
async fn run_blocking<T, F>(job: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(AppError::Parse("parser panicked on malformed input".to_string())),
        Err(err) => Err(AppError::Internal(format!("parser task failed: {err}"))),
    }
}
