#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alldocs_lib::core::config::PipelineConfig;
use alldocs_lib::core::errors::{AppError, AppResult};
use alldocs_lib::ocr::{OcrEngine, Rasterizer};
use alldocs_lib::parsers::legacy_doc::LegacyConverter;
use alldocs_lib::parsers::PdfPageSource;
use alldocs_lib::pipeline::ExtractionExecutor;
use alldocs_lib::providers::Translator;
use async_trait::async_trait;
use zip::write::FileOptions;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn zip_package(parts: &[(&str, String)]) -> Vec<u8> {
    let cursor = Cursor::new(Vec::<u8>::new());
    let mut zip = zip::ZipWriter::new(cursor);
    let options: FileOptions<'_, ()> = FileOptions::default();
    for (name, body) in parts {
        zip.start_file(*name, options).expect("start file");
        zip.write_all(body.as_bytes()).expect("write part");
    }
    zip.finish().expect("finish zip").into_inner()
}

/// A complete WordprocessingML package, one `w:p` per entry.
pub fn build_docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|text| {
            if text.is_empty() {
                "<w:p/>".to_string()
            } else {
                format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", escape_xml(text))
            }
        })
        .collect();

    zip_package(&[
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#
                .to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#
                .to_string(),
        ),
        (
            "word/_rels/document.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"></Relationships>"#
                .to_string(),
        ),
        (
            "word/document.xml",
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
            ),
        ),
    ])
}

/// Only `word/document.xml`; docx-rs rejects it, the XML reader does not.
pub fn build_bare_docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|text| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", escape_xml(text)))
        .collect();
    zip_package(&[(
        "word/document.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        ),
    )])
}

fn column_name(index: usize) -> String {
    let mut name = String::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        name.insert(0, (b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    name
}

/// SpreadsheetML workbook with inline-string cells; `""` leaves the cell out.
pub fn build_xlsx_bytes(sheets: &[(&str, Vec<Vec<&str>>)]) -> Vec<u8> {
    let mut parts: Vec<(String, String)> = Vec::new();

    let mut overrides = String::new();
    let mut sheet_entries = String::new();
    let mut rels = String::new();
    for (i, (name, rows)) in sheets.iter().enumerate() {
        let n = i + 1;
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        sheet_entries.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape_xml(name)
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));

        let mut data = String::new();
        for (r, row) in rows.iter().enumerate() {
            data.push_str(&format!(r#"<row r="{}">"#, r + 1));
            for (c, value) in row.iter().enumerate() {
                // Blank cells are absent from the sheet XML, as Excel writes them.
                if value.is_empty() {
                    continue;
                }
                data.push_str(&format!(
                    r#"<c r="{}{}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    column_name(c),
                    r + 1,
                    escape_xml(value)
                ));
            }
            data.push_str("</row>");
        }
        parts.push((
            format!("xl/worksheets/sheet{n}.xml"),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{data}</sheetData></worksheet>"#
            ),
        ));
    }

    parts.push((
        "[Content_Types].xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
  {overrides}
</Types>"#
        ),
    ));
    parts.push((
        "_rels/.rels".to_string(),
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#
            .to_string(),
    ));
    parts.push((
        "xl/workbook.xml".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheet_entries}</sheets></workbook>"#
        ),
    ));
    parts.push((
        "xl/_rels/workbook.xml.rels".to_string(),
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
        ),
    ));

    let borrowed: Vec<(&str, String)> = parts
        .iter()
        .map(|(name, body)| (name.as_str(), body.clone()))
        .collect();
    zip_package(&borrowed)
}

/// One page per entry; an empty entry gives a page with no text layer.
pub fn build_pdf_bytes(pages: &[&str]) -> Vec<u8> {
    use lopdf::dictionary;
    use lopdf::{Document, Object, Stream};

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET")
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save pdf");
    buf
}

pub fn write_png(path: &Path) {
    use image::{ImageBuffer, Rgb, RgbImage};

    let mut img: RgbImage = ImageBuffer::new(40, 30);
    for (x, y, pixel) in img.enumerate_pixels_mut() {
        *pixel = Rgb([(x * 6) as u8, (y * 8) as u8, 128]);
    }
    img.save(path).expect("save png");
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write fixture");
    path
}

// ── Mocks ─────────────────────────────────────────────────────────────────────

/// Prefixes every unit with `EN:`; fails on text containing `fail_on`.
#[derive(Default)]
pub struct MockTranslator {
    pub calls: AtomicUsize,
    pub fail_on: Option<String>,
}

impl MockTranslator {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: Some(marker.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, text: &str) -> AppResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = &self.fail_on {
            if text.contains(marker.as_str()) {
                return Err(AppError::ProviderRateLimited);
            }
        }
        Ok(format!("EN:{text}"))
    }
}

/// Returns `pages[i]` for the i-th call; records which images it saw and
/// whether they existed at the time.
pub struct MockOcr {
    pages: Vec<String>,
    pub seen: Mutex<Vec<(PathBuf, bool)>>,
}

impl MockOcr {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().expect("lock").len()
    }

    pub fn seen_paths(&self) -> Vec<PathBuf> {
        self.seen.lock().expect("lock").iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl OcrEngine for MockOcr {
    async fn recognize(&self, image: &Path, _language: &str) -> AppResult<String> {
        let mut seen = self.seen.lock().expect("lock");
        let index = seen.len();
        seen.push((image.to_path_buf(), image.exists()));
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }
}

/// Writes `pages` placeholder bitmaps named like pdftoppm does.
#[derive(Default)]
pub struct MockRasterizer {
    pub pages: usize,
    pub fail: bool,
    pub calls: AtomicUsize,
    pub produced: Mutex<Vec<PathBuf>>,
}

impl MockRasterizer {
    pub fn with_pages(pages: usize) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn produced(&self) -> Vec<PathBuf> {
        self.produced.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Rasterizer for MockRasterizer {
    async fn rasterize(&self, _pdf: &Path, out_dir: &Path, _dpi: u32) -> AppResult<Vec<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut produced = Vec::new();
        for page in 1..=self.pages {
            let path = out_dir.join(format!("page-{page}.png"));
            std::fs::write(&path, b"bitmap").expect("write bitmap");
            produced.push(path);
        }
        self.produced.lock().expect("lock").extend(produced.clone());
        if self.fail {
            return Err(AppError::Ocr("rasterizer exploded".to_string()));
        }
        Ok(produced)
    }
}

pub struct FixedPdfPages(pub Vec<String>);

impl FixedPdfPages {
    pub fn new(pages: &[&str]) -> Self {
        Self(pages.iter().map(|p| p.to_string()).collect())
    }
}

impl PdfPageSource for FixedPdfPages {
    fn extract_pages(&self, _path: &Path) -> AppResult<Vec<String>> {
        Ok(self.0.clone())
    }
}

pub struct PanickingPdfPages;

impl PdfPageSource for PanickingPdfPages {
    fn extract_pages(&self, _path: &Path) -> AppResult<Vec<String>> {
        panic!("malformed xref table");
    }
}

/// Writes `output` to the target the way the real converter does.
pub struct MockConverter {
    pub output: Vec<u8>,
    pub calls: AtomicUsize,
}

impl MockConverter {
    pub fn new(output: &[u8]) -> Self {
        Self {
            output: output.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LegacyConverter for MockConverter {
    async fn convert(&self, _source: &Path, target: &Path) -> AppResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .map_err(|_| AppError::ConversionCollision(target.to_path_buf()))?;
        file.write_all(&self.output)?;
        Ok(())
    }
}

// ── Executor wiring ───────────────────────────────────────────────────────────

pub struct Harness {
    pub translator: Arc<MockTranslator>,
    pub ocr: Arc<MockOcr>,
    pub rasterizer: Arc<MockRasterizer>,
    pub converter: Arc<MockConverter>,
}

impl Harness {
    pub fn new(ocr_pages: &[&str], raster_pages: usize) -> Self {
        Self {
            translator: Arc::new(MockTranslator::default()),
            ocr: Arc::new(MockOcr::new(ocr_pages)),
            rasterizer: Arc::new(MockRasterizer::with_pages(raster_pages)),
            converter: Arc::new(MockConverter::new("Привет мир".as_bytes())),
        }
    }

    pub fn executor(&self, output_dir: &Path) -> ExtractionExecutor {
        let config = PipelineConfig {
            translate: false,
            ..PipelineConfig::default()
        }
        .with_output_dir(output_dir);
        ExtractionExecutor::from_config(config)
            .expect("executor")
            .with_translator(self.translator.clone())
            .with_ocr(self.ocr.clone())
            .with_rasterizer(self.rasterizer.clone())
            .with_converter(self.converter.clone())
    }
}
