//! Direct text extraction for the formats that carry a text layer.
//!
//! Every function returns its units in document order: pages for PDF,
//! paragraphs for DOCX, rows per sheet for spreadsheets. The output stage
//! concatenates by position, so nothing here may reorder.

use std::path::Path;

use crate::core::errors::{AppError, AppResult};
use crate::core::types::{ExtractedText, SheetTable, UnitKind};

// ── PDF ───────────────────────────────────────────────────────────────────────

/// Raw per-page text, one entry per page, blank pages included.
pub fn pdf_page_texts(file_path: &Path) -> AppResult<Vec<String>> {
    let bytes = std::fs::read(file_path)
        .map_err(|e| AppError::Io(format!("cannot read PDF: {e}")))?;

    pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| AppError::Parse(format!("pdf-extract failed: {e}")))
}

/// Pages without text are image-only or blank; they contribute no unit.
pub fn pdf_units(pages: Vec<String>) -> ExtractedText {
    let units = pages
        .into_iter()
        .map(|page| page.trim().to_string())
        .filter(|page| !page.is_empty())
        .collect();
    ExtractedText::new(UnitKind::Page, units)
}

// ── DOCX ──────────────────────────────────────────────────────────────────────

pub fn parse_docx(file_path: &Path) -> AppResult<ExtractedText> {
    let bytes = std::fs::read(file_path)
        .map_err(|e| AppError::Io(format!("cannot read DOCX: {e}")))?;
    let paragraphs = match parse_docx_with_docx_rs(&bytes) {
        Ok(paragraphs) => paragraphs,
        Err(primary_err) => match parse_docx_with_xml_fallback(&bytes) {
            Ok(paragraphs) => {
                tracing::debug!(error = %primary_err, "docx-rs rejected package, used xml fallback");
                paragraphs
            }
            Err(fallback_err) => {
                return Err(AppError::Parse(format!(
                    "DOCX parse failed (docx-rs: {primary_err}; xml fallback: {fallback_err})"
                )));
            }
        },
    };

    Ok(ExtractedText::new(UnitKind::Paragraph, paragraphs))
}

fn parse_docx_with_docx_rs(bytes: &[u8]) -> AppResult<Vec<String>> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| AppError::Parse(format!("docx-rs failed: {e}")))?;

    let mut paragraphs: Vec<String> = Vec::new();
    for child in &docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(para) = child {
            let mut buf = String::new();
            for run_child in &para.children {
                if let docx_rs::ParagraphChild::Run(run) = run_child {
                    for r in &run.children {
                        if let docx_rs::RunChild::Text(t) = r {
                            buf.push_str(&t.text);
                        }
                    }
                }
            }
            paragraphs.push(buf.trim().to_string());
        }
    }

    Ok(paragraphs)
}

fn parse_docx_with_xml_fallback(bytes: &[u8]) -> AppResult<Vec<String>> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| AppError::Parse(format!("zip open failed: {e}")))?;
    let mut doc_xml = archive
        .by_name("word/document.xml")
        .map_err(|e| AppError::Parse(format!("word/document.xml missing: {e}")))?;
    let mut xml = String::new();
    doc_xml
        .read_to_string(&mut xml)
        .map_err(|e| AppError::Parse(format!("cannot read document.xml: {e}")))?;

    let xml_doc = roxmltree::Document::parse(&xml)
        .map_err(|e| AppError::Parse(format!("document.xml parse failed: {e}")))?;

    let mut paragraphs: Vec<String> = Vec::new();
    for para in xml_doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "p")
    {
        let mut buf = String::new();
        for node in para.descendants().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "t" => {
                    if let Some(text) = node.text() {
                        buf.push_str(text);
                    }
                }
                "tab" => buf.push('\t'),
                "br" | "cr" => buf.push('\n'),
                _ => {}
            }
        }
        paragraphs.push(buf.trim().to_string());
    }

    if paragraphs.is_empty() {
        return Err(AppError::Parse(
            "document.xml contains no paragraphs".to_string(),
        ));
    }

    Ok(paragraphs)
}

// ── Spreadsheet ───────────────────────────────────────────────────────────────

/// Every sheet in workbook order. Cells are rendered as scalars; empty cells
/// become empty strings so column positions survive.
pub fn parse_spreadsheet(file_path: &Path) -> AppResult<Vec<SheetTable>> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook = open_workbook_auto(file_path)
        .map_err(|e| AppError::Parse(format!("calamine failed: {e}")))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut sheets: Vec<SheetTable> = Vec::with_capacity(sheet_names.len());

    for (index, sheet_name) in sheet_names.iter().enumerate() {
        let rows: Vec<Vec<String>> = match workbook.worksheet_range(sheet_name) {
            Some(Ok(range)) => range
                .rows()
                .map(|row| row.iter().map(ToString::to_string).collect())
                .collect(),
            Some(Err(e)) => {
                return Err(AppError::Parse(format!(
                    "sheet '{sheet_name}' unreadable: {e}"
                )));
            }
            None => Vec::new(),
        };
        sheets.push(SheetTable {
            index,
            name: sheet_name.clone(),
            rows,
        });
    }

    if sheets.is_empty() {
        return Err(AppError::Parse("workbook contains no sheets".to_string()));
    }

    Ok(sheets)
}
