//! Word 97-2003 (`.doc`) extraction through an external converter.
//!
//! The converter writes a text file next to the source (`<stem>.txt`), which
//! is read back and removed. A file already sitting at that path belongs to
//! somebody else: it is never read, never overwritten, and the document is
//! reported as a collision instead.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use encoding_rs::WINDOWS_1251;
use tokio::process::Command;

use crate::core::errors::{AppError, AppResult};
use crate::core::types::{ExtractedText, UnitKind};
use crate::parsers::{native_parser, rtf};

/// OLE2 compound file signature shared by DOC, XLS and PPT.
const CFB_MAGIC_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

#[async_trait]
pub trait LegacyConverter: Send + Sync {
    /// Convert `source` into a text file at `target`. `target` must not exist
    /// when this is called.
    async fn convert(&self, source: &Path, target: &Path) -> AppResult<()>;
}

/// `antiword -m UTF-8.txt`, stdout redirected into the target file.
#[derive(Debug, Clone)]
pub struct AntiwordConverter {
    program: String,
}

impl AntiwordConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl LegacyConverter for AntiwordConverter {
    async fn convert(&self, source: &Path, target: &Path) -> AppResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(target)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    AppError::ConversionCollision(target.to_path_buf())
                } else {
                    AppError::Io(format!("cannot create {}: {e}", target.display()))
                }
            })?;

        let output = Command::new(&self.program)
            .arg("-m")
            .arg("UTF-8.txt")
            .arg("-w")
            .arg("0")
            .arg(source)
            .stdout(Stdio::from(file))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AppError::Parse(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Parse(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyKind {
    /// Genuine OLE2 Word binary.
    Compound,
    /// RTF saved with a `.doc` extension.
    Rtf,
    /// OOXML package saved with a `.doc` extension.
    Docx,
}

/// Where the converter writes its output for `source`.
pub fn converted_path(source: &Path) -> PathBuf {
    source.with_extension("txt")
}

pub fn sniff(source: &Path) -> AppResult<LegacyKind> {
    let mut header = [0u8; 8];
    let mut file = std::fs::File::open(source)
        .map_err(|e| AppError::Io(format!("cannot read DOC: {e}")))?;
    let read = file
        .read(&mut header)
        .map_err(|e| AppError::Io(format!("cannot read DOC: {e}")))?;
    let header = &header[..read];

    if header == &CFB_MAGIC_SIGNATURE[..] {
        Ok(LegacyKind::Compound)
    } else if header.starts_with(b"{\\rtf") {
        Ok(LegacyKind::Rtf)
    } else if header.starts_with(&ZIP_MAGIC_SIGNATURE) {
        Ok(LegacyKind::Docx)
    } else {
        Err(AppError::Parse(format!(
            "not a Word 97-2003 document (header {header:02X?})"
        )))
    }
}

pub async fn parse_doc(source: &Path, converter: &dyn LegacyConverter) -> AppResult<ExtractedText> {
    match sniff(source)? {
        LegacyKind::Rtf => {
            tracing::debug!(file = %source.display(), "doc is RTF inside, stripping markup");
            rtf::parse_rtf(source)
        }
        LegacyKind::Docx => {
            tracing::debug!(file = %source.display(), "doc is an OOXML package, reading paragraphs");
            native_parser::parse_docx(source)
        }
        LegacyKind::Compound => convert_and_read(source, converter).await,
    }
}

async fn convert_and_read(
    source: &Path,
    converter: &dyn LegacyConverter,
) -> AppResult<ExtractedText> {
    let target = converted_path(source);
    if target.exists() {
        return Err(AppError::ConversionCollision(target));
    }

    let result = match converter.convert(source, &target).await {
        Ok(()) => read_converted(&target),
        Err(err) => Err(err),
    };

    // A collision reported by the converter means the file is not ours.
    if !matches!(result, Err(AppError::ConversionCollision(_))) && target.exists() {
        if let Err(err) = std::fs::remove_file(&target) {
            tracing::warn!(path = %target.display(), error = %err, "could not remove converted file");
        }
    }

    let text = result?;
    let units = if text.is_empty() { Vec::new() } else { vec![text] };
    Ok(ExtractedText::new(UnitKind::Blob, units))
}

fn read_converted(target: &Path) -> AppResult<String> {
    let bytes = std::fs::read(target)
        .map_err(|e| AppError::Io(format!("cannot read converted text: {e}")))?;
    Ok(decode_converted(bytes))
}

/// Converter output is UTF-8 when the tool honors the mapping file; older
/// builds emit the document code page, which for this corpus is Windows-1251.
pub fn decode_converted(bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let (decoded, _) = WINDOWS_1251.decode_without_bom_handling(err.as_bytes());
            decoded.into_owned()
        }
    };
    text.trim().to_string()
}
