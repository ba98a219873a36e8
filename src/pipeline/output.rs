//! The single writing stage. Extractors and the OCR engine hand over
//! in-memory units; only this module touches output files.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::errors::{AppError, AppResult};
use crate::core::types::{basename, OutputArtifact};

/// `<output_dir>/<file-name>.txt`, e.g. `report.pdf.txt`.
pub fn text_artifact_path(output_dir: &Path, source: &Path) -> PathBuf {
    output_dir.join(format!("{}.txt", basename(source)))
}

/// `<output_dir>/<file-name>_<index>.csv`, e.g. `book.xls_0.csv`.
pub fn sheet_artifact_path(output_dir: &Path, source: &Path, index: usize) -> PathBuf {
    output_dir.join(format!("{}_{index}.csv", basename(source)))
}

/// One unit per line, in order. Truncates anything already at `path`.
pub fn write_text(path: &Path, units: &[String]) -> AppResult<OutputArtifact> {
    let file = File::create(path)
        .map_err(|e| AppError::Io(format!("cannot create {}: {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    for unit in units {
        writer.write_all(unit.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    drop(writer);

    artifact(path)
}

/// First row is the header; rows may be ragged.
pub fn write_sheet(path: &Path, rows: &[Vec<String>]) -> AppResult<OutputArtifact> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    drop(writer);

    artifact(path)
}

fn artifact(path: &Path) -> AppResult<OutputArtifact> {
    let bytes = std::fs::metadata(path)
        .map_err(|e| AppError::Io(format!("cannot stat {}: {e}", path.display())))?
        .len();
    Ok(OutputArtifact {
        path: path.to_path_buf(),
        bytes,
    })
}
