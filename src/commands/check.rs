use std::path::PathBuf;

use tokio::process::Command;

use crate::core::{config::ExternalTools, errors::AppResult};

#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub name: &'static str,
    pub program: String,
    pub location: Option<PathBuf>,
}

pub fn locate_tools(tools: &ExternalTools) -> Vec<ToolStatus> {
    [
        ("antiword", &tools.antiword),
        ("pdftoppm", &tools.pdftoppm),
        ("tesseract", &tools.tesseract),
    ]
    .into_iter()
    .map(|(name, program)| ToolStatus {
        name,
        program: program.clone(),
        location: which::which(program).ok(),
    })
    .collect()
}

/// Print where each external tool resolves and whether tesseract has the
/// OCR language installed. Returns `false` when anything is missing.
pub async fn run_check(tools: &ExternalTools, ocr_language: &str) -> AppResult<bool> {
    let mut ready = true;
    for status in locate_tools(tools) {
        match &status.location {
            Some(path) => println!("{:<10} {}", status.name, path.display()),
            None => {
                ready = false;
                println!("{:<10} not found ({})", status.name, status.program);
            }
        }
    }

    if which::which(&tools.tesseract).is_ok() {
        let languages = tesseract_languages(&tools.tesseract).await;
        if languages.iter().any(|lang| lang == ocr_language) {
            println!("{:<10} language '{ocr_language}' installed", "ocr");
        } else {
            ready = false;
            println!("{:<10} language '{ocr_language}' missing", "ocr");
        }
    }

    Ok(ready)
}

async fn tesseract_languages(program: &str) -> Vec<String> {
    let output = match Command::new(program).arg("--list-langs").output().await {
        Ok(output) => output,
        Err(err) => {
            tracing::debug!(error = %err, "tesseract --list-langs failed");
            return Vec::new();
        }
    };
    // Older builds print the list on stderr.
    let mut listing = String::from_utf8_lossy(&output.stdout).to_string();
    listing.push_str(&String::from_utf8_lossy(&output.stderr));
    listing
        .lines()
        .skip_while(|line| !line.starts_with("List of available languages"))
        .skip(1)
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}
