mod common;

use std::process::Command;

use alldocs_lib::core::config::{PipelineConfig, WORKER_CONFIG_ENV};
use serde_json::Value;
use tempfile::TempDir;

fn alldocs() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_alldocs"));
    cmd.env("ALLDOCS_LOG", "off");
    cmd
}

#[test]
fn convert_isolates_a_broken_file_across_worker_processes() {
    let input = TempDir::new().expect("input");
    let output = TempDir::new().expect("output");
    let report = output.path().join("run.json");
    common::write_file(input.path(), "memo.rtf", br"{\rtf1\ansi Hello from RTF\par Second line}");
    common::write_file(
        input.path(),
        "letter.docx",
        &common::build_docx_bytes(&["First paragraph", "Second paragraph"]),
    );
    common::write_file(input.path(), "broken.pdf", b"%PDF-1.4 garbage");

    let result = alldocs()
        .arg("convert")
        .arg(input.path())
        .arg("--output-dir")
        .arg(output.path())
        .arg("--no-translate")
        .arg("--no-progress")
        .arg("--jobs")
        .arg("2")
        .arg("--report")
        .arg(&report)
        .output()
        .expect("run alldocs");

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(result.status.success(), "stderr: {stderr}");

    assert_eq!(
        std::fs::read_to_string(output.path().join("memo.rtf.txt")).unwrap(),
        "Hello from RTF\nSecond line\n"
    );
    assert_eq!(
        std::fs::read_to_string(output.path().join("letter.docx.txt")).unwrap(),
        "First paragraph\nSecond paragraph\n"
    );

    let diagnostics: Vec<&str> = stderr
        .lines()
        .filter(|line| line.starts_with("! - Error processing"))
        .collect();
    assert_eq!(diagnostics.len(), 1, "stderr: {stderr}");
    assert!(diagnostics[0].contains("'broken.pdf'"));

    let summary: Value = serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    let batches = summary["batches"].as_array().expect("batches");
    assert_eq!(batches.len(), 8);
    assert_eq!(batches[0]["label"], "Extracting text from PDFs");
    assert_eq!(batches[0]["failures"][0]["file"], "broken.pdf");
    assert_eq!(batches[1]["succeeded"], 1);
    assert_eq!(batches[3]["succeeded"], 1);
    assert!(summary["runId"].as_str().is_some_and(|id| !id.is_empty()));
}

#[test]
fn only_flag_restricts_batches() {
    let input = TempDir::new().expect("input");
    let output = TempDir::new().expect("output");
    let report = output.path().join("run.json");
    common::write_file(input.path(), "memo.rtf", br"{\rtf1 hi there}");
    common::write_file(input.path(), "broken.pdf", b"garbage");

    let result = alldocs()
        .args(["convert", "--no-translate", "--no-progress", "--in-process", "--only", "rtf"])
        .arg(input.path())
        .arg("-o")
        .arg(output.path())
        .arg("--report")
        .arg(&report)
        .output()
        .expect("run alldocs");
    assert!(result.status.success());

    let summary: Value = serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    let batches = summary["batches"].as_array().expect("batches");
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0]["format"], "rtf");
    assert!(output.path().join("memo.rtf.txt").exists());
    assert!(!String::from_utf8_lossy(&result.stderr).contains("broken.pdf"));
}

#[test]
fn missing_input_directory_fails() {
    let output = TempDir::new().expect("output");
    let result = alldocs()
        .args(["convert", "--no-translate", "--no-progress"])
        .arg(output.path().join("nope"))
        .arg("-o")
        .arg(output.path())
        .output()
        .expect("run alldocs");

    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("NOT_FOUND"));
}

#[test]
fn worker_prints_one_json_outcome() {
    let input = TempDir::new().expect("input");
    let output = TempDir::new().expect("output");
    let source = common::write_file(input.path(), "memo.rtf", br"{\rtf1 Worker text}");
    let config = PipelineConfig {
        translate: false,
        ..PipelineConfig::default()
    }
    .with_output_dir(output.path());

    let result = alldocs()
        .args(["worker", "--format", "rtf"])
        .arg(&source)
        .env(WORKER_CONFIG_ENV, config.to_worker_env().unwrap())
        .output()
        .expect("run worker");

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    let outcome: Value = serde_json::from_str(stdout.trim()).expect("json outcome");
    assert_eq!(outcome["status"], "succeeded");
    assert_eq!(outcome["file"], "memo.rtf");
    assert_eq!(outcome["disposition"], "accepted");
    assert_eq!(
        std::fs::read_to_string(output.path().join("memo.rtf.txt")).unwrap(),
        "Worker text\n"
    );
}

#[test]
fn check_lists_every_external_tool() {
    let result = alldocs().arg("check").output().expect("run check");
    let stdout = String::from_utf8_lossy(&result.stdout);
    for tool in ["antiword", "pdftoppm", "tesseract"] {
        assert!(stdout.contains(tool), "missing {tool} in: {stdout}");
    }
}
