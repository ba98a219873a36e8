mod common;

use alldocs_lib::core::types::UnitKind;
use alldocs_lib::parsers::native_parser;
use tempfile::TempDir;

#[test]
fn parse_docx_keeps_paragraph_order_and_empty_paragraphs() {
    let dir = TempDir::new().expect("temp dir");
    let path = common::write_file(
        dir.path(),
        "letter.docx",
        &common::build_docx_bytes(&["Уважаемый коллега,", "", "Спасибо за отчёт."]),
    );

    let extracted = native_parser::parse_docx(&path).expect("docx should parse");

    assert_eq!(extracted.kind, UnitKind::Paragraph);
    assert_eq!(
        extracted.units,
        vec!["Уважаемый коллега,", "", "Спасибо за отчёт."]
    );
}

#[test]
fn parse_docx_uses_xml_fallback_when_docx_rs_fails() {
    let dir = TempDir::new().expect("temp dir");
    // Only word/document.xml: no relationships or content types, so docx-rs
    // refuses the package and the XML reader takes over.
    let path = common::write_file(
        dir.path(),
        "bare.docx",
        &common::build_bare_docx_bytes(&["Intro", "Fallback parser extracted this paragraph."]),
    );

    let extracted = native_parser::parse_docx(&path).expect("docx fallback parse should succeed");

    assert_eq!(
        extracted.units,
        vec!["Intro", "Fallback parser extracted this paragraph."]
    );
}

#[test]
fn parse_docx_rejects_non_zip_input() {
    let dir = TempDir::new().expect("temp dir");
    let path = common::write_file(dir.path(), "broken.docx", b"this is not a zip archive");

    let err = native_parser::parse_docx(&path).expect_err("garbage must not parse");
    assert_eq!(err.code(), "PARSE_FAILURE");
    assert!(err.to_string().contains("xml fallback"));
}
