//! Integration tests for document text extraction through `cdesk extract`.
//!
//! Covers PDF, DOCX and plain text input, cleanup of page furniture, chunk
//! metadata in JSON mode, and failures on unsupported or corrupt files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cdesk_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("cdesk");
    path
}

/// Minimal valid PDF containing the text "supply agreement clause".
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    let content: &[u8] = b"BT /F1 12 Tf 100 700 Td (supply agreement clause) Tj ET";
    out.extend_from_slice(format!("4 0 obj << /Length {} >> stream\n", content.len()).as_bytes());
    out.extend_from_slice(content);
    out.extend_from_slice(b"\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o4).as_bytes());
    out.extend_from_slice(format!("{:010} 00000 n \n", o5).as_bytes());
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Minimal docx (ZIP) whose word/document.xml holds one paragraph per entry.
fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

fn run_extract(file: &Path, extra: &[&str]) -> (String, String, bool) {
    let binary = cdesk_binary();
    let output = Command::new(&binary)
        .arg("extract")
        .arg(file)
        .args(extra)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cdesk binary at {:?}: {}", binary, e));
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_extract_pdf() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("contract.pdf");
    fs::write(&path, minimal_pdf_with_phrase()).unwrap();

    let (stdout, stderr, success) = run_extract(&path, &[]);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("supply agreement clause"), "stdout: {}", stdout);
}

#[test]
fn test_extract_docx_keeps_paragraphs() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("contract.docx");
    fs::write(
        &path,
        minimal_docx(&["CLAUSE 1 - OBJECT", "The supplier shall deliver goods."]),
    )
    .unwrap();

    let (stdout, stderr, success) = run_extract(&path, &[]);
    assert!(success, "extract failed: {}", stderr);
    assert!(stdout.contains("CLAUSE 1 - OBJECT\n\nThe supplier shall deliver goods."));
}

#[test]
fn test_extract_clean_drops_page_furniture() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("contract.txt");
    fs::write(
        &path,
        "CLAUSE 1. Object.\r\nPage 1 of 3\r\nCONFIDENTIAL\r\n\r\n\r\n\r\n2/3\r\nCLAUSE 2.   Price.\r\n",
    )
    .unwrap();

    let (stdout, _, success) = run_extract(&path, &["--clean"]);
    assert!(success);
    assert_eq!(stdout.trim_end(), "CLAUSE 1. Object.\n\nCLAUSE 2. Price.");
}

#[test]
fn test_extract_json_reports_chunks() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("contract.txt");
    fs::write(&path, "CLAUSE 1. Object.\n\nCLAUSE 2. Price.").unwrap();

    let (stdout, stderr, success) = run_extract(&path, &["--json"]);
    assert!(success, "extract failed: {}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["metadata"]["total_chunks"], 1);
    assert_eq!(json["chunks"][0]["chunk_index"], 0);
    assert_eq!(json["chunks"][0]["hash"].as_str().unwrap().len(), 64);
}

#[test]
fn test_extract_unsupported_extension_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("scan.png");
    fs::write(&path, b"\x89PNG").unwrap();

    let (_, stderr, success) = run_extract(&path, &[]);
    assert!(!success);
    assert!(stderr.contains("unsupported file type"));
}

#[test]
fn test_extract_corrupt_docx_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("broken.docx");
    fs::write(&path, b"not a zip archive").unwrap();

    let (_, stderr, success) = run_extract(&path, &[]);
    assert!(!success);
    assert!(stderr.contains("DOCX extraction failed"));
}
