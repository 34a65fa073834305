//! Integration tests for the blockwright CLI
//!
//! Runs the compiled binary against forms written to a temporary directory.

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::{tempdir, TempDir};

fn run_cli_command(args: &[&str]) -> Result<Output> {
    let output = Command::new(env!("CARGO_BIN_EXE_blockwright"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()?;
    Ok(output)
}

fn setup_temp_dir() -> TempDir {
    tempdir().expect("Failed to create temp directory")
}

/// A one-page form with a text field and a combo box
fn form_pdf() -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R /AcroForm 3 0 R >>",
        "<< /Type /Pages /Kids [4 0 R] /Count 1 >>",
        "<< /Fields [5 0 R 6 0 R] /DA (/Helv 0 Tf 0 g) >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [5 0 R 6 0 R] >>",
        "<< /Type /Annot /Subtype /Widget /FT /Tx /T (full_name) /Rect [100 700 260 720] /P 4 0 R >>",
        "<< /Type /Annot /Subtype /Widget /FT /Ch /Ff 131072 /T (color) /Opt [(Red) (Blue)] /Rect [100 650 200 670] /P 4 0 R >>",
    ];
    let mut out = b"%PDF-1.7\n".to_vec();
    let mut offsets = Vec::new();
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
    }
    let xref = out.len();
    let mut table = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        table.push_str(&format!("{offset:010} 00000 n \n"));
    }
    table.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        objects.len() + 1
    ));
    out.extend_from_slice(table.as_bytes());
    out
}

fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write fixture");
    path
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_cli_detect_command() {
    let temp_dir = setup_temp_dir();
    let input = write_file(&temp_dir, "form.pdf", &form_pdf());

    let output = run_cli_command(&["detect", path_str(&input)]).unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json = stdout_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["blocks"].as_array().unwrap().len(), 2);
    assert_eq!(
        json["blocks"][0],
        serde_json::json!({"label": "full_name", "x": 100.0, "y": 72.0, "width": 160.0, "height": 20.0})
    );
    assert_eq!(json["blocks"][1]["label"], "color");
}

#[test]
fn test_cli_detect_pretty() {
    let temp_dir = setup_temp_dir();
    let input = write_file(&temp_dir, "form.pdf", &form_pdf());

    let output = run_cli_command(&["detect", path_str(&input), "--pretty", "--merge", "per-field"]).unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\n  \"blocks\""));
}

#[test]
fn test_cli_fill_command() {
    let temp_dir = setup_temp_dir();
    let input = write_file(&temp_dir, "form.pdf", &form_pdf());
    let values = write_file(&temp_dir, "values.json", br#"{"full_name": "Ada", "color": "Blue"}"#);
    let output_path = temp_dir.path().join("filled.pdf");

    let output = run_cli_command(&[
        "fill",
        path_str(&input),
        "--values",
        path_str(&values),
        "-o",
        path_str(&output_path),
    ])
    .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let filled = fs::read(&output_path).unwrap();
    let original = form_pdf();
    assert!(filled.starts_with(&original));
    assert!(filled.len() > original.len());

    // Geometry survives the fill
    let before = run_cli_command(&["detect", path_str(&input)]).unwrap();
    let after = run_cli_command(&["detect", path_str(&output_path)]).unwrap();
    assert_eq!(stdout_json(&before), stdout_json(&after));
}

#[test]
fn test_cli_fill_with_blocks_and_full_rewrite() {
    let temp_dir = setup_temp_dir();
    let input = write_file(&temp_dir, "form.pdf", &form_pdf());
    let detect = run_cli_command(&["detect", path_str(&input)]).unwrap();
    let blocks = write_file(&temp_dir, "blocks.json", &detect.stdout);
    let values = write_file(&temp_dir, "values.json", br#"{"full_name": "Ada"}"#);
    let output_path = temp_dir.path().join("rewritten.pdf");

    let output = run_cli_command(&[
        "fill",
        path_str(&input),
        "--values",
        path_str(&values),
        "--blocks",
        path_str(&blocks),
        "-o",
        path_str(&output_path),
        "--full-rewrite",
    ])
    .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let filled = fs::read(&output_path).unwrap();
    assert!(filled.starts_with(b"%PDF-1.7"));
    assert!(!filled.starts_with(&form_pdf()));
}

#[test]
fn test_cli_fill_warnings_and_fail_fast() {
    let temp_dir = setup_temp_dir();
    let input = write_file(&temp_dir, "form.pdf", &form_pdf());
    let values = write_file(&temp_dir, "values.json", br#"{"color": "Green"}"#);
    let output_path = temp_dir.path().join("filled.pdf");

    let output = run_cli_command(&[
        "fill",
        path_str(&input),
        "--values",
        path_str(&values),
        "-o",
        path_str(&output_path),
    ])
    .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("BW_CORE_INVALID_CHOICE"));

    let output = run_cli_command(&[
        "fill",
        path_str(&input),
        "--values",
        path_str(&values),
        "-o",
        path_str(&output_path),
        "--fail-fast",
    ])
    .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["code"], "BW_CORE_INVALID_CHOICE");
    assert_eq!(json["context"], "color");
}

#[test]
fn test_cli_error_envelope_for_bad_input() {
    let temp_dir = setup_temp_dir();
    let input = write_file(&temp_dir, "broken.pdf", b"this is not a pdf");

    let output = run_cli_command(&["detect", path_str(&input)]).unwrap();
    assert_eq!(output.status.code(), Some(2));
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["code"], "BW_CORE_INVALID_HEADER");
}

#[test]
fn test_cli_missing_file() {
    let output = run_cli_command(&["detect", "/nonexistent/form.pdf"]).unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read"));
}

#[test]
fn test_cli_fields_command() {
    let temp_dir = setup_temp_dir();
    let input = write_file(&temp_dir, "form.pdf", &form_pdf());

    let output = run_cli_command(&["fields", path_str(&input)]).unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("full_name"));
    assert!(stdout.contains("options: Red, Blue"));

    let output = run_cli_command(&["fields", path_str(&input), "--json"]).unwrap();
    let json = stdout_json(&output);
    assert_eq!(json[1]["name"], "color");
    assert_eq!(json[1]["kind"], "combo");
}

#[test]
fn test_cli_help() {
    let output = run_cli_command(&["--help"]).unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["detect", "fill", "fields"] {
        assert!(stdout.contains(command), "help should list {command}");
    }
}
