//! Integration tests for the yaml-assist CLI

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "name": {"type": "string", "description": "Application name", "examples": ["myapp"]},
    "server": {
      "type": "object",
      "description": "HTTP server settings",
      "properties": {
        "host": {"type": "string", "default": "localhost"},
        "port": {"type": "integer", "description": "Listen port"}
      },
      "required": ["port"]
    }
  }
}"#;

/// Helper to get the path to a compiled binary
fn get_binary_path(name: &str) -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test executable name
    path.pop(); // Remove "deps"
    path.push(name);
    path
}

/// Helper to create a test file inside a temporary directory
fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let file_path = dir.path().join(name);
    fs::write(&file_path, content).expect("Failed to write temp file");
    file_path
}

fn run(args: &[&str], cwd: &Path) -> Output {
    Command::new(get_binary_path("yaml-assist"))
        .args(args)
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute yaml-assist")
}

#[test]
fn test_validate_valid_file() {
    let dir = TempDir::new().unwrap();
    create_temp_file(&dir, "schema.json", SCHEMA);
    create_temp_file(&dir, "app.yaml", "name: shop\nserver:\n  port: 8080\n");

    let output = run(&["validate", "app.yaml", "--schema", "schema.json"], dir.path());

    assert!(output.status.success(), "valid file should pass");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("app.yaml"));
    assert!(stdout.contains("1 file(s) checked"));
}

#[test]
fn test_validate_reports_errors_and_fails() {
    let dir = TempDir::new().unwrap();
    create_temp_file(&dir, "schema.json", SCHEMA);
    create_temp_file(&dir, "bad.yaml", "name: shop\nserver:\n  port: eighty\n");

    let output = run(&["validate", "bad.yaml", "--schema", "schema.json"], dir.path());

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad.yaml:3:3"), "stderr: {stderr}");
}

#[test]
fn test_validate_no_fail() {
    let dir = TempDir::new().unwrap();
    create_temp_file(&dir, "schema.json", SCHEMA);
    create_temp_file(&dir, "bad.yaml", "name: 1\n");

    let output = run(
        &["validate", "bad.yaml", "--schema", "schema.json", "--no-fail"],
        dir.path(),
    );
    assert!(output.status.success());
}

#[test]
fn test_validate_json_with_pattern() {
    let dir = TempDir::new().unwrap();
    create_temp_file(&dir, "schema.yaml", "properties:\n  name:\n    type: string\n");
    create_temp_file(&dir, "a.yaml", "name: a\n");
    create_temp_file(&dir, "b.yml", "name: [b]\n");
    create_temp_file(&dir, "notes.txt", "name: 1\n");

    let output = run(
        &[
            "validate",
            "--schema",
            "schema.yaml",
            "--pattern",
            "*.y*ml",
            "--format",
            "json",
        ],
        dir.path(),
    );

    assert_eq!(output.status.code(), Some(1));
    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["file"], "a.yaml");
    assert_eq!(reports[0]["diagnostics"].as_array().unwrap().len(), 0);
    assert_eq!(reports[1]["file"], "b.yml");
    assert_eq!(reports[1]["diagnostics"][0]["startLine"], 1);
}

#[test]
fn test_validate_missing_schema() {
    let dir = TempDir::new().unwrap();
    create_temp_file(&dir, "app.yaml", "name: a\n");

    let output = run(&["validate", "app.yaml", "--schema", "missing.json"], dir.path());

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read schema"));
}

#[test]
fn test_complete_json() {
    let dir = TempDir::new().unwrap();
    create_temp_file(&dir, "schema.json", SCHEMA);
    create_temp_file(&dir, "app.yaml", "server:\n  \n");

    let output = run(
        &[
            "complete", "app.yaml", "--schema", "schema.json", "--line", "2", "--column", "3",
            "--format", "json",
        ],
        dir.path(),
    );

    assert!(output.status.success());
    let suggestions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let labels: Vec<&str> = suggestions
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["host", "port"]);
    assert_eq!(suggestions[0]["insertText"], "host: ${1:localhost}\n");
}

#[test]
fn test_hover_text() {
    let dir = TempDir::new().unwrap();
    create_temp_file(&dir, "schema.json", SCHEMA);
    create_temp_file(&dir, "app.yaml", "server:\n  port: 80\n");

    let output = run(
        &["hover", "app.yaml", "--schema", "schema.json", "--line", "2"],
        dir.path(),
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Listen port"));
    assert!(stdout.contains("Type: integer"));
}

#[test]
fn test_index_dump() {
    let dir = TempDir::new().unwrap();
    create_temp_file(&dir, "schema.json", SCHEMA);

    let output = run(&["index", "--schema", "schema.json"], dir.path());

    assert!(output.status.success());
    let index: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(index["server/port"]["type"], "integer");
    assert_eq!(index["name"]["examples"][0], "myapp");
}
