//! CLI integration tests
//!
//! Runs the built binary and checks output and exit codes. None of these
//! need R, r4r or r-diff to be installed.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn repropack_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_repropack"))
}

fn command(storage: &TempDir) -> Command {
    let mut cmd = Command::new(repropack_bin());
    cmd.env("REPROPACK_STORAGE_DIR", storage.path())
        .env_remove("REPROPACK_RENDER_TIMEOUT")
        .env_remove("REPROPACK_LOG_LEVEL")
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn test_cli_help() {
    let output = Command::new(repropack_bin()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for subcommand in ["scan", "render", "trace", "diff", "build", "package"] {
        assert!(stdout.contains(subcommand), "help lacks {}", subcommand);
    }
}

#[test]
fn test_scan_json_output() {
    let dir = TempDir::new().unwrap();
    let doc = dir.path().join("analysis.Rmd");
    fs::write(
        &doc,
        "```{r}\nsetwd('/home/analyst')\nx <- runif(3)\n```\n",
    )
    .unwrap();

    let output = command(&dir)
        .args(["scan", doc.to_str().unwrap(), "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let categories: Vec<&str> = report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["category"].as_str().unwrap())
        .collect();
    assert!(categories.contains(&"randomness"));
    assert!(categories.contains(&"environment"));
}

#[test]
fn test_scan_missing_file_exit_code() {
    let dir = TempDir::new().unwrap();
    let output = command(&dir)
        .args(["scan", "/definitely/not/here.Rmd"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read"));
}

#[test]
fn test_diff_without_renders() {
    let dir = TempDir::new().unwrap();
    let output = command(&dir)
        .args(["diff", "12", "--format", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["success"], false);
    assert_eq!(result["error"]["kind"], "missing_artifact");
}

#[test]
fn test_bad_config_exit_code() {
    let dir = TempDir::new().unwrap();
    let output = command(&dir)
        .env("REPROPACK_RENDER_TIMEOUT", "forever")
        .args(["trace", "12"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("REPROPACK_RENDER_TIMEOUT"));
}

#[test]
fn test_invalid_document_id() {
    let dir = TempDir::new().unwrap();
    let output = command(&dir).args(["trace", "../x"]).output().unwrap();
    assert!(!output.status.success());
}
