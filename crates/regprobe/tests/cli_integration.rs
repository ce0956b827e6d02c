//! Integration tests for the regprobe CLI.

use regmap_core as _;
use regprobe as _;
use serde as _;
use serde_yaml as _;
use thiserror as _;
use tracing as _;
use tracing_subscriber as _;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const MAP: &str = "\
name: nic
description: Network controller
registers:
  - address: 0x1000
    name: CTRL
    good: 0x5
  - address: 0x1004
    name: STATUS
    fields:
      - name: READY
        bits: [0]
        good: 1
  - address: 0x1008
    name: VERSION
";

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("regprobe")
}

fn create_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .env_remove("REGPROBE_LOG")
        .output()
        .expect("failed to run regprobe")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn probe_of_healthy_device_exits_zero() {
    let temp_dir = tempfile::tempdir().unwrap();
    let map = create_temp_file(temp_dir.path(), "nic.yaml", MAP);
    let sim = create_temp_file(
        temp_dir.path(),
        "sim.yaml",
        "- address: 0x1000\n  value: 0x5\n- address: 0x1004\n  value: 0x1\n- address: 0x1008\n  value: 0x10\n",
    );

    let output = run(&[
        "probe",
        map.to_str().unwrap(),
        "--sim",
        sim.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr(&output));
    let report = stdout(&output);
    assert!(report.contains("[ ok ] 0x0000000000001000 CTRL = 0x5 (good 0x5)"));
    assert!(report.contains("3 registers: 3 ok, 0 bad, 0 unresolved"));
}

#[test]
fn probe_with_failure_reports_and_saves_snapshot() {
    let temp_dir = tempfile::tempdir().unwrap();
    let map = create_temp_file(temp_dir.path(), "nic.yaml", MAP);
    let sim = create_temp_file(
        temp_dir.path(),
        "sim.yaml",
        "- address: 0x1000\n  value: 0x7\n- address: 0x1004\n  fail: true\n- address: 0x1008\n  value: 0x10\n",
    );
    let snapshot = temp_dir.path().join("snapshot.yaml");

    let output = run(&[
        "probe",
        map.to_str().unwrap(),
        "--sim",
        sim.to_str().unwrap(),
        "-o",
        snapshot.to_str().unwrap(),
        "--anomalies-only",
    ]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("1 of 3 register reads failed"));
    assert!(stderr(&output).contains("nic/STATUS"));

    let report = stdout(&output);
    assert!(report.contains("[BAD ] 0x0000000000001000 CTRL = 0x7 (good 0x5)"));
    assert!(report.contains("[ ?? ] 0x0000000000001004 STATUS = ?"));
    assert!(!report.contains("VERSION"));
    assert!(report.contains("3 registers: 1 ok, 1 bad, 1 unresolved"));

    let saved = fs::read_to_string(&snapshot).unwrap();
    assert!(saved.contains("value: '0x7'") || saved.contains("value: 0x7"));
    assert!(saved.contains("read_error:"));

    let offline = run(&["report", snapshot.to_str().unwrap(), "-a"]);
    assert_eq!(offline.status.code(), Some(2));
    let offline = stdout(&offline);
    assert_eq!(offline, report);
    assert!(offline.contains(
        "STATUS = ?  [read failed: transport failure: simulated failure at bar 0 address 0x1004]"
    ));
}

#[test]
fn check_prints_normalized_map() {
    let temp_dir = tempfile::tempdir().unwrap();
    let map = create_temp_file(temp_dir.path(), "nic.yaml", MAP);

    let output = run(&["check", map.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    let normalized = stdout(&output);
    assert!(normalized.contains("name: nic"));
    assert!(normalized.contains("READY"));
    assert!(!normalized.contains("value"));
}

#[test]
fn invalid_map_exits_one_with_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    let map = create_temp_file(
        temp_dir.path(),
        "bad.yaml",
        "name: top\nregisters:\n  - address: 0\n    name: R\n    fields:\n      - name: F\n        bits: [0]\n        width: 1\n",
    );

    let output = run(&["check", map.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("top/R/F"));
}

#[test]
fn missing_file_and_bad_usage_exit_one() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("missing.yaml");

    let output = run(&["report", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("error:"));

    let output = run(&["probe", "map.yaml"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("missing backend"));

    let output = run(&["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).starts_with("Usage: regprobe"));
}
