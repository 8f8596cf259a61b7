mod support;

use serde_json::{Value, json};
use std::fs;
use std::process::Command;
use support::builders::{available, streaming, to_jsonl};
use tempfile::tempdir;

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(assert_cmd::cargo::cargo_bin!("spreadsheet-agent"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("run spreadsheet-agent")
}

fn parse_stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout utf8");
    serde_json::from_str(&stdout).expect("valid json")
}

fn last_stderr_json(output: &std::process::Output) -> Value {
    let stderr = String::from_utf8(output.stderr.clone()).expect("stderr utf8");
    let line = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .expect("stderr line");
    serde_json::from_str(line).expect("error envelope json")
}

#[test]
fn tools_lists_every_operation() {
    let output = run_cli(&["tools"]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);
    let payload = parse_stdout_json(&output);
    let tools = payload.as_array().expect("tool array");
    assert_eq!(tools.len(), 14);
    assert!(tools.iter().any(|tool| tool["name"] == "freeze_panes"));
}

#[test]
fn replay_writes_workbook_and_snapshot() {
    let tmp = tempdir().expect("tempdir");
    let events_path = tmp.path().join("events.jsonl");
    let output_path = tmp.path().join("result.xlsx");
    let events = vec![
        streaming("t1", "write_range"),
        available(
            "t1",
            "write_range",
            json!({"startRow": 0, "startCol": 0, "values": [["Month", "Total"], ["Jan", 10]]}),
        ),
        available("t1", "write_range", json!({"startRow": 5, "startCol": 5, "values": [[1]]})),
        available("t2", "set_formula", json!({"row": 2, "col": 1, "formula": "SUM(B2:B2)"})),
    ];
    fs::write(&events_path, to_jsonl(&events)).expect("write events");

    let output = run_cli(&[
        "--quiet",
        "replay",
        events_path.to_str().expect("utf8"),
        "--output",
        output_path.to_str().expect("utf8"),
    ]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);

    let payload = parse_stdout_json(&output);
    assert_eq!(payload["summary"]["executed"], 2);
    assert_eq!(payload["summary"]["ignored"], 1);
    assert_eq!(payload["steps"].as_array().expect("steps").len(), 2);
    let snapshot = payload["snapshot"].as_str().expect("snapshot");
    assert!(snapshot.contains("A3:  | =SUM(B2:B2)"));
    assert!(output_path.exists());

    let output = run_cli(&["snapshot", output_path.to_str().expect("utf8")]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);
    let payload = parse_stdout_json(&output);
    assert!(
        payload["snapshot"]
            .as_str()
            .expect("snapshot")
            .contains("A1: Month | Total")
    );
}

#[test]
fn missing_events_file_reports_envelope() {
    let tmp = tempdir().expect("tempdir");
    let missing = tmp.path().join("missing.jsonl");
    let output = run_cli(&["replay", missing.to_str().expect("utf8")]);
    assert!(!output.status.success());
    let envelope = last_stderr_json(&output);
    assert_eq!(envelope["code"], "FILE_NOT_FOUND");
}
