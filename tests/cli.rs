mod util;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

use clap::CommandFactory;
use chat_transcript::Cli;
use util::{sample_lines, write_jsonl};

fn base_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("chat-transcript"));
    cmd.env_remove("CHAT_TRANSCRIPT_CONFIG");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn renders_html_page() {
    let transcript = write_jsonl(&sample_lines());
    base_cmd()
        .arg("render")
        .arg(transcript.path())
        .args(["--title", "Session <1>"])
        .assert()
        .success()
        .stdout(contains("<!DOCTYPE html>"))
        .stdout(contains("<title>Session &lt;1&gt;</title>"))
        .stdout(contains("Show me the config"))
        .stdout(contains("function copyCodeBlock("))
        .stdout(contains("read the file first").not());
}

#[test]
fn show_thinking_flag_includes_reasoning() {
    let transcript = write_jsonl(&sample_lines());
    base_cmd()
        .arg("render")
        .arg(transcript.path())
        .arg("--show-thinking")
        .assert()
        .success()
        .stdout(contains("read the file first"));
}

#[test]
fn renders_json_units() {
    let transcript = write_jsonl(&sample_lines());
    let output = base_cmd()
        .arg("render")
        .arg(transcript.path())
        .args(["--format", "json"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid json output");
    let units = json["units"].as_array().expect("units array");
    assert_eq!(units.len(), 5);
    assert_eq!(units[0]["type"], "group");
    assert_eq!(units[0]["role"], "user");
    assert_eq!(units[4]["type"], "stream");
    assert_eq!(json["stats"]["tool_cards"], 2);
}

#[test]
fn history_limit_and_output_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.json");
    let transcript = write_jsonl(&sample_lines());
    base_cmd()
        .arg("render")
        .arg(transcript.path())
        .args(["--format", "json", "--history-limit", "1", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let json: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    let first = &json["units"][0];
    assert_eq!(first["role"], "unknown");
    assert!(
        first["messages"][0]["html"]
            .as_str()
            .unwrap()
            .contains("3 hidden")
    );
}

#[test]
fn config_file_is_applied() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "history_limit = 2\n").unwrap();
    let transcript = write_jsonl(&sample_lines());
    let output = base_cmd()
        .arg("render")
        .arg(transcript.path())
        .args(["--format", "json"])
        .env("CHAT_TRANSCRIPT_CONFIG", &config)
        .assert()
        .success()
        .get_output()
        .clone();
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(
        json["units"][0]["messages"][0]["html"]
            .as_str()
            .unwrap()
            .contains("2 hidden")
    );
}

#[test]
fn zero_history_limit_is_rejected() {
    let transcript = write_jsonl(&sample_lines());
    base_cmd()
        .arg("render")
        .arg(transcript.path())
        .args(["--history-limit", "0"])
        .assert()
        .failure()
        .stderr(contains("--history-limit"));
}

#[test]
fn invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    fs::write(&config, "history_limit = \"lots\"\n").unwrap();
    let transcript = write_jsonl(&sample_lines());
    base_cmd()
        .arg("render")
        .arg(transcript.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(contains("loading config"));
}

#[test]
fn missing_transcript_fails_with_path() {
    base_cmd()
        .args(["render", "/definitely/not/here.jsonl"])
        .assert()
        .failure()
        .stderr(contains("/definitely/not/here.jsonl"));
}

#[test]
fn reads_transcript_from_stdin() {
    base_cmd()
        .args(["render", "-", "--format", "json"])
        .write_stdin("{\"role\":\"user\",\"content\":\"from stdin\"}\n")
        .assert()
        .success()
        .stdout(contains("from stdin"));
}

#[test]
fn completions_generate_for_bash() {
    base_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(contains("chat-transcript"));
}
