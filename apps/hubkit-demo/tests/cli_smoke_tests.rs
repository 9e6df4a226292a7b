#![allow(clippy::unwrap_used, clippy::expect_used)]

//! CLI smoke tests for the hubkit-demo binary.

use std::io::Write;
use std::process::{Command, Output, Stdio};
use tempfile::NamedTempFile;

fn run_demo(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hubkit-demo"))
        .args(args)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute hubkit-demo")
}

fn config_file(yaml: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

fn demo_config() -> String {
    format!("{}/config/demo.yaml", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn help_lists_subcommands_and_options() {
    let output = run_demo(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"), "{stdout}");
    assert!(stdout.contains("run"));
    assert!(stdout.contains("check"));
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--print-config"));
}

#[test]
fn missing_config_file_fails() {
    let output = run_demo(&["--config", "/nonexistent/hubkit.yaml", "check"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("config file does not exist"), "{stderr}");
}

#[test]
fn shipped_config_passes_check() {
    let output = run_demo(&["--config", &demo_config(), "check"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Configuration is valid"));
}

#[test]
fn check_rejects_a_section_for_an_unattached_module() {
    let file = config_file("modules:\n  BillingHub:\n    config: {}\n");

    let output = run_demo(&["--config", file.path().to_str().unwrap(), "check"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("BillingHub"));
}

#[test]
fn print_config_merges_yaml_over_defaults() {
    let file = config_file("transport:\n  channel_capacity: 8\n");

    let output = run_demo(&["--config", file.path().to_str().unwrap(), "--print-config", "-vv"]);

    assert!(output.status.success());
    let config: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(config["transport"]["channel_capacity"], 8);
    assert_eq!(config["logging"]["level"], "debug");
    assert_eq!(config["logging"]["json"], false);
}

#[test]
fn run_prints_every_delivery_as_json() {
    let output = run_demo(&["--config", &demo_config(), "run"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let deliveries: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(deliveries.len(), 7);
    assert!(deliveries.iter().any(|d| {
        d["target"] == "ReceiveWeatherUpdate" && d["arguments"][0]["city"] == "Oslo"
    }));
    assert!(
        deliveries
            .iter()
            .any(|d| d["connection_id"] == "conn-alice" && d["target"] == "UserJoined")
    );
}
