//! CLI integration tests

use std::process::Command;

fn healerctl(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "healer-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = healerctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Edge Healer"), "Should show app name");
    assert!(stdout.contains("alerts"), "Should show alerts command");
    assert!(stdout.contains("submit"), "Should show submit command");
    assert!(stdout.contains("health"), "Should show health command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = healerctl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("healerctl"), "Should show binary name");
}

/// Test alerts subcommand help
#[test]
fn test_alerts_help() {
    let output = healerctl(&["alerts", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Alerts help should succeed");
    assert!(stdout.contains("--since"), "Should show since option");
    assert!(stdout.contains("--scenario"), "Should show scenario option");
}

/// Test submit subcommand help
#[test]
fn test_submit_help() {
    let output = healerctl(&["submit", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Submit help should succeed");
    assert!(stdout.contains("--scenario"), "Should show scenario option");
    assert!(stdout.contains("--message"), "Should show message option");
}

/// Test global options
#[test]
fn test_global_options() {
    let output = healerctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("HEALER_API_URL"), "Should show env var");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = healerctl(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"), "Should show error message");
}

/// Test missing required argument error handling
#[test]
fn test_submit_requires_message() {
    let output = healerctl(&["submit", "--scenario", "Sensor Failure"]);

    assert!(!output.status.success(), "Missing argument should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}
