mod common;

use common::*;
use std::process::Command;

fn cli_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_scenario-harness"))
}

#[test]
fn test_cli_help() {
    let output = cli_command().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run browser UI scenarios"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("list"));
    assert!(stdout.contains("validate"));
}

#[test]
fn test_cli_version() {
    let output = cli_command().arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("scenario-harness"));
}

#[test]
fn test_cli_run_help() {
    let output = cli_command().args(["run", "--help"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run a scenario by id"));
    assert!(stdout.contains("--reports"));
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--headed"));
}

#[test]
fn test_cli_list_scenarios() {
    let dir = create_test_dir();
    write_scenario(dir.path(), "scenario-1.yaml", &simple_scenario(1));
    write_scenario(dir.path(), "scenario-4.yaml", &simple_scenario(4));

    let output = cli_command()
        .args(["list", "--dir", dir.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("smoke 1"));
    assert!(stdout.contains("smoke 4"));
    assert!(stdout.contains("2 steps"));
}

#[test]
fn test_cli_list_empty_dir() {
    let dir = create_test_dir();

    let output = cli_command()
        .args(["list", "--dir", dir.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No scenarios found"));
}

#[test]
fn test_cli_validate_valid_scenarios() {
    let dir = create_test_dir();
    write_scenario(dir.path(), "scenario-1.yaml", &simple_scenario(1));

    let output = cli_command()
        .args(["validate", dir.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("all valid"));
}

#[test]
fn test_cli_validate_rejects_unknown_action() {
    let dir = create_test_dir();
    let bad = simple_scenario(2).replace("page/goto", "teleport/now");
    write_scenario(dir.path(), "scenario-2.yaml", &bad);

    let output = cli_command()
        .args(["validate", dir.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("errors found"));
}

#[test]
fn test_cli_run_unknown_scenario_id_fails() {
    let dir = create_test_dir();

    let output = cli_command()
        .args([
            "run",
            "99",
            "--dir",
            dir.path().to_str().unwrap(),
            "--config",
            dir.path().to_str().unwrap(),
        ])
        .output()
        .unwrap();

    assert!(!output.status.success());
}
