//! Smoke tests to verify command wiring

use assert_cmd::Command;
use predicates::prelude::*;

fn ideabox() -> Command {
    Command::cargo_bin("ideabox").unwrap()
}

#[test]
fn test_top_level_help_lists_commands() {
    ideabox()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("user"));
}

#[test]
fn test_serve_help() {
    ideabox()
        .arg("serve")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Externally reachable base URL"));
}

#[test]
fn test_migrate_help() {
    ideabox()
        .arg("migrate")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("default statuses"));
}

#[test]
fn test_user_create_help() {
    ideabox()
        .args(["user", "create", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Grant the admin role"));
}

#[test]
fn test_user_requires_subcommand() {
    ideabox().arg("user").assert().failure();
}

#[test]
fn test_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    ideabox()
        .args(["--config", missing.to_str().unwrap(), "migrate"])
        .env_remove("DATABASE_URL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server]\nbind = 12\n").unwrap();
    ideabox()
        .args(["--config", path.to_str().unwrap(), "user", "list"])
        .assert()
        .failure();
}
