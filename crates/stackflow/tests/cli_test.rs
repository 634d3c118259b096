use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// `stackflow` run in `dir` without executing anything against AWS
fn stackflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stackflow").unwrap();
    cmd.current_dir(dir)
        .env("STACKFLOW_CONFIG_PATH", dir.join("missing-config.yaml"))
        .env("STACKFLOW_NO_EXE_CF", "true")
        .env("AWS_REGION", "us-east-1")
        .env_remove("STACKFLOW_PROJECT_DIR")
        .env_remove("STACKFLOW_PROFILE");
    cmd
}

fn init(dir: &Path) {
    stackflow(dir)
        .args(["project", "init", "--name", "cli-demo", "--bucket", "cli-demo.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("clidemo"));
}

#[test]
fn test_version() {
    let dir = TempDir::new().unwrap();
    stackflow(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("stackflow "));
}

#[test]
fn test_project_init_writes_state() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    let state = dir.path().join(".stackflow").join("project.json");
    assert!(state.is_file());
    assert!(!dir.path().join(".stackflow").join("lock.json").exists());

    let content = std::fs::read_to_string(state).unwrap();
    assert!(content.contains("\"bucket\": \"cli-demo.com\""));
    assert!(content.contains("us-east-1"));
}

#[test]
fn test_variables_list() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    stackflow(dir.path())
        .args(["variables", "list", "--stage", "dev", "--region", "us-east-1", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"projectBucket\": \"cli-demo.com\""))
        .stdout(predicate::str::contains("\"region\": \"us-east-1\""));
}

#[test]
fn test_commands_outside_project_fail() {
    let dir = TempDir::new().unwrap();
    stackflow(dir.path())
        .args(["stage", "create", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("project init"));
}

#[test]
fn test_lifecycle_without_execution() {
    let dir = TempDir::new().unwrap();
    init(dir.path());

    stackflow(dir.path())
        .args(["stage", "create", "prod", "--region", "eu-west-1"])
        .assert()
        .success();

    stackflow(dir.path())
        .args(["resources", "deploy", "--stage", "prod", "--region", "eu-west-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prod-clidemo-lambda"));

    // duplicate stage
    stackflow(dir.path())
        .args(["stage", "create", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DuplicateEntity"));

    // a stage with regions cannot be removed
    stackflow(dir.path())
        .args(["stage", "remove", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NotEmpty"));

    for (stage, region) in [("prod", "eu-west-1"), ("dev", "us-east-1")] {
        stackflow(dir.path())
            .args(["resources", "remove", "--stage", stage, "--region", region])
            .assert()
            .success();
        stackflow(dir.path())
            .args(["region", "remove", region, "--stage", stage])
            .assert()
            .success();
        stackflow(dir.path())
            .args(["stage", "remove", stage])
            .assert()
            .success();
    }

    stackflow(dir.path())
        .args(["project", "remove", "--purge-bucket"])
        .assert()
        .success()
        .stdout(predicate::str::contains("was kept"));

    assert!(!dir.path().join(".stackflow").join("project.json").exists());
}
