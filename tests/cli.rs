// ABOUTME: Integration tests for the shipyard CLI commands.
// ABOUTME: Validates help, init, status/history output, exit codes, and a git-backed deploy.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn shipyard_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("shipyard"))
}

fn write_config(dir: &Path, body: &str) {
    fs::write(dir.join("shipyard.yml"), body).unwrap();
}

const SIMPLE_CONFIG: &str = r#"
source:
  repository: .
environments:
  - name: staging
    deploy: "true"
"#;

#[test]
fn help_shows_commands() {
    shipyard_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("shipyard.yml");

    shipyard_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--environment", "prod"])
        .assert()
        .success();

    assert!(config_path.exists(), "shipyard.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("name: prod"), "config should name the environment");
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_config(temp_dir.path(), "existing: config");

    shipyard_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn missing_config_is_reported() {
    let temp_dir = tempfile::tempdir().unwrap();

    shipyard_cmd()
        .current_dir(temp_dir.path())
        .args(["status", "staging"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn status_of_fresh_environment() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_config(temp_dir.path(), SIMPLE_CONFIG);

    shipyard_cmd()
        .current_dir(temp_dir.path())
        .args(["status", "staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current:     none"))
        .stdout(predicate::str::contains("Health:      unknown"))
        .stdout(predicate::str::contains("Lock:        free"));
}

#[test]
fn status_rejects_unknown_environment() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_config(temp_dir.path(), SIMPLE_CONFIG);

    shipyard_cmd()
        .current_dir(temp_dir.path())
        .args(["status", "prod"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown environment: prod"));
}

#[test]
fn history_with_no_attempts() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_config(temp_dir.path(), SIMPLE_CONFIG);

    shipyard_cmd()
        .current_dir(temp_dir.path())
        .args(["history", "staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No rollout attempts recorded for staging"));
}

#[test]
fn deploy_to_locked_environment_exits_busy() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_config(temp_dir.path(), SIMPLE_CONFIG);

    let locks = temp_dir.path().join(".shipyard/state/locks");
    fs::create_dir_all(&locks).unwrap();
    let holder = serde_json::json!({
        "holder": "ci-runner",
        "pid": 4242,
        "started_at": chrono::Utc::now().to_rfc3339(),
        "environment": "staging",
    });
    fs::write(locks.join("staging.lock"), holder.to_string()).unwrap();

    shipyard_cmd()
        .current_dir(temp_dir.path())
        .args(["deploy", "staging", "HEAD"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("ci-runner"));

    // The lock shows up in status too.
    shipyard_cmd()
        .current_dir(temp_dir.path())
        .args(["status", "staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("held by ci-runner (pid 4242)"));
}

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args([
            "-c",
            "user.name=shipyard",
            "-c",
            "user.email=shipyard@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

#[test]
fn deploy_from_git_repository_end_to_end() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }

    let repo = tempfile::tempdir().unwrap();
    fs::write(repo.path().join("index.html"), "<h1>v1</h1>").unwrap();
    git(repo.path(), &["init", "--quiet"]);
    git(repo.path(), &["add", "index.html"]);
    git(repo.path(), &["commit", "--quiet", "-m", "v1"]);

    let state = tempfile::tempdir().unwrap();
    let config = format!(
        r#"
source:
  repository: {repo}
recipe:
  steps:
    - echo "$SHIPYARD_REVISION" > REVISION
state_dir: {state}
environments:
  - name: staging
    deploy: test -f index.html && test -f REVISION
    healthcheck:
      cmd: "true"
      required_passes: 1
      interval: 10ms
      deadline: 10s
  - name: broken
    deploy: "true"
    healthcheck:
      cmd: "echo 'service unavailable'; false"
      interval: 10ms
      deadline: 10s
"#,
        repo = repo.path().display(),
        state = state.path().display(),
    );
    write_config(repo.path(), &config);

    shipyard_cmd()
        .current_dir(repo.path())
        .args(["deploy", "staging", "HEAD"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Deployed"));

    shipyard_cmd()
        .current_dir(repo.path())
        .args(["status", "staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Health:      healthy"));

    // A failing probe rolls the first deploy back.
    shipyard_cmd()
        .current_dir(repo.path())
        .args(["deploy", "broken", "HEAD"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("service unavailable"));

    // Unknown revisions fail before anything is built, and are still audited.
    shipyard_cmd()
        .current_dir(repo.path())
        .args(["deploy", "staging", "no-such-ref"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot resolve revision"));

    shipyard_cmd()
        .current_dir(repo.path())
        .args(["history", "staging", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no-such-ref"))
        .stdout(predicate::str::contains("[failed]"));

    shipyard_cmd()
        .current_dir(repo.path())
        .args(["--json", "history", "staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"outcome\":\"succeeded\""));

    shipyard_cmd()
        .current_dir(repo.path())
        .args(["artifacts"])
        .assert()
        .success();
}
