// ABOUTME: Integration tests for the shipwright CLI commands.
// ABOUTME: Validates --help, init, and dry-run convergence against a simulated host.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn shipwright_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("shipwright"))
}

const CONFIG: &str = r#"
images:
  - name: nginx
    tag: "1.27"
containers:
  - name: web
    image: nginx:1.27
    env:
      GREETING: hello
    ports: ["8080:80"]
"#;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("shipwright.yml");
    fs::write(&path, CONFIG).unwrap();
    path
}

#[test]
fn help_shows_commands() {
    shipwright_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("image"))
        .stdout(predicate::str::contains("container"))
        .stdout(predicate::str::contains("sweep"));
}

#[test]
fn init_creates_config_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("shipwright.yml");

    shipwright_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--name", "api", "--image", "ghcr.io/org/api:v3"])
        .assert()
        .success();

    assert!(config_path.exists(), "shipwright.yml should be created");
    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("name: api"));
    assert!(content.contains("ghcr.io/org/api:v3"));
}

#[test]
fn init_refuses_to_overwrite_existing_config() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("shipwright.yml");

    fs::write(&config_path, "existing: config").unwrap();

    shipwright_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    assert_eq!(fs::read_to_string(&config_path).unwrap(), "existing: config");
}

#[test]
fn missing_config_is_reported() {
    let temp_dir = tempfile::tempdir().unwrap();

    shipwright_cmd()
        .current_dir(temp_dir.path())
        .args(["--dry-run", "apply"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn dry_run_apply_converges_a_simulated_host() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = write_config(temp_dir.path());

    shipwright_cmd()
        .arg("--dry-run")
        .arg("--config")
        .arg(&config)
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("updated"))
        .stdout(predicate::str::contains("pull_if_missing nginx:1.27"))
        .stdout(predicate::str::contains("create_and_rotate web"))
        .stdout(predicate::str::contains("Host updated"));
}

#[test]
fn dry_run_apply_emits_json_lines() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = write_config(temp_dir.path());

    let output = shipwright_cmd()
        .args(["--dry-run", "--json", "--config"])
        .arg(&config)
        .arg("apply")
        .output()
        .unwrap();
    assert!(output.status.success());

    let events: Vec<serde_json::Value> = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    let actions: Vec<&serde_json::Value> =
        events.iter().filter(|e| e["event"] == "action").collect();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[1]["target"], "web");
    assert_eq!(actions[1]["updated"], true);
    assert!(events.iter().any(|e| e["event"] == "sweep"));
    assert_eq!(events.last().unwrap()["event"], "success");
}

#[test]
fn quiet_mode_lists_only_changes() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = write_config(temp_dir.path());

    shipwright_cmd()
        .args(["--dry-run", "--quiet", "--config"])
        .arg(&config)
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains("create_and_rotate web"))
        .stdout(predicate::str::contains("Converging").not());
}

#[test]
fn container_command_requires_a_declared_name() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = write_config(temp_dir.path());

    shipwright_cmd()
        .args(["--dry-run", "--config"])
        .arg(&config)
        .args(["container", "create_and_rotate", "db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no container named db"));
}

#[test]
fn image_command_accepts_undeclared_references() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = write_config(temp_dir.path());

    shipwright_cmd()
        .args(["--dry-run", "--config"])
        .arg(&config)
        .args(["image", "try_pull", "redis:7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("try_pull redis:7"));
}

#[test]
fn unknown_action_is_rejected_by_the_parser() {
    shipwright_cmd()
        .args(["image", "fetch", "redis:7"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
