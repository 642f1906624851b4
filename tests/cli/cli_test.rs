//! CLI contract tests for the `herald` binary.

use std::path::Path;

use assert_cmd::Command;

fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        r#"
[telegram]
admins = [1]

[storage]
database = "herald.db"
"#,
    )
    .expect("should write config");
    path
}

fn herald(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("herald").expect("binary should build");
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn help_lists_subcommands() {
    let output = Command::cargo_bin("herald")
        .expect("binary should build")
        .arg("--help")
        .output()
        .expect("should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("start"));
    assert!(stdout.contains("broadcast"));
    assert!(stdout.contains("subscribers"));
}

#[test]
fn subscribers_add_list_remove_round_trip() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let config = write_config(tmp.path());

    herald(&config)
        .args(["subscribers", "add", "42"])
        .assert()
        .success();
    herald(&config)
        .args(["subscribers", "add", "42"])
        .assert()
        .success();
    herald(&config)
        .args(["subscribers", "add", "-1001"])
        .assert()
        .success();

    let output = herald(&config)
        .args(["subscribers", "list", "--json"])
        .output()
        .expect("should run");
    assert!(output.status.success());
    let mut ids: Vec<i64> =
        serde_json::from_slice(&output.stdout).expect("list output should be JSON");
    ids.sort_unstable();
    assert_eq!(ids, vec![-1001, 42]);

    herald(&config)
        .args(["subscribers", "remove", "42"])
        .assert()
        .success();
    let output = herald(&config)
        .args(["subscribers", "count"])
        .output()
        .expect("should run");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1");

    assert!(tmp.path().join("herald.db").exists());
}

#[test]
fn broadcast_without_content_fails() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let config = write_config(tmp.path());

    herald(&config)
        .env("HERALD_TELEGRAM_TOKEN", "123:test")
        .args(["broadcast", "--text", "   "])
        .assert()
        .failure();
}

#[test]
fn missing_config_fails() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    herald(&tmp.path().join("absent.toml"))
        .args(["subscribers", "count"])
        .assert()
        .failure();
}
