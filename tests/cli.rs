// ABOUTME: Integration tests for the guardian CLI commands.
// ABOUTME: Validates --help output and the registry commands that need no remote host.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn guardian_cmd(home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("guardian"));
    cmd.env("GUARDIAN_HOME", home.path())
        .env_remove("GUARDIAN_AUTO_ACCEPT_HOST_KEYS")
        .env_remove("RUST_LOG");
    cmd
}

fn write_registry(home: &tempfile::TempDir) {
    fs::write(
        home.path().join("config.json"),
        r#"{"Hosts": [{"Name": "filter", "Address": "192.168.1.20", "Username": "pi", "Port": 22, "HomePath": "/home/pi"}]}"#,
    )
    .unwrap();
}

#[test]
fn help_shows_commands() {
    let home = tempfile::tempdir().unwrap();
    guardian_cmd(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("host"))
        .stdout(predicate::str::contains("select"))
        .stdout(predicate::str::contains("exec"))
        .stdout(predicate::str::contains("put"))
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("reset"));
}

#[test]
fn host_list_on_fresh_workspace_is_empty() {
    let home = tempfile::tempdir().unwrap();
    guardian_cmd(&home)
        .args(["host", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 configured host(s)"));

    // First run lays out the workspace.
    assert!(home.path().join("ssh-keys").is_dir());
    assert!(home.path().join("ssh-keys/known_hosts").is_file());
    assert!(home.path().join("host_data").is_dir());
}

#[test]
fn host_list_shows_registered_hosts() {
    let home = tempfile::tempdir().unwrap();
    write_registry(&home);

    guardian_cmd(&home)
        .args(["host", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("filter"))
        .stdout(predicate::str::contains("192.168.1.20"));
}

#[test]
fn host_list_json_emits_one_object_per_host() {
    let home = tempfile::tempdir().unwrap();
    write_registry(&home);

    guardian_cmd(&home)
        .args(["--json", "host", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name":"filter""#))
        .stdout(predicate::str::contains(r#""address":"192.168.1.20""#));
}

#[test]
fn deleting_unknown_host_fails() {
    let home = tempfile::tempdir().unwrap();
    guardian_cmd(&home)
        .args(["host", "delete", "nope"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("'nope' is not configured"));
}

#[test]
fn delete_removes_host_and_selection() {
    let home = tempfile::tempdir().unwrap();
    write_registry(&home);
    fs::write(home.path().join(".target"), "filter").unwrap();

    guardian_cmd(&home)
        .args(["host", "delete", "filter"])
        .assert()
        .success();

    let registry = fs::read_to_string(home.path().join("config.json")).unwrap();
    assert!(!registry.contains("filter"));
    assert!(!home.path().join(".target").exists());
}

#[test]
fn select_requires_known_host() {
    let home = tempfile::tempdir().unwrap();
    guardian_cmd(&home)
        .args(["select", "filter"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));

    write_registry(&home);
    guardian_cmd(&home)
        .args(["select", "filter"])
        .assert()
        .success();
    guardian_cmd(&home)
        .args(["select", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Selected target: filter"));
    guardian_cmd(&home)
        .args(["select", "none"])
        .assert()
        .success();
    guardian_cmd(&home)
        .args(["select", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No target selected"));
}

#[test]
fn exec_without_target_fails() {
    let home = tempfile::tempdir().unwrap();
    guardian_cmd(&home)
        .args(["exec", "--", "uptime"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no target selected"));
}

#[test]
fn add_without_terminal_or_password_fails_before_saving() {
    let home = tempfile::tempdir().unwrap();
    guardian_cmd(&home)
        .env_remove("GUARDIAN_PASSWORD_NEWBOX")
        .args(["host", "add", "newbox", "pi@127.0.0.1:1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no credential available"));

    assert!(!home.path().join("config.json").exists());
    assert!(!home.path().join("ssh-keys/id_rsa").exists());
}

#[test]
fn reset_without_yes_refuses_off_terminal() {
    let home = tempfile::tempdir().unwrap();
    write_registry(&home);

    guardian_cmd(&home)
        .arg("reset")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cancelled"));
    assert!(fs::read_to_string(home.path().join("config.json"))
        .unwrap()
        .contains("filter"));
}

#[test]
fn reset_with_yes_clears_workspace() {
    let home = tempfile::tempdir().unwrap();
    write_registry(&home);
    fs::write(home.path().join(".target"), "filter").unwrap();

    guardian_cmd(&home)
        .args(["reset", "--yes"])
        .assert()
        .success();

    let registry = fs::read_to_string(home.path().join("config.json")).unwrap();
    assert!(!registry.contains("filter"));
    assert!(!home.path().join(".target").exists());
    assert!(home.path().join("ssh-keys/known_hosts").is_file());
}

#[test]
fn export_then_import_moves_registry_between_workspaces() {
    let home = tempfile::tempdir().unwrap();
    write_registry(&home);
    let scratch = tempfile::tempdir().unwrap();
    let archive = scratch.path().join("guardian.tar.gz");

    guardian_cmd(&home)
        .arg("export")
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported"));
    assert!(archive.is_file());

    let fresh = tempfile::tempdir().unwrap();
    guardian_cmd(&fresh)
        .arg("import")
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported"));

    guardian_cmd(&fresh)
        .args(["host", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("filter"));
}

#[test]
fn import_of_missing_archive_fails() {
    let home = tempfile::tempdir().unwrap();
    guardian_cmd(&home)
        .args(["import", "/nonexistent/guardian.tar.gz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read archive"));
}
