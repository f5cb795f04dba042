//! CLI subprocess integration tests.
//!
//! These tests invoke the `cairn` binary against the mock driver and a
//! temporary store, and check exit codes and JSON output.

use std::path::Path;
use std::process::{Command, Output};

struct Sandbox {
    store: tempfile::TempDir,
    config: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            store: tempfile::tempdir().unwrap(),
            config: tempfile::tempdir().unwrap(),
        }
    }

    fn cairn(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cairn"))
            .env("CAIRN_DRIVER", "mock")
            .env("XDG_CONFIG_HOME", self.config.path())
            .env_remove("CAIRN_LOG")
            .arg("--store")
            .arg(self.store.path())
            .args(args)
            .output()
            .unwrap()
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let mut full = args.to_vec();
        full.push("--json");
        let output = self.cairn(&full);
        assert!(
            output.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    fn registry_file(&self) -> std::path::PathBuf {
        self.store.path().join("containers.json")
    }
}

fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn cli_version_exits_zero() {
    let output = Command::new(env!("CARGO_BIN_EXE_cairn"))
        .arg("--version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cairn"));
}

#[test]
fn cli_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_cairn"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["create", "destroy", "install-package", "configure", "merge"] {
        assert!(stdout.contains(command), "help must list '{command}'");
    }
}

#[test]
fn cli_unknown_flag_is_usage_error() {
    let sandbox = Sandbox::new();
    let output = sandbox.cairn(&["create", "--bogus"]);
    assert_eq!(exit_code(&output), 2);
}

#[test]
fn cli_empty_store_lists_nothing() {
    let sandbox = Sandbox::new();
    let rows = sandbox.json(&["list"]);
    assert_eq!(rows, serde_json::json!([]));

    let output = sandbox.cairn(&["update"]);
    assert_eq!(exit_code(&output), 2);
    assert!(stderr(&output).contains("no containers"));
}

#[test]
fn cli_create_then_list() {
    let sandbox = Sandbox::new();
    let created = sandbox.json(&["create", "-i", "work", "-n", "Work box"]);
    assert_eq!(created["id"], "work");

    let rows = sandbox.json(&["list"]);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], "work");
    assert_eq!(rows[0]["name"], "Work box");
    assert_eq!(rows[0]["type"], "lxd");
    assert_eq!(rows[0]["distro"], "jammy");
    assert_eq!(rows[0]["status"], "ready");
    assert_eq!(rows[0]["default"], false);
    assert!(sandbox.registry_file().exists());
}

#[test]
fn cli_config_supplies_create_defaults() {
    let sandbox = Sandbox::new();
    let dir = sandbox.config.path().join("cairn");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "default_type = \"chroot\"\ndefault_distro = \"focal\"\n",
    )
    .unwrap();

    sandbox.json(&["create", "-i", "old"]);
    sandbox.json(&["create", "-i", "new", "-t", "lxc", "-d", "noble"]);
    let rows = sandbox.json(&["list"]);
    assert_eq!(rows[0]["type"], "chroot");
    assert_eq!(rows[0]["distro"], "focal");
    assert_eq!(rows[1]["type"], "lxc");
    assert_eq!(rows[1]["distro"], "noble");
}

#[test]
fn cli_create_rejects_bad_id() {
    let sandbox = Sandbox::new();
    let output = sandbox.cairn(&["create", "-i", "Bad_Id"]);
    assert_eq!(exit_code(&output), 2, "stderr: {}", stderr(&output));
    assert!(!sandbox.registry_file().exists());
}

#[test]
fn cli_create_rejects_unknown_distro() {
    let sandbox = Sandbox::new();
    let output = sandbox.cairn(&["create", "-i", "old", "-d", "warty"]);
    assert_eq!(exit_code(&output), 2, "stderr: {}", stderr(&output));
}

#[test]
fn cli_duplicate_create_is_rejected() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "work"]);
    let output = sandbox.cairn(&["create", "-i", "work"]);
    assert_eq!(exit_code(&output), 2);
}

#[test]
fn cli_default_container_is_implicit_target() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "work"]);
    let output = sandbox.cairn(&["install-package", "vim"]);
    assert_eq!(exit_code(&output), 2, "a lone container is not a default");

    sandbox.json(&["set-default", "-i", "work"]);
    let installed = sandbox.json(&["install-package", "vim", "git"]);
    assert_eq!(installed["id"], "work");

    let apps = sandbox.json(&["list-apps"]);
    let names: Vec<&str> = apps
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["packageName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["vim", "git"]);
}

#[test]
fn cli_two_containers_need_an_id() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "alpha"]);
    sandbox.json(&["create", "-i", "beta"]);
    let output = sandbox.cairn(&["list-apps"]);
    assert_eq!(exit_code(&output), 2, "stderr: {}", stderr(&output));

    sandbox.json(&["set-default", "-i", "beta"]);
    let shown = sandbox.json(&["show-default"]);
    assert_eq!(shown["default"], "beta");
    let apps = sandbox.json(&["list-apps"]);
    assert_eq!(apps, serde_json::json!([]));
}

#[test]
fn cli_bind_mount_under_home() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "work"]);
    sandbox.json(&["set-default", "-i", "work"]);
    let applied = sandbox.json(&[
        "configure",
        "--bind-mount",
        "add",
        "--bind-mount-path",
        "/home/tester/docs/",
    ]);
    assert_eq!(applied["bind_mount"]["path"], "/home/tester/docs");

    let mounts = sandbox.json(&["list-bind-mounts"]);
    assert_eq!(mounts, serde_json::json!(["/home/tester/docs"]));
}

#[test]
fn cli_bind_mount_outside_home_is_rejected() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "work"]);
    sandbox.json(&["set-default", "-i", "work"]);
    let output = sandbox.cairn(&[
        "configure",
        "--bind-mount",
        "add",
        "--bind-mount-path",
        "/etc",
    ]);
    assert_eq!(exit_code(&output), 2, "stderr: {}", stderr(&output));
    let mounts = sandbox.json(&["list-bind-mounts"]);
    assert_eq!(mounts, serde_json::json!([]));
}

#[test]
fn cli_configure_without_settings_is_usage_error() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "work"]);
    let output = sandbox.cairn(&["configure", "-i", "work"]);
    assert_eq!(exit_code(&output), 2);
}

#[test]
fn cli_configure_reports_changes_saved_before_a_failure() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "work"]);
    sandbox.json(&["set-default", "-i", "work"]);

    // Multiarch is already disabled, so the second setting fails.
    let output = sandbox.cairn(&[
        "configure",
        "--archive",
        "add",
        "--archive-name",
        "ppa:a/b",
        "--multiarch",
        "disable",
    ]);
    assert_eq!(exit_code(&output), 1, "stderr: {}", stderr(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("added archive 'ppa:a/b'"));
    assert!(stderr(&output).contains("1 change(s) were saved"));

    let archives = sandbox.json(&["list-archives"]);
    assert_eq!(archives[0]["archiveName"], "ppa:a/b");
}

#[test]
fn cli_configure_first_setting_failure_is_usage_error() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "work"]);
    let output = sandbox.cairn(&["configure", "-i", "work", "--multiarch", "disable"]);
    assert_eq!(exit_code(&output), 2, "stderr: {}", stderr(&output));
}

#[test]
fn cli_clear_default_requires_yes_in_json_mode() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "work"]);
    sandbox.json(&["set-default", "-i", "work"]);

    let output = sandbox.cairn(&["clear-default", "--json"]);
    assert_eq!(exit_code(&output), 2, "stderr: {}", stderr(&output));
    assert_eq!(sandbox.json(&["show-default"])["default"], "work");

    sandbox.json(&["clear-default", "--yes"]);
    assert!(sandbox.json(&["show-default"])["default"].is_null());
}

#[test]
fn cli_destroy_removes_container() {
    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "work"]);
    let destroyed = sandbox.json(&["destroy", "-i", "work"]);
    assert_eq!(destroyed["destroyed"], true);
    assert_eq!(sandbox.json(&["list"]), serde_json::json!([]));
}

#[test]
fn cli_destroy_missing_container_is_usage_error() {
    let sandbox = Sandbox::new();
    let output = sandbox.cairn(&["destroy", "-i", "ghost"]);
    assert_eq!(exit_code(&output), 2);
}

#[test]
fn cli_corrupt_registry_is_store_error() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.registry_file(), "{ not json").unwrap();
    let output = sandbox.cairn(&["list"]);
    assert_eq!(exit_code(&output), 3);
    assert!(stderr(&output).contains("store error"));
}

#[test]
fn cli_merge_is_idempotent() {
    let source = Sandbox::new();
    source.json(&["create", "-i", "shared"]);

    let sandbox = Sandbox::new();
    sandbox.json(&["create", "-i", "local"]);
    let file = source.registry_file();
    let file = file.to_str().unwrap();

    assert_eq!(sandbox.json(&["merge", file])["added"], 1);
    assert_eq!(sandbox.json(&["merge", file])["added"], 0);
    assert_eq!(sandbox.json(&["list"]).as_array().unwrap().len(), 2);
}

#[test]
fn cli_fix_integrity_removes_interrupted_container() {
    let sandbox = Sandbox::new();
    write_registry(
        &sandbox.registry_file(),
        &serde_json::json!({
            "formatVersion": 1,
            "containerList": [
                {"id": "work", "name": "Work", "type": "lxd", "distro": "jammy",
                 "installStatus": "installing"},
                {"id": "dev", "name": "Dev", "type": "lxd", "distro": "jammy",
                 "installStatus": "ready"}
            ]
        }),
    );

    let report = sandbox.json(&["fix-integrity"]);
    assert_eq!(report["destroyed_containers"], serde_json::json!(["work"]));
    let rows = sandbox.json(&["list"]);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["id"], "dev");
}

#[test]
fn cli_completions_generate() {
    let output = Command::new(env!("CARGO_BIN_EXE_cairn"))
        .args(["completions", "bash"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cairn"));
}

fn write_registry(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}
