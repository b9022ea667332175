//! CLI tests that invoke the compiled `invsync` binary.

use assert_cmd::Command;
use predicates::prelude::*;

use invsync_test_utils::{RecordBuilder, TestWorkspace};

const MANIFEST: &str = r#"
[accounts.prod]
address = "http://127.0.0.1:1/api"
timeout_secs = 2
"#;

const RULES: &str = r#"
[[filter]]
name = "env only"
mode = "always"
outcomes = [{ action = "whitelist_attribute", attribute = "env" }]

[[action]]
name = "prod folder"
conditions = [
    { target = "attribute", name = { operator = "equal", needle = "env" }, value = { operator = "equal", needle = "prod" } },
]
outcomes = [{ action = "move_folder", folder = "/prod" }]
"#;

fn workspace() -> TestWorkspace {
    let ws = TestWorkspace::new();
    ws.write_manifest(MANIFEST);
    ws.write_rules(RULES);
    ws.add_record(
        &RecordBuilder::new("web01")
            .attribute("env", "prod")
            .attribute("rack", "r12")
            .build(),
    );
    ws
}

fn invsync(ws: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("invsync").unwrap();
    cmd.current_dir(ws.root()).env_remove("INVSYNC_CONFIG");
    cmd
}

#[test]
fn help_lists_commands() {
    Command::cargo_bin("invsync")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("debug"));
}

#[test]
fn no_command_prints_hint() {
    let ws = TestWorkspace::new();
    invsync(&ws)
        .assert()
        .success()
        .stdout(predicate::str::contains("invsync --help"));
}

#[test]
fn missing_config_fails() {
    let ws = TestWorkspace::new();
    invsync(&ws)
        .args(["run", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration not found"));
}

#[test]
fn unknown_account_fails() {
    let ws = workspace();
    invsync(&ws)
        .args(["debug", "staging", "web01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown account: staging"));
}

#[test]
fn debug_prints_trace_as_json() {
    let ws = workspace();
    let output = invsync(&ws)
        .args(["debug", "prod", "web01", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let trace: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(trace["key"], "web01");
    assert_eq!(trace["attributes"], serde_json::json!({ "env": "prod" }));
    assert_eq!(trace["outcome"]["folder"], "/prod");
}

#[test]
fn debug_prints_human_trace() {
    let ws = workspace();
    invsync(&ws)
        .args(["debug", "prod", "web01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("prod folder"))
        .stdout(predicate::str::contains("rack"));
}

#[test]
fn debug_unknown_record_fails() {
    let ws = workspace();
    invsync(&ws)
        .args(["debug", "prod", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Record not found: ghost"));
}

#[test]
fn unreachable_remote_reports_aborted_run() {
    let ws = workspace();
    let output = invsync(&ws)
        .args(["run", "prod", "--dry-run", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["success"], false);
    assert_eq!(report["dry_run"], true);
    assert!(
        report["errors"][0]
            .as_str()
            .unwrap()
            .starts_with("Run aborted")
    );
}

#[test]
fn config_flag_points_elsewhere() {
    let ws = workspace();
    let other = TestWorkspace::new();
    invsync(&other)
        .args(["debug", "prod", "web01", "--config"])
        .arg(ws.config_path())
        .assert()
        .success();
}
