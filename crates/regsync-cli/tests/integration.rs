#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn regsync(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("regsync").unwrap();
    cmd.current_dir(dir.path())
        .env("REGSYNC_CONFIG", dir.path().join("config.json"))
        .env_remove("MANTIS_TOKEN")
        .env_remove("GS_ACCESS_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &TempDir, json: serde_json::Value) {
    std::fs::write(
        dir.path().join("config.json"),
        serde_json::to_string_pretty(&json).unwrap(),
    )
    .unwrap();
}

// ---------------------------------------------------------------------------
// regsync config
// ---------------------------------------------------------------------------

#[test]
fn config_set_creates_file_and_get_reads_it_back() {
    let dir = TempDir::new().unwrap();
    regsync(&dir)
        .args(["config", "set", "REGRESSION_FILTER_ID", "1234"])
        .assert()
        .success();

    regsync(&dir)
        .args(["config", "get", "REGRESSION_FILTER_ID"])
        .assert()
        .success()
        .stdout("1234\n");

    let raw = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["REGRESSION_FILTER_ID"], "1234");
}

#[test]
fn config_set_interval_is_numeric() {
    let dir = TempDir::new().unwrap();
    regsync(&dir)
        .args(["config", "set", "JOB_INTERVAL_MINUTES", "15"])
        .assert()
        .success();
    regsync(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"JOB_INTERVAL_MINUTES\": 15"));

    regsync(&dir)
        .args(["config", "set", "JOB_INTERVAL_MINUTES", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn config_get_missing_key_fails() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, serde_json::json!({}));
    regsync(&dir)
        .args(["config", "get", "REGRESSION_SHEET_KEY"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not set"));
}

#[test]
fn config_show_without_file_fails() {
    let dir = TempDir::new().unwrap();
    regsync(&dir)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn config_flag_overrides_env() {
    let dir = TempDir::new().unwrap();
    let other = dir.path().join("other.json");
    regsync(&dir)
        .args(["--config", other.to_str().unwrap()])
        .args(["config", "set", "MANTIS_TICKETS_NEXUS_E6", "Nexus E6"])
        .assert()
        .success();
    assert!(other.exists());
    assert!(!dir.path().join("config.json").exists());
}

// ---------------------------------------------------------------------------
// regsync run
// ---------------------------------------------------------------------------

#[test]
fn run_without_filter_fails_and_writes_daily_log() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        serde_json::json!({
            "MANTIS_PATH": "http://127.0.0.1:9",
            "REGRESSION_SHEET_KEY": "sheet",
            "MANTIS_TICKETS_NEXUS_E6": "Progress",
            "SHEETS_API_BASE": "http://127.0.0.1:9",
            "LOG_DIR": "logs"
        }),
    );

    regsync(&dir)
        .env("MANTIS_TOKEN", "t")
        .env("GS_ACCESS_TOKEN", "g")
        .args(["run", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"status\": \"failed\""))
        .stderr(predicate::str::contains("REGRESSION_FILTER_ID"));

    let logs: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("regression_progress_"));
    assert!(logs[0].ends_with(".log"));
}

#[test]
fn run_without_tokens_fails() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        serde_json::json!({
            "MANTIS_PATH": "http://127.0.0.1:9",
            "REGRESSION_FILTER_ID": "1",
            "LOG_DIR": "logs"
        }),
    );

    regsync(&dir)
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("outcome   failed"))
        .stderr(predicate::str::contains("MANTIS_TOKEN"));
}
