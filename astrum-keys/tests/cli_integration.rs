//! CLI integration tests for astrum-keys

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated config file and data directory
struct TestEnv {
    _temp_dir: TempDir,
    config_path: PathBuf,
    data_dir: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();

        let config_path = temp_dir.path().join("config.toml");
        let escape = |p: &PathBuf| p.to_string_lossy().replace('\\', "\\\\");
        fs::write(
            &config_path,
            format!(
                "[database]\npath = \"{}\"\n\n[storage]\ndata_dir = \"{}\"\n",
                escape(&data_dir.join("astrum.db")),
                escape(&data_dir)
            ),
        )
        .unwrap();

        Self {
            _temp_dir: temp_dir,
            config_path,
            data_dir,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("astrum-keys").unwrap();
        cmd.env("ASTRUM_CONFIG", &self.config_path);
        cmd.env_remove("ASTRUM_DATA_DIR");
        cmd.env_remove("ASTRUM_DB_PATH");
        cmd
    }

    fn credentials(&self) -> serde_json::Value {
        let text = fs::read_to_string(self.data_dir.join("credentials.json")).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

#[test]
fn test_status_json_on_empty_store() {
    let env = TestEnv::new();
    let output = env
        .cmd()
        .args(["status", "--format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["platforms"]["devto"], false);
    assert_eq!(status["dropbox"], false);
    assert_eq!(status["ai"][0]["configured"], false);
}

#[test]
fn test_status_text_names_missing_fields() {
    let env = TestEnv::new();
    env.cmd()
        .args(["set", "twitter.bearerToken", "bearer"])
        .assert()
        .success();

    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("missing apiKey, apiKeySecret"))
        .stdout(predicate::str::contains("missing token"));
}

#[test]
fn test_set_secret_from_stdin_is_masked() {
    let env = TestEnv::new();
    env.cmd()
        .args(["set", "devto.apiKey", "--stdin"])
        .write_stdin("dev-secret-1234\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("****1234"))
        .stdout(predicate::str::contains("dev-secret").not());

    assert_eq!(env.credentials()["devto"]["apiKey"], "dev-secret-1234");

    env.cmd()
        .args(["get", "devto.apiKey"])
        .assert()
        .success()
        .stdout("****1234\n");
    env.cmd()
        .args(["get", "devto.apiKey", "--reveal"])
        .assert()
        .success()
        .stdout("dev-secret-1234\n");
}

#[test]
fn test_refuses_non_interactive_overwrite_without_force() {
    let env = TestEnv::new();
    env.cmd()
        .args(["set", "hashnode.token", "first"])
        .assert()
        .success();

    env.cmd()
        .args(["set", "hashnode.token", "--stdin"])
        .write_stdin("second")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    env.cmd()
        .args(["set", "hashnode.token", "second", "--force"])
        .assert()
        .success();
    assert_eq!(env.credentials()["hashnode"]["token"], "second");
}

#[test]
fn test_unknown_field_is_invalid_input() {
    let env = TestEnv::new();
    env.cmd()
        .args(["set", "myspace.password", "hunter2"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Unknown credential field"));
}

#[test]
fn test_counter_fields_are_plain() {
    let env = TestEnv::new();
    env.cmd()
        .args(["set", "openai.dailyLimit", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("openai.dailyLimit = 200"));

    env.cmd()
        .args(["get", "openai.dailyLimit"])
        .assert()
        .success()
        .stdout("200\n");

    env.cmd()
        .args(["set", "openai.dailyLimit", "lots"])
        .assert()
        .code(3);
}

#[test]
fn test_reset_usage() {
    let env = TestEnv::new();
    env.cmd()
        .args(["set", "gemini.usageCount", "42"])
        .assert()
        .success();

    env.cmd().arg("reset-usage").assert().success();
    assert_eq!(env.credentials()["gemini"]["usageCount"], 0);
}
