use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn botflow() -> Command {
    assert_cmd::cargo::cargo_bin_cmd!("botflow")
}

#[test]
fn validate_accepts_demo_spec() {
    botflow()
        .arg("validate")
        .arg(fixture("demo.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("ok (0 warning(s))"));
}

#[test]
fn validate_reports_errors_and_fails() {
    botflow()
        .arg("validate")
        .arg(fixture("broken.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("no_steps"))
        .stderr(predicate::str::contains("duplicate_entry_cmd"))
        .stderr(predicate::str::contains("invalid_var"));
}

#[test]
fn validate_json_prints_report() {
    let output = botflow()
        .args(["validate", "--json"])
        .arg(fixture("broken.json"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["issues"].as_array().unwrap().len() >= 3);
}

#[test]
fn validate_rejects_unparseable_file() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("spec.json");
    fs::write(&path, "{ not json").unwrap();
    botflow()
        .arg("validate")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn chat_runs_wizard_from_stdin() {
    botflow()
        .arg("chat")
        .arg(fixture("demo.json"))
        .write_stdin("hello\n/signup\nAda\nforty\n42\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hi there"))
        .stdout(predicate::str::contains("Your name?"))
        .stdout(predicate::str::contains("Digits only"))
        .stdout(predicate::str::contains("Welcome Ada (42)"));
}

#[test]
fn chat_prints_keyboards_and_ignores_foreign_callbacks() {
    botflow()
        .arg("chat")
        .arg(fixture("demo.json"))
        .write_stdin("/start\ncb signup\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("[menu.title]"))
        .stdout(predicate::str::contains("[Sign up -> signup]"))
        .stdout(predicate::str::contains("(no reply)"));
}

#[test]
fn chat_uses_catalog_for_user_locale() {
    let temp = tempfile::TempDir::new().unwrap();
    let catalog = temp.path().join("de.json");
    fs::write(&catalog, r#"{"menu.title": "Hauptmenü"}"#).unwrap();

    botflow()
        .arg("chat")
        .arg(fixture("demo.json"))
        .args(["--locale", "de-DE"])
        .arg("--catalog")
        .arg(format!("de={}", catalog.display()))
        .write_stdin("/start\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hauptmenü"));
}

#[test]
fn chat_rejects_invalid_config() {
    let temp = tempfile::TempDir::new().unwrap();
    let config = temp.path().join("engine.toml");
    fs::write(&config, "sql_row_cap = 0\n").unwrap();

    botflow()
        .arg("chat")
        .arg(fixture("demo.json"))
        .arg("--config")
        .arg(&config)
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}
