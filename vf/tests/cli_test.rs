//! CLI tests for the `vf` binary
//!
//! Every run points storage and logs into a temp dir, so nothing touches the
//! user's real data. None of these commands reach the network.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn vf(home: &TempDir) -> Command {
    let config = home.path().join("visionflow.yml");
    std::fs::write(
        &config,
        format!(
            "api:\n  base-url: http://127.0.0.1:9\nstorage:\n  path: {}\n",
            home.path().join("slots").display()
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("vf").unwrap();
    cmd.env("XDG_DATA_HOME", home.path().join("data"))
        .env("HOME", home.path())
        .env_remove("VISIONFLOW_BACKEND_URL")
        .arg("--config")
        .arg(config);
    cmd
}

#[test]
fn test_settings_show_prints_defaults() {
    let home = TempDir::new().unwrap();
    vf(&home)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("confidenceThreshold: 0.5"))
        .stdout(predicate::str::contains("exportFormat: json"));
}

#[test]
fn test_settings_set_persists_between_runs() {
    let home = TempDir::new().unwrap();
    vf(&home)
        .args(["settings", "set", "--confidence", "0.8", "--theme", "light"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Settings saved successfully"));

    vf(&home)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("confidenceThreshold: 0.8"))
        .stdout(predicate::str::contains("theme: light"));
}

#[test]
fn test_upload_rejects_unsupported_format() {
    let home = TempDir::new().unwrap();
    let file = home.path().join("installer.exe");
    std::fs::write(&file, b"MZ").unwrap();

    vf(&home)
        .arg("upload")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file format: installer.exe"));

    vf(&home)
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No items uploaded"));
}

#[test]
fn test_show_unknown_item_fails() {
    let home = TempDir::new().unwrap();
    vf(&home)
        .args(["show", "missing-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Item not found"));
}

#[test]
fn test_reset_requires_confirmation() {
    let home = TempDir::new().unwrap();
    vf(&home)
        .arg("reset")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
}
