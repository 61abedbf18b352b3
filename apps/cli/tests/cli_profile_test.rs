//! Integration tests for the `roricode profile` commands.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn roricode(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("roricode").unwrap();
    cmd.env("RORICODE_HOME", home.path()).env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn add_profile(home: &TempDir, name: &str, key: &str) {
    roricode(home)
        .args(["profile", "add", name, "--api-key", key])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Profile '{}' added successfully!", name)));
}

fn config_text(home: &TempDir) -> String {
    std::fs::read_to_string(home.path().join(".roricode").join("config.toml")).unwrap()
}

#[test]
fn test_list_creates_default_profile() {
    let home = TempDir::new().unwrap();

    roricode(&home)
        .args(["profile", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Active Profile: default"))
        .stdout(predicate::str::contains("API Key: No"));

    assert!(config_text(&home).contains("active_profile = \"default\""));
}

#[test]
fn test_add_activates_first_usable_profile() {
    let home = TempDir::new().unwrap();
    add_profile(&home, "work", "sk-test-1234");

    roricode(&home)
        .args(["profile", "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "work""#))
        .stdout(predicate::str::contains(r#""has_api_key": true"#));

    assert!(config_text(&home).contains("active_profile = \"work\""));
}

#[test]
fn test_add_duplicate_fails() {
    let home = TempDir::new().unwrap();
    add_profile(&home, "work", "sk-test-1234");

    roricode(&home)
        .args(["profile", "add", "work", "--api-key", "other"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile 'work' already exists"));
}

#[test]
fn test_show_masks_api_key() {
    let home = TempDir::new().unwrap();
    add_profile(&home, "work", "sk-test-1234");

    roricode(&home)
        .args(["profile", "show", "work"])
        .assert()
        .success()
        .stdout(predicate::str::contains("********1234"))
        .stdout(predicate::str::contains("sk-test").not())
        .stdout(predicate::str::contains("Base URL: https://api.openai.com/v1 (default)"));
}

#[test]
fn test_show_unknown_profile_fails() {
    let home = TempDir::new().unwrap();

    roricode(&home)
        .args(["profile", "show", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile 'missing' not found"));
}

#[test]
fn test_edit_with_flags() {
    let home = TempDir::new().unwrap();
    add_profile(&home, "work", "sk-test-1234");

    roricode(&home)
        .args(["profile", "edit", "work", "--model", "gpt-4o", "--base-url", "http://localhost:8080/v1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile 'work' updated successfully!"));

    roricode(&home)
        .args(["profile", "show", "work"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Model: gpt-4o"))
        .stdout(predicate::str::contains("Base URL: http://localhost:8080/v1"));
}

#[test]
fn test_switch_and_delete() {
    let home = TempDir::new().unwrap();
    add_profile(&home, "work", "sk-work");
    add_profile(&home, "home", "sk-home");

    roricode(&home)
        .args(["profile", "switch", "home"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Switched to profile 'home'"));

    roricode(&home)
        .args(["profile", "delete", "home", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Profile 'home' deleted successfully!"))
        .stdout(predicate::str::contains("Active profile is now 'default'"));

    assert!(!config_text(&home).contains("[profiles.home]"));
}

#[test]
fn test_delete_last_profile_is_rejected() {
    let home = TempDir::new().unwrap();

    roricode(&home)
        .args(["profile", "delete", "default", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("it is the only profile"));
}

#[test]
fn test_switch_unknown_profile_fails() {
    let home = TempDir::new().unwrap();

    roricode(&home)
        .args(["profile", "switch", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Profile 'nowhere' not found"));
}
