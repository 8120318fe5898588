//! CLI integration tests for the shiny command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Config discovery and explicit config files are honored
//! - Session commands operate on a temporary store

use std::path::Path;

use assert_cmd::Command;
use chrono::{TimeDelta, Utc};
use predicates::prelude::*;
use shiny_session::{SessionData, UserKey};
use shiny_store::SqliteBackend;
use tempfile::TempDir;

/// Get a command for the shiny binary, isolated from the host's config.
fn shiny(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shiny").unwrap();
    cmd.current_dir(home.path())
        .env("SHINY_CONFIG_DIR", home.path().join("config"))
        .env_remove("SHINY_CONFIG")
        .env_remove("SHINY_DB")
        .env_remove("RUST_LOG");
    cmd
}

fn seed(db: &Path, id: &str, user: Option<&str>, idle: TimeDelta) {
    let store = SqliteBackend::open(db).unwrap();
    let mut data = SessionData::new(Utc::now() - idle);
    data.user = user.map(UserKey::from);
    store.save(id, &data).unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let home = TempDir::new().unwrap();
    shiny(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("session store"));
}

#[test]
fn test_version_displays() {
    let home = TempDir::new().unwrap();
    shiny(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shiny"));
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    shiny(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("sessions"));
}

#[test]
fn test_sessions_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    shiny(&home)
        .args(["sessions", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("touch"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("prune"));
}

#[test]
fn test_invalid_subcommand() {
    let home = TempDir::new().unwrap();
    shiny(&home)
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_touch_requires_ids() {
    let home = TempDir::new().unwrap();
    shiny(&home).args(["sessions", "touch"]).assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults() {
    let home = TempDir::new().unwrap();
    shiny(&home)
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1048576"));
}

#[test]
fn test_config_show_explicit_file() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("custom.toml");
    std::fs::write(&path, "[cache]\ncapacity = 7\nexpiry_secs = 90\n").unwrap();

    shiny(&home)
        .args(["--json", "--config"])
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"capacity\": 7"))
        .stdout(predicate::str::contains("\"expiry_secs\": 90"));
}

#[test]
fn test_config_show_project_file() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("shiny.toml"), "[cache]\ncapacity = -1\n").unwrap();

    shiny(&home)
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"capacity\": -1"));
}

#[test]
fn test_config_missing_explicit_file_fails() {
    let home = TempDir::new().unwrap();
    shiny(&home)
        .args(["--config", "does-not-exist.toml", "config", "show"])
        .assert()
        .failure();
}

#[test]
fn test_config_init_local_then_which() {
    let home = TempDir::new().unwrap();
    shiny(&home)
        .args(["config", "init", "--local"])
        .assert()
        .success();
    assert!(home.path().join("shiny.toml").is_file());

    shiny(&home)
        .args(["config", "which"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shiny.toml"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_sessions_list_empty() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("sessions.db");

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored sessions"));
}

#[test]
fn test_sessions_list_and_filter_by_user() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("sessions.db");
    seed(&db, "sess-a", Some("alice"), TimeDelta::zero());
    seed(&db, "sess-b", Some("bob"), TimeDelta::zero());

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["--json", "sessions", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sess-a"))
        .stdout(predicate::str::contains("sess-b"));

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["sessions", "list", "--user", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sess-a"))
        .stdout(predicate::str::contains("sess-b").not());
}

#[test]
fn test_sessions_list_by_user_honors_limit() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("sessions.db");
    for id in ["sess-a", "sess-b", "sess-c"] {
        seed(&db, id, Some("alice"), TimeDelta::zero());
    }

    let output = shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["--json", "sessions", "list", "--user", "alice", "--limit", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let ids: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(ids, vec!["sess-a", "sess-b"]);

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["sessions", "list", "--user", "alice", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sess-a"))
        .stdout(predicate::str::contains("sess-b").not());
}

#[test]
fn test_sessions_show() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("sessions.db");
    seed(&db, "sess-a", Some("alice"), TimeDelta::zero());

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["--json", "sessions", "show", "sess-a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"sess-a\""))
        .stdout(predicate::str::contains("alice"));
}

#[test]
fn test_sessions_show_missing() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("sessions.db");

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["sessions", "show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session not found"));
}

#[test]
fn test_sessions_touch_refreshes_last_access() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("sessions.db");
    seed(&db, "sess-a", None, TimeDelta::days(3));

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["--json", "sessions", "touch", "sess-a", "ghost"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"touched\": 1"))
        .stdout(predicate::str::contains("ghost"));

    let store = SqliteBackend::open(&db).unwrap();
    let data = store.load("sess-a").unwrap().unwrap();
    assert!(Utc::now() - data.last_access < TimeDelta::hours(1));
}

#[test]
fn test_sessions_delete() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("sessions.db");
    seed(&db, "sess-a", None, TimeDelta::zero());

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["sessions", "delete", "sess-a"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted sess-a"));

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["sessions", "delete", "sess-a"])
        .assert()
        .failure();
}

#[test]
fn test_sessions_prune_idle() {
    let home = TempDir::new().unwrap();
    let db = home.path().join("sessions.db");
    seed(&db, "stale", None, TimeDelta::days(2));
    seed(&db, "fresh", None, TimeDelta::zero());

    shiny(&home)
        .arg("--db")
        .arg(&db)
        .args(["--json", "sessions", "prune", "--idle-secs", "3600"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"removed\":1"));

    let store = SqliteBackend::open(&db).unwrap();
    assert!(store.load("stale").unwrap().is_none());
    assert!(store.load("fresh").unwrap().is_some());
}
