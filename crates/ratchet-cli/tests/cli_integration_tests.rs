//! CLI integration tests
//!
//! Drives the `ratchet` binary end to end against throwaway project
//! directories.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

/// Path to the compiled ratchet binary (resolved at compile time)
fn ratchet_bin() -> String {
    env!("CARGO_BIN_EXE_ratchet").to_string()
}

fn ratchet(dir: &Path, args: &[&str]) -> Output {
    Command::new(ratchet_bin())
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run ratchet")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "ratchet failed.\nstdout: {}\nstderr: {}",
        stdout(output),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn project_with_two_migrations() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let migrations = dir.path().join("migrations");
    fs::create_dir_all(&migrations).unwrap();
    fs::write(
        migrations.join("001_accounts.sql"),
        "CREATE TABLE accounts (id INTEGER PRIMARY KEY, name TEXT);",
    )
    .unwrap();
    fs::write(
        migrations.join("002_seed.sql"),
        "INSERT INTO accounts VALUES (1, 'root');",
    )
    .unwrap();
    dir
}

// ── ratchet migrate ─────────────────────────────────────────────────────

#[test]
fn test_migrate_then_noop() {
    let dir = project_with_two_migrations();

    let first = ratchet(dir.path(), &["migrate"]);
    assert_success(&first);
    assert!(stdout(&first).contains("from version 0 to 2"), "{}", stdout(&first));

    let second = ratchet(dir.path(), &["migrate"]);
    assert_success(&second);
    assert!(stdout(&second).contains("already at version 2"), "{}", stdout(&second));
}

#[test]
fn test_migrate_duckdb_from_flags() {
    let dir = project_with_two_migrations();
    fs::write(dir.path().join("ratchet.yml"), "version_store: table\n").unwrap();

    let output = ratchet(
        dir.path(),
        &["migrate", "--backend", "duckdb", "--database", "app.duckdb"],
    );

    assert_success(&output);
    assert!(dir.path().join("app.duckdb").exists());
}

#[test]
fn test_native_store_on_duckdb_fails() {
    let dir = project_with_two_migrations();

    let output = ratchet(dir.path(), &["migrate", "--backend", "duckdb"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("requires the sqlite backend"), "{stderr}");
}

#[test]
fn test_failing_migration_exits_nonzero() {
    let dir = project_with_two_migrations();
    fs::write(
        dir.path().join("migrations/003_broken.sql"),
        "INSERT INTO missing_table VALUES (1);",
    )
    .unwrap();

    let output = ratchet(dir.path(), &["migrate"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Migration failed"), "{stderr}");

    // Nothing from the failed run is kept
    let status = ratchet(dir.path(), &["status", "--output", "json"]);
    assert_success(&status);
    let report: serde_json::Value = serde_json::from_slice(&status.stdout).unwrap();
    assert_eq!(report["database_version"], 0);
}

// ── ratchet status ──────────────────────────────────────────────────────

#[test]
fn test_status_json_after_partial_migrate() {
    let dir = project_with_two_migrations();
    assert_success(&ratchet(dir.path(), &["migrate", "--target", "1"]));

    let output = ratchet(dir.path(), &["status", "-o", "json"]);

    assert_success(&output);
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["database_version"], 1);
    assert_eq!(report["application_version"], 2);
    assert_eq!(report["state"], "pending");
    assert_eq!(report["pending"][0]["name"], "seed");
}

#[test]
fn test_status_text() {
    let dir = project_with_two_migrations();

    let output = ratchet(dir.path(), &["status"]);

    assert_success(&output);
    let text = stdout(&output);
    assert!(text.contains("2 pending migrations"), "{text}");
    assert!(text.contains("001  accounts"), "{text}");
}

// ── ratchet new ─────────────────────────────────────────────────────────

#[test]
fn test_new_scaffolds_next_file() {
    let dir = project_with_two_migrations();

    let output = ratchet(dir.path(), &["new", "add email"]);

    assert_success(&output);
    assert!(dir.path().join("migrations/003_add_email.sql").exists());
}

#[test]
fn test_unknown_config_key_fails() {
    let dir = project_with_two_migrations();
    fs::write(dir.path().join("ratchet.yml"), "databse:\n  path: x.db\n").unwrap();

    let output = ratchet(dir.path(), &["status"]);

    assert!(!output.status.success());
}
