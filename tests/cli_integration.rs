//! Integration tests for the credvault CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Interactive prompts are avoided: values are passed as arguments or
//! piped on stdin, and destructive commands use `--force`.

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;

/// 32 zero bytes, base64 encoded.
const TEST_KEY: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

/// Helper: get a Command pointing at the credvault binary.
fn credvault() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("credvault").expect("binary should exist")
}

/// Helper: a command running inside `dir` with a fixed key and actor.
fn credvault_in(dir: &TempDir) -> Command {
    let mut cmd = credvault();
    cmd.current_dir(dir.path())
        .env("CREDVAULT_ENCRYPTION_KEY", TEST_KEY)
        .env("CREDVAULT_ACTOR", "ci")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_flag_shows_usage() {
    credvault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Encrypted credential store with rotation and validation",
        ))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("rotate"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("keygen"));
}

#[test]
fn version_flag_shows_version() {
    credvault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("credvault"));
}

#[test]
fn no_args_shows_help() {
    // Running with no subcommand should show an error or help.
    credvault()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn keygen_prints_a_usable_key() {
    let output = credvault().arg("keygen").output().unwrap();
    assert!(output.status.success());

    let key = String::from_utf8(output.stdout).unwrap();
    let key = key.trim();
    assert_eq!(key.len(), 44);
    assert!(credvault::crypto::EncryptionKey::from_base64(key).is_ok());
}

#[test]
fn set_without_key_fails() {
    let tmp = TempDir::new().unwrap();
    credvault()
        .current_dir(tmp.path())
        .env_remove("CREDVAULT_ENCRYPTION_KEY")
        .args(["set", "db-pass", "hunter2-hunter2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no encryption key"));
}

#[test]
fn set_then_get_roundtrip() {
    let tmp = TempDir::new().unwrap();

    credvault_in(&tmp)
        .args(["set", "stripe-api", "sk-live-0123456789abcdefghij", "--tag", "prod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stripe-api"))
        .stdout(predicate::str::contains("encrypted at rest"));

    credvault_in(&tmp)
        .args(["get", "stripe-api"])
        .assert()
        .success()
        .stdout("sk-live-0123456789abcdefghij\n");

    // The record on disk never holds the plaintext.
    let record = tmp
        .path()
        .join(".credvault/records/credvault/credvault-creds-stripe-api.json");
    let on_disk = std::fs::read_to_string(record).unwrap();
    assert!(!on_disk.contains("sk-live-0123456789abcdefghij"));
}

#[test]
fn set_reads_piped_value() {
    let tmp = TempDir::new().unwrap();

    credvault_in(&tmp)
        .args(["set", "db-pass", "--type", "password"])
        .write_stdin("piped-password-value\n")
        .assert()
        .success();

    credvault_in(&tmp)
        .args(["get", "db-pass", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"value\": \"piped-password-value\""))
        .stdout(predicate::str::contains("\"type\": \"password\""));
}

#[test]
fn set_twice_conflicts() {
    let tmp = TempDir::new().unwrap();
    credvault_in(&tmp)
        .args(["set", "dup", "first-value-first-value"])
        .assert()
        .success();
    credvault_in(&tmp)
        .args(["set", "dup", "second-value-second-value"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn list_hides_values() {
    let tmp = TempDir::new().unwrap();
    credvault_in(&tmp)
        .args(["set", "api", "sk-live-0123456789abcdefghij"])
        .assert()
        .success();

    credvault_in(&tmp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("api"))
        .stdout(predicate::str::contains("sk-live").not());
}

#[test]
fn rotate_shows_up_in_history_and_audit() {
    let tmp = TempDir::new().unwrap();
    credvault_in(&tmp)
        .args(["set", "db", "original-password"])
        .assert()
        .success();

    credvault_in(&tmp)
        .args(["rotate", "db", "rotated-password"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Rotated credential 'db'"));

    credvault_in(&tmp)
        .args(["get", "db"])
        .assert()
        .success()
        .stdout("rotated-password\n");

    credvault_in(&tmp)
        .args(["history", "db"])
        .assert()
        .success()
        .stdout(predicate::str::contains("create"))
        .stdout(predicate::str::contains("rotate"))
        .stdout(predicate::str::contains("manual"));

    credvault_in(&tmp)
        .args(["audit", "--last", "20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rotate_success"))
        .stdout(predicate::str::contains("ci"));
}

#[test]
fn delete_then_get_fails() {
    let tmp = TempDir::new().unwrap();
    credvault_in(&tmp)
        .args(["set", "tmp-token", "Bearer abcdef"])
        .assert()
        .success();

    credvault_in(&tmp)
        .args(["delete", "tmp-token", "--force"])
        .assert()
        .success();

    credvault_in(&tmp)
        .args(["get", "tmp-token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn validate_reports_score() {
    let tmp = TempDir::new().unwrap();
    credvault_in(&tmp)
        .args(["set", "short", "abc", "--expires-in", "3d"])
        .assert()
        .success();

    credvault_in(&tmp)
        .args(["validate", "short"])
        .assert()
        .success()
        .stdout(predicate::str::contains("score"))
        .stderr(predicate::str::contains("too short"))
        .stderr(predicate::str::contains("expires within 7 days"));
}

#[test]
fn invalid_type_rejected() {
    let tmp = TempDir::new().unwrap();
    credvault_in(&tmp)
        .args(["set", "x", "value", "--type", "ssh_key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown credential type"));
}

#[test]
fn data_dir_flag_is_respected() {
    let tmp = TempDir::new().unwrap();
    credvault_in(&tmp)
        .args(["--data-dir", "vault-data", "set", "k", "some-long-value-here"])
        .assert()
        .success();
    assert!(tmp.path().join("vault-data/records").is_dir());
}
