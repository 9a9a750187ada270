use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("whisper")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("locations"))
        .stdout(predicate::str::contains("users"))
        .stdout(predicate::str::contains("grant"))
        .stdout(predicate::str::contains("revoke"))
        .stdout(predicate::str::contains("notify"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_locations_help_shows_subcommands() {
    cargo_bin_cmd!("whisper")
        .args(["locations", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("add"))
        .stdout(predicate::str::contains("remove"));
}

#[test]
fn test_notify_requires_target() {
    cargo_bin_cmd!("whisper")
        .arg("notify")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--user"));
}

#[test]
fn test_version_flag() {
    cargo_bin_cmd!("whisper")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1"));
}
