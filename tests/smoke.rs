//! Smoke tests -- verify the binary runs and each subcommand responds.

use assert_cmd::Command;
use predicates::prelude::*;

fn bbtest() -> Command {
    let mut cmd = Command::cargo_bin("bbtest").unwrap();
    cmd.env_remove("BBTEST_CONFIG").env("RUST_LOG", "error");
    cmd
}

#[test]
fn test_cli_help() {
    bbtest()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("throughput tests driven by bbcp"));
}

#[test]
fn test_cli_version() {
    bbtest()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bbtest"));
}

#[test]
fn test_run_subcommand_exists() {
    bbtest().args(["run", "--help"]).assert().success();
}

#[test]
fn test_negotiate_reverse() {
    bbtest()
        .args([
            "negotiate",
            "--src-listen",
            "50000-50100",
            "--snk-listen",
            "none",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("reverse (-z)"))
        .stdout(predicate::str::contains("--port 50000:50100"));
}

#[test]
fn test_negotiate_rejects_malformed_range() {
    bbtest()
        .args(["negotiate", "--src-listen", "lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid port range"));
}

#[test]
fn test_negotiate_json() {
    bbtest()
        .args(["negotiate", "--snk-listen", "40000:50050", "--src-connect", "50000-50100", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"port_flag\": \"50000:50050\""))
        .stdout(predicate::str::contains("\"reverse\": false"));
}

#[test]
fn test_parse_from_stdin() {
    bbtest()
        .args(["parse", "--date", "2024-06-30"])
        .write_stdin("banner\nbbcp: 1234 01:02:03 50% done; 12.5 MB/s\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("2024-06-30 01:02:03"))
        .stdout(predicate::str::contains("12.500 MB/s"));
}

#[test]
fn test_parse_unknown_unit_fails() {
    bbtest()
        .args(["parse", "--date", "2024-06-30"])
        .write_stdin("bbcp: 1234 01:02:03 50% done; 12.5 TB/s\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized bandwidth unit 'TB'"));
}

#[test]
fn test_bdp() {
    bbtest()
        .args(["bdp", "--bandwidth", "1000000000", "--delay", "0.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("62500000 bytes"));
}
