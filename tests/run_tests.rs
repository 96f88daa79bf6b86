//! End-to-end run against a stand-in bbcp script.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;

use bbtest::negotiate::{Node, PortRange};
use bbtest::throughput::{run_test, TestParams};

const FAKE_BBCP: &str = r#"#!/bin/sh
printf '%s\n' "$*" > "$(dirname "$0")/args.txt"
echo "bbcp: Creating /dev/null" >&2
echo "bbcp: 4242 10:00:02 0% done; 100.0 MB/s"
echo "bbcp: 4242 10:00:04 0% done; 2.0 GB/s" >&2
echo "unrelated chatter"
echo "bbcp: 4242 10:00:06 0% done; 1024 KB/s"
exit 3
"#;

#[test]
fn test_run_collects_stdout_and_stderr_progress() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("bbcp");
    std::fs::write(&script, FAKE_BBCP).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let local = Node::local(PortRange::Forbidden, PortRange::Unrestricted);
    let remote = Node::remote(
        "far.example",
        PortRange::bounded(50000, 50100).unwrap(),
        PortRange::Unrestricted,
    );
    let params = TestParams {
        program: script.to_string_lossy().into_owned(),
        streams: 2,
        ..TestParams::default()
    };

    let run = run_test(&remote, &local, &params).unwrap();

    let rates: Vec<f64> = run.samples.iter().map(|s| s.rate_mbps).collect();
    assert_eq!(rates, vec![100.0, 2048.0, 1.0]);
    assert_eq!(run.exit_code, Some(3));
    assert!(run.decision.reverse);
    assert_eq!(run.src, "far.example");
    assert_eq!(run.snk, "localhost");

    let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
    assert_eq!(
        args.trim(),
        "-P 2 -t 10 -s 2 --port 50000:50100 -z far.example:/dev/zero /dev/null"
    );
}
