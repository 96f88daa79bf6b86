//! Throughput testing engine: negotiate ports, drive bbcp, collect progress.

pub mod bbcp;
pub mod progress;
pub mod report;

use std::io::BufReader;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::negotiate::{negotiate, Decision, Node};
use progress::{ProgressError, ProgressSample, ProgressStream};

pub const DEFAULT_TEST_TIME_SECS: u32 = 10;
pub const DEFAULT_STREAMS: u32 = 1;

#[derive(Debug, Error)]
pub enum ThroughputError {
    #[error("bbcp not found at {path}")]
    BbcpNotFound { path: String },

    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no usable port range from {src} to {snk} (negotiated: {ports})")]
    NoUsablePorts {
        src: String,
        snk: String,
        ports: String,
    },

    #[error("bbcp output could not be parsed: {0}")]
    Progress(#[from] ProgressError),

    #[error("I/O error while running bbcp: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters for a single bbcp transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestParams {
    /// bbcp executable.
    pub program: String,
    /// Seconds between progress reports (`-P`).
    pub progress_interval_secs: u32,
    /// Transfer time limit in seconds (`-t`).
    pub timeout_secs: u32,
    /// Number of parallel TCP streams (`-s`).
    pub streams: u32,
    pub source_path: String,
    pub sink_path: String,
    pub username: Option<String>,
    /// Refuse to start when negotiation finds no usable port range.
    pub require_usable_ports: bool,
}

impl Default for TestParams {
    fn default() -> Self {
        Self {
            program: "bbcp".to_string(),
            progress_interval_secs: 2,
            timeout_secs: DEFAULT_TEST_TIME_SECS,
            streams: DEFAULT_STREAMS,
            source_path: "/dev/zero".to_string(),
            sink_path: "/dev/null".to_string(),
            username: None,
            require_usable_ports: false,
        }
    }
}

/// Outcome of one bbcp transfer.
#[derive(Debug, Clone, Serialize)]
pub struct TestRun {
    pub src: String,
    pub snk: String,
    pub streams: u32,
    pub decision: Decision,
    pub command: Vec<String>,
    pub samples: Vec<ProgressSample>,
    /// `None` when bbcp was killed by a signal.
    pub exit_code: Option<i32>,
}

/// Run one transfer from `src` to `snk` and collect its progress samples.
pub fn run_test(src: &Node, snk: &Node, params: &TestParams) -> Result<TestRun, ThroughputError> {
    let decision = negotiate(src, snk);

    if !decision.has_usable_ports() {
        warn!(
            src = src.label(),
            snk = snk.label(),
            ports = %decision.ports,
            reverse = decision.reverse,
            "no usable port range between nodes"
        );
        if params.require_usable_ports {
            return Err(ThroughputError::NoUsablePorts {
                src: src.label().to_string(),
                snk: snk.label().to_string(),
                ports: decision.ports.to_string(),
            });
        }
    }

    let args = bbcp::command_args(&decision, params, src, snk);
    let mut command = vec![params.program.clone()];
    command.extend(args.iter().cloned());
    info!(command = %command.join(" "), "starting bbcp transfer");

    let (mut child, output) = bbcp::spawn(&params.program, &args)?;

    let mut samples = Vec::new();
    for sample in ProgressStream::new(BufReader::new(output)) {
        match sample {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                // Reap the child before surfacing the parse failure.
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }
    }

    let status = child.wait()?;
    if !status.success() {
        warn!(%status, "bbcp exited unsuccessfully");
    }
    info!(samples = samples.len(), "bbcp transfer finished");

    Ok(TestRun {
        src: src.label().to_string(),
        snk: snk.label().to_string(),
        streams: params.streams,
        decision,
        command,
        samples,
        exit_code: status.code(),
    })
}

/// One entry of a sweep.
#[derive(Debug)]
pub struct SweepEntry {
    pub src: String,
    pub snk: String,
    pub streams: u32,
    pub result: Result<TestRun, ThroughputError>,
}

/// Run transfers in both directions for every stream count, one at a time.
///
/// A failed run is recorded and the sweep moves on.
pub fn sweep(local: &Node, remote: &Node, streams: &[u32], params: &TestParams) -> Vec<SweepEntry> {
    let mut entries = Vec::with_capacity(streams.len() * 2);
    for &count in streams {
        let params = TestParams {
            streams: count,
            ..params.clone()
        };
        for (src, snk) in [(local, remote), (remote, local)] {
            info!(src = src.label(), snk = snk.label(), streams = count, "running throughput test");
            let result = run_test(src, snk, &params);
            if let Err(e) = &result {
                warn!(src = src.label(), snk = snk.label(), error = %e, "throughput test failed");
            }
            entries.push(SweepEntry {
                src: src.label().to_string(),
                snk: snk.label().to_string(),
                streams: count,
                result,
            });
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiate::PortRange;

    #[test]
    fn test_require_usable_ports_aborts_before_spawn() {
        let src = Node::remote("a", PortRange::bounded(50000, 50100).unwrap(), PortRange::Unrestricted);
        let snk = Node::remote("b", PortRange::Forbidden, PortRange::Forbidden);
        let params = TestParams {
            program: "/nonexistent/bbcp-binary".to_string(),
            require_usable_ports: true,
            ..TestParams::default()
        };
        let err = run_test(&src, &snk, &params).unwrap_err();
        assert!(matches!(err, ThroughputError::NoUsablePorts { .. }));
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let params = TestParams {
            program: "/nonexistent/bbcp-binary".to_string(),
            ..TestParams::default()
        };
        let err = run_test(&Node::default(), &Node::default(), &params).unwrap_err();
        assert!(matches!(err, ThroughputError::BbcpNotFound { .. }));
    }

    #[test]
    fn test_sweep_runs_both_directions_per_stream_count() {
        let params = TestParams {
            program: "/nonexistent/bbcp-binary".to_string(),
            ..TestParams::default()
        };
        let local = Node::default();
        let remote = Node::remote("far", PortRange::Unrestricted, PortRange::Unrestricted);
        let entries = sweep(&local, &remote, &[1, 4], &params);
        let shape: Vec<_> = entries
            .iter()
            .map(|e| (e.src.as_str(), e.snk.as_str(), e.streams))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("localhost", "far", 1),
                ("far", "localhost", 1),
                ("localhost", "far", 4),
                ("far", "localhost", 4),
            ]
        );
        assert!(entries.iter().all(|e| e.result.is_err()));
    }
}
