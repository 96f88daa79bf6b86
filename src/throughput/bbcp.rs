//! bbcp process wrapper -- assemble arguments, spawn with merged output.

use std::io::PipeReader;
use std::process::{Child, Command, Stdio};

use tracing::debug;

use super::{TestParams, ThroughputError};
use crate::negotiate::{Decision, Node};

/// Flag that switches bbcp to the reverse connection protocol.
pub const REVERSE_PROTOCOL_FLAG: &str = "-z";

/// Build the bbcp argument vector for a transfer from `src` to `snk`.
pub fn command_args(decision: &Decision, params: &TestParams, src: &Node, snk: &Node) -> Vec<String> {
    let mut args = vec![
        "-P".to_string(),
        params.progress_interval_secs.to_string(),
        "-t".to_string(),
        params.timeout_secs.to_string(),
        "-s".to_string(),
        params.streams.to_string(),
    ];
    if let Some(interval) = decision.port_flag_interval() {
        args.push("--port".to_string());
        args.push(interval.to_string());
    }
    if decision.reverse {
        args.push(REVERSE_PROTOCOL_FLAG.to_string());
    }

    let username = params.username.as_deref();
    args.push(src.pathspec(&params.source_path, username));
    args.push(snk.pathspec(&params.sink_path, username));
    args
}

/// Spawn `program` with stdout and stderr both writing into one pipe.
///
/// Returns the child and the read end of the pipe. The read end reaches EOF
/// once the child (and anything it forked) has closed its output.
pub fn spawn(program: &str, args: &[String]) -> Result<(Child, PipeReader), ThroughputError> {
    let (reader, writer) = std::io::pipe()?;
    let stderr_writer = writer.try_clone()?;

    // The Command holds copies of the write end; it must be dropped before
    // the caller reads or the pipe never reports EOF.
    let child = {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(stderr_writer);
        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ThroughputError::BbcpNotFound {
                    path: program.to_string(),
                }
            } else {
                ThroughputError::Spawn {
                    path: program.to_string(),
                    source: e,
                }
            }
        })?
    };

    debug!(program, pid = child.id(), "spawned bbcp");
    Ok((child, reader))
}
