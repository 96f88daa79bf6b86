//! Port and protocol-direction negotiation between two firewalled nodes.
//!
//! bbcp normally has the source connect out to a listening sink. When the
//! source cannot connect to anything the sink listens on, the roles can be
//! swapped with bbcp's reverse protocol (`-z`), where the sink connects back
//! to a listening source.

pub mod node;
pub mod ports;

pub use node::Node;
pub use ports::{intersect, PortInterval, PortRange};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("invalid port range '{input}' (expected 'any', 'none', or MIN-MAX)")]
    InvalidPortRange { input: String },

    #[error("port range {min}-{max} is inverted (min > max)")]
    InvertedInterval { min: u16, max: u16 },
}

/// Port range and protocol direction chosen for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// Ports usable in the chosen direction.
    pub ports: PortRange,
    /// Whether bbcp must run with the reverse protocol.
    pub reverse: bool,
}

impl Decision {
    /// Interval to pass to bbcp as `--port`.
    ///
    /// `None` when any port works, when no port works, and when the
    /// negotiated interval is empty.
    pub fn port_flag_interval(&self) -> Option<PortInterval> {
        self.ports.interval().filter(|interval| !interval.is_empty())
    }

    /// False when the negotiated range is forbidden or an empty interval.
    pub fn has_usable_ports(&self) -> bool {
        match self.ports {
            PortRange::Unrestricted => true,
            PortRange::Forbidden => false,
            PortRange::Bounded(interval) => !interval.is_empty(),
        }
    }
}

/// Decide how `src` should send to `snk`.
///
/// The forward protocol is chosen unless the source's outbound ports and the
/// sink's inbound ports are explicitly incompatible (forbidden), in which
/// case the reverse protocol is forced even if it is forbidden as well. No
/// deeper feasibility check is made; callers inspect
/// [`Decision::has_usable_ports`].
pub fn negotiate(src: &Node, snk: &Node) -> Decision {
    let forward = intersect(src.connect_ports(), snk.listen_ports());
    let reverse = intersect(src.listen_ports(), snk.connect_ports());

    debug!(
        src = src.label(),
        snk = snk.label(),
        %forward,
        %reverse,
        "negotiated candidate port ranges"
    );

    if forward.is_forbidden() {
        Decision {
            ports: reverse,
            reverse: true,
        }
    } else {
        Decision {
            ports: forward,
            reverse: false,
        }
    }
}
