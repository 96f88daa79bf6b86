//! TOML configuration for bbtest.
//!
//! Settings come from, in order: the file named by `BBTEST_CONFIG`,
//! `/etc/bbtest/bbtest.toml`, then compiled-in defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::negotiate::{Node, PortInterval, PortRange};
use crate::throughput::{TestParams, DEFAULT_STREAMS, DEFAULT_TEST_TIME_SECS};

pub const CONFIG_ENV_VAR: &str = "BBTEST_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/bbtest/bbtest.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BbtestConfig {
    #[serde(default)]
    pub bbcp: BbcpConfig,
    /// Unset fields fall back to a typical client: outbound allowed,
    /// nothing inbound.
    #[serde(default)]
    pub local: NodeConfig,
    /// Unset fields fall back to a typical server with a firewall hole for
    /// data connections (`50000-50100`).
    #[serde(default)]
    pub remote: NodeConfig,
}

impl BbtestConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded bbtest configuration");
        Ok(config)
    }

    /// Load from `BBTEST_CONFIG`, then the system path, then defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "BBTEST_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Transfer parameters for a run with `streams` parallel streams.
    pub fn test_params(&self, streams: u32) -> TestParams {
        TestParams {
            program: self.bbcp.path.clone(),
            progress_interval_secs: self.bbcp.progress_interval_secs,
            timeout_secs: self.bbcp.timeout_secs,
            streams,
            source_path: self.bbcp.source_path.clone(),
            sink_path: self.bbcp.sink_path.clone(),
            username: self.bbcp.username.clone(),
            require_usable_ports: self.bbcp.require_usable_ports,
        }
    }

    /// The machine bbtest runs on.
    pub fn local_node(&self) -> Node {
        Node::local(
            self.local.listen_ports.unwrap_or(PortRange::Forbidden),
            self.local.connect_ports.unwrap_or(PortRange::Unrestricted),
        )
    }

    /// The far end of the test.
    pub fn remote_node(&self, host: &str) -> Node {
        Node::remote(
            host,
            self.remote.listen_ports.unwrap_or(REMOTE_LISTEN_PORTS),
            self.remote.connect_ports.unwrap_or(PortRange::Unrestricted),
        )
    }
}

// ---------------------------------------------------------------------------
// bbcp
// ---------------------------------------------------------------------------

/// How bbcp is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BbcpConfig {
    /// Path to the bbcp binary.
    pub path: String,
    /// Seconds between progress reports.
    pub progress_interval_secs: u32,
    /// Per-transfer time limit in seconds.
    pub timeout_secs: u32,
    /// Stream counts swept when none are given on the command line.
    pub streams: Vec<u32>,
    pub source_path: String,
    pub sink_path: String,
    /// Remote login name, if different from the local user.
    pub username: Option<String>,
    /// Skip a transfer instead of running it without `--port` when no
    /// usable port range exists.
    pub require_usable_ports: bool,
}

impl Default for BbcpConfig {
    fn default() -> Self {
        let params = TestParams::default();
        Self {
            path: params.program,
            progress_interval_secs: params.progress_interval_secs,
            timeout_secs: DEFAULT_TEST_TIME_SECS,
            streams: vec![DEFAULT_STREAMS],
            source_path: params.source_path,
            sink_path: params.sink_path,
            username: None,
            require_usable_ports: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Default inbound range of the remote node.
pub const REMOTE_LISTEN_PORTS: PortRange =
    PortRange::Bounded(PortInterval::unchecked(50000, 50100));

/// Firewall posture of one side of the test. Unset fields take the side's
/// default when the [`Node`] is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_ports: Option<PortRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_ports: Option<PortRange>,
}
