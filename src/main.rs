use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use bbtest::config::BbtestConfig;
use bbtest::negotiate::{negotiate, Node, PortRange};
use bbtest::throughput::{self, progress::ProgressStream, report};

#[derive(Parser)]
#[command(
    name = "bbtest",
    about = "Firewall-aware point-to-point throughput tests driven by bbcp",
    version,
    long_about = None
)]
struct Cli {
    /// Configuration file (defaults to $BBTEST_CONFIG, then /etc/bbtest/bbtest.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run throughput tests to and from a remote host
    Run {
        /// Remote host name or address
        target: String,

        /// Stream counts to sweep (repeatable)
        #[arg(long = "streams", short = 's')]
        streams: Vec<u32>,

        /// Per-transfer time limit in seconds
        #[arg(long, short = 't')]
        timeout: Option<u32>,

        /// Remote login name
        #[arg(long, short = 'u')]
        user: Option<String>,

        /// Path to the bbcp binary
        #[arg(long)]
        bbcp: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Show the port range and direction bbcp would use between two nodes
    Negotiate {
        /// Ports the source may listen on (any, none, MIN-MAX)
        #[arg(long, default_value = "any")]
        src_listen: PortRange,

        /// Ports the source may connect to
        #[arg(long, default_value = "any")]
        src_connect: PortRange,

        /// Ports the sink may listen on
        #[arg(long, default_value = "any")]
        snk_listen: PortRange,

        /// Ports the sink may connect to
        #[arg(long, default_value = "any")]
        snk_connect: PortRange,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Parse recorded or piped bbcp output into rate samples
    Parse {
        /// File to read, or '-' for stdin
        #[arg(default_value = "-")]
        input: String,

        /// Calendar date for the samples (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// One JSON object per sample
        #[arg(long)]
        json: bool,
    },

    /// Compute the bandwidth-delay product of a link
    Bdp {
        /// Link bandwidth in bits per second
        #[arg(long)]
        bandwidth: f64,

        /// Round-trip delay in seconds
        #[arg(long)]
        delay: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = match &cli.config {
        Some(path) => BbtestConfig::load(path)?,
        None => BbtestConfig::load_or_default(),
    };

    match cli.command {
        Commands::Run {
            target,
            streams,
            timeout,
            user,
            bbcp,
            json,
        } => {
            tracing::info!(%target, ?streams, "Running throughput sweep");
            let streams = if streams.is_empty() {
                config.bbcp.streams.clone()
            } else {
                streams
            };

            let mut params = config.test_params(streams.first().copied().unwrap_or(1));
            if let Some(timeout) = timeout {
                params.timeout_secs = timeout;
            }
            if let Some(user) = user {
                params.username = Some(user);
            }
            if let Some(bbcp) = bbcp {
                params.program = bbcp;
            }

            let local = config.local_node();
            let remote = config.remote_node(&target);
            let entries = throughput::sweep(&local, &remote, &streams, &params);

            if json {
                let out: Vec<_> = entries
                    .iter()
                    .map(|entry| match &entry.result {
                        Ok(run) => serde_json::json!({
                            "run": run,
                            "summary": report::summarize(&run.samples),
                        }),
                        Err(e) => serde_json::json!({
                            "src": entry.src,
                            "snk": entry.snk,
                            "streams": entry.streams,
                            "error": e.to_string(),
                        }),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("\n=== bbtest: {} <-> {} ===", local.label(), remote.label());
                for entry in &entries {
                    match &entry.result {
                        Ok(run) => {
                            println!("$ {}", run.command.join(" "));
                            println!("  {}", report::format_summary(run));
                        }
                        Err(e) => println!(
                            "  {}",
                            report::format_failure(&entry.src, &entry.snk, entry.streams, e)
                        ),
                    }
                }
                println!();
            }

            if entries.iter().all(|e| e.result.is_err()) {
                anyhow::bail!("all throughput tests failed");
            }
        }
        Commands::Negotiate {
            src_listen,
            src_connect,
            snk_listen,
            snk_connect,
            json,
        } => {
            let src = Node::remote("src", src_listen, src_connect);
            let snk = Node::remote("snk", snk_listen, snk_connect);
            let decision = negotiate(&src, &snk);

            if json {
                let out = serde_json::json!({
                    "decision": decision,
                    "usable": decision.has_usable_ports(),
                    "port_flag": decision.port_flag_interval().map(|i| i.to_string()),
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("Ports:     {}", decision.ports);
                println!(
                    "Protocol:  {}",
                    if decision.reverse { "reverse (-z)" } else { "forward" }
                );
                match decision.port_flag_interval() {
                    Some(interval) => println!("bbcp args: --port {}", interval),
                    None if decision.has_usable_ports() => println!("bbcp args: (no --port)"),
                    None => println!("bbcp args: (no usable port range)"),
                }
            }
        }
        Commands::Parse { input, date, json } => {
            let reader: Box<dyn BufRead> = if input == "-" {
                Box::new(BufReader::new(std::io::stdin()))
            } else {
                let file = std::fs::File::open(&input)
                    .with_context(|| format!("failed to open {}", input))?;
                Box::new(BufReader::new(file))
            };
            let stream = match date {
                Some(date) => ProgressStream::with_date(reader, date),
                None => ProgressStream::new(reader),
            };

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for sample in stream {
                let sample = sample.context("failed to parse bbcp output")?;
                if json {
                    writeln!(out, "{}", serde_json::to_string(&sample)?)?;
                } else {
                    writeln!(out, "{}  {:>10.3} MB/s  {:>3}%", sample.timestamp, sample.rate_mbps, sample.percent)?;
                }
                out.flush()?;
            }
        }
        Commands::Bdp { bandwidth, delay } => {
            let bytes = report::bdp_bytes(bandwidth, delay);
            println!("{:.0} bytes ({:.2} MiB)", bytes, bytes / (1024.0 * 1024.0));
        }
    }

    Ok(())
}
