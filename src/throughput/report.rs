//! Throughput result summaries and formatting.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::progress::ProgressSample;
use super::TestRun;

/// Aggregate statistics over a run's samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSummary {
    pub samples: usize,
    pub mean_mbps: f64,
    pub peak_mbps: f64,
    pub min_mbps: f64,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
}

/// Summarize a sample series. `None` when there are no samples.
pub fn summarize(samples: &[ProgressSample]) -> Option<RateSummary> {
    let first = samples.first()?;
    let last = samples.last()?;
    let total: f64 = samples.iter().map(|s| s.rate_mbps).sum();
    let peak = samples.iter().map(|s| s.rate_mbps).fold(f64::MIN, f64::max);
    let min = samples.iter().map(|s| s.rate_mbps).fold(f64::MAX, f64::min);

    Some(RateSummary {
        samples: samples.len(),
        mean_mbps: total / samples.len() as f64,
        peak_mbps: peak,
        min_mbps: min,
        first: first.timestamp,
        last: last.timestamp,
    })
}

/// `"s"` unless `count` is exactly one.
pub fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Render a rate given in MB/s.
pub fn format_rate(mbps: f64) -> String {
    if mbps >= 1024.0 {
        format!("{:.2} GB/s", mbps / 1024.0)
    } else if mbps < 1.0 {
        format!("{:.1} KB/s", mbps * 1024.0)
    } else {
        format!("{:.1} MB/s", mbps)
    }
}

/// Format a run as a human-readable summary line.
pub fn format_summary(run: &TestRun) -> String {
    let mut summary = format!(
        "{} -> {} ({} stream{}, {}",
        run.src,
        run.snk,
        run.streams,
        plural(run.streams as usize),
        if run.decision.reverse { "reverse" } else { "forward" },
    );
    if let Some(interval) = run.decision.port_flag_interval() {
        summary.push_str(&format!(", ports {}", interval));
    }
    summary.push_str("): ");

    match summarize(&run.samples) {
        Some(stats) => summary.push_str(&format!(
            "mean {}, peak {} over {} sample{}",
            format_rate(stats.mean_mbps),
            format_rate(stats.peak_mbps),
            stats.samples,
            plural(stats.samples),
        )),
        None => summary.push_str("no progress reported"),
    }

    match run.exit_code {
        Some(0) => {}
        Some(code) => summary.push_str(&format!(", exit code {}", code)),
        None => summary.push_str(", terminated by signal"),
    }

    summary
}

/// Format a run that did not complete.
pub fn format_failure(
    src: &str,
    snk: &str,
    streams: u32,
    err: &impl std::fmt::Display,
) -> String {
    format!(
        "{} -> {} ({} stream{}): FAILED: {}",
        src,
        snk,
        streams,
        plural(streams as usize),
        err
    )
}

/// Bandwidth-delay product in bytes for a link of `bandwidth` bits/s and
/// round-trip `delay` seconds.
pub fn bdp_bytes(bandwidth: f64, delay: f64) -> f64 {
    bandwidth / 8.0 * delay
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiate::{Decision, PortRange};
    use chrono::NaiveDate;

    fn sample(sec: u32, rate: f64) -> ProgressSample {
        ProgressSample {
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(12, 0, sec)
                .unwrap(),
            rate_mbps: rate,
            pid: 1,
            percent: sec,
        }
    }

    fn run(samples: Vec<ProgressSample>, streams: u32, exit_code: Option<i32>) -> TestRun {
        TestRun {
            src: "localhost".to_string(),
            snk: "far".to_string(),
            streams,
            decision: Decision {
                ports: PortRange::bounded(50000, 50100).unwrap(),
                reverse: false,
            },
            command: vec!["bbcp".to_string()],
            samples,
            exit_code,
        }
    }

    #[test]
    fn test_summarize() {
        let stats = summarize(&[sample(2, 10.0), sample(4, 30.0), sample(6, 20.0)]).unwrap();
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.mean_mbps, 20.0);
        assert_eq!(stats.peak_mbps, 30.0);
        assert_eq!(stats.min_mbps, 10.0);
        assert!(stats.first < stats.last);
    }

    #[test]
    fn test_summarize_empty() {
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_format_rate_units() {
        assert_eq!(format_rate(2048.0), "2.00 GB/s");
        assert_eq!(format_rate(112.34), "112.3 MB/s");
        assert_eq!(format_rate(0.5), "512.0 KB/s");
    }

    #[test]
    fn test_format_summary_multi_stream() {
        let summary = format_summary(&run(vec![sample(2, 100.0), sample(4, 300.0)], 4, Some(0)));
        assert!(summary.contains("localhost -> far"));
        assert!(summary.contains("4 streams"));
        assert!(summary.contains("ports 50000:50100"));
        assert!(summary.contains("mean 200.0 MB/s"));
        assert!(summary.contains("peak 300.0 MB/s"));
        assert!(!summary.contains("exit code"));
    }

    #[test]
    fn test_format_summary_no_samples_failed_exit() {
        let summary = format_summary(&run(vec![], 1, Some(2)));
        assert!(summary.contains("1 stream,"));
        assert!(summary.contains("no progress reported"));
        assert!(summary.contains("exit code 2"));
    }

    #[test]
    fn test_format_failure_single_stream() {
        let line = format_failure("localhost", "far", 1, &"bbcp not found at bbcp");
        assert_eq!(line, "localhost -> far (1 stream): FAILED: bbcp not found at bbcp");
        let line = format_failure("far", "localhost", 8, &"boom");
        assert!(line.contains("(8 streams)"));
    }

    #[test]
    fn test_plural() {
        assert_eq!(plural(0), "s");
        assert_eq!(plural(1), "");
        assert_eq!(plural(4), "s");
    }

    #[test]
    fn test_bdp() {
        // 1 Gbit/s at 500 ms RTT
        assert_eq!(bdp_bytes(1e9, 0.5), 62_500_000.0);
    }
}
