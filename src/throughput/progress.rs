//! Streaming parser for bbcp progress reports.
//!
//! With `-P <secs>` bbcp periodically prints lines such as
//!
//! ```text
//! bbcp: 1234 01:02:03 50% done; 12.5 MB/s
//! ```
//!
//! interleaved with banners and warnings. [`ProgressStream`] pulls lines from
//! any [`BufRead`] and yields one [`ProgressSample`] per progress line, with
//! the rate normalized to MB/s.
//!
//! The lines carry a time-of-day but no date. Samples are stamped with the
//! current calendar date, so a transfer that runs across midnight gets
//! ambiguous timestamps. The parser warns when it sees the clock go backwards
//! but does not adjust the date.

use std::io::BufRead;
use std::str::FromStr;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{trace, warn};

static PROGRESS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^bbcp: (?<pid>[0-9]+) (?<hh>[0-9]+):(?<mm>[0-9]+):(?<ss>[0-9]+) (?<pct>[0-9]+)% done; (?<rate>[0-9]+(?:\.[0-9]+)?) (?<unit>[A-Za-z]+)/s$",
    )
    .unwrap()
});

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("unrecognized bandwidth unit '{unit}' in line: {line}")]
    UnknownUnit { unit: String, line: String },

    #[error("invalid time of day {hour:02}:{minute:02}:{second:02} in line: {line}")]
    InvalidTimeOfDay {
        hour: u32,
        minute: u32,
        second: u32,
        line: String,
    },

    #[error("number out of range in line: {line}")]
    InvalidNumber { line: String },

    #[error("failed to read progress stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Bandwidth unit reported by bbcp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Kilobytes,
    Megabytes,
    Gigabytes,
}

impl RateUnit {
    /// Convert a rate in this unit to MB/s.
    pub fn to_mbps(self, rate: f64) -> f64 {
        match self {
            RateUnit::Kilobytes => rate / 1024.0,
            RateUnit::Megabytes => rate,
            RateUnit::Gigabytes => rate * 1024.0,
        }
    }
}

impl FromStr for RateUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KB" => Ok(RateUnit::Kilobytes),
            "MB" => Ok(RateUnit::Megabytes),
            "GB" => Ok(RateUnit::Gigabytes),
            other => Err(other.to_string()),
        }
    }
}

/// One progress report from a running transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSample {
    pub timestamp: NaiveDateTime,
    /// Transfer rate in MB/s.
    pub rate_mbps: f64,
    /// Process id bbcp printed with the report.
    pub pid: u32,
    /// Percent complete.
    pub percent: u32,
}

/// Where the calendar date of each sample comes from.
#[derive(Debug, Clone, Copy)]
enum DateSource {
    Today,
    Fixed(NaiveDate),
}

impl DateSource {
    fn date(&self) -> NaiveDate {
        match self {
            DateSource::Today => Local::now().date_naive(),
            DateSource::Fixed(date) => *date,
        }
    }
}

/// Parse a single line.
///
/// `Ok(None)` for lines that are not progress reports. Errors mean the line
/// looks like a progress report but cannot be understood.
pub fn parse_line(line: &str, date: NaiveDate) -> Result<Option<ProgressSample>, ProgressError> {
    let line = line.trim_end();
    let Some(caps) = PROGRESS_LINE.captures(line) else {
        return Ok(None);
    };

    let invalid_number = || ProgressError::InvalidNumber {
        line: line.to_string(),
    };
    let int = |name: &str| caps[name].parse::<u32>().map_err(|_| invalid_number());

    let pid = int("pid")?;
    let hour = int("hh")?;
    let minute = int("mm")?;
    let second = int("ss")?;
    let percent = int("pct")?;
    let rate: f64 = caps["rate"].parse().map_err(|_| invalid_number())?;

    let unit: RateUnit = caps["unit"]
        .parse()
        .map_err(|unit| ProgressError::UnknownUnit {
            unit,
            line: line.to_string(),
        })?;

    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
        ProgressError::InvalidTimeOfDay {
            hour,
            minute,
            second,
            line: line.to_string(),
        }
    })?;

    Ok(Some(ProgressSample {
        timestamp: date.and_time(time),
        rate_mbps: unit.to_mbps(rate),
        pid,
        percent,
    }))
}

/// Lazy sequence of progress samples read from a line-oriented stream.
///
/// Each call to `next` blocks until a progress line arrives or the stream
/// ends. After a fatal error the iterator yields `None`.
pub struct ProgressStream<R> {
    reader: R,
    dates: DateSource,
    buf: Vec<u8>,
    last_time: Option<NaiveTime>,
    done: bool,
}

impl<R: BufRead> ProgressStream<R> {
    /// Stamp samples with today's local date.
    pub fn new(reader: R) -> Self {
        Self::with_source(reader, DateSource::Today)
    }

    /// Stamp samples with a fixed date. Used for recorded streams.
    pub fn with_date(reader: R, date: NaiveDate) -> Self {
        Self::with_source(reader, DateSource::Fixed(date))
    }

    fn with_source(reader: R, dates: DateSource) -> Self {
        Self {
            reader,
            dates,
            buf: Vec::new(),
            last_time: None,
            done: false,
        }
    }

    fn fail(&mut self, err: ProgressError) -> Option<Result<ProgressSample, ProgressError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<R: BufRead> Iterator for ProgressStream<R> {
    type Item = Result<ProgressSample, ProgressError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return self.fail(e.into()),
            }

            let line = String::from_utf8_lossy(&self.buf).into_owned();
            match parse_line(&line, self.dates.date()) {
                Ok(Some(sample)) => {
                    let time = sample.timestamp.time();
                    if self.last_time.is_some_and(|last| time < last) {
                        warn!(
                            timestamp = %sample.timestamp,
                            "progress clock went backwards; transfer may have crossed midnight and the date is ambiguous"
                        );
                    }
                    self.last_time = Some(time);
                    return Some(Ok(sample));
                }
                Ok(None) => {
                    trace!(line = %line.trim_end(), "skipping non-progress line");
                }
                Err(e) => return self.fail(e),
            }
        }
    }
}
