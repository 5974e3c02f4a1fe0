//! fping report line parser.
//!
//! With `-Q` fping writes one summary line per host and interval to stderr:
//!
//! ```text
//! [12:30:10]
//! host1 : xmt/rcv/%loss = 10/10/0%, min/avg/max = 1.2/2.3/4.5
//! host2 : xmt/rcv/%loss = 10/0/100%
//! ```
//!
//! The columns are stable, so fields are extracted by position and checked
//! against their label tokens. Anything that does not fit is reported as a
//! [`LineError`] and never produces a partial [`Sample`].

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::probe::types::{Latency, Sample};

// =============================================================================
// Column layout
// =============================================================================

/// Token holding the host name.
const HOST_COLUMN: usize = 0;

/// Label preceding the packet counters.
const STATS_LABEL: (usize, &str) = (2, "xmt/rcv/%loss");

/// `sent/received/loss%,` triple.
const STATS_COLUMN: usize = 4;

/// Label preceding the round-trip times. Only printed when a reply arrived.
const LATENCY_LABEL: (usize, &str) = (5, "min/avg/max");

/// `min/avg/max` triple in milliseconds.
const LATENCY_COLUMN: usize = 7;

/// Lines with fewer tokens are banners, interval headers or blank.
const MIN_DATA_TOKENS: usize = 2;

/// Maximum tolerated difference between reported and recomputed loss.
const LOSS_TOLERANCE: u32 = 1;

// =============================================================================
// Outcome
// =============================================================================

/// Why a line that looked like data was not turned into a sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// A fixed-position label did not match.
    #[error("expected '{expected}' at column {column}, found {found:?}")]
    UnexpectedLayout {
        column: usize,
        expected: &'static str,
        found: Option<String>,
    },

    /// A column the layout requires is missing.
    #[error("missing {0} column")]
    MissingColumn(&'static str),

    /// A slash-delimited triple did not have three parts.
    #[error("malformed {field} triple: '{token}'")]
    MalformedTriple { field: &'static str, token: String },

    /// A numeric field did not parse.
    #[error("invalid {field} value: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    /// Counters contradict each other.
    #[error("received {received} exceeds sent {sent}")]
    ReceivedExceedsSent { sent: u32, received: u32 },

    /// Loss outside 0-100.
    #[error("loss {0}% out of range")]
    LossOutOfRange(u32),
}

/// Result of classifying one report line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// A complete sample.
    Sample(Sample),
    /// Not a data line (blank, banner, interval header).
    Skip,
    /// Looked like a data line but could not be parsed.
    Rejected(LineError),
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse one report line, stamping the sample with the current time.
///
/// Rejected lines are logged and returned as `None`, same as skipped ones.
pub fn parse_report_line(line: &str) -> Option<Sample> {
    match parse_report_line_at(line, Utc::now()) {
        ParseOutcome::Sample(sample) => Some(sample),
        ParseOutcome::Skip => None,
        ParseOutcome::Rejected(e) => {
            tracing::warn!(line = %line.trim_end(), error = %e, "Skipping unparsable report line");
            None
        }
    }
}

/// Classify one report line using the given observation time.
pub fn parse_report_line_at(line: &str, observed_at: DateTime<Utc>) -> ParseOutcome {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < MIN_DATA_TOKENS {
        return ParseOutcome::Skip;
    }

    match build_sample(&tokens, observed_at) {
        Ok(sample) => {
            check_reported_loss(&sample);
            ParseOutcome::Sample(sample)
        }
        Err(e) => ParseOutcome::Rejected(e),
    }
}

fn build_sample(tokens: &[&str], observed_at: DateTime<Utc>) -> Result<Sample, LineError> {
    expect_label(tokens, STATS_LABEL)?;

    let stats = tokens
        .get(STATS_COLUMN)
        .ok_or(LineError::MissingColumn("xmt/rcv/%loss"))?;
    let [sent, received, loss] = split_triple(stats, "xmt/rcv/%loss")?;

    let sent: u32 = parse_number(sent, "sent")?;
    let received: u32 = parse_number(received, "received")?;
    let loss: u32 = parse_number(loss.trim_end_matches(['%', ',']), "loss")?;

    if received > sent {
        return Err(LineError::ReceivedExceedsSent { sent, received });
    }
    let loss_percent = u8::try_from(loss)
        .ok()
        .filter(|l| *l <= 100)
        .ok_or(LineError::LossOutOfRange(loss))?;

    let latency = if tokens.len() > LATENCY_LABEL.0 {
        Some(parse_latency(tokens)?)
    } else {
        None
    };

    Ok(Sample {
        host: tokens[HOST_COLUMN].to_string(),
        packets_sent: sent,
        packets_received: received,
        loss_percent,
        latency,
        observed_at,
    })
}

fn parse_latency(tokens: &[&str]) -> Result<Latency, LineError> {
    expect_label(tokens, LATENCY_LABEL)?;

    let times = tokens
        .get(LATENCY_COLUMN)
        .ok_or(LineError::MissingColumn("min/avg/max"))?;
    let [min, avg, max] = split_triple(times, "min/avg/max")?;

    Ok(Latency {
        min: parse_millis(min, "min")?,
        avg: parse_millis(avg, "avg")?,
        max: parse_millis(max, "max")?,
    })
}

fn expect_label(tokens: &[&str], (column, expected): (usize, &'static str)) -> Result<(), LineError> {
    match tokens.get(column) {
        Some(found) if *found == expected => Ok(()),
        found => Err(LineError::UnexpectedLayout {
            column,
            expected,
            found: found.map(|s| s.to_string()),
        }),
    }
}

fn split_triple<'a>(token: &'a str, field: &'static str) -> Result<[&'a str; 3], LineError> {
    let mut parts = token.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c), None) if !a.is_empty() && !b.is_empty() && !c.is_empty() => {
            Ok([a, b, c])
        }
        _ => Err(LineError::MalformedTriple {
            field,
            token: token.to_string(),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, LineError> {
    value.parse().map_err(|_| LineError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_millis(value: &str, field: &'static str) -> Result<f64, LineError> {
    let ms: f64 = parse_number(value, field)?;
    if !ms.is_finite() || ms < 0.0 {
        return Err(LineError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    Ok(ms)
}

/// Warn when fping's loss figure disagrees with its own counters.
///
/// The reported value is kept as-is either way.
fn check_reported_loss(sample: &Sample) {
    let Some(computed) = sample.computed_loss_percent() else {
        return;
    };
    let reported = u32::from(sample.loss_percent);
    if reported.abs_diff(computed) > LOSS_TOLERANCE {
        tracing::warn!(
            host = %sample.host,
            sent = sample.packets_sent,
            received = sample.packets_received,
            reported_loss = reported,
            computed_loss = computed,
            "Reported loss disagrees with packet counters"
        );
    }
}
