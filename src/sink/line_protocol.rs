//! InfluxDB line protocol encoding.
//!
//! One point per sample:
//!
//! ```text
//! ping,host=host1 loss=0i,min=1.2,avg=2.3,max=4.5 1700000000000000000
//! ping,host=host2 loss=100i 1700000000000000000
//! ```

use std::fmt::Write;

use crate::probe::Sample;

/// Tag key carrying the probed host.
pub const HOST_TAG: &str = "host";

/// Encode a sample as a single line-protocol point (no trailing newline).
pub fn encode_point(measurement: &str, sample: &Sample) -> String {
    let mut line = String::with_capacity(96);

    line.push_str(&escape_measurement(measurement));
    line.push(',');
    line.push_str(HOST_TAG);
    line.push('=');
    line.push_str(&escape_key(&sample.host));

    let _ = write!(line, " loss={}i", sample.loss_percent);
    if let Some(latency) = &sample.latency {
        let _ = write!(
            line,
            ",min={},avg={},max={}",
            latency.min, latency.avg, latency.max
        );
    }

    if let Some(ns) = sample.observed_at.timestamp_nanos_opt() {
        let _ = write!(line, " {ns}");
    }

    line
}

/// Escape a measurement name (commas and spaces).
fn escape_measurement(value: &str) -> String {
    escape(value, &[',', ' '])
}

/// Escape a tag key, tag value or field key (commas, equals signs and spaces).
fn escape_key(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Latency;
    use chrono::{TimeZone, Utc};

    fn sample(host: &str, latency: Option<Latency>) -> Sample {
        Sample {
            host: host.to_string(),
            packets_sent: 10,
            packets_received: if latency.is_some() { 10 } else { 0 },
            loss_percent: if latency.is_some() { 0 } else { 100 },
            latency,
            observed_at: Utc.timestamp_opt(1_700_000_000, 5).unwrap(),
        }
    }

    #[test]
    fn test_encode_point_with_latency() {
        let s = sample(
            "host1",
            Some(Latency {
                min: 1.2,
                avg: 2.3,
                max: 4.5,
            }),
        );
        assert_eq!(
            encode_point("ping", &s),
            "ping,host=host1 loss=0i,min=1.2,avg=2.3,max=4.5 1700000000000000005"
        );
    }

    #[test]
    fn test_encode_point_without_latency() {
        let s = sample("host2", None);
        assert_eq!(
            encode_point("ping", &s),
            "ping,host=host2 loss=100i 1700000000000000005"
        );
    }

    #[test]
    fn test_whole_number_latency_stays_float() {
        let s = sample(
            "h",
            Some(Latency {
                min: 1.0,
                avg: 2.0,
                max: 3.0,
            }),
        );
        let line = encode_point("ping", &s);
        assert!(line.contains("min=1,avg=2,max=3 "));
        assert!(!line.contains("min=1i"));
    }

    #[test]
    fn test_escaping() {
        let s = sample("a,b=c d", None);
        let line = encode_point("my ping,v4", &s);
        assert!(line.starts_with(r"my\ ping\,v4,host=a\,b\=c\ d loss=100i"));
    }

    #[test]
    fn test_ipv6_host_not_escaped() {
        let s = sample("2001:db8::1", None);
        assert!(encode_point("ping", &s).starts_with("ping,host=2001:db8::1 "));
    }
}
