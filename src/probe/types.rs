//! Core measurement types produced by the probe pipeline.
//!
//! - [`Sample`]: One host's statistics for one fping reporting interval
//! - [`Latency`]: Round-trip time triple reported when at least one reply arrived
//! - [`AddressFamily`]: IPv4 or IPv6 probing mode

use chrono::{DateTime, Utc};
use strum_macros::{AsRefStr, Display, EnumString};

/// Address family probed by one pipeline.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumString,
    Display,
    AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AddressFamily {
    /// IPv4 (`fping -4`).
    V4,
    /// IPv6 (`fping -6`).
    V6,
}

impl AddressFamily {
    /// All families, in startup order.
    pub const ALL: [AddressFamily; 2] = [AddressFamily::V4, AddressFamily::V6];

    /// Command-line flag selecting this family.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::V4 => "-4",
            Self::V6 => "-6",
        }
    }
}

/// Round-trip times in milliseconds, exactly as reported by the probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Latency {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

/// One reachability/latency observation for one host.
///
/// Built by the line parser right after a report line is accepted; never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Host identifier as printed by fping (not resolved).
    pub host: String,
    /// Probes sent in the reporting interval.
    pub packets_sent: u32,
    /// Replies received in the reporting interval (never above `packets_sent`).
    pub packets_received: u32,
    /// Loss percentage as computed by fping.
    pub loss_percent: u8,
    /// Present only when at least one reply was received.
    pub latency: Option<Latency>,
    /// Parse time (UTC).
    pub observed_at: DateTime<Utc>,
}

impl Sample {
    /// Loss percentage recomputed from the packet counters.
    ///
    /// Returns `None` when nothing was sent.
    pub fn computed_loss_percent(&self) -> Option<u32> {
        if self.packets_sent == 0 {
            return None;
        }
        let sent = u64::from(self.packets_sent);
        let lost = sent.saturating_sub(u64::from(self.packets_received));
        // Bounded by 100 since received never exceeds sent.
        u32::try_from(lost * 100 / sent).ok()
    }

    /// True when every field except `observed_at` matches.
    pub fn same_measurement(&self, other: &Sample) -> bool {
        self.host == other.host
            && self.packets_sent == other.packets_sent
            && self.packets_received == other.packets_received
            && self.loss_percent == other.loss_percent
            && self.latency == other.latency
    }
}
