//! Tunables of the analysis.
use crate::time::Duration;

/// Which way the payload of the analyzed connection flows.
///
/// Only changes what summary is reported. A download is data sent by the analyzed host, where the
/// interesting figure is how often it had to retransmit. For an upload the analyzed host mainly
/// receives, and the loss rate of its own segments is reported instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transfer {
    /// The analyzed host sends the payload.
    Download,
    /// The analyzed host receives the payload.
    Upload,
}

/// Configuration of a connection analysis.
///
/// The defaults reproduce the classic thresholds of server-side stall analysis. All of them are
/// plain public fields, change them before creating a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    /// The summary to report.
    pub transfer: Transfer,

    /// Idle time in a closing state after which the connection is considered abandoned.
    pub abandon_timeout: Duration,

    /// Maximum gap between consecutive outbound segments that continue a burst.
    pub tail_burst_gap: Duration,

    /// Lower bound of the stall threshold.
    ///
    /// Also the threshold in effect before any round trip sample exists.
    pub min_stall_threshold: Duration,

    /// Multiple of the smoothed round trip time a gap must exceed to count as a stall.
    pub stall_rtt_factor: u32,

    /// Resolution to which gaps are truncated before comparing them with the threshold.
    pub tick: Duration,
}

impl Config {
    /// The stall threshold for a given smoothed round trip time.
    ///
    /// Monotone in `srtt` and never below `min_stall_threshold`.
    pub fn stall_threshold(&self, srtt: Duration) -> Duration {
        let scaled = srtt * self.stall_rtt_factor;
        scaled.max(self.min_stall_threshold)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            transfer: Transfer::Download,
            abandon_timeout: Duration::from_secs(5),
            tail_burst_gap: Duration::from_micros(500),
            min_stall_threshold: Duration::from_millis(200),
            stall_rtt_factor: 2,
            tick: Duration::from_millis(1),
        }
    }
}
