//! Round trip time estimation from passively observed segments.
//!
//! An observer in the middle cannot see timers; it only sees when a segment passed and when the
//! acknowledgement covering it came back. [`SendTimes`] remembers when each outbound segment was
//! seen, keyed by the sequence number just after it, which is exactly the acknowledgement number
//! that will cover it. [`RttEstimator`] smooths the resulting samples like RFC 6298 does.
//!
//! [`SendTimes`]: struct.SendTimes.html
//! [`RttEstimator`]: struct.RttEstimator.html
use std::collections::VecDeque;

use crate::time::{Duration, Instant};
use crate::wire::SeqNumber;

/// Lower bound of the retransmission timeout, as commonly configured in stacks.
pub const RTO_MIN: Duration = Duration::from_millis(200);

/// Send time records `(sequence after segment, send time)`.
#[derive(Clone, Debug, Default)]
pub struct SendTimes {
    records: VecDeque<SendRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SendRecord {
    seq_end: SeqNumber,
    time: Instant,
}

/// Smoothed round trip time state.
///
/// Uses the classic low-pass filter `srtt += (sample - srtt) / 8` and the mean deviation
/// `rttvar += (|srtt - sample| - rttvar) / 4`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RttEstimator {
    srtt: Option<Duration>,
    rttvar: Duration,
    samples: u32,
}

impl SendTimes {
    /// Remember that a segment ending at `seq_end` was seen at `time`.
    pub fn insert(&mut self, seq_end: SeqNumber, time: Instant) {
        self.records.push_back(SendRecord { seq_end, time });
    }

    /// Match an acknowledgement or segment end against the records.
    ///
    /// Finds the earliest record ending exactly at `seq_end` and returns the time elapsed since
    /// it. Every record not after `seq_end` is pruned when a match is found, they can not match
    /// anything later. A miss leaves the records untouched.
    pub fn take(&mut self, seq_end: SeqNumber, now: Instant) -> Option<Duration> {
        let found = self.records
            .iter()
            .find(|record| record.seq_end == seq_end)
            .copied()?;
        self.records.retain(|record| record.seq_end.after(seq_end));
        Some(now.saturating_since(found.time))
    }

    /// Drop every record covered by the cumulative acknowledgement `una`.
    pub fn prune_through(&mut self, una: SeqNumber) {
        self.records.retain(|record| record.seq_end.after(una));
    }

    /// The number of outstanding records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record is outstanding.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RttEstimator {
    /// Fold a new round trip sample into the estimate.
    pub fn update(&mut self, sample: Duration) {
        match self.srtt {
            None => {
                self.srtt = Some(sample);
                self.rttvar = sample / 2;
            },
            Some(srtt) => {
                let deviation = if srtt > sample { srtt - sample } else { sample - srtt };
                self.rttvar = (self.rttvar * 3 + deviation) / 4;
                self.srtt = Some((srtt * 7 + sample) / 8);
            },
        }
        self.samples += 1;
    }

    /// The smoothed round trip time, zero before the first sample.
    pub fn srtt(&self) -> Duration {
        self.srtt.unwrap_or_default()
    }

    /// The mean deviation of samples.
    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    /// Whether any sample was taken.
    pub fn has_sample(&self) -> bool {
        self.srtt.is_some()
    }

    /// The number of samples taken.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// The retransmission timeout a sender with the same samples would use.
    pub fn rto(&self) -> Duration {
        match self.srtt {
            Some(srtt) => (srtt + self.rttvar * 4).max(RTO_MIN),
            // RFC 6298 initial timeout.
            None => Duration::from_secs(1),
        }
    }
}
