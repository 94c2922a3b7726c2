use core::fmt;

use crate::config::Transfer;
use crate::time::Duration;
use super::classify::{classify, StallCategory};
use super::stall::StallEvent;

/// A finalized stall together with its root cause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifiedStall {
    /// The stall.
    pub event: StallEvent,
    /// The root cause assigned by [`classify`].
    ///
    /// [`classify`]: fn.classify.html
    pub category: StallCategory,
}

/// The diagnosis of one connection.
///
/// Produced once by [`Connection::finalize`] and not changed afterwards.
///
/// [`Connection::finalize`]: struct.Connection.html#method.finalize
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// Name of the connection, the remote address and port.
    pub name: String,
    /// Which summary line is rendered.
    pub transfer: Transfer,
    /// Whether the analyzed host sent any payload.
    ///
    /// Without payload there is nothing to diagnose and `stalls` is empty.
    pub data_observed: bool,
    /// All stalls in order of detection.
    pub stalls: Vec<ClassifiedStall>,
    /// Number of disjoint retransmitted ranges.
    pub retransmitted_ranges: usize,
    /// Number of reordered ranges that were neither lost nor acknowledged out of order.
    pub reordering_ranges: usize,
    /// Number of ranges retransmitted without need.
    pub spurious_ranges: usize,
    /// Number of lost ranges.
    pub lost_ranges: usize,
    /// Bytes retransmitted.
    pub retransmitted_bytes: u32,
    /// Bytes lost.
    pub lost_bytes: u32,
    /// Outbound segments seen.
    pub packets_out: u32,
    /// Outbound retransmissions seen.
    pub retransmissions: u32,
    /// Requests, inbound segments carrying payload.
    pub files: u32,
    /// Payload bytes sent by the analyzed host.
    pub flow_size: u64,
    /// Payload bytes received by the analyzed host.
    pub inbound_size: u64,
    /// Time spent serving requests.
    pub transfer_time: Duration,
    /// Sum of all stall durations while serving requests.
    pub stall_duration: Duration,
    /// Part of `stall_duration` ended by a retransmission.
    pub retrans_duration: Duration,
    /// Delay of inbound segments beyond two round trips.
    pub packet_delay: Duration,
    /// Mean of the smoothed round trip time over all samples.
    pub avg_srtt: Duration,
    /// Whether the connection idled out while closing.
    pub abandoned: bool,
}

impl ClassifiedStall {
    /// Classify a stall.
    pub fn new(event: StallEvent) -> Self {
        ClassifiedStall { category: classify(&event), event }
    }
}

impl Report {
    /// The number of stalls assigned to `category`.
    pub fn count(&self, category: StallCategory) -> usize {
        self.stalls.iter().filter(|stall| stall.category == category).count()
    }

    /// The number of stalls for each category, including empty ones.
    pub fn category_counts(&self) -> Vec<(StallCategory, usize)> {
        StallCategory::ALL.iter()
            .map(|&category| (category, self.count(category)))
            .collect()
    }

    /// Achieved rate in bytes per second.
    pub fn rate(&self) -> f64 {
        per_second(self.flow_size, self.transfer_time)
    }

    /// The rate had inbound segments not been delayed.
    ///
    /// Equal to the achieved rate when the delay accounts for the whole transfer time.
    pub fn ideal_rate(&self) -> f64 {
        if self.transfer_time > self.packet_delay {
            per_second(self.flow_size, self.transfer_time - self.packet_delay)
        } else {
            self.rate()
        }
    }

    /// Retransmissions per outbound segment.
    pub fn retransmission_rate(&self) -> f64 {
        ratio(self.retransmissions, self.packets_out)
    }

    /// Lost ranges per outbound segment.
    pub fn loss_rate(&self) -> f64 {
        ratio(self.lost_ranges as u32, self.packets_out)
    }
}

fn per_second(bytes: u64, time: Duration) -> f64 {
    let secs = time.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}

fn ratio(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(total)
    }
}

impl fmt::Display for ClassifiedStall {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: \"{}\" {}", self.category, self.category.description(), self.event)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for stall in &self.stalls {
            writeln!(f, "{}", stall)?;
        }

        write!(f, "{} flow_size: {} transfer_time: {:.6} rate: {:.1} ideal_rate: {:.1} ",
            self.name, self.flow_size, self.transfer_time.as_secs_f64(), self.rate(),
            self.ideal_rate())?;
        writeln!(f, "stalls: {} retrans: {} reordering: {} spurious: {} lost: {} abandoned: {}",
            self.stalls.len(), self.retransmitted_ranges, self.reordering_ranges,
            self.spurious_ranges, self.lost_ranges, self.abandoned as u8)?;

        match self.transfer {
            Transfer::Download => write!(f, "download pkt_cnt: {} retrans_cnt: {} retrans_rate {:.6}",
                self.packets_out, self.retransmissions, self.retransmission_rate()),
            Transfer::Upload => write!(f, "upload pkt_cnt: {} loss_cnt: {} loss_rate {:.6}",
                self.packets_out, self.lost_ranges, self.loss_rate()),
        }
    }
}
