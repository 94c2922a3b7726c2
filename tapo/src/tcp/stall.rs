use core::fmt;

use crate::storage::{Range, Ranges};
use crate::time::{Duration, Instant};
use crate::wire::{Direction, SeqNumber};

/// A stall as it was noticed.
///
/// Holds a snapshot of the connection state taken when the segment ending the stall arrived,
/// before that segment is processed. Whether retransmissions around it were necessary is not
/// known yet, that is only decided by [`finalize`] once the flow ended.
///
/// [`finalize`]: #method.finalize
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProvisionalStall {
    /// Time of the segment that ended the stall.
    pub time: Instant,
    /// Receive window advertised on the peer's SYN, in bytes.
    pub init_rwnd: u32,
    /// Largest payload seen from the analyzed host so far.
    pub max_seg_size: u32,
    /// Current receive window of the peer, in bytes.
    pub rwnd: u32,
    /// Whether the sender was in loss recovery.
    pub recovery: bool,
    /// Length of the stall, quantized to ticks.
    pub duration: Duration,
    /// Smoothed round trip time.
    pub srtt: Duration,
    /// Retransmission timeout derived from the round trip estimate.
    pub rto: Duration,
    /// Time since the first transmission of the stalled segment.
    pub real_timeout: Duration,
    /// Oldest unacknowledged sequence number.
    pub snd_una: SeqNumber,
    /// Next sequence number to send.
    pub snd_nxt: SeqNumber,
    /// Bytes between `snd_una` and `snd_nxt`.
    pub packets_out: u32,
    /// Bytes selectively acknowledged.
    pub sacked_out: u32,
    /// Bytes not acknowledged below the highest selective acknowledgement.
    pub holes: u32,
    /// Estimate of the bytes actually in the network.
    pub outstanding: u32,
    /// Payload bytes sent so far.
    pub flow_size: u64,
    /// Whether the last burst was complete.
    pub tail: bool,
    /// Whether the server had not yet sent data for the current request.
    pub head: bool,
    /// Direction of the segment ending the stall.
    pub direction: Direction,
    /// Payload length of the segment ending the stall.
    pub seg_len: u32,
    /// Sequence number of the segment ending the stall.
    pub seg_seq: SeqNumber,
    /// Direction of the segment before the stall.
    pub last_direction: Option<Direction>,
}

/// A stall with complete loss information.
///
/// Created only once per provisional stall when the connection is finalized and not changed
/// afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StallEvent {
    /// The snapshot taken when the stall was noticed.
    pub stall: ProvisionalStall,
    /// Lost segments within the flight `[snd_una, snd_nxt)`.
    pub lost: u32,
    /// Unnecessarily retransmitted segments within the flight.
    pub spurious: u32,
    /// Lost ranges covering the stalled segment.
    pub lost_num: u32,
    /// Spurious ranges covering the stalled segment.
    pub spurious_num: u32,
}

impl ProvisionalStall {
    /// Complete the stall with the retransmission history of the whole flow.
    ///
    /// Byte counts in the flight are converted to segments by rounding up. Only an outbound
    /// segment can be a retransmission, an inbound one never covers lost or spurious ranges.
    pub fn finalize(self, ranges: &Ranges) -> StallEvent {
        let mss = self.max_seg_size.max(1);
        let segments = |bytes: u32| (bytes + mss - 1) / mss;

        let lost = ranges.lost.size_within(self.snd_una, self.snd_nxt);
        let spurious = ranges.spurious.size_within(self.snd_una, self.snd_nxt);

        let (lost_num, spurious_num) = match self.direction {
            Direction::Out => {
                let stalled = Range::new(self.seg_seq, self.seg_seq + self.seg_len.max(1));
                (ranges.lost.count_overlapping(stalled) as u32,
                 ranges.spurious.count_overlapping(stalled) as u32)
            },
            Direction::In => (0, 0),
        };

        StallEvent {
            stall: self,
            lost: segments(lost),
            spurious: segments(spurious),
            lost_num,
            spurious_num,
        }
    }
}

impl StallEvent {
    /// How much of the stall the round trip alone does not explain.
    ///
    /// The gap minus two round trips, zero if the gap is shorter.
    pub fn excess_delay(&self) -> Duration {
        let expected = self.stall.srtt * 2;
        if self.stall.duration > expected {
            self.stall.duration - expected
        } else {
            Duration::from_millis(0)
        }
    }
}

fn flag(value: bool) -> u8 {
    value as u8
}

fn secs(duration: Duration) -> f64 {
    duration.as_secs() as f64 + f64::from(duration.subsec_micros()) / 1e6
}

impl fmt::Display for StallEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let stall = &self.stall;
        let last_dir = match stall.last_direction {
            Some(Direction::In) => "in",
            Some(Direction::Out) => "out",
            None => "-",
        };
        write!(f, "time={} duration={:.6} srtt={:.6} rto={:.6} real_rto={:.6} ",
            stall.time, secs(stall.duration), secs(stall.srtt), secs(stall.rto),
            secs(stall.real_timeout))?;
        write!(f, "init_rwnd={} rwnd={} mss={} ca_state={} ",
            stall.init_rwnd, stall.rwnd, stall.max_seg_size,
            if stall.recovery { "recovery" } else { "open" })?;
        write!(f, "snd_una={} snd_nxt={} packets_out={} sacked_out={} holes={} outstanding={} ",
            stall.snd_una, stall.snd_nxt, stall.packets_out, stall.sacked_out, stall.holes,
            stall.outstanding)?;
        write!(f, "lost={} spurious={} flow_size={} tail={} head={} ",
            self.lost, self.spurious, stall.flow_size, flag(stall.tail), flag(stall.head))?;
        write!(f, "dir={} len={} seq={} last_dir={} lost_num={} spurious_num={}",
            stall.direction, stall.seg_len, stall.seg_seq, last_dir, self.lost_num,
            self.spurious_num)
    }
}
