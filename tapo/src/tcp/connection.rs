use core::mem;

use crate::config::{Config, Transfer};
use crate::rtt::{RttEstimator, SendTimes};
use crate::storage::{Range, Ranges};
use crate::time::{quantize, Duration, Instant};
use crate::wire::{Direction, FourTuple, SackState, Segment, SeqNumber};

use super::report::{ClassifiedStall, Report};
use super::stall::ProvisionalStall;

/// The reconstructed state of one observed connection.
///
/// The analyzed host is the server side: outbound segments carry the payload under scrutiny,
/// inbound segments carry requests and acknowledgements. All state is updated by [`arrives`], one
/// segment at a time in capture order, and read out by [`finalize`] once the connection ended or
/// the capture stopped.
///
/// [`arrives`]: #method.arrives
/// [`finalize`]: #method.finalize
#[derive(Clone, Debug)]
pub struct Connection {
    name: String,
    config: Config,

    /// The current state of the state machine.
    current: State,

    /// Whether a retransmission is being repaired.
    recovery: Recovery,

    /// The sending state of the analyzed host.
    ///
    /// In RFC793 this is referred to as `SND`.
    send: Send,

    /// The receiving state of the analyzed host.
    ///
    /// In RFC793 this is referred to as `RCV`.
    recv: Receive,

    /// Quantities derived after each segment.
    in_flight: InFlight,

    times: Times,

    rtt: RttEstimator,
    /// Send times of segments that may yield a round trip sample.
    rtt_pending: SendTimes,
    /// Send times of every outbound segment, retransmissions included.
    first_sent: SendTimes,
    /// The smoothed round trip time after each sample.
    srtt_samples: Vec<Duration>,

    /// The canonical selective acknowledgements of the last inbound segment.
    sack: SackState,
    ranges: Ranges,
    /// Reordering candidate still being extended by later acknowledgements.
    reordering_open: Option<Range>,

    /// No payload was sent since the last request arrived.
    head: bool,
    /// The last burst looks complete.
    tail: bool,
    /// Consecutive outbound segments at line rate.
    tail_burst: u32,

    stall_count: u32,
    packets_out: u32,
    retransmissions: u32,
    files: u32,

    last_direction: Option<Direction>,
    last_stall_point: SeqNumber,
    abandoned: bool,

    stalls: Vec<ProvisionalStall>,
    report: Option<Report>,
}

/// The sending state of the analyzed host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Send {
    /// The oldest sequence number not yet acknowledged by the peer.
    ///
    /// In RFC793 this is referred to as `SND.UNA`.
    pub unacked: SeqNumber,

    /// The sequence number after the highest data sent so far.
    ///
    /// In RFC793 this is referred to as `SND.NXT`.
    pub next: SeqNumber,

    /// The sequence number of the first outbound segment.
    ///
    /// `None` until something was sent, `next` is meaningless before.
    pub initial_seq: Option<SeqNumber>,

    /// The largest payload seen in one outbound segment.
    pub max_segment_size: u32,

    /// Payload bytes sent, not counting retransmissions.
    pub flow_size: u64,
}

/// The receiving state of the analyzed host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Receive {
    /// The sequence number after the last inbound segment.
    pub unacked: SeqNumber,

    /// The last acknowledgement sent by the analyzed host.
    ///
    /// In RFC793 this is referred to as `RCV.NXT`.
    pub next: SeqNumber,

    /// The receive window most recently advertised by the peer, scaled.
    pub window: u32,

    /// The receive window advertised on the peer's SYN, scaled.
    pub initial_window: u32,

    /// The window scale factor of the peer.
    pub window_scale: u32,

    /// Payload bytes received.
    pub data_size: u64,
}

/// Estimates of the data currently in the network, in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct InFlight {
    /// Data between `SND.UNA` and `SND.NXT`.
    pub packets_out: u32,
    /// Data selectively acknowledged.
    pub sacked_out: u32,
    /// Data not acknowledged below the highest selective acknowledgement.
    pub holes: u32,
    /// Data up to the highest selective acknowledgement.
    pub fackets_out: u32,
    /// Retransmitted data not yet cumulatively acknowledged.
    pub retrans_out: u32,
    /// Data that has actually left the sender and was not yet received.
    pub outstanding: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
struct Times {
    start: Option<Instant>,
    last: Option<Instant>,
    last_in: Option<Instant>,
    last_stall: Option<Instant>,
    transfer_begin: Option<Instant>,
    transfer_time: Duration,
    stall_duration: Duration,
    retrans_duration: Duration,
}

/// State enum of the statemachine.
///
/// Follows the observed segments rather than the internal state of either end, which is why some
/// states of RFC793 are folded together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Nothing observed yet.
    Listen,

    /// Received the SYN of the peer.
    SynReceived,

    /// Answered with our own SYN.
    SynSent,

    /// The handshake completed.
    Established,

    /// The peer closed its side of the connection.
    FinWait1,

    /// The analyzed host closed its side of the connection.
    FinWait2,

    /// The closing handshake completed.
    Close,

    /// The connection was reset.
    Closing,
}

/// Loss recovery state of the sender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Recovery {
    /// No retransmission outstanding.
    Open,

    /// Repairing a loss.
    Recovery {
        /// `SND.NXT` at the time of the retransmission.
        ///
        /// Recovery ends when everything sent before it was acknowledged.
        point: SeqNumber,
    },
}

impl Connection {
    /// Start analyzing a connection.
    pub fn new(tuple: FourTuple, config: Config) -> Self {
        Connection {
            name: tuple.name(),
            config,
            current: State::Listen,
            recovery: Recovery::Open,
            send: Send::default(),
            recv: Receive {
                window_scale: 1,
                ..Receive::default()
            },
            in_flight: InFlight::default(),
            times: Times::default(),
            rtt: RttEstimator::default(),
            rtt_pending: SendTimes::default(),
            first_sent: SendTimes::default(),
            srtt_samples: Vec::new(),
            sack: SackState::default(),
            ranges: Ranges::default(),
            reordering_open: None,
            head: false,
            tail: false,
            tail_burst: 0,
            stall_count: 0,
            packets_out: 0,
            retransmissions: 0,
            files: 0,
            last_direction: None,
            last_stall_point: SeqNumber::default(),
            abandoned: false,
            stalls: Vec::new(),
            report: None,
        }
    }

    /// Process the next observed segment.
    ///
    /// Segments must be delivered in capture order. Sequence space comparisons are robust against
    /// reordering but all durations assume monotonic timestamps.
    pub fn arrives(&mut self, segment: &Segment) {
        if self.report.is_some() {
            net_warn!("{}: segment at {} after finalization ignored", self.name, segment.time);
            return;
        }

        self.update_burst(segment);
        self.transition(segment);
        if self.current.is_terminal() {
            return;
        }

        let elapsed = self.elapsed(segment);
        let threshold = self.config.stall_threshold(self.rtt.srtt());
        let stalled = elapsed > threshold;
        if stalled {
            self.detect_stall(segment, elapsed);
        }

        let sack = SackState::from_segment(segment);
        let retransmission = match segment.direction {
            Direction::Out => self.send_out(segment),
            Direction::In => {
                self.receive_in(segment, sack);
                false
            },
        };

        self.update_in_flight();
        if stalled {
            self.account_stall(segment, elapsed, retransmission);
        }
        self.update_transfer(segment);

        let now = segment.time;
        self.last_direction = Some(segment.direction);
        self.times.last = Some(now);
        if segment.direction == Direction::In {
            self.times.last_in = Some(now);
        }
    }

    /// Finish the analysis and report the diagnosis.
    ///
    /// Reconciles the retransmission history, completes and classifies all stalls. The first call
    /// computes the report, later calls return the same report. Segments arriving after the first
    /// call are ignored.
    pub fn finalize(&mut self) -> &Report {
        let report = match self.report.take() {
            Some(report) => report,
            None => self.build_report(),
        };
        self.report.get_or_insert(report)
    }

    /// Name of the connection for log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current state of the state machine.
    pub fn state(&self) -> State {
        self.current
    }

    /// The loss recovery state of the sender.
    pub fn recovery(&self) -> Recovery {
        self.recovery
    }

    /// The sending state of the analyzed host.
    pub fn send(&self) -> &Send {
        &self.send
    }

    /// The receiving state of the analyzed host.
    pub fn recv(&self) -> &Receive {
        &self.recv
    }

    /// Data in the network after the last segment.
    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// The round trip estimate.
    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    /// The sequence ranges recorded so far.
    ///
    /// `lost` is only filled in by [`finalize`](#method.finalize).
    pub fn ranges(&self) -> &Ranges {
        &self.ranges
    }

    /// Send time records of segments not yet cumulatively acknowledged.
    pub fn send_records(&self) -> usize {
        self.first_sent.len()
    }

    /// Stalls detected and not yet finalized.
    pub fn stalls(&self) -> &[ProvisionalStall] {
        &self.stalls
    }

    /// The number of stalls detected.
    pub fn stall_count(&self) -> u32 {
        self.stall_count
    }

    /// The number of outbound segments.
    pub fn packets_out(&self) -> u32 {
        self.packets_out
    }

    /// The number of outbound retransmissions.
    pub fn retransmissions(&self) -> u32 {
        self.retransmissions
    }

    /// The number of requests, inbound segments with payload.
    pub fn files(&self) -> u32 {
        self.files
    }

    /// Whether the server had not sent data since the last request.
    pub fn is_head(&self) -> bool {
        self.head
    }

    /// Whether the last burst looked complete.
    pub fn is_tail(&self) -> bool {
        self.tail
    }

    /// The length of the current run of back-to-back outbound segments.
    pub fn tail_burst(&self) -> u32 {
        self.tail_burst
    }

    /// Whether the connection idled out while closing.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }

    /// When the last SYN of the peer was seen.
    pub fn start(&self) -> Option<Instant> {
        self.times.start
    }

    /// The reference point of stall tracking, time and `SND.UNA` of the last stall.
    ///
    /// Reset by the handshake as well.
    pub fn last_stall(&self) -> Option<(Instant, SeqNumber)> {
        self.times.last_stall.map(|time| (time, self.last_stall_point))
    }

    /// Whether the connection was finalized.
    pub fn is_finalized(&self) -> bool {
        self.report.is_some()
    }

    fn update_burst(&mut self, segment: &Segment) {
        if segment.direction == Direction::In && (segment.flags.syn() || segment.payload_len > 1) {
            self.head = true;
        }

        let back_to_back = match self.times.last {
            Some(last) => segment.time.saturating_since(last) < self.config.tail_burst_gap,
            None => false,
        };
        if self.last_direction == Some(Direction::Out)
            && back_to_back
            && !segment.seq_number.before(self.send.next)
        {
            self.tail_burst += 1;
        } else {
            if self.tail_burst >= 2 {
                net_debug!("{}: tail burst of {} segments before {}",
                    self.name, self.tail_burst, segment.time);
            }
            self.tail_burst = 0;
        }
    }

    fn transition(&mut self, segment: &Segment) {
        let now = segment.time;
        let flags = segment.flags;

        if self.current.is_terminal() {
            net_debug!("{}: segment at {} in terminal state {:?}", self.name, now, self.current);
            return;
        }

        if segment.direction == Direction::In && flags.syn() {
            self.current = State::SynReceived;
            self.times.start = Some(now);
            self.times.last = Some(now);
            self.times.last_stall = Some(now);
            return;
        }

        if flags.rst() {
            self.current = State::Closing;
            return;
        }

        match (self.current, segment.direction) {
            (State::SynReceived, Direction::Out) if flags.syn() => {
                self.current = State::SynSent;
                self.last_stall_point = segment.seq_number;
            },
            (State::SynSent, Direction::In) if flags.ack() => {
                self.current = State::Established;
            },
            (State::Established, Direction::In) if flags.fin() => {
                self.current = State::FinWait1;
            },
            (State::Established, Direction::Out) if flags.fin() => {
                self.current = State::FinWait2;
            },
            (State::FinWait1, direction) => {
                self.check_abandoned(now);
                if direction == Direction::Out && flags.ack() && segment.ack_number == self.recv.unacked {
                    self.current = State::Close;
                }
            },
            (State::FinWait2, direction) => {
                self.check_abandoned(now);
                if direction == Direction::In && flags.ack() && segment.ack_number == self.send.next {
                    self.current = State::Close;
                }
            },
            _ => (),
        }
    }

    fn check_abandoned(&mut self, now: Instant) {
        let idle = match self.times.last {
            Some(last) => now.saturating_since(last),
            None => return,
        };
        if idle > self.config.abandon_timeout && !self.abandoned {
            net_debug!("{}: idle for {:?} while closing, abandoned", self.name, idle);
            self.abandoned = true;
        }
    }

    /// The quantized gap since the previous segment.
    fn elapsed(&self, segment: &Segment) -> Duration {
        match self.times.last {
            Some(last) => quantize(segment.time.saturating_since(last), self.config.tick),
            None => Duration::from_millis(0),
        }
    }

    fn detect_stall(&mut self, segment: &Segment, elapsed: Duration) {
        let now = segment.time;
        self.stall_count += 1;

        let real_timeout = match segment.direction {
            Direction::Out => self.first_sent
                .take(segment.seq_number + segment.payload_len, now)
                .map(|since| quantize(since, self.config.tick))
                .unwrap_or(elapsed),
            Direction::In => elapsed,
        };

        let stall = ProvisionalStall {
            time: now,
            init_rwnd: self.recv.initial_window,
            max_seg_size: self.send.max_segment_size,
            rwnd: self.recv.window,
            recovery: self.recovery.is_recovery(),
            duration: elapsed,
            srtt: self.rtt.srtt(),
            rto: self.rtt.rto(),
            real_timeout,
            snd_una: self.send.unacked,
            snd_nxt: self.send.next,
            packets_out: self.in_flight.packets_out,
            sacked_out: self.in_flight.sacked_out,
            holes: self.in_flight.holes,
            outstanding: self.in_flight.outstanding,
            flow_size: self.send.flow_size,
            tail: self.tail,
            head: self.head,
            direction: segment.direction,
            seg_len: segment.payload_len,
            seg_seq: segment.seq_number,
            last_direction: self.last_direction,
        };
        net_debug!("{}: stall of {:?} ended by {} segment seq {} at {}",
            self.name, elapsed, segment.direction, segment.seq_number, now);

        self.stalls.push(stall);
        self.last_stall_point = self.send.unacked;
        self.times.last_stall = Some(now);
    }

    /// Handle an outbound segment, returns whether it was a retransmission.
    fn send_out(&mut self, segment: &Segment) -> bool {
        let now = segment.time;
        let seq = segment.seq_number;
        let len = segment.payload_len;
        let flags = segment.flags;

        let started = self.send.initial_seq.is_some();
        let initial = *self.send.initial_seq.get_or_insert(seq);
        self.packets_out += 1;
        net_trace!("{}: out seq {} len {} at {}", self.name, seq - initial, len, now);

        let retransmission = started && seq.before(self.send.next);
        if retransmission {
            self.retransmissions += 1;
            self.recovery = Recovery::Recovery { point: self.send.next };
            if len > 0 {
                self.ranges.retransmitted.append(seq, seq + len);
            }
        } else {
            self.send.next = segment.seq_end();
            self.send.flow_size += u64::from(len);
            if !self.recovery.is_recovery() {
                let mss = self.send.max_segment_size;
                self.tail = if flags.syn() {
                    false
                } else if flags.fin() {
                    true
                } else {
                    len > 0 && len < mss && self.recv.window >= mss
                };
            }
        }

        self.send.max_segment_size = self.send.max_segment_size.max(len);
        self.first_sent.insert(seq + len, now);
        if flags.ack() {
            self.recv.next = segment.ack_number;
        }

        match self.recovery {
            Recovery::Recovery { point } if !retransmission && !seq.before(point) => {
                net_debug!("{}: recovery ended by seq {} at {}", self.name, seq, now);
                self.recovery = Recovery::Open;
            },
            Recovery::Recovery { .. } => (),
            Recovery::Open => self.rtt_pending.insert(segment.seq_end(), now),
        }

        retransmission
    }

    fn receive_in(&mut self, segment: &Segment, mut sack: SackState) {
        let now = segment.time;
        let flags = segment.flags;

        if flags.syn() {
            let shift = segment.window_scale.map_or(0, |scale| scale.min(14));
            self.recv.window_scale = 1 << shift;
            self.recv.initial_window = u32::from(segment.window_len) * self.recv.window_scale;
        }
        self.recv.window = u32::from(segment.window_len) * self.recv.window_scale;
        self.recv.data_size += u64::from(segment.payload_len);

        if self.config.transfer == Transfer::Upload && flags.ack() && self.send.initial_seq.is_some() {
            let in_flight = (self.send.next - segment.ack_number).max(0);
            let since = self.times.start.map(|start| now.saturating_since(start)).unwrap_or_default();
            net_trace!("{}: inflight_size {} time {:?}", self.name, in_flight, since);
        }

        if flags.ack() {
            self.send.unacked = segment.ack_number;
            self.first_sent.prune_through(segment.ack_number);
        }
        self.recv.unacked = segment.seq_end();

        let una = self.send.unacked;
        if !sack.is_empty() {
            if let Some(spurious) = sack.spurious_retrans(una) {
                self.ranges.spurious.append(spurious.begin, spurious.end);
            }
            sack.normalize(una);
            if let Some(hole) = sack.reordering(una) {
                self.update_reordering(hole);
            }
            sack.add_to_block_list(&mut self.ranges.blocks);
        }
        self.sack = sack;

        if !flags.ack() {
            return;
        }

        let ack = segment.ack_number;
        match self.recovery {
            Recovery::Recovery { point } => {
                if ack.after(point) || (ack == point && self.sack.is_empty()) {
                    net_debug!("{}: recovery ended by ack {} at {}", self.name, ack, now);
                    self.recovery = Recovery::Open;
                }
            },
            Recovery::Open => {
                if let Some(sample) = self.rtt_pending.take(ack, now) {
                    self.rtt.update(sample);
                    self.srtt_samples.push(self.rtt.srtt());
                }
            },
        }
    }

    /// Merge a new reordering candidate into the open one.
    fn update_reordering(&mut self, hole: Range) {
        self.reordering_open = match self.reordering_open {
            None => Some(hole),
            Some(open) if hole.begin.after(open.end) => {
                self.ranges.reordering.append(open.begin, open.end);
                Some(hole)
            },
            Some(open) if open.begin.after(hole.end) => {
                net_warn!("{}: invalid reordering range {} before open range {}",
                    self.name, hole, open);
                Some(open)
            },
            Some(open) => Some(Range::new(open.begin.min(hole.begin), open.end.max(hole.end))),
        };
    }

    fn update_in_flight(&mut self) {
        let una = self.send.unacked;
        let next = self.send.next;

        let packets_out = match self.send.initial_seq {
            Some(_) => (next - una).max(0) as u32,
            None => 0,
        };
        let sacked_out = self.sack.sacked(una);
        let max_sack = self.sack.max_sack_ack();
        let fackets_out = max_sack.map_or(0, |max| (max - una).max(0) as u32);
        let holes = if sacked_out > 0 { fackets_out.saturating_sub(sacked_out) } else { 0 };
        let retrans_out = self.ranges.retransmitted.size_within(una, next);
        let outstanding = packets_out.saturating_sub(sacked_out).saturating_add(retrans_out);

        self.in_flight = InFlight {
            packets_out,
            sacked_out,
            holes,
            fackets_out,
            retrans_out,
            outstanding,
        };
    }

    fn account_stall(&mut self, segment: &Segment, elapsed: Duration, retransmission: bool) {
        if self.times.transfer_begin.is_none() {
            return;
        }
        self.times.stall_duration += elapsed;
        if self.current == State::Established && retransmission {
            self.times.retrans_duration += elapsed;
        }
        net_trace!("{}: stall of {:?} accounted at {}", self.name, elapsed, segment.time);
    }

    fn update_transfer(&mut self, segment: &Segment) {
        if segment.payload_len <= 1 {
            return;
        }
        match segment.direction {
            Direction::Out => self.head = false,
            Direction::In => {
                self.files += 1;
                if let (Some(begin), Some(last_in)) = (self.times.transfer_begin, self.times.last_in) {
                    self.times.transfer_time += last_in.saturating_since(begin);
                }
                self.times.transfer_begin = Some(segment.time);
            },
        }
    }

    fn transfer_time(&self) -> Duration {
        let current = match (self.times.transfer_begin, self.times.last_in) {
            (Some(begin), Some(last_in)) => last_in.saturating_since(begin),
            _ => Duration::from_millis(0),
        };
        self.times.transfer_time + current
    }

    fn build_report(&mut self) -> Report {
        let data_observed = self.send.max_segment_size > 0;
        let stalls = if data_observed {
            self.reconcile()
        } else {
            net_debug!("{}: no payload sent, nothing to diagnose", self.name);
            self.stalls.clear();
            Vec::new()
        };

        let packet_delay = stalls.iter()
            .map(|stall| &stall.event)
            .filter(|event| !event.stall.head && event.stall.direction == Direction::In)
            .map(|event| event.excess_delay())
            .sum::<Duration>();
        let avg_srtt = match self.srtt_samples.len() as u32 {
            0 => Duration::from_millis(0),
            count => self.srtt_samples.iter().sum::<Duration>() / count,
        };

        let report = Report {
            name: self.name.clone(),
            transfer: self.config.transfer,
            data_observed,
            stalls,
            retransmitted_ranges: self.ranges.retransmitted.len(),
            reordering_ranges: self.ranges.reordering.len(),
            spurious_ranges: self.ranges.spurious.len(),
            lost_ranges: self.ranges.lost.len(),
            retransmitted_bytes: self.ranges.retransmitted.size(),
            lost_bytes: self.ranges.lost.size(),
            packets_out: self.packets_out,
            retransmissions: self.retransmissions,
            files: self.files,
            flow_size: self.send.flow_size,
            inbound_size: self.recv.data_size,
            transfer_time: self.transfer_time(),
            stall_duration: self.times.stall_duration,
            retrans_duration: self.times.retrans_duration,
            packet_delay,
            avg_srtt,
            abandoned: self.abandoned,
        };

        net_debug!("{}: finalized with {} stalls, {} retransmitted and {} lost ranges",
            self.name, report.stalls.len(), report.retransmitted_ranges, report.lost_ranges);
        report
    }

    /// Settle the range lists and turn provisional stalls into classified ones.
    fn reconcile(&mut self) -> Vec<ClassifiedStall> {
        if let Some(open) = self.reordering_open.take() {
            self.ranges.reordering.append(open.begin, open.end);
        }

        self.ranges.lost = self.ranges.retransmitted.subtract(&self.ranges.spurious);

        let mss = self.send.max_segment_size;
        self.ranges.reordering.trim(&self.ranges.lost, mss);
        self.ranges.reordering.trim(&self.ranges.blocks, mss);

        let ranges = &self.ranges;
        mem::take(&mut self.stalls)
            .into_iter()
            .map(|stall| ClassifiedStall::new(stall.finalize(ranges)))
            .collect()
    }
}

impl State {
    /// Whether no further segment changes anything.
    pub fn is_terminal(self) -> bool {
        match self {
            State::Close | State::Closing => true,
            _ => false,
        }
    }
}

impl Recovery {
    /// Whether a loss is being repaired.
    pub fn is_recovery(self) -> bool {
        match self {
            Recovery::Recovery { .. } => true,
            Recovery::Open => false,
        }
    }
}
