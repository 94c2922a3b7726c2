//! Root cause classification of finalized stalls.
//!
//! The decision table is an ordered list of rules where the first matching rule decides. The
//! conditions overlap heavily, many stalls with losses also have a small window or a tail flag,
//! so the order *is* the policy: earlier rules explain a stall better than later ones. Keeping
//! every rule as a named predicate makes that order visible in one place, see [`RULES`].
//!
//! [`RULES`]: static.RULES.html
use crate::wire::Direction;
use super::stall::StallEvent;

labelled_enum! {
    /// The root cause assigned to a stall.
    pub enum StallCategory {
        /// The stall happened at the start of a request, the server had nothing to send yet.
        DataUnavailable = ("DATA_UNAVAILABLE", "File begin stall."),
        /// The stall ended with an incoming segment, acknowledgements of the peer were late.
        PacketDelay = ("PACKET_DELAY", "stall as the ack packet delay."),
        /// The receive window was smaller than a segment.
        ZeroRwnd = ("ZERO_RWND", "Rwnd limited"),
        /// A loss with too little in flight for fast retransmit, caused by a small initial window.
        RetransInitRwndLimited = (
            "RETRANS_INIT_RWND_LIMITED",
            "retrans, because the init_rwnd is small, just 4096."),
        /// Loss of one of the last segments of a burst, only recoverable by timeout.
        TailRetrans = ("TAIL_RETRANS", "tail retrans."),
        /// The burst was complete and the client did not ask for more.
        ClientIdle = ("CLIENT_IDLE", "Tail stall as the server send fin."),
        /// Loss with little in flight due to the congestion window, the last segment came in.
        SmallRetransCwndLimitedIn = (
            "SMALL_RETRANS_CWND_LIMITED_IN",
            "cwnd limited and init rwnd limited, last packet is in"),
        /// Loss with little in flight due to the congestion window, the last segment went out.
        SmallRetransCwndLimitedOut = (
            "SMALL_RETRANS_CWND_LIMITED_OUT",
            "cwnd limited and init rwnd limited, last packet is out"),
        /// Loss with little in flight due to the receive window.
        SmallRetransRwndLimited = (
            "SMALL_RETRANS_RWND_LIMITED",
            "rwnd limited and init rwnd limited"),
        /// The retransmission itself was lost or delayed again.
        RetransDouble = ("RETRANS_DOUBLE", "retrans, because last retrans packet delay"),
        /// An unnecessary retransmission, the acknowledgement was only late.
        RetransAckDelay = ("RETRANS_ACK_DELAY", "retrans, because ack delay"),
        /// Everything in flight was lost.
        RetransSeriesRetrans = ("RETRANS_SERIES_RETRANS", "retrans, because series packets lost"),
        /// A retransmission stall matching no more specific pattern.
        RetransUnknown = ("RETRANS_UNKNOWN", "retrans, unknown"),
        /// The server stalled while sending without any loss, it was busy otherwise.
        ResourceConstraint = ("RESOURCE_CONSTRAINT", "resource constraint"),
        /// None of the above.
        UnknownIssue = ("UNKNOWN_ISSUE", "unknown issue"),
    }
}

/// One entry of the decision table.
#[derive(Clone, Copy)]
pub struct Rule {
    /// The category assigned when the rule matches.
    pub category: StallCategory,
    /// The condition of the rule.
    pub applies: fn(&StallEvent) -> bool,
}

/// The decision table, in order of precedence.
///
/// A stall that no rule matches is an [`UnknownIssue`].
///
/// [`UnknownIssue`]: enum.StallCategory.html#variant.UnknownIssue
pub static RULES: [Rule; 14] = [
    Rule { category: StallCategory::DataUnavailable, applies: at_head },
    Rule { category: StallCategory::PacketDelay, applies: ended_inbound },
    Rule { category: StallCategory::ZeroRwnd, applies: zero_window },
    Rule { category: StallCategory::RetransInitRwndLimited, applies: init_window_limited },
    Rule { category: StallCategory::TailRetrans, applies: tail_retransmission },
    Rule { category: StallCategory::ClientIdle, applies: client_idle },
    Rule { category: StallCategory::SmallRetransCwndLimitedIn, applies: cwnd_limited_after_in },
    Rule { category: StallCategory::SmallRetransCwndLimitedOut, applies: cwnd_limited_after_out },
    Rule { category: StallCategory::SmallRetransRwndLimited, applies: rwnd_limited },
    Rule { category: StallCategory::RetransDouble, applies: double_retransmission },
    Rule { category: StallCategory::RetransAckDelay, applies: ack_delay },
    Rule { category: StallCategory::RetransSeriesRetrans, applies: series_lost },
    Rule { category: StallCategory::RetransUnknown, applies: any_retransmission },
    Rule { category: StallCategory::ResourceConstraint, applies: outbound },
];

/// Assign the root cause of a finalized stall.
pub fn classify(event: &StallEvent) -> StallCategory {
    RULES.iter()
        .find(|rule| (rule.applies)(event))
        .map(|rule| rule.category)
        .unwrap_or(StallCategory::UnknownIssue)
}

impl Rule {
    /// The rule assigning `category`, if any rule does.
    pub fn for_category(category: StallCategory) -> Option<&'static Rule> {
        RULES.iter().find(|rule| rule.category == category)
    }
}

fn is_out(event: &StallEvent) -> bool {
    event.stall.direction == Direction::Out
}

fn retransmissions(event: &StallEvent) -> u64 {
    u64::from(event.spurious_num) + u64::from(event.lost_num)
}

fn three_segments(event: &StallEvent) -> u64 {
    3 * u64::from(event.stall.max_seg_size)
}

fn small_in_flight_loss(event: &StallEvent) -> bool {
    event.lost_num >= 1
        && is_out(event)
        && u64::from(event.stall.outstanding) <= three_segments(event)
}

fn at_head(event: &StallEvent) -> bool {
    event.stall.head
}

fn ended_inbound(event: &StallEvent) -> bool {
    event.stall.direction == Direction::In
}

fn zero_window(event: &StallEvent) -> bool {
    event.stall.rwnd < event.stall.max_seg_size
}

fn init_window_limited(event: &StallEvent) -> bool {
    event.stall.init_rwnd <= 4096
        && u64::from(event.stall.outstanding) <= three_segments(event)
        && event.lost_num >= 1
        && is_out(event)
}

fn tail_retransmission(event: &StallEvent) -> bool {
    let behind = i64::from(event.stall.snd_nxt - event.stall.seg_seq);
    event.lost_num >= 1
        && event.stall.tail
        && is_out(event)
        && behind >= 0
        && behind <= three_segments(event) as i64
}

fn client_idle(event: &StallEvent) -> bool {
    retransmissions(event) == 0 && event.stall.tail
}

fn cwnd_limited_after_in(event: &StallEvent) -> bool {
    small_in_flight_loss(event)
        && u64::from(event.stall.rwnd) > three_segments(event)
        && event.stall.last_direction == Some(Direction::In)
}

fn cwnd_limited_after_out(event: &StallEvent) -> bool {
    small_in_flight_loss(event)
        && u64::from(event.stall.rwnd) > three_segments(event)
        && event.stall.last_direction == Some(Direction::Out)
}

fn rwnd_limited(event: &StallEvent) -> bool {
    small_in_flight_loss(event)
        && u64::from(event.stall.rwnd) <= three_segments(event)
}

fn double_retransmission(event: &StallEvent) -> bool {
    retransmissions(event) >= 2 && is_out(event)
}

fn ack_delay(event: &StallEvent) -> bool {
    event.spurious_num == 1 && event.lost_num == 0 && is_out(event)
}

// Lost segments times their size must match the bytes outstanding exactly.
fn series_lost(event: &StallEvent) -> bool {
    u64::from(event.lost) * u64::from(event.stall.max_seg_size) == u64::from(event.stall.outstanding)
        && is_out(event)
        && retransmissions(event) >= 1
}

fn any_retransmission(event: &StallEvent) -> bool {
    is_out(event) && retransmissions(event) >= 1
}

fn outbound(event: &StallEvent) -> bool {
    is_out(event)
}
