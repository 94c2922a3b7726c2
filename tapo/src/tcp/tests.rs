use std::net::{IpAddr, Ipv4Addr};

use crate::config::Config;
use crate::storage::Range;
use crate::time::{Duration, Instant};
use crate::wire::{Direction, FourTuple, Segment, SeqNumber};
use super::*;

fn tuple() -> FourTuple {
    FourTuple {
        local: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
        remote: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
        local_port: 80,
        remote_port: 52000,
    }
}

fn connection() -> Connection {
    Connection::new(tuple(), Config::default())
}

fn range(begin: u32, end: u32) -> Range {
    Range::new(SeqNumber(begin), SeqNumber(end))
}

fn inbound(micros: i64, seq: u32, ack: u32) -> Segment {
    let mut segment = Segment::new(Instant::from_micros(micros), Direction::In, SeqNumber(seq));
    segment.flags.set_ack(true);
    segment.ack_number = SeqNumber(ack);
    segment.window_len = 65535;
    segment
}

fn outbound(micros: i64, seq: u32, len: u32) -> Segment {
    let mut segment = Segment::new(Instant::from_micros(micros), Direction::Out, SeqNumber(seq));
    segment.flags.set_ack(true);
    segment.ack_number = SeqNumber(201);
    segment.payload_len = len;
    segment
}

fn with_sack(mut segment: Segment, blocks: &[(u32, u32)]) -> Segment {
    for (slot, &(begin, end)) in segment.sack_ranges.iter_mut().zip(blocks) {
        *slot = Some(range(begin, end));
    }
    segment
}

fn millis(millis: i64) -> i64 {
    millis * 1000
}

/// Handshake at 0, 1 and 2ms followed by a 100 byte request at 3ms.
///
/// Leaves a round trip sample of 1ms, the server sequence space starts at 1.
fn established() -> Connection {
    let mut connection = connection();
    handshake(&mut connection);

    let mut request = inbound(millis(3), 101, 1);
    request.payload_len = 100;
    connection.arrives(&request);
    connection
}

fn handshake(connection: &mut Connection) {
    let mut syn = Segment::new(Instant::from_millis(0), Direction::In, SeqNumber(100));
    syn.flags.set_syn(true);
    syn.window_len = 65535;
    connection.arrives(&syn);

    let mut syn_ack = Segment::new(Instant::from_millis(1), Direction::Out, SeqNumber(0));
    syn_ack.flags.set_syn(true);
    syn_ack.flags.set_ack(true);
    syn_ack.ack_number = SeqNumber(101);
    connection.arrives(&syn_ack);

    connection.arrives(&inbound(millis(2), 101, 1));
}

/// Three full segments `[1, 3001)` right after the request.
fn send_three(connection: &mut Connection) {
    connection.arrives(&outbound(4_000, 1, 1000));
    connection.arrives(&outbound(4_100, 1001, 1000));
    connection.arrives(&outbound(4_200, 2001, 1000));
}

#[test]
fn handshake_states() {
    let mut connection = connection();
    assert_eq!(connection.state(), State::Listen);

    let mut syn = Segment::new(Instant::from_millis(0), Direction::In, SeqNumber(100));
    syn.flags.set_syn(true);
    syn.window_len = 65535;
    syn.window_scale = Some(7);
    connection.arrives(&syn);
    assert_eq!(connection.state(), State::SynReceived);
    assert_eq!(connection.recv().initial_window, 65535 << 7);

    let mut syn_ack = Segment::new(Instant::from_millis(1), Direction::Out, SeqNumber(0));
    syn_ack.flags.set_syn(true);
    syn_ack.flags.set_ack(true);
    syn_ack.ack_number = SeqNumber(101);
    connection.arrives(&syn_ack);
    assert_eq!(connection.state(), State::SynSent);
    assert_eq!(connection.send().next, SeqNumber(1));

    let mut ack = inbound(millis(2), 101, 1);
    ack.window_len = 100;
    connection.arrives(&ack);
    assert_eq!(connection.state(), State::Established);
    assert_eq!(connection.recv().window, 100 << 7);
    assert_eq!(connection.rtt().srtt(), Duration::from_millis(1));
    assert_eq!(connection.stall_count(), 0);
}

#[test]
fn reset_is_terminal() {
    let mut connection = established();
    let mut rst = inbound(millis(4), 201, 1);
    rst.flags.set_rst(true);
    connection.arrives(&rst);
    assert_eq!(connection.state(), State::Closing);

    let mut syn = Segment::new(Instant::from_millis(10), Direction::In, SeqNumber(500));
    syn.flags.set_syn(true);
    connection.arrives(&syn);
    connection.arrives(&outbound(millis(900), 1, 1000));
    assert_eq!(connection.state(), State::Closing);
    assert_eq!(connection.packets_out(), 1);
    assert_eq!(connection.stall_count(), 0);

    let mut fresh = self::connection();
    let mut rst = outbound(0, 1, 0);
    rst.flags.set_rst(true);
    fresh.arrives(&rst);
    assert_eq!(fresh.state(), State::Closing);
}

#[test]
fn retransmission_enters_recovery() {
    let mut connection = connection();
    connection.arrives(&outbound(millis(0), 0, 1000));
    connection.arrives(&outbound(millis(1), 1000, 1000));
    assert_eq!(connection.recovery(), Recovery::Open);
    assert_eq!(connection.send().next, SeqNumber(2000));

    connection.arrives(&outbound(millis(2), 0, 1000));
    assert_eq!(connection.ranges().retransmitted.as_slice(), &[range(0, 1000)]);
    assert_eq!(connection.recovery(), Recovery::Recovery { point: SeqNumber(2000) });
    assert_eq!(connection.send().next, SeqNumber(2000));
    assert_eq!(connection.retransmissions(), 1);
    assert_eq!(connection.send().flow_size, 2000);
}

#[test]
fn recovery_ends_on_ack_of_point() {
    let mut connection = established();
    send_three(&mut connection);
    connection.arrives(&outbound(millis(50), 1, 1000));
    assert!(connection.recovery().is_recovery());

    // Partial ack keeps recovery.
    connection.arrives(&inbound(millis(60), 201, 2001));
    assert!(connection.recovery().is_recovery());

    connection.arrives(&inbound(millis(61), 201, 3001));
    assert_eq!(connection.recovery(), Recovery::Open);
}

#[test]
fn recovery_ends_on_new_data_past_point() {
    let mut connection = established();
    send_three(&mut connection);
    connection.arrives(&outbound(millis(50), 1001, 1000));
    assert!(connection.recovery().is_recovery());
    connection.arrives(&outbound(millis(51), 3001, 1000));
    assert_eq!(connection.recovery(), Recovery::Open);
}

#[test]
fn threshold_is_strict() {
    let mut connection = established();
    // Exactly the 200ms floor.
    connection.arrives(&outbound(millis(203), 1, 1000));
    assert_eq!(connection.stall_count(), 0);
    // Truncated to 200ms.
    connection.arrives(&outbound(403_900, 1001, 1000));
    assert_eq!(connection.stall_count(), 0);
    connection.arrives(&outbound(605_000, 2001, 1000));
    assert_eq!(connection.stall_count(), 1);

    let stall = &connection.stalls()[0];
    assert_eq!(stall.duration, Duration::from_millis(201));
    assert!(stall.duration > connection.config().stall_threshold(stall.srtt));
    assert_eq!(connection.last_stall(), Some((Instant::from_millis(605), SeqNumber(1))));
}

#[test]
fn first_segment_never_stalls() {
    let mut connection = connection();
    connection.arrives(&outbound(millis(90_000), 0, 1000));
    assert_eq!(connection.stall_count(), 0);
}

#[test]
fn head_stall_is_data_unavailable() {
    let mut connection = established();
    assert!(connection.is_head());
    connection.arrives(&outbound(millis(500), 1, 1000));
    assert!(!connection.is_head());
    assert_eq!(connection.stall_count(), 1);

    let report = connection.finalize();
    assert_eq!(report.stalls.len(), 1);
    assert_eq!(report.stalls[0].category, StallCategory::DataUnavailable);
    assert!(report.stalls[0].event.stall.head);
    assert_eq!(report.files, 1);
}

#[test]
fn loss_with_small_flight() {
    let mut connection = established();
    send_three(&mut connection);
    connection.arrives(&inbound(millis(10), 201, 1001));
    connection.arrives(&outbound(millis(400), 1001, 1000));
    connection.arrives(&inbound(millis(420), 201, 3001));
    assert_eq!(connection.recovery(), Recovery::Open);

    let stall = connection.stalls()[0];
    assert_eq!(stall.duration, Duration::from_millis(390));
    assert_eq!(stall.outstanding, 2000);
    assert_eq!(stall.snd_una, SeqNumber(1001));
    assert_eq!(stall.snd_nxt, SeqNumber(3001));
    assert_eq!(stall.last_direction, Some(Direction::In));
    assert!(!stall.recovery);

    let report = connection.finalize();
    assert_eq!(report.lost_ranges, 1);
    assert_eq!(report.retransmitted_ranges, 1);
    assert_eq!(report.stall_duration, Duration::from_millis(390));
    assert_eq!(report.retrans_duration, Duration::from_millis(390));

    let stall = report.stalls[0];
    assert_eq!(stall.event.lost, 1);
    assert_eq!(stall.event.lost_num, 1);
    assert_eq!(stall.event.spurious_num, 0);
    assert_eq!(stall.category, StallCategory::SmallRetransCwndLimitedIn);
}

#[test]
fn send_records_pruned_by_acks() {
    let mut connection = established();
    for index in 0..50 {
        let seq = 1 + 1000 * index as u32;
        connection.arrives(&outbound(4_000 + index * 20, seq, 1000));
        connection.arrives(&inbound(4_010 + index * 20, 201, seq + 1000));
        assert_eq!(connection.send_records(), 0);
    }
    assert_eq!(connection.send().unacked, SeqNumber(50_001));

    connection.arrives(&outbound(millis(6), 50_001, 1000));
    connection.arrives(&outbound(6_100, 51_001, 1000));
    connection.arrives(&inbound(millis(7), 201, 51_001));
    assert_eq!(connection.send_records(), 1);
}

#[test]
fn loss_across_sequence_wrap() {
    let start = 0xFFFF_F800u32;
    let mut connection = connection();
    let mut syn = Segment::new(Instant::from_millis(0), Direction::In, SeqNumber(100));
    syn.flags.set_syn(true);
    syn.window_len = 65535;
    connection.arrives(&syn);
    let mut syn_ack = Segment::new(Instant::from_millis(1), Direction::Out, SeqNumber(start - 1));
    syn_ack.flags.set_syn(true);
    syn_ack.flags.set_ack(true);
    syn_ack.ack_number = SeqNumber(101);
    connection.arrives(&syn_ack);
    connection.arrives(&inbound(millis(2), 101, start));
    let mut request = inbound(millis(3), 101, start);
    request.payload_len = 100;
    connection.arrives(&request);

    connection.arrives(&outbound(4_000, start, 1000));
    connection.arrives(&outbound(4_100, start + 1000, 1000));
    connection.arrives(&outbound(4_200, start + 2000, 1000));
    assert_eq!(connection.send().next, SeqNumber(952));

    connection.arrives(&inbound(millis(10), 201, start + 2000));
    connection.arrives(&outbound(millis(400), start + 2000, 1000));
    assert_eq!(connection.recovery(), Recovery::Recovery { point: SeqNumber(952) });
    assert_eq!(connection.ranges().retransmitted.as_slice(), &[range(start + 2000, 952)]);

    let stall = connection.stalls()[0];
    assert_eq!(stall.duration, Duration::from_millis(390));
    assert_eq!(stall.outstanding, 1000);
    assert_eq!(stall.snd_nxt, SeqNumber(952));

    connection.arrives(&inbound(millis(420), 201, 952));
    assert_eq!(connection.recovery(), Recovery::Open);
    assert_eq!(*connection.in_flight(), InFlight::default());

    let report = connection.finalize();
    assert_eq!(report.lost_ranges, 1);
    assert_eq!(report.stalls[0].event.lost_num, 1);
    assert_eq!(report.flow_size, 3000);
}

#[test]
fn transfer_time_ends_at_last_inbound() {
    let mut connection = established();
    send_three(&mut connection);
    connection.arrives(&inbound(millis(30), 201, 3001));

    let mut fin = outbound(millis(4000), 3001, 0);
    fin.flags.set_fin(true);
    connection.arrives(&fin);
    assert_eq!(connection.stall_count(), 1);

    let report = connection.finalize();
    assert_eq!(report.transfer_time, Duration::from_millis(27));
    assert!(report.rate() > 100_000.0);
}

#[test]
fn duplicate_sack_marks_spurious() {
    let mut connection = established();
    send_three(&mut connection);
    connection.arrives(&outbound(millis(300), 1, 1000));
    assert_eq!(connection.stall_count(), 1);

    let ack = with_sack(inbound(millis(310), 201, 3001), &[(1, 1001)]);
    connection.arrives(&ack);
    assert_eq!(connection.ranges().spurious.as_slice(), &[range(1, 1001)]);
    assert_eq!(connection.recovery(), Recovery::Open);

    let report = connection.finalize();
    assert_eq!(report.lost_ranges, 0);
    assert_eq!(report.spurious_ranges, 1);
    let stall = report.stalls[0];
    assert_eq!(stall.event.spurious_num, 1);
    assert_eq!(stall.event.spurious, 1);
    assert_eq!(stall.event.lost_num, 0);
    assert_eq!(stall.category, StallCategory::RetransAckDelay);
}

#[test]
fn sack_hole_and_flight() {
    let mut connection = established();
    send_three(&mut connection);
    connection.arrives(&with_sack(inbound(millis(10), 201, 1), &[(2001, 3001)]));

    let in_flight = *connection.in_flight();
    assert_eq!(in_flight.packets_out, 3000);
    assert_eq!(in_flight.sacked_out, 1000);
    assert_eq!(in_flight.fackets_out, 3000);
    assert_eq!(in_flight.holes, 2000);
    assert_eq!(in_flight.outstanding, 2000);

    connection.arrives(&inbound(millis(12), 201, 3001));
    assert_eq!(*connection.in_flight(), InFlight::default());

    let report = connection.finalize();
    assert_eq!(report.reordering_ranges, 1);
    assert_eq!(connection.ranges().reordering.as_slice(), &[range(1, 2001)]);
}

#[test]
fn reordering_candidates() {
    let mut connection = established();
    for index in 0..8 {
        connection.arrives(&outbound(4_000 + index * 10, 1 + 1000 * index as u32, 1000));
    }

    connection.arrives(&with_sack(inbound(millis(10), 201, 1001), &[(3001, 4001)]));
    // Acknowledging part of the hole keeps the candidate open.
    connection.arrives(&with_sack(inbound(millis(11), 201, 2001), &[(3001, 4001)]));
    // Strictly after the open range, which is closed.
    connection.arrives(&with_sack(inbound(millis(12), 201, 5001), &[(6001, 7001)]));
    assert_eq!(connection.ranges().reordering.as_slice(), &[range(1001, 3001)]);

    connection.finalize();
    // The second candidate is a single segment, that is noise.
    assert_eq!(connection.ranges().reordering.as_slice(), &[range(1001, 3001)]);
}

#[test]
fn stale_reordering_is_dropped() {
    let mut connection = established();
    for index in 0..5 {
        connection.arrives(&outbound(4_000 + index * 10, 1 + 1000 * index as u32, 1000));
    }

    connection.arrives(&with_sack(inbound(millis(10), 201, 1001), &[(4001, 5001)]));
    // A reordered old acknowledgement with a hole below the open range.
    connection.arrives(&with_sack(inbound(millis(11), 201, 1), &[(501, 1001)]));

    connection.finalize();
    assert_eq!(connection.ranges().reordering.as_slice(), &[range(1001, 4001)]);
}

#[test]
fn inbound_stall_is_packet_delay() {
    let mut connection = established();
    connection.arrives(&outbound(millis(4), 1, 1000));
    connection.arrives(&inbound(millis(500), 201, 1001));

    let report = connection.finalize();
    assert_eq!(report.stalls.len(), 1);
    assert_eq!(report.stalls[0].category, StallCategory::PacketDelay);
    assert_eq!(report.stalls[0].event.stall.srtt, Duration::from_millis(1));
    assert_eq!(report.packet_delay, Duration::from_millis(494));
}

#[test]
fn tail_heuristic() {
    let mut connection = established();
    connection.arrives(&outbound(millis(4), 1, 1000));
    assert!(!connection.is_tail());
    connection.arrives(&outbound(4_100, 1001, 300));
    assert!(connection.is_tail());
    assert_eq!(connection.tail_burst(), 1);
    connection.arrives(&outbound(4_200, 1301, 1000));
    assert!(!connection.is_tail());
    assert_eq!(connection.tail_burst(), 2);

    let mut fin = outbound(millis(5), 2301, 0);
    fin.flags.set_fin(true);
    connection.arrives(&fin);
    assert!(connection.is_tail());
    assert_eq!(connection.tail_burst(), 0);
}

#[test]
fn server_close() {
    let mut connection = established();
    connection.arrives(&outbound(millis(4), 1, 1000));
    let mut fin = outbound(millis(5), 1001, 0);
    fin.flags.set_fin(true);
    connection.arrives(&fin);
    assert_eq!(connection.state(), State::FinWait2);
    assert_eq!(connection.send().next, SeqNumber(1002));

    connection.arrives(&inbound(millis(6), 201, 1001));
    assert_eq!(connection.state(), State::FinWait2);
    connection.arrives(&inbound(millis(7), 201, 1002));
    assert_eq!(connection.state(), State::Close);
    assert!(!connection.is_abandoned());
}

#[test]
fn abandoned_while_closing() {
    let mut connection = established();
    connection.arrives(&outbound(millis(4), 1, 1000));
    let mut fin = inbound(millis(1000), 201, 1001);
    fin.flags.set_fin(true);
    connection.arrives(&fin);
    assert_eq!(connection.state(), State::FinWait1);
    assert_eq!(connection.recv().unacked, SeqNumber(202));

    let mut ack = outbound(millis(7000), 1001, 0);
    ack.ack_number = SeqNumber(202);
    connection.arrives(&ack);
    assert_eq!(connection.state(), State::Close);
    assert!(connection.is_abandoned());
    assert!(connection.finalize().abandoned);
}

#[test]
fn syn_resynchronizes() {
    let mut connection = established();
    let mut syn = Segment::new(Instant::from_secs(30), Direction::In, SeqNumber(9000));
    syn.flags.set_syn(true);
    syn.window_len = 1000;
    connection.arrives(&syn);
    assert_eq!(connection.state(), State::SynReceived);
    assert_eq!(connection.stall_count(), 0);
    assert_eq!(connection.start(), Some(Instant::from_secs(30)));
    assert_eq!(connection.recv().initial_window, 1000);
}

#[test]
fn finalize_once() {
    let mut connection = established();
    send_three(&mut connection);
    connection.arrives(&inbound(millis(10), 201, 1001));
    connection.arrives(&outbound(millis(400), 1001, 1000));

    let first = connection.finalize().clone();
    assert!(connection.is_finalized());
    assert!(connection.stalls().is_empty());

    connection.arrives(&outbound(millis(2000), 3001, 1000));
    assert_eq!(connection.packets_out(), 5);

    let second = connection.finalize().clone();
    assert_eq!(first, second);
    assert_eq!(second.stalls.len(), 1);
}

#[test]
fn no_payload_no_diagnosis() {
    let mut connection = connection();
    handshake(&mut connection);
    connection.arrives(&inbound(millis(900), 101, 1));
    assert_eq!(connection.stall_count(), 1);

    let report = connection.finalize();
    assert!(!report.data_observed);
    assert!(report.stalls.is_empty());
    assert_eq!(report.name, "10.0.0.2.52000");
}
