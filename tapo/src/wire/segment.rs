use core::fmt;
use std::net::IpAddr;

use crate::storage::Range;
use crate::time::Instant;
use super::{Error, Result, SeqNumber};

mod field {
    pub(crate) const FLG_FIN: u16 = 0x001;
    pub(crate) const FLG_SYN: u16 = 0x002;
    pub(crate) const FLG_RST: u16 = 0x004;
    pub(crate) const FLG_PSH: u16 = 0x008;
    pub(crate) const FLG_ACK: u16 = 0x010;
}

/// A set of tcp flags.
///
/// Only the control flags relevant to connection tracking have accessors. The bit layout matches
/// the TCP header so decoded flag words can be passed through unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags(pub u16);

/// The direction of a segment, relative to the analyzed host.
///
/// The analyzed host is the data sender (usually a server). Its data and retransmissions are
/// `Out`; requests, acknowledgements and window updates of the peer are `In`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sent by the remote peer towards the analyzed host.
    In,
    /// Sent by the analyzed host.
    Out,
}

/// Addresses and ports identifying a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FourTuple {
    /// Address of the analyzed host.
    pub local: IpAddr,
    /// Address of the peer.
    pub remote: IpAddr,
    /// Port of the analyzed host.
    pub local_port: u16,
    /// Port of the peer.
    pub remote_port: u16,
}

/// The decoded header of one observed segment.
///
/// This is everything the analysis consumes from a packet; options are already parsed. At most
/// four selective acknowledgement blocks fit into the TCP option space, in the order they
/// appeared on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// The capture timestamp.
    pub time: Instant,
    /// Which side sent it.
    pub direction: Direction,
    /// The control flags.
    pub flags: Flags,
    /// The sequence number of the first byte (or of the SYN/FIN).
    pub seq_number: SeqNumber,
    /// The acknowledgement number, meaningful when the ACK flag is set.
    pub ack_number: SeqNumber,
    /// The unscaled advertised window.
    pub window_len: u16,
    /// The window scale option, only present on SYN segments.
    pub window_scale: Option<u8>,
    /// Selective acknowledgement blocks.
    pub sack_ranges: [Option<Range>; 4],
    /// Length of the payload in bytes.
    pub payload_len: u32,
}

impl Flags {
    /// Return the FIN flag.
    #[inline]
    pub fn fin(&self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    #[inline]
    pub fn syn(&self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    #[inline]
    pub fn rst(&self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    #[inline]
    pub fn psh(&self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    #[inline]
    pub fn ack(&self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Set the FIN flag.
    #[inline]
    pub fn set_fin(&mut self, value: bool) {
        self.set(field::FLG_FIN, value)
    }

    /// Set the SYN flag.
    #[inline]
    pub fn set_syn(&mut self, value: bool) {
        self.set(field::FLG_SYN, value)
    }

    /// Set the RST flag.
    #[inline]
    pub fn set_rst(&mut self, value: bool) {
        self.set(field::FLG_RST, value)
    }

    /// Set the PSH flag.
    #[inline]
    pub fn set_psh(&mut self, value: bool) {
        self.set(field::FLG_PSH, value)
    }

    /// Set the ACK flag.
    #[inline]
    pub fn set_ack(&mut self, value: bool) {
        self.set(field::FLG_ACK, value)
    }

    fn set(&mut self, bit: u16, value: bool) {
        let flag = if value { bit } else { 0 };
        let without = self.0 & !bit;
        self.0 = without | flag;
    }

    /// Return the length of a control flag, in terms of sequence space.
    pub fn sequence_len(self) -> u32 {
        (if self.syn() { 1 } else { 0 })
        + (if self.fin() { 1 }  else { 0 })
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let letters = [
            (self.syn(), 'S'),
            (self.ack(), 'A'),
            (self.fin(), 'F'),
            (self.rst(), 'R'),
            (self.psh(), 'P'),
        ];
        let mut any = false;
        for &(set, letter) in letters.iter() {
            if set {
                write!(f, "{}", letter)?;
                any = true;
            }
        }
        if !any {
            write!(f, ".")?;
        }
        Ok(())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
        }
    }
}

impl FourTuple {
    /// A short name of the connection, the peer address and port.
    pub fn name(&self) -> String {
        format!("{}.{}", self.remote, self.remote_port)
    }
}

impl Segment {
    /// A bare segment without flags, payload or options.
    ///
    /// Meant as the starting point for building segments field by field.
    pub fn new(time: Instant, direction: Direction, seq_number: SeqNumber) -> Self {
        Segment {
            time,
            direction,
            flags: Flags::default(),
            seq_number,
            ack_number: SeqNumber(0),
            window_len: 0,
            window_scale: None,
            sack_ranges: [None; 4],
            payload_len: 0,
        }
    }

    /// Check that the segment is not self-contradictory.
    ///
    /// Header decoding should have rejected these already but the analysis assumes well-formed
    /// input, so callers feeding from less trusted sources can filter with this.
    pub fn check(&self) -> Result<()> {
        if self.flags.syn() && self.flags.fin() {
            return Err(Error::Malformed);
        }

        if self.flags.rst() && self.payload_len > 0 {
            return Err(Error::Malformed);
        }

        let inverted = self.sack_ranges
            .iter()
            .filter_map(|block| *block)
            .any(|block| block.end.before(block.begin));
        if inverted {
            return Err(Error::Malformed);
        }

        Ok(())
    }

    /// Length of the segment in sequence space, payload plus SYN and FIN.
    pub fn sequence_len(&self) -> u32 {
        self.payload_len + self.flags.sequence_len()
    }

    /// The sequence number following this segment.
    pub fn seq_end(&self) -> SeqNumber {
        self.seq_number + self.sequence_len()
    }

    /// Whether any selective acknowledgement block is present.
    pub fn has_sack(&self) -> bool {
        self.sack_ranges.iter().any(Option::is_some)
    }
}
