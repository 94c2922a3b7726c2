//! Passive diagnosis of TCP stalls.
//!
//! ## Table of contents
//!
//! This is also a recommended reading order but feel free to skip ahead, each chapter tries to be
//! somewhat self-contained.
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The wire module](wire/index.html)
//!    1. [Sequence numbers](wire/struct.SeqNumber.html)
//!    1. [Observed segments](wire/struct.Segment.html)
//!    1. [Selective acknowledgements](wire/struct.SackState.html)
//! 3. [The connection analyzer](tcp/index.html)
//!    1. [Per-segment state machine](tcp/struct.Connection.html)
//!    1. [Stall events](tcp/struct.StallEvent.html)
//!    1. [Root causes](tcp/enum.StallCategory.html)
//!    1. [Reports](tcp/struct.Report.html)
//! 4. Internals
//!    1. [The storage module](storage/index.html)
//!    2. [Round trip estimation](rtt/index.html)
//!
//! ## Design and relevant core concepts
//!
//! The analyzer sits *off-path*. It sees the segments of one TCP connection in the order they
//! were captured, in both directions, but is neither of the two endpoints. From this stream it
//! reconstructs just enough of the sender's state (sequence cursors, recovery, round trip time)
//! to notice when forward progress halts for longer than the round trip would explain. Each such
//! stall is snapshotted when it is noticed and explained once the connection ends, when the
//! retransmission history is complete.
//!
//! Nothing in here parses packets. The caller demultiplexes connections and hands over already
//! decoded [`Segment`]s; one [`Connection`] is one independent unit of work without any shared
//! state, so separate connections may be analyzed on separate threads.
//!
//! [`Segment`]: wire/struct.Segment.html
//! [`Connection`]: tcp/struct.Connection.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;
pub mod config;
pub mod rtt;
pub mod storage;
pub mod tcp;
pub mod time;
pub mod wire;

pub use config::{Config, Transfer};
