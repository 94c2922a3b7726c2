//! The connection analyzer.
//!
//! A [`Connection`] consumes the segments of one TCP connection and reconstructs the sender's
//! state from them. Whenever the gap to the previous segment exceeds the stall threshold it takes
//! a [`ProvisionalStall`] snapshot. Whether the retransmissions around a stall were needed is only
//! known after the flow ended, so [`Connection::finalize`] completes each snapshot into a
//! [`StallEvent`], assigns a [`StallCategory`] with [`classify`] and collects everything into a
//! [`Report`].
//!
//! ```
//! # use std::net::{IpAddr, Ipv4Addr};
//! # use tapo::Config;
//! # use tapo::tcp::{Connection, State};
//! # use tapo::time::Instant;
//! # use tapo::wire::{Direction, FourTuple, Segment, SeqNumber};
//! let tuple = FourTuple {
//!     local: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
//!     remote: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
//!     local_port: 80,
//!     remote_port: 40000,
//! };
//! let mut connection = Connection::new(tuple, Config::default());
//!
//! let mut syn = Segment::new(Instant::from_millis(0), Direction::In, SeqNumber(100));
//! syn.flags.set_syn(true);
//! syn.window_len = 65535;
//! connection.arrives(&syn);
//! assert_eq!(connection.state(), State::SynReceived);
//!
//! let report = connection.finalize();
//! assert!(!report.data_observed);
//! assert!(report.stalls.is_empty());
//! ```
//!
//! [`Connection`]: struct.Connection.html
//! [`Connection::finalize`]: struct.Connection.html#method.finalize
//! [`ProvisionalStall`]: struct.ProvisionalStall.html
//! [`StallEvent`]: struct.StallEvent.html
//! [`StallCategory`]: enum.StallCategory.html
//! [`classify`]: fn.classify.html
//! [`Report`]: struct.Report.html
mod classify;
mod connection;
mod report;
mod stall;

#[cfg(test)]
mod tests;

pub use self::classify::{classify, Rule, RULES, StallCategory};
pub use self::connection::{Connection, InFlight, Receive, Recovery, Send, State};
pub use self::report::{ClassifiedStall, Report};
pub use self::stall::{ProvisionalStall, StallEvent};
