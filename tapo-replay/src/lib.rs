//! Offline replay of recorded connections through the stall analyzer.
//!
//! Reads a [segment trace](trace/index.html) of one connection, feeds it to a
//! [`tapo::tcp::Connection`] and returns the finalized report.
pub mod config;
pub mod trace;

use std::io::BufRead;

use tapo::tcp::{Connection, Report};
use tapo::wire::FourTuple;

pub use trace::{parse_line, ErrorKind, Trace, TraceError};

/// Analyze a whole trace.
///
/// Stops at the first line that is not a valid segment. Nothing is reported for a trace that
/// could not be read completely.
pub fn replay<R: BufRead>(input: R, tuple: FourTuple, config: tapo::Config)
    -> Result<Report, TraceError>
{
    let mut connection = Connection::new(tuple, config);
    for segment in Trace::new(input) {
        connection.arrives(&segment?);
    }
    Ok(connection.finalize().clone())
}
