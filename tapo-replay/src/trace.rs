//! A line based segment trace.
//!
//! Every line describes one observed segment of a single connection, fields separated by
//! whitespace:
//!
//! ```text
//! <time> <in|out> <seq> <ack> <flags> <window> <len> [wscale=<shift>] [sack=<begin>-<end>,...]
//! ```
//!
//! `time` is in fractional seconds, `flags` are the letters `S`, `A`, `F`, `R`, `P` or a single
//! `.` for none. Empty lines and lines starting with `#` are skipped.
use core::fmt;
use std::io;

use tapo::storage::Range;
use tapo::time::Instant;
use tapo::wire::{self, Direction, Flags, Segment, SeqNumber};

/// Iterator over the segments of a trace.
pub struct Trace<R> {
    lines: io::Lines<R>,
    line: usize,
}

/// An error while reading a trace.
#[derive(Debug)]
pub struct TraceError {
    /// The one-based line on which the error occurred.
    pub line: usize,
    /// What went wrong.
    pub kind: ErrorKind,
}

/// The cause of a [`TraceError`](struct.TraceError.html).
#[derive(Debug)]
pub enum ErrorKind {
    /// Reading the input failed.
    Io(io::Error),
    /// The line does not describe a valid segment.
    Wire(wire::Error),
}

impl<R: io::BufRead> Trace<R> {
    /// Read segments from buffered input.
    pub fn new(input: R) -> Self {
        Trace {
            lines: input.lines(),
            line: 0,
        }
    }
}

impl<R: io::BufRead> Iterator for Trace<R> {
    type Item = Result<Segment, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line += 1;

            let line = match line {
                Ok(line) => line,
                Err(err) => return Some(Err(self.error(ErrorKind::Io(err)))),
            };

            let segment = parse_line(&line)
                .and_then(|segment| segment.map(|segment| segment.check().map(|()| segment)).transpose());
            match segment {
                Ok(Some(segment)) => return Some(Ok(segment)),
                Ok(None) => continue,
                Err(err) => return Some(Err(self.error(ErrorKind::Wire(err)))),
            }
        }
    }
}

impl<R> Trace<R> {
    fn error(&self, kind: ErrorKind) -> TraceError {
        TraceError { line: self.line, kind }
    }
}

/// Parse a single line of a trace.
///
/// Returns `None` for empty lines and comments.
pub fn parse_line(line: &str) -> wire::Result<Option<Segment>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let mut next = || fields.next().ok_or(wire::Error::Truncated);

    let time = parse_time(next()?)?;
    let direction = match next()? {
        "in" => Direction::In,
        "out" => Direction::Out,
        _ => return Err(wire::Error::Unrecognized),
    };
    let seq = SeqNumber(number(next()?)?);

    let mut segment = Segment::new(time, direction, seq);
    segment.ack_number = SeqNumber(number(next()?)?);
    segment.flags = parse_flags(next()?)?;
    segment.window_len = number(next()?)?;
    segment.payload_len = number(next()?)?;

    for option in fields {
        parse_option(&mut segment, option)?;
    }

    Ok(Some(segment))
}

fn number<T: core::str::FromStr>(field: &str) -> wire::Result<T> {
    field.parse().map_err(|_| wire::Error::Unrecognized)
}

fn parse_time(field: &str) -> wire::Result<Instant> {
    let secs: f64 = number(field)?;
    if !secs.is_finite() {
        return Err(wire::Error::Unrecognized);
    }
    Ok(Instant::from_secs_f64(secs))
}

fn parse_flags(field: &str) -> wire::Result<Flags> {
    let mut flags = Flags::default();
    if field == "." {
        return Ok(flags);
    }

    for letter in field.chars() {
        match letter {
            'S' => flags.set_syn(true),
            'A' => flags.set_ack(true),
            'F' => flags.set_fin(true),
            'R' => flags.set_rst(true),
            'P' => flags.set_psh(true),
            _ => return Err(wire::Error::Unrecognized),
        }
    }
    Ok(flags)
}

fn parse_option(segment: &mut Segment, option: &str) -> wire::Result<()> {
    let mut parts = option.splitn(2, '=');
    let name = parts.next().unwrap_or_default();
    let value = parts.next().ok_or(wire::Error::Unrecognized)?;

    match name {
        "wscale" => segment.window_scale = Some(number(value)?),
        "sack" => {
            let blocks = value.split(',');
            let mut count = 0;
            for (slot, block) in segment.sack_ranges.iter_mut().zip(blocks) {
                let mut bounds = block.splitn(2, '-');
                let begin = number(bounds.next().unwrap_or_default())?;
                let end = number(bounds.next().ok_or(wire::Error::Truncated)?)?;
                *slot = Some(Range::new(SeqNumber(begin), SeqNumber(end)));
                count += 1;
            }
            // More blocks than fit into the option space.
            if value.split(',').count() > count {
                return Err(wire::Error::Malformed);
            }
        },
        _ => return Err(wire::Error::Unrecognized),
    }
    Ok(())
}

impl fmt::Display for TraceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::Io(err) => write!(f, "line {}: {}", self.line, err),
            ErrorKind::Wire(err) => write!(f, "line {}: {}", self.line, err),
        }
    }
}

impl std::error::Error for TraceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(err),
            ErrorKind::Wire(err) => Some(err),
        }
    }
}

impl From<io::Error> for TraceError {
    fn from(err: io::Error) -> Self {
        TraceError { line: 0, kind: ErrorKind::Io(err) }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn full_line() {
        let segment = parse_line("1.000250 in 100 0 S 65535 0 wscale=7").unwrap().unwrap();
        assert_eq!(segment.time, Instant::from_micros(1_000_250));
        assert_eq!(segment.direction, Direction::In);
        assert_eq!(segment.seq_number, SeqNumber(100));
        assert!(segment.flags.syn());
        assert!(!segment.flags.ack());
        assert_eq!(segment.window_len, 65535);
        assert_eq!(segment.window_scale, Some(7));
        assert!(!segment.has_sack());
    }

    #[test]
    fn sack_blocks() {
        let segment = parse_line("0.5 in 201 1001 A 512 0 sack=2001-3001,4001-5001")
            .unwrap().unwrap();
        assert_eq!(segment.sack_ranges[0], Some(Range::new(SeqNumber(2001), SeqNumber(3001))));
        assert_eq!(segment.sack_ranges[1], Some(Range::new(SeqNumber(4001), SeqNumber(5001))));
        assert_eq!(segment.sack_ranges[2], None);
    }

    #[test]
    fn skipped_lines() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("# time dir seq ack flags window len"), Ok(None));
    }

    #[test]
    fn bad_lines() {
        assert_eq!(parse_line("0.1 in 1 2 A 100"), Err(wire::Error::Truncated));
        assert_eq!(parse_line("0.1 sideways 1 2 A 100 0"), Err(wire::Error::Unrecognized));
        assert_eq!(parse_line("0.1 in 1 2 X 100 0"), Err(wire::Error::Unrecognized));
        assert_eq!(parse_line("0.1 in 1 2 A 70000 0"), Err(wire::Error::Unrecognized));
        assert_eq!(parse_line("0.1 in 1 2 A 100 0 mss=1460"), Err(wire::Error::Unrecognized));
        assert_eq!(parse_line("0.1 in 1 2 A 100 0 sack=5"), Err(wire::Error::Truncated));
        assert_eq!(parse_line("0.1 in 1 2 A 100 0 sack=1-2,3-4,5-6,7-8,9-10"),
                   Err(wire::Error::Malformed));
    }

    #[test]
    fn iterator_reports_lines() {
        let input = "# header\n0.0 in 100 0 S 65535 0\n\n0.1 out 0 101 SF 65535 0\n";
        let mut trace = Trace::new(input.as_bytes());
        assert!(trace.next().unwrap().is_ok());
        let err = trace.next().unwrap().unwrap_err();
        assert_eq!(err.line, 4);
        assert_eq!(format!("{}", err), "line 4: malformed segment");
        assert!(trace.next().is_none());
    }
}
