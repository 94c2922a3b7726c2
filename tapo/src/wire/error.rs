use core::fmt;

/// The error type for segments that can not be analyzed.
///
/// The analysis itself never fails. These are returned by the checks a caller runs on decoded
/// input before feeding it to a connection, and by trace readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A record could not be parsed because it was shorter than assumed.
    ///
    /// For textual traces this means a line ended before all mandatory fields were read.
    Truncated,

    /// A record could not be recognized and was dropped.
    ///
    /// E.g. a direction marker that is neither inbound nor outbound, or a flag letter that does
    /// not name a TCP control flag.
    Unrecognized,

    /// A segment was recognized but was self-contradictory.
    ///
    /// Examples: a TCP segment with both SYN and FIN flags set; a selective acknowledgement block
    /// that ends before it begins.
    Malformed,
}

/// The result type for segment validation.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated     => write!(f, "truncated record"),
            Error::Unrecognized  => write!(f, "unrecognized field"),
            Error::Malformed     => write!(f, "malformed segment"),
        }
    }
}

impl std::error::Error for Error {}
