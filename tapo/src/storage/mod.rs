//! Storage for sequence space bookkeeping.
//!
//! A connection remembers which parts of the sequence space were retransmitted, reported as
//! duplicates, selectively acknowledged or delivered out of order. All of these are sets of
//! half-open byte ranges that grow by merging and are combined with set operations when the
//! connection is finalized. The [`RangeList`] is that set.
//!
//! [`RangeList`]: struct.RangeList.html
mod range;

pub use self::range::{Range, RangeList, Ranges};
