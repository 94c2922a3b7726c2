use core::{fmt, iter, slice};

use crate::wire::SeqNumber;

/// A half-open interval `[begin, end)` in sequence space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Range {
    /// First sequence number in the range.
    pub begin: SeqNumber,
    /// First sequence number after the range.
    pub end: SeqNumber,
}

/// A sorted set of pairwise disjoint ranges.
///
/// Inserting coalesces overlapping and adjacent ranges so no two entries ever touch. Ordering of
/// the entries uses sequence space comparison, which is only meaningful while all of them lie
/// within half of the sequence space of each other. That holds for the bookkeeping of a single
/// connection since the window is far smaller.
///
/// All operations are linear in the number of entries, which stays small in practice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeList {
    ranges: Vec<Range>,
}

/// The range lists owned by one connection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ranges {
    /// Payload that was sent more than once.
    pub retransmitted: RangeList,
    /// Retransmitted payload the receiver reported as duplicate.
    pub spurious: RangeList,
    /// Retransmitted payload that was not spurious. Only filled during finalization.
    pub lost: RangeList,
    /// Holes below selectively acknowledged data, candidates for reordering.
    pub reordering: RangeList,
    /// Everything the receiver ever acknowledged selectively.
    pub blocks: RangeList,
}

impl Range {
    /// Create a range from its bounds.
    pub fn new(begin: SeqNumber, end: SeqNumber) -> Self {
        Range { begin, end }
    }

    /// Number of sequence numbers contained.
    ///
    /// Zero for empty and for inverted ranges.
    pub fn len(&self) -> u32 {
        if self.end.after(self.begin) {
            (self.end - self.begin) as u32
        } else {
            0
        }
    }

    /// Whether the range contains nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the two ranges share at least one sequence number.
    pub fn overlaps(&self, other: &Range) -> bool {
        self.begin.before(other.end) && other.begin.before(self.end)
    }

    /// Whether a sequence number lies within the range.
    pub fn contains(&self, seq: SeqNumber) -> bool {
        !seq.before(self.begin) && seq.before(self.end)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

impl RangeList {
    /// Create an empty list.
    pub fn new() -> Self {
        RangeList::default()
    }

    /// The number of disjoint ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no range is stored.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Iterate over the ranges in sequence order.
    pub fn iter(&self) -> slice::Iter<'_, Range> {
        self.ranges.iter()
    }

    /// View the ranges as a sorted slice.
    pub fn as_slice(&self) -> &[Range] {
        &self.ranges
    }

    /// Add `[begin, end)` to the set.
    ///
    /// All stored ranges that overlap or touch the new one are merged with it into a single
    /// entry. Empty and inverted ranges are ignored.
    ///
    /// ## Example
    ///
    /// ```
    /// # use tapo::storage::RangeList;
    /// # use tapo::wire::SeqNumber;
    /// let mut list = RangeList::new();
    /// list.append(SeqNumber(0), SeqNumber(10));
    /// list.append(SeqNumber(20), SeqNumber(30));
    /// // Bridges the gap and touches both neighbours.
    /// list.append(SeqNumber(10), SeqNumber(20));
    /// assert_eq!(list.len(), 1);
    /// assert_eq!(list.size(), 30);
    /// ```
    pub fn append(&mut self, begin: SeqNumber, end: SeqNumber) {
        if !begin.before(end) {
            return;
        }

        // First entry that is not completely before the new range, adjacency included.
        let start = self.ranges
            .iter()
            .position(|range| !range.end.before(begin))
            .unwrap_or(self.ranges.len());

        let mut merged = Range::new(begin, end);
        let mut stop = start;
        while let Some(range) = self.ranges.get(stop) {
            if range.begin.after(merged.end) {
                break;
            }
            merged.begin = merged.begin.min(range.begin);
            merged.end = merged.end.max(range.end);
            stop += 1;
        }

        self.ranges.splice(start..stop, iter::once(merged));
    }

    /// The total number of sequence numbers in the set.
    pub fn size(&self) -> u32 {
        self.ranges.iter().map(Range::len).sum()
    }

    /// The number of sequence numbers of the set that lie within `[lo, hi)`.
    pub fn size_within(&self, lo: SeqNumber, hi: SeqNumber) -> u32 {
        self.ranges
            .iter()
            .map(|range| Range::new(range.begin.max(lo), range.end.min(hi)).len())
            .sum()
    }

    /// The number of stored ranges overlapping `range`.
    pub fn count_overlapping(&self, range: Range) -> usize {
        self.ranges
            .iter()
            .filter(|stored| stored.overlaps(&range))
            .count()
    }

    /// The parts of `self` that are not covered by `other`.
    ///
    /// ## Example
    ///
    /// ```
    /// # use tapo::storage::RangeList;
    /// # use tapo::wire::SeqNumber;
    /// let mut retransmitted = RangeList::new();
    /// retransmitted.append(SeqNumber(0), SeqNumber(3000));
    /// let mut spurious = RangeList::new();
    /// spurious.append(SeqNumber(1000), SeqNumber(2000));
    ///
    /// let lost = retransmitted.subtract(&spurious);
    /// assert_eq!(lost.len(), 2);
    /// assert_eq!(lost.size(), 2000);
    /// ```
    pub fn subtract(&self, other: &RangeList) -> RangeList {
        let mut result = RangeList::new();
        for range in &self.ranges {
            let mut remaining = range.begin;
            for cover in other.ranges.iter().filter(|cover| cover.overlaps(range)) {
                if cover.begin.after(remaining) {
                    result.ranges.push(Range::new(remaining, cover.begin));
                }
                remaining = remaining.max(cover.end);
            }
            if remaining.before(range.end) {
                result.ranges.push(Range::new(remaining, range.end));
            }
        }
        result
    }

    /// The parts of `self` that are also covered by `other`.
    pub fn intersect(&self, other: &RangeList) -> RangeList {
        let mut result = RangeList::new();
        for range in &self.ranges {
            for cover in other.ranges.iter().filter(|cover| cover.overlaps(range)) {
                let part = Range::new(range.begin.max(cover.begin), range.end.min(cover.end));
                result.ranges.push(part);
            }
        }
        result
    }

    /// Remove everything covered by `other`, then drop remnants of at most `noise_floor` length.
    ///
    /// Used to clean up reordering candidates: the lost and acknowledged parts are not reordered
    /// and what remains below a segment size is considered noise.
    pub fn trim(&mut self, other: &RangeList, noise_floor: u32) {
        let remaining = self.subtract(other);
        self.ranges = remaining.ranges
            .into_iter()
            .filter(|range| range.len() > noise_floor)
            .collect();
    }
}

impl iter::FromIterator<Range> for RangeList {
    fn from_iter<I: IntoIterator<Item=Range>>(iter: I) -> Self {
        let mut list = RangeList::new();
        for range in iter {
            list.append(range.begin, range.end);
        }
        list
    }
}

impl<'a> IntoIterator for &'a RangeList {
    type Item = &'a Range;
    type IntoIter = slice::Iter<'a, Range>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

impl fmt::Display for RangeList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[ ")?;
        for range in &self.ranges {
            write!(f, "{} ", range)?;
        }
        write!(f, "]")
    }
}
