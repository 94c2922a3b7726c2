use crate::storage::{Range, RangeList};
use super::{Segment, SeqNumber};

/// The selective acknowledgement blocks of one incoming segment.
///
/// Blocks start out in wire order as reported by the receiver. The first block may be a
/// duplicate report (D-SACK, RFC 2883) and must be inspected with [`spurious_retrans`] *before*
/// [`normalize`] discards it. After normalization the blocks are sorted, disjoint and all lie
/// above the cumulative acknowledgement.
///
/// [`spurious_retrans`]: #method.spurious_retrans
/// [`normalize`]: #method.normalize
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SackState {
    blocks: Vec<Range>,
}

impl SackState {
    /// Collect the blocks of a segment in wire order.
    pub fn from_segment(segment: &Segment) -> Self {
        SackState {
            blocks: segment.sack_ranges.iter().filter_map(|block| *block).collect(),
        }
    }

    /// Whether no block was reported.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// The blocks in their current order.
    pub fn blocks(&self) -> &[Range] {
        &self.blocks
    }

    /// The range reported as received twice, if any.
    ///
    /// A duplicate report is signalled by a first block that lies at or below the cumulative
    /// acknowledgement `una`, or that is contained in the second block. Duplicates only arise
    /// when data was sent more than once and all copies arrived, so the range marks a
    /// retransmission that was unnecessary.
    pub fn spurious_retrans(&self, una: SeqNumber) -> Option<Range> {
        let first = *self.blocks.first()?;
        if !first.end.after(una) {
            return Some(first);
        }

        let second = self.blocks.get(1)?;
        let contained = !first.begin.before(second.begin) && !first.end.after(second.end);
        if contained {
            Some(first)
        } else {
            None
        }
    }

    /// Bring the blocks into canonical form relative to `una`.
    ///
    /// Removes a duplicate report, drops blocks already covered by the cumulative
    /// acknowledgement, clips the rest to start no earlier than `una` and finally sorts and
    /// coalesces them.
    pub fn normalize(&mut self, una: SeqNumber) {
        if self.spurious_retrans(una).is_some() {
            self.blocks.remove(0);
        }

        let canonical: RangeList = self.blocks
            .iter()
            .filter(|block| block.end.after(una))
            .map(|block| Range::new(block.begin.max(una), block.end))
            .collect();

        self.blocks = canonical.as_slice().to_vec();
    }

    /// The hole between the cumulative acknowledgement and the lowest block.
    ///
    /// Data above the hole arrived while the hole itself did not, so it is either lost or
    /// delivered out of order. Which of the two is only known after the flow ended. Expects
    /// normalized blocks.
    pub fn reordering(&self, una: SeqNumber) -> Option<Range> {
        let lowest = self.blocks.first()?;
        if lowest.begin.after(una) {
            Some(Range::new(una, lowest.begin))
        } else {
            None
        }
    }

    /// The number of bytes selectively acknowledged above `una`.
    pub fn sacked(&self, una: SeqNumber) -> u32 {
        self.blocks
            .iter()
            .map(|block| Range::new(block.begin.max(una), block.end).len())
            .sum()
    }

    /// The highest selectively acknowledged sequence number.
    pub fn max_sack_ack(&self) -> Option<SeqNumber> {
        self.blocks
            .iter()
            .map(|block| block.end)
            .fold(None, |max: Option<SeqNumber>, end| match max {
                Some(max) => Some(max.max(end)),
                None => Some(end),
            })
    }

    /// Record all blocks in the flow-wide list of acknowledged ranges.
    pub fn add_to_block_list(&self, list: &mut RangeList) {
        for block in &self.blocks {
            list.append(block.begin, block.end);
        }
    }
}
