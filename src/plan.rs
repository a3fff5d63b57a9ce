//! Splitting a resource into byte ranges.
use serde::{Deserialize, Serialize};
use tracing::warn;

/// An inclusive byte interval of the source, one per part.
///
/// `index` is the position of the segment in the reassembled file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl RangeSpec {
    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }
}

/// Result of planning a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePlan {
    pub ranges: Vec<RangeSpec>,
    /// Part count asked for by the caller, before clamping.
    pub requested_parts: u64,
    /// Set when `requested_parts` could not be honoured and fewer ranges were emitted.
    pub clamped: bool,
}

impl RangePlan {
    pub fn part_count(&self) -> usize {
        self.ranges.len()
    }
}

/// Divides `total_size` bytes into `part_count` contiguous ranges.
///
/// Every range gets `total_size / part_count` bytes; the last one also takes
/// the remainder. A part count of zero or one larger than the file is clamped
/// so that no range is ever empty.
pub fn plan(total_size: u64, part_count: u64) -> RangePlan {
    if total_size == 0 {
        return RangePlan {
            ranges: Vec::new(),
            requested_parts: part_count,
            clamped: part_count != 0,
        };
    }

    let parts = part_count.clamp(1, total_size);
    let clamped = parts != part_count;
    if clamped {
        warn!(
            requested = part_count,
            using = parts,
            total_size,
            "part count clamped to fit file size"
        );
    }

    let part_size = total_size / parts;
    let ranges = (0..parts)
        .map(|i| {
            let start = i * part_size;
            let end = if i == parts - 1 {
                total_size - 1
            } else {
                start + part_size - 1
            };
            RangeSpec {
                index: i as usize,
                start,
                end,
            }
        })
        .collect();

    RangePlan {
        ranges,
        requested_parts: part_count,
        clamped,
    }
}
