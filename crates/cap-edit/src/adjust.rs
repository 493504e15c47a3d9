//! Timestamp rewriting: strict monotonic enforcement.

use crate::time::{TimeOffset, TimeSpec};

/// Enforces strictly increasing (or exactly spaced) timestamps.
///
/// With a non-negative adjustment, records that fail to move past their
/// predecessor are rewritten to `previous + adjustment`. With a negative
/// one, every record after the first is forced to sit exactly
/// `|adjustment|` after its predecessor. The first record always passes
/// through verbatim; it anchors the sequence.
#[derive(Debug)]
pub struct StrictAdjuster {
    previous: Option<TimeSpec>,
    adjustment: TimeOffset,
}

impl StrictAdjuster {
    pub fn new(adjustment: TimeOffset) -> StrictAdjuster {
        StrictAdjuster {
            previous: None,
            adjustment,
        }
    }

    /// Rewrite (or pass through) one timestamp and remember the result
    /// as the new floor.
    pub fn adjust(&mut self, ts: TimeSpec) -> TimeSpec {
        let out = match self.previous {
            None => ts,
            Some(prev) => {
                if self.adjustment.negative || ts <= prev {
                    prev.add(self.adjustment.abs)
                } else {
                    ts
                }
            }
        };
        self.previous = Some(out);
        out
    }
}
