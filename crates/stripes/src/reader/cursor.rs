//! Position bookkeeping for the batch reader

use crate::selector::SelectionPlan;

/// Where the next batch comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchLocation {
    /// Index into the selection plan
    pub stripe: usize,
    /// Index into the stripe's row ranges
    pub range: usize,
    /// First row of the batch, relative to the stripe start
    pub start: u64,
    pub len: u64,
}

/// Mutable read position over a selection plan.
///
/// `logical_position` counts delivered rows only. The file position is the
/// current stripe's file offset plus the row offset reached inside it, so
/// rows of skipped stripes and row groups are counted but never delivered.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReaderCursor {
    stripe: usize,
    range: usize,
    row_in_stripe: u64,
    stripe_file_offset: u64,
    logical_position: u64,
    started: bool,
}

impl ReaderCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logical_position(&self) -> u64 {
        self.logical_position
    }

    /// Absolute row offset in the file; `None` until a batch was committed
    pub fn file_position(&self) -> Option<u64> {
        self.started
            .then_some(self.stripe_file_offset + self.row_in_stripe)
    }

    /// Finds the next batch without moving the cursor.
    pub fn next_location(&self, plan: &SelectionPlan, max_batch_size: u64) -> Option<BatchLocation> {
        for (stripe_idx, stripe) in plan.stripes().iter().enumerate().skip(self.stripe) {
            let current = stripe_idx == self.stripe;
            let first_range = if current { self.range } else { 0 };

            for (range_idx, range) in stripe.row_ranges.iter().enumerate().skip(first_range) {
                let start = if current {
                    range.start.max(self.row_in_stripe)
                } else {
                    range.start
                };

                if start < range.end {
                    return Some(BatchLocation {
                        stripe: stripe_idx,
                        range: range_idx,
                        start,
                        len: (range.end - start).min(max_batch_size),
                    });
                }
            }
        }
        None
    }

    /// Moves the cursor past a delivered batch
    pub fn commit(&mut self, plan: &SelectionPlan, location: &BatchLocation) {
        self.stripe = location.stripe;
        self.range = location.range;
        self.row_in_stripe = location.start + location.len;
        self.stripe_file_offset = plan.stripes()[location.stripe].file_row_offset;
        self.logical_position += location.len;
        self.started = true;
    }
}
