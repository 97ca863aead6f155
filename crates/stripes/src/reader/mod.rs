//! Batch reader over selected stripes

pub mod batch_reader;
mod cursor;

pub use batch_reader::{BatchReader, BatchReaderBuilder};

use crate::selector::SelectionOptions;

/// Configuration for batch readers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Upper bound on rows per batch (default: 1024)
    pub max_batch_size: usize,

    /// Evaluate the predicate over file-level statistics first (default: true)
    pub file_precheck: bool,

    /// Skip row groups ruled out by the row index (default: false).
    /// When enabled, `position()` and `total_row_count()` count delivered
    /// rows only, so the file position may run ahead without a skipped stripe.
    pub row_group_pruning: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_batch_size: 1024,
            file_precheck: true,
            row_group_pruning: false,
        }
    }
}

impl ReaderOptions {
    /// Selection switches derived from these options
    pub fn selection(&self) -> SelectionOptions {
        SelectionOptions {
            file_precheck: self.file_precheck,
            row_group_pruning: self.row_group_pruning,
        }
    }
}

/// Lifecycle of a [`BatchReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// No batch delivered yet; file position is undefined
    NotStarted,
    /// At least one batch delivered and more may follow
    Active,
    /// End of data reached; positions are frozen
    Exhausted,
    /// Resources released
    Closed,
}
