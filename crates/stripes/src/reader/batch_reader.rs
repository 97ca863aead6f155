//! Forward-only batch reader over the stripes chosen by a predicate

use std::collections::BTreeSet;
use std::ops::Range;

use tracing::{debug, trace};

use crate::catalog::{MetadataProvider, StripeCatalog};
use crate::decoder::{ColumnBuffer, ColumnDecoder};
use crate::error::{Result, StripeError};
use crate::predicate::{AlwaysTrue, StripePredicate};
use crate::reader::cursor::ReaderCursor;
use crate::reader::{ReaderOptions, ReaderState};
use crate::selector::{SelectionPlan, StripeSelector};
use crate::source::{StripeData, StripeSource};

/// Builder for [`BatchReader`]
///
/// Selection runs eagerly in [`BatchReaderBuilder::build`]; the returned
/// reader has not fetched any stripe bytes yet.
pub struct BatchReaderBuilder<'a> {
    provider: &'a dyn MetadataProvider,
    predicate: Box<dyn StripePredicate + 'a>,
    columns: Option<Vec<usize>>,
    options: ReaderOptions,
}

impl<'a> BatchReaderBuilder<'a> {
    /// Starts a builder reading every stripe and column of `provider`
    pub fn new(provider: &'a dyn MetadataProvider) -> Self {
        Self {
            provider,
            predicate: Box::new(AlwaysTrue),
            columns: None,
            options: ReaderOptions::default(),
        }
    }

    /// Sets the predicate used to skip stripes and row groups
    pub fn with_predicate(mut self, predicate: impl StripePredicate + 'a) -> Self {
        self.predicate = Box::new(predicate);
        self
    }

    /// Restricts reading to the given columns
    pub fn with_columns(mut self, columns: impl IntoIterator<Item = usize>) -> Self {
        self.columns = Some(columns.into_iter().collect());
        self
    }

    pub fn with_options(mut self, options: ReaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the catalog and selection plan and returns a reader in the
    /// [`ReaderState::NotStarted`] state.
    pub fn build(
        self,
        source: impl StripeSource + 'static,
        decoder: impl ColumnDecoder + 'static,
    ) -> Result<BatchReader> {
        if self.options.max_batch_size == 0 {
            return Err(StripeError::InvalidArgument(
                "max_batch_size must be greater than zero".to_string(),
            ));
        }

        let catalog = StripeCatalog::from_provider(self.provider)?;
        let column_count = catalog.column_count();

        let columns: BTreeSet<usize> = match self.columns {
            Some(columns) => columns.into_iter().collect(),
            None => (0..column_count).collect(),
        };
        if let Some(unknown) = columns.iter().find(|&&c| c >= column_count) {
            return Err(StripeError::InvalidArgument(format!(
                "column {} not in file schema with {} columns",
                unknown, column_count
            )));
        }

        let plan = StripeSelector::select(&catalog, &*self.predicate, &self.options.selection())?;

        debug!(
            selected = plan.stripes().len(),
            stripes = catalog.num_stripes(),
            selected_rows = plan.total_selected_rows(),
            file_rows = plan.total_file_rows(),
            "batch reader ready"
        );

        Ok(BatchReader {
            plan,
            column_count,
            columns,
            max_batch_size: self.options.max_batch_size as u64,
            source: Some(Box::new(source)),
            decoder: Box::new(decoder),
            cursor: ReaderCursor::new(),
            state: ReaderState::NotStarted,
            current_stripe: None,
            current_batch: None,
        })
    }
}

/// Pull-based reader yielding row-group aligned batches from selected stripes.
///
/// Not safe for concurrent use; each reader owns its cursor and byte source.
pub struct BatchReader {
    plan: SelectionPlan,
    column_count: usize,
    columns: BTreeSet<usize>,
    max_batch_size: u64,
    source: Option<Box<dyn StripeSource>>,
    decoder: Box<dyn ColumnDecoder>,
    cursor: ReaderCursor,
    state: ReaderState,

    /// Bytes of the stripe the current batch belongs to
    current_stripe: Option<StripeData>,

    /// Rows of the current batch, relative to the current stripe
    current_batch: Option<Range<u64>>,
}

impl BatchReader {
    /// Number of rows in the whole file, selected or not
    pub fn file_row_count(&self) -> u64 {
        self.plan.total_file_rows()
    }

    /// Number of rows in the selected stripes
    pub fn total_row_count(&self) -> u64 {
        self.plan.total_selected_rows()
    }

    /// Rows delivered so far
    pub fn position(&self) -> u64 {
        self.cursor.logical_position()
    }

    /// Absolute file row offset matching [`BatchReader::position`].
    ///
    /// Fails with [`StripeError::InvalidState`] until the first batch has
    /// been delivered.
    pub fn file_position(&self) -> Result<u64> {
        self.cursor.file_position().ok_or_else(|| {
            StripeError::InvalidState(
                "file position is undefined before the first batch".to_string(),
            )
        })
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn plan(&self) -> &SelectionPlan {
        &self.plan
    }

    /// Columns this reader was built to read
    pub fn columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.iter().copied()
    }

    /// Row count of the current batch, if one is active
    pub fn current_batch_len(&self) -> Option<usize> {
        self.current_batch
            .as_ref()
            .map(|rows| (rows.end - rows.start) as usize)
    }

    /// Ordinal of the stripe holding the current batch
    pub fn current_stripe_ordinal(&self) -> Option<usize> {
        self.current_batch
            .as_ref()
            .and(self.current_stripe.as_ref())
            .map(|stripe| stripe.ordinal())
    }

    /// Moves to the next batch.
    ///
    /// Returns the number of rows in the batch, or `None` once every
    /// selected row has been delivered. Stripe bytes are fetched the first
    /// time a batch lands in a stripe.
    pub fn advance(&mut self) -> Result<Option<usize>> {
        match self.state {
            ReaderState::Closed => {
                return Err(StripeError::InvalidState("reader is closed".to_string()))
            }
            ReaderState::Exhausted => return Ok(None),
            ReaderState::NotStarted | ReaderState::Active => {}
        }

        let Some(location) = self.cursor.next_location(&self.plan, self.max_batch_size) else {
            debug!(
                position = self.cursor.logical_position(),
                "no selected rows left"
            );
            self.state = ReaderState::Exhausted;
            self.current_batch = None;
            self.current_stripe = None;
            return Ok(None);
        };

        let stripe = &self.plan.stripes()[location.stripe];
        let loaded = self.current_stripe.as_ref().map(|data| data.ordinal());
        if loaded != Some(stripe.ordinal()) {
            self.current_batch = None;
            self.current_stripe = None;

            let source = self
                .source
                .as_mut()
                .ok_or_else(|| StripeError::InvalidState("stripe source released".to_string()))?;
            let data = StripeData::fetch(&mut **source, &stripe.descriptor)?;

            debug!(
                stripe = stripe.ordinal(),
                bytes = data.bytes().len(),
                file_row_offset = stripe.file_row_offset,
                "loaded stripe"
            );
            self.current_stripe = Some(data);
        }

        self.cursor.commit(&self.plan, &location);
        self.current_batch = Some(location.start..location.start + location.len);
        self.state = ReaderState::Active;

        trace!(
            rows = location.len,
            position = self.cursor.logical_position(),
            "advanced batch"
        );
        Ok(Some(location.len as usize))
    }

    /// Decodes `column` for the current batch into `buffer`.
    ///
    /// `buffer` must be sized to the current batch. Calling this again for
    /// the same batch yields the same values.
    pub fn read_column(&self, column: usize, buffer: &mut ColumnBuffer) -> Result<()> {
        if self.state == ReaderState::Closed {
            return Err(StripeError::InvalidState("reader is closed".to_string()));
        }
        if column >= self.column_count {
            return Err(StripeError::InvalidArgument(format!(
                "column {} not in file schema with {} columns",
                column, self.column_count
            )));
        }
        if !self.columns.contains(&column) {
            return Err(StripeError::InvalidArgument(format!(
                "column {} was not requested when the reader was built",
                column
            )));
        }

        let (Some(rows), Some(stripe)) = (self.current_batch.clone(), self.current_stripe.as_ref())
        else {
            return Err(StripeError::InvalidState(
                "no current batch; call advance first".to_string(),
            ));
        };

        let batch_len = (rows.end - rows.start) as usize;
        if buffer.capacity() != batch_len {
            return Err(StripeError::InvalidArgument(format!(
                "buffer sized for {} rows but the batch has {}",
                buffer.capacity(),
                batch_len
            )));
        }

        let array = self.decoder.decode(stripe, column, rows)?;
        buffer.fill(array)
    }

    /// Releases the byte source and any fetched stripe. Safe to call more
    /// than once.
    pub fn close(&mut self) {
        if self.state == ReaderState::Closed {
            return;
        }
        self.source = None;
        self.current_stripe = None;
        self.current_batch = None;
        self.state = ReaderState::Closed;
        debug!(position = self.cursor.logical_position(), "closed batch reader");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::from_fn;
    use crate::writer::MemoryFileWriter;

    fn small_file() -> crate::writer::MemoryFile {
        let mut writer = MemoryFileWriter::new(2);
        for i in 0..6i64 {
            if i == 3 {
                writer.flush_stripe();
            }
            writer.write_row(&[Some(i), Some(-i)]).unwrap();
        }
        writer.finish()
    }

    #[test]
    fn test_read_column_requires_batch() {
        let file = small_file();
        let mut reader = BatchReaderBuilder::new(file.metadata())
            .build(file.source(), file.decoder())
            .unwrap();

        let mut buffer = ColumnBuffer::new(3);
        assert!(matches!(
            reader.read_column(0, &mut buffer),
            Err(StripeError::InvalidState(_))
        ));

        assert_eq!(reader.advance().unwrap(), Some(3));
        reader.read_column(1, &mut buffer).unwrap();
        assert_eq!(buffer.as_int64().unwrap().values().to_vec(), vec![0, -1, -2]);
    }

    #[test]
    fn test_read_column_argument_checks() {
        let file = small_file();
        let mut reader = BatchReaderBuilder::new(file.metadata())
            .with_columns([1])
            .build(file.source(), file.decoder())
            .unwrap();
        assert_eq!(reader.columns().collect::<Vec<_>>(), vec![1]);
        reader.advance().unwrap();

        let mut buffer = ColumnBuffer::new(3);
        assert!(matches!(
            reader.read_column(2, &mut buffer),
            Err(StripeError::InvalidArgument(_))
        ));
        assert!(matches!(
            reader.read_column(0, &mut buffer),
            Err(StripeError::InvalidArgument(_))
        ));

        let mut short = ColumnBuffer::new(2);
        assert!(matches!(
            reader.read_column(1, &mut short),
            Err(StripeError::InvalidArgument(_))
        ));
        assert!(short.array().is_none());
    }

    #[test]
    fn test_unknown_projection_fails_build() {
        let file = small_file();
        let result = BatchReaderBuilder::new(file.metadata())
            .with_columns([0, 5])
            .build(file.source(), file.decoder());
        assert!(matches!(result, Err(StripeError::InvalidArgument(_))));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let file = small_file();
        let options = ReaderOptions {
            max_batch_size: 0,
            ..Default::default()
        };
        let result = BatchReaderBuilder::new(file.metadata())
            .with_options(options)
            .build(file.source(), file.decoder());
        assert!(matches!(result, Err(StripeError::InvalidArgument(_))));
    }

    #[test]
    fn test_close_is_idempotent() {
        let file = small_file();
        let mut reader = BatchReaderBuilder::new(file.metadata())
            .build(file.source(), file.decoder())
            .unwrap();
        reader.advance().unwrap();

        reader.close();
        reader.close();
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(matches!(reader.advance(), Err(StripeError::InvalidState(_))));

        let mut buffer = ColumnBuffer::new(3);
        assert!(matches!(
            reader.read_column(0, &mut buffer),
            Err(StripeError::InvalidState(_))
        ));
        // Positions stay readable after close
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.file_position().unwrap(), 3);
    }

    #[test]
    fn test_state_transitions() {
        let file = small_file();
        let predicate = from_fn(|_, _| true);
        let mut reader = BatchReaderBuilder::new(file.metadata())
            .with_predicate(predicate)
            .build(file.source(), file.decoder())
            .unwrap();

        assert_eq!(reader.state(), ReaderState::NotStarted);
        assert_eq!(reader.current_batch_len(), None);

        reader.advance().unwrap();
        assert_eq!(reader.state(), ReaderState::Active);
        assert_eq!(reader.current_stripe_ordinal(), Some(0));

        reader.advance().unwrap();
        assert_eq!(reader.current_stripe_ordinal(), Some(1));

        assert_eq!(reader.advance().unwrap(), None);
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert_eq!(reader.current_batch_len(), None);
        assert_eq!(reader.current_stripe_ordinal(), None);
    }
}
