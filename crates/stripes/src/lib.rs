//! # stripes
//!
//! Stripe and row-group navigation for columnar batch reading.
//!
//! This crate walks a file's physical layout and provides:
//! - Predicate pushdown over stripe and row group statistics
//! - A forward-only batch reader that only fetches selected stripes
//! - Logical (delivered rows) and file (absolute row offset) positions
//!
//! Footer parsing and column decoding are plugged in through
//! [`MetadataProvider`] and [`ColumnDecoder`].
//!
//! ## Example
//!
//! ```no_run
//! use stripes::{BatchReaderBuilder, ColumnBuffer, MemoryFileWriter, StatisticsPredicate};
//!
//! # fn main() -> stripes::Result<()> {
//! let mut writer = MemoryFileWriter::new(1);
//! for i in 0..100 {
//!     if i > 0 && i % 20 == 0 {
//!         writer.flush_stripe();
//!     }
//!     writer.write_row(&[Some(i * 3)])?;
//! }
//! let file = writer.finish();
//!
//! let mut reader = BatchReaderBuilder::new(file.metadata())
//!     .with_predicate(StatisticsPredicate::new().with_integer_range(0, 60, 117))
//!     .build(file.source(), file.decoder())?;
//!
//! while let Some(rows) = reader.advance()? {
//!     let mut values = ColumnBuffer::new(rows);
//!     reader.read_column(0, &mut values)?;
//!     println!("{} rows, file position {}", rows, reader.file_position()?);
//! }
//! reader.close();
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod decoder;
pub mod error;
pub mod parquet_footer;
pub mod predicate;
pub mod reader;
pub mod selector;
pub mod source;
pub mod statistics;
pub mod writer;

pub use catalog::{FileMetadata, MetadataProvider, RowGroupIndex, StripeCatalog, StripeDescriptor};
pub use decoder::{ColumnBuffer, ColumnDecoder, PlainInt64Decoder};
pub use error::{Result, StripeError};
pub use parquet_footer::ParquetFooter;
pub use predicate::{from_fn, try_from_fn, AlwaysTrue, StatisticsPredicate, StripePredicate};
pub use reader::{BatchReader, BatchReaderBuilder, ReaderOptions, ReaderState};
pub use selector::{SelectedStripe, SelectionOptions, SelectionPlan, StripeSelector};
pub use source::{BytesSource, FileSource, StripeData, StripeSource};
pub use statistics::{ColumnStatistics, StatisticsByColumn};
pub use writer::{MemoryFile, MemoryFileWriter};
