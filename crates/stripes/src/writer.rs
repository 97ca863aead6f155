//! In-memory writer producing multi-stripe int64 files
//!
//! Builds plain-encoded stripes together with the footer metadata a real
//! file would carry: per-stripe statistics, a row index per stripe and
//! file-level statistics. Stripe boundaries are forced with
//! [`MemoryFileWriter::flush_stripe`].

use bytes::{Bytes, BytesMut};
use tracing::debug;

use crate::catalog::{FileMetadata, RowGroupIndex, StripeDescriptor};
use crate::decoder::{encode_plain_stripe, PlainInt64Decoder};
use crate::error::{Result, StripeError};
use crate::source::BytesSource;
use crate::statistics::{merge_all, ColumnStatistics, StatisticsByColumn};

/// Default number of rows per row group
pub const DEFAULT_ROW_INDEX_STRIDE: u64 = 10_000;

/// Writer accumulating rows into stripes
#[derive(Debug)]
pub struct MemoryFileWriter {
    column_count: usize,
    row_index_stride: u64,
    pending: Vec<Vec<Option<i64>>>,
    stripes: Vec<StripeDescriptor>,
    data: BytesMut,
}

impl MemoryFileWriter {
    pub fn new(column_count: usize) -> Self {
        Self {
            column_count,
            row_index_stride: DEFAULT_ROW_INDEX_STRIDE,
            pending: vec![Vec::new(); column_count],
            stripes: Vec::new(),
            data: BytesMut::new(),
        }
    }

    /// Sets the row group size used for the row index
    pub fn with_row_index_stride(mut self, stride: u64) -> Self {
        self.row_index_stride = stride.max(1);
        self
    }

    /// Appends one row; `row` must have one value per column
    pub fn write_row(&mut self, row: &[Option<i64>]) -> Result<()> {
        if row.len() != self.column_count {
            return Err(StripeError::InvalidArgument(format!(
                "row has {} values, writer has {} columns",
                row.len(),
                self.column_count
            )));
        }
        for (column, value) in self.pending.iter_mut().zip(row) {
            column.push(*value);
        }
        Ok(())
    }

    /// Rows buffered for the stripe being built
    pub fn pending_rows(&self) -> usize {
        self.pending.first().map(Vec::len).unwrap_or(0)
    }

    /// Closes the current stripe. Does nothing if no rows are pending.
    pub fn flush_stripe(&mut self) {
        let rows = self.pending_rows();
        if rows == 0 {
            return;
        }

        let columns = std::mem::replace(&mut self.pending, vec![Vec::new(); self.column_count]);
        let encoded = encode_plain_stripe(&columns);

        let stride = self.row_index_stride as usize;
        let row_groups = (0..rows)
            .step_by(stride)
            .map(|start| {
                let end = (start + stride).min(rows);
                RowGroupIndex {
                    row_count: (end - start) as u64,
                    statistics: column_statistics(&columns, start..end),
                }
            })
            .collect();

        let descriptor = StripeDescriptor {
            ordinal: self.stripes.len(),
            row_count: rows as u64,
            offset: self.data.len() as u64,
            length: encoded.len() as u64,
            statistics: column_statistics(&columns, 0..rows),
            row_groups,
        };

        debug!(
            stripe = descriptor.ordinal,
            rows,
            bytes = descriptor.length,
            "flushed stripe"
        );

        self.data.extend_from_slice(&encoded);
        self.stripes.push(descriptor);
    }

    /// Flushes pending rows and returns the finished file
    pub fn finish(mut self) -> MemoryFile {
        self.flush_stripe();
        let statistics = merge_all(self.stripes.iter().map(|s| &s.statistics));

        MemoryFile {
            metadata: FileMetadata {
                column_count: self.column_count,
                row_index_stride: self.row_index_stride,
                stripes: self.stripes,
                statistics,
            },
            data: self.data.freeze(),
        }
    }
}

fn column_statistics(columns: &[Vec<Option<i64>>], rows: std::ops::Range<usize>) -> StatisticsByColumn {
    columns
        .iter()
        .enumerate()
        .map(|(column, values)| {
            let slice = &values[rows.clone()];
            let nulls = slice.iter().filter(|v| v.is_none()).count() as u64;
            let mut stats = ColumnStatistics::new(slice.len() as u64, nulls);

            let present = slice.iter().flatten();
            if let (Some(min), Some(max)) = (present.clone().min(), present.max()) {
                stats = stats.with_integer(*min, *max);
            }
            (column, stats)
        })
        .collect()
}

/// A finished in-memory file: footer metadata plus stripe bytes
#[derive(Debug, Clone)]
pub struct MemoryFile {
    metadata: FileMetadata,
    data: Bytes,
}

impl MemoryFile {
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Byte source over this file's data
    pub fn source(&self) -> BytesSource {
        BytesSource::new(self.data.clone())
    }

    /// Decoder matching this file's encoding
    pub fn decoder(&self) -> PlainInt64Decoder {
        PlainInt64Decoder::new(self.metadata.column_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::IntegerStatistics;

    #[test]
    fn test_flush_creates_stripes() {
        let mut writer = MemoryFileWriter::new(1);
        for i in (0..300).step_by(3) {
            if i > 0 && i % 60 == 0 {
                writer.flush_stripe();
            }
            writer.write_row(&[Some(i)]).unwrap();
        }
        let file = writer.finish();
        let meta = file.metadata();

        assert_eq!(meta.stripes.len(), 5);
        assert_eq!(meta.total_rows(), 100);
        assert_eq!(
            meta.stripes[1].statistics[&0].integer,
            Some(IntegerStatistics { min: 60, max: 117 })
        );
        assert_eq!(
            meta.statistics[&0].integer,
            Some(IntegerStatistics { min: 0, max: 297 })
        );
        assert_eq!(meta.stripes[4].end_offset(), file.data().len() as u64);
    }

    #[test]
    fn test_row_index_and_nulls() {
        let mut writer = MemoryFileWriter::new(1).with_row_index_stride(4);
        for i in 0..10 {
            let value = if i < 4 { None } else { Some(i) };
            writer.write_row(&[value]).unwrap();
        }
        let file = writer.finish();
        let stripe = &file.metadata().stripes[0];

        let counts: Vec<u64> = stripe.row_groups.iter().map(|g| g.row_count).collect();
        assert_eq!(counts, vec![4, 4, 2]);
        assert!(stripe.row_groups[0].statistics[&0].is_all_null());
        assert!(stripe.row_groups[0].statistics[&0].integer.is_none());
        assert_eq!(stripe.statistics[&0].null_count, 4);
        assert_eq!(
            stripe.row_groups[2].statistics[&0].integer,
            Some(IntegerStatistics { min: 8, max: 9 })
        );
    }

    #[test]
    fn test_flush_without_rows_is_noop() {
        let mut writer = MemoryFileWriter::new(2);
        writer.flush_stripe();
        assert!(writer.write_row(&[Some(1)]).is_err());
        let file = writer.finish();
        assert!(file.metadata().stripes.is_empty());
        assert!(file.data().is_empty());
    }
}
