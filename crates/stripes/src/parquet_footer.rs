//! Parquet footer adapter
//!
//! Exposes the row groups of a Parquet file as stripes so selection plans
//! can be computed against real files. Only footer metadata is read; page
//! decoding is left to Parquet-aware decoders.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parquet::basic::{ConvertedType, LogicalType};
use parquet::file::metadata::{ParquetMetaData, RowGroupMetaData};
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::statistics::Statistics;
use parquet::schema::types::ColumnDescriptor;

use crate::catalog::{MetadataProvider, StripeDescriptor};
use crate::error::{Result, StripeError};
use crate::statistics::{merge_all, ColumnStatistics, StatisticsByColumn};

/// Rows per logical row group when a Parquet file is read as stripes
pub const DEFAULT_PARQUET_STRIDE: u64 = 8192;

/// Metadata provider backed by a Parquet footer
#[derive(Debug, Clone)]
pub struct ParquetFooter {
    metadata: Arc<ParquetMetaData>,
    row_index_stride: u64,
}

impl ParquetFooter {
    /// Reads the footer of a Parquet file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let reader = SerializedFileReader::new(file)?;
        Ok(Self::from_metadata(Arc::new(reader.metadata().clone())))
    }

    /// Wraps already-parsed footer metadata
    pub fn from_metadata(metadata: Arc<ParquetMetaData>) -> Self {
        Self {
            metadata,
            row_index_stride: DEFAULT_PARQUET_STRIDE,
        }
    }

    /// Sets the batch granularity inside each row group
    pub fn with_row_index_stride(mut self, stride: u64) -> Self {
        self.row_index_stride = stride;
        self
    }

    pub fn metadata(&self) -> &ParquetMetaData {
        &self.metadata
    }

    fn describe_row_group(ordinal: usize, row_group: &RowGroupMetaData) -> Result<StripeDescriptor> {
        let row_count = u64::try_from(row_group.num_rows()).map_err(|_| {
            StripeError::Metadata(format!(
                "row group {} has negative row count {}",
                ordinal,
                row_group.num_rows()
            ))
        })?;

        let mut start = u64::MAX;
        let mut end = 0u64;
        let mut statistics = StatisticsByColumn::new();

        for (column, chunk) in row_group.columns().iter().enumerate() {
            let (chunk_start, chunk_len) = chunk.byte_range();
            start = start.min(chunk_start);
            end = end.max(chunk_start + chunk_len);

            if let Some(stats) = chunk.statistics() {
                statistics.insert(column, convert_statistics(stats, chunk.column_descr(), row_count));
            }
        }

        if row_group.columns().is_empty() {
            start = 0;
        }

        Ok(StripeDescriptor {
            ordinal,
            row_count,
            offset: start,
            length: end.saturating_sub(start),
            statistics,
            row_groups: Vec::new(),
        })
    }
}

/// Whether an integer column stores unsigned values in its physical type
fn is_unsigned(descr: &ColumnDescriptor) -> bool {
    match descr.logical_type() {
        Some(LogicalType::Integer { is_signed, .. }) => !is_signed,
        _ => matches!(
            descr.converted_type(),
            ConvertedType::UINT_8
                | ConvertedType::UINT_16
                | ConvertedType::UINT_32
                | ConvertedType::UINT_64
        ),
    }
}

/// Maps Parquet chunk statistics onto [`ColumnStatistics`]
///
/// Unsigned columns are reinterpreted from their physical bits. A UINT_64
/// range that does not fit in `i64` is dropped rather than truncated.
fn convert_statistics(
    stats: &Statistics,
    descr: &ColumnDescriptor,
    row_count: u64,
) -> ColumnStatistics {
    let converted = ColumnStatistics::new(row_count, stats.null_count_opt().unwrap_or(0));
    let unsigned = is_unsigned(descr);

    match stats {
        Statistics::Int32(s) => match (s.min_opt(), s.max_opt()) {
            (Some(&min), Some(&max)) if unsigned => {
                converted.with_integer(i64::from(min as u32), i64::from(max as u32))
            }
            (Some(&min), Some(&max)) => converted.with_integer(i64::from(min), i64::from(max)),
            _ => converted,
        },
        Statistics::Int64(s) => match (s.min_opt(), s.max_opt()) {
            (Some(&min), Some(&max)) if unsigned => {
                match (i64::try_from(min as u64), i64::try_from(max as u64)) {
                    (Ok(min), Ok(max)) => converted.with_integer(min, max),
                    _ => converted,
                }
            }
            (Some(&min), Some(&max)) => converted.with_integer(min, max),
            _ => converted,
        },
        Statistics::Float(s) => match (s.min_opt(), s.max_opt()) {
            (Some(min), Some(max)) => converted.with_double(f64::from(*min), f64::from(*max)),
            _ => converted,
        },
        Statistics::Double(s) => match (s.min_opt(), s.max_opt()) {
            (Some(min), Some(max)) => converted.with_double(*min, *max),
            _ => converted,
        },
        Statistics::ByteArray(s) => match (s.min_opt(), s.max_opt()) {
            (Some(min), Some(max)) => {
                match (std::str::from_utf8(min.data()), std::str::from_utf8(max.data())) {
                    (Ok(min), Ok(max)) => converted.with_string(min, max),
                    _ => converted,
                }
            }
            _ => converted,
        },
        _ => converted,
    }
}

impl MetadataProvider for ParquetFooter {
    fn list_stripes(&self) -> Result<Vec<StripeDescriptor>> {
        self.metadata
            .row_groups()
            .iter()
            .enumerate()
            .map(|(ordinal, rg)| Self::describe_row_group(ordinal, rg))
            .collect()
    }

    fn file_row_count(&self) -> Result<u64> {
        let rows = self.metadata.file_metadata().num_rows();
        u64::try_from(rows)
            .map_err(|_| StripeError::Metadata(format!("negative file row count {}", rows)))
    }

    fn file_statistics(&self) -> Result<StatisticsByColumn> {
        let stripes = self.list_stripes()?;
        Ok(merge_all(stripes.iter().map(|s| &s.statistics)))
    }

    fn column_count(&self) -> usize {
        self.metadata.file_metadata().schema_descr().num_columns()
    }

    fn row_index_stride(&self) -> u64 {
        self.row_index_stride
    }
}
