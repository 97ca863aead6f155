//! Stripe descriptors and the catalog built from footer metadata
//!
//! The physical footer format is not parsed here. A [`MetadataProvider`]
//! hands over the ordered stripe list and the [`StripeCatalog`] checks that
//! it is consistent before anything is selected or read.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, StripeError};
use crate::statistics::StatisticsByColumn;

/// Row index entry: one row group of a stripe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowGroupIndex {
    /// Number of rows in this row group
    pub row_count: u64,

    /// Statistics for this row group
    #[serde(default)]
    pub statistics: StatisticsByColumn,
}

/// Immutable description of one stripe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StripeDescriptor {
    /// Position of the stripe in file order (0-based)
    pub ordinal: usize,

    /// Number of rows stored in the stripe
    pub row_count: u64,

    /// Byte offset of the stripe within the file
    pub offset: u64,

    /// Byte length of the stripe
    pub length: u64,

    /// Per-column statistics for the whole stripe
    #[serde(default)]
    pub statistics: StatisticsByColumn,

    /// Optional row index; empty when the file carries none
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_groups: Vec<RowGroupIndex>,
}

impl StripeDescriptor {
    /// Exclusive end offset of the stripe bytes
    pub fn end_offset(&self) -> u64 {
        self.offset + self.length
    }
}

/// Source of file-level metadata (footer) for a reader
pub trait MetadataProvider {
    /// Returns every stripe in physical file order
    fn list_stripes(&self) -> Result<Vec<StripeDescriptor>>;

    /// Returns the number of rows in the whole file
    fn file_row_count(&self) -> Result<u64>;

    /// Returns aggregated statistics for the whole file
    fn file_statistics(&self) -> Result<StatisticsByColumn> {
        Ok(StatisticsByColumn::new())
    }

    /// Returns the number of columns in the file schema
    fn column_count(&self) -> usize;

    /// Returns the number of rows per row group within a stripe
    fn row_index_stride(&self) -> u64;
}

/// Serializable footer description
///
/// Useful when footer metadata has already been decoded elsewhere or is
/// stored alongside data as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub column_count: usize,
    pub row_index_stride: u64,
    pub stripes: Vec<StripeDescriptor>,
    #[serde(default)]
    pub statistics: StatisticsByColumn,
}

impl FileMetadata {
    pub fn total_rows(&self) -> u64 {
        self.stripes.iter().map(|s| s.row_count).sum()
    }
}

impl MetadataProvider for FileMetadata {
    fn list_stripes(&self) -> Result<Vec<StripeDescriptor>> {
        Ok(self.stripes.clone())
    }

    fn file_row_count(&self) -> Result<u64> {
        Ok(self.total_rows())
    }

    fn file_statistics(&self) -> Result<StatisticsByColumn> {
        Ok(self.statistics.clone())
    }

    fn column_count(&self) -> usize {
        self.column_count
    }

    fn row_index_stride(&self) -> u64 {
        self.row_index_stride
    }
}

/// Validated, read-only view of a file's stripes
#[derive(Debug, Clone)]
pub struct StripeCatalog {
    stripes: Vec<StripeDescriptor>,
    file_row_count: u64,
    file_statistics: StatisticsByColumn,
    column_count: usize,
    row_index_stride: u64,
}

impl StripeCatalog {
    /// Builds a catalog from a provider, validating the stripe list
    pub fn from_provider(provider: &dyn MetadataProvider) -> Result<Self> {
        let stripes = provider.list_stripes()?;
        let file_row_count = provider.file_row_count()?;
        let file_statistics = provider.file_statistics()?;
        let column_count = provider.column_count();
        let row_index_stride = provider.row_index_stride();

        if row_index_stride == 0 {
            return Err(StripeError::Metadata(
                "row index stride must be greater than zero".to_string(),
            ));
        }

        let mut total = 0u64;
        for (idx, stripe) in stripes.iter().enumerate() {
            if stripe.ordinal != idx {
                return Err(StripeError::Metadata(format!(
                    "stripe at position {} has ordinal {}",
                    idx, stripe.ordinal
                )));
            }

            if !stripe.row_groups.is_empty() {
                let group_rows: u64 = stripe.row_groups.iter().map(|rg| rg.row_count).sum();
                if group_rows != stripe.row_count {
                    return Err(StripeError::Metadata(format!(
                        "stripe {} has {} rows but its row groups cover {}",
                        idx, stripe.row_count, group_rows
                    )));
                }
            }

            if let Some(column) = stripe.statistics.keys().find(|&&c| c >= column_count) {
                return Err(StripeError::Metadata(format!(
                    "stripe {} has statistics for column {} but the file has {} columns",
                    idx, column, column_count
                )));
            }

            total += stripe.row_count;
        }

        if total != file_row_count {
            return Err(StripeError::Metadata(format!(
                "stripes cover {} rows but the footer reports {}",
                total, file_row_count
            )));
        }

        debug!(
            stripes = stripes.len(),
            rows = file_row_count,
            columns = column_count,
            "built stripe catalog"
        );

        Ok(Self {
            stripes,
            file_row_count,
            file_statistics,
            column_count,
            row_index_stride,
        })
    }

    pub fn stripes(&self) -> &[StripeDescriptor] {
        &self.stripes
    }

    pub fn num_stripes(&self) -> usize {
        self.stripes.len()
    }

    pub fn file_row_count(&self) -> u64 {
        self.file_row_count
    }

    pub fn file_statistics(&self) -> &StatisticsByColumn {
        &self.file_statistics
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn row_index_stride(&self) -> u64 {
        self.row_index_stride
    }
}
