//! Stripe and row group selection
//!
//! Applies a [`StripePredicate`] to a [`StripeCatalog`] once, at reader
//! construction, producing an immutable [`SelectionPlan`]. Selection keeps
//! file order and never fetches stripe bytes.

use std::ops::Range;

use tracing::debug;

use crate::catalog::{StripeCatalog, StripeDescriptor};
use crate::error::Result;
use crate::predicate::StripePredicate;

/// Selection behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionOptions {
    /// Evaluate the predicate once over the whole file before any stripe
    pub file_precheck: bool,

    /// Evaluate the predicate per row group inside selected stripes.
    /// Pruned groups advance the file position but not the logical one.
    pub row_group_pruning: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            file_precheck: true,
            row_group_pruning: false,
        }
    }
}

/// A stripe chosen for reading
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedStripe {
    pub descriptor: StripeDescriptor,

    /// Rows in all stripes (selected or not) before this one
    pub file_row_offset: u64,

    /// Row ranges to read, relative to the stripe start, in ascending order.
    /// Each range covers exactly one row group.
    pub row_ranges: Vec<Range<u64>>,
}

impl SelectedStripe {
    pub fn ordinal(&self) -> usize {
        self.descriptor.ordinal
    }

    pub fn row_count(&self) -> u64 {
        self.descriptor.row_count
    }

    /// Rows that will actually be delivered from this stripe
    pub fn rows_to_read(&self) -> u64 {
        self.row_ranges.iter().map(|r| r.end - r.start).sum()
    }
}

/// Ordered subset of stripes to read plus row totals
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionPlan {
    stripes: Vec<SelectedStripe>,
    total_selected_rows: u64,
    total_file_rows: u64,
}

impl SelectionPlan {
    pub fn stripes(&self) -> &[SelectedStripe] {
        &self.stripes
    }

    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    /// Rows the reader will deliver: the selected stripes' row counts, less
    /// any pruned row groups
    pub fn total_selected_rows(&self) -> u64 {
        self.total_selected_rows
    }

    /// Sum of row counts of all stripes in the file
    pub fn total_file_rows(&self) -> u64 {
        self.total_file_rows
    }

    /// Ordinals of the selected stripes, in file order
    pub fn selected_ordinals(&self) -> Vec<usize> {
        self.stripes.iter().map(|s| s.ordinal()).collect()
    }
}

/// Builds selection plans from a catalog and a predicate
pub struct StripeSelector;

impl StripeSelector {
    /// Evaluates `predicate` over the catalog and returns the plan.
    ///
    /// Predicate errors abort selection and are returned unchanged.
    pub fn select(
        catalog: &StripeCatalog,
        predicate: &dyn StripePredicate,
        options: &SelectionOptions,
    ) -> Result<SelectionPlan> {
        let total_file_rows = catalog.file_row_count();

        if options.file_precheck
            && !predicate.matches(total_file_rows, catalog.file_statistics())?
        {
            debug!(rows = total_file_rows, "file-level statistics exclude every stripe");
            return Ok(SelectionPlan {
                stripes: Vec::new(),
                total_selected_rows: 0,
                total_file_rows,
            });
        }

        let mut stripes = Vec::new();
        let mut total_selected_rows = 0;
        let mut file_row_offset = 0;

        for descriptor in catalog.stripes() {
            let offset = file_row_offset;
            file_row_offset += descriptor.row_count;

            if descriptor.row_count == 0 {
                debug!(stripe = descriptor.ordinal, "skipping empty stripe");
                continue;
            }

            if !predicate.matches(descriptor.row_count, &descriptor.statistics)? {
                debug!(stripe = descriptor.ordinal, rows = descriptor.row_count, "stripe skipped");
                continue;
            }

            let row_ranges = Self::select_row_groups(
                descriptor,
                catalog.row_index_stride(),
                predicate,
                options,
            )?;

            debug!(
                stripe = descriptor.ordinal,
                rows = descriptor.row_count,
                file_row_offset = offset,
                ranges = row_ranges.len(),
                "stripe selected"
            );

            let selected = SelectedStripe {
                descriptor: descriptor.clone(),
                file_row_offset: offset,
                row_ranges,
            };
            total_selected_rows += selected.rows_to_read();
            stripes.push(selected);
        }

        Ok(SelectionPlan {
            stripes,
            total_selected_rows,
            total_file_rows,
        })
    }

    /// Splits a selected stripe into row-group ranges, dropping groups the
    /// predicate rules out when a row index is present.
    fn select_row_groups(
        descriptor: &StripeDescriptor,
        stride: u64,
        predicate: &dyn StripePredicate,
        options: &SelectionOptions,
    ) -> Result<Vec<Range<u64>>> {
        if descriptor.row_groups.is_empty() {
            return Ok(stride_ranges(descriptor.row_count, stride));
        }

        let mut ranges = Vec::with_capacity(descriptor.row_groups.len());
        let mut start = 0;
        for (group, index) in descriptor.row_groups.iter().enumerate() {
            let end = start + index.row_count;
            let keep = index.row_count > 0
                && (!options.row_group_pruning
                    || predicate.matches(index.row_count, &index.statistics)?);

            if keep {
                ranges.push(start..end);
            } else if index.row_count > 0 {
                debug!(stripe = descriptor.ordinal, group, "row group skipped");
            }
            start = end;
        }
        Ok(ranges)
    }
}

/// Fixed-stride row ranges covering `row_count` rows
fn stride_ranges(row_count: u64, stride: u64) -> Vec<Range<u64>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    while start < row_count {
        let end = (start + stride).min(row_count);
        ranges.push(start..end);
        start = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FileMetadata, RowGroupIndex};
    use crate::predicate::{from_fn, AlwaysTrue};
    use crate::statistics::{ColumnStatistics, StatisticsByColumn};

    fn int_stats(min: i64, max: i64, rows: u64) -> StatisticsByColumn {
        let mut stats = StatisticsByColumn::new();
        stats.insert(0, ColumnStatistics::new(rows, 0).with_integer(min, max));
        stats
    }

    fn catalog(row_counts: &[u64], stride: u64) -> StripeCatalog {
        let mut first_value = 0i64;
        let stripes = row_counts
            .iter()
            .enumerate()
            .map(|(ordinal, &rows)| {
                let last_value = first_value + (rows as i64 - 1) * 3;
                let descriptor = StripeDescriptor {
                    ordinal,
                    row_count: rows,
                    offset: ordinal as u64 * 1000,
                    length: 1000,
                    statistics: int_stats(first_value, last_value, rows),
                    row_groups: Vec::new(),
                };
                first_value = last_value + 3;
                descriptor
            })
            .collect();

        let meta = FileMetadata {
            column_count: 1,
            row_index_stride: stride,
            stripes,
            statistics: StatisticsByColumn::new(),
        };
        StripeCatalog::from_provider(&meta).unwrap()
    }

    #[test]
    fn test_select_all() {
        let catalog = catalog(&[20, 20, 20, 20, 20], 10_000);
        let plan = StripeSelector::select(&catalog, &AlwaysTrue, &SelectionOptions::default()).unwrap();

        assert_eq!(plan.selected_ordinals(), vec![0, 1, 2, 3, 4]);
        assert_eq!(plan.total_selected_rows(), 100);
        assert_eq!(plan.total_file_rows(), 100);
        let offsets: Vec<u64> = plan.stripes().iter().map(|s| s.file_row_offset).collect();
        assert_eq!(offsets, vec![0, 20, 40, 60, 80]);
        assert_eq!(plan.stripes()[0].row_ranges, vec![0..20]);
    }

    #[test]
    fn test_select_subset_keeps_file_offsets() {
        let catalog = catalog(&[20, 20, 20, 20, 20], 10_000);
        let predicate = from_fn(|rows, stats| {
            if rows == 100 {
                return true;
            }
            let range = stats.get(&0).and_then(|s| s.integer_statistics()).copied();
            matches!(range.map(|r| (r.min, r.max)), Some((60, 117)) | Some((180, 237)))
        });

        let plan = StripeSelector::select(&catalog, &predicate, &SelectionOptions::default()).unwrap();
        assert_eq!(plan.selected_ordinals(), vec![1, 3]);
        assert_eq!(plan.total_selected_rows(), 40);
        assert_eq!(plan.total_file_rows(), 100);
        assert_eq!(plan.stripes()[0].file_row_offset, 20);
        assert_eq!(plan.stripes()[1].file_row_offset, 60);
    }

    #[test]
    fn test_empty_stripes_never_selected() {
        let catalog = catalog(&[20, 0, 20], 10_000);
        let plan = StripeSelector::select(&catalog, &AlwaysTrue, &SelectionOptions::default()).unwrap();
        assert_eq!(plan.selected_ordinals(), vec![0, 2]);
        assert_eq!(plan.stripes()[1].file_row_offset, 20);
    }

    #[test]
    fn test_file_precheck_short_circuit() {
        let catalog = catalog(&[20, 20], 10_000);
        let predicate = from_fn(|rows, _| rows != 40);

        let plan = StripeSelector::select(&catalog, &predicate, &SelectionOptions::default()).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.total_file_rows(), 40);

        let options = SelectionOptions {
            file_precheck: false,
            ..Default::default()
        };
        let plan = StripeSelector::select(&catalog, &predicate, &options).unwrap();
        assert_eq!(plan.selected_ordinals(), vec![0, 1]);
    }

    #[test]
    fn test_stride_ranges() {
        let catalog = catalog(&[25], 10);
        let plan = StripeSelector::select(&catalog, &AlwaysTrue, &SelectionOptions::default()).unwrap();
        assert_eq!(plan.stripes()[0].row_ranges, vec![0..10, 10..20, 20..25]);
        assert_eq!(stride_ranges(0, 10), Vec::<Range<u64>>::new());
    }

    #[test]
    fn test_row_group_pruning() {
        let mut meta = FileMetadata {
            column_count: 1,
            row_index_stride: 10,
            stripes: vec![StripeDescriptor {
                ordinal: 0,
                row_count: 30,
                offset: 0,
                length: 100,
                statistics: int_stats(0, 29, 30),
                row_groups: vec![
                    RowGroupIndex { row_count: 10, statistics: int_stats(0, 9, 10) },
                    RowGroupIndex { row_count: 10, statistics: int_stats(10, 19, 10) },
                    RowGroupIndex { row_count: 10, statistics: int_stats(20, 29, 10) },
                ],
            }],
            statistics: StatisticsByColumn::new(),
        };
        let predicate = from_fn(|_, stats| {
            stats
                .get(&0)
                .and_then(|s| s.integer_statistics())
                .map(|r| r.min < 10 || r.max >= 20)
                .unwrap_or(true)
        });

        let pruning = SelectionOptions {
            row_group_pruning: true,
            ..Default::default()
        };
        let catalog = StripeCatalog::from_provider(&meta).unwrap();
        let plan = StripeSelector::select(&catalog, &predicate, &pruning).unwrap();
        let stripe = &plan.stripes()[0];
        assert_eq!(stripe.row_ranges, vec![0..10, 20..30]);
        assert_eq!(stripe.rows_to_read(), 20);
        assert_eq!(plan.total_selected_rows(), 20);

        let plan = StripeSelector::select(&catalog, &predicate, &SelectionOptions::default()).unwrap();
        assert_eq!(plan.stripes()[0].row_ranges, vec![0..10, 10..20, 20..30]);
        assert_eq!(plan.total_selected_rows(), 30);

        meta.stripes[0].row_groups.truncate(0);
        let catalog = StripeCatalog::from_provider(&meta).unwrap();
        let plan = StripeSelector::select(&catalog, &predicate, &pruning).unwrap();
        assert_eq!(plan.stripes()[0].row_ranges, vec![0..10, 10..20, 20..30]);
    }

    #[test]
    fn test_predicate_error_aborts_selection() {
        use crate::error::StripeError;
        use crate::predicate::StatisticsPredicate;

        let catalog = catalog(&[20, 20], 10_000);
        let predicate = StatisticsPredicate::new()
            .with_string_equals(0, "x")
            .strict(true);
        let options = SelectionOptions {
            file_precheck: false,
            ..Default::default()
        };

        let err = StripeSelector::select(&catalog, &predicate, &options).unwrap_err();
        assert!(matches!(err, StripeError::MissingStatistics { column: 0 }));
    }
}
