//! Per-column summary statistics attached to stripes and row groups
//!
//! Statistics are read-only values produced by a metadata provider. The
//! reader never aggregates them across stripes; providers that need a
//! file-level summary build it with [`ColumnStatistics::merge`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Statistics keyed by column index
pub type StatisticsByColumn = BTreeMap<usize, ColumnStatistics>;

/// Min/max for integer columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegerStatistics {
    pub min: i64,
    pub max: i64,
}

/// Min/max for floating point columns
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoubleStatistics {
    pub min: f64,
    pub max: f64,
}

/// Min/max for string columns (lexicographic on UTF-8 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringStatistics {
    pub min: String,
    pub max: String,
}

/// Summary of one column within one stripe or row group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of rows covered by these statistics
    pub row_count: u64,

    /// Number of null values among those rows
    #[serde(default)]
    pub null_count: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer: Option<IntegerStatistics>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double: Option<DoubleStatistics>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string: Option<StringStatistics>,
}

impl ColumnStatistics {
    /// Creates statistics with only a row count and null count
    pub fn new(row_count: u64, null_count: u64) -> Self {
        Self {
            row_count,
            null_count,
            ..Default::default()
        }
    }

    /// Attaches integer min/max
    pub fn with_integer(mut self, min: i64, max: i64) -> Self {
        self.integer = Some(IntegerStatistics { min, max });
        self
    }

    /// Attaches double min/max
    pub fn with_double(mut self, min: f64, max: f64) -> Self {
        self.double = Some(DoubleStatistics { min, max });
        self
    }

    /// Attaches string min/max
    pub fn with_string(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.string = Some(StringStatistics {
            min: min.into(),
            max: max.into(),
        });
        self
    }

    pub fn integer_statistics(&self) -> Option<&IntegerStatistics> {
        self.integer.as_ref()
    }

    pub fn double_statistics(&self) -> Option<&DoubleStatistics> {
        self.double.as_ref()
    }

    pub fn string_statistics(&self) -> Option<&StringStatistics> {
        self.string.as_ref()
    }

    /// Returns true if every covered row is null
    pub fn is_all_null(&self) -> bool {
        self.row_count > 0 && self.null_count >= self.row_count
    }

    /// Combines two summaries of the same column.
    ///
    /// A typed min/max survives only if both sides carry it, except when one
    /// side is entirely null and so has nothing to contribute.
    pub fn merge(&self, other: &ColumnStatistics) -> ColumnStatistics {
        ColumnStatistics {
            row_count: self.row_count + other.row_count,
            null_count: self.null_count + other.null_count,
            integer: merge_range(self, other, |s| s.integer, |a, b| IntegerStatistics {
                min: a.min.min(b.min),
                max: a.max.max(b.max),
            }),
            double: merge_range(self, other, |s| s.double, |a, b| DoubleStatistics {
                min: a.min.min(b.min),
                max: a.max.max(b.max),
            }),
            string: merge_range(
                self,
                other,
                |s| s.string.clone(),
                |a, b| StringStatistics {
                    min: if a.min <= b.min { a.min } else { b.min },
                    max: if a.max >= b.max { a.max } else { b.max },
                },
            ),
        }
    }
}

fn merge_range<T>(
    left: &ColumnStatistics,
    right: &ColumnStatistics,
    get: impl Fn(&ColumnStatistics) -> Option<T>,
    combine: impl Fn(T, T) -> T,
) -> Option<T> {
    match (get(left), get(right)) {
        (Some(a), Some(b)) => Some(combine(a, b)),
        (Some(a), None) if right.is_all_null() || right.row_count == 0 => Some(a),
        (None, Some(b)) if left.is_all_null() || left.row_count == 0 => Some(b),
        _ => None,
    }
}

/// Merges a sequence of per-stripe statistics maps into one map.
///
/// Columns missing from any stripe are dropped from the result, since the
/// merged summary could not describe them.
pub fn merge_all<'a>(maps: impl IntoIterator<Item = &'a StatisticsByColumn>) -> StatisticsByColumn {
    let mut iter = maps.into_iter();
    let Some(first) = iter.next() else {
        return StatisticsByColumn::new();
    };

    let mut merged = first.clone();
    for map in iter {
        merged = merged
            .iter()
            .filter_map(|(column, stats)| map.get(column).map(|other| (*column, stats.merge(other))))
            .collect();
    }
    merged
}
