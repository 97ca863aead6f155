//! Predicates deciding whether a stripe or row group might contain matches
//!
//! A predicate sees only a row count and the statistics of the region being
//! considered. It answers "might match": `true` keeps the region, `false`
//! proves it can be skipped without decoding.

use std::fmt;

use crate::error::{Result, StripeError};
use crate::statistics::{ColumnStatistics, StatisticsByColumn};

/// Trait for predicates evaluated against region statistics
pub trait StripePredicate {
    /// Returns true if the region might contain matching rows
    fn matches(&self, row_count: u64, statistics: &StatisticsByColumn) -> Result<bool>;
}

/// Predicate that keeps every region
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrue;

impl StripePredicate for AlwaysTrue {
    fn matches(&self, _row_count: u64, _statistics: &StatisticsByColumn) -> Result<bool> {
        Ok(true)
    }
}

/// Adapter turning an infallible closure into a predicate
pub struct FnPredicate<F>(F);

/// Adapter turning a fallible closure into a predicate
pub struct TryFnPredicate<F>(F);

/// Builds a predicate from a closure over `(row_count, statistics)`
pub fn from_fn<F>(f: F) -> FnPredicate<F>
where
    F: Fn(u64, &StatisticsByColumn) -> bool,
{
    FnPredicate(f)
}

/// Builds a predicate from a closure that may fail, e.g. on missing statistics
pub fn try_from_fn<F>(f: F) -> TryFnPredicate<F>
where
    F: Fn(u64, &StatisticsByColumn) -> Result<bool>,
{
    TryFnPredicate(f)
}

impl<F> StripePredicate for FnPredicate<F>
where
    F: Fn(u64, &StatisticsByColumn) -> bool,
{
    fn matches(&self, row_count: u64, statistics: &StatisticsByColumn) -> Result<bool> {
        Ok((self.0)(row_count, statistics))
    }
}

impl<F> StripePredicate for TryFnPredicate<F>
where
    F: Fn(u64, &StatisticsByColumn) -> Result<bool>,
{
    fn matches(&self, row_count: u64, statistics: &StatisticsByColumn) -> Result<bool> {
        (self.0)(row_count, statistics)
    }
}

impl<P: StripePredicate + ?Sized> StripePredicate for &P {
    fn matches(&self, row_count: u64, statistics: &StatisticsByColumn) -> Result<bool> {
        (**self).matches(row_count, statistics)
    }
}

impl<P: StripePredicate + ?Sized> StripePredicate for Box<P> {
    fn matches(&self, row_count: u64, statistics: &StatisticsByColumn) -> Result<bool> {
        (**self).matches(row_count, statistics)
    }
}

/// A single condition on one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnCondition {
    /// Integer value within `[min, max]`
    IntegerBetween { column: usize, min: i64, max: i64 },
    /// Floating point value within `[min, max]`
    DoubleBetween { column: usize, min: f64, max: f64 },
    /// String equal to the given value
    StringEquals { column: usize, value: String },
    /// At least one non-null value
    IsNotNull { column: usize },
}

impl ColumnCondition {
    fn column(&self) -> usize {
        match self {
            ColumnCondition::IntegerBetween { column, .. }
            | ColumnCondition::DoubleBetween { column, .. }
            | ColumnCondition::StringEquals { column, .. }
            | ColumnCondition::IsNotNull { column } => *column,
        }
    }

    /// Evaluates against one column's statistics. `None` means the
    /// statistics do not carry what this condition needs.
    fn evaluate(&self, stats: &ColumnStatistics) -> Option<bool> {
        match self {
            ColumnCondition::IntegerBetween { min, max, .. } => {
                if stats.is_all_null() {
                    return Some(false);
                }
                let range = stats.integer_statistics()?;
                Some(range.max >= *min && range.min <= *max)
            }
            ColumnCondition::DoubleBetween { min, max, .. } => {
                if stats.is_all_null() {
                    return Some(false);
                }
                let range = stats.double_statistics()?;
                Some(range.max >= *min && range.min <= *max)
            }
            ColumnCondition::StringEquals { value, .. } => {
                if stats.is_all_null() {
                    return Some(false);
                }
                let range = stats.string_statistics()?;
                Some(range.min.as_str() <= value.as_str() && value.as_str() <= range.max.as_str())
            }
            ColumnCondition::IsNotNull { .. } => Some(!stats.is_all_null()),
        }
    }
}

impl fmt::Display for ColumnCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnCondition::IntegerBetween { column, min, max } => {
                write!(f, "#{} BETWEEN {} AND {}", column, min, max)
            }
            ColumnCondition::DoubleBetween { column, min, max } => {
                write!(f, "#{} BETWEEN {} AND {}", column, min, max)
            }
            ColumnCondition::StringEquals { column, value } => write!(f, "#{} = '{}'", column, value),
            ColumnCondition::IsNotNull { column } => write!(f, "#{} IS NOT NULL", column),
        }
    }
}

/// Conjunction of column conditions evaluated against statistics
///
/// By default a region is kept whenever statistics cannot prove a miss.
/// In strict mode a referenced column without usable statistics is an
/// error instead.
#[derive(Debug, Clone, Default)]
pub struct StatisticsPredicate {
    conditions: Vec<ColumnCondition>,
    strict: bool,
}

impl StatisticsPredicate {
    /// Creates an empty predicate (keeps everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires integer values of `column` to overlap `[min, max]`
    pub fn with_integer_range(mut self, column: usize, min: i64, max: i64) -> Self {
        self.conditions
            .push(ColumnCondition::IntegerBetween { column, min, max });
        self
    }

    /// Requires double values of `column` to overlap `[min, max]`
    pub fn with_double_range(mut self, column: usize, min: f64, max: f64) -> Self {
        self.conditions
            .push(ColumnCondition::DoubleBetween { column, min, max });
        self
    }

    /// Requires `column` to possibly contain `value`
    pub fn with_string_equals(mut self, column: usize, value: impl Into<String>) -> Self {
        self.conditions.push(ColumnCondition::StringEquals {
            column,
            value: value.into(),
        });
        self
    }

    /// Requires `column` to have at least one non-null value
    pub fn with_not_null(mut self, column: usize) -> Self {
        self.conditions.push(ColumnCondition::IsNotNull { column });
        self
    }

    /// Fails on missing statistics instead of keeping the region
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl StripePredicate for StatisticsPredicate {
    fn matches(&self, row_count: u64, statistics: &StatisticsByColumn) -> Result<bool> {
        if row_count == 0 {
            return Ok(false);
        }

        for condition in &self.conditions {
            let column = condition.column();
            let outcome = statistics
                .get(&column)
                .and_then(|stats| condition.evaluate(stats));

            match outcome {
                Some(false) => return Ok(false),
                Some(true) => {}
                None if self.strict => return Err(StripeError::MissingStatistics { column }),
                None => {}
            }
        }
        Ok(true)
    }
}

impl fmt::Display for StatisticsPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "TRUE");
        }
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{}", condition)?;
        }
        Ok(())
    }
}
