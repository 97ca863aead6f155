//! Column decoding contract and the plain int64 stripe encoding
//!
//! The reader never looks inside stripe bytes. It hands the fetched
//! [`StripeData`] and a row range to a [`ColumnDecoder`] and stores the
//! resulting Arrow array in the caller's [`ColumnBuffer`].

use std::ops::Range;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array};
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, StripeError};
use crate::source::StripeData;

/// Trait for decoders materializing one column of a stripe
pub trait ColumnDecoder {
    /// Decodes `rows` (relative to the stripe start) of `column`.
    ///
    /// The returned array must have exactly `rows.end - rows.start` entries.
    fn decode(&self, stripe: &StripeData, column: usize, rows: Range<u64>) -> Result<ArrayRef>;
}

impl<D: ColumnDecoder + ?Sized> ColumnDecoder for Box<D> {
    fn decode(&self, stripe: &StripeData, column: usize, rows: Range<u64>) -> Result<ArrayRef> {
        (**self).decode(stripe, column, rows)
    }
}

/// Caller-provided output slot for one column of one batch
#[derive(Debug, Clone)]
pub struct ColumnBuffer {
    capacity: usize,
    array: Option<ArrayRef>,
}

impl ColumnBuffer {
    /// Creates an empty buffer for a batch of `capacity` rows
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            array: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the decoded values, if the buffer has been filled
    pub fn array(&self) -> Option<&ArrayRef> {
        self.array.as_ref()
    }

    /// Takes the decoded values out of the buffer
    pub fn take(&mut self) -> Option<ArrayRef> {
        self.array.take()
    }

    /// Returns the values as int64 if the buffer holds an int64 column
    pub fn as_int64(&self) -> Option<&Int64Array> {
        self.array
            .as_ref()
            .and_then(|a| a.as_any().downcast_ref::<Int64Array>())
    }

    pub(crate) fn fill(&mut self, array: ArrayRef) -> Result<()> {
        if array.len() != self.capacity {
            return Err(StripeError::Decode(format!(
                "decoder produced {} values for a {}-row batch",
                array.len(),
                self.capacity
            )));
        }
        self.array = Some(array);
        Ok(())
    }
}

/// Bytes per row in the plain encoding: one presence byte plus a
/// little-endian i64.
pub const PLAIN_ROW_WIDTH: usize = 9;

/// Encodes a stripe in the plain layout.
///
/// Each column is stored as `row_count` presence bytes followed by
/// `row_count` little-endian i64 values; columns are concatenated in index
/// order. Null slots hold zero.
pub fn encode_plain_stripe(columns: &[Vec<Option<i64>>]) -> Bytes {
    let rows = columns.first().map(Vec::len).unwrap_or(0);
    let mut buf = BytesMut::with_capacity(columns.len() * rows * PLAIN_ROW_WIDTH);

    for values in columns {
        for value in values {
            buf.put_u8(u8::from(value.is_some()));
        }
        for value in values {
            buf.put_i64_le(value.unwrap_or(0));
        }
    }
    buf.freeze()
}

/// Decoder for stripes written with [`encode_plain_stripe`]
#[derive(Debug, Clone, Copy)]
pub struct PlainInt64Decoder {
    column_count: usize,
}

impl PlainInt64Decoder {
    pub fn new(column_count: usize) -> Self {
        Self { column_count }
    }
}

impl ColumnDecoder for PlainInt64Decoder {
    fn decode(&self, stripe: &StripeData, column: usize, rows: Range<u64>) -> Result<ArrayRef> {
        if column >= self.column_count {
            return Err(StripeError::InvalidArgument(format!(
                "column {} out of range for {} columns",
                column, self.column_count
            )));
        }

        let row_count = stripe.row_count() as usize;
        if rows.start > rows.end || rows.end as usize > row_count {
            return Err(StripeError::InvalidArgument(format!(
                "row range {:?} outside stripe {} with {} rows",
                rows,
                stripe.ordinal(),
                row_count
            )));
        }

        let bytes = stripe.bytes();
        let expected = self.column_count * row_count * PLAIN_ROW_WIDTH;
        if bytes.len() != expected {
            return Err(StripeError::Decode(format!(
                "stripe {} has {} bytes, plain layout needs {}",
                stripe.ordinal(),
                bytes.len(),
                expected
            )));
        }

        let column_base = column * row_count * PLAIN_ROW_WIDTH;
        let presence = &bytes[column_base..column_base + row_count];
        let values = &bytes[column_base + row_count..column_base + row_count * PLAIN_ROW_WIDTH];

        let decoded: Int64Array = (rows.start as usize..rows.end as usize)
            .map(|row| {
                if presence[row] == 0 {
                    return None;
                }
                let mut word = [0u8; 8];
                word.copy_from_slice(&values[row * 8..row * 8 + 8]);
                Some(i64::from_le_bytes(word))
            })
            .collect();

        Ok(Arc::new(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StripeDescriptor;
    use crate::source::BytesSource;
    use crate::statistics::StatisticsByColumn;

    fn stripe_data(columns: &[Vec<Option<i64>>]) -> StripeData {
        let bytes = encode_plain_stripe(columns);
        let descriptor = StripeDescriptor {
            ordinal: 0,
            row_count: columns[0].len() as u64,
            offset: 0,
            length: bytes.len() as u64,
            statistics: StatisticsByColumn::new(),
            row_groups: Vec::new(),
        };
        let mut source = BytesSource::new(bytes);
        StripeData::fetch(&mut source, &descriptor).unwrap()
    }

    #[test]
    fn test_decode_plain_range() {
        let data = stripe_data(&[
            vec![Some(1), Some(2), None, Some(4)],
            vec![Some(-10), Some(-20), Some(-30), Some(-40)],
        ]);
        let decoder = PlainInt64Decoder::new(2);

        let first = decoder.decode(&data, 0, 1..4).unwrap();
        let first = first.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first.value(0), 2);
        assert!(first.is_null(1));
        assert_eq!(first.value(2), 4);

        let second = decoder.decode(&data, 1, 0..2).unwrap();
        let second = second.as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(second.values().to_vec(), vec![-10, -20]);
    }

    #[test]
    fn test_decode_rejects_bad_requests() {
        let data = stripe_data(&[vec![Some(1), Some(2)]]);
        let decoder = PlainInt64Decoder::new(1);

        assert!(matches!(
            decoder.decode(&data, 1, 0..1),
            Err(StripeError::InvalidArgument(_))
        ));
        assert!(matches!(
            decoder.decode(&data, 0, 1..3),
            Err(StripeError::InvalidArgument(_))
        ));

        let wide = PlainInt64Decoder::new(2);
        assert!(matches!(wide.decode(&data, 0, 0..1), Err(StripeError::Decode(_))));
    }

    #[test]
    fn test_column_buffer_fill() {
        let mut buffer = ColumnBuffer::new(2);
        assert!(buffer.array().is_none());

        let wrong: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
        assert!(buffer.fill(wrong).is_err());

        let right: ArrayRef = Arc::new(Int64Array::from(vec![7, 8]));
        buffer.fill(right).unwrap();
        assert_eq!(buffer.as_int64().unwrap().value(1), 8);
        assert!(buffer.take().is_some());
        assert!(buffer.array().is_none());
    }
}
