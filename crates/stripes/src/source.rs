//! Byte sources for stripe data
//!
//! Stripe bytes are fetched lazily, one selected stripe at a time. Skipped
//! stripes are never requested from the source.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use crate::catalog::StripeDescriptor;
use crate::error::{Result, StripeError};

/// Trait for random-access byte sources backing a file
pub trait StripeSource {
    /// Reads exactly `length` bytes starting at `offset`
    fn read_range(&mut self, offset: u64, length: u64) -> Result<Bytes>;
}

impl<S: StripeSource + ?Sized> StripeSource for Box<S> {
    fn read_range(&mut self, offset: u64, length: u64) -> Result<Bytes> {
        (**self).read_range(offset, length)
    }
}

/// Source backed by a local file handle
pub struct FileSource {
    file: File,
}

impl FileSource {
    /// Opens a file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            file: File::open(path.as_ref())?,
        })
    }
}

impl StripeSource for FileSource {
    fn read_range(&mut self, offset: u64, length: u64) -> Result<Bytes> {
        self.file.seek(SeekFrom::Start(offset))?;

        // Buffer grows with the bytes actually read, not the requested length
        let mut buf = Vec::new();
        let read = (&mut self.file).take(length).read_to_end(&mut buf)?;
        if read as u64 != length {
            return Err(StripeError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("range {}+{} past end of file, read {} bytes", offset, length, read),
            )));
        }
        Ok(Bytes::from(buf))
    }
}

/// Source backed by an in-memory buffer
#[derive(Debug, Clone)]
pub struct BytesSource {
    data: Bytes,
}

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl StripeSource for BytesSource {
    fn read_range(&mut self, offset: u64, length: u64) -> Result<Bytes> {
        let end = offset.checked_add(length);
        match end {
            Some(end) if end <= self.data.len() as u64 => {
                Ok(self.data.slice(offset as usize..end as usize))
            }
            _ => Err(StripeError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "range {}+{} past end of {}-byte buffer",
                    offset,
                    length,
                    self.data.len()
                ),
            ))),
        }
    }
}

/// Fetched bytes of one stripe, handed to column decoders
#[derive(Debug, Clone)]
pub struct StripeData {
    ordinal: usize,
    row_count: u64,
    bytes: Bytes,
}

impl StripeData {
    /// Fetches the stripe described by `descriptor` from `source`
    pub fn fetch(source: &mut dyn StripeSource, descriptor: &StripeDescriptor) -> Result<Self> {
        let bytes = source.read_range(descriptor.offset, descriptor.length)?;
        if bytes.len() as u64 != descriptor.length {
            return Err(StripeError::Metadata(format!(
                "stripe {} expected {} bytes, source returned {}",
                descriptor.ordinal,
                descriptor.length,
                bytes.len()
            )));
        }
        Ok(Self {
            ordinal: descriptor.ordinal,
            row_count: descriptor.row_count,
            bytes,
        })
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statistics::StatisticsByColumn;

    fn descriptor(offset: u64, length: u64) -> StripeDescriptor {
        StripeDescriptor {
            ordinal: 2,
            row_count: 4,
            offset,
            length,
            statistics: StatisticsByColumn::new(),
            row_groups: Vec::new(),
        }
    }

    #[test]
    fn test_bytes_source_ranges() {
        let mut source = BytesSource::new(vec![1u8, 2, 3, 4, 5, 6]);
        assert_eq!(source.read_range(2, 3).unwrap().as_ref(), &[3, 4, 5]);
        assert_eq!(source.read_range(6, 0).unwrap().len(), 0);
        assert!(matches!(source.read_range(4, 3), Err(StripeError::Io(_))));
        assert!(source.read_range(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_fetch_stripe() {
        let mut source = BytesSource::new(vec![0u8; 32]);
        let data = StripeData::fetch(&mut source, &descriptor(8, 16)).unwrap();
        assert_eq!(data.ordinal(), 2);
        assert_eq!(data.row_count(), 4);
        assert_eq!(data.bytes().len(), 16);

        assert!(StripeData::fetch(&mut source, &descriptor(24, 16)).is_err());
    }

    #[test]
    fn test_file_source() {
        let path = std::env::temp_dir().join(format!("stripes-source-{}.bin", std::process::id()));
        std::fs::write(&path, b"0123456789").unwrap();

        let mut source = FileSource::open(&path).unwrap();
        assert_eq!(source.read_range(3, 4).unwrap().as_ref(), b"3456");
        assert!(matches!(source.read_range(8, 4), Err(StripeError::Io(_))));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_file_source_corrupt_length() {
        let path = std::env::temp_dir().join(format!("stripes-corrupt-{}.bin", std::process::id()));
        std::fs::write(&path, b"0123456789").unwrap();

        let mut source = FileSource::open(&path).unwrap();
        let err = source.read_range(2, u64::MAX / 2).unwrap_err();
        match err {
            StripeError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io error, got {:?}", other),
        }
        assert_eq!(source.read_range(0, 2).unwrap().as_ref(), b"01");

        std::fs::remove_file(&path).unwrap();
    }
}
