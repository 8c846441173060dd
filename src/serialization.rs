//! Segment-wise serialization of `PooledVec`.
//!
//! A vector is written as one [`Metadata`] record followed by one array per
//! segment, in tree order. Readers rebuild the same shape with
//! [`PooledVec::ensure`] and overwrite each segment from its stored array, so
//! no intermediate contiguous copy of the whole vector is ever made.
//!
//! Two storage backends are provided: [`MemoryStore`] keeps the records in
//! memory, [`PostcardSink`] / [`PostcardSource`] stream them through any
//! `Write` / `Read` as length-prefixed postcard records.

use std::io::{ErrorKind, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{ArrayAllocator, HeapAllocator, Options, PooledVec};

/// Error type for serialization operations.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("Postcard serialization error: {0}")]
    Postcard(#[from] postcard::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("segment array {index} is missing")]
    MissingArray { index: usize },

    #[error("segment array {index} holds {actual} elements, expected at least {expected}")]
    UndersizedArray {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid snapshot format: {0}")]
    InvalidFormat(String),
}

/// Magic bytes opening a postcard stream.
const STREAM_MAGIC: &[u8; 4] = b"PVEC";

/// Version of the postcard stream layout.
const STREAM_VERSION: u8 = 1;

/// Shape of a serialized vector, written before its arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub max_segment_capacity: u32,
    pub element_count: u64,
    pub version: u16,
    /// Number of arrays that follow. An empty vector still writes one.
    pub segment_count: u64,
}

/// Destination of a serialized vector.
pub trait SerializationSink<T> {
    fn write_metadata(&mut self, metadata: &Metadata) -> Result<(), SerializeError>;

    /// Writes the live elements of segment `index`.
    fn write_array(&mut self, index: usize, items: &[T]) -> Result<(), SerializeError>;
}

/// Origin of a serialized vector.
pub trait SerializationSource<T> {
    fn read_metadata(&mut self) -> Result<Metadata, SerializeError>;

    /// Reads the array of segment `index`, `Ok(None)` if none was stored.
    fn read_array(&mut self, index: usize) -> Result<Option<Vec<T>>, SerializeError>;
}

impl<T, A: ArrayAllocator<T>> PooledVec<T, A> {
    /// Describes the current shape for serialization.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            max_segment_capacity: self.options.segment_capacity() as u32,
            element_count: self.len as u64,
            version: self.version,
            segment_count: self.segment_count().max(1) as u64,
        }
    }

    /// Writes the metadata and every segment to `sink`.
    ///
    /// # Example
    ///
    /// ```
    /// use pooled_vec::{MemoryStore, Options, PooledVec};
    ///
    /// let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
    /// vec.extend(0..40);
    ///
    /// let mut store = MemoryStore::new();
    /// vec.serialize_into(&mut store).unwrap();
    /// assert_eq!(store.arrays().len(), 3);
    ///
    /// let copy: PooledVec<i32> = PooledVec::deserialize_from(&mut store).unwrap();
    /// assert_eq!(copy, vec);
    /// assert_eq!(copy.version(), vec.version());
    /// ```
    pub fn serialize_into<S>(&self, sink: &mut S) -> Result<(), SerializeError>
    where
        S: SerializationSink<T> + ?Sized,
    {
        let metadata = self.metadata();
        sink.write_metadata(&metadata)?;
        if self.is_empty() {
            sink.write_array(0, &[])?;
        } else {
            for (index, items) in self.segments().enumerate() {
                sink.write_array(index, items)?;
            }
        }
        tracing::debug!(
            elements = metadata.element_count,
            segments = metadata.segment_count,
            "serialized pooled vec"
        );
        Ok(())
    }

    /// Rebuilds a vector from `source`, renting its segments from `allocator`.
    ///
    /// # Errors
    ///
    /// Fails on metadata that does not describe a valid vector, on a missing
    /// array, and on an array shorter than the segment it fills.
    pub fn deserialize_in<S>(source: &mut S, allocator: A) -> Result<Self, SerializeError>
    where
        S: SerializationSource<T> + ?Sized,
        T: Default + Clone,
    {
        let metadata = source.read_metadata()?;
        let options = validate(&metadata)?;
        let count = usize::try_from(metadata.element_count).map_err(|_| {
            SerializeError::InvalidFormat(format!(
                "element count {} does not fit in memory",
                metadata.element_count
            ))
        })?;

        let mut vec = Self::with_options_in(options, allocator);
        vec.ensure(count, T::default());
        let expected = vec.segment_count().max(1);
        if metadata.segment_count != expected as u64 {
            return Err(SerializeError::InvalidFormat(format!(
                "{} segments declared, {} elements need {}",
                metadata.segment_count, count, expected
            )));
        }

        if count == 0 {
            source
                .read_array(0)?
                .ok_or(SerializeError::MissingArray { index: 0 })?;
        } else if let Some(root) = vec.root.as_mut() {
            let mut index = 0;
            let mut failure = None;
            root.for_each_segment_mut(&mut |items| {
                if failure.is_some() {
                    return;
                }
                match source.read_array(index) {
                    Ok(Some(array)) if array.len() < items.len() => {
                        failure = Some(SerializeError::UndersizedArray {
                            index,
                            expected: items.len(),
                            actual: array.len(),
                        });
                    }
                    Ok(Some(array)) => {
                        for (slot, item) in items.as_mut_slice().iter_mut().zip(array) {
                            *slot = item;
                        }
                    }
                    Ok(None) => failure = Some(SerializeError::MissingArray { index }),
                    Err(err) => failure = Some(err),
                }
                index += 1;
            });
            if let Some(err) = failure {
                return Err(err);
            }
        }

        vec.version = metadata.version;
        tracing::debug!(
            elements = count,
            segments = expected,
            "deserialized pooled vec"
        );
        Ok(vec)
    }
}

impl<T: Default + Clone> PooledVec<T> {
    /// Rebuilds a vector from `source` on the heap allocator.
    pub fn deserialize_from<S>(source: &mut S) -> Result<Self, SerializeError>
    where
        S: SerializationSource<T> + ?Sized,
    {
        Self::deserialize_in(source, HeapAllocator)
    }
}

fn validate(metadata: &Metadata) -> Result<Options, SerializeError> {
    let capacity = metadata.max_segment_capacity as usize;
    if !capacity.is_power_of_two()
        || !(Options::MIN_SEGMENT_CAPACITY..=Options::MAX_SEGMENT_CAPACITY).contains(&capacity)
    {
        return Err(SerializeError::InvalidFormat(format!(
            "segment capacity {capacity} is not a supported power of two"
        )));
    }
    Ok(Options::new().max_segment_capacity(capacity))
}

/// In-memory [`SerializationSink`] and [`SerializationSource`].
#[derive(Debug, Clone)]
pub struct MemoryStore<T> {
    metadata: Option<Metadata>,
    arrays: Vec<Vec<T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            metadata: None,
            arrays: Vec::new(),
        }
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Stored arrays, indexed by segment.
    pub fn arrays(&self) -> &[Vec<T>] {
        &self.arrays
    }

    pub fn arrays_mut(&mut self) -> &mut Vec<Vec<T>> {
        &mut self.arrays
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> SerializationSink<T> for MemoryStore<T> {
    fn write_metadata(&mut self, metadata: &Metadata) -> Result<(), SerializeError> {
        self.metadata = Some(*metadata);
        self.arrays.clear();
        Ok(())
    }

    fn write_array(&mut self, index: usize, items: &[T]) -> Result<(), SerializeError> {
        if index != self.arrays.len() {
            return Err(SerializeError::InvalidFormat(format!(
                "array {index} written out of order"
            )));
        }
        self.arrays.push(items.to_vec());
        Ok(())
    }
}

impl<T: Clone> SerializationSource<T> for MemoryStore<T> {
    fn read_metadata(&mut self) -> Result<Metadata, SerializeError> {
        self.metadata
            .ok_or_else(|| SerializeError::InvalidFormat("no metadata stored".to_string()))
    }

    fn read_array(&mut self, index: usize) -> Result<Option<Vec<T>>, SerializeError> {
        Ok(self.arrays.get(index).cloned())
    }
}

/// Streams records to a writer.
///
/// The stream opens with `b"PVEC"` and a format version byte; every record
/// is a little-endian `u32` length followed by that many postcard bytes.
pub struct PostcardSink<W> {
    writer: W,
}

impl<W: Write> PostcardSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record<V: Serialize>(&mut self, value: &V) -> Result<(), SerializeError> {
        let bytes = postcard::to_stdvec(value)?;
        let len = u32::try_from(bytes.len()).map_err(|_| {
            SerializeError::InvalidFormat(format!("record of {} bytes is too large", bytes.len()))
        })?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(&bytes)?;
        Ok(())
    }
}

impl<T: Serialize, W: Write> SerializationSink<T> for PostcardSink<W> {
    fn write_metadata(&mut self, metadata: &Metadata) -> Result<(), SerializeError> {
        self.writer.write_all(STREAM_MAGIC)?;
        self.writer.write_all(&[STREAM_VERSION])?;
        self.write_record(metadata)
    }

    fn write_array(&mut self, _index: usize, items: &[T]) -> Result<(), SerializeError> {
        self.write_record(&items)
    }
}

/// Reads records written by [`PostcardSink`], in order.
pub struct PostcardSource<R> {
    reader: R,
}

impl<R: Read> PostcardSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads one record, `Ok(None)` at the end of the stream.
    fn read_record<V: DeserializeOwned>(&mut self) -> Result<Option<V>, SerializeError> {
        let mut len = [0u8; 4];
        match self.reader.read_exact(&mut len) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let mut bytes = vec![0u8; u32::from_le_bytes(len) as usize];
        self.reader.read_exact(&mut bytes)?;
        Ok(Some(postcard::from_bytes(&bytes)?))
    }
}

impl<T: DeserializeOwned, R: Read> SerializationSource<T> for PostcardSource<R> {
    fn read_metadata(&mut self) -> Result<Metadata, SerializeError> {
        let mut header = [0u8; 5];
        self.reader.read_exact(&mut header)?;
        if &header[..4] != STREAM_MAGIC {
            return Err(SerializeError::InvalidFormat(
                "missing PVEC magic bytes".to_string(),
            ));
        }
        if header[4] != STREAM_VERSION {
            return Err(SerializeError::InvalidFormat(format!(
                "unsupported stream version {}",
                header[4]
            )));
        }
        self.read_record()?.ok_or_else(|| {
            SerializeError::InvalidFormat("stream ended before metadata".to_string())
        })
    }

    fn read_array(&mut self, _index: usize) -> Result<Option<Vec<T>>, SerializeError> {
        self.read_record()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(n: u32) -> PooledVec<u32> {
        let mut vec = PooledVec::with_options(Options::new().max_segment_capacity(16));
        vec.extend(0..n);
        vec
    }

    #[test]
    fn test_memory_round_trip_deep() {
        let vec = small(1000);
        let mut store = MemoryStore::new();
        vec.serialize_into(&mut store).unwrap();
        let metadata = *store.metadata().unwrap();
        assert_eq!(metadata.segment_count, 63);
        assert_eq!(metadata.element_count, 1000);
        assert_eq!(metadata.max_segment_capacity, 16);

        let copy: PooledVec<u32> = PooledVec::deserialize_from(&mut store).unwrap();
        assert_eq!(copy, vec);
        assert_eq!(copy.version(), vec.version());
        assert_eq!(copy.max_segment_capacity(), 16);
        assert_eq!(copy.last(), Some(&999));
    }

    #[test]
    fn test_empty_writes_one_array() {
        let vec = small(0);
        let mut store = MemoryStore::new();
        vec.serialize_into(&mut store).unwrap();
        assert_eq!(store.metadata().map(|m| m.segment_count), Some(1));
        assert_eq!(store.arrays(), &[Vec::<u32>::new()]);

        let copy: PooledVec<u32> = PooledVec::deserialize_from(&mut store).unwrap();
        assert!(copy.is_empty());
    }

    #[test]
    fn test_missing_array_is_fatal() {
        let vec = small(40);
        let mut store = MemoryStore::new();
        vec.serialize_into(&mut store).unwrap();
        store.arrays_mut().pop();
        let result = PooledVec::<u32>::deserialize_from(&mut store);
        assert!(matches!(result, Err(SerializeError::MissingArray { index: 2 })));
    }

    #[test]
    fn test_undersized_array_is_fatal() {
        let vec = small(40);
        let mut store = MemoryStore::new();
        vec.serialize_into(&mut store).unwrap();
        store.arrays_mut()[1].truncate(3);
        let result = PooledVec::<u32>::deserialize_from(&mut store);
        assert!(matches!(
            result,
            Err(SerializeError::UndersizedArray {
                index: 1,
                expected: 16,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_invalid_metadata_rejected() {
        let mut store: MemoryStore<u32> = MemoryStore::new();
        let metadata = Metadata {
            max_segment_capacity: 100,
            element_count: 0,
            version: 0,
            segment_count: 1,
        };
        store.write_metadata(&metadata).unwrap();
        store.write_array(0, &[]).unwrap();
        assert!(matches!(
            PooledVec::<u32>::deserialize_from(&mut store),
            Err(SerializeError::InvalidFormat(_))
        ));

        let metadata = Metadata {
            max_segment_capacity: 16,
            element_count: 40,
            version: 0,
            segment_count: 2,
        };
        store.write_metadata(&metadata).unwrap();
        assert!(matches!(
            PooledVec::<u32>::deserialize_from(&mut store),
            Err(SerializeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_postcard_stream_round_trip() {
        let mut vec = small(100);
        vec.remove_at(3).unwrap();
        let mut sink = PostcardSink::new(Vec::new());
        vec.serialize_into(&mut sink).unwrap();
        let bytes = sink.into_inner();
        assert_eq!(&bytes[..4], b"PVEC");

        let mut again = PostcardSink::new(Vec::new());
        vec.serialize_into(&mut again).unwrap();
        assert_eq!(again.into_inner(), bytes);

        let mut source = PostcardSource::new(bytes.as_slice());
        let copy: PooledVec<u32> = PooledVec::deserialize_from(&mut source).unwrap();
        assert_eq!(copy, vec);
        assert_eq!(copy.version(), vec.version());
    }

    #[test]
    fn test_postcard_truncated_stream() {
        let vec = small(40);
        let mut sink = PostcardSink::new(Vec::new());
        vec.serialize_into(&mut sink).unwrap();
        let mut bytes = sink.into_inner();
        // Drop the last record and its length prefix.
        let last_record = 4 + postcard::to_stdvec(&&[32u32, 33, 34, 35, 36, 37, 38, 39][..])
            .unwrap()
            .len();
        bytes.truncate(bytes.len() - last_record);

        let mut source = PostcardSource::new(bytes.as_slice());
        let result = PooledVec::<u32>::deserialize_from(&mut source);
        assert!(matches!(result, Err(SerializeError::MissingArray { index: 2 })));
    }

    #[test]
    fn test_postcard_rejects_bad_magic() {
        let mut source = PostcardSource::new(&b"NOPE\x01"[..]);
        let result = PooledVec::<u32>::deserialize_from(&mut source);
        assert!(matches!(result, Err(SerializeError::InvalidFormat(_))));
    }
}
