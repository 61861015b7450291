//! Limited record buffer.

use crate::order::SortOrder;

/// Record buffer builder.
#[derive(Clone, Debug)]
pub struct RecordBufferBuilder {
    buffer_limit: usize,
    preallocate: bool,
}

impl RecordBufferBuilder {
    pub fn new(buffer_limit: usize, preallocate: bool) -> Self {
        RecordBufferBuilder {
            buffer_limit,
            preallocate,
        }
    }

    pub fn limit(&self) -> usize {
        self.buffer_limit
    }

    /// Creates a new buffer.
    pub fn build(&self) -> RecordBuffer {
        if self.preallocate {
            RecordBuffer::with_capacity(self.buffer_limit)
        } else {
            RecordBuffer::new(self.buffer_limit)
        }
    }
}

impl Default for RecordBufferBuilder {
    fn default() -> Self {
        RecordBufferBuilder {
            buffer_limit: usize::MAX,
            preallocate: false,
        }
    }
}

/// In-memory batch of `(key, record)` pairs limited by records count.
pub struct RecordBuffer {
    limit: usize,
    inner: Vec<(Vec<u8>, Vec<u8>)>,
}

impl RecordBuffer {
    pub fn new(limit: usize) -> Self {
        RecordBuffer {
            limit,
            inner: Vec::new(),
        }
    }

    pub fn with_capacity(limit: usize) -> Self {
        RecordBuffer {
            limit,
            inner: Vec::with_capacity(limit),
        }
    }

    /// Adds a new record with its key to the buffer.
    pub fn push(&mut self, key: Vec<u8>, record: Vec<u8>) {
        self.inner.push((key, record));
    }

    /// Returns buffer length
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Checks if the buffer reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.len() >= self.limit
    }

    /// Sorts buffered records.
    ///
    /// A stable order keeps records with equal keys in insertion order. Otherwise equal keys are ordered by
    /// the raw record, which makes the result independent of the insertion order.
    pub fn sort(&mut self, order: SortOrder) {
        if order.stable {
            self.inner.sort_by(|a, b| order.compare_keys(&a.0, &b.0));
        } else {
            self.inner.sort_unstable_by(|a, b| {
                order.compare_unstable((a.0.as_slice(), a.1.as_slice()), (b.0.as_slice(), b.1.as_slice()))
            });
        }
    }

    /// Returns an iterator over buffered records dropping the keys.
    pub fn into_records(self) -> impl Iterator<Item = Vec<u8>> {
        self.inner.into_iter().map(|(_, record)| record)
    }
}
