//! Emitted chunks.

use crate::types::ChunkArray;
use std::collections::HashMap;

/// A fixed-size batch of consecutive records, frozen into typed arrays.
///
/// Maps canonical field names (`variants/POS`, `variants/FILTER_PASS`,
/// `calldata/GT`, ...) to [`ChunkArray`]s whose leading axis is this chunk's
/// length. All arrays in one chunk share that leading length; the final chunk
/// of a stream may be shorter than the configured `chunk_length`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    len: usize,
    fields: HashMap<String, ChunkArray>,
}

impl Chunk {
    pub(crate) fn new(len: usize, fields: HashMap<String, ChunkArray>) -> Self {
        Chunk { len, fields }
    }

    /// Number of records in this chunk.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the chunk holds no records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The array for a canonical field name, if materialized.
    pub fn get(&self, name: &str) -> Option<&ChunkArray> {
        self.fields.get(name)
    }

    /// Whether a field was materialized.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of materialized fields.
    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    /// Iterate over `(name, array)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkArray)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Consume the chunk, handing the arrays to the caller.
    pub fn into_fields(self) -> HashMap<String, ChunkArray> {
        self.fields
    }
}
