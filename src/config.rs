//! Parser configuration.
//!
//! Header parsing is out of scope for this crate; the facts a VCF header
//! would provide (sample count, declared types, cardinalities) arrive here
//! instead, as produced by an external header reader.

use crate::types::{Dtype, Fill};
use std::collections::HashMap;

/// Records per emitted chunk (2^16).
pub const DEFAULT_CHUNK_LENGTH: usize = 65536;

/// I/O buffer size in bytes (2^14).
pub const DEFAULT_BUFFER_SIZE: usize = 16384;

/// Scratch buffer capacity in bytes; longer tokens are clamped with a
/// warning.
pub const DEFAULT_TEMP_SIZE: usize = 4096;

/// Configuration for a [`ChunkStream`](crate::ChunkStream).
///
/// Plain data: fill in the fields you need and leave the rest at their
/// defaults.
///
/// # Field names
///
/// `fields` lists the columns to materialize, using canonical names:
/// `variants/CHROM`, `variants/POS`, `variants/ID`, `variants/REF`,
/// `variants/ALT`, `variants/QUAL`, `variants/numalt`,
/// `variants/FILTER_<NAME>` for each FILTER column, `variants/<KEY>` for
/// INFO keys and `calldata/<KEY>` for FORMAT keys. Bare fixed-column names
/// (`CHROM`, `POS`, ...) and `FILTER_<NAME>` are accepted and normalized to
/// the `variants/` group; everything else must be prefixed, since without
/// the header an unprefixed key is ambiguous between INFO and FORMAT.
///
/// # Example
///
/// ```
/// use varchunk::{Dtype, ParserConfig};
///
/// let mut config = ParserConfig::default();
/// config.n_samples = 2;
/// config.fields = vec!["variants/POS".into(), "calldata/GT".into()];
/// config.types.insert("calldata/GT".into(), Dtype::Int8);
/// ```
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Records per emitted chunk
    pub chunk_length: usize,
    /// I/O buffer capacity in bytes
    pub input_buffer_size: usize,
    /// Scratch buffer capacity in bytes
    pub temp_buffer_size: usize,
    /// Genotype width: allele slots per sample
    pub ploidy: usize,
    /// Number of sample columns, from the header
    pub n_samples: usize,
    /// Canonical names of the fields to materialize
    pub fields: Vec<String>,
    /// Storage type overrides, keyed by canonical (or bare) field name
    pub types: HashMap<String, Dtype>,
    /// Cardinality overrides, keyed by canonical (or bare) field name
    pub numbers: HashMap<String, usize>,
    /// Fill value overrides, keyed by canonical (or bare) field name
    pub fills: HashMap<String, Fill>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            chunk_length: DEFAULT_CHUNK_LENGTH,
            input_buffer_size: DEFAULT_BUFFER_SIZE,
            temp_buffer_size: DEFAULT_TEMP_SIZE,
            ploidy: 2,
            n_samples: 0,
            fields: Vec::new(),
            types: HashMap::new(),
            numbers: HashMap::new(),
            fills: HashMap::new(),
        }
    }
}

impl ParserConfig {
    /// Look up a type override by canonical name, falling back to the bare
    /// key (the part after the group prefix).
    pub(crate) fn dtype_for(&self, canonical: &str) -> Option<Dtype> {
        self.lookup(&self.types, canonical).copied()
    }

    /// Look up a cardinality override.
    pub(crate) fn number_for(&self, canonical: &str) -> Option<usize> {
        self.lookup(&self.numbers, canonical).copied()
    }

    /// Look up a fill override.
    pub(crate) fn fill_for(&self, canonical: &str) -> Option<Fill> {
        self.lookup(&self.fills, canonical).copied()
    }

    fn lookup<'a, V>(&self, map: &'a HashMap<String, V>, canonical: &str) -> Option<&'a V> {
        if let Some(v) = map.get(canonical) {
            return Some(v);
        }
        canonical.split_once('/').and_then(|(_, bare)| map.get(bare))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.chunk_length, 65536);
        assert_eq!(config.input_buffer_size, 16384);
        assert_eq!(config.ploidy, 2);
        assert!(config.fields.is_empty());
    }

    #[test]
    fn test_bare_key_lookup() {
        let mut config = ParserConfig::default();
        config.types.insert("DP".into(), Dtype::Int16);
        config.types.insert("variants/AN".into(), Dtype::Int64);
        assert_eq!(config.dtype_for("variants/DP"), Some(Dtype::Int16));
        assert_eq!(config.dtype_for("variants/AN"), Some(Dtype::Int64));
        assert_eq!(config.dtype_for("variants/AF"), None);
    }
}
