//! varchunk: streaming VCF-body parser producing typed array chunks
//!
//! # Overview
//!
//! varchunk converts the tab-delimited variant call text format (one record
//! per line: CHROM, POS, ID, REF, ALT, QUAL, FILTER, INFO, FORMAT, then one
//! column per sample) into typed, fixed-shape [`ndarray`] arrays, emitted in
//! bounded-size chunks. It is built for streaming: a fixed I/O buffer, one
//! byte of lookahead, and output buffers that are frozen and handed out
//! every `chunk_length` records.
//!
//! Header parsing is out of scope; the header-derived facts (sample count,
//! declared types, cardinalities) arrive via [`ParserConfig`]. The parser is
//! permissive: recoverable anomalies (unparseable values, overlong tokens,
//! unknown keys) are collected as [`ParseWarning`]s and parsing continues.
//!
//! ## Quick Start
//!
//! ```
//! use varchunk::{ChunkStream, Dtype, ParserConfig};
//!
//! # fn main() -> varchunk::Result<()> {
//! let data = b"\
//! 20\t14370\trs6054257\tG\tA\t29\tPASS\tDP=14\tGT\t0|0\t1|0\n\
//! 20\t17330\t.\tT\tA\t3\tq10\tDP=11\tGT\t0|0\t0|1\n";
//!
//! let mut config = ParserConfig::default();
//! config.chunk_length = 1024;
//! config.n_samples = 2;
//! config.fields = vec![
//!     "variants/POS".into(),
//!     "variants/DP".into(),
//!     "calldata/GT".into(),
//! ];
//! config.types.insert("variants/DP".into(), Dtype::Int32);
//!
//! for chunk in ChunkStream::from_reader(&data[..], &config)? {
//!     let chunk = chunk?;
//!     let gt = chunk.get("calldata/GT").unwrap().as_i8().unwrap();
//!     // (records, samples, ploidy)
//!     assert_eq!(gt.shape(), &[2, 2, 2]);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`parser`]: the record state machine and [`ChunkStream`] driver
//! - [`io`]: the buffered byte source
//! - [`chunk`]: emitted [`Chunk`]s
//! - [`types`]: storage types ([`Dtype`]) and typed arrays ([`ChunkArray`])
//! - [`config`]: [`ParserConfig`]
//! - [`error`]: fatal error types

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod chunk;
pub mod config;
pub mod error;
pub mod io;
pub mod parser;
pub mod types;

// Re-export commonly used types
pub use chunk::Chunk;
pub use config::ParserConfig;
pub use error::{Result, VarchunkError};
pub use parser::{ChunkStream, ParseWarning};
pub use types::{ChunkArray, Dtype, Fill};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
