//! I/O: the buffered byte source the parser consumes.

mod source;

pub use source::{ByteSource, SENTINEL};
