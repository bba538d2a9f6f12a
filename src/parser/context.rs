//! Shared mutable parse state.

use crate::error::Result;
use crate::io::ByteSource;

pub(crate) const TAB: u8 = b'\t';
pub(crate) const NEWLINE: u8 = b'\n';
pub(crate) const COMMA: u8 = b',';
pub(crate) const SEMICOLON: u8 = b';';
pub(crate) const COLON: u8 = b':';
pub(crate) const EQUALS: u8 = b'=';
pub(crate) const PERIOD: u8 = b'.';
pub(crate) const SLASH: u8 = b'/';
pub(crate) const PIPE: u8 = b'|';

pub(crate) use crate::io::SENTINEL;

/// Which terminator a field parser consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldEnd {
    /// TAB: more fields follow on this record
    Tab,
    /// NEWLINE or end-of-stream: the record is over
    Eol,
}

/// A recoverable anomaly encountered while parsing.
///
/// The parser is permissive: malformed values, overlong tokens and unknown
/// keys never abort the parse. Each such anomaly is recorded as a
/// `ParseWarning` (and emitted through the [`log`] facade) and the offending
/// slot keeps its fill value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// What went wrong
    pub message: String,
    /// Index of the record being parsed when the anomaly occurred
    pub variant_index: u64,
    /// The offending token (scratch contents), lossily decoded
    pub token: String,
}

/// Mutable state shared by every sub-parser: the lookahead byte, the scratch
/// buffer, the record/chunk/sample/format counters and the per-record FORMAT
/// dispatch vector.
///
/// The scratch buffer is reused across every token in the stream; no parser
/// may hold onto its contents past the next [`clear`](Self::scratch_clear).
pub(crate) struct ParserContext {
    source: ByteSource,
    /// One-byte lookahead; [`SENTINEL`] once the stream is exhausted
    pub c: u8,
    scratch: Vec<u8>,
    scratch_capacity: usize,
    scratch_clamped: bool,
    /// Records parsed so far across the whole stream
    pub variant_index: u64,
    /// Row index within the chunk under construction
    pub chunk_variant_index: usize,
    /// Sample column currently being parsed (CALLDATA only)
    pub sample_index: usize,
    /// Subfield position within the current sample column
    pub format_index: usize,
    /// Number of entries the current record's FORMAT declared
    pub variant_n_formats: usize,
    /// Per-record dispatch: registry index per FORMAT position, `None` = skip
    pub format_dispatch: Vec<Option<usize>>,
    pub n_samples: usize,
    pub chunk_length: usize,
    warnings: Vec<ParseWarning>,
}

impl ParserContext {
    /// Build the context and prime the lookahead with the first byte.
    pub fn new(
        mut source: ByteSource,
        temp_buffer_size: usize,
        chunk_length: usize,
        n_samples: usize,
    ) -> Result<Self> {
        let c = source.next_byte()?;
        Ok(ParserContext {
            source,
            c,
            scratch: Vec::with_capacity(temp_buffer_size),
            scratch_capacity: temp_buffer_size,
            scratch_clamped: false,
            variant_index: 0,
            chunk_variant_index: 0,
            sample_index: 0,
            format_index: 0,
            variant_n_formats: 0,
            format_dispatch: Vec::new(),
            n_samples,
            chunk_length,
            warnings: Vec::new(),
        })
    }

    /// Advance the lookahead by one byte.
    #[inline]
    pub fn getc(&mut self) -> Result<()> {
        self.c = self.source.next_byte()?;
        Ok(())
    }

    /// Consume the terminator the current field stopped on and report which
    /// class it was. The stream sentinel is never consumed.
    pub fn finish_field(&mut self) -> Result<FieldEnd> {
        match self.c {
            TAB => {
                self.getc()?;
                Ok(FieldEnd::Tab)
            }
            NEWLINE => {
                self.getc()?;
                Ok(FieldEnd::Eol)
            }
            _ => Ok(FieldEnd::Eol),
        }
    }

    #[inline]
    pub fn scratch(&self) -> &[u8] {
        &self.scratch
    }

    #[inline]
    pub fn scratch_clear(&mut self) {
        self.scratch.clear();
        self.scratch_clamped = false;
    }

    /// Append a byte to the scratch buffer. Appending beyond capacity is
    /// clamped: the byte is dropped and the token warns once.
    #[inline]
    pub fn scratch_push(&mut self, b: u8) {
        if self.scratch.len() < self.scratch_capacity {
            self.scratch.push(b);
        } else if !self.scratch_clamped {
            self.scratch_clamped = true;
            self.warn("token exceeds temporary buffer capacity, truncated");
        }
    }

    /// Record a recoverable anomaly with the current counters and scratch
    /// contents, and emit it through the `log` facade.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        let token = String::from_utf8_lossy(&self.scratch).into_owned();
        log::warn!(
            "{} (variant {}, token {:?})",
            message,
            self.variant_index,
            token
        );
        self.warnings.push(ParseWarning {
            message,
            variant_index: self.variant_index,
            token,
        });
    }

    /// Record a configuration-time anomaly (no token context).
    pub fn warn_setup(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(ParseWarning {
            message,
            variant_index: 0,
            token: String::new(),
        });
    }

    pub fn warnings(&self) -> &[ParseWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<ParseWarning> {
        std::mem::take(&mut self.warnings)
    }
}
