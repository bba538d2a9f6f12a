//! Parsers for the fixed leading columns: CHROM, POS, ID, REF, ALT, QUAL.
//!
//! Each parser owns its in-progress output array and consumes its column
//! through and past the field terminator. Columns the caller did not request
//! are consumed by [`skip_field`] instead.

use crate::error::Result;
use crate::parser::context::{
    FieldEnd, ParserContext, COMMA, NEWLINE, PERIOD, SENTINEL, TAB,
};
use crate::types::{filled, parse_double, parse_long, squeeze, truncate, ChunkArray, Parsed};
use ndarray::ArrayD;

/// Consume one field without storing anything.
pub(crate) fn skip_field(ctx: &mut ParserContext) -> Result<FieldEnd> {
    loop {
        match ctx.c {
            TAB | NEWLINE | SENTINEL => return ctx.finish_field(),
            _ => ctx.getc()?,
        }
    }
}

/// Consume the remainder of the record.
pub(crate) fn skip_to_eol(ctx: &mut ParserContext) -> Result<FieldEnd> {
    loop {
        match ctx.c {
            NEWLINE | SENTINEL => return ctx.finish_field(),
            _ => ctx.getc()?,
        }
    }
}

/// Byte-string column parser (CHROM, ID, REF).
///
/// Output is `chunk_length x itemsize` bytes; overlong values are silently
/// truncated to the itemsize.
pub(crate) struct StringColumnParser {
    name: &'static str,
    values: ArrayD<u8>,
    itemsize: usize,
    chunk_length: usize,
    empty_warning: Option<&'static str>,
}

impl StringColumnParser {
    pub fn new(
        name: &'static str,
        itemsize: usize,
        chunk_length: usize,
        empty_warning: Option<&'static str>,
    ) -> Self {
        StringColumnParser {
            name,
            values: filled(&[chunk_length, itemsize], 0u8),
            itemsize,
            chunk_length,
            empty_warning,
        }
    }

    pub fn parse(&mut self, ctx: &mut ParserContext) -> Result<FieldEnd> {
        let row = ctx.chunk_variant_index;
        let mut cursor = 0usize;
        loop {
            match ctx.c {
                TAB | NEWLINE | SENTINEL => break,
                b => {
                    if cursor < self.itemsize {
                        self.values[[row, cursor]] = b;
                    }
                    cursor += 1;
                    ctx.getc()?;
                }
            }
        }
        if cursor == 0 {
            if let Some(message) = self.empty_warning {
                ctx.scratch_clear();
                ctx.warn(message);
            }
        }
        ctx.finish_field()
    }

    pub fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        let fresh = filled(&[self.chunk_length, self.itemsize], 0u8);
        let values = std::mem::replace(&mut self.values, fresh);
        (self.name.to_string(), ChunkArray::Bytes(truncate(values, len)))
    }
}

/// POS column parser: signed 32-bit integers, fill -1.
pub(crate) struct PosParser {
    values: ArrayD<i32>,
    fill: i32,
    chunk_length: usize,
}

impl PosParser {
    pub fn new(chunk_length: usize, fill: i32) -> Self {
        PosParser {
            values: filled(&[chunk_length], fill),
            fill,
            chunk_length,
        }
    }

    pub fn parse(&mut self, ctx: &mut ParserContext) -> Result<FieldEnd> {
        let row = ctx.chunk_variant_index;
        ctx.scratch_clear();
        loop {
            match ctx.c {
                TAB | NEWLINE | SENTINEL => break,
                b => {
                    ctx.scratch_push(b);
                    ctx.getc()?;
                }
            }
        }
        match parse_long(ctx.scratch()) {
            Parsed::Value(v) => self.values[[row]] = v as i32,
            // an absent POS is malformed, a bare `.` is explicit missing
            Parsed::Missing => {
                if ctx.scratch().is_empty() {
                    ctx.warn("empty POS");
                }
            }
            Parsed::Invalid => ctx.warn("error parsing POS"),
        }
        ctx.finish_field()
    }

    pub fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        let fresh = filled(&[self.chunk_length], self.fill);
        let values = std::mem::replace(&mut self.values, fresh);
        (
            "variants/POS".to_string(),
            ChunkArray::Int32(truncate(values, len)),
        )
    }
}

/// QUAL column parser: 32-bit floats, fill -1.0.
///
/// Empty and `.` values are ordinary missing data and do not warn.
pub(crate) struct QualParser {
    values: ArrayD<f32>,
    fill: f32,
    chunk_length: usize,
}

impl QualParser {
    pub fn new(chunk_length: usize, fill: f32) -> Self {
        QualParser {
            values: filled(&[chunk_length], fill),
            fill,
            chunk_length,
        }
    }

    pub fn parse(&mut self, ctx: &mut ParserContext) -> Result<FieldEnd> {
        let row = ctx.chunk_variant_index;
        ctx.scratch_clear();
        loop {
            match ctx.c {
                TAB | NEWLINE | SENTINEL => break,
                b => {
                    ctx.scratch_push(b);
                    ctx.getc()?;
                }
            }
        }
        match parse_double(ctx.scratch()) {
            Parsed::Value(v) => self.values[[row]] = v as f32,
            Parsed::Missing => {}
            Parsed::Invalid => ctx.warn("error parsing QUAL"),
        }
        ctx.finish_field()
    }

    pub fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        let fresh = filled(&[self.chunk_length], self.fill);
        let values = std::mem::replace(&mut self.values, fresh);
        (
            "variants/QUAL".to_string(),
            ChunkArray::Float32(truncate(values, len)),
        )
    }
}

/// ALT column parser.
///
/// Materializes `variants/ALT` (`chunk_length x number x itemsize` bytes,
/// values past `number` silently dropped, overlong values silently
/// truncated), `variants/numalt` (count of non-missing ALT values on the
/// row, regardless of the cardinality cap), or both.
pub(crate) struct AltParser {
    values: Option<ArrayD<u8>>,
    numalt: Option<ArrayD<i32>>,
    number: usize,
    itemsize: usize,
    chunk_length: usize,
}

impl AltParser {
    pub fn new(
        store_alt: bool,
        store_numalt: bool,
        number: usize,
        itemsize: usize,
        chunk_length: usize,
    ) -> Self {
        AltParser {
            values: store_alt.then(|| filled(&[chunk_length, number, itemsize], 0u8)),
            numalt: store_numalt.then(|| filled(&[chunk_length], 0i32)),
            number,
            itemsize,
            chunk_length,
        }
    }

    pub fn parse(&mut self, ctx: &mut ParserContext) -> Result<FieldEnd> {
        let row = ctx.chunk_variant_index;
        let mut alt_index = 0usize;
        let mut cursor = 0usize;
        let mut first = 0u8;
        let mut n_alleles = 0i32;
        loop {
            match ctx.c {
                TAB | NEWLINE | SENTINEL => break,
                COMMA => {
                    if cursor > 0 && !(cursor == 1 && first == PERIOD) {
                        n_alleles += 1;
                    }
                    alt_index += 1;
                    cursor = 0;
                    ctx.getc()?;
                }
                b => {
                    if cursor == 0 {
                        first = b;
                    }
                    if let Some(values) = self.values.as_mut() {
                        if alt_index < self.number && cursor < self.itemsize {
                            values[[row, alt_index, cursor]] = b;
                        }
                    }
                    cursor += 1;
                    ctx.getc()?;
                }
            }
        }
        if cursor > 0 && !(cursor == 1 && first == PERIOD) {
            n_alleles += 1;
        }
        if let Some(numalt) = self.numalt.as_mut() {
            numalt[[row]] = n_alleles;
        }
        ctx.finish_field()
    }

    pub fn finish(&mut self, len: usize) -> Vec<(String, ChunkArray)> {
        let mut out = Vec::new();
        if let Some(values) = self.values.as_mut() {
            let fresh = filled(&[self.chunk_length, self.number, self.itemsize], 0u8);
            let mut values = std::mem::replace(values, fresh);
            values = truncate(values, len);
            if self.number == 1 {
                values = squeeze(values, 1);
            }
            out.push(("variants/ALT".to_string(), ChunkArray::Bytes(values)));
        }
        if let Some(numalt) = self.numalt.as_mut() {
            let fresh = filled(&[self.chunk_length], 0i32);
            let numalt = std::mem::replace(numalt, fresh);
            out.push((
                "variants/numalt".to_string(),
                ChunkArray::Int32(truncate(numalt, len)),
            ));
        }
        out
    }
}
