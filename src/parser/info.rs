//! INFO column parser: `key[=value]` entries dispatched to typed
//! sub-parsers.

use crate::error::Result;
use crate::parser::context::{
    FieldEnd, ParserContext, COMMA, EQUALS, NEWLINE, PERIOD, SEMICOLON, SENTINEL, TAB,
};
use crate::parser::fixed::skip_field;
use crate::types::{filled, squeeze, truncate, ChunkArray, Parsed, Storable};
use ndarray::ArrayD;
use std::collections::HashMap;

/// Consume an INFO value (after `=`) without storing it, up to but not past
/// the next SEMICOLON/TAB/NEWLINE/sentinel.
fn skip_info_value(ctx: &mut ParserContext) -> Result<()> {
    loop {
        match ctx.c {
            SEMICOLON | TAB | NEWLINE | SENTINEL => return Ok(()),
            _ => ctx.getc()?,
        }
    }
}

/// Comma-separated numeric INFO values of one key.
///
/// Output is `chunk_length x number` of the declared width; values past the
/// cardinality are dropped (the first excess warns), missing values leave
/// the fill silently, malformed values warn and leave the fill.
struct InfoValues<T: Storable> {
    key: String,
    values: ArrayD<T>,
    number: usize,
    fill: T,
    chunk_length: usize,
}

impl<T: Storable> InfoValues<T> {
    fn new(key: String, number: usize, fill: T, chunk_length: usize) -> Self {
        InfoValues {
            values: filled(&[chunk_length, number], fill),
            key,
            number,
            fill,
            chunk_length,
        }
    }

    fn parse_value(&mut self, ctx: &mut ParserContext) -> Result<()> {
        let row = ctx.chunk_variant_index;
        let mut index = 0usize;
        let mut warned = false;
        ctx.scratch_clear();
        loop {
            match ctx.c {
                COMMA => {
                    self.store(ctx, row, index, &mut warned);
                    index += 1;
                    ctx.scratch_clear();
                    ctx.getc()?;
                }
                SEMICOLON | TAB | NEWLINE | SENTINEL => {
                    self.store(ctx, row, index, &mut warned);
                    return Ok(());
                }
                b => {
                    ctx.scratch_push(b);
                    ctx.getc()?;
                }
            }
        }
    }

    fn store(&mut self, ctx: &mut ParserContext, row: usize, index: usize, warned: &mut bool) {
        match T::parse_token(ctx.scratch()) {
            Parsed::Value(v) => {
                if index < self.number {
                    self.values[[row, index]] = v;
                } else if !*warned {
                    *warned = true;
                    ctx.warn(format!(
                        "INFO {} has more than {} values, excess dropped",
                        self.key, self.number
                    ));
                }
            }
            Parsed::Missing => {}
            Parsed::Invalid => ctx.warn(format!("error parsing value for INFO {}", self.key)),
        }
    }

    fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        let fresh = filled(&[self.chunk_length, self.number], self.fill);
        let mut values = truncate(std::mem::replace(&mut self.values, fresh), len);
        if self.number == 1 {
            values = squeeze(values, 1);
        }
        (format!("variants/{}", self.key), T::wrap(values))
    }
}

/// Boolean INFO flag: present means true.
struct InfoFlag {
    key: String,
    values: ArrayD<bool>,
    chunk_length: usize,
}

impl InfoFlag {
    fn new(key: String, chunk_length: usize) -> Self {
        InfoFlag {
            values: filled(&[chunk_length], false),
            key,
            chunk_length,
        }
    }

    fn parse_value(&mut self, ctx: &mut ParserContext) -> Result<()> {
        self.values[[ctx.chunk_variant_index]] = true;
        // tolerate a `FLAG=...` remnant
        skip_info_value(ctx)
    }

    fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        let fresh = filled(&[self.chunk_length], false);
        let values = std::mem::replace(&mut self.values, fresh);
        (
            format!("variants/{}", self.key),
            ChunkArray::Bool(truncate(values, len)),
        )
    }
}

/// Byte-string INFO values: `chunk_length x number x itemsize`.
struct InfoString {
    key: String,
    values: ArrayD<u8>,
    number: usize,
    itemsize: usize,
    chunk_length: usize,
}

impl InfoString {
    fn new(key: String, number: usize, itemsize: usize, chunk_length: usize) -> Self {
        InfoString {
            values: filled(&[chunk_length, number, itemsize], 0u8),
            key,
            number,
            itemsize,
            chunk_length,
        }
    }

    fn parse_value(&mut self, ctx: &mut ParserContext) -> Result<()> {
        let row = ctx.chunk_variant_index;
        let mut index = 0usize;
        let mut cursor = 0usize;
        let mut warned = false;
        loop {
            match ctx.c {
                COMMA => {
                    index += 1;
                    cursor = 0;
                    ctx.getc()?;
                }
                SEMICOLON | TAB | NEWLINE | SENTINEL => return Ok(()),
                b => {
                    if index < self.number {
                        if cursor < self.itemsize {
                            self.values[[row, index, cursor]] = b;
                        }
                    } else if !warned {
                        warned = true;
                        ctx.warn(format!(
                            "INFO {} has more than {} values, excess dropped",
                            self.key, self.number
                        ));
                    }
                    cursor += 1;
                    ctx.getc()?;
                }
            }
        }
    }

    fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        let fresh = filled(&[self.chunk_length, self.number, self.itemsize], 0u8);
        let mut values = truncate(std::mem::replace(&mut self.values, fresh), len);
        if self.number == 1 {
            values = squeeze(values, 1);
        }
        (format!("variants/{}", self.key), ChunkArray::Bytes(values))
    }
}

/// Typed sub-parser registry entry for one declared INFO key.
enum InfoField {
    Int8(InfoValues<i8>),
    Int16(InfoValues<i16>),
    Int32(InfoValues<i32>),
    Int64(InfoValues<i64>),
    Float32(InfoValues<f32>),
    Float64(InfoValues<f64>),
    Flag(InfoFlag),
    Str(InfoString),
}

impl InfoField {
    fn parse_value(&mut self, ctx: &mut ParserContext) -> Result<()> {
        match self {
            InfoField::Int8(p) => p.parse_value(ctx),
            InfoField::Int16(p) => p.parse_value(ctx),
            InfoField::Int32(p) => p.parse_value(ctx),
            InfoField::Int64(p) => p.parse_value(ctx),
            InfoField::Float32(p) => p.parse_value(ctx),
            InfoField::Float64(p) => p.parse_value(ctx),
            InfoField::Flag(p) => p.parse_value(ctx),
            InfoField::Str(p) => p.parse_value(ctx),
        }
    }

    fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        match self {
            InfoField::Int8(p) => p.finish(len),
            InfoField::Int16(p) => p.finish(len),
            InfoField::Int32(p) => p.finish(len),
            InfoField::Int64(p) => p.finish(len),
            InfoField::Float32(p) => p.finish(len),
            InfoField::Float64(p) => p.finish(len),
            InfoField::Flag(p) => p.finish(len),
            InfoField::Str(p) => p.finish(len),
        }
    }
}

/// Declared shape of one INFO key, resolved during setup.
pub(crate) struct InfoSpec {
    pub key: String,
    pub dtype: crate::types::Dtype,
    pub number: usize,
    pub fill: Option<crate::types::Fill>,
}

/// Dispatches `key[=value]` INFO entries to typed sub-parsers.
///
/// Unknown keys are silently skipped; known keys on the same record still
/// materialize.
pub(crate) struct InfoParser {
    fields: Vec<InfoField>,
    lookup: HashMap<Vec<u8>, usize>,
}

impl InfoParser {
    pub fn new(specs: Vec<InfoSpec>, chunk_length: usize, warnings: &mut Vec<String>) -> Self {
        use crate::types::Dtype;
        let mut fields = Vec::new();
        let mut lookup = HashMap::new();
        for spec in specs {
            let key = spec.key.clone();
            let number = spec.number.max(1);
            let field = match spec.dtype {
                Dtype::Int8 => InfoField::Int8(InfoValues::new(
                    key.clone(),
                    number,
                    resolve_fill(spec.fill, &key, warnings),
                    chunk_length,
                )),
                Dtype::Int16 => InfoField::Int16(InfoValues::new(
                    key.clone(),
                    number,
                    resolve_fill(spec.fill, &key, warnings),
                    chunk_length,
                )),
                Dtype::Int32 => InfoField::Int32(InfoValues::new(
                    key.clone(),
                    number,
                    resolve_fill(spec.fill, &key, warnings),
                    chunk_length,
                )),
                Dtype::Int64 => InfoField::Int64(InfoValues::new(
                    key.clone(),
                    number,
                    resolve_fill(spec.fill, &key, warnings),
                    chunk_length,
                )),
                Dtype::Float32 => InfoField::Float32(InfoValues::new(
                    key.clone(),
                    number,
                    resolve_fill(spec.fill, &key, warnings),
                    chunk_length,
                )),
                Dtype::Float64 => InfoField::Float64(InfoValues::new(
                    key.clone(),
                    number,
                    resolve_fill(spec.fill, &key, warnings),
                    chunk_length,
                )),
                Dtype::Bool => InfoField::Flag(InfoFlag::new(key.clone(), chunk_length)),
                Dtype::Bytes(itemsize) => {
                    InfoField::Str(InfoString::new(key.clone(), number, itemsize, chunk_length))
                }
            };
            lookup.insert(key.into_bytes(), fields.len());
            fields.push(field);
        }
        InfoParser { fields, lookup }
    }

    pub fn parse(&mut self, ctx: &mut ParserContext) -> Result<FieldEnd> {
        // explicit missing: skip the whole field
        if ctx.c == PERIOD {
            return skip_field(ctx);
        }
        ctx.scratch_clear();
        loop {
            match ctx.c {
                EQUALS => {
                    if ctx.scratch().is_empty() {
                        ctx.warn("INFO entry with empty key");
                        ctx.getc()?;
                        skip_info_value(ctx)?;
                    } else {
                        let field = self.lookup.get(ctx.scratch()).copied();
                        ctx.scratch_clear();
                        ctx.getc()?;
                        match field {
                            Some(i) => self.fields[i].parse_value(ctx)?,
                            None => skip_info_value(ctx)?,
                        }
                        // the sub-parser tokenizes through the scratch; a
                        // leftover value byte-equal to a key name must not
                        // be re-dispatched as a bare entry
                        ctx.scratch_clear();
                    }
                }
                SEMICOLON => {
                    self.bare_key(ctx)?;
                    ctx.scratch_clear();
                    ctx.getc()?;
                }
                TAB | NEWLINE | SENTINEL => {
                    self.bare_key(ctx)?;
                    break;
                }
                b => {
                    ctx.scratch_push(b);
                    ctx.getc()?;
                }
            }
        }
        ctx.finish_field()
    }

    /// A key with no `=`: a flag for flag-typed keys; for value-typed keys
    /// the sub-parser sees an empty value and leaves the fill.
    fn bare_key(&mut self, ctx: &mut ParserContext) -> Result<()> {
        if ctx.scratch().is_empty() {
            return Ok(());
        }
        if let Some(&i) = self.lookup.get(ctx.scratch()) {
            ctx.scratch_clear();
            self.fields[i].parse_value(ctx)?;
        }
        Ok(())
    }

    pub fn finish(&mut self, len: usize) -> Vec<(String, ChunkArray)> {
        self.fields.iter_mut().map(|f| f.finish(len)).collect()
    }
}

fn resolve_fill<T: Storable>(
    fill: Option<crate::types::Fill>,
    key: &str,
    warnings: &mut Vec<String>,
) -> T {
    match fill {
        None => T::DEFAULT_FILL,
        Some(f) => T::from_fill(f).unwrap_or_else(|| {
            warnings.push(format!("fill for {key} does not fit its dtype, ignored"));
            T::DEFAULT_FILL
        }),
    }
}
