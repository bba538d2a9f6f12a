//! Per-sample (calldata) parsing.
//!
//! FORMAT announces, per record, which subfields the sample columns carry
//! and in what order. Parsing it produces the record's dispatch vector:
//! for each announced name, the index of the matching typed sub-parser in
//! the registry, or `None` when the name was not configured (that subfield
//! is skipped in every sample). The CALLDATA loop then walks the sample
//! columns and delegates each subfield through the dispatch vector.

use crate::error::{Result, VarchunkError};
use crate::parser::context::{
    FieldEnd, ParserContext, COLON, COMMA, NEWLINE, PIPE, SENTINEL, SLASH, TAB,
};
use crate::types::{filled, squeeze, truncate, ChunkArray, Parsed, Storable};
use ndarray::ArrayD;
use std::collections::HashMap;

/// Consume one sample subfield without storing it. Stops at (never past)
/// COLON/TAB/NEWLINE/sentinel.
fn skip_subfield(ctx: &mut ParserContext) -> Result<()> {
    loop {
        match ctx.c {
            COLON | TAB | NEWLINE | SENTINEL => return Ok(()),
            _ => ctx.getc()?,
        }
    }
}

/// Genotype (`GT`) sub-parser, specialized by integer width.
///
/// Writes into `chunk_length x n_samples x ploidy`. Alleles are separated
/// by `/` or `|`; alleles beyond the ploidy are silently dropped; missing
/// alleles (`.` or empty) leave the fill.
struct GenotypeParser<T: Storable> {
    values: ArrayD<T>,
    fill: T,
    ploidy: usize,
    n_samples: usize,
    chunk_length: usize,
}

impl<T: Storable> GenotypeParser<T> {
    fn new(fill: T, chunk_length: usize, n_samples: usize, ploidy: usize) -> Self {
        GenotypeParser {
            values: filled(&[chunk_length, n_samples, ploidy], fill),
            fill,
            ploidy,
            n_samples,
            chunk_length,
        }
    }

    fn parse_sample(&mut self, ctx: &mut ParserContext) -> Result<()> {
        let mut allele_index = 0usize;
        ctx.scratch_clear();
        loop {
            match ctx.c {
                SLASH | PIPE => {
                    self.store(ctx, allele_index);
                    allele_index += 1;
                    ctx.scratch_clear();
                    ctx.getc()?;
                }
                COLON | TAB | NEWLINE | SENTINEL => {
                    self.store(ctx, allele_index);
                    return Ok(());
                }
                b => {
                    ctx.scratch_push(b);
                    ctx.getc()?;
                }
            }
        }
    }

    fn store(&mut self, ctx: &mut ParserContext, allele_index: usize) {
        if allele_index >= self.ploidy {
            return;
        }
        match T::parse_token(ctx.scratch()) {
            Parsed::Value(v) => {
                self.values[[ctx.chunk_variant_index, ctx.sample_index, allele_index]] = v;
            }
            Parsed::Missing => {}
            Parsed::Invalid => ctx.warn("error parsing GT allele"),
        }
    }

    fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        let fresh = filled(&[self.chunk_length, self.n_samples, self.ploidy], self.fill);
        let values = std::mem::replace(&mut self.values, fresh);
        ("calldata/GT".to_string(), T::wrap(truncate(values, len)))
    }
}

/// Comma-separated numeric sample values of one FORMAT key.
///
/// Output is `chunk_length x n_samples x number`; the number axis is
/// squeezed at emission when the cardinality is 1.
struct SampleValues<T: Storable> {
    key: String,
    values: ArrayD<T>,
    number: usize,
    fill: T,
    n_samples: usize,
    chunk_length: usize,
}

impl<T: Storable> SampleValues<T> {
    fn new(key: String, number: usize, fill: T, chunk_length: usize, n_samples: usize) -> Self {
        SampleValues {
            values: filled(&[chunk_length, n_samples, number], fill),
            key,
            number,
            fill,
            n_samples,
            chunk_length,
        }
    }

    fn parse_sample(&mut self, ctx: &mut ParserContext) -> Result<()> {
        let mut index = 0usize;
        let mut warned = false;
        ctx.scratch_clear();
        loop {
            match ctx.c {
                COMMA => {
                    self.store(ctx, index, &mut warned);
                    index += 1;
                    ctx.scratch_clear();
                    ctx.getc()?;
                }
                COLON | TAB | NEWLINE | SENTINEL => {
                    self.store(ctx, index, &mut warned);
                    return Ok(());
                }
                b => {
                    ctx.scratch_push(b);
                    ctx.getc()?;
                }
            }
        }
    }

    fn store(&mut self, ctx: &mut ParserContext, index: usize, warned: &mut bool) {
        match T::parse_token(ctx.scratch()) {
            Parsed::Value(v) => {
                if index < self.number {
                    self.values[[ctx.chunk_variant_index, ctx.sample_index, index]] = v;
                } else if !*warned {
                    *warned = true;
                    ctx.warn(format!(
                        "calldata {} has more than {} values, excess dropped",
                        self.key, self.number
                    ));
                }
            }
            Parsed::Missing => {}
            Parsed::Invalid => {
                ctx.warn(format!("error parsing value for calldata {}", self.key))
            }
        }
    }

    fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        let fresh = filled(&[self.chunk_length, self.n_samples, self.number], self.fill);
        let mut values = truncate(std::mem::replace(&mut self.values, fresh), len);
        if self.number == 1 {
            values = squeeze(values, 2);
        }
        (format!("calldata/{}", self.key), T::wrap(values))
    }
}

/// Byte-string sample values: `chunk_length x n_samples x number x itemsize`.
struct SampleString {
    key: String,
    values: ArrayD<u8>,
    number: usize,
    itemsize: usize,
    n_samples: usize,
    chunk_length: usize,
}

impl SampleString {
    fn new(
        key: String,
        number: usize,
        itemsize: usize,
        chunk_length: usize,
        n_samples: usize,
    ) -> Self {
        SampleString {
            values: filled(&[chunk_length, n_samples, number, itemsize], 0u8),
            key,
            number,
            itemsize,
            n_samples,
            chunk_length,
        }
    }

    fn parse_sample(&mut self, ctx: &mut ParserContext) -> Result<()> {
        let row = ctx.chunk_variant_index;
        let sample = ctx.sample_index;
        let mut index = 0usize;
        let mut cursor = 0usize;
        loop {
            match ctx.c {
                COMMA => {
                    index += 1;
                    cursor = 0;
                    ctx.getc()?;
                }
                COLON | TAB | NEWLINE | SENTINEL => return Ok(()),
                b => {
                    if index < self.number && cursor < self.itemsize {
                        self.values[[row, sample, index, cursor]] = b;
                    }
                    cursor += 1;
                    ctx.getc()?;
                }
            }
        }
    }

    fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        let fresh = filled(
            &[self.chunk_length, self.n_samples, self.number, self.itemsize],
            0u8,
        );
        let mut values = truncate(std::mem::replace(&mut self.values, fresh), len);
        if self.number == 1 {
            values = squeeze(values, 2);
        }
        (format!("calldata/{}", self.key), ChunkArray::Bytes(values))
    }
}

/// Typed registry entry for one configured FORMAT key.
enum CalldataField {
    GenotypeInt8(GenotypeParser<i8>),
    GenotypeInt16(GenotypeParser<i16>),
    GenotypeInt32(GenotypeParser<i32>),
    GenotypeInt64(GenotypeParser<i64>),
    Int8(SampleValues<i8>),
    Int16(SampleValues<i16>),
    Int32(SampleValues<i32>),
    Int64(SampleValues<i64>),
    Float32(SampleValues<f32>),
    Float64(SampleValues<f64>),
    Str(SampleString),
}

impl CalldataField {
    fn parse_sample(&mut self, ctx: &mut ParserContext) -> Result<()> {
        match self {
            CalldataField::GenotypeInt8(p) => p.parse_sample(ctx),
            CalldataField::GenotypeInt16(p) => p.parse_sample(ctx),
            CalldataField::GenotypeInt32(p) => p.parse_sample(ctx),
            CalldataField::GenotypeInt64(p) => p.parse_sample(ctx),
            CalldataField::Int8(p) => p.parse_sample(ctx),
            CalldataField::Int16(p) => p.parse_sample(ctx),
            CalldataField::Int32(p) => p.parse_sample(ctx),
            CalldataField::Int64(p) => p.parse_sample(ctx),
            CalldataField::Float32(p) => p.parse_sample(ctx),
            CalldataField::Float64(p) => p.parse_sample(ctx),
            CalldataField::Str(p) => p.parse_sample(ctx),
        }
    }

    fn finish(&mut self, len: usize) -> (String, ChunkArray) {
        match self {
            CalldataField::GenotypeInt8(p) => p.finish(len),
            CalldataField::GenotypeInt16(p) => p.finish(len),
            CalldataField::GenotypeInt32(p) => p.finish(len),
            CalldataField::GenotypeInt64(p) => p.finish(len),
            CalldataField::Int8(p) => p.finish(len),
            CalldataField::Int16(p) => p.finish(len),
            CalldataField::Int32(p) => p.finish(len),
            CalldataField::Int64(p) => p.finish(len),
            CalldataField::Float32(p) => p.finish(len),
            CalldataField::Float64(p) => p.finish(len),
            CalldataField::Str(p) => p.finish(len),
        }
    }
}

/// Declared shape of one FORMAT key, resolved during setup.
pub(crate) struct CalldataSpec {
    pub key: String,
    pub dtype: crate::types::Dtype,
    pub number: usize,
    pub fill: Option<crate::types::Fill>,
}

/// Registry of typed sample sub-parsers plus the FORMAT and CALLDATA loops.
pub(crate) struct CalldataParser {
    fields: Vec<CalldataField>,
    lookup: HashMap<Vec<u8>, usize>,
}

impl CalldataParser {
    /// Build the registry. A key whose declared type is unusable for its
    /// role (boolean calldata, non-integer GT) is reported through
    /// `warnings` and skipped.
    pub fn new(
        specs: Vec<CalldataSpec>,
        chunk_length: usize,
        n_samples: usize,
        ploidy: usize,
        warnings: &mut Vec<String>,
    ) -> Self {
        use crate::types::Dtype;
        let mut fields = Vec::new();
        let mut lookup = HashMap::new();
        for spec in specs {
            let key = spec.key.clone();
            let number = spec.number.max(1);
            let field = if key == "GT" {
                match spec.dtype {
                    Dtype::Int8 => CalldataField::GenotypeInt8(GenotypeParser::new(
                        genotype_fill(spec.fill, warnings),
                        chunk_length,
                        n_samples,
                        ploidy,
                    )),
                    Dtype::Int16 => CalldataField::GenotypeInt16(GenotypeParser::new(
                        genotype_fill(spec.fill, warnings),
                        chunk_length,
                        n_samples,
                        ploidy,
                    )),
                    Dtype::Int32 => CalldataField::GenotypeInt32(GenotypeParser::new(
                        genotype_fill(spec.fill, warnings),
                        chunk_length,
                        n_samples,
                        ploidy,
                    )),
                    Dtype::Int64 => CalldataField::GenotypeInt64(GenotypeParser::new(
                        genotype_fill(spec.fill, warnings),
                        chunk_length,
                        n_samples,
                        ploidy,
                    )),
                    other => {
                        warnings.push(format!(
                            "calldata/GT requires an integer dtype, got {other:?}; field skipped"
                        ));
                        continue;
                    }
                }
            } else {
                match spec.dtype {
                    Dtype::Int8 => CalldataField::Int8(SampleValues::new(
                        key.clone(),
                        number,
                        sample_fill(spec.fill, &key, warnings),
                        chunk_length,
                        n_samples,
                    )),
                    Dtype::Int16 => CalldataField::Int16(SampleValues::new(
                        key.clone(),
                        number,
                        sample_fill(spec.fill, &key, warnings),
                        chunk_length,
                        n_samples,
                    )),
                    Dtype::Int32 => CalldataField::Int32(SampleValues::new(
                        key.clone(),
                        number,
                        sample_fill(spec.fill, &key, warnings),
                        chunk_length,
                        n_samples,
                    )),
                    Dtype::Int64 => CalldataField::Int64(SampleValues::new(
                        key.clone(),
                        number,
                        sample_fill(spec.fill, &key, warnings),
                        chunk_length,
                        n_samples,
                    )),
                    Dtype::Float32 => CalldataField::Float32(SampleValues::new(
                        key.clone(),
                        number,
                        sample_fill(spec.fill, &key, warnings),
                        chunk_length,
                        n_samples,
                    )),
                    Dtype::Float64 => CalldataField::Float64(SampleValues::new(
                        key.clone(),
                        number,
                        sample_fill(spec.fill, &key, warnings),
                        chunk_length,
                        n_samples,
                    )),
                    Dtype::Bytes(itemsize) => CalldataField::Str(SampleString::new(
                        key.clone(),
                        number,
                        itemsize,
                        chunk_length,
                        n_samples,
                    )),
                    Dtype::Bool => {
                        warnings.push(format!(
                            "calldata/{key} cannot be boolean; field skipped"
                        ));
                        continue;
                    }
                }
            };
            lookup.insert(key.into_bytes(), fields.len());
            fields.push(field);
        }
        CalldataParser { fields, lookup }
    }

    /// Parse the FORMAT field into the per-record dispatch vector.
    ///
    /// The previous record's dispatch entries are invalidated first. Names
    /// outside the registry dispatch to `None` (skipped per sample) - a
    /// routine occurrence when the caller requests a subset of fields, so
    /// not an anomaly.
    pub fn parse_format(&self, ctx: &mut ParserContext) -> Result<FieldEnd> {
        ctx.format_dispatch.clear();
        ctx.variant_n_formats = 0;
        ctx.scratch_clear();
        loop {
            match ctx.c {
                COLON => {
                    let entry = self.lookup.get(ctx.scratch()).copied();
                    ctx.format_dispatch.push(entry);
                    ctx.scratch_clear();
                    ctx.getc()?;
                }
                TAB | NEWLINE | SENTINEL => {
                    if !ctx.scratch().is_empty() {
                        let entry = self.lookup.get(ctx.scratch()).copied();
                        ctx.format_dispatch.push(entry);
                    }
                    break;
                }
                b => {
                    ctx.scratch_push(b);
                    ctx.getc()?;
                }
            }
        }
        ctx.variant_n_formats = ctx.format_dispatch.len();
        ctx.finish_field()
    }

    /// Walk the sample columns of one record, delegating each subfield
    /// through the dispatch vector. Always consumes to end of record.
    pub fn parse(&mut self, ctx: &mut ParserContext) -> Result<FieldEnd> {
        ctx.sample_index = 0;
        ctx.format_index = 0;
        loop {
            match ctx.c {
                SENTINEL | NEWLINE => return ctx.finish_field(),
                TAB => {
                    ctx.sample_index += 1;
                    ctx.format_index = 0;
                    ctx.getc()?;
                }
                COLON => {
                    ctx.format_index += 1;
                    ctx.getc()?;
                }
                _ => {
                    let entry = if ctx.format_index < ctx.variant_n_formats
                        && ctx.sample_index < ctx.n_samples
                    {
                        ctx.format_dispatch[ctx.format_index]
                    } else {
                        None
                    };
                    match entry {
                        Some(i) => match self.fields.get_mut(i) {
                            Some(field) => field.parse_sample(ctx)?,
                            None => {
                                return Err(VarchunkError::Internal {
                                    reason: format!(
                                        "FORMAT dispatch index {i} has no registry entry"
                                    ),
                                })
                            }
                        },
                        None => skip_subfield(ctx)?,
                    }
                }
            }
        }
    }

    pub fn finish(&mut self, len: usize) -> Vec<(String, ChunkArray)> {
        self.fields.iter_mut().map(|f| f.finish(len)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn genotype_fill<T: Storable>(
    fill: Option<crate::types::Fill>,
    warnings: &mut Vec<String>,
) -> T {
    match fill {
        None => T::DEFAULT_FILL,
        Some(f) => T::from_fill(f).unwrap_or_else(|| {
            warnings.push("fill for calldata/GT does not fit its dtype, ignored".to_string());
            T::DEFAULT_FILL
        }),
    }
}

fn sample_fill<T: Storable>(
    fill: Option<crate::types::Fill>,
    key: &str,
    warnings: &mut Vec<String>,
) -> T {
    match fill {
        None => T::DEFAULT_FILL,
        Some(f) => T::from_fill(f).unwrap_or_else(|| {
            warnings.push(format!(
                "fill for calldata/{key} does not fit its dtype, ignored"
            ));
            T::DEFAULT_FILL
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ByteSource;
    use crate::types::Dtype;
    use std::io::Cursor;

    fn context(data: &'static [u8], n_samples: usize) -> ParserContext {
        let source = ByteSource::new(Box::new(Cursor::new(data)), 64);
        ParserContext::new(source, 64, 4, n_samples).unwrap()
    }

    fn gt_spec() -> CalldataSpec {
        CalldataSpec {
            key: "GT".into(),
            dtype: Dtype::Int8,
            number: 1,
            fill: None,
        }
    }

    fn int_spec(key: &str, number: usize) -> CalldataSpec {
        CalldataSpec {
            key: key.into(),
            dtype: Dtype::Int32,
            number,
            fill: None,
        }
    }

    fn run(
        data: &'static [u8],
        specs: Vec<CalldataSpec>,
        n_samples: usize,
    ) -> (Vec<(String, ChunkArray)>, ParserContext) {
        let mut ctx = context(data, n_samples);
        let mut parser = CalldataParser::new(specs, 4, n_samples, 2, &mut Vec::new());
        assert_eq!(parser.parse_format(&mut ctx).unwrap(), FieldEnd::Tab);
        assert_eq!(parser.parse(&mut ctx).unwrap(), FieldEnd::Eol);
        (parser.finish(1), ctx)
    }

    #[test]
    fn test_genotype_phased_and_unphased() {
        let (out, ctx) = run(b"GT\t0|0\t1/0\n", vec![gt_spec()], 2);
        let gt = out[0].1.as_i8().unwrap();
        assert_eq!(gt[[0, 0, 0]], 0);
        assert_eq!(gt[[0, 0, 1]], 0);
        assert_eq!(gt[[0, 1, 0]], 1);
        assert_eq!(gt[[0, 1, 1]], 0);
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_genotype_missing_and_triploid() {
        let (out, _) = run(b"GT\t./.\t0|1|2\n", vec![gt_spec()], 2);
        let gt = out[0].1.as_i8().unwrap();
        assert_eq!(gt[[0, 0, 0]], -1);
        assert_eq!(gt[[0, 0, 1]], -1);
        // alleles beyond the ploidy are dropped
        assert_eq!(gt[[0, 1, 0]], 0);
        assert_eq!(gt[[0, 1, 1]], 1);
    }

    #[test]
    fn test_genotype_dodgy_allele_warns() {
        let (out, ctx) = run(b"GT\t0/1\taa/bb\n", vec![gt_spec()], 2);
        let gt = out[0].1.as_i8().unwrap();
        assert_eq!(gt[[0, 0, 0]], 0);
        assert_eq!(gt[[0, 1, 0]], -1);
        assert_eq!(ctx.warnings().len(), 2);
    }

    #[test]
    fn test_format_subset_skips_unknown_subfields() {
        // GQ announced second but not configured; DP still lands
        let (out, ctx) = run(
            b"GT:GQ:DP\t0/1:12:7\t1/1:34:9\n",
            vec![gt_spec(), int_spec("DP", 1)],
            2,
        );
        let dp = out[1].1.as_i32().unwrap();
        assert_eq!(dp[[0, 0]], 7);
        assert_eq!(dp[[0, 1]], 9);
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn test_extra_subfields_beyond_format_are_skipped() {
        let (out, _) = run(b"GT:DP\t0/1:12\t1/1:9:67,89\n", vec![gt_spec(), int_spec("DP", 1)], 2);
        let dp = out[1].1.as_i32().unwrap();
        assert_eq!(dp[[0, 0]], 12);
        assert_eq!(dp[[0, 1]], 9);
    }

    #[test]
    fn test_missing_trailing_samples_keep_fill() {
        let (out, _) = run(b"GT:DP\t0/1:12\n", vec![gt_spec(), int_spec("DP", 1)], 2);
        let gt = out[0].1.as_i8().unwrap();
        let dp = out[1].1.as_i32().unwrap();
        assert_eq!(gt[[0, 1, 0]], -1);
        assert_eq!(dp[[0, 1]], -1);
    }

    #[test]
    fn test_multi_value_sample_field() {
        let (out, _) = run(b"AD\t3,4\t5,6,7\n", vec![int_spec("AD", 2)], 2);
        let ad = out[0].1.as_i32().unwrap();
        assert_eq!(ad[[0, 0, 0]], 3);
        assert_eq!(ad[[0, 0, 1]], 4);
        assert_eq!(ad[[0, 1, 0]], 5);
        assert_eq!(ad[[0, 1, 1]], 6);
    }

    #[test]
    fn test_sample_string_values() {
        let specs = vec![CalldataSpec {
            key: "FT".into(),
            dtype: Dtype::Bytes(4),
            number: 1,
            fill: None,
        }];
        let (out, _) = run(b"FT\tPASS\tq10\n", specs, 2);
        let ft = out[0].1.as_bytes().unwrap();
        assert_eq!(ft.shape(), &[1, 2, 4]);
        assert_eq!(ft[[0, 0, 0]], b'P');
        assert_eq!(ft[[0, 1, 0]], b'q');
    }

    #[test]
    fn test_extra_sample_columns_are_skipped() {
        // two columns configured, three present
        let (out, _) = run(b"GT\t0/0\t1/1\t0/1\n", vec![gt_spec()], 2);
        let gt = out[0].1.as_i8().unwrap();
        assert_eq!(gt.shape(), &[1, 2, 2]);
    }

    #[test]
    fn test_unusable_dtypes_are_skipped_with_warning() {
        let mut warnings = Vec::new();
        let parser = CalldataParser::new(
            vec![
                CalldataSpec {
                    key: "GT".into(),
                    dtype: Dtype::Float32,
                    number: 1,
                    fill: None,
                },
                CalldataSpec {
                    key: "XX".into(),
                    dtype: Dtype::Bool,
                    number: 1,
                    fill: None,
                },
            ],
            4,
            2,
            2,
            &mut warnings,
        );
        assert!(parser.is_empty());
        assert_eq!(warnings.len(), 2);
    }
}
