//! The record state machine and the chunk-emitting driver.
//!
//! [`ChunkStream`] sequences the fixed-column parsers over each record
//! (CHROM through CALLDATA), counts records into the chunk under
//! construction, and freezes the chunk into a [`Chunk`] every
//! `chunk_length` records. It is an `Iterator` over `Result<Chunk>`.
//!
//! # Example
//!
//! ```
//! use varchunk::{ChunkStream, Dtype, ParserConfig};
//!
//! # fn main() -> varchunk::Result<()> {
//! let data = b"20\t14370\trs6\tG\tA\t29\tPASS\tDP=14\tGT\t0|0\t1|0\n";
//!
//! let mut config = ParserConfig::default();
//! config.n_samples = 2;
//! config.fields = vec![
//!     "variants/POS".into(),
//!     "variants/DP".into(),
//!     "calldata/GT".into(),
//! ];
//! config.types.insert("variants/DP".into(), Dtype::Int32);
//! config.types.insert("calldata/GT".into(), Dtype::Int8);
//!
//! for chunk in ChunkStream::from_reader(&data[..], &config)? {
//!     let chunk = chunk?;
//!     let pos = chunk.get("variants/POS").unwrap().as_i32().unwrap();
//!     assert_eq!(pos[[0]], 14370);
//! }
//! # Ok(())
//! # }
//! ```

mod calldata;
mod context;
mod filter;
mod fixed;
mod info;

pub use context::ParseWarning;

use crate::chunk::Chunk;
use crate::config::ParserConfig;
use crate::error::{Result, VarchunkError};
use crate::io::ByteSource;
use crate::types::{ChunkArray, Dtype, Fill};
use calldata::{CalldataParser, CalldataSpec};
use context::{FieldEnd, ParserContext, SENTINEL};
use filter::FilterParser;
use fixed::{skip_field, skip_to_eol, AltParser, PosParser, QualParser, StringColumnParser};
use info::{InfoParser, InfoSpec};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Record state: which column the next parse consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Chrom,
    Pos,
    Id,
    Ref,
    Alt,
    Qual,
    Filter,
    Info,
    Format,
    Calldata,
}

impl State {
    /// The state after a TAB-terminated field.
    fn advance(self) -> Result<State> {
        Ok(match self {
            State::Chrom => State::Pos,
            State::Pos => State::Id,
            State::Id => State::Ref,
            State::Ref => State::Alt,
            State::Alt => State::Qual,
            State::Qual => State::Filter,
            State::Filter => State::Info,
            State::Info => State::Format,
            State::Format => State::Calldata,
            // the CALLDATA parser consumes to end of record
            State::Calldata => {
                return Err(VarchunkError::Internal {
                    reason: "CALLDATA field terminated by TAB".to_string(),
                })
            }
        })
    }
}

/// Which fields the configuration requested, partitioned by column.
#[derive(Default)]
struct Requested {
    chrom: bool,
    pos: bool,
    id: bool,
    ref_: bool,
    alt: bool,
    numalt: bool,
    qual: bool,
    filters: Vec<String>,
    info: Vec<String>,
    calldata: Vec<String>,
}

/// Streaming parser over one byte source, yielding chunks of typed arrays.
///
/// Instances are independent: several streams may be parsed concurrently,
/// each on its own reader. See the [module docs](self) for an example.
pub struct ChunkStream {
    ctx: ParserContext,
    state: State,
    finished: bool,
    chrom: Option<StringColumnParser>,
    pos: Option<PosParser>,
    id: Option<StringColumnParser>,
    ref_: Option<StringColumnParser>,
    alt: Option<AltParser>,
    qual: Option<QualParser>,
    filter: Option<FilterParser>,
    info: Option<InfoParser>,
    calldata: Option<CalldataParser>,
}

impl ChunkStream {
    /// Build a stream over any reader.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration (zero sizes, unrecognized field
    /// names) or when priming the reader fails.
    pub fn from_reader<R: Read + Send + 'static>(reader: R, config: &ParserConfig) -> Result<Self> {
        Self::new(Box::new(reader), config)
    }

    /// Build a stream over a plain (uncompressed) file.
    pub fn from_path<P: AsRef<Path>>(path: P, config: &ParserConfig) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, config)
    }

    /// Build a stream over a boxed reader.
    pub fn new(reader: Box<dyn Read + Send>, config: &ParserConfig) -> Result<Self> {
        validate(config)?;
        let chunk_length = config.chunk_length;
        let mut setup_warnings: Vec<String> = Vec::new();

        let requested = partition_fields(config)?;

        let chrom = build_string_column(
            requested.chrom,
            "variants/CHROM",
            12,
            Some("empty CHROM"),
            config,
            chunk_length,
            &mut setup_warnings,
        );
        let id = build_string_column(
            requested.id,
            "variants/ID",
            12,
            None,
            config,
            chunk_length,
            &mut setup_warnings,
        );
        let ref_ = build_string_column(
            requested.ref_,
            "variants/REF",
            1,
            None,
            config,
            chunk_length,
            &mut setup_warnings,
        );

        let pos = requested.pos.then(|| {
            PosParser::new(
                chunk_length,
                int_fill(config.fill_for("variants/POS"), "variants/POS", &mut setup_warnings),
            )
        });
        let qual = requested.qual.then(|| {
            QualParser::new(
                chunk_length,
                float_fill(config.fill_for("variants/QUAL"), -1.0),
            )
        });

        let alt = if requested.alt || requested.numalt {
            let number = config.number_for("variants/ALT").unwrap_or(3).max(1);
            let store_alt = if requested.alt {
                match config.dtype_for("variants/ALT") {
                    None => Some(1),
                    Some(Dtype::Bytes(n)) => Some(n),
                    Some(other) => {
                        setup_warnings.push(format!(
                            "variants/ALT requires a byte-string dtype, got {other:?}; field skipped"
                        ));
                        None
                    }
                }
            } else {
                None
            };
            if store_alt.is_none() && !requested.numalt {
                None
            } else {
                Some(AltParser::new(
                    store_alt.is_some(),
                    requested.numalt,
                    number,
                    store_alt.unwrap_or(1),
                    chunk_length,
                ))
            }
        } else {
            None
        };

        let filter = (!requested.filters.is_empty())
            .then(|| FilterParser::new(requested.filters, chunk_length));

        let info = (!requested.info.is_empty()).then(|| {
            let specs = requested
                .info
                .iter()
                .map(|key| {
                    let canonical = format!("variants/{key}");
                    InfoSpec {
                        key: key.clone(),
                        dtype: declared_dtype(&canonical, None, config, &mut setup_warnings),
                        number: config.number_for(&canonical).unwrap_or(1),
                        fill: config.fill_for(&canonical),
                    }
                })
                .collect();
            InfoParser::new(specs, chunk_length, &mut setup_warnings)
        });

        let calldata = (!requested.calldata.is_empty())
            .then(|| {
                let specs = requested
                    .calldata
                    .iter()
                    .map(|key| {
                        let canonical = format!("calldata/{key}");
                        let default = (key == "GT").then_some(Dtype::Int8);
                        CalldataSpec {
                            key: key.clone(),
                            dtype: declared_dtype(&canonical, default, config, &mut setup_warnings),
                            number: config.number_for(&canonical).unwrap_or(1),
                            fill: config.fill_for(&canonical),
                        }
                    })
                    .collect();
                CalldataParser::new(
                    specs,
                    chunk_length,
                    config.n_samples,
                    config.ploidy,
                    &mut setup_warnings,
                )
            })
            // every requested key may have been skipped for an unusable
            // type; an empty registry parses nothing, so fall back to the
            // plain skip paths for FORMAT and the sample columns
            .filter(|parser| !parser.is_empty());

        let source = ByteSource::new(reader, config.input_buffer_size);
        let mut ctx = ParserContext::new(
            source,
            config.temp_buffer_size,
            chunk_length,
            config.n_samples,
        )?;
        for message in setup_warnings {
            ctx.warn_setup(message);
        }

        Ok(ChunkStream {
            ctx,
            state: State::Chrom,
            finished: false,
            chrom,
            pos,
            id,
            ref_,
            alt,
            qual,
            filter,
            info,
            calldata,
        })
    }

    /// Recoverable anomalies collected so far.
    pub fn warnings(&self) -> &[ParseWarning] {
        self.ctx.warnings()
    }

    /// Drain the collected anomalies.
    pub fn take_warnings(&mut self) -> Vec<ParseWarning> {
        self.ctx.take_warnings()
    }

    /// Number of records parsed so far across the whole stream.
    pub fn records_parsed(&self) -> u64 {
        self.ctx.variant_index
    }

    /// Parse one field in the current state; `Some(chunk)` when the field
    /// ended a record that filled the chunk.
    fn step(&mut self) -> Result<Option<Chunk>> {
        let ctx = &mut self.ctx;
        let end = match self.state {
            State::Chrom => match self.chrom.as_mut() {
                Some(p) => p.parse(ctx)?,
                None => skip_field(ctx)?,
            },
            State::Pos => match self.pos.as_mut() {
                Some(p) => p.parse(ctx)?,
                None => skip_field(ctx)?,
            },
            State::Id => match self.id.as_mut() {
                Some(p) => p.parse(ctx)?,
                None => skip_field(ctx)?,
            },
            State::Ref => match self.ref_.as_mut() {
                Some(p) => p.parse(ctx)?,
                None => skip_field(ctx)?,
            },
            State::Alt => match self.alt.as_mut() {
                Some(p) => p.parse(ctx)?,
                None => skip_field(ctx)?,
            },
            State::Qual => match self.qual.as_mut() {
                Some(p) => p.parse(ctx)?,
                None => skip_field(ctx)?,
            },
            State::Filter => match self.filter.as_mut() {
                Some(p) => p.parse(ctx)?,
                None => skip_field(ctx)?,
            },
            State::Info => match self.info.as_mut() {
                Some(p) => p.parse(ctx)?,
                None => skip_field(ctx)?,
            },
            State::Format => match self.calldata.as_ref() {
                Some(p) => p.parse_format(ctx)?,
                None => skip_field(ctx)?,
            },
            State::Calldata => match self.calldata.as_mut() {
                Some(p) => p.parse(ctx)?,
                None => skip_to_eol(ctx)?,
            },
        };
        match end {
            FieldEnd::Tab => {
                self.state = self.state.advance()?;
                Ok(None)
            }
            FieldEnd::Eol => {
                self.state = State::Chrom;
                Ok(self.end_record())
            }
        }
    }

    /// Count a completed record; emit the chunk when it just filled.
    fn end_record(&mut self) -> Option<Chunk> {
        self.ctx.variant_index += 1;
        self.ctx.chunk_variant_index += 1;
        if self.ctx.chunk_variant_index == self.ctx.chunk_length {
            self.ctx.chunk_variant_index = 0;
            Some(self.freeze(self.ctx.chunk_length))
        } else {
            None
        }
    }

    /// Freeze every in-progress array into an emitted chunk and allocate
    /// fresh fill-initialized arrays.
    fn freeze(&mut self, len: usize) -> Chunk {
        let mut fields: HashMap<String, ChunkArray> = HashMap::new();
        if let Some(p) = self.chrom.as_mut() {
            let (name, array) = p.finish(len);
            fields.insert(name, array);
        }
        if let Some(p) = self.pos.as_mut() {
            let (name, array) = p.finish(len);
            fields.insert(name, array);
        }
        if let Some(p) = self.id.as_mut() {
            let (name, array) = p.finish(len);
            fields.insert(name, array);
        }
        if let Some(p) = self.ref_.as_mut() {
            let (name, array) = p.finish(len);
            fields.insert(name, array);
        }
        if let Some(p) = self.alt.as_mut() {
            fields.extend(p.finish(len));
        }
        if let Some(p) = self.qual.as_mut() {
            let (name, array) = p.finish(len);
            fields.insert(name, array);
        }
        if let Some(p) = self.filter.as_mut() {
            fields.extend(p.finish(len));
        }
        if let Some(p) = self.info.as_mut() {
            fields.extend(p.finish(len));
        }
        if let Some(p) = self.calldata.as_mut() {
            fields.extend(p.finish(len));
        }
        Chunk::new(len, fields)
    }
}

impl Iterator for ChunkStream {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if self.ctx.c == SENTINEL {
                // a parser that sees the sentinel mid-field ends its record
                // itself; reaching here mid-record means the stream ended
                // right after a field terminator, and that record still
                // counts, with fills in its unparsed trailing fields
                if self.state != State::Chrom {
                    self.state = State::Chrom;
                    if let Some(chunk) = self.end_record() {
                        return Some(Ok(chunk));
                    }
                }
                self.finished = true;
                let tail = self.ctx.chunk_variant_index;
                if tail > 0 {
                    self.ctx.chunk_variant_index = 0;
                    return Some(Ok(self.freeze(tail)));
                }
                return None;
            }
            match self.step() {
                Ok(Some(chunk)) => return Some(Ok(chunk)),
                Ok(None) => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn validate(config: &ParserConfig) -> Result<()> {
    let reason = if config.chunk_length == 0 {
        "chunk_length must be positive"
    } else if config.input_buffer_size == 0 {
        "input_buffer_size must be positive"
    } else if config.temp_buffer_size == 0 {
        "temp_buffer_size must be positive"
    } else if config.ploidy == 0 {
        "ploidy must be positive"
    } else {
        return Ok(());
    };
    Err(VarchunkError::InvalidConfig {
        reason: reason.to_string(),
    })
}

/// Normalize a requested field name to its canonical `group/NAME` form.
fn canonical_name(raw: &str) -> Result<String> {
    const FIXED: [&str; 7] = ["CHROM", "POS", "ID", "REF", "ALT", "QUAL", "numalt"];
    if raw.contains('/') {
        let known_group = raw.strip_prefix("variants/").map_or_else(
            || raw.strip_prefix("calldata/").is_some_and(|k| !k.is_empty()),
            |k| !k.is_empty(),
        );
        // FILTER and FORMAT are structural columns, not materializable names
        if known_group && raw != "variants/FILTER" && raw != "variants/FORMAT" {
            return Ok(raw.to_string());
        }
    } else if FIXED.contains(&raw) || raw.starts_with("FILTER_") {
        return Ok(format!("variants/{raw}"));
    }
    Err(VarchunkError::UnrecognizedField {
        field: raw.to_string(),
    })
}

fn partition_fields(config: &ParserConfig) -> Result<Requested> {
    let mut requested = Requested::default();
    let mut seen = HashSet::new();
    for raw in &config.fields {
        let name = canonical_name(raw)?;
        if !seen.insert(name.clone()) {
            continue;
        }
        match name.as_str() {
            "variants/CHROM" => requested.chrom = true,
            "variants/POS" => requested.pos = true,
            "variants/ID" => requested.id = true,
            "variants/REF" => requested.ref_ = true,
            "variants/ALT" => requested.alt = true,
            "variants/numalt" => requested.numalt = true,
            "variants/QUAL" => requested.qual = true,
            _ => {
                if let Some(filter_name) = name.strip_prefix("variants/FILTER_") {
                    requested.filters.push(filter_name.to_string());
                } else if let Some(key) = name.strip_prefix("variants/") {
                    requested.info.push(key.to_string());
                } else if let Some(key) = name.strip_prefix("calldata/") {
                    requested.calldata.push(key.to_string());
                }
            }
        }
    }
    Ok(requested)
}

fn build_string_column(
    wanted: bool,
    name: &'static str,
    default_itemsize: usize,
    empty_warning: Option<&'static str>,
    config: &ParserConfig,
    chunk_length: usize,
    setup_warnings: &mut Vec<String>,
) -> Option<StringColumnParser> {
    if !wanted {
        return None;
    }
    let itemsize = match config.dtype_for(name) {
        None => default_itemsize,
        Some(Dtype::Bytes(n)) => n,
        Some(other) => {
            setup_warnings.push(format!(
                "{name} requires a byte-string dtype, got {other:?}; field skipped"
            ));
            return None;
        }
    };
    Some(StringColumnParser::new(
        name,
        itemsize,
        chunk_length,
        empty_warning,
    ))
}

/// Resolve the declared dtype of an INFO/calldata key. A key with no
/// declared type falls back to a 12-byte string, with a warning; the
/// configuration stands in for the header here.
fn declared_dtype(
    canonical: &str,
    default: Option<Dtype>,
    config: &ParserConfig,
    setup_warnings: &mut Vec<String>,
) -> Dtype {
    config
        .dtype_for(canonical)
        .or(default)
        .unwrap_or_else(|| {
            setup_warnings.push(format!(
                "could not determine a dtype for {canonical}, falling back to S12"
            ));
            Dtype::Bytes(12)
        })
}

fn int_fill(fill: Option<Fill>, name: &str, setup_warnings: &mut Vec<String>) -> i32 {
    match fill {
        None => -1,
        Some(Fill::Int(v)) => v as i32,
        Some(Fill::Float(_)) => {
            setup_warnings.push(format!("fill for {name} must be an integer, ignored"));
            -1
        }
    }
}

fn float_fill(fill: Option<Fill>, default: f32) -> f32 {
    match fill {
        None => default,
        Some(Fill::Float(v)) => v as f32,
        Some(Fill::Int(v)) => v as f32,
    }
}
