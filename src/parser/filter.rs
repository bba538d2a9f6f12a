//! FILTER column parser.

use crate::error::Result;
use crate::parser::context::{
    FieldEnd, ParserContext, COLON, COMMA, NEWLINE, PERIOD, SEMICOLON, SENTINEL, TAB,
};
use crate::parser::fixed::skip_field;
use crate::types::{filled, truncate, ChunkArray};
use ndarray::{ArrayD, Axis};
use std::collections::HashMap;

/// Maps the comma-list of filter names on a record to a one-hot boolean row
/// across the configured filter set.
///
/// One output column per requested `variants/FILTER_<NAME>` field, in
/// request order; PASS is a column exactly when `variants/FILTER_PASS` was
/// requested. Filter names outside the configured set are silently
/// discarded. The separator set is historically lenient: `;` and `:` are
/// accepted alongside `,`.
pub(crate) struct FilterParser {
    names: Vec<String>,
    lookup: HashMap<Vec<u8>, usize>,
    values: ArrayD<bool>,
    chunk_length: usize,
}

impl FilterParser {
    pub fn new(names: Vec<String>, chunk_length: usize) -> Self {
        let lookup = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_bytes().to_vec(), i))
            .collect();
        let values = filled(&[chunk_length, names.len()], false);
        FilterParser {
            names,
            lookup,
            values,
            chunk_length,
        }
    }

    pub fn parse(&mut self, ctx: &mut ParserContext) -> Result<FieldEnd> {
        // explicit missing: the whole row stays zeroed
        if ctx.c == PERIOD {
            return skip_field(ctx);
        }
        let row = ctx.chunk_variant_index;
        ctx.scratch_clear();
        loop {
            match ctx.c {
                COMMA | SEMICOLON | COLON => {
                    if ctx.scratch().is_empty() {
                        ctx.warn("empty FILTER token");
                    } else {
                        self.store(ctx, row);
                    }
                    ctx.scratch_clear();
                    ctx.getc()?;
                }
                TAB | NEWLINE | SENTINEL => {
                    // an empty trailing token (or an empty field) is fine
                    if !ctx.scratch().is_empty() {
                        self.store(ctx, row);
                    }
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

    fn store(&mut self, ctx: &ParserContext, row: usize) {
        if let Some(&col) = self.lookup.get(ctx.scratch()) {
            self.values[[row, col]] = true;
        }
    }

    pub fn finish(&mut self, len: usize) -> Vec<(String, ChunkArray)> {
        let fresh = filled(&[self.chunk_length, self.names.len()], false);
        let values = truncate(std::mem::replace(&mut self.values, fresh), len);
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let column = values.index_axis(Axis(1), i).to_owned();
                (format!("variants/FILTER_{name}"), ChunkArray::Bool(column))
            })
            .collect()
    }
}
