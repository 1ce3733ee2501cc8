//! The public entry points: split the input into chunks, infer column
//! types, reconcile chunk boundaries, apply caller overrides, extract
//! values, and merge everything into one `ParsedTable`.

use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::column::concat_segments;
use crate::error::{CsvError, Result};
use crate::options::ParseOptions;
use crate::queue::{map_chunks, try_map_chunks};
use crate::reconcile::{extract_gaps, infer_gaps, plan_boundaries, propagate_hypotheses, BoundarySegment};
use crate::scan::{scan_chunk_extract, scan_chunk_infer, ExtractResult, InferResult};
use crate::types::{Column, ColumnKey, ColumnType, ParsedTable};

/// Split `len` bytes into up to `nthreads` contiguous ranges. `nthreads` is
/// honored directly — chunk splitting is what makes boundary reconciliation
/// exercisable at all, including for small inputs used in tests — capped
/// only so a chunk is never zero bytes wide.
fn split_ranges(len: usize, nthreads: usize) -> Vec<(usize, usize)> {
    let n = if len == 0 { 1 } else { nthreads.max(1).min(len) };
    let base = len / n;
    let rem = len % n;
    let mut ranges = Vec::with_capacity(n);
    let mut start = 0;
    for i in 0..n {
        let size = base + usize::from(i < rem);
        let end = start + size;
        ranges.push((start, end));
        start = end;
    }
    ranges
}

fn join_types(acc: &mut Vec<ColumnType>, other: &[ColumnType]) {
    if other.len() > acc.len() {
        acc.resize(other.len(), ColumnType::Int64);
    }
    for (a, b) in acc.iter_mut().zip(other.iter()) {
        *a = a.join(*b);
    }
}

fn resolve_override_key(key: &ColumnKey, headers: Option<&[Vec<u8>]>) -> Option<usize> {
    match key {
        ColumnKey::Index(idx) => Some(*idx),
        ColumnKey::Name(name) => headers?.iter().position(|h| h == name),
    }
}

/// Apply `per_column_type_override` to the naturally-inferred `column_types`
/// in place. An override is a floor: the final type is the lattice join of
/// the natural type and the override, except `INT64` overrides never
/// promote — data that would force one past `INT64` is a hard conflict.
fn apply_overrides(
    column_types: &mut Vec<ColumnType>,
    options: &ParseOptions,
    headers: Option<&[Vec<u8>]>,
) -> Result<()> {
    for (key, &override_ty) in options.overrides() {
        let Some(idx) = resolve_override_key(key, headers) else {
            continue;
        };
        if idx >= column_types.len() {
            column_types.resize(idx + 1, ColumnType::Int64);
        }
        let natural = column_types[idx];
        if override_ty == ColumnType::Int64 && natural > ColumnType::Int64 {
            return Err(CsvError::TypeOverrideConflict(describe_key(key)));
        }
        column_types[idx] = natural.join(override_ty);
    }
    Ok(())
}

fn describe_key(key: &ColumnKey) -> String {
    match key {
        ColumnKey::Index(idx) => idx.to_string(),
        ColumnKey::Name(name) => String::from_utf8_lossy(name).into_owned(),
    }
}

/// Parse `buffer` according to `options`, returning the header row (if
/// `n_header_rows == 1`) and the final typed columns in file order.
pub fn parse_bytes(buffer: &[u8], options: &ParseOptions) -> Result<ParsedTable> {
    options.validate()?;
    let sep = options.separator;
    let quote_mode = options.quote_mode();
    let capture_header = options.n_header_rows == 1;

    if !buffer.is_empty() && buffer.iter().all(|&b| b == b' ' || b == b'\n' || b == b'\r') {
        return Ok(ParsedTable {
            headers: None,
            columns: vec![Column::with_type(ColumnType::Int64)],
        });
    }

    let ranges = split_ranges(buffer.len(), options.nthreads);
    let n = ranges.len();

    let mut infer_results: Vec<InferResult> = map_chunks(ranges.clone(), options.nthreads, |(start, end)| {
        let chunk_is_first = start == 0;
        scan_chunk_infer(
            &buffer[start..end],
            sep,
            quote_mode,
            false,
            chunk_is_first,
            chunk_is_first && capture_header,
        )
    })?;

    let mut starts_in_quote = vec![false; n];
    let mut ends_in_quote: Vec<bool> = infer_results.iter().map(|r| r.ends_in_quote).collect();
    propagate_hypotheses(&mut starts_in_quote, &mut ends_in_quote, |idx, hyp| {
        let (start, end) = ranges[idx];
        let rescanned = scan_chunk_infer(&buffer[start..end], sep, quote_mode, hyp, false, false);
        let new_ends = rescanned.ends_in_quote;
        infer_results[idx] = rescanned;
        debug!(chunk = idx, starts_in_quote = hyp, "rescanned chunk after hypothesis correction");
        new_ends
    });

    let leading: Vec<Vec<u8>> = infer_results.iter().map(|r| r.leading_partial.clone()).collect();
    let trailing: Vec<Vec<u8>> = infer_results.iter().map(|r| r.trailing_partial.clone()).collect();
    let swallowed: Vec<bool> = infer_results.iter().map(|r| r.swallowed_whole).collect();
    let segments = plan_boundaries(&leading, &trailing, &swallowed);
    let gap_infer_results = infer_gaps(&segments, sep, quote_mode);

    let mut column_types: Vec<ColumnType> = Vec::new();
    for r in &infer_results {
        join_types(&mut column_types, &r.column_types);
    }
    for r in &gap_infer_results {
        join_types(&mut column_types, &r.column_types);
    }

    let mut headers = infer_results[0].header_fields.clone();
    if let Some(h) = headers.as_mut() {
        if column_types.len() > h.len() {
            h.resize(column_types.len(), Vec::new());
        }
    }

    apply_overrides(&mut column_types, options, headers.as_deref())?;

    let final_types = column_types;
    let missing_int = options.missing_int_val;
    let missing_float = options.missing_float_val;

    let indexed_ranges: Vec<(usize, (usize, usize))> = ranges.iter().copied().enumerate().collect();
    let chunk_extracts: Vec<ExtractResult> =
        try_map_chunks(indexed_ranges, options.nthreads, |(idx, (start, end))| {
            let chunk_is_first = start == 0;
            scan_chunk_extract(
                &buffer[start..end],
                sep,
                quote_mode,
                starts_in_quote[idx],
                chunk_is_first,
                chunk_is_first && capture_header,
                &final_types,
                missing_int,
                missing_float,
            )
        })?;

    let gap_extracts = extract_gaps(&segments, sep, quote_mode, &final_types, missing_int, missing_float)?;

    let mut ordered_segments: Vec<Vec<Column>> = Vec::with_capacity(segments.len());
    let mut gap_cursor = 0usize;
    for seg in &segments {
        match seg {
            BoundarySegment::Chunk(idx) => ordered_segments.push(chunk_extracts[*idx].columns.clone()),
            BoundarySegment::Gap(_) => {
                ordered_segments.push(gap_extracts[gap_cursor].columns.clone());
                gap_cursor += 1;
            }
        }
    }

    let columns = concat_segments(&final_types, ordered_segments);
    Ok(ParsedTable { headers, columns })
}

/// Memory-map `path` and delegate to [`parse_bytes`].
pub fn parse_file(path: impl AsRef<Path>, options: &ParseOptions) -> Result<ParsedTable> {
    let file = std::fs::File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    parse_bytes(&mmap, options)
}
