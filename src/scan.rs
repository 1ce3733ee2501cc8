//! Chunk scanner: tokenizes a byte range into records and fields, and runs
//! the two stages described in the data model — inference (type lattice
//! only, no values stored) and extraction (values written once every
//! column's final type is known).
//!
//! Both stages share the same per-record tokenizer, `scan_record`. A
//! chunk's first and last records are usually incomplete (the chunk
//! boundary landed mid-record); those are carried out as raw bytes in
//! `leading_partial` / `trailing_partial` for `reconcile.rs` to stitch.

use crate::error::Result;
use crate::numeric::{field_lattice_contribution, parse_number_raw, NumField};
use crate::options::QuoteMode;
use crate::types::{Column, ColumnType};

/// One field's logical content, borrowed from the chunk when possible.
#[derive(Debug, Clone)]
pub enum FieldContent<'a> {
    Borrowed(&'a [u8]),
    Owned(Vec<u8>),
}

impl<'a> FieldContent<'a> {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FieldContent::Borrowed(b) => b,
            FieldContent::Owned(b) => b,
        }
    }

    fn into_owned(self) -> Vec<u8> {
        match self {
            FieldContent::Borrowed(b) => b.to_vec(),
            FieldContent::Owned(b) => b,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldInfo<'a> {
    pub quoted: bool,
    pub content: FieldContent<'a>,
}

/// The result of tokenizing one record starting at some byte offset.
pub struct RecordScan<'a> {
    pub fields: Vec<FieldInfo<'a>>,
    /// Offset just past the record's terminator (or `bytes.len()` if the
    /// record ran off the end of the chunk without one).
    pub end: usize,
    /// Offset just past the record's last field, excluding any terminator
    /// bytes. Equal to `end` when the record is unterminated.
    pub content_end: usize,
    /// `true` if a real terminator (`\n`, `\r\n`, or a lone `\r` in Excel
    /// mode) was found; `false` if the chunk ended mid-record.
    pub terminated: bool,
    /// Quote state at `end` — whether an opened quote is still unclosed.
    pub ends_in_quote: bool,
}

/// If a record terminator starts at `bytes[i]`, its byte length; `None`
/// means `bytes[i]` is not a terminator start (includes a bare `\r` in
/// permissive mode, which is a field-interior byte there).
fn terminator_len_at(bytes: &[u8], i: usize, quote_mode: QuoteMode) -> Option<usize> {
    match bytes.get(i) {
        Some(b'\n') => Some(1),
        Some(b'\r') => {
            if bytes.get(i + 1) == Some(&b'\n') {
                Some(2)
            } else if quote_mode == QuoteMode::Excel {
                Some(1)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Scan an unquoted field (or the trailing literal run after a quoted
/// field's closing quote) up to the next separator or record terminator.
fn scan_unquoted_run(bytes: &[u8], start: usize, sep: u8, quote_mode: QuoteMode) -> usize {
    let n = bytes.len();
    let mut i = start;
    while i < n && bytes[i] != sep && terminator_len_at(bytes, i, quote_mode).is_none() {
        i += 1;
    }
    i
}

/// Tokenize exactly one record starting at `pos`. `starts_in_quote` means
/// `pos` is itself inside an already-open quote carried over from a
/// previous chunk (or the previous record of a glued seam buffer); in that
/// case the first field has no opening `"` to consume.
pub fn scan_record(
    bytes: &[u8],
    pos: usize,
    sep: u8,
    quote_mode: QuoteMode,
    starts_in_quote: bool,
) -> RecordScan<'_> {
    let n = bytes.len();
    let mut fields = Vec::new();
    let mut i = pos;
    let mut continuation = starts_in_quote;

    loop {
        if i >= n {
            return RecordScan {
                fields,
                end: n,
                content_end: n,
                terminated: false,
                ends_in_quote: false,
            };
        }

        let field_start = i;
        if !continuation {
            while i < n && bytes[i] == b' ' {
                i += 1;
            }
        }

        let quoted = continuation || (i < n && bytes[i] == b'"');
        if quoted && !continuation {
            i += 1; // consume opening quote
        }
        continuation = false;

        if quoted {
            let content_start = i;
            let mut content_end = i;
            let mut owned: Option<Vec<u8>> = None;
            let mut closed = false;
            while i < n {
                if bytes[i] == b'"' {
                    if i + 1 < n && bytes[i + 1] == b'"' {
                        let buf = owned.get_or_insert_with(|| bytes[content_start..i].to_vec());
                        buf.push(b'"');
                        i += 2;
                        content_end = i;
                        continue;
                    }
                    closed = true;
                    i += 1;
                    break;
                }
                if quote_mode == QuoteMode::Excel && bytes[i] == b'\r' {
                    owned.get_or_insert_with(|| bytes[content_start..i].to_vec());
                    i += 1;
                    continue;
                }
                if let Some(buf) = owned.as_mut() {
                    buf.push(bytes[i]);
                }
                i += 1;
                content_end = i;
            }

            if !closed {
                // Unbalanced quote at end-of-buffer: ambiguous per design
                // notes — treat what's left as literal quoted content.
                let content = match owned {
                    Some(buf) => FieldContent::Owned(buf),
                    None => FieldContent::Borrowed(&bytes[content_start..content_end]),
                };
                fields.push(FieldInfo {
                    quoted: true,
                    content,
                });
                return RecordScan {
                    fields,
                    end: n,
                    content_end: n,
                    terminated: false,
                    ends_in_quote: true,
                };
            }

            // Trailing literal content between the closing quote and the
            // terminator is concatenated onto the field (permissive rule).
            let trailing_start = i;
            let trailing_end = scan_unquoted_run(bytes, trailing_start, sep, quote_mode);
            let has_trailing = trailing_end > trailing_start;
            let content = if has_trailing {
                let mut buf = owned.unwrap_or_else(|| bytes[content_start..content_end].to_vec());
                buf.extend_from_slice(&bytes[trailing_start..trailing_end]);
                FieldContent::Owned(buf)
            } else {
                match owned {
                    Some(buf) => FieldContent::Owned(buf),
                    None => FieldContent::Borrowed(&bytes[content_start..content_end]),
                }
            };
            i = trailing_end;
            fields.push(FieldInfo {
                quoted: true,
                content,
            });
        } else {
            i = scan_unquoted_run(bytes, field_start, sep, quote_mode);
            fields.push(FieldInfo {
                quoted: false,
                content: FieldContent::Borrowed(&bytes[field_start..i]),
            });
        }

        // `i` now sits on a separator, a terminator start, or `n`.
        if i >= n {
            return RecordScan {
                fields,
                end: n,
                content_end: n,
                terminated: false,
                ends_in_quote: false,
            };
        }
        if bytes[i] == sep {
            i += 1;
            continue;
        }
        if let Some(len) = terminator_len_at(bytes, i, quote_mode) {
            return RecordScan {
                fields,
                end: i + len,
                content_end: i,
                terminated: true,
                ends_in_quote: false,
            };
        }
        unreachable!("field scan stopped on a byte that is neither separator nor terminator");
    }
}

/// Per-column lattice state accumulated while walking a chunk's full
/// records. Index `k` is the running join of every field seen in column
/// `k` so far; a column not yet created defaults to `Int64`, the lattice's
/// bottom element.
pub struct InferResult {
    pub column_types: Vec<ColumnType>,
    pub row_count: usize,
    pub header_fields: Option<Vec<Vec<u8>>>,
    pub leading_partial: Vec<u8>,
    pub trailing_partial: Vec<u8>,
    pub starts_in_quote: bool,
    pub ends_in_quote: bool,
    /// This chunk's whole content was swallowed by its own leading record
    /// without ever resolving — the record spans at least three chunks, and
    /// `leading_partial` (not `trailing_partial`) carries all of it forward.
    pub swallowed_whole: bool,
}

pub struct ExtractResult {
    pub columns: Vec<Column>,
    pub leading_partial: Vec<u8>,
    pub trailing_partial: Vec<u8>,
    pub starts_in_quote: bool,
    pub ends_in_quote: bool,
    pub swallowed_whole: bool,
}

fn join_record_types(column_types: &mut Vec<ColumnType>, fields: &[FieldInfo<'_>]) {
    for (k, field) in fields.iter().enumerate() {
        if k >= column_types.len() {
            column_types.resize(k + 1, ColumnType::Int64);
        }
        if let Some(ty) = field_lattice_contribution(field.content.as_bytes(), field.quoted) {
            column_types[k] = column_types[k].join(ty);
        }
    }
}

/// Type-inference pass over one chunk. `chunk_is_first` suppresses the
/// leading-partial defer (the chunk covering offset 0 always starts a real
/// record). `capture_header` additionally diverts the chunk's very first
/// record into `header_fields` instead of the type lattice.
#[allow(clippy::too_many_arguments)]
pub fn scan_chunk_infer(
    bytes: &[u8],
    sep: u8,
    quote_mode: QuoteMode,
    starts_in_quote: bool,
    chunk_is_first: bool,
    capture_header: bool,
) -> InferResult {
    let mut column_types = Vec::new();
    let mut row_count = 0usize;
    let mut header_fields = None;
    let mut pos = 0usize;
    let mut in_quote = starts_in_quote;

    let mut leading_content_end = 0usize;
    if !chunk_is_first && !bytes.is_empty() {
        let scan = scan_record(bytes, 0, sep, quote_mode, in_quote);
        if !scan.terminated {
            return InferResult {
                column_types,
                row_count,
                header_fields,
                leading_partial: bytes[..scan.content_end].to_vec(),
                trailing_partial: Vec::new(),
                starts_in_quote,
                ends_in_quote: scan.ends_in_quote,
                swallowed_whole: true,
            };
        }
        pos = scan.end;
        leading_content_end = scan.content_end;
        // leading content is [0, content_end), handed to the reconciler raw
    }
    let leading_partial = if chunk_is_first {
        Vec::new()
    } else {
        bytes[..leading_content_end].to_vec()
    };
    // The leading record (if any) was fully resolved up to its terminator,
    // so whatever comes next in this chunk starts outside any quote.
    if !chunk_is_first {
        in_quote = false;
    }

    let mut first_record = chunk_is_first;
    loop {
        if pos >= bytes.len() {
            break;
        }
        let scan = scan_record(bytes, pos, sep, quote_mode, in_quote);
        in_quote = false;
        if !scan.terminated {
            return InferResult {
                column_types,
                row_count,
                header_fields,
                leading_partial,
                trailing_partial: bytes[pos..].to_vec(),
                starts_in_quote,
                ends_in_quote: scan.ends_in_quote,
                swallowed_whole: false,
            };
        }
        if first_record && capture_header {
            if scan.fields.len() > column_types.len() {
                column_types.resize(scan.fields.len(), ColumnType::Int64);
            }
            header_fields = Some(
                scan.fields
                    .into_iter()
                    .map(|f| f.content.into_owned())
                    .collect(),
            );
        } else {
            join_record_types(&mut column_types, &scan.fields);
            row_count += 1;
        }
        first_record = false;
        pos = scan.end;
    }

    InferResult {
        column_types,
        row_count,
        header_fields,
        leading_partial,
        trailing_partial: Vec::new(),
        starts_in_quote,
        ends_in_quote: false,
        swallowed_whole: false,
    }
}

fn extract_field(
    col: &mut Column,
    final_ty: ColumnType,
    field: &FieldInfo<'_>,
    missing_int: i64,
    missing_float: f64,
) -> Result<()> {
    if !field.quoted && field.content.as_bytes().is_empty() {
        return col.push_missing(missing_int, missing_float);
    }
    match final_ty {
        ColumnType::String => col.push_string(field.content.as_bytes().to_vec()),
        ColumnType::Double => {
            if field.quoted {
                return col.push_double(missing_float);
            }
            match parse_number_raw(field.content.as_bytes()) {
                NumField::Int64(v) => col.push_double(v as f64),
                NumField::Double(v) => col.push_double(v),
                NumField::NotNumeric => col.push_double(missing_float),
            }
        }
        ColumnType::Int64 => {
            if field.quoted {
                return col.push_int(missing_int);
            }
            match parse_number_raw(field.content.as_bytes()) {
                NumField::Int64(v) => col.push_int(v),
                _ => col.push_int(missing_int),
            }
        }
    }
}

/// Extraction pass: `final_types` is the globally-reconciled type for every
/// column (already clamped by any `per_column_type_override`).
pub fn scan_chunk_extract(
    bytes: &[u8],
    sep: u8,
    quote_mode: QuoteMode,
    starts_in_quote: bool,
    chunk_is_first: bool,
    capture_header: bool,
    final_types: &[ColumnType],
    missing_int: i64,
    missing_float: f64,
) -> Result<ExtractResult> {
    let mut columns: Vec<Column> = final_types.iter().copied().map(Column::with_type).collect();
    let mut pos = 0usize;
    let in_quote = starts_in_quote;

    let mut leading_content_end = 0usize;
    if !chunk_is_first && !bytes.is_empty() {
        let scan = scan_record(bytes, 0, sep, quote_mode, in_quote);
        if !scan.terminated {
            return Ok(ExtractResult {
                columns,
                leading_partial: bytes[..scan.content_end].to_vec(),
                trailing_partial: Vec::new(),
                starts_in_quote,
                ends_in_quote: scan.ends_in_quote,
                swallowed_whole: true,
            });
        }
        pos = scan.end;
        leading_content_end = scan.content_end;
    }
    let leading_partial = if chunk_is_first {
        Vec::new()
    } else {
        bytes[..leading_content_end].to_vec()
    };

    let mut first_record = chunk_is_first;
    loop {
        if pos >= bytes.len() {
            break;
        }
        let scan = scan_record(bytes, pos, sep, quote_mode, false);
        if !scan.terminated {
            return Ok(ExtractResult {
                columns,
                leading_partial,
                trailing_partial: bytes[pos..].to_vec(),
                starts_in_quote,
                ends_in_quote: scan.ends_in_quote,
                swallowed_whole: false,
            });
        }
        if first_record && capture_header {
            // already captured during inference; nothing to extract
        } else {
            for (k, col) in columns.iter_mut().enumerate() {
                let final_ty = final_types[k];
                match scan.fields.get(k) {
                    Some(field) => extract_field(col, final_ty, field, missing_int, missing_float)?,
                    None => col.push_missing(missing_int, missing_float)?,
                }
            }
        }
        first_record = false;
        pos = scan.end;
    }

    Ok(ExtractResult {
        columns,
        leading_partial,
        trailing_partial: Vec::new(),
        starts_in_quote,
        ends_in_quote: false,
        swallowed_whole: false,
    })
}

/// Tokenize a standalone buffer known to hold exactly one logical record:
/// the glued seam between two chunks, or the whole file's final trailing
/// bytes. Unlike `scan_chunk_infer`, a record left unterminated at the end
/// of `bytes` is treated as complete here rather than deferred further —
/// there is no next chunk left to glue it to.
pub fn scan_standalone_infer(bytes: &[u8], sep: u8, quote_mode: QuoteMode) -> InferResult {
    let mut column_types = Vec::new();
    let mut row_count = 0usize;
    let mut pos = 0usize;
    while pos < bytes.len() {
        let scan = scan_record(bytes, pos, sep, quote_mode, false);
        join_record_types(&mut column_types, &scan.fields);
        row_count += 1;
        pos = scan.end;
    }
    InferResult {
        column_types,
        row_count,
        header_fields: None,
        leading_partial: Vec::new(),
        trailing_partial: Vec::new(),
        starts_in_quote: false,
        ends_in_quote: false,
        swallowed_whole: false,
    }
}

/// Extraction counterpart of [`scan_standalone_infer`].
pub fn scan_standalone_extract(
    bytes: &[u8],
    sep: u8,
    quote_mode: QuoteMode,
    final_types: &[ColumnType],
    missing_int: i64,
    missing_float: f64,
) -> Result<ExtractResult> {
    let mut columns: Vec<Column> = final_types.iter().copied().map(Column::with_type).collect();
    let mut pos = 0usize;
    while pos < bytes.len() {
        let scan = scan_record(bytes, pos, sep, quote_mode, false);
        for (k, col) in columns.iter_mut().enumerate() {
            let final_ty = final_types[k];
            match scan.fields.get(k) {
                Some(field) => extract_field(col, final_ty, field, missing_int, missing_float)?,
                None => col.push_missing(missing_int, missing_float)?,
            }
        }
        pos = scan.end;
    }
    Ok(ExtractResult {
        columns,
        leading_partial: Vec::new(),
        trailing_partial: Vec::new(),
        starts_in_quote: false,
        ends_in_quote: false,
        swallowed_whole: false,
    })
}
