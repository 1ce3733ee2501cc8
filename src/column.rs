//! Column store: per-chunk value buffers during extraction, and the final
//! merge that concatenates per-segment columns into one contiguous result.
//!
//! The type-inference stage never materializes values (see `scan.rs`), so
//! there is no in-place promotion-rewrite to implement here: by the time a
//! chunk builds a `Column`, its final type is already known. What remains
//! is geometric, allocation-checked growth and the coordinator-side concat.

use crate::error::{CsvError, Result};
use crate::types::{Column, ColumnType};

const INITIAL_CAPACITY: usize = 64;

fn grow<T>(v: &mut Vec<T>) -> Result<()> {
    if v.len() == v.capacity() {
        let additional = v.capacity().max(INITIAL_CAPACITY);
        v.try_reserve(additional).map_err(|_| CsvError::OutOfMemory)?;
    }
    Ok(())
}

impl Column {
    pub fn with_type(ty: ColumnType) -> Self {
        match ty {
            ColumnType::Int64 => Column::Int64(Vec::new()),
            ColumnType::Double => Column::Double(Vec::new()),
            ColumnType::String => Column::String(Vec::new()),
        }
    }

    pub fn push_int(&mut self, val: i64) -> Result<()> {
        match self {
            Column::Int64(v) => {
                grow(v)?;
                v.push(val);
                Ok(())
            }
            _ => Err(CsvError::OutOfMemory),
        }
    }

    pub fn push_double(&mut self, val: f64) -> Result<()> {
        match self {
            Column::Double(v) => {
                grow(v)?;
                v.push(val);
                Ok(())
            }
            _ => Err(CsvError::OutOfMemory),
        }
    }

    pub fn push_string(&mut self, bytes: Vec<u8>) -> Result<()> {
        match self {
            Column::String(v) => {
                grow(v)?;
                v.push(bytes);
                Ok(())
            }
            _ => Err(CsvError::OutOfMemory),
        }
    }

    pub fn push_missing(&mut self, missing_int: i64, missing_float: f64) -> Result<()> {
        match self {
            Column::Int64(_) => self.push_int(missing_int),
            Column::Double(_) => self.push_double(missing_float),
            Column::String(_) => self.push_string(Vec::new()),
        }
    }
}

/// Concatenate the per-segment columns (one `Vec<Column>` per chunk or
/// seam record, all already built against the same final `types`, in
/// byte-offset order) into the final contiguous result.
pub fn concat_segments(types: &[ColumnType], segments: Vec<Vec<Column>>) -> Vec<Column> {
    let mut merged: Vec<Column> = types.iter().copied().map(Column::with_type).collect();
    for segment in segments {
        for (col, piece) in merged.iter_mut().zip(segment.into_iter()) {
            match (col, piece) {
                (Column::Int64(dst), Column::Int64(src)) => dst.extend(src),
                (Column::Double(dst), Column::Double(src)) => dst.extend(src),
                (Column::String(dst), Column::String(src)) => dst.extend(src),
                _ => unreachable!("segment column type disagrees with the merged final type"),
            }
        }
    }
    merged
}
