//! Parallel, type-inferring CSV reader.
//!
//! A buffer is split into byte-range chunks, each chunk is independently
//! scanned for its column type lattice, chunk boundaries are reconciled
//! (a chunk can start or end mid-quoted-field or mid-record), and the
//! globally agreed-upon column types drive a second, parallel extraction
//! pass that writes real values straight into their final type — no
//! in-place promotion rewriting required.
//!
//! Safety note mirrored from this crate's lineage: no unwrap/expect in
//! production code. Fallible paths use `?` and early return.
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod column;
mod coordinator;
mod error;
mod numeric;
mod options;
mod queue;
mod reconcile;
mod scan;
mod types;

pub use coordinator::{parse_bytes, parse_file};
pub use error::{CsvError, Result};
pub use options::{ParseFlags, ParseOptions, QuoteMode};
pub use types::{Column, ColumnKey, ColumnType, ParsedTable};
