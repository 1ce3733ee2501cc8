//! Caller-facing configuration: quoting dialect, header handling, missing
//! value substitution, and per-column type overrides.

use std::collections::HashMap;

use crate::error::{CsvError, Result};
use crate::types::{ColumnKey, ColumnType};

/// Bitmask flags. Only bit 0 is currently defined; any other bit set is an
/// `InvalidArgument`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseFlags(u32);

impl ParseFlags {
    pub const EXCEL_QUOTES: ParseFlags = ParseFlags(1 << 0);
    const KNOWN_BITS: u32 = Self::EXCEL_QUOTES.0;

    pub fn empty() -> Self {
        ParseFlags(0)
    }

    pub fn contains(self, other: ParseFlags) -> bool {
        self.0 & other.0 == other.0
    }

    fn is_valid(self) -> bool {
        self.0 & !Self::KNOWN_BITS == 0
    }
}

impl std::ops::BitOr for ParseFlags {
    type Output = ParseFlags;
    fn bitor(self, rhs: ParseFlags) -> ParseFlags {
        ParseFlags(self.0 | rhs.0)
    }
}

/// The two quoting dialects this crate understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteMode {
    Permissive,
    Excel,
}

/// Builder for a [`crate::parse_bytes`] call. Mirrors the `DsvConfig`
/// builder shape used elsewhere in this codebase's lineage: a
/// `Default` plus chained `with_*` setters.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub separator: u8,
    pub nthreads: usize,
    pub flags: ParseFlags,
    pub n_header_rows: u8,
    pub missing_int_val: i64,
    pub missing_float_val: f64,
    overrides: HashMap<ColumnKey, ColumnType>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            separator: b',',
            nthreads: 1,
            flags: ParseFlags::empty(),
            n_header_rows: 0,
            missing_int_val: 0,
            missing_float_val: 0.0,
            overrides: HashMap::new(),
        }
    }
}

impl ParseOptions {
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_nthreads(mut self, nthreads: usize) -> Self {
        self.nthreads = nthreads;
        self
    }

    pub fn with_flags(mut self, flags: ParseFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.n_header_rows = u8::from(has_header);
        self
    }

    pub fn with_missing_int(mut self, val: i64) -> Self {
        self.missing_int_val = val;
        self
    }

    pub fn with_missing_float(mut self, val: f64) -> Self {
        self.missing_float_val = val;
        self
    }

    pub fn with_override(mut self, key: ColumnKey, ty: ColumnType) -> Self {
        self.overrides.insert(key, ty);
        self
    }

    pub fn quote_mode(&self) -> QuoteMode {
        if self.flags.contains(ParseFlags::EXCEL_QUOTES) {
            QuoteMode::Excel
        } else {
            QuoteMode::Permissive
        }
    }

    pub fn overrides(&self) -> &HashMap<ColumnKey, ColumnType> {
        &self.overrides
    }

    /// Validate the input constraints: separator distinct from the
    /// reserved bytes, `nthreads >= 1`, `n_header_rows in {0,1}`, no
    /// reserved flag bits set.
    pub fn validate(&self) -> Result<()> {
        const RESERVED: &[u8] = b"\"\n\r +-.eE0123456789";
        if RESERVED.contains(&self.separator) {
            return Err(CsvError::InvalidArgument(format!(
                "separator {:?} collides with the numeric/quoting grammar",
                self.separator as char
            )));
        }
        if self.nthreads == 0 {
            return Err(CsvError::InvalidArgument("nthreads must be >= 1".into()));
        }
        if self.n_header_rows > 1 {
            return Err(CsvError::InvalidArgument(
                "n_header_rows must be 0 or 1".into(),
            ));
        }
        if !self.flags.is_valid() {
            return Err(CsvError::InvalidArgument(
                "unknown bit set in flags".into(),
            ));
        }
        Ok(())
    }
}
