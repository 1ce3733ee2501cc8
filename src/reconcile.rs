//! Boundary reconciler: propagates the "ends in quote" fact of chunk `i`
//! into chunk `i+1`'s starting hypothesis, rescanning on mismatch, then
//! plans how each chunk's unresolved leading/trailing bytes stitch back
//! into real records.
//!
//! A record can span more than two chunks (a quoted field wide enough to
//! swallow one or more whole chunks without ever finding its closing
//! quote). [`plan_boundaries`] folds the chain of swallowed chunks
//! together with the genuine leading/trailing fragments on either end into
//! a single gap buffer, so reconciliation isn't limited to adjacent-pair
//! gluing.

use crate::scan::{scan_standalone_extract, scan_standalone_infer, ExtractResult, InferResult};

/// Walk chunks left to right, correcting each chunk's `starts_in_quote`
/// hypothesis from its predecessor's observed `ends_in_quote` and
/// rescanning through `rescan` whenever the hypothesis was wrong. Chunk 0
/// is never rescanned: it always starts outside quotes.
pub fn propagate_hypotheses<F>(
    starts_in_quote: &mut [bool],
    ends_in_quote: &mut [bool],
    mut rescan: F,
) where
    F: FnMut(usize, bool) -> bool,
{
    for i in 0..starts_in_quote.len().saturating_sub(1) {
        if ends_in_quote[i] != starts_in_quote[i + 1] {
            starts_in_quote[i + 1] = ends_in_quote[i];
            ends_in_quote[i + 1] = rescan(i + 1, ends_in_quote[i]);
        }
    }
}

/// One piece of the reconciled record stream, in file order.
pub enum BoundarySegment {
    /// Use chunk `idx`'s own fully-resolved interior records as-is.
    Chunk(usize),
    /// Bytes straddling one or more chunk boundaries, to be scanned as a
    /// standalone record (or handful of records, for a trailing fragment
    /// at end of file).
    Gap(Vec<u8>),
}

/// Fold each chunk's leading/trailing partials (and any chunks swallowed
/// whole by a still-unresolved leading record) into an ordered list of
/// segments. A chunk only contributes a [`BoundarySegment::Chunk`] when it
/// resolved at least one real record boundary; a chunk swallowed whole
/// contributes nothing but its bytes to the surrounding gap.
pub fn plan_boundaries(leading: &[Vec<u8>], trailing: &[Vec<u8>], swallowed_whole: &[bool]) -> Vec<BoundarySegment> {
    let mut gap_acc: Vec<u8> = Vec::new();
    let mut segments = Vec::new();
    for i in 0..leading.len() {
        if i > 0 {
            gap_acc.extend_from_slice(&leading[i]);
        }
        if !swallowed_whole[i] {
            if !gap_acc.is_empty() {
                segments.push(BoundarySegment::Gap(std::mem::take(&mut gap_acc)));
            }
            segments.push(BoundarySegment::Chunk(i));
            gap_acc.extend_from_slice(&trailing[i]);
        }
    }
    if !gap_acc.is_empty() {
        segments.push(BoundarySegment::Gap(gap_acc));
    }
    segments
}

/// Run type inference over every gap buffer a [`plan_boundaries`] call
/// produced, in order.
pub fn infer_gaps(segments: &[BoundarySegment], sep: u8, quote_mode: crate::options::QuoteMode) -> Vec<InferResult> {
    segments
        .iter()
        .filter_map(|seg| match seg {
            BoundarySegment::Gap(buf) => Some(scan_standalone_infer(buf, sep, quote_mode)),
            BoundarySegment::Chunk(_) => None,
        })
        .collect()
}

/// Extraction counterpart of [`infer_gaps`], given the globally reconciled
/// final column types.
pub fn extract_gaps(
    segments: &[BoundarySegment],
    sep: u8,
    quote_mode: crate::options::QuoteMode,
    final_types: &[crate::types::ColumnType],
    missing_int: i64,
    missing_float: f64,
) -> crate::error::Result<Vec<ExtractResult>> {
    segments
        .iter()
        .filter_map(|seg| match seg {
            BoundarySegment::Gap(buf) => Some(scan_standalone_extract(
                buf,
                sep,
                quote_mode,
                final_types,
                missing_int,
                missing_float,
            )),
            BoundarySegment::Chunk(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::QuoteMode;
    use crate::scan::scan_chunk_infer;
    use crate::types::ColumnType;

    #[test]
    fn hypothesis_propagates_and_triggers_rescan() {
        let mut starts = vec![false, false, false];
        let mut ends = vec![true, false, false];
        let mut rescan_calls = Vec::new();
        propagate_hypotheses(&mut starts, &mut ends, |idx, hyp| {
            rescan_calls.push((idx, hyp));
            false
        });
        assert_eq!(starts, vec![false, true, false]);
        assert_eq!(rescan_calls, vec![(1, true)]);
    }

    #[test]
    fn plan_boundaries_empty_gaps_produce_no_segments() {
        // Two chunks that each resolve cleanly at their own edges: no gap.
        let leading = vec![Vec::new(), Vec::new()];
        let trailing = vec![Vec::new(), Vec::new()];
        let swallowed = vec![false, false];
        let segments = plan_boundaries(&leading, &trailing, &swallowed);
        assert_eq!(segments.len(), 2);
        assert!(matches!(segments[0], BoundarySegment::Chunk(0)));
        assert!(matches!(segments[1], BoundarySegment::Chunk(1)));
    }

    #[test]
    fn plan_boundaries_stitches_two_chunk_seam() {
        // Full buffer "1,2,3,4\n5,6\n" split contiguously at offset 3.
        let prev = scan_chunk_infer(b"1,2", b',', QuoteMode::Permissive, false, true, false);
        let next = scan_chunk_infer(b",3,4\n5,6\n", b',', QuoteMode::Permissive, false, false, false);
        assert_eq!(prev.trailing_partial, b"1,2");
        assert_eq!(next.leading_partial, b",3,4");
        assert!(!prev.swallowed_whole);
        assert!(!next.swallowed_whole);

        let leading = vec![prev.leading_partial.clone(), next.leading_partial.clone()];
        let trailing = vec![prev.trailing_partial.clone(), next.trailing_partial.clone()];
        let swallowed = vec![prev.swallowed_whole, next.swallowed_whole];
        let segments = plan_boundaries(&leading, &trailing, &swallowed);

        // Chunk 0, gap("1,2" + ",3,4" = "1,2,3,4"), Chunk 1.
        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[0], BoundarySegment::Chunk(0)));
        match &segments[1] {
            BoundarySegment::Gap(buf) => assert_eq!(buf, b"1,2,3,4"),
            BoundarySegment::Chunk(_) => panic!("expected a gap"),
        }
        assert!(matches!(segments[2], BoundarySegment::Chunk(1)));

        let gap_results = infer_gaps(&segments, b',', QuoteMode::Permissive);
        assert_eq!(gap_results.len(), 1);
        assert_eq!(gap_results[0].row_count, 1);
        assert_eq!(
            gap_results[0].column_types,
            vec![ColumnType::Int64, ColumnType::Int64, ColumnType::Int64, ColumnType::Int64]
        );
    }

    #[test]
    fn plan_boundaries_folds_a_chunk_swallowed_whole() {
        // A quoted field spans three chunks: chunk 0 opens it, chunk 1 is
        // consumed entirely by it, chunk 2 closes it.
        let leading = vec![Vec::new(), b"\"abc".to_vec(), b"def\"\n".to_vec()];
        let trailing = vec![b"\"abc".to_vec(), Vec::new(), Vec::new()];
        let swallowed = vec![false, true, false];
        let segments = plan_boundaries(&leading, &trailing, &swallowed);

        assert_eq!(segments.len(), 3);
        assert!(matches!(segments[0], BoundarySegment::Chunk(0)));
        match &segments[1] {
            BoundarySegment::Gap(buf) => assert_eq!(buf, b"\"abcabcdef\"\n"),
            BoundarySegment::Chunk(_) => panic!("expected a gap"),
        }
        assert!(matches!(segments[2], BoundarySegment::Chunk(2)));
    }

    #[test]
    fn plan_boundaries_final_tail_with_no_successor_is_a_gap() {
        let leading = vec![Vec::new()];
        let trailing = vec![b"9,9".to_vec()];
        let swallowed = vec![false];
        let segments = plan_boundaries(&leading, &trailing, &swallowed);
        assert_eq!(segments.len(), 2);
        assert!(matches!(segments[0], BoundarySegment::Chunk(0)));
        match &segments[1] {
            BoundarySegment::Gap(buf) => assert_eq!(buf, b"9,9"),
            BoundarySegment::Chunk(_) => panic!("expected a gap"),
        }
    }
}
