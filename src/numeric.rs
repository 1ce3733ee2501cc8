//! Byte-level numeric recognizers: integer, double (with a
//! case-insensitive `nan` literal), and the demotion-to-STRING rule.
//!
//! Hand-rolled state machines rather than generated branching code: a
//! good optimizer turns this straight-line code into the same branch
//! tree a code generator would produce, without the generator.

use crate::types::ColumnType;

/// Outcome of running the numeric grammar over one field's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumField {
    Int64(i64),
    Double(f64),
    /// The field deviates from the numeric grammar; the column demotes to
    /// `STRING` and the raw bytes become the cell's value.
    NotNumeric,
}

impl NumField {
    pub fn column_type(self) -> ColumnType {
        match self {
            NumField::Int64(_) => ColumnType::Int64,
            NumField::Double(_) => ColumnType::Double,
            NumField::NotNumeric => ColumnType::String,
        }
    }
}

/// Precomputed `10^n` for the fast exact path: mantissas under 2^53 and
/// exponents within this table multiply/divide losslessly in `f64`.
const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

const MAX_SAFE_MANTISSA: u64 = 1u64 << 53;

/// Reconstruct `mantissa * 10^exp` as `f64`, saturating to `±0.0` / `±inf`
/// for exponents far outside the representable range (scenario (d)).
fn compose_double(sign: i64, mantissa: u64, exp: i64) -> f64 {
    let signf = sign as f64;
    if mantissa == 0 {
        return 0.0 * signf;
    }
    if exp > 308 {
        return f64::INFINITY * signf;
    }
    if exp < -324 {
        return 0.0 * signf;
    }
    if mantissa < MAX_SAFE_MANTISSA {
        if (0..=22).contains(&exp) {
            return signf * (mantissa as f64) * POW10[exp as usize];
        }
        if (-22..0).contains(&exp) {
            return signf * (mantissa as f64) / POW10[(-exp) as usize];
        }
    }
    // General path: less precise in the last bit for extreme magnitudes,
    // which is exactly the case the table above exists to avoid.
    signf * (mantissa as f64) * 10f64.powi(exp as i32)
}

/// Run the numeric grammar over one field's raw source bytes: optional
/// leading spaces, optional sign, digits with optional fraction, optional
/// exponent, optional trailing spaces. The caller has already located the
/// field's terminator; this function must consume the *entire* slice to
/// succeed.
pub fn parse_number_raw(field: &[u8]) -> NumField {
    let n = field.len();
    let mut i = 0usize;

    while i < n && field[i] == b' ' {
        i += 1;
    }

    let mut neg = false;
    if i < n && (field[i] == b'+' || field[i] == b'-') {
        neg = field[i] == b'-';
        i += 1;
    }

    if i + 3 <= n && field[i..i + 3].eq_ignore_ascii_case(b"nan") {
        let mut j = i + 3;
        while j < n && field[j] == b' ' {
            j += 1;
        }
        return if j == n {
            NumField::Double(f64::NAN)
        } else {
            NumField::NotNumeric
        };
    }

    // Int64-range bound depends on sign: -2^63 is one more than +2^63 - 1.
    let int_limit: u128 = if neg {
        9_223_372_036_854_775_808
    } else {
        9_223_372_036_854_775_807
    };

    let mut mantissa: u64 = 0;
    let mut mant_overflowed = false;
    let mut int_overflowed = false;
    let mut extra_digits: i64 = 0;
    let mut saw_int_digit = false;

    while i < n && field[i].is_ascii_digit() {
        saw_int_digit = true;
        let d = (field[i] - b'0') as u64;
        if !mant_overflowed {
            match mantissa.checked_mul(10).and_then(|m| m.checked_add(d)) {
                Some(m2) => {
                    if !int_overflowed && (m2 as u128) > int_limit {
                        int_overflowed = true;
                    }
                    mantissa = m2;
                }
                None => {
                    mant_overflowed = true;
                    int_overflowed = true;
                    extra_digits += 1;
                }
            }
        } else {
            extra_digits += 1;
        }
        i += 1;
    }

    let mut saw_dot = false;
    let mut frac_digits: i64 = 0;
    let mut saw_frac_digit = false;
    if i < n && field[i] == b'.' {
        saw_dot = true;
        i += 1;
        while i < n && field[i].is_ascii_digit() {
            saw_frac_digit = true;
            let d = (field[i] - b'0') as u64;
            if !mant_overflowed {
                match mantissa.checked_mul(10).and_then(|m| m.checked_add(d)) {
                    Some(m2) => {
                        mantissa = m2;
                        frac_digits += 1;
                    }
                    None => mant_overflowed = true,
                }
            }
            i += 1;
        }
    }

    let valid_mantissa_syntax = saw_int_digit || (saw_dot && saw_frac_digit);
    if !valid_mantissa_syntax {
        return NumField::NotNumeric;
    }

    let mut explicit_exp: i64 = 0;
    let mut has_exp = false;
    if i < n && (field[i] == b'e' || field[i] == b'E') {
        let save = i;
        let mut j = i + 1;
        let mut exp_neg = false;
        if j < n && (field[j] == b'+' || field[j] == b'-') {
            exp_neg = field[j] == b'-';
            j += 1;
        }
        let exp_digit_start = j;
        let mut exp_val: i64 = 0;
        while j < n && field[j].is_ascii_digit() {
            exp_val = exp_val.saturating_mul(10).saturating_add((field[j] - b'0') as i64);
            exp_val = exp_val.min(1_000_000);
            j += 1;
        }
        if j > exp_digit_start {
            has_exp = true;
            explicit_exp = if exp_neg { -exp_val } else { exp_val };
            i = j;
        } else {
            i = save; // bare 'e'/'E' with no digits is not an exponent
        }
    }

    while i < n && field[i] == b' ' {
        i += 1;
    }
    if i != n {
        return NumField::NotNumeric;
    }

    let is_double = saw_dot || has_exp || int_overflowed;
    if !is_double {
        let magnitude = mantissa as i128;
        let signed = if neg { -magnitude } else { magnitude };
        return NumField::Int64(signed as i64);
    }

    let decimal_exp = explicit_exp + extra_digits - frac_digits;
    let sign = if neg { -1 } else { 1 };
    NumField::Double(compose_double(sign, mantissa, decimal_exp))
}

/// The lattice contribution of one field: `None` means "no constraint"
/// (an empty, unquoted field never forces a column to promote — it
/// extracts as that column's missing value, whatever the final type is),
/// `Some(ty)` is the field's own classification.
pub fn field_lattice_contribution(field: &[u8], quoted: bool) -> Option<ColumnType> {
    if quoted {
        return Some(ColumnType::String);
    }
    if field.is_empty() {
        return None;
    }
    Some(parse_number_raw(field).column_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_integer() {
        assert_eq!(parse_number_raw(b"123"), NumField::Int64(123));
        assert_eq!(parse_number_raw(b"-123"), NumField::Int64(-123));
        assert_eq!(parse_number_raw(b"+123"), NumField::Int64(123));
    }

    #[test]
    fn plus_space_is_string() {
        assert_eq!(parse_number_raw(b"+ "), NumField::NotNumeric);
    }

    #[test]
    fn i64_min_is_representable() {
        assert_eq!(
            parse_number_raw(b"-9223372036854775808"),
            NumField::Int64(i64::MIN)
        );
    }

    #[test]
    fn overflow_demotes_to_double() {
        match parse_number_raw(b"99999999999999999999") {
            NumField::Double(d) => assert!((d - 1e20).abs() / 1e20 < 1e-9),
            other => panic!("expected Double, got {other:?}"),
        }
    }

    #[test]
    fn trailing_dot_is_double() {
        assert_eq!(parse_number_raw(b"123."), NumField::Double(123.0));
    }

    #[test]
    fn leading_dot_requires_digit() {
        assert_eq!(parse_number_raw(b"."), NumField::NotNumeric);
        assert_eq!(parse_number_raw(b".5"), NumField::Double(0.5));
    }

    #[test]
    fn nan_any_case() {
        assert!(matches!(parse_number_raw(b"nan"), NumField::Double(d) if d.is_nan()));
        assert!(matches!(parse_number_raw(b"NaN"), NumField::Double(d) if d.is_nan()));
        assert!(matches!(parse_number_raw(b"NAN"), NumField::Double(d) if d.is_nan()));
    }

    #[test]
    fn huge_exponent_saturates() {
        assert_eq!(
            parse_number_raw(b"1e5999999999999"),
            NumField::Double(f64::INFINITY)
        );
        assert_eq!(parse_number_raw(b"1e-5999999999999"), NumField::Double(0.0));
    }

    #[test]
    fn empty_field_has_no_lattice_contribution() {
        assert_eq!(field_lattice_contribution(b"", false), None);
        assert_eq!(
            field_lattice_contribution(b"", true),
            Some(ColumnType::String)
        );
    }

    #[test]
    fn exact_fraction_round_trips() {
        assert_eq!(parse_number_raw(b"456.234"), parse_number_raw(b"456.234"));
        match parse_number_raw(b"456.0") {
            NumField::Double(d) => assert_eq!(d, 456.0),
            other => panic!("expected Double, got {other:?}"),
        }
    }

    /// Reference classification for the exhaustive sweep below, built from
    /// the standard library's float/int parsers rather than this module's
    /// own state machine. Valid only over the bounded alphabet the sweep
    /// uses, where overflow-to-DOUBLE and multi-byte terminators never
    /// come up.
    fn reference_classify(s: &str) -> NumField {
        let trimmed = s.trim_matches(' ');
        if trimmed.is_empty() {
            return NumField::NotNumeric;
        }
        let is_double_shaped = trimmed.contains('.') || trimmed.contains('e') || trimmed.contains('E');
        if is_double_shaped {
            match trimmed.parse::<f64>() {
                Ok(d) => NumField::Double(d),
                Err(_) => NumField::NotNumeric,
            }
        } else {
            match trimmed.parse::<i64>() {
                Ok(v) => NumField::Int64(v),
                Err(_) => NumField::NotNumeric,
            }
        }
    }

    /// Exhaustively enumerates every string over `{1, ., +, -, e, space}`
    /// up to length 6 and checks this module's classification against the
    /// standard-library reference above — both the resulting type and,
    /// where numeric, the magnitude.
    #[test]
    fn numeric_grammar_matches_reference_exhaustively() {
        const ALPHABET: [u8; 6] = [b'1', b'.', b'+', b'-', b'e', b' '];
        let mut buf = Vec::with_capacity(6);
        fn recurse(buf: &mut Vec<u8>, depth: usize) {
            if depth > 0 {
                let s = std::str::from_utf8(buf).unwrap();
                let got = parse_number_raw(buf);
                let want = reference_classify(s);
                match (got, want) {
                    (NumField::Int64(a), NumField::Int64(b)) => assert_eq!(a, b, "mismatch on {s:?}"),
                    (NumField::Double(a), NumField::Double(b)) => {
                        assert!(
                            a == b || (a.is_nan() && b.is_nan()),
                            "mismatch on {s:?}: got {a}, want {b}"
                        );
                    }
                    (NumField::NotNumeric, NumField::NotNumeric) => {}
                    (g, w) => panic!("mismatch on {s:?}: got {g:?}, want {w:?}"),
                }
            }
            if depth == 6 {
                return;
            }
            for &byte in ALPHABET.iter() {
                buf.push(byte);
                recurse(buf, depth + 1);
                buf.pop();
            }
        }
        recurse(&mut buf, 0);
    }
}
