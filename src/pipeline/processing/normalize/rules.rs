use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{SEX_FEMALE, SEX_MALE};
use crate::domain::CellValue;

/// Rewrites one cell; rules never fail, non-conforming values become null
pub type CellRule = fn(&CellValue) -> CellValue;

static FEMALE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)female").expect("static pattern compiles"));

/// Text passes through untouched (empty strings included); anything else is null
pub fn coerce_string(value: &CellValue) -> CellValue {
    match value {
        CellValue::Text(_) => value.clone(),
        _ => CellValue::Null,
    }
}

/// Integers pass through; floats truncate toward zero. Booleans count as 0/1.
/// Text, dates, non-finite floats and floats outside the i64 range become null.
pub fn coerce_integer(value: &CellValue) -> CellValue {
    match value {
        CellValue::Int(i) => CellValue::Int(*i),
        CellValue::Bool(b) => CellValue::Int(i64::from(*b)),
        CellValue::Float(f) => {
            let truncated = f.trunc();
            // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
            if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                CellValue::Int(truncated as i64)
            } else {
                CellValue::Null
            }
        }
        _ => CellValue::Null,
    }
}

/// Null stays null. A case-insensitive "female" anywhere in the value yields
/// "female"; every other value, including unrecognised text, collapses to "male".
// NOTE: unmatched values probably ought to be null; kept as "male" until the data
// owners confirm the intended mapping.
pub fn normalize_sex(value: &CellValue) -> CellValue {
    match value {
        CellValue::Null => CellValue::Null,
        other => {
            if FEMALE_PATTERN.is_match(&other.to_string()) {
                CellValue::text(SEX_FEMALE)
            } else {
                CellValue::text(SEX_MALE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_keep_text_and_drop_everything_else() {
        assert_eq!(coerce_string(&"Asha".into()), CellValue::text("Asha"));
        assert_eq!(coerce_string(&"".into()), CellValue::text(""));
        assert_eq!(coerce_string(&CellValue::Int(4)), CellValue::Null);
        assert_eq!(coerce_string(&CellValue::Float(4.5)), CellValue::Null);
        assert_eq!(coerce_string(&CellValue::Bool(false)), CellValue::Null);
        assert_eq!(coerce_string(&CellValue::DateTime("2024-02-01".into())), CellValue::Null);
        assert_eq!(coerce_string(&CellValue::Null), CellValue::Null);
    }

    #[test]
    fn integers_truncate_toward_zero() {
        assert_eq!(coerce_integer(&CellValue::Float(3.7)), CellValue::Int(3));
        assert_eq!(coerce_integer(&CellValue::Float(-3.7)), CellValue::Int(-3));
        assert_eq!(coerce_integer(&CellValue::Float(42.0)), CellValue::Int(42));
        assert_eq!(coerce_integer(&CellValue::Int(560001)), CellValue::Int(560001));
    }

    #[test]
    fn integers_reject_non_numeric_and_unrepresentable() {
        assert_eq!(coerce_integer(&"42".into()), CellValue::Null);
        assert_eq!(coerce_integer(&CellValue::DateTime("2024-02-01".into())), CellValue::Null);
        assert_eq!(coerce_integer(&CellValue::Float(f64::NAN)), CellValue::Null);
        assert_eq!(coerce_integer(&CellValue::Float(f64::INFINITY)), CellValue::Null);
        assert_eq!(coerce_integer(&CellValue::Float(1e300)), CellValue::Null);
        assert_eq!(coerce_integer(&CellValue::Null), CellValue::Null);
    }

    #[test]
    fn booleans_count_as_integers() {
        assert_eq!(coerce_integer(&CellValue::Bool(true)), CellValue::Int(1));
        assert_eq!(coerce_integer(&CellValue::Bool(false)), CellValue::Int(0));
    }

    #[test]
    fn female_is_detected_case_insensitively() {
        for input in ["Female", "FEMALE", "female123", "  feMale "] {
            assert_eq!(normalize_sex(&input.into()), CellValue::text("female"), "{input}");
        }
    }

    #[test]
    fn everything_else_collapses_to_male() {
        for input in ["Male", "M", "unknown", ""] {
            assert_eq!(normalize_sex(&input.into()), CellValue::text("male"), "{input:?}");
        }
        assert_eq!(normalize_sex(&CellValue::Int(2)), CellValue::text("male"));
    }

    #[test]
    fn null_sex_stays_null() {
        assert_eq!(normalize_sex(&CellValue::Null), CellValue::Null);
    }
}
