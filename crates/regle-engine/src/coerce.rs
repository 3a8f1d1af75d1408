//! Numeric, boolean, and date coercion primitives shared by mechanisms.

use chrono::NaiveDate;
use regle_types::NodeValue;

const DATE_FORMAT: &str = "%d/%m/%Y";

/// Whether a string has the `DD/MM/YYYY` shape used for date literals.
pub fn looks_like_date(text: &str) -> bool {
    let parts: Vec<&str> = text.split('/').collect();
    parts.len() == 3
        && parts[0].len() == 2
        && parts[1].len() == 2
        && parts[2].len() == 4
        && parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit()))
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

/// Coerce an operand for arithmetic when a boolean or null is involved:
/// null counts as 0, booleans as 0 or 1.
pub fn as_arith(value: &NodeValue) -> Option<f64> {
    match value {
        NodeValue::Number(n) => Some(*n),
        NodeValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        NodeValue::Null => Some(0.0),
        _ => None,
    }
}

/// Equality after coercing null to false. Values of different types are
/// never equal.
pub fn eq_coerced(a: &NodeValue, b: &NodeValue) -> bool {
    let coerce = |v: &NodeValue| match v {
        NodeValue::Null => NodeValue::Bool(false),
        other => other.clone(),
    };
    coerce(a) == coerce(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_shape() {
        assert!(looks_like_date("01/12/2020"));
        assert!(!looks_like_date("1/12/2020"));
        assert!(!looks_like_date("2020-12-01"));
        assert!(!looks_like_date("ab/cd/efgh"));
    }

    #[test]
    fn date_ordering() {
        let earlier = parse_date("28/02/2021").unwrap();
        let later = parse_date("01/03/2021").unwrap();
        assert!(earlier < later);
    }

    #[test]
    fn null_coerces_to_false_and_zero() {
        assert!(eq_coerced(&NodeValue::Null, &NodeValue::Bool(false)));
        assert_eq!(as_arith(&NodeValue::Null), Some(0.0));
        assert_eq!(as_arith(&NodeValue::Bool(true)), Some(1.0));
    }
}
