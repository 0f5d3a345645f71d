//! Tolerant numeric coercion for spreadsheet cell values.
//!
//! Sheet authors type "16mm", "16,5", "N/A" or leave cells dashed out; these
//! helpers normalize decimal commas, strip junk and map the usual
//! placeholder tokens to `None` instead of failing.

use std::str::FromStr;

use rust_decimal::Decimal;

/// Cell values treated as "no value".
pub const NULL_TOKENS: &[&str] = &["", "none", "null", "n/a", "na", "-", "—"];

fn is_null_token(s: &str) -> bool {
    NULL_TOKENS.contains(&s)
}

/// Coerces a raw cell value to a decimal, or `None` if nothing numeric
/// survives normalization.
pub fn to_decimal(raw: &str) -> Option<Decimal> {
    let s = raw.trim().to_lowercase();
    if is_null_token(&s) {
        return None;
    }
    // Normalize decimal comma, then keep only digits, dot and minus.
    let s = s.replace(',', ".");
    let s: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if s.is_empty() || s == "." || s == "-" {
        return None;
    }
    Decimal::from_str(&s).ok().map(|d| d.normalize())
}

/// Coerces a raw cell value to an integer, or `None`.
pub fn to_int(raw: &str) -> Option<i64> {
    let s = raw.trim().to_lowercase();
    if is_null_token(&s) {
        return None;
    }
    let s: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if s.is_empty() || s == "-" {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_decimal_plain() {
        assert_eq!(to_decimal("16"), Some(Decimal::from(16)));
        assert_eq!(to_decimal("16.5"), Decimal::from_str("16.5").ok());
    }

    #[test]
    fn test_to_decimal_decimal_comma() {
        assert_eq!(to_decimal("16,5"), Decimal::from_str("16.5").ok());
    }

    #[test]
    fn test_to_decimal_strips_junk() {
        assert_eq!(to_decimal(" 16 mm "), Some(Decimal::from(16)));
        assert_eq!(to_decimal("~4 up"), Some(Decimal::from(4)));
    }

    #[test]
    fn test_to_decimal_null_tokens() {
        for token in ["", "none", "NULL", "n/a", "NA", "-", "—", "  "] {
            assert_eq!(to_decimal(token), None, "token {token:?}");
        }
    }

    #[test]
    fn test_to_decimal_garbage() {
        assert_eq!(to_decimal("mm"), None);
        assert_eq!(to_decimal("..."), None);
        assert_eq!(to_decimal("1.2.3"), None);
    }

    #[test]
    fn test_to_decimal_normalizes_trailing_zeroes() {
        assert_eq!(to_decimal("16.50").map(|d| d.to_string()), Some("16.5".into()));
    }

    #[test]
    fn test_to_int() {
        assert_eq!(to_int("1200"), Some(1200));
        assert_eq!(to_int(" 1200 mm"), Some(1200));
        assert_eq!(to_int("n/a"), None);
        assert_eq!(to_int("abc"), None);
    }
}
