use regex::Regex;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use std::sync::LazyLock;

/// Sign, digits with separators, then an optional unit annotation.
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([+-]?)((?:\d[\d,.]*)|(?:\.\d+))\s*([A-Za-z%°"'µΩ][A-Za-z0-9%°"'/²³µΩ.\-]*)?$"#)
        .unwrap()
});

/// Parse a value string from a design report into a number.
///
/// Handles formats like:
/// - "113" -> 113
/// - "10,073" -> 10073 (thousands separator)
/// - "1.234,5" -> 1234.5 (European grouping)
/// - "45.5 in", "12000 kVA", "13%" -> unit annotation dropped
/// - "(12.5)" -> -12.5 (accounting negative)
/// - "–", "N/A", "abc", "12.5.3" -> None
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // Parenthesized negative: "(12.5)" or "(12.5 mm)"
    if let Some(inner) = s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        let inner = inner.trim();
        if inner.starts_with(['-', '+', '−', '(']) {
            return None;
        }
        return parse_number(inner).map(|v| -v);
    }

    let s = s.replace('−', "-");
    let caps = NUMBER_RE.captures(&s)?;
    let sign = caps.get(1).map_or("", |m| m.as_str());
    let digits = normalize_separators(caps.get(2)?.as_str())?;

    let decimal = Decimal::from_str(&format!("{sign}{digits}")).ok();
    let value = match decimal {
        Some(d) => d.to_f64()?,
        // Out of Decimal range: fall back to a plain float parse.
        None => format!("{sign}{digits}").parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

/// Remove grouping separators, leaving at most one '.' as decimal point.
fn normalize_separators(raw: &str) -> Option<String> {
    let last_comma = raw.rfind(',');
    let last_dot = raw.rfind('.');

    let cleaned = match (last_comma, last_dot) {
        // "1.234,5": dots group, the comma is the decimal mark
        (Some(c), Some(d)) if c > d => raw.replace('.', "").replace(',', "."),
        _ => raw.replace(',', ""),
    };

    if cleaned.matches('.').count() > 1 || !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.starts_with('.') {
        Some(format!("0{cleaned}"))
    } else {
        Some(cleaned.to_string())
    }
}

/// True for cells that mark a column as present but empty.
pub fn is_placeholder(s: &str) -> bool {
    matches!(
        s.trim(),
        "-" | "–" | "—" | "--" | "---" | "*" | "n/a" | "N/A" | "NA" | "n.a."
    )
}

/// Round half away from zero to `dp` decimal places.
pub fn round_dp(value: f64, dp: u32) -> Option<f64> {
    Decimal::from_f64(value)?
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn test_plain_integer() {
        assert!(close(parse_number("113"), 113.0));
    }

    #[test]
    fn test_decimal_with_whitespace() {
        assert!(close(parse_number("  0.030  "), 0.030));
    }

    #[test]
    fn test_thousands_separators() {
        assert!(close(parse_number("10,073"), 10073.0));
        assert!(close(parse_number("1,234,567.25"), 1_234_567.25));
    }

    #[test]
    fn test_european_grouping() {
        assert!(close(parse_number("1.234,5"), 1234.5));
    }

    #[test]
    fn test_trailing_units() {
        assert!(close(parse_number("45.5 in"), 45.5));
        assert!(close(parse_number("12000 kVA"), 12000.0));
        assert!(close(parse_number("13%"), 13.0));
        assert!(close(parse_number("1.55T"), 1.55));
        assert!(close(parse_number("8.2 W/in2"), 8.2));
    }

    #[test]
    fn test_parenthesized_negative() {
        assert!(close(parse_number("(12.5)"), -12.5));
        assert!(close(parse_number("( 1,200 mm )"), -1200.0));
    }

    #[test]
    fn test_signs() {
        assert!(close(parse_number("-3.5"), -3.5));
        assert!(close(parse_number("−3.5"), -3.5));
        assert!(close(parse_number("+0.1875"), 0.1875));
    }

    #[test]
    fn test_not_numbers() {
        for s in ["", "   ", "-", "–", "N/A", "abc", "12.5.3", "(T)", "in 45", ",", "((1))"] {
            assert_eq!(parse_number(s), None, "{s:?} should not parse");
        }
    }

    #[test]
    fn test_idempotent() {
        for s in ["10,073", "45.5 in", "(12.5)", "0.1875", "1.234,5"] {
            let first = parse_number(s).unwrap();
            let again = parse_number(&first.to_string()).unwrap();
            assert!((first - again).abs() < 1e-9, "{s}");
        }
    }

    #[test]
    fn test_grid_of_separator_unit_forms() {
        let cases = [
            ("1,000", 1000.0),
            ("1,000.", 1000.0),
            ("1000.50", 1000.5),
            (" 2,500 mm ", 2500.0),
            ("7 kV", 7.0),
        ];
        for (s, expected) in cases {
            assert!(close(parse_number(s), expected), "{s}");
        }
    }

    #[test]
    fn test_placeholders() {
        assert!(is_placeholder("–"));
        assert!(is_placeholder(" - "));
        assert!(is_placeholder("N/A"));
        assert!(!is_placeholder("0"));
    }

    #[test]
    fn test_round_dp() {
        assert_eq!(round_dp(3002.0 / 56.5, 2), Some(53.13));
        assert_eq!(round_dp(0.125, 2), Some(0.13));
        assert_eq!(round_dp(f64::NAN, 2), None);
    }
}
