//! Lenient parsing of the scalar values found in disclosure documents.

use chrono::NaiveDate;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y", "%d-%b-%Y", "%Y%m%d"];

/// Parse a numeric field, tolerating thousands separators, currency and
/// percent signs, and accounting-style parentheses for negatives.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '%') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let (negative, digits) = match cleaned
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };
    let value: f64 = digits.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Parse a date in any of the formats filers use. A value that starts with
/// an ISO date followed by a zone offset or time is accepted by its prefix.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    if s.len() > 10 && s.is_char_boundary(10) {
        return NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d").ok();
    }
    None
}

/// Entity identifiers are digit strings left-padded to ten characters.
pub fn normalize_entity_id(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return String::new();
    }
    format!("{digits:0>10}")
}

/// Boolean flags appear as `1`/`0` or `true`/`false`.
pub fn parse_flag(raw: &str) -> bool {
    let s = raw.trim();
    s == "1" || s.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_number("1,000"), Some(1000.0));
        assert_eq!(parse_number("$50.25"), Some(50.25));
        assert_eq!(parse_number("(1,250)"), Some(-1250.0));
        assert_eq!(parse_number(" 12.5% "), Some(12.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("n/a"), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn dates() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(parse_date("2024-03-15"), Some(d));
        assert_eq!(parse_date("03/15/2024"), Some(d));
        assert_eq!(parse_date("15-Mar-2024"), Some(d));
        assert_eq!(parse_date("2024-03-15-05:00"), Some(d));
        assert_eq!(parse_date("2024-03-15T10:30:00Z"), Some(d));
        assert_eq!(parse_date("soon"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn entity_ids() {
        assert_eq!(normalize_entity_id("107815"), "0000107815");
        assert_eq!(normalize_entity_id(" 0000107815 "), "0000107815");
        assert_eq!(normalize_entity_id("none"), "");
    }

    #[test]
    fn flags() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(parse_flag(" TRUE "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }
}
