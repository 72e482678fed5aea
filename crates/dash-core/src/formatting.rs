/// Number of characters of post content shown in a forum card preview.
pub const PREVIEW_CHARS: usize = 100;

/// Format a number with thousands separators and a fixed number of decimal
/// places.
///
/// # Examples
///
/// ```
/// use dash_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };

    // No sign on values that round to zero ("-0.00").
    let is_zero = formatted.chars().all(|c| c == '0' || c == '.');

    let mut out = String::with_capacity(formatted.len() + 4);
    if value < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Format an amount as money with two decimals, sign before the symbol.
///
/// ```
/// use dash_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56), "$1,234.56");
/// assert_eq!(format_currency(-9.99), "-$9.99");
/// ```
pub fn format_currency(amount: f64) -> String {
    let body = format_number(amount.abs(), 2);
    if amount < 0.0 && body != "0.00" {
        format!("-${}", body)
    } else {
        format!("${}", body)
    }
}

/// `(part / whole) * 100` rounded to `decimal_places`; `0.0` when `whole`
/// is zero.
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    let raw = (part / whole) * 100.0;
    let factor = 10_f64.powi(decimal_places as i32);
    (raw * factor).round() / factor
}

/// First [`PREVIEW_CHARS`] characters of `content`, with `"..."` appended
/// when anything was cut.
pub fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let cut: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        content.to_string()
    }
}

/// Split a comma-separated tag string, trimming each tag and dropping
/// empties.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_grouping() {
        assert_eq!(format_number(5.0, 0), "5");
        assert_eq!(format_number(999.0, 0), "999");
        assert_eq!(format_number(1_000.0, 0), "1,000");
        assert_eq!(format_number(1_234_567.0, 0), "1,234,567");
    }

    #[test]
    fn test_format_number_decimals() {
        assert_eq!(format_number(123.456, 2), "123.46");
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
    }

    #[test]
    fn test_format_number_negative_and_negative_zero() {
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
        assert_eq!(format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(1_234.56), "$1,234.56");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(-9.99), "-$9.99");
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
    }

    #[test]
    fn test_percentage() {
        assert!((percentage(50.0, 200.0, 1) - 25.0).abs() < 1e-9);
        assert_eq!(percentage(10.0, 0.0, 2), 0.0);
        assert!((percentage(1.0, 3.0, 2) - 33.33).abs() < 1e-9);
    }

    #[test]
    fn test_preview_short_content_unchanged() {
        assert_eq!(preview("short post"), "short post");
        let exact = "x".repeat(PREVIEW_CHARS);
        assert_eq!(preview(&exact), exact);
    }

    #[test]
    fn test_preview_truncates_long_content() {
        let long = "y".repeat(PREVIEW_CHARS + 20);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        let long = "é".repeat(PREVIEW_CHARS + 1);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            parse_tags(" savings, budget ,, taxes,"),
            vec!["savings", "budget", "taxes"]
        );
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ,").is_empty());
    }
}
