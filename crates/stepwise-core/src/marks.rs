//! Parsing and formatting of marks typed in by graders.

/// Parse a mark as entered by a grader.
///
/// Accepts an optional sign, a decimal point or comma, and an exponent.
/// Returns `None` for anything else, including empty input.
pub fn parse_mark(input: &str) -> Option<f64> {
    let normalised = input.trim().replace(',', ".");
    let unsigned = normalised
        .strip_prefix(|c| c == '+' || c == '-')
        .unwrap_or(&normalised);

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(pos) => (&unsigned[..pos], Some(&unsigned[pos + 1..])),
        None => (unsigned, None),
    };

    if !is_decimal(mantissa) {
        return None;
    }
    if let Some(exp) = exponent {
        let digits = exp.strip_prefix(|c| c == '+' || c == '-').unwrap_or(exp);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    normalised.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `\d*\.?\d+`
fn is_decimal(s: &str) -> bool {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => ("", s),
    };
    !frac_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit())
}

/// Format with exactly `dp` decimal places.
pub fn format_float(value: f64, dp: usize) -> String {
    format!("{value:.dp$}")
}

/// Format with up to `dp` decimal places, dropping trailing zeros.
pub fn format_float_trimmed(value: f64, dp: usize) -> String {
    let formatted = format_float(value, dp);
    if !formatted.contains('.') {
        return formatted;
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_localised_marks() {
        assert_eq!(parse_mark("1"), Some(1.0));
        assert_eq!(parse_mark(" 0.5 "), Some(0.5));
        assert_eq!(parse_mark("1,5"), Some(1.5));
        assert_eq!(parse_mark("-.25"), Some(-0.25));
        assert_eq!(parse_mark("+2e1"), Some(20.0));
    }

    #[test]
    fn rejects_malformed_marks() {
        for bad in ["", "abc", "1.", "1.2.3", "--1", "1e", "inf", "NaN", "1 0", "0x10"] {
            assert_eq!(parse_mark(bad), None, "{bad:?} should not parse");
        }
    }

    #[test]
    fn formats_marks() {
        assert_eq!(format_float(1.0, 2), "1.00");
        assert_eq!(format_float_trimmed(1.5, 7), "1.5");
        assert_eq!(format_float_trimmed(2.0, 7), "2");
        assert_eq!(format_float_trimmed(10.0, 0), "10");
    }
}
