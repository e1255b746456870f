//! Number rendering for CPTv10 cells and tags.

/// Significant figures used for every number written to a CPTv10 file.
pub const SIGNIFICANT_DIGITS: usize = 6;

/// Renders `value` the way C's `%g` does at [`SIGNIFICANT_DIGITS`] precision:
/// fixed notation for exponents in `-4..6`, scientific otherwise, trailing
/// zeros removed.
#[must_use]
pub fn format_significant(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let scientific = format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = usize::try_from(SIGNIFICANT_DIGITS as i32 - 1 - exponent).unwrap_or(0);
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Parses a numeric cell or coordinate; CPT writes NaN as `NaN`.
#[must_use]
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::{format_significant, parse_number};

    #[test]
    fn fixed_notation_trims_trailing_zeros() {
        assert_eq!(format_significant(1.0), "1");
        assert_eq!(format_significant(-999.0), "-999");
        assert_eq!(format_significant(0.5), "0.5");
        assert_eq!(format_significant(12.25), "12.25");
        assert_eq!(format_significant(0.333333333), "0.333333");
        assert_eq!(format_significant(123456.7), "123457");
    }

    #[test]
    fn large_and_tiny_values_switch_to_scientific() {
        assert_eq!(format_significant(1_000_000.0), "1e+06");
        assert_eq!(format_significant(1_234_567.0), "1.23457e+06");
        assert_eq!(format_significant(0.00001), "1e-05");
        assert_eq!(format_significant(0.0001), "0.0001");
    }

    #[test]
    fn rounding_can_promote_the_exponent() {
        assert_eq!(format_significant(999_999.5), "1e+06");
    }

    #[test]
    fn special_values() {
        assert_eq!(format_significant(f64::NAN), "NaN");
        assert_eq!(format_significant(0.0), "0");
        assert_eq!(format_significant(f64::INFINITY), "inf");
    }

    #[test]
    fn parses_cells() {
        assert_eq!(parse_number(" -999 "), Some(-999.0));
        assert!(parse_number("NaN").is_some_and(f64::is_nan));
        assert_eq!(parse_number("1990-01-01"), None);
    }
}
