//! Display helpers and amount parsing

use crate::shared::errors::EngineError;

pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Convert lamports to SOL for display. Never feed the result back into
/// amount arithmetic or comparisons.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

pub fn format_sol(lamports: u64) -> String {
    format!("{:.6} SOL", lamports_to_sol(lamports))
}

/// Signed variant for net-profit values.
pub fn format_sol_signed(lamports: i64) -> String {
    format!("{:.6} SOL", lamports as f64 / LAMPORTS_PER_SOL as f64)
}

/// ROI as a percent string, e.g. "0.42%". Display only.
pub fn format_roi(net_profit: i64, amount_in: u64) -> String {
    if amount_in == 0 {
        return "n/a".to_string();
    }
    format!("{:.2}%", (net_profit as f64 / amount_in as f64) * 100.0)
}

/// Generate a unique opportunity id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Parse an external numeric string into an exact smallest-unit amount.
///
/// External quote APIs hand back amounts as strings, and upstream producers
/// have been seen emitting scientific notation ("1e8") for large values. A
/// parser that stops at the first non-digit turns "1e8" into 1, which is a
/// money-losing bug. This one walks the decimal form with integer math only:
/// "100000000", "1e8", "2.5e9" and "150.0" all parse exactly; negative
/// values, fractional smallest units and garbage are rejected.
pub fn parse_lamports(input: &str) -> Result<u64, EngineError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(EngineError::InvalidAmount("empty amount string".to_string()));
    }
    if let Some(rest) = s.strip_prefix('-') {
        // "-0" variants still describe a non-positive amount; reject all.
        return Err(EngineError::InvalidAmount(format!("negative amount: -{}", rest)));
    }
    let s = s.strip_prefix('+').unwrap_or(s);

    // Split off an exponent, if any.
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(idx) => {
            let exp_str = &s[idx + 1..];
            let exp: i32 = exp_str
                .parse()
                .map_err(|_| EngineError::InvalidAmount(format!("bad exponent in {:?}", input)))?;
            (&s[..idx], exp)
        }
        None => (s, 0i32),
    };

    // Split mantissa into integer and fractional digits.
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(idx) => (&mantissa[..idx], &mantissa[idx + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(EngineError::InvalidAmount(format!("no digits in {:?}", input)));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EngineError::InvalidAmount(format!("non-numeric amount {:?}", input)));
    }

    // value = digits × 10^(exponent - frac_len), all in u128.
    let digits: String = format!("{}{}", int_part, frac_part);
    let trimmed = digits.trim_start_matches('0');
    let mut value: u128 = if trimmed.is_empty() {
        0
    } else {
        trimmed
            .parse()
            .map_err(|_| EngineError::InvalidAmount(format!("amount overflow: {:?}", input)))?
    };
    let scale = exponent
        .checked_sub(frac_part.len() as i32)
        .ok_or_else(|| EngineError::InvalidAmount(format!("exponent overflow in {:?}", input)))?;

    if scale >= 0 {
        for _ in 0..scale {
            value = value
                .checked_mul(10)
                .ok_or_else(|| EngineError::InvalidAmount(format!("amount overflow: {:?}", input)))?;
        }
    } else {
        for _ in 0..(-scale) {
            if value % 10 != 0 {
                return Err(EngineError::InvalidAmount(format!(
                    "fractional smallest-unit amount: {:?}",
                    input
                )));
            }
            value /= 10;
        }
    }

    u64::try_from(value)
        .map_err(|_| EngineError::InvalidAmount(format!("amount exceeds u64: {:?}", input)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers_exactly() {
        assert_eq!(parse_lamports("0").unwrap(), 0);
        assert_eq!(parse_lamports("250000000").unwrap(), 250_000_000);
        assert_eq!(parse_lamports("18446744073709551615").unwrap(), u64::MAX);
    }

    #[test]
    fn parses_scientific_notation_exactly() {
        // The historical defect: parseInt-style parsing yields 1 for "1e8".
        assert_eq!(parse_lamports("1e8").unwrap(), 100_000_000);
        assert_eq!(parse_lamports("1E8").unwrap(), 100_000_000);
        assert_eq!(parse_lamports("2.5e9").unwrap(), 2_500_000_000);
        assert_eq!(parse_lamports("1.851e9").unwrap(), 1_851_000_000);
        assert_eq!(parse_lamports("5e0").unwrap(), 5);
    }

    #[test]
    fn parses_whole_decimals() {
        assert_eq!(parse_lamports("150.0").unwrap(), 150);
        assert_eq!(parse_lamports("1500e-2").unwrap(), 15);
    }

    #[test]
    fn rejects_negative_amounts() {
        assert!(parse_lamports("-1").is_err());
        assert!(parse_lamports("-1e8").is_err());
        assert!(parse_lamports("-0").is_err());
    }

    #[test]
    fn rejects_fractional_smallest_units() {
        assert!(parse_lamports("1.5").is_err());
        assert!(parse_lamports("1e-3").is_err());
        assert!(parse_lamports("0.001e2").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_lamports("").is_err());
        assert!(parse_lamports("abc").is_err());
        assert!(parse_lamports("1e").is_err());
        assert!(parse_lamports("1.2.3").is_err());
        assert!(parse_lamports("1e999999").is_err());
        assert!(parse_lamports("99999999999999999999999").is_err());
    }

    #[test]
    fn display_helpers() {
        assert_eq!(format_sol(1_500_000_000), "1.500000 SOL");
        assert_eq!(format_roi(5_000_000, 1_000_000_000), "0.50%");
        assert_eq!(format_roi(0, 0), "n/a");
    }
}
