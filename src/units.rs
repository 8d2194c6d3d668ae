//! Exact decimal conversions between base units and human amounts
//!
//! Everything here is integer arithmetic on `U256`. Amounts with more
//! fractional digits than the token supports are rejected, never rounded.

use crate::{Error, Result};
use alloy::primitives::U256;

pub const ETHER_DECIMALS: u8 = 18;
pub const GWEI_DECIMALS: u8 = 9;

/// `10^decimals`, or `None` when it does not fit in 256 bits (decimals > 77)
fn scale(decimals: u8) -> Option<U256> {
    U256::from(10u64).checked_pow(U256::from(decimals))
}

/// Format a base-unit value with `decimals` places, trimming trailing zeros
pub fn format_units(value: U256, decimals: u8) -> String {
    if value.is_zero() {
        return "0".to_string();
    }

    let (whole, remainder) = match scale(decimals) {
        Some(divisor) => (value / divisor, value % divisor),
        None => (U256::ZERO, value),
    };

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let remainder_str = format!(
            "{:0>width$}",
            remainder.to_string(),
            width = decimals as usize
        );
        let trimmed = remainder_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, trimmed)
        }
    }
}

pub fn format_ether(wei: U256) -> String {
    format_units(wei, ETHER_DECIMALS)
}

pub fn format_gwei(wei: U256) -> String {
    format_units(wei, GWEI_DECIMALS)
}

/// Parse a human amount such as `"1.5"` into base units.
///
/// Accepts ASCII digits with at most one `.`. Extra fractional digits are
/// allowed only when they are zeros.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(Error::invalid("amount is empty"));
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(Error::invalid(format!("amount '{}' has no digits", amount)));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(Error::invalid(format!(
            "amount '{}' must be a plain decimal number",
            amount
        )));
    }

    let fraction = if fraction.len() > decimals as usize {
        let (kept, excess) = fraction.split_at(decimals as usize);
        if excess.bytes().any(|b| b != b'0') {
            return Err(Error::invalid(format!(
                "amount '{}' has more than {} fractional digits",
                amount, decimals
            )));
        }
        kept
    } else {
        fraction
    };

    let overflow = || Error::invalid(format!("amount '{}' is out of range", amount));

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(fraction);
    for _ in fraction.len()..decimals as usize {
        digits.push('0');
    }
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 10).map_err(|_| overflow())
}

pub fn parse_ether(amount: &str) -> Result<U256> {
    parse_units(amount, ETHER_DECIMALS)
}

/// Parse a wei amount given as a decimal integer string (fee overrides)
pub fn parse_wei(value: &str, field: &str) -> Result<U256> {
    let value = value.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid(format!(
            "{} must be a decimal integer in wei, got '{}'",
            field, value
        )));
    }
    U256::from_str_radix(value, 10)
        .map_err(|_| Error::invalid(format!("{} is out of range", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        let one_eth = U256::from(1_000_000_000_000_000_000u128);
        assert_eq!(format_units(one_eth, 18), "1");

        let one_point_five = U256::from(1_500_000_000_000_000_000u128);
        assert_eq!(format_units(one_point_five, 18), "1.5");

        let thousand_usdc = U256::from(1_000_000_000u64);
        assert_eq!(format_units(thousand_usdc, 6), "1000");

        assert_eq!(format_units(U256::ZERO, 18), "0");
        assert_eq!(format_units(U256::from(1u8), 18), "0.000000000000000001");
    }

    #[test]
    fn formats_large_balances_exactly() {
        // 123456789.123456789123456789 ETH
        let wei = U256::from_str_radix("123456789123456789123456789", 10).unwrap();
        assert_eq!(format_ether(wei), "123456789.123456789123456789");
    }

    #[test]
    fn formats_gwei_with_remainder() {
        assert_eq!(format_gwei(U256::from(1_500_000_001u64)), "1.500000001");
        assert_eq!(format_gwei(U256::from(30_000_000_000u64)), "30");
    }

    #[test]
    fn formats_beyond_u256_scale() {
        assert_eq!(format_units(U256::from(5u8), 100), format!("0.{}5", "0".repeat(99)));
    }

    #[test]
    fn parses_token_amounts_exactly() {
        assert_eq!(parse_units("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(parse_units("0.000001", 6).unwrap(), U256::from(1u64));
        assert_eq!(parse_units("42", 0).unwrap(), U256::from(42u64));
        assert_eq!(parse_units(".5", 1).unwrap(), U256::from(5u64));
        assert_eq!(parse_units("1.", 2).unwrap(), U256::from(100u64));
        assert_eq!(parse_units("0", 18).unwrap(), U256::ZERO);
    }

    #[test]
    fn accepts_trailing_zero_padding() {
        assert_eq!(parse_units("1.500000000", 6).unwrap(), U256::from(1_500_000u64));
    }

    #[test]
    fn rejects_excess_precision() {
        let err = parse_units("0.0000001", 6).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(parse_units("1.0000001", 6).is_err());
    }

    #[test]
    fn rejects_malformed_amounts() {
        for bad in ["", ".", "-1", "+1", "1e18", "1,000", "0x10", "1.2.3", " . "] {
            assert!(parse_units(bad, 18).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn rejects_overflow() {
        let huge = "9".repeat(80);
        assert!(parse_units(&huge, 0).is_err());
        assert!(parse_units("1", 78).is_err());
    }

    #[test]
    fn parses_ether_and_wei() {
        assert_eq!(
            parse_ether("0.01").unwrap(),
            U256::from(10_000_000_000_000_000u128)
        );
        assert_eq!(parse_wei("21000", "gasLimit").unwrap(), U256::from(21_000u64));
        assert!(parse_wei("1.5", "gasPrice").is_err());
    }
}
