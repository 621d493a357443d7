use {
    alloy::primitives::U256,
    anyhow::{Context, Result, ensure},
    bigdecimal::{
        BigDecimal,
        Zero,
        num_bigint::{BigInt, Sign},
    },
    std::str::FromStr,
};

pub fn u256_to_big_int(input: &U256) -> BigInt {
    BigInt::from_bytes_be(Sign::Plus, &input.to_be_bytes::<32>())
}

/// Floats have a binary representation which leaks into a `BigDecimal` built
/// directly from their bits (`0.1` becomes
/// `0.1000000000000000055511151231257827...`).
///
/// This goes through the shortest decimal string that round-trips to the same
/// float instead, which is what price feeds actually meant. Returns `None` for
/// NaN and infinities.
pub fn big_decimal_from_f64(value: f64) -> Option<BigDecimal> {
    if !value.is_finite() {
        return None;
    }
    BigDecimal::from_str(&value.to_string()).ok()
}

pub fn big_decimal_from_str(value: &str) -> Result<BigDecimal> {
    BigDecimal::from_str(value.trim()).with_context(|| format!("invalid decimal {value:?}"))
}

/// Division that reports a zero divisor instead of panicking.
pub fn checked_div(numerator: &BigDecimal, denominator: &BigDecimal) -> Result<BigDecimal> {
    ensure!(!denominator.is_zero(), "division by zero");
    Ok(numerator / denominator)
}
