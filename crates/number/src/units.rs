use {
    crate::conversions::u256_to_big_int,
    alloy::primitives::U256,
    bigdecimal::BigDecimal,
};

/// Converts a raw token amount into token units, e.g. `1_500_000` with 6
/// decimals becomes `1.5`.
pub fn format_units(amount: U256, decimals: u8) -> BigDecimal {
    BigDecimal::new(u256_to_big_int(&amount), i64::from(decimals))
}
