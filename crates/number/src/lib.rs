//! Decimal arithmetic used for every financial figure of a pool. Values are
//! kept as [`BigDecimal`](bigdecimal::BigDecimal) from the moment they leave
//! the chain or the subgraph so no binary floating point rounding leaks into
//! liquidity sums.

pub mod conversions;
pub mod serialization;
pub mod units;

pub use bigdecimal::BigDecimal;
