//! Token prices from the price feed, in several fiat currencies.

use {
    alloy::primitives::Address,
    bigdecimal::BigDecimal,
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FiatCurrency {
    #[default]
    Usd,
    Eur,
    Gbp,
    Jpy,
    Cny,
}

pub type TokenPrice = HashMap<FiatCurrency, f64>;

/// Snapshot of the price feed. Tokens the feed does not know are absent.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Prices(pub HashMap<Address, TokenPrice>);

impl Prices {
    pub fn new(prices: HashMap<Address, TokenPrice>) -> Self {
        Self(prices)
    }

    /// The price as an exact decimal. Feeds report floats; the decimal is the
    /// float's shortest representation so `0.1` stays `0.1`.
    pub fn price(&self, token: &Address, currency: FiatCurrency) -> Option<BigDecimal> {
        let price = *self.0.get(token)?.get(&currency)?;
        number::conversions::big_decimal_from_f64(price)
    }

    pub fn usd(&self, token: &Address) -> Option<BigDecimal> {
        self.price(token, FiatCurrency::Usd)
    }
}
