//! Live pool state read from the Balancer vault and pool contracts.

use {
    super::{PoolId, PoolType},
    crate::token_metadata::TokenInfo,
    alloy::primitives::{Address, U256},
    anyhow::Result,
    async_trait::async_trait,
    bigdecimal::BigDecimal,
    indexmap::IndexMap,
    number::serialization::{DecimalString, HexOrDecimalU256},
    serde::{Deserialize, Serialize},
    serde_with::serde_as,
    std::collections::HashMap,
};

/// Balances are in token units, already scaled by the token's decimals.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnchainTokenData {
    #[serde_as(as = "DecimalString")]
    pub balance: BigDecimal,
    #[serde_as(as = "Option<DecimalString>")]
    pub weight: Option<BigDecimal>,
    pub decimals: u8,
    #[serde_as(as = "DecimalString")]
    pub price_rate: BigDecimal,
}

/// One side of a linear pool. Unlike [`OnchainTokenData`] the balance is the
/// raw integer amount.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinearPoolToken {
    pub address: Address,
    pub index: usize,
    #[serde_as(as = "HexOrDecimalU256")]
    pub balance: U256,
    #[serde_as(as = "DecimalString")]
    pub price_rate: BigDecimal,
    pub decimals: u8,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnchainLinearPool {
    pub id: PoolId,
    pub main_token: LinearPoolToken,
    pub wrapped_token: LinearPoolToken,
    #[serde_as(as = "DecimalString")]
    pub total_supply: BigDecimal,
    pub unwrapped_token_address: Address,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OnchainPoolData {
    pub tokens: IndexMap<Address, OnchainTokenData>,
    #[serde_as(as = "DecimalString")]
    pub total_supply: BigDecimal,
    #[serde_as(as = "DecimalString")]
    pub swap_fee: BigDecimal,
    pub decimals: u8,
    /// Linear pools keyed by their address, in the order of the phantom
    /// pool's token list. Only set for phantom pools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_pools: Option<IndexMap<Address, OnchainLinearPool>>,
}

impl OnchainPoolData {
    pub fn balance_of(&self, token: &Address) -> Option<&BigDecimal> {
        self.tokens.get(token).map(|token| &token.balance)
    }
}

/// The contract layer: reads balances, weights and linear pool state of a
/// pool at the latest block.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait PoolDataFetching: Send + Sync {
    async fn pool_data(
        &self,
        id: PoolId,
        pool_type: PoolType,
        tokens: &HashMap<Address, TokenInfo>,
    ) -> Result<OnchainPoolData>;
}
