//! Balancer V2 pool records as reported by the pools subgraph and the
//! decorated form handed out to consumers.

pub mod decoration;
pub mod graph_api;
pub mod linear;
pub mod liquidity;
pub mod onchain;

use {
    self::onchain::OnchainPoolData,
    alloy::primitives::{Address, B256, hex},
    anyhow::{Context, Result},
    bigdecimal::BigDecimal,
    itertools::Itertools,
    number::serialization::DecimalString,
    serde::{Deserialize, Serialize},
    serde_with::serde_as,
    std::{
        collections::BTreeMap,
        fmt::{self, Display, Formatter},
        str::FromStr,
    },
};

/// A Balancer V2 pool id. The first 20 bytes are the address of the pool.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct PoolId(pub B256);

impl PoolId {
    /// The vault scoped address of the pool, which is also the address of its
    /// pool share token.
    pub fn address(&self) -> Address {
        Address::from_slice(&self.0[..20])
    }
}

impl FromStr for PoolId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        B256::from_str(s.trim())
            .map(Self)
            .with_context(|| format!("invalid pool id {s:?}"))
    }
}

impl Display for PoolId {
    /// Lower case, `0x` prefixed. This is the form the subgraph indexes ids
    /// by.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_prefixed(self.0))
    }
}

pub fn address_for_pool(id: &PoolId) -> Address {
    id.address()
}

/// Pool kinds as named by the subgraph.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
pub enum PoolType {
    Weighted,
    /// Managed pools.
    Investment,
    Stable,
    MetaStable,
    StablePhantom,
    LiquidityBootstrapping,
    Element,
    AaveLinear,
    Linear,
    #[serde(rename = "ERC4626Linear")]
    #[strum(serialize = "ERC4626Linear")]
    Erc4626Linear,
    #[serde(other)]
    Unknown,
}

impl PoolType {
    pub fn is_stable_like(&self) -> bool {
        matches!(self, Self::Stable | Self::MetaStable | Self::StablePhantom)
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Investment)
    }

    pub fn is_stable_phantom(&self) -> bool {
        matches!(self, Self::StablePhantom)
    }
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolToken {
    pub address: Address,
    #[serde(default)]
    pub symbol: String,
    pub decimals: u8,
    #[serde_as(as = "DecimalString")]
    pub balance: BigDecimal,
    #[serde_as(as = "Option<DecimalString>")]
    pub weight: Option<BigDecimal>,
    #[serde_as(as = "Option<DecimalString>")]
    pub price_rate: Option<BigDecimal>,
}

/// Pool data from the Balancer V2 subgraph.
///
/// `main_tokens`, `wrapped_tokens` and `linear_pool_tokens_map` are never
/// returned by the subgraph. They are filled in for phantom pools once their
/// linear pools are resolved and are index aligned with `tokens_list`.
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolRecord {
    pub id: PoolId,
    pub address: Address,
    pub pool_type: PoolType,
    #[serde(default)]
    pub owner: Option<Address>,
    #[serde(default)]
    pub factory: Option<Address>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde_as(as = "DecimalString")]
    pub swap_fee: BigDecimal,
    pub tokens_list: Vec<Address>,
    pub tokens: Vec<PoolToken>,
    #[serde_as(as = "DecimalString")]
    pub total_shares: BigDecimal,
    #[serde_as(as = "DecimalString")]
    pub total_liquidity: BigDecimal,
    #[serde_as(as = "DecimalString")]
    pub total_swap_volume: BigDecimal,
    #[serde_as(as = "DecimalString")]
    pub total_swap_fee: BigDecimal,
    #[serde(default)]
    pub create_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_tokens: Option<Vec<Option<Address>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_tokens: Option<Vec<Option<Address>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_pool_tokens_map: Option<BTreeMap<Address, PoolToken>>,
}

impl PoolRecord {
    /// Removes the pool's own share token from `tokens_list`. Phantom pools
    /// pre-mint their share token and hold it as one of their tokens.
    ///
    /// Removing it a second time is a no-op.
    pub fn strip_pre_minted_token(&mut self) {
        let pool_address = address_for_pool(&self.id);
        self.tokens_list.retain(|token| *token != pool_address);
    }

    /// Tokens wrapped by the pool's share token: the main and wrapped tokens
    /// of the linear pools for phantom pools, the plain token list otherwise.
    pub fn lp_tokens(&self) -> Vec<Address> {
        if !self.pool_type.is_stable_phantom() {
            return self.tokens_list.clone();
        }
        self.main_tokens
            .iter()
            .chain(self.wrapped_tokens.iter())
            .flatten()
            .flatten()
            .copied()
            .collect()
    }

    /// Every token whose metadata has to be known before on-chain data of the
    /// pool can be interpreted: the token list, the LP tokens and the pool
    /// share token itself.
    pub fn referenced_tokens(&self) -> Vec<Address> {
        self.tokens_list
            .iter()
            .copied()
            .chain(self.lp_tokens())
            .chain([address_for_pool(&self.id)])
            .unique()
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub enum Period {
    #[default]
    #[serde(rename = "24h")]
    Day,
}

#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Apr {
    #[serde_as(as = "DecimalString")]
    pub pool: BigDecimal,
    /// Staking rewards are distributed through gauges but their emissions are
    /// not known to this service.
    #[serde_as(as = "Option<DecimalString>")]
    pub staking: Option<BigDecimal>,
    #[serde_as(as = "DecimalString")]
    pub total: BigDecimal,
}

/// Metrics over a trailing time window.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolMetrics {
    pub period: Period,
    #[serde_as(as = "DecimalString")]
    pub volume: BigDecimal,
    #[serde_as(as = "DecimalString")]
    pub fees: BigDecimal,
    pub apr: Apr,
    /// The pool did not exist at the start of the window, so `volume` and
    /// `fees` cover its whole lifetime.
    pub is_new_pool: bool,
}

/// A pool merged with its on-chain state, prices and gauges.
///
/// `pool.total_liquidity` holds the liquidity computed during decoration and
/// not the value reported by the subgraph.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DecoratedPoolRecord {
    #[serde(flatten)]
    pub pool: PoolRecord,
    pub dynamic: PoolMetrics,
    pub gauge_address: Option<Address>,
    pub unwrapped_tokens: Option<Vec<Address>>,
    pub onchain: OnchainPoolData,
}

impl DecoratedPoolRecord {
    pub fn total_liquidity(&self) -> &BigDecimal {
        &self.pool.total_liquidity
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use {super::*, serde_json::json};

    pub const POOL_ID: &str = "0x06df3b2bbb68adc8b0e302443692037ed9f91b42000000000000000000000063";

    pub fn pool_id() -> PoolId {
        POOL_ID.parse().unwrap()
    }

    /// A subgraph pool with two tokens and the given type.
    pub fn pool(pool_type: PoolType, tokens: &[Address]) -> PoolRecord {
        PoolRecord {
            id: pool_id(),
            address: pool_id().address(),
            pool_type,
            owner: None,
            factory: None,
            name: "pool".to_string(),
            symbol: "BPT".to_string(),
            swap_fee: "0.0004".parse().unwrap(),
            tokens_list: tokens.to_vec(),
            tokens: tokens
                .iter()
                .map(|address| PoolToken {
                    address: *address,
                    symbol: String::new(),
                    decimals: 18,
                    balance: 100.into(),
                    weight: None,
                    price_rate: Some(1.into()),
                })
                .collect(),
            total_shares: 200.into(),
            total_liquidity: 200.into(),
            total_swap_volume: 1000.into(),
            total_swap_fee: 1.into(),
            create_time: 1_640_000_000,
            main_index: None,
            wrapped_index: None,
            main_tokens: None,
            wrapped_tokens: None,
            linear_pool_tokens_map: None,
        }
    }

    #[test]
    fn pool_id_parsing_is_case_insensitive() {
        let lower = pool_id();
        let upper: PoolId = POOL_ID.to_uppercase().replacen("0X", "0x", 1).parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_string(), POOL_ID);
        assert_eq!(
            address_for_pool(&lower),
            "0x06Df3b2bbB68adc8B0e302443692037ED9f91b42"
                .parse::<Address>()
                .unwrap()
        );
        assert!("0x1234".parse::<PoolId>().is_err());
    }

    #[test]
    fn pool_type_classification() {
        for stable in [PoolType::Stable, PoolType::MetaStable, PoolType::StablePhantom] {
            assert!(stable.is_stable_like());
        }
        assert!(!PoolType::Weighted.is_stable_like());
        assert!(PoolType::Investment.is_managed());
        assert!(!PoolType::Stable.is_managed());
        assert!(PoolType::StablePhantom.is_stable_phantom());
        assert!(!PoolType::MetaStable.is_stable_phantom());
        assert_eq!(
            "ERC4626Linear".parse::<PoolType>().unwrap(),
            PoolType::Erc4626Linear
        );
    }

    #[test]
    fn strip_pre_minted_token_is_idempotent() {
        let linear = [Address::repeat_byte(1), Address::repeat_byte(2)];
        let mut pool = pool(
            PoolType::StablePhantom,
            &[pool_id().address(), linear[0], linear[1]],
        );

        pool.strip_pre_minted_token();
        assert_eq!(pool.tokens_list, linear);
        let once = pool.tokens_list.clone();
        pool.strip_pre_minted_token();
        assert_eq!(pool.tokens_list, once);
    }

    #[test]
    fn lp_tokens_of_phantom_pools_are_main_and_wrapped_tokens() {
        let mut phantom = pool(
            PoolType::StablePhantom,
            &[Address::repeat_byte(1), Address::repeat_byte(2)],
        );
        phantom.main_tokens = Some(vec![Some(Address::repeat_byte(3)), None]);
        phantom.wrapped_tokens = Some(vec![Some(Address::repeat_byte(4)), None]);
        assert_eq!(
            phantom.lp_tokens(),
            [Address::repeat_byte(3), Address::repeat_byte(4)]
        );

        let weighted = pool(PoolType::Weighted, &[Address::repeat_byte(5)]);
        assert_eq!(weighted.lp_tokens(), [Address::repeat_byte(5)]);
        assert_eq!(
            weighted.referenced_tokens(),
            [Address::repeat_byte(5), pool_id().address()]
        );
    }

    #[test]
    fn decode_subgraph_pool() {
        let pool: PoolRecord = serde_json::from_value(json!({
            "id": POOL_ID,
            "address": "0x06df3b2bbb68adc8b0e302443692037ed9f91b42",
            "poolType": "StablePhantom",
            "owner": "0x0000000000000000000000000000000000000000",
            "factory": null,
            "name": "Balancer Boosted Aave USD",
            "symbol": "bb-a-USD",
            "swapFee": "0.00001",
            "tokensList": ["0x1111111111111111111111111111111111111111"],
            "tokens": [{
                "address": "0x1111111111111111111111111111111111111111",
                "symbol": "bb-a-USDT",
                "decimals": 18,
                "balance": "1000.5",
                "weight": null,
                "priceRate": "1.0001",
            }],
            "totalShares": "2000",
            "totalLiquidity": "2001.25",
            "totalSwapVolume": "12345.6",
            "totalSwapFee": "0.1",
            "createTime": 1639435704,
            "mainIndex": 1,
        }))
        .unwrap();

        assert_eq!(pool.id, pool_id());
        assert_eq!(pool.pool_type, PoolType::StablePhantom);
        assert_eq!(pool.owner, Some(Address::ZERO));
        assert_eq!(pool.main_index, Some(1));
        assert_eq!(pool.wrapped_index, None);
        assert_eq!(pool.tokens[0].weight, None);
        assert_eq!(pool.tokens[0].price_rate, Some("1.0001".parse().unwrap()));
        assert_eq!(pool.total_liquidity, "2001.25".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn unknown_pool_types_decode() {
        assert_eq!(
            serde_json::from_value::<PoolType>(json!("Gyro2")).unwrap(),
            PoolType::Unknown
        );
    }
}
