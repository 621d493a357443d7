//! Liquidity gauges from the Balancer gauges subgraph.

use {
    crate::{failure_policy::OnFailure, pools::PoolId, subgraph::SubgraphClient},
    alloy::primitives::Address,
    anyhow::{Result, bail},
    async_trait::async_trait,
    bigdecimal::BigDecimal,
    number::serialization::DecimalString,
    reqwest::{Client, IntoUrl},
    serde::{Deserialize, Serialize},
    serde_with::serde_as,
    std::sync::Arc,
};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GaugeFactory {
    pub id: Address,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GaugeRecord {
    /// The gauge contract address.
    pub id: Address,
    pub symbol: String,
    pub pool_id: PoolId,
    #[serde_as(as = "DecimalString")]
    pub total_supply: BigDecimal,
    #[serde(default)]
    pub factory: Option<GaugeFactory>,
}

#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait GaugeFetching: Send + Sync {
    async fn gauges(&self) -> Result<Vec<GaugeRecord>>;
}

pub struct GaugesSubgraphClient(SubgraphClient);

impl GaugesSubgraphClient {
    pub fn for_chain(chain_id: u64, base_url: impl IntoUrl, client: Client) -> Result<Self> {
        let subgraph_name = match chain_id {
            1 => "balancer-gauges",
            137 => "balancer-gauges-polygon",
            42161 => "balancer-gauges-arbitrum",
            _ => bail!("unsupported chain {}", chain_id),
        };
        Ok(Self(SubgraphClient::new(
            base_url,
            "balancer-labs",
            subgraph_name,
            client,
        )?))
    }
}

#[async_trait]
impl GaugeFetching for GaugesSubgraphClient {
    async fn gauges(&self) -> Result<Vec<GaugeRecord>> {
        use self::gauges_query::*;

        Ok(self.0.query::<Data>(QUERY, None).await?.liquidity_gauges)
    }
}

/// Lists gauges, degrading to no gauges at all if the gauges subgraph is
/// unavailable. Pools resolve fine without gauges, they just lack a
/// `gauge_address`.
pub struct GaugeRegistry {
    fetcher: Arc<dyn GaugeFetching>,
    on_failure: OnFailure,
}

impl GaugeRegistry {
    pub fn new(fetcher: Arc<dyn GaugeFetching>) -> Self {
        Self {
            fetcher,
            on_failure: OnFailure::DegradeToEmpty,
        }
    }

    pub async fn list_gauges(&self) -> Vec<GaugeRecord> {
        let result = self.fetcher.gauges().await;
        // `DegradeToEmpty` never returns an error.
        self.on_failure.apply("gauges", result).unwrap_or_default()
    }
}

pub fn gauge_addresses(gauges: &[GaugeRecord]) -> Vec<Address> {
    gauges.iter().map(|gauge| gauge.id).collect()
}

mod gauges_query {
    use {super::GaugeRecord, serde::Deserialize};

    pub const QUERY: &str = r#"{
        liquidityGauges {
            id
            symbol
            poolId
            totalSupply
            factory {
                id
            }
        }
    }"#;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct Data {
        pub liquidity_gauges: Vec<GaugeRecord>,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use {
        super::*,
        crate::{pools::tests::POOL_ID, subgraph::DEFAULT_GRAPH_API_BASE_URL},
        anyhow::anyhow,
        serde_json::json,
    };

    pub fn gauge(last_byte: u8, pool_id: PoolId) -> GaugeRecord {
        GaugeRecord {
            id: Address::with_last_byte(last_byte),
            symbol: format!("gauge-{last_byte}"),
            pool_id,
            total_supply: 10.into(),
            factory: None,
        }
    }

    #[test]
    fn decode_gauges_data() {
        use self::gauges_query::*;

        let data: Data = serde_json::from_value(json!({
            "liquidityGauges": [
                {
                    "id": "0x34f33cdaed8ba0e1ceece80e5f4a73bcf234cfac",
                    "symbol": "B-50WBTC-50WETH-gauge",
                    "poolId": POOL_ID,
                    "totalSupply": "1234.5678",
                    "factory": {
                        "id": "0x4e7bbd911cf1efa442bc1b2e9ea01ffe785412ec",
                    },
                },
                {
                    "id": "0x0000000000000000000000000000000000000001",
                    "symbol": "gauge",
                    "poolId": POOL_ID,
                    "totalSupply": "0",
                    "factory": null,
                },
            ],
        }))
        .unwrap();

        assert_eq!(data.liquidity_gauges.len(), 2);
        assert_eq!(
            data.liquidity_gauges[0].total_supply,
            "1234.5678".parse::<BigDecimal>().unwrap()
        );
        assert!(data.liquidity_gauges[0].factory.is_some());
        assert_eq!(data.liquidity_gauges[1].factory, None);
        assert_eq!(
            gauge_addresses(&data.liquidity_gauges),
            [
                "0x34f33cdaed8ba0e1ceece80e5f4a73bcf234cfac"
                    .parse::<Address>()
                    .unwrap(),
                Address::with_last_byte(1),
            ]
        );
    }

    #[test]
    fn unsupported_chain() {
        assert!(GaugesSubgraphClient::for_chain(5, DEFAULT_GRAPH_API_BASE_URL, Client::new()).is_err());
    }

    #[tokio::test]
    async fn lists_gauges() {
        let pool_id: PoolId = POOL_ID.parse().unwrap();
        let mut fetcher = MockGaugeFetching::new();
        fetcher
            .expect_gauges()
            .returning(move || Ok(vec![gauge(1, pool_id)]));

        let registry = GaugeRegistry::new(Arc::new(fetcher));
        assert_eq!(registry.list_gauges().await, [gauge(1, pool_id)]);
    }

    #[tokio::test]
    async fn failing_fetch_yields_no_gauges() {
        let mut fetcher = MockGaugeFetching::new();
        fetcher
            .expect_gauges()
            .returning(|| Err(anyhow!("subgraph unavailable")));

        let registry = GaugeRegistry::new(Arc::new(fetcher));
        assert!(registry.list_gauges().await.is_empty());
    }

    #[tokio::test]
    #[ignore]
    async fn balancer_gauges_subgraph_query() {
        let client =
            GaugesSubgraphClient::for_chain(1, DEFAULT_GRAPH_API_BASE_URL, Client::new()).unwrap();
        let gauges = client.gauges().await.unwrap();
        println!("Retrieved {} gauges", gauges.len());
    }
}
