//! Client for the Balancer V2 pools subgraph.
//!
//! Only the queries needed to resolve single pools are implemented: a pool by
//! id (optionally at a past block) and pools by address.

use {
    super::{PoolId, PoolRecord, PoolType},
    crate::subgraph::{SubgraphClient, block_number_query},
    alloy::primitives::{Address, hex},
    anyhow::{Result, bail},
    async_trait::async_trait,
    reqwest::{Client, IntoUrl},
    serde::Serialize,
    serde_json::json,
};

/// Upper bound of pools returned by a single query. Pool lookups here are by
/// id or by a handful of addresses so no paging is needed.
const QUERY_LIMIT: usize = 1000;

/// The subgraph `Pool_filter`. Ids and addresses are lower case because that
/// is how the subgraph stores them.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PoolFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address_in: Option<Vec<String>>,
    #[serde(rename = "poolType_not_in", skip_serializing_if = "Vec::is_empty")]
    pool_type_not_in: Vec<PoolType>,
    #[serde(rename = "totalShares_gt")]
    total_shares_gt: i64,
}

impl PoolFilter {
    pub fn by_id(id: &PoolId) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::any()
        }
    }

    pub fn by_addresses(addresses: &[Address]) -> Self {
        Self {
            address_in: Some(addresses.iter().map(hex::encode_prefixed).collect()),
            ..Self::any()
        }
    }

    pub fn excluding(mut self, pool_types: &[PoolType]) -> Self {
        self.pool_type_not_in = pool_types.to_vec();
        self
    }

    fn any() -> Self {
        Self {
            id: None,
            address_in: None,
            pool_type_not_in: Vec::new(),
            // Shares are never negative so this matches every pool. Kept to
            // mirror the filter the pools app sends.
            total_shares_gt: -1,
        }
    }
}

/// Fields only linear pools have, requested on demand.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ExtraFields {
    pub main_index: bool,
    pub wrapped_index: bool,
}

impl ExtraFields {
    pub const LINEAR: Self = Self {
        main_index: true,
        wrapped_index: true,
    };
}

/// The indexing service.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait PoolIndexing: Send + Sync {
    /// Pools matching `filter`, at `block` if set and at the latest indexed
    /// block otherwise.
    async fn find_pools(
        &self,
        filter: PoolFilter,
        extra_fields: ExtraFields,
        block: Option<u64>,
    ) -> Result<Vec<PoolRecord>>;

    /// The latest block the subgraph has indexed.
    async fn latest_block(&self) -> Result<u64>;
}

/// A client to the Balancer V2 subgraph.
///
/// This client is not implemented to allow general GraphQL queries, but instead
/// implements high-level methods that perform GraphQL queries under the hood.
pub struct BalancerSubgraphClient(SubgraphClient);

impl BalancerSubgraphClient {
    /// Creates a new Balancer subgraph client for the specified chain ID.
    pub fn for_chain(chain_id: u64, base_url: impl IntoUrl, client: Client) -> Result<Self> {
        let subgraph_name = match chain_id {
            1 => "balancer-v2",
            137 => "balancer-polygon-v2",
            42161 => "balancer-arbitrum-v2",
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
impl PoolIndexing for BalancerSubgraphClient {
    async fn find_pools(
        &self,
        filter: PoolFilter,
        extra_fields: ExtraFields,
        block: Option<u64>,
    ) -> Result<Vec<PoolRecord>> {
        use self::pools_query::*;

        let query = query(extra_fields);
        Ok(self
            .0
            .query::<Data>(
                &query,
                Some(json_map! {
                    "first" => QUERY_LIMIT,
                    "where" => json!(filter),
                    "block" => block.map(|number| json!({ "number": number })),
                }),
            )
            .await?
            .pools)
    }

    async fn latest_block(&self) -> Result<u64> {
        Ok(self
            .0
            .query::<block_number_query::Data>(block_number_query::QUERY, None)
            .await?
            .meta
            .block
            .number)
    }
}

mod pools_query {
    use {super::ExtraFields, crate::pools::PoolRecord, serde::Deserialize};

    const FIELDS: &str = r#"
            id
            address
            poolType
            owner
            factory
            name
            symbol
            swapFee
            tokensList
            totalShares
            totalLiquidity
            totalSwapVolume
            totalSwapFee
            createTime
            tokens {
                address
                symbol
                decimals
                balance
                weight
                priceRate
            }"#;

    pub fn query(extra_fields: ExtraFields) -> String {
        let mut fields = FIELDS.to_string();
        if extra_fields.main_index {
            fields.push_str("\n            mainIndex");
        }
        if extra_fields.wrapped_index {
            fields.push_str("\n            wrappedIndex");
        }
        format!(
            r#"query Pools($first: Int, $where: Pool_filter, $block: Block_height) {{
        pools(first: $first, where: $where, block: $block) {{{fields}
        }}
    }}"#
        )
    }

    #[derive(Debug, Deserialize, PartialEq)]
    pub struct Data {
        pub pools: Vec<PoolRecord>,
    }
}
