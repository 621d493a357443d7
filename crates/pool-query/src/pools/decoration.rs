//! Merges a subgraph pool with its on-chain state, prices and gauges.

use {
    super::{
        Apr,
        DecoratedPoolRecord,
        PoolId,
        PoolMetrics,
        PoolRecord,
        Period,
        graph_api::{ExtraFields, PoolFilter, PoolIndexing},
        onchain::OnchainPoolData,
    },
    crate::{
        gauges::GaugeRecord,
        prices::{FiatCurrency, Prices},
    },
    anyhow::{Context, Result},
    bigdecimal::{BigDecimal, Zero},
    std::sync::Arc,
};

const DAYS_PER_YEAR: u32 = 365;

/// Inputs of a decoration besides the pool itself.
#[derive(Clone, Copy, Debug)]
pub struct DecorationContext<'a> {
    pub prices: &'a Prices,
    pub currency: FiatCurrency,
    pub gauges: &'a [GaugeRecord],
}

pub struct Decorator {
    indexing: Arc<dyn PoolIndexing>,
    blocks_per_day: u64,
}

impl Decorator {
    pub fn new(indexing: Arc<dyn PoolIndexing>, blocks_per_day: u64) -> Self {
        Self {
            indexing,
            blocks_per_day,
        }
    }

    pub async fn decorate(
        &self,
        pool: PoolRecord,
        onchain: OnchainPoolData,
        context: DecorationContext<'_>,
    ) -> Result<DecoratedPoolRecord> {
        let past = self.snapshot_a_day_ago(&pool.id).await?;
        Ok(decorate_with_snapshot(pool, onchain, past.as_ref(), context))
    }

    /// The pool as indexed `blocks_per_day` blocks before the latest indexed
    /// block, if it existed back then.
    async fn snapshot_a_day_ago(&self, id: &PoolId) -> Result<Option<PoolRecord>> {
        let latest = self
            .indexing
            .latest_block()
            .await
            .context("failed to fetch latest indexed block")?;
        let Some(block) = latest.checked_sub(self.blocks_per_day) else {
            return Ok(None);
        };
        let pools = self
            .indexing
            .find_pools(PoolFilter::by_id(id), ExtraFields::default(), Some(block))
            .await
            .with_context(|| format!("failed to fetch pool snapshot at block {block}"))?;
        Ok(pools.into_iter().next())
    }
}

/// Computes liquidity from on-chain balances and prices, and the trailing
/// day's volume, fees and APR against `past`.
pub fn decorate_with_snapshot(
    mut pool: PoolRecord,
    onchain: OnchainPoolData,
    past: Option<&PoolRecord>,
    context: DecorationContext<'_>,
) -> DecoratedPoolRecord {
    let total_liquidity = pool
        .tokens_list
        .iter()
        .filter_map(|token| {
            let balance = onchain.balance_of(token)?;
            let price = context.prices.price(token, context.currency)?;
            Some(balance * price)
        })
        .fold(BigDecimal::zero(), |total, value| total + value);

    let (volume, fees, is_new_pool) = match past {
        Some(past) => (
            &pool.total_swap_volume - &past.total_swap_volume,
            &pool.total_swap_fee - &past.total_swap_fee,
            false,
        ),
        None => (
            pool.total_swap_volume.clone(),
            pool.total_swap_fee.clone(),
            true,
        ),
    };

    let pool_apr = if total_liquidity.is_zero() {
        BigDecimal::zero()
    } else {
        &fees * BigDecimal::from(DAYS_PER_YEAR) / &total_liquidity
    };

    let gauge_address = context
        .gauges
        .iter()
        .find(|gauge| gauge.pool_id == pool.id)
        .map(|gauge| gauge.id);

    pool.total_liquidity = total_liquidity;
    DecoratedPoolRecord {
        pool,
        dynamic: PoolMetrics {
            period: Period::Day,
            volume,
            fees,
            apr: Apr {
                pool: pool_apr.clone(),
                staking: None,
                total: pool_apr,
            },
            is_new_pool,
        },
        gauge_address,
        unwrapped_tokens: None,
        onchain,
    }
}
