//! Resolution of a pool id into a decorated pool.
//!
//! A resolution runs these stages strictly in order:
//!
//! 1. fetch the pool from the indexing service
//! 2. reject stable and managed pools that are neither allow listed nor owned
//!    by the connected account
//! 3. for phantom pools, strip the pre-minted share token and attach the
//!    linear pools
//! 4. inject every referenced token into the token metadata store, wait
//!    until it finished loading and fail if any token has no metadata
//! 5. fetch the on-chain state
//! 6. decorate
//! 7. for phantom pools, replace the liquidity with the value of the linear
//!    pool shares

use {
    crate::{
        failure_policy::OnFailure,
        gauges::GaugeRecord,
        pools::{
            DecoratedPoolRecord,
            PoolId,
            PoolRecord,
            PoolType,
            decoration::{DecorationContext, Decorator},
            graph_api::{ExtraFields, PoolFilter, PoolIndexing},
            linear::{LinearPoolResolver, attach_linear_pools},
            liquidity::{phantom_total_liquidity, unwrapped_tokens},
            onchain::PoolDataFetching,
        },
        prices::{FiatCurrency, Prices},
        query_cache::Cancelled,
        readiness::{self, GateError},
        token_metadata::TokenMetadataProviding,
    },
    alloy::primitives::Address,
    std::{collections::HashSet, sync::Arc, time::Duration},
    thiserror::Error,
    tracing::instrument,
};

#[derive(Clone, Debug)]
pub struct Config {
    /// Stable-like pools anyone may query.
    pub stable_allow_list: HashSet<PoolId>,
    /// Managed pools anyone may query.
    pub investment_allow_list: HashSet<PoolId>,
    /// Pool types that are never resolved.
    pub excluded_pool_types: Vec<PoolType>,
    /// How long to wait for token metadata. Waits forever if unset.
    pub readiness_timeout: Option<Duration>,
    pub blocks_per_day: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stable_allow_list: Default::default(),
            investment_allow_list: Default::default(),
            excluded_pool_types: vec![
                PoolType::Element,
                PoolType::AaveLinear,
                PoolType::Linear,
                PoolType::Erc4626Linear,
            ],
            readiness_timeout: None,
            blocks_per_day: 7200,
        }
    }
}

/// Per request inputs owned by the caller.
#[derive(Clone, Debug, Default)]
pub struct ResolutionContext {
    /// The connected account, if any.
    pub account: Option<Address>,
    pub prices: Arc<Prices>,
    pub currency: FiatCurrency,
}

#[derive(Clone, Debug, Error)]
pub enum ResolveError {
    #[error("pool {0} is not allowed")]
    PoolNotAllowed(PoolId),
    #[error("pool {0} not found")]
    PoolNotFound(PoolId),
    #[error("{0:#}")]
    Fetch(Arc<anyhow::Error>),
    #[error("pool resolution was cancelled")]
    Cancelled,
}

impl From<anyhow::Error> for ResolveError {
    fn from(err: anyhow::Error) -> Self {
        Self::Fetch(Arc::new(err))
    }
}

impl From<GateError> for ResolveError {
    fn from(err: GateError) -> Self {
        Self::Fetch(Arc::new(
            anyhow::Error::new(err).context("token metadata did not become ready"),
        ))
    }
}

impl From<Cancelled> for ResolveError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

pub struct PoolResolver {
    indexing: Arc<dyn PoolIndexing>,
    onchain: Arc<dyn PoolDataFetching>,
    tokens: Arc<dyn TokenMetadataProviding>,
    linear: LinearPoolResolver,
    decorator: Decorator,
    config: Config,
}

impl PoolResolver {
    pub fn new(
        indexing: Arc<dyn PoolIndexing>,
        onchain: Arc<dyn PoolDataFetching>,
        tokens: Arc<dyn TokenMetadataProviding>,
        config: Config,
    ) -> Self {
        Self {
            linear: LinearPoolResolver::new(indexing.clone()),
            decorator: Decorator::new(indexing.clone(), config.blocks_per_day),
            indexing,
            onchain,
            tokens,
            config,
        }
    }

    /// Resolves the pool. `gauges` are attached during decoration.
    #[instrument(skip_all, fields(pool_id = %id))]
    pub async fn resolve(
        &self,
        id: PoolId,
        context: &ResolutionContext,
        gauges: &[GaugeRecord],
    ) -> Result<DecoratedPoolRecord, ResolveError> {
        let mut pool = self.fetch_pool(&id).await?;
        if self.is_blocked(&pool, context.account) {
            tracing::debug!(pool_type = %pool.pool_type, "pool is not allowed");
            return Err(ResolveError::PoolNotAllowed(id));
        }

        if pool.pool_type.is_stable_phantom() {
            pool.strip_pre_minted_token();
            let linear_pools = OnFailure::Propagate
                .apply("linear pools", self.linear.fetch(&pool.tokens_list).await)?;
            tracing::debug!(count = linear_pools.len(), "resolved linear pools");
            attach_linear_pools(&mut pool, &linear_pools)?;
        }

        let referenced_tokens = pool.referenced_tokens();
        OnFailure::Propagate.apply(
            "token injection",
            self.tokens.inject(&referenced_tokens).await,
        )?;
        readiness::wait_until_within(
            self.tokens.loading(),
            |loading| !*loading,
            self.config.readiness_timeout,
        )
        .await?;
        OnFailure::Propagate.apply("token metadata", self.ensure_metadata(&referenced_tokens))?;

        let metadata = self.tokens.metadata_for(&pool.tokens_list);
        let onchain = OnFailure::Propagate.apply(
            "on-chain pool data",
            self.onchain.pool_data(id, pool.pool_type, &metadata).await,
        )?;

        let mut decorated = self
            .decorator
            .decorate(
                pool,
                onchain,
                DecorationContext {
                    prices: &context.prices,
                    currency: context.currency,
                    gauges,
                },
            )
            .await?;

        if decorated.pool.pool_type.is_stable_phantom() {
            if let Some(linear_pools) = &decorated.onchain.linear_pools {
                decorated.unwrapped_tokens = Some(unwrapped_tokens(linear_pools));
                if decorated.pool.linear_pool_tokens_map.is_some() {
                    decorated.pool.total_liquidity =
                        phantom_total_liquidity(&decorated.onchain, linear_pools, &context.prices)?;
                }
            }
        }

        tracing::debug!(total_liquidity = %decorated.total_liquidity(), "resolved pool");
        Ok(decorated)
    }

    async fn fetch_pool(&self, id: &PoolId) -> Result<PoolRecord, ResolveError> {
        let filter = PoolFilter::by_id(id).excluding(&self.config.excluded_pool_types);
        OnFailure::Propagate
            .apply(
                "pool indexing",
                self.indexing
                    .find_pools(filter, ExtraFields::default(), None)
                    .await,
            )?
            .into_iter()
            .next()
            .ok_or(ResolveError::PoolNotFound(*id))
    }

    /// The store stops loading even if a load failed. Tokens whose load
    /// failed have no metadata at all.
    fn ensure_metadata(&self, tokens: &[Address]) -> anyhow::Result<()> {
        let metadata = self.tokens.metadata_for(tokens);
        let missing: Vec<_> = tokens
            .iter()
            .filter(|token| !metadata.contains_key(*token))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("no metadata loaded for tokens {missing:?}");
        }
        Ok(())
    }

    /// Stable-like and managed pools are only served if they are on either
    /// allow list or owned by the connected account.
    fn is_blocked(&self, pool: &PoolRecord, account: Option<Address>) -> bool {
        if !pool.pool_type.is_stable_like() && !pool.pool_type.is_managed() {
            return false;
        }
        let is_allow_listed = self.config.stable_allow_list.contains(&pool.id)
            || self.config.investment_allow_list.contains(&pool.id);
        let is_owner = account.is_some() && account == pool.owner;
        !is_allow_listed && !is_owner
    }
}
