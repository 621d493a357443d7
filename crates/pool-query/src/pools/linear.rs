//! Linear pools nested in phantom pools.
//!
//! A phantom pool holds share tokens of linear pools, each of which pairs a
//! main token with its wrapped (yield bearing) counterpart. Nesting is one
//! level deep: linear pools never hold share tokens of other pools.

use {
    super::{
        PoolRecord,
        graph_api::{ExtraFields, PoolFilter, PoolIndexing},
    },
    alloy::primitives::Address,
    anyhow::{Context, Result},
    std::{collections::BTreeMap, sync::Arc},
};

pub struct LinearPoolResolver {
    indexing: Arc<dyn PoolIndexing>,
}

impl LinearPoolResolver {
    pub fn new(indexing: Arc<dyn PoolIndexing>) -> Self {
        Self { indexing }
    }

    /// Fetches the pools whose address appears in `tokens_list`, including
    /// their main and wrapped token indices.
    pub async fn fetch(&self, tokens_list: &[Address]) -> Result<Vec<PoolRecord>> {
        self.indexing
            .find_pools(
                PoolFilter::by_addresses(tokens_list),
                ExtraFields::LINEAR,
                None,
            )
            .await
            .context("failed to fetch linear pools")
    }
}

/// Records the main and wrapped token of each linear pool at the index the
/// linear pool occupies in the phantom pool's token list, and collects the
/// tokens of all linear pools by address.
///
/// Linear pools that are not in the token list are skipped.
pub fn attach_linear_pools(pool: &mut PoolRecord, linear_pools: &[PoolRecord]) -> Result<()> {
    let mut main_tokens = vec![None; pool.tokens_list.len()];
    let mut wrapped_tokens = vec![None; pool.tokens_list.len()];
    let mut linear_pool_tokens = BTreeMap::new();

    for linear in linear_pools {
        let Some(index) = pool
            .tokens_list
            .iter()
            .position(|token| *token == linear.address)
        else {
            tracing::warn!(
                pool_id = %pool.id,
                linear_pool = %linear.address,
                "linear pool is not a token of the phantom pool"
            );
            continue;
        };

        main_tokens[index] = Some(indexed_token(linear, linear.main_index, "main")?);
        wrapped_tokens[index] = Some(indexed_token(linear, linear.wrapped_index, "wrapped")?);
        linear_pool_tokens.extend(
            linear
                .tokens
                .iter()
                .filter(|token| token.address != linear.address)
                .map(|token| (token.address, token.clone())),
        );
    }

    pool.main_tokens = Some(main_tokens);
    pool.wrapped_tokens = Some(wrapped_tokens);
    pool.linear_pool_tokens_map = Some(linear_pool_tokens);
    Ok(())
}

fn indexed_token(linear: &PoolRecord, index: Option<usize>, side: &str) -> Result<Address> {
    let index = index.with_context(|| format!("linear pool {} has no {side} index", linear.id))?;
    linear.tokens_list.get(index).copied().with_context(|| {
        format!(
            "{side} index {index} of linear pool {} is out of range",
            linear.id
        )
    })
}
