//! Resolves Balancer V2 pools into decorated pool records by joining the
//! pools subgraph, on-chain pool state and token prices.

#[macro_use]
pub mod macros;

pub mod arguments;
pub mod failure_policy;
pub mod gauges;
pub mod pool_queries;
pub mod pools;
pub mod prices;
pub mod query_cache;
pub mod readiness;
pub mod resolver;
pub mod subgraph;
pub mod token_metadata;

pub use self::{
    pool_queries::{PoolQueries, PoolQueryKey},
    pools::{DecoratedPoolRecord, PoolId, PoolRecord, PoolType},
    resolver::{PoolResolver, ResolutionContext, ResolveError},
};
