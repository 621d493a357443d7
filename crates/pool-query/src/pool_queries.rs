//! Cached pool and gauge queries.
//!
//! A pool query is keyed on the pool id and the gauge addresses known when it
//! runs: pools are decorated with their gauge, so a changed gauge set is a
//! different query and never served from an entry computed for the old set.

use {
    crate::{
        gauges::{self, GaugeRecord, GaugeRegistry},
        pools::{DecoratedPoolRecord, PoolId},
        query_cache::{Cancelled, QueryCache},
        resolver::{PoolResolver, ResolutionContext, ResolveError},
    },
    alloy::primitives::Address,
    futures::FutureExt,
    std::{sync::Arc, time::Duration},
};

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PoolQueryKey {
    pub pool_id: PoolId,
    pub gauge_addresses: Vec<Address>,
}

pub struct PoolQueries {
    resolver: Arc<PoolResolver>,
    gauges: Arc<GaugeRegistry>,
    pools: QueryCache<PoolQueryKey, Arc<DecoratedPoolRecord>, ResolveError>,
    gauge_list: QueryCache<(), Arc<Vec<GaugeRecord>>, Cancelled>,
}

impl PoolQueries {
    pub fn new(resolver: PoolResolver, gauges: GaugeRegistry, cache_time: Duration) -> Self {
        Self {
            resolver: Arc::new(resolver),
            gauges: Arc::new(gauges),
            pools: QueryCache::new("pools", cache_time),
            gauge_list: QueryCache::new("gauges", cache_time),
        }
    }

    /// All gauges. Empty if the gauges subgraph is unavailable.
    pub async fn list_gauges(&self) -> Arc<Vec<GaugeRecord>> {
        let gauges = self.gauges.clone();
        let result = self
            .gauge_list
            .get((), true, move |_| {
                async move { Ok(Arc::new(gauges.list_gauges().await)) }.boxed()
            })
            .await;
        // The gauge query is never disabled so it is never cancelled.
        result.ok().flatten().unwrap_or_default()
    }

    pub async fn gauge_addresses(&self) -> Vec<Address> {
        gauges::gauge_addresses(&self.list_gauges().await)
    }

    /// Fetches the gauge list again on the next request. Pools resolved
    /// afterwards are keyed on the new gauge set.
    pub fn refresh_gauges(&self) {
        self.gauge_list.invalidate(&());
    }

    /// Resolves the pool, sharing the resolution with concurrent requests
    /// for the same pool and gauge set.
    ///
    /// While `enabled` is false nothing is fetched: the cached pool is
    /// returned if there is one and a resolution in flight is cancelled.
    pub async fn resolve_pool(
        &self,
        pool_id: PoolId,
        enabled: bool,
        context: ResolutionContext,
    ) -> Result<Option<Arc<DecoratedPoolRecord>>, ResolveError> {
        let gauges = if enabled {
            self.list_gauges().await
        } else {
            self.gauge_list.cached(&()).unwrap_or_default()
        };
        let key = PoolQueryKey {
            pool_id,
            gauge_addresses: gauges::gauge_addresses(&gauges),
        };

        let resolver = self.resolver.clone();
        self.pools
            .get(key, enabled, move |key| {
                let pool_id = key.pool_id;
                async move {
                    resolver
                        .resolve(pool_id, &context, &gauges)
                        .await
                        .map(Arc::new)
                }
                .boxed()
            })
            .await
    }

    /// Drops cached results older than the cache time.
    pub fn collect_garbage(&self) {
        self.pools.collect_garbage();
        self.gauge_list.collect_garbage();
    }
}
