use {
    crate::{
        gauges::{GaugeRegistry, GaugesSubgraphClient},
        pool_queries::PoolQueries,
        pools::{PoolId, PoolType, graph_api::BalancerSubgraphClient, onchain::PoolDataFetching},
        resolver::{self, PoolResolver},
        subgraph::DEFAULT_GRAPH_API_BASE_URL,
        token_metadata::TokenMetadataProviding,
    },
    std::{
        fmt::{self, Display, Formatter},
        sync::Arc,
        time::Duration,
    },
    tracing::level_filters::LevelFilter,
    url::Url,
};

#[derive(clap::Parser)]
pub struct LoggingArguments {
    #[clap(long, env, default_value = "warn,pool_query=debug")]
    pub log_filter: String,

    #[clap(long, env, default_value = "error")]
    pub log_stderr_threshold: LevelFilter,

    /// Log events as JSON.
    #[clap(long, env, action = clap::ArgAction::Set, default_value = "false")]
    pub use_json_logs: bool,
}

impl LoggingArguments {
    pub fn tracing_config(&self) -> observe::Config {
        observe::Config::new(
            &self.log_filter,
            self.log_stderr_threshold.into_level(),
            self.use_json_logs,
        )
    }
}

impl Display for LoggingArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            log_filter,
            log_stderr_threshold,
            use_json_logs,
        } = self;

        writeln!(f, "log_filter: {}", log_filter)?;
        writeln!(f, "log_stderr_threshold: {}", log_stderr_threshold)?;
        writeln!(f, "use_json_logs: {}", use_json_logs)?;
        Ok(())
    }
}

#[derive(clap::Parser)]
#[group(skip)]
pub struct Arguments {
    #[clap(flatten)]
    pub logging: LoggingArguments,

    /// Base URL the pools and gauges subgraphs are hosted under.
    #[clap(long, env, default_value = DEFAULT_GRAPH_API_BASE_URL)]
    pub graph_api_base_url: Url,

    /// Chain to resolve pools on. Selects the subgraphs to query.
    #[clap(long, env, default_value = "1")]
    pub chain_id: u64,

    /// Stable pools that may be resolved by anyone.
    #[clap(long, env, value_delimiter = ',')]
    pub stable_pool_allow_list: Vec<PoolId>,

    /// Managed pools that may be resolved by anyone.
    #[clap(long, env, value_delimiter = ',')]
    pub investment_pool_allow_list: Vec<PoolId>,

    /// Pool types that are never resolved.
    #[clap(
        long,
        env,
        value_delimiter = ',',
        default_values_t = [
            PoolType::Element,
            PoolType::AaveLinear,
            PoolType::Linear,
            PoolType::Erc4626Linear,
        ],
    )]
    pub excluded_pool_types: Vec<PoolType>,

    /// Number of blocks making up the trailing window of pool metrics.
    #[clap(long, env, default_value = "7200")]
    pub blocks_per_day: u64,

    /// How long a resolution waits for token metadata before failing. Waits
    /// indefinitely if unset.
    #[clap(long, env, value_parser = humantime::parse_duration)]
    pub readiness_timeout: Option<Duration>,

    /// How long resolved pools and gauges stay cached.
    #[clap(
        long,
        env,
        default_value = "5m",
        value_parser = humantime::parse_duration,
    )]
    pub query_cache_time: Duration,
}

impl Arguments {
    pub fn resolver_config(&self) -> resolver::Config {
        resolver::Config {
            stable_allow_list: self.stable_pool_allow_list.iter().copied().collect(),
            investment_allow_list: self.investment_pool_allow_list.iter().copied().collect(),
            excluded_pool_types: self.excluded_pool_types.clone(),
            readiness_timeout: self.readiness_timeout,
            blocks_per_day: self.blocks_per_day,
        }
    }

    /// Pool queries against the subgraphs of the configured chain. The
    /// contract layer and the token metadata store are supplied by the
    /// caller.
    pub fn pool_queries(
        &self,
        client: reqwest::Client,
        onchain: Arc<dyn PoolDataFetching>,
        tokens: Arc<dyn TokenMetadataProviding>,
    ) -> anyhow::Result<PoolQueries> {
        let pools = BalancerSubgraphClient::for_chain(
            self.chain_id,
            self.graph_api_base_url.clone(),
            client.clone(),
        )?;
        let gauges = GaugesSubgraphClient::for_chain(
            self.chain_id,
            self.graph_api_base_url.clone(),
            client,
        )?;
        let resolver = PoolResolver::new(Arc::new(pools), onchain, tokens, self.resolver_config());
        Ok(PoolQueries::new(
            resolver,
            GaugeRegistry::new(Arc::new(gauges)),
            self.query_cache_time,
        ))
    }
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            logging,
            graph_api_base_url,
            chain_id,
            stable_pool_allow_list,
            investment_pool_allow_list,
            excluded_pool_types,
            blocks_per_day,
            readiness_timeout,
            query_cache_time,
        } = self;

        write!(f, "{}", logging)?;
        writeln!(f, "graph_api_base_url: {}", graph_api_base_url)?;
        writeln!(f, "chain_id: {}", chain_id)?;
        display_list(f, "stable_pool_allow_list", stable_pool_allow_list)?;
        display_list(f, "investment_pool_allow_list", investment_pool_allow_list)?;
        display_list(f, "excluded_pool_types", excluded_pool_types)?;
        writeln!(f, "blocks_per_day: {}", blocks_per_day)?;
        display_option(
            f,
            "readiness_timeout",
            &readiness_timeout.map(humantime::format_duration),
        )?;
        writeln!(
            f,
            "query_cache_time: {}",
            humantime::format_duration(*query_cache_time)
        )?;
        Ok(())
    }
}

pub fn display_option(
    f: &mut Formatter<'_>,
    name: &str,
    option: &Option<impl Display>,
) -> fmt::Result {
    write!(f, "{name}: ")?;
    match option {
        Some(display) => writeln!(f, "{display}"),
        None => writeln!(f, "None"),
    }
}

pub fn display_list<T>(
    f: &mut Formatter<'_>,
    name: &str,
    iter: impl IntoIterator<Item = T>,
) -> fmt::Result
where
    T: Display,
{
    write!(f, "{name}: [")?;
    for (i, t) in iter.into_iter().enumerate() {
        if i != 0 {
            f.write_str(", ")?;
        }
        write!(f, "{t}")?;
    }
    writeln!(f, "]")
}
