//! Shared store of token metadata (decimals, symbols).
//!
//! Consumers inject the addresses they are about to work with and then wait
//! for the store to finish loading. Loading happens in the background so
//! several resolutions can inject tokens concurrently; the store reports a
//! single `loading` flag that is `true` while any load is outstanding.

use {
    alloy::primitives::Address,
    async_trait::async_trait,
    std::{
        collections::{HashMap, HashSet},
        sync::{Arc, Mutex},
    },
    thiserror::Error,
    tokio::sync::watch,
};

#[cfg_attr(test, derive(Eq))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenInfo {
    pub decimals: Option<u8>,
    pub symbol: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, Error)]
#[error("error fetching token info: {0}")]
pub struct Error(pub String);

/// Backend the store loads metadata from, e.g. ERC20 calls or a token list.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait TokenInfoFetching: Send + Sync {
    /// Retrieves information for the tokens. Tokens the backend knows nothing
    /// about may be missing from the result.
    async fn get_token_infos(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, TokenInfo>, Error>;
}

#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait TokenMetadataProviding: Send + Sync {
    /// Schedules loading of every address that is not known yet. Returns once
    /// the load is scheduled, not when it completed; see [`Self::loading`].
    async fn inject(&self, addresses: &[Address]) -> anyhow::Result<()>;

    /// Observes whether any load is outstanding.
    fn loading(&self) -> watch::Receiver<bool>;

    /// Metadata of the requested tokens that is currently known.
    fn metadata_for(&self, addresses: &[Address]) -> HashMap<Address, TokenInfo>;
}

pub struct TokenMetadataStore {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn TokenInfoFetching>,
    state: Mutex<State>,
    loading: watch::Sender<bool>,
}

#[derive(Default)]
struct State {
    tokens: HashMap<Address, TokenInfo>,
    pending: HashSet<Address>,
    outstanding_loads: usize,
}

impl TokenMetadataStore {
    pub fn new(fetcher: Arc<dyn TokenInfoFetching>) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state: Default::default(),
                loading,
            }),
        }
    }

    pub fn is_loading(&self) -> bool {
        *self.inner.loading.borrow()
    }
}

impl Inner {
    async fn load(&self, addresses: Vec<Address>) {
        let result = self.fetcher.get_token_infos(&addresses).await;

        let mut state = self.state.lock().unwrap();
        for address in &addresses {
            state.pending.remove(address);
        }
        match result {
            Ok(infos) => {
                // Tokens the backend does not know still count as loaded so
                // they are not requested over and over again.
                for address in addresses {
                    let info = infos.get(&address).cloned().unwrap_or_default();
                    state.tokens.insert(address, info);
                }
            }
            Err(err) => {
                tracing::warn!(?err, tokens = ?addresses, "failed to load token metadata");
            }
        }
        state.outstanding_loads -= 1;
        if state.outstanding_loads == 0 {
            self.loading.send_replace(false);
        }
    }
}

#[async_trait]
impl TokenMetadataProviding for TokenMetadataStore {
    async fn inject(&self, addresses: &[Address]) -> anyhow::Result<()> {
        let missing = {
            let mut state = self.inner.state.lock().unwrap();
            let missing: Vec<_> = addresses
                .iter()
                .copied()
                .filter(|address| {
                    !state.tokens.contains_key(address) && !state.pending.contains(address)
                })
                .collect::<HashSet<_>>()
                .into_iter()
                .collect();
            if missing.is_empty() {
                return Ok(());
            }
            state.pending.extend(missing.iter().copied());
            state.outstanding_loads += 1;
            self.inner.loading.send_replace(true);
            missing
        };

        tracing::debug!(tokens = ?missing, "loading token metadata");
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.load(missing).await });
        Ok(())
    }

    fn loading(&self) -> watch::Receiver<bool> {
        self.inner.loading.subscribe()
    }

    fn metadata_for(&self, addresses: &[Address]) -> HashMap<Address, TokenInfo> {
        let state = self.inner.state.lock().unwrap();
        addresses
            .iter()
            .filter_map(|address| Some((*address, state.tokens.get(address)?.clone())))
            .collect()
    }
}
