/// Cache-then-refresh token balances.
use crate::network::NetworkRepository;
use crate::token::balance::{
    balance_of_transaction, decode_balance, parse_address, scale_balance,
};
use crate::token::{EthCall, RpcClientFactory, TokenError, TokenExplorerClient, TokenLocalSource};
use crate::types::{NetworkInfo, Token, TokenInfo, Wallet};
use ethers::types::BlockNumber;
use futures_util::stream::{self, Stream};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

struct RpcState {
    network: watch::Receiver<NetworkInfo>,
    // None until built, or after a failed rebuild
    client: Option<Arc<dyn EthCall>>,
}

enum FetchPhase {
    Cached,
    Refreshed,
}

/// Token list and ERC-20 balances for a wallet.
///
/// [`TokenRepository::fetch`] yields the cached tokens first (no balances),
/// then refreshes metadata from the explorer and yields the refreshed list
/// with balances read on-chain, one `eth_call` per token.
///
/// # Examples
///
/// ```rust,ignore
/// let repository = TokenRepository::new(&networks, explorer, cache, Arc::new(EthersRpcClientFactory));
/// let mut snapshots = std::pin::pin!(repository.fetch("0x742d35cc6634c0532925a3b844bc454e4438f44e"));
/// while let Some(tokens) = snapshots.next().await {
///     render(tokens?);
/// }
/// ```
pub struct TokenRepository {
    explorer: Arc<dyn TokenExplorerClient>,
    local_source: Arc<dyn TokenLocalSource>,
    rpc_factory: Arc<dyn RpcClientFactory>,
    rpc: Mutex<RpcState>,
}

impl TokenRepository {
    /// The RPC client is built lazily, and rebuilt whenever `networks`
    /// switches its default network.
    pub fn new(
        networks: &NetworkRepository,
        explorer: Arc<dyn TokenExplorerClient>,
        local_source: Arc<dyn TokenLocalSource>,
        rpc_factory: Arc<dyn RpcClientFactory>,
    ) -> Self {
        Self {
            explorer,
            local_source,
            rpc_factory,
            rpc: Mutex::new(RpcState {
                network: networks.subscribe(),
                client: None,
            }),
        }
    }

    /// At most two snapshots: cached tokens, then refreshed tokens with balances.
    ///
    /// A failed cache read ends the sequence with that error. A failed
    /// explorer fetch is emitted as the second element instead of balances.
    pub fn fetch<'a>(
        &'a self,
        wallet_address: &str,
    ) -> impl Stream<Item = Result<Vec<Token>, TokenError>> + use<'a> {
        let wallet = Wallet::new(wallet_address);
        stream::unfold(Some(FetchPhase::Cached), move |phase| {
            let wallet = wallet.clone();
            async move {
                let Some(phase) = phase else {
                    return None;
                };
                match phase {
                    FetchPhase::Cached => match self.fetch_cached(&wallet).await {
                        Ok(tokens) => Some((Ok(tokens), Some(FetchPhase::Refreshed))),
                        Err(err) => Some((Err(err), None)),
                    },
                    FetchPhase::Refreshed => {
                        if let Err(err) = self.refresh(&wallet).await {
                            warn!(
                                wallet = %wallet.address,
                                error = %err,
                                "token metadata refresh failed"
                            );
                            return Some((Err(err), None));
                        }
                        Some((self.fetch_with_balances(&wallet).await, None))
                    }
                }
            }
        })
    }

    /// Cached tokens with unknown balances.
    pub async fn fetch_cached(&self, wallet: &Wallet) -> Result<Vec<Token>, TokenError> {
        let items = self.local_source.fetch(wallet).await?;
        Ok(items.into_iter().map(Token::without_balance).collect())
    }

    /// Pulls the wallet's tokens from the explorer into the cache.
    ///
    /// Each entry is upserted on its own; a failed entry is logged and
    /// skipped. Cached tokens the explorer no longer reports are removed.
    /// Returns how many entries were stored.
    pub async fn refresh(&self, wallet: &Wallet) -> Result<usize, TokenError> {
        let remote = self.explorer.fetch(&wallet.address).await?;
        let mut stored = 0;
        for token in &remote {
            match self.local_source.put(wallet, token.clone()).await {
                Ok(()) => stored += 1,
                Err(err) => {
                    warn!(token = %token.address, error = %err, "failed to store token");
                }
            }
        }

        let cached = self.local_source.fetch(wallet).await?;
        for stale in cached
            .iter()
            .filter(|cached| !remote.iter().any(|token| token.same_contract(cached)))
        {
            if let Err(err) = self.local_source.delete(wallet, stale).await {
                warn!(token = %stale.address, error = %err, "failed to remove stale token");
            }
        }
        debug!(wallet = %wallet.address, stored, remote = remote.len(), "token metadata refreshed");
        Ok(stored)
    }

    /// Cached tokens with their on-chain balances.
    ///
    /// Calls run one after another. A token whose read fails keeps a `None`
    /// balance and does not affect the others.
    pub async fn fetch_with_balances(&self, wallet: &Wallet) -> Result<Vec<Token>, TokenError> {
        let items = self.local_source.fetch(wallet).await?;
        let rpc = match self.rpc_client() {
            Ok(rpc) => Some(rpc),
            Err(err) => {
                warn!(error = %err, "no rpc client, balances unknown");
                None
            }
        };
        let mut tokens = Vec::with_capacity(items.len());
        for info in items {
            let balance = match &rpc {
                Some(rpc) => match Self::get_balance(rpc.as_ref(), wallet, &info).await {
                    Ok(balance) => Some(balance),
                    Err(err) => {
                        warn!(token = %info.address, error = %err, "balance read failed");
                        None
                    }
                },
                None => None,
            };
            tokens.push(Token::new(info, balance));
        }
        Ok(tokens)
    }

    /// Balance of one token for `wallet`, in token units.
    pub async fn get_balance(
        rpc: &dyn EthCall,
        wallet: &Wallet,
        token: &TokenInfo,
    ) -> Result<Decimal, TokenError> {
        let owner = parse_address(&wallet.address)?;
        let contract = parse_address(&token.address)?;
        let response = rpc
            .eth_call(&balance_of_transaction(owner, contract), BlockNumber::Latest)
            .await?;
        let raw = decode_balance(&response)?;
        scale_balance(raw, token.decimals)
    }

    /// Client for the current default network, rebuilt after a network switch.
    fn rpc_client(&self) -> Result<Arc<dyn EthCall>, TokenError> {
        let mut state = self.rpc.lock().unwrap_or_else(PoisonError::into_inner);
        let changed = state.network.has_changed().unwrap_or(false);
        if let (Some(client), false) = (&state.client, changed) {
            return Ok(Arc::clone(client));
        }
        let network = state.network.borrow_and_update().clone();
        state.client = None;
        let client = self.rpc_factory.build(&network)?;
        info!(network = %network.name, rpc = %network.rpc_server_url, "rpc client built");
        state.client = Some(Arc::clone(&client));
        Ok(client)
    }
}
