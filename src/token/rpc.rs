/// JSON-RPC access for evm network.
use crate::token::{EthCall, RpcClientFactory, TokenError};
use crate::types::NetworkInfo;
use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::types::{BlockNumber, Bytes, transaction::eip2718::TypedTransaction};
use std::sync::Arc;
use tracing::debug;

/// `eth_call` over an ethers provider.
///
/// # Examples
///
/// ```rust,ignore
/// let client = EthersRpcClient::new("https://eth.llamarpc.com")?;
/// let raw = client.eth_call(&transaction, BlockNumber::Latest).await?;
/// ```
pub struct EthersRpcClient<P = Http> {
    provider: Arc<Provider<P>>,
}

impl EthersRpcClient<Http> {
    pub fn new(rpc_url: &str) -> Result<Self, TokenError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| TokenError::Network(format!("Failed to create provider: {}", e)))?;
        Ok(Self::from_provider(provider))
    }
}

impl<P: JsonRpcClient> EthersRpcClient<P> {
    pub fn from_provider(provider: Provider<P>) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }
}

#[async_trait]
impl<P> EthCall for EthersRpcClient<P>
where
    P: JsonRpcClient + 'static,
{
    async fn eth_call(
        &self,
        transaction: &TypedTransaction,
        block: BlockNumber,
    ) -> Result<Bytes, TokenError> {
        debug!(to = ?transaction.to(), ?block, "eth_call");
        self.provider
            .call(transaction, Some(block.into()))
            .await
            .map_err(|e| TokenError::Rpc(format!("eth_call failed: {}", e)))
    }
}

/// Builds [`EthersRpcClient`]s over HTTP from a network's RPC URL.
#[derive(Debug, Default, Clone, Copy)]
pub struct EthersRpcClientFactory;

impl RpcClientFactory for EthersRpcClientFactory {
    fn build(&self, network: &NetworkInfo) -> Result<Arc<dyn EthCall>, TokenError> {
        Ok(Arc::new(EthersRpcClient::new(&network.rpc_server_url)?))
    }
}
