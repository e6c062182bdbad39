use crate::types::{NetworkInfo, TokenInfo, Wallet};
use async_trait::async_trait;
use ethers::types::{BlockNumber, Bytes, transaction::eip2718::TypedTransaction};
use std::sync::Arc;
use thiserror::Error;

pub mod balance;
pub mod explorer;
pub mod local;
pub mod repository;
pub mod rpc;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Empty response from contract call")]
    EmptyResponse,
    #[error("Balance does not fit a decimal")]
    BalanceOverflow,
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Wallet-scoped token cache. `put` is an upsert keyed by contract address.
#[async_trait]
pub trait TokenLocalSource: Send + Sync {
    async fn fetch(&self, wallet: &Wallet) -> Result<Vec<TokenInfo>, TokenError>;

    async fn put(&self, wallet: &Wallet, token: TokenInfo) -> Result<(), TokenError>;

    async fn delete(&self, wallet: &Wallet, token: &TokenInfo) -> Result<(), TokenError>;
}

/// Remote source of the tokens a wallet holds.
#[async_trait]
pub trait TokenExplorerClient: Send + Sync {
    async fn fetch(&self, wallet_address: &str) -> Result<Vec<TokenInfo>, TokenError>;
}

/// The one JSON-RPC method balance reads need.
#[async_trait]
pub trait EthCall: Send + Sync {
    async fn eth_call(
        &self,
        transaction: &TypedTransaction,
        block: BlockNumber,
    ) -> Result<Bytes, TokenError>;
}

/// Builds an RPC client for a network; used again whenever the network changes.
pub trait RpcClientFactory: Send + Sync {
    fn build(&self, network: &NetworkInfo) -> Result<Arc<dyn EthCall>, TokenError>;
}
