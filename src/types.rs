/// Type definitions for global use.
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EvmChain {
    Ethereum,
    Ropsten,
    Kovan,
    Polygon,
    BinanceSmartChain,
    Custom { name: String, chain_id: u64 },
}

impl EvmChain {
    pub fn get_standard_chain_id(&self) -> Option<u64> {
        match self {
            EvmChain::Ethereum => Some(1),
            EvmChain::Ropsten => Some(3),
            EvmChain::Kovan => Some(42),
            EvmChain::Polygon => Some(137),
            EvmChain::BinanceSmartChain => Some(56),
            EvmChain::Custom { chain_id, .. } => Some(*chain_id),
        }
    }

    pub fn get_display_name(&self) -> String {
        match self {
            EvmChain::Ethereum => "Ethereum",
            EvmChain::Ropsten => "Ropsten (Test)",
            EvmChain::Kovan => "Kovan (Test)",
            EvmChain::Polygon => "Polygon",
            EvmChain::BinanceSmartChain => "BNB Smart Chain",
            EvmChain::Custom { name, .. } => name,
        }
        .to_string()
    }

    /// Suffix used by `RPC_<CHAIN>` environment overrides.
    pub fn env_key(&self) -> String {
        match self {
            EvmChain::Ethereum => "ETHEREUM".to_string(),
            EvmChain::Ropsten => "ROPSTEN".to_string(),
            EvmChain::Kovan => "KOVAN".to_string(),
            EvmChain::Polygon => "POLYGON".to_string(),
            EvmChain::BinanceSmartChain => "BSC".to_string(),
            EvmChain::Custom { name, .. } => name.to_uppercase().replace(['-', ' '], "_"),
        }
    }

    pub fn is_main_network(&self) -> bool {
        !matches!(self, EvmChain::Ropsten | EvmChain::Kovan)
    }
}

/// An EVM network the wallet can talk to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkInfo {
    pub chain: EvmChain,
    pub name: String,
    pub symbol: String,
    pub rpc_server_url: String,
    pub chain_id: u64,
    pub is_main_network: bool,
}

impl NetworkInfo {
    pub fn new(chain: EvmChain, symbol: &str, rpc_server_url: &str) -> Self {
        let chain_id = chain.get_standard_chain_id().unwrap_or_default();
        Self {
            name: chain.get_display_name(),
            is_main_network: chain.is_main_network(),
            chain,
            symbol: symbol.to_string(),
            rpc_server_url: rpc_server_url.to_string(),
            chain_id,
        }
    }

    pub fn ethereum() -> Self {
        Self::new(EvmChain::Ethereum, "ETH", "https://eth.llamarpc.com")
    }

    pub fn polygon() -> Self {
        Self::new(EvmChain::Polygon, "POL", "https://polygon-rpc.com")
    }
}

/// Wallet identity. Addresses are compared case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
}

impl Wallet {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.trim().to_string(),
        }
    }

    /// Lower-cased address, used as a cache key.
    pub fn key(&self) -> String {
        self.address.to_lowercase()
    }
}

impl PartialEq for Wallet {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Wallet {}

/// ERC-20 token metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
}

impl TokenInfo {
    pub fn new(address: &str, name: &str, symbol: &str, decimals: u32) -> Self {
        Self {
            address: address.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            decimals,
        }
    }

    pub fn same_contract(&self, other: &TokenInfo) -> bool {
        self.address.eq_ignore_ascii_case(&other.address)
    }
}

/// Token metadata plus its balance for one wallet.
///
/// `balance` is `None` when the balance is not known yet, or when the
/// on-chain read failed. It never means zero.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    pub info: TokenInfo,
    pub balance: Option<Decimal>,
}

impl Token {
    pub fn new(info: TokenInfo, balance: Option<Decimal>) -> Self {
        Self { info, balance }
    }

    pub fn without_balance(info: TokenInfo) -> Self {
        Self::new(info, None)
    }
}
