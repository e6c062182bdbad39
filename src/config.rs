/// Configuration module
use crate::payment::PaymentType;
use crate::types::{EvmChain, NetworkInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Network configuration missing: {0:?}")]
    NetworkMissing(EvmChain),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::SerializationError(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub networks: Vec<NetworkInfo>,
    pub default_network: EvmChain,
    pub token_explorer: TokenExplorerConfig,
    pub payment: PaymentConfig,
}

impl WalletConfig {
    pub fn find_network(&self, chain: &EvmChain) -> Option<&NetworkInfo> {
        self.networks.iter().find(|network| &network.chain == chain)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenExplorerConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    pub default_payment_type: PaymentType,
}

pub struct ConfigManager {
    config: WalletConfig,
    environment: HashMap<String, String>,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::from_config(Self::default_config()))
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.to_string()))?;
        let config: WalletConfig = serde_json::from_str(&content)?;
        if config.find_network(&config.default_network).is_none() {
            return Err(ConfigError::NetworkMissing(config.default_network));
        }
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: WalletConfig) -> Self {
        Self::with_environment(config, Self::load_environment_variables())
    }

    /// Builds a manager over an explicit environment instead of the process one.
    pub fn with_environment(config: WalletConfig, environment: HashMap<String, String>) -> Self {
        Self {
            config,
            environment,
        }
    }

    pub fn get_config(&self) -> &WalletConfig {
        &self.config
    }

    /// Network settings with any `RPC_<CHAIN>` override applied.
    pub fn get_network(&self, chain: &EvmChain) -> Option<NetworkInfo> {
        let mut network = self.config.find_network(chain)?.clone();
        if let Some(url) = self.environment.get(&format!("RPC_{}", chain.env_key())) {
            network.rpc_server_url = url.clone();
        }
        Some(network)
    }

    pub fn get_default_network(&self) -> Result<NetworkInfo, ConfigError> {
        self.get_network(&self.config.default_network)
            .ok_or_else(|| ConfigError::NetworkMissing(self.config.default_network.clone()))
    }

    pub fn get_token_explorer_api_key(&self) -> String {
        self.environment
            .get("WALLET_TOKEN_EXPLORER_API_KEY")
            .cloned()
            .unwrap_or_else(|| self.config.token_explorer.api_key.clone())
    }

    pub fn update_config<F>(&mut self, updater: F)
    where
        F: FnOnce(&mut WalletConfig),
    {
        updater(&mut self.config);
    }

    fn load_environment_variables() -> HashMap<String, String> {
        std::env::vars()
            .filter(|(key, _)| key.starts_with("WALLET_") || key.starts_with("RPC_"))
            .collect()
    }

    fn default_config() -> WalletConfig {
        WalletConfig {
            networks: vec![NetworkInfo::ethereum(), NetworkInfo::polygon()],
            default_network: EvmChain::Ethereum,
            token_explorer: TokenExplorerConfig {
                base_url: "https://api.ethplorer.io".to_string(),
                api_key: "freekey".to_string(),
            },
            payment: PaymentConfig {
                default_payment_type: PaymentType::Card,
            },
        }
    }
}

pub struct ConfigBuilder {
    config: WalletConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ConfigManager::default_config(),
        }
    }

    pub fn with_default_network(mut self, chain: EvmChain) -> Self {
        self.config.default_network = chain;
        self
    }

    /// Adds a network, replacing any entry for the same chain.
    pub fn with_network(mut self, network: NetworkInfo) -> Self {
        let networks = &mut self.config.networks;
        match networks.iter_mut().find(|known| known.chain == network.chain) {
            Some(known) => *known = network,
            None => networks.push(network),
        }
        self
    }

    pub fn with_token_explorer(mut self, base_url: &str, api_key: &str) -> Self {
        self.config.token_explorer = TokenExplorerConfig {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        };
        self
    }

    pub fn with_default_payment_type(mut self, payment_type: PaymentType) -> Self {
        self.config.payment.default_payment_type = payment_type;
        self
    }

    pub fn build(self) -> WalletConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
