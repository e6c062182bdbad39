/// Active network tracking.
use crate::config::{ConfigError, ConfigManager};
use crate::types::{EvmChain, NetworkInfo};
use tokio::sync::watch;
use tracing::info;

/// Holds the wallet's default network and tells subscribers when it changes.
pub struct NetworkRepository {
    default_network: watch::Sender<NetworkInfo>,
    networks: Vec<NetworkInfo>,
}

impl NetworkRepository {
    pub fn new(default_network: NetworkInfo, networks: Vec<NetworkInfo>) -> Self {
        let (default_network, _) = watch::channel(default_network);
        Self {
            default_network,
            networks,
        }
    }

    pub fn from_config(config_manager: &ConfigManager) -> Result<Self, ConfigError> {
        let default_network = config_manager.get_default_network()?;
        let networks = config_manager
            .get_config()
            .networks
            .iter()
            .filter_map(|network| config_manager.get_network(&network.chain))
            .collect();
        Ok(Self::new(default_network, networks))
    }

    pub fn get_default_network(&self) -> NetworkInfo {
        self.default_network.borrow().clone()
    }

    pub fn get_available_networks(&self) -> &[NetworkInfo] {
        &self.networks
    }

    pub fn find(&self, chain: &EvmChain) -> Option<&NetworkInfo> {
        self.networks.iter().find(|network| &network.chain == chain)
    }

    /// Switches the default network. Subscribers are only woken on an actual change.
    pub fn set_default_network(&self, network: NetworkInfo) {
        self.default_network.send_if_modified(|current| {
            if *current == network {
                return false;
            }
            info!(
                from = %current.name,
                to = %network.name,
                "default network changed"
            );
            *current = network;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkInfo> {
        self.default_network.subscribe()
    }
}
