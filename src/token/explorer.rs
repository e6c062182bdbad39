/// Token discovery over the Ethplorer address-info API.
use crate::config::ConfigManager;
use crate::token::{TokenError, TokenExplorerClient};
use crate::types::TokenInfo;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct AddressInfoResponse {
    #[serde(default)]
    tokens: Vec<TokenEntry>,
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    #[serde(rename = "tokenInfo")]
    token_info: RawTokenInfo,
}

#[derive(Debug, Deserialize)]
struct RawTokenInfo {
    address: String,
    name: Option<String>,
    symbol: Option<String>,
    decimals: Option<DecimalsField>,
}

/// Ethplorer reports decimals either as a number or as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DecimalsField {
    Number(u32),
    Text(String),
}

impl RawTokenInfo {
    fn into_token_info(self) -> Result<TokenInfo, String> {
        let decimals = match self.decimals {
            Some(DecimalsField::Number(decimals)) => decimals,
            Some(DecimalsField::Text(text)) => text
                .trim()
                .parse()
                .map_err(|_| format!("invalid decimals {:?}", text))?,
            None => 0,
        };
        Ok(TokenInfo {
            address: self.address,
            name: self.name.unwrap_or_default(),
            symbol: self.symbol.unwrap_or_default(),
            decimals,
        })
    }
}

/// Parses an address-info body. Entries with unusable metadata are skipped.
pub fn parse_address_info(body: &str) -> Result<Vec<TokenInfo>, TokenError> {
    let response: AddressInfoResponse = serde_json::from_str(body)
        .map_err(|e| TokenError::Decode(format!("address info: {}", e)))?;
    let tokens = response
        .tokens
        .into_iter()
        .filter_map(|entry| {
            let address = entry.token_info.address.clone();
            match entry.token_info.into_token_info() {
                Ok(token) => Some(token),
                Err(reason) => {
                    warn!(token = %address, %reason, "skipping token entry");
                    None
                }
            }
        })
        .collect();
    Ok(tokens)
}

pub struct HttpTokenExplorerClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpTokenExplorerClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, TokenError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| TokenError::Network(format!("Invalid explorer url: {}", e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config_manager: &ConfigManager) -> Result<Self, TokenError> {
        Self::new(
            &config_manager.get_config().token_explorer.base_url,
            &config_manager.get_token_explorer_api_key(),
        )
    }

    fn address_info_url(&self, wallet_address: &str) -> Result<Url, TokenError> {
        let mut url = self
            .base_url
            .join(&format!("getAddressInfo/{}", wallet_address.trim()))
            .map_err(|e| TokenError::Network(format!("Invalid explorer url: {}", e)))?;
        url.query_pairs_mut().append_pair("apiKey", &self.api_key);
        Ok(url)
    }
}

#[async_trait]
impl TokenExplorerClient for HttpTokenExplorerClient {
    async fn fetch(&self, wallet_address: &str) -> Result<Vec<TokenInfo>, TokenError> {
        let url = self.address_info_url(wallet_address)?;
        debug!(wallet = %wallet_address, "fetching token metadata");
        let body = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| TokenError::Network(format!("Token explorer request failed: {}", e)))?
            .text()
            .await
            .map_err(|e| TokenError::Network(format!("Token explorer body: {}", e)))?;
        parse_address_info(&body)
    }
}
