use crate::token::{TokenError, TokenLocalSource};
use crate::types::{TokenInfo, Wallet};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory token cache, keyed by wallet.
///
/// Keeps insertion order per wallet; `put` replaces an existing entry for the
/// same contract in place.
#[derive(Default, Clone)]
pub struct InMemoryTokenLocalSource {
    tokens: Arc<RwLock<HashMap<String, Vec<TokenInfo>>>>,
}

impl InMemoryTokenLocalSource {
    /// Creates a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenLocalSource for InMemoryTokenLocalSource {
    async fn fetch(&self, wallet: &Wallet) -> Result<Vec<TokenInfo>, TokenError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(&wallet.key()).cloned().unwrap_or_default())
    }

    async fn put(&self, wallet: &Wallet, token: TokenInfo) -> Result<(), TokenError> {
        let mut tokens = self.tokens.write().await;
        let entries = tokens.entry(wallet.key()).or_default();
        match entries.iter_mut().find(|entry| entry.same_contract(&token)) {
            Some(entry) => *entry = token,
            None => entries.push(token),
        }
        Ok(())
    }

    async fn delete(&self, wallet: &Wallet, token: &TokenInfo) -> Result<(), TokenError> {
        let mut tokens = self.tokens.write().await;
        if let Some(entries) = tokens.get_mut(&wallet.key()) {
            entries.retain(|entry| !entry.same_contract(token));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_upserts_by_contract_address() {
        let store = InMemoryTokenLocalSource::new();
        let wallet = Wallet::new("0xWallet");

        store
            .put(&wallet, TokenInfo::new("0xAA", "Alpha", "ALP", 18))
            .await
            .unwrap();
        store
            .put(&wallet, TokenInfo::new("0xBB", "Beta", "BET", 6))
            .await
            .unwrap();
        store
            .put(&wallet, TokenInfo::new("0xaa", "Alpha v2", "ALP", 18))
            .await
            .unwrap();

        let tokens = store.fetch(&wallet).await.unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].name, "Alpha v2");
        assert_eq!(tokens[1].symbol, "BET");
    }

    #[tokio::test]
    async fn wallets_are_isolated() {
        let store = InMemoryTokenLocalSource::new();
        let token = TokenInfo::new("0xAA", "Alpha", "ALP", 18);
        store.put(&Wallet::new("0x1"), token.clone()).await.unwrap();

        assert!(store.fetch(&Wallet::new("0x2")).await.unwrap().is_empty());

        store.delete(&Wallet::new("0x1"), &token).await.unwrap();
        assert!(store.fetch(&Wallet::new("0x1")).await.unwrap().is_empty());
    }
}
