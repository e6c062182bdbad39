#![allow(dead_code)]

use async_trait::async_trait;
use ethers::abi::{self, Token as AbiToken};
use ethers::types::{BlockNumber, Bytes, NameOrAddress, U256, transaction::eip2718::TypedTransaction};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use url::Url;
use wallet_sdk::AggregatedPaymentStatus;
use wallet_sdk::payment::{
    PaymentDataCallback, PaymentDetails, PaymentDetailsCallback, PaymentMethod,
    PaymentMethodCallback, PaymentRequestDetailsListener, PaymentRequestHandle,
    PaymentRequestListener, PaymentSdk, PaymentSession, UriCallback,
};
use wallet_sdk::token::local::InMemoryTokenLocalSource;
use wallet_sdk::token::{
    EthCall, RpcClientFactory, TokenError, TokenExplorerClient, TokenLocalSource,
};
use wallet_sdk::{NetworkInfo, TokenInfo, Wallet};

pub const WALLET: &str = "0x742d35cc6634c0532925a3b844bc454e4438f44e";
pub const TOKEN_A: &str = "0x00000000000000000000000000000000000000aa";
pub const TOKEN_B: &str = "0x00000000000000000000000000000000000000bb";
pub const TOKEN_C: &str = "0x00000000000000000000000000000000000000cc";

pub fn token(address: &str, symbol: &str, decimals: u32) -> TokenInfo {
    TokenInfo::new(address, symbol, symbol, decimals)
}

// ---- payment SDK ----

/// What a mock callback was completed with.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Data(Vec<u8>),
    Method(PaymentMethod),
    Uri(Url),
    Details(PaymentDetails),
}

pub type Completions = Arc<Mutex<Vec<Completion>>>;

pub struct RecordingCallback(pub Completions);

impl PaymentDataCallback for RecordingCallback {
    fn complete_with_payment_data(self: Box<Self>, data: Vec<u8>) {
        self.0.lock().unwrap().push(Completion::Data(data));
    }
}

impl PaymentMethodCallback for RecordingCallback {
    fn complete_with_payment_method(self: Box<Self>, method: PaymentMethod) {
        self.0.lock().unwrap().push(Completion::Method(method));
    }
}

impl UriCallback for RecordingCallback {
    fn complete_with_uri(self: Box<Self>, uri: Url) {
        self.0.lock().unwrap().push(Completion::Uri(uri));
    }
}

impl PaymentDetailsCallback for RecordingCallback {
    fn complete_with_payment_details(self: Box<Self>, details: PaymentDetails) {
        self.0.lock().unwrap().push(Completion::Details(details));
    }
}

pub struct MockSession {
    pub started: AtomicBool,
    pub cancelled: AtomicBool,
    payment_listener: Box<dyn PaymentRequestListener>,
    details_listener: Box<dyn PaymentRequestDetailsListener>,
    observer: Option<watch::Receiver<AggregatedPaymentStatus>>,
    status_at_cancel: Mutex<Option<AggregatedPaymentStatus>>,
}

impl MockSession {
    pub fn handle(self: &Arc<Self>) -> PaymentRequestHandle {
        PaymentRequestHandle::new(self.clone())
    }

    pub fn payment(&self) -> &dyn PaymentRequestListener {
        self.payment_listener.as_ref()
    }

    pub fn details(&self) -> &dyn PaymentRequestDetailsListener {
        self.details_listener.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Aggregated status as published when `cancel` ran.
    pub fn status_at_cancel(&self) -> Option<AggregatedPaymentStatus> {
        self.status_at_cancel.lock().unwrap().clone()
    }
}

impl PaymentSession for MockSession {
    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn cancel(&self) {
        if let Some(observer) = &self.observer {
            *self.status_at_cancel.lock().unwrap() = Some(observer.borrow().clone());
        }
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockSdk {
    sessions: Mutex<Vec<Arc<MockSession>>>,
    observer: Mutex<Option<watch::Receiver<AggregatedPaymentStatus>>>,
}

impl MockSdk {
    /// Sessions created from now on snapshot `status` when cancelled.
    pub fn observe(&self, status: watch::Receiver<AggregatedPaymentStatus>) {
        *self.observer.lock().unwrap() = Some(status);
    }

    pub fn session(&self, index: usize) -> Arc<MockSession> {
        self.sessions.lock().unwrap()[index].clone()
    }

    pub fn latest(&self) -> Arc<MockSession> {
        self.sessions.lock().unwrap().last().cloned().unwrap()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl PaymentSdk for MockSdk {
    fn create_session(
        &self,
        payment_listener: Box<dyn PaymentRequestListener>,
        details_listener: Box<dyn PaymentRequestDetailsListener>,
    ) -> Arc<dyn PaymentSession> {
        let session = Arc::new(MockSession {
            started: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            payment_listener,
            details_listener,
            observer: self.observer.lock().unwrap().clone(),
            status_at_cancel: Mutex::new(None),
        });
        self.sessions.lock().unwrap().push(session.clone());
        session
    }
}

// ---- token sources ----

/// In-memory cache that refuses to store the listed contracts.
#[derive(Default, Clone)]
pub struct FlakyLocalSource {
    inner: InMemoryTokenLocalSource,
    reject: Arc<Mutex<HashSet<String>>>,
}

impl FlakyLocalSource {
    pub fn reject(&self, address: &str) {
        self.reject.lock().unwrap().insert(address.to_lowercase());
    }

    pub async fn seed(&self, wallet: &str, tokens: &[TokenInfo]) {
        for token in tokens {
            self.inner.put(&Wallet::new(wallet), token.clone()).await.unwrap();
        }
    }
}

#[async_trait]
impl TokenLocalSource for FlakyLocalSource {
    async fn fetch(&self, wallet: &Wallet) -> Result<Vec<TokenInfo>, TokenError> {
        self.inner.fetch(wallet).await
    }

    async fn put(&self, wallet: &Wallet, token: TokenInfo) -> Result<(), TokenError> {
        if self.reject.lock().unwrap().contains(&token.address.to_lowercase()) {
            return Err(TokenError::Storage(format!("cannot store {}", token.address)));
        }
        self.inner.put(wallet, token).await
    }

    async fn delete(&self, wallet: &Wallet, token: &TokenInfo) -> Result<(), TokenError> {
        self.inner.delete(wallet, token).await
    }
}

/// Explorer returning a fixed list, or failing when empty-handed.
pub struct StaticExplorer {
    tokens: Option<Vec<TokenInfo>>,
}

impl StaticExplorer {
    pub fn returning(tokens: Vec<TokenInfo>) -> Self {
        Self {
            tokens: Some(tokens),
        }
    }

    pub fn failing() -> Self {
        Self { tokens: None }
    }
}

#[async_trait]
impl TokenExplorerClient for StaticExplorer {
    async fn fetch(&self, _wallet_address: &str) -> Result<Vec<TokenInfo>, TokenError> {
        self.tokens
            .clone()
            .ok_or_else(|| TokenError::Network("explorer unavailable".to_string()))
    }
}

/// RPC answering `balanceOf` from a per-contract table.
#[derive(Default)]
pub struct MockRpc {
    balances: HashMap<String, Result<U256, String>>,
    calls: Mutex<Vec<String>>,
}

impl MockRpc {
    pub fn with_balance(mut self, contract: &str, raw: u64) -> Self {
        self.balances
            .insert(contract.to_lowercase(), Ok(U256::from(raw)));
        self
    }

    pub fn with_failure(mut self, contract: &str) -> Self {
        self.balances
            .insert(contract.to_lowercase(), Err("execution reverted".to_string()));
        self
    }

    pub fn called_contracts(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EthCall for MockRpc {
    async fn eth_call(
        &self,
        transaction: &TypedTransaction,
        _block: BlockNumber,
    ) -> Result<Bytes, TokenError> {
        let contract = match transaction.to() {
            Some(NameOrAddress::Address(address)) => format!("{:?}", address),
            other => return Err(TokenError::Rpc(format!("unexpected target {:?}", other))),
        };
        self.calls.lock().unwrap().push(contract.clone());
        match self.balances.get(&contract) {
            Some(Ok(raw)) => Ok(Bytes::from(abi::encode(&[AbiToken::Uint(*raw)]))),
            Some(Err(reason)) => Err(TokenError::Rpc(reason.clone())),
            None => Ok(Bytes::default()),
        }
    }
}

/// Factory handing out a prepared client per RPC URL.
#[derive(Default)]
pub struct MockRpcFactory {
    clients: HashMap<String, Arc<MockRpc>>,
    built: Mutex<Vec<String>>,
}

impl MockRpcFactory {
    pub fn with_client(mut self, rpc_url: &str, client: MockRpc) -> Self {
        self.clients.insert(rpc_url.to_string(), Arc::new(client));
        self
    }

    pub fn client(&self, rpc_url: &str) -> Arc<MockRpc> {
        self.clients[rpc_url].clone()
    }

    pub fn built_urls(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

impl RpcClientFactory for MockRpcFactory {
    fn build(&self, network: &NetworkInfo) -> Result<Arc<dyn EthCall>, TokenError> {
        self.built
            .lock()
            .unwrap()
            .push(network.rpc_server_url.clone());
        self.clients
            .get(&network.rpc_server_url)
            .map(|client| client.clone() as Arc<dyn EthCall>)
            .ok_or_else(|| TokenError::Network(format!("no client for {}", network.rpc_server_url)))
    }
}
