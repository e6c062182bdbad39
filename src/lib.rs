//! Wallet payment sessions and ERC-20 token balances.
//!
//! - [`payment`]: folds an external payment SDK's listener callbacks into one
//!   observable status and drives the session through it.
//! - [`token`]: cached token list refreshed from a token explorer, with
//!   balances read over JSON-RPC.
pub mod config;
pub mod network;
pub mod payment;
pub mod token;
pub mod types;

pub use config::{ConfigBuilder, ConfigError, ConfigManager, WalletConfig};
pub use network::NetworkRepository;
pub use payment::aggregator::PaymentStatusAggregator;
pub use payment::status::AggregatedPaymentStatus;
pub use payment::{PaymentError, PaymentType};
pub use token::TokenError;
pub use token::repository::TokenRepository;
pub use types::{EvmChain, NetworkInfo, Token, TokenInfo, Wallet};
