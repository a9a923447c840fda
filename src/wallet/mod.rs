//! Wallet/chain gateway
//!
//! The workflow coordinator talks to the chain only through these traits.
//! Every call is single-shot: it resolves to a value or an error, and the
//! coordinator decides what the failure means.
//!
//! # Architecture
//!
//! ```text
//! WalletGateway::create_wallet_client() -> WalletHandle(Arc<dyn WalletClient>)
//!                                               |
//!        get_address -> get_decimals -> get_balance -> submit_transaction -> wait_for_receipt
//! ```
//!
//! Implementations:
//! - [`evm::EvmGateway`] talks to an EVM JSON-RPC node through an ERC-20 binding
//! - [`simulated::SimulatedGateway`] keeps balances in memory (dry runs, tests)

pub mod evm;
pub mod simulated;
pub mod units;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

pub use evm::EvmGateway;
pub use simulated::{SimulatedGateway, SimulatedStep};

/// Everything needed to submit one token transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    /// Connected account that signs the transfer
    pub address: String,
    /// Recipient as typed by the user
    pub to_address: String,
    /// Human-unit amount
    pub amount: f64,
    /// Token decimals used for the smallest-unit conversion
    pub decimals: u32,
}

/// Confirmation of a settled transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub transaction_id: String,
    pub block_number: Option<u64>,
}

/// Creates connected wallet clients
#[async_trait]
pub trait WalletGateway: Send + Sync {
    /// Connect to the wallet provider
    async fn create_wallet_client(&self) -> Result<WalletHandle>;
}

/// Operations available on a connected wallet
#[async_trait]
pub trait WalletClient: Send + Sync {
    /// Connected account identifier
    async fn get_address(&self) -> Result<String>;

    /// Token decimals (smallest-unit exponent)
    async fn get_decimals(&self) -> Result<u32>;

    /// Token balance of `address` in human units
    async fn get_balance(&self, address: &str, decimals: u32) -> Result<f64>;

    /// Submit a `transfer(to, amount)` call; returns the transaction id
    async fn submit_transaction(&self, request: &TransferRequest) -> Result<String>;

    /// Wait until the transaction is confirmed
    async fn wait_for_receipt(&self, transaction_id: &str) -> Result<TransferReceipt>;
}

/// Opaque, cheaply cloneable handle to a connected wallet client
#[derive(Clone)]
pub struct WalletHandle(Arc<dyn WalletClient>);

impl WalletHandle {
    pub fn new<C: WalletClient + 'static>(client: C) -> Self {
        Self(Arc::new(client))
    }

    pub fn client(&self) -> &dyn WalletClient {
        self.0.as_ref()
    }
}

impl From<Arc<dyn WalletClient>> for WalletHandle {
    fn from(client: Arc<dyn WalletClient>) -> Self {
        Self(client)
    }
}

impl fmt::Debug for WalletHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WalletHandle(..)")
    }
}
