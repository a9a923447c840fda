//! Workflow context record

use crate::wallet::WalletHandle;

pub const CONNECT_WALLET_ERROR: &str = "Could not connect to wallet";
pub const FETCH_ADDRESS_ERROR: &str = "Could not fetch address";
pub const FETCH_BALANCE_ERROR: &str = "Could not fetch balance";
pub const SEND_TRANSACTION_ERROR: &str = "Could not send transaction";
pub const NOT_0X_ADDRESS_ERROR: &str = "Provide a 0x address";
pub const ADDRESS_LENGTH_ERROR: &str = "Provide a 42 character long address";
pub const INVALID_AMOUNT_ERROR: &str = "Provide a valid amount";

/// Data owned by the workflow.
///
/// Error fields use the empty string for "no error". They are not cleared
/// against each other; a reader should only look at the one relevant to the
/// current state.
#[derive(Debug, Clone, Default)]
pub struct WorkflowContext {
    /// Transfer quantity in human units
    pub amount: f64,
    /// Connected account, empty until resolved
    pub address: String,
    /// Recipient as typed
    pub to_address: String,
    pub amount_error: String,
    pub address_error: String,
    pub wallet_error: String,
    /// Set after a successful submission
    pub transaction_id: Option<String>,
    /// Human-unit token balance of `address`
    pub balance: f64,
    pub decimals: u32,
    /// Injected once by `wallet.createWalletClient`
    pub wallet_client: Option<WalletHandle>,
}

impl WorkflowContext {
    pub fn is_connected(&self) -> bool {
        self.wallet_client.is_some()
    }
}
