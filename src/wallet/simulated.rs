//! In-memory wallet for dry runs
//!
//! Behaves like a connected ERC-20 wallet: balances are kept in smallest
//! units, transfers are deducted on submission and every transaction is
//! confirmed on request. Any step can be told to fail.

use async_trait::async_trait;
use ethers::types::U256;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::wallet::units::{from_smallest_unit, to_smallest_unit};
use crate::wallet::{TransferReceipt, TransferRequest, WalletClient, WalletGateway, WalletHandle};

/// Account reported by the simulated wallet
pub const SIMULATED_ACCOUNT: &str = "0x1111111111111111111111111111111111111111";

/// Gateway operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulatedStep {
    CreateWalletClient,
    GetAddress,
    GetDecimals,
    GetBalance,
    SubmitTransaction,
    WaitForTxReceipt,
}

struct Ledger {
    balance: U256,
    transfers: Vec<TransferRequest>,
    confirmed: HashSet<String>,
}

struct Shared {
    decimals: u32,
    /// Per-call delay in milliseconds
    latency_ms: AtomicU64,
    failures: Mutex<HashSet<SimulatedStep>>,
    ledger: Mutex<Ledger>,
    nonce: AtomicU64,
}

impl Shared {
    /// Wait out the simulated latency, then fail if the step is marked
    async fn step(&self, step: SimulatedStep) -> Result<()> {
        let latency = Duration::from_millis(self.latency_ms.load(Ordering::Relaxed));
        tokio::time::sleep(latency).await;

        let failing = self
            .failures
            .lock()
            .map_err(|e| Error::Internal(format!("Failure set lock poisoned: {}", e)))?
            .contains(&step);

        if failing {
            debug!("Simulated failure at {:?}", step);
            return Err(Error::Simulated(format!("{:?}", step)));
        }
        Ok(())
    }

    fn ledger(&self) -> Result<std::sync::MutexGuard<'_, Ledger>> {
        self.ledger
            .lock()
            .map_err(|e| Error::Internal(format!("Ledger lock poisoned: {}", e)))
    }
}

/// Simulated gateway, cheap to clone (clones share one ledger)
#[derive(Clone)]
pub struct SimulatedGateway {
    shared: Arc<Shared>,
}

impl SimulatedGateway {
    /// Create a wallet holding `balance` whole tokens of a `decimals`-decimal token
    pub fn new(decimals: u32, balance: f64) -> Result<Self> {
        let balance = to_smallest_unit(balance, decimals)?;

        Ok(Self {
            shared: Arc::new(Shared {
                decimals,
                latency_ms: AtomicU64::new(0),
                failures: Mutex::new(HashSet::new()),
                ledger: Mutex::new(Ledger {
                    balance,
                    transfers: Vec::new(),
                    confirmed: HashSet::new(),
                }),
                nonce: AtomicU64::new(0),
            }),
        })
    }

    /// Delay every call by `latency`; applies to all clones
    pub fn with_latency(self, latency: Duration) -> Self {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.shared.latency_ms.store(millis, Ordering::Relaxed);
        self
    }

    /// Make `step` fail until [`recover`](Self::recover) is called
    pub fn fail_on(&self, step: SimulatedStep) {
        if let Ok(mut failures) = self.shared.failures.lock() {
            failures.insert(step);
        }
    }

    pub fn recover(&self, step: SimulatedStep) {
        if let Ok(mut failures) = self.shared.failures.lock() {
            failures.remove(&step);
        }
    }

    /// Transfers accepted so far
    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.shared
            .ledger()
            .map(|ledger| ledger.transfers.clone())
            .unwrap_or_default()
    }

    /// Current balance in human units
    pub fn balance(&self) -> Result<f64> {
        let raw = self.shared.ledger()?.balance;
        from_smallest_unit(raw, self.shared.decimals)
    }
}

#[async_trait]
impl WalletGateway for SimulatedGateway {
    async fn create_wallet_client(&self) -> Result<WalletHandle> {
        self.shared.step(SimulatedStep::CreateWalletClient).await?;
        Ok(WalletHandle::new(SimulatedClient {
            shared: self.shared.clone(),
        }))
    }
}

struct SimulatedClient {
    shared: Arc<Shared>,
}

#[async_trait]
impl WalletClient for SimulatedClient {
    async fn get_address(&self) -> Result<String> {
        self.shared.step(SimulatedStep::GetAddress).await?;
        Ok(SIMULATED_ACCOUNT.to_string())
    }

    async fn get_decimals(&self) -> Result<u32> {
        self.shared.step(SimulatedStep::GetDecimals).await?;
        Ok(self.shared.decimals)
    }

    async fn get_balance(&self, address: &str, decimals: u32) -> Result<f64> {
        self.shared.step(SimulatedStep::GetBalance).await?;
        if !address.eq_ignore_ascii_case(SIMULATED_ACCOUNT) {
            return from_smallest_unit(U256::zero(), decimals);
        }
        let raw = self.shared.ledger()?.balance;
        from_smallest_unit(raw, decimals)
    }

    async fn submit_transaction(&self, request: &TransferRequest) -> Result<String> {
        self.shared.step(SimulatedStep::SubmitTransaction).await?;

        let amount = to_smallest_unit(request.amount, request.decimals)?;
        let mut ledger = self.shared.ledger()?;
        if ledger.balance < amount {
            return Err(Error::InsufficientBalance {
                available: ledger.balance.to_string(),
                required: amount.to_string(),
            });
        }

        ledger.balance -= amount;
        ledger.transfers.push(request.clone());

        let nonce = self.shared.nonce.fetch_add(1, Ordering::SeqCst) + 1;
        let transaction_id = format!("0x{:064x}", nonce);
        ledger.confirmed.insert(transaction_id.clone());

        debug!(
            "Simulated transfer of {} to {} as {}",
            request.amount, request.to_address, transaction_id
        );
        Ok(transaction_id)
    }

    async fn wait_for_receipt(&self, transaction_id: &str) -> Result<TransferReceipt> {
        self.shared.step(SimulatedStep::WaitForTxReceipt).await?;

        if !self.shared.ledger()?.confirmed.contains(transaction_id) {
            return Err(Error::TransactionDropped(transaction_id.to_string()));
        }

        Ok(TransferReceipt {
            transaction_id: transaction_id.to_string(),
            block_number: Some(self.shared.nonce.load(Ordering::SeqCst)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(amount: f64) -> TransferRequest {
        TransferRequest {
            address: SIMULATED_ACCOUNT.to_string(),
            to_address: "0xABCDEF0123456789ABCDEF0123456789ABCDEF01".to_string(),
            amount,
            decimals: 6,
        }
    }

    #[tokio::test]
    async fn test_transfer_deducts_and_confirms() {
        let gateway = SimulatedGateway::new(6, 100.0).unwrap();
        let handle = gateway.create_wallet_client().await.unwrap();
        let client = handle.client();

        assert_eq!(client.get_address().await.unwrap(), SIMULATED_ACCOUNT);
        assert_eq!(client.get_decimals().await.unwrap(), 6);
        assert_eq!(client.get_balance(SIMULATED_ACCOUNT, 6).await.unwrap(), 100.0);

        let tx = client.submit_transaction(&request(40.0)).await.unwrap();
        assert!(tx.starts_with("0x"));
        assert_eq!(tx.len(), 66);

        let receipt = client.wait_for_receipt(&tx).await.unwrap();
        assert_eq!(receipt.transaction_id, tx);
        assert_eq!(gateway.balance().unwrap(), 60.0);
        assert_eq!(gateway.transfers(), vec![request(40.0)]);
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let gateway = SimulatedGateway::new(6, 1.0).unwrap();
        let handle = gateway.create_wallet_client().await.unwrap();

        let result = handle.client().submit_transaction(&request(2.0)).await;
        assert!(matches!(result, Err(Error::InsufficientBalance { .. })));
        assert!(gateway.transfers().is_empty());
    }

    #[tokio::test]
    async fn test_fail_on_and_recover() {
        let gateway = SimulatedGateway::new(6, 1.0).unwrap();
        gateway.fail_on(SimulatedStep::CreateWalletClient);
        assert!(gateway.create_wallet_client().await.is_err());

        gateway.recover(SimulatedStep::CreateWalletClient);
        assert!(gateway.create_wallet_client().await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_receipt_is_dropped() {
        let gateway = SimulatedGateway::new(6, 1.0).unwrap();
        let handle = gateway.create_wallet_client().await.unwrap();

        let result = handle.client().wait_for_receipt("0xdead").await;
        assert!(matches!(result, Err(Error::TransactionDropped(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_applies_to_shared_gateway() {
        let gateway = SimulatedGateway::new(6, 1.0).unwrap();
        let shared = gateway.clone();
        let _gateway = gateway.with_latency(Duration::from_millis(300));

        let started = tokio::time::Instant::now();
        shared.create_wallet_client().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
