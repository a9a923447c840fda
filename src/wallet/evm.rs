//! ERC-20 transfers over an EVM JSON-RPC node
//!
//! Handles the actual on-chain side of the form: account lookup, token
//! reads, `transfer` submission and receipt polling.

use async_trait::async_trait;
use ethers::contract::abigen;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, H256, U64};
use ethers::utils::to_checksum;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::wallet::units::{from_smallest_unit, to_smallest_unit};
use crate::wallet::{TransferReceipt, TransferRequest, WalletClient, WalletGateway, WalletHandle};

abigen!(
    Erc20Token,
    r#"[
        function decimals() external view returns (uint8)
        function balanceOf(address account) external view returns (uint256)
        function transfer(address to, uint256 amount) external returns (bool)
    ]"#
);

/// Gateway that connects to a JSON-RPC endpoint
pub struct EvmGateway {
    endpoint: String,
    chain_id: u64,
    token: Address,
    poll_interval: Duration,
    confirmations: usize,
    private_key: Option<String>,
}

impl EvmGateway {
    /// Build a gateway from configuration (the signing key is read from the environment)
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = parse_address(&config.token.contract_address)?;

        Ok(Self {
            endpoint: config.rpc.endpoint.clone(),
            chain_id: config.rpc.chain_id,
            token,
            poll_interval: Duration::from_millis(config.rpc.poll_interval_ms),
            confirmations: config.workflow.receipt_confirmations,
            private_key: config.private_key(),
        })
    }

    fn load_wallet(&self, key: &str, chain_id: u64) -> Result<LocalWallet> {
        let wallet: LocalWallet = key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| Error::InvalidPrivateKey(format!("{}", e)))?;
        Ok(wallet.with_chain_id(chain_id))
    }
}

#[async_trait]
impl WalletGateway for EvmGateway {
    async fn create_wallet_client(&self) -> Result<WalletHandle> {
        debug!("Connecting to {}", self.endpoint);

        let provider = Provider::<Http>::try_from(self.endpoint.as_str())
            .map_err(|e| Error::WalletConnection(e.to_string()))?
            .interval(self.poll_interval);

        let chain_id = provider
            .get_chainid()
            .await
            .map_err(|e| Error::WalletConnection(e.to_string()))?
            .as_u64();

        if chain_id != self.chain_id {
            return Err(Error::ChainIdMismatch {
                expected: self.chain_id,
                actual: chain_id,
            });
        }

        match &self.private_key {
            Some(key) => {
                let wallet = self.load_wallet(key, chain_id)?;
                info!(
                    "Connected to chain {} with local signer {}",
                    chain_id,
                    to_checksum(&wallet.address(), None)
                );
                let client = SignerMiddleware::new(provider, wallet);
                Ok(WalletHandle::new(EvmWalletClient::new(
                    Arc::new(client),
                    self.token,
                    self.confirmations,
                )))
            }
            None => {
                info!("Connected to chain {} using node accounts", chain_id);
                Ok(WalletHandle::new(EvmWalletClient::new(
                    Arc::new(provider),
                    self.token,
                    self.confirmations,
                )))
            }
        }
    }
}

/// Connected client, generic over the middleware stack (plain provider or signer)
pub struct EvmWalletClient<M: Middleware> {
    client: Arc<M>,
    token: Erc20Token<M>,
    confirmations: usize,
}

impl<M: Middleware + 'static> EvmWalletClient<M> {
    pub fn new(client: Arc<M>, token: Address, confirmations: usize) -> Self {
        Self {
            token: Erc20Token::new(token, client.clone()),
            client,
            confirmations,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> WalletClient for EvmWalletClient<M> {
    async fn get_address(&self) -> Result<String> {
        let account = match self.client.default_sender() {
            Some(account) => account,
            None => self
                .client
                .get_accounts()
                .await
                .map_err(|e| Error::Rpc(e.to_string()))?
                .into_iter()
                .next()
                .ok_or(Error::NoAccount)?,
        };

        Ok(to_checksum(&account, None))
    }

    async fn get_decimals(&self) -> Result<u32> {
        let decimals = self
            .token
            .decimals()
            .call()
            .await
            .map_err(|e| Error::ContractRead(format!("decimals: {}", e)))?;

        Ok(u32::from(decimals))
    }

    async fn get_balance(&self, address: &str, decimals: u32) -> Result<f64> {
        let owner = parse_address(address)?;

        let raw = self
            .token
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| Error::ContractRead(format!("balanceOf: {}", e)))?;

        debug!("Raw balance of {}: {}", address, raw);
        from_smallest_unit(raw, decimals)
    }

    async fn submit_transaction(&self, request: &TransferRequest) -> Result<String> {
        let from = parse_address(&request.address)?;
        let to = parse_address(&request.to_address)?;
        let amount = to_smallest_unit(request.amount, request.decimals)?;

        debug!(
            "Executing transfer: {} smallest units from {} to {}",
            amount, request.address, request.to_address
        );

        let call = self.token.transfer(to, amount).from(from);
        let pending = call
            .send()
            .await
            .map_err(|e| Error::TransactionSend(e.to_string()))?;

        let tx_hash = *pending;
        info!(
            "Transfer submitted: {} to {} (tx: {:?})",
            request.amount, request.to_address, tx_hash
        );

        Ok(format!("{:?}", tx_hash))
    }

    async fn wait_for_receipt(&self, transaction_id: &str) -> Result<TransferReceipt> {
        let tx_hash: H256 = transaction_id
            .parse()
            .map_err(|_| Error::Internal(format!("Not a transaction hash: {}", transaction_id)))?;

        let receipt = PendingTransaction::new(tx_hash, self.client.provider())
            .confirmations(self.confirmations)
            .await
            .map_err(|e| Error::Rpc(e.to_string()))?
            .ok_or_else(|| Error::TransactionDropped(transaction_id.to_string()))?;

        if receipt.status == Some(U64::zero()) {
            return Err(Error::TransactionReverted(transaction_id.to_string()));
        }

        let block_number = receipt.block_number.map(|n| n.as_u64());
        info!("Transfer confirmed: {} in block {:?}", transaction_id, block_number);

        Ok(TransferReceipt {
            transaction_id: transaction_id.to_string(),
            block_number,
        })
    }
}

fn parse_address(value: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .map_err(|_| Error::InvalidAddress(value.to_string()))
}
