//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Receipt polling interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// The ERC-20 token the form transfers
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
    #[serde(default = "default_symbol")]
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    /// Name of the environment variable holding a hex private key.
    /// When the variable is unset the node's first unlocked account is used.
    #[serde(default = "default_private_key_env")]
    pub private_key_env: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// How long `done` is shown before returning to `input`
    #[serde(default = "default_done_reset_ms")]
    pub done_reset_ms: u64,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    #[serde(default = "default_receipt_confirmations")]
    pub receipt_confirmations: usize,
}

impl WorkflowConfig {
    pub fn done_reset(&self) -> Duration {
        Duration::from_millis(self.done_reset_ms)
    }
}

fn default_rpc_endpoint() -> String {
    "https://api.avax-test.network/ext/bc/C/rpc".to_string()
}

fn default_chain_id() -> u64 {
    43113
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_contract_address() -> String {
    "0x5425890298aed601595a70AB815c96711a31Bc65".to_string()
}

fn default_symbol() -> String {
    "USDC".to_string()
}

fn default_private_key_env() -> String {
    "WALLET_PRIVATE_KEY".to_string()
}

fn default_done_reset_ms() -> u64 {
    2000
}

fn default_event_capacity() -> usize {
    32
}

fn default_receipt_confirmations() -> usize {
    1
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            chain_id: default_chain_id(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            contract_address: default_contract_address(),
            symbol: default_symbol(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: default_private_key_env(),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            done_reset_ms: default_done_reset_ms(),
            event_capacity: default_event_capacity(),
            receipt_confirmations: default_receipt_confirmations(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            token: TokenConfig::default(),
            wallet: WalletConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("rpc.endpoint", default_rpc_endpoint())?
            .set_default("rpc.chain_id", default_chain_id() as i64)?
            .set_default("token.contract_address", default_contract_address())?
            .set_default("workflow.done_reset_ms", default_done_reset_ms() as i64)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (e.g. SEND_TOKEN__RPC__ENDPOINT)
            .add_source(
                config::Environment::with_prefix("SEND_TOKEN")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let endpoint = url::Url::parse(&self.rpc.endpoint)
            .with_context(|| format!("Invalid rpc.endpoint: {}", self.rpc.endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("rpc.endpoint must be http(s), got {}", endpoint.scheme());
        }

        if !is_hex_address(&self.token.contract_address) {
            anyhow::bail!(
                "Invalid token.contract_address: {}",
                self.token.contract_address
            );
        }

        if self.token.symbol.trim().is_empty() {
            anyhow::bail!("token.symbol cannot be empty");
        }

        if self.rpc.poll_interval_ms == 0 {
            anyhow::bail!("rpc.poll_interval_ms must be positive");
        }

        if self.workflow.done_reset_ms == 0 {
            anyhow::bail!("workflow.done_reset_ms must be positive");
        }

        if self.workflow.event_capacity == 0 {
            anyhow::bail!("workflow.event_capacity must be positive");
        }

        if self.workflow.receipt_confirmations == 0 {
            anyhow::bail!("workflow.receipt_confirmations must be at least 1");
        }

        Ok(())
    }

    /// Read the signing key from the configured environment variable, if any
    pub fn private_key(&self) -> Option<String> {
        std::env::var(&self.wallet.private_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  RPC:
    endpoint: {}
    chain_id: {}
    poll_interval: {}ms
  Token:
    contract: {}
    symbol: {}
  Wallet:
    private_key_env: {}
    private_key: {}
  Workflow:
    done_reset: {}ms
    event_capacity: {}
    receipt_confirmations: {}
"#,
            mask_url(&self.rpc.endpoint),
            self.rpc.chain_id,
            self.rpc.poll_interval_ms,
            self.token.contract_address,
            self.token.symbol,
            self.wallet.private_key_env,
            if self.private_key().is_some() {
                "***"
            } else {
                "(not set, using node accounts)"
            },
            self.workflow.done_reset_ms,
            self.workflow.event_capacity,
            self.workflow.receipt_confirmations,
        )
    }
}

/// `0x` followed by exactly 40 hex digits
fn is_hex_address(value: &str) -> bool {
    value
        .strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rpc.chain_id, 43113);
        assert_eq!(config.token.symbol, "USDC");
        assert_eq!(config.workflow.done_reset(), Duration::from_millis(2000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.token.contract_address = "0x1234".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.rpc.endpoint = "ws://localhost:8546".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workflow.done_reset_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workflow.receipt_confirmations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[rpc]
endpoint = "http://127.0.0.1:8545"
chain_id = 31337

[token]
symbol = "TST"

[workflow]
done_reset_ms = 500
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.rpc.endpoint, "http://127.0.0.1:8545");
        assert_eq!(config.rpc.chain_id, 31337);
        assert_eq!(config.token.symbol, "TST");
        assert_eq!(config.token.contract_address, default_contract_address());
        assert_eq!(config.workflow.done_reset_ms, 500);
        assert_eq!(config.workflow.event_capacity, 32);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.rpc.endpoint, default_rpc_endpoint());
    }

    #[test]
    fn test_env_override_uses_double_underscore() {
        std::env::set_var("SEND_TOKEN__WALLET__PRIVATE_KEY_ENV", "SEND_TOKEN_TEST_KEY");
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml"));
        std::env::remove_var("SEND_TOKEN__WALLET__PRIVATE_KEY_ENV");

        assert_eq!(config.unwrap().wallet.private_key_env, "SEND_TOKEN_TEST_KEY");
    }

    #[test]
    fn test_is_hex_address() {
        assert!(is_hex_address("0x5425890298aed601595a70AB815c96711a31Bc65"));
        assert!(!is_hex_address("5425890298aed601595a70AB815c96711a31Bc65"));
        assert!(!is_hex_address("0xZZ25890298aed601595a70AB815c96711a31Bc65"));
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("https://rpc.example.com?key=secret"),
            "https://rpc.example.com?***"
        );
        assert_eq!(mask_url("https://rpc.example.com"), "https://rpc.example.com");
    }
}
