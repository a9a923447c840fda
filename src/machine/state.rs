//! Workflow state topology
//!
//! ```text
//! wallet (compound)            createWalletClient -> getAddress -> getDecimals -> getBalance -> success
//!                              error.{createWalletClient | getAddress | getBalance}
//! input (parallel)             address | amount
//! validate (parallel)          address: is0xAddress -> is42CharAddress -> success | error
//!                              amount:  check -> success | error
//! submit
//! waitForTxReceipt
//! done                         -> input after the reset delay
//! ```
//!
//! Parallel states carry one enum per region. [`WorkflowState::paths`] lists
//! the active leaf paths (`validate.address.error`, `validate.amount.success`)
//! and [`WorkflowState::matches`] answers prefix queries against them.

use std::fmt;

/// Sub-states of `wallet`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletStep {
    CreateWalletClient,
    GetAddress,
    GetDecimals,
    GetBalance,
    Success,
    Error(WalletFailure),
}

/// Sub-states of `wallet.error`: which setup step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletFailure {
    CreateWalletClient,
    GetAddress,
    GetBalance,
}

impl WalletFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateWalletClient => "createWalletClient",
            Self::GetAddress => "getAddress",
            Self::GetBalance => "getBalance",
        }
    }
}

impl WalletStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateWalletClient => "createWalletClient",
            Self::GetAddress => "getAddress",
            Self::GetDecimals => "getDecimals",
            Self::GetBalance => "getBalance",
            Self::Success => "success",
            Self::Error(_) => "error",
        }
    }
}

/// `validate.address` region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressCheck {
    Is0xAddress,
    Is42CharAddress,
    Success,
    Error,
}

impl AddressCheck {
    pub const INITIAL: Self = Self::Is0xAddress;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Is0xAddress => "is0xAddress",
            Self::Is42CharAddress => "is42CharAddress",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// `validate.amount` region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountCheck {
    Check,
    Success,
    Error,
}

impl AmountCheck {
    pub const INITIAL: Self = Self::Check;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Top-level workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Wallet(WalletStep),
    Input,
    Validate {
        address: AddressCheck,
        amount: AmountCheck,
    },
    Submit,
    WaitForTxReceipt,
    Done,
}

impl WorkflowState {
    pub const INITIAL: Self = Self::Wallet(WalletStep::CreateWalletClient);

    /// Top-level state name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Wallet(_) => "wallet",
            Self::Input => "input",
            Self::Validate { .. } => "validate",
            Self::Submit => "submit",
            Self::WaitForTxReceipt => "waitForTxReceipt",
            Self::Done => "done",
        }
    }

    /// Active leaf paths, one per parallel region
    pub fn paths(&self) -> Vec<String> {
        match self {
            Self::Wallet(WalletStep::Error(failure)) => {
                vec![format!("wallet.error.{}", failure.as_str())]
            }
            Self::Wallet(step) => vec![format!("wallet.{}", step.as_str())],
            Self::Input => vec!["input.address".to_string(), "input.amount".to_string()],
            Self::Validate { address, amount } => vec![
                format!("validate.address.{}", address.as_str()),
                format!("validate.amount.{}", amount.as_str()),
            ],
            Self::Submit | Self::WaitForTxReceipt | Self::Done => vec![self.name().to_string()],
        }
    }

    /// Does any active path equal `pattern` or descend from it?
    ///
    /// `"wallet"`, `"wallet.error"` and `"wallet.error.getAddress"` all match
    /// `wallet.error.getAddress`; `"validate.address.error"` matches while the
    /// amount region is elsewhere.
    pub fn matches(&self, pattern: &str) -> bool {
        let pattern = pattern.trim_end_matches('.');
        self.paths().iter().any(|path| {
            path == pattern
                || (path.starts_with(pattern) && path.as_bytes().get(pattern.len()) == Some(&b'.'))
        })
    }

    /// True for states that wait on a gateway call
    pub fn is_invoking(&self) -> bool {
        matches!(
            self,
            Self::Wallet(
                WalletStep::CreateWalletClient
                    | WalletStep::GetAddress
                    | WalletStep::GetDecimals
                    | WalletStep::GetBalance
            ) | Self::Submit
                | Self::WaitForTxReceipt
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Validate { address, amount } => write!(
                f,
                "validate(address.{}, amount.{})",
                address.as_str(),
                amount.as_str()
            ),
            _ => write!(f, "{}", self.paths().join(", ")),
        }
    }
}
